//! Pure consistency rules over a feature model.
//!
//! Three independent rules, each reported separately;
//! [`is_feature_model_valid`] is their conjunction and runs on every
//! transaction commit.

use super::feature::TreeNode;
use super::graph::FeatureModel;
use crate::error::FeatureError;

/// A single structural rule a valid model must satisfy.
pub trait ConsistencyRule {
    /// Rule name, used in diagnostics.
    const NAME: &'static str;

    /// `Ok` when the model satisfies the rule, otherwise a single-line
    /// description of the violation.
    fn verify(model: &FeatureModel) -> Result<(), String>;
}

/// The model has exactly one root-kind feature and it is the designated
/// root.
pub struct ExactlyOneRootNode;

impl ConsistencyRule for ExactlyOneRootNode {
    const NAME: &'static str = "ExactlyOneRootNode";

    fn verify(model: &FeatureModel) -> Result<(), String> {
        let roots: Vec<_> = model
            .features()
            .filter(|feature| feature.is_root())
            .collect();
        match (roots.as_slice(), model.root_id()) {
            ([only], Some(designated)) => {
                if model.feature(designated).map(|f| f.name()) == Some(only.name()) {
                    Ok(())
                } else {
                    Err(format!(
                        "root feature `{}` is not the designated root",
                        only.name()
                    ))
                }
            }
            ([_], None) => Err("model has a root feature but no designated root".to_owned()),
            ([], _) => Err("model has no root feature".to_owned()),
            (many, _) => Err(format!("model has {} root features", many.len())),
        }
    }
}

/// Every non-root node has a parent that is still present in the model.
pub struct EveryFeatureRequiresParent;

impl ConsistencyRule for EveryFeatureRequiresParent {
    const NAME: &'static str = "EveryFeatureRequiresParent";

    fn verify(model: &FeatureModel) -> Result<(), String> {
        for id in model.node_ids() {
            if model.root_id() == Some(id) {
                continue;
            }
            let Some(parent) = model.parent(id) else {
                return Err(format!("node {id} has no parent"));
            };
            if model.node(parent).is_none() {
                return Err(format!("node {id} has a dangling parent {parent}"));
            }
        }
        Ok(())
    }
}

/// Parent and child lists agree in both directions.
pub struct CheckFeatureParentChildRelationship;

impl ConsistencyRule for CheckFeatureParentChildRelationship {
    const NAME: &'static str = "CheckFeatureParentChildRelationship";

    fn verify(model: &FeatureModel) -> Result<(), String> {
        for id in model.node_ids() {
            for &child in model.children(id) {
                if model.node(child).is_none() {
                    return Err(format!("node {id} lists a removed child {child}"));
                }
                if model.parent(child) != Some(id) {
                    return Err(format!(
                        "child {child} of node {id} does not point back to it"
                    ));
                }
            }
            if let Some(parent) = model.parent(id) {
                if !model.children(parent).contains(&id) {
                    return Err(format!(
                        "parent {parent} of node {id} does not list it as a child"
                    ));
                }
            }
            // a feature carries at most one group
            if model.feature(id).is_some() {
                let groups = model
                    .children(id)
                    .iter()
                    .filter(|&&child| model.relationship(child).is_some())
                    .count();
                if groups > 1 {
                    return Err(format!("feature {id} has {groups} relationship groups"));
                }
            }
            // a relationship sits between a feature and features only
            if model.relationship(id).is_some() {
                let parent_is_feature = model
                    .parent(id)
                    .and_then(|parent| model.feature(parent))
                    .is_some();
                if !parent_is_feature {
                    return Err(format!("relationship {id} is not parented by a feature"));
                }
                for &child in model.children(id) {
                    if !matches!(model.node(child), Some(TreeNode::Feature(_))) {
                        return Err(format!(
                            "relationship {id} has a non-feature child {child}"
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Conjunction of all consistency rules.
pub fn is_feature_model_valid(model: &FeatureModel) -> bool {
    validate_feature_model(model).is_ok()
}

/// Like [`is_feature_model_valid`] but reports which rule failed.
pub fn validate_feature_model(model: &FeatureModel) -> Result<(), FeatureError> {
    fn run<R: ConsistencyRule>(model: &FeatureModel) -> Result<(), FeatureError> {
        R::verify(model)
            .map_err(|violation| FeatureError::Inconsistent(format!("{}: {violation}", R::NAME)))
    }

    run::<ExactlyOneRootNode>(model)?;
    run::<EveryFeatureRequiresParent>(model)?;
    run::<CheckFeatureParentChildRelationship>(model)?;
    Ok(())
}
