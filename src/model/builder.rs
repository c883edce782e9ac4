//! Staged construction of feature models from scratch.
//!
//! External ingesters declare features, edges, groups, and constraints in
//! any order; [`build_feature_model`](FeatureModelBuilder::build_feature_model)
//! then runs four staged transactions - features, tree edges, groups,
//! constraints - validating after each stage.

use std::path::PathBuf;

use smol_str::SmolStr;

use super::feature::{Feature, NumericValues, RelationshipKind};
use super::graph::{ConstraintClass, ExprKind, FeatureModel, Req};
use super::transaction::ModifyTransaction;
use crate::constraint::Constraint;
use crate::error::FeatureError;

/// Builder used by the model-description ingesters.
#[derive(Debug, Default)]
pub struct FeatureModelBuilder {
    name: Option<String>,
    commit: Option<String>,
    path: Option<PathBuf>,
    root_name: Option<SmolStr>,
    features: Vec<Feature>,
    edges: Vec<(SmolStr, SmolStr)>,
    relationships: Vec<(RelationshipKind, SmolStr)>,
    constraints: Vec<(Constraint, Option<ConstraintClass>)>,
}

impl FeatureModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prebuilt feature. Returns `false` on a name collision
    /// with an already registered feature.
    pub fn make_feature(&mut self, feature: Feature) -> bool {
        if self.is_taken(feature.name()) {
            return false;
        }
        self.features.push(feature);
        true
    }

    pub fn make_binary_feature(&mut self, name: impl Into<SmolStr>, optional: bool) -> bool {
        self.make_feature(Feature::binary(name.into(), optional))
    }

    pub fn make_numeric_feature(
        &mut self,
        name: impl Into<SmolStr>,
        optional: bool,
        values: NumericValues,
    ) -> bool {
        self.make_feature(Feature::numeric(name.into(), optional, values))
    }

    /// Declare the root feature. A model built without this gets a root
    /// named `root`.
    pub fn make_root(&mut self, name: impl Into<SmolStr>) -> &mut Self {
        self.root_name = Some(name.into());
        self
    }

    /// Record a parent/child tree edge; both ends must exist by the time
    /// the model is built.
    pub fn add_edge(&mut self, parent: impl Into<SmolStr>, child: impl Into<SmolStr>) -> &mut Self {
        self.edges.push((parent.into(), child.into()));
        self
    }

    /// Insert a relationship group below `parent`; the parent's children
    /// become group members.
    pub fn emplace_relationship(
        &mut self,
        kind: RelationshipKind,
        parent: impl Into<SmolStr>,
    ) -> &mut Self {
        self.relationships.push((kind, parent.into()));
        self
    }

    /// Append a top-level cross-tree constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.constraints.push((constraint, None));
        self
    }

    /// Append a mixed boolean/arithmetic constraint with its encoding
    /// flags.
    pub fn add_mixed_constraint(
        &mut self,
        constraint: Constraint,
        expr_kind: ExprKind,
        req: Req,
    ) -> &mut Self {
        self.constraints
            .push((constraint, Some(ConstraintClass::Mixed { expr_kind, req })));
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_commit(&mut self, commit: impl Into<String>) -> &mut Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    /// Build the model through four staged commits: features, tree
    /// edges, groups, constraints. Fails with the first stage's error and
    /// yields no model.
    pub fn build_feature_model(self) -> Result<FeatureModel, FeatureError> {
        let mut model = FeatureModel::new(self.name.unwrap_or_default());

        // stage 1: root, scalars, and all declared features
        let mut features = ModifyTransaction::open(&mut model);
        if let Some(commit) = self.commit {
            features.set_commit(commit);
        }
        if let Some(path) = self.path {
            features.set_path(path);
        }
        let root_name = self.root_name.unwrap_or_else(|| SmolStr::new("root"));
        features.set_root(Feature::root(root_name));
        for feature in self.features {
            features.add_feature(feature, None);
        }
        features.commit()?;

        // stage 2: re-parent along the declared tree edges
        let mut edges = ModifyTransaction::open(&mut model);
        for (parent, child) in self.edges {
            edges.add_child(parent, child);
        }
        edges.commit()?;

        // stage 3: relationship groups adopt their parent's children
        let mut groups = ModifyTransaction::open(&mut model);
        for (kind, parent) in self.relationships {
            groups.add_relationship(kind, parent);
        }
        groups.commit()?;

        // stage 4: cross-tree constraints, bound against the final tree
        let mut constraints = ModifyTransaction::open(&mut model);
        for (constraint, class) in self.constraints {
            match class {
                Some(ConstraintClass::Mixed { expr_kind, req }) => {
                    constraints.add_mixed_constraint(constraint, expr_kind, req);
                }
                _ => constraints.add_constraint(constraint),
            }
        }
        constraints.commit()?;

        Ok(model)
    }

    fn is_taken(&self, name: &str) -> bool {
        self.features.iter().any(|feature| feature.name() == name)
            || self.root_name.as_deref() == Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintParser;

    #[test]
    fn test_build_tree_with_groups_and_constraints() {
        let mut builder = FeatureModelBuilder::new();
        builder.set_name("demo").set_commit("abc123");
        builder.make_root("base");
        assert!(builder.make_binary_feature("A", false));
        assert!(builder.make_binary_feature("A1", true));
        assert!(builder.make_binary_feature("A2", true));
        assert!(builder.make_binary_feature("B", true));
        builder
            .add_edge("A", "A1")
            .add_edge("A", "A2")
            .emplace_relationship(RelationshipKind::Alternative, "A")
            .add_constraint(
                ConstraintParser::new("A1 -> !B")
                    .build_constraint()
                    .unwrap(),
            );
        let model = builder.build_feature_model().unwrap();

        assert_eq!(model.name(), "demo");
        assert_eq!(model.commit(), Some("abc123"));
        assert_eq!(model.root().unwrap().name(), "base");
        assert_eq!(model.size(), 5);
        let a1 = model.get_feature_id("A1").unwrap();
        assert!(model.is_in_alternative_group(a1));
        assert_eq!(
            model.parent_feature(a1).and_then(|id| model.feature(id)).unwrap().name(),
            "A"
        );
        assert_eq!(model.boolean_constraints().count(), 1);
    }

    #[test]
    fn test_default_root_is_installed() {
        let mut builder = FeatureModelBuilder::new();
        builder.make_binary_feature("a", true);
        let model = builder.build_feature_model().unwrap();
        assert_eq!(model.root().unwrap().name(), "root");
    }

    #[test]
    fn test_duplicate_declaration_is_reported_early() {
        let mut builder = FeatureModelBuilder::new();
        assert!(builder.make_binary_feature("a", true));
        assert!(!builder.make_binary_feature("a", false));
    }

    #[test]
    fn test_edge_to_unknown_parent_fails_build() {
        let mut builder = FeatureModelBuilder::new();
        builder.make_binary_feature("a", true);
        builder.add_edge("ghost", "a");
        assert!(matches!(
            builder.build_feature_model().unwrap_err(),
            FeatureError::MissingParent(_)
        ));
    }

    #[test]
    fn test_numeric_domain_rejected_at_build_time() {
        let mut builder = FeatureModelBuilder::new();
        builder.make_numeric_feature("n", false, NumericValues::range(5, 2));
        assert!(builder.build_feature_model().is_err());
    }

    #[test]
    fn test_constraint_on_unknown_feature_fails_build() {
        let mut builder = FeatureModelBuilder::new();
        builder.make_binary_feature("a", true);
        builder.add_constraint(ConstraintParser::new("a -> ghost").build_constraint().unwrap());
        assert_eq!(
            builder.build_feature_model().unwrap_err(),
            FeatureError::MissingFeature("ghost".into())
        );
    }
}
