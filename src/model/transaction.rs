//! Transactional mutation of feature models.
//!
//! Both transaction modes share one operation vocabulary, recorded as
//! typed [`Modification`] values:
//!
//! - [`ModifyTransaction`] borrows the model and queues modifications;
//!   commit replays them in insertion order and validates. The model is
//!   snapshotted first, so a failed apply or a failed validation restores
//!   it untouched.
//! - [`CopyTransaction`] clones the model up front and applies each
//!   modification immediately; commit hands out the clone only if it
//!   validates.
//!
//! Free helpers at the bottom wrap single modifications in one-shot
//! transactions, and [`merge_feature_models`] builds a merged model via a
//! copy transaction.

use std::path::PathBuf;

use smol_str::SmolStr;
use tracing::warn;

use super::consistency::{is_feature_model_valid, validate_feature_model};
use super::feature::{Feature, FeatureKind, Relationship, RelationshipKind};
use super::graph::{ConstraintClass, ConstraintEntry, ExprKind, FeatureModel, Req};
use crate::base::{FeatureSourceRange, NodeId};
use crate::constraint::Constraint;
use crate::error::FeatureError;

/// A feature referenced by name or by handle, as convenient for the
/// caller.
#[derive(Debug, Clone)]
pub enum FeatureArg {
    Name(SmolStr),
    Id(NodeId),
}

impl FeatureArg {
    fn resolve(&self, model: &FeatureModel) -> Result<NodeId, FeatureError> {
        match self {
            Self::Name(name) => model
                .get_feature_id(name)
                .ok_or_else(|| FeatureError::MissingFeature(name.clone())),
            Self::Id(id) => {
                if model.node(*id).is_some() {
                    Ok(*id)
                } else {
                    Err(FeatureError::MissingFeature(SmolStr::new(id.to_string())))
                }
            }
        }
    }

    fn describe(&self) -> SmolStr {
        match self {
            Self::Name(name) => name.clone(),
            Self::Id(id) => SmolStr::new(id.to_string()),
        }
    }
}

impl From<&str> for FeatureArg {
    fn from(name: &str) -> Self {
        Self::Name(SmolStr::new(name))
    }
}

impl From<String> for FeatureArg {
    fn from(name: String) -> Self {
        Self::Name(SmolStr::new(name))
    }
}

impl From<SmolStr> for FeatureArg {
    fn from(name: SmolStr) -> Self {
        Self::Name(name)
    }
}

impl From<NodeId> for FeatureArg {
    fn from(id: NodeId) -> Self {
        Self::Id(id)
    }
}

/// A single typed structural edit.
#[derive(Debug, Clone)]
pub enum Modification {
    AddFeature {
        feature: Feature,
        parent: Option<FeatureArg>,
    },
    RemoveFeature {
        target: FeatureArg,
        recursive: bool,
    },
    AddRelationship {
        kind: RelationshipKind,
        parent: FeatureArg,
    },
    RemoveRelationship {
        parent: FeatureArg,
    },
    AddLocation {
        feature: FeatureArg,
        range: FeatureSourceRange,
    },
    RemoveLocation {
        feature: FeatureArg,
        range: FeatureSourceRange,
    },
    AddConstraint {
        constraint: Constraint,
        /// `None` classifies by content; mixed entries pass their flags
        /// explicitly.
        class: Option<ConstraintClass>,
    },
    SetName {
        name: String,
    },
    SetCommit {
        commit: String,
    },
    SetPath {
        path: PathBuf,
    },
    SetRoot {
        root: Feature,
    },
    AddChild {
        parent: FeatureArg,
        child: FeatureArg,
    },
}

/// Replay one modification against a model. Returns the created node for
/// the adding variants.
fn apply(model: &mut FeatureModel, modification: Modification) -> Result<Option<NodeId>, FeatureError> {
    match modification {
        Modification::AddFeature { feature, parent } => {
            let parent_id = match &parent {
                Some(arg) => Some(
                    arg.resolve(model)
                        .map_err(|_| FeatureError::MissingParent(arg.describe()))?,
                ),
                None => model.root_id(),
            };
            let installs_root = feature.is_root() && model.root_id().is_none();
            let id = model.insert_feature(feature)?;
            if let Some(parent_id) = parent_id {
                model.set_parent(id, Some(parent_id));
                model.add_edge(parent_id, id);
            } else if installs_root {
                model.set_root_id(Some(id));
            }
            Ok(Some(id))
        }
        Modification::RemoveFeature { target, recursive } => {
            let id = target.resolve(model)?;
            if recursive {
                remove_subtree(model, id);
            } else {
                if !model.feature_children(id).is_empty() {
                    let name = model
                        .feature(id)
                        .map(|f| f.name().to_owned())
                        .unwrap_or_default();
                    return Err(FeatureError::Error(format!(
                        "cannot remove non-leaf feature `{name}` non-recursively"
                    )));
                }
                if let Some(group) = model.relationship_child(id) {
                    model.remove_edge(id, group);
                    model.remove_node(group);
                }
                detach_and_remove(model, id);
            }
            Ok(None)
        }
        Modification::AddRelationship { kind, parent } => {
            let parent_id = parent
                .resolve(model)
                .map_err(|_| FeatureError::MissingParent(parent.describe()))?;
            if model.relationship_child(parent_id).is_some() {
                return Err(FeatureError::AlreadyPresent(parent.describe()));
            }
            let group = model.insert_relationship(Relationship::new(kind));
            model.set_parent(group, Some(parent_id));
            model.add_edge(parent_id, group);
            // existing feature children move under the new group
            let members: Vec<NodeId> = model
                .children(parent_id)
                .iter()
                .copied()
                .filter(|&child| child != group && model.feature(child).is_some())
                .collect();
            for member in members {
                model.remove_edge(parent_id, member);
                model.add_edge(group, member);
                model.set_parent(member, Some(group));
            }
            Ok(Some(group))
        }
        Modification::RemoveRelationship { parent } => {
            let parent_id = parent.resolve(model)?;
            let group = model
                .relationship_child(parent_id)
                .ok_or_else(|| FeatureError::MissingParent(parent.describe()))?;
            model.remove_edge(parent_id, group);
            let members: Vec<NodeId> = model.children(group).to_vec();
            for member in members {
                model.remove_edge(group, member);
                model.add_edge(parent_id, member);
                model.set_parent(member, Some(parent_id));
            }
            model.remove_node(group);
            Ok(None)
        }
        Modification::AddLocation { feature, range } => {
            let id = feature.resolve(model)?;
            if let Some(feature) = model.feature_mut(id) {
                feature.add_location(range);
            }
            Ok(None)
        }
        Modification::RemoveLocation { feature, range } => {
            let id = feature.resolve(model)?;
            if let Some(feature) = model.feature_mut(id) {
                feature.remove_location(&range);
            }
            Ok(None)
        }
        Modification::AddConstraint { constraint, class } => {
            // pre-check so a failed add leaves no partially bound entry
            for name in constraint.referenced_features() {
                if !model.contains(&name) {
                    return Err(FeatureError::MissingFeature(name));
                }
            }
            let class = class.unwrap_or_else(|| ConstraintClass::classify(&constraint));
            let id = model.add_constraint_entry(ConstraintEntry::new(constraint, class));
            model.bind_constraint(id)?;
            Ok(None)
        }
        Modification::SetName { name } => {
            model.set_name(name);
            Ok(None)
        }
        Modification::SetCommit { commit } => {
            model.set_commit(commit);
            Ok(None)
        }
        Modification::SetPath { path } => {
            model.set_path(path);
            Ok(None)
        }
        Modification::SetRoot { root } => {
            if !root.is_root() {
                return Err(FeatureError::Error(format!(
                    "feature `{}` cannot become root",
                    root.name()
                )));
            }
            let new_root = model.insert_feature(root)?;
            if let Some(old_root) = model.root_id() {
                let children: Vec<NodeId> = model.children(old_root).to_vec();
                for child in children {
                    model.set_parent(child, Some(new_root));
                    model.remove_edge(old_root, child);
                    model.add_edge(new_root, child);
                }
                model.remove_node(old_root);
            }
            model.set_root_id(Some(new_root));
            Ok(Some(new_root))
        }
        Modification::AddChild { parent, child } => {
            let parent_id = parent
                .resolve(model)
                .map_err(|_| FeatureError::MissingParent(parent.describe()))?;
            let child_id = child.resolve(model)?;
            if let Some(old_parent) = model.parent(child_id) {
                model.remove_edge(old_parent, child_id);
            }
            model.add_edge(parent_id, child_id);
            model.set_parent(child_id, Some(parent_id));
            Ok(None)
        }
    }
}

fn remove_subtree(model: &mut FeatureModel, id: NodeId) {
    for child in model.feature_children(id) {
        remove_subtree(model, child);
    }
    if let Some(group) = model.relationship_child(id) {
        model.remove_edge(id, group);
        model.remove_node(group);
    }
    detach_and_remove(model, id);
}

fn detach_and_remove(model: &mut FeatureModel, id: NodeId) {
    if let Some(parent) = model.parent(id) {
        model.remove_edge(parent, id);
    }
    model.remove_node(id);
}

fn replay(
    model: &mut FeatureModel,
    modifications: Vec<Modification>,
) -> Result<(), FeatureError> {
    let snapshot = model.clone();
    for modification in modifications {
        if let Err(error) = apply(model, modification) {
            *model = snapshot;
            return Err(error);
        }
    }
    if let Err(error) = validate_feature_model(model) {
        *model = snapshot;
        return Err(error);
    }
    Ok(())
}

// =============================================================================
// Modify mode
// =============================================================================

/// A transaction that borrows its model and queues modifications until
/// commit. Commit is atomic: on any failure the model is restored from a
/// snapshot taken before replay.
#[derive(Debug)]
pub struct ModifyTransaction<'m> {
    model: Option<&'m mut FeatureModel>,
    modifications: Vec<Modification>,
}

impl<'m> ModifyTransaction<'m> {
    /// Open a transaction over a currently valid (or still empty) model.
    pub fn open(model: &'m mut FeatureModel) -> Self {
        debug_assert!(
            model.size() == 0 || is_feature_model_valid(model),
            "transaction opened on an invalid feature model"
        );
        Self {
            model: Some(model),
            modifications: Vec::new(),
        }
    }

    /// Queue a raw modification record.
    pub fn push(&mut self, modification: Modification) {
        self.modifications.push(modification);
    }

    pub fn add_feature(&mut self, feature: Feature, parent: Option<FeatureArg>) {
        self.push(Modification::AddFeature { feature, parent });
    }

    pub fn remove_feature(&mut self, target: impl Into<FeatureArg>, recursive: bool) {
        self.push(Modification::RemoveFeature {
            target: target.into(),
            recursive,
        });
    }

    pub fn add_relationship(&mut self, kind: RelationshipKind, parent: impl Into<FeatureArg>) {
        self.push(Modification::AddRelationship {
            kind,
            parent: parent.into(),
        });
    }

    pub fn remove_relationship(&mut self, parent: impl Into<FeatureArg>) {
        self.push(Modification::RemoveRelationship {
            parent: parent.into(),
        });
    }

    pub fn add_location(&mut self, feature: impl Into<FeatureArg>, range: FeatureSourceRange) {
        self.push(Modification::AddLocation {
            feature: feature.into(),
            range,
        });
    }

    pub fn remove_location(&mut self, feature: impl Into<FeatureArg>, range: FeatureSourceRange) {
        self.push(Modification::RemoveLocation {
            feature: feature.into(),
            range,
        });
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.push(Modification::AddConstraint {
            constraint,
            class: None,
        });
    }

    pub fn add_mixed_constraint(&mut self, constraint: Constraint, expr_kind: ExprKind, req: Req) {
        self.push(Modification::AddConstraint {
            constraint,
            class: Some(ConstraintClass::Mixed { expr_kind, req }),
        });
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.push(Modification::SetName { name: name.into() });
    }

    pub fn set_commit(&mut self, commit: impl Into<String>) {
        self.push(Modification::SetCommit {
            commit: commit.into(),
        });
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.push(Modification::SetPath { path: path.into() });
    }

    pub fn set_root(&mut self, root: Feature) {
        self.push(Modification::SetRoot { root });
    }

    pub fn add_child(&mut self, parent: impl Into<FeatureArg>, child: impl Into<FeatureArg>) {
        self.push(Modification::AddChild {
            parent: parent.into(),
            child: child.into(),
        });
    }

    /// Replay the queued modifications in insertion order, then validate.
    /// On any failure the model is left exactly as it was.
    pub fn commit(mut self) -> Result<(), FeatureError> {
        let model = self.model.take().ok_or(FeatureError::MissingModel)?;
        let modifications = std::mem::take(&mut self.modifications);
        replay(model, modifications)
    }

    /// Throw away all queued modifications.
    pub fn abort(mut self) {
        self.modifications.clear();
        self.model = None;
    }

    pub fn is_uncommitted(&self) -> bool {
        self.model.is_some()
    }
}

impl Drop for ModifyTransaction<'_> {
    fn drop(&mut self) {
        if let Some(model) = self.model.take() {
            if !self.modifications.is_empty() {
                warn!("uncommitted modifications before destruction; committing");
                let modifications = std::mem::take(&mut self.modifications);
                if let Err(error) = replay(model, modifications) {
                    warn!(%error, "implicit commit failed; model left unchanged");
                }
            }
        }
    }
}

// =============================================================================
// Copy mode
// =============================================================================

/// A transaction over a clone of the model. Modifications apply
/// immediately and are observable through [`model`](Self::model); commit
/// hands the clone out only if it validates.
#[derive(Debug)]
pub struct CopyTransaction {
    model: Option<FeatureModel>,
}

impl CopyTransaction {
    pub fn open(model: &FeatureModel) -> Self {
        Self {
            model: Some(model.clone()),
        }
    }

    /// The working copy, observable between open and commit.
    pub fn model(&self) -> Option<&FeatureModel> {
        self.model.as_ref()
    }

    pub fn add_feature(
        &mut self,
        feature: Feature,
        parent: Option<FeatureArg>,
    ) -> Result<NodeId, FeatureError> {
        let created = self.apply(Modification::AddFeature { feature, parent })?;
        created.ok_or(FeatureError::MissingModel)
    }

    pub fn remove_feature(
        &mut self,
        target: impl Into<FeatureArg>,
        recursive: bool,
    ) -> Result<(), FeatureError> {
        self.apply(Modification::RemoveFeature {
            target: target.into(),
            recursive,
        })
        .map(drop)
    }

    pub fn add_relationship(
        &mut self,
        kind: RelationshipKind,
        parent: impl Into<FeatureArg>,
    ) -> Result<NodeId, FeatureError> {
        let created = self.apply(Modification::AddRelationship {
            kind,
            parent: parent.into(),
        })?;
        created.ok_or(FeatureError::MissingModel)
    }

    pub fn remove_relationship(
        &mut self,
        parent: impl Into<FeatureArg>,
    ) -> Result<(), FeatureError> {
        self.apply(Modification::RemoveRelationship {
            parent: parent.into(),
        })
        .map(drop)
    }

    pub fn add_location(
        &mut self,
        feature: impl Into<FeatureArg>,
        range: FeatureSourceRange,
    ) -> Result<(), FeatureError> {
        self.apply(Modification::AddLocation {
            feature: feature.into(),
            range,
        })
        .map(drop)
    }

    pub fn remove_location(
        &mut self,
        feature: impl Into<FeatureArg>,
        range: FeatureSourceRange,
    ) -> Result<(), FeatureError> {
        self.apply(Modification::RemoveLocation {
            feature: feature.into(),
            range,
        })
        .map(drop)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), FeatureError> {
        self.apply(Modification::AddConstraint {
            constraint,
            class: None,
        })
        .map(drop)
    }

    pub fn add_mixed_constraint(
        &mut self,
        constraint: Constraint,
        expr_kind: ExprKind,
        req: Req,
    ) -> Result<(), FeatureError> {
        self.apply(Modification::AddConstraint {
            constraint,
            class: Some(ConstraintClass::Mixed { expr_kind, req }),
        })
        .map(drop)
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), FeatureError> {
        self.apply(Modification::SetName { name: name.into() }).map(drop)
    }

    pub fn set_commit(&mut self, commit: impl Into<String>) -> Result<(), FeatureError> {
        self.apply(Modification::SetCommit {
            commit: commit.into(),
        })
        .map(drop)
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> Result<(), FeatureError> {
        self.apply(Modification::SetPath { path: path.into() }).map(drop)
    }

    pub fn set_root(&mut self, root: Feature) -> Result<NodeId, FeatureError> {
        let created = self.apply(Modification::SetRoot { root })?;
        created.ok_or(FeatureError::MissingModel)
    }

    pub fn add_child(
        &mut self,
        parent: impl Into<FeatureArg>,
        child: impl Into<FeatureArg>,
    ) -> Result<(), FeatureError> {
        self.apply(Modification::AddChild {
            parent: parent.into(),
            child: child.into(),
        })
        .map(drop)
    }

    /// Validate the working copy and hand it out.
    pub fn commit(mut self) -> Result<FeatureModel, FeatureError> {
        let model = self.model.take().ok_or(FeatureError::Aborted)?;
        validate_feature_model(&model)?;
        Ok(model)
    }

    /// Drop the working copy.
    pub fn abort(mut self) {
        self.model = None;
    }

    pub fn is_uncommitted(&self) -> bool {
        self.model.is_some()
    }

    fn apply(&mut self, modification: Modification) -> Result<Option<NodeId>, FeatureError> {
        let model = self.model.as_mut().ok_or(FeatureError::Aborted)?;
        apply(model, modification)
    }
}

impl Drop for CopyTransaction {
    fn drop(&mut self) {
        // destroying an open copy transaction is a programming error
        if self.model.is_some() && !std::thread::panicking() {
            tracing::error!("copy transaction dropped with uncommitted work");
            debug_assert!(false, "copy transaction must be committed or aborted");
        }
    }
}

// =============================================================================
// One-shot helpers
// =============================================================================

/// Add a feature in a one-shot transaction. With no parent given the
/// feature attaches to the root.
pub fn add_feature(
    model: &mut FeatureModel,
    feature: Feature,
    parent: Option<FeatureArg>,
) -> Result<(), FeatureError> {
    let mut transaction = ModifyTransaction::open(model);
    transaction.add_feature(feature, parent);
    transaction.commit()
}

/// Add several features in one transaction.
pub fn add_features(
    model: &mut FeatureModel,
    features: Vec<(Feature, Option<FeatureArg>)>,
) -> Result<(), FeatureError> {
    let mut transaction = ModifyTransaction::open(model);
    for (feature, parent) in features {
        transaction.add_feature(feature, parent);
    }
    transaction.commit()
}

pub fn remove_feature(
    model: &mut FeatureModel,
    target: impl Into<FeatureArg>,
    recursive: bool,
) -> Result<(), FeatureError> {
    let mut transaction = ModifyTransaction::open(model);
    transaction.remove_feature(target, recursive);
    transaction.commit()
}

pub fn add_relationship(
    model: &mut FeatureModel,
    parent: impl Into<FeatureArg>,
    kind: RelationshipKind,
) -> Result<(), FeatureError> {
    let mut transaction = ModifyTransaction::open(model);
    transaction.add_relationship(kind, parent);
    transaction.commit()
}

pub fn remove_relationship(
    model: &mut FeatureModel,
    parent: impl Into<FeatureArg>,
) -> Result<(), FeatureError> {
    let mut transaction = ModifyTransaction::open(model);
    transaction.remove_relationship(parent);
    transaction.commit()
}

pub fn set_commit(model: &mut FeatureModel, commit: impl Into<String>) -> Result<(), FeatureError> {
    let mut transaction = ModifyTransaction::open(model);
    transaction.set_commit(commit);
    transaction.commit()
}

// =============================================================================
// Merge
// =============================================================================

/// Merge `second` into a copy of `first`.
///
/// Strict merging fails if both models contain a feature of equal name
/// but different properties; non-strict merging prefers the properties of
/// `first` and only copies missing locations. On conflict the transaction
/// aborts and no model is produced.
pub fn merge_feature_models(
    first: &FeatureModel,
    second: &FeatureModel,
    strict: bool,
) -> Result<FeatureModel, FeatureError> {
    let root = second.root_id().ok_or(FeatureError::MissingModel)?;
    let mut transaction = CopyTransaction::open(first);
    match merge_subtree(&mut transaction, first, second, root, strict) {
        Ok(()) => transaction.commit(),
        Err(error) => {
            transaction.abort();
            Err(error)
        }
    }
}

fn merge_subtree(
    transaction: &mut CopyTransaction,
    first: &FeatureModel,
    second: &FeatureModel,
    id: NodeId,
    strict: bool,
) -> Result<(), FeatureError> {
    let feature = second
        .feature(id)
        .ok_or_else(|| FeatureError::MissingFeature(SmolStr::new(id.to_string())))?;

    if let Some(existing) = first.get_feature(feature.name()) {
        if !compare_properties(first, existing, second, feature, strict) {
            return Err(FeatureError::Error(format!(
                "cannot merge feature `{}`: conflicting properties",
                feature.name()
            )));
        }
        for range in feature.locations() {
            if !existing.locations().contains(range) {
                transaction.add_location(existing.name(), range.clone())?;
            }
        }
    } else {
        let parent = second
            .parent_feature(id)
            .and_then(|parent| second.feature(parent))
            .map(|parent| FeatureArg::from(parent.name()));
        transaction.add_feature(feature_copy(feature), parent)?;
    }

    for child in second.feature_children(id) {
        merge_subtree(transaction, first, second, child, strict)?;
    }
    Ok(())
}

fn feature_copy(feature: &Feature) -> Feature {
    let copy = match feature.kind() {
        FeatureKind::Root => Feature::root(feature.name()),
        FeatureKind::Binary => Feature::binary(feature.name(), feature.is_optional()),
        FeatureKind::Numeric(values) => {
            Feature::numeric(feature.name(), feature.is_optional(), values.clone())
        }
    };
    copy.with_locations(feature.locations().to_vec())
}

fn compare_properties(
    first: &FeatureModel,
    f1: &Feature,
    second: &FeatureModel,
    f2: &Feature,
    strict: bool,
) -> bool {
    if f1.name() != f2.name() {
        return false;
    }
    if !f1.is_root() && !f2.is_root() {
        let p1 = first
            .get_feature_id(f1.name())
            .and_then(|id| first.parent_feature(id))
            .and_then(|id| first.feature(id))
            .map(Feature::name);
        let p2 = second
            .get_feature_id(f2.name())
            .and_then(|id| second.parent_feature(id))
            .and_then(|id| second.feature(id))
            .map(Feature::name);
        // equal parent names in both modes, otherwise merging would add
        // implicit structure constraints
        if p1 != p2 {
            return false;
        }
    }
    if !strict {
        return true;
    }
    if f1.is_optional() != f2.is_optional() || !f1.kind().same_kind(f2.kind()) {
        return false;
    }
    if f1.is_root() {
        return true;
    }
    let grouped1 = first
        .get_feature_id(f1.name())
        .map(|id| first.enclosing_group(id).is_some());
    let grouped2 = second
        .get_feature_id(f2.name())
        .map(|id| second.enclosing_group(id).is_some());
    if grouped1 != grouped2 {
        return false;
    }
    match (f1.kind(), f2.kind()) {
        (FeatureKind::Numeric(v1), FeatureKind::Numeric(v2)) => v1 == v2,
        _ => true,
    }
}
