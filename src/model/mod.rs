//! The feature-model graph and its mutation layer: typed tree nodes,
//! the arena-backed [`FeatureModel`], consistency rules, transactions,
//! and the staged builder facade.

mod builder;
mod consistency;
mod feature;
mod graph;
mod transaction;

pub use builder::FeatureModelBuilder;
pub use consistency::{
    CheckFeatureParentChildRelationship, ConsistencyRule, EveryFeatureRequiresParent,
    ExactlyOneRootNode, is_feature_model_valid, validate_feature_model,
};
pub use feature::{Feature, FeatureKind, NumericValues, Relationship, RelationshipKind, TreeNode};
pub use graph::{ConstraintClass, ConstraintEntry, ConstraintId, ExprKind, FeatureModel, Req};
pub use transaction::{
    CopyTransaction, FeatureArg, Modification, ModifyTransaction, add_feature, add_features,
    add_relationship, merge_feature_models, remove_feature, remove_relationship, set_commit,
};
