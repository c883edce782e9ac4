//! Tree-node payloads of a feature model: features, their numeric value
//! domains, and relationship groups.

use smol_str::SmolStr;

use super::graph::ConstraintId;
use crate::base::FeatureSourceRange;
use crate::constraint::StepFunction;
use crate::error::FeatureError;

/// How a relationship group constrains child selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// Exactly one child may be selected when the parent is selected.
    Alternative,
    /// At least one child must be selected when the parent is selected.
    Or,
}

/// A grouping node between a parent feature and its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    kind: RelationshipKind,
}

impl Relationship {
    pub fn new(kind: RelationshipKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }
}

/// The value domain of a numeric feature.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValues {
    /// A finite list of admissible values, kept sorted.
    List(Vec<i64>),
    /// An inclusive range enumerated by a step function; a missing step
    /// means increments of one.
    Range {
        min: i64,
        max: i64,
        step: Option<StepFunction>,
    },
}

impl NumericValues {
    pub fn list(mut values: Vec<i64>) -> Self {
        values.sort_unstable();
        Self::List(values)
    }

    pub fn range(min: i64, max: i64) -> Self {
        Self::Range {
            min,
            max,
            step: None,
        }
    }

    pub fn stepped_range(min: i64, max: i64, step: StepFunction) -> Self {
        Self::Range {
            min,
            max,
            step: Some(step),
        }
    }

    /// Rejects empty list domains and ranges with `min > max`.
    pub fn validate(&self) -> Result<(), FeatureError> {
        match self {
            Self::List(values) if values.is_empty() => Err(FeatureError::Error(
                "numeric domain must not be empty".to_owned(),
            )),
            Self::Range { min, max, .. } if min > max => Err(FeatureError::Error(format!(
                "numeric range [{min}, {max}] is empty"
            ))),
            _ => Ok(()),
        }
    }
}

/// The kind of a feature node.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    /// The distinguished root of a model. Never optional.
    Root,
    /// A boolean (selected / deselected) feature.
    Binary,
    /// A feature carrying an integer value from a domain.
    Numeric(NumericValues),
}

impl FeatureKind {
    /// Kind equality ignoring the numeric domain payload.
    pub fn same_kind(&self, other: &FeatureKind) -> bool {
        matches!(
            (self, other),
            (FeatureKind::Root, FeatureKind::Root)
                | (FeatureKind::Binary, FeatureKind::Binary)
                | (FeatureKind::Numeric(_), FeatureKind::Numeric(_))
        )
    }
}

/// A named feature of the product line.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    name: SmolStr,
    kind: FeatureKind,
    optional: bool,
    locations: Vec<FeatureSourceRange>,
    /// Constraints of the owning model that mention this feature.
    constraints: Vec<ConstraintId>,
}

impl Feature {
    pub fn root(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Root,
            optional: false,
            locations: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn binary(name: impl Into<SmolStr>, optional: bool) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Binary,
            optional,
            locations: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn numeric(name: impl Into<SmolStr>, optional: bool, values: NumericValues) -> Self {
        Self {
            name: name.into(),
            kind: FeatureKind::Numeric(values),
            optional,
            locations: Vec::new(),
            constraints: Vec::new(),
        }
    }

    pub fn with_locations(mut self, locations: Vec<FeatureSourceRange>) -> Self {
        self.locations = locations;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_smol(&self) -> SmolStr {
        self.name.clone()
    }

    pub fn kind(&self) -> &FeatureKind {
        &self.kind
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, FeatureKind::Root)
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn numeric_values(&self) -> Option<&NumericValues> {
        match &self.kind {
            FeatureKind::Numeric(values) => Some(values),
            _ => None,
        }
    }

    pub fn locations(&self) -> &[FeatureSourceRange] {
        &self.locations
    }

    pub fn add_location(&mut self, range: FeatureSourceRange) {
        self.locations.push(range);
    }

    /// Removes every location equal to `range`.
    pub fn remove_location(&mut self, range: &FeatureSourceRange) {
        self.locations.retain(|existing| existing != range);
    }

    /// Constraints of the owning model that mention this feature.
    pub fn constraints(&self) -> &[ConstraintId] {
        &self.constraints
    }

    pub(crate) fn register_constraint(&mut self, id: ConstraintId) {
        if !self.constraints.contains(&id) {
            self.constraints.push(id);
        }
    }

    pub(crate) fn unregister_constraint(&mut self, id: ConstraintId) {
        self.constraints.retain(|existing| *existing != id);
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A node of the feature-model tree: either a feature or a relationship
/// group.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Feature(Feature),
    Relationship(Relationship),
}

impl TreeNode {
    pub fn as_feature(&self) -> Option<&Feature> {
        match self {
            Self::Feature(feature) => Some(feature),
            Self::Relationship(_) => None,
        }
    }

    pub fn as_feature_mut(&mut self) -> Option<&mut Feature> {
        match self {
            Self::Feature(feature) => Some(feature),
            Self::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            Self::Feature(_) => None,
            Self::Relationship(relationship) => Some(relationship),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_list_is_sorted() {
        let values = NumericValues::list(vec![3, 1, 2]);
        assert_eq!(values, NumericValues::List(vec![1, 2, 3]));
    }

    #[test]
    fn test_empty_domains_rejected() {
        assert!(NumericValues::list(vec![]).validate().is_err());
        assert!(NumericValues::range(5, 4).validate().is_err());
        assert!(NumericValues::range(4, 4).validate().is_ok());
    }

    #[test]
    fn test_root_is_never_optional() {
        let root = Feature::root("root");
        assert!(root.is_root());
        assert!(!root.is_optional());
    }

    #[test]
    fn test_same_kind_ignores_domain() {
        let a = FeatureKind::Numeric(NumericValues::range(0, 1));
        let b = FeatureKind::Numeric(NumericValues::list(vec![7]));
        assert!(a.same_kind(&b));
        assert!(!a.same_kind(&FeatureKind::Binary));
    }

    #[test]
    fn test_location_removal_matches_structurally() {
        let mut feature = Feature::binary("a", true);
        let range = FeatureSourceRange::new("main.c", None, None);
        feature.add_location(range.clone());
        assert_eq!(feature.locations().len(), 1);
        feature.remove_location(&range);
        assert!(feature.locations().is_empty());
    }
}
