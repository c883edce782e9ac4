//! The arena-backed feature-model graph.
//!
//! A [`FeatureModel`] owns every tree node and every top-level constraint.
//! Nodes live in slots addressed by [`NodeId`]; parent/child links are
//! handles, never owning references. Removed nodes leave a vacant slot so
//! surviving handles stay stable.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::feature::{Feature, Relationship, RelationshipKind, TreeNode};
use crate::base::NodeId;
use crate::constraint::{BinaryOp, Constraint, ConstraintVisitor, UnaryOp, for_each_feature_mut};
use crate::error::FeatureError;

/// Handle to a top-level constraint of a [`FeatureModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintId(u32);

impl ConstraintId {
    fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Whether a mixed constraint is asserted as written or negated at
/// encoding time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Pos,
    Neg,
}

/// Whether all binary features referenced by a mixed constraint must be
/// selected for the constraint to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Req {
    All,
    None,
}

/// Which of the model's three constraint lists an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintClass {
    Boolean,
    NonBoolean,
    Mixed { expr_kind: ExprKind, req: Req },
}

impl ConstraintClass {
    /// Classify a constraint by content: anything touching integers,
    /// arithmetic, or an ordering comparison is non-boolean. Mixed is
    /// never inferred; callers opt in explicitly.
    pub fn classify(constraint: &Constraint) -> Self {
        struct Classifier {
            non_boolean: bool,
        }

        impl ConstraintVisitor for Classifier {
            fn visit_integer(&mut self, _value: i64) {
                self.non_boolean = true;
            }

            fn visit_unary(&mut self, op: UnaryOp, operand: &Constraint) {
                if op == UnaryOp::Neg {
                    self.non_boolean = true;
                }
                self.visit(operand);
            }

            fn visit_binary(&mut self, op: BinaryOp, lhs: &Constraint, rhs: &Constraint) {
                if matches!(
                    op,
                    BinaryOp::Add
                        | BinaryOp::Sub
                        | BinaryOp::Mul
                        | BinaryOp::Div
                        | BinaryOp::Less
                        | BinaryOp::LessEqual
                        | BinaryOp::Greater
                        | BinaryOp::GreaterEqual
                ) {
                    self.non_boolean = true;
                }
                self.visit(lhs);
                self.visit(rhs);
            }
        }

        let mut classifier = Classifier { non_boolean: false };
        constraint.accept(&mut classifier);
        if classifier.non_boolean {
            Self::NonBoolean
        } else {
            Self::Boolean
        }
    }
}

/// A top-level constraint together with its list assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintEntry {
    expr: Constraint,
    class: ConstraintClass,
}

impl ConstraintEntry {
    pub fn new(expr: Constraint, class: ConstraintClass) -> Self {
        Self { expr, class }
    }

    pub fn expr(&self) -> &Constraint {
        &self.expr
    }

    pub fn class(&self) -> ConstraintClass {
        self.class
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    payload: TreeNode,
}

/// Tree-plus-constraint representation of a software product line.
#[derive(Debug, Clone, Default)]
pub struct FeatureModel {
    name: SmolStr,
    commit: Option<String>,
    path: PathBuf,
    root: Option<NodeId>,
    nodes: Vec<Option<Node>>,
    index: FxHashMap<SmolStr, NodeId>,
    constraints: Vec<ConstraintEntry>,
    /// Lazily computed iteration order; cleared by every mutation.
    order: RefCell<Option<Vec<NodeId>>>,
}

impl FeatureModel {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root_id(&self) -> Option<NodeId> {
        self.root
    }

    pub fn root(&self) -> Option<&Feature> {
        self.feature(self.root?)
    }

    /// Number of features in the model.
    pub fn size(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn set_name(&mut self, name: impl Into<SmolStr>) {
        self.name = name.into();
    }

    pub(crate) fn set_commit(&mut self, commit: impl Into<String>) {
        self.commit = Some(commit.into());
    }

    pub(crate) fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub(crate) fn set_root_id(&mut self, root: Option<NodeId>) {
        self.root = root;
        self.invalidate_order();
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get_feature_id(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    pub fn get_feature(&self, name: &str) -> Option<&Feature> {
        self.feature(self.get_feature_id(name)?)
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.node_ref(id).map(|node| &node.payload)
    }

    pub fn feature(&self, id: NodeId) -> Option<&Feature> {
        self.node(id)?.as_feature()
    }

    pub fn relationship(&self, id: NodeId) -> Option<&Relationship> {
        self.node(id)?.as_relationship()
    }

    pub(crate) fn feature_mut(&mut self, id: NodeId) -> Option<&mut Feature> {
        self.node_mut(id)?.payload.as_feature_mut()
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// All live node handles, features and relationships alike, in slot
    /// order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| NodeId::new(index))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node_ref(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node_ref(id)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    /// The nearest ancestor that is a feature, skipping a relationship
    /// group in between.
    pub fn parent_feature(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.parent(id)?;
        while self.feature(current).is_none() {
            current = self.parent(current)?;
        }
        Some(current)
    }

    /// Feature children of a node, looking through one relationship
    /// level.
    pub fn feature_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut features = Vec::new();
        for &child in self.children(id) {
            match self.node(child) {
                Some(TreeNode::Feature(_)) => features.push(child),
                Some(TreeNode::Relationship(_)) => {
                    features.extend(
                        self.children(child)
                            .iter()
                            .copied()
                            .filter(|&c| self.feature(c).is_some()),
                    );
                }
                None => {}
            }
        }
        features
    }

    /// The relationship group directly below a feature, if any.
    pub fn relationship_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.relationship(child).is_some())
    }

    /// The group this feature is a member of, if its parent is a
    /// relationship node.
    pub fn enclosing_group(&self, id: NodeId) -> Option<(NodeId, RelationshipKind)> {
        let parent = self.parent(id)?;
        let relationship = self.relationship(parent)?;
        Some((parent, relationship.kind()))
    }

    pub fn is_in_alternative_group(&self, id: NodeId) -> bool {
        matches!(
            self.enclosing_group(id),
            Some((_, RelationshipKind::Alternative))
        )
    }

    // =========================================================================
    // Ordered iteration
    // =========================================================================

    /// Feature handles in iteration order: depth-first, parent before
    /// children, case-insensitive lexicographic tiebreak among siblings.
    pub fn feature_order(&self) -> Vec<NodeId> {
        if let Some(order) = self.order.borrow().as_ref() {
            return order.clone();
        }
        let order = self.compute_order();
        *self.order.borrow_mut() = Some(order.clone());
        order
    }

    /// Features in iteration order.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.feature_order()
            .into_iter()
            .filter_map(|id| self.feature(id))
    }

    /// Relationship groups, in the iteration order of their parent
    /// features.
    pub fn relationship_ids(&self) -> Vec<NodeId> {
        self.feature_order()
            .into_iter()
            .filter_map(|id| self.relationship_child(id))
            .collect()
    }

    fn compute_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.index.len());
        if let Some(root) = self.root {
            self.dfs(root, &mut order);
        }
        // features detached from the root (possible mid-transaction) still
        // iterate, after the tree, sorted by name
        if order.len() < self.index.len() {
            let mut rest: Vec<NodeId> = self
                .index
                .values()
                .copied()
                .filter(|id| !order.contains(id))
                .collect();
            Self::sort_by_name(&mut rest, |id| self.feature(id).map(Feature::name));
            for id in rest {
                if !order.contains(&id) {
                    self.dfs(id, &mut order);
                }
            }
        }
        order
    }

    fn dfs(&self, id: NodeId, out: &mut Vec<NodeId>) {
        if out.contains(&id) {
            return;
        }
        out.push(id);
        let mut children = self.feature_children(id);
        Self::sort_by_name(&mut children, |child| {
            self.feature(child).map(Feature::name)
        });
        for child in children {
            self.dfs(child, out);
        }
    }

    fn sort_by_name<'a>(ids: &mut [NodeId], name_of: impl Fn(NodeId) -> Option<&'a str>) {
        ids.sort_by(|&a, &b| {
            let a = name_of(a).unwrap_or_default();
            let b = name_of(b).unwrap_or_default();
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });
    }

    pub(crate) fn invalidate_order(&self) {
        self.order.borrow_mut().take();
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintId, &ConstraintEntry)> {
        self.constraints
            .iter()
            .enumerate()
            .map(|(index, entry)| (ConstraintId::new(index), entry))
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&ConstraintEntry> {
        self.constraints.get(id.index())
    }

    /// Boolean constraints in insertion order.
    pub fn boolean_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|entry| entry.class == ConstraintClass::Boolean)
            .map(ConstraintEntry::expr)
    }

    /// Non-boolean (arithmetic) constraints in insertion order.
    pub fn non_boolean_constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints
            .iter()
            .filter(|entry| entry.class == ConstraintClass::NonBoolean)
            .map(ConstraintEntry::expr)
    }

    /// Mixed constraints with their encoding flags, in insertion order.
    pub fn mixed_constraints(&self) -> impl Iterator<Item = (&Constraint, ExprKind, Req)> {
        self.constraints.iter().filter_map(|entry| match entry.class {
            ConstraintClass::Mixed { expr_kind, req } => {
                Some((&entry.expr, expr_kind, req))
            }
            _ => None,
        })
    }

    pub(crate) fn add_constraint_entry(&mut self, entry: ConstraintEntry) -> ConstraintId {
        let id = ConstraintId::new(self.constraints.len());
        self.constraints.push(entry);
        id
    }

    /// Rebind every feature leaf of a constraint to this model's live
    /// features and register the constraint on each of them.
    pub(crate) fn bind_constraint(&mut self, id: ConstraintId) -> Result<(), FeatureError> {
        let mut expr = std::mem::replace(
            &mut self.constraints[id.index()].expr,
            Constraint::Integer(0),
        );
        let mut missing: Option<SmolStr> = None;
        let mut referenced = Vec::new();
        for_each_feature_mut(&mut expr, &mut |leaf| {
            if missing.is_some() {
                return;
            }
            match self.index.get(leaf.name()) {
                Some(&feature_id) => {
                    leaf.bind(feature_id);
                    referenced.push(feature_id);
                }
                None => missing = Some(SmolStr::new(leaf.name())),
            }
        });
        self.constraints[id.index()].expr = expr;
        if let Some(name) = missing {
            return Err(FeatureError::MissingFeature(name));
        }
        for feature_id in referenced {
            if let Some(feature) = self.feature_mut(feature_id) {
                feature.register_constraint(id);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Structural mutation (crate-internal; goes through transactions)
    // =========================================================================

    pub(crate) fn insert_feature(&mut self, feature: Feature) -> Result<NodeId, FeatureError> {
        if self.contains(feature.name()) {
            return Err(FeatureError::AlreadyPresent(feature.name_smol()));
        }
        if let Some(values) = feature.numeric_values() {
            values.validate()?;
        }
        let name = feature.name_smol();
        let id = self.insert_node(TreeNode::Feature(feature));
        self.index.insert(name, id);
        Ok(id)
    }

    pub(crate) fn insert_relationship(&mut self, relationship: Relationship) -> NodeId {
        self.insert_node(TreeNode::Relationship(relationship))
    }

    /// Detach and delete a node. Constraints mentioning a removed feature
    /// fall back to name references and await rebinding.
    pub(crate) fn remove_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(id.index()).and_then(Option::take) else {
            return;
        };
        if let TreeNode::Feature(feature) = &node.payload {
            self.index.remove(feature.name());
            for &constraint_id in feature.constraints() {
                self.unbind_feature_in_constraint(constraint_id, id);
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }
        self.invalidate_order();
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        if let Some(node) = self.node_mut(id) {
            node.parent = parent;
        }
        self.invalidate_order();
    }

    pub(crate) fn add_edge(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(parent) {
            if !node.children.contains(&child) {
                node.children.push(child);
            }
        }
        self.invalidate_order();
    }

    pub(crate) fn remove_edge(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|&existing| existing != child);
        }
        self.invalidate_order();
    }

    fn insert_node(&mut self, payload: TreeNode) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Some(Node {
            parent: None,
            children: Vec::new(),
            payload,
        }));
        self.invalidate_order();
        id
    }

    fn unbind_feature_in_constraint(&mut self, constraint_id: ConstraintId, feature: NodeId) {
        let Some(entry) = self.constraints.get_mut(constraint_id.index()) else {
            return;
        };
        for_each_feature_mut(&mut entry.expr, &mut |leaf| {
            if leaf.id() == Some(feature) {
                leaf.unbind();
            }
        });
    }

    fn node_ref(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())?.as_ref()
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())?.as_mut()
    }
}

/// Structural equality: same scalars, same features in the same iteration
/// order (kind, optionality, parent shape, locations), same constraint
/// printouts. Arena slot layout and caches are representation, not
/// meaning, and do not participate.
impl PartialEq for FeatureModel {
    fn eq(&self, other: &Self) -> bool {
        if self.name != other.name || self.commit != other.commit || self.path != other.path {
            return false;
        }
        let mine = self.feature_order();
        let theirs = other.feature_order();
        if mine.len() != theirs.len() {
            return false;
        }
        for (&a, &b) in mine.iter().zip(&theirs) {
            let (Some(fa), Some(fb)) = (self.feature(a), other.feature(b)) else {
                return false;
            };
            if fa != fb || self.parent_shape(a) != other.parent_shape(b) {
                return false;
            }
        }
        let mine: Vec<_> = self
            .constraints
            .iter()
            .map(|entry| (entry.expr.to_string(), entry.class))
            .collect();
        let theirs: Vec<_> = other
            .constraints
            .iter()
            .map(|entry| (entry.expr.to_string(), entry.class))
            .collect();
        mine == theirs
    }
}

impl FeatureModel {
    /// Parent description used by structural equality: the parent
    /// feature's name plus the enclosing group kind, if any.
    fn parent_shape(&self, id: NodeId) -> Option<(SmolStr, Option<RelationshipKind>)> {
        let parent = self.parent_feature(id)?;
        let name = self.feature(parent)?.name_smol();
        let group = self.enclosing_group(id).map(|(_, kind)| kind);
        Some((name, group))
    }
}
