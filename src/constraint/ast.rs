//! Typed expression tree for cross-tree constraints.
//!
//! A [`Constraint`] is a tagged tree: primary leaves (a feature reference
//! or an integer literal), unary nodes (`!`, `~`), and binary nodes over
//! the boolean/comparison/arithmetic operator set. Rendering is fully
//! parenthesised infix, so structurally different trees never print alike.

use smol_str::SmolStr;

use crate::base::NodeId;

/// Unary operators. Both bind tighter than every binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Boolean negation `!`.
    Not,
    /// Arithmetic negation `~`.
    Neg,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "~",
        }
    }
}

/// Binary operators of the constraint language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    And,
    Or,
    Xor,
    Implies,
    Excludes,
    Equivalence,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Binding strength, 1 tightest through 8 loosest.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Mul | Self::Div => 1,
            Self::Add | Self::Sub => 2,
            Self::Less | Self::LessEqual | Self::Greater | Self::GreaterEqual => 3,
            Self::Equal | Self::NotEqual => 4,
            Self::And => 5,
            Self::Or | Self::Xor => 6,
            Self::Implies | Self::Excludes => 7,
            Self::Equivalence => 8,
        }
    }

    /// `->`, `excludes`, and `<->` chain to the right; everything else to
    /// the left.
    pub fn is_right_associative(self) -> bool {
        matches!(self, Self::Implies | Self::Excludes | Self::Equivalence)
    }

    /// The surface syntax of the operator, as the parser accepts it.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Implies => "->",
            Self::Excludes => "excludes",
            Self::Equivalence => "<->",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }
}

/// A reference to a feature from inside a constraint.
///
/// Constraints are built against feature *names*; adding the constraint to
/// a model rebinds every leaf to the live feature node. A bound reference
/// keeps the name so printing never needs the owning model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureRef {
    /// Unbound: names a feature that is expected to exist by the time the
    /// constraint joins a model.
    Name(SmolStr),
    /// Bound to a node of the owning model.
    Bound { id: NodeId, name: SmolStr },
}

impl FeatureRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Bound { name, .. } => name,
        }
    }

    /// The bound node, if binding has happened.
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Self::Name(_) => None,
            Self::Bound { id, .. } => Some(*id),
        }
    }

    pub(crate) fn bind(&mut self, id: NodeId) {
        let name = SmolStr::new(self.name());
        *self = Self::Bound { id, name };
    }

    pub(crate) fn unbind(&mut self) {
        if let Self::Bound { name, .. } = self {
            let name = name.clone();
            *self = Self::Name(name);
        }
    }
}

impl From<&str> for FeatureRef {
    fn from(name: &str) -> Self {
        Self::Name(SmolStr::new(name))
    }
}

impl From<SmolStr> for FeatureRef {
    fn from(name: SmolStr) -> Self {
        Self::Name(name)
    }
}

/// A constraint expression tree.
///
/// The two primary variants are the leaves; `Unary` and `Binary` own their
/// children exclusively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// Primary leaf: a feature reference.
    Feature(FeatureRef),
    /// Primary leaf: an integer literal.
    Integer(i64),
    Unary {
        op: UnaryOp,
        operand: Box<Constraint>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Constraint>,
        rhs: Box<Constraint>,
    },
}

impl Constraint {
    pub fn feature(name: impl Into<SmolStr>) -> Self {
        Self::Feature(FeatureRef::Name(name.into()))
    }

    pub fn integer(value: i64) -> Self {
        Self::Integer(value)
    }

    pub fn unary(op: UnaryOp, operand: Constraint) -> Self {
        Self::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Constraint, rhs: Constraint) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Dispatch a visitor over this tree. Equivalent to
    /// `visitor.visit(self)`.
    pub fn accept<V: super::ConstraintVisitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit(self);
    }

    /// Deep copy with every feature leaf reduced to its name, ready for
    /// rebinding into another model. A plain [`Clone`] preserves bindings
    /// and is only meaningful within the owning model (or its clones,
    /// which share arena layout).
    pub fn clone_unbound(&self) -> Self {
        let mut copy = self.clone();
        super::for_each_feature_mut(&mut copy, &mut |leaf| leaf.unbind());
        copy
    }

    /// Names of all features referenced by this constraint, in
    /// left-to-right order, duplicates preserved.
    pub fn referenced_features(&self) -> Vec<SmolStr> {
        let mut names = Vec::new();
        super::for_each_feature(self, &mut |leaf| names.push(SmolStr::new(leaf.name())));
        names
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Feature(leaf) => write!(f, "{}", leaf.name()),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Unary { op, operand } => write!(f, "{}{operand}", op.symbol()),
            Self::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_fully_parenthesized() {
        let c = Constraint::binary(
            BinaryOp::Implies,
            Constraint::feature("A"),
            Constraint::binary(
                BinaryOp::And,
                Constraint::feature("B"),
                Constraint::unary(UnaryOp::Not, Constraint::feature("C")),
            ),
        );
        assert_eq!(c.to_string(), "(A -> (B & !C))");
    }

    #[test]
    fn test_display_arithmetic() {
        let c = Constraint::binary(
            BinaryOp::Less,
            Constraint::binary(
                BinaryOp::Add,
                Constraint::feature("N"),
                Constraint::integer(2),
            ),
            Constraint::integer(10),
        );
        assert_eq!(c.to_string(), "((N + 2) < 10)");
    }

    #[test]
    fn test_clone_unbound_strips_bindings() {
        let mut c = Constraint::feature("A");
        if let Constraint::Feature(leaf) = &mut c {
            leaf.bind(crate::base::NodeId::new(7));
        }
        let copy = c.clone_unbound();
        assert_eq!(copy, Constraint::feature("A"));
        // the original keeps its binding
        if let Constraint::Feature(leaf) = &c {
            assert!(leaf.id().is_some());
        }
    }

    #[test]
    fn test_referenced_features_in_order() {
        let c = Constraint::binary(
            BinaryOp::Or,
            Constraint::feature("B"),
            Constraint::binary(
                BinaryOp::And,
                Constraint::feature("A"),
                Constraint::feature("B"),
            ),
        );
        assert_eq!(c.referenced_features(), vec!["B", "A", "B"]);
    }
}
