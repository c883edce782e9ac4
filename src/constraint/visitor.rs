//! Visitor dispatch over constraint trees.
//!
//! The default traversal recurses left-then-right on binary nodes, into
//! the operand on unary nodes, and does nothing on primaries. Override
//! the leaf hooks to collect or rewrite.

use super::ast::{BinaryOp, Constraint, FeatureRef, UnaryOp};

/// Read-only visitor over a [`Constraint`] tree.
pub trait ConstraintVisitor {
    fn visit(&mut self, constraint: &Constraint) {
        match constraint {
            Constraint::Feature(leaf) => self.visit_feature(leaf),
            Constraint::Integer(value) => self.visit_integer(*value),
            Constraint::Unary { op, operand } => self.visit_unary(*op, operand),
            Constraint::Binary { op, lhs, rhs } => self.visit_binary(*op, lhs, rhs),
        }
    }

    fn visit_binary(&mut self, _op: BinaryOp, lhs: &Constraint, rhs: &Constraint) {
        self.visit(lhs);
        self.visit(rhs);
    }

    fn visit_unary(&mut self, _op: UnaryOp, operand: &Constraint) {
        self.visit(operand);
    }

    fn visit_feature(&mut self, _leaf: &FeatureRef) {}

    fn visit_integer(&mut self, _value: i64) {}
}

/// Apply `f` to every feature leaf, left to right.
pub fn for_each_feature(constraint: &Constraint, f: &mut impl FnMut(&FeatureRef)) {
    match constraint {
        Constraint::Feature(leaf) => f(leaf),
        Constraint::Integer(_) => {}
        Constraint::Unary { operand, .. } => for_each_feature(operand, f),
        Constraint::Binary { lhs, rhs, .. } => {
            for_each_feature(lhs, f);
            for_each_feature(rhs, f);
        }
    }
}

/// Apply `f` to every feature leaf mutably, left to right. This is the
/// rebinding hook used when a constraint joins or leaves a model.
pub fn for_each_feature_mut(constraint: &mut Constraint, f: &mut impl FnMut(&mut FeatureRef)) {
    match constraint {
        Constraint::Feature(leaf) => f(leaf),
        Constraint::Integer(_) => {}
        Constraint::Unary { operand, .. } => for_each_feature_mut(operand, f),
        Constraint::Binary { lhs, rhs, .. } => {
            for_each_feature_mut(lhs, f);
            for_each_feature_mut(rhs, f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LeafCounter {
        features: usize,
        integers: usize,
    }

    impl ConstraintVisitor for LeafCounter {
        fn visit_feature(&mut self, _leaf: &FeatureRef) {
            self.features += 1;
        }

        fn visit_integer(&mut self, _value: i64) {
            self.integers += 1;
        }
    }

    #[test]
    fn test_default_traversal_reaches_all_leaves() {
        let c = Constraint::binary(
            BinaryOp::Equal,
            Constraint::binary(
                BinaryOp::Add,
                Constraint::feature("A"),
                Constraint::integer(1),
            ),
            Constraint::unary(UnaryOp::Neg, Constraint::feature("B")),
        );
        let mut counter = LeafCounter {
            features: 0,
            integers: 0,
        };
        counter.visit(&c);
        assert_eq!(counter.features, 2);
        assert_eq!(counter.integers, 1);
    }
}
