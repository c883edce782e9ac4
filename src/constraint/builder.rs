//! Fluent, precedence-aware construction of constraint trees.
//!
//! The builder accepts the same operator stream a parser would and
//! re-parents sub-expressions as operators of looser precedence arrive,
//! so `feature("A").add().feature("B").multiply().feature("C")` builds
//! `(A + (B * C))` while inserting [`group`](ConstraintBuilder::group)
//! after `B` builds `((A + B) * C)`.
//!
//! Syntax errors are sticky: the first misuse poisons the builder and
//! [`build`](ConstraintBuilder::build) reports it.

use smol_str::SmolStr;

use super::ast::{BinaryOp, Constraint, UnaryOp};
use crate::error::FeatureError;

#[derive(Debug)]
enum Frame {
    Unary(UnaryOp),
    Binary(BinaryOp),
    /// An explicit `open_par`, shielding everything beneath it from
    /// precedence re-parenting.
    Paren,
}

/// Builds a [`Constraint`] through chained operator calls.
#[derive(Debug, Default)]
pub struct ConstraintBuilder {
    operands: Vec<Constraint>,
    frames: Vec<Frame>,
    holes: usize,
    error: Option<String>,
}

impl ConstraintBuilder {
    pub fn new() -> Self {
        Self {
            operands: Vec::new(),
            frames: Vec::new(),
            holes: 1,
            error: None,
        }
    }

    /// Finish building.
    ///
    /// Fails if a syntax error occurred, a parenthesis is still open, the
    /// root slot is empty, or an operand hole is unfilled.
    pub fn build(mut self) -> Result<Constraint, FeatureError> {
        if let Some(message) = self.error {
            return Err(FeatureError::parse(message));
        }
        if self.holes > 0 || self.frames.iter().any(|f| matches!(f, Frame::Paren)) {
            return Err(FeatureError::parse("Syntax error: Incomplete constraint."));
        }
        while matches!(self.frames.last(), Some(Frame::Binary(_))) {
            Self::reduce_binary(&mut self.operands, &mut self.frames);
        }
        debug_assert_eq!(self.operands.len(), 1);
        self.operands
            .pop()
            .ok_or_else(|| FeatureError::parse("Syntax error: Incomplete constraint."))
    }

    /// Parenthesize the constraint built so far, closing every open
    /// precedence frame. Subsequent operators treat it as a single unit.
    pub fn group(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.holes > 0 || self.frames.iter().any(|f| matches!(f, Frame::Paren)) {
            return self.poison("Syntax error: Unrecognized parentheses.");
        }
        while matches!(self.frames.last(), Some(Frame::Binary(_))) {
            Self::reduce_binary(&mut self.operands, &mut self.frames);
        }
        self
    }

    /// Open an explicit parenthesis. Must be balanced by
    /// [`close_par`](Self::close_par) before [`build`](Self::build).
    pub fn open_par(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.holes == 0 {
            return self.poison("Syntax error: Unrecognized opening parenthesis.");
        }
        self.frames.push(Frame::Paren);
        self
    }

    /// Close the innermost open parenthesis.
    pub fn close_par(mut self) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.holes > 0 {
            return self.poison("Syntax error: Unrecognized closing parenthesis.");
        }
        while matches!(self.frames.last(), Some(Frame::Binary(_))) {
            Self::reduce_binary(&mut self.operands, &mut self.frames);
        }
        match self.frames.pop() {
            Some(Frame::Paren) => {
                self.operand_finished();
                self
            }
            _ => self.poison("Syntax error: Unrecognized closing parenthesis."),
        }
    }

    /// A primary feature leaf, by name.
    pub fn feature(mut self, name: impl Into<SmolStr>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.holes == 0 {
            return self.poison("Syntax error: Unrecognized feature constraint.");
        }
        self.holes -= 1;
        self.operands.push(Constraint::feature(name));
        self.operand_finished();
        self
    }

    /// A primary integer leaf.
    pub fn constant(mut self, value: i64) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.holes == 0 {
            return self.poison("Syntax error: Unrecognized constant constraint.");
        }
        self.holes -= 1;
        self.operands.push(Constraint::Integer(value));
        self.operand_finished();
        self
    }

    // logical

    pub fn l_not(self) -> Self {
        self.unary(UnaryOp::Not)
    }

    pub fn l_or(self) -> Self {
        self.binary(BinaryOp::Or)
    }

    pub fn l_xor(self) -> Self {
        self.binary(BinaryOp::Xor)
    }

    pub fn l_and(self) -> Self {
        self.binary(BinaryOp::And)
    }

    pub fn implies(self) -> Self {
        self.binary(BinaryOp::Implies)
    }

    pub fn excludes(self) -> Self {
        self.binary(BinaryOp::Excludes)
    }

    pub fn equivalent(self) -> Self {
        self.binary(BinaryOp::Equivalence)
    }

    // comparison

    pub fn equal(self) -> Self {
        self.binary(BinaryOp::Equal)
    }

    pub fn not_equal(self) -> Self {
        self.binary(BinaryOp::NotEqual)
    }

    pub fn less(self) -> Self {
        self.binary(BinaryOp::Less)
    }

    pub fn less_equal(self) -> Self {
        self.binary(BinaryOp::LessEqual)
    }

    pub fn greater(self) -> Self {
        self.binary(BinaryOp::Greater)
    }

    pub fn greater_equal(self) -> Self {
        self.binary(BinaryOp::GreaterEqual)
    }

    // arithmetic

    pub fn neg(self) -> Self {
        self.unary(UnaryOp::Neg)
    }

    pub fn add(self) -> Self {
        self.binary(BinaryOp::Add)
    }

    pub fn subtract(self) -> Self {
        self.binary(BinaryOp::Sub)
    }

    pub fn multiply(self) -> Self {
        self.binary(BinaryOp::Mul)
    }

    pub fn divide(self) -> Self {
        self.binary(BinaryOp::Div)
    }

    fn unary(mut self, op: UnaryOp) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.holes == 0 {
            return self.poison("Syntax error: Unrecognized unary constraint.");
        }
        self.frames.push(Frame::Unary(op));
        self
    }

    fn binary(mut self, op: BinaryOp) -> Self {
        if self.error.is_some() {
            return self;
        }
        if self.holes > 0 {
            return self.poison("Syntax error: Unrecognized binary constraint.");
        }
        let precedence = op.precedence();
        while let Some(Frame::Binary(top)) = self.frames.last() {
            let folds = if op.is_right_associative() {
                top.precedence() < precedence
            } else {
                top.precedence() <= precedence
            };
            if !folds {
                break;
            }
            Self::reduce_binary(&mut self.operands, &mut self.frames);
        }
        self.frames.push(Frame::Binary(op));
        self.holes += 1;
        self
    }

    /// An operand just completed; unary operators bind tightest, so they
    /// fold immediately.
    fn operand_finished(&mut self) {
        while let Some(Frame::Unary(op)) = self.frames.last() {
            let operand = self.operands.pop().expect("unary frame without operand");
            self.operands.push(Constraint::unary(*op, operand));
            self.frames.pop();
        }
    }

    fn reduce_binary(operands: &mut Vec<Constraint>, frames: &mut Vec<Frame>) {
        let Some(Frame::Binary(op)) = frames.pop() else {
            unreachable!("caller checked the top frame");
        };
        let rhs = operands.pop().expect("binary frame without rhs");
        let lhs = operands.pop().expect("binary frame without lhs");
        operands.push(Constraint::binary(op, lhs, rhs));
    }

    fn poison(mut self, message: &str) -> Self {
        self.error = Some(message.to_owned());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::ConstraintParser;

    #[test]
    fn test_precedence_reparenting() {
        let c = ConstraintBuilder::new()
            .feature("A")
            .add()
            .feature("B")
            .multiply()
            .feature("C")
            .build()
            .unwrap();
        assert_eq!(c.to_string(), "(A + (B * C))");
    }

    #[test]
    fn test_group_parenthesizes_intermediate() {
        let c = ConstraintBuilder::new()
            .feature("A")
            .add()
            .feature("B")
            .group()
            .multiply()
            .feature("C")
            .build()
            .unwrap();
        assert_eq!(c.to_string(), "((A + B) * C)");
    }

    #[test]
    fn test_open_close_par() {
        let c = ConstraintBuilder::new()
            .l_not()
            .open_par()
            .l_not()
            .feature("A")
            .implies()
            .feature("B")
            .close_par()
            .build()
            .unwrap();
        assert_eq!(c.to_string(), "!(!A -> B)");
    }

    #[test]
    fn test_unary_binds_tighter_than_binary() {
        let c = ConstraintBuilder::new()
            .l_not()
            .feature("A")
            .l_and()
            .feature("B")
            .build()
            .unwrap();
        assert_eq!(c.to_string(), "(!A & B)");
    }

    #[test]
    fn test_builder_matches_parser() {
        let built = ConstraintBuilder::new()
            .feature("A")
            .implies()
            .feature("B")
            .implies()
            .feature("C")
            .build()
            .unwrap();
        let parsed = ConstraintParser::new("A -> B -> C")
            .build_constraint()
            .unwrap();
        assert_eq!(built, parsed);
        assert_eq!(built.to_string(), parsed.to_string());
    }

    #[test]
    fn test_mixed_formula_matches_parser() {
        let built = ConstraintBuilder::new()
            .constant(2)
            .multiply()
            .feature("x")
            .less_equal()
            .constant(10)
            .l_and()
            .feature("F")
            .build()
            .unwrap();
        let parsed = ConstraintParser::new("2 * x <= 10 & F")
            .build_constraint()
            .unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_unbalanced_open_par_fails() {
        let err = ConstraintBuilder::new()
            .open_par()
            .feature("A")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Syntax error: Incomplete constraint.");
    }

    #[test]
    fn test_empty_builder_fails() {
        assert!(ConstraintBuilder::new().build().is_err());
    }

    #[test]
    fn test_unfilled_hole_fails() {
        let err = ConstraintBuilder::new()
            .feature("A")
            .l_and()
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Syntax error: Incomplete constraint.");
    }

    #[test]
    fn test_misplaced_operand_poisons() {
        let err = ConstraintBuilder::new()
            .feature("A")
            .feature("B")
            .build()
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error: Unrecognized feature constraint."
        );
    }

    #[test]
    fn test_misplaced_binary_poisons() {
        let err = ConstraintBuilder::new().l_and().build().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error: Unrecognized binary constraint."
        );
    }
}
