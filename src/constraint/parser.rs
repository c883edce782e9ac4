//! Precedence-climbing parser for the constraint mini-language.
//!
//! Grammar:
//!
//! ```text
//! expr    := unary (binop unary)*
//! unary   := ('!' | '~') unary | primary
//! primary := Identifier | Number | '(' expr ')'
//! ```
//!
//! Binding follows the operator precedence table; `->`, `excludes`, and
//! `<->` are right-associative, all other binary operators are
//! left-associative. Syntax errors produce a single-line diagnostic.

use super::ast::{BinaryOp, Constraint, UnaryOp};
use super::lexer::{Token, TokenKind, tokenize};
use crate::error::FeatureError;

/// The loosest precedence bound, admitting every binary operator.
const MAX_PRECEDENCE: u8 = 9;

/// Parser over a tokenized constraint string.
pub struct ConstraintParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ConstraintParser {
    pub fn new(input: &str) -> Self {
        Self {
            tokens: tokenize(input),
            pos: 0,
        }
    }

    /// Parse the input into a constraint tree.
    pub fn build_constraint(mut self) -> Result<Constraint, FeatureError> {
        let expr = self.parse_expr(MAX_PRECEDENCE)?;
        match self.peek().kind {
            TokenKind::Eof => Ok(expr),
            TokenKind::Error => Err(self.lexical_error()),
            _ => Err(FeatureError::parse(format!(
                "Syntax error: Unexpected token `{}`.",
                self.peek().text
            ))),
        }
    }

    fn parse_expr(&mut self, max_precedence: u8) -> Result<Constraint, FeatureError> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.peek_binary_op() {
            let precedence = op.precedence();
            if precedence > max_precedence {
                break;
            }
            self.advance();
            let rhs_bound = if op.is_right_associative() {
                precedence
            } else {
                precedence - 1
            };
            let rhs = self.parse_expr(rhs_bound)?;
            lhs = Constraint::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Constraint, FeatureError> {
        match self.peek().kind {
            TokenKind::Not => {
                self.advance();
                Ok(Constraint::unary(UnaryOp::Not, self.parse_unary()?))
            }
            TokenKind::Neg => {
                self.advance();
                Ok(Constraint::unary(UnaryOp::Neg, self.parse_unary()?))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Constraint, FeatureError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Identifier => {
                self.advance();
                Ok(Constraint::feature(token.text))
            }
            TokenKind::Number => {
                self.advance();
                let value: i64 = token.text.parse().map_err(|_| {
                    FeatureError::parse(format!(
                        "Syntax error: Integer literal `{}` out of range.",
                        token.text
                    ))
                })?;
                Ok(Constraint::Integer(value))
            }
            TokenKind::LPar => {
                self.advance();
                let expr = self.parse_expr(MAX_PRECEDENCE)?;
                if self.peek().kind != TokenKind::RPar {
                    return Err(FeatureError::parse(
                        "Syntax error: Missing closing parenthesis.",
                    ));
                }
                self.advance();
                Ok(expr)
            }
            TokenKind::Error => Err(self.lexical_error()),
            TokenKind::Eof => Err(FeatureError::parse(
                "Syntax error: Unexpected end of input.",
            )),
            _ => Err(FeatureError::parse(format!(
                "Syntax error: Unexpected token `{}`.",
                token.text
            ))),
        }
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        let op = match self.peek().kind {
            TokenKind::And => BinaryOp::And,
            TokenKind::Or => BinaryOp::Or,
            TokenKind::Xor => BinaryOp::Xor,
            TokenKind::Implies => BinaryOp::Implies,
            TokenKind::Excludes => BinaryOp::Excludes,
            TokenKind::Equivalent => BinaryOp::Equivalence,
            TokenKind::Equal => BinaryOp::Equal,
            TokenKind::NotEqual => BinaryOp::NotEqual,
            TokenKind::Less => BinaryOp::Less,
            TokenKind::LessEqual => BinaryOp::LessEqual,
            TokenKind::Greater => BinaryOp::Greater,
            TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            _ => return None,
        };
        Some(op)
    }

    /// The current non-whitespace token. The stream terminator is never
    /// consumed, so this is always in bounds.
    fn peek(&self) -> &Token {
        let mut pos = self.pos;
        while self.tokens[pos].kind == TokenKind::Whitespace {
            pos += 1;
        }
        &self.tokens[pos]
    }

    fn advance(&mut self) {
        while self.tokens[self.pos].kind == TokenKind::Whitespace {
            self.pos += 1;
        }
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn lexical_error(&self) -> FeatureError {
        FeatureError::parse(format!(
            "Lexical error: Unexpected character `{}`.",
            self.peek().text
        ))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn parse(input: &str) -> Constraint {
        ConstraintParser::new(input).build_constraint().unwrap()
    }

    #[rstest]
    #[case("A & B | C", "((A & B) | C)")]
    #[case("A | B & C", "(A | (B & C))")]
    #[case("A -> B -> C", "(A -> (B -> C))")]
    #[case("A + B + C", "((A + B) + C)")]
    #[case("A + B * C < 10", "((A + (B * C)) < 10)")]
    #[case("!A -> ~B + 1 = 2", "(!A -> ((~B + 1) = 2))")]
    #[case("A excludes B | C", "(A excludes (B | C))")]
    #[case("A <-> B -> C", "(A <-> (B -> C))")]
    #[case("(A | B) & C", "((A | B) & C)")]
    #[case("A ^ B | C", "((A ^ B) | C)")]
    #[case("a == b != c", "((a = b) != c)")]
    #[case("x / 2 >= 3", "((x / 2) >= 3)")]
    fn test_precedence_and_associativity(#[case] input: &str, #[case] printed: &str) {
        assert_eq!(parse(input).to_string(), printed);
    }

    #[test]
    fn test_whitespace_is_insignificant() {
        assert_eq!(
            parse("A->B").to_string(),
            parse("  A  ->\tB ").to_string()
        );
    }

    #[test]
    fn test_double_negation() {
        assert_eq!(parse("!!A").to_string(), "!!A");
        assert_eq!(parse("~~x + 1").to_string(), "(~~x + 1)");
    }

    #[test]
    fn test_roundtrip_via_display() {
        for input in [
            "((A + B) * C)",
            "(A -> (B excludes !C))",
            "((num < 3) <-> (F = 1))",
            "(~x = (0 - 5))",
        ] {
            let first = parse(input);
            let second = parse(&first.to_string());
            assert_eq!(first.to_string(), second.to_string());
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_unterminated_input_is_diagnosed() {
        let err = ConstraintParser::new("A &").build_constraint().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error: Unexpected end of input."
        );
    }

    #[test]
    fn test_missing_close_paren() {
        let err = ConstraintParser::new("(A | B").build_constraint().unwrap_err();
        assert_eq!(err.to_string(), "Syntax error: Missing closing parenthesis.");
    }

    #[test]
    fn test_lexical_error_reports_character() {
        let err = ConstraintParser::new("A @ B").build_constraint().unwrap_err();
        assert_eq!(err.to_string(), "Lexical error: Unexpected character `@`.");
    }

    #[test]
    fn test_trailing_operand_is_rejected() {
        let err = ConstraintParser::new("A B").build_constraint().unwrap_err();
        assert_eq!(err.to_string(), "Syntax error: Unexpected token `B`.");
    }
}
