//! The constraint sub-language: expression AST, visitor dispatch, logos
//! lexer, precedence-climbing parser, fluent builder, and step functions
//! for numeric-domain enumeration.

mod ast;
mod builder;
mod lexer;
mod parser;
mod step;
mod visitor;

pub use ast::{BinaryOp, Constraint, FeatureRef, UnaryOp};
pub use builder::ConstraintBuilder;
pub use lexer::{Token, TokenKind, tokenize};
pub use parser::ConstraintParser;
pub use step::{StepFunction, StepFunctionParser, StepOperation};
pub use visitor::{ConstraintVisitor, for_each_feature, for_each_feature_mut};
