//! # featurekit-base
//!
//! Core library for software-product-line feature models: constraint
//! parsing, transactional model editing, and SMT-based configuration
//! enumeration.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! solver        → SMT translation, blocking-clause enumeration
//!   ↓
//! model         → feature-model graph, consistency rules, transactions,
//!                 builder facade
//!   ↓
//! constraint    → AST + visitor, logos lexer, precedence-climbing
//!                 parser, fluent builder, step functions
//!   ↓
//! configuration → feature-to-value assignments, JSON round-trip
//!   ↓
//! base          → primitives (NodeId, Location, FeatureSourceRange)
//! ```

// ============================================================================
// MODULES (dependency order: base → configuration → constraint → model →
// solver)
// ============================================================================

/// Foundation types: arena handles, source locations and ranges
pub mod base;

/// Configurations and their JSON serialisation
pub mod configuration;

/// Constraint sub-language: AST, lexer, parser, builder, step functions
pub mod constraint;

/// Error taxonomies for the model and solver layers
pub mod error;

/// Feature-model graph, consistency checking, transactions, builder
pub mod model;

/// SMT translation and configuration enumeration
pub mod solver;

// Re-export the types most callers touch
pub use base::{FeatureSourceRange, Location, NodeId};
pub use configuration::{Configuration, ConfigurationValue};
pub use constraint::{Constraint, ConstraintBuilder, ConstraintParser, StepFunction};
pub use error::{FeatureError, SolverError};
pub use model::{
    CopyTransaction, Feature, FeatureModel, FeatureModelBuilder, ModifyTransaction,
    NumericValues, RelationshipKind,
};
pub use solver::{ConfigurationFactory, ConfigurationIterator, SmtSolver, Solver, SolverFactory};
