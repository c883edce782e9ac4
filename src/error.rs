//! Error taxonomies for the feature-model core.
//!
//! Two closed enums: [`FeatureError`] for the model/transaction layer and
//! [`SolverError`] for the SMT translation layer. All fallible operations
//! surface one of these through their return value.

use smol_str::SmolStr;
use thiserror::Error;

/// Errors produced by the feature-model layer (graph, transactions,
/// parsers, builder facade).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    /// Transaction was aborted before commit.
    #[error("transaction aborted before commit")]
    Aborted,

    /// Name collision on add.
    #[error("feature `{0}` already present")]
    AlreadyPresent(SmolStr),

    /// Post-commit invariant violation. Carries the name of the violated
    /// consistency rule.
    #[error("feature model inconsistent: {0}")]
    Inconsistent(String),

    /// Reference to a name not in the model.
    #[error("unknown feature `{0}`")]
    MissingFeature(SmolStr),

    /// Parent required by a modification does not exist.
    #[error("missing parent `{0}`")]
    MissingParent(SmolStr),

    /// Operation needs a model but none is bound.
    #[error("no feature model bound")]
    MissingModel,

    /// Generic failure carrying a single-line diagnostic, used by the
    /// textual parsers.
    #[error("{0}")]
    Error(String),
}

impl FeatureError {
    /// Diagnostic constructor for parse failures.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }
}

/// Errors produced by the SMT translation and enumeration layer.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Optional path not yet wired in the translator.
    #[error("not implemented")]
    NotImplemented,

    /// Construct the translator intentionally rejects.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Solver reported unsatisfiable when the caller expected a model.
    #[error("the current model is unsatisfiable")]
    Unsat,

    /// Variable is already present in the solver.
    #[error("variable `{0}` already present")]
    AlreadyPresent(SmolStr),

    /// A constraint mentions a feature not yet bound in the solver.
    #[error("constraint references unbound variable `{0}`")]
    NotAllConstraintsProcessed(SmolStr),

    /// Parent feature of a feature is not present in the solver.
    #[error("parent of feature `{0}` is not present")]
    ParentNotPresent(SmolStr),

    /// Transport failure while talking to the external solver process.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
