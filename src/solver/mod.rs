//! SMT translation and configuration enumeration.
//!
//! [`Solver`] abstracts the operations the feature-model core needs from
//! a backend; [`SmtSolver`] implements them over an external SMT process.
//! [`SolverFactory`] primes a solver from a validated model, and the
//! enumeration surface lives in [`ConfigurationFactory`] /
//! [`ConfigurationIterator`].

mod enumerate;
mod smt;

pub use enumerate::{ConfigurationFactory, ConfigurationIterator};
pub use smt::SmtSolver;

use tracing::debug;

use crate::base::NodeId;
use crate::configuration::Configuration;
use crate::constraint::Constraint;
use crate::error::SolverError;
use crate::model::{ExprKind, FeatureModel, Req};

/// Abstract solver operations over features, relationships, and
/// constraints.
pub trait Solver {
    /// Declare a fresh boolean variable with no constraints attached.
    fn add_boolean_variable(&mut self, name: &str) -> Result<(), SolverError>;

    /// Declare a fresh integer variable restricted to the given values.
    fn add_integer_variable(&mut self, name: &str, values: &[i64]) -> Result<(), SolverError>;

    /// Add a feature and its structural constraints. The feature's
    /// parent, if any, must already be known to the solver.
    fn add_feature(&mut self, model: &FeatureModel, feature: NodeId) -> Result<(), SolverError>;

    /// Add the group constraint of a relationship node.
    fn add_relationship(
        &mut self,
        model: &FeatureModel,
        relationship: NodeId,
    ) -> Result<(), SolverError>;

    /// Remove a feature and every constraint it participates in.
    /// Backends without retraction report an error.
    fn remove_feature(&mut self, name: &str) -> Result<(), SolverError>;

    /// Remove a previously added constraint. Backends without retraction
    /// report an error.
    fn remove_constraint(&mut self, constraint: &Constraint) -> Result<(), SolverError>;

    /// Add a boolean or arithmetic cross-tree constraint. Every feature
    /// the constraint mentions must already be a solver variable.
    fn add_constraint(&mut self, constraint: &Constraint) -> Result<(), SolverError>;

    /// Add a mixed boolean/arithmetic constraint, lifting selected binary
    /// features to `1` and deselected ones to `0`.
    fn add_mixed_constraint(
        &mut self,
        constraint: &Constraint,
        expr_kind: ExprKind,
        req: Req,
    ) -> Result<(), SolverError>;

    /// Whether the current constraint system has at least one valid
    /// configuration.
    fn has_valid_configurations(&mut self) -> Result<bool, SolverError>;

    /// Number of valid configurations; a #SAT call by enumeration.
    fn count_configurations(&mut self) -> Result<u64, SolverError>;

    /// The configuration the solver currently reports, without advancing.
    fn current_configuration(&mut self) -> Result<Configuration, SolverError>;

    /// The next configuration; a blocking clause excludes it from
    /// subsequent calls. [`SolverError::Unsat`] signals exhaustion.
    fn next_configuration(&mut self) -> Result<Configuration, SolverError>;

    /// All valid configurations, leaving the solver state untouched.
    fn all_configurations(&mut self) -> Result<Vec<Configuration>, SolverError>;

    /// Discard the blocking clauses accumulated by
    /// [`next_configuration`](Self::next_configuration).
    fn reset_enumeration(&mut self) -> Result<(), SolverError>;
}

/// Primes solvers from validated feature models.
pub struct SolverFactory;

impl SolverFactory {
    /// Translate a model into a freshly created [`SmtSolver`].
    ///
    /// Features are added in model iteration order, so parents always
    /// precede their children; relationship groups and the three
    /// constraint lists follow.
    pub fn initialize_solver(model: &FeatureModel) -> Result<SmtSolver, SolverError> {
        let mut solver = SmtSolver::new()?;
        debug!(model = model.name(), features = model.size(), "priming solver");
        for feature in model.feature_order() {
            solver.add_feature(model, feature)?;
        }
        for relationship in model.relationship_ids() {
            solver.add_relationship(model, relationship)?;
        }
        for constraint in model.boolean_constraints() {
            solver.add_constraint(constraint)?;
        }
        for constraint in model.non_boolean_constraints() {
            solver.add_constraint(constraint)?;
        }
        for (constraint, expr_kind, req) in model.mixed_constraints() {
            solver.add_mixed_constraint(constraint, expr_kind, req)?;
        }
        Ok(solver)
    }
}
