//! Lazy configuration enumeration over a primed solver.

use super::smt::SmtSolver;
use super::{Solver, SolverFactory};
use crate::configuration::Configuration;
use crate::error::SolverError;
use crate::model::FeatureModel;

/// Iterator yielding valid configurations by repeated blocking-clause
/// enumeration.
///
/// The order configurations arrive in is whatever the backend reports
/// after successive blocking clauses; it is stable for a fixed backend
/// build and input model, but not specified across backends. The
/// iterator fuses once the solver reports unsatisfiable; any other
/// solver error is yielded once and also ends the iteration.
pub struct ConfigurationIterator<S: Solver> {
    solver: S,
    exhausted: bool,
}

impl<S: Solver> ConfigurationIterator<S> {
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            exhausted: false,
        }
    }

    /// Hand the solver back, e.g. to reset enumeration.
    pub fn into_solver(self) -> S {
        self.solver
    }
}

impl<S: Solver> Iterator for ConfigurationIterator<S> {
    type Item = Result<Configuration, SolverError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        match self.solver.next_configuration() {
            Ok(configuration) => Some(Ok(configuration)),
            Err(SolverError::Unsat) => {
                self.exhausted = true;
                None
            }
            Err(error) => {
                self.exhausted = true;
                Some(Err(error))
            }
        }
    }
}

/// Convenience surface answering configuration-space questions about a
/// model.
pub struct ConfigurationFactory;

impl ConfigurationFactory {
    /// An iterator lazily traversing all configurations of `model`.
    pub fn config_iterator(
        model: &FeatureModel,
    ) -> Result<ConfigurationIterator<SmtSolver>, SolverError> {
        Ok(ConfigurationIterator::new(SolverFactory::initialize_solver(
            model,
        )?))
    }

    /// All valid configurations. May be infeasible for large models.
    pub fn all_configs(model: &FeatureModel) -> Result<Vec<Configuration>, SolverError> {
        SolverFactory::initialize_solver(model)?.all_configurations()
    }

    /// At most `n` configurations; fewer when the model has fewer.
    pub fn n_configs(model: &FeatureModel, n: usize) -> Result<Vec<Configuration>, SolverError> {
        let mut configurations = Vec::with_capacity(n);
        if n == 0 {
            return Ok(configurations);
        }
        for result in Self::config_iterator(model)? {
            configurations.push(result?);
            if configurations.len() == n {
                break;
            }
        }
        Ok(configurations)
    }

    /// Number of valid configurations (a #SAT call).
    pub fn count(model: &FeatureModel) -> Result<u64, SolverError> {
        SolverFactory::initialize_solver(model)?.count_configurations()
    }

    /// Whether the model has at least one valid configuration.
    pub fn is_valid(model: &FeatureModel) -> Result<bool, SolverError> {
        SolverFactory::initialize_solver(model)?.has_valid_configurations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A scripted fake standing in for the SMT backend.
    struct ScriptedSolver {
        remaining: Vec<Result<Configuration, SolverError>>,
    }

    impl Solver for ScriptedSolver {
        fn add_boolean_variable(&mut self, _name: &str) -> Result<(), SolverError> {
            Ok(())
        }

        fn add_integer_variable(&mut self, _name: &str, _values: &[i64]) -> Result<(), SolverError> {
            Ok(())
        }

        fn add_feature(
            &mut self,
            _model: &FeatureModel,
            _feature: crate::base::NodeId,
        ) -> Result<(), SolverError> {
            Ok(())
        }

        fn add_relationship(
            &mut self,
            _model: &FeatureModel,
            _relationship: crate::base::NodeId,
        ) -> Result<(), SolverError> {
            Ok(())
        }

        fn remove_feature(&mut self, _name: &str) -> Result<(), SolverError> {
            Err(SolverError::NotImplemented)
        }

        fn remove_constraint(
            &mut self,
            _constraint: &crate::constraint::Constraint,
        ) -> Result<(), SolverError> {
            Err(SolverError::NotImplemented)
        }

        fn add_constraint(
            &mut self,
            _constraint: &crate::constraint::Constraint,
        ) -> Result<(), SolverError> {
            Ok(())
        }

        fn add_mixed_constraint(
            &mut self,
            _constraint: &crate::constraint::Constraint,
            _expr_kind: crate::model::ExprKind,
            _req: crate::model::Req,
        ) -> Result<(), SolverError> {
            Ok(())
        }

        fn has_valid_configurations(&mut self) -> Result<bool, SolverError> {
            Ok(!self.remaining.is_empty())
        }

        fn count_configurations(&mut self) -> Result<u64, SolverError> {
            Ok(self.remaining.len() as u64)
        }

        fn current_configuration(&mut self) -> Result<Configuration, SolverError> {
            match self.remaining.first() {
                Some(Ok(configuration)) => Ok(configuration.clone()),
                _ => Err(SolverError::Unsat),
            }
        }

        fn next_configuration(&mut self) -> Result<Configuration, SolverError> {
            if self.remaining.is_empty() {
                return Err(SolverError::Unsat);
            }
            self.remaining.remove(0)
        }

        fn all_configurations(&mut self) -> Result<Vec<Configuration>, SolverError> {
            std::mem::take(&mut self.remaining).into_iter().collect()
        }

        fn reset_enumeration(&mut self) -> Result<(), SolverError> {
            Ok(())
        }
    }

    fn config(pairs: &[(&str, bool)]) -> Configuration {
        let mut configuration = Configuration::new();
        for (name, value) in pairs {
            configuration.set_option(*name, (*value).into());
        }
        configuration
    }

    #[test]
    fn test_iterator_fuses_on_unsat() {
        let solver = ScriptedSolver {
            remaining: vec![Ok(config(&[("a", true)])), Ok(config(&[("a", false)]))],
        };
        let mut iterator = ConfigurationIterator::new(solver);
        assert!(iterator.next().unwrap().is_ok());
        assert!(iterator.next().unwrap().is_ok());
        assert!(iterator.next().is_none());
        assert!(iterator.next().is_none());
    }

    #[test]
    fn test_iterator_yields_error_once() {
        let solver = ScriptedSolver {
            remaining: vec![
                Ok(config(&[("a", true)])),
                Err(SolverError::NotSupported("backend hiccup".to_owned())),
                Ok(config(&[("a", false)])),
            ],
        };
        let mut iterator = ConfigurationIterator::new(solver);
        assert!(iterator.next().unwrap().is_ok());
        assert!(matches!(
            iterator.next(),
            Some(Err(SolverError::NotSupported(_)))
        ));
        assert!(iterator.next().is_none());
    }
}
