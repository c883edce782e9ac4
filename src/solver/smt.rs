//! SMT translation over an external solver process.
//!
//! The translator keeps a single name-to-variable table and speaks
//! SMT-LIB through `easy-smt` to `z3 -smt2 -in model=true`. Encodings:
//!
//! - root feature: boolean variable, asserted true;
//! - binary feature `F` under parent `P`: `F => P`, plus `P => F` when
//!   `F` is mandatory and not an alternative-group member;
//! - numeric feature: integer variable restricted to its enumerated
//!   domain by a disjunction of equalities;
//! - alternative group: `P => (at-most-one(C...) and or(C...))`
//!   (at-most-one encoded pairwise); or group: `P => or(C...)`;
//! - constraints: structural fold mapping each AST operator to its SMT
//!   analogue; mixed constraints lift binary leaves via `ite(F, 1, 0)`
//!   and track the deselection disjunction.

use easy_smt::{Context, ContextBuilder, Response, SExpr, SExprData};
use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use super::Solver;
use crate::base::NodeId;
use crate::configuration::{Configuration, ConfigurationValue};
use crate::constraint::{BinaryOp, Constraint, StepFunction, StepOperation, UnaryOp};
use crate::error::SolverError;
use crate::model::{ExprKind, FeatureKind, FeatureModel, NumericValues, Req};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarSort {
    Bool,
    Int,
}

#[derive(Clone, Copy)]
struct Variable {
    expr: SExpr,
    sort: VarSort,
}

/// SMT solver backed by an external `z3` process.
pub struct SmtSolver {
    ctx: Context,
    variables: IndexMap<SmolStr, Variable>,
    enumerating: bool,
}

impl SmtSolver {
    /// Spawn the solver process. Fails when no `z3` binary is available.
    pub fn new() -> Result<Self, SolverError> {
        let ctx = ContextBuilder::new()
            .solver("z3")
            .solver_args(["-smt2", "-in", "model=true"])
            .build()?;
        Ok(Self {
            ctx,
            variables: IndexMap::new(),
            enumerating: false,
        })
    }

    // =========================================================================
    // S-expression helpers
    // =========================================================================

    fn app(&self, op: &str, args: impl IntoIterator<Item = SExpr>) -> SExpr {
        let mut list = vec![self.ctx.atom(op)];
        list.extend(args);
        self.ctx.list(list)
    }

    fn not(&self, expr: SExpr) -> SExpr {
        self.app("not", [expr])
    }

    fn implies(&self, lhs: SExpr, rhs: SExpr) -> SExpr {
        self.app("=>", [lhs, rhs])
    }

    fn int_literal(&self, value: i64) -> SExpr {
        if value < 0 {
            let magnitude = self.ctx.atom(&format!("{}", (value as i128).unsigned_abs()));
            self.app("-", [magnitude])
        } else {
            self.ctx.atom(&format!("{value}"))
        }
    }

    /// Disjunction without relying on variadic `or` for fewer than two
    /// operands.
    fn any(&self, mut exprs: Vec<SExpr>) -> SExpr {
        match exprs.len() {
            0 => self.ctx.atom("false"),
            1 => exprs.pop().expect("len checked"),
            _ => self.app("or", exprs),
        }
    }

    /// Conjunction, same discipline as [`any`](Self::any).
    fn all(&self, mut exprs: Vec<SExpr>) -> SExpr {
        match exprs.len() {
            0 => self.ctx.atom("true"),
            1 => exprs.pop().expect("len checked"),
            _ => self.app("and", exprs),
        }
    }

    fn variable(&self, name: &str) -> Result<Variable, SolverError> {
        self.variables
            .get(name)
            .copied()
            .ok_or_else(|| SolverError::NotAllConstraintsProcessed(SmolStr::new(name)))
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Fold a constraint tree into an SMT expression. In mixed mode,
    /// boolean feature leaves become `ite(F, 1, 0)` and their negated
    /// literals accumulate in `deselected`.
    fn encode(
        &self,
        constraint: &Constraint,
        mixed: bool,
        deselected: &mut Vec<SExpr>,
    ) -> Result<SExpr, SolverError> {
        match constraint {
            Constraint::Feature(leaf) => {
                let variable = self.variable(leaf.name())?;
                match variable.sort {
                    VarSort::Int => Ok(variable.expr),
                    VarSort::Bool if mixed => {
                        deselected.push(self.not(variable.expr));
                        Ok(self.app(
                            "ite",
                            [variable.expr, self.int_literal(1), self.int_literal(0)],
                        ))
                    }
                    VarSort::Bool => Ok(variable.expr),
                }
            }
            Constraint::Integer(value) => Ok(self.int_literal(*value)),
            Constraint::Unary { op, operand } => {
                let operand = self.encode(operand, mixed, deselected)?;
                Ok(match op {
                    UnaryOp::Not => self.not(operand),
                    UnaryOp::Neg => self.app("-", [operand]),
                })
            }
            Constraint::Binary { op, lhs, rhs } => {
                let lhs = self.encode(lhs, mixed, deselected)?;
                let rhs = self.encode(rhs, mixed, deselected)?;
                Ok(match op {
                    BinaryOp::And => self.app("and", [lhs, rhs]),
                    BinaryOp::Or => self.app("or", [lhs, rhs]),
                    BinaryOp::Xor => self.all(vec![
                        self.implies(lhs, self.not(rhs)),
                        self.implies(rhs, self.not(lhs)),
                    ]),
                    BinaryOp::Implies => self.implies(lhs, rhs),
                    BinaryOp::Excludes => self.implies(lhs, self.not(rhs)),
                    BinaryOp::Equivalence => self.all(vec![
                        self.implies(lhs, rhs),
                        self.implies(rhs, lhs),
                    ]),
                    BinaryOp::Equal => self.app("=", [lhs, rhs]),
                    BinaryOp::NotEqual => self.not(self.app("=", [lhs, rhs])),
                    BinaryOp::Less => self.app("<", [lhs, rhs]),
                    BinaryOp::LessEqual => self.app("<=", [lhs, rhs]),
                    BinaryOp::Greater => self.app(">", [lhs, rhs]),
                    BinaryOp::GreaterEqual => self.app(">=", [lhs, rhs]),
                    BinaryOp::Add => self.app("+", [lhs, rhs]),
                    BinaryOp::Sub => self.app("-", [lhs, rhs]),
                    BinaryOp::Mul => self.app("*", [lhs, rhs]),
                    BinaryOp::Div => self.app("div", [lhs, rhs]),
                })
            }
        }
    }

    /// Enumerate a numeric domain to a value list. Range domains iterate
    /// the step function from `min` while the value stays within `max`
    /// (inclusive); progress must be strictly monotone.
    fn domain_values(values: &NumericValues) -> Result<Vec<i64>, SolverError> {
        match values {
            NumericValues::List(list) => Ok(list.clone()),
            NumericValues::Range { min, max, step } => {
                let unit_step = StepFunction::new(StepOperation::Addition, 1.0);
                let step = step.as_ref().unwrap_or(&unit_step);
                let mut enumerated = Vec::new();
                let mut value = *min;
                while value <= *max {
                    enumerated.push(value);
                    let next = step.next_i64(value).ok_or_else(|| {
                        SolverError::NotSupported(format!(
                            "step function `{step}` overflows past {value}"
                        ))
                    })?;
                    if next <= value {
                        return Err(SolverError::NotSupported(format!(
                            "step function `{step}` does not make progress at {value}"
                        )));
                    }
                    value = next;
                }
                Ok(enumerated)
            }
        }
    }

    // =========================================================================
    // Model reading
    // =========================================================================

    /// Check satisfiability and snapshot every mapped variable's value.
    fn snapshot(&mut self) -> Result<Vec<(SmolStr, Variable, SExpr)>, SolverError> {
        match self.ctx.check()? {
            Response::Sat => {}
            Response::Unsat => return Err(SolverError::Unsat),
            Response::Unknown => {
                return Err(SolverError::NotSupported(
                    "solver returned unknown".to_owned(),
                ));
            }
        }
        if self.variables.is_empty() {
            return Ok(Vec::new());
        }
        let exprs: Vec<SExpr> = self.variables.values().map(|v| v.expr).collect();
        let values = self.ctx.get_value(exprs)?;
        Ok(self
            .variables
            .iter()
            .zip(values)
            .map(|((name, variable), (_, value))| (name.clone(), *variable, value))
            .collect())
    }

    fn decode(&self, value: SExpr) -> ConfigurationValue {
        match self.ctx.get(value) {
            SExprData::Atom("true") => ConfigurationValue::Bool(true),
            SExprData::Atom("false") => ConfigurationValue::Bool(false),
            SExprData::Atom(text) => text
                .parse::<i64>()
                .map(ConfigurationValue::Integer)
                .unwrap_or_else(|_| ConfigurationValue::Text(SmolStr::new(text))),
            SExprData::List(items) => {
                // negative integers arrive as `(- n)`
                if let [op, magnitude] = items {
                    if let (SExprData::Atom("-"), SExprData::Atom(digits)) =
                        (self.ctx.get(*op), self.ctx.get(*magnitude))
                    {
                        if let Ok(parsed) = digits.parse::<i64>() {
                            return ConfigurationValue::Integer(-parsed);
                        }
                    }
                }
                ConfigurationValue::Text(SmolStr::new(format!("{}", self.ctx.display(value))))
            }
            SExprData::String(text) => ConfigurationValue::Text(SmolStr::new(text)),
        }
    }

    fn configuration_from(&self, snapshot: &[(SmolStr, Variable, SExpr)]) -> Configuration {
        let mut configuration = Configuration::new();
        for (name, _, value) in snapshot {
            configuration.set_option(name.clone(), self.decode(*value));
        }
        configuration
    }

    /// Assert the blocking clause for a snapshot: flipped literals for
    /// booleans, disequalities for integers, or-ed together.
    fn block(&mut self, snapshot: &[(SmolStr, Variable, SExpr)]) -> Result<(), SolverError> {
        let mut literals = Vec::with_capacity(snapshot.len());
        for (_, variable, value) in snapshot {
            let literal = match variable.sort {
                VarSort::Bool => match self.ctx.get(*value) {
                    SExprData::Atom("true") => self.not(variable.expr),
                    _ => variable.expr,
                },
                VarSort::Int => self.not(self.app("=", [variable.expr, *value])),
            };
            literals.push(literal);
        }
        let clause = self.any(literals);
        self.ctx.assert(clause)?;
        Ok(())
    }

    fn declare(&mut self, name: &str, sort: VarSort) -> Result<SExpr, SolverError> {
        if self.variables.contains_key(name) {
            return Err(SolverError::AlreadyPresent(SmolStr::new(name)));
        }
        let sort_expr = match sort {
            VarSort::Bool => self.ctx.bool_sort(),
            VarSort::Int => self.ctx.int_sort(),
        };
        let expr = self.ctx.declare_const(name, sort_expr)?;
        self.variables
            .insert(SmolStr::new(name), Variable { expr, sort });
        Ok(expr)
    }
}

impl Solver for SmtSolver {
    fn add_boolean_variable(&mut self, name: &str) -> Result<(), SolverError> {
        self.declare(name, VarSort::Bool).map(drop)
    }

    fn add_integer_variable(&mut self, name: &str, values: &[i64]) -> Result<(), SolverError> {
        let expr = self.declare(name, VarSort::Int)?;
        let equalities = values
            .iter()
            .map(|&value| self.app("=", [expr, self.int_literal(value)]))
            .collect();
        let domain = self.any(equalities);
        self.ctx.assert(domain)?;
        Ok(())
    }

    fn add_feature(&mut self, model: &FeatureModel, feature: NodeId) -> Result<(), SolverError> {
        let payload = model
            .feature(feature)
            .ok_or_else(|| SolverError::NotSupported(format!("node {feature} is not a feature")))?;
        let parent = match model.parent_feature(feature) {
            Some(parent) => {
                let name = model
                    .feature(parent)
                    .map(|f| SmolStr::new(f.name()))
                    .unwrap_or_default();
                match self.variables.get(&name) {
                    Some(variable) => Some(variable.expr),
                    None => return Err(SolverError::ParentNotPresent(SmolStr::new(payload.name()))),
                }
            }
            None => None,
        };

        match payload.kind() {
            FeatureKind::Root => {
                let root = self.declare(payload.name(), VarSort::Bool)?;
                self.ctx.assert(root)?;
            }
            FeatureKind::Binary => {
                let variable = self.declare(payload.name(), VarSort::Bool)?;
                if let Some(parent) = parent {
                    let child_implies_parent = self.implies(variable, parent);
                    self.ctx.assert(child_implies_parent)?;
                    if !payload.is_optional() && !model.is_in_alternative_group(feature) {
                        let parent_implies_child = self.implies(parent, variable);
                        self.ctx.assert(parent_implies_child)?;
                    }
                }
            }
            FeatureKind::Numeric(values) => {
                let domain = Self::domain_values(values)?;
                self.add_integer_variable(payload.name(), &domain)?;
            }
        }
        debug!(feature = payload.name(), "added feature to solver");
        Ok(())
    }

    fn add_relationship(
        &mut self,
        model: &FeatureModel,
        relationship: NodeId,
    ) -> Result<(), SolverError> {
        let kind = model
            .relationship(relationship)
            .ok_or_else(|| {
                SolverError::NotSupported(format!("node {relationship} is not a relationship"))
            })?
            .kind();
        let parent = model
            .parent(relationship)
            .and_then(|parent| model.feature(parent))
            .ok_or_else(|| SolverError::ParentNotPresent(SmolStr::new("relationship")))?;
        let parent_var = self.variable(parent.name())?.expr;

        let mut members = Vec::new();
        for &child in model.children(relationship) {
            let name = model
                .feature(child)
                .map(|f| SmolStr::new(f.name()))
                .unwrap_or_default();
            members.push(self.variable(&name)?.expr);
        }

        let body = match kind {
            crate::model::RelationshipKind::Alternative => {
                let mut pairwise = Vec::new();
                for (index, &left) in members.iter().enumerate() {
                    for &right in &members[index + 1..] {
                        pairwise.push(self.not(self.app("and", [left, right])));
                    }
                }
                let at_most_one = self.all(pairwise);
                self.all(vec![at_most_one, self.any(members)])
            }
            crate::model::RelationshipKind::Or => self.any(members),
        };
        let group = self.implies(parent_var, body);
        self.ctx.assert(group)?;
        Ok(())
    }

    fn remove_feature(&mut self, _name: &str) -> Result<(), SolverError> {
        // assertions are not retractable over the plain SMT-LIB transport
        Err(SolverError::NotSupported(
            "removing features from a primed solver".to_owned(),
        ))
    }

    fn remove_constraint(&mut self, _constraint: &Constraint) -> Result<(), SolverError> {
        Err(SolverError::NotSupported(
            "removing constraints from a primed solver".to_owned(),
        ))
    }

    fn add_constraint(&mut self, constraint: &Constraint) -> Result<(), SolverError> {
        let mut deselected = Vec::new();
        let encoded = self.encode(constraint, false, &mut deselected)?;
        self.ctx.assert(encoded)?;
        Ok(())
    }

    fn add_mixed_constraint(
        &mut self,
        constraint: &Constraint,
        expr_kind: ExprKind,
        req: Req,
    ) -> Result<(), SolverError> {
        let mut deselected = Vec::new();
        let mut encoded = self.encode(constraint, true, &mut deselected)?;
        if expr_kind == ExprKind::Neg {
            encoded = self.not(encoded);
        }
        let assertion = match req {
            // fire only when every referenced binary is selected
            Req::All => {
                let some_deselected = self.any(deselected);
                self.app("or", [some_deselected, encoded])
            }
            Req::None => encoded,
        };
        self.ctx.assert(assertion)?;
        Ok(())
    }

    fn has_valid_configurations(&mut self) -> Result<bool, SolverError> {
        Ok(matches!(self.ctx.check()?, Response::Sat))
    }

    fn count_configurations(&mut self) -> Result<u64, SolverError> {
        self.ctx.push()?;
        let mut count = 0u64;
        loop {
            match self.snapshot() {
                Ok(snapshot) => {
                    if let Err(error) = self.block(&snapshot) {
                        self.ctx.pop()?;
                        return Err(error);
                    }
                    count += 1;
                }
                Err(SolverError::Unsat) => break,
                Err(error) => {
                    self.ctx.pop()?;
                    return Err(error);
                }
            }
        }
        self.ctx.pop()?;
        Ok(count)
    }

    fn current_configuration(&mut self) -> Result<Configuration, SolverError> {
        let snapshot = self.snapshot()?;
        Ok(self.configuration_from(&snapshot))
    }

    fn next_configuration(&mut self) -> Result<Configuration, SolverError> {
        if !self.enumerating {
            self.ctx.push()?;
            self.enumerating = true;
        }
        let snapshot = self.snapshot()?;
        let configuration = self.configuration_from(&snapshot);
        self.block(&snapshot)?;
        Ok(configuration)
    }

    fn all_configurations(&mut self) -> Result<Vec<Configuration>, SolverError> {
        self.ctx.push()?;
        let mut configurations = Vec::new();
        loop {
            match self.snapshot() {
                Ok(snapshot) => {
                    configurations.push(self.configuration_from(&snapshot));
                    if let Err(error) = self.block(&snapshot) {
                        self.ctx.pop()?;
                        return Err(error);
                    }
                }
                Err(SolverError::Unsat) => break,
                Err(error) => {
                    self.ctx.pop()?;
                    return Err(error);
                }
            }
        }
        self.ctx.pop()?;
        Ok(configurations)
    }

    fn reset_enumeration(&mut self) -> Result<(), SolverError> {
        if self.enumerating {
            self.ctx.pop()?;
            self.enumerating = false;
        }
        Ok(())
    }
}
