//! Step functions for enumerating numeric feature domains.
//!
//! A step function is one of `add(k)`, `mul(k)`, or `pow` in either
//! operand order (`x op k` or `k op x`). Operand order matters for
//! exponentiation: `x ^ 2` and `2 ^ x` enumerate very different domains.

use logos::Logos;

use crate::error::FeatureError;

/// The operation a [`StepFunction`] applies per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOperation {
    Addition,
    Multiplication,
    Exponentiation,
}

impl StepOperation {
    fn symbol(self) -> &'static str {
        match self {
            Self::Addition => "+",
            Self::Multiplication => "*",
            Self::Exponentiation => "^",
        }
    }
}

/// A deterministic rule producing the next value of a numeric domain from
/// the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFunction {
    op: StepOperation,
    operand: f64,
    var_on_left: bool,
}

impl StepFunction {
    /// `x op k`: the variable is the left operand.
    pub fn new(op: StepOperation, operand: f64) -> Self {
        Self {
            op,
            operand,
            var_on_left: true,
        }
    }

    /// `k op x`: the variable is the right operand.
    pub fn with_leading_operand(operand: f64, op: StepOperation) -> Self {
        Self {
            op,
            operand,
            var_on_left: false,
        }
    }

    pub fn operation(&self) -> StepOperation {
        self.op
    }

    pub fn operand(&self) -> f64 {
        self.operand
    }

    /// The next value after `x`, in IEEE-754 arithmetic.
    pub fn next_f64(&self, x: f64) -> f64 {
        match (self.op, self.var_on_left) {
            (StepOperation::Addition, _) => x + self.operand,
            (StepOperation::Multiplication, _) => x * self.operand,
            (StepOperation::Exponentiation, true) => x.powf(self.operand),
            (StepOperation::Exponentiation, false) => self.operand.powf(x),
        }
    }

    /// The next value after `x` as an integer; `None` when the result is
    /// not finite or does not fit `i64`.
    pub fn next_i64(&self, x: i64) -> Option<i64> {
        let next = self.next_f64(x as f64);
        if !next.is_finite() || next < i64::MIN as f64 || next > i64::MAX as f64 {
            return None;
        }
        Some(next as i64)
    }

    /// Evaluate the function at `x`. Identical to
    /// [`next_f64`](Self::next_f64).
    pub fn eval_f64(&self, x: f64) -> f64 {
        self.next_f64(x)
    }
}

impl std::fmt::Display for StepFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // trailing ".0" adds nothing for whole operands
        let operand = if self.operand.fract() == 0.0 {
            format!("{}", self.operand as i64)
        } else {
            format!("{}", self.operand)
        };
        if self.var_on_left {
            write!(f, "x {} {operand}", self.op.symbol())
        } else {
            write!(f, "{operand} {} x", self.op.symbol())
        }
    }
}

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum StepToken {
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    Number,

    #[token("+")]
    Plus,
    #[token("*")]
    Star,
    #[token("^")]
    Caret,
}

/// Parser for the textual step-function form: `x + 2`, `2 * x`, `x ^ 2`,
/// `2 ^ x`. Exactly one identifier (the variable), one operator, and one
/// number are expected, in either operand order.
pub struct StepFunctionParser<'a> {
    input: &'a str,
}

impl<'a> StepFunctionParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }

    pub fn build_step_function(self) -> Result<StepFunction, FeatureError> {
        let mut op = None;
        let mut var_seen = false;
        let mut var_on_left = false;
        let mut operand = None;

        let mut lexer = StepToken::lexer(self.input);
        while let Some(result) = lexer.next() {
            match result {
                Ok(StepToken::Whitespace) => {}
                Ok(StepToken::Ident) => {
                    if var_seen {
                        return Err(FeatureError::parse(format!(
                            "Syntax error: Unexpected second identifier `{}`.",
                            lexer.slice()
                        )));
                    }
                    var_seen = true;
                    var_on_left = op.is_none();
                }
                Ok(StepToken::Number) => {
                    if operand.is_some() {
                        return Err(FeatureError::parse(format!(
                            "Syntax error: Unexpected second number `{}`.",
                            lexer.slice()
                        )));
                    }
                    let value: f64 = lexer.slice().parse().map_err(|_| {
                        FeatureError::parse(format!(
                            "Syntax error: Malformed number `{}`.",
                            lexer.slice()
                        ))
                    })?;
                    operand = Some(value);
                }
                Ok(token) => {
                    if op.is_some() {
                        return Err(FeatureError::parse(format!(
                            "Syntax error: Unexpected second operator `{}`.",
                            lexer.slice()
                        )));
                    }
                    op = Some(match token {
                        StepToken::Plus => StepOperation::Addition,
                        StepToken::Star => StepOperation::Multiplication,
                        StepToken::Caret => StepOperation::Exponentiation,
                        _ => unreachable!(),
                    });
                }
                Err(()) => {
                    return Err(FeatureError::parse(format!(
                        "Lexical error: Unexpected character `{}`.",
                        lexer.slice()
                    )));
                }
            }
        }

        match (var_seen, op, operand) {
            (true, Some(op), Some(operand)) => {
                if var_on_left {
                    Ok(StepFunction::new(op, operand))
                } else {
                    Ok(StepFunction::with_leading_operand(operand, op))
                }
            }
            _ => Err(FeatureError::parse(
                "Syntax error: Unrecognized step function.",
            )),
        }
    }
}
