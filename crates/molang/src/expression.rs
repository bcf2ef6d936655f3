use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

use itertools::Itertools;
use smallvec::SmallVec;
use smol_str::SmolStr;
use tracing::warn;

use crate::{
    ast::Variable,
    compiler::compiled::CompiledProgram,
    error::runtime::RuntimeError,
    eval::env::Environment,
    value::Value,
};

/// An evaluation backend behind an [`Expression`].
pub trait CompiledExpression: Debug + Display + Send + Sync {
    fn evaluate(&self, env: &mut dyn Environment) -> Result<Value, RuntimeError>;

    /// The value of the expression if it never depends on the environment.
    fn constant_value(&self) -> Option<&Value> {
        None
    }

    /// Textual form used for equality and hashing. Backends without one
    /// compare by identity.
    fn canonical(&self) -> Option<&str> {
        None
    }
}

/// A compiled, immutable MoLang expression.
///
/// Cloning is cheap and handles can be evaluated from many threads at once.
/// Two handles are equal when their canonical renderings are equal.
#[derive(Clone)]
pub struct Expression(Arc<dyn CompiledExpression>);

impl Expression {
    pub fn new(expression: impl CompiledExpression + 'static) -> Self {
        Self(Arc::new(expression))
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let canonical = value.to_string();
        Self::new(ConstantExpression { value, canonical })
    }

    pub fn zero() -> Self {
        Self::constant(Value::ZERO)
    }

    pub fn null() -> Self {
        Self::constant(Value::Null)
    }

    /// Evaluates `f` every time the expression is evaluated.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::new(DynamicExpression(Box::new(f)))
    }

    /// Evaluates `f` the first time the expression is evaluated and returns
    /// that value from then on.
    pub fn lazy<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::new(LazyExpression {
            init: Box::new(f),
            value: OnceLock::new(),
        })
    }

    /// Calls a host function through the environment with the values of
    /// `args`.
    pub fn function(
        namespace: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        args: Vec<Expression>,
    ) -> Self {
        let function = Variable::new(namespace, name);
        let canonical = args
            .iter()
            .map(|arg| arg.canonical())
            .collect::<Option<Vec<_>>>()
            .map(|args| format!("{}({})", function, args.iter().join(", ")));

        Self::new(FunctionExpression {
            function,
            args,
            canonical,
        })
    }

    /// Evaluates every expression in order and returns the last value.
    pub fn compound(mut expressions: Vec<Expression>) -> Self {
        match expressions.len() {
            0 => Self::zero(),
            1 => expressions.remove(0),
            _ => {
                let canonical = expressions
                    .iter()
                    .map(|expression| expression.canonical())
                    .collect::<Option<Vec<_>>>()
                    .map(|parts| parts.iter().join("; "));
                Self::new(CompoundExpression {
                    expressions,
                    canonical,
                })
            }
        }
    }

    pub(crate) fn folded(value: Value, canonical: String) -> Self {
        Self::new(ConstantExpression { value, canonical })
    }

    pub(crate) fn compiled(program: CompiledProgram, canonical: String) -> Self {
        Self::new(ProgramExpression { program, canonical })
    }

    #[inline]
    pub fn evaluate(&self, env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        self.0.evaluate(env)
    }

    /// Evaluates the expression, logging any error and falling back to `0.0`.
    pub fn safe_resolve(&self, env: &mut dyn Environment) -> Value {
        self.evaluate(env).unwrap_or_else(|err| {
            warn!(expression = %self, error = %err, "failed to evaluate expression");
            Value::ZERO
        })
    }

    pub fn is_constant(&self) -> bool {
        self.0.constant_value().is_some()
    }

    pub fn constant_value(&self) -> Option<&Value> {
        self.0.constant_value()
    }

    pub fn canonical(&self) -> Option<&str> {
        self.0.canonical()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        match (self.canonical(), other.canonical()) {
            (Some(a), Some(b)) => a == b,
            _ => Arc::ptr_eq(&self.0, &other.0),
        }
    }
}

impl Eq for Expression {}

impl Hash for Expression {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.canonical() {
            Some(canonical) => canonical.hash(state),
            None => (Arc::as_ptr(&self.0) as *const () as usize).hash(state),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<Value> for Expression {
    fn from(value: Value) -> Self {
        Self::constant(value)
    }
}

#[derive(Debug)]
struct ConstantExpression {
    value: Value,
    canonical: String,
}

impl CompiledExpression for ConstantExpression {
    fn evaluate(&self, _env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        Ok(self.value.clone())
    }

    fn constant_value(&self) -> Option<&Value> {
        Some(&self.value)
    }

    fn canonical(&self) -> Option<&str> {
        Some(&self.canonical)
    }
}

impl Display for ConstantExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

#[derive(Debug)]
struct ProgramExpression {
    program: CompiledProgram,
    canonical: String,
}

impl CompiledExpression for ProgramExpression {
    #[inline]
    fn evaluate(&self, env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        self.program.run(env)
    }

    fn canonical(&self) -> Option<&str> {
        Some(&self.canonical)
    }
}

impl Display for ProgramExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

type Supplier = Box<dyn Fn() -> Value + Send + Sync>;

struct DynamicExpression(Supplier);

impl CompiledExpression for DynamicExpression {
    fn evaluate(&self, _env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        Ok((self.0)())
    }
}

impl Display for DynamicExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", (self.0)())
    }
}

impl Debug for DynamicExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("DynamicExpression")
    }
}

struct LazyExpression {
    init: Supplier,
    value: OnceLock<Value>,
}

impl LazyExpression {
    fn value(&self) -> &Value {
        self.value.get_or_init(|| (self.init)())
    }
}

impl CompiledExpression for LazyExpression {
    fn evaluate(&self, _env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        Ok(self.value().clone())
    }
}

impl Display for LazyExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl Debug for LazyExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyExpression")
            .field("value", &self.value.get())
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
struct FunctionExpression {
    function: Variable,
    args: Vec<Expression>,
    canonical: Option<String>,
}

impl CompiledExpression for FunctionExpression {
    fn evaluate(&self, env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        let args = self
            .args
            .iter()
            .map(|arg| arg.evaluate(env))
            .collect::<Result<SmallVec<[Value; 4]>, _>>()?;
        env.call(&self.function.namespace, &self.function.name, &args)
    }

    fn canonical(&self) -> Option<&str> {
        self.canonical.as_deref()
    }
}

impl Display for FunctionExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.function, self.args.iter().join(", "))
    }
}

#[derive(Debug)]
struct CompoundExpression {
    expressions: Vec<Expression>,
    canonical: Option<String>,
}

impl CompiledExpression for CompoundExpression {
    fn evaluate(&self, env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        let mut last = Value::ZERO;
        for expression in &self.expressions {
            last = expression.evaluate(env)?;
        }
        Ok(last)
    }

    fn canonical(&self) -> Option<&str> {
        self.canonical.as_deref()
    }
}

impl Display for CompoundExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expressions.iter().join("; "))
    }
}
