use std::{fmt, sync::Arc};

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::{ast::Variable, error::runtime::RuntimeError, value::Value};

pub const VARIABLE_NAMESPACE: &str = "variable";
pub const QUERY_NAMESPACE: &str = "query";
pub const CONTEXT_NAMESPACE: &str = "context";

/// The host surface an expression reads from and writes to while it runs.
///
/// Namespaces arrive lowercased with aliases expanded, so `v.x` is seen as
/// `("variable", "x")`. `temp` variables never reach the environment.
pub trait Environment {
    fn resolve(&mut self, namespace: &str, name: &str) -> Result<Value, RuntimeError>;

    fn assign(&mut self, namespace: &str, name: &str, value: Value) -> Result<(), RuntimeError>;

    fn call(&mut self, namespace: &str, name: &str, args: &[Value]) -> Result<Value, RuntimeError>;

    fn this_value(&self) -> Value {
        Value::ZERO
    }
}

/// An environment with nothing in it. Reads yield `null`, writes are dropped
/// and every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {
    fn resolve(&mut self, _namespace: &str, _name: &str) -> Result<Value, RuntimeError> {
        Ok(Value::Null)
    }

    fn assign(&mut self, _namespace: &str, _name: &str, _value: Value) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn call(&mut self, namespace: &str, name: &str, _args: &[Value]) -> Result<Value, RuntimeError> {
        Err(RuntimeError::UnknownFunction(format!("{namespace}.{name}")))
    }
}

pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync>;

#[derive(Clone)]
struct HostFunction {
    parameters: usize,
    body: NativeFunction,
}

/// Reference [`Environment`] backed by hash maps.
///
/// Values set through [`Runtime::set_query`] are read-only for scripts.
/// Registered functions can also be read as plain values, in which case they
/// are called without arguments.
#[derive(Clone, Default)]
pub struct Runtime {
    values: FxHashMap<Variable, Value>,
    read_only: FxHashSet<Variable>,
    functions: FxHashMap<Variable, HostFunction>,
    this: Option<Value>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_variable(&mut self, name: impl Into<SmolStr>, value: impl Into<Value>) -> &mut Self {
        self.set_value(VARIABLE_NAMESPACE, name, value)
    }

    pub fn set_query(&mut self, name: impl Into<SmolStr>, value: impl Into<Value>) -> &mut Self {
        let variable = Variable::new(QUERY_NAMESPACE, name);
        self.read_only.insert(variable.clone());
        self.values.insert(variable, value.into());
        self
    }

    pub fn set_context(&mut self, name: impl Into<SmolStr>, value: impl Into<Value>) -> &mut Self {
        self.set_value(CONTEXT_NAMESPACE, name, value)
    }

    pub fn set_value(
        &mut self,
        namespace: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        value: impl Into<Value>,
    ) -> &mut Self {
        let variable = Variable::new(namespace, name);
        self.read_only.remove(&variable);
        self.values.insert(variable, value.into());
        self
    }

    /// Registers a host function that requires at least `parameters`
    /// arguments.
    pub fn register_function<F>(
        &mut self,
        namespace: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        parameters: usize,
        body: F,
    ) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    {
        self.functions.insert(
            Variable::new(namespace, name),
            HostFunction {
                parameters,
                body: Arc::new(body),
            },
        );
        self
    }

    pub fn set_this(&mut self, value: impl Into<Value>) -> &mut Self {
        self.this = Some(value.into());
        self
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<&Value> {
        self.values.get(&Variable::new(namespace, name))
    }

    fn invoke(&self, function: &Variable, args: &[Value]) -> Option<Result<Value, RuntimeError>> {
        let host = self.functions.get(function)?;

        if args.len() < host.parameters {
            return Some(Err(RuntimeError::MissingParameter {
                function: function.to_string(),
                expected: host.parameters,
                actual: args.len(),
            }));
        }

        Some((host.body)(args))
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("values", &self.values)
            .field("read_only", &self.read_only)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("this", &self.this)
            .finish()
    }
}

impl Environment for Runtime {
    fn resolve(&mut self, namespace: &str, name: &str) -> Result<Value, RuntimeError> {
        let variable = Variable::new(namespace, name);

        if let Some(value) = self.values.get(&variable) {
            return Ok(value.clone());
        }

        self.invoke(&variable, &[]).unwrap_or(Ok(Value::Null))
    }

    fn assign(&mut self, namespace: &str, name: &str, value: Value) -> Result<(), RuntimeError> {
        let variable = Variable::new(namespace, name);

        if self.read_only.contains(&variable) || self.functions.contains_key(&variable) {
            return Err(RuntimeError::ReadOnly(variable.to_string()));
        }

        self.values.insert(variable, value);
        Ok(())
    }

    fn call(&mut self, namespace: &str, name: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let function = Variable::new(namespace, name);

        match self.invoke(&function, args) {
            Some(result) => result,
            None => self
                .values
                .get(&function)
                .cloned()
                .ok_or_else(|| RuntimeError::UnknownFunction(function.to_string())),
        }
    }

    fn this_value(&self) -> Value {
        self.this.clone().unwrap_or(Value::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn runtime() -> Runtime {
        let mut runtime = Runtime::new();
        runtime
            .set_variable("a", Value::Float(1.0))
            .set_query("life_time", Value::Float(2.5))
            .set_context("owner", "steve")
            .register_function("query", "echo", 1, |args| Ok(args[0].clone()))
            .register_function("query", "seven", 0, |_| Ok(Value::Float(7.0)));
        runtime
    }

    #[rstest]
    #[case::variable("variable", "a", Value::Float(1.0))]
    #[case::query("query", "life_time", Value::Float(2.5))]
    #[case::context("context", "owner", Value::from("steve"))]
    #[case::missing("variable", "missing", Value::Null)]
    #[case::function_as_value("query", "seven", Value::Float(7.0))]
    fn test_resolve(mut runtime: Runtime, #[case] namespace: &str, #[case] name: &str, #[case] expected: Value) {
        assert_eq!(runtime.resolve(namespace, name), Ok(expected));
    }

    #[rstest]
    fn test_function_without_arguments_as_value(mut runtime: Runtime) {
        assert_eq!(
            runtime.resolve("query", "echo"),
            Err(RuntimeError::MissingParameter {
                function: "query.echo".to_string(),
                expected: 1,
                actual: 0,
            })
        );
    }

    #[rstest]
    fn test_call(mut runtime: Runtime) {
        assert_eq!(
            runtime.call("query", "echo", &[Value::from("hi")]),
            Ok(Value::from("hi"))
        );
        assert_eq!(
            runtime.call("query", "nope", &[]),
            Err(RuntimeError::UnknownFunction("query.nope".to_string()))
        );
        assert_eq!(runtime.call("variable", "a", &[]), Ok(Value::Float(1.0)));
    }

    #[rstest]
    fn test_assign(mut runtime: Runtime) {
        assert_eq!(runtime.assign("variable", "b", Value::Float(3.0)), Ok(()));
        assert_eq!(runtime.get("variable", "b"), Some(&Value::Float(3.0)));
        assert_eq!(
            runtime.assign("query", "life_time", Value::ZERO),
            Err(RuntimeError::ReadOnly("query.life_time".to_string()))
        );
        assert_eq!(
            runtime.assign("query", "seven", Value::ZERO),
            Err(RuntimeError::ReadOnly("query.seven".to_string()))
        );
    }

    #[rstest]
    fn test_this(mut runtime: Runtime) {
        assert_eq!(runtime.this_value(), Value::ZERO);
        runtime.set_this("block");
        assert_eq!(runtime.this_value(), Value::from("block"));
    }

    #[test]
    fn test_empty_environment() {
        let mut env = EmptyEnvironment;
        assert_eq!(env.resolve("variable", "x"), Ok(Value::Null));
        assert_eq!(env.assign("variable", "x", Value::ONE), Ok(()));
        assert_eq!(
            env.call("query", "f", &[]),
            Err(RuntimeError::UnknownFunction("query.f".to_string()))
        );
        assert_eq!(env.this_value(), Value::ZERO);
    }
}
