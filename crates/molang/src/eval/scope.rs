use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use smol_str::SmolStr;
use tracing::trace;

use super::env::Environment;
use crate::{
    ast::{Node, Variable},
    error::runtime::RuntimeError,
    value::Value,
};

/// Non-local exits while evaluating a tree.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Unwind {
    Break,
    Continue,
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(err)
    }
}

/// Maps `temp` variable names to expression-local slots.
#[derive(Debug, Clone, Default)]
pub(crate) struct SlotTable {
    slots: FxHashMap<SmolStr, usize>,
}

impl SlotTable {
    /// Allocates a slot for every `temp` variable in the tree.
    pub fn collect(root: &Node) -> Self {
        let mut table = Self::default();
        let mut pending = vec![root];

        while let Some(node) = pending.pop() {
            match node {
                Node::VariableGet(variable) | Node::VariableSet(variable, _) if variable.is_temp() => {
                    table.slot(&variable.name);
                }
                _ => {}
            }
            pending.extend(node.children());
        }

        table
    }

    pub fn slot(&mut self, name: &SmolStr) -> usize {
        let next = self.slots.len();
        *self.slots.entry(name.clone()).or_insert(next)
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.slots.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Target {
    Temp(usize),
    Env(Variable),
}

type Layer = SmallVec<[(Target, Value); 4]>;

/// Per-evaluation variable state.
///
/// Temps live in slots owned by the scope. Writes made inside a branch or a
/// loop iteration are held in an overlay layer and only reach the enclosing
/// layer, or the environment, when that layer is committed.
pub(crate) struct Scope<'a> {
    env: &'a mut dyn Environment,
    temps: SmallVec<[Value; 8]>,
    layers: Vec<Layer>,
}

impl<'a> Scope<'a> {
    pub fn new(env: &'a mut dyn Environment, slots: usize) -> Self {
        Self {
            env,
            temps: SmallVec::from_elem(Value::Null, slots),
            layers: Vec::new(),
        }
    }

    fn overlay(&self, target: &Target) -> Option<&Value> {
        self.layers.iter().rev().find_map(|layer| {
            layer
                .iter()
                .find(|(written, _)| written == target)
                .map(|(_, value)| value)
        })
    }

    pub fn read_temp(&self, slot: usize) -> Value {
        self.overlay(&Target::Temp(slot))
            .or_else(|| self.temps.get(slot))
            .cloned()
            .unwrap_or_default()
    }

    pub fn read(&mut self, variable: &Variable) -> Result<Value, RuntimeError> {
        if !self.layers.is_empty() {
            if let Some(value) = self.overlay(&Target::Env(variable.clone())) {
                return Ok(value.clone());
            }
        }

        self.env.resolve(&variable.namespace, &variable.name)
    }

    pub fn write_temp(&mut self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        self.write_target(Target::Temp(slot), value)
    }

    pub fn write(&mut self, variable: &Variable, value: Value) -> Result<(), RuntimeError> {
        self.write_target(Target::Env(variable.clone()), value)
    }

    fn write_target(&mut self, target: Target, value: Value) -> Result<(), RuntimeError> {
        match self.layers.last_mut() {
            Some(layer) => {
                match layer.iter_mut().find(|(written, _)| *written == target) {
                    Some((_, slot)) => *slot = value,
                    None => layer.push((target, value)),
                }
                Ok(())
            }
            None => self.write_root(target, value),
        }
    }

    fn write_root(&mut self, target: Target, value: Value) -> Result<(), RuntimeError> {
        match target {
            Target::Temp(slot) => {
                if let Some(temp) = self.temps.get_mut(slot) {
                    *temp = value;
                }
                Ok(())
            }
            Target::Env(variable) => self.env.assign(&variable.namespace, &variable.name, value),
        }
    }

    pub fn call(&mut self, function: &Variable, args: &[Value]) -> Result<Value, RuntimeError> {
        self.env.call(&function.namespace, &function.name, args)
    }

    pub fn this_value(&self) -> Value {
        self.env.this_value()
    }

    /// Runs `f` inside a fresh overlay layer. The layer is committed unless
    /// `f` fails with an error; `break`, `continue` and `return` still commit.
    pub fn scoped<F>(&mut self, f: F) -> Result<Value, Unwind>
    where
        F: FnOnce(&mut Self) -> Result<Value, Unwind>,
    {
        self.layers.push(Layer::new());
        let result = f(self);
        let layer = self.layers.pop().unwrap_or_default();

        if matches!(result, Err(Unwind::Error(_))) {
            return result;
        }

        self.commit(layer)?;
        result
    }

    fn commit(&mut self, layer: Layer) -> Result<(), RuntimeError> {
        if layer.is_empty() {
            return Ok(());
        }

        trace!(writes = layer.len(), depth = self.layers.len(), "commit overlay");
        layer
            .into_iter()
            .try_for_each(|(target, value)| self.write_target(target, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::env::Runtime;
    use rstest::{fixture, rstest};

    #[fixture]
    fn runtime() -> Runtime {
        let mut runtime = Runtime::new();
        runtime.set_variable("x", Value::Float(1.0));
        runtime
    }

    fn x() -> Variable {
        Variable::new("variable", "x")
    }

    #[rstest]
    fn test_committed_layer(mut runtime: Runtime) {
        {
            let mut scope = Scope::new(&mut runtime, 1);
            let result = scope.scoped(|scope| {
                scope.write(&x(), Value::Float(5.0))?;
                scope.write_temp(0, Value::Float(2.0))?;
                assert_eq!(scope.read(&x()), Ok(Value::Float(5.0)));
                Ok(Value::ZERO)
            });
            assert_eq!(result, Ok(Value::ZERO));
            assert_eq!(scope.read_temp(0), Value::Float(2.0));
        }
        assert_eq!(runtime.get("variable", "x"), Some(&Value::Float(5.0)));
    }

    #[rstest]
    fn test_failed_layer_is_discarded(mut runtime: Runtime) {
        {
            let mut scope = Scope::new(&mut runtime, 1);
            let result = scope.scoped(|scope| {
                scope.write(&x(), Value::Float(5.0))?;
                scope.write_temp(0, Value::Float(2.0))?;
                Err(Unwind::Error(RuntimeError::EmptyArray))
            });
            assert_eq!(result, Err(Unwind::Error(RuntimeError::EmptyArray)));
            assert_eq!(scope.read_temp(0), Value::Null);
        }
        assert_eq!(runtime.get("variable", "x"), Some(&Value::Float(1.0)));
    }

    #[rstest]
    #[case::break_(Unwind::Break)]
    #[case::continue_(Unwind::Continue)]
    #[case::return_(Unwind::Return(Value::ONE))]
    fn test_control_flow_commits(mut runtime: Runtime, #[case] unwind: Unwind) {
        {
            let mut scope = Scope::new(&mut runtime, 0);
            let result = scope.scoped(|scope| {
                scope.write(&x(), Value::Float(9.0))?;
                Err(unwind.clone())
            });
            assert_eq!(result, Err(unwind));
        }
        assert_eq!(runtime.get("variable", "x"), Some(&Value::Float(9.0)));
    }

    #[rstest]
    fn test_nested_layers_commit_into_parent(mut runtime: Runtime) {
        {
            let mut scope = Scope::new(&mut runtime, 0);
            let _ = scope.scoped(|scope| {
                scope.scoped(|scope| {
                    scope.write(&x(), Value::Float(3.0))?;
                    Ok(Value::ZERO)
                })?;
                // Visible to the outer layer, not yet to the environment.
                assert_eq!(scope.read(&x()), Ok(Value::Float(3.0)));
                assert_eq!(scope.env.resolve("variable", "x"), Ok(Value::Float(1.0)));
                Ok(Value::ZERO)
            });
        }
        assert_eq!(runtime.get("variable", "x"), Some(&Value::Float(3.0)));
    }

    #[test]
    fn test_slot_table() {
        let node = Node::Compound(vec![
            Node::VariableSet(Variable::new("temp", "a"), Box::new(Node::Const(Value::ONE))),
            Node::VariableGet(Variable::new("temp", "b")),
            Node::VariableGet(Variable::new("temp", "a")),
            Node::VariableGet(Variable::new("variable", "c")),
        ]);
        let table = SlotTable::collect(&node);
        assert_eq!(table.len(), 2);
        assert!(table.get("a").is_some());
        assert!(table.get("b").is_some());
        assert_ne!(table.get("a"), table.get("b"));
        assert_eq!(table.get("c"), None);
    }
}
