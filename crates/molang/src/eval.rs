// Tree-walking evaluation of parsed MoLang programs.
// The compiled backend must agree with this interpreter on every program; it
// also evaluates constant subtrees during folding.
pub mod env;
pub(crate) mod scope;

use crate::{
    ast::{BinaryOp, Node},
    error::runtime::RuntimeError,
    value::Value,
};

use env::Environment;
use scope::{Scope, SlotTable, Unwind};

/// Evaluates a tree directly, without compiling it.
#[derive(Debug)]
pub struct Interpreter<'a> {
    root: &'a Node,
    slots: SlotTable,
}

impl<'a> Interpreter<'a> {
    pub fn new(root: &'a Node) -> Self {
        Self {
            root,
            slots: SlotTable::collect(root),
        }
    }

    /// Evaluates the root. A `return` anywhere ends evaluation with its value.
    pub fn evaluate(&self, env: &mut dyn Environment) -> Result<Value, RuntimeError> {
        finish(self.run(env))
    }

    /// Evaluates the root, leaving control flow that escaped it unresolved.
    pub(crate) fn run(&self, env: &mut dyn Environment) -> Result<Value, Unwind> {
        let mut scope = Scope::new(env, self.slots.len());
        self.eval(self.root, &mut scope)
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn eval(&self, node: &Node, scope: &mut Scope<'_>) -> Result<Value, Unwind> {
        match node {
            Node::Const(value) => Ok(value.clone()),
            Node::VariableGet(variable) if variable.is_temp() => Ok(self
                .slots
                .get(&variable.name)
                .map(|slot| scope.read_temp(slot))
                .unwrap_or_default()),
            Node::VariableGet(variable) => Ok(scope.read(variable)?),
            Node::VariableSet(variable, value) => {
                let value = self.eval(value, scope)?;
                if variable.is_temp() {
                    if let Some(slot) = self.slots.get(&variable.name) {
                        scope.write_temp(slot, value.clone())?;
                    }
                } else {
                    scope.write(variable, value.clone())?;
                }
                Ok(value)
            }
            Node::BinaryOp(op, left, right) => self.eval_binary_op(*op, left, right, scope),
            Node::UnaryOp(op, node) => Ok(op.apply(&self.eval(node, scope)?)),
            Node::Negate(node) => Ok(self.eval(node, scope)?.negate()),
            Node::BinaryConditional(cond, branch) => {
                if self.eval(cond, scope)?.as_bool() {
                    scope.scoped(|scope| self.eval(branch, scope))
                } else {
                    Ok(Value::ZERO)
                }
            }
            Node::Ternary(cond, left, right) => {
                let branch = if self.eval(cond, scope)?.as_bool() {
                    left
                } else {
                    right
                };
                scope.scoped(|scope| self.eval(branch, scope))
            }
            Node::Loop(iterations, body) => {
                let iterations = self.eval(iterations, scope)?.as_float() as i32;
                for _ in 0..iterations {
                    match scope.scoped(|scope| self.eval(body, scope)) {
                        Ok(_) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break) => break,
                        Err(unwind) => return Err(unwind),
                    }
                }
                Ok(Value::ZERO)
            }
            Node::Break => Err(Unwind::Break),
            Node::Continue => Err(Unwind::Continue),
            Node::Return(node) => {
                let value = self.eval(node, scope)?;
                Err(Unwind::Return(if node.has_value() { value } else { Value::ZERO }))
            }
            Node::Scope(node) => self.eval(node, scope),
            Node::Compound(statements) => {
                let mut last = Value::ZERO;
                for statement in statements {
                    last = self.eval(statement, scope)?;
                }
                Ok(last)
            }
            Node::FunctionCall(function, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(scope.call(function, &args)?)
            }
            Node::MathCall(op, args) => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg, scope).map(|value| value.as_float()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Float(op.apply(&args)))
            }
            Node::ArrayLiteral(elements) => {
                let elements = elements
                    .iter()
                    .map(|element| self.eval(element, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::from(elements))
            }
            Node::ArrayAccess(array, index) => {
                let array = self.eval(array, scope)?;
                let index = self.eval(index, scope)?;
                Ok(array.index(&index)?)
            }
            Node::This => Ok(scope.this_value()),
        }
    }

    fn eval_binary_op(
        &self,
        op: BinaryOp,
        left: &Node,
        right: &Node,
        scope: &mut Scope<'_>,
    ) -> Result<Value, Unwind> {
        let left = self.eval(left, scope)?;

        match op {
            BinaryOp::And if !left.as_bool() => Ok(Value::Boolean(false)),
            BinaryOp::Or if left.as_bool() => Ok(Value::Boolean(true)),
            BinaryOp::And | BinaryOp::Or => Ok(Value::Boolean(self.eval(right, scope)?.as_bool())),
            BinaryOp::NullCoalescing if !left.is_null() => Ok(left),
            BinaryOp::NullCoalescing => self.eval(right, scope),
            _ => Ok(op.apply(&left, &self.eval(right, scope)?)),
        }
    }
}

/// Turns the outcome of evaluating a root into its public result.
pub(crate) fn finish(result: Result<Value, Unwind>) -> Result<Value, RuntimeError> {
    match result {
        Ok(value) | Err(Unwind::Return(value)) => Ok(value),
        Err(Unwind::Break) => Err(RuntimeError::UnexpectedControlFlow("break")),
        Err(Unwind::Continue) => Err(RuntimeError::UnexpectedControlFlow("continue")),
        Err(Unwind::Error(err)) => Err(err),
    }
}
