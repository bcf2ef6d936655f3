use std::fmt::{self, Display, Formatter};

use itertools::Itertools;
use smallvec::{SmallVec, smallvec};
use smol_str::SmolStr;

use crate::{math::MathOperation, value::Value};

pub const TEMP_NAMESPACE: &str = "temp";

/// A resolved `namespace.name` reference. Namespace aliases such as `t` or
/// `v` are already expanded.
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct Variable {
    pub namespace: SmolStr,
    pub name: SmolStr,
}

impl Variable {
    pub fn new(namespace: impl Into<SmolStr>, name: impl Into<SmolStr>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[inline(always)]
    pub fn is_temp(&self) -> bool {
        self.namespace == TEMP_NAMESPACE
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    And,
    Or,
    Less,
    LessEquals,
    Greater,
    GreaterEquals,
    Equals,
    NotEquals,
    NullCoalescing,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Less => "<",
            BinaryOp::LessEquals => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEquals => ">=",
            BinaryOp::Equals => "==",
            BinaryOp::NotEquals => "!=",
            BinaryOp::NullCoalescing => "??",
        }
    }

    /// Operators whose right operand is only evaluated depending on the left.
    #[inline(always)]
    pub fn is_lazy(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::NullCoalescing)
    }

    /// Applies the operator to two already evaluated operands.
    pub fn apply(&self, left: &Value, right: &Value) -> Value {
        match self {
            BinaryOp::Add => left.add(right),
            BinaryOp::Subtract => left.subtract(right),
            BinaryOp::Multiply => left.multiply(right),
            BinaryOp::Divide => left.divide(right),
            BinaryOp::And => Value::Boolean(left.as_bool() && right.as_bool()),
            BinaryOp::Or => Value::Boolean(left.as_bool() || right.as_bool()),
            BinaryOp::Less => left.less(right),
            BinaryOp::LessEquals => left.less_equals(right),
            BinaryOp::Greater => left.greater(right),
            BinaryOp::GreaterEquals => left.greater_equals(right),
            BinaryOp::Equals => left.equals(right),
            BinaryOp::NotEquals => left.not_equals(right),
            BinaryOp::NullCoalescing => {
                if left.is_null() {
                    right.clone()
                } else {
                    left.clone()
                }
            }
        }
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.symbol())
    }
}

#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum UnaryOp {
    Flip,
}

impl UnaryOp {
    pub fn apply(&self, value: &Value) -> Value {
        match self {
            UnaryOp::Flip => value.flip(),
        }
    }
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            UnaryOp::Flip => write!(f, "!"),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Node {
    Const(Value),
    VariableGet(Variable),
    VariableSet(Variable, Box<Node>),
    BinaryOp(BinaryOp, Box<Node>, Box<Node>),
    UnaryOp(UnaryOp, Box<Node>),
    Negate(Box<Node>),
    /// `cond ? branch` without an else branch.
    BinaryConditional(Box<Node>, Box<Node>),
    Ternary(Box<Node>, Box<Node>, Box<Node>),
    /// `loop(iterations, body)`
    Loop(Box<Node>, Box<Node>),
    Break,
    Continue,
    Return(Box<Node>),
    Scope(Box<Node>),
    Compound(Vec<Node>),
    FunctionCall(Variable, Vec<Node>),
    MathCall(MathOperation, Vec<Node>),
    ArrayLiteral(Vec<Node>),
    ArrayAccess(Box<Node>, Box<Node>),
    This,
}

impl Node {
    pub fn binary(op: BinaryOp, left: Node, right: Node) -> Self {
        Node::BinaryOp(op, Box::new(left), Box::new(right))
    }

    pub fn children(&self) -> SmallVec<[&Node; 3]> {
        match self {
            Node::Const(_) | Node::VariableGet(_) | Node::Break | Node::Continue | Node::This => {
                SmallVec::new()
            }
            Node::VariableSet(_, node)
            | Node::UnaryOp(_, node)
            | Node::Negate(node)
            | Node::Return(node)
            | Node::Scope(node) => smallvec![node.as_ref()],
            Node::BinaryOp(_, left, right)
            | Node::BinaryConditional(left, right)
            | Node::Loop(left, right)
            | Node::ArrayAccess(left, right) => smallvec![left.as_ref(), right.as_ref()],
            Node::Ternary(cond, left, right) => smallvec![cond.as_ref(), left.as_ref(), right.as_ref()],
            Node::Compound(nodes)
            | Node::FunctionCall(_, nodes)
            | Node::MathCall(_, nodes)
            | Node::ArrayLiteral(nodes) => nodes.iter().collect(),
        }
    }

    /// Whether the node can be evaluated once, without an environment, with
    /// the same result every time.
    pub fn is_constant(&self) -> bool {
        match self {
            Node::Const(_) => true,
            Node::VariableGet(_) | Node::VariableSet(_, _) => false,
            Node::BinaryOp(BinaryOp::NullCoalescing, left, _) => left.is_constant(),
            Node::BinaryOp(_, left, right) => left.is_constant() && right.is_constant(),
            Node::UnaryOp(_, node) | Node::Negate(node) | Node::Scope(node) | Node::Return(node) => {
                node.is_constant()
            }
            Node::BinaryConditional(cond, branch) => cond.is_constant() && branch.is_constant(),
            Node::Ternary(cond, left, right) => {
                cond.is_constant() && left.is_constant() && right.is_constant()
            }
            Node::Loop(_, _) | Node::Break | Node::Continue => false,
            Node::Compound(statements) => statements.iter().all(Node::is_constant),
            Node::FunctionCall(_, _) | Node::This => false,
            Node::MathCall(op, args) => op.is_deterministic() && args.iter().all(Node::is_constant),
            Node::ArrayLiteral(elements) => elements.iter().all(Node::is_constant),
            Node::ArrayAccess(array, index) => array.is_constant() && index.is_constant(),
        }
    }

    /// Whether evaluating the node produces a meaningful value. Statements
    /// such as `return` or `break` do not.
    pub fn has_value(&self) -> bool {
        match self {
            Node::Return(_)
            | Node::Break
            | Node::Continue
            | Node::BinaryConditional(_, _)
            | Node::Loop(_, _) => false,
            Node::Ternary(_, left, right) => left.has_value() && right.has_value(),
            Node::Scope(inner) => inner.has_value(),
            Node::Compound(statements) => statements.last().is_some_and(Node::has_value),
            _ => true,
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Node::Const(value) => write!(f, "{}", value),
            Node::VariableGet(variable) => write!(f, "{}", variable),
            Node::VariableSet(variable, value) => write!(f, "{} = {}", variable, value),
            Node::BinaryOp(op, left, right) => write!(f, "({} {} {})", left, op, right),
            Node::UnaryOp(op, node) => write!(f, "{}{}", op, node),
            Node::Negate(node) => write!(f, "-{}", node),
            Node::BinaryConditional(cond, branch) => write!(f, "{} ? {}", cond, branch),
            Node::Ternary(cond, left, right) => write!(f, "{} ? {} : {}", cond, left, right),
            Node::Loop(iterations, body) => write!(f, "loop({}, {{{}}})", iterations, body),
            Node::Break => write!(f, "break"),
            Node::Continue => write!(f, "continue"),
            Node::Return(node) => write!(f, "return {}", node),
            Node::Scope(node) => write!(f, "{{{}}}", node),
            Node::Compound(statements) => write!(f, "{}", statements.iter().join("; ")),
            Node::FunctionCall(function, args) => {
                write!(f, "{}({})", function, args.iter().join(", "))
            }
            Node::MathCall(op, _) if op.arity() == 0 => write!(f, "math.{}", op.name()),
            Node::MathCall(op, args) => write!(f, "math.{}({})", op.name(), args.iter().join(", ")),
            Node::ArrayLiteral(elements) => write!(f, "[{}]", elements.iter().join(", ")),
            Node::ArrayAccess(array, index) => write!(f, "{}[{}]", array, index),
            Node::This => write!(f, "this"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn num(value: f32) -> Node {
        Node::Const(Value::Float(value))
    }

    fn var(namespace: &str, name: &str) -> Node {
        Node::VariableGet(Variable::new(namespace, name))
    }

    #[rstest]
    #[case::literal(num(1.0), true)]
    #[case::variable(var("variable", "x"), false)]
    #[case::arithmetic(Node::binary(BinaryOp::Add, num(1.0), num(2.0)), true)]
    #[case::arithmetic_with_variable(Node::binary(BinaryOp::Add, num(1.0), var("query", "x")), false)]
    #[case::null_coalescing(Node::binary(BinaryOp::NullCoalescing, num(1.0), var("query", "x")), true)]
    #[case::deterministic_math(Node::MathCall(MathOperation::Sqrt, vec![num(4.0)]), true)]
    #[case::random_math(Node::MathCall(MathOperation::Random, vec![num(0.0), num(1.0)]), false)]
    #[case::loop_(Node::Loop(Box::new(num(2.0)), Box::new(num(1.0))), false)]
    #[case::this(Node::This, false)]
    #[case::array(Node::ArrayLiteral(vec![num(1.0), num(2.0)]), true)]
    #[case::compound(Node::Compound(vec![num(1.0), Node::Return(Box::new(num(2.0)))]), true)]
    fn test_is_constant(#[case] node: Node, #[case] expected: bool) {
        assert_eq!(node.is_constant(), expected);
    }

    #[rstest]
    #[case::literal(num(1.0), true)]
    #[case::return_(Node::Return(Box::new(num(1.0))), false)]
    #[case::break_(Node::Break, false)]
    #[case::conditional(Node::BinaryConditional(Box::new(num(1.0)), Box::new(num(2.0))), false)]
    #[case::ternary(Node::Ternary(Box::new(num(1.0)), Box::new(num(2.0)), Box::new(num(3.0))), true)]
    #[case::ternary_without_value(
        Node::Ternary(Box::new(num(1.0)), Box::new(Node::Break), Box::new(num(3.0))),
        false
    )]
    #[case::empty_compound(Node::Compound(vec![]), false)]
    #[case::assignment(Node::VariableSet(Variable::new("variable", "x"), Box::new(num(1.0))), true)]
    fn test_has_value(#[case] node: Node, #[case] expected: bool) {
        assert_eq!(node.has_value(), expected);
    }

    #[rstest]
    #[case::binary(Node::binary(BinaryOp::Add, num(1.0), var("query", "x")), "(1.0 + query.x)")]
    #[case::string(Node::Const(Value::from("a")), "\"a\"")]
    #[case::math(Node::MathCall(MathOperation::Pow, vec![num(2.0), num(3.0)]), "math.pow(2.0, 3.0)")]
    #[case::math_constant(Node::MathCall(MathOperation::Pi, vec![]), "math.pi")]
    #[case::ternary(
        Node::Ternary(Box::new(var("variable", "a")), Box::new(num(1.0)), Box::new(num(2.0))),
        "variable.a ? 1.0 : 2.0"
    )]
    #[case::loop_(
        Node::Loop(Box::new(num(2.0)), Box::new(Node::Break)),
        "loop(2.0, {break})"
    )]
    #[case::access(
        Node::ArrayAccess(Box::new(Node::ArrayLiteral(vec![num(1.0)])), Box::new(num(0.0))),
        "[1.0][0.0]"
    )]
    #[case::compound(
        Node::Compound(vec![
            Node::VariableSet(Variable::new("temp", "x"), Box::new(num(1.0))),
            Node::Return(Box::new(var("temp", "x"))),
        ]),
        "temp.x = 1.0; return temp.x"
    )]
    #[case::flip(Node::UnaryOp(UnaryOp::Flip, Box::new(var("query", "a"))), "!query.a")]
    fn test_display(#[case] node: Node, #[case] expected: &str) {
        assert_eq!(node.to_string(), expected);
    }

    #[rstest]
    #[case::coalesce_null(BinaryOp::NullCoalescing, Value::Null, Value::Float(2.0), Value::Float(2.0))]
    #[case::coalesce_value(BinaryOp::NullCoalescing, Value::Float(0.0), Value::Float(2.0), Value::Float(0.0))]
    #[case::and(BinaryOp::And, Value::Float(1.0), Value::Boolean(false), Value::Boolean(false))]
    #[case::or(BinaryOp::Or, Value::Float(0.0), Value::Float(3.0), Value::Boolean(true))]
    #[case::less(BinaryOp::Less, Value::Float(1.0), Value::from("2"), Value::Boolean(true))]
    fn test_apply(#[case] op: BinaryOp, #[case] left: Value, #[case] right: Value, #[case] expected: Value) {
        assert_eq!(op.apply(&left, &right), expected);
    }
}
