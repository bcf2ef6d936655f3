//! Compile-time constant folding optimization.
//!
//! Constant subtrees are evaluated once by the tree-walking interpreter against
//! an empty environment, and the compiler embeds the resulting value.

use tracing::trace;

use crate::ast::Node;
use crate::eval::Interpreter;
use crate::eval::env::EmptyEnvironment;
use crate::value::Value;

/// Constant folder for compile-time optimization.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ConstantFolder;

impl ConstantFolder {
    pub fn new() -> Self {
        Self
    }

    /// Attempts to fold a subtree into a constant value.
    ///
    /// # Arguments
    ///
    /// * `node` - The subtree to fold
    ///
    /// # Returns
    ///
    /// `Some(value)` if the subtree is constant, yields a value and evaluates
    /// without error or escaping control flow; `None` otherwise. Literals are
    /// never reported as folded.
    pub fn fold(&self, node: &Node) -> Option<Value> {
        if matches!(node, Node::Const(_)) || !node.is_constant() || !node.has_value() {
            return None;
        }

        let value = Interpreter::new(node).run(&mut EmptyEnvironment).ok()?;
        trace!(node = %node, value = %value, "folded constant subtree");
        Some(value)
    }

    /// Attempts to fold a whole program root.
    ///
    /// Unlike [`fold`](Self::fold) the root may end in `return`, whose value
    /// becomes the folded value.
    pub fn fold_root(&self, root: &Node) -> Option<Value> {
        if !root.is_constant() {
            return None;
        }

        Interpreter::new(root).evaluate(&mut EmptyEnvironment).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;
    use crate::version::GrammarVersion;
    use rstest::rstest;

    fn node(source: &str) -> Node {
        parse(source, GrammarVersion::LATEST).unwrap()
    }

    #[rstest]
    #[case::arithmetic("1 + 2 * 3", Some(Value::Float(7.0)))]
    #[case::math("math.max(2, 5)", Some(Value::Float(5.0)))]
    #[case::string("'a' + 'b'", Some(Value::from("ab")))]
    #[case::random("math.random(0, 1)", None)]
    #[case::variable("v.x + 1", None)]
    #[case::failing_index("[][0]", None)]
    fn test_fold_root(#[case] source: &str, #[case] expected: Option<Value>) {
        assert_eq!(ConstantFolder::new().fold_root(&node(source)), expected);
    }

    #[rstest]
    #[case::binary(Node::binary(crate::ast::BinaryOp::Add, Node::Const(Value::ONE), Node::Const(Value::ONE)), Some(Value::Float(2.0)))]
    #[case::literal(Node::Const(Value::ONE), None)]
    #[case::return_(Node::Return(Box::new(Node::Const(Value::ONE))), None)]
    #[case::conditional(
        Node::BinaryConditional(Box::new(Node::Const(Value::ONE)), Box::new(Node::Const(Value::ONE))),
        None
    )]
    fn test_fold(#[case] node: Node, #[case] expected: Option<Value>) {
        assert_eq!(ConstantFolder::new().fold(&node), expected);
    }
}
