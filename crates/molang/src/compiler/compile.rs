//! Main compilation logic for transforming a parsed tree into closures.

use smallvec::SmallVec;
use tracing::debug;

use super::compiled::{CompiledExpr, CompiledProgram, compiled};
use super::constant_fold::ConstantFolder;
use super::context::CompileContext;
use crate::ast::{BinaryOp, Node, Variable};
use crate::eval::scope::Unwind;
use crate::value::Value;

/// Loops with a constant iteration count below this are unrolled.
const UNROLL_LIMIT: i32 = 128;

/// Compiler for transforming nodes into compiled closures.
///
/// The compiler holds no per-program state; everything a compile pass tracks
/// lives in a [`CompileContext`], so one compiler can be shared between
/// threads.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Compiler {
    /// Whether constant subtrees are folded and constant loops unrolled
    optimize: bool,
    /// Constant folder for compile-time optimizations
    folder: ConstantFolder,
}

impl Compiler {
    /// Creates a new compiler.
    ///
    /// # Arguments
    ///
    /// * `optimize` - Enables constant folding, static branch selection and
    ///   loop unrolling
    pub fn new(optimize: bool) -> Self {
        Self {
            optimize,
            folder: ConstantFolder::new(),
        }
    }

    /// Compiles a program root.
    ///
    /// # Arguments
    ///
    /// * `root` - The parsed program, as returned by [`crate::ast::parse`]
    ///
    /// # Returns
    ///
    /// The compiled program, which owns the number of `temp` slots to
    /// allocate per evaluation.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let root = parse("v.x * 2", GrammarVersion::LATEST)?;
    /// let program = Compiler::new(true).compile(&root);
    /// let result = program.run(&mut runtime)?;
    /// ```
    pub fn compile(&self, root: &Node) -> CompiledProgram {
        let mut ctx = CompileContext::new(root);
        let body = self.compile_node(root, &mut ctx);

        debug!(
            unrolled_loops = ctx.unrolled_loops,
            folded_subtrees = ctx.folded_subtrees,
            "lowered tree"
        );

        CompiledProgram::new(body, ctx.slot_count())
    }

    /// Compiles a single node into a compiled expression.
    ///
    /// # Arguments
    ///
    /// * `node` - The node to compile
    /// * `ctx` - Working state of the current compile pass
    fn compile_node(&self, node: &Node, ctx: &mut CompileContext) -> CompiledExpr {
        // Try constant folding first
        if self.optimize {
            if let Some(value) = self.folder.fold(node) {
                ctx.folded_subtrees += 1;
                return constant(value);
            }
        }

        match node {
            Node::Const(value) => constant(value.clone()),

            // Temps: read from the slot allocated for the name
            Node::VariableGet(variable) if variable.is_temp() => {
                let slot = ctx.slot(&variable.name);
                compiled(move |scope| Ok(scope.read_temp(slot)))
            }

            Node::VariableGet(variable) => {
                let variable = variable.clone();
                compiled(move |scope| Ok(scope.read(&variable)?))
            }

            Node::VariableSet(variable, value) => self.compile_assignment(variable, value, ctx),

            Node::BinaryOp(op, left, right) => self.compile_binary_op(*op, left, right, ctx),

            Node::UnaryOp(op, operand) => {
                let op = *op;
                let operand = self.compile_node(operand, ctx);
                compiled(move |scope| Ok(op.apply(&operand(scope)?)))
            }

            Node::Negate(operand) => {
                let operand = self.compile_node(operand, ctx);
                compiled(move |scope| Ok(operand(scope)?.negate()))
            }

            // Binary conditional: the branch runs in its own overlay
            Node::BinaryConditional(cond, branch) => {
                if let Some(taken) = self.static_condition(cond) {
                    return if taken {
                        scoped(self.compile_node(branch, ctx))
                    } else {
                        constant(Value::ZERO)
                    };
                }

                let cond = self.compile_node(cond, ctx);
                let branch = self.compile_node(branch, ctx);
                compiled(move |scope| {
                    if cond(scope)?.as_bool() {
                        scope.scoped(|scope| branch(scope))
                    } else {
                        Ok(Value::ZERO)
                    }
                })
            }

            Node::Ternary(cond, left, right) => {
                if let Some(taken) = self.static_condition(cond) {
                    return scoped(self.compile_node(if taken { left } else { right }, ctx));
                }

                let cond = self.compile_node(cond, ctx);
                let left = self.compile_node(left, ctx);
                let right = self.compile_node(right, ctx);
                compiled(move |scope| {
                    if cond(scope)?.as_bool() {
                        scope.scoped(|scope| left(scope))
                    } else {
                        scope.scoped(|scope| right(scope))
                    }
                })
            }

            Node::Loop(iterations, body) => self.compile_loop(iterations, body, ctx),

            Node::Break => compiled(|_| Err(Unwind::Break)),
            Node::Continue => compiled(|_| Err(Unwind::Continue)),

            Node::Return(value) => {
                let has_value = value.has_value();
                let value = self.compile_node(value, ctx);
                compiled(move |scope| {
                    let value = value(scope)?;
                    Err(Unwind::Return(if has_value { value } else { Value::ZERO }))
                })
            }

            Node::Scope(inner) => self.compile_node(inner, ctx),

            Node::Compound(statements) => {
                let mut statements = statements
                    .iter()
                    .map(|statement| self.compile_node(statement, ctx))
                    .collect::<Vec<_>>();

                match statements.len() {
                    0 => constant(Value::ZERO),
                    1 => statements.remove(0),
                    _ => compiled(move |scope| {
                        let mut last = Value::ZERO;
                        for statement in &statements {
                            last = statement(scope)?;
                        }
                        Ok(last)
                    }),
                }
            }

            Node::FunctionCall(function, args) => {
                let function = function.clone();
                let args = self.compile_all(args, ctx);
                compiled(move |scope| {
                    let args = args
                        .iter()
                        .map(|arg| arg(scope))
                        .collect::<Result<SmallVec<[Value; 4]>, _>>()?;
                    Ok(scope.call(&function, &args)?)
                })
            }

            Node::MathCall(op, args) => {
                let op = *op;
                let args = self.compile_all(args, ctx);
                compiled(move |scope| {
                    let args = args
                        .iter()
                        .map(|arg| arg(scope).map(|value| value.as_float()))
                        .collect::<Result<SmallVec<[f32; 3]>, _>>()?;
                    Ok(Value::Float(op.apply(&args)))
                })
            }

            Node::ArrayLiteral(elements) => {
                let elements = self.compile_all(elements, ctx);
                compiled(move |scope| {
                    let elements = elements
                        .iter()
                        .map(|element| element(scope))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::from(elements))
                })
            }

            Node::ArrayAccess(array, index) => {
                let array = self.compile_node(array, ctx);
                let index = self.compile_node(index, ctx);
                compiled(move |scope| {
                    let array = array(scope)?;
                    let index = index(scope)?;
                    Ok(array.index(&index)?)
                })
            }

            Node::This => compiled(|scope| Ok(scope.this_value())),
        }
    }

    fn compile_all(&self, nodes: &[Node], ctx: &mut CompileContext) -> Vec<CompiledExpr> {
        nodes.iter().map(|node| self.compile_node(node, ctx)).collect()
    }

    fn compile_assignment(&self, variable: &Variable, value: &Node, ctx: &mut CompileContext) -> CompiledExpr {
        let value = self.compile_node(value, ctx);

        if variable.is_temp() {
            let slot = ctx.slot(&variable.name);
            return compiled(move |scope| {
                let value = value(scope)?;
                scope.write_temp(slot, value.clone())?;
                Ok(value)
            });
        }

        let variable = variable.clone();
        compiled(move |scope| {
            let value = value(scope)?;
            scope.write(&variable, value.clone())?;
            Ok(value)
        })
    }

    fn compile_binary_op(&self, op: BinaryOp, left: &Node, right: &Node, ctx: &mut CompileContext) -> CompiledExpr {
        let left = self.compile_node(left, ctx);
        let right = self.compile_node(right, ctx);

        match op {
            // And: short-circuit evaluation
            BinaryOp::And => compiled(move |scope| {
                Ok(Value::Boolean(left(scope)?.as_bool() && right(scope)?.as_bool()))
            }),
            // Or: short-circuit evaluation
            BinaryOp::Or => compiled(move |scope| {
                Ok(Value::Boolean(left(scope)?.as_bool() || right(scope)?.as_bool()))
            }),
            BinaryOp::NullCoalescing => compiled(move |scope| {
                let value = left(scope)?;
                if value.is_null() { right(scope) } else { Ok(value) }
            }),
            _ => compiled(move |scope| {
                let left = left(scope)?;
                Ok(op.apply(&left, &right(scope)?))
            }),
        }
    }

    fn compile_loop(&self, iterations: &Node, body: &Node, ctx: &mut CompileContext) -> CompiledExpr {
        if let Some(count) = self.static_iterations(iterations) {
            if count < UNROLL_LIMIT {
                ctx.unrolled_loops += 1;
                let unrolled = (0..count)
                    .map(|_| self.compile_node(body, ctx))
                    .collect::<Vec<_>>();

                return compiled(move |scope| {
                    for iteration in &unrolled {
                        match scope.scoped(|scope| iteration(scope)) {
                            Ok(_) | Err(Unwind::Continue) => {}
                            Err(Unwind::Break) => break,
                            Err(unwind) => return Err(unwind),
                        }
                    }
                    Ok(Value::ZERO)
                });
            }
        }

        let iterations = self.compile_node(iterations, ctx);
        let body = self.compile_node(body, ctx);
        compiled(move |scope| {
            let count = iterations(scope)?.as_float() as i32;
            for _ in 0..count {
                match scope.scoped(|scope| body(scope)) {
                    Ok(_) | Err(Unwind::Continue) => {}
                    Err(Unwind::Break) => break,
                    Err(unwind) => return Err(unwind),
                }
            }
            Ok(Value::ZERO)
        })
    }

    /// The truthiness of a condition known at compile time.
    fn static_condition(&self, cond: &Node) -> Option<bool> {
        self.static_value(cond).map(|value| value.as_bool())
    }

    /// The iteration count of a loop known at compile time.
    fn static_iterations(&self, iterations: &Node) -> Option<i32> {
        self.static_value(iterations).map(|value| value.as_float() as i32)
    }

    fn static_value(&self, node: &Node) -> Option<Value> {
        if !self.optimize {
            return None;
        }

        match node {
            Node::Const(value) => Some(value.clone()),
            _ => self.folder.fold(node),
        }
    }
}

fn constant(value: Value) -> CompiledExpr {
    compiled(move |_| Ok(value.clone()))
}

fn scoped(inner: CompiledExpr) -> CompiledExpr {
    compiled(move |scope| scope.scoped(|scope| inner(scope)))
}
