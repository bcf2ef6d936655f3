use std::{
    fmt::{self, Display, Formatter},
    sync::LazyLock,
};

use dashmap::DashMap;
use itertools::Itertools;
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};
use tracing::{debug, debug_span};

use crate::{
    Expression, Value,
    ast::{self, Node},
    compiler::{Compiler, ConstantFolder},
    error::{Error, InnerError},
    eval::env::Environment,
    version::GrammarVersion,
};

static GLOBAL_ENGINES: LazyLock<DashMap<CompilerFlags, Engine>> = LazyLock::new(DashMap::new);

/// A single compiler switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CompilerFlag {
    /// Fold constant subtrees, select constant branches and unroll small
    /// constant loops.
    Optimize,
    /// Log the parsed tree at `debug` level.
    PrintTree,
}

impl CompilerFlag {
    fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// A set of [`CompilerFlag`]s. The default set enables
/// [`CompilerFlag::Optimize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompilerFlags(u8);

impl CompilerFlags {
    pub const NONE: CompilerFlags = CompilerFlags(0);

    pub fn new(flags: impl IntoIterator<Item = CompilerFlag>) -> Self {
        flags.into_iter().collect()
    }

    pub fn with(self, flag: CompilerFlag) -> Self {
        Self(self.0 | flag.bit())
    }

    pub fn without(self, flag: CompilerFlag) -> Self {
        Self(self.0 & !flag.bit())
    }

    pub fn contains(self, flag: CompilerFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = CompilerFlag> {
        CompilerFlag::iter().filter(move |flag| self.contains(*flag))
    }
}

impl Default for CompilerFlags {
    fn default() -> Self {
        Self::NONE.with(CompilerFlag::Optimize)
    }
}

impl FromIterator<CompilerFlag> for CompilerFlags {
    fn from_iter<T: IntoIterator<Item = CompilerFlag>>(iter: T) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

impl Display for CompilerFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let names = self.iter().map(<&'static str>::from).join("|");
        write!(f, "{}", if names.is_empty() { "none" } else { names.as_str() })
    }
}

/// Compiles MoLang source text into [`Expression`]s.
///
/// An engine holds no per-source state and can be shared between threads.
#[derive(Debug, Clone, Copy)]
pub struct Engine {
    flags: CompilerFlags,
    compiler: Compiler,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CompilerFlags::default())
    }
}

impl Engine {
    pub fn new(flags: CompilerFlags) -> Self {
        Self {
            flags,
            compiler: Compiler::new(flags.contains(CompilerFlag::Optimize)),
        }
    }

    /// Returns the process-wide engine for `flags`, creating it on first use.
    pub fn global(flags: CompilerFlags) -> Engine {
        *GLOBAL_ENGINES.entry(flags).or_insert_with(|| Engine::new(flags))
    }

    /// Drops every engine created by [`Engine::global`].
    pub fn clear_global() {
        GLOBAL_ENGINES.clear();
    }

    pub fn flags(&self) -> CompilerFlags {
        self.flags
    }

    #[allow(clippy::result_large_err)]
    pub fn compile(&self, source: &str) -> Result<Expression, Error> {
        self.compile_version(source, GrammarVersion::LATEST)
    }

    #[allow(clippy::result_large_err)]
    pub fn compile_version(&self, source: &str, version: GrammarVersion) -> Result<Expression, Error> {
        let span = debug_span!("compile", version = version.number(), flags = %self.flags);
        let _guard = span.enter();

        let root = ast::parse(source, version).map_err(|e| Error::from_error(source, InnerError::Syntax(e)))?;
        Ok(self.compile_node(&root))
    }

    /// Compiles an already parsed tree.
    pub fn compile_node(&self, root: &Node) -> Expression {
        let canonical = root.to_string();

        if self.flags.contains(CompilerFlag::PrintTree) {
            debug!(tree = ?root, "parsed tree");
        }

        if self.flags.contains(CompilerFlag::Optimize) {
            if let Some(value) = ConstantFolder::new().fold_root(root) {
                debug!(value = %value, "folded constant program");
                return Expression::folded(value, canonical);
            }
        }

        let program = self.compiler.compile(root);
        debug!(slots = program.slot_count(), "compiled program");
        Expression::compiled(program, canonical)
    }

    /// Compiles `source` with the latest grammar and evaluates it once.
    #[allow(clippy::result_large_err)]
    pub fn eval(&self, source: &str, env: &mut dyn Environment) -> Result<Value, Error> {
        self.compile(source)?
            .evaluate(env)
            .map_err(|e| Error::from_error(source, InnerError::Runtime(e)))
    }
}
