use std::fmt::{self, Display, Formatter};

use crate::error::syntax::SyntaxError;

/// A registered MoLang grammar version.
///
/// The version decides which syntax the parser accepts. Only version 12 is
/// registered; it is also the latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrammarVersion {
    number: u32,
    arrays: bool,
}

impl GrammarVersion {
    pub const V12: GrammarVersion = GrammarVersion {
        number: 12,
        arrays: true,
    };
    pub const LATEST: GrammarVersion = GrammarVersion::V12;

    const REGISTERED: &'static [GrammarVersion] = &[GrammarVersion::V12];

    pub fn get(number: u32) -> Result<Self, SyntaxError> {
        Self::REGISTERED
            .iter()
            .find(|version| version.number == number)
            .copied()
            .ok_or(SyntaxError::UnsupportedVersion(number))
    }

    pub fn registered() -> impl Iterator<Item = GrammarVersion> {
        Self::REGISTERED.iter().copied()
    }

    #[inline(always)]
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Whether `[a, b]` literals and `a[i]` indexing are accepted.
    #[inline(always)]
    pub fn supports_arrays(&self) -> bool {
        self.arrays
    }
}

impl Default for GrammarVersion {
    fn default() -> Self {
        Self::LATEST
    }
}

impl Display for GrammarVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "v{}", self.number)
    }
}
