use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: SmolStr,
    /// Byte offset of the first character in the source.
    pub offset: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<SmolStr>) -> Self {
        Self::at(kind, text, 0)
    }

    pub fn at(kind: TokenKind, text: impl Into<SmolStr>, offset: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            offset,
        }
    }

    /// Byte offset just past the last character in the source.
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    /// Statement separator inserted after a closing brace. It has no text and
    /// sits at `offset`, the end of the brace.
    pub fn virtual_semicolon(offset: usize) -> Self {
        Self::at(TokenKind::SemiColon, "", offset)
    }

    #[inline(always)]
    pub fn is_virtual(&self) -> bool {
        self.kind == TokenKind::SemiColon && self.text.is_empty()
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum TokenKind {
    Return,
    Loop,
    Continue,
    Break,
    If,
    Else,
    This,
    True,
    False,
    StringLiteral,
    Numeral,
    Ident,
    NullCoalescing,
    Increment,
    Decrement,
    Lt,
    Gt,
    Ampersand,
    Pipe,
    Bang,
    Question,
    Colon,
    Plus,
    Minus,
    Asterisk,
    Slash,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Equal,
    SemiColon,
}

impl TokenKind {
    /// Tokens that may continue a dotted variable name such as `q.is.valid.name`.
    #[inline(always)]
    pub fn is_identifier_part(&self) -> bool {
        matches!(self, TokenKind::Numeral | TokenKind::Ident | TokenKind::Dot)
    }

    /// Tokens that close the current syntactic scope without being consumed
    /// by expression parsing.
    #[inline(always)]
    pub fn is_scope_end(&self) -> bool {
        matches!(
            self,
            TokenKind::RParen | TokenKind::RBrace | TokenKind::RBracket | TokenKind::Comma
        )
    }

    #[inline(always)]
    pub fn is_terminating(&self) -> bool {
        matches!(self, TokenKind::SemiColon)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        if self.text.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::Return => write!(f, "return"),
            TokenKind::Loop => write!(f, "loop"),
            TokenKind::Continue => write!(f, "continue"),
            TokenKind::Break => write!(f, "break"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::This => write!(f, "this"),
            TokenKind::True => write!(f, "true"),
            TokenKind::False => write!(f, "false"),
            TokenKind::StringLiteral => write!(f, "string"),
            TokenKind::Numeral => write!(f, "number"),
            TokenKind::Ident => write!(f, "identifier"),
            TokenKind::NullCoalescing => write!(f, "??"),
            TokenKind::Increment => write!(f, "++"),
            TokenKind::Decrement => write!(f, "--"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Ampersand => write!(f, "&"),
            TokenKind::Pipe => write!(f, "|"),
            TokenKind::Bang => write!(f, "!"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Equal => write!(f, "="),
            TokenKind::SemiColon => write!(f, ";"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::numeral(TokenKind::Numeral, true, false)]
    #[case::ident(TokenKind::Ident, true, false)]
    #[case::dot(TokenKind::Dot, true, false)]
    #[case::rparen(TokenKind::RParen, false, true)]
    #[case::comma(TokenKind::Comma, false, true)]
    #[case::plus(TokenKind::Plus, false, false)]
    fn test_predicates(#[case] kind: TokenKind, #[case] identifier: bool, #[case] scope_end: bool) {
        assert_eq!(kind.is_identifier_part(), identifier);
        assert_eq!(kind.is_scope_end(), scope_end);
    }

    #[test]
    fn test_virtual_semicolon() {
        let token = Token::virtual_semicolon(7);
        assert!(token.is_virtual());
        assert_eq!(token.end(), 7);
        assert!(token.kind.is_terminating());
        assert_eq!(token.to_string(), ";");
        assert!(!Token::new(TokenKind::SemiColon, ";").is_virtual());
    }
}
