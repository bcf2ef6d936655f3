pub mod error;
pub mod token;

use error::LexerError;
use nom::Parser;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, anychar, char, digit1, multispace0, none_of, satisfy},
    combinator::{map, not, recognize},
    multi::{many0, many0_count},
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::LocatedSpan;
use token::{Token, TokenKind};

type Span<'a> = LocatedSpan<&'a str>;

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| spanned($kind, span)).parse(input)
        }
    };
}

macro_rules! define_keyword_parser {
    ($name:ident, $keyword:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(
                terminated(tag($keyword), not(satisfy(is_ident_char))),
                |span: Span| spanned($kind, span),
            )
            .parse(input)
        }
    };
}

/// Splits source text into tokens.
///
/// Whitespace is skipped. A virtual `;` is inserted after every `}` that is
/// not already followed by one, so `v.x = { ... } v.y = 1` reads as two
/// statements.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
    match preceded(multispace0, many0(terminated(token, multispace0))).parse(Span::new(input)) {
        Ok((rest, tokens)) => match rest.fragment().chars().next() {
            Some(character) => Err(LexerError::UnexpectedCharacter {
                offset: rest.location_offset() + character.len_utf8(),
                character,
            }),
            None => Ok(insert_separators(tokens)),
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            match e.input.fragment().chars().next() {
                Some(character) => Err(LexerError::UnexpectedCharacter {
                    offset: e.input.location_offset() + character.len_utf8(),
                    character,
                }),
                None => Err(LexerError::UnexpectedEOFDetected(input.len())),
            }
        }
        Err(nom::Err::Incomplete(_)) => Err(LexerError::UnexpectedEOFDetected(input.len())),
    }
}

fn insert_separators(tokens: Vec<Token>) -> Vec<Token> {
    let mut result = Vec::with_capacity(tokens.len() + tokens.len() / 4);
    let mut tokens = tokens.into_iter().peekable();

    while let Some(token) = tokens.next() {
        let closes_block = token.kind == TokenKind::RBrace;
        let end = token.end();
        result.push(token);

        if closes_block
            && !matches!(tokens.peek(), Some(next) if next.kind == TokenKind::SemiColon)
        {
            result.push(Token::virtual_semicolon(end));
        }
    }

    result
}

#[inline(always)]
fn spanned(kind: TokenKind, span: Span) -> Token {
    Token::at(kind, *span.fragment(), span.location_offset())
}

#[inline(always)]
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

define_keyword_parser!(return_, "return", TokenKind::Return);
define_keyword_parser!(loop_, "loop", TokenKind::Loop);
define_keyword_parser!(continue_, "continue", TokenKind::Continue);
define_keyword_parser!(break_, "break", TokenKind::Break);
define_keyword_parser!(if_, "if", TokenKind::If);
define_keyword_parser!(else_, "else", TokenKind::Else);
define_keyword_parser!(this, "this", TokenKind::This);
define_keyword_parser!(true_, "true", TokenKind::True);
define_keyword_parser!(false_, "false", TokenKind::False);

define_token_parser!(null_coalescing, "??", TokenKind::NullCoalescing);
define_token_parser!(increment, "++", TokenKind::Increment);
define_token_parser!(decrement, "--", TokenKind::Decrement);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(ampersand, "&", TokenKind::Ampersand);
define_token_parser!(pipe, "|", TokenKind::Pipe);
define_token_parser!(bang, "!", TokenKind::Bang);
define_token_parser!(question, "?", TokenKind::Question);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(dot, ".", TokenKind::Dot);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(equal, "=", TokenKind::Equal);
define_token_parser!(semi_colon, ";", TokenKind::SemiColon);

fn keywords(input: Span) -> IResult<Span, Token> {
    alt((
        return_, loop_, continue_, break_, if_, else_, this, true_, false_,
    ))
    .parse(input)
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    map(
        recognize(alt((
            delimited(
                char('"'),
                many0_count(alt((preceded(char('\\'), anychar), none_of("\"\\")))),
                char('"'),
            ),
            delimited(
                char('\''),
                many0_count(alt((preceded(char('\\'), anychar), none_of("'\\")))),
                char('\''),
            ),
        ))),
        |span: Span| spanned(TokenKind::StringLiteral, span),
    )
    .parse(input)
}

fn numeral(input: Span) -> IResult<Span, Token> {
    map(digit1, |span: Span| spanned(TokenKind::Numeral, span)).parse(input)
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0_count(alt((alphanumeric1, tag("_")))),
        )),
        |span: Span| spanned(TokenKind::Ident, span),
    )
    .parse(input)
}

fn operators(input: Span) -> IResult<Span, Token> {
    alt((
        null_coalescing,
        increment,
        decrement,
        lt,
        gt,
        ampersand,
        pipe,
        bang,
        question,
        colon,
        plus,
        minus,
        asterisk,
        slash,
    ))
    .parse(input)
}

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        l_paren, r_paren, l_brace, r_brace, l_bracket, r_bracket, dot, comma, equal, semi_colon,
    ))
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((keywords, string_literal, numeral, ident, operators, punctuations)).parse(input)
}
