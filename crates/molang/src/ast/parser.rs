use smol_str::SmolStr;

use super::node::{BinaryOp, Node, UnaryOp, Variable};
use crate::error::syntax::SyntaxError;
use crate::lexer::token::{Token, TokenKind};
use crate::math::MathOperation;
use crate::value::Value;
use crate::version::GrammarVersion;

const MATH_NAMESPACE: &str = "math";

/// Recursive-descent parser over a token slice.
///
/// Precedence from loosest to tightest: ternary, `&&`/`||` (right
/// associative), comparison, additive, multiplicative, `??`, unary, postfix
/// indexing, primary.
pub struct Parser<'a> {
    tokens: &'a [Token],
    /// Source byte offset just past each token.
    ends: Vec<usize>,
    pos: usize,
    version: GrammarVersion,
    loop_depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], version: GrammarVersion) -> Self {
        let ends = tokens.iter().map(Token::end).collect();

        Self {
            tokens,
            ends,
            pos: 0,
            version,
            loop_depth: 0,
        }
    }

    /// Parses the whole token stream. The last statement is wrapped in a
    /// `Return` unless it already is one.
    pub fn parse(&mut self) -> Result<Node, SyntaxError> {
        if self.tokens.is_empty() {
            return Err(SyntaxError::UnexpectedEOFDetected { offset: 0 });
        }

        self.parse_program(None, true)
    }

    fn parse_program(&mut self, end: Option<TokenKind>, insert_return: bool) -> Result<Node, SyntaxError> {
        let mut statements = Vec::with_capacity(2);

        loop {
            match self.peek_kind() {
                None => break,
                Some(kind) if Some(kind) == end => break,
                _ => {}
            }

            let statement = self.parse_expr()?;
            let returns = matches!(statement, Node::Return(_));
            statements.push(statement);

            match self.peek_kind() {
                None => break,
                Some(kind) if kind.is_terminating() => self.advance(),
                Some(kind) if Some(kind) == end => break,
                Some(_) => return Err(self.unexpected_token()),
            }

            if returns {
                match self.peek_kind() {
                    None => break,
                    Some(kind) if Some(kind) == end => break,
                    Some(_) => {
                        return Err(SyntaxError::TrailingStatement {
                            offset: self.offset(),
                        });
                    }
                }
            }
        }

        let Some(last) = statements.pop() else {
            return Err(self.unexpected_token());
        };

        let last = match last {
            Node::Return(_) => last,
            node if insert_return => Node::Return(Box::new(node)),
            node => node,
        };

        if statements.is_empty() {
            Ok(last)
        } else {
            statements.push(last);
            Ok(Node::Compound(statements))
        }
    }

    #[inline(always)]
    fn parse_expr(&mut self) -> Result<Node, SyntaxError> {
        self.parse_ternary_expr()
    }

    fn parse_ternary_expr(&mut self) -> Result<Node, SyntaxError> {
        let condition = self.parse_logical_expr()?;

        if self.peek_kind() != Some(TokenKind::Question) {
            return Ok(condition);
        }
        self.advance();

        let left = self.parse_expr()?;
        if self.check(TokenKind::Colon) {
            self.advance();
            let right = self.parse_expr()?;
            return Ok(Node::Ternary(Box::new(condition), Box::new(left), Box::new(right)));
        }

        Ok(Node::BinaryConditional(Box::new(condition), Box::new(left)))
    }

    fn parse_logical_expr(&mut self) -> Result<Node, SyntaxError> {
        let left = self.parse_comparison_expr()?;

        let (op, kind, symbol) = match self.peek_kind() {
            Some(TokenKind::Ampersand) => (BinaryOp::And, TokenKind::Ampersand, "&&"),
            Some(TokenKind::Pipe) => (BinaryOp::Or, TokenKind::Pipe, "||"),
            _ => return Ok(left),
        };
        self.advance();
        self.expect(kind, symbol)?;

        let right = self.parse_logical_expr()?;
        Ok(Node::binary(op, left, right))
    }

    fn parse_comparison_expr(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_additive_expr()?;

        loop {
            let followed_by_equal = self.peek_kind_at(1) == Some(TokenKind::Equal);
            let (op, width) = match self.peek_kind() {
                Some(TokenKind::Equal) if followed_by_equal => (BinaryOp::Equals, 2),
                Some(TokenKind::Equal) => {
                    return Err(SyntaxError::InvalidAssignmentTarget {
                        offset: self.offset(),
                        target: left.to_string().into(),
                    });
                }
                Some(TokenKind::Bang) if followed_by_equal => (BinaryOp::NotEquals, 2),
                Some(TokenKind::Lt) if followed_by_equal => (BinaryOp::LessEquals, 2),
                Some(TokenKind::Lt) => (BinaryOp::Less, 1),
                Some(TokenKind::Gt) if followed_by_equal => (BinaryOp::GreaterEquals, 2),
                Some(TokenKind::Gt) => (BinaryOp::Greater, 1),
                _ => return Ok(left),
            };
            self.pos += width;

            let right = self.parse_additive_expr()?;
            left = Node::binary(op, left, right);
        }
    }

    fn parse_additive_expr(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_multiplicative_expr()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Subtract,
                _ => return Ok(left),
            };
            self.advance();

            let right = self.parse_multiplicative_expr()?;
            left = Node::binary(op, left, right);
        }
    }

    fn parse_multiplicative_expr(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_coalesce_expr()?;

        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Asterisk) => BinaryOp::Multiply,
                Some(TokenKind::Slash) => BinaryOp::Divide,
                _ => return Ok(left),
            };
            self.advance();

            let right = self.parse_coalesce_expr()?;
            left = Node::binary(op, left, right);
        }
    }

    fn parse_coalesce_expr(&mut self) -> Result<Node, SyntaxError> {
        let mut left = self.parse_unary_expr()?;

        while self.peek_kind() == Some(TokenKind::NullCoalescing) {
            self.advance();
            let right = self.parse_unary_expr()?;
            left = Node::binary(BinaryOp::NullCoalescing, left, right);
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Node, SyntaxError> {
        match self.peek_kind() {
            Some(TokenKind::Bang) => {
                self.advance();
                let operand = self.parse_unary_expr()?;
                Ok(Node::UnaryOp(UnaryOp::Flip, Box::new(operand)))
            }
            Some(TokenKind::Minus) => {
                self.advance();
                match self.parse_unary_expr()? {
                    Node::Const(Value::Float(value)) => Ok(Node::Const(Value::Float(-value))),
                    operand => Ok(Node::Negate(Box::new(operand))),
                }
            }
            Some(TokenKind::Plus) => {
                self.advance();
                self.parse_unary_expr()
            }
            _ => self.parse_postfix_expr(),
        }
    }

    fn parse_postfix_expr(&mut self) -> Result<Node, SyntaxError> {
        let mut node = self.parse_primary_expr()?;

        loop {
            match self.peek_kind() {
                Some(TokenKind::LBracket) => {
                    self.require_arrays()?;
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "]")?;
                    node = Node::ArrayAccess(Box::new(node), Box::new(index));
                }
                Some(TokenKind::Increment | TokenKind::Decrement) => {
                    return Err(SyntaxError::InvalidAssignmentTarget {
                        offset: self.offset(),
                        target: node.to_string().into(),
                    });
                }
                _ => return Ok(node),
            }
        }
    }

    fn parse_primary_expr(&mut self) -> Result<Node, SyntaxError> {
        let Some(token) = self.current() else {
            return Err(self.eof());
        };

        match token.kind {
            TokenKind::Numeral => self.parse_number(),
            TokenKind::StringLiteral => {
                let value = unescape(&token.text);
                self.advance();
                Ok(Node::Const(Value::String(value)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Node::Const(Value::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Node::Const(Value::Boolean(false)))
            }
            TokenKind::This => {
                self.advance();
                Ok(Node::This)
            }
            TokenKind::LParen => self.parse_paren(),
            TokenKind::LBrace => self.parse_block(),
            TokenKind::LBracket => self.parse_array(),
            TokenKind::Ident => self.parse_ident(),
            TokenKind::Return => {
                self.advance();
                let value = self.parse_expr()?;
                Ok(Node::Return(Box::new(value)))
            }
            TokenKind::Break => self.parse_loop_control(Node::Break, "break"),
            TokenKind::Continue => self.parse_loop_control(Node::Continue, "continue"),
            TokenKind::Loop => self.parse_loop(),
            TokenKind::If => self.parse_if(),
            _ => Err(self.unexpected_token()),
        }
    }

    fn parse_number(&mut self) -> Result<Node, SyntaxError> {
        let mut text = String::from(self.tokens[self.pos].text.as_str());
        self.advance();

        if self.peek_kind() == Some(TokenKind::Dot) {
            self.advance();
            let decimals = self.expect(TokenKind::Numeral, "number")?;
            text.push('.');
            text.push_str(&decimals.text);
        }

        text.parse::<f32>()
            .map(|value| Node::Const(Value::Float(value)))
            .map_err(|_| SyntaxError::InvalidNumber {
                offset: self.previous_offset(),
                text: text.into(),
            })
    }

    fn parse_paren(&mut self) -> Result<Node, SyntaxError> {
        self.advance();
        let node = self.parse_expr()?;
        self.expect(TokenKind::RParen, ")")?;
        Ok(node)
    }

    fn parse_block(&mut self) -> Result<Node, SyntaxError> {
        self.advance();
        let inner = self.parse_program(Some(TokenKind::RBrace), false)?;
        self.expect(TokenKind::RBrace, "}")?;
        Ok(Node::Scope(Box::new(inner)))
    }

    fn parse_array(&mut self) -> Result<Node, SyntaxError> {
        self.require_arrays()?;
        self.advance();

        let mut elements = Vec::new();
        if self.check(TokenKind::RBracket) {
            self.advance();
            return Ok(Node::ArrayLiteral(elements));
        }

        loop {
            elements.push(self.parse_expr()?);

            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }

            self.expect(TokenKind::RBracket, "]")?;
            return Ok(Node::ArrayLiteral(elements));
        }
    }

    fn parse_loop_control(&mut self, node: Node, keyword: &'static str) -> Result<Node, SyntaxError> {
        if self.loop_depth == 0 {
            return Err(SyntaxError::OutsideLoop {
                offset: self.offset(),
                keyword,
            });
        }

        self.advance();
        Ok(node)
    }

    fn parse_loop(&mut self) -> Result<Node, SyntaxError> {
        self.advance();
        self.expect(TokenKind::LParen, "(")?;

        let iterations = self.parse_program(Some(TokenKind::Comma), false)?;
        self.expect(TokenKind::Comma, ",")?;

        self.loop_depth += 1;
        let body = self.parse_program(Some(TokenKind::RParen), false);
        self.loop_depth -= 1;
        let body = body?;
        self.expect(TokenKind::RParen, ")")?;

        // The loop already opens a scope for its body.
        let body = match body {
            Node::Scope(inner) => *inner,
            body => body,
        };

        Ok(Node::Loop(Box::new(iterations), Box::new(body)))
    }

    fn parse_if(&mut self) -> Result<Node, SyntaxError> {
        self.advance();
        self.expect(TokenKind::LParen, "(")?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RParen, ")")?;

        let branch = self.parse_expr()?;

        let has_else = match (self.peek_kind(), self.peek_kind_at(1)) {
            (Some(TokenKind::SemiColon), Some(TokenKind::Else)) => {
                self.pos += 2;
                true
            }
            (Some(TokenKind::Else), _) => {
                self.advance();
                true
            }
            _ => false,
        };

        if has_else {
            let otherwise = self.parse_expr()?;
            Ok(Node::Ternary(Box::new(condition), Box::new(branch), Box::new(otherwise)))
        } else {
            Ok(Node::BinaryConditional(Box::new(condition), Box::new(branch)))
        }
    }

    /// Parses `namespace.name` and whatever follows it: an assignment, an
    /// increment, a compound assignment, a call or a plain read.
    fn parse_ident(&mut self) -> Result<Node, SyntaxError> {
        let namespace = resolve_namespace(&self.tokens[self.pos].text);
        self.advance();
        self.expect(TokenKind::Dot, ".")?;

        let mut name = String::from(self.expect(TokenKind::Ident, "identifier")?.text.as_str());
        while let Some(token) = self.current().filter(|token| token.kind.is_identifier_part()) {
            name.push_str(&token.text);
            self.advance();
        }

        let math = if namespace == MATH_NAMESPACE {
            let op = MathOperation::from_name(&name).ok_or_else(|| SyntaxError::UnknownMathFunction {
                offset: self.previous_offset(),
                name: name.as_str().into(),
            })?;

            if op.arity() == 0 {
                if self.check(TokenKind::LParen) && self.peek_kind_at(1) == Some(TokenKind::RParen) {
                    self.pos += 2;
                }
                return Ok(Node::MathCall(op, Vec::new()));
            }

            Some(op)
        } else {
            None
        };

        let variable = Variable::new(namespace, name);

        match (self.peek_kind(), self.peek_kind_at(1)) {
            (Some(TokenKind::Equal), Some(TokenKind::Equal)) => {}
            (Some(TokenKind::Equal), _) => {
                self.assignable(math, &variable)?;
                self.advance();
                let value = self.parse_expr()?;
                return Ok(Node::VariableSet(variable, Box::new(value)));
            }
            (Some(kind @ (TokenKind::Increment | TokenKind::Decrement)), _) => {
                self.assignable(math, &variable)?;
                self.advance();
                let op = if kind == TokenKind::Increment {
                    BinaryOp::Add
                } else {
                    BinaryOp::Subtract
                };
                let value = Node::binary(op, Node::VariableGet(variable.clone()), Node::Const(Value::ONE));
                return Ok(Node::VariableSet(variable, Box::new(value)));
            }
            (
                Some(kind @ (TokenKind::Plus | TokenKind::Minus | TokenKind::Asterisk | TokenKind::Slash)),
                Some(TokenKind::Equal),
            ) => {
                self.assignable(math, &variable)?;
                self.pos += 2;
                let op = match kind {
                    TokenKind::Plus => BinaryOp::Add,
                    TokenKind::Minus => BinaryOp::Subtract,
                    TokenKind::Asterisk => BinaryOp::Multiply,
                    _ => BinaryOp::Divide,
                };
                let operand = self.parse_expr()?;
                let value = Node::binary(op, Node::VariableGet(variable.clone()), operand);
                return Ok(Node::VariableSet(variable, Box::new(value)));
            }
            (Some(TokenKind::LParen), _) => {
                let args = self.parse_args()?;
                return match math {
                    Some(op) if op.arity() != args.len() => Err(SyntaxError::MathArity {
                        offset: self.previous_offset(),
                        name: op.name(),
                        expected: op.arity(),
                        actual: args.len(),
                    }),
                    Some(op) => Ok(Node::MathCall(op, args)),
                    None => Ok(Node::FunctionCall(variable, args)),
                };
            }
            _ => {}
        }

        match math {
            Some(op) => Err(SyntaxError::MathValue {
                offset: self.previous_offset(),
                name: op.name(),
            }),
            None => Ok(Node::VariableGet(variable)),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Node>, SyntaxError> {
        self.advance();

        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            self.advance();
            return Ok(args);
        }

        loop {
            args.push(self.parse_expr()?);

            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }

            self.expect(TokenKind::RParen, ")")?;
            return Ok(args);
        }
    }

    fn assignable(&self, math: Option<MathOperation>, variable: &Variable) -> Result<(), SyntaxError> {
        match math {
            Some(_) => Err(SyntaxError::InvalidAssignmentTarget {
                offset: self.offset(),
                target: variable.to_string().into(),
            }),
            None => Ok(()),
        }
    }

    fn require_arrays(&self) -> Result<(), SyntaxError> {
        if self.version.supports_arrays() {
            Ok(())
        } else {
            Err(SyntaxError::ArraysUnsupported {
                offset: self.offset(),
                version: self.version.number(),
            })
        }
    }

    #[inline(always)]
    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    #[inline(always)]
    fn peek_kind(&self) -> Option<TokenKind> {
        self.current().map(|token| token.kind)
    }

    #[inline(always)]
    fn peek_kind_at(&self, n: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + n).map(|token| token.kind)
    }

    #[inline(always)]
    fn advance(&mut self) {
        self.pos += 1;
    }

    /// Checks the current token, stepping over a virtual separator that sits
    /// directly in front of the wanted token.
    fn check(&mut self, kind: TokenKind) -> bool {
        if self.current().is_some_and(Token::is_virtual) && self.peek_kind_at(1) == Some(kind) {
            self.advance();
        }

        self.peek_kind() == Some(kind)
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<&'a Token, SyntaxError> {
        if self.check(kind) {
            let token = &self.tokens[self.pos];
            self.advance();
            return Ok(token);
        }

        match self.current() {
            Some(token) => Err(SyntaxError::Expected {
                offset: self.offset(),
                expected,
                found: token.to_string().into(),
            }),
            None => Err(self.eof()),
        }
    }

    /// Offset just past the current token, or the end of input.
    fn offset(&self) -> usize {
        self.ends
            .get(self.pos)
            .or_else(|| self.ends.last())
            .copied()
            .unwrap_or(0)
    }

    /// Offset just past the most recently consumed token.
    fn previous_offset(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|pos| self.ends.get(pos))
            .copied()
            .unwrap_or(0)
    }

    fn eof(&self) -> SyntaxError {
        SyntaxError::UnexpectedEOFDetected {
            offset: self.ends.last().copied().unwrap_or(0),
        }
    }

    fn unexpected_token(&self) -> SyntaxError {
        match self.current() {
            Some(token) => SyntaxError::UnexpectedToken {
                offset: self.offset(),
                token: token.to_string().into(),
            },
            None => self.eof(),
        }
    }
}

/// Lowercases a namespace and expands the single-letter aliases.
fn resolve_namespace(namespace: &str) -> SmolStr {
    let namespace = namespace.to_ascii_lowercase();
    match namespace.as_str() {
        "t" => SmolStr::new_static("temp"),
        "v" => SmolStr::new_static("variable"),
        "q" => SmolStr::new_static("query"),
        "c" => SmolStr::new_static("context"),
        _ => namespace.into(),
    }
}

/// Strips the surrounding quotes and resolves backslash escapes.
fn unescape(literal: &str) -> SmolStr {
    let inner = literal
        .get(1..literal.len().saturating_sub(1))
        .unwrap_or_default();
    if !inner.contains('\\') {
        return inner.into();
    }

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some(escaped @ ('"' | '\'' | '\\')) => result.push(escaped),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }

    result.into()
}
