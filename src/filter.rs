use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use itertools::Itertools;
use serde_json::Value;

use crate::context::ParserOptions;
use crate::errors::ParseError;
use crate::lexer::{self, Token, TokenKind};
use crate::path::Path;

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl CompareOp {
    pub fn keyword(self) -> &'static str {
        match self {
            CompareOp::Equal => "eq",
            CompareOp::NotEqual => "ne",
            CompareOp::Contains => "co",
            CompareOp::StartsWith => "sw",
            CompareOp::EndsWith => "ew",
            CompareOp::GreaterThan => "gt",
            CompareOp::GreaterOrEqual => "ge",
            CompareOp::LessThan => "lt",
            CompareOp::LessOrEqual => "le",
        }
    }

    /// Case-insensitive keyword lookup. `pr` is not a comparison.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let op = match word.to_ascii_lowercase().as_str() {
            "eq" => CompareOp::Equal,
            "ne" => CompareOp::NotEqual,
            "co" => CompareOp::Contains,
            "sw" => CompareOp::StartsWith,
            "ew" => CompareOp::EndsWith,
            "gt" => CompareOp::GreaterThan,
            "ge" => CompareOp::GreaterOrEqual,
            "lt" => CompareOp::LessThan,
            "le" => CompareOp::LessOrEqual,
            _ => return None,
        };
        Some(op)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A SCIM filter expression.
///
/// `value` in a comparison is always a string, number, boolean or null.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        op: CompareOp,
        path: Path,
        value: Value,
    },
    Present(Path),
    /// True when every term is. Terms are never themselves `And`.
    And(Vec<Filter>),
    /// True when any term is. Terms are never themselves `Or`.
    Or(Vec<Filter>),
    Not(Box<Filter>),
    /// `path[filter]`: `filter` is applied to each value of `path`.
    Complex {
        path: Path,
        filter: Box<Filter>,
    },
}

impl Filter {
    pub fn compare(op: CompareOp, path: Path, value: impl Into<Value>) -> Self {
        Filter::Compare {
            op,
            path,
            value: value.into(),
        }
    }

    pub fn eq(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Equal, path, value)
    }

    pub fn ne(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::NotEqual, path, value)
    }

    pub fn co(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::Contains, path, value)
    }

    pub fn sw(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::StartsWith, path, value)
    }

    pub fn ew(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::EndsWith, path, value)
    }

    pub fn gt(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::GreaterThan, path, value)
    }

    pub fn ge(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::GreaterOrEqual, path, value)
    }

    pub fn lt(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::LessThan, path, value)
    }

    pub fn le(path: Path, value: impl Into<Value>) -> Self {
        Self::compare(CompareOp::LessOrEqual, path, value)
    }

    pub fn pr(path: Path) -> Self {
        Filter::Present(path)
    }

    /// Conjunction of `left` and `right`, flattening existing `and` chains.
    pub fn and(left: Filter, right: Filter) -> Self {
        let mut terms = match left {
            Filter::And(terms) => terms,
            other => vec![other],
        };
        match right {
            Filter::And(more) => terms.extend(more),
            other => terms.push(other),
        }
        Filter::And(terms)
    }

    /// Disjunction of `left` and `right`, flattening existing `or` chains.
    pub fn or(left: Filter, right: Filter) -> Self {
        let mut terms = match left {
            Filter::Or(terms) => terms,
            other => vec![other],
        };
        match right {
            Filter::Or(more) => terms.extend(more),
            other => terms.push(other),
        }
        Filter::Or(terms)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Filter) -> Self {
        Filter::Not(Box::new(inner))
    }

    pub fn complex(path: Path, filter: Filter) -> Self {
        Filter::Complex {
            path,
            filter: Box::new(filter),
        }
    }

    pub fn parse(input: &str, opts: &ParserOptions) -> Result<Self, ParseError> {
        parse_filter(input, opts)
    }
}

struct Grouped<'a>(&'a Filter, bool);

impl fmt::Display for Grouped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Renders the canonical form of the filter, which parses back to an equal
/// value. Parentheses appear only where precedence needs them, except that
/// `not` always wraps its operand (`not (a pr)`), even though the parser
/// also accepts the bare `not a pr`.
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Compare { op, path, value } => write!(f, "{path} {op} {value}"),
            Filter::Present(path) => write!(f, "{path} pr"),
            Filter::And(terms) => {
                let terms = terms
                    .iter()
                    .map(|t| Grouped(t, matches!(t, Filter::Or(_) | Filter::And(_))));
                write!(f, "{}", terms.format(" and "))
            }
            Filter::Or(terms) => {
                let terms = terms.iter().map(|t| Grouped(t, matches!(t, Filter::Or(_))));
                write!(f, "{}", terms.format(" or "))
            }
            Filter::Not(inner) => write!(f, "not ({inner})"),
            Filter::Complex { path, filter } => write!(f, "{path}[{filter}]"),
        }
    }
}

impl FromStr for Filter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_filter(s, &ParserOptions::default())
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a SCIM filter such as `name.familyName eq "Jensen" and active pr`.
///
/// Precedence is `not` over `and` over `or`. Chains of `and` or `or` become
/// one n-ary node, so only parentheses, `not` and value filters count
/// toward [`ParserOptions::max_depth`].
pub fn parse_filter(input: &str, opts: &ParserOptions) -> Result<Filter, ParseError> {
    tracing::trace!(input, "parsing filter");
    FilterParser::new(input, 0, opts, false)?.parse_all()
}

/// Parse the contents of a path element's `[...]`. `base` is the offset of
/// `input` inside the enclosing string.
pub(crate) fn parse_value_filter(
    input: &str,
    base: usize,
    opts: &ParserOptions,
) -> Result<Filter, ParseError> {
    FilterParser::new(input, base, opts, true)?.parse_all()
}

struct FilterParser<'a> {
    input: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
    end: usize,
    opts: &'a ParserOptions,
    depth: usize,
    in_value_filter: bool,
}

impl<'a> FilterParser<'a> {
    fn new(
        input: &'a str,
        base: usize,
        opts: &'a ParserOptions,
        in_value_filter: bool,
    ) -> Result<Self, ParseError> {
        Ok(Self {
            input,
            tokens: lexer::tokenize(input, base)?,
            pos: 0,
            end: base + input.len(),
            opts,
            depth: usize::from(in_value_filter),
            in_value_filter,
        })
    }

    fn parse_all(mut self) -> Result<Filter, ParseError> {
        if self.tokens.is_empty() {
            return Err(self.error_at(self.end, "empty filter"));
        }
        let filter = self.parse_or()?;
        if let Some(tok) = self.peek() {
            return Err(self.error_at(tok.offset, format!("unexpected {:?}", tok.text)));
        }
        Ok(filter)
    }

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn next_is(&self, kind: &TokenKind) -> bool {
        self.peek().map(|t| &t.kind == kind).unwrap_or(false)
    }

    fn offset(&self) -> usize {
        self.peek().map(|t| t.offset).unwrap_or(self.end)
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::filter(self.input, offset, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), ParseError> {
        if self.next_is(&kind) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error_at(self.offset(), format!("expected {what}")))
        }
    }

    fn descend(&mut self, offset: usize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.opts.max_depth {
            return Err(self.error_at(
                offset,
                format!("filter is nested deeper than {}", self.opts.max_depth),
            ));
        }
        Ok(())
    }

    fn parse_or(&mut self) -> Result<Filter, ParseError> {
        let mut left = self.parse_and()?;
        while self.next_is(&TokenKind::Or) {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Filter::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter, ParseError> {
        let mut left = self.parse_not()?;
        while self.next_is(&TokenKind::And) {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Filter::and(left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Filter, ParseError> {
        if self.next_is(&TokenKind::Not) {
            let offset = self.offset();
            self.pos += 1;
            self.descend(offset)?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Filter::not(inner));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Filter, ParseError> {
        let offset = self.offset();
        if self.next_is(&TokenKind::LParen) {
            self.pos += 1;
            self.descend(offset)?;
            let inner = self.parse_or()?;
            self.expect(TokenKind::RParen, "')'")?;
            self.depth -= 1;
            return Ok(inner);
        }

        let path = self.parse_attr_path()?;

        if self.next_is(&TokenKind::LBracket) {
            let open = self.offset();
            if self.in_value_filter {
                return Err(self.error_at(open, "value filters may not be nested"));
            }
            self.pos += 1;
            self.descend(open)?;
            self.in_value_filter = true;
            let inner = self.parse_or()?;
            self.in_value_filter = false;
            self.expect(TokenKind::RBracket, "']'")?;
            self.depth -= 1;
            return Ok(Filter::complex(path, inner));
        }

        let op_offset = self.offset();
        match self.next().map(|t| t.kind) {
            Some(TokenKind::Present) => Ok(Filter::pr(path)),
            Some(TokenKind::Operator(op)) => {
                let value = self.parse_literal()?;
                Ok(Filter::Compare { op, path, value })
            }
            _ => Err(self.error_at(op_offset, "expected a comparison operator")),
        }
    }

    fn parse_attr_path(&mut self) -> Result<Path, ParseError> {
        let offset = self.offset();
        let tok = match self.peek() {
            Some(tok) if tok.is_word() && tok.kind != TokenKind::Not => tok.clone(),
            _ => return Err(self.error_at(offset, "expected an attribute path")),
        };
        self.pos += 1;
        Path::parse(tok.text, self.opts)
            .map_err(|e| self.error_at(tok.offset + e.offset(), e.message()))
    }

    fn parse_literal(&mut self) -> Result<Value, ParseError> {
        let offset = self.offset();
        let value = match self.next().map(|t| t.kind) {
            Some(TokenKind::String(s)) => Value::String(s),
            Some(TokenKind::Number(n)) => Value::Number(n),
            Some(TokenKind::Boolean(b)) => Value::Bool(b),
            Some(TokenKind::Null) => Value::Null,
            _ => return Err(self.error_at(offset, "expected a quoted string, number, boolean or null")),
        };
        Ok(value)
    }
}
