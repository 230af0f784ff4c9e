//! Filter tokenizer.

use serde_json::Number;

use crate::errors::ParseError;
use crate::filter::CompareOp;
use crate::parser::Parser;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    AttrPath,
    Operator(CompareOp),
    Present,
    String(String),
    Number(Number),
    Boolean(bool),
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub offset: usize,
}

impl Token<'_> {
    /// Words that can stand for an attribute name when one is expected.
    pub fn is_word(&self) -> bool {
        !matches!(
            self.kind,
            TokenKind::String(_)
                | TokenKind::Number(_)
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::LBracket
                | TokenKind::RBracket
        )
    }
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '[' | ']' | '"')
}

/// Split `input` into tokens. Offsets are reported relative to `base`.
pub fn tokenize(input: &str, base: usize) -> Result<Vec<Token<'_>>, ParseError> {
    let mut p = Parser::with_base(input, base);
    let mut out = Vec::new();
    loop {
        p.skip_ws();
        let offset = p.pos();
        let Some(c) = p.peek_char() else { break };
        let punct = match c {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '[' => Some(TokenKind::LBracket),
            ']' => Some(TokenKind::RBracket),
            _ => None,
        };
        if let Some(kind) = punct {
            let start = offset - base;
            p.bump();
            out.push(Token {
                kind,
                text: &input[start..start + 1],
                offset,
            });
            continue;
        }
        if c == '"' {
            let raw = p
                .take_quoted()
                .map_err(|off| ParseError::filter(input, off, "unterminated string literal"))?;
            let value: String = serde_json::from_str(raw)
                .map_err(|e| ParseError::filter(input, offset, format!("bad string literal: {e}")))?;
            out.push(Token {
                kind: TokenKind::String(value),
                text: raw,
                offset,
            });
            continue;
        }
        let word = p.take_while(is_word_char);
        out.push(Token {
            kind: classify(input, word, offset)?,
            text: word,
            offset,
        });
    }
    Ok(out)
}

fn classify(input: &str, word: &str, offset: usize) -> Result<TokenKind, ParseError> {
    let mut chars = word.chars();
    let first = chars.next().unwrap_or(' ');
    let numeric = first.is_ascii_digit()
        || (first == '-' && chars.next().map(|c| c.is_ascii_digit()).unwrap_or(false));
    if numeric {
        return serde_json::from_str::<Number>(word)
            .map(TokenKind::Number)
            .map_err(|_| ParseError::filter(input, offset, format!("invalid number {word:?}")));
    }
    if let Some(op) = CompareOp::from_keyword(word) {
        return Ok(TokenKind::Operator(op));
    }
    let kind = match word.to_ascii_lowercase().as_str() {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "pr" => TokenKind::Present,
        "true" => TokenKind::Boolean(true),
        "false" => TokenKind::Boolean(false),
        "null" => TokenKind::Null,
        _ => TokenKind::AttrPath,
    };
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input, 0)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_comparison() {
        assert_eq!(
            kinds(r#"userName EQ "bjensen""#),
            vec![
                TokenKind::AttrPath,
                TokenKind::Operator(CompareOp::Equal),
                TokenKind::String("bjensen".into()),
            ]
        );
    }

    #[test]
    fn tokenizes_grouping_and_literals() {
        assert_eq!(
            kinds("not (age gt -1.5) or active eq TRUE and x eq null"),
            vec![
                TokenKind::Not,
                TokenKind::LParen,
                TokenKind::AttrPath,
                TokenKind::Operator(CompareOp::GreaterThan),
                TokenKind::Number(serde_json::from_str("-1.5").unwrap()),
                TokenKind::RParen,
                TokenKind::Or,
                TokenKind::AttrPath,
                TokenKind::Operator(CompareOp::Equal),
                TokenKind::Boolean(true),
                TokenKind::And,
                TokenKind::AttrPath,
                TokenKind::Operator(CompareOp::Equal),
                TokenKind::Null,
            ]
        );
    }

    #[test]
    fn offsets_include_base() {
        let tokens = tokenize(r#"type eq "work""#, 7).unwrap();
        assert_eq!(tokens[2].offset, 15);
        assert_eq!(tokens[2].text, r#""work""#);
    }

    #[test]
    fn rejects_bad_number_and_open_string() {
        assert!(tokenize("a eq 12x", 0).is_err());
        let err = tokenize(r#"a eq "open"#, 0).unwrap_err();
        assert_eq!(err.offset(), 5);
    }
}
