// src/parser.rs
//! Character cursor shared by the path parser and the filter lexer.

/// A byte-offset cursor over a borrowed string.
///
/// `base` is added to every reported offset so that a cursor over the
/// contents of a `[...]` value filter reports positions relative to the
/// enclosing path string.
pub struct Parser<'a> {
    s: &'a str,
    i: usize,
    base: usize,
}

impl<'a> Parser<'a> {
    #[cfg(test)]
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0, base: 0 }
    }

    pub fn with_base(s: &'a str, base: usize) -> Self {
        Self { s, i: 0, base }
    }

    /// Offset of the cursor, including the base.
    pub fn pos(&self) -> usize {
        self.base + self.i
    }

    #[cfg(test)]
    pub fn rest(&self) -> &'a str {
        &self.s[self.i..]
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.i += c.len_utf8();
        Some(c)
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Consume characters while `pred` holds and return them.
    pub fn take_while<F>(&mut self, pred: F) -> &'a str
    where
        F: Fn(char) -> bool,
    {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if pred(c) {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        &self.s[start..self.i]
    }

    /// Consume a double-quoted JSON string literal, returning the raw text
    /// including both quotes. `Err` carries the offset of the opening quote.
    pub fn take_quoted(&mut self) -> Result<&'a str, usize> {
        let start = self.i;
        if !self.consume_char('"') {
            return Err(self.base + start);
        }
        let mut escaped = false;
        while let Some(c) = self.bump() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                return Ok(&self.s[start..self.i]);
            }
        }
        self.i = start;
        Err(self.base + start)
    }

    /// With the cursor on `[`, consume up to and including the matching `]`
    /// and return the text in between. Brackets inside string literals are
    /// ignored. `Err` carries the offset of the opening bracket.
    pub fn take_bracketed(&mut self) -> Result<&'a str, usize> {
        let start = self.i;
        if !self.consume_char('[') {
            return Err(self.base + start);
        }
        let inner_start = self.i;
        let mut depth = 1usize;
        loop {
            match self.peek_char() {
                None => {
                    self.i = start;
                    return Err(self.base + start);
                }
                Some('"') => {
                    if self.take_quoted().is_err() {
                        self.i = start;
                        return Err(self.base + start);
                    }
                }
                Some('[') => {
                    depth += 1;
                    self.i += 1;
                }
                Some(']') => {
                    depth -= 1;
                    self.i += 1;
                    if depth == 0 {
                        return Ok(&self.s[inner_start..self.i - 1]);
                    }
                }
                Some(c) => self.i += c.len_utf8(),
            }
        }
    }

    pub fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bracketed_skips_quoted_brackets() {
        let mut p = Parser::new(r#"[value eq "a]b"].display"#);
        assert_eq!(p.take_bracketed(), Ok(r#"value eq "a]b""#));
        assert_eq!(p.rest(), ".display");
    }

    #[test]
    fn unterminated_bracket_reports_opening_offset() {
        let mut p = Parser::with_base("[type eq \"work\"", 6);
        assert_eq!(p.take_bracketed(), Err(6));
        assert_eq!(p.pos(), 6);
    }

    #[test]
    fn quoted_handles_escapes() {
        let mut p = Parser::new(r#""a\"b" rest"#);
        assert_eq!(p.take_quoted(), Ok(r#""a\"b""#));
        p.skip_ws();
        assert_eq!(p.rest(), "rest");
    }
}
