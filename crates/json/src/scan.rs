use crate::Error;

/// Token is the kind of a scanned JSON value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Null,
    Boolean,
    Number,
    String,
    Object,
    Array,
}

/// Returns true iff `text`, ignoring leading and trailing whitespace,
/// is exactly one JSON value.
pub fn validate(text: &str) -> bool {
    let mut scanner = Scanner::new(text);
    match scanner.scan_value() {
        Ok(_) => {
            scanner.skip_ws();
            scanner.at_end()
        }
        Err(_) => false,
    }
}

/// Container frames tracked by the non-recursive value scan.
enum Frame {
    Object,
    Array,
}

/// Scanner walks JSON text without recursing, so that arbitrarily deep
/// documents cannot exhaust the stack.
pub(crate) struct Scanner<'t> {
    text: &'t str,
    pos: usize,
}

impl<'t> Scanner<'t> {
    pub fn new(text: &'t str) -> Scanner<'t> {
        Scanner { text, pos: 0 }
    }

    pub fn at_end(&self) -> bool {
        self.pos == self.text.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    pub fn bump(&mut self) {
        self.pos += 1;
    }

    pub fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
            self.pos += 1;
        }
    }

    /// Scan exactly one JSON value beginning at the cursor, leaving the
    /// cursor one past its end. Returns the value's kind and raw text.
    pub fn scan_value(&mut self) -> Result<(Token, &'t str), Error> {
        self.skip_ws();
        let start = self.pos;

        // The first byte fixes the kind of the outermost value.
        let top = match self.peek() {
            Some(b'{') => Token::Object,
            Some(b'[') => Token::Array,
            Some(b'"') => Token::String,
            Some(b't') | Some(b'f') => Token::Boolean,
            Some(b'n') => Token::Null,
            Some(c) if c == b'-' || c.is_ascii_digit() => Token::Number,
            _ => return Err(Error::Format),
        };

        let mut stack: Vec<Frame> = Vec::new();

        'value: loop {
            self.skip_ws();
            match self.peek() {
                Some(b'{') => {
                    self.bump();
                    self.skip_ws();
                    if self.peek() == Some(b'}') {
                        self.bump();
                    } else {
                        stack.push(Frame::Object);
                        self.scan_member_name()?;
                        continue 'value;
                    }
                }
                Some(b'[') => {
                    self.bump();
                    self.skip_ws();
                    if self.peek() == Some(b']') {
                        self.bump();
                    } else {
                        stack.push(Frame::Array);
                        continue 'value;
                    }
                }
                Some(b'"') => {
                    self.scan_string()?;
                }
                Some(b't') => self.expect_literal("true")?,
                Some(b'f') => self.expect_literal("false")?,
                Some(b'n') => self.expect_literal("null")?,
                Some(c) if c == b'-' || c.is_ascii_digit() => self.scan_number()?,
                _ => return Err(Error::Format),
            }

            // A value just completed. Consume separators and close out
            // any containers it completes in turn.
            loop {
                match stack.last() {
                    None => break 'value,
                    Some(Frame::Object) => {
                        self.skip_ws();
                        match self.peek() {
                            Some(b',') => {
                                self.bump();
                                self.skip_ws();
                                self.scan_member_name()?;
                                continue 'value;
                            }
                            Some(b'}') => {
                                self.bump();
                                stack.pop();
                            }
                            _ => return Err(Error::Format),
                        }
                    }
                    Some(Frame::Array) => {
                        self.skip_ws();
                        match self.peek() {
                            Some(b',') => {
                                self.bump();
                                continue 'value;
                            }
                            Some(b']') => {
                                self.bump();
                                stack.pop();
                            }
                            _ => return Err(Error::Format),
                        }
                    }
                }
            }
        }

        Ok((top, &self.text[start..self.pos]))
    }

    /// Scan a quoted member name and its following colon,
    /// leaving the cursor at the member value.
    fn scan_member_name(&mut self) -> Result<&'t str, Error> {
        if self.peek() != Some(b'"') {
            return Err(Error::Format);
        }
        let name = self.scan_string()?;
        self.skip_ws();
        if self.peek() != Some(b':') {
            return Err(Error::Format);
        }
        self.bump();
        Ok(name)
    }

    /// Scan a string beginning at its opening quote, returning the raw
    /// text between the quotes. `\"` is the only escape recognized;
    /// it is sufficient to delimit the string.
    pub fn scan_string(&mut self) -> Result<&'t str, Error> {
        self.bump(); // opening quote
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err(Error::Format),
                Some(b'"') => {
                    let raw = &self.text[start..self.pos];
                    self.bump();
                    return Ok(raw);
                }
                Some(b'\\') if self.peek_at(1) == Some(b'"') => self.pos += 2,
                Some(_) => self.pos += 1,
            }
        }
    }

    fn scan_number(&mut self) -> Result<(), Error> {
        if self.peek() == Some(b'-') {
            self.bump();
        }
        let mut digits = 0;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            digits += 1;
        }
        if digits == 0 {
            return Err(Error::Format);
        }
        if self.peek() == Some(b'.') {
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.bump();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.bump();
            }
            let mut exponent = 0;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
                exponent += 1;
            }
            if exponent == 0 {
                return Err(Error::Format);
            }
        }
        Ok(())
    }

    fn expect_literal(&mut self, literal: &str) -> Result<(), Error> {
        if self.text[self.pos..].starts_with(literal) {
            self.pos += literal.len();
            Ok(())
        } else {
            Err(Error::Format)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_accepts_values() {
        for case in [
            "null",
            "true",
            "false",
            "0",
            "-12.5e3",
            "1.",
            "\"hello\"",
            "\"esc \\\" aped\"",
            "{}",
            "[]",
            "  {\"a\": 1, \"b\": [2, 3, {\"c\": null}]}  ",
            "[[[[[[[[1]]]]]]]]",
            "{\"t\":{\"h\":77,\"p\":1013}}",
        ] {
            assert!(validate(case), "expected valid: {}", case);
        }
    }

    #[test]
    fn test_validate_rejects_values() {
        for case in [
            "",
            "   ",
            "nul",
            "truefalse",
            "1 2",
            "-",
            "1e",
            "\"unterminated",
            "{\"a\" 1}",   // missing colon
            "{\"a\":}",    // missing value
            "{\"a\":1,}",  // trailing comma
            "[1,]",
            "[1 2]",
            "{]",
            "{\"a\":1} extra",
            "\"a\\\"", // escaped closing quote leaves the string open
        ] {
            assert!(!validate(case), "expected invalid: {}", case);
        }
    }

    #[test]
    fn test_scan_value_spans() {
        let mut s = Scanner::new("  {\"a\": [1, 2]}  ");
        let (token, raw) = s.scan_value().unwrap();
        assert_eq!(token, Token::Object);
        assert_eq!(raw, "{\"a\": [1, 2]}");
    }

    #[test]
    fn test_scan_string_escape_rule() {
        let mut s = Scanner::new("\"a\\\"b\"");
        assert_eq!(s.scan_string().unwrap(), "a\\\"b");

        // A backslash not followed by a quote is an ordinary byte.
        let mut s = Scanner::new("\"a\\b\"");
        assert_eq!(s.scan_string().unwrap(), "a\\b");
    }
}
