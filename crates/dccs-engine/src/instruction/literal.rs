//! Phase-set mapping literal: `{'Well-1': [10, 20], "Well-2": [30]}`.
//!
//! Only this literal grammar is accepted; anything else is rejected with the
//! byte offset of the first offending character.
//!
//! ```text
//! map    := '{' [entry (',' entry)* [',']] '}'
//! entry  := key ':' list
//! key    := quoted | bare
//! list   := '[' [code (',' code)* [',']] ']'
//! code   := digits | quoted digits
//! quoted := '...' | "..."          (no escapes)
//! bare   := [A-Za-z0-9_.-]+
//! ```

use super::ParseError;
use dccs_models::{PhaseCode, PhaseSet, WellName};

/// Parse a mapping starting at `src[0] == '{'`.
/// Returns the mapping and the number of bytes consumed (through the closing `}`).
pub(super) fn parse_phase_set(src: &str) -> Result<(PhaseSet, usize), ParseError> {
    let mut cursor = Cursor { src, pos: 0 };
    let phases = cursor.map()?;
    Ok((phases, cursor.pos))
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::InvalidMapping {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == wanted => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", wanted, c))),
            None => Err(self.error(format!("expected '{}', found end of input", wanted))),
        }
    }

    /// Consume `,` if present, then report whether `close` follows.
    fn separator_or_close(&mut self, close: char) -> Result<bool, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some(',') => {
                self.bump();
                self.skip_ws();
                if self.peek() == Some(close) {
                    self.bump();
                    return Ok(true);
                }
                Ok(false)
            }
            Some(c) if c == close => {
                self.bump();
                Ok(true)
            }
            Some(c) => Err(self.error(format!("expected ',' or '{}', found '{}'", close, c))),
            None => Err(self.error(format!("expected ',' or '{}', found end of input", close))),
        }
    }

    fn map(&mut self) -> Result<PhaseSet, ParseError> {
        let mut phases = PhaseSet::new();
        self.expect('{')?;
        self.skip_ws();
        if self.peek() == Some('}') {
            return Err(self.error("mapping lists no wells"));
        }
        loop {
            let key_at = self.pos;
            let well = WellName::new(self.key()?);
            self.expect(':')?;
            let codes = self.list()?;
            if codes.is_empty() {
                return Err(ParseError::InvalidMapping {
                    offset: key_at,
                    message: format!("no phase codes listed for well '{}'", well),
                });
            }
            if phases.insert(well.clone(), codes).is_some() {
                return Err(ParseError::InvalidMapping {
                    offset: key_at,
                    message: format!("well '{}' listed twice", well),
                });
            }
            if self.separator_or_close('}')? {
                return Ok(phases);
            }
        }
    }

    fn key(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('\'') | Some('"') => self.quoted(),
            Some(c) if is_bare(c) => Ok(self.bare()),
            Some(c) => Err(self.error(format!("expected well name, found '{}'", c))),
            None => Err(self.error("expected well name, found end of input")),
        }
    }

    fn list(&mut self) -> Result<Vec<PhaseCode>, ParseError> {
        let mut codes: Vec<PhaseCode> = Vec::new();
        self.expect('[')?;
        self.skip_ws();
        if self.peek() == Some(']') {
            self.bump();
            return Ok(codes);
        }
        loop {
            let code = self.code()?;
            if !codes.contains(&code) {
                codes.push(code);
            }
            if self.separator_or_close(']')? {
                return Ok(codes);
            }
        }
    }

    fn code(&mut self) -> Result<PhaseCode, ParseError> {
        self.skip_ws();
        let at = self.pos;
        let text = match self.peek() {
            Some('\'') | Some('"') => self.quoted()?,
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.bump();
                }
                self.src[start..self.pos].to_string()
            }
            Some(c) => return Err(self.error(format!("expected phase code, found '{}'", c))),
            None => return Err(self.error("expected phase code, found end of input")),
        };
        text.trim()
            .parse::<u32>()
            .map(PhaseCode)
            .map_err(|_| ParseError::InvalidMapping {
                offset: at,
                message: format!("'{}' is not a phase code", text),
            })
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        let open_at = self.pos;
        let quote = self.bump().unwrap_or('\'');
        let start = self.pos;
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(self.src[start..self.pos - 1].to_string()),
                Some('\\') => return Err(self.error("escape sequences are not allowed")),
                Some(_) => {}
                None => {
                    return Err(ParseError::InvalidMapping {
                        offset: open_at,
                        message: "unterminated string".to_string(),
                    });
                }
            }
        }
    }

    fn bare(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(is_bare) {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }
}

fn is_bare(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}
