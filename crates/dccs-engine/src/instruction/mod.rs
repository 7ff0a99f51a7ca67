//! # Instruction Parser
//!
//! Converts a charging-mechanism string into a typed `Instruction`.
//!
//! ## Grammar (whitespace-tokenized)
//! ```text
//! <number> <unit> from <ref> to <ref>   [for maximum <cap> occurrences]
//! <number> <unit> for <mapping>         [for maximum <cap> occurrences]
//! <number> <unit> <keyword> <ref>       [for maximum <cap> occurrences]
//!
//! <ref> := YYYY/MM/DD | YYYY-MM-DD | start phase <code> | end phase <code>
//! ```
//! Any keyword other than `from`/`for` makes a lump sum (conventionally `on`).
//! `<mapping>` is a literal structure parsed by `literal`, never evaluated.
//!
//! ## Examples
//! - `1 unit/day from start phase 10 to end phase 30 for maximum 20 occurrences`
//! - `2 unit/day for {'NTP-01': [10, 20], 'NTP-02': [10]}`
//! - `0.5 unit/day on end phase 15`

mod literal;

use chrono::NaiveDate;
use dccs_models::{DateRef, Instruction, PhaseCode, PhaseEdge, Recurrence};
use rust_decimal::Decimal;
use std::str::FromStr;

const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

// =============================================================================
// Errors
// =============================================================================

/// Malformed instruction text. Each variant names the offending token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Charging mechanism is empty")]
    Empty,

    #[error("Missing {expected} at token {position}")]
    MissingToken {
        expected: &'static str,
        position: usize,
    },

    #[error("Invalid quantity '{token}'")]
    InvalidNumber { token: String },

    #[error("Invalid date '{token}' (expected YYYY/MM/DD)")]
    InvalidDate { token: String },

    #[error("Invalid phase code '{token}'")]
    InvalidPhaseCode { token: String },

    #[error("Unexpected token '{token}', expected {expected}")]
    UnexpectedToken {
        token: String,
        expected: &'static str,
    },

    #[error("Invalid occurrence cap '{token}'")]
    InvalidCap { token: String },

    #[error("Invalid phase mapping at byte {offset}: {message}")]
    InvalidMapping { offset: usize, message: String },
}

// =============================================================================
// Parser
// =============================================================================

/// Parse one charging-mechanism string.
pub fn parse_instruction(text: &str) -> Result<Instruction, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    // A mapping literal may contain spaces, so split it out before tokenizing.
    let (head, mapping, tail) = match text.find('{') {
        Some(brace) => {
            let (phases, used) = literal::parse_phase_set(&text[brace..]).map_err(|e| match e {
                ParseError::InvalidMapping { offset, message } => ParseError::InvalidMapping {
                    offset: offset + brace,
                    message,
                },
                other => other,
            })?;
            (&text[..brace], Some(phases), &text[brace + used..])
        }
        None => (text, None, ""),
    };

    let head_tokens: Vec<&str> = head.split_whitespace().collect();
    let mut tail_tokens: Vec<&str> = tail.split_whitespace().collect();

    let quantity = parse_quantity(head_tokens.first().copied().ok_or(ParseError::Empty)?)?;
    let unit = head_tokens
        .get(1)
        .ok_or(ParseError::MissingToken {
            expected: "unit",
            position: 1,
        })?
        .to_string();
    let keyword = *head_tokens.get(2).ok_or(ParseError::MissingToken {
        expected: "recurrence keyword",
        position: 2,
    })?;

    let (recurrence, max_occurrences) = match (keyword, mapping) {
        ("for", Some(phases)) => {
            if let Some(extra) = head_tokens.get(3) {
                return Err(unexpected(extra, "phase mapping"));
            }
            let cap = take_cap(&mut tail_tokens)?;
            if let Some(extra) = tail_tokens.first() {
                return Err(unexpected(extra, "'for maximum <n> occurrences'"));
            }
            (Recurrence::PhaseSet { phases }, cap)
        }
        ("for", None) => {
            return Err(ParseError::InvalidMapping {
                offset: head.len(),
                message: "expected '{' after 'for'".to_string(),
            });
        }
        (_, Some(_)) => {
            return Err(unexpected("{", "a date reference"));
        }
        ("from", None) => {
            let mut tokens = head_tokens;
            let cap = take_cap(&mut tokens)?;
            let (start, next) = parse_ref(&tokens, 3)?;
            match tokens.get(next) {
                Some(&"to") => {}
                Some(other) => return Err(unexpected(other, "'to'")),
                None => {
                    return Err(ParseError::MissingToken {
                        expected: "'to'",
                        position: next,
                    });
                }
            }
            let (end, next) = parse_ref(&tokens, next + 1)?;
            if let Some(extra) = tokens.get(next) {
                return Err(unexpected(extra, "end of instruction"));
            }
            (Recurrence::DateRange { start, end }, cap)
        }
        (keyword, None) => {
            let mut tokens = head_tokens;
            let cap = take_cap(&mut tokens)?;
            let (date, next) = parse_ref(&tokens, 3)?;
            if let Some(extra) = tokens.get(next) {
                return Err(unexpected(extra, "end of instruction"));
            }
            (
                Recurrence::LumpSum {
                    keyword: keyword.to_string(),
                    date,
                },
                cap,
            )
        }
    };

    Ok(Instruction {
        quantity,
        unit,
        recurrence,
        max_occurrences,
    })
}

fn unexpected(token: &str, expected: &'static str) -> ParseError {
    ParseError::UnexpectedToken {
        token: token.to_string(),
        expected,
    }
}

fn parse_quantity(token: &str) -> Result<Decimal, ParseError> {
    match Decimal::from_str(token) {
        Ok(q) if q >= Decimal::ZERO => Ok(q),
        _ => Err(ParseError::InvalidNumber {
            token: token.to_string(),
        }),
    }
}

/// Remove a trailing `for maximum <n> occurrences` clause, returning the cap.
fn take_cap(tokens: &mut Vec<&str>) -> Result<Option<Decimal>, ParseError> {
    if tokens.last() != Some(&"occurrences") {
        return Ok(None);
    }
    let n = tokens.len();
    if n < 4 || tokens[n - 4] != "for" || tokens[n - 3] != "maximum" {
        return Err(unexpected("occurrences", "'for maximum <n> occurrences'"));
    }
    let token = tokens[n - 2];
    let cap = match Decimal::from_str(token) {
        Ok(cap) if cap >= Decimal::ZERO => cap,
        _ => {
            return Err(ParseError::InvalidCap {
                token: token.to_string(),
            });
        }
    };
    tokens.truncate(n - 4);
    Ok(Some(cap))
}

/// Parse a date reference at `tokens[at]`; returns it and the index after it.
fn parse_ref(tokens: &[&str], at: usize) -> Result<(DateRef, usize), ParseError> {
    let token = *tokens.get(at).ok_or(ParseError::MissingToken {
        expected: "date or phase reference",
        position: at,
    })?;

    let edge = match token {
        "start" => Some(PhaseEdge::Start),
        "end" => Some(PhaseEdge::End),
        _ => None,
    };
    if let Some(edge) = edge {
        match tokens.get(at + 1) {
            Some(&"phase") => {}
            Some(other) => return Err(unexpected(other, "'phase'")),
            None => {
                return Err(ParseError::MissingToken {
                    expected: "'phase'",
                    position: at + 1,
                });
            }
        }
        let code_token = *tokens.get(at + 2).ok_or(ParseError::MissingToken {
            expected: "phase code",
            position: at + 2,
        })?;
        let code = code_token
            .parse::<u32>()
            .map_err(|_| ParseError::InvalidPhaseCode {
                token: code_token.to_string(),
            })?;
        return Ok((
            DateRef::Phase {
                edge,
                code: PhaseCode(code),
            },
            at + 3,
        ));
    }

    if token.starts_with(|c: char| c.is_ascii_digit()) {
        let date = parse_date(token)?;
        return Ok((DateRef::Literal { date }, at + 1));
    }

    Err(unexpected(token, "a date or 'start|end phase <code>'"))
}

/// Parse a literal date in any accepted format.
pub fn parse_date(token: &str) -> Result<NaiveDate, ParseError> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
        .ok_or_else(|| ParseError::InvalidDate {
            token: token.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dccs_models::WellName;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // =========================================================================
    // Test 1: Date range with literal dates and a cap
    // =========================================================================
    #[test]
    fn test_date_range_literal_with_cap() {
        let text = "2 unit/day from 2024-01-01 to 2024/01/05 for maximum 5 occurrences";
        let i = parse_instruction(text).unwrap();
        assert_eq!(i.quantity, Decimal::from(2));
        assert_eq!(i.unit, "unit/day");
        assert_eq!(i.max_occurrences, Some(Decimal::from(5)));
        assert_eq!(
            i.recurrence,
            Recurrence::DateRange {
                start: DateRef::Literal { date: ymd(2024, 1, 1) },
                end: DateRef::Literal { date: ymd(2024, 1, 5) },
            }
        );
    }

    // =========================================================================
    // Test 2: Date range with symbolic references
    // =========================================================================
    #[test]
    fn test_date_range_symbolic() {
        let i = parse_instruction("1.5 unit/day from start phase 10 to end phase 30").unwrap();
        assert_eq!(i.quantity, Decimal::new(15, 1));
        assert_eq!(i.max_occurrences, None);
        assert_eq!(
            i.recurrence,
            Recurrence::DateRange {
                start: DateRef::Phase {
                    edge: PhaseEdge::Start,
                    code: PhaseCode(10)
                },
                end: DateRef::Phase {
                    edge: PhaseEdge::End,
                    code: PhaseCode(30)
                },
            }
        );
    }

    // =========================================================================
    // Test 3: Phase set with cap
    // =========================================================================
    #[test]
    fn test_phase_set() {
        let i = parse_instruction(
            "1 unit/day for {'Well1': [10, 20], 'Well2': [30]} for maximum 12.5 occurrences",
        )
        .unwrap();
        assert_eq!(i.max_occurrences, Some(Decimal::new(125, 1)));
        let Recurrence::PhaseSet { phases } = i.recurrence else {
            panic!("expected phase set");
        };
        assert_eq!(phases[&WellName::new("Well1")], vec![PhaseCode(10), PhaseCode(20)]);
        assert_eq!(phases[&WellName::new("Well2")], vec![PhaseCode(30)]);
    }

    // =========================================================================
    // Test 4: Lump sum on a phase edge and on a literal date
    // =========================================================================
    #[test]
    fn test_lump_sum() {
        let i = parse_instruction("10 unit/day on start phase 5").unwrap();
        assert!(i.is_lump_sum());
        assert_eq!(
            i.recurrence,
            Recurrence::LumpSum {
                keyword: "on".to_string(),
                date: DateRef::Phase {
                    edge: PhaseEdge::Start,
                    code: PhaseCode(5)
                },
            }
        );

        let i = parse_instruction("  0.5 lot on 2024/02/10 ").unwrap();
        assert_eq!(
            i.recurrence,
            Recurrence::LumpSum {
                keyword: "on".to_string(),
                date: DateRef::Literal { date: ymd(2024, 2, 10) },
            }
        );
    }

    // =========================================================================
    // Test 5: Each malformation has its own error
    // =========================================================================
    #[test]
    fn test_error_kinds() {
        assert_eq!(parse_instruction("   "), Err(ParseError::Empty));
        assert_eq!(
            parse_instruction("two unit/day on 2024/01/01"),
            Err(ParseError::InvalidNumber { token: "two".into() })
        );
        assert_eq!(
            parse_instruction("-1 unit/day on 2024/01/01"),
            Err(ParseError::InvalidNumber { token: "-1".into() })
        );
        assert_eq!(
            parse_instruction("1"),
            Err(ParseError::MissingToken { expected: "unit", position: 1 })
        );
        assert_eq!(
            parse_instruction("1 unit/day"),
            Err(ParseError::MissingToken { expected: "recurrence keyword", position: 2 })
        );
        assert_eq!(
            parse_instruction("1 unit/day on 2024/13/01"),
            Err(ParseError::InvalidDate { token: "2024/13/01".into() })
        );
        assert_eq!(
            parse_instruction("1 unit/day on start phase X"),
            Err(ParseError::InvalidPhaseCode { token: "X".into() })
        );
        assert_eq!(
            parse_instruction("1 unit/day from 2024/01/01 until 2024/01/05"),
            Err(ParseError::UnexpectedToken {
                token: "until".into(),
                expected: "'to'"
            })
        );
        assert_eq!(
            parse_instruction(
                "1 unit/day from 2024/01/01 to 2024/01/05 for maximum many occurrences"
            ),
            Err(ParseError::InvalidCap { token: "many".into() })
        );
        assert!(matches!(
            parse_instruction("1 unit/day for maximum 5 occurrences"),
            Err(ParseError::InvalidMapping { .. })
        ));
        assert!(matches!(
            parse_instruction("1 unit/day on start phase 5 extra"),
            Err(ParseError::UnexpectedToken { .. })
        ));
    }

    // =========================================================================
    // Test 6: Mapping offsets are reported against the whole instruction
    // =========================================================================
    #[test]
    fn test_mapping_error_offset_is_absolute() {
        let err = parse_instruction("1 unit/day for {'W': [1 + 2]}").unwrap_err();
        assert!(matches!(err, ParseError::InvalidMapping { offset: 24, .. }));
    }

    // =========================================================================
    // Test 7: Text after the mapping must be a cap clause
    // =========================================================================
    #[test]
    fn test_mapping_tail_rejected() {
        assert_eq!(
            parse_instruction("1 unit/day for {'W': [10]} or {}"),
            Err(ParseError::UnexpectedToken {
                token: "or".into(),
                expected: "'for maximum <n> occurrences'"
            })
        );
        assert_eq!(
            parse_instruction("1 unit/day on {'W': [10]}"),
            Err(ParseError::UnexpectedToken { token: "{".into(), expected: "a date reference" })
        );
        assert_eq!(
            parse_instruction("1 unit/day for {'W': [10]} plus"),
            Err(ParseError::UnexpectedToken {
                token: "plus".into(),
                expected: "'for maximum <n> occurrences'"
            })
        );
    }
}
