use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::time_utils::TimezoneHandler;

// ── NumberParser ──────────────────────────────────────────────────────────────

/// Coerces the loosely formatted numeric cells found in platform exports.
pub struct NumberParser;

impl NumberParser {
    /// Parse a cell, stripping thousands separators, currency symbols,
    /// whitespace and a trailing `%`.
    ///
    /// Unparseable or non-finite values normalise to `0.0`.
    pub fn parse(raw: &str) -> f64 {
        Self::parse_opt(raw).unwrap_or(0.0)
    }

    /// Like [`parse`](Self::parse) but distinguishes an empty cell (`None`)
    /// from a present one.
    pub fn parse_opt(raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let cleaned: String = trimmed
            .trim_end_matches('%')
            .chars()
            .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | '¥' | ' ' | '\u{a0}'))
            .collect();
        let value = cleaned.parse::<f64>().unwrap_or(0.0);
        Some(if value.is_finite() { value } else { 0.0 })
    }

    /// Parse a non-negative whole count; fractional values are rounded.
    pub fn parse_count(raw: &str) -> u64 {
        Self::parse_count_opt(raw).unwrap_or(0)
    }

    /// Count variant of [`parse_opt`](Self::parse_opt).
    pub fn parse_count_opt(raw: &str) -> Option<u64> {
        let value = Self::parse_opt(raw)?;
        Some(if value > 0.0 { value.round() as u64 } else { 0 })
    }
}

// ── RateParser ────────────────────────────────────────────────────────────────

/// Interprets rate cells that may be percent strings or decimal fractions.
pub struct RateParser;

impl RateParser {
    /// Return the rate as a fraction (`0.25` for 25 %).
    ///
    /// A trailing `%` selects percent semantics; anything else is read as a
    /// decimal fraction. Empty cells yield `None`.
    pub fn parse_fraction(raw: &str) -> Option<f64> {
        let trimmed = raw.trim();
        let value = NumberParser::parse_opt(trimmed)?;
        if trimmed.ends_with('%') {
            Some(value / 100.0)
        } else {
            Some(value)
        }
    }

    /// Return a percent cell as a fraction, with or without the `%` sign.
    pub fn parse_percent(raw: &str) -> Option<f64> {
        NumberParser::parse_opt(raw).map(|value| value / 100.0)
    }
}

// ── ConsentParser ─────────────────────────────────────────────────────────────

/// Result of interpreting an email-marketing consent cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consent {
    pub granted: bool,
    pub granted_at: Option<DateTime<Utc>>,
}

/// Interprets consent cells, failing closed.
pub struct ConsentParser;

impl ConsentParser {
    /// `TRUE` grants, `FALSE` and `NEVER_SUBSCRIBED` deny, a parseable
    /// timestamp grants at that time; everything else denies.
    pub fn parse(raw: &str, timezone: &TimezoneHandler) -> Consent {
        let trimmed = raw.trim();
        match trimmed.to_uppercase().as_str() {
            "TRUE" => {
                return Consent {
                    granted: true,
                    granted_at: None,
                }
            }
            "FALSE" | "NEVER_SUBSCRIBED" | "" => {
                return Consent {
                    granted: false,
                    granted_at: None,
                }
            }
            _ => {}
        }

        match timezone.parse_utc(trimmed) {
            Ok(ts) => Consent {
                granted: true,
                granted_at: Some(ts),
            },
            Err(_) => Consent {
                granted: false,
                granted_at: None,
            },
        }
    }
}

// ── SuppressionParser ─────────────────────────────────────────────────────────

/// Parsed suppression list of a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Suppressions {
    pub tokens: Vec<String>,
    pub can_receive_email: bool,
}

/// Interprets the bracketed suppression list column.
pub struct SuppressionParser;

impl SuppressionParser {
    /// The only encoding that means "not suppressed".
    pub const EMPTY_LITERAL: &'static str = "[]";

    /// Normalise to an uppercase token list.
    ///
    /// `can_receive_email` is `true` only for the exact literal `[]`; any
    /// other encoding, including one that parses to an empty list, denies.
    pub fn parse(raw: &str) -> Suppressions {
        let trimmed = raw.trim();
        if trimmed == Self::EMPTY_LITERAL {
            return Suppressions {
                tokens: Vec::new(),
                can_receive_email: true,
            };
        }

        let inner = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);

        let tokens = inner
            .split([',', ';', '|'])
            .map(|token| {
                token
                    .trim()
                    .trim_matches(|c| c == '"' || c == '\'')
                    .trim()
                    .to_uppercase()
            })
            .filter(|token| !token.is_empty())
            .collect();

        Suppressions {
            tokens,
            can_receive_email: false,
        }
    }
}

// ── EmailValidator ────────────────────────────────────────────────────────────

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("regex is valid"))
}

/// Basic structural check of an email address.
pub fn is_valid_email(email: &str) -> bool {
    email_regex().is_match(email.trim())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
