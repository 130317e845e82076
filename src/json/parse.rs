//! Purpose: Decode one persisted collection line into a record.
//! Exports: `record_from_line`, `categorize_error`, `ParseFailureCategory`.
//! Role: Parser boundary for the log reader; callers decide what to do with failures.
//! Invariants: A line decodes only if it is a single JSON object after trimming.
//! Invariants: Category labels are stable; they appear in diagnostics only.

use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ParseFailureCategory {
    Utf8,
    Syntax,
    Truncated,
    NotObject,
}

impl ParseFailureCategory {
    pub(crate) fn label(self) -> &'static str {
        match self {
            ParseFailureCategory::Utf8 => "utf8",
            ParseFailureCategory::Syntax => "syntax",
            ParseFailureCategory::Truncated => "truncated",
            ParseFailureCategory::NotObject => "not-object",
        }
    }
}

pub(crate) fn record_from_line(
    line: &[u8],
) -> Result<Map<String, Value>, ParseFailureCategory> {
    let text = std::str::from_utf8(line).map_err(|_| ParseFailureCategory::Utf8)?;
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(ParseFailureCategory::NotObject),
        Err(err) => Err(categorize_error(&err)),
    }
}

pub(crate) fn categorize_error(err: &serde_json::Error) -> ParseFailureCategory {
    if err.is_eof() {
        ParseFailureCategory::Truncated
    } else {
        ParseFailureCategory::Syntax
    }
}
