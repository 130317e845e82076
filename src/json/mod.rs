//! Purpose: Internal JSON decoding boundary for persisted collection lines.
//! Exports: `parse` module with the line decoder used by the log reader.
//! Role: Single seam so the reader avoids ad hoc decode logic.
//! Invariants: Helper APIs stay small and deterministic (no hidden global state).

pub(crate) mod parse;
