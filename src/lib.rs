//! Purpose: Library crate for the `linedb` document store and CLI.
//! Exports: `api` (database handle, records, queries, errors).
//! Role: Named collections of JSON records kept in append-only NDJSON files.
//! Invariants: Every operation on a collection runs through that collection's FIFO queue.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
mod collection_paths;
pub(crate) mod core;
pub(crate) mod json;
