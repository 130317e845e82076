// Core modules implementing collection storage, ordering, and error modeling.
pub mod error;
pub mod log;
pub(crate) mod queue;
pub mod record;
