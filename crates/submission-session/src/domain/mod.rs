//! Pure domain logic: event types, decoding and the result fold.

pub mod aggregator;
pub mod decoder;
pub mod events;

pub use aggregator::{apply, fold, merge_report, FoldOutcome};
pub use decoder::EventDecoder;
pub use events::{Completion, Event, Notice};
