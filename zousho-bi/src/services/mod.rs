//! Lookup orchestration and record merging

pub mod book_lookup;
pub mod metadata_merger;

pub use book_lookup::{BookLookupService, QueueSnapshot, SeriesSearchState};
pub use metadata_merger::{detect_conflicts, merge_records, resolve_lookup, FieldConflict, LookupState};
