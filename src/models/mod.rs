pub mod candidate;
pub mod flags;
pub mod issue;
pub mod record;

pub use candidate::{CandidateScore, SearchCandidate, ValidationResult};
pub use flags::{FlagSet, FINALIZED, MANUAL_REVIEW, MANUAL_REVIEW_FLAGS};
pub use issue::{ParseIssue, RecordIssues};
pub use record::{CitationRecord, RecordBrief};
