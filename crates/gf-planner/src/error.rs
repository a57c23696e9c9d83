// error.rs: Error types for plan recovery.

use thiserror::Error;

/// Why a language-model planning reply could not be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Nothing resembling a JSON object could be recovered.
    #[error("language model reply is not valid JSON")]
    NotJson,

    /// Valid JSON, but `childGoals` is absent or not an array.
    #[error("language model reply is missing childGoals array")]
    MissingChildGoals,

    /// `childGoals` is present but has no entries.
    #[error("language model reply has an empty childGoals array")]
    EmptyChildGoals,
}
