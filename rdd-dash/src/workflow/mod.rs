//! Prediction submission and history retrieval

pub mod history;
pub mod submission;

pub use history::{HistoryError, HistoryPage, HistorySource, HistoryWorkflow};
pub use submission::{RecordOutcome, SubmissionError, SubmissionOutcome, SubmissionWorkflow};
