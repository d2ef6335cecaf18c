//! services/api/src/study/mod.rs
//!
//! The study orchestration layer: topic analysis, question generation, and
//! the daily free-trial gate. Everything here works against the core ports,
//! so the web layer and the tests can drive it with any implementation.

pub mod analysis;
pub mod questions;
pub mod trial;

use study_assistant_core::ports::PortError;

/// Action-level failures for the study endpoints.
///
/// `TrialLimitReached` is the only variant the web layer reports with a
/// distinct status and structured fields; everything else collapses into a
/// generic failure message.
#[derive(Debug, thiserror::Error)]
pub enum StudyError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error("You have reached your daily free trial limit ({used}/{allowed} questions).")]
    TrialLimitReached { allowed: u32, used: u32 },

    #[error("{0}")]
    Validation(String),

    #[error("Analysis timed out after 60 seconds. The server might be busy. Please try again.")]
    Timeout,
}
