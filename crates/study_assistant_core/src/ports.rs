//! crates/study_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{NewPaymentEvent, NewStudySession, Profile, UsageCounter};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy for all port operations.
///
/// The upstream variants distinguish the three ways a generative-text call
/// fails (unreachable, refused, or answered with garbage) because the web
/// layer reports them differently; storage failures collapse into
/// `Persistence`.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The provider could not be reached, or answered with a non-success
    /// HTTP status.
    #[error("{0}")]
    UpstreamUnavailable(String),

    /// The provider refused the request on content-policy grounds.
    #[error("Content was blocked by the AI provider: {0}")]
    UpstreamBlocked(String),

    /// The provider answered, but without the expected content envelope.
    #[error("Unexpected response from the AI provider: {0}")]
    UpstreamMalformed(String),

    /// A storage read or write failed.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Item not found where one was required.
    #[error("Item not found: {0}")]
    NotFound(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Generation parameters forwarded to the text-generation provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: i32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    /// Sends one prompt to the generative-text provider and returns the raw
    /// free-text reply of its first candidate.
    async fn generate_text(&self, prompt: &str, params: GenerationParams) -> PortResult<String>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Profiles (premium flag) ---
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>>;

    /// Marks a user premium. Applying it again to an already-premium user
    /// is a no-op, which is what the at-least-once webhook delivery needs.
    async fn set_premium(&self, user_id: Uuid) -> PortResult<()>;

    // --- Free-trial usage counters ---
    async fn get_usage(&self, user_id: Uuid) -> PortResult<Option<UsageCounter>>;

    /// Writes the counter as an absolute value (insert-or-overwrite). The
    /// read-then-write sequence around it is deliberately not transactional;
    /// see the trial gate for the accepted race.
    async fn upsert_usage(
        &self,
        user_id: Uuid,
        questions_generated: u32,
        last_reset_date: NaiveDate,
    ) -> PortResult<()>;

    // --- Study sessions ---
    async fn create_study_session(&self, session: NewStudySession) -> PortResult<Uuid>;

    // --- Payment events (append-only audit log) ---
    async fn record_payment_event(&self, event: NewPaymentEvent) -> PortResult<()>;
}
