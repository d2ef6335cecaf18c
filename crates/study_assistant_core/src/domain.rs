//! crates/study_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or web framework;
//! Topic and Question carry serde derives because they are stored as
//! JSON documents and travel over the JSON wire unchanged.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single study topic extracted from course material, with its subtopics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub subtopics: Vec<String>,
}

/// The structured outline produced by the Topic Analyzer.
///
/// Ordered, capped at 6 topics, and never empty: when parsing finds
/// nothing the analyzer substitutes a fixed default outline.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicOutline {
    pub topics: Vec<Topic>,
}

impl TopicOutline {
    pub fn new(topics: Vec<Topic>) -> Self {
        Self { topics }
    }

    pub fn total_subtopics(&self) -> usize {
        self.topics.iter().map(|t| t.subtopics.len()).sum()
    }
}

/// Difficulty of a generated practice question.
///
/// Serializes as the plain variant name ("Easy", "Medium", "Hard"), which
/// is the format both the client and the stored session snapshot expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// One generated practice question. Ids are sequential starting at 1
/// within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub question: String,
    pub answer: String,
    pub difficulty: Difficulty,
    pub topic: String,
}

/// How the analyze input should be interpreted: free study material or a
/// bare topic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Text,
    Topic,
}

/// The caller identity resolved for one request. Authentication itself is
/// owned by the gateway in front of this service; anonymous callers are a
/// supported case, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    Anonymous,
    User(Uuid),
}

impl Caller {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Caller::Anonymous => None,
            Caller::User(id) => Some(*id),
        }
    }
}

// Premium flag for a user. The profile row is owned by the auth
// collaborator; this core only ever reads the id and the flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub is_premium: bool,
}

/// Per-user daily question counter for the free trial.
///
/// `last_reset_date` is the calendar date (no time component) of the most
/// recent write that did not roll the counter over; a stored date other
/// than "today" means the counter reads as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageCounter {
    pub user_id: Uuid,
    pub questions_generated: u32,
    pub last_reset_date: NaiveDate,
}

/// A study session snapshot about to be persisted after a successful
/// generation for a non-anonymous caller. Sessions are write-once; this
/// core never mutates or deletes them.
#[derive(Debug, Clone)]
pub struct NewStudySession {
    pub user_id: Uuid,
    pub title: String,
    pub topics: Vec<Topic>,
    pub questions: Vec<Question>,
    pub input_type: String,
    pub source: String,
}

/// An inbound payment-provider event, recorded append-only for audit
/// before any action is taken on it.
#[derive(Debug, Clone)]
pub struct NewPaymentEvent {
    pub event_type: String,
    pub user_id: Uuid,
    pub reference: Option<String>,
    pub raw_payload: serde_json::Value,
}
