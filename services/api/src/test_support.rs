//! services/api/src/test_support.rs
//!
//! In-memory fakes for the core service ports, shared by the unit tests of
//! the study flows and the web handlers. The fakes keep their state in
//! plain maps so tests can seed rows and inspect writes directly, and they
//! carry per-operation failure switches for exercising the degraded paths.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use study_assistant_core::domain::{NewPaymentEvent, NewStudySession, Profile, UsageCounter};
use study_assistant_core::ports::{
    DatabaseService, GenerationParams, PortError, PortResult, TextGenerationService,
};
use uuid::Uuid;

//=========================================================================================
// Database Fake
//=========================================================================================

pub struct FakeDb {
    pub profiles: Mutex<HashMap<Uuid, Profile>>,
    pub usage: Mutex<HashMap<Uuid, UsageCounter>>,
    pub sessions: Mutex<Vec<NewStudySession>>,
    pub events: Mutex<Vec<NewPaymentEvent>>,

    pub fail_get_usage: AtomicBool,
    pub fail_upsert_usage: AtomicBool,
    pub fail_create_session: AtomicBool,
    pub fail_set_premium: AtomicBool,
    pub fail_record_event: AtomicBool,

    /// Counts every `get_usage` / `upsert_usage` call, including ones the
    /// failure switches reject.
    pub usage_reads: AtomicUsize,
    pub usage_writes: AtomicUsize,
}

impl FakeDb {
    pub fn new() -> Self {
        Self {
            profiles: Mutex::new(HashMap::new()),
            usage: Mutex::new(HashMap::new()),
            sessions: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            fail_get_usage: AtomicBool::new(false),
            fail_upsert_usage: AtomicBool::new(false),
            fail_create_session: AtomicBool::new(false),
            fail_set_premium: AtomicBool::new(false),
            fail_record_event: AtomicBool::new(false),
            usage_reads: AtomicUsize::new(0),
            usage_writes: AtomicUsize::new(0),
        }
    }

    pub fn seed_profile(&self, user_id: Uuid, is_premium: bool) {
        self.profiles
            .lock()
            .unwrap()
            .insert(user_id, Profile { id: user_id, is_premium });
    }

    pub fn seed_usage(&self, user_id: Uuid, questions_generated: u32, last_reset_date: NaiveDate) {
        self.usage.lock().unwrap().insert(
            user_id,
            UsageCounter {
                user_id,
                questions_generated,
                last_reset_date,
            },
        );
    }
}

#[async_trait]
impl DatabaseService for FakeDb {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn set_premium(&self, user_id: Uuid) -> PortResult<()> {
        if self.fail_set_premium.load(Ordering::SeqCst) {
            return Err(PortError::Persistence("set_premium failed".to_string()));
        }
        // UPDATE semantics: a missing profile row is left missing.
        if let Some(profile) = self.profiles.lock().unwrap().get_mut(&user_id) {
            profile.is_premium = true;
        }
        Ok(())
    }

    async fn get_usage(&self, user_id: Uuid) -> PortResult<Option<UsageCounter>> {
        self.usage_reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_usage.load(Ordering::SeqCst) {
            return Err(PortError::Persistence("get_usage failed".to_string()));
        }
        Ok(self.usage.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert_usage(
        &self,
        user_id: Uuid,
        questions_generated: u32,
        last_reset_date: NaiveDate,
    ) -> PortResult<()> {
        self.usage_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert_usage.load(Ordering::SeqCst) {
            return Err(PortError::Persistence("upsert_usage failed".to_string()));
        }
        self.usage.lock().unwrap().insert(
            user_id,
            UsageCounter {
                user_id,
                questions_generated,
                last_reset_date,
            },
        );
        Ok(())
    }

    async fn create_study_session(&self, session: NewStudySession) -> PortResult<Uuid> {
        if self.fail_create_session.load(Ordering::SeqCst) {
            return Err(PortError::Persistence("create_study_session failed".to_string()));
        }
        self.sessions.lock().unwrap().push(session);
        Ok(Uuid::new_v4())
    }

    async fn record_payment_event(&self, event: NewPaymentEvent) -> PortResult<()> {
        if self.fail_record_event.load(Ordering::SeqCst) {
            return Err(PortError::Persistence("record_payment_event failed".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

//=========================================================================================
// Text-Generation Fake
//=========================================================================================

/// Scripted text-generation provider. Replies are consumed front to back,
/// one per call; prompts are recorded for assertions.
pub struct FakeTextGen {
    replies: Mutex<VecDeque<PortResult<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeTextGen {
    pub fn with_reply(reply: &str) -> Self {
        Self::with_replies(vec![Ok(reply.to_string())])
    }

    pub fn with_replies(replies: Vec<PortResult<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerationService for FakeTextGen {
    async fn generate_text(&self, prompt: &str, _params: GenerationParams) -> PortResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PortError::UpstreamMalformed("no scripted reply".to_string())))
    }
}

/// A provider that never answers, for exercising timeouts.
pub struct StalledTextGen;

#[async_trait]
impl TextGenerationService for StalledTextGen {
    async fn generate_text(&self, _prompt: &str, _params: GenerationParams) -> PortResult<String> {
        std::future::pending::<()>().await;
        unreachable!()
    }
}
