//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool, Row};
use study_assistant_core::domain::{NewPaymentEvent, NewStudySession, Profile, UsageCounter};
use study_assistant_core::ports::{DatabaseService, PortError, PortResult};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    is_premium: bool,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            is_premium: self.is_premium,
        }
    }
}

#[derive(FromRow)]
struct UsageRecord {
    user_id: Uuid,
    questions_generated: i32,
    last_reset_date: NaiveDate,
}
impl UsageRecord {
    fn to_domain(self) -> UsageCounter {
        UsageCounter {
            user_id: self.user_id,
            // Stored as INTEGER with a non-negative check constraint.
            questions_generated: self.questions_generated.max(0) as u32,
            last_reset_date: self.last_reset_date,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<Option<Profile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, is_premium FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn set_premium(&self, user_id: Uuid) -> PortResult<()> {
        // Zero rows affected means the profile row does not exist yet; the
        // webhook treats that the same as a successful no-op.
        sqlx::query("UPDATE profiles SET is_premium = TRUE, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn get_usage(&self, user_id: Uuid) -> PortResult<Option<UsageCounter>> {
        let record = sqlx::query_as::<_, UsageRecord>(
            "SELECT user_id, questions_generated, last_reset_date FROM user_usage WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(record.map(|r| r.to_domain()))
    }

    async fn upsert_usage(
        &self,
        user_id: Uuid,
        questions_generated: u32,
        last_reset_date: NaiveDate,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_usage (user_id, questions_generated, last_reset_date) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE \
             SET questions_generated = EXCLUDED.questions_generated, \
                 last_reset_date = EXCLUDED.last_reset_date",
        )
        .bind(user_id)
        .bind(questions_generated as i32)
        .bind(last_reset_date)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(())
    }

    async fn create_study_session(&self, session: NewStudySession) -> PortResult<Uuid> {
        let topics = serde_json::to_value(&session.topics)
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        let questions = serde_json::to_value(&session.questions)
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        let row = sqlx::query(
            "INSERT INTO study_sessions (id, user_id, title, topics, questions, input_type, source) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(&session.title)
        .bind(topics)
        .bind(questions)
        .bind(&session.input_type)
        .bind(&session.source)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        let id: Uuid = row
            .try_get("id")
            .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(id)
    }

    async fn record_payment_event(&self, event: NewPaymentEvent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO paystack_events (event_type, user_id, reference, raw_payload) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&event.event_type)
        .bind(event.user_id)
        .bind(&event.reference)
        .bind(&event.raw_payload)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;
        Ok(())
    }
}
