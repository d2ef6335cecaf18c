//! services/api/src/study/trial.rs
//!
//! The daily free-trial gate. One counter row per signed-in free user,
//! keyed by user id, carrying the questions generated today and the date
//! of the last write. The check and the later increment are two separate
//! round trips; concurrent requests from the same user can both pass the
//! check before either increments. That lost-update window is a known,
//! accepted property of the gate, not something this module defends
//! against.

use chrono::NaiveDate;
use study_assistant_core::ports::DatabaseService;
use tracing::warn;
use uuid::Uuid;

use super::StudyError;

/// Questions a non-premium user may generate per calendar day.
pub const FREE_DAILY_QUESTION_LIMIT: u32 = 5;
/// Allowance for premium users, equal to the hard batch cap.
pub const PREMIUM_QUESTION_LIMIT: u32 = 20;

/// Checks whether a free signed-in user may generate questions today, and
/// returns the count already consumed.
///
/// A counter dated before today is rolled over (written back as zero for
/// today) before it is judged. Storage failures here fail the request:
/// without a readable counter the gate cannot decide.
pub async fn check_trial(
    db: &dyn DatabaseService,
    user_id: Uuid,
    today: NaiveDate,
) -> Result<u32, StudyError> {
    let usage = db.get_usage(user_id).await?;

    let used = match usage {
        Some(counter) if counter.last_reset_date == today => counter.questions_generated,
        Some(_) => {
            db.upsert_usage(user_id, 0, today).await?;
            0
        }
        None => 0,
    };

    if used >= FREE_DAILY_QUESTION_LIMIT {
        return Err(StudyError::TrialLimitReached {
            allowed: FREE_DAILY_QUESTION_LIMIT,
            used,
        });
    }
    Ok(used)
}

/// Charges `produced` questions to the user's counter for today and
/// returns the resulting count.
///
/// The counter is re-read first so a concurrent increment since the check
/// is not clobbered; the write stores the absolute new value. The questions
/// were already generated and belong to the user, so failures on either
/// round trip are logged and absorbed, with `used_before` standing in for
/// an unreadable counter.
pub async fn record_usage(
    db: &dyn DatabaseService,
    user_id: Uuid,
    used_before: u32,
    produced: u32,
    today: NaiveDate,
) -> u32 {
    let base = match db.get_usage(user_id).await {
        Ok(Some(counter)) if counter.last_reset_date == today => counter.questions_generated,
        Ok(_) => 0,
        Err(e) => {
            warn!("Failed to re-read usage for user {}: {}", user_id, e);
            used_before
        }
    };

    let total = base + produced;
    if let Err(e) = db.upsert_usage(user_id, total, today).await {
        warn!("Failed to record question usage for user {}: {}", user_id, e);
    }
    total
}

//=========================================================================================
// Tests
//=========================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeDb;
    use std::sync::atomic::Ordering;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn first_request_sees_a_zero_counter_without_writing_one() {
        let db = FakeDb::new();
        let user = Uuid::new_v4();

        let used = check_trial(&db, user, today()).await.unwrap();

        assert_eq!(used, 0);
        assert_eq!(db.usage_writes.load(Ordering::SeqCst), 0);
        assert!(db.usage.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_counter_is_reset_and_the_date_advanced() {
        let db = FakeDb::new();
        let user = Uuid::new_v4();
        db.seed_usage(user, 5, today().pred_opt().unwrap());

        let used = check_trial(&db, user, today()).await.unwrap();

        assert_eq!(used, 0);
        let counter = db.usage.lock().unwrap()[&user].clone();
        assert_eq!(counter.questions_generated, 0);
        assert_eq!(counter.last_reset_date, today());
    }

    #[tokio::test]
    async fn exhausted_counter_rejects_with_the_usage_figures() {
        let db = FakeDb::new();
        let user = Uuid::new_v4();
        db.seed_usage(user, 6, today());

        let err = check_trial(&db, user, today()).await.unwrap_err();

        match err {
            StudyError::TrialLimitReached { allowed, used } => {
                assert_eq!(allowed, FREE_DAILY_QUESTION_LIMIT);
                assert_eq!(used, 6);
            }
            other => panic!("expected TrialLimitReached, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn counter_at_exactly_the_limit_rejects() {
        let db = FakeDb::new();
        let user = Uuid::new_v4();
        db.seed_usage(user, FREE_DAILY_QUESTION_LIMIT, today());

        assert!(check_trial(&db, user, today()).await.is_err());
    }

    #[tokio::test]
    async fn record_usage_writes_the_absolute_total() {
        let db = FakeDb::new();
        let user = Uuid::new_v4();
        db.seed_usage(user, 3, today());

        let total = record_usage(&db, user, 3, 2, today()).await;

        assert_eq!(total, 5);
        assert_eq!(db.usage.lock().unwrap()[&user].questions_generated, 5);
    }

    #[tokio::test]
    async fn record_usage_falls_back_to_the_checked_count_on_read_failure() {
        let db = FakeDb::new();
        let user = Uuid::new_v4();
        db.fail_get_usage.store(true, Ordering::SeqCst);

        let total = record_usage(&db, user, 3, 2, today()).await;

        assert_eq!(total, 5);
        assert_eq!(db.usage.lock().unwrap()[&user].questions_generated, 5);
    }

    #[tokio::test]
    async fn record_usage_starts_from_zero_when_the_stored_date_is_stale() {
        let db = FakeDb::new();
        let user = Uuid::new_v4();
        db.seed_usage(user, 4, today().pred_opt().unwrap());

        let total = record_usage(&db, user, 0, 2, today()).await;

        assert_eq!(total, 2);
        let counter = db.usage.lock().unwrap()[&user].clone();
        assert_eq!(counter.questions_generated, 2);
        assert_eq!(counter.last_reset_date, today());
    }
}
