use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Single-use activation key issued to a user after registration.
///
/// A user owns at most one row; issuing a new key replaces the old one.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EmailConfirmation {
    pub id: i64,
    pub user_id: i64,
    pub activation_key: String,
    pub sent: DateTime<Utc>,
}

impl EmailConfirmation {
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.sent
    }

    /// A key is expired once its age reaches the confirmation window.
    pub fn is_expired_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.age_at(now) >= window
    }

    pub fn is_expired(&self, window: Duration) -> bool {
        self.is_expired_at(Utc::now(), window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirmation_sent_at(sent: DateTime<Utc>) -> EmailConfirmation {
        EmailConfirmation {
            id: 1,
            user_id: 1,
            activation_key: "a".repeat(40),
            sent,
        }
    }

    #[test]
    fn test_fresh_key_is_not_expired() {
        let now = Utc::now();
        let confirmation = confirmation_sent_at(now);
        assert!(!confirmation.is_expired_at(now, Duration::days(1)));
    }

    #[test]
    fn test_key_expires_exactly_at_window() {
        let now = Utc::now();
        let confirmation = confirmation_sent_at(now - Duration::days(2));
        assert!(confirmation.is_expired_at(now, Duration::days(2)));
        assert!(!confirmation.is_expired_at(now - Duration::seconds(1), Duration::days(2)));
    }

    #[test]
    fn test_two_day_window_scenario() {
        let t0 = Utc::now();
        let confirmation = confirmation_sent_at(t0);
        let window = Duration::days(2);

        assert!(!confirmation.is_expired_at(t0 + Duration::days(1), window));
        assert!(confirmation.is_expired_at(t0 + Duration::days(3), window));
    }
}
