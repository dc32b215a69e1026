//! Timing rules for showing and scheduling notifications.
//!
//! Every rule has an `*_at` variant taking an explicit `now` so callers
//! (and tests) can evaluate it against a fixed clock.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{NotificationError, Result};

/// Validation and duration arithmetic for notification timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulingPolicy;

impl SchedulingPolicy {
    /// Validate the expiration of an immediate show.
    pub fn validate_show(expiration: Option<DateTime<Utc>>) -> Result<()> {
        Self::validate_show_at(expiration, Utc::now())
    }

    /// Validate the expiration of an immediate show against `now`.
    ///
    /// Fails if the expiration is strictly earlier than `now`.
    pub fn validate_show_at(expiration: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Result<()> {
        match expiration {
            Some(expiration) if expiration < now => {
                Err(NotificationError::expiration_in_past(expiration, now))
            }
            _ => Ok(()),
        }
    }

    /// Validate a delivery time and optional expiration.
    pub fn validate_schedule(
        delivery: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
    ) -> Result<()> {
        Self::validate_schedule_at(delivery, expiration, Utc::now())
    }

    /// Validate a delivery time and optional expiration against `now`.
    ///
    /// Fails if the delivery is strictly earlier than `now` or strictly later
    /// than the expiration. Delivering exactly at expiration is accepted.
    pub fn validate_schedule_at(
        delivery: DateTime<Utc>,
        expiration: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if delivery < now {
            return Err(NotificationError::delivery_in_past(delivery, now));
        }
        match expiration {
            Some(expiration) if delivery > expiration => Err(
                NotificationError::delivery_after_expiration(delivery, expiration),
            ),
            _ => Ok(()),
        }
    }

    /// Time left until `expiration`, for the backend's display timeout.
    pub fn remaining_duration(expiration: Option<DateTime<Utc>>) -> Option<Duration> {
        Self::remaining_duration_at(expiration, Utc::now())
    }

    /// Time left until `expiration` as seen from `now`.
    ///
    /// Floored to whole milliseconds and clamped to zero.
    pub fn remaining_duration_at(
        expiration: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        expiration.map(|expiration| Self::non_negative_millis(expiration, now))
    }

    /// How long an emulated delivery must wait.
    pub fn delay_until(delivery: DateTime<Utc>) -> Duration {
        Self::delay_until_at(delivery, Utc::now())
    }

    /// How long an emulated delivery must wait, as seen from `now`.
    pub fn delay_until_at(delivery: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        Self::non_negative_millis(delivery, now)
    }

    fn non_negative_millis(target: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let millis = target.signed_duration_since(now).num_milliseconds();
        Duration::from_millis(u64::try_from(millis).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    #[test]
    fn test_validate_show() {
        let now = now();
        assert!(SchedulingPolicy::validate_show_at(None, now).is_ok());
        assert!(SchedulingPolicy::validate_show_at(Some(now), now).is_ok());
        assert!(SchedulingPolicy::validate_show_at(Some(now + secs(60)), now).is_ok());

        let err = SchedulingPolicy::validate_show_at(Some(now - secs(1)), now).unwrap_err();
        assert!(matches!(
            err,
            NotificationError::InvalidTiming { field: "expiration_time", .. }
        ));
    }

    #[test]
    fn test_validate_schedule_rejects_past_delivery() {
        let now = now();
        let err = SchedulingPolicy::validate_schedule_at(now - secs(1), None, now).unwrap_err();
        assert!(matches!(
            err,
            NotificationError::InvalidTiming { field: "delivery_time", .. }
        ));
    }

    #[test]
    fn test_validate_schedule_rejects_expiration_before_delivery() {
        let now = now();
        let delivery = now + secs(10);
        let err = SchedulingPolicy::validate_schedule_at(delivery, Some(now + secs(5)), now)
            .unwrap_err();
        assert!(err.is_invalid_timing());
    }

    #[test]
    fn test_validate_schedule_accepts_boundaries() {
        let now = now();
        let delivery = now + secs(10);
        assert!(SchedulingPolicy::validate_schedule_at(now, None, now).is_ok());
        assert!(SchedulingPolicy::validate_schedule_at(delivery, Some(delivery), now).is_ok());
        assert!(
            SchedulingPolicy::validate_schedule_at(delivery, Some(now + secs(3600)), now).is_ok()
        );
    }

    #[test]
    fn test_remaining_duration() {
        let now = now();
        assert_eq!(SchedulingPolicy::remaining_duration_at(None, now), None);
        assert_eq!(
            SchedulingPolicy::remaining_duration_at(Some(now + secs(5)), now),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            SchedulingPolicy::remaining_duration_at(Some(now - secs(5)), now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_remaining_duration_floors_to_millis() {
        let now = now();
        let expiration = now + chrono::Duration::microseconds(2_999);
        assert_eq!(
            SchedulingPolicy::remaining_duration_at(Some(expiration), now),
            Some(Duration::from_millis(2))
        );
    }

    #[test]
    fn test_delay_until() {
        let now = now();
        assert_eq!(
            SchedulingPolicy::delay_until_at(now + secs(10), now),
            Duration::from_secs(10)
        );
        assert_eq!(
            SchedulingPolicy::delay_until_at(now - secs(10), now),
            Duration::ZERO
        );
    }
}
