//! Status derivation from evidence dates and frequencies.

use chrono::NaiveDate;

use crate::models::{Frequency, ScreeningStatus};

/// Default width of the "due soon" window, in days.
pub const DEFAULT_SOON_WINDOW_DAYS: u32 = 60;

/// Derive the status and next due date for one screening.
///
/// No evidence means Due with no due date. With evidence, the next due
/// date comes from calendar-aware frequency addition; a due date already
/// past is Due, one within the soon window (inclusive on both ends) is
/// DueSoon, anything further out is Complete.
pub fn compute_status(
    last_completed: Option<NaiveDate>,
    frequency: &Frequency,
    today: NaiveDate,
    soon_window_days: u32,
) -> (ScreeningStatus, Option<NaiveDate>) {
    let Some(completed) = last_completed else {
        return (ScreeningStatus::Due, None);
    };

    let next_due = frequency.next_due(completed);
    let status = if today > next_due {
        ScreeningStatus::Due
    } else {
        let days_until = (next_due - today).num_days();
        if days_until <= soon_window_days as i64 {
            ScreeningStatus::DueSoon
        } else {
            ScreeningStatus::Complete
        }
    };
    (status, Some(next_due))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrequencyUnit;
    use chrono::Duration;

    const YEARLY: Frequency = Frequency {
        count: 1,
        unit: FrequencyUnit::Years,
    };

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn test_no_evidence_is_due() {
        let (status, due) = compute_status(None, &YEARLY, today(), DEFAULT_SOON_WINDOW_DAYS);
        assert_eq!(status, ScreeningStatus::Due);
        assert_eq!(due, None);
    }

    #[test]
    fn test_overdue_yearly_screening() {
        // Completed 400 days ago: the yearly interval elapsed ~35 days ago.
        let completed = today() - Duration::days(400);
        let (status, due) = compute_status(
            Some(completed),
            &YEARLY,
            today(),
            DEFAULT_SOON_WINDOW_DAYS,
        );
        assert_eq!(status, ScreeningStatus::Due);
        assert!(due.unwrap() < today());
    }

    #[test]
    fn test_recent_completion_is_complete() {
        let completed = today() - Duration::days(30);
        let (status, due) = compute_status(
            Some(completed),
            &YEARLY,
            today(),
            DEFAULT_SOON_WINDOW_DAYS,
        );
        assert_eq!(status, ScreeningStatus::Complete);
        assert!(due.unwrap() > today());
    }

    #[test]
    fn test_approaching_due_date_is_due_soon() {
        // Completed 310 days ago: next due in about 55 days.
        let completed = today() - Duration::days(310);
        let (status, _) = compute_status(
            Some(completed),
            &YEARLY,
            today(),
            DEFAULT_SOON_WINDOW_DAYS,
        );
        assert_eq!(status, ScreeningStatus::DueSoon);
    }

    #[test]
    fn test_window_boundaries() {
        // Due exactly today: still DueSoon, not Due.
        let completed = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let (status, due) = compute_status(Some(completed), &YEARLY, today(), 60);
        assert_eq!(due, Some(today()));
        assert_eq!(status, ScreeningStatus::DueSoon);

        // Due exactly at the window edge: DueSoon.
        let days = Frequency {
            count: 60,
            unit: FrequencyUnit::Days,
        };
        let (status, _) = compute_status(Some(today()), &days, today(), 60);
        assert_eq!(status, ScreeningStatus::DueSoon);

        // One day beyond the window: Complete.
        let days61 = Frequency {
            count: 61,
            unit: FrequencyUnit::Days,
        };
        let (status, _) = compute_status(Some(today()), &days61, today(), 60);
        assert_eq!(status, ScreeningStatus::Complete);

        // One day past due: Due.
        let (status, _) = compute_status(
            Some(completed - Duration::days(1)),
            &YEARLY,
            today(),
            60,
        );
        assert_eq!(status, ScreeningStatus::Due);
    }

    #[test]
    fn test_custom_soon_window() {
        let completed = today() - Duration::days(310);
        // Next due in ~55 days; with a 30-day window that is Complete.
        let (status, _) = compute_status(Some(completed), &YEARLY, today(), 30);
        assert_eq!(status, ScreeningStatus::Complete);
    }
}
