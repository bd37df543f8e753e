use chrono::NaiveDateTime;

/// Whether sign-up/sign-off for an event is currently permitted.
///
/// Without a deadline there is no defined window, so registration is never
/// open. A missing start means "open until the deadline". The check must be
/// re-evaluated with a fresh `now` on every request; a window can close
/// between two renders of the same page.
pub fn is_registration_open(
    now: NaiveDateTime,
    registration_start: Option<NaiveDateTime>,
    registration_end: Option<NaiveDateTime>,
) -> bool {
    let Some(end) = registration_end else {
        return false;
    };
    match registration_start {
        Some(start) => start <= now && now < end,
        None => now < end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, NaiveDate};
    use proptest::prelude::*;

    fn ts(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn from_secs(secs: i64) -> NaiveDateTime {
        DateTime::from_timestamp(secs, 0).unwrap().naive_utc()
    }

    #[test]
    fn open_inside_the_window() {
        assert!(is_registration_open(
            ts(2024, 1, 5),
            Some(ts(2024, 1, 1)),
            Some(ts(2024, 1, 10)),
        ));
    }

    #[test]
    fn closed_after_the_deadline() {
        assert!(!is_registration_open(
            ts(2024, 1, 11),
            Some(ts(2024, 1, 1)),
            Some(ts(2024, 1, 10)),
        ));
    }

    #[test]
    fn closed_before_the_start() {
        assert!(!is_registration_open(
            ts(2023, 12, 31),
            Some(ts(2024, 1, 1)),
            Some(ts(2024, 1, 10)),
        ));
    }

    #[test]
    fn missing_start_means_open_until_deadline() {
        assert!(is_registration_open(ts(2024, 1, 5), None, Some(ts(2024, 1, 10))));
        assert!(!is_registration_open(ts(2024, 1, 10), None, Some(ts(2024, 1, 10))));
    }

    #[test]
    fn deadline_is_exclusive() {
        assert!(!is_registration_open(
            ts(2024, 1, 10),
            Some(ts(2024, 1, 1)),
            Some(ts(2024, 1, 10)),
        ));
    }

    proptest! {
        #[test]
        fn never_open_without_deadline(now in 0i64..4_000_000_000, start in proptest::option::of(0i64..4_000_000_000)) {
            prop_assert!(!is_registration_open(from_secs(now), start.map(from_secs), None));
        }

        #[test]
        fn open_iff_now_in_half_open_interval(now in 0i64..4_000_000_000, start in 0i64..4_000_000_000, end in 0i64..4_000_000_000) {
            let open = is_registration_open(from_secs(now), Some(from_secs(start)), Some(from_secs(end)));
            prop_assert_eq!(open, start <= now && now < end);
        }
    }
}
