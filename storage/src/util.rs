//! Utility types and functions.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// The calendar components of an instant.
///
/// All components are computed in UTC. `weekday` uses SQL `dayofweek` numbering,
/// so Sunday is `1` and Saturday is `7`. `week` is the ISO-8601 week number, which
/// means the first days of January can belong to week 52 or 53, and the last days
/// of December to week 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarParts {
    pub hour: u32,
    pub day: u32,
    pub week: u32,
    pub month: u32,
    pub year: i32,
    pub weekday: u32,
}

/// Decompose an epoch-milliseconds timestamp into its [`CalendarParts`] (UTC).
///
/// This is total: timestamps beyond what the calendar can represent (roughly +/- 262,000 years)
/// are clamped to the earliest or latest representable instant.
#[must_use]
pub fn decompose_timestamp(ts_millis: i64) -> CalendarParts {
    let instant = DateTime::<Utc>::from_timestamp_millis(ts_millis).unwrap_or(if ts_millis < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    });

    CalendarParts {
        hour: instant.hour(),
        day: instant.day(),
        week: instant.iso_week().week(),
        month: instant.month(),
        year: instant.year(),
        weekday: instant.weekday().number_from_sunday(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    // 2018-11-12T02:37:38.796Z, a Monday
    #[case(1_541_990_258_796, (2, 12, 46, 11, 2018, 2))]
    // the epoch itself, a Thursday in ISO week 1
    #[case(0, (0, 1, 1, 1, 1970, 5))]
    // 2018-12-01T00:00:00Z, a Saturday
    #[case(1_543_622_400_000, (0, 1, 48, 12, 2018, 7))]
    // 1969-12-31T23:59:59.999Z, a Wednesday that belongs to ISO week 1 of 1970
    #[case(-1, (23, 31, 1, 12, 1969, 4))]
    fn test_decompose_timestamp(
        #[case] ts: i64,
        #[case] (hour, day, week, month, year, weekday): (u32, u32, u32, u32, i32, u32),
    ) {
        assert_eq!(
            decompose_timestamp(ts),
            CalendarParts {
                hour,
                day,
                week,
                month,
                year,
                weekday,
            }
        );
    }

    #[test]
    fn test_decompose_matches_chrono() {
        let ts = 1_541_990_258_796;
        let expected = DateTime::parse_from_rfc3339("2018-11-12T02:37:38.796Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(expected.timestamp_millis(), ts);

        let parts = decompose_timestamp(ts);
        assert_eq!(parts.hour, expected.hour());
        assert_eq!(parts.day, expected.day());
        assert_eq!(parts.week, expected.iso_week().week());
        assert_eq!(parts.month, expected.month());
        assert_eq!(parts.year, expected.year());
        assert_eq!(parts.weekday, expected.weekday().number_from_sunday());
    }

    #[rstest]
    #[case(i64::MAX, DateTime::<Utc>::MAX_UTC)]
    #[case(i64::MIN, DateTime::<Utc>::MIN_UTC)]
    fn test_decompose_clamps_out_of_range(#[case] ts: i64, #[case] clamped_to: DateTime<Utc>) {
        assert_eq!(
            decompose_timestamp(ts),
            decompose_timestamp(clamped_to.timestamp_millis())
        );
    }

    #[test]
    fn test_decompose_is_deterministic() {
        for ts in [0, 1_541_990_258_796, -86_400_000, 4_102_444_800_000] {
            assert_eq!(decompose_timestamp(ts), decompose_timestamp(ts));
        }
    }
}
