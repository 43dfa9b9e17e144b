use anyhow::Context;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

const SECS_PER_HOUR: i32 = 3600;

/// Date printed on reports. An explicit `YYYY-MM-DD` wins; otherwise it is
/// today's date at `utc_offset_hours` (KST is +9).
pub fn resolve_report_date(
    arg: Option<&str>,
    now_utc: DateTime<Utc>,
    utc_offset_hours: i32,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = arg {
        return NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid report date {s:?}, expected YYYY-MM-DD"));
    }

    let offset = utc_offset_hours
        .checked_mul(SECS_PER_HOUR)
        .and_then(FixedOffset::east_opt)
        .with_context(|| format!("invalid UTC offset: {utc_offset_hours}h"))?;
    Ok(now_utc.with_timezone(&offset).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let d = resolve_report_date(Some("2025-12-31"), now, 9).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }

    #[test]
    fn kst_rolls_over_before_utc() {
        // 2026-01-05 16:00 UTC = 2026-01-06 01:00 KST
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 16, 0, 0).unwrap();
        assert_eq!(
            resolve_report_date(None, now, 9).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 6).unwrap()
        );
        assert_eq!(
            resolve_report_date(None, now, 0).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
        );
    }

    #[test]
    fn negative_offsets_lag_behind() {
        // 2026-01-05 03:00 UTC = 2026-01-04 22:00 EST
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 3, 0, 0).unwrap();
        assert_eq!(
            resolve_report_date(None, now, -5).unwrap(),
            NaiveDate::from_ymd_opt(2026, 1, 4).unwrap()
        );
    }

    #[test]
    fn rejects_bad_input() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 3, 0, 0).unwrap();
        assert!(resolve_report_date(Some("05/01/2026"), now, 9).is_err());
        assert!(resolve_report_date(None, now, 30).is_err());
    }
}
