use chrono::{DateTime, Days, Months, NaiveDate, NaiveDateTime};

use crate::expr::{WindowOp, WindowUnit};

/// First day of the window reaching `amount` units back from `today`.
///
/// Month and year steps clamp to the last day of the target month.
pub fn window_start(today: NaiveDate, amount: u32, unit: WindowUnit) -> Option<NaiveDate> {
    match unit {
        WindowUnit::Days => today.checked_sub_days(Days::new(u64::from(amount))),
        WindowUnit::Months => today.checked_sub_months(Months::new(amount)),
        WindowUnit::Years => amount
            .checked_mul(12)
            .and_then(|months| today.checked_sub_months(Months::new(months))),
    }
}

/// Reads an ISO date, dropping any time-of-day component.
pub fn parse_candidate_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|value| value.date())
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
                .ok()
                .map(|value| value.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|value| value.date_naive())
        })
}

/// Inclusive membership of `candidate` in `[today - amount unit, today]`.
///
/// A start before the representable calendar reaches back to [`NaiveDate::MIN`].
pub fn in_window(candidate: NaiveDate, today: NaiveDate, amount: u32, unit: WindowUnit) -> bool {
    let start = window_start(today, amount, unit).unwrap_or(NaiveDate::MIN);
    start <= candidate && candidate <= today
}

/// Evaluates a date window against a raw candidate; unparseable candidates never match.
pub fn within_window(
    operator: WindowOp,
    amount: u32,
    unit: WindowUnit,
    candidate: &str,
    today: NaiveDate,
) -> bool {
    let Some(candidate) = parse_candidate_date(candidate) else {
        return false;
    };
    let inside = in_window(candidate, today, amount, unit);
    match operator {
        WindowOp::Within => inside,
        WindowOp::NotWithin => !inside,
    }
}
