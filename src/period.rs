//! Named and custom reporting periods.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::model::Record;

/// Closed interval of instants. A missing bound disables filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Bounds {
    pub fn contains(&self, when: DateTime<Utc>) -> bool {
        within_range(when, self.start, self.end)
    }

    pub fn is_open(&self) -> bool {
        self.start.is_none() || self.end.is_none()
    }
}

/// True when either bound is absent, otherwise `start <= when <= end`.
pub fn within_range(
    when: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => start <= when && when <= end,
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    All,
    /// 10 Oct 2024 to 31 Oct 2025.
    Fy2024To2025,
    /// 01 Nov 2025 to 31 Oct 2026.
    Fy2025To2026,
    /// User-picked days, read in local time and inclusive of the whole end day.
    Custom {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn utc_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn utc_end(day: NaiveDate) -> DateTime<Utc> {
    day.and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| day.and_time(chrono::NaiveTime::MIN))
        .and_utc()
}

fn local_instant(naive: NaiveDateTime, earliest: bool) -> DateTime<Utc> {
    let resolved = Local.from_local_datetime(&naive);
    let picked = if earliest { resolved.earliest() } else { resolved.latest() };
    picked
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

impl Period {
    const FIXED: [Period; 2] = [Period::Fy2024To2025, Period::Fy2025To2026];

    /// First and last day of a fixed range.
    pub fn fixed_days(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self {
            Period::Fy2024To2025 => Some((ymd(2024, 10, 10), ymd(2025, 10, 31))),
            Period::Fy2025To2026 => Some((ymd(2025, 11, 1), ymd(2026, 10, 31))),
            _ => None,
        }
    }

    pub fn bounds(&self) -> Bounds {
        if let Some((first, last)) = self.fixed_days() {
            return Bounds { start: Some(utc_start(first)), end: Some(utc_end(last)) };
        }
        match self {
            Period::Custom { start: Some(first), end: Some(last) } => Bounds {
                start: Some(local_instant(first.and_time(chrono::NaiveTime::MIN), true)),
                end: Some(local_instant(
                    last.and_hms_milli_opt(23, 59, 59, 999)
                        .unwrap_or_else(|| last.and_time(chrono::NaiveTime::MIN)),
                    false,
                )),
            },
            _ => Bounds::default(),
        }
    }

    /// The fixed range containing `today`, else [`Period::All`].
    pub fn default_for(today: NaiveDate) -> Period {
        Self::FIXED
            .into_iter()
            .find(|p| {
                p.fixed_days()
                    .is_some_and(|(first, last)| first <= today && today <= last)
            })
            .unwrap_or(Period::All)
    }

    pub fn contains(&self, when: DateTime<Utc>) -> bool {
        self.bounds().contains(when)
    }

    /// Keeps the records created inside this period, in their original order.
    pub fn apply<'a, R: Record>(&self, records: impl IntoIterator<Item = &'a R>) -> Vec<&'a R>
    where
        R: 'a,
    {
        let bounds = self.bounds();
        records.into_iter().filter(|r| bounds.contains(r.created_at())).collect()
    }

    pub fn label(&self) -> String {
        let bounds = self.bounds();
        match (bounds.start, bounds.end) {
            (Some(start), Some(end)) => match self.fixed_days() {
                Some((first, last)) => {
                    format!("{} → {}", first.format("%d %b %Y"), last.format("%d %b %Y"))
                }
                None => format!(
                    "{} → {}",
                    start.with_timezone(&Local).format("%d %b %Y"),
                    end.with_timezone(&Local).format("%d %b %Y")
                ),
            },
            _ => "All time".to_string(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::All => write!(f, "all"),
            Period::Fy2024To2025 => write!(f, "fy2024"),
            Period::Fy2025To2026 => write!(f, "fy2025"),
            Period::Custom { .. } => write!(f, "custom"),
        }
    }
}

impl FromStr for Period {
    type Err = String;

    /// Selector values; `custom` starts with no days picked.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(Period::All),
            "fy2024" | "fy_2024_2025" => Ok(Period::Fy2024To2025),
            "fy2025" | "fy_2025_2026" => Ok(Period::Fy2025To2026),
            "custom" => Ok(Period::Custom { start: None, end: None }),
            other => Err(format!(
                "unknown period '{}' (expected all, fy2024, fy2025 or custom)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn open_bounds_always_match() {
        for when in [at("1970-01-01T00:00:00Z"), at("2025-06-01T12:00:00Z"), Utc::now()] {
            assert!(within_range(when, None, None));
            assert!(within_range(when, Some(Utc::now() + Duration::days(999)), None));
            assert!(within_range(when, None, Some(at("1970-01-01T00:00:00Z"))));
        }
    }

    #[test]
    fn closed_bounds_are_inclusive() {
        let start = at("2025-01-01T00:00:00Z");
        let end = at("2025-01-31T23:59:59.999Z");
        assert!(within_range(start, Some(start), Some(end)));
        assert!(within_range(end, Some(start), Some(end)));
        assert!(!within_range(end + Duration::milliseconds(1), Some(start), Some(end)));
        assert!(!within_range(start - Duration::milliseconds(1), Some(start), Some(end)));
    }

    #[test]
    fn fixed_ranges_cover_whole_days() {
        let fy = Period::Fy2024To2025.bounds();
        assert_eq!(fy.start, Some(at("2024-10-10T00:00:00Z")));
        assert_eq!(fy.end, Some(at("2025-10-31T23:59:59.999Z")));
        assert!(Period::Fy2025To2026.contains(at("2025-11-01T00:00:00Z")));
        assert!(!Period::Fy2025To2026.contains(at("2025-10-31T23:59:59.999Z")));
    }

    #[test]
    fn custom_needs_both_days() {
        let half = Period::Custom { start: ymd(2025, 1, 1).into(), end: None };
        assert!(half.bounds().is_open());
        assert!(half.contains(at("1999-01-01T00:00:00Z")));
    }

    #[test]
    fn custom_spans_local_days() {
        let period = Period::Custom { start: Some(ymd(2025, 3, 1)), end: Some(ymd(2025, 3, 2)) };
        let noon = local_instant(ymd(2025, 3, 2).and_hms_opt(12, 0, 0).unwrap(), true);
        let late = local_instant(ymd(2025, 3, 2).and_hms_opt(23, 59, 59).unwrap(), true);
        let next = local_instant(ymd(2025, 3, 3).and_hms_opt(0, 0, 0).unwrap(), true);
        assert!(period.contains(noon));
        assert!(period.contains(late));
        assert!(!period.contains(next));
    }

    #[test]
    fn default_follows_today() {
        assert_eq!(Period::default_for(ymd(2025, 1, 15)), Period::Fy2024To2025);
        assert_eq!(Period::default_for(ymd(2025, 10, 31)), Period::Fy2024To2025);
        assert_eq!(Period::default_for(ymd(2025, 11, 1)), Period::Fy2025To2026);
        assert_eq!(Period::default_for(ymd(2024, 1, 1)), Period::All);
        assert_eq!(Period::default_for(ymd(2027, 1, 1)), Period::All);
    }

    #[test]
    fn parses_selectors() {
        assert_eq!("ALL".parse::<Period>(), Ok(Period::All));
        assert_eq!("FY_2025_2026".parse::<Period>(), Ok(Period::Fy2025To2026));
        assert_eq!(
            "custom".parse::<Period>(),
            Ok(Period::Custom { start: None, end: None })
        );
        assert!("last-week".parse::<Period>().is_err());
    }

    #[test]
    fn labels() {
        assert_eq!(Period::All.label(), "All time");
        assert_eq!(Period::Fy2024To2025.label(), "10 Oct 2024 → 31 Oct 2025");
    }
}
