use chrono::{DateTime, Local, NaiveDate, Utc};

use crate::model::Record;

/// Category selector value meaning "no category filter".
pub const ALL_CATEGORIES: &str = "All Categories";

/// The day a timestamp falls on, in local time.
pub fn local_day(when: DateTime<Utc>) -> NaiveDate {
    when.with_timezone(&Local).date_naive()
}

/// Search box, number box, date picker, category selector and unpaid toggle.
///
/// Every constraint is independent; a record passes when it passes all of
/// them. An unset constraint always passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub name: Option<String>,
    pub number: Option<String>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub unpaid_only: bool,
}

fn non_blank(text: &Option<String>) -> Option<&str> {
    text.as_deref().filter(|s| !s.is_empty())
}

impl RecordFilter {
    pub fn matches_name<R: Record>(&self, record: &R) -> bool {
        match non_blank(&self.name) {
            Some(query) => record
                .client_name()
                .to_lowercase()
                .contains(&query.to_lowercase()),
            None => true,
        }
    }

    pub fn matches_number<R: Record>(&self, record: &R) -> bool {
        match non_blank(&self.number) {
            Some(query) => record
                .business_key()
                .to_lowercase()
                .contains(&query.trim().to_lowercase()),
            None => true,
        }
    }

    pub fn matches_date<R: Record>(&self, record: &R) -> bool {
        self.date.is_none_or(|day| local_day(record.created_at()) == day)
    }

    pub fn matches_category<R: Record>(&self, record: &R) -> bool {
        match non_blank(&self.category) {
            Some(wanted) if wanted != ALL_CATEGORIES => {
                record.category().to_lowercase() == wanted.to_lowercase()
            }
            _ => true,
        }
    }

    pub fn matches_unpaid<R: Record>(&self, record: &R) -> bool {
        !self.unpaid_only || record.remaining_amount().is_some_and(|due| due > 0.0)
    }

    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.matches_name(record)
            && self.matches_number(record)
            && self.matches_date(record)
            && self.matches_category(record)
            && self.matches_unpaid(record)
    }

    /// Records passing every constraint, original order kept.
    pub fn apply<'a, R: Record + 'a>(&self, records: impl IntoIterator<Item = &'a R>) -> Vec<&'a R> {
        records.into_iter().filter(|r| self.matches(*r)).collect()
    }

    /// A text or date constraint narrows the list; the display window is
    /// dropped while one is set.
    pub fn is_searching(&self) -> bool {
        non_blank(&self.name).is_some() || non_blank(&self.number).is_some() || self.date.is_some()
    }

    pub fn clear(&mut self) {
        *self = RecordFilter::default();
    }
}
