use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

impl Granularity {
    /// Picks the bucket width from the span of the selected window.
    pub fn for_span(start: NaiveDate, end: NaiveDate) -> Self {
        match (end - start).num_days().abs() {
            0..=31 => Granularity::Day,
            32..=182 => Granularity::Week,
            183..=730 => Granularity::Month,
            _ => Granularity::Year,
        }
    }
}

/// Variant order matters: keys of one granularity compare structurally, so week keys
/// sort by (year, week) and never by their string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Day(NaiveDate),
    Week { year: i32, week: u32 },
    Month { year: i32, month: u32 },
    Year(i32),
}

impl BucketKey {
    pub fn for_date(date: NaiveDate, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Day => BucketKey::Day(date),
            Granularity::Week => {
                let iso = date.iso_week();
                BucketKey::Week {
                    year: iso.year(),
                    week: iso.week(),
                }
            }
            Granularity::Month => BucketKey::Month {
                year: date.year(),
                month: date.month(),
            },
            Granularity::Year => BucketKey::Year(date.year()),
        }
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            BucketKey::Week { year, week } => write!(f, "{year:04}-W{week:02}"),
            BucketKey::Month { year, month } => write!(f, "{year:04}-{month:02}"),
            BucketKey::Year(year) => write!(f, "{year:04}"),
        }
    }
}

/// Counts dates per bucket, returned in chronological order.
pub fn bucket_series<I>(dates: I, granularity: Granularity) -> Vec<(BucketKey, usize)>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let mut counts: BTreeMap<BucketKey, usize> = BTreeMap::new();
    for date in dates {
        *counts.entry(BucketKey::for_date(date, granularity)).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}
