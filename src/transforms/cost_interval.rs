//! Interval-valid standard cost lookup
//!
//! Each cost record is valid from its `effective_start_date` until the day
//! before the next record's start for the same key; the latest record is open
//! ended. Records sharing a start date produce an empty interval for all but
//! the last one in input order.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::period::YearMonth;

/// Sentinel end date the SQL uses for open-ended intervals
pub const OPEN_END_SQL: &str = "DATE '9999-12-31'";

#[derive(Debug, Clone, PartialEq)]
pub struct CostRecord {
    pub key: String,
    pub standard_cost: Decimal,
    pub effective_start_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostInterval {
    pub key: String,
    pub standard_cost: Decimal,
    pub start: NaiveDate,
    /// Inclusive; `None` for the latest record
    pub end: Option<NaiveDate>,
}

impl CostInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.map_or(true, |end| date <= end)
    }

    /// Month-granular match: the month lies between the truncated start and
    /// end months.
    fn covers_month(&self, month: YearMonth) -> bool {
        month >= YearMonth::of(self.start) && self.end.map_or(true, |end| month <= YearMonth::of(end))
    }

    fn is_empty(&self) -> bool {
        self.end.is_some_and(|end| end < self.start)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CostSchedule {
    intervals: HashMap<String, Vec<CostInterval>>,
}

impl CostSchedule {
    pub fn build(records: impl IntoIterator<Item = CostRecord>) -> Self {
        let mut by_key: HashMap<String, Vec<CostRecord>> = HashMap::new();
        for record in records {
            by_key.entry(record.key.clone()).or_default().push(record);
        }

        let intervals = by_key
            .into_iter()
            .map(|(key, mut records)| {
                // stable: equal start dates keep input order
                records.sort_by_key(|r| r.effective_start_date);
                let ends: Vec<Option<NaiveDate>> = records
                    .iter()
                    .skip(1)
                    .map(|next| next.effective_start_date.pred_opt())
                    .chain(std::iter::once(None))
                    .collect();
                let intervals = records
                    .into_iter()
                    .zip(ends)
                    .map(|(r, end)| CostInterval {
                        key: r.key,
                        standard_cost: r.standard_cost,
                        start: r.effective_start_date,
                        end,
                    })
                    .collect();
                (key, intervals)
            })
            .collect();

        Self { intervals }
    }

    pub fn intervals(&self, key: &str) -> &[CostInterval] {
        self.intervals.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The single interval containing `date`
    pub fn lookup(&self, key: &str, date: NaiveDate) -> Option<&CostInterval> {
        self.intervals(key)
            .iter()
            .filter(|i| !i.is_empty())
            .find(|i| i.contains(date))
    }

    pub fn cost_on(&self, key: &str, date: NaiveDate) -> Option<Decimal> {
        self.lookup(key, date).map(|i| i.standard_cost)
    }

    /// Month-granular lookup. When the cost changes mid-month several
    /// intervals cover the month; the one starting last wins.
    pub fn lookup_month(&self, key: &str, month: YearMonth) -> Option<&CostInterval> {
        self.intervals(key)
            .iter()
            .filter(|i| !i.is_empty() && i.covers_month(month))
            .max_by_key(|i| i.start)
    }
}

/// SQL for the same intervals: one row per record with its derived end date.
pub fn validity_window_sql(key_column: &str, source_table: &str) -> String {
    format!(
        "SELECT {key}, standard_cost, effective_start_date,\n    \
         COALESCE(DATE_SUB(LEAD(effective_start_date) OVER (PARTITION BY {key} ORDER BY effective_start_date), INTERVAL 1 DAY), {open}) AS effective_end_date\n  \
         FROM {table}\n  \
         WHERE {key} IS NOT NULL",
        key = key_column,
        open = OPEN_END_SQL,
        table = source_table,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(key: &str, cost: Decimal, start: &str) -> CostRecord {
        CostRecord {
            key: key.to_string(),
            standard_cost: cost,
            effective_start_date: date(start),
        }
    }

    fn schedule() -> CostSchedule {
        // deliberately unsorted input
        CostSchedule::build(vec![
            record("B0ASIN1", dec!(1300), "2024-06-01"),
            record("B0ASIN1", dec!(1200), "2024-01-01"),
            record("B0ASIN1", dec!(1250), "2024-03-15"),
            record("B0ASIN2", dec!(600), "2024-02-01"),
        ])
    }

    #[test]
    fn test_intervals_end_the_day_before_next_start() {
        let s = schedule();
        let intervals = s.intervals("B0ASIN1");
        assert_eq!(intervals.len(), 3);
        assert_eq!(intervals[0].end, Some(date("2024-03-14")));
        assert_eq!(intervals[1].end, Some(date("2024-05-31")));
        assert_eq!(intervals[2].end, None);
    }

    #[test]
    fn test_each_date_matches_exactly_one_interval() {
        let s = schedule();
        let mut d = date("2024-01-01");
        while d <= date("2024-12-31") {
            let matching = s
                .intervals("B0ASIN1")
                .iter()
                .filter(|i| i.contains(d))
                .count();
            assert_eq!(matching, 1, "date {} matched {} intervals", d, matching);
            d = d.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_lookup_boundaries() {
        let s = schedule();
        assert_eq!(s.cost_on("B0ASIN1", date("2024-03-14")), Some(dec!(1200)));
        assert_eq!(s.cost_on("B0ASIN1", date("2024-03-15")), Some(dec!(1250)));
        assert_eq!(s.cost_on("B0ASIN1", date("2024-05-31")), Some(dec!(1250)));
        assert_eq!(s.cost_on("B0ASIN1", date("2030-01-01")), Some(dec!(1300)));
    }

    #[test]
    fn test_dates_before_first_record_and_unknown_keys_have_no_cost() {
        let s = schedule();
        assert_eq!(s.cost_on("B0ASIN2", date("2024-01-31")), None);
        assert_eq!(s.cost_on("UNKNOWN", date("2024-03-01")), None);
    }

    #[test]
    fn test_duplicate_start_dates_resolve_to_last_record() {
        let s = CostSchedule::build(vec![
            record("SKU-A", dec!(100), "2024-01-01"),
            record("SKU-A", dec!(110), "2024-01-01"),
        ]);
        let intervals = s.intervals("SKU-A");
        // first record's window is empty: [2024-01-01, 2023-12-31]
        assert_eq!(intervals[0].end, Some(date("2023-12-31")));
        assert_eq!(s.cost_on("SKU-A", date("2024-01-01")), Some(dec!(110)));
        assert_eq!(s.cost_on("SKU-A", date("2025-07-01")), Some(dec!(110)));
    }

    #[test]
    fn test_month_lookup_prefers_latest_start_on_mid_month_change() {
        let s = schedule();
        let march: YearMonth = "2024-03".parse().unwrap();
        assert_eq!(s.lookup_month("B0ASIN1", march).unwrap().standard_cost, dec!(1250));

        let feb: YearMonth = "2024-02".parse().unwrap();
        assert_eq!(s.lookup_month("B0ASIN1", feb).unwrap().standard_cost, dec!(1200));

        let jan_asin2: YearMonth = "2024-01".parse().unwrap();
        assert!(s.lookup_month("B0ASIN2", jan_asin2).is_none());
    }

    #[test]
    fn test_validity_window_sql() {
        let sql = validity_window_sql("asin", "`p.analytics.stg_cost_standard`");
        assert!(sql.contains("LEAD(effective_start_date) OVER (PARTITION BY asin ORDER BY effective_start_date)"));
        assert!(sql.contains("INTERVAL 1 DAY), DATE '9999-12-31') AS effective_end_date"));
        assert!(sql.contains("WHERE asin IS NOT NULL"));
    }
}
