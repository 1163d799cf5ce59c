use chrono::{Datelike, NaiveDate, NaiveDateTime};

use crate::error::AppError;

/// A calendar month used to filter trips for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub year: i32,
    pub month: u32,
}

impl ReportPeriod {
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Parses `YYYY-MM`, the value of an `<input type="month">`.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::BadRequest(format!("invalid month '{raw}', expected YYYY-MM"));
        let (year, month) = raw.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        Ok(Self { year, month })
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Half-open range `[first of month, first of next month)`.
    pub fn bounds(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let start = self.first_day()?;
        let end = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)?
        };
        Some((start.and_hms_opt(0, 0, 0)?, end.and_hms_opt(0, 0, 0)?))
    }

    pub fn as_input_value(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

/// Anything that contributes a distance to a report.
pub trait Billable {
    fn distance_km(&self) -> Option<f64>;
    fn is_reported(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BillingSummary {
    pub trip_count: usize,
    pub total_distance_km: f64,
    pub total_price: f64,
    pub reported_distance_km: f64,
    pub reported_price: f64,
}

/// Sums trip distances and prices them. Unknown distances contribute nothing.
pub fn summarize<T: Billable>(trips: &[T], price_per_km: f64) -> BillingSummary {
    let mut summary = BillingSummary {
        trip_count: trips.len(),
        ..BillingSummary::default()
    };
    for trip in trips {
        let Some(km) = trip.distance_km() else {
            continue;
        };
        summary.total_distance_km += km;
        if trip.is_reported() {
            summary.reported_distance_km += km;
        }
    }
    summary.total_price = summary.total_distance_km * price_per_km;
    summary.reported_price = summary.reported_distance_km * price_per_km;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leg(Option<f64>, bool);

    impl Billable for Leg {
        fn distance_km(&self) -> Option<f64> {
            self.0
        }

        fn is_reported(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn empty_set_is_free() {
        let summary = summarize::<Leg>(&[], 5.0);
        assert_eq!(summary, BillingSummary::default());
        assert_eq!(summary.total_distance_km, 0.0);
        assert_eq!(summary.total_price, 0.0);
    }

    #[test]
    fn unknown_distances_are_skipped() {
        let with_gaps = [Leg(Some(12.5), false), Leg(None, true), Leg(Some(7.5), true)];
        let without = [Leg(Some(12.5), false), Leg(Some(7.5), true)];

        let a = summarize(&with_gaps, 5.0);
        let b = summarize(&without, 5.0);
        assert_eq!(a.total_distance_km, b.total_distance_km);
        assert_eq!(a.total_distance_km, 20.0);
        assert_eq!(a.total_price, 100.0);
        assert_eq!(a.trip_count, 3);
    }

    #[test]
    fn reported_subtotal_only_counts_flagged_trips() {
        let trips = [Leg(Some(10.0), true), Leg(Some(4.0), false), Leg(None, true)];
        let summary = summarize(&trips, 2.5);
        assert_eq!(summary.reported_distance_km, 10.0);
        assert_eq!(summary.reported_price, 25.0);
        assert_eq!(summary.total_price, 35.0);
    }

    #[test]
    fn parses_month_input() {
        assert_eq!(
            ReportPeriod::parse("2024-03").unwrap(),
            ReportPeriod {
                year: 2024,
                month: 3
            }
        );
        assert!(ReportPeriod::parse("2024-13").is_err());
        assert!(ReportPeriod::parse("march").is_err());
        assert!(ReportPeriod::parse("").is_err());
    }

    #[test]
    fn december_rolls_over_into_next_year() {
        let (start, end) = ReportPeriod {
            year: 2023,
            month: 12,
        }
        .bounds()
        .unwrap();
        assert_eq!(start.to_string(), "2023-12-01 00:00:00");
        assert_eq!(end.to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn input_value_is_zero_padded() {
        let period = ReportPeriod::containing(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(period.as_input_value(), "2024-02");
    }
}
