//! Report windows and booking aggregation

use crate::services::report_renderer::{format_date, month_label, MonthlyStats};
use crate::types::{Booking, BookingStatus};
use chrono::{Datelike, Duration, NaiveDate};
use messenger_types::{ReportWindow, StatusCounts};
use std::collections::BTreeMap;

/// Inclusive date range a report covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
    pub window: ReportWindow,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    /// Period of `window` that contains `today`; weeks start on Sunday
    pub fn containing(window: ReportWindow, today: NaiveDate) -> Self {
        let (start, end) = match window {
            ReportWindow::Daily => (today, today),
            ReportWindow::Weekly => {
                let start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
                (start, start + Duration::days(6))
            }
            ReportWindow::Monthly => month_bounds(today),
        };
        Self { window, start, end }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Display label used in the report heading and the summary
    pub fn label(&self) -> String {
        match self.window {
            ReportWindow::Daily => format_date(self.start),
            ReportWindow::Weekly => format!("{} a {}", format_date(self.start), format_date(self.end)),
            ReportWindow::Monthly => month_label(self.start),
        }
    }

    /// Bookings dated inside the period, ordered by date then time slot
    pub fn select<'a>(&self, bookings: &'a [Booking]) -> Vec<&'a Booking> {
        let mut selected: Vec<&Booking> = bookings
            .iter()
            .filter(|b| b.date_naive().map_or(false, |d| self.contains(d)))
            .collect();
        selected.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.time_slot.cmp(&b.time_slot)));
        selected
    }
}

fn month_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = today.with_day(1).unwrap_or(today);
    let next_month = if today.month() == 12 {
        NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(today.year(), today.month() + 1, 1)
    };
    let end = next_month.and_then(|d| d.pred_opt()).unwrap_or(today);
    (start, end)
}

/// Counts by status; scheduled bookings count as pending
pub fn count_statuses(bookings: &[&Booking]) -> StatusCounts {
    let mut counts = StatusCounts {
        total: bookings.len(),
        ..StatusCounts::default()
    };
    for booking in bookings {
        match booking.status {
            BookingStatus::Pending | BookingStatus::Scheduled => counts.pending += 1,
            BookingStatus::Confirmed => counts.confirmed += 1,
            BookingStatus::Cancelled => counts.cancelled += 1,
            BookingStatus::Other(_) => {}
        }
    }
    counts
}

/// Busiest days by booking count; ties go to the earlier date
pub fn top_days(bookings: &[&Booking], limit: usize) -> Vec<(NaiveDate, usize)> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for day in bookings.iter().filter_map(|b| b.date_naive()) {
        *per_day.entry(day).or_insert(0) += 1;
    }

    let mut days: Vec<(NaiveDate, usize)> = per_day.into_iter().collect();
    days.sort_by(|(day_a, count_a), (day_b, count_b)| count_b.cmp(count_a).then(day_a.cmp(day_b)));
    days.truncate(limit);
    days
}

fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 * 100.0 / total as f64).round() as u32
}

pub fn monthly_stats(period: &ReportPeriod, bookings: &[&Booking], counts: &StatusCounts, limit: usize) -> MonthlyStats {
    let average_per_day = if counts.total == 0 {
        0
    } else {
        (counts.total as f64 / period.days() as f64).round() as u32
    };

    MonthlyStats {
        confirmation_rate: percentage(counts.confirmed, counts.total),
        cancellation_rate: percentage(counts.cancelled, counts.total),
        average_per_day,
        top_days: top_days(bookings, limit),
    }
}
