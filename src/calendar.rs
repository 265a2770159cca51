use chrono::{Datelike, NaiveDate, Weekday};

/// Fixed annual holidays as (month, day).
const FIXED_HOLIDAYS: &[(u32, u32)] = &[
    (1, 1),   // New Year
    (1, 26),  // Republic Day
    (8, 15),  // Independence Day
    (10, 2),  // Gandhi Jayanti
    (12, 25), // Christmas
];

/// Instructional-day calendar anchored at a reference date.
///
/// Holidays are pinned to the reference date's year: Jan 1 of the following
/// year counts as a working day when it falls inside a projection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingCalendar {
    today: NaiveDate,
}

impl WorkingCalendar {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn holidays(&self) -> Vec<NaiveDate> {
        let year = self.today.year();
        FIXED_HOLIDAYS
            .iter()
            .filter_map(|&(month, day)| NaiveDate::from_ymd_opt(year, month, day))
            .collect()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        date.year() == self.today.year()
            && FIXED_HOLIDAYS
                .iter()
                .any(|&(month, day)| date.month() == month && date.day() == day)
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        date.weekday() != Weekday::Sun && !self.is_holiday(date) && !is_third_saturday(date)
    }

    /// Working days from the reference date through `end`, both inclusive.
    pub fn remaining_working_days(&self, end: NaiveDate) -> u32 {
        let count = self
            .today
            .iter_days()
            .take_while(|day| *day <= end)
            .filter(|day| self.is_working_day(*day))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// The `n`th working day strictly after the reference date.
    pub fn advance_working_days(&self, n: u32) -> NaiveDate {
        if n == 0 {
            return self.today;
        }
        self.today
            .iter_days()
            .skip(1)
            .filter(|day| self.is_working_day(*day))
            .nth((n - 1) as usize)
            .unwrap_or(NaiveDate::MAX)
    }
}

pub fn is_third_saturday(date: NaiveDate) -> bool {
    if date.weekday() != Weekday::Sat {
        return false;
    }
    let Some(first) = date.with_day(1) else {
        return false;
    };
    let first_saturday = 7 - first.weekday().num_days_from_sunday();
    date.day() == first_saturday + 14
}
