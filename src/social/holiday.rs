//! Holiday detection for caption theming
//!
//! A holiday is "active" from 3 days before to 3 days after its date.
//! Only the current year's dates are considered.

use chrono::{Datelike, NaiveDate, Weekday};

/// Active window around each holiday, in days
const WINDOW_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holiday {
    NewYear,
    MlkDay,
    Valentine,
    Easter,
    MothersDay,
    MemorialDay,
    FathersDay,
    Juneteenth,
    IndependenceDay,
    LaborDay,
    VeteransDay,
    Thanksgiving,
    Christmas,
}

impl Holiday {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewYear => "New Year",
            Self::MlkDay => "MLK Day",
            Self::Valentine => "Valentine",
            Self::Easter => "Easter",
            Self::MothersDay => "Mother Day",
            Self::MemorialDay => "Memorial Day",
            Self::FathersDay => "Father Day",
            Self::Juneteenth => "Juneteenth",
            Self::IndependenceDay => "Independence Day",
            Self::LaborDay => "Labor Day",
            Self::VeteransDay => "Veterans Day",
            Self::Thanksgiving => "Thanksgiving",
            Self::Christmas => "Christmas",
        }
    }

    pub fn hashtag(&self) -> &'static str {
        match self {
            Self::NewYear => "#NewYear",
            Self::MlkDay => "#MLKDay",
            Self::Valentine => "#ValentinesDay",
            Self::Easter => "#Easter",
            Self::MothersDay => "#MothersDay",
            Self::MemorialDay => "#MemorialDay",
            Self::FathersDay => "#FathersDay",
            Self::Juneteenth => "#Juneteenth",
            Self::IndependenceDay => "#IndependenceDay",
            Self::LaborDay => "#LaborDay",
            Self::VeteransDay => "#VeteransDay",
            Self::Thanksgiving => "#Thanksgiving",
            Self::Christmas => "#Christmas",
        }
    }
}

/// The holiday whose window covers `today`, if any
pub fn current_holiday(today: NaiveDate) -> Option<Holiday> {
    let year = today.year();
    for (holiday, date) in holidays_for_year(year) {
        let diff = (today - date).num_days().abs();
        if diff <= WINDOW_DAYS {
            return Some(holiday);
        }
    }
    None
}

fn holidays_for_year(year: i32) -> Vec<(Holiday, NaiveDate)> {
    let mut holidays = Vec::new();
    let mut push = |holiday: Holiday, date: Option<NaiveDate>| {
        if let Some(date) = date {
            holidays.push((holiday, date));
        }
    };

    push(Holiday::NewYear, NaiveDate::from_ymd_opt(year, 1, 1));
    push(Holiday::MlkDay, nth_weekday(year, 1, Weekday::Mon, 3));
    push(Holiday::Valentine, NaiveDate::from_ymd_opt(year, 2, 14));
    push(Holiday::Easter, easter(year));
    push(Holiday::MothersDay, nth_weekday(year, 5, Weekday::Sun, 2));
    push(Holiday::MemorialDay, last_weekday(year, 5, Weekday::Mon));
    push(Holiday::FathersDay, nth_weekday(year, 6, Weekday::Sun, 3));
    push(Holiday::Juneteenth, NaiveDate::from_ymd_opt(year, 6, 19));
    push(
        Holiday::IndependenceDay,
        NaiveDate::from_ymd_opt(year, 7, 4),
    );
    push(Holiday::LaborDay, nth_weekday(year, 9, Weekday::Mon, 1));
    push(Holiday::VeteransDay, NaiveDate::from_ymd_opt(year, 11, 11));
    push(Holiday::Thanksgiving, nth_weekday(year, 11, Weekday::Thu, 4));
    push(Holiday::Christmas, NaiveDate::from_ymd_opt(year, 12, 25));

    holidays
}

/// Nth occurrence of a weekday in a month (n is 1-based)
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    let day = 1 + offset + (n - 1) * 7;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Last occurrence of a weekday in a month
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let last_day = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?.pred_opt()?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?.pred_opt()?
    };
    let offset =
        (7 + last_day.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    last_day.checked_sub_days(chrono::Days::new(offset as u64))
}

/// Easter Sunday per the anonymous Gregorian computus
fn easter(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
