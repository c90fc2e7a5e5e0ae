use std::fmt;

use time::{format_description::BorrowedFormatItem, macros::format_description, Date, Weekday};

static DAY_ID_FMT: &[BorrowedFormatItem] = format_description!("[year][month][day]");

/// A Monday to Friday calendar date, identified on disk and in URLs as `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusinessDay(Date);

impl BusinessDay {
    pub fn new(date: Date) -> Option<Self> {
        is_weekday(date).then_some(Self(date))
    }

    pub fn date(&self) -> Date {
        self.0
    }

    pub fn id(&self) -> String {
        self.to_string()
    }

    pub fn parse(id: &str) -> Option<Self> {
        Date::parse(id, DAY_ID_FMT).ok().and_then(Self::new)
    }
}

impl fmt::Display for BusinessDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}{:02}{:02}",
            self.0.year(),
            u8::from(self.0.month()),
            self.0.day()
        )
    }
}

fn is_weekday(date: Date) -> bool {
    !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

/// The `count` business days before `today`, most recent first.
pub fn business_days_before(today: Date, count: i64) -> Vec<BusinessDay> {
    let wanted = usize::try_from(count).unwrap_or(0);
    let mut days = Vec::with_capacity(wanted);
    let mut current = today.previous_day();
    while days.len() < wanted {
        let Some(date) = current else { break };
        if let Some(day) = BusinessDay::new(date) {
            days.push(day);
        }
        current = date.previous_day();
    }
    days
}

/// The `count` business days before the current local date.
pub fn get_business_days(count: i64) -> Vec<BusinessDay> {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    business_days_before(now.date(), count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn skips_the_weekend() {
        // 2024-09-23 is a Monday.
        let days = business_days_before(date!(2024 - 09 - 23), 3);
        let ids: Vec<String> = days.iter().map(BusinessDay::id).collect();
        assert_eq!(ids, ["20240920", "20240919", "20240918"]);
    }

    #[test]
    fn yields_exactly_count_descending_weekdays() {
        for count in 0..15 {
            let days = business_days_before(date!(2024 - 03 - 03), count);
            assert_eq!(days.len(), count as usize);
            for pair in days.windows(2) {
                let gap = (pair[0].date() - pair[1].date()).whole_days();
                assert!((1..=3).contains(&gap), "gap of {gap} days");
            }
            assert!(days.iter().all(|d| is_weekday(d.date())));
        }
    }

    #[test]
    fn non_positive_count_is_empty() {
        assert!(business_days_before(date!(2024 - 09 - 19), 0).is_empty());
        assert!(business_days_before(date!(2024 - 09 - 19), -4).is_empty());
    }

    #[test]
    fn id_round_trips() {
        let day = BusinessDay::parse("20240919").unwrap();
        assert_eq!(day.id(), "20240919");
        assert!(BusinessDay::parse("20240921").is_none());
    }
}
