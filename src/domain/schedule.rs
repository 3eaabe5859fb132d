use crate::domain::models::{DayOfWeek, Schedule};
use chrono::{Datelike, NaiveDateTime, Timelike};

const MINUTES_PER_DAY: u32 = 24 * 60;

fn parse_minutes(value: &str) -> Option<u32> {
    let (hour_str, minute_str) = value.trim().split_once(':')?;
    let hour: u32 = hour_str.parse().ok()?;
    let minute: u32 = minute_str.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some(hour * 60 + minute)
}

fn minutes_of(now: NaiveDateTime) -> u32 {
    now.hour() * 60 + now.minute()
}

/// Whether `schedule` is active at the local wall-clock instant `now`.
///
/// The window is half-open `[start, end)`. An end before the start spans
/// midnight: active when `current >= start || current < end`. Weekday
/// membership is always checked against today's date, so the post-midnight
/// tail of an overnight range only matches when the new day is itself
/// listed in `days`. An equal start and end is a zero-width window and
/// never matches.
pub fn is_schedule_active(schedule: &Schedule, now: NaiveDateTime) -> bool {
    if !schedule.enabled {
        return false;
    }
    if !schedule
        .days
        .contains(&DayOfWeek::from_weekday(now.weekday()))
    {
        return false;
    }
    let (Some(start), Some(end)) = (
        parse_minutes(&schedule.start_time),
        parse_minutes(&schedule.end_time),
    ) else {
        return false;
    };

    let current = minutes_of(now);
    if end < start {
        current >= start || current < end
    } else {
        current >= start && current < end
    }
}

/// First active schedule in list order; list order is the tie-break.
pub fn get_active_schedule(schedules: &[Schedule], now: NaiveDateTime) -> Option<&Schedule> {
    schedules
        .iter()
        .find(|schedule| is_schedule_active(schedule, now))
}

/// Human-readable time left in the schedule's window, e.g. "7h 0m" or
/// "45m". For an overnight range that has not yet wrapped past midnight
/// the end boundary is pushed out by 24 hours.
pub fn time_remaining_in_schedule(schedule: &Schedule, now: NaiveDateTime) -> String {
    let (Some(start), Some(end)) = (
        parse_minutes(&schedule.start_time),
        parse_minutes(&schedule.end_time),
    ) else {
        return "ending soon".to_string();
    };

    let current = minutes_of(now);
    let mut end_total = end;
    if end < start && current > end {
        end_total += MINUTES_PER_DAY;
    }

    let remaining = i64::from(end_total) - i64::from(current);
    if remaining <= 0 {
        return "ending soon".to_string();
    }

    let hours = remaining / 60;
    let minutes = remaining % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// The schedule's end time in 12-hour form, e.g. "5:00 PM". Falls back to
/// the raw stored string when it does not parse.
pub fn format_end_time(schedule: &Schedule) -> String {
    let Some(end) = parse_minutes(&schedule.end_time) else {
        return schedule.end_time.clone();
    };
    let hour_24 = end / 60;
    let minute = end % 60;
    let hour = match hour_24 % 12 {
        0 => 12,
        other => other,
    };
    let meridiem = if hour_24 >= 12 { "PM" } else { "AM" };
    format!("{hour}:{minute:02} {meridiem}")
}
