//! Meal window arithmetic
//!
//! Pure time-window computations: which window a moment falls into, when the
//! next generation run lands, and when a superseded result becomes safe to
//! delete. No I/O.
//!
//! The four windows are cyclic: window *i* spans from its boundary to the
//! next window's boundary, and dinner wraps across midnight into breakfast.
//! Every per-user boundary is shifted earlier by a fixed jitter offset so
//! that users with identical preferences do not all fire in the same second.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the four daily meal windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MealWindow {
    /// Window 0
    Breakfast,
    /// Window 1
    Lunch,
    /// Window 2
    EveningSnack,
    /// Window 3
    Dinner,
}

impl MealWindow {
    /// All windows in boundary order.
    pub const ALL: [MealWindow; 4] = [
        MealWindow::Breakfast,
        MealWindow::Lunch,
        MealWindow::EveningSnack,
        MealWindow::Dinner,
    ];

    /// Numeric index (0-3).
    pub fn index(self) -> u8 {
        match self {
            MealWindow::Breakfast => 0,
            MealWindow::Lunch => 1,
            MealWindow::EveningSnack => 2,
            MealWindow::Dinner => 3,
        }
    }

    /// Window for a numeric index.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(MealWindow::Breakfast),
            1 => Some(MealWindow::Lunch),
            2 => Some(MealWindow::EveningSnack),
            3 => Some(MealWindow::Dinner),
            _ => None,
        }
    }

    /// The window after this one, wrapping dinner back to breakfast.
    pub fn next(self) -> Self {
        match self {
            MealWindow::Breakfast => MealWindow::Lunch,
            MealWindow::Lunch => MealWindow::EveningSnack,
            MealWindow::EveningSnack => MealWindow::Dinner,
            MealWindow::Dinner => MealWindow::Breakfast,
        }
    }
}

impl std::fmt::Display for MealWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MealWindow::Breakfast => write!(f, "breakfast"),
            MealWindow::Lunch => write!(f, "lunch"),
            MealWindow::EveningSnack => write!(f, "eveningSnack"),
            MealWindow::Dinner => write!(f, "dinner"),
        }
    }
}

/// Per-user meal boundary times plus the load-balancing jitter offset.
///
/// Assigned once at registration and immutable for the user's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealTimes {
    /// Breakfast boundary (window 0 start)
    pub breakfast: NaiveTime,
    /// Lunch boundary (window 1 start)
    pub lunch: NaiveTime,
    /// Evening snack boundary (window 2 start)
    pub evening_snack: NaiveTime,
    /// Dinner boundary (window 3 start)
    pub dinner: NaiveTime,
    /// Jitter offset in minutes; every boundary fires this much earlier.
    pub offset_minutes: u32,
}

impl Default for MealTimes {
    fn default() -> Self {
        Self {
            breakfast: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default(),
            lunch: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(),
            evening_snack: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            dinner: NaiveTime::from_hms_opt(18, 0, 0).unwrap_or_default(),
            offset_minutes: 0,
        }
    }
}

impl MealTimes {
    /// Default boundaries with a specific jitter offset.
    #[must_use]
    pub fn with_offset(offset_minutes: u32) -> Self {
        Self {
            offset_minutes,
            ..Self::default()
        }
    }

    /// Boundary time-of-day for a window, without jitter.
    pub fn boundary(&self, window: MealWindow) -> NaiveTime {
        match window {
            MealWindow::Breakfast => self.breakfast,
            MealWindow::Lunch => self.lunch,
            MealWindow::EveningSnack => self.evening_snack,
            MealWindow::Dinner => self.dinner,
        }
    }
}

/// A window's boundary on `now`'s date, shifted earlier by the jitter offset.
fn jittered_boundary(times: &MealTimes, window: MealWindow, now: DateTime<Utc>) -> DateTime<Utc> {
    unjittered_boundary(times, window, now) - Duration::minutes(i64::from(times.offset_minutes))
}

/// A window's boundary on `now`'s date, without jitter.
fn unjittered_boundary(times: &MealTimes, window: MealWindow, now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(times.boundary(window)).and_utc()
}

/// Which window contains `now`.
///
/// Builds the four jittered boundaries for today and returns the first window
/// whose `[start, end)` span contains `now`. The dinner window crosses
/// midnight: when a window's end lands before its start, the end is pushed a
/// day forward, and when `now` precedes that start, the whole span shifts back
/// a day. Falls back to dinner when no span matches at a boundary edge.
pub fn current_window(times: &MealTimes, now: DateTime<Utc>) -> MealWindow {
    for window in MealWindow::ALL {
        let mut start = jittered_boundary(times, window, now);
        let mut end = jittered_boundary(times, window.next(), now);

        if end < start {
            end += Duration::days(1);
            if now < start {
                start -= Duration::days(1);
                end -= Duration::days(1);
            }
        }

        if start <= now && now < end {
            return window;
        }
    }

    MealWindow::Dinner
}

/// When the next generation run lands after `after` was dispatched.
///
/// Advances to the following window's jittered boundary today. Boundaries
/// already in the past are skipped; the wrap through breakfast always jumps a
/// full day, which bounds the advance to at most four steps. The returned
/// timestamp is strictly after `now`.
pub fn next_run(
    times: &MealTimes,
    after: MealWindow,
    now: DateTime<Utc>,
) -> (DateTime<Utc>, MealWindow) {
    let mut window = after;
    for _ in 0..MealWindow::ALL.len() {
        window = window.next();
        let candidate = jittered_boundary(times, window, now);
        if candidate > now {
            return (candidate, window);
        }
        if window == MealWindow::Breakfast {
            // Today's breakfast has passed: tomorrow's.
            return (candidate + Duration::days(1), window);
        }
    }

    // Structurally unreachable: the loop wraps to breakfast within four steps.
    tracing::error!("Window advance failed to terminate; defaulting to next breakfast");
    (
        jittered_boundary(times, MealWindow::Breakfast, now) + Duration::days(1),
        MealWindow::Breakfast,
    )
}

/// The un-jittered boundary of `window` today.
///
/// Used only as the deferred-deletion deadline: the moment the window being
/// generated truly opens, its predecessor's stored result becomes safe to
/// remove.
pub fn window_end(times: &MealTimes, window: MealWindow, now: DateTime<Utc>) -> DateTime<Utc> {
    unjittered_boundary(times, window, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 14, hour, min, 0).unwrap()
    }

    #[test]
    fn test_window_index_round_trip() {
        for window in MealWindow::ALL {
            assert_eq!(MealWindow::from_index(window.index()), Some(window));
        }
        assert_eq!(MealWindow::from_index(4), None);
    }

    #[test]
    fn test_window_cycle() {
        assert_eq!(MealWindow::Dinner.next(), MealWindow::Breakfast);
        let mut window = MealWindow::Breakfast;
        for _ in 0..4 {
            window = window.next();
        }
        assert_eq!(window, MealWindow::Breakfast);
    }

    #[test]
    fn test_current_window_midmorning() {
        // Scenario A: no jitter, 10:30 falls in breakfast.
        let times = MealTimes::default();
        assert_eq!(current_window(&times, at(10, 30)), MealWindow::Breakfast);
    }

    #[test]
    fn test_current_window_jitter_shifts_boundary() {
        // Scenario B: with a 20 minute offset the evening snack window ends
        // at 17:40, so 17:45 already belongs to dinner.
        let times = MealTimes::with_offset(20);
        assert_eq!(current_window(&times, at(17, 45)), MealWindow::Dinner);
        assert_eq!(current_window(&times, at(17, 35)), MealWindow::EveningSnack);
    }

    #[test]
    fn test_current_window_overnight() {
        // Dinner wraps across midnight until breakfast.
        let times = MealTimes::default();
        assert_eq!(current_window(&times, at(23, 30)), MealWindow::Dinner);
        assert_eq!(current_window(&times, at(2, 0)), MealWindow::Dinner);
        assert_eq!(current_window(&times, at(7, 59)), MealWindow::Dinner);
        assert_eq!(current_window(&times, at(8, 0)), MealWindow::Breakfast);
    }

    #[test]
    fn test_current_window_total_over_day() {
        // Every minute of the day maps to exactly one window, for a spread of
        // jitter offsets; windows appear in cyclic boundary order.
        for offset in [0u32, 7, 15, 29] {
            let times = MealTimes::with_offset(offset);
            let mut seen = std::collections::HashSet::new();
            let mut prev = current_window(&times, at(0, 0));
            seen.insert(prev);
            for minute in (0..24 * 60).step_by(7) {
                let now = at(0, 0) + Duration::minutes(minute);
                let window = current_window(&times, now);
                if window != prev {
                    assert_eq!(window, prev.next(), "offset {offset} minute {minute}");
                    prev = window;
                }
                seen.insert(window);
            }
            assert_eq!(seen.len(), 4, "offset {offset} missed a window");
        }
    }

    #[test]
    fn test_next_run_same_day() {
        // Scenario A continued: after breakfast at 10:30, lunch at 12:00.
        let times = MealTimes::default();
        let (next, window) = next_run(&times, MealWindow::Breakfast, at(10, 30));
        assert_eq!(window, MealWindow::Lunch);
        assert_eq!(next, at(12, 0));
    }

    #[test]
    fn test_next_run_applies_jitter() {
        let times = MealTimes::with_offset(20);
        let (next, window) = next_run(&times, MealWindow::Breakfast, at(10, 30));
        assert_eq!(window, MealWindow::Lunch);
        assert_eq!(next, at(11, 40));
    }

    #[test]
    fn test_next_run_skips_passed_windows() {
        // At 17:00 both lunch and the evening snack have passed; the advance
        // after breakfast lands on dinner.
        let times = MealTimes::default();
        let (next, window) = next_run(&times, MealWindow::Breakfast, at(17, 0));
        assert_eq!(window, MealWindow::Dinner);
        assert_eq!(next, at(18, 0));
    }

    #[test]
    fn test_next_run_wraps_to_tomorrow() {
        // After dinner at 22:00, tomorrow's breakfast.
        let times = MealTimes::default();
        let (next, window) = next_run(&times, MealWindow::Dinner, at(22, 0));
        assert_eq!(window, MealWindow::Breakfast);
        assert_eq!(next, at(8, 0) + Duration::days(1));
    }

    #[test]
    fn test_next_run_strictly_future() {
        // Property: for any starting window, offset, and time of day, the
        // next run is strictly after now.
        for offset in [0u32, 11, 29] {
            let times = MealTimes::with_offset(offset);
            for start in MealWindow::ALL {
                for minute in (0..24 * 60).step_by(13) {
                    let now = at(0, 0) + Duration::minutes(minute);
                    let (next, _) = next_run(&times, start, now);
                    assert!(next > now, "offset {offset} start {start} minute {minute}");
                    assert!(next - now <= Duration::days(1));
                }
            }
        }
    }

    #[test]
    fn test_window_end_is_unjittered() {
        let times = MealTimes::with_offset(25);
        assert_eq!(window_end(&times, MealWindow::Lunch, at(9, 0)), at(12, 0));
        assert_eq!(window_end(&times, MealWindow::Breakfast, at(9, 0)), at(8, 0));
    }
}
