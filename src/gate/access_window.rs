use anyhow::{Context, Result};
use chrono::{Local, NaiveTime};
use std::fmt;

/// Daily opening hours, `[start, end)` in local wall-clock time.
///
/// When `start` is after `end` the window spans midnight. Equal bounds
/// describe an empty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl AccessWindow {
    #[must_use]
    pub const fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse `"HH:MM"` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = NaiveTime::parse_from_str(start, "%H:%M")
            .with_context(|| format!("Invalid access window start: {start}"))?;
        let end = NaiveTime::parse_from_str(end, "%H:%M")
            .with_context(|| format!("Invalid access window end: {end}"))?;
        Ok(Self::new(start, end))
    }

    #[must_use]
    pub fn allows(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }

    #[must_use]
    pub fn allows_now(&self) -> bool {
        self.allows(Local::now().time())
    }

    /// Message returned to callers outside the window.
    #[must_use]
    pub fn denial_message(&self) -> String {
        format!(
            "Chat access is restricted between {} and {}.",
            self.end.format("%H:%M"),
            self.start.format("%H:%M")
        )
    }
}

impl fmt::Display for AccessWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_daytime_window() {
        let window = AccessWindow::parse("06:00", "21:00").unwrap();

        assert!(window.allows(at(6, 0)));
        assert!(window.allows(at(12, 30)));
        assert!(window.allows(at(20, 59)));
        assert!(!window.allows(at(21, 0)));
        assert!(!window.allows(at(5, 59)));
        assert!(!window.allows(at(0, 0)));
    }

    #[test]
    fn test_window_spanning_midnight() {
        let window = AccessWindow::parse("22:00", "02:00").unwrap();

        assert!(window.allows(at(23, 0)));
        assert!(window.allows(at(1, 59)));
        assert!(!window.allows(at(2, 0)));
        assert!(!window.allows(at(12, 0)));
    }

    #[test]
    fn test_equal_bounds_never_allow() {
        let window = AccessWindow::parse("00:00", "00:00").unwrap();
        assert!(!window.allows(at(0, 0)));
        assert!(!window.allows(at(13, 0)));
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        assert!(AccessWindow::parse("6am", "21:00").is_err());
        assert!(AccessWindow::parse("06:00", "24:30").is_err());
    }

    #[test]
    fn test_denial_message() {
        let window = AccessWindow::parse("06:00", "21:00").unwrap();
        assert_eq!(
            window.denial_message(),
            "Chat access is restricted between 21:00 and 06:00."
        );
    }
}
