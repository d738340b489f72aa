//! Visibility windows over message file modification times.

use chrono::{DateTime, Duration, Utc};

/// Inclusive range of modification times a scan accepts.
///
/// Either bound may be absent. A message file is eligible when
/// `not_before <= mtime <= not_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityWindow {
    not_before: Option<DateTime<Utc>>,
    not_after: Option<DateTime<Utc>>,
}

impl VisibilityWindow {
    /// Window accepting every modification time
    pub fn unbounded() -> Self {
        Self {
            not_before: None,
            not_after: None,
        }
    }

    /// Window of messages a `receive` at `now` may return.
    ///
    /// Messages younger than `delay_seconds` are still delayed, messages older
    /// than `expiration_seconds` are expired. A zero expiration disables the
    /// lower bound. With a zero delay the upper bound is `now`, which only
    /// hides files whose modification time was pushed into the future.
    pub fn for_receive(now: DateTime<Utc>, delay_seconds: u64, expiration_seconds: u64) -> Self {
        // A delay too large to represent hides everything
        let not_after =
            Some(seconds_before(now, delay_seconds).unwrap_or(DateTime::<Utc>::MIN_UTC));

        let not_before = if expiration_seconds > 0 {
            seconds_before(now, expiration_seconds)
        } else {
            None
        };

        Self {
            not_before,
            not_after,
        }
    }

    /// Window of expired messages at `now`, or `None` when nothing can expire
    pub fn for_cleanup(now: DateTime<Utc>, expiration_seconds: u64) -> Option<Self> {
        if expiration_seconds == 0 {
            return None;
        }

        seconds_before(now, expiration_seconds).map(|cutoff| Self {
            not_before: None,
            not_after: Some(cutoff),
        })
    }

    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    pub fn not_after(&self) -> Option<DateTime<Utc>> {
        self.not_after
    }

    /// Check if a modification time falls inside the window
    pub fn contains(&self, modified: DateTime<Utc>) -> bool {
        self.not_before.map_or(true, |bound| modified >= bound)
            && self.not_after.map_or(true, |bound| modified <= bound)
    }
}

fn seconds_before(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    let span = Duration::try_seconds(seconds)?;
    now.checked_sub_signed(span)
}

#[cfg(test)]
#[path = "visibility_tests.rs"]
mod tests;
