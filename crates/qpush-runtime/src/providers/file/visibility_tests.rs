//! Tests for visibility windows.

use super::*;
use chrono::TimeZone;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

#[test]
fn test_unbounded_window_accepts_everything() {
    let window = VisibilityWindow::unbounded();
    assert!(window.contains(DateTime::<Utc>::MIN_UTC));
    assert!(window.contains(now()));
    assert!(window.contains(DateTime::<Utc>::MAX_UTC));
}

#[test]
fn test_zero_delay_bounds_at_now() {
    let window = VisibilityWindow::for_receive(now(), 0, 3600);
    assert_eq!(window.not_after(), Some(now()));
    assert!(window.contains(now()));
    assert!(window.contains(now() - Duration::seconds(5)));
    assert!(!window.contains(now() + Duration::seconds(5)));
}

#[test]
fn test_delay_hides_young_messages() {
    let window = VisibilityWindow::for_receive(now(), 30, 3600);

    assert!(!window.contains(now()));
    assert!(!window.contains(now() - Duration::seconds(29)));
    assert!(window.contains(now() - Duration::seconds(30)));
    assert!(window.contains(now() - Duration::seconds(31)));
}

#[test]
fn test_expiration_hides_old_messages() {
    let window = VisibilityWindow::for_receive(now(), 0, 90_061);

    // 1 day 1 hour 1 minute 1 second
    assert!(window.contains(now() - Duration::seconds(90_060)));
    assert!(window.contains(now() - Duration::seconds(90_061)));
    assert!(!window.contains(now() - Duration::seconds(90_062)));
}

#[test]
fn test_zero_expiration_never_expires() {
    let window = VisibilityWindow::for_receive(now(), 0, 0);
    assert_eq!(window, VisibilityWindow::unbounded());
    assert!(VisibilityWindow::for_cleanup(now(), 0).is_none());
}

#[test]
fn test_cleanup_window_selects_expired_messages() {
    let window = VisibilityWindow::for_cleanup(now(), 60).unwrap();

    assert_eq!(window.not_before(), None);
    assert!(window.contains(now() - Duration::seconds(61)));
    assert!(!window.contains(now() - Duration::seconds(59)));
}

#[test]
fn test_huge_values_do_not_overflow() {
    let window = VisibilityWindow::for_receive(now(), u64::MAX, u64::MAX);

    // Unrepresentable delay hides everything, unrepresentable expiry keeps everything
    assert!(!window.contains(now()));
    assert_eq!(window.not_before(), None);
    assert!(VisibilityWindow::for_cleanup(now(), u64::MAX).is_none());
}
