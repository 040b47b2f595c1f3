use super::*;

#[test]
fn samples_respect_interval() {
    let mut p = ProgressTracker::default();
    assert_eq!(p.sample(0.0, 1.0, 100.0), Some(1.0));
    assert_eq!(p.sample(50.0, 2.0, 100.0), None);
    assert_eq!(p.sample(100.0, 3.0, 100.0), Some(3.0));
}

#[test]
fn value_never_decreases() {
    let mut p = ProgressTracker::default();
    p.sample(0.0, 50.0, 100.0);
    assert_eq!(p.sample(200.0, 10.0, 100.0), Some(50.0));
    assert_eq!(p.value(), 50.0);
}

#[test]
fn holds_at_cap_until_complete_then_reports_100_once() {
    let mut p = ProgressTracker::default();
    assert_eq!(p.sample(0.0, 120.0, 100.0), Some(PROGRESS_CAP));
    assert!(p.value() <= 99.9);
    assert!(p.complete());
    assert_eq!(p.value(), 100.0);
    assert!(!p.complete());
    assert_eq!(p.sample(1000.0, 1.0, 100.0), None);
    assert_eq!(p.value(), 100.0);
}

#[test]
fn zero_total_reports_zero() {
    let mut p = ProgressTracker::default();
    assert_eq!(p.sample(0.0, 5.0, 0.0), Some(0.0));
}

#[test]
fn reset_starts_over() {
    let mut p = ProgressTracker::new(Duration::from_millis(10), 50.0);
    p.sample(0.0, 90.0, 100.0);
    assert_eq!(p.value(), 50.0);
    p.complete();
    p.reset();
    assert!(!p.is_complete());
    assert_eq!(p.sample(0.0, 1.0, 100.0), Some(1.0));
}
