use crate::generator::workflow::TimingScope;
use std::time::Duration;

#[test]
fn test_timing_scope_records_phases_in_order() {
    let mut timing = TimingScope::new();

    timing.start_phase("load_framework");
    std::thread::sleep(Duration::from_millis(5));
    let first = timing.end_phase("load_framework").unwrap();
    assert!(first >= Duration::from_millis(5));

    timing.start_phase("propose_sources");
    timing.end_phase("propose_sources");

    let phases: Vec<&str> = timing
        .get_phase_durations()
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(phases, vec!["load_framework", "propose_sources"]);
    assert_eq!(timing.get_phase_duration("load_framework"), Some(first));
    assert!(timing.get_total_duration() >= first);
}

#[test]
fn test_timing_scope_ignores_unknown_phase() {
    let mut timing = TimingScope::new();
    assert!(timing.end_phase("persist").is_none());
    assert!(timing.get_phase_durations().is_empty());
}

#[test]
fn test_timing_report() {
    let mut timing = TimingScope::default();
    timing.start_phase("synthesize");
    timing.end_phase("synthesize");

    let report = timing.generate_timing_report();
    assert!(report.contains("总执行时间"));
    assert!(report.contains("- synthesize:"));
}
