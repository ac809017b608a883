//! Status indicator behaviour with the shipped pattern table

mod common;

use std::thread;
use std::time::Duration;

use stratus_core::indicator::{
    ErrorCodeTiming, IndicatorConfig, IndicatorPattern, PatternClass, PatternTable, StatusIndicator,
};
use stratus_core::CoreError;

use common::RecordingOutput;

fn shipped_indicator() -> (StatusIndicator, RecordingOutput) {
    let output = RecordingOutput::default();
    let indicator = StatusIndicator::new(output.clone(), PatternTable::with_defaults()).unwrap();
    (indicator, output)
}

#[test]
fn connection_progress_sequence() {
    let (indicator, _) = shipped_indicator();

    assert!(indicator.set_mode("WIFI_CONNECTING", None));
    assert!(indicator.set_mode("WIFI_CONNECTED", Some(Duration::from_millis(40))));
    assert_eq!(indicator.mode().as_deref(), Some("WIFI_CONNECTED"));

    thread::sleep(Duration::from_millis(150));
    assert_eq!(indicator.mode(), None);
    assert!(!indicator.is_blinking());
    indicator.shutdown();
}

#[test]
fn alert_holds_off_activity_flashes() {
    let (indicator, _) = shipped_indicator();

    assert!(indicator.set_mode("SENSOR_READING", Some(Duration::from_millis(500))));
    assert!(indicator.set_mode("ALERT", None));

    for flash in ["SENSOR_READING", "DATA_SENT"] {
        assert_eq!(indicator.try_set_mode(flash, None), Err(CoreError::PatternSuppressed));
    }
    assert_eq!(indicator.mode().as_deref(), Some("ALERT"));

    indicator.stop_blink();
    assert!(indicator.set_mode("DATA_SENT", Some(Duration::from_millis(300))));
    indicator.shutdown();
}

#[test]
fn alert_class_runs_five_times_slower() {
    let table = PatternTable::empty()
        .with("DATA", IndicatorPattern::data(0.004, 0.004))
        .and_then(|t| t.with("ALARM", IndicatorPattern::alert(0.004, 0.004)))
        .unwrap();

    let data_out = RecordingOutput::default();
    let data = StatusIndicator::new(data_out.clone(), table.clone()).unwrap();
    let alert_out = RecordingOutput::default();
    let alert = StatusIndicator::new(alert_out.clone(), table).unwrap();

    assert!(data.set_mode("DATA", None));
    assert!(alert.set_mode("ALARM", None));
    thread::sleep(Duration::from_millis(200));
    data.shutdown();
    alert.shutdown();

    // 8 ms period vs 40 ms period over the same window
    assert!(data_out.rising_edges() > 2 * alert_out.rising_edges());
    assert!(alert_out.rising_edges() >= 2);
}

#[test]
fn stop_guarantees_output_off() {
    let (indicator, output) = shipped_indicator();
    assert!(indicator.set_mode("ALERT", None));

    for _ in 0..20 {
        thread::sleep(Duration::from_millis(7));
        indicator.stop_blink();
        assert_eq!(output.last(), Some(false));
        assert!(!indicator.status().led_on);
        assert!(indicator.set_mode("ALERT", None));
    }
    indicator.shutdown();
    assert_eq!(output.last(), Some(false));
}

#[test]
fn clones_share_state() {
    let (indicator, _) = shipped_indicator();
    let other = indicator.clone();

    assert!(other.set_mode("BLINK", None));
    assert_eq!(indicator.mode().as_deref(), Some("BLINK"));

    indicator.solid_on();
    assert!(other.status().led_on);
    other.shutdown();
}

#[test]
fn dropping_last_handle_turns_output_off() {
    let output = RecordingOutput::default();
    {
        let indicator = StatusIndicator::new(output.clone(), PatternTable::with_defaults()).unwrap();
        indicator.solid_on();
        assert_eq!(output.last(), Some(true));
    }
    assert_eq!(output.last(), Some(false));
}

#[test]
fn error_code_uses_configured_timing() {
    let output = RecordingOutput::default();
    let config = IndicatorConfig {
        patterns: PatternTable::with_defaults(),
        error_timing: ErrorCodeTiming { blink_ms: 1, digit_gap_ms: 2 },
    };
    let indicator = StatusIndicator::with_config(output.clone(), config).unwrap();

    indicator.indicate_error(4);
    assert_eq!(output.rising_edges(), 4);

    indicator.indicate_error(10);
    assert_eq!(output.rising_edges(), 5);
    indicator.shutdown();
}

#[test]
fn shipped_classes() {
    let table = PatternTable::with_defaults();
    let alerts: Vec<&str> = table
        .names()
        .filter(|name| table.get(name).map(|p| p.class) == Some(PatternClass::Alert))
        .collect();
    assert_eq!(alerts, vec!["ALERT", "COMFORTABLE", "ERROR", "UNCOMFORTABLE"]);
}
