//! Status Indicator Constants

/// Alert-class patterns run this many times slower than their table entry.
pub const ALERT_EXTENSION_FACTOR: f32 = 5.0;

/// Mode name recorded by `solid_on`.
pub const SOLID_ON_MODE: &str = "SOLID_ON";

/// Mode name recorded by `solid_off`.
pub const SOLID_OFF_MODE: &str = "SOLID_OFF";

/// On and off time of a single error-code blink (milliseconds).
pub const ERROR_BLINK_MS: u64 = 200;

/// Pause between error-code digits (milliseconds).
pub const ERROR_DIGIT_GAP_MS: u64 = 500;

/// Default acknowledgement pulse length (milliseconds).
pub const DEFAULT_PULSE_MS: u64 = 100;

/// Shortest period the timer worker will schedule (milliseconds).
pub const MIN_PERIOD_MS: u64 = 1;

/// Data-class flash shown while a sensor read is in progress (milliseconds).
pub const SENSOR_READING_FLASH_MS: u64 = 500;

/// Data-class flash shown after a successful publish (milliseconds).
pub const DATA_SENT_FLASH_MS: u64 = 300;
