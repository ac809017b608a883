//! Control vocabulary accepted on the control topic
//!
//! Payloads are plain text, matched case-insensitively after trimming:
//!
//! | Payload        | Action                                   |
//! |----------------|------------------------------------------|
//! | `ON`           | `solid_on()`                             |
//! | `OFF`          | `solid_off()`                            |
//! | `BLINK`        | `set_mode("BLINK")`                      |
//! | alert pattern  | `set_mode(name)` for an alert-class name |
//!
//! Anything else is rejected whole; nothing is partially applied.

use std::fmt;

use stratus_connectors::InboundMessage;
use stratus_core::{PatternClass, PatternTable, StatusIndicator};

/// Mode name started by `BLINK`
pub const BLINK_MODE: &str = "BLINK";

/// A parsed control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Hold the indicator on
    On,
    /// Hold the indicator off
    Off,
    /// Start the plain blink pattern
    Blink,
    /// Start a named alert-class pattern
    Pattern(String),
}

/// Why a control payload was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Payload is not UTF-8
    NotText,
    /// Payload is empty or whitespace
    Empty,
    /// Not in the vocabulary, or names a pattern that is not alert-class
    Unknown(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotText => write!(f, "payload is not text"),
            Rejection::Empty => write!(f, "empty payload"),
            Rejection::Unknown(word) => write!(f, "unknown command {:?}", word),
        }
    }
}

impl ControlCommand {
    /// Parse a text payload against the loaded pattern table
    pub fn parse(payload: &str, patterns: &PatternTable) -> Result<Self, Rejection> {
        let word = payload.trim();
        if word.is_empty() {
            return Err(Rejection::Empty);
        }

        let upper = word.to_ascii_uppercase();
        match upper.as_str() {
            "ON" => Ok(ControlCommand::On),
            "OFF" => Ok(ControlCommand::Off),
            BLINK_MODE => Ok(ControlCommand::Blink),
            name => match patterns.get(name) {
                Some(pattern) if pattern.class == PatternClass::Alert => {
                    Ok(ControlCommand::Pattern(upper))
                }
                _ => Err(Rejection::Unknown(word.to_string())),
            },
        }
    }

    /// Parse an inbound broker message
    pub fn from_message(message: &InboundMessage, patterns: &PatternTable) -> Result<Self, Rejection> {
        let text = message.payload_str().ok_or(Rejection::NotText)?;
        Self::parse(text, patterns)
    }

    /// Apply to the indicator; `false` when the indicator refused the mode
    pub fn apply(&self, indicator: &StatusIndicator) -> bool {
        match self {
            ControlCommand::On => {
                indicator.solid_on();
                true
            }
            ControlCommand::Off => {
                indicator.solid_off();
                true
            }
            ControlCommand::Blink => indicator.set_mode(BLINK_MODE, None),
            ControlCommand::Pattern(name) => indicator.set_mode(name, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_words_parse_case_insensitively() {
        let table = PatternTable::with_defaults();
        assert_eq!(ControlCommand::parse("ON", &table), Ok(ControlCommand::On));
        assert_eq!(ControlCommand::parse(" off\n", &table), Ok(ControlCommand::Off));
        assert_eq!(ControlCommand::parse("Blink", &table), Ok(ControlCommand::Blink));
    }

    #[test]
    fn alert_patterns_accepted_by_name() {
        let table = PatternTable::with_defaults();
        assert_eq!(
            ControlCommand::parse("alert", &table),
            Ok(ControlCommand::Pattern("ALERT".into()))
        );
        assert_eq!(
            ControlCommand::parse("UNCOMFORTABLE", &table),
            Ok(ControlCommand::Pattern("UNCOMFORTABLE".into()))
        );
    }

    #[test]
    fn non_alert_patterns_rejected() {
        let table = PatternTable::with_defaults();
        assert!(matches!(
            ControlCommand::parse("SENSOR_READING", &table),
            Err(Rejection::Unknown(_))
        ));
        assert!(matches!(
            ControlCommand::parse("WIFI_CONNECTING", &table),
            Err(Rejection::Unknown(_))
        ));
    }

    #[test]
    fn garbage_rejected() {
        let table = PatternTable::with_defaults();
        assert_eq!(ControlCommand::parse("   ", &table), Err(Rejection::Empty));
        assert_eq!(
            ControlCommand::parse("reboot now", &table),
            Err(Rejection::Unknown("reboot now".into()))
        );

        let binary = InboundMessage::new("weather/control", vec![0xc3, 0x28]);
        assert_eq!(ControlCommand::from_message(&binary, &table), Err(Rejection::NotText));
    }
}
