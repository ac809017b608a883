//! Collaborator traits
//!
//! The runtime talks to hardware only through these. Keep them small - the
//! node has one barometric sensor and one or two indicator outputs.

/// One sensor read. `None` fields are transient misses, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Temperature in °C
    pub temperature: Option<f32>,
    /// Pressure in hPa
    pub pressure: Option<f32>,
}

impl SensorReading {
    /// A complete reading
    pub const fn new(temperature: f32, pressure: f32) -> Self {
        Self {
            temperature: Some(temperature),
            pressure: Some(pressure),
        }
    }

    /// A failed read
    pub const fn missed() -> Self {
        Self {
            temperature: None,
            pressure: None,
        }
    }

    /// Check if the temperature channel produced a value
    pub fn has_temperature(&self) -> bool {
        self.temperature.is_some()
    }
}

/// Temperature/pressure sensor collaborator
pub trait Sensor {
    /// Read both channels. Never blocks longer than one bus transaction.
    fn read(&mut self) -> SensorReading;

    /// Check if the sensor was found and initialized
    fn is_connected(&self) -> bool;

    /// Short device description for payloads and logs
    fn describe(&self) -> &str {
        "sensor"
    }
}

/// A single on/off physical output (an LED pin)
///
/// Implementations must tolerate being driven from the indicator's timer
/// worker thread; failures are the implementation's to log.
pub trait IndicatorOutput {
    /// Drive the output high (`true`) or low (`false`)
    fn set(&mut self, on: bool);
}

impl<T: IndicatorOutput + ?Sized> IndicatorOutput for &mut T {
    fn set(&mut self, on: bool) {
        (**self).set(on);
    }
}

#[cfg(feature = "std")]
impl<T: IndicatorOutput + ?Sized> IndicatorOutput for std::boxed::Box<T> {
    fn set(&mut self, on: bool) {
        (**self).set(on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_constructors() {
        let ok = SensorReading::new(21.5, 1013.2);
        assert!(ok.has_temperature());
        assert_eq!(ok.pressure, Some(1013.2));

        let missed = SensorReading::missed();
        assert!(!missed.has_temperature());
        assert_eq!(missed, SensorReading::default());
    }
}
