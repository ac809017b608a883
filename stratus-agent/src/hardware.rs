//! Host hardware adapters
//!
//! The node runs on a Linux gateway where the kernel already drives the
//! peripherals, so the adapters are thin sysfs readers and writers:
//!
//! - `SysfsLed`: `/sys/class/leds/<name>/brightness`
//! - `IioBarometer`: an IIO device directory exposing `in_temp_input`
//!   (milli-°C) and `in_pressure_input` (kPa)
//!
//! `SimulatedSensor`, `LogOutput` and `OfflineNetwork` stand in when there is
//! no hardware.

use std::f32::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use stratus_connectors::{ConnectorResult, Link, NetworkTransport};
use stratus_core::{IndicatorOutput, Sensor, SensorReading};

use crate::{AgentError, AgentResult};

fn read_trimmed(path: &Path) -> std::io::Result<String> {
    fs::read_to_string(path).map(|s| s.trim().to_string())
}

/// LED exposed through the sysfs LED class
#[derive(Debug)]
pub struct SysfsLed {
    brightness: PathBuf,
    on_level: String,
    write_failed: bool,
}

impl SysfsLed {
    /// Open `<root>/<name>`; on-level comes from `max_brightness`
    pub fn open(root: &Path, name: &str) -> AgentResult<Self> {
        let dir = root.join(name);
        let brightness = dir.join("brightness");
        if !brightness.exists() {
            return Err(AgentError::Setup(format!("LED {} not found under {}", name, root.display())));
        }

        let on_level = read_trimmed(&dir.join("max_brightness"))
            .ok()
            .filter(|level| level.parse::<u32>().map(|v| v > 0).unwrap_or(false))
            .unwrap_or_else(|| "1".to_string());

        debug!("LED {} ready (on level {})", name, on_level);
        Ok(Self {
            brightness,
            on_level,
            write_failed: false,
        })
    }
}

impl IndicatorOutput for SysfsLed {
    fn set(&mut self, on: bool) {
        let level = if on { self.on_level.as_str() } else { "0" };
        match fs::write(&self.brightness, level) {
            Ok(()) => self.write_failed = false,
            Err(e) => {
                // One line per failure streak
                if !self.write_failed {
                    warn!("Writing {} failed: {}", self.brightness.display(), e);
                }
                self.write_failed = true;
            }
        }
    }
}

/// Output that only logs its transitions
#[derive(Debug, Clone)]
pub struct LogOutput {
    name: String,
}

impl LogOutput {
    /// Named output
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl IndicatorOutput for LogOutput {
    fn set(&mut self, on: bool) {
        debug!("{} -> {}", self.name, if on { "on" } else { "off" });
    }
}

/// Temperature/pressure sensor read through Linux IIO
#[derive(Debug)]
pub struct IioBarometer {
    device: PathBuf,
    label: String,
}

impl IioBarometer {
    /// Open an IIO device directory such as `/sys/bus/iio/devices/iio:device0`
    pub fn open(device: &Path, model: &str) -> AgentResult<Self> {
        if !device.join("in_temp_input").exists() {
            return Err(AgentError::Setup(format!(
                "{} has no temperature channel",
                device.display()
            )));
        }
        Ok(Self {
            device: device.to_path_buf(),
            label: model.to_string(),
        })
    }

    fn channel(&self, file: &str) -> Option<f32> {
        let path = self.device.join(file);
        match read_trimmed(&path) {
            Ok(raw) => raw.parse::<f32>().ok().filter(|v| v.is_finite()),
            Err(e) => {
                debug!("Read of {} failed: {}", path.display(), e);
                None
            }
        }
    }
}

impl Sensor for IioBarometer {
    fn read(&mut self) -> SensorReading {
        SensorReading {
            temperature: self.channel("in_temp_input").map(|milli| milli / 1000.0),
            pressure: self.channel("in_pressure_input").map(|kpa| kpa * 10.0),
        }
    }

    fn is_connected(&self) -> bool {
        self.device.join("in_temp_input").exists()
    }

    fn describe(&self) -> &str {
        &self.label
    }
}

/// Smooth synthetic day/night cycle
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    step: u64,
    base: f32,
    amplitude: f32,
    period_steps: u32,
    miss_every: Option<u64>,
}

impl SimulatedSensor {
    /// 21 °C ± 3 °C over `period_steps` reads
    pub fn new(period_steps: u32) -> Self {
        Self {
            step: 0,
            base: 21.0,
            amplitude: 3.0,
            period_steps: period_steps.max(1),
            miss_every: None,
        }
    }

    /// Fail every `n`th read
    pub fn with_misses(mut self, n: u64) -> Self {
        self.miss_every = (n > 0).then_some(n);
        self
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new(720)
    }
}

impl Sensor for SimulatedSensor {
    fn read(&mut self) -> SensorReading {
        self.step += 1;
        if matches!(self.miss_every, Some(n) if self.step % n == 0) {
            return SensorReading::missed();
        }

        let phase = (self.step % u64::from(self.period_steps)) as f32 / self.period_steps as f32;
        let temperature = self.base + self.amplitude * (phase * TAU).sin();
        let pressure = 1013.25 + 2.0 * (phase * TAU).cos();
        SensorReading::new(temperature, pressure)
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn describe(&self) -> &str {
        "simulated"
    }
}

/// Network link that is always up, for dry runs
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineNetwork;

impl Link for OfflineNetwork {
    fn begin(&mut self) -> ConnectorResult<()> {
        Ok(())
    }

    fn is_up(&mut self) -> bool {
        true
    }

    fn disconnect(&mut self) -> ConnectorResult<()> {
        Ok(())
    }

    fn describe(&self) -> &str {
        "offline network"
    }
}

impl NetworkTransport for OfflineNetwork {
    fn rssi_dbm(&self) -> Option<i32> {
        None
    }

    fn address(&self) -> Option<String> {
        Some("127.0.0.1".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sysfs_led_writes_levels() {
        let dir = TempDir::new().unwrap();
        let led_dir = dir.path().join("status");
        fs::create_dir_all(&led_dir).unwrap();
        fs::write(led_dir.join("brightness"), "0").unwrap();
        fs::write(led_dir.join("max_brightness"), "255\n").unwrap();

        let mut led = SysfsLed::open(dir.path(), "status").unwrap();
        led.set(true);
        assert_eq!(fs::read_to_string(led_dir.join("brightness")).unwrap(), "255");
        led.set(false);
        assert_eq!(fs::read_to_string(led_dir.join("brightness")).unwrap(), "0");
    }

    #[test]
    fn missing_led_is_setup_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(SysfsLed::open(dir.path(), "nope"), Err(AgentError::Setup(_))));
    }

    #[test]
    fn iio_units_converted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("in_temp_input"), "21500\n").unwrap();
        fs::write(dir.path().join("in_pressure_input"), "101.325\n").unwrap();

        let mut sensor = IioBarometer::open(dir.path(), "BMP280").unwrap();
        assert!(sensor.is_connected());
        let reading = sensor.read();
        assert_eq!(reading.temperature, Some(21.5));
        let pressure = reading.pressure.unwrap();
        assert!((pressure - 1013.25).abs() < 0.01);
    }

    #[test]
    fn iio_missing_channel_is_a_miss() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("in_temp_input"), "garbage").unwrap();
        let mut sensor = IioBarometer::open(dir.path(), "BMP280").unwrap();
        assert_eq!(sensor.read(), SensorReading::missed());
    }

    #[test]
    fn simulated_sensor_stays_in_band() {
        let mut sensor = SimulatedSensor::new(24);
        for _ in 0..48 {
            let t = sensor.read().temperature.unwrap();
            assert!((18.0..=24.0).contains(&t));
        }
    }

    #[test]
    fn simulated_misses() {
        let mut sensor = SimulatedSensor::new(10).with_misses(3);
        let misses = (0..9).filter(|_| !sensor.read().has_temperature()).count();
        assert_eq!(misses, 3);
    }
}
