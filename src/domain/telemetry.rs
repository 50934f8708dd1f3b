//! Environmental telemetry samples from the sensor logger.

/// Temperature and battery reading at one capture instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentalSample {
    /// Temperature in degrees Fahrenheit
    pub temperature_f: f64,

    /// Logger battery voltage (volts)
    pub battery_voltage: f64,
}

impl EnvironmentalSample {
    /// Build a sample from the logger's Celsius reading
    pub fn from_celsius(temperature_c: f64, battery_voltage: f64) -> Self {
        Self {
            temperature_f: celsius_to_fahrenheit(temperature_c),
            battery_voltage,
        }
    }
}

/// `F = C * 9/5 + 32`
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}
