// IoT Central - Telemetry collection pipeline
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Unit conversions for sensor and weather readings

use std::f64::consts::E;

/// Station altitude used for the sea-level pressure correction, in meters
pub const DEFAULT_ALTITUDE_M: f64 = 100.0;

/// hPa per inch of mercury
const HPA_PER_INHG: f64 = 33.863_888;

/// °C to °F
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

/// °C to K
pub fn celsius_to_kelvin(celsius: f64) -> f64 {
    celsius + 273.15
}

/// Correct a station pressure reading to sea level (barometric formula)
///
/// `p0 = p * (1 - 0.0065 h / (0.0065 h + T))^-5.257` with `T` in kelvin.
pub fn raw_pressure_to_sealevel(raw_hpa: f64, celsius: f64, altitude_m: f64) -> f64 {
    raw_hpa * (1.0 - 0.0065 * altitude_m / (0.0065 * altitude_m + celsius_to_kelvin(celsius)))
        .powf(-5.257)
}

/// hPa to inches of mercury
pub fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa / HPA_PER_INHG
}

/// Absolute humidity in g/m³
///
/// `relative_humidity` is a percentage between 0 and 100. Uses the Magnus
/// approximation from the Sensirion SGP30 datasheet.
pub fn relative_humidity_to_absolute(relative_humidity: f64, celsius: f64) -> f64 {
    let saturation_hpa = 6.112 * E.powf(17.62 * celsius / (243.12 + celsius));
    let vapor_hpa = saturation_hpa * relative_humidity / 100.0;
    216.7 * vapor_hpa / celsius_to_kelvin(celsius)
}
