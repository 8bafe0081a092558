//! Unit conversions between simulator wire units and display units.
//!
//! The bridge reports angles in radians, speeds in meters per second, altitudes in feet
//! and longitudes in the 0..360 degree range. These functions are pure and are what the
//! snapshot accessors call every time a display value is requested.

/// Meters per second to knots.
pub const MS_TO_KNOTS: f64 = 1.94384;
/// Meters per second to feet per minute.
pub const MS_TO_FPM: f64 = 196.85039;
/// Meters per second to kilometers per hour.
pub const MS_TO_KMH: f64 = 3.6;
/// Feet to meters.
pub const FEET_TO_METERS: f64 = 0.3048;
/// Meters to feet.
pub const METERS_TO_FEET: f64 = 3.28084;

/// Convert meters per second to knots.
pub fn ms_to_knots(ms: f64) -> f64 {
    ms * MS_TO_KNOTS
}

/// Convert knots to meters per second.
pub fn knots_to_ms(knots: f64) -> f64 {
    knots / MS_TO_KNOTS
}

/// Convert meters per second to feet per minute.
pub fn ms_to_fpm(ms: f64) -> f64 {
    ms * MS_TO_FPM
}

/// Convert feet per minute to meters per second.
pub fn fpm_to_ms(fpm: f64) -> f64 {
    fpm / MS_TO_FPM
}

/// Convert meters per second to kilometers per hour.
pub fn ms_to_kmh(ms: f64) -> f64 {
    ms * MS_TO_KMH
}

pub fn radians_to_degrees(rad: f64) -> f64 {
    rad.to_degrees()
}

pub fn degrees_to_radians(deg: f64) -> f64 {
    deg.to_radians()
}

/// Normalize a heading to the `[0, 360)` range.
///
/// Negative inputs wrap around: `-10` becomes `350`.
pub fn normalize_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Convert a longitude reported in the 0..360 range to the -180..+180 range.
///
/// Values up to and including 180 are returned unchanged.
pub fn normalize_longitude(degrees: f64) -> f64 {
    if degrees > 180.0 { degrees - 360.0 } else { degrees }
}

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * FEET_TO_METERS
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters * METERS_TO_FEET
}

/// Format a heading given in radians as a three digit string, e.g. `"045°"`.
pub fn format_heading(radians: f64) -> String {
    let degrees = normalize_heading(radians_to_degrees(radians)).round();
    // 359.6 rounds up to 360, which reads as north
    let degrees = if degrees >= 360.0 { 0.0 } else { degrees };
    format!("{:03.0}°", degrees)
}

/// Format an altitude in feet with thousands separators, e.g. `"10,500 ft"`.
pub fn format_altitude(feet: f64) -> String {
    if !feet.is_finite() {
        return format!("{feet} ft");
    }

    let rounded = feet.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if rounded < 0 { "-" } else { "" };
    format!("{sign}{grouped} ft")
}

/// Format a speed given in meters per second as knots, e.g. `"250 kts"`.
pub fn format_speed_kts(ms: f64) -> String {
    format!("{:.0} kts", ms_to_knots(ms))
}

/// Format a vertical speed given in meters per second as signed feet per minute.
pub fn format_vertical_speed(ms: f64) -> String {
    let fpm = ms_to_fpm(ms);
    let sign = if fpm.round() > 0.0 { "+" } else { "" };
    format!("{sign}{fpm:.0} fpm")
}
