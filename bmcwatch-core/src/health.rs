//! Normalization of Redfish health and power-state strings into metric codes

/// Healthy (also used for unknown or missing values)
pub const HEALTH_OK: u8 = 0;
pub const HEALTH_CRITICAL: u8 = 1;
pub const HEALTH_WARNING: u8 = 2;

pub const POWER_OFF: u8 = 0;
pub const POWER_ON: u8 = 1;

/// Map a `Status.Health` value to its code, case-insensitively.
///
/// Total: anything not recognised, including a missing value, is healthy.
pub fn health_code(health: Option<&str>) -> u8 {
    let Some(health) = health else {
        return HEALTH_OK;
    };
    match health.trim().to_ascii_lowercase().as_str() {
        "ok" | "operable" | "enabled" | "good" | "absent" => HEALTH_OK,
        "warning" => HEALTH_WARNING,
        "critical" | "error" => HEALTH_CRITICAL,
        _ => HEALTH_OK,
    }
}

/// Map a `PowerState` value to its code; anything but "on" is off
pub fn power_state_code(state: Option<&str>) -> u8 {
    match state.map(|s| s.trim().to_ascii_lowercase()) {
        Some(s) if s == "on" => POWER_ON,
        _ => POWER_OFF,
    }
}
