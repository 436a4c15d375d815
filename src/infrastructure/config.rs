use crate::infrastructure::error::InfraError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

const APP_JSON: &str = "app.json";

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:4280";
const DEFAULT_SWEEP_TIME: &str = "02:30";
const DEFAULT_SWEEP_TIMEZONE: &str = "UTC";

/// Local time-of-day and zone at which the daily sweep loop fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSchedule {
    pub time: NaiveTime,
    pub timezone: Tz,
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let value = serde_json::json!({
            "schema": 1,
            "appName": "ApptWindow",
            "bindAddress": DEFAULT_BIND_ADDRESS,
            "sweepTime": DEFAULT_SWEEP_TIME,
            "sweepTimezone": DEFAULT_SWEEP_TIMEZONE,
        });
        let formatted = serde_json::to_string_pretty(&value)?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn read_string_field(config_dir: &Path, field: &str, default: &str) -> Result<String, InfraError> {
    let app = read_config(&config_dir.join(APP_JSON))?;
    Ok(app
        .get(field)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string())
}

pub fn read_bind_address(config_dir: &Path) -> Result<SocketAddr, InfraError> {
    let raw = read_string_field(config_dir, "bindAddress", DEFAULT_BIND_ADDRESS)?;
    raw.parse::<SocketAddr>()
        .map_err(|error| InfraError::InvalidConfig(format!("invalid bindAddress '{raw}': {error}")))
}

pub fn read_sweep_schedule(config_dir: &Path) -> Result<SweepSchedule, InfraError> {
    let raw_time = read_string_field(config_dir, "sweepTime", DEFAULT_SWEEP_TIME)?;
    let time = NaiveTime::parse_from_str(&raw_time, "%H:%M")
        .map_err(|error| InfraError::InvalidConfig(format!("invalid sweepTime '{raw_time}': {error}")))?;

    let raw_timezone = read_string_field(config_dir, "sweepTimezone", DEFAULT_SWEEP_TIMEZONE)?;
    let timezone = raw_timezone
        .parse::<Tz>()
        .map_err(|_| InfraError::InvalidConfig(format!("invalid sweepTimezone '{raw_timezone}'")))?;

    Ok(SweepSchedule { time, timezone })
}
