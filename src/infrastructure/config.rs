use crate::domain::cadence::{CadenceSettings, WorkHours, parse_hhmm};
use crate::domain::clocks::WorldClock;
use crate::infrastructure::error::ConfigError;
use chrono::{Duration, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_JSON: &str = "config.json";
const SECRETS_JSON: &str = "secrets.json";
const SUPPORTED_SCHEMA: u64 = 1;
const WORLD_CLOCK_COUNT: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClockEntry {
    pub label: String,
    pub timezone: String,
}

/// Non-sensitive device configuration, reloaded from disk every boot.
/// `developmentMode` is deliberately not part of the persisted wake
/// state; flipping it takes effect on the next power cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    pub schema: u8,
    pub development_mode: bool,
    pub timezone: String,
    pub work_hours: WorkHours,
    pub time_only_interval_work_secs: u64,
    pub time_only_interval_off_secs: u64,
    pub api_refresh_interval_secs: u64,
    pub full_refresh_interval_secs: u64,
    pub evening_threshold: String,
    pub clocks: Vec<ClockEntry>,
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.work_hours.validate().map_err(ConfigError::Invalid)?;
        self.reference_zone()?;
        self.evening_threshold_time()?;
        if self.clocks.len() != WORLD_CLOCK_COUNT {
            return Err(ConfigError::Invalid(format!(
                "clocks must list exactly {WORLD_CLOCK_COUNT} entries, found {}",
                self.clocks.len()
            )));
        }
        self.world_clocks()?;
        for (name, value) in [
            ("timeOnlyIntervalWorkSecs", self.time_only_interval_work_secs),
            ("timeOnlyIntervalOffSecs", self.time_only_interval_off_secs),
            ("apiRefreshIntervalSecs", self.api_refresh_interval_secs),
            ("fullRefreshIntervalSecs", self.full_refresh_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }

    pub fn reference_zone(&self) -> Result<Tz, ConfigError> {
        parse_timezone(&self.timezone)
    }

    pub fn evening_threshold_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_hhmm(&self.evening_threshold)
            .ok_or_else(|| ConfigError::Invalid("eveningThreshold must be HH:MM".to_string()))
    }

    pub fn world_clocks(&self) -> Result<Vec<WorldClock>, ConfigError> {
        self.clocks
            .iter()
            .map(|entry| {
                Ok(WorldClock {
                    label: entry.label.clone(),
                    zone: parse_timezone(&entry.timezone)?,
                })
            })
            .collect()
    }

    pub fn cadence_settings(&self) -> CadenceSettings {
        CadenceSettings {
            work_hours: self.work_hours.clone(),
            time_only_interval_work: Duration::seconds(self.time_only_interval_work_secs as i64),
            time_only_interval_off: Duration::seconds(self.time_only_interval_off_secs as i64),
            api_refresh_interval: Duration::seconds(self.api_refresh_interval_secs as i64),
            full_refresh_interval: Duration::seconds(self.full_refresh_interval_secs as i64),
            development_mode: self.development_mode,
        }
    }
}

/// Calendar API credentials, kept out of `config.json` the way the
/// firmware kept `secrets.py` out of version control. Never created
/// with defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSecrets {
    pub schema: u8,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub calendar_id: String,
}

impl CalendarSecrets {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("clientId", &self.client_id),
            ("clientSecret", &self.client_secret),
            ("refreshToken", &self.refresh_token),
            ("calendarId", &self.calendar_id),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

fn default_config_value() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "developmentMode": false,
        "timezone": "Europe/Madrid",
        "workHours": {
            "start": "08:00",
            "end": "20:00",
            "days": ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        },
        "timeOnlyIntervalWorkSecs": 60,
        "timeOnlyIntervalOffSecs": 3600,
        "apiRefreshIntervalSecs": 3600,
        "fullRefreshIntervalSecs": 1800,
        "eveningThreshold": "19:00",
        "clocks": [
            { "label": "BARCELONA", "timezone": "Europe/Madrid" },
            { "label": "NEW YORK", "timezone": "America/New_York" },
            { "label": "SAN FRAN", "timezone": "America/Los_Angeles" }
        ]
    })
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), ConfigError> {
    fs::create_dir_all(config_dir)?;
    let path = config_dir.join(CONFIG_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_config_value())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_schema_checked(path: &Path) -> Result<serde_json::Value, ConfigError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| ConfigError::Invalid(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(ConfigError::Invalid(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_config(config_dir: &Path) -> Result<DeviceConfig, ConfigError> {
    let parsed = read_schema_checked(&config_dir.join(CONFIG_JSON))?;
    let config: DeviceConfig = serde_json::from_value(parsed)?;
    config.validate()?;
    Ok(config)
}

pub fn load_secrets(config_dir: &Path) -> Result<CalendarSecrets, ConfigError> {
    let parsed = read_schema_checked(&config_dir.join(SECRETS_JSON))?;
    let secrets: CalendarSecrets = serde_json::from_value(parsed)?;
    secrets.validate()?;
    Ok(secrets)
}

fn parse_timezone(value: &str) -> Result<Tz, ConfigError> {
    value
        .parse::<Tz>()
        .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{value}'")))
}
