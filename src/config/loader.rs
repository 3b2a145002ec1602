use crate::config::ledger::LedgerConfig;
use crate::config::sources::{BankConfig, KioskConfig};
use crate::config::*;
use crate::error::{Error, Result};
use crate::types::calendar::parse_timezone;
use chrono::NaiveTime;
use chrono_tz::Tz;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// Upper bound for `kiosk.max_retries`.
pub const MAX_KIOSK_RETRIES: u32 = 10;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub bank: BankConfig,
    pub kiosk: KioskConfig,
    pub ledger: LedgerConfig,
    pub schedule: ScheduleConfig,
    pub server: ServerConfig,
    pub comparison: ComparisonConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("RATEWATCH").separator("__"))
            .build()?;

        let app: AppConfig = config.try_deserialize()?;
        app.validate()?;
        Ok(app)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ledger.max_entries == 0 {
            return Err(Error::ConfigError("ledger.max_entries must be at least 1".to_string()));
        }
        if self.kiosk.max_retries > MAX_KIOSK_RETRIES {
            return Err(Error::ConfigError(format!(
                "kiosk.max_retries must be at most {}",
                MAX_KIOSK_RETRIES
            )));
        }
        if self.kiosk.poll_interval_ms == 0 {
            return Err(Error::ConfigError("kiosk.poll_interval_ms must be positive".to_string()));
        }
        for (name, value) in [
            ("bank.fallback_rate", self.bank.fallback_rate),
            ("kiosk.fallback_twd_rate", self.kiosk.fallback_twd_rate),
            ("kiosk.fallback_usd_rate", self.kiosk.fallback_usd_rate),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::ConfigError(format!("{name} must be a positive number")));
            }
        }
        self.timezone()?;
        self.schedule_time()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.schedule.timezone)
    }

    pub fn schedule_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(&self.schedule.time, "%H:%M")
            .map_err(|e| Error::ConfigError(format!("schedule.time {:?}: {}", self.schedule.time, e)))
    }
}
