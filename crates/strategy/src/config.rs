use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{Error, Result};

use crate::session::SessionWindow;
use crate::trade::Bracket;

/// Strategy parameter file (TOML). Every table and key is optional.
///
/// Example `config/strategy.toml`:
/// ```toml
/// [bracket]
/// up = 2.0
/// down = 4.0
///
/// [entry]
/// up_bars = 2
/// up_ticks = 3
///
/// [session]
/// timezone = "America/Los_Angeles"
/// open = "06:30"
/// close = "13:00"
///
/// [notify]
/// live_window_secs = 5
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyFileConfig {
    pub bracket: BracketConfig,
    pub entry: EntryConfig,
    pub session: SessionConfig,
    pub notify: NotifyConfig,
}

/// Exit distances, in price points from the entry close.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BracketConfig {
    pub up: f64,
    pub down: f64,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self { up: 2.0, down: 4.0 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Closed up-bars required immediately before an entry.
    pub up_bars: usize,
    /// Consecutive up-ticks required in the forming minute.
    pub up_ticks: u64,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            up_bars: 2,
            up_ticks: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub timezone: String,
    /// `HH:MM`, inclusive.
    pub open: String,
    /// `HH:MM`, exclusive.
    pub close: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timezone: "America/Los_Angeles".to_string(),
            open: "06:30".to_string(),
            close: "13:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// A signal is notified only if its bar is at most this old.
    pub live_window_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { live_window_secs: 5 }
    }
}

/// Validated, typed parameters of a `BracketEngine`.
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub bracket: Bracket,
    pub up_bars: usize,
    pub up_ticks: u64,
    pub session: SessionWindow,
    pub live_window: Duration,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            bracket: Bracket::default(),
            up_bars: 2,
            up_ticks: 3,
            session: SessionWindow::default(),
            live_window: Duration::from_secs(5),
        }
    }
}

impl StrategyFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read strategy config at '{}': {e}", path.display()))
        })?;
        Self::parse(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse strategy config: {e}")))
    }

    pub fn params(&self) -> Result<EngineParams> {
        let up = price_points("bracket.up", self.bracket.up)?;
        let down = price_points("bracket.down", self.bracket.down)?;

        let timezone: Tz = self
            .session
            .timezone
            .parse()
            .map_err(|_| Error::Config(format!("unknown timezone '{}'", self.session.timezone)))?;
        let open = parse_time("session.open", &self.session.open)?;
        let close = parse_time("session.close", &self.session.close)?;
        if open >= close {
            return Err(Error::Config(format!(
                "session.open ({open}) must be before session.close ({close})"
            )));
        }

        Ok(EngineParams {
            bracket: Bracket { up, down },
            up_bars: self.entry.up_bars,
            up_ticks: self.entry.up_ticks,
            session: SessionWindow::new(timezone, open, close),
            live_window: Duration::from_secs(self.notify.live_window_secs),
        })
    }
}

fn price_points(key: &str, value: f64) -> Result<Decimal> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::Config(format!("{key} must be a positive number, got {value}")));
    }
    Decimal::try_from(value).map_err(|e| Error::Config(format!("{key}: {e}")))
}

fn parse_time(key: &str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw.trim(), "%H:%M:%S"))
        .map_err(|_| Error::Config(format!("{key} must be HH:MM, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let params = StrategyFileConfig::parse("").unwrap().params().unwrap();
        assert_eq!(params.bracket.up, Decimal::from(2));
        assert_eq!(params.bracket.down, Decimal::from(4));
        assert_eq!(params.up_bars, 2);
        assert_eq!(params.up_ticks, 3);
        assert_eq!(params.live_window, Duration::from_secs(5));
        assert_eq!(params.session.timezone(), chrono_tz::America::Los_Angeles);
    }

    #[test]
    fn partial_tables_override_only_their_keys() {
        let cfg = StrategyFileConfig::parse(
            r#"
            [bracket]
            up = 1.25

            [session]
            timezone = "America/New_York"
            open = "09:30"
            close = "16:00"
            "#,
        )
        .unwrap();
        let params = cfg.params().unwrap();
        assert_eq!(params.bracket.up, Decimal::new(125, 2));
        assert_eq!(params.bracket.down, Decimal::from(4));
        assert_eq!(params.session.timezone(), chrono_tz::America::New_York);
    }

    #[test]
    fn rejects_bad_values() {
        let bad_tz = StrategyFileConfig::parse("[session]\ntimezone = \"Mars/Olympus\"").unwrap();
        assert!(matches!(bad_tz.params(), Err(Error::Config(_))));

        let inverted = StrategyFileConfig::parse("[session]\nopen = \"13:00\"\nclose = \"06:30\"").unwrap();
        assert!(matches!(inverted.params(), Err(Error::Config(_))));

        let negative = StrategyFileConfig::parse("[bracket]\ndown = -1.0").unwrap();
        assert!(matches!(negative.params(), Err(Error::Config(_))));

        assert!(matches!(
            StrategyFileConfig::parse("[bracket]\nup = \"two\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strategy.toml");
        std::fs::write(&path, "[entry]\nup_ticks = 5\n").unwrap();
        let cfg = StrategyFileConfig::load(&path).unwrap();
        assert_eq!(cfg.entry.up_ticks, 5);
        assert_eq!(cfg.entry.up_bars, 2);

        assert!(StrategyFileConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
