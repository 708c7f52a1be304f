use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use common::fields::{self, FieldError, Object};
use common::{Bar, BarStatus, Error, Result};

/// Format of `time_received`, in the writer's local time zone.
pub const TIME_RECEIVED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One line of a bar log.
///
/// Field names and value shapes follow the provider's own message, minus the
/// stream bookkeeping fields, plus the local capture time:
///
/// ```json
/// {"High":"38422","Low":"38417","Open":"38417","Close":"38419",
///  "TimeStamp":"2024-02-14T15:49:00Z","TotalVolume":"86",
///  "DownTicks":27,"DownVolume":31,"TotalTicks":82,"UnchangedTicks":0,
///  "UnchangedVolume":0,"UpTicks":55,"UpVolume":55,"BarStatus":"Open",
///  "time_received":"2024-02-14 15:48:22.513444"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BarLogRecord {
    pub high: String,
    pub low: String,
    pub open: String,
    pub close: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<String>,
    pub total_volume: String,
    pub down_ticks: u64,
    pub down_volume: u64,
    pub total_ticks: u64,
    pub unchanged_ticks: u64,
    pub unchanged_volume: u64,
    pub up_ticks: u64,
    pub up_volume: u64,
    pub bar_status: String,
    #[serde(rename = "time_received")]
    pub time_received: String,
}

impl BarLogRecord {
    pub fn from_bar(bar: &Bar) -> Self {
        Self {
            high: bar.high.to_string(),
            low: bar.low.to_string(),
            open: bar.open.to_string(),
            close: bar.close.to_string(),
            time_stamp: bar
                .bar_time
                .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            total_volume: bar.total_volume.to_string(),
            down_ticks: bar.down_ticks,
            down_volume: bar.down_volume,
            total_ticks: bar.total_ticks,
            unchanged_ticks: bar.unchanged_ticks,
            unchanged_volume: bar.unchanged_volume,
            up_ticks: bar.up_ticks,
            up_volume: bar.up_volume,
            bar_status: bar.status.as_str().to_string(),
            time_received: format_time_received(bar.received_at),
        }
    }

    /// Serialize as one newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one log line back into a bar.
    pub fn parse_line(line: &str) -> Result<Bar> {
        let value: Value = serde_json::from_str(line.trim_end())?;
        let obj = value
            .as_object()
            .ok_or_else(|| Error::Decode("bar log line is not a JSON object".into()))?;
        bar_from_object(obj).map_err(|e| Error::Decode(e.to_string()))
    }
}

fn bar_from_object(obj: &Object) -> std::result::Result<Bar, RecordError> {
    let received = fields::text(obj, "time_received")?;
    let bar_time = match obj.get("TimeStamp").and_then(Value::as_str) {
        Some(raw) => Some(parse_rfc3339(raw)?),
        None => None,
    };

    Ok(Bar {
        received_at: parse_time_received(received)?,
        bar_time,
        status: BarStatus::from_provider(fields::text(obj, "BarStatus")?),
        open: fields::decimal(obj, "Open")?,
        high: fields::decimal(obj, "High")?,
        low: fields::decimal(obj, "Low")?,
        close: fields::decimal(obj, "Close")?,
        total_volume: fields::count(obj, "TotalVolume")?,
        up_volume: fields::count(obj, "UpVolume")?,
        down_volume: fields::count(obj, "DownVolume")?,
        total_ticks: fields::count(obj, "TotalTicks")?,
        up_ticks: fields::count(obj, "UpTicks")?,
        down_ticks: fields::count(obj, "DownTicks")?,
        unchanged_ticks: fields::count(obj, "UnchangedTicks")?,
        unchanged_volume: fields::count(obj, "UnchangedVolume")?,
    })
}

#[derive(Debug, thiserror::Error)]
enum RecordError {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("unparseable timestamp '{0}'")]
    Time(String),
}

pub fn format_time_received(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format(TIME_RECEIVED_FORMAT)
        .to_string()
}

/// `time_received` carries no UTC offset. During the repeated hour at the
/// end of daylight saving time both readings are valid, and the earlier one
/// is taken, so bars from the second pass replay an hour early.
fn parse_time_received(raw: &str) -> std::result::Result<DateTime<Utc>, RecordError> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|_| RecordError::Time(raw.to_string()))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| RecordError::Time(raw.to_string()))
}

fn parse_rfc3339(raw: &str) -> std::result::Result<DateTime<Utc>, RecordError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| RecordError::Time(raw.to_string()))
}
