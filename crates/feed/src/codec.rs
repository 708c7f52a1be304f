use chrono::{DateTime, Utc};
use serde_json::Value;

use common::fields::{self, FieldError, Object};
use common::{Bar, BarStatus};

/// Outcome of decoding one provider message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Bar(Bar),
    Skip(SkipReason),
}

/// Messages that are well-formed but carry no realtime bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Keep-alive, liveness only.
    Heartbeat,
    /// Backlog bar replayed by the provider on connect (`IsRealtime: false`).
    Historical,
    MissingField(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not a JSON object")]
    NotObject,

    #[error("field '{field}' is not numeric: {value}")]
    NonNumeric { field: &'static str, value: String },

    #[error("field '{field}' has an unexpected value: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Decode one newline-delimited message from the bar stream.
///
/// `received_at` is the capture time assigned by the caller, normally the
/// wall clock at the moment the line was read.
pub fn decode(raw: &str, received_at: DateTime<Utc>) -> Result<Decoded, DecodeError> {
    let value: Value = serde_json::from_str(raw)?;
    let obj = value.as_object().ok_or(DecodeError::NotObject)?;

    if obj.contains_key("Heartbeat") {
        return Ok(Decoded::Skip(SkipReason::Heartbeat));
    }

    match obj.get("IsRealtime") {
        None => return Ok(Decoded::Skip(SkipReason::MissingField("IsRealtime"))),
        Some(Value::Bool(true)) => {}
        Some(Value::Bool(false)) => return Ok(Decoded::Skip(SkipReason::Historical)),
        Some(other) => {
            return Err(DecodeError::InvalidField {
                field: "IsRealtime",
                value: other.to_string(),
            })
        }
    }

    match bar_from_message(obj, received_at) {
        Ok(bar) => Ok(Decoded::Bar(bar)),
        Err(FieldError::Missing(field)) => Ok(Decoded::Skip(SkipReason::MissingField(field))),
        Err(FieldError::NonNumeric { field, value }) => Err(DecodeError::NonNumeric { field, value }),
        Err(FieldError::NotText { field, value }) => Err(DecodeError::InvalidField { field, value }),
    }
}

fn bar_from_message(obj: &Object, received_at: DateTime<Utc>) -> Result<Bar, FieldError> {
    let bar_time = match obj.get("TimeStamp") {
        None | Some(Value::Null) => None,
        Some(_) => {
            let raw = fields::text(obj, "TimeStamp")?;
            let parsed = DateTime::parse_from_rfc3339(raw).map_err(|_| FieldError::NotText {
                field: "TimeStamp",
                value: raw.to_string(),
            })?;
            Some(parsed.with_timezone(&Utc))
        }
    };

    Ok(Bar {
        received_at,
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
