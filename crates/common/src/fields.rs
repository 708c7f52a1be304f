//! Coercion of loosely typed JSON bar fields.
//!
//! The provider sends prices and some volumes as strings (`"38422"`) and the
//! tick counters as numbers. Both shapes are accepted wherever a numeric
//! field is read, so a record survives being re-encoded either way.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("missing field '{0}'")]
    Missing(&'static str),

    #[error("field '{field}' is not numeric: {value}")]
    NonNumeric { field: &'static str, value: String },

    #[error("field '{field}' is not a string: {value}")]
    NotText { field: &'static str, value: String },
}

pub type Object = Map<String, Value>;

/// Read a price field as an exact decimal.
pub fn decimal(obj: &Object, field: &'static str) -> Result<Decimal, FieldError> {
    let value = obj.get(field).ok_or(FieldError::Missing(field))?;
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(non_numeric(field, other)),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| non_numeric(field, value))
}

/// Read a volume or tick counter.
pub fn count(obj: &Object, field: &'static str) -> Result<u64, FieldError> {
    let value = obj.get(field).ok_or(FieldError::Missing(field))?;
    match value {
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| non_numeric(field, value)),
        Value::Number(n) => n.as_u64().ok_or_else(|| non_numeric(field, value)),
        other => Err(non_numeric(field, other)),
    }
}

pub fn text<'a>(obj: &'a Object, field: &'static str) -> Result<&'a str, FieldError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(FieldError::NotText {
            field,
            value: other.to_string(),
        }),
        None => Err(FieldError::Missing(field)),
    }
}

fn non_numeric(field: &'static str, value: &Value) -> FieldError {
    FieldError::NonNumeric {
        field,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Object {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn decimal_accepts_string_and_number() {
        let o = obj(json!({"A": "38422", "B": 4501.25, "C": " 12.50 "}));
        assert_eq!(decimal(&o, "A").unwrap(), Decimal::from(38422));
        assert_eq!(decimal(&o, "B").unwrap(), Decimal::new(450125, 2));
        assert_eq!(decimal(&o, "C").unwrap().to_string(), "12.50");
    }

    #[test]
    fn count_accepts_string_and_number() {
        let o = obj(json!({"TotalVolume": "86", "UpTicks": 55}));
        assert_eq!(count(&o, "TotalVolume").unwrap(), 86);
        assert_eq!(count(&o, "UpTicks").unwrap(), 55);
    }

    #[test]
    fn missing_and_garbage_are_distinguished() {
        let o = obj(json!({"Close": "abc", "UpTicks": -3}));
        assert_eq!(decimal(&o, "Open"), Err(FieldError::Missing("Open")));
        assert!(matches!(
            decimal(&o, "Close"),
            Err(FieldError::NonNumeric { field: "Close", .. })
        ));
        assert!(matches!(
            count(&o, "UpTicks"),
            Err(FieldError::NonNumeric { field: "UpTicks", .. })
        ));
    }
}
