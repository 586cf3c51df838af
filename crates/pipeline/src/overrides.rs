//! `--override key.path=value` support: the config is round-tripped through a
//! JSON value, the addressed field replaced, and the result deserialized and
//! validated again.

use std::str::FromStr;

use serde_json::{Map, Number, Value};

use crate::config::{PipelineConfig, PipelineError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideArg {
    pub path: String,
    pub value: String,
}

impl FromStr for OverrideArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, value) = s
            .split_once('=')
            .ok_or_else(|| "override must be in the form key=value".to_string())?;
        if path.trim().is_empty() {
            return Err("override key must not be empty".into());
        }
        Ok(Self {
            path: path.trim().to_string(),
            value: value.trim().to_string(),
        })
    }
}

pub fn apply_overrides(
    config: PipelineConfig,
    overrides: &[OverrideArg],
) -> Result<PipelineConfig, PipelineError> {
    let mut value = serde_json::to_value(config)?;

    for override_arg in overrides {
        let new_value = parse_override_value(&override_arg.value);
        set_value_at_path(&mut value, &override_arg.path, new_value)?;
    }

    let config: PipelineConfig = serde_json::from_value(value).map_err(|err| {
        PipelineError::ConfigFormat(format!("failed to apply overrides: {err}"))
    })?;
    config.validate()?;
    Ok(config)
}

fn parse_override_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if trimmed.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(int_val) = trimmed.parse::<u64>() {
        return Value::Number(Number::from(int_val));
    }
    if let Ok(int_val) = trimmed.parse::<i64>() {
        return Value::Number(Number::from(int_val));
    }
    if let Ok(float_val) = trimmed.parse::<f64>() {
        if let Some(number) = Number::from_f64(float_val) {
            return Value::Number(number);
        }
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') || trimmed.starts_with('"') {
        if let Ok(json_val) = serde_json::from_str::<Value>(trimmed) {
            return json_val;
        }
    }
    Value::String(trimmed.to_string())
}

fn set_value_at_path(value: &mut Value, path: &str, new_value: Value) -> Result<(), PipelineError> {
    let segments: Vec<&str> = path.split('.').map(str::trim).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(PipelineError::ConfigFormat(format!(
            "invalid override path '{path}'"
        )));
    }

    let (last, parents) = match segments.split_last() {
        Some(split) => split,
        None => {
            return Err(PipelineError::ConfigFormat(
                "override path must not be empty".into(),
            ))
        }
    };

    let mut current = value;
    for segment in parents {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let Some(map) = current.as_object_mut() else {
            return Err(PipelineError::ConfigFormat(format!(
                "override path segment '{segment}' points into a non-object value"
            )));
        };
        current = map.entry(segment.to_string()).or_insert(Value::Null);
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    let Some(map) = current.as_object_mut() else {
        return Err(PipelineError::ConfigFormat(format!(
            "override path '{path}' points into a non-object value"
        )));
    };
    map.insert(last.to_string(), new_value);
    Ok(())
}
