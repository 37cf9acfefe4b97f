//! Argument decoding: the loose argument map of a tool call becomes a typed
//! parameter record in one validation pass. Handlers never read the raw map.

use serde_json::{Map, Value};

use crate::outcome::ToolError;

/// A per-tool parameter record.
pub trait FromArgs: Sized {
    fn from_args(args: &Args<'_>) -> Result<Self, ToolError>;
}

/// Tools without parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoParams;

impl FromArgs for NoParams {
    fn from_args(_args: &Args<'_>) -> Result<Self, ToolError> {
        Ok(NoParams)
    }
}

/// Read-only view over the host-supplied arguments.
#[derive(Debug, Clone, Copy)]
pub struct Args<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// Absent and explicit null are the same thing.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn required_string(&self, key: &str) -> Result<String, ToolError> {
        match self.get(key) {
            Some(Value::String(v)) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(required(key, "a non-empty string")),
        }
    }

    pub fn optional_string(&self, key: &str) -> Result<Option<String>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(v)) if v.trim().is_empty() => Ok(None),
            Some(Value::String(v)) => Ok(Some(v.trim().to_string())),
            Some(_) => Err(invalid(key, "a string")),
        }
    }

    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(v)) => Ok(Some(*v)),
            Some(_) => Err(invalid(key, "a boolean")),
        }
    }

    /// Resource identifiers arrive as JSON numbers (possibly floating point)
    /// and must be positive.
    pub fn required_id(&self, key: &str) -> Result<u64, ToolError> {
        self.get(key)
            .and_then(positive_integer)
            .ok_or_else(|| required(key, "a positive integer"))
    }

    pub fn optional_id(&self, key: &str) -> Result<Option<u64>, ToolError> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => positive_integer(value)
                .map(Some)
                .ok_or_else(|| invalid(key, "a positive integer")),
        }
    }

    /// A required whole number in `min..=max`, checked before any narrowing.
    pub fn required_in_range(&self, key: &str, min: u64, max: u64) -> Result<u64, ToolError> {
        let kind = format!("a number between {min} and {max}");
        let Some(Value::Number(number)) = self.get(key) else {
            return Err(required(key, &kind));
        };
        let value = number.as_f64().unwrap_or(f64::NAN);
        if value.fract() != 0.0 || value < min as f64 || value > max as f64 {
            return Err(ToolError::parameter(format!(
                "{key} must be {kind} (got {number})"
            )));
        }
        Ok(value as u64)
    }

    /// Non-string elements are skipped; the outer value must still be a list.
    pub fn string_list(&self, key: &str) -> Result<Vec<String>, ToolError> {
        match self.get(key) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => Ok(items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()),
            Some(_) => Err(invalid(key, "a list of strings")),
        }
    }
}

/// Optional label constraint shared by several create tools.
pub fn check_length(key: &str, value: &str, min: usize, max: usize) -> Result<(), ToolError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(ToolError::parameter(format!(
            "{key} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

fn positive_integer(value: &Value) -> Option<u64> {
    let Value::Number(number) = value else {
        return None;
    };
    if let Some(v) = number.as_u64() {
        return (v > 0).then_some(v);
    }
    // Narrow floating-point identifiers; anything below 1 is not an id.
    let v = number.as_f64()?;
    if !v.is_finite() || v < 1.0 || v > u64::MAX as f64 {
        return None;
    }
    Some(v.trunc() as u64)
}

fn required(key: &str, kind: &str) -> ToolError {
    ToolError::parameter(format!("{key} is required and must be {kind}"))
}

fn invalid(key: &str, kind: &str) -> ToolError {
    ToolError::parameter(format!("{key} must be {kind}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn message(err: ToolError) -> String {
        err.to_string()
    }

    #[test]
    fn ids_accept_integral_and_floating_numbers() {
        let m = map(json!({ "a": 123456, "b": 123456.0, "c": 7.9 }));
        let args = Args::new(&m);
        assert_eq!(args.required_id("a").unwrap(), 123456);
        assert_eq!(args.required_id("b").unwrap(), 123456);
        assert_eq!(args.required_id("c").unwrap(), 7);
    }

    #[test]
    fn ids_reject_non_positive_and_non_numeric() {
        let m = map(json!({ "zero": 0, "neg": -5, "frac": 0.5, "text": "12", "null": null }));
        let args = Args::new(&m);
        for key in ["zero", "neg", "frac", "text", "null", "missing"] {
            let err = args.required_id(key).unwrap_err();
            assert_eq!(
                message(err),
                format!("{key} is required and must be a positive integer")
            );
        }
    }

    #[test]
    fn optional_id_treats_null_as_absent() {
        let m = map(json!({ "config_id": null, "bad": "x" }));
        let args = Args::new(&m);
        assert_eq!(args.optional_id("config_id").unwrap(), None);
        assert_eq!(args.optional_id("missing").unwrap(), None);
        assert_eq!(
            message(args.optional_id("bad").unwrap_err()),
            "bad must be a positive integer"
        );
    }

    #[test]
    fn range_checks_name_field_and_bounds() {
        let m = map(json!({ "small": 5, "ok": 20 }));
        let args = Args::new(&m);
        assert_eq!(args.required_in_range("ok", 10, 8192).unwrap(), 20);
        assert_eq!(
            message(args.required_in_range("size", 10, 8192).unwrap_err()),
            "size is required and must be a number between 10 and 8192"
        );
        assert_eq!(
            message(args.required_in_range("small", 10, 8192).unwrap_err()),
            "small must be a number between 10 and 8192 (got 5)"
        );
    }

    #[test]
    fn range_checks_use_the_unrounded_value() {
        let m = map(json!({ "over": 8192.9, "under": 9.99, "half": 20.5, "whole": 20.0 }));
        let args = Args::new(&m);
        assert_eq!(
            message(args.required_in_range("over", 10, 8192).unwrap_err()),
            "over must be a number between 10 and 8192 (got 8192.9)"
        );
        assert_eq!(
            message(args.required_in_range("under", 10, 8192).unwrap_err()),
            "under must be a number between 10 and 8192 (got 9.99)"
        );
        assert!(args.required_in_range("half", 10, 8192).is_err());
        assert_eq!(args.required_in_range("whole", 10, 8192).unwrap(), 20);
    }

    #[test]
    fn string_list_skips_non_strings_but_requires_list() {
        let m = map(json!({ "tags": ["a", 1, null, " b ", ""], "bad": "a,b" }));
        let args = Args::new(&m);
        assert_eq!(args.string_list("tags").unwrap(), vec!["a", "b"]);
        assert!(args.string_list("missing").unwrap().is_empty());
        assert_eq!(
            message(args.string_list("bad").unwrap_err()),
            "bad must be a list of strings"
        );
    }

    #[test]
    fn strings_and_bools() {
        let m = map(json!({ "label": " web ", "empty": "", "flag": true, "num": 3 }));
        let args = Args::new(&m);
        assert_eq!(args.required_string("label").unwrap(), "web");
        assert_eq!(
            message(args.required_string("empty").unwrap_err()),
            "empty is required and must be a non-empty string"
        );
        assert_eq!(args.optional_string("empty").unwrap(), None);
        assert_eq!(
            message(args.optional_string("num").unwrap_err()),
            "num must be a string"
        );
        assert_eq!(args.optional_bool("flag").unwrap(), Some(true));
        assert_eq!(
            message(args.optional_bool("num").unwrap_err()),
            "num must be a boolean"
        );
    }

    #[test]
    fn length_check() {
        assert!(check_length("label", "abc", 3, 64).is_ok());
        assert_eq!(
            message(check_length("label", "ab", 3, 64).unwrap_err()),
            "label must be between 3 and 64 characters"
        );
    }
}
