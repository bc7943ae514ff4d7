//! Config file grammar
//!
//! One entry per line: `key, on|off|1|0, value`. A `#` starts a comment
//! anywhere on the line and every field is trimmed. Value types are inferred:
//! whitespace means text, `true`/`false` is a bool, a `.` makes a float,
//! anything else is an int. Unparsable numbers fall back to raw text.

use thiserror::Error;

use super::ConfigValue;

/// A single parsed config line
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigLine {
    pub key: String,
    pub enabled: bool,
    pub value: ConfigValue,
}

/// Why a line was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("expected `key, on|off, value`")]
    MissingFields,

    #[error("empty key")]
    EmptyKey,

    #[error("unknown enabled flag '{0}'")]
    BadFlag(String),
}

/// Parse one line. `Ok(None)` means blank or comment-only.
pub fn parse_line(line: &str) -> Result<Option<ConfigLine>, LineError> {
    let content = match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    };
    if content.trim().is_empty() {
        return Ok(None);
    }

    let mut fields = content.splitn(3, ',');
    let key = fields.next().map(str::trim).unwrap_or_default();
    let flag = fields.next().map(str::trim).ok_or(LineError::MissingFields)?;
    let raw_value = fields.next().map(str::trim).ok_or(LineError::MissingFields)?;

    if key.is_empty() {
        return Err(LineError::EmptyKey);
    }

    let enabled = parse_flag(flag)?;

    Ok(Some(ConfigLine {
        key: key.to_string(),
        enabled,
        value: infer_value(raw_value),
    }))
}

fn parse_flag(flag: &str) -> Result<bool, LineError> {
    match flag.to_ascii_lowercase().as_str() {
        "on" | "1" => Ok(true),
        "off" | "0" => Ok(false),
        _ => Err(LineError::BadFlag(flag.to_string())),
    }
}

/// Infer the type of a trimmed value field
pub fn infer_value(raw: &str) -> ConfigValue {
    if raw.chars().any(char::is_whitespace) {
        return ConfigValue::Text(raw.to_string());
    }
    match raw {
        "true" => return ConfigValue::Bool(true),
        "false" => return ConfigValue::Bool(false),
        _ => {}
    }
    if raw.contains('.') {
        return raw
            .parse::<f64>()
            .map(ConfigValue::Float)
            .unwrap_or_else(|_| ConfigValue::Text(raw.to_string()));
    }
    raw.parse::<i64>()
        .map(ConfigValue::Int)
        .unwrap_or_else(|_| ConfigValue::Text(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_line() {
        let line = parse_line("gain, on, 150").unwrap().unwrap();
        assert_eq!(line.key, "gain");
        assert!(line.enabled);
        assert_eq!(line.value, ConfigValue::Int(150));
    }

    #[test]
    fn test_parse_trims_and_strips_comments() {
        let line = parse_line("  fuzz ,  off , 2.5   # crunchy").unwrap().unwrap();
        assert_eq!(line.key, "fuzz");
        assert!(!line.enabled);
        assert_eq!(line.value, ConfigValue::Float(2.5));
    }

    #[test]
    fn test_blank_and_comment_lines() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("# harmonizer, on, 3"), Ok(None));
    }

    #[test]
    fn test_numeric_flags() {
        assert!(parse_line("a, 1, 1").unwrap().unwrap().enabled);
        assert!(!parse_line("a, 0, 1").unwrap().unwrap().enabled);
    }

    #[test]
    fn test_rejected_lines() {
        assert_eq!(parse_line("gain, on"), Err(LineError::MissingFields));
        assert_eq!(parse_line(", on, 3"), Err(LineError::EmptyKey));
        assert_eq!(
            parse_line("gain, maybe, 3"),
            Err(LineError::BadFlag("maybe".to_string()))
        );
    }

    #[test]
    fn test_line_error_messages() {
        let err: Box<dyn std::error::Error> = Box::new(LineError::BadFlag("maybe".to_string()));
        assert_eq!(err.to_string(), "unknown enabled flag 'maybe'");
        assert_eq!(
            LineError::MissingFields.to_string(),
            "expected `key, on|off, value`"
        );
    }

    #[test]
    fn test_value_inference() {
        assert_eq!(infer_value("3 7"), ConfigValue::Text("3 7".to_string()));
        assert_eq!(infer_value("true"), ConfigValue::Bool(true));
        assert_eq!(infer_value("false"), ConfigValue::Bool(false));
        assert_eq!(infer_value("0.25"), ConfigValue::Float(0.25));
        assert_eq!(infer_value("-4"), ConfigValue::Int(-4));
        assert_eq!(infer_value("1.2.3"), ConfigValue::Text("1.2.3".to_string()));
        assert_eq!(infer_value("loud"), ConfigValue::Text("loud".to_string()));
    }

    #[test]
    fn test_value_keeps_later_commas() {
        let line = parse_line("harmonizer, on, 3,7").unwrap().unwrap();
        assert_eq!(line.value, ConfigValue::Text("3,7".to_string()));
    }
}
