use crate::error::{ParseError, ParseErrorKind};
use crate::scrape;
use crate::structs::Course;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;

fn looks_like_login_page(payload: &str) -> bool {
    static LOGIN: OnceLock<Regex> = OnceLock::new();
    LOGIN
        .get_or_init(|| {
            Regex::new(
                r#"(?is)type\s*=\s*["']?password|name\s*=\s*["']?lt["'\s>]|<title>[^<]*(log\s*in|sign\s*in|cas)"#,
            )
            .expect("static regex")
        })
        .is_match(payload)
}

/// Turns a raw portal payload into course records.
///
/// Accepts the registration JSON (`{"data": {"registrations": [...]}}`), a
/// bare `{"courses": [...]}` object or array, or the HTML grades table.
/// Zero courses is a valid result; an unreadable payload never is.
pub fn parse(payload: &str) -> Result<Vec<Course>, ParseError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::Empty,
            "portal returned nothing",
            payload,
        ));
    }

    if trimmed.starts_with('<') {
        if scrape::has_grade_table(trimmed) {
            return scrape::parse_grade_table(trimmed);
        }
        let detail = if looks_like_login_page(trimmed) {
            "portal answered with the login page"
        } else {
            "expected data but got an HTML page"
        };
        return Err(ParseError::new(
            ParseErrorKind::AuthLikelyFailed,
            detail,
            payload,
        ));
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| {
        ParseError::new(ParseErrorKind::Malformed, format!("invalid JSON: {e}"), payload)
    })?;

    let list = match &value {
        Value::Array(_) => &value,
        Value::Object(obj) => obj
            .get("data")
            .and_then(|data| data.get("registrations"))
            .or_else(|| obj.get("courses"))
            .or_else(|| obj.get("registrations"))
            .ok_or_else(|| {
                ParseError::new(
                    ParseErrorKind::Malformed,
                    "no course list in JSON object",
                    payload,
                )
            })?,
        _ => {
            return Err(ParseError::new(
                ParseErrorKind::Malformed,
                "JSON is neither an object nor an array",
                payload,
            ))
        }
    };

    // Banner sends `"registrations": null` for a term with nothing in it.
    if list.is_null() {
        return Ok(Vec::new());
    }

    Vec::<Course>::deserialize(list).map_err(|e| {
        ParseError::new(
            ParseErrorKind::Malformed,
            format!("unexpected course record: {e}"),
            payload,
        )
    })
}

/// The `termDescription` of the first registration, e.g. `Fall 2017`.
pub fn term_description(payload: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    value
        .pointer("/data/registrations/0/termDescription")?
        .as_str()
        .map(str::to_string)
}
