// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Request body parsing for the form value provider.

use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Errors that can occur while parsing a request body.
#[derive(Debug, thiserror::Error)]
pub enum BodyParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Invalid multipart data: {0}")]
    InvalidMultipart(String),
}

/// Parses a request body into flat name/value pairs.
///
/// Form-encoded and multipart bodies map directly. A JSON object body
/// contributes its top-level scalar members; anything else yields no values.
pub fn parse_form_values(
    body: &[u8],
    content_type: Option<&str>,
) -> Result<HashMap<String, String>, BodyParseError> {
    let content_type = content_type.unwrap_or("");

    if content_type.contains("application/x-www-form-urlencoded") {
        return Ok(parse_form_urlencoded(body));
    }

    if content_type.contains("multipart/form-data") {
        return parse_multipart_basic(body, content_type);
    }

    if content_type.contains("application/json") {
        return parse_json(body).map(|value| flatten_object(&value));
    }

    Ok(HashMap::new())
}

fn parse_json(bytes: &[u8]) -> Result<JsonValue, BodyParseError> {
    serde_json::from_slice(bytes).map_err(|e| BodyParseError::InvalidJson(e.to_string()))
}

fn flatten_object(value: &JsonValue) -> HashMap<String, String> {
    let JsonValue::Object(map) = value else {
        return HashMap::new();
    };

    map.iter()
        .filter_map(|(k, v)| match v {
            JsonValue::String(s) => Some((k.clone(), s.clone())),
            JsonValue::Number(n) => Some((k.clone(), n.to_string())),
            JsonValue::Bool(b) => Some((k.clone(), b.to_string())),
            _ => None,
        })
        .collect()
}

fn parse_form_urlencoded(bytes: &[u8]) -> HashMap<String, String> {
    form_urlencoded::parse(bytes)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn parse_multipart_basic(
    bytes: &[u8],
    content_type: &str,
) -> Result<HashMap<String, String>, BodyParseError> {
    let boundary = content_type
        .split(';')
        .find(|s| s.trim().starts_with("boundary="))
        .and_then(|s| s.trim().strip_prefix("boundary="))
        .ok_or_else(|| BodyParseError::InvalidMultipart("Missing boundary".to_string()))?;

    let boundary = boundary.trim_matches('"');
    let delimiter = format!("--{}", boundary);

    let body_str = String::from_utf8_lossy(bytes);
    let mut form_data = HashMap::new();

    for part in body_str.split(&delimiter) {
        if part.trim().is_empty() || part.starts_with("--") {
            continue;
        }

        if let Some(idx) = part.find("\r\n\r\n") {
            let headers_str = &part[..idx];
            let content = part[idx + 4..].trim_end_matches("\r\n");

            // File uploads are not bindable values.
            if let Some(name) = extract_form_field_name(headers_str) {
                if !headers_str.contains("filename=") {
                    form_data.insert(name.to_string(), content.to_string());
                }
            }
        }
    }

    Ok(form_data)
}

fn extract_form_field_name(headers: &str) -> Option<&str> {
    headers
        .lines()
        .filter(|line| line.to_ascii_lowercase().starts_with("content-disposition:"))
        .find_map(|line| line.split(';').find(|s| s.trim().starts_with("name=")))
        .and_then(|part| part.trim().strip_prefix("name="))
        .map(|name| name.trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencoded() {
        let values = parse_form_values(
            b"name=Ada+Lovelace&id=7",
            Some("application/x-www-form-urlencoded"),
        )
        .unwrap();
        assert_eq!(values.get("name").map(String::as_str), Some("Ada Lovelace"));
        assert_eq!(values.get("id").map(String::as_str), Some("7"));
    }

    #[test]
    fn test_json_object_scalars_only() {
        let values = parse_form_values(
            br#"{"id": 3, "active": true, "tags": ["a"], "name": "x"}"#,
            Some("application/json"),
        )
        .unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values.get("id").map(String::as_str), Some("3"));
        assert_eq!(values.get("active").map(String::as_str), Some("true"));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_form_values(b"{nope", Some("application/json")).unwrap_err();
        assert!(matches!(err, BodyParseError::InvalidJson(_)));
    }

    #[test]
    fn test_multipart_skips_files() {
        let body = "--XX\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nHello\r\n\
                    --XX\r\nContent-Disposition: form-data; name=\"upload\"; \
                    filename=\"a.txt\"\r\n\r\ndata\r\n\
                    --XX--\r\n";
        let values =
            parse_form_values(body.as_bytes(), Some("multipart/form-data; boundary=XX")).unwrap();
        assert_eq!(values.get("title").map(String::as_str), Some("Hello"));
        assert!(!values.contains_key("upload"));
    }

    #[test]
    fn test_missing_boundary() {
        let err = parse_form_values(b"", Some("multipart/form-data")).unwrap_err();
        assert!(matches!(err, BodyParseError::InvalidMultipart(_)));
    }
}
