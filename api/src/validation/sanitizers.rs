//! Input sanitization functions
//!
//! This module provides functions to clean and normalize input data
//! before validation and storage.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::patterns;
use super::validators::reject;
use crate::app_error::AppResult;

/// Characters left untouched when re-encoding a URL parameter
const URL_PARAM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Options for [`sanitize_string`]
#[derive(Debug, Clone, Copy)]
pub struct SanitizeOptions {
    pub max_length: Option<usize>,
    pub allow_markup: bool,
    pub strip_whitespace: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            max_length: None,
            allow_markup: false,
            strip_whitespace: true,
        }
    }
}

impl SanitizeOptions {
    pub fn max_length(max_length: usize) -> Self {
        Self {
            max_length: Some(max_length),
            ..Self::default()
        }
    }

    pub fn allow_markup(mut self) -> Self {
        self.allow_markup = true;
        self
    }

    pub fn keep_whitespace(mut self) -> Self {
        self.strip_whitespace = false;
        self
    }
}

/// Escape markup-significant characters
pub fn escape_markup(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Trim, bound and escape a free-text value, then screen it for XSS.
///
/// The length limit applies to the trimmed value before escaping and counts
/// characters, not bytes.
pub fn sanitize_string(value: &str, options: SanitizeOptions) -> AppResult<String> {
    let value = if options.strip_whitespace {
        value.trim()
    } else {
        value
    };

    if let Some(max) = options.max_length {
        if value.chars().count() > max {
            return Err(reject(
                "input",
                format!("String too long. Maximum length: {}", max),
            ));
        }
    }

    let value = if options.allow_markup {
        value.to_string()
    } else {
        escape_markup(value)
    };

    if patterns::matches_xss(&value) {
        return Err(reject("input", "Invalid characters detected in input"));
    }

    Ok(value)
}

/// Decode a URL parameter, sanitize it, and encode it again
pub fn sanitize_url_parameter(param: &str) -> AppResult<String> {
    let decoded = percent_decode_str(param).decode_utf8_lossy();
    let sanitized = sanitize_string(&decoded, SanitizeOptions::max_length(200))?;
    Ok(utf8_percent_encode(&sanitized, URL_PARAM_ENCODE_SET).to_string())
}
