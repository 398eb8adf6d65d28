//! Indicator tables for hostile input
//!
//! Two ordered pattern lists (SQL injection, XSS) compiled once per process,
//! plus the registry of supported platform names. A single pattern hit is
//! enough to classify input as hostile.

use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::metrics;

/// A compiled indicator and the identifier used when logging a hit
pub struct Indicator {
    pub id: &'static str,
    regex: Regex,
}

impl Indicator {
    fn new(id: &'static str, pattern: &str) -> Self {
        Self {
            id,
            regex: Regex::new(pattern).unwrap(),
        }
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

lazy_static! {
    static ref SQL_INJECTION_PATTERNS: Vec<Indicator> = vec![
        Indicator::new(
            "sql_keyword",
            r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|EXECUTE|UNION|SCRIPT)\b",
        ),
        Indicator::new("sql_comment", r"(--|#|/\*|\*/)"),
        Indicator::new("sql_numeric_tautology", r"(?i)\b(OR|AND)\s+\d+\s*=\s*\d+"),
        Indicator::new(
            "sql_string_tautology",
            r#"(?i)\b(OR|AND)\s+['"]?\w+['"]?\s*=\s*['"]?\w+['"]?"#,
        ),
        Indicator::new("sql_statement_separator", r"(;|\|\||&&)"),
        Indicator::new("sql_dangerous_procedure", r"(?i)(\bxp_cmdshell\b|\bsp_executesql\b)"),
        Indicator::new(
            "sql_schema_introspection",
            r"(?i)\b(INFORMATION_SCHEMA|SYSOBJECTS|SYSCOLUMNS)\b",
        ),
    ];

    static ref XSS_PATTERNS: Vec<Indicator> = vec![
        Indicator::new("xss_script_block", r"(?i)<script[^>]*>.*?</script>"),
        Indicator::new("xss_javascript_uri", r"(?i)javascript:"),
        Indicator::new("xss_event_handler", r"(?i)on\w+\s*="),
        Indicator::new("xss_iframe", r"(?i)<iframe[^>]*>.*?</iframe>"),
        Indicator::new("xss_object", r"(?i)<object[^>]*>.*?</object>"),
        Indicator::new("xss_embed", r"(?i)<embed[^>]*>.*?</embed>"),
    ];
}

/// First SQL-injection indicator found in `value`, if any
pub fn find_sql_injection(value: &str) -> Option<&'static str> {
    SQL_INJECTION_PATTERNS
        .iter()
        .find(|p| p.is_match(value))
        .map(|p| p.id)
}

/// First XSS indicator found in `value`, if any
pub fn find_xss(value: &str) -> Option<&'static str> {
    XSS_PATTERNS.iter().find(|p| p.is_match(value)).map(|p| p.id)
}

/// Logs the pattern id on a hit. The input itself is never logged.
pub fn matches_sql_injection(value: &str) -> bool {
    match find_sql_injection(value) {
        Some(pattern) => {
            tracing::warn!(pattern, "Potential SQL injection attempt detected");
            metrics::SUSPICIOUS_INPUT_TOTAL
                .with_label_values(&["sql_injection"])
                .inc();
            true
        }
        None => false,
    }
}

/// Logs the pattern id on a hit. The input itself is never logged.
pub fn matches_xss(value: &str) -> bool {
    match find_xss(value) {
        Some(pattern) => {
            tracing::warn!(pattern, "Potential XSS attempt detected");
            metrics::SUSPICIOUS_INPUT_TOTAL.with_label_values(&["xss"]).inc();
            true
        }
        None => false,
    }
}

pub const DEFAULT_PLATFORMS: [&str; 9] = [
    "Blinkit",
    "Zepto",
    "Instamart",
    "Bigbasket",
    "Swiggy",
    "Dunzo",
    "Grofers",
    "Amazon",
    "Flipkart",
];

static PLATFORM_REGISTRY: OnceCell<PlatformRegistry> = OnceCell::new();

/// Allow-list of supported platforms, keyed case-insensitively and resolving
/// to the canonical spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRegistry {
    names: Vec<String>,
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_PLATFORMS)
    }
}

impl PlatformRegistry {
    /// Blank entries are dropped; duplicates (ignoring case) keep the first spelling.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut canonical: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if canonical.iter().any(|c| c.eq_ignore_ascii_case(name)) {
                continue;
            }
            canonical.push(name.to_string());
        }
        Self { names: canonical }
    }

    /// Install the process-wide registry. Returns false if one was already set.
    pub fn install(registry: PlatformRegistry) -> bool {
        PLATFORM_REGISTRY.set(registry).is_ok()
    }

    /// The installed registry, or the default nine platforms
    pub fn global() -> &'static PlatformRegistry {
        PLATFORM_REGISTRY.get_or_init(PlatformRegistry::default)
    }

    pub fn canonical(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.names
            .iter()
            .find(|c| c.to_lowercase() == name.to_lowercase())
            .map(String::as_str)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
