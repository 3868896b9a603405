//! Suspicious-Input Scanner
//!
//! Case-insensitive signature matching for common injection payloads.
//! Inputs are checked both raw and percent-decoded.

use serde::Serialize;
use url::form_urlencoded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    SqlInjection,
    CrossSiteScripting,
    PathTraversal,
    CommandInjection,
}

impl ThreatCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::SqlInjection => "sql_injection",
            ThreatCategory::CrossSiteScripting => "cross_site_scripting",
            ThreatCategory::PathTraversal => "path_traversal",
            ThreatCategory::CommandInjection => "command_injection",
        }
    }
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const SQL_INJECTION: &[&str] = &[
    "' or '1'='1",
    "' or 1=1",
    "\" or \"1\"=\"1",
    " or 1=1--",
    "union select",
    "union all select",
    "drop table",
    "insert into",
    "delete from",
    "'; --",
    "';--",
    "xp_cmdshell",
    "information_schema",
    "sleep(",
    "benchmark(",
];

const CROSS_SITE_SCRIPTING: &[&str] = &[
    "<script",
    "</script",
    "javascript:",
    "vbscript:",
    "onerror=",
    "onload=",
    "onmouseover=",
    "<iframe",
    "<object",
    "<embed",
    "<svg",
    "document.cookie",
];

const PATH_TRAVERSAL: &[&str] = &[
    "../",
    "..\\",
    "/etc/passwd",
    "/etc/shadow",
    "c:\\windows",
    "boot.ini",
];

const COMMAND_INJECTION: &[&str] = &[
    "; rm ",
    "| rm ",
    "&& rm ",
    "; cat ",
    "| cat ",
    "; wget ",
    "; curl ",
    "$(",
    "/bin/sh",
    "/bin/bash",
    "cmd.exe",
    "powershell",
];

const SIGNATURES: &[(ThreatCategory, &[&str])] = &[
    (ThreatCategory::SqlInjection, SQL_INJECTION),
    (ThreatCategory::CrossSiteScripting, CROSS_SITE_SCRIPTING),
    (ThreatCategory::PathTraversal, PATH_TRAVERSAL),
    (ThreatCategory::CommandInjection, COMMAND_INJECTION),
];

/// JSON keys whose values are never scanned (secrets legitimately contain symbols)
const EXEMPT_KEY_FRAGMENTS: &[&str] = &["password", "token"];

#[derive(Debug, Clone, Copy, Default)]
pub struct SuspiciousInputScanner;

impl SuspiciousInputScanner {
    pub fn new() -> Self {
        Self
    }

    /// First matching category, if any
    pub fn scan(&self, input: &str) -> Option<ThreatCategory> {
        if input.is_empty() {
            return None;
        }
        let raw = normalize(input);
        if let Some(category) = match_signatures(&raw) {
            return Some(category);
        }
        let decoded = normalize(&percent_decode(input));
        if decoded != raw {
            return match_signatures(&decoded);
        }
        None
    }

    /// Scan every string (and object key) in a JSON document
    pub fn scan_json(&self, value: &serde_json::Value) -> Option<ThreatCategory> {
        match value {
            serde_json::Value::String(s) => self.scan(s),
            serde_json::Value::Array(items) => items.iter().find_map(|v| self.scan_json(v)),
            serde_json::Value::Object(map) => map.iter().find_map(|(key, v)| {
                let lowered = key.to_ascii_lowercase();
                if EXEMPT_KEY_FRAGMENTS.iter().any(|f| lowered.contains(f)) {
                    return None;
                }
                self.scan(key).or_else(|| self.scan_json(v))
            }),
            _ => None,
        }
    }

    /// Scan a request body: JSON documents value by value, anything else as text
    pub fn scan_body(&self, body: &[u8]) -> Option<ThreatCategory> {
        if body.is_empty() {
            return None;
        }
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) => self.scan_json(&value),
            Err(_) => self.scan(&String::from_utf8_lossy(body)),
        }
    }
}

fn match_signatures(haystack: &str) -> Option<ThreatCategory> {
    SIGNATURES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| haystack.contains(p)))
        .map(|(category, _)| *category)
}

/// Lowercase and collapse runs of whitespace to a single space
fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_space = false;
    for c in input.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.extend(c.to_lowercase());
            in_space = false;
        }
    }
    out
}

fn percent_decode(input: &str) -> String {
    form_urlencoded::parse(input.as_bytes())
        .map(|(key, value)| {
            if value.is_empty() {
                key.into_owned()
            } else {
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scan(input: &str) -> Option<ThreatCategory> {
        SuspiciousInputScanner::new().scan(input)
    }

    #[test]
    fn test_benign_input_passes() {
        assert_eq!(scan("hello world"), None);
        assert_eq!(scan("/api/security/stats"), None);
        assert_eq!(scan("limit=10&severity=high"), None);
        assert_eq!(scan("x@y.com"), None);
    }

    #[test]
    fn test_sql_injection() {
        assert_eq!(scan("' OR '1'='1"), Some(ThreatCategory::SqlInjection));
        assert_eq!(scan("1 UNION   SELECT password"), Some(ThreatCategory::SqlInjection));
    }

    #[test]
    fn test_xss() {
        assert_eq!(scan("<ScRiPt>alert(1)</script>"), Some(ThreatCategory::CrossSiteScripting));
        assert_eq!(scan("<img src=x onerror=alert(1)>"), Some(ThreatCategory::CrossSiteScripting));
    }

    #[test]
    fn test_path_traversal_percent_encoded() {
        assert_eq!(scan("/files/../../etc"), Some(ThreatCategory::PathTraversal));
        assert_eq!(scan("file=%2e%2e%2fsecret"), Some(ThreatCategory::PathTraversal));
    }

    #[test]
    fn test_command_injection() {
        assert_eq!(scan("name=x; rm -rf /"), Some(ThreatCategory::CommandInjection));
        assert_eq!(scan("$(whoami)"), Some(ThreatCategory::CommandInjection));
    }

    #[test]
    fn test_json_scan_skips_secret_fields() {
        let scanner = SuspiciousInputScanner::new();
        let body = json!({ "email": "x@y.com", "password": "$(Str0ng'; --" });
        assert_eq!(scanner.scan_json(&body), None);

        let body = json!({ "reason": ["ok", "<script>"] });
        assert_eq!(scanner.scan_json(&body), Some(ThreatCategory::CrossSiteScripting));
    }

    #[test]
    fn test_scan_body_falls_back_to_text() {
        let scanner = SuspiciousInputScanner::new();
        assert_eq!(
            scanner.scan_body(b"q=1 union select 1"),
            Some(ThreatCategory::SqlInjection)
        );
        assert_eq!(scanner.scan_body(b""), None);
    }
}
