//! Pure derivation rules for newly-discovered tools. No I/O, no
//! persistence awareness — `ToolCatalog::discover_tools` is the only caller.

use crate::domain::RiskLevel;
use serde_json::Value;

/// Checked in order; the first category whose keyword set matches wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    ("filesystem", &["file", "directory", "folder", "path", "disk", "read_file", "write_file"]),
    ("database", &["database", "sql", "query", "table", "db", "record", "schema"]),
    ("network", &["http", "network", "socket", "request", "url", "fetch", "api", "webhook"]),
    ("system", &["process", "shell", "command", "system", "exec", "kill", "service"]),
    ("security", &["auth", "credential", "encrypt", "token", "password", "permission", "secret"]),
    ("data", &["json", "csv", "data", "transform", "parse", "convert", "export"]),
    ("ai", &["model", "llm", "prompt", "embedding", "inference", "completion"]),
    ("utility", &["util", "helper", "format", "convert", "misc"]),
];

const TAG_KEYWORDS: &[(&str, &str)] = &[
    ("file", "filesystem"),
    ("directory", "filesystem"),
    ("path", "filesystem"),
    ("database", "database"),
    ("sql", "database"),
    ("query", "database"),
    ("api", "network"),
    ("http", "network"),
    ("network", "network"),
    ("socket", "network"),
    ("process", "system"),
    ("shell", "system"),
    ("command", "system"),
    ("auth", "security"),
    ("credential", "security"),
    ("encrypt", "security"),
    ("secret", "security"),
    ("json", "data"),
    ("csv", "data"),
    ("data", "data"),
    ("model", "ai"),
    ("llm", "ai"),
    ("prompt", "ai"),
];

const HIGH_RISK_KEYWORDS: &[&str] = &[
    "delete", "remove", "destroy", "execute", "run", "command", "shell", "admin", "root", "sudo",
    "system", "process", "kill",
];

const MEDIUM_RISK_KEYWORDS: &[&str] = &[
    "write", "create", "modify", "update", "change", "edit", "network", "http", "request", "api",
    "fetch",
];

const MEDIUM_RISK_SCHEMA_HINTS: &[&str] = &["command", "path", "url", "code", "script", "query"];

/// Derive a category from a tool's name and description.
pub fn derive_category(name: &str, description: &str) -> String {
    let haystack = format!("{} {}", name.to_lowercase(), description.to_lowercase());
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|kw| haystack.contains(kw)) {
            return (*category).to_string();
        }
    }
    "other".to_string()
}

/// Derive a small tag set from a tool's name and description.
pub fn derive_tags(name: &str, description: &str) -> Vec<String> {
    let haystack = format!("{} {}", name.to_lowercase(), description.to_lowercase());
    let mut tags = Vec::new();
    for (keyword, tag) in TAG_KEYWORDS {
        if haystack.contains(keyword) && !tags.contains(&(*tag).to_string()) {
            tags.push((*tag).to_string());
        }
    }
    tags
}

/// Derive a risk level from a tool's name and input schema.
pub fn derive_risk_level(name: &str, input_schema: &Value) -> RiskLevel {
    let name = name.to_lowercase();
    if HIGH_RISK_KEYWORDS.iter().any(|kw| name.contains(kw)) {
        return RiskLevel::High;
    }
    if MEDIUM_RISK_KEYWORDS.iter().any(|kw| name.contains(kw)) {
        return RiskLevel::Medium;
    }
    let schema_text = input_schema.to_string().to_lowercase();
    if MEDIUM_RISK_SCHEMA_HINTS.iter().any(|kw| schema_text.contains(kw)) {
        return RiskLevel::Medium;
    }
    RiskLevel::Low
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filesystem_keyword_wins_over_default() {
        assert_eq!(derive_category("read_file", "reads a file from disk"), "filesystem");
    }

    #[test]
    fn unmatched_name_defaults_to_other() {
        assert_eq!(derive_category("frobnicate", "does something unrelated"), "other");
    }

    #[test]
    fn high_risk_keyword_beats_medium() {
        let risk = derive_risk_level("delete_and_update", &json!({}));
        assert_eq!(risk, RiskLevel::High);
    }

    #[test]
    fn medium_risk_from_schema_hint() {
        let risk = derive_risk_level("lookup", &json!({"properties": {"query": {"type": "string"}}}));
        assert_eq!(risk, RiskLevel::Medium);
    }

    #[test]
    fn low_risk_when_nothing_matches() {
        let risk = derive_risk_level("list_items", &json!({"properties": {"limit": {"type": "number"}}}));
        assert_eq!(risk, RiskLevel::Low);
    }

    #[test]
    fn tags_deduplicate_and_collect_multiple() {
        let tags = derive_tags("http_file_fetch", "fetches a file over http");
        assert!(tags.contains(&"network".to_string()));
        assert!(tags.contains(&"filesystem".to_string()));
    }
}
