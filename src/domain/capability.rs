use serde::{Deserialize, Serialize};

/// Per-area capability flags (e.g. `listChanged`, `subscribe`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AreaFlags {
    pub list_changed: bool,
    pub subscribe: bool,
}

/// A nested record describing whether the endpoint advertises tools,
/// resources, prompts, and logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub tools: Option<AreaFlags>,
    pub resources: Option<AreaFlags>,
    pub prompts: Option<AreaFlags>,
    pub logging: Option<AreaFlags>,
}

impl CapabilitySet {
    pub fn has_tools(&self) -> bool {
        self.tools.is_some()
    }

    pub fn has_resources(&self) -> bool {
        self.resources.is_some()
    }

    pub fn has_prompts(&self) -> bool {
        self.prompts.is_some()
    }

    /// Parse from the raw `capabilities` object returned by `initialize`.
    /// Unknown/absent keys simply leave the corresponding area `None` —
    /// this is what lets the monitoring loop skip `tools/list` etc. when a
    /// server never advertised the area: capabilities absent means the
    /// corresponding list is skipped.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let area = |key: &str| -> Option<AreaFlags> {
            value.get(key).map(|v| AreaFlags {
                list_changed: v
                    .get("listChanged")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false),
                subscribe: v
                    .get("subscribe")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false),
            })
        };
        Self {
            tools: area("tools"),
            resources: area("resources"),
            prompts: area("prompts"),
            logging: area("logging"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_present_areas() {
        let raw = json!({
            "tools": {"listChanged": true},
            "resources": {"subscribe": true}
        });
        let caps = CapabilitySet::from_json(&raw);
        assert!(caps.has_tools());
        assert!(caps.has_resources());
        assert!(!caps.has_prompts());
        assert!(caps.tools.unwrap().list_changed);
    }

    #[test]
    fn absent_areas_are_none() {
        let caps = CapabilitySet::from_json(&json!({}));
        assert!(!caps.has_tools());
        assert!(!caps.has_resources());
        assert!(!caps.has_prompts());
    }
}
