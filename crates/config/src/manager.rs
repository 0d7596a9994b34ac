//! Renewal manager configuration: recipient rules and rate limits.

use serde::{Deserialize, Serialize};

use certkeeper_common::{NotifierName, RateLimits};

/// Settings consumed by the renewal manager itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Who hears about which outcomes
    #[serde(default)]
    pub recipients: Vec<RecipientConfig>,

    /// Authority quotas
    #[serde(default)]
    pub limits: RateLimits,
}

/// Maps outcome categories to a notifier and its destinations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientConfig {
    /// Notifier name, matched case-insensitively
    pub notifier: NotifierName,

    /// Category tags this rule subscribes to (exact match)
    #[serde(default)]
    pub categories: Vec<String>,

    /// Addresses handed to the notifier, one send each
    #[serde(default, alias = "dest")]
    pub destinations: Vec<String>,
}

impl RecipientConfig {
    pub fn new(
        notifier: impl Into<String>,
        categories: &[&str],
        destinations: &[&str],
    ) -> Self {
        Self {
            notifier: NotifierName::new(notifier),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            destinations: destinations.iter().map(|d| d.to_string()).collect(),
        }
    }

    /// Whether `tag` is one of this rule's categories.
    pub fn subscribes_to(&self, tag: &str) -> bool {
        self.categories.iter().any(|c| c == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribes_to_is_exact() {
        let rule = RecipientConfig::new("rocket", &["RENEW"], &["#ops"]);
        assert!(rule.subscribes_to("RENEW"));
        assert!(!rule.subscribes_to("renew"));
        assert!(!rule.subscribes_to("ERROR"));
    }

    #[test]
    fn test_dest_alias() {
        let rule: RecipientConfig = serde_json::from_str(
            r#"{"notifier": "mail", "categories": ["ERROR"], "dest": ["ops@example.com"]}"#,
        )
        .unwrap();
        assert_eq!(rule.destinations, vec!["ops@example.com".to_string()]);
    }
}
