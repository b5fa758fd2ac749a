// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::ConstructError;

/// Ordered tag list as carried by `DD_TAGS`.
///
/// Entries are `key:value` pairs or bare keys; bare keys render back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags {
    entries: Vec<(String, Option<String>)>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env_string(env_tags: &str) -> Self {
        let mut tags = Self::new();

        // Comma separated is what the constructs emit; whitespace is accepted too.
        let normalized = env_tags.replace(',', " ");

        for kv in normalized.split_whitespace() {
            // values such as repository URLs contain ':' themselves
            match kv.split_once(':') {
                Some(("", _)) => {}
                Some((key, value)) => tags.set(key, value),
                None => tags.upsert(kv, None),
            }
        }
        tags
    }

    /// Replaces the value of an existing key in place, or appends it.
    pub fn set(&mut self, key: &str, value: &str) {
        self.upsert(key, Some(value));
    }

    /// Applies every entry of `other` over `self`, in order.
    pub fn merge(&mut self, other: &Tags) {
        for (key, value) in &other.entries {
            self.upsert(key, value.as_deref());
        }
    }

    fn upsert(&mut self, key: &str, value: Option<&str>) {
        let value = value.map(ToString::to_string);
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Bare keys are yielded with an empty value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref().unwrap_or_default()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_env_string(&self) -> String {
        self.entries
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}:{v}"),
                None => k.clone(),
            })
            .collect::<Vec<String>>()
            .join(",")
    }
}

/// Rejects env/service/version values that are present but empty.
pub fn validate_ust(
    env: Option<&str>,
    service: Option<&str>,
    version: Option<&str>,
) -> Result<(), ConstructError> {
    for (key, value) in [("env", env), ("service", service), ("version", version)] {
        if let Some(value) = value {
            if value.trim().is_empty() {
                return Err(ConstructError::TagValidation {
                    key: key.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comma_and_space_separated() {
        let tags = Tags::from_env_string("team:serverless, tier:1 owner:me");
        assert_eq!(tags.to_env_string(), "team:serverless,tier:1,owner:me");
    }

    #[test]
    fn test_parse_keeps_colons_in_value() {
        let tags = Tags::from_env_string(
            "git.commit.sha:1234,git.repository_url:https://github.com/DataDog/repo",
        );
        assert_eq!(
            tags.iter().last(),
            Some(("git.repository_url", "https://github.com/DataDog/repo"))
        );
    }

    #[test]
    fn test_bare_keys_survive_rewrite() {
        let mut tags = Tags::from_env_string("production,team:a");
        tags.set("git.commit.sha", "abc");
        assert_eq!(tags.to_env_string(), "production,team:a,git.commit.sha:abc");
        assert_eq!(tags.iter().next(), Some(("production", "")));
    }

    #[test]
    fn test_parse_skips_empty_keys() {
        let tags = Tags::from_env_string(":nokey,ok:1");
        assert_eq!(tags.to_env_string(), "ok:1");
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut tags = Tags::from_env_string("a:1,b:2,c:3");
        tags.set("b", "20");
        tags.set("d", "4");
        assert_eq!(tags.to_env_string(), "a:1,b:20,c:3,d:4");
    }

    #[test]
    fn test_merge_keeps_existing_order() {
        let mut tags = Tags::from_env_string("team:a,git.commit.sha:abc");
        tags.merge(&Tags::from_env_string("team:b,canary"));
        assert_eq!(tags.to_env_string(), "team:b,git.commit.sha:abc,canary");
    }

    #[test]
    fn test_validate_ust() {
        assert!(validate_ust(Some("prod"), None, Some("1.0")).is_ok());
        assert!(validate_ust(None, None, None).is_ok());
        assert_eq!(
            validate_ust(Some("prod"), Some(""), None).unwrap_err(),
            ConstructError::TagValidation {
                key: "service".to_string()
            }
        );
        assert!(validate_ust(Some("  "), None, None).is_err());
    }
}
