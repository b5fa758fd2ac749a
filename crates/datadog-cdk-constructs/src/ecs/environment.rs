// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment of the Datadog Agent container.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::api_key::ApiKeySource;
use crate::config::ecs::DatadogEcsFargateStrictProps;
use crate::constants::{CONSTRUCT_NAME, CONSTRUCT_VERSION};

const FARGATE_DEFAULT_ENV_VARS: [(&str, &str); 2] = [
    ("DD_ECS_TASK_COLLECTION_ENABLED", "true"),
    ("ECS_FARGATE", "true"),
];

/// Collects environment variables, remembering which keys were replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVarManager {
    env_vars: BTreeMap<String, String>,
    overwritten_keys: BTreeSet<String>,
}

impl EnvVarManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` values are ignored.
    pub fn add(&mut self, key: &str, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        if self
            .env_vars
            .insert(key.to_string(), value.to_string())
            .is_some()
        {
            self.overwritten_keys.insert(key.to_string());
        }
    }

    pub fn add_all<'a>(&mut self, env_vars: impl IntoIterator<Item = (&'a String, &'a String)>) {
        for (key, value) in env_vars {
            self.add(key, Some(value));
        }
    }

    pub fn retrieve(&self, key: &str) -> Option<&str> {
        self.env_vars.get(key).map(String::as_str)
    }

    pub fn retrieve_all(&self) -> BTreeMap<String, String> {
        self.env_vars.clone()
    }

    pub fn overwritten_keys(&self) -> impl Iterator<Item = &str> {
        self.overwritten_keys.iter().map(String::as_str)
    }

    /// Agent environment for a Fargate task.
    ///
    /// Later entries win: Fargate defaults, then the caller's
    /// `environment_variables`, then values derived from the props.
    pub fn for_fargate(props: &DatadogEcsFargateStrictProps) -> Self {
        let mut manager = Self::new();
        for (key, value) in FARGATE_DEFAULT_ENV_VARS {
            manager.add(key, Some(value));
        }
        manager.add_all(&props.environment_variables);

        manager.add("DD_INSTALL_INFO_TOOL", Some("cdk"));
        manager.add("DD_INSTALL_INFO_TOOL_VERSION", Some(CONSTRUCT_NAME));
        manager.add("DD_INSTALL_INFO_INSTALLER_VERSION", Some(CONSTRUCT_VERSION));

        if let Some(ApiKeySource::Plain(api_key)) = &props.api_key {
            manager.add("DD_API_KEY", Some(api_key));
        }
        manager.add("DD_SITE", Some(&props.site));
        manager.add("DD_ENV", props.env.as_deref());
        manager.add("DD_SERVICE", props.service.as_deref());
        manager.add("DD_VERSION", props.version.as_deref());
        let checks_cardinality = props.checks_cardinality.map(|c| c.to_string());
        manager.add("DD_CHECKS_TAG_CARDINALITY", checks_cardinality.as_deref());

        if props.global_tags.is_some() && manager.retrieve("DD_TAGS").is_some() {
            debug!("Global tags (DD_TAGS) are set in both the environment variable and the props. The environment variable will be overwritten.");
        }
        manager.add("DD_TAGS", props.global_tags.as_deref());
        manager.add("DD_CLUSTER_NAME", props.cluster_name.as_deref());

        if props.dogstatsd.is_origin_detection_enabled {
            manager.add("DD_DOGSTATSD_ORIGIN_DETECTION", Some("true"));
            manager.add("DD_DOGSTATSD_ORIGIN_DETECTION_CLIENT", Some("true"));
        }
        let dogstatsd_cardinality = props.dogstatsd.dogstatsd_cardinality.to_string();
        manager.add("DD_DOGSTATSD_TAG_CARDINALITY", Some(&dogstatsd_cardinality));

        if props.cws.is_enabled {
            manager.add("DD_RUNTIME_SECURITY_CONFIG_ENABLED", Some("true"));
            manager.add("DD_RUNTIME_SECURITY_CONFIG_EBPFLESS_ENABLED", Some("true"));
        }

        let task_collection = if props.orchestrator_explorer.is_enabled {
            "true"
        } else {
            "false"
        };
        manager.add("DD_ECS_TASK_COLLECTION_ENABLED", Some(task_collection));
        manager.add(
            "DD_ORCHESTRATOR_EXPLORER_ORCHESTRATOR_DD_URL",
            props.orchestrator_explorer.url.as_deref(),
        );
        manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ecs::DatadogEcsFargateProps;
    use crate::config::{Resolve, ValidationOptions};

    fn strict(props: DatadogEcsFargateProps) -> DatadogEcsFargateStrictProps {
        props
            .resolve(
                &DatadogEcsFargateProps::default(),
                &ValidationOptions::default(),
            )
            .unwrap()
            .props
    }

    #[test]
    fn test_add_records_overwrites() {
        let mut manager = EnvVarManager::new();
        manager.add("A", Some("1"));
        manager.add("B", None);
        manager.add("A", Some("2"));
        assert_eq!(manager.retrieve("A"), Some("2"));
        assert_eq!(manager.retrieve("B"), None);
        assert_eq!(manager.overwritten_keys().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_fargate_defaults() {
        let manager = EnvVarManager::for_fargate(&strict(DatadogEcsFargateProps {
            api_key: Some("1234".to_string()),
            ..Default::default()
        }));
        assert_eq!(manager.retrieve("ECS_FARGATE"), Some("true"));
        assert_eq!(manager.retrieve("DD_ECS_TASK_COLLECTION_ENABLED"), Some("true"));
        assert_eq!(manager.retrieve("DD_API_KEY"), Some("1234"));
        assert_eq!(manager.retrieve("DD_SITE"), Some("datadoghq.com"));
        assert_eq!(manager.retrieve("DD_INSTALL_INFO_TOOL"), Some("cdk"));
        assert_eq!(manager.retrieve("DD_DOGSTATSD_ORIGIN_DETECTION"), Some("true"));
        assert_eq!(
            manager.retrieve("DD_DOGSTATSD_TAG_CARDINALITY"),
            Some("orchestrator")
        );
        assert_eq!(manager.retrieve("DD_RUNTIME_SECURITY_CONFIG_ENABLED"), None);
        assert_eq!(manager.retrieve("DD_ENV"), None);
    }

    #[test]
    fn test_global_tags_win_over_user_env() {
        let manager = EnvVarManager::for_fargate(&strict(DatadogEcsFargateProps {
            api_key: Some("1234".to_string()),
            global_tags: Some("team:a".to_string()),
            environment_variables: Some(BTreeMap::from([(
                "DD_TAGS".to_string(),
                "team:b".to_string(),
            )])),
            ..Default::default()
        }));
        assert_eq!(manager.retrieve("DD_TAGS"), Some("team:a"));
        assert!(manager.overwritten_keys().any(|key| key == "DD_TAGS"));
    }

    #[test]
    fn test_secret_key_not_in_environment() {
        let manager = EnvVarManager::for_fargate(&strict(DatadogEcsFargateProps {
            api_key_secret_arn: Some("arn:aws:secretsmanager:us-east-1:1:secret:dd".to_string()),
            ..Default::default()
        }));
        assert_eq!(manager.retrieve("DD_API_KEY"), None);
    }
}
