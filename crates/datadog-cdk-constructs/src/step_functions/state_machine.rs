// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::log_group::LogGroup;

const LOG_GROUP_PREFIX: &str = "/aws/vendedlogs/states/";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    #[default]
    Off,
    All,
    Error,
    Fatal,
}

/// Execution logging of a state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfiguration {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub include_execution_data: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<LogGroup>,
}

/// Logging as declared on the state machine. A configuration that is only
/// known at deploy time cannot be inspected or rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Logging {
    Unresolved(String),
    Configured(LoggingConfiguration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachine {
    pub name: String,
    pub arn: String,
    /// Construct path, `/` separated. Defaults to the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Logging>,
}

impl StateMachine {
    /// The ARN is derived from the owning account and region.
    pub fn new(name: &str, account: &str, region: &str) -> Self {
        Self {
            name: name.to_string(),
            arn: format!("arn:aws:states:{region}:{account}:stateMachine:{name}"),
            path: None,
            tags: BTreeMap::new(),
            logging: None,
        }
    }

    #[must_use]
    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = arn.into();
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_logging(mut self, logging: Logging) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn construct_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }

    pub fn add_tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    /// Destination log group of a resolved logging configuration.
    pub fn log_group(&self) -> Option<&LogGroup> {
        match &self.logging {
            Some(Logging::Configured(config)) => config.destination.as_ref(),
            _ => None,
        }
    }
}

/// `/aws/vendedlogs/states/{path}-Logs`, with `-{env}` appended when set.
/// Path separators become dashes.
#[must_use]
pub fn build_log_group_name(state_machine: &StateMachine, env: Option<&str>) -> String {
    let path = state_machine.construct_path().replace('/', "-");
    match env {
        Some(env) => format!("{LOG_GROUP_PREFIX}{path}-Logs-{env}"),
        None => format!("{LOG_GROUP_PREFIX}{path}-Logs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> StateMachine {
        StateMachine::new("MyStateMachine", "123456789012", "us-east-1")
            .with_path("MyStack/MyStateMachine")
    }

    #[test]
    fn test_log_group_name_with_env() {
        assert_eq!(
            build_log_group_name(&machine(), Some("dev")),
            "/aws/vendedlogs/states/MyStack-MyStateMachine-Logs-dev"
        );
    }

    #[test]
    fn test_log_group_name_without_env() {
        assert_eq!(
            build_log_group_name(&machine(), None),
            "/aws/vendedlogs/states/MyStack-MyStateMachine-Logs"
        );
        let unnamed = StateMachine::new("orders", "123456789012", "us-east-1");
        assert_eq!(
            build_log_group_name(&unnamed, None),
            "/aws/vendedlogs/states/orders-Logs"
        );
    }

    #[test]
    fn test_logging_deserializes_token_or_config() {
        let token: Logging = serde_json::from_value(serde_json::json!("${Token[TOKEN.7]}")).unwrap();
        assert_eq!(token, Logging::Unresolved("${Token[TOKEN.7]}".to_string()));

        let config: Logging = serde_json::from_value(serde_json::json!({
            "level": "ERROR",
            "includeExecutionData": false,
            "destination": {"name": "/custom/logs"},
        }))
        .unwrap();
        let Logging::Configured(config) = config else {
            panic!("expected a resolved configuration");
        };
        assert_eq!(config.level, LogLevel::Error);
        assert_eq!(config.destination.unwrap().name, "/custom/logs");
    }
}
