// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::log_group::LogGroup;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Architecture {
    #[default]
    X86_64,
    Arm64,
}

/// A layer version attached to a function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerReference {
    pub id: String,
    pub arn: String,
}

/// Lambda function definition as assembled before deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LambdaFunction {
    pub name: String,
    pub arn: String,
    pub region: String,
    pub runtime: String,
    #[serde(default)]
    pub architecture: Architecture,
    pub handler: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerReference>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    /// Created as `/aws/lambda/{name}` the first time it is needed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_group: Option<LogGroup>,
    /// Secrets this function's role may read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_read_grants: Vec<String>,
}

impl LambdaFunction {
    /// The ARN is derived from the owning account and region.
    pub fn new(
        name: impl Into<String>,
        account: &str,
        region: impl Into<String>,
        runtime: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let region = region.into();
        Self {
            arn: format!("arn:aws:lambda:{region}:{account}:function:{name}"),
            name,
            region,
            runtime: runtime.into(),
            architecture: Architecture::default(),
            handler: handler.into(),
            environment: BTreeMap::new(),
            layers: Vec::new(),
            tags: BTreeMap::new(),
            log_group: None,
            secret_read_grants: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    #[must_use]
    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = arn.into();
        self
    }

    pub fn is_arm(&self) -> bool {
        self.architecture == Architecture::Arm64
    }

    /// Sets an environment variable and returns the value it replaced, if any.
    pub fn add_environment(&mut self, key: &str, value: &str) -> Option<String> {
        self.environment.insert(key.to_string(), value.to_string())
    }

    /// Attaches a layer unless a layer with the same ARN is already present.
    pub fn add_layer(&mut self, layer: LayerReference) {
        if !self.layers.iter().any(|l| l.arn == layer.arn) {
            self.layers.push(layer);
        }
    }

    pub fn add_tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    pub fn grant_secret_read(&mut self, secret_arn: &str) {
        if !self.secret_read_grants.iter().any(|arn| arn == secret_arn) {
            self.secret_read_grants.push(secret_arn.to_string());
        }
    }

    pub fn log_group_mut(&mut self) -> &mut LogGroup {
        let name = &self.name;
        self.log_group
            .get_or_insert_with(|| LogGroup::new(format!("/aws/lambda/{name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_environment_returns_previous() {
        let mut function = LambdaFunction::new("fn", "123456789012", "us-east-1", "python3.12", "app.handler");
        assert_eq!(function.add_environment("DD_ENV", "dev"), None);
        assert_eq!(
            function.add_environment("DD_ENV", "prod"),
            Some("dev".to_string())
        );
        assert_eq!(function.environment["DD_ENV"], "prod");
    }

    #[test]
    fn test_layers_deduplicated_by_arn() {
        let mut function = LambdaFunction::new("fn", "123456789012", "us-east-1", "python3.12", "app.handler");
        let layer = LayerReference {
            id: "DatadogLayer".to_string(),
            arn: "arn:aws:lambda:us-east-1:464622532012:layer:Datadog-Python312:100".to_string(),
        };
        function.add_layer(layer.clone());
        function.add_layer(layer);
        assert_eq!(function.layers.len(), 1);
    }

    #[test]
    fn test_arn_uses_owning_account() {
        let function =
            LambdaFunction::new("fn", "210987654321", "eu-west-1", "python3.12", "app.handler");
        assert_eq!(function.arn, "arn:aws:lambda:eu-west-1:210987654321:function:fn");
    }

    #[test]
    fn test_log_group_created_lazily() {
        let mut function = LambdaFunction::new("fn", "123456789012", "us-east-1", "python3.12", "app.handler");
        assert!(function.log_group.is_none());
        assert_eq!(function.log_group_mut().name, "/aws/lambda/fn");
    }

    #[test]
    fn test_deserialize_minimal() {
        let function: LambdaFunction = serde_json::from_value(serde_json::json!({
            "name": "fn",
            "arn": "arn:aws:lambda:eu-west-1:1:function:fn",
            "region": "eu-west-1",
            "runtime": "nodejs20.x",
            "architecture": "arm64",
            "handler": "index.handler",
        }))
        .unwrap();
        assert!(function.is_arm());
        assert!(function.environment.is_empty());
    }
}
