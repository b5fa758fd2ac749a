// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory container definitions owned by a task definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::api_key::SecretRef;

/// Container health check. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_period: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountPoint {
    pub container_path: String,
    pub source_volume: String,
    pub read_only: bool,
}

impl MountPoint {
    pub fn read_write(source_volume: &str, container_path: &str) -> Self {
        Self {
            container_path: container_path.to_string(),
            source_volume: source_volume.to_string(),
            read_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContainerDependencyCondition {
    Start,
    Complete,
    Success,
    Healthy,
}

/// Directed "depends-on" edge onto another container of the same task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDependency {
    pub container_name: String,
    pub condition: ContainerDependencyCondition,
}

/// FireLens router settings for the log router container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirelensConfig {
    #[serde(rename = "type")]
    pub router_type: String,
    pub enable_ecs_log_metadata: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file_value: Option<String>,
}

/// Log driver attached to a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogDriver {
    pub driver: String,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub secret_options: BTreeMap<String, SecretRef>,
}

/// Caller-supplied container props for [`add_container`].
///
/// [`add_container`]: crate::ecs::fargate::DatadogEcsFargateTaskDefinition::add_container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerDefinitionOptions {
    /// Defaults to the construct id.
    pub container_name: Option<String>,
    pub image: String,
    pub cpu: Option<u32>,
    #[serde(rename = "memoryLimitMiB")]
    pub memory_limit_mib: Option<u32>,
    pub essential: Option<bool>,
    pub environment: BTreeMap<String, String>,
    pub secrets: BTreeMap<String, SecretRef>,
    pub health_check: Option<HealthCheck>,
    pub port_mappings: Vec<PortMapping>,
    pub entry_point: Option<Vec<String>>,
    pub command: Option<Vec<String>>,
    pub user: Option<String>,
    pub docker_labels: BTreeMap<String, String>,
    pub logging: Option<LogDriver>,
    pub linux_capabilities: Option<Vec<String>>,
}

/// A container as attached to a task definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(rename = "memoryLimitMiB", skip_serializing_if = "Option::is_none")]
    pub memory_limit_mib: Option<u32>,
    pub essential: bool,
    pub environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub secrets: BTreeMap<String, SecretRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMapping>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mount_points: Vec<MountPoint>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub docker_labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LogDriver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub linux_capabilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firelens_config: Option<FirelensConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ContainerDependency>,
}

impl ContainerDefinition {
    pub fn from_options(name: String, options: ContainerDefinitionOptions) -> Self {
        Self {
            name,
            image: options.image,
            cpu: options.cpu,
            memory_limit_mib: options.memory_limit_mib,
            essential: options.essential.unwrap_or(true),
            environment: options.environment,
            secrets: options.secrets,
            health_check: options.health_check,
            port_mappings: options.port_mappings,
            mount_points: Vec::new(),
            docker_labels: options.docker_labels,
            logging: options.logging,
            entry_point: options.entry_point,
            command: options.command,
            user: options.user,
            linux_capabilities: options.linux_capabilities.unwrap_or_default(),
            firelens_config: None,
            depends_on: Vec::new(),
        }
    }

    pub fn add_environment(&mut self, key: &str, value: &str) {
        self.environment.insert(key.to_string(), value.to_string());
    }

    pub fn add_docker_label(&mut self, key: &str, value: &str) {
        self.docker_labels.insert(key.to_string(), value.to_string());
    }

    pub fn add_mount_point(&mut self, mount_point: MountPoint) {
        if !self.mount_points.contains(&mount_point) {
            self.mount_points.push(mount_point);
        }
    }

    pub fn add_dependency(&mut self, container_name: &str, condition: ContainerDependencyCondition) {
        let dependency = ContainerDependency {
            container_name: container_name.to_string(),
            condition,
        };
        if !self.depends_on.contains(&dependency) {
            self.depends_on.push(dependency);
        }
    }

    pub fn depends_on(&self, container_name: &str) -> Option<ContainerDependencyCondition> {
        self.depends_on
            .iter()
            .find(|d| d.container_name == container_name)
            .map(|d| d.condition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_options_defaults_essential() {
        let container = ContainerDefinition::from_options(
            "app".to_string(),
            ContainerDefinitionOptions {
                image: "nginx:latest".to_string(),
                ..Default::default()
            },
        );
        assert!(container.essential);
        assert!(container.depends_on.is_empty());
        assert!(container.linux_capabilities.is_empty());
    }

    #[test]
    fn test_dependencies_and_mounts_are_deduplicated() {
        let mut container = ContainerDefinition::from_options(
            "app".to_string(),
            ContainerDefinitionOptions::default(),
        );
        container.add_dependency("datadog-agent", ContainerDependencyCondition::Healthy);
        container.add_dependency("datadog-agent", ContainerDependencyCondition::Healthy);
        container.add_mount_point(MountPoint::read_write("dd-sockets", "/var/run/datadog"));
        container.add_mount_point(MountPoint::read_write("dd-sockets", "/var/run/datadog"));

        assert_eq!(container.depends_on.len(), 1);
        assert_eq!(container.mount_points.len(), 1);
        assert_eq!(
            container.depends_on("datadog-agent"),
            Some(ContainerDependencyCondition::Healthy)
        );
    }

    #[test]
    fn test_condition_serializes_uppercase() {
        assert_eq!(
            serde_json::to_value(ContainerDependencyCondition::Healthy).unwrap(),
            serde_json::json!("HEALTHY")
        );
    }
}
