// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ecs::container::ContainerDefinition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatingSystemFamily {
    Linux,
    WindowsServer2019Core,
    WindowsServer2019Full,
    WindowsServer2022Core,
    WindowsServer2022Full,
}

impl OperatingSystemFamily {
    pub fn is_linux(self) -> bool {
        self == OperatingSystemFamily::Linux
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimePlatform {
    pub operating_system_family: Option<OperatingSystemFamily>,
    pub cpu_architecture: Option<String>,
}

/// Task-level props supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FargateTaskDefinitionProps {
    pub family: Option<String>,
    pub cpu: Option<u32>,
    #[serde(rename = "memoryLimitMiB")]
    pub memory_limit_mib: Option<u32>,
    pub runtime_platform: Option<RuntimePlatform>,
}

impl FargateTaskDefinitionProps {
    /// Tasks without an explicit platform run on Linux.
    pub fn is_linux(&self) -> bool {
        self.runtime_platform
            .as_ref()
            .and_then(|platform| platform.operating_system_family)
            .map_or(true, OperatingSystemFamily::is_linux)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Volume {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyStatement {
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

/// A Fargate task definition being assembled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub id: String,
    pub family: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(rename = "memoryLimitMiB", skip_serializing_if = "Option::is_none")]
    pub memory_limit_mib: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_platform: Option<RuntimePlatform>,
    pub containers: Vec<ContainerDefinition>,
    pub volumes: Vec<Volume>,
    pub task_role_policies: Vec<PolicyStatement>,
    pub tags: BTreeMap<String, String>,
}

impl TaskDefinition {
    pub fn new(id: &str, props: &FargateTaskDefinitionProps) -> Self {
        Self {
            id: id.to_string(),
            family: props.family.clone().unwrap_or_else(|| id.to_string()),
            cpu: props.cpu,
            memory_limit_mib: props.memory_limit_mib,
            runtime_platform: props.runtime_platform.clone(),
            containers: Vec::new(),
            volumes: Vec::new(),
            task_role_policies: Vec::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn container(&self, name: &str) -> Option<&ContainerDefinition> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.container(name).is_some()
    }

    pub fn has_volume(&self, name: &str) -> bool {
        self.volumes.iter().any(|v| v.name == name)
    }

    pub fn add_volume(&mut self, name: &str) {
        if !self.has_volume(name) {
            self.volumes.push(Volume {
                name: name.to_string(),
            });
        }
    }

    /// Appends a container; callers check name uniqueness first.
    pub(crate) fn push_container(&mut self, container: ContainerDefinition) -> &ContainerDefinition {
        let index = self.containers.len();
        self.containers.push(container);
        &self.containers[index]
    }

    pub fn add_to_task_role_policy(&mut self, statement: PolicyStatement) {
        if !self.task_role_policies.contains(&statement) {
            self.task_role_policies.push(statement);
        }
    }

    pub fn add_tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }
}
