// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that abort configuration resolution or wiring.
///
/// Every variant is raised before the definition being wired is touched, so a
/// failed call never leaves a half-instrumented resource behind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid forwarder configuration: {0}")]
    ForwarderConfig(String),

    #[error("Container name '{name}' conflicts with an existing or Datadog-managed container")]
    ContainerNameConflict { name: String },

    #[error("Container '{container}' requests {value} {resource}, below the minimum of {minimum}")]
    ResourceSizing {
        container: String,
        resource: &'static str,
        value: u32,
        minimum: u32,
    },

    #[error("Tag '{key}' must not be an empty string")]
    TagValidation { key: String },

    #[error("Payload already contains the reserved key '{key}'")]
    ReservedKeyConflict { key: String },
}

impl ConstructError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        ConstructError::Config(message.into())
    }
}
