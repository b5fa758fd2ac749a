// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Props accepted by the ECS Fargate wirer and their resolution.
//!
//! Nested feature records are merged field by field, so a caller that only
//! sets `apm.isSocketEnabled` keeps every other APM default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::api_key::{select_api_key, ApiKeySource, SecretRef};
use crate::config::cardinality::Cardinality;
use crate::config::{validate_site, Merge, Resolve, Resolved, ValidationOptions};
use crate::constants::ecs::{
    AGENT_CONTAINER_NAME, CWS_CONTAINER_NAME, DEFAULT_AGENT_IMAGE_VERSION, DEFAULT_AGENT_REGISTRY,
    DEFAULT_LOG_HOST_ENDPOINT, DEFAULT_LOG_ROUTER_IMAGE_VERSION, DEFAULT_LOG_ROUTER_REGISTRY,
    LOG_ROUTER_CONTAINER_NAME, MIN_CPU_UNITS, MIN_MEMORY_MIB,
};
use crate::constants::DEFAULT_SITE;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::ecs::container::HealthCheck;
use crate::error::ConstructError;
use crate::{merge_hashmap, merge_nested, merge_options};

/// Fluent Bit config shipped in the router image that parses JSON log lines.
pub const PARSE_JSON_CONFIG_FILE: &str = "/fluent-bit/configs/parse-json.conf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingType {
    Fluentbit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApmFeatureConfig {
    pub is_enabled: Option<bool>,
    pub is_socket_enabled: Option<bool>,
    pub is_profiling_enabled: Option<bool>,
    pub trace_inferred_proxy_services: Option<bool>,
}

impl Merge for ApmFeatureConfig {
    fn merge(&mut self, other: &Self) {
        merge_options!(
            self,
            other,
            [
                is_enabled,
                is_socket_enabled,
                is_profiling_enabled,
                trace_inferred_proxy_services
            ]
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DogstatsdFeatureConfig {
    pub is_enabled: Option<bool>,
    pub is_socket_enabled: Option<bool>,
    pub is_origin_detection_enabled: Option<bool>,
    pub dogstatsd_cardinality: Option<Cardinality>,
}

impl Merge for DogstatsdFeatureConfig {
    fn merge(&mut self, other: &Self) {
        merge_options!(
            self,
            other,
            [
                is_enabled,
                is_socket_enabled,
                is_origin_detection_enabled,
                dogstatsd_cardinality
            ]
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FargateCwsFeatureConfig {
    pub is_enabled: Option<bool>,
    pub cpu: Option<u32>,
    #[serde(rename = "memoryLimitMiB")]
    pub memory_limit_mib: Option<u32>,
}

impl Merge for FargateCwsFeatureConfig {
    fn merge(&mut self, other: &Self) {
        merge_options!(self, other, [is_enabled, cpu, memory_limit_mib]);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatadogEcsLogDriverProps {
    pub host_endpoint: Option<String>,
    pub tls: Option<String>,
    pub compress: Option<String>,
    pub service_name: Option<String>,
    pub source_name: Option<String>,
    pub message_key: Option<String>,
}

impl Merge for DatadogEcsLogDriverProps {
    fn merge(&mut self, other: &Self) {
        merge_options!(
            self,
            other,
            [
                host_endpoint,
                tls,
                compress,
                service_name,
                source_name,
                message_key
            ]
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatadogFirelensOptions {
    pub config_file_type: Option<String>,
    pub config_file_value: Option<String>,
    #[serde(rename = "enableECSLogMetadata")]
    pub enable_ecs_log_metadata: Option<bool>,
    pub is_parse_json: Option<bool>,
}

impl Merge for DatadogFirelensOptions {
    fn merge(&mut self, other: &Self) {
        merge_options!(
            self,
            other,
            [
                config_file_type,
                config_file_value,
                enable_ecs_log_metadata,
                is_parse_json
            ]
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FluentbitConfig {
    pub log_driver_config: Option<DatadogEcsLogDriverProps>,
    pub firelens_options: Option<DatadogFirelensOptions>,
    pub is_log_router_essential: Option<bool>,
    pub is_log_router_dependency_enabled: Option<bool>,
    pub log_router_health_check: Option<HealthCheck>,
    pub registry: Option<String>,
    pub image_version: Option<String>,
    pub cpu: Option<u32>,
    #[serde(rename = "memoryLimitMiB")]
    pub memory_limit_mib: Option<u32>,
}

impl Merge for FluentbitConfig {
    fn merge(&mut self, other: &Self) {
        merge_nested!(self, other, log_driver_config);
        merge_nested!(self, other, firelens_options);
        merge_options!(
            self,
            other,
            [
                is_log_router_essential,
                is_log_router_dependency_enabled,
                log_router_health_check,
                registry,
                image_version,
                cpu,
                memory_limit_mib
            ]
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FargateLogCollectionFeatureConfig {
    pub is_enabled: Option<bool>,
    pub logging_type: Option<LoggingType>,
    pub fluentbit_config: Option<FluentbitConfig>,
}

impl Merge for FargateLogCollectionFeatureConfig {
    fn merge(&mut self, other: &Self) {
        merge_options!(self, other, [is_enabled, logging_type]);
        merge_nested!(self, other, fluentbit_config);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrchestratorExplorerFeatureConfig {
    pub is_enabled: Option<bool>,
    pub url: Option<String>,
}

impl Merge for OrchestratorExplorerFeatureConfig {
    fn merge(&mut self, other: &Self) {
        merge_options!(self, other, [is_enabled, url]);
    }
}

/// User-facing ECS Fargate props. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatadogEcsFargateProps {
    pub api_key: Option<String>,
    pub api_key_secret: Option<SecretRef>,
    pub api_key_secret_arn: Option<String>,
    pub registry: Option<String>,
    pub image_version: Option<String>,
    pub cpu: Option<u32>,
    #[serde(rename = "memoryLimitMiB")]
    pub memory_limit_mib: Option<u32>,
    pub is_datadog_essential: Option<bool>,
    pub is_datadog_dependency_enabled: Option<bool>,
    pub datadog_health_check: Option<HealthCheck>,
    pub site: Option<String>,
    pub cluster_name: Option<String>,
    pub environment_variables: Option<BTreeMap<String, String>>,
    pub global_tags: Option<String>,
    pub checks_cardinality: Option<Cardinality>,
    pub env: Option<String>,
    pub service: Option<String>,
    pub version: Option<String>,
    pub apm: Option<ApmFeatureConfig>,
    pub dogstatsd: Option<DogstatsdFeatureConfig>,
    pub cws: Option<FargateCwsFeatureConfig>,
    pub log_collection: Option<FargateLogCollectionFeatureConfig>,
    pub orchestrator_explorer: Option<OrchestratorExplorerFeatureConfig>,
}

impl Merge for DatadogEcsFargateProps {
    fn merge(&mut self, other: &Self) {
        merge_options!(
            self,
            other,
            [
                api_key,
                api_key_secret,
                api_key_secret_arn,
                registry,
                image_version,
                cpu,
                memory_limit_mib,
                is_datadog_essential,
                is_datadog_dependency_enabled,
                datadog_health_check,
                site,
                cluster_name,
                global_tags,
                checks_cardinality,
                env,
                service,
                version,
            ]
        );
        merge_hashmap!(self, other, environment_variables);
        merge_nested!(self, other, apm);
        merge_nested!(self, other, dogstatsd);
        merge_nested!(self, other, cws);
        merge_nested!(self, other, log_collection);
        merge_nested!(self, other, orchestrator_explorer);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApmConfig {
    pub is_enabled: bool,
    pub is_socket_enabled: bool,
    pub is_profiling_enabled: bool,
    pub trace_inferred_proxy_services: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DogstatsdConfig {
    pub is_enabled: bool,
    pub is_socket_enabled: bool,
    pub is_origin_detection_enabled: bool,
    pub dogstatsd_cardinality: Cardinality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CwsConfig {
    pub is_enabled: bool,
    pub cpu: Option<u32>,
    pub memory_limit_mib: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogDriverConfig {
    pub host_endpoint: String,
    pub tls: Option<String>,
    pub compress: Option<String>,
    pub service_name: Option<String>,
    pub source_name: Option<String>,
    pub message_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirelensOptions {
    pub config_file_type: Option<String>,
    pub config_file_value: Option<String>,
    pub enable_ecs_log_metadata: bool,
    pub is_parse_json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FluentbitStrictConfig {
    pub log_driver: LogDriverConfig,
    pub firelens_options: FirelensOptions,
    pub is_log_router_essential: bool,
    pub is_log_router_dependency_enabled: bool,
    pub log_router_health_check: HealthCheck,
    pub registry: String,
    pub image_version: String,
    pub cpu: Option<u32>,
    pub memory_limit_mib: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogCollectionConfig {
    pub is_enabled: bool,
    pub logging_type: Option<LoggingType>,
    pub fluentbit: FluentbitStrictConfig,
}

impl LogCollectionConfig {
    /// True when a Fluent Bit router container is wired into the task.
    pub fn uses_fluentbit(&self) -> bool {
        self.is_enabled && self.logging_type == Some(LoggingType::Fluentbit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestratorExplorerConfig {
    pub is_enabled: bool,
    pub url: Option<String>,
}

/// Fully resolved ECS Fargate props.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatadogEcsFargateStrictProps {
    pub api_key: Option<ApiKeySource>,
    pub registry: String,
    pub image_version: String,
    pub cpu: Option<u32>,
    pub memory_limit_mib: Option<u32>,
    pub is_datadog_essential: bool,
    pub is_datadog_dependency_enabled: bool,
    pub datadog_health_check: Option<HealthCheck>,
    pub site: String,
    pub cluster_name: Option<String>,
    pub environment_variables: BTreeMap<String, String>,
    pub global_tags: Option<String>,
    pub checks_cardinality: Option<Cardinality>,
    pub env: Option<String>,
    pub service: Option<String>,
    pub version: Option<String>,
    pub apm: ApmConfig,
    pub dogstatsd: DogstatsdConfig,
    pub cws: CwsConfig,
    pub log_collection: LogCollectionConfig,
    pub orchestrator_explorer: OrchestratorExplorerConfig,
}

impl DatadogEcsFargateStrictProps {
    /// Either intake is configured to use a Unix socket.
    pub fn is_socket_requested(&self) -> bool {
        (self.dogstatsd.is_enabled && self.dogstatsd.is_socket_enabled)
            || (self.apm.is_enabled && self.apm.is_socket_enabled)
    }

    /// Either intake is configured to use UDP/TCP.
    pub fn is_protocol_required(&self) -> bool {
        (self.dogstatsd.is_enabled && !self.dogstatsd.is_socket_enabled)
            || (self.apm.is_enabled && !self.apm.is_socket_enabled)
    }

    /// Checks that depend on the task platform, run before anything is wired.
    pub fn validate_platform(
        &self,
        is_linux: bool,
        options: &ValidationOptions,
    ) -> Result<Diagnostics, ConstructError> {
        let mut diagnostics = Diagnostics::new();
        if is_linux {
            return Ok(diagnostics);
        }

        if !options.bypass_validation && self.log_collection.uses_fluentbit() {
            return Err(ConstructError::config(
                "Fluent Bit logging is only supported on Linux.",
            ));
        }
        if self.apm.is_enabled && self.apm.is_socket_enabled {
            diagnostics.push(Diagnostic::SocketFallback {
                feature: "APM",
                reason: "the sockets volume is only mounted on Linux tasks".to_string(),
            });
        }
        if self.dogstatsd.is_enabled && self.dogstatsd.is_socket_enabled {
            diagnostics.push(Diagnostic::SocketFallback {
                feature: "DogStatsD",
                reason: "the sockets volume is only mounted on Linux tasks".to_string(),
            });
        }
        Ok(diagnostics)
    }
}

pub(crate) fn check_container_sizing(
    container: &str,
    cpu: Option<u32>,
    memory_limit_mib: Option<u32>,
) -> Result<(), ConstructError> {
    if let Some(cpu) = cpu {
        if cpu < MIN_CPU_UNITS {
            return Err(ConstructError::ResourceSizing {
                container: container.to_string(),
                resource: "CPU units",
                value: cpu,
                minimum: MIN_CPU_UNITS,
            });
        }
    }
    if let Some(memory) = memory_limit_mib {
        if memory < MIN_MEMORY_MIB {
            return Err(ConstructError::ResourceSizing {
                container: container.to_string(),
                resource: "MiB of memory",
                value: memory,
                minimum: MIN_MEMORY_MIB,
            });
        }
    }
    Ok(())
}


fn require<'a, T>(value: &'a Option<T>, name: &str) -> Result<&'a T, ConstructError> {
    value
        .as_ref()
        .ok_or_else(|| ConstructError::config(format!("The `{name}` property must be defined.")))
}

impl Resolve for DatadogEcsFargateProps {
    type Strict = DatadogEcsFargateStrictProps;

    fn library_defaults() -> Self {
        Self {
            registry: Some(DEFAULT_AGENT_REGISTRY.to_string()),
            image_version: Some(DEFAULT_AGENT_IMAGE_VERSION.to_string()),
            is_datadog_essential: Some(false),
            is_datadog_dependency_enabled: Some(false),
            datadog_health_check: Some(HealthCheck {
                command: vec!["/probe.sh".to_string()],
                interval: Some(10),
                retries: Some(3),
                start_period: Some(60),
                timeout: Some(5),
            }),
            site: Some(DEFAULT_SITE.to_string()),
            apm: Some(ApmFeatureConfig {
                is_enabled: Some(true),
                is_socket_enabled: Some(true),
                is_profiling_enabled: Some(false),
                trace_inferred_proxy_services: Some(false),
            }),
            dogstatsd: Some(DogstatsdFeatureConfig {
                is_enabled: Some(true),
                is_socket_enabled: Some(true),
                is_origin_detection_enabled: Some(true),
                dogstatsd_cardinality: Some(Cardinality::Orchestrator),
            }),
            cws: Some(FargateCwsFeatureConfig {
                is_enabled: Some(false),
                ..Default::default()
            }),
            log_collection: Some(FargateLogCollectionFeatureConfig {
                is_enabled: Some(false),
                logging_type: None,
                fluentbit_config: Some(FluentbitConfig {
                    log_driver_config: Some(DatadogEcsLogDriverProps {
                        host_endpoint: Some(DEFAULT_LOG_HOST_ENDPOINT.to_string()),
                        ..Default::default()
                    }),
                    firelens_options: Some(DatadogFirelensOptions {
                        enable_ecs_log_metadata: Some(true),
                        is_parse_json: Some(false),
                        ..Default::default()
                    }),
                    is_log_router_essential: Some(false),
                    is_log_router_dependency_enabled: Some(false),
                    log_router_health_check: Some(HealthCheck {
                        command: vec!["exit 0".to_string()],
                        interval: Some(5),
                        retries: Some(3),
                        start_period: Some(15),
                        timeout: Some(5),
                    }),
                    registry: Some(DEFAULT_LOG_ROUTER_REGISTRY.to_string()),
                    image_version: Some(DEFAULT_LOG_ROUTER_IMAGE_VERSION.to_string()),
                    cpu: None,
                    memory_limit_mib: None,
                }),
            }),
            orchestrator_explorer: Some(OrchestratorExplorerFeatureConfig {
                is_enabled: Some(true),
                url: None,
            }),
            ..Default::default()
        }
    }

    fn finalize(
        merged: Self,
        options: &ValidationOptions,
    ) -> Result<Resolved<Self::Strict>, ConstructError> {
        // the Agent container always ships telemetry itself, so no bypass applies
        let api_key = select_api_key(
            &[
                ("apiKey", merged.api_key.clone().map(ApiKeySource::Plain)),
                (
                    "apiKeySecret",
                    merged.api_key_secret.clone().map(ApiKeySource::Secret),
                ),
                (
                    "apiKeySecretArn",
                    merged.api_key_secret_arn.clone().map(ApiKeySource::SecretArn),
                ),
            ],
            true,
            "The Datadog Agent container",
        )?;

        let site = merged.site.clone().unwrap_or_else(|| DEFAULT_SITE.to_string());
        if options.bypass_validation {
            debug!("Bypassing props validation...");
        } else {
            validate_site(&site, options)?;
        }

        let registry = require(&merged.registry, "registry")?.clone();
        let image_version = require(&merged.image_version, "imageVersion")?.clone();
        let apm = require(&merged.apm, "apm")?;
        let dogstatsd = require(&merged.dogstatsd, "dogstatsd")?;
        let cws = require(&merged.cws, "cws")?;
        let log_collection = require(&merged.log_collection, "logCollection")?;
        let fluentbit = require(&log_collection.fluentbit_config, "fluentbitConfig")?;
        let log_driver = require(&fluentbit.log_driver_config, "logDriverConfig")?;
        let firelens = fluentbit.firelens_options.clone().unwrap_or_default();
        let orchestrator_explorer = merged.orchestrator_explorer.clone().unwrap_or_default();

        let is_datadog_dependency_enabled = merged.is_datadog_dependency_enabled.unwrap_or(false);
        let cws_enabled = cws.is_enabled.unwrap_or(false);
        let log_collection_enabled = log_collection.is_enabled.unwrap_or(false);
        let is_parse_json = firelens.is_parse_json.unwrap_or(false);

        if !options.bypass_validation {
            if is_datadog_dependency_enabled {
                match &merged.datadog_health_check {
                    None => {
                        return Err(ConstructError::config(
                            "The `datadogHealthCheck` property must be defined when `isDatadogDependencyEnabled` is true.",
                        ))
                    }
                    Some(check) if check.command.is_empty() => {
                        return Err(ConstructError::config(
                            "The `command` property must be defined in `datadogHealthCheck`.",
                        ))
                    }
                    Some(_) => {}
                }
            }
            if log_collection_enabled && log_collection.logging_type.is_none() {
                return Err(ConstructError::config(
                    "The `loggingType` property must be defined when logging enabled.",
                ));
            }
            if cws_enabled && !is_datadog_dependency_enabled {
                return Err(ConstructError::config(
                    "CWS configuration highly recommends Datadog Agent dependency enabled. The CWS tracer eventually exits the application if it can't connect to the Datadog Agent.",
                ));
            }
        }

        check_container_sizing(AGENT_CONTAINER_NAME, merged.cpu, merged.memory_limit_mib)?;
        check_container_sizing(CWS_CONTAINER_NAME, cws.cpu, cws.memory_limit_mib)?;
        check_container_sizing(
            LOG_ROUTER_CONTAINER_NAME,
            fluentbit.cpu,
            fluentbit.memory_limit_mib,
        )?;

        let (config_file_type, config_file_value) = if is_parse_json {
            (
                Some("file".to_string()),
                Some(PARSE_JSON_CONFIG_FILE.to_string()),
            )
        } else {
            (
                firelens.config_file_type.clone(),
                firelens.config_file_value.clone(),
            )
        };

        let props = DatadogEcsFargateStrictProps {
            api_key,
            registry,
            image_version,
            cpu: merged.cpu,
            memory_limit_mib: merged.memory_limit_mib,
            is_datadog_essential: merged.is_datadog_essential.unwrap_or(false),
            is_datadog_dependency_enabled,
            datadog_health_check: merged.datadog_health_check.clone(),
            site,
            cluster_name: merged.cluster_name.clone(),
            environment_variables: merged.environment_variables.clone().unwrap_or_default(),
            global_tags: merged.global_tags.clone(),
            checks_cardinality: merged.checks_cardinality,
            env: merged.env.clone(),
            service: merged.service.clone(),
            version: merged.version.clone(),
            apm: ApmConfig {
                is_enabled: apm.is_enabled.unwrap_or(true),
                is_socket_enabled: apm.is_socket_enabled.unwrap_or(true),
                is_profiling_enabled: apm.is_profiling_enabled.unwrap_or(false),
                trace_inferred_proxy_services: apm.trace_inferred_proxy_services.unwrap_or(false),
            },
            dogstatsd: DogstatsdConfig {
                is_enabled: dogstatsd.is_enabled.unwrap_or(true),
                is_socket_enabled: dogstatsd.is_socket_enabled.unwrap_or(true),
                is_origin_detection_enabled: dogstatsd.is_origin_detection_enabled.unwrap_or(true),
                dogstatsd_cardinality: dogstatsd.dogstatsd_cardinality.unwrap_or_default(),
            },
            cws: CwsConfig {
                is_enabled: cws_enabled,
                cpu: cws.cpu,
                memory_limit_mib: cws.memory_limit_mib,
            },
            log_collection: LogCollectionConfig {
                is_enabled: log_collection_enabled,
                logging_type: log_collection.logging_type,
                fluentbit: FluentbitStrictConfig {
                    log_driver: LogDriverConfig {
                        host_endpoint: log_driver
                            .host_endpoint
                            .clone()
                            .unwrap_or_else(|| DEFAULT_LOG_HOST_ENDPOINT.to_string()),
                        tls: log_driver.tls.clone(),
                        compress: log_driver.compress.clone(),
                        service_name: log_driver.service_name.clone(),
                        source_name: log_driver.source_name.clone(),
                        message_key: log_driver.message_key.clone(),
                    },
                    firelens_options: FirelensOptions {
                        config_file_type,
                        config_file_value,
                        enable_ecs_log_metadata: firelens.enable_ecs_log_metadata.unwrap_or(true),
                        is_parse_json,
                    },
                    is_log_router_essential: fluentbit.is_log_router_essential.unwrap_or(false),
                    is_log_router_dependency_enabled: fluentbit
                        .is_log_router_dependency_enabled
                        .unwrap_or(false),
                    log_router_health_check: fluentbit
                        .log_router_health_check
                        .clone()
                        .unwrap_or_default(),
                    registry: fluentbit
                        .registry
                        .clone()
                        .unwrap_or_else(|| DEFAULT_LOG_ROUTER_REGISTRY.to_string()),
                    image_version: fluentbit
                        .image_version
                        .clone()
                        .unwrap_or_else(|| DEFAULT_LOG_ROUTER_IMAGE_VERSION.to_string()),
                    cpu: fluentbit.cpu,
                    memory_limit_mib: fluentbit.memory_limit_mib,
                },
            },
            orchestrator_explorer: OrchestratorExplorerConfig {
                is_enabled: orchestrator_explorer.is_enabled.unwrap_or(true),
                url: orchestrator_explorer.url,
            },
        };

        Ok(Resolved {
            props,
            diagnostics: Diagnostics::new(),
        })
    }
}

impl From<DatadogEcsFargateStrictProps> for DatadogEcsFargateProps {
    fn from(strict: DatadogEcsFargateStrictProps) -> Self {
        let (api_key, api_key_secret, api_key_secret_arn) = match strict.api_key {
            Some(ApiKeySource::Plain(key)) => (Some(key), None, None),
            Some(ApiKeySource::Secret(secret)) => (None, Some(secret), None),
            Some(ApiKeySource::SecretArn(arn)) => (None, None, Some(arn)),
            // not a source ECS accepts; dropped
            Some(ApiKeySource::KmsEncrypted(_)) | None => (None, None, None),
        };
        let fluentbit = strict.log_collection.fluentbit;
        let firelens = fluentbit.firelens_options;
        Self {
            api_key,
            api_key_secret,
            api_key_secret_arn,
            registry: Some(strict.registry),
            image_version: Some(strict.image_version),
            cpu: strict.cpu,
            memory_limit_mib: strict.memory_limit_mib,
            is_datadog_essential: Some(strict.is_datadog_essential),
            is_datadog_dependency_enabled: Some(strict.is_datadog_dependency_enabled),
            datadog_health_check: strict.datadog_health_check,
            site: Some(strict.site),
            cluster_name: strict.cluster_name,
            environment_variables: Some(strict.environment_variables),
            global_tags: strict.global_tags,
            checks_cardinality: strict.checks_cardinality,
            env: strict.env,
            service: strict.service,
            version: strict.version,
            apm: Some(ApmFeatureConfig {
                is_enabled: Some(strict.apm.is_enabled),
                is_socket_enabled: Some(strict.apm.is_socket_enabled),
                is_profiling_enabled: Some(strict.apm.is_profiling_enabled),
                trace_inferred_proxy_services: Some(strict.apm.trace_inferred_proxy_services),
            }),
            dogstatsd: Some(DogstatsdFeatureConfig {
                is_enabled: Some(strict.dogstatsd.is_enabled),
                is_socket_enabled: Some(strict.dogstatsd.is_socket_enabled),
                is_origin_detection_enabled: Some(strict.dogstatsd.is_origin_detection_enabled),
                dogstatsd_cardinality: Some(strict.dogstatsd.dogstatsd_cardinality),
            }),
            cws: Some(FargateCwsFeatureConfig {
                is_enabled: Some(strict.cws.is_enabled),
                cpu: strict.cws.cpu,
                memory_limit_mib: strict.cws.memory_limit_mib,
            }),
            log_collection: Some(FargateLogCollectionFeatureConfig {
                is_enabled: Some(strict.log_collection.is_enabled),
                logging_type: strict.log_collection.logging_type,
                fluentbit_config: Some(FluentbitConfig {
                    log_driver_config: Some(DatadogEcsLogDriverProps {
                        host_endpoint: Some(fluentbit.log_driver.host_endpoint),
                        tls: fluentbit.log_driver.tls,
                        compress: fluentbit.log_driver.compress,
                        service_name: fluentbit.log_driver.service_name,
                        source_name: fluentbit.log_driver.source_name,
                        message_key: fluentbit.log_driver.message_key,
                    }),
                    firelens_options: Some(DatadogFirelensOptions {
                        config_file_type: firelens.config_file_type,
                        config_file_value: firelens.config_file_value,
                        enable_ecs_log_metadata: Some(firelens.enable_ecs_log_metadata),
                        is_parse_json: Some(firelens.is_parse_json),
                    }),
                    is_log_router_essential: Some(fluentbit.is_log_router_essential),
                    is_log_router_dependency_enabled: Some(
                        fluentbit.is_log_router_dependency_enabled,
                    ),
                    log_router_health_check: Some(fluentbit.log_router_health_check),
                    registry: Some(fluentbit.registry),
                    image_version: Some(fluentbit.image_version),
                    cpu: fluentbit.cpu,
                    memory_limit_mib: fluentbit.memory_limit_mib,
                }),
            }),
            orchestrator_explorer: Some(OrchestratorExplorerFeatureConfig {
                is_enabled: Some(strict.orchestrator_explorer.is_enabled),
                url: strict.orchestrator_explorer.url,
            }),
        }
    }
}
