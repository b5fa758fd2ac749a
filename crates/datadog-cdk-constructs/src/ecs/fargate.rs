// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sidecar wiring for ECS Fargate task definitions.
//!
//! Datadog-managed containers are added in a fixed order when the task
//! definition is created: the Agent, then the CWS init container, then the
//! log router. Application containers added afterwards receive dependency
//! edges, mounts and environment pointing at them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::api_key::{ApiKeySource, SecretRef};
use crate::config::ecs::{
    check_container_sizing, DatadogEcsFargateProps, DatadogEcsFargateStrictProps,
};
use crate::config::{Resolve, ValidationOptions};
use crate::constants::ecs::{
    AGENT_CONTAINER_NAME, AGENT_HOST, APM_PORT, APM_SOCKET_URL, CWS_CONTAINER_NAME,
    CWS_ENTRYPOINT_PREFIX, CWS_IMAGE, CWS_VOLUME_NAME, CWS_VOLUME_PATH, DSD_PORT, DSD_SOCKET_URL,
    LOG_ROUTER_CONTAINER_NAME, RESERVED_CONTAINER_NAMES, SOCKET_PATH, SOCKET_VOLUME_NAME,
    TASK_ROLE_ACTIONS, UST_LABEL_ENV, UST_LABEL_SERVICE, UST_LABEL_VERSION,
};
use crate::constants::{tag_keys, CONSTRUCT_VERSION};
use crate::diagnostics::Diagnostics;
use crate::ecs::container::{
    ContainerDefinition, ContainerDefinitionOptions, ContainerDependencyCondition,
    FirelensConfig, LogDriver, MountPoint, PortMapping, Protocol,
};
use crate::ecs::environment::EnvVarManager;
use crate::ecs::task_definition::{FargateTaskDefinitionProps, PolicyStatement, TaskDefinition};
use crate::error::ConstructError;

const SYS_PTRACE: &str = "SYS_PTRACE";

/// Holds construct-level Datadog props shared by every task definition it creates.
#[derive(Debug, Clone)]
pub struct DatadogEcsFargate {
    datadog_props: DatadogEcsFargateProps,
    options: ValidationOptions,
}

impl DatadogEcsFargate {
    pub fn new(datadog_props: DatadogEcsFargateProps) -> Self {
        Self {
            datadog_props,
            options: ValidationOptions::from_env(),
        }
    }

    #[must_use]
    pub fn with_validation_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Creates an instrumented task definition. `datadog_props` wins over the
    /// construct-level props field by field, nested features included.
    pub fn fargate_task_definition(
        &self,
        id: &str,
        props: &FargateTaskDefinitionProps,
        datadog_props: &DatadogEcsFargateProps,
    ) -> Result<DatadogEcsFargateTaskDefinition, ConstructError> {
        DatadogEcsFargateTaskDefinition::with_defaults(
            id,
            props,
            datadog_props,
            &self.datadog_props,
            &self.options,
        )
    }
}

#[derive(Debug, Clone)]
pub struct DatadogEcsFargateTaskDefinition {
    task: TaskDefinition,
    props: DatadogEcsFargateStrictProps,
    env_vars: EnvVarManager,
    is_linux: bool,
    diagnostics: Diagnostics,
}

impl DatadogEcsFargateTaskDefinition {
    pub fn new(
        id: &str,
        props: &FargateTaskDefinitionProps,
        datadog_props: &DatadogEcsFargateProps,
    ) -> Result<Self, ConstructError> {
        Self::with_defaults(
            id,
            props,
            datadog_props,
            &DatadogEcsFargateProps::default(),
            &ValidationOptions::from_env(),
        )
    }

    /// Resolves `datadog_props` over `defaults`, validates, then wires the
    /// Datadog-managed containers. Nothing is built when validation fails.
    pub fn with_defaults(
        id: &str,
        props: &FargateTaskDefinitionProps,
        datadog_props: &DatadogEcsFargateProps,
        defaults: &DatadogEcsFargateProps,
        options: &ValidationOptions,
    ) -> Result<Self, ConstructError> {
        let resolved = datadog_props.resolve(defaults, options)?;
        let is_linux = props.is_linux();
        let mut diagnostics = resolved.diagnostics;
        diagnostics.extend(resolved.props.validate_platform(is_linux, options)?);

        let env_vars = EnvVarManager::for_fargate(&resolved.props);
        for key in env_vars.overwritten_keys() {
            debug!("Agent environment variable {} was overwritten", key);
        }

        let mut task_definition = Self {
            task: TaskDefinition::new(id, props),
            props: resolved.props,
            env_vars,
            is_linux,
            diagnostics,
        };

        task_definition.add_agent_container();
        if task_definition.is_socket_required() {
            task_definition.task.add_volume(SOCKET_VOLUME_NAME);
        }
        if task_definition.props.cws.is_enabled {
            task_definition.task.add_volume(CWS_VOLUME_NAME);
            task_definition.add_cws_container();
        }
        if task_definition.props.log_collection.uses_fluentbit() {
            task_definition.add_log_container();
        }

        task_definition.task.add_to_task_role_policy(PolicyStatement {
            actions: TASK_ROLE_ACTIONS.iter().map(ToString::to_string).collect(),
            resources: vec!["*".to_string()],
        });
        debug!("Adding CDK Construct version tag: {}", CONSTRUCT_VERSION);
        task_definition
            .task
            .add_tag(tag_keys::CDK, &format!("v{CONSTRUCT_VERSION}"));
        Ok(task_definition)
    }

    fn is_socket_required(&self) -> bool {
        self.is_linux && self.props.is_socket_requested()
    }

    /// Sockets requested on a platform without the sockets volume fall back to
    /// the local host.
    fn is_agent_host_required(&self) -> bool {
        self.props.is_protocol_required() || (!self.is_linux && self.props.is_socket_requested())
    }

    fn api_key_secret(&self) -> Option<SecretRef> {
        match &self.props.api_key {
            Some(ApiKeySource::Secret(secret)) => Some(secret.clone()),
            Some(ApiKeySource::SecretArn(arn)) => Some(SecretRef::new(arn.as_str())),
            _ => None,
        }
    }

    fn add_agent_container(&mut self) {
        let props = &self.props;
        let secrets = self
            .api_key_secret()
            .map(|secret| BTreeMap::from([("DD_API_KEY".to_string(), secret)]))
            .unwrap_or_default();
        let logging = if props.log_collection.is_enabled && self.is_linux {
            self.log_driver()
        } else {
            None
        };

        let mut agent = ContainerDefinition::from_options(
            AGENT_CONTAINER_NAME.to_string(),
            ContainerDefinitionOptions {
                image: format!("{}:{}", props.registry, props.image_version),
                cpu: props.cpu,
                memory_limit_mib: props.memory_limit_mib,
                essential: Some(props.is_datadog_essential),
                environment: self.env_vars.retrieve_all(),
                secrets,
                health_check: props.datadog_health_check.clone(),
                port_mappings: vec![
                    PortMapping {
                        container_port: DSD_PORT,
                        host_port: DSD_PORT,
                        protocol: Protocol::Udp,
                    },
                    PortMapping {
                        container_port: APM_PORT,
                        host_port: APM_PORT,
                        protocol: Protocol::Tcp,
                    },
                ],
                logging,
                ..Default::default()
            },
        );
        if self.is_socket_required() {
            agent.add_mount_point(MountPoint::read_write(SOCKET_VOLUME_NAME, SOCKET_PATH));
        }
        self.task.push_container(agent);
    }

    fn add_cws_container(&mut self) {
        let mut cws = ContainerDefinition::from_options(
            CWS_CONTAINER_NAME.to_string(),
            ContainerDefinitionOptions {
                image: CWS_IMAGE.to_string(),
                cpu: self.props.cws.cpu,
                memory_limit_mib: self.props.cws.memory_limit_mib,
                user: Some("0".to_string()),
                essential: Some(false),
                command: Some(vec![
                    "/cws-instrumentation".to_string(),
                    "setup".to_string(),
                    "--cws-volume-mount".to_string(),
                    CWS_VOLUME_PATH.to_string(),
                ]),
                ..Default::default()
            },
        );
        cws.add_mount_point(MountPoint::read_write(CWS_VOLUME_NAME, CWS_VOLUME_PATH));
        self.task.push_container(cws);
    }

    fn add_log_container(&mut self) {
        let fluentbit = &self.props.log_collection.fluentbit;
        let mut router = ContainerDefinition::from_options(
            LOG_ROUTER_CONTAINER_NAME.to_string(),
            ContainerDefinitionOptions {
                image: format!("{}:{}", fluentbit.registry, fluentbit.image_version),
                cpu: fluentbit.cpu,
                memory_limit_mib: fluentbit.memory_limit_mib,
                essential: Some(fluentbit.is_log_router_essential),
                health_check: Some(fluentbit.log_router_health_check.clone()),
                ..Default::default()
            },
        );
        router.firelens_config = Some(FirelensConfig {
            router_type: "fluentbit".to_string(),
            enable_ecs_log_metadata: fluentbit.firelens_options.enable_ecs_log_metadata,
            config_file_type: fluentbit.firelens_options.config_file_type.clone(),
            config_file_value: fluentbit.firelens_options.config_file_value.clone(),
        });
        self.task.push_container(router);
    }

    /// FireLens driver shipping container logs to Datadog through the router.
    fn log_driver(&self) -> Option<LogDriver> {
        if !self.props.log_collection.uses_fluentbit() {
            return None;
        }
        let config = &self.props.log_collection.fluentbit.log_driver;

        let mut log_tags = self.env_vars.retrieve("DD_TAGS").map(ToString::to_string);
        if let Some(cluster_name) = &self.props.cluster_name {
            let mut tags = log_tags.map(|tags| tags + ", ").unwrap_or_default();
            tags.push_str(&format!("ecs_cluster_name:{cluster_name}"));
            log_tags = Some(tags);
        }

        let mut options = BTreeMap::from([
            ("Name".to_string(), "datadog".to_string()),
            ("provider".to_string(), "ecs".to_string()),
            ("retry_limit".to_string(), "2".to_string()),
            ("Host".to_string(), config.host_endpoint.clone()),
        ]);
        let optional = [
            ("TLS", &config.tls),
            ("compress", &config.compress),
            ("dd_service", &config.service_name),
            ("dd_source", &config.source_name),
            ("dd_message_key", &config.message_key),
            ("dd_tags", &log_tags),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                options.insert(key.to_string(), value.clone());
            }
        }
        if let Some(ApiKeySource::Plain(api_key)) = &self.props.api_key {
            options.insert("apikey".to_string(), api_key.clone());
        }
        let secret_options = self
            .api_key_secret()
            .map(|secret| BTreeMap::from([("apikey".to_string(), secret)]))
            .unwrap_or_default();

        Some(LogDriver {
            driver: "awsfirelens".to_string(),
            options,
            secret_options,
        })
    }

    /// Adds an application container, instrumented for the enabled features.
    ///
    /// Fails without touching the task definition when the name is reserved or
    /// already used, or when the container is sized below the minimum.
    pub fn add_container(
        &mut self,
        id: &str,
        options: ContainerDefinitionOptions,
    ) -> Result<&ContainerDefinition, ConstructError> {
        let name = options.container_name.clone().unwrap_or_else(|| id.to_string());
        if RESERVED_CONTAINER_NAMES.contains(&name.as_str()) || self.task.has_container(&name) {
            return Err(ConstructError::ContainerNameConflict { name });
        }
        check_container_sizing(&name, options.cpu, options.memory_limit_mib)?;

        let mut options = options;
        let cws_enabled = self.props.cws.is_enabled;
        if cws_enabled {
            let capabilities = options.linux_capabilities.get_or_insert_with(Vec::new);
            if !capabilities.iter().any(|c| c == SYS_PTRACE) {
                capabilities.push(SYS_PTRACE.to_string());
            }
            match options.entry_point.as_mut() {
                Some(entry_point) => {
                    let mut prefixed: Vec<String> =
                        CWS_ENTRYPOINT_PREFIX.iter().map(ToString::to_string).collect();
                    prefixed.append(entry_point);
                    *entry_point = prefixed;
                }
                None => debug!("Failed to add CWS entrypoint for container: {}", id),
            }
        }
        if self.props.log_collection.uses_fluentbit() {
            if options.logging.is_some() {
                debug!("Overriding logging configuration for container: {}", id);
            }
            options.logging = self.log_driver();
        }

        let mut container = ContainerDefinition::from_options(name, options);
        self.configure_container(&mut container, cws_enabled);
        Ok(self.task.push_container(container))
    }

    fn configure_container(&self, container: &mut ContainerDefinition, cws_enabled: bool) {
        let props = &self.props;
        if props.is_datadog_dependency_enabled && props.datadog_health_check.is_some() {
            container.add_dependency(AGENT_CONTAINER_NAME, ContainerDependencyCondition::Healthy);
        }
        let fluentbit = &props.log_collection.fluentbit;
        if props.log_collection.uses_fluentbit() && fluentbit.is_log_router_dependency_enabled {
            container.add_dependency(
                LOG_ROUTER_CONTAINER_NAME,
                ContainerDependencyCondition::Healthy,
            );
        }

        if self.is_socket_required() {
            container.add_mount_point(MountPoint::read_write(SOCKET_VOLUME_NAME, SOCKET_PATH));
            if props.dogstatsd.is_enabled && props.dogstatsd.is_socket_enabled {
                container.add_environment("DD_DOGSTATSD_URL", DSD_SOCKET_URL);
            }
            if props.apm.is_enabled && props.apm.is_socket_enabled {
                container.add_environment("DD_TRACE_AGENT_URL", APM_SOCKET_URL);
            }
        }
        if self.is_agent_host_required() {
            container.add_environment("DD_AGENT_HOST", AGENT_HOST);
        }
        if props.apm.is_enabled && props.apm.is_profiling_enabled {
            container.add_environment("DD_PROFILING_ENABLED", "true");
        }
        if props.apm.is_enabled && props.apm.trace_inferred_proxy_services {
            container.add_environment("DD_TRACE_INFERRED_PROXY_SERVICES_ENABLED", "true");
        }

        if cws_enabled {
            container.add_mount_point(MountPoint::read_write(CWS_VOLUME_NAME, CWS_VOLUME_PATH));
            container.add_dependency(CWS_CONTAINER_NAME, ContainerDependencyCondition::Healthy);
        }

        let ust = [
            ("DD_ENV", UST_LABEL_ENV, &props.env),
            ("DD_SERVICE", UST_LABEL_SERVICE, &props.service),
            ("DD_VERSION", UST_LABEL_VERSION, &props.version),
        ];
        for (env_key, label, value) in ust {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                container.add_environment(env_key, value);
                container.add_docker_label(label, value);
            }
        }
    }

    pub fn task_definition(&self) -> &TaskDefinition {
        &self.task
    }

    pub fn into_task_definition(self) -> TaskDefinition {
        self.task
    }

    pub fn props(&self) -> &DatadogEcsFargateStrictProps {
        &self.props
    }

    pub fn env_vars(&self) -> &EnvVarManager {
        &self.env_vars
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn datadog_container(&self) -> Option<&ContainerDefinition> {
        self.task.container(AGENT_CONTAINER_NAME)
    }

    pub fn cws_container(&self) -> Option<&ContainerDefinition> {
        self.task.container(CWS_CONTAINER_NAME)
    }

    pub fn log_container(&self) -> Option<&ContainerDefinition> {
        self.task.container(LOG_ROUTER_CONTAINER_NAME)
    }
}
