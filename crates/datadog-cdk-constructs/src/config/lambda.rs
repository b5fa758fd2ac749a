// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Props accepted by the Lambda instrumenter and their resolution.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::api_key::{select_api_key, ApiKeySource, SecretRef};
use crate::config::{is_token, validate_site, Merge, Resolve, Resolved, ValidationOptions};
use crate::constants::DEFAULT_SITE;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ConstructError;
use crate::merge_options;

/// App & API Protection mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatadogAppSecMode {
    #[default]
    Off,
    On,
    /// Protection runs inside the extension.
    Extension,
    /// Protection runs inside the tracer library.
    Tracer,
}

impl DatadogAppSecMode {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != DatadogAppSecMode::Off
    }
}

/// User-facing Lambda props. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatadogLambdaProps {
    pub python_layer_version: Option<u32>,
    pub python_layer_arn: Option<String>,
    pub node_layer_version: Option<u32>,
    pub node_layer_arn: Option<String>,
    pub java_layer_version: Option<u32>,
    pub java_layer_arn: Option<String>,
    pub dotnet_layer_version: Option<u32>,
    pub dotnet_layer_arn: Option<String>,
    pub ruby_layer_version: Option<u32>,
    pub ruby_layer_arn: Option<String>,
    pub extension_layer_version: Option<u32>,
    pub extension_layer_arn: Option<String>,
    pub add_layers: Option<bool>,
    pub use_layers_from_account: Option<String>,
    pub forwarder_arn: Option<String>,
    pub create_forwarder_permissions: Option<bool>,
    pub flush_metrics_to_logs: Option<bool>,
    pub site: Option<String>,
    pub api_key: Option<String>,
    pub api_key_secret_arn: Option<String>,
    pub api_key_secret: Option<SecretRef>,
    pub api_kms_key: Option<String>,
    pub enable_datadog_tracing: Option<bool>,
    #[serde(rename = "enableDatadogASM")]
    pub enable_datadog_asm: Option<bool>,
    pub datadog_app_sec_mode: Option<DatadogAppSecMode>,
    pub enable_merge_xray_traces: Option<bool>,
    pub inject_log_context: Option<bool>,
    pub log_level: Option<String>,
    pub enable_datadog_logs: Option<bool>,
    pub capture_lambda_payload: Option<bool>,
    pub capture_cloud_service_payload: Option<bool>,
    pub env: Option<String>,
    pub service: Option<String>,
    pub version: Option<String>,
    /// Comma separated `key:value` pairs.
    pub tags: Option<String>,
    pub source_code_integration: Option<bool>,
    pub enable_cold_start_tracing: Option<bool>,
    pub min_cold_start_trace_duration: Option<u64>,
    pub cold_start_trace_skip_libs: Option<String>,
    pub enable_profiling: Option<bool>,
    pub encode_authorizer_context: Option<bool>,
    pub decode_authorizer_context: Option<bool>,
    pub apm_flush_deadline: Option<String>,
    pub redirect_handler: Option<bool>,
    pub grant_secret_read_access: Option<bool>,
    pub llm_obs_enabled: Option<bool>,
    pub llm_obs_ml_app: Option<String>,
    pub llm_obs_agentless_enabled: Option<bool>,
}

impl Merge for DatadogLambdaProps {
    fn merge(&mut self, other: &Self) {
        merge_options!(
            self,
            other,
            [
                python_layer_version,
                python_layer_arn,
                node_layer_version,
                node_layer_arn,
                java_layer_version,
                java_layer_arn,
                dotnet_layer_version,
                dotnet_layer_arn,
                ruby_layer_version,
                ruby_layer_arn,
                extension_layer_version,
                extension_layer_arn,
                add_layers,
                use_layers_from_account,
                forwarder_arn,
                create_forwarder_permissions,
                flush_metrics_to_logs,
                site,
                api_key,
                api_key_secret_arn,
                api_key_secret,
                api_kms_key,
                enable_datadog_tracing,
                enable_datadog_asm,
                datadog_app_sec_mode,
                enable_merge_xray_traces,
                inject_log_context,
                log_level,
                enable_datadog_logs,
                capture_lambda_payload,
                capture_cloud_service_payload,
                env,
                service,
                version,
                tags,
                source_code_integration,
                enable_cold_start_tracing,
                min_cold_start_trace_duration,
                cold_start_trace_skip_libs,
                enable_profiling,
                encode_authorizer_context,
                decode_authorizer_context,
                apm_flush_deadline,
                redirect_handler,
                grant_secret_read_access,
                llm_obs_enabled,
                llm_obs_ml_app,
                llm_obs_agentless_enabled,
            ]
        );
    }
}

/// Per-runtime layer pin: an explicit ARN wins over a version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LayerPin {
    pub version: Option<u32>,
    pub arn: Option<String>,
}

impl LayerPin {
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.version.is_some() || self.arn.is_some()
    }
}

/// Fully resolved Lambda props.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatadogLambdaStrictProps {
    pub python_layer: LayerPin,
    pub node_layer: LayerPin,
    pub java_layer: LayerPin,
    pub dotnet_layer: LayerPin,
    pub ruby_layer: LayerPin,
    pub extension_layer: LayerPin,
    pub add_layers: bool,
    pub use_layers_from_account: Option<String>,
    pub forwarder_arn: Option<String>,
    pub create_forwarder_permissions: bool,
    /// Always false when the extension layer is configured.
    pub flush_metrics_to_logs: bool,
    pub site: String,
    pub api_key: Option<ApiKeySource>,
    pub enable_datadog_tracing: bool,
    pub datadog_app_sec_mode: DatadogAppSecMode,
    pub enable_merge_xray_traces: bool,
    pub inject_log_context: bool,
    pub log_level: Option<String>,
    pub enable_datadog_logs: bool,
    pub capture_lambda_payload: bool,
    pub capture_cloud_service_payload: bool,
    pub env: Option<String>,
    pub service: Option<String>,
    pub version: Option<String>,
    pub tags: Option<String>,
    pub source_code_integration: bool,
    pub enable_cold_start_tracing: Option<bool>,
    pub min_cold_start_trace_duration: Option<u64>,
    pub cold_start_trace_skip_libs: Option<String>,
    pub enable_profiling: Option<bool>,
    pub encode_authorizer_context: Option<bool>,
    pub decode_authorizer_context: Option<bool>,
    pub apm_flush_deadline: Option<String>,
    pub redirect_handler: bool,
    pub grant_secret_read_access: bool,
    pub llm_obs_enabled: bool,
    pub llm_obs_ml_app: Option<String>,
    pub llm_obs_agentless_enabled: Option<bool>,
}

impl DatadogLambdaStrictProps {
    #[must_use]
    pub fn uses_extension(&self) -> bool {
        self.extension_layer.is_set()
    }
}

#[allow(clippy::unwrap_used)]
fn ml_app_regex() -> &'static Regex {
    static ML_APP: OnceLock<Regex> = OnceLock::new();
    ML_APP.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_\-:\./]{1,193}$").unwrap())
}

/// Validates that a forwarder ARN can actually be subscribed to.
pub(crate) fn validate_forwarder_arn(arn: &str) -> Result<(), ConstructError> {
    let arn = arn.trim();
    if arn.is_empty() {
        return Err(ConstructError::ForwarderConfig(
            "`forwarderArn` is set but empty".to_string(),
        ));
    }
    if !arn.starts_with("arn:") && !is_token(arn) {
        return Err(ConstructError::ForwarderConfig(format!(
            "`forwarderArn` '{arn}' is not a valid ARN"
        )));
    }
    Ok(())
}

impl Resolve for DatadogLambdaProps {
    type Strict = DatadogLambdaStrictProps;

    fn library_defaults() -> Self {
        Self {
            add_layers: Some(true),
            enable_datadog_tracing: Some(true),
            enable_merge_xray_traces: Some(false),
            inject_log_context: Some(true),
            enable_datadog_logs: Some(true),
            capture_lambda_payload: Some(false),
            capture_cloud_service_payload: Some(false),
            source_code_integration: Some(true),
            redirect_handler: Some(true),
            grant_secret_read_access: Some(true),
            llm_obs_enabled: Some(false),
            flush_metrics_to_logs: Some(true),
            site: Some(DEFAULT_SITE.to_string()),
            ..Default::default()
        }
    }

    fn finalize(
        merged: Self,
        options: &ValidationOptions,
    ) -> Result<Resolved<Self::Strict>, ConstructError> {
        let mut diagnostics = Diagnostics::new();

        let extension_layer = LayerPin {
            version: merged.extension_layer_version,
            arn: merged.extension_layer_arn.clone(),
        };
        let uses_extension = extension_layer.is_set();
        let mut flush_metrics_to_logs = merged.flush_metrics_to_logs.unwrap_or(true);
        if uses_extension && flush_metrics_to_logs {
            debug!("Extension layer configured, metrics are sent by the extension instead of logs");
            flush_metrics_to_logs = false;
        }

        let site = merged.site.clone().unwrap_or_else(|| DEFAULT_SITE.to_string());
        validate_site(&site, options)?;

        let (required, reason) = if uses_extension {
            (true, "The Datadog Lambda Extension")
        } else if !flush_metrics_to_logs {
            (true, "Disabling `flushMetricsToLogs`")
        } else {
            (false, "")
        };
        let api_key = select_api_key(
            &[
                ("apiKey", merged.api_key.clone().map(ApiKeySource::Plain)),
                (
                    "apiKeySecretArn",
                    merged.api_key_secret_arn.clone().map(ApiKeySource::SecretArn),
                ),
                (
                    "apiKeySecret",
                    merged.api_key_secret.clone().map(ApiKeySource::Secret),
                ),
                (
                    "apiKmsKey",
                    merged.api_kms_key.clone().map(ApiKeySource::KmsEncrypted),
                ),
            ],
            required,
            reason,
        )?;

        let datadog_app_sec_mode = match (merged.enable_datadog_asm, merged.datadog_app_sec_mode) {
            (Some(_), Some(_)) => {
                return Err(ConstructError::config(
                    "`datadogAppSecMode` and `enableDatadogASM` are mutually exclusive; set only `datadogAppSecMode`.",
                ))
            }
            (Some(enabled), None) => {
                diagnostics.push(Diagnostic::Deprecated {
                    setting: "enableDatadogASM",
                    replacement: "datadogAppSecMode",
                });
                if enabled {
                    debug!("`enableDatadogASM` set, defaulting datadogAppSecMode to extension");
                    DatadogAppSecMode::Extension
                } else {
                    DatadogAppSecMode::Off
                }
            }
            (None, mode) => mode.unwrap_or_default(),
        };

        let enable_datadog_tracing = merged.enable_datadog_tracing.unwrap_or(true);
        if datadog_app_sec_mode.is_enabled() && (!enable_datadog_tracing || !uses_extension) {
            return Err(ConstructError::config(
                "App and API Protection requires `enableDatadogTracing` and either `extensionLayerVersion` or `extensionLayerArn` when `datadogAppSecMode` or `enableDatadogASM` enable it.",
            ));
        }

        let llm_obs_enabled = merged.llm_obs_enabled.unwrap_or(false);
        match merged.llm_obs_ml_app.as_deref() {
            None | Some("") if llm_obs_enabled => {
                return Err(ConstructError::config(
                    "When `llmObsEnabled` is true, `llmObsMlApp` must also be set.",
                ))
            }
            Some(ml_app) if !ml_app.is_empty() && !ml_app_regex().is_match(ml_app) => {
                return Err(ConstructError::config(
                    "`llmObsMlApp` must only contain up to 193 alphanumeric characters, hyphens, underscores, periods, and slashes.",
                ))
            }
            _ => {}
        }

        match &merged.forwarder_arn {
            Some(forwarder_arn) => validate_forwarder_arn(forwarder_arn)?,
            None if merged.create_forwarder_permissions == Some(true) => {
                return Err(ConstructError::ForwarderConfig(
                    "`createForwarderPermissions` is set but no `forwarderArn` was provided"
                        .to_string(),
                ))
            }
            None => {}
        }

        let props = DatadogLambdaStrictProps {
            python_layer: LayerPin {
                version: merged.python_layer_version,
                arn: merged.python_layer_arn,
            },
            node_layer: LayerPin {
                version: merged.node_layer_version,
                arn: merged.node_layer_arn,
            },
            java_layer: LayerPin {
                version: merged.java_layer_version,
                arn: merged.java_layer_arn,
            },
            dotnet_layer: LayerPin {
                version: merged.dotnet_layer_version,
                arn: merged.dotnet_layer_arn,
            },
            ruby_layer: LayerPin {
                version: merged.ruby_layer_version,
                arn: merged.ruby_layer_arn,
            },
            extension_layer,
            add_layers: merged.add_layers.unwrap_or(true),
            use_layers_from_account: merged.use_layers_from_account,
            forwarder_arn: merged.forwarder_arn,
            create_forwarder_permissions: merged.create_forwarder_permissions.unwrap_or(false),
            flush_metrics_to_logs,
            site,
            api_key,
            enable_datadog_tracing,
            datadog_app_sec_mode,
            enable_merge_xray_traces: merged.enable_merge_xray_traces.unwrap_or(false),
            inject_log_context: merged.inject_log_context.unwrap_or(true),
            log_level: merged.log_level,
            enable_datadog_logs: merged.enable_datadog_logs.unwrap_or(true),
            capture_lambda_payload: merged.capture_lambda_payload.unwrap_or(false),
            capture_cloud_service_payload: merged.capture_cloud_service_payload.unwrap_or(false),
            env: merged.env,
            service: merged.service,
            version: merged.version,
            tags: merged.tags,
            source_code_integration: merged.source_code_integration.unwrap_or(true),
            enable_cold_start_tracing: merged.enable_cold_start_tracing,
            min_cold_start_trace_duration: merged.min_cold_start_trace_duration,
            cold_start_trace_skip_libs: merged.cold_start_trace_skip_libs,
            enable_profiling: merged.enable_profiling,
            encode_authorizer_context: merged.encode_authorizer_context,
            decode_authorizer_context: merged.decode_authorizer_context,
            apm_flush_deadline: merged.apm_flush_deadline,
            redirect_handler: merged.redirect_handler.unwrap_or(true),
            grant_secret_read_access: merged.grant_secret_read_access.unwrap_or(true),
            llm_obs_enabled,
            llm_obs_ml_app: merged.llm_obs_ml_app,
            llm_obs_agentless_enabled: merged.llm_obs_agentless_enabled,
        };

        Ok(Resolved { props, diagnostics })
    }
}

impl From<DatadogLambdaStrictProps> for DatadogLambdaProps {
    fn from(strict: DatadogLambdaStrictProps) -> Self {
        let (api_key, api_key_secret_arn, api_key_secret, api_kms_key) = match strict.api_key {
            Some(ApiKeySource::Plain(key)) => (Some(key), None, None, None),
            Some(ApiKeySource::SecretArn(arn)) => (None, Some(arn), None, None),
            Some(ApiKeySource::Secret(secret)) => (None, None, Some(secret), None),
            Some(ApiKeySource::KmsEncrypted(key)) => (None, None, None, Some(key)),
            None => (None, None, None, None),
        };
        Self {
            python_layer_version: strict.python_layer.version,
            python_layer_arn: strict.python_layer.arn,
            node_layer_version: strict.node_layer.version,
            node_layer_arn: strict.node_layer.arn,
            java_layer_version: strict.java_layer.version,
            java_layer_arn: strict.java_layer.arn,
            dotnet_layer_version: strict.dotnet_layer.version,
            dotnet_layer_arn: strict.dotnet_layer.arn,
            ruby_layer_version: strict.ruby_layer.version,
            ruby_layer_arn: strict.ruby_layer.arn,
            extension_layer_version: strict.extension_layer.version,
            extension_layer_arn: strict.extension_layer.arn,
            add_layers: Some(strict.add_layers),
            use_layers_from_account: strict.use_layers_from_account,
            forwarder_arn: strict.forwarder_arn,
            create_forwarder_permissions: Some(strict.create_forwarder_permissions),
            flush_metrics_to_logs: Some(strict.flush_metrics_to_logs),
            site: Some(strict.site),
            api_key,
            api_key_secret_arn,
            api_key_secret,
            api_kms_key,
            enable_datadog_tracing: Some(strict.enable_datadog_tracing),
            enable_datadog_asm: None,
            datadog_app_sec_mode: Some(strict.datadog_app_sec_mode),
            enable_merge_xray_traces: Some(strict.enable_merge_xray_traces),
            inject_log_context: Some(strict.inject_log_context),
            log_level: strict.log_level,
            enable_datadog_logs: Some(strict.enable_datadog_logs),
            capture_lambda_payload: Some(strict.capture_lambda_payload),
            capture_cloud_service_payload: Some(strict.capture_cloud_service_payload),
            env: strict.env,
            service: strict.service,
            version: strict.version,
            tags: strict.tags,
            source_code_integration: Some(strict.source_code_integration),
            enable_cold_start_tracing: strict.enable_cold_start_tracing,
            min_cold_start_trace_duration: strict.min_cold_start_trace_duration,
            cold_start_trace_skip_libs: strict.cold_start_trace_skip_libs,
            enable_profiling: strict.enable_profiling,
            encode_authorizer_context: strict.encode_authorizer_context,
            decode_authorizer_context: strict.decode_authorizer_context,
            apm_flush_deadline: strict.apm_flush_deadline,
            redirect_handler: Some(strict.redirect_handler),
            grant_secret_read_access: Some(strict.grant_secret_read_access),
            llm_obs_enabled: Some(strict.llm_obs_enabled),
            llm_obs_ml_app: strict.llm_obs_ml_app,
            llm_obs_agentless_enabled: strict.llm_obs_agentless_enabled,
        }
    }
}
