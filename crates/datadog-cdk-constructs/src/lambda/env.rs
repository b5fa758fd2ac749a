// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Datadog environment variables written onto Lambda functions.

use tracing::debug;

use crate::config::lambda::{DatadogAppSecMode, DatadogLambdaStrictProps};
use crate::constants::lambda_env::{
    APM_FLUSH_DEADLINE, APPSEC_ENABLED, CAPTURE_LAMBDA_PAYLOAD, CLOUD_REQUEST_PAYLOAD_TAGGING,
    CLOUD_RESPONSE_PAYLOAD_TAGGING, COLD_START_TRACE_SKIP_LIB, COLD_START_TRACING,
    DECODE_AUTHORIZER_CONTEXT, ENCODE_AUTHORIZER_CONTEXT, ENV, EXEC_WRAPPER, LLMOBS_AGENTLESS_ENABLED,
    LLMOBS_ENABLED, LLMOBS_ML_APP, LOGS_INJECTION, LOG_LEVEL, MERGE_XRAY_TRACES,
    MIN_COLD_START_DURATION, PROFILING_ENABLED, SERVERLESS_APPSEC_ENABLED,
    SERVERLESS_LOGS_ENABLED, SERVICE, TAGS, TRACE_ENABLED, VERSION,
};
use crate::constants::{DD_WRAPPER, GIT_COMMIT_SHA_TAG, GIT_REPOSITORY_URL_TAG};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::lambda::function::LambdaFunction;
use crate::tags::Tags;

/// Last write wins. Replacing a different value is reported; rewriting the
/// same value is silent so repeated instrumentation stays quiet.
pub fn set_env(
    function: &mut LambdaFunction,
    diagnostics: &mut Diagnostics,
    key: &str,
    value: &str,
) {
    if let Some(previous) = function.add_environment(key, value) {
        if previous != value {
            diagnostics.push(Diagnostic::EnvOverwritten {
                resource: function.name.clone(),
                key: key.to_string(),
                previous,
            });
        }
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Feature toggles every instrumented function receives.
pub fn apply_env_variables(
    function: &mut LambdaFunction,
    props: &DatadogLambdaStrictProps,
    diagnostics: &mut Diagnostics,
) {
    debug!("Setting environment variables on {}", function.name);
    set_env(function, diagnostics, TRACE_ENABLED, bool_str(props.enable_datadog_tracing));
    set_env(function, diagnostics, MERGE_XRAY_TRACES, bool_str(props.enable_merge_xray_traces));
    set_env(function, diagnostics, LOGS_INJECTION, bool_str(props.inject_log_context));
    set_env(function, diagnostics, SERVERLESS_LOGS_ENABLED, bool_str(props.enable_datadog_logs));
    set_env(function, diagnostics, CAPTURE_LAMBDA_PAYLOAD, bool_str(props.capture_lambda_payload));
    if props.capture_cloud_service_payload {
        set_env(function, diagnostics, CLOUD_REQUEST_PAYLOAD_TAGGING, "all");
        set_env(function, diagnostics, CLOUD_RESPONSE_PAYLOAD_TAGGING, "all");
    }
    if let Some(log_level) = &props.log_level {
        set_env(function, diagnostics, LOG_LEVEL, log_level);
    }

    match props.datadog_app_sec_mode {
        DatadogAppSecMode::Off => {}
        DatadogAppSecMode::Extension => {
            set_env(function, diagnostics, SERVERLESS_APPSEC_ENABLED, "true");
            set_env(function, diagnostics, EXEC_WRAPPER, DD_WRAPPER);
        }
        DatadogAppSecMode::Tracer => {
            set_env(function, diagnostics, APPSEC_ENABLED, "true");
        }
        DatadogAppSecMode::On => {
            set_env(function, diagnostics, SERVERLESS_APPSEC_ENABLED, "true");
            set_env(function, diagnostics, APPSEC_ENABLED, "true");
            set_env(function, diagnostics, EXEC_WRAPPER, DD_WRAPPER);
        }
    }
}

/// Unified service tags and fine-grained tracer settings.
///
/// UST values only go into the environment when the extension runs; with the
/// forwarder they are applied as resource tags instead. `DD_TAGS` is written
/// separately by [`set_dd_tags`].
pub fn set_dd_env_variables(
    function: &mut LambdaFunction,
    props: &DatadogLambdaStrictProps,
    diagnostics: &mut Diagnostics,
) {
    if props.uses_extension() {
        if let Some(env) = &props.env {
            set_env(function, diagnostics, ENV, env);
        }
        if let Some(service) = &props.service {
            set_env(function, diagnostics, SERVICE, service);
        }
        if let Some(version) = &props.version {
            set_env(function, diagnostics, VERSION, version);
        }
    }
    if let Some(enabled) = props.enable_cold_start_tracing {
        set_env(function, diagnostics, COLD_START_TRACING, bool_str(enabled));
    }
    if let Some(duration) = props.min_cold_start_trace_duration {
        set_env(function, diagnostics, MIN_COLD_START_DURATION, &duration.to_string());
    }
    if let Some(skip_libs) = &props.cold_start_trace_skip_libs {
        set_env(function, diagnostics, COLD_START_TRACE_SKIP_LIB, skip_libs);
    }
    if let Some(enabled) = props.enable_profiling {
        set_env(function, diagnostics, PROFILING_ENABLED, bool_str(enabled));
    }
    if let Some(enabled) = props.encode_authorizer_context {
        set_env(function, diagnostics, ENCODE_AUTHORIZER_CONTEXT, bool_str(enabled));
    }
    if let Some(enabled) = props.decode_authorizer_context {
        set_env(function, diagnostics, DECODE_AUTHORIZER_CONTEXT, bool_str(enabled));
    }
    if let Some(deadline) = &props.apm_flush_deadline {
        set_env(function, diagnostics, APM_FLUSH_DEADLINE, deadline);
    }
    if props.llm_obs_enabled {
        set_env(function, diagnostics, LLMOBS_ENABLED, "true");
        if let Some(ml_app) = &props.llm_obs_ml_app {
            set_env(function, diagnostics, LLMOBS_ML_APP, ml_app);
        }
        if let Some(agentless) = props.llm_obs_agentless_enabled {
            set_env(function, diagnostics, LLMOBS_AGENTLESS_ENABLED, bool_str(agentless));
        }
    }
}

/// Commit and repository of the deployed source.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitMetadata {
    pub commit_sha: Option<String>,
    pub repository_url: Option<String>,
}

fn merge_git_tags(tags: &mut Tags, git: &GitMetadata) {
    if let Some(sha) = &git.commit_sha {
        tags.set(GIT_COMMIT_SHA_TAG, sha);
    }
    if let Some(url) = &git.repository_url {
        tags.set(GIT_REPOSITORY_URL_TAG, url);
    }
}

fn current_tags(function: &LambdaFunction) -> Tags {
    function
        .environment
        .get(TAGS)
        .map(|value| Tags::from_env_string(value))
        .unwrap_or_default()
}

/// Builds the final `DD_TAGS` in one pass: tags already on the function,
/// then the configured tags when the extension reads them, then git provenance.
///
/// Every source is merged into the existing value, so re-instrumenting a
/// function writes back the value it already carries.
pub fn set_dd_tags(
    function: &mut LambdaFunction,
    props: &DatadogLambdaStrictProps,
    git: Option<&GitMetadata>,
) {
    let mut tags = current_tags(function);
    if props.uses_extension() {
        if let Some(configured) = &props.tags {
            tags.merge(&Tags::from_env_string(configured));
        }
    }
    if let Some(git) = git {
        debug!("Adding source code metadata to {}", function.name);
        merge_git_tags(&mut tags, git);
    }
    if tags.is_empty() {
        return;
    }
    function.add_environment(TAGS, &tags.to_env_string());
}

/// Merges git provenance into `DD_TAGS`, keeping every other tag in place.
pub fn set_git_tags(function: &mut LambdaFunction, git: &GitMetadata) {
    if git.commit_sha.is_none() && git.repository_url.is_none() {
        debug!("No git metadata available for {}", function.name);
        return;
    }
    let mut tags = current_tags(function);
    merge_git_tags(&mut tags, git);
    debug!("Adding source code metadata to {}", function.name);
    function.add_environment(TAGS, &tags.to_env_string());
}
