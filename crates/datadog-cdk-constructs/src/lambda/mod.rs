// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Lambda instrumentation.
//!
//! [`DatadogLambda`] owns the functions it instruments so that git metadata
//! resolved later (for example once CI knows the commit) can still be written
//! back onto them.

pub mod env;
pub mod function;
pub mod layer;
pub mod redirect;

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::lambda::{DatadogLambdaProps, DatadogLambdaStrictProps};
use crate::config::{Resolve, ValidationOptions};
use crate::constants::lambda_env::TAGS;
use crate::constants::tag_keys;
use crate::constants::{CONSTRUCT_VERSION, GIT_SHA_OVERRIDE_CONTEXT_KEY};
use crate::diagnostics::Diagnostics;
use crate::error::ConstructError;
use crate::forwarder;
use crate::lambda::env::{
    apply_env_variables, set_dd_env_variables, set_dd_tags, set_git_tags, GitMetadata,
};
use crate::lambda::function::LambdaFunction;
use crate::lambda::layer::{apply_extension_layer, apply_layers, LayerOutcome};
use crate::lambda::redirect::redirect_handler;
use crate::log_group::LogGroup;
use crate::tags::Tags;
use crate::transport::Transport;

#[derive(Debug, Clone)]
pub struct DatadogLambda {
    props: DatadogLambdaStrictProps,
    transport: Transport,
    git: GitMetadata,
    git_commit_sha_override: Option<String>,
    git_repo_url_override: Option<String>,
    lambdas: Vec<LambdaFunction>,
    diagnostics: Diagnostics,
}

impl DatadogLambda {
    /// Resolves and validates `props` against the library defaults.
    pub fn new(props: &DatadogLambdaProps) -> Result<Self, ConstructError> {
        Self::with_defaults(props, &DatadogLambdaProps::default(), &ValidationOptions::from_env())
    }

    pub fn with_defaults(
        props: &DatadogLambdaProps,
        defaults: &DatadogLambdaProps,
        options: &ValidationOptions,
    ) -> Result<Self, ConstructError> {
        debug!("Validating props...");
        let resolved = props.resolve(defaults, options)?;
        let transport = Transport::from(&resolved.props);
        Ok(Self {
            props: resolved.props,
            transport,
            git: GitMetadata::default(),
            git_commit_sha_override: None,
            git_repo_url_override: None,
            lambdas: Vec::new(),
            diagnostics: resolved.diagnostics,
        })
    }

    /// Applies deployment context values, such as a commit SHA override.
    pub fn apply_context(&mut self, context: &BTreeMap<String, String>) {
        if let Some(sha) = context.get(GIT_SHA_OVERRIDE_CONTEXT_KEY) {
            self.override_git_metadata(sha, None);
        }
    }

    /// Git provenance detected for the deployed source.
    pub fn set_git_metadata(&mut self, git: GitMetadata) {
        self.git = git;
    }

    pub fn props(&self) -> &DatadogLambdaStrictProps {
        &self.props
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn lambdas(&self) -> &[LambdaFunction] {
        &self.lambdas
    }

    pub fn lambda(&self, name: &str) -> Option<&LambdaFunction> {
        self.lambdas.iter().find(|f| f.name == name)
    }

    pub fn into_lambdas(self) -> Vec<LambdaFunction> {
        self.lambdas
    }

    /// Every diagnostic recorded since construction.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Instruments `functions` and takes ownership of them.
    ///
    /// Every function is validated before any is modified. A function whose
    /// runtime library layer has no version configured is kept but left
    /// uninstrumented. Returns the diagnostics raised by this call.
    pub fn add_lambda_functions(
        &mut self,
        functions: Vec<LambdaFunction>,
    ) -> Result<Diagnostics, ConstructError> {
        for function in &functions {
            self.transport.validate_for(function)?;
        }

        let mut diagnostics = Diagnostics::new();
        for mut function in functions {
            self.instrument(&mut function, &mut diagnostics);
            match self.lambdas.iter_mut().find(|f| f.name == function.name) {
                Some(existing) => *existing = function,
                None => self.lambdas.push(function),
            }
        }
        self.diagnostics.extend(diagnostics.clone());
        Ok(diagnostics)
    }

    fn instrument(&self, function: &mut LambdaFunction, diagnostics: &mut Diagnostics) {
        let props = &self.props;

        if props.grant_secret_read_access {
            if let Some(secret_arn) = props.api_key.as_ref().and_then(|key| key.secret_arn()) {
                debug!("Granting read access to the provided Secret ARN for {}", function.name);
                function.grant_secret_read(secret_arn);
            }
        }

        if props.add_layers {
            match apply_layers(function, props) {
                LayerOutcome::Applied => {}
                LayerOutcome::Skipped(diagnostic) => diagnostics.push(diagnostic),
                LayerOutcome::Missing(diagnostic) => {
                    warn!(
                        "Failed to apply layers to the Lambda function {}. Skipping instrumenting it.",
                        function.name
                    );
                    diagnostics.push(diagnostic);
                    return;
                }
            }
        }

        if props.uses_extension() {
            apply_extension_layer(function, props);
        }

        if props.redirect_handler {
            redirect_handler(function, props.add_layers, diagnostics);
        }

        match &props.forwarder_arn {
            Some(_) if props.uses_extension() => {
                debug!("Skipping adding subscriptions to the lambda log groups since the extension is enabled");
            }
            Some(forwarder_arn) => {
                debug!("Adding log subscriptions using provided Forwarder ARN: {}", forwarder_arn);
                let source = function.arn.clone();
                forwarder::subscribe(
                    function.log_group_mut(),
                    &source,
                    forwarder_arn,
                    props.create_forwarder_permissions,
                );
            }
            None => debug!("Forwarder ARN not provided, no log group subscriptions will be added"),
        }

        debug!("Adding CDK Construct version tag: {}", CONSTRUCT_VERSION);
        function.add_tag(tag_keys::CDK, &format!("v{CONSTRUCT_VERSION}"));
        apply_env_variables(function, props, diagnostics);
        set_dd_env_variables(function, props, diagnostics);
        if props.forwarder_arn.is_some() {
            set_resource_tags(function, props);
        }
        self.transport.apply_env_vars(function, diagnostics);

        let git = props.source_code_integration.then(|| self.effective_git());
        set_dd_tags(function, props, git.as_ref());
    }

    fn effective_git(&self) -> GitMetadata {
        GitMetadata {
            commit_sha: self
                .git_commit_sha_override
                .clone()
                .or_else(|| self.git.commit_sha.clone()),
            repository_url: self
                .git_repo_url_override
                .clone()
                .or_else(|| self.git.repository_url.clone()),
        }
    }

    /// Adds source code metadata to already-owned functions.
    pub fn add_git_commit_metadata(&mut self) {
        let git = self.effective_git();
        for function in &mut self.lambdas {
            set_git_tags(function, &git);
        }
    }

    /// Overrides the commit SHA and, optionally, the repository URL, including
    /// on functions that were instrumented before this call.
    pub fn override_git_metadata(&mut self, git_commit_sha: &str, git_repo_url: Option<&str>) {
        if !git_commit_sha.is_empty() {
            self.git_commit_sha_override = Some(git_commit_sha.to_string());
        }
        if let Some(url) = git_repo_url.filter(|url| !url.is_empty()) {
            self.git_repo_url_override = Some(url.to_string());
        }

        let git = GitMetadata {
            commit_sha: (!git_commit_sha.is_empty()).then(|| git_commit_sha.to_string()),
            repository_url: git_repo_url
                .filter(|url| !url.is_empty())
                .map(ToString::to_string),
        };
        for function in &mut self.lambdas {
            if function.environment.contains_key(TAGS) {
                set_git_tags(function, &git);
            }
        }
    }

    /// Subscribes log groups that are not owned by a Lambda function.
    ///
    /// Fails with [`ConstructError::ForwarderConfig`] when log groups are given
    /// but no forwarder ARN was configured.
    pub fn add_forwarder_to_non_lambda_log_groups(
        &self,
        log_groups: &mut [LogGroup],
    ) -> Result<(), ConstructError> {
        if log_groups.is_empty() {
            return Ok(());
        }
        let Some(forwarder_arn) = &self.props.forwarder_arn else {
            return Err(ConstructError::ForwarderConfig(format!(
                "Forwarding {} non Lambda log groups requires `forwarderArn`",
                log_groups.len()
            )));
        };
        forwarder::add_forwarder_to_log_groups(
            log_groups,
            forwarder_arn,
            self.props.create_forwarder_permissions,
        );
        Ok(())
    }
}

/// Unified service tags plus the custom `tags` string as resource tags.
fn set_resource_tags(function: &mut LambdaFunction, props: &DatadogLambdaStrictProps) {
    debug!("Adding datadog tags");
    if let Some(env) = &props.env {
        function.add_tag(tag_keys::ENV, env);
    }
    if let Some(service) = &props.service {
        function.add_tag(tag_keys::SERVICE, service);
    }
    if let Some(version) = &props.version {
        function.add_tag(tag_keys::VERSION, version);
    }
    if let Some(tags) = &props.tags {
        for (key, value) in Tags::from_env_string(tags).iter() {
            if !value.is_empty() {
                function.add_tag(key, value);
            }
        }
    }
}

/// Earlier name of [`DatadogLambda`], kept so existing callers continue to work.
#[deprecated(note = "use `DatadogLambda` instead")]
#[derive(Debug, Clone)]
pub struct Datadog {
    inner: DatadogLambda,
}

#[allow(deprecated)]
impl Datadog {
    pub fn new(props: &DatadogLambdaProps) -> Result<Self, ConstructError> {
        Ok(Self {
            inner: DatadogLambda::new(props)?,
        })
    }

    pub fn add_lambda_functions(
        &mut self,
        functions: Vec<LambdaFunction>,
    ) -> Result<Diagnostics, ConstructError> {
        self.inner.add_lambda_functions(functions)
    }

    pub fn override_git_metadata(&mut self, git_commit_sha: &str, git_repo_url: Option<&str>) {
        self.inner.override_git_metadata(git_commit_sha, git_repo_url);
    }

    pub fn add_git_commit_metadata(&mut self) {
        self.inner.add_git_commit_metadata();
    }

    pub fn add_forwarder_to_non_lambda_log_groups(
        &self,
        log_groups: &mut [LogGroup],
    ) -> Result<(), ConstructError> {
        self.inner.add_forwarder_to_non_lambda_log_groups(log_groups)
    }

    pub fn into_inner(self) -> DatadogLambda {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::lambda_env::{
        API_KEY, FLUSH_TO_LOG, LAMBDA_HANDLER, SITE, TRACE_ENABLED,
    };
    use crate::diagnostics::Diagnostic;
    use serial_test::serial;

    const FORWARDER: &str = "arn:aws:lambda:us-east-1:123456789012:function:forwarder";

    fn instrumenter(props: DatadogLambdaProps) -> DatadogLambda {
        DatadogLambda::with_defaults(
            &props,
            &DatadogLambdaProps::default(),
            &ValidationOptions::default(),
        )
        .unwrap()
    }

    fn python(name: &str) -> LambdaFunction {
        LambdaFunction::new(name, "123456789012", "us-east-1", "python3.12", "app.handler")
    }

    #[test]
    fn test_full_python_instrumentation() {
        let mut datadog = instrumenter(DatadogLambdaProps {
            python_layer_version: Some(100),
            extension_layer_version: Some(65),
            api_key: Some("1234".to_string()),
            env: Some("prod".to_string()),
            ..Default::default()
        });
        let diagnostics = datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        assert!(diagnostics.is_empty());

        let function = datadog.lambda("fn").unwrap();
        assert_eq!(function.layers.len(), 2);
        assert_eq!(
            function.layers[0].arn,
            "arn:aws:lambda:us-east-1:464622532012:layer:Datadog-Python312:100"
        );
        assert_eq!(
            function.layers[1].arn,
            "arn:aws:lambda:us-east-1:464622532012:layer:Datadog-Extension:65"
        );
        assert_eq!(function.handler, "datadog_lambda.handler.handler");
        assert_eq!(function.environment[LAMBDA_HANDLER], "app.handler");
        assert_eq!(function.environment[FLUSH_TO_LOG], "false");
        assert_eq!(function.environment[SITE], "datadoghq.com");
        assert_eq!(function.environment[API_KEY], "1234");
        assert_eq!(function.environment["DD_ENV"], "prod");
        assert_eq!(
            function.tags[tag_keys::CDK],
            format!("v{}", CONSTRUCT_VERSION)
        );
    }

    #[test]
    fn test_unsupported_runtime_still_gets_env() {
        let mut datadog = instrumenter(DatadogLambdaProps::default());
        let diagnostics = datadog
            .add_lambda_functions(vec![LambdaFunction::new(
                "go", "123456789012", "us-east-1", "go1.x", "main",
            )])
            .unwrap();
        assert!(matches!(
            diagnostics.iter().next(),
            Some(Diagnostic::UnsupportedRuntime { .. })
        ));
        let function = datadog.lambda("go").unwrap();
        assert!(function.layers.is_empty());
        assert_eq!(function.environment[TRACE_ENABLED], "true");
        assert_eq!(function.environment[FLUSH_TO_LOG], "true");
    }

    #[test]
    fn test_missing_layer_version_skips_function() {
        let mut datadog = instrumenter(DatadogLambdaProps::default());
        let diagnostics = datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        assert_eq!(diagnostics.len(), 1);
        let function = datadog.lambda("fn").unwrap();
        assert!(function.environment.is_empty());
        assert_eq!(function.handler, "app.handler");
    }

    #[test]
    fn test_forwarder_subscription_and_resource_tags() {
        let mut datadog = instrumenter(DatadogLambdaProps {
            python_layer_version: Some(100),
            forwarder_arn: Some(FORWARDER.to_string()),
            service: Some("api".to_string()),
            tags: Some("team:serverless,tier:1".to_string()),
            ..Default::default()
        });
        datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        let function = datadog.lambda("fn").unwrap();
        let log_group = function.log_group.as_ref().unwrap();
        assert_eq!(log_group.subscription_filters.len(), 1);
        assert_eq!(log_group.subscription_filters[0].destination_arn, FORWARDER);
        assert_eq!(function.tags["service"], "api");
        assert_eq!(function.tags["team"], "serverless");
        assert_eq!(function.tags["tier"], "1");
    }

    #[test]
    fn test_extension_skips_forwarder_subscription() {
        let mut datadog = instrumenter(DatadogLambdaProps {
            python_layer_version: Some(100),
            extension_layer_version: Some(65),
            api_key: Some("1234".to_string()),
            forwarder_arn: Some(FORWARDER.to_string()),
            ..Default::default()
        });
        datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        assert!(datadog.lambda("fn").unwrap().log_group.is_none());
    }

    #[test]
    fn test_instrumenting_twice_is_idempotent() {
        let mut datadog = instrumenter(DatadogLambdaProps {
            python_layer_version: Some(100),
            ..Default::default()
        });
        datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        let first = datadog.lambda("fn").unwrap().clone();
        let diagnostics = datadog.add_lambda_functions(vec![first.clone()]).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(datadog.lambdas().len(), 1);
        assert_eq!(datadog.lambda("fn").unwrap(), &first);
    }

    #[test]
    fn test_reinstrument_with_tags_and_git_is_quiet() {
        let mut datadog = instrumenter(DatadogLambdaProps {
            python_layer_version: Some(100),
            extension_layer_version: Some(65),
            api_key: Some("1234".to_string()),
            tags: Some("production,team:a".to_string()),
            ..Default::default()
        });
        datadog.set_git_metadata(GitMetadata {
            commit_sha: Some("1111".to_string()),
            repository_url: None,
        });
        datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        let once = datadog.lambda("fn").unwrap().clone();
        assert_eq!(
            once.environment[TAGS],
            "production,team:a,git.commit.sha:1111"
        );

        let diagnostics = datadog.add_lambda_functions(vec![once.clone()]).unwrap();
        assert!(!diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::EnvOverwritten { .. })));
        assert_eq!(datadog.lambda("fn").unwrap().environment, once.environment);

        datadog.override_git_metadata("2222", None);
        assert_eq!(
            datadog.lambda("fn").unwrap().environment[TAGS],
            "production,team:a,git.commit.sha:2222"
        );
    }

    #[test]
    fn test_validation_is_atomic() {
        let mut datadog = instrumenter(DatadogLambdaProps {
            flush_metrics_to_logs: Some(false),
            api_key_secret_arn: Some("arn:aws:secretsmanager:us-east-1:1:secret:dd".to_string()),
            python_layer_version: Some(100),
            node_layer_version: Some(110),
            ..Default::default()
        });
        let err = datadog
            .add_lambda_functions(vec![
                python("py"),
                LambdaFunction::new("node", "123456789012", "us-east-1", "nodejs20.x", "index.handler"),
            ])
            .unwrap_err();
        assert!(matches!(err, ConstructError::Config(_)));
        assert!(datadog.lambdas().is_empty());
    }

    #[test]
    fn test_secret_read_granted() {
        let arn = "arn:aws:secretsmanager:us-east-1:1:secret:dd";
        let mut datadog = instrumenter(DatadogLambdaProps {
            python_layer_version: Some(100),
            api_key_secret_arn: Some(arn.to_string()),
            ..Default::default()
        });
        datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        assert_eq!(datadog.lambda("fn").unwrap().secret_read_grants, vec![arn]);
    }

    #[test]
    fn test_override_git_metadata_after_instrumentation() {
        let mut datadog = instrumenter(DatadogLambdaProps {
            python_layer_version: Some(100),
            ..Default::default()
        });
        datadog.set_git_metadata(GitMetadata {
            commit_sha: Some("1111".to_string()),
            repository_url: Some("https://github.com/DataDog/app".to_string()),
        });
        datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        assert_eq!(
            datadog.lambda("fn").unwrap().environment[TAGS],
            "git.commit.sha:1111,git.repository_url:https://github.com/DataDog/app"
        );

        datadog.override_git_metadata("2222", None);
        assert_eq!(
            datadog.lambda("fn").unwrap().environment[TAGS],
            "git.commit.sha:2222,git.repository_url:https://github.com/DataDog/app"
        );

        datadog.add_lambda_functions(vec![python("other")]).unwrap();
        assert!(datadog.lambda("other").unwrap().environment[TAGS].contains("git.commit.sha:2222"));
    }

    #[test]
    fn test_context_override() {
        let mut datadog = instrumenter(DatadogLambdaProps {
            python_layer_version: Some(100),
            ..Default::default()
        });
        datadog.apply_context(&BTreeMap::from([(
            GIT_SHA_OVERRIDE_CONTEXT_KEY.to_string(),
            "abcd".to_string(),
        )]));
        datadog.add_lambda_functions(vec![python("fn")]).unwrap();
        assert_eq!(
            datadog.lambda("fn").unwrap().environment[TAGS],
            "git.commit.sha:abcd"
        );
    }

    #[test]
    fn test_non_lambda_log_groups() {
        let datadog = instrumenter(DatadogLambdaProps {
            forwarder_arn: Some(FORWARDER.to_string()),
            ..Default::default()
        });
        let mut groups = vec![LogGroup::new("/aws/apigateway/api")];
        datadog.add_forwarder_to_non_lambda_log_groups(&mut groups).unwrap();
        assert_eq!(groups[0].subscription_filters.len(), 1);

        let without = instrumenter(DatadogLambdaProps::default());
        let mut groups = vec![LogGroup::new("/aws/apigateway/api")];
        let err = without
            .add_forwarder_to_non_lambda_log_groups(&mut groups)
            .unwrap_err();
        assert!(matches!(err, ConstructError::ForwarderConfig(_)));
        assert!(groups[0].subscription_filters.is_empty());
        assert!(without.add_forwarder_to_non_lambda_log_groups(&mut []).is_ok());
    }

    #[test]
    #[serial]
    #[allow(deprecated)]
    fn test_legacy_facade_delegates() {
        std::env::remove_var(crate::constants::BYPASS_SITE_VALIDATION_ENV_VAR);
        let mut legacy = Datadog::new(&DatadogLambdaProps {
            python_layer_version: Some(100),
            ..Default::default()
        })
        .unwrap();
        legacy.add_lambda_functions(vec![python("fn")]).unwrap();
        let inner = legacy.into_inner();
        assert_eq!(inner.lambda("fn").unwrap().handler, "datadog_lambda.handler.handler");
    }
}
