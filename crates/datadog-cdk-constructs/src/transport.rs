// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! How telemetry from an instrumented function reaches Datadog.

use tracing::debug;

use crate::config::api_key::ApiKeySource;
use crate::config::lambda::DatadogLambdaStrictProps;
use crate::constants::lambda_env::{API_KEY, API_KEY_SECRET_ARN, FLUSH_TO_LOG, KMS_API_KEY, SITE};
use crate::constants::DEFAULT_SITE;
use crate::diagnostics::Diagnostics;
use crate::error::ConstructError;
use crate::lambda::env::set_env;
use crate::lambda::function::LambdaFunction;
use crate::lambda::layer::RuntimeFamily;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transport {
    pub flush_metrics_to_logs: bool,
    pub site: String,
    pub api_key: Option<ApiKeySource>,
    pub extension_layer_version: Option<u32>,
    pub extension_layer_arn: Option<String>,
}

impl Transport {
    pub fn new(
        flush_metrics_to_logs: Option<bool>,
        site: Option<String>,
        api_key: Option<ApiKeySource>,
        extension_layer_version: Option<u32>,
        extension_layer_arn: Option<String>,
    ) -> Self {
        let mut flush_metrics_to_logs = flush_metrics_to_logs.unwrap_or_else(|| {
            debug!("No value provided for flushMetricsToLogs, defaulting to true");
            true
        });
        if extension_layer_version.is_some() || extension_layer_arn.is_some() {
            debug!("Using extension layer, metrics will be submitted via the extension");
            flush_metrics_to_logs = false;
        }
        let site = site.unwrap_or_else(|| {
            debug!("No value provided for site, defaulting to {}", DEFAULT_SITE);
            DEFAULT_SITE.to_string()
        });
        Self {
            flush_metrics_to_logs,
            site,
            api_key,
            extension_layer_version,
            extension_layer_arn,
        }
    }

    pub fn uses_extension(&self) -> bool {
        self.extension_layer_version.is_some() || self.extension_layer_arn.is_some()
    }

    /// Rejects key sources the function's runtime cannot read.
    ///
    /// Node functions sending metrics synchronously without the extension
    /// cannot fetch a key from Secrets Manager.
    pub fn validate_for(&self, function: &LambdaFunction) -> Result<(), ConstructError> {
        let is_node = RuntimeFamily::from_runtime(&function.runtime) == RuntimeFamily::Node;
        let uses_secret = self
            .api_key
            .as_ref()
            .is_some_and(|key| key.secret_arn().is_some());
        if is_node && uses_secret && !self.flush_metrics_to_logs && !self.uses_extension() {
            return Err(ConstructError::config(format!(
                "`apiKeySecretArn` is not supported for Node runtimes ({}) when using Synchronous Metrics. Use either `apiKey` or `apiKmsKey`.",
                function.name
            )));
        }
        Ok(())
    }

    pub fn apply_env_vars(&self, function: &mut LambdaFunction, diagnostics: &mut Diagnostics) {
        debug!("Setting Datadog transport environment variables...");
        let flush = if self.flush_metrics_to_logs { "true" } else { "false" };
        set_env(function, diagnostics, FLUSH_TO_LOG, flush);
        if !self.flush_metrics_to_logs {
            set_env(function, diagnostics, SITE, &self.site);
        }
        match &self.api_key {
            Some(ApiKeySource::Plain(key)) => set_env(function, diagnostics, API_KEY, key),
            Some(ApiKeySource::KmsEncrypted(key)) => {
                set_env(function, diagnostics, KMS_API_KEY, key);
            }
            Some(source @ (ApiKeySource::SecretArn(_) | ApiKeySource::Secret(_))) => {
                if let Some(arn) = source.secret_arn() {
                    set_env(function, diagnostics, API_KEY_SECRET_ARN, arn);
                }
            }
            None => {}
        }
    }
}

impl From<&DatadogLambdaStrictProps> for Transport {
    fn from(props: &DatadogLambdaStrictProps) -> Self {
        Transport::new(
            Some(props.flush_metrics_to_logs),
            Some(props.site.clone()),
            props.api_key.clone(),
            props.extension_layer.version,
            props.extension_layer.arn.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::api_key::SecretRef;

    fn function(runtime: &str) -> LambdaFunction {
        LambdaFunction::new("fn", "123456789012", "us-east-1", runtime, "index.handler")
    }

    #[test]
    fn test_defaults() {
        let transport = Transport::new(None, None, None, None, None);
        assert!(transport.flush_metrics_to_logs);
        assert_eq!(transport.site, "datadoghq.com");
    }

    #[test]
    fn test_extension_disables_flush_to_logs() {
        let transport = Transport::new(Some(true), None, None, Some(65), None);
        assert!(!transport.flush_metrics_to_logs);
    }

    #[test]
    fn test_flush_to_logs_omits_site_and_key() {
        let transport = Transport::new(None, Some("datadoghq.eu".to_string()), None, None, None);
        let mut function = function("python3.12");
        transport.apply_env_vars(&mut function, &mut Diagnostics::new());
        assert_eq!(function.environment[FLUSH_TO_LOG], "true");
        assert!(!function.environment.contains_key(SITE));
        assert!(!function.environment.contains_key(API_KEY));
    }

    #[test]
    fn test_synchronous_metrics_project_site_and_key() {
        let transport = Transport::new(
            Some(false),
            Some("datadoghq.eu".to_string()),
            Some(ApiKeySource::KmsEncrypted("AQICAHh".to_string())),
            None,
            None,
        );
        let mut function = function("python3.12");
        transport.apply_env_vars(&mut function, &mut Diagnostics::new());
        assert_eq!(function.environment[FLUSH_TO_LOG], "false");
        assert_eq!(function.environment[SITE], "datadoghq.eu");
        assert_eq!(function.environment[KMS_API_KEY], "AQICAHh");
    }

    #[test]
    fn test_secret_reference_projects_arn() {
        let transport = Transport::new(
            None,
            None,
            Some(ApiKeySource::Secret(SecretRef::new(
                "arn:aws:secretsmanager:us-east-1:1:secret:dd",
            ))),
            Some(65),
            None,
        );
        let mut function = function("python3.12");
        transport.apply_env_vars(&mut function, &mut Diagnostics::new());
        assert_eq!(
            function.environment[API_KEY_SECRET_ARN],
            "arn:aws:secretsmanager:us-east-1:1:secret:dd"
        );
    }

    #[test]
    fn test_node_secret_arn_with_synchronous_metrics_rejected() {
        let transport = Transport::new(
            Some(false),
            None,
            Some(ApiKeySource::SecretArn(
                "arn:aws:secretsmanager:us-east-1:1:secret:dd".to_string(),
            )),
            None,
            None,
        );
        assert!(transport.validate_for(&function("nodejs20.x")).is_err());
        assert!(transport.validate_for(&function("python3.12")).is_ok());

        let with_extension = Transport {
            extension_layer_version: Some(65),
            ..transport
        };
        assert!(with_extension.validate_for(&function("nodejs20.x")).is_ok());
    }
}
