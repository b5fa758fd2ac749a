// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Step Functions instrumentation: state machine tagging, log forwarding and
//! trace context propagation into task payloads.

pub mod payload;
pub mod state_machine;

use tracing::debug;

use crate::config::step_functions::{DatadogStepFunctionsProps, DatadogStepFunctionsStrictProps};
use crate::config::{Resolve, ValidationOptions};
use crate::constants::{tag_keys, CONSTRUCT_VERSION};
use crate::error::ConstructError;
use crate::forwarder;
use crate::log_group::LogGroup;
use crate::step_functions::state_machine::{
    build_log_group_name, LogLevel, Logging, LoggingConfiguration, StateMachine,
};
use crate::tags::Tags;

pub use payload::{build_lambda_payload, build_task_input, strip_trace_context, Payload};

#[derive(Debug, Clone)]
pub struct DatadogStepFunctions {
    props: DatadogStepFunctionsStrictProps,
    state_machine_arns: Vec<String>,
}

impl DatadogStepFunctions {
    /// Fails with a tag validation error when env, service or version is empty.
    pub fn new(props: &DatadogStepFunctionsProps) -> Result<Self, ConstructError> {
        Self::with_options(props, &ValidationOptions::from_env())
    }

    pub fn with_options(
        props: &DatadogStepFunctionsProps,
        options: &ValidationOptions,
    ) -> Result<Self, ConstructError> {
        let resolved = props.resolve(&DatadogStepFunctionsProps::default(), options)?;
        Ok(Self {
            props: resolved.props,
            state_machine_arns: Vec::new(),
        })
    }

    pub fn props(&self) -> &DatadogStepFunctionsStrictProps {
        &self.props
    }

    /// ARNs of every state machine instrumented so far, in order.
    pub fn state_machines(&self) -> &[String] {
        &self.state_machine_arns
    }

    /// Tags every state machine, forces full execution logging and, when a
    /// forwarder is configured, subscribes the execution log group.
    ///
    /// Fails with [`ConstructError::Config`] before any state machine is
    /// modified when one carries a logging configuration that is only known
    /// at deploy time.
    pub fn add_state_machines(
        &mut self,
        state_machines: &mut [StateMachine],
    ) -> Result<(), ConstructError> {
        for state_machine in state_machines.iter() {
            if let Some(Logging::Unresolved(_)) = &state_machine.logging {
                return Err(ConstructError::config(format!(
                    "loggingConfiguration of {} is an unresolved token. Step Function Instrumentation is not supported.",
                    state_machine.name
                )));
            }
        }
        for state_machine in state_machines.iter_mut() {
            self.instrument(state_machine);
            if !self.state_machine_arns.contains(&state_machine.arn) {
                self.state_machine_arns.push(state_machine.arn.clone());
            }
        }
        Ok(())
    }

    /// Level `ALL` with execution data, logging into the existing destination
    /// or a new `/aws/vendedlogs/states/` group.
    fn logging_configuration(&self, state_machine: &mut StateMachine) -> LoggingConfiguration {
        let config = match state_machine.logging.take() {
            Some(Logging::Configured(config)) => {
                if config.level != LogLevel::All || !config.include_execution_data {
                    debug!(
                        "Setting log level to ALL and including execution data for {}",
                        state_machine.name
                    );
                }
                config
            }
            _ => {
                debug!("No logging configuration on {}, creating one", state_machine.name);
                LoggingConfiguration::default()
            }
        };
        let destination = config.destination.unwrap_or_else(|| {
            LogGroup::new(build_log_group_name(state_machine, self.props.env.as_deref()))
        });
        LoggingConfiguration {
            level: LogLevel::All,
            include_execution_data: true,
            destination: Some(destination),
        }
    }

    fn instrument(&self, state_machine: &mut StateMachine) {
        let props = &self.props;
        debug!("Adding datadog tags to state machine {}", state_machine.name);
        let ust = [
            (tag_keys::ENV, &props.env),
            (tag_keys::SERVICE, &props.service),
            (tag_keys::VERSION, &props.version),
        ];
        for (key, value) in ust {
            if let Some(value) = value {
                state_machine.add_tag(key, value);
            }
        }
        if let Some(tags) = &props.tags {
            for (key, value) in Tags::from_env_string(tags).iter() {
                if !value.is_empty() {
                    state_machine.add_tag(key, value);
                }
            }
        }
        state_machine.add_tag(tag_keys::DD_TRACE_ENABLED, "true");
        state_machine.add_tag(tag_keys::CDK, &format!("v{CONSTRUCT_VERSION}"));

        let mut logging = self.logging_configuration(state_machine);
        match (&props.forwarder_arn, logging.destination.as_mut()) {
            (Some(forwarder_arn), Some(log_group)) => {
                forwarder::subscribe(log_group, &state_machine.arn, forwarder_arn, false);
            }
            _ => debug!(
                "Forwarder ARN not provided, no log group subscription added for {}",
                state_machine.name
            ),
        }
        state_machine.logging = Some(Logging::Configured(logging));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARDER: &str = "arn:aws:lambda:us-east-1:123456789012:function:forwarder";

    fn instrumenter(props: DatadogStepFunctionsProps) -> DatadogStepFunctions {
        DatadogStepFunctions::with_options(&props, &ValidationOptions::default()).unwrap()
    }

    #[test]
    fn test_tags_state_machines() {
        let mut datadog = instrumenter(DatadogStepFunctionsProps {
            env: Some("prod".to_string()),
            service: Some("orders".to_string()),
            tags: Some("team:payments".to_string()),
            ..Default::default()
        });
        let mut machines = vec![StateMachine::new("orders", "123456789012", "us-east-1")];
        datadog.add_state_machines(&mut machines).unwrap();

        let tags = &machines[0].tags;
        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["service"], "orders");
        assert!(!tags.contains_key("version"));
        assert_eq!(tags["team"], "payments");
        assert_eq!(tags["DD_TRACE_ENABLED"], "true");
        assert_eq!(tags["dd_cdk_construct"], format!("v{CONSTRUCT_VERSION}"));
        let log_group = machines[0].log_group().unwrap();
        assert_eq!(log_group.name, "/aws/vendedlogs/states/orders-Logs-prod");
        assert!(log_group.subscription_filters.is_empty());
        assert_eq!(datadog.state_machines(), [machines[0].arn.clone()]);
    }

    #[test]
    fn test_forwarder_subscribes_log_group() {
        let mut datadog = instrumenter(DatadogStepFunctionsProps {
            forwarder_arn: Some(FORWARDER.to_string()),
            ..Default::default()
        });
        let mut machines = vec![StateMachine::new("orders", "123456789012", "us-east-1")];
        datadog.add_state_machines(&mut machines).unwrap();
        datadog.add_state_machines(&mut machines).unwrap();

        let log_group = machines[0].log_group().unwrap();
        assert_eq!(log_group.subscription_filters.len(), 1);
        assert_eq!(log_group.subscription_filters[0].destination_arn, FORWARDER);
        assert_eq!(datadog.state_machines().len(), 1);
    }

    #[test]
    fn test_logging_created_when_missing() {
        let mut datadog = instrumenter(DatadogStepFunctionsProps::default());
        let mut machines = vec![StateMachine::new("orders", "123456789012", "us-east-1")
            .with_path("Stack/orders")];
        datadog.add_state_machines(&mut machines).unwrap();
        let Some(Logging::Configured(config)) = &machines[0].logging else {
            panic!("logging should be configured");
        };
        assert_eq!(config.level, LogLevel::All);
        assert!(config.include_execution_data);
        assert_eq!(
            config.destination.as_ref().unwrap().name,
            "/aws/vendedlogs/states/Stack-orders-Logs"
        );
    }

    #[test]
    fn test_existing_logging_forced_to_all() {
        let mut datadog = instrumenter(DatadogStepFunctionsProps {
            env: Some("dev".to_string()),
            forwarder_arn: Some(FORWARDER.to_string()),
            ..Default::default()
        });
        let mut machines = vec![StateMachine::new("orders", "123456789012", "us-east-1")
            .with_logging(Logging::Configured(LoggingConfiguration {
                level: LogLevel::Error,
                include_execution_data: false,
                destination: Some(LogGroup::new("/custom/orders")),
            }))];
        datadog.add_state_machines(&mut machines).unwrap();
        let Some(Logging::Configured(config)) = &machines[0].logging else {
            panic!("logging should be configured");
        };
        assert_eq!(config.level, LogLevel::All);
        assert!(config.include_execution_data);
        let destination = config.destination.as_ref().unwrap();
        assert_eq!(destination.name, "/custom/orders");
        assert_eq!(destination.subscription_filters.len(), 1);
    }

    #[test]
    fn test_unresolved_logging_rejected_before_changes() {
        let mut datadog = instrumenter(DatadogStepFunctionsProps::default());
        let mut machines = vec![
            StateMachine::new("first", "123456789012", "us-east-1"),
            StateMachine::new("second", "123456789012", "us-east-1")
                .with_logging(Logging::Unresolved("${Token[TOKEN.12]}".to_string())),
        ];
        let err = datadog.add_state_machines(&mut machines).unwrap_err();
        assert!(matches!(err, ConstructError::Config(_)));
        assert!(err.to_string().contains("unresolved token"));
        assert!(machines[0].tags.is_empty());
        assert!(machines[0].logging.is_none());
        assert!(datadog.state_machines().is_empty());
    }

    #[test]
    fn test_empty_service_rejected() {
        let err = DatadogStepFunctionsProps {
            service: Some(String::new()),
            ..Default::default()
        }
        .resolve(&DatadogStepFunctionsProps::default(), &ValidationOptions::default())
        .unwrap_err();
        assert_eq!(
            err,
            ConstructError::TagValidation {
                key: "service".to_string()
            }
        );
    }
}
