// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Stack description files and their synthesis into instrumented definitions.
//!
//! A stack file is YAML or JSON, chosen by extension. Values may be overridden
//! with `DD_CDK_` prefixed environment variables, using `__` to reach nested
//! keys (`DD_CDK_LAMBDA__PROPS__ENV=prod`).

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use datadog_cdk_constructs::apigateway::with_request_parameters;
use datadog_cdk_constructs::ecs::container::ContainerDefinitionOptions;
use datadog_cdk_constructs::ecs::task_definition::{FargateTaskDefinitionProps, TaskDefinition};
use datadog_cdk_constructs::lambda::env::GitMetadata;
use datadog_cdk_constructs::lambda::function::{Architecture, LambdaFunction};
use datadog_cdk_constructs::log_group::LogGroup;
use datadog_cdk_constructs::step_functions::state_machine::{Logging, StateMachine};
use datadog_cdk_constructs::step_functions::{build_lambda_payload, build_task_input, Payload};
use datadog_cdk_constructs::{
    DatadogEcsFargate, DatadogEcsFargateProps, DatadogLambda, DatadogLambdaProps,
    DatadogStepFunctions, DatadogStepFunctionsProps, Diagnostics, ValidationOptions,
};
use figment::providers::{Env, Format, Json, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const ENV_PREFIX: &str = "DD_CDK_";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackFile {
    /// Account owning resources declared without an ARN.
    pub account: Option<String>,
    /// Deployment context values, keyed as the CDK context would key them.
    pub context: BTreeMap<String, String>,
    /// Skips repository detection when present.
    pub git: Option<GitMetadata>,
    pub lambda: Option<LambdaStack>,
    pub ecs: Option<EcsStack>,
    pub step_functions: Option<StepFunctionsStack>,
    pub api_gateway: Option<ApiGatewayStack>,
}

/// Account of a resource: taken from its ARN, else the declared account.
fn owning_account<'a>(
    name: &str,
    arn: Option<&'a str>,
    account: Option<&'a str>,
) -> anyhow::Result<&'a str> {
    match arn {
        Some(arn) => arn
            .split(':')
            .nth(4)
            .filter(|account| !account.is_empty())
            .with_context(|| format!("`arn` of {name} has no account: {arn}")),
        None => account.with_context(|| {
            format!("{name} needs an `arn` or an `account`, set on the resource or the stack")
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LambdaStack {
    pub props: DatadogLambdaProps,
    pub functions: Vec<FunctionSpec>,
    /// Names of log groups not owned by a function that should be forwarded.
    pub log_groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    pub name: String,
    pub region: String,
    pub runtime: String,
    pub handler: String,
    #[serde(default)]
    pub architecture: Architecture,
    pub arn: Option<String>,
    pub account: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl FunctionSpec {
    fn into_function(self, stack_account: Option<&str>) -> anyhow::Result<LambdaFunction> {
        let account = owning_account(
            &self.name,
            self.arn.as_deref(),
            self.account.as_deref().or(stack_account),
        )?;
        let mut function = LambdaFunction::new(
            self.name.as_str(),
            account,
            self.region.as_str(),
            self.runtime.as_str(),
            self.handler.as_str(),
        )
        .with_architecture(self.architecture);
        if let Some(arn) = &self.arn {
            function = function.with_arn(arn.as_str());
        }
        for (key, value) in &self.environment {
            function.add_environment(key, value);
        }
        Ok(function)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EcsStack {
    /// Construct-level props shared by every task definition.
    pub props: DatadogEcsFargateProps,
    pub task_definitions: Vec<TaskDefinitionSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinitionSpec {
    pub id: String,
    #[serde(default)]
    pub props: FargateTaskDefinitionProps,
    #[serde(default)]
    pub datadog_props: DatadogEcsFargateProps,
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub id: String,
    pub options: ContainerDefinitionOptions,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StepFunctionsStack {
    pub props: DatadogStepFunctionsProps,
    pub state_machines: Vec<StateMachineSpec>,
    pub task_payloads: Vec<TaskPayloadSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMachineSpec {
    pub name: String,
    pub region: String,
    pub arn: Option<String>,
    pub account: Option<String>,
    /// Construct path used to name the execution log group.
    pub path: Option<String>,
    pub logging: Option<Logging>,
}

impl StateMachineSpec {
    fn into_state_machine(self, stack_account: Option<&str>) -> anyhow::Result<StateMachine> {
        let account = owning_account(
            &self.name,
            self.arn.as_deref(),
            self.account.as_deref().or(stack_account),
        )?;
        let mut state_machine = StateMachine::new(&self.name, account, &self.region);
        if let Some(arn) = &self.arn {
            state_machine = state_machine.with_arn(arn.as_str());
        }
        if let Some(path) = self.path {
            state_machine = state_machine.with_path(path);
        }
        if let Some(logging) = self.logging {
            state_machine = state_machine.with_logging(logging);
        }
        Ok(state_machine)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiGatewayStack {
    pub integrations: Vec<IntegrationSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationSpec {
    pub name: String,
    #[serde(default)]
    pub request_parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayIntegration {
    pub name: String,
    pub request_parameters: BTreeMap<String, String>,
}

/// Which kind of task the payload is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// A Lambda invoke task.
    Lambda,
    /// A nested state machine execution.
    Execution,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayloadSpec {
    pub name: String,
    pub kind: TaskKind,
    #[serde(default)]
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub name: String,
    pub kind: TaskKind,
    pub payload: Payload,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthOutput {
    pub lambda_functions: Vec<LambdaFunction>,
    pub log_groups: Vec<LogGroup>,
    pub task_definitions: Vec<TaskDefinition>,
    pub state_machines: Vec<StateMachine>,
    pub task_payloads: Vec<TaskPayload>,
    pub api_gateway_integrations: Vec<ApiGatewayIntegration>,
    /// Non-fatal findings, rendered for display.
    pub diagnostics: Vec<String>,
}

impl SynthOutput {
    fn record(&mut self, diagnostics: &Diagnostics) {
        for diagnostic in diagnostics.iter() {
            warn!("{}", diagnostic);
            self.diagnostics.push(diagnostic.to_string());
        }
    }
}

/// Loads a stack file, layering `DD_CDK_` environment overrides on top.
pub fn load(path: &Path) -> anyhow::Result<StackFile> {
    let figment = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Figment::new().merge(Json::file(path)),
        Some("yaml" | "yml") => Figment::new().merge(Yaml::file(path)),
        other => anyhow::bail!(
            "unsupported stack file extension {:?} for {}",
            other.unwrap_or_default(),
            path.display()
        ),
    };
    if !path.exists() {
        anyhow::bail!("stack file {} does not exist", path.display());
    }
    let stack = figment
        .merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(&["BYPASS_SITE_VALIDATION", "BYPASS_VALIDATION", "STACK_FILE"])
                .split("__"),
        )
        .extract::<StackFile>()
        .with_context(|| format!("failed to parse stack file {}", path.display()))?;
    debug!("Loaded stack file {}", path.display());
    Ok(stack)
}

/// Instruments every resource the stack describes. `git` is only consulted
/// when the stack file carries no git metadata of its own.
pub fn synth(
    stack: StackFile,
    options: &ValidationOptions,
    git: impl FnOnce() -> GitMetadata,
) -> anyhow::Result<SynthOutput> {
    let mut output = SynthOutput::default();
    let account = stack.account.as_deref();

    if let Some(lambda) = stack.lambda {
        let mut datadog =
            DatadogLambda::with_defaults(&lambda.props, &DatadogLambdaProps::default(), options)
                .context("invalid Lambda configuration")?;
        datadog.set_git_metadata(stack.git.unwrap_or_else(git));
        datadog.apply_context(&stack.context);
        output.record(datadog.diagnostics());

        let functions = lambda
            .functions
            .into_iter()
            .map(|spec| spec.into_function(account))
            .collect::<anyhow::Result<Vec<_>>>()?;
        info!("Instrumenting {} Lambda functions", functions.len());
        let diagnostics = datadog
            .add_lambda_functions(functions)
            .context("failed to instrument Lambda functions")?;
        output.record(&diagnostics);

        let mut log_groups = lambda
            .log_groups
            .into_iter()
            .map(LogGroup::new)
            .collect::<Vec<_>>();
        datadog
            .add_forwarder_to_non_lambda_log_groups(&mut log_groups)
            .context("failed to forward non Lambda log groups")?;
        output.log_groups = log_groups;
        output.lambda_functions = datadog.into_lambdas();
    }

    if let Some(ecs) = stack.ecs {
        let construct = DatadogEcsFargate::new(ecs.props).with_validation_options(*options);
        for spec in ecs.task_definitions {
            let mut task = construct
                .fargate_task_definition(&spec.id, &spec.props, &spec.datadog_props)
                .with_context(|| format!("invalid Datadog configuration for {}", spec.id))?;
            for container in spec.containers {
                task.add_container(&container.id, container.options)
                    .with_context(|| {
                        format!("failed to add container {} to {}", container.id, spec.id)
                    })?;
            }
            output.record(task.diagnostics());
            output.task_definitions.push(task.into_task_definition());
        }
    }

    if let Some(step_functions) = stack.step_functions {
        let mut datadog = DatadogStepFunctions::with_options(&step_functions.props, options)
            .context("invalid Step Functions configuration")?;
        let mut state_machines = step_functions
            .state_machines
            .into_iter()
            .map(|spec| spec.into_state_machine(account))
            .collect::<anyhow::Result<Vec<_>>>()?;
        datadog
            .add_state_machines(&mut state_machines)
            .context("failed to instrument state machines")?;
        output.state_machines = state_machines;

        for spec in step_functions.task_payloads {
            let payload = match spec.kind {
                TaskKind::Lambda => build_lambda_payload(&spec.payload),
                TaskKind::Execution => build_task_input(&spec.payload),
            }
            .with_context(|| format!("failed to build payload for task {}", spec.name))?;
            output.task_payloads.push(TaskPayload {
                name: spec.name,
                kind: spec.kind,
                payload,
            });
        }
    }

    if let Some(api_gateway) = stack.api_gateway {
        for spec in api_gateway.integrations {
            debug!("Adding Datadog request parameters to integration {}", spec.name);
            output.api_gateway_integrations.push(ApiGatewayIntegration {
                request_parameters: with_request_parameters(&spec.request_parameters),
                name: spec.name,
            });
        }
    }

    Ok(output)
}
