// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Resolves Datadog configuration and wires instrumentation into deployment
//! definitions for AWS Lambda functions, ECS Fargate task definitions and
//! Step Functions state machines.
//!
//! Everything here is synchronous and performs no I/O. Fatal problems are
//! reported as [`error::ConstructError`] before the definition being wired is
//! modified; degraded-but-valid situations are returned as
//! [`diagnostics::Diagnostic`] values and logged at warn level.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod apigateway;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod ecs;
pub mod error;
pub mod forwarder;
pub mod lambda;
pub mod log_group;
pub mod step_functions;
pub mod tags;
pub mod transport;

pub use apigateway::DATADOG_API_GATEWAY_REQUEST_PARAMETERS;
pub use config::ecs::{DatadogEcsFargateProps, DatadogEcsFargateStrictProps};
pub use config::lambda::{DatadogLambdaProps, DatadogLambdaStrictProps};
pub use config::step_functions::{DatadogStepFunctionsProps, DatadogStepFunctionsStrictProps};
pub use config::{Resolve, ValidationOptions};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use ecs::fargate::{DatadogEcsFargate, DatadogEcsFargateTaskDefinition};
pub use error::ConstructError;
#[allow(deprecated)]
pub use lambda::Datadog;
pub use lambda::DatadogLambda;
pub use step_functions::DatadogStepFunctions;
pub use transport::Transport;
