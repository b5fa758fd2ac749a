// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod container;
pub mod environment;
pub mod fargate;
pub mod task_definition;
