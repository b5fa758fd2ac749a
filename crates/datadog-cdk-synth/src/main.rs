// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use datadog_cdk_constructs::ValidationOptions;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod git;
mod stack;

const STACK_FILE_ENV: &str = "DD_CDK_STACK_FILE";

fn log_level() -> String {
    let debug_logs = env::var("DD_CONSTRUCT_DEBUG_LOGS")
        .map(|val| val.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if debug_logs {
        return "debug".to_string();
    }
    env::var("DD_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string())
}

fn stack_path() -> anyhow::Result<PathBuf> {
    env::args()
        .nth(1)
        .or_else(|| env::var(STACK_FILE_ENV).ok())
        .map(PathBuf::from)
        .with_context(|| format!("usage: datadog-cdk-synth <stack file>, or set {STACK_FILE_ENV}"))
}

fn run() -> anyhow::Result<()> {
    let path = stack_path()?;
    let stack = stack::load(&path)?;
    let options = ValidationOptions::from_env();
    debug!("Validation options: {:?}", options);

    let repo_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let output = stack::synth(stack, &options, || git::detect(&repo_dir))?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() {
    let env_filter = log_level();

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
