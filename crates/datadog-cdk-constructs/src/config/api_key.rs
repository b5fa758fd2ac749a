// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::error::ConstructError;

/// Reference to a secret held in a secrets store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub secret_arn: String,
    /// JSON field within the secret holding the key; the whole secret when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl SecretRef {
    #[must_use]
    pub fn new(secret_arn: impl Into<String>) -> Self {
        Self {
            secret_arn: secret_arn.into(),
            field: None,
        }
    }
}

/// The single place the Datadog API key comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "value")]
pub enum ApiKeySource {
    /// Key stored in plain text on the resource.
    Plain(String),
    /// Key injected from a secret reference at container start.
    Secret(SecretRef),
    /// ARN of a secret the runtime reads the key from.
    SecretArn(String),
    /// KMS-encrypted key decrypted by the runtime.
    KmsEncrypted(String),
}

impl ApiKeySource {
    /// Secret ARN that the workload needs read access to, if any.
    #[must_use]
    pub fn secret_arn(&self) -> Option<&str> {
        match self {
            ApiKeySource::Secret(secret) => Some(&secret.secret_arn),
            ApiKeySource::SecretArn(arn) => Some(arn),
            ApiKeySource::Plain(_) | ApiKeySource::KmsEncrypted(_) => None,
        }
    }
}

/// Candidate key sources keyed by the user-facing setting name.
pub(crate) type Candidates = [(&'static str, Option<ApiKeySource>)];

/// Collapses candidate sources into at most one.
///
/// More than one source is always rejected. No source is rejected only when
/// `required` is set, i.e. when a feature that ships telemetry directly is on.
pub(crate) fn select_api_key(
    candidates: &Candidates,
    required: bool,
    reason: &str,
) -> Result<Option<ApiKeySource>, ConstructError> {
    let set: Vec<&(&'static str, Option<ApiKeySource>)> =
        candidates.iter().filter(|(_, value)| value.is_some()).collect();

    match set.as_slice() {
        [] if required => Err(ConstructError::config(format!(
            "{reason} requires an API key: set one of {}.",
            quoted_names(candidates.iter().map(|(name, _)| *name))
        ))),
        [] => Ok(None),
        [(_, source)] => Ok(source.clone()),
        many => Err(ConstructError::config(format!(
            "{} should not be set at the same time.",
            quoted_names(many.iter().map(|(name, _)| *name))
        ))),
    }
}

fn quoted_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<String> = names.map(|name| format!("`{name}`")).collect();
    match names.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} and {last}", rest.join(", ")),
        Some((last, _)) => last.clone(),
        None => String::new(),
    }
}
