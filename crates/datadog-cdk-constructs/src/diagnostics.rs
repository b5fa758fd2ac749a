// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Non-fatal findings produced while resolving or wiring.
//!
//! A diagnostic never stops the pipeline. It is logged at warn level when it is
//! recorded and handed back to the caller so it can be surfaced in build output.

use std::fmt;

use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Runtime has no Datadog library layer; layers were skipped for the resource.
    UnsupportedRuntime { resource: String, runtime: String },
    /// Runtime is supported but no layer version or ARN was configured; the
    /// resource was left uninstrumented.
    MissingLayerVersion {
        resource: String,
        runtime: String,
        setting: String,
    },
    /// A socket transport was requested where it cannot be mounted; the
    /// agent is reached over TCP/UDP instead.
    SocketFallback { feature: &'static str, reason: String },
    /// An environment variable already held a different value and was replaced.
    EnvOverwritten {
        resource: String,
        key: String,
        previous: String,
    },
    Deprecated { setting: &'static str, replacement: &'static str },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::UnsupportedRuntime { resource, runtime } => write!(
                f,
                "Unsupported runtime '{runtime}' for {resource}, skipping Datadog layers"
            ),
            Diagnostic::MissingLayerVersion {
                resource,
                runtime,
                setting,
            } => write!(
                f,
                "Resource {resource} has a {runtime} runtime, but no {runtime} Lambda Library version was provided. Please add the '{setting}' parameter. Skipping instrumenting it"
            ),
            Diagnostic::SocketFallback { feature, reason } => {
                write!(f, "{feature} socket disabled, falling back to TCP/UDP: {reason}")
            }
            Diagnostic::EnvOverwritten {
                resource,
                key,
                previous,
            } => write!(
                f,
                "Overwriting environment variable {key} on {resource} (previous value '{previous}')"
            ),
            Diagnostic::Deprecated {
                setting,
                replacement,
            } => write!(f, "'{setting}' is deprecated, use '{replacement}' instead"),
        }
    }
}

/// Ordered collection of diagnostics emitted by one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        // already logged when first recorded
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.0
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
