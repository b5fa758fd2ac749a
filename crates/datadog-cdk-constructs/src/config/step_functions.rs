// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

use crate::config::lambda::validate_forwarder_arn;
use crate::config::{Merge, Resolve, Resolved, ValidationOptions};
use crate::diagnostics::Diagnostics;
use crate::error::ConstructError;
use crate::merge_options;
use crate::tags::validate_ust;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatadogStepFunctionsProps {
    pub env: Option<String>,
    pub service: Option<String>,
    pub version: Option<String>,
    pub forwarder_arn: Option<String>,
    /// Comma separated `key:value` pairs.
    pub tags: Option<String>,
}

impl Merge for DatadogStepFunctionsProps {
    fn merge(&mut self, other: &Self) {
        merge_options!(self, other, [env, service, version, forwarder_arn, tags]);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatadogStepFunctionsStrictProps {
    pub env: Option<String>,
    pub service: Option<String>,
    pub version: Option<String>,
    pub forwarder_arn: Option<String>,
    pub tags: Option<String>,
}

impl Resolve for DatadogStepFunctionsProps {
    type Strict = DatadogStepFunctionsStrictProps;

    fn library_defaults() -> Self {
        Self::default()
    }

    fn finalize(
        merged: Self,
        _options: &ValidationOptions,
    ) -> Result<Resolved<Self::Strict>, ConstructError> {
        validate_ust(
            merged.env.as_deref(),
            merged.service.as_deref(),
            merged.version.as_deref(),
        )?;
        if let Some(arn) = &merged.forwarder_arn {
            validate_forwarder_arn(arn)?;
        }

        Ok(Resolved {
            props: DatadogStepFunctionsStrictProps {
                env: merged.env,
                service: merged.service,
                version: merged.version,
                forwarder_arn: merged.forwarder_arn,
                tags: merged.tags,
            },
            diagnostics: Diagnostics::new(),
        })
    }
}

impl From<DatadogStepFunctionsStrictProps> for DatadogStepFunctionsProps {
    fn from(strict: DatadogStepFunctionsStrictProps) -> Self {
        Self {
            env: strict.env,
            service: strict.service,
            version: strict.version,
            forwarder_arn: strict.forwarder_arn,
            tags: strict.tags,
        }
    }
}
