// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tag cardinality level shared by the DogStatsD and checks configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::error;

/// How many tags the Agent attaches to metrics it receives.
///
/// Parsed case-insensitively; rendered in lowercase the way the Agent expects it
/// in `DD_DOGSTATSD_TAG_CARDINALITY` and `DD_CHECKS_TAG_CARDINALITY`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Cardinality {
    Low,
    #[default]
    Orchestrator,
    High,
}

impl AsRef<str> for Cardinality {
    fn as_ref(&self) -> &str {
        match self {
            Cardinality::Low => "low",
            Cardinality::Orchestrator => "orchestrator",
            Cardinality::High => "high",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for Cardinality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Cardinality::Low),
            "orchestrator" => Ok(Cardinality::Orchestrator),
            "high" => Ok(Cardinality::High),
            _ => Err(format!(
                "Invalid cardinality: '{s}'. Valid values are: low, orchestrator, high",
            )),
        }
    }
}

impl Serialize for Cardinality {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_ref())
    }
}

/// Invalid values are logged and fall back to the default rather than failing
/// the whole props document.
impl<'de> Deserialize<'de> for Cardinality {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        if let Value::String(s) = value {
            match Cardinality::from_str(&s) {
                Ok(cardinality) => Ok(cardinality),
                Err(e) => {
                    error!("{}", e);
                    Ok(Cardinality::default())
                }
            }
        } else {
            error!("Expected a string for cardinality, got {:?}", value);
            Ok(Cardinality::default())
        }
    }
}
