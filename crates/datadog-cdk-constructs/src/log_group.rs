// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Log subscription that ships every event of a log group to a destination function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    pub name: String,
    pub destination_arn: String,
    /// Empty pattern matches all events.
    #[serde(default)]
    pub filter_pattern: String,
    /// Whether an invoke permission for the destination is created alongside.
    #[serde(default)]
    pub add_permissions: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscription_filters: Vec<SubscriptionFilter>,
}

impl LogGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscription_filters: Vec::new(),
        }
    }

    /// Adds the filter unless one with the same name is already attached.
    ///
    /// Returns true when the filter was added.
    pub fn add_subscription_filter(&mut self, filter: SubscriptionFilter) -> bool {
        if self.subscription_filters.iter().any(|f| f.name == filter.name) {
            return false;
        }
        self.subscription_filters.push(filter);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_filter_added_once() {
        let mut group = LogGroup::new("/aws/lambda/fn");
        let filter = SubscriptionFilter {
            name: "DatadogSubscriptionFilter12345678".to_string(),
            destination_arn: "arn:aws:lambda:us-east-1:123:function:forwarder".to_string(),
            filter_pattern: String::new(),
            add_permissions: false,
        };
        assert!(group.add_subscription_filter(filter.clone()));
        assert!(!group.add_subscription_filter(filter));
        assert_eq!(group.subscription_filters.len(), 1);
    }
}
