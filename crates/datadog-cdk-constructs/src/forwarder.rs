// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log forwarding through the Datadog Forwarder function.
//!
//! Filter names are derived from a hash of the source and the forwarder ARN
//! so that re-running instrumentation attaches the same filter again instead
//! of a second one.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::constants::SUBSCRIPTION_FILTER_PREFIX;
use crate::log_group::{LogGroup, SubscriptionFilter};

const FILTER_SUFFIX_LENGTH: usize = 8;

/// `DatadogSubscriptionFilter` followed by the last 8 hex characters of
/// sha256(source ARN ‖ forwarder ARN).
#[must_use]
pub fn subscription_filter_name(source_arn: &str, forwarder_arn: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_arn.as_bytes());
    hasher.update(forwarder_arn.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!(
        "{SUBSCRIPTION_FILTER_PREFIX}{}",
        &digest[digest.len() - FILTER_SUFFIX_LENGTH..]
    )
}

/// Subscribes `log_group` to the forwarder on behalf of `source_arn`.
pub fn subscribe(
    log_group: &mut LogGroup,
    source_arn: &str,
    forwarder_arn: &str,
    create_permissions: bool,
) {
    let name = subscription_filter_name(source_arn, forwarder_arn);
    debug!("Adding log subscription {} for {}", name, log_group.name);
    let added = log_group.add_subscription_filter(SubscriptionFilter {
        name,
        destination_arn: forwarder_arn.to_string(),
        filter_pattern: String::new(),
        add_permissions: create_permissions,
    });
    if !added {
        debug!("Log group {} is already subscribed", log_group.name);
    }
}

/// Subscribes log groups that do not belong to a Lambda function.
pub fn add_forwarder_to_log_groups(
    log_groups: &mut [LogGroup],
    forwarder_arn: &str,
    create_permissions: bool,
) {
    for log_group in log_groups.iter_mut() {
        let source = log_group.name.clone();
        subscribe(log_group, &source, forwarder_arn, create_permissions);
    }
}
