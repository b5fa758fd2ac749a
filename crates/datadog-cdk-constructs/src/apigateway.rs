// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Integration request parameters that forward API Gateway request context
//! to the backend so the tracer can infer the proxy span.

use std::collections::BTreeMap;

/// Header mapping to set on an API Gateway integration request.
pub const DATADOG_API_GATEWAY_REQUEST_PARAMETERS: [(&str, &str); 6] = [
    ("integration.request.header.x-dd-proxy", "'aws-apigateway'"),
    (
        "integration.request.header.x-dd-proxy-request-time-ms",
        "context.requestTimeEpoch",
    ),
    (
        "integration.request.header.x-dd-proxy-domain-name",
        "context.domainName",
    ),
    (
        "integration.request.header.x-dd-proxy-httpmethod",
        "context.httpMethod",
    ),
    ("integration.request.header.x-dd-proxy-path", "context.path"),
    ("integration.request.header.x-dd-proxy-stage", "context.stage"),
];

/// Datadog parameters merged over the integration's own. Existing keys that
/// collide are replaced.
#[must_use]
pub fn with_request_parameters(existing: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut parameters = existing.clone();
    for (key, value) in DATADOG_API_GATEWAY_REQUEST_PARAMETERS {
        parameters.insert(key.to_string(), value.to_string());
    }
    parameters
}
