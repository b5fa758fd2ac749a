// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub const CONSTRUCT_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CONSTRUCT_NAME: &str = "datadog-cdk-constructs";

pub const DEFAULT_SITE: &str = "datadoghq.com";
pub const SITE_LIST: [&str; 7] = [
    "datadoghq.com",
    "datadoghq.eu",
    "us3.datadoghq.com",
    "us5.datadoghq.com",
    "ap1.datadoghq.com",
    "ap2.datadoghq.com",
    "ddog-gov.com",
];

pub const BYPASS_SITE_VALIDATION_ENV_VAR: &str = "DD_CDK_BYPASS_SITE_VALIDATION";
pub const BYPASS_VALIDATION_ENV_VAR: &str = "DD_CDK_BYPASS_VALIDATION";

/// Reserved tag keys.
pub mod tag_keys {
    pub const CDK: &str = "dd_cdk_construct";
    pub const ENV: &str = "env";
    pub const SERVICE: &str = "service";
    pub const VERSION: &str = "version";
    pub const DD_TRACE_ENABLED: &str = "DD_TRACE_ENABLED";
}

/// Environment variable names injected on Lambda functions.
pub mod lambda_env {
    pub const API_KEY: &str = "DD_API_KEY";
    pub const API_KEY_SECRET_ARN: &str = "DD_API_KEY_SECRET_ARN";
    pub const KMS_API_KEY: &str = "DD_KMS_API_KEY";
    pub const SITE: &str = "DD_SITE";
    pub const FLUSH_TO_LOG: &str = "DD_FLUSH_TO_LOG";
    pub const LAMBDA_HANDLER: &str = "DD_LAMBDA_HANDLER";
    pub const EXEC_WRAPPER: &str = "AWS_LAMBDA_EXEC_WRAPPER";
    pub const TRACE_ENABLED: &str = "DD_TRACE_ENABLED";
    pub const SERVERLESS_APPSEC_ENABLED: &str = "DD_SERVERLESS_APPSEC_ENABLED";
    pub const APPSEC_ENABLED: &str = "DD_APPSEC_ENABLED";
    pub const MERGE_XRAY_TRACES: &str = "DD_MERGE_XRAY_TRACES";
    pub const LOGS_INJECTION: &str = "DD_LOGS_INJECTION";
    pub const LOG_LEVEL: &str = "DD_LOG_LEVEL";
    pub const SERVERLESS_LOGS_ENABLED: &str = "DD_SERVERLESS_LOGS_ENABLED";
    pub const CAPTURE_LAMBDA_PAYLOAD: &str = "DD_CAPTURE_LAMBDA_PAYLOAD";
    pub const CLOUD_REQUEST_PAYLOAD_TAGGING: &str = "DD_TRACE_CLOUD_REQUEST_PAYLOAD_TAGGING";
    pub const CLOUD_RESPONSE_PAYLOAD_TAGGING: &str = "DD_TRACE_CLOUD_RESPONSE_PAYLOAD_TAGGING";
    pub const ENV: &str = "DD_ENV";
    pub const SERVICE: &str = "DD_SERVICE";
    pub const VERSION: &str = "DD_VERSION";
    pub const TAGS: &str = "DD_TAGS";
    pub const COLD_START_TRACING: &str = "DD_COLD_START_TRACING";
    pub const MIN_COLD_START_DURATION: &str = "DD_MIN_COLD_START_DURATION";
    pub const COLD_START_TRACE_SKIP_LIB: &str = "DD_COLD_START_TRACE_SKIP_LIB";
    pub const PROFILING_ENABLED: &str = "DD_PROFILING_ENABLED";
    pub const ENCODE_AUTHORIZER_CONTEXT: &str = "DD_ENCODE_AUTHORIZER_CONTEXT";
    pub const DECODE_AUTHORIZER_CONTEXT: &str = "DD_DECODE_AUTHORIZER_CONTEXT";
    pub const APM_FLUSH_DEADLINE: &str = "DD_APM_FLUSH_DEADLINE_MILLISECONDS";
    pub const LLMOBS_ENABLED: &str = "DD_LLMOBS_ENABLED";
    pub const LLMOBS_ML_APP: &str = "DD_LLMOBS_ML_APP";
    pub const LLMOBS_AGENTLESS_ENABLED: &str = "DD_LLMOBS_AGENTLESS_ENABLED";
}

pub const DD_WRAPPER: &str = "/opt/datadog_wrapper";
pub const PYTHON_HANDLER: &str = "datadog_lambda.handler.handler";
pub const JS_HANDLER_WITH_LAYERS: &str = "/opt/nodejs/node_modules/datadog-lambda-js/handler.handler";
pub const JS_HANDLER: &str = "node_modules/datadog-lambda-js/dist/handler.handler";

pub const DD_ACCOUNT_ID: &str = "464622532012";
pub const DD_GOV_ACCOUNT_ID: &str = "002406178527";
pub const GOV_REGIONS: [&str; 2] = ["us-gov-east-1", "us-gov-west-1"];
pub const EXTENSION_LAYER_NAME: &str = "Datadog-Extension";
pub const ARM_LAYER_SUFFIX: &str = "-ARM";

pub const SUBSCRIPTION_FILTER_PREFIX: &str = "DatadogSubscriptionFilter";
pub const GIT_COMMIT_SHA_TAG: &str = "git.commit.sha";
pub const GIT_REPOSITORY_URL_TAG: &str = "git.repository_url";
/// Context key consulted for a commit SHA override during stack assembly.
pub const GIT_SHA_OVERRIDE_CONTEXT_KEY: &str = "datadog-lambda.git-commit-sha-override";

/// ECS Fargate container and volume names managed by Datadog.
pub mod ecs {
    pub const AGENT_CONTAINER_NAME: &str = "datadog-agent";
    pub const CWS_CONTAINER_NAME: &str = "cws-instrumentation-init";
    pub const LOG_ROUTER_CONTAINER_NAME: &str = "datadog-log-router";
    pub const RESERVED_CONTAINER_NAMES: [&str; 3] = [
        AGENT_CONTAINER_NAME,
        CWS_CONTAINER_NAME,
        LOG_ROUTER_CONTAINER_NAME,
    ];

    pub const SOCKET_VOLUME_NAME: &str = "dd-sockets";
    pub const SOCKET_PATH: &str = "/var/run/datadog";
    pub const DSD_SOCKET_URL: &str = "unix:///var/run/datadog/dsd.socket";
    pub const APM_SOCKET_URL: &str = "unix:///var/run/datadog/apm.socket";
    pub const AGENT_HOST: &str = "127.0.0.1";
    pub const DSD_PORT: u16 = 8125;
    pub const APM_PORT: u16 = 8126;

    pub const CWS_VOLUME_NAME: &str = "cws-instrumentation-volume";
    pub const CWS_VOLUME_PATH: &str = "/cws-instrumentation-volume";
    pub const CWS_IMAGE: &str = "datadog/cws-instrumentation:latest";
    pub const CWS_ENTRYPOINT_PREFIX: [&str; 3] = [
        "/cws-instrumentation-volume/cws-instrumentation",
        "trace",
        "--",
    ];

    pub const DEFAULT_AGENT_REGISTRY: &str = "public.ecr.aws/datadog/agent";
    pub const DEFAULT_AGENT_IMAGE_VERSION: &str = "latest";
    pub const DEFAULT_LOG_ROUTER_REGISTRY: &str =
        "public.ecr.aws/aws-observability/aws-for-fluent-bit";
    pub const DEFAULT_LOG_ROUTER_IMAGE_VERSION: &str = "stable";
    pub const DEFAULT_LOG_HOST_ENDPOINT: &str = "http-intake.logs.datadoghq.com";

    pub const TASK_ROLE_ACTIONS: [&str; 3] = [
        "ecs:ListClusters",
        "ecs:ListContainerInstances",
        "ecs:DescribeContainerInstances",
    ];

    /// Smallest memory reservation, in MiB, accepted for a container.
    pub const MIN_MEMORY_MIB: u32 = 6;
    /// Smallest CPU reservation, in CPU units, accepted for a container.
    pub const MIN_CPU_UNITS: u32 = 1;

    pub const UST_LABEL_ENV: &str = "tags.datadoghq.com/env";
    pub const UST_LABEL_SERVICE: &str = "tags.datadoghq.com/service";
    pub const UST_LABEL_VERSION: &str = "tags.datadoghq.com/version";
}

/// Reserved key carrying trace context in Step Functions payloads.
pub const TRACE_CONTEXT_KEY: &str = "_datadog";
