// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;

use datadog_cdk_constructs::config::api_key::SecretRef;
use datadog_cdk_constructs::step_functions::{build_task_input, strip_trace_context, Payload};
use datadog_cdk_constructs::{
    ConstructError, DatadogEcsFargateProps, DatadogLambdaProps, Resolve, ValidationOptions,
};
use proptest::prelude::*;
use serde_json::Value;

fn resolve_lambda(
    props: &DatadogLambdaProps,
) -> Result<datadog_cdk_constructs::DatadogLambdaStrictProps, ConstructError> {
    props
        .resolve(&DatadogLambdaProps::default(), &ValidationOptions::default())
        .map(|resolved| resolved.props)
}

fn resolve_ecs(
    props: &DatadogEcsFargateProps,
) -> Result<datadog_cdk_constructs::DatadogEcsFargateStrictProps, ConstructError> {
    props
        .resolve(&DatadogEcsFargateProps::default(), &ValidationOptions::default())
        .map(|resolved| resolved.props)
}

fn lambda_with_keys(mask: [bool; 4]) -> DatadogLambdaProps {
    DatadogLambdaProps {
        extension_layer_version: Some(65),
        api_key: mask[0].then(|| "1234".to_string()),
        api_key_secret_arn: mask[1]
            .then(|| "arn:aws:secretsmanager:us-east-1:1:secret:dd".to_string()),
        api_key_secret: mask[2].then(|| SecretRef::new("arn:aws:secretsmanager:us-east-1:1:secret:other")),
        api_kms_key: mask[3].then(|| "AQICAHh".to_string()),
        ..Default::default()
    }
}

prop_compose! {
    fn arb_lambda_props()(
        flush in proptest::option::of(any::<bool>()),
        extension in proptest::option::of(1u32..200),
        python in proptest::option::of(1u32..200),
        tracing_enabled in proptest::option::of(any::<bool>()),
        env in proptest::option::of("[a-z]{1,8}"),
        service in proptest::option::of("[a-z]{1,8}"),
        tags in proptest::option::of("[a-z]{1,4}:[a-z]{1,4}"),
        log_level in proptest::option::of(prop_oneof![Just("debug".to_string()), Just("info".to_string())]),
        min_cold_start in proptest::option::of(0u64..1000),
    ) -> DatadogLambdaProps {
        DatadogLambdaProps {
            flush_metrics_to_logs: flush,
            extension_layer_version: extension,
            python_layer_version: python,
            enable_datadog_tracing: tracing_enabled,
            env,
            service,
            tags,
            log_level,
            min_cold_start_trace_duration: min_cold_start,
            api_key: Some("1234".to_string()),
            ..Default::default()
        }
    }
}

prop_compose! {
    fn arb_ecs_props()(
        apm_socket in proptest::option::of(any::<bool>()),
        dsd_enabled in proptest::option::of(any::<bool>()),
        cws in proptest::option::of(any::<bool>()),
        cpu in proptest::option::of(1u32..4096),
        memory in proptest::option::of(6u32..8192),
        cluster_name in proptest::option::of("[a-z]{1,8}"),
        env_vars in proptest::collection::btree_map("DD_[A-Z]{1,6}", "[a-z0-9]{0,6}", 0..3),
    ) -> DatadogEcsFargateProps {
        DatadogEcsFargateProps {
            api_key: Some("1234".to_string()),
            cpu,
            memory_limit_mib: memory,
            cluster_name,
            environment_variables: Some(env_vars),
            // CWS needs the agent dependency
            is_datadog_dependency_enabled: cws,
            apm: Some(datadog_cdk_constructs::config::ecs::ApmFeatureConfig {
                is_socket_enabled: apm_socket,
                ..Default::default()
            }),
            dogstatsd: Some(datadog_cdk_constructs::config::ecs::DogstatsdFeatureConfig {
                is_enabled: dsd_enabled,
                ..Default::default()
            }),
            cws: Some(datadog_cdk_constructs::config::ecs::FargateCwsFeatureConfig {
                is_enabled: cws,
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

proptest! {
    #[test]
    fn test_api_key_source_count_must_be_one(mask in proptest::array::uniform4(any::<bool>())) {
        let count = mask.iter().filter(|set| **set).count();
        let result = resolve_lambda(&lambda_with_keys(mask));
        if count == 1 {
            prop_assert!(result.is_ok());
        } else {
            prop_assert!(matches!(result, Err(ConstructError::Config(_))));
        }
    }

    #[test]
    fn test_lambda_resolve_is_idempotent(raw in arb_lambda_props()) {
        let strict = resolve_lambda(&raw);
        prop_assert!(strict.is_ok(), "generated props must resolve: {:?}", strict);
        let strict = strict.unwrap();
        let again = resolve_lambda(&DatadogLambdaProps::from(strict.clone()));
        prop_assert_eq!(again, Ok(strict));
    }

    #[test]
    fn test_ecs_resolve_is_idempotent(raw in arb_ecs_props()) {
        let strict = resolve_ecs(&raw);
        prop_assert!(strict.is_ok(), "generated props must resolve: {:?}", strict);
        let strict = strict.unwrap();
        let again = resolve_ecs(&DatadogEcsFargateProps::from(strict.clone()));
        prop_assert_eq!(again, Ok(strict));
    }

    #[test]
    fn test_task_input_round_trip(
        input in proptest::collection::btree_map("[a-zA-Z][a-zA-Z0-9]{0,8}", "[a-z0-9 ]{0,12}", 0..6)
    ) {
        let original: Payload = input
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        let built = build_task_input(&original).unwrap();
        prop_assert_eq!(built.len(), original.len() + 1);
        for (key, value) in &original {
            prop_assert_eq!(built.get(key), Some(value));
        }
        prop_assert_eq!(strip_trace_context(built), original);
    }
}

#[test]
fn test_ecs_key_count_must_be_one() {
    let none = resolve_ecs(&DatadogEcsFargateProps::default());
    assert!(matches!(none, Err(ConstructError::Config(_))));

    let two = resolve_ecs(&DatadogEcsFargateProps {
        api_key: Some("1234".to_string()),
        api_key_secret: Some(SecretRef::new("arn:aws:secretsmanager:us-east-1:1:secret:dd")),
        ..Default::default()
    });
    assert!(matches!(two, Err(ConstructError::Config(_))));
}

#[test]
fn test_single_key_yields_documented_defaults() {
    let lambda = resolve_lambda(&DatadogLambdaProps {
        api_key: Some("1234".to_string()),
        ..Default::default()
    })
    .unwrap();
    assert!(lambda.add_layers);
    assert!(lambda.flush_metrics_to_logs);
    assert_eq!(lambda.site, "datadoghq.com");
    assert!(lambda.enable_datadog_tracing);
    assert!(lambda.enable_datadog_logs);
    assert!(lambda.inject_log_context);
    assert!(!lambda.enable_merge_xray_traces);
    assert!(!lambda.capture_lambda_payload);
    assert!(lambda.source_code_integration);
    assert!(lambda.redirect_handler);
    assert!(lambda.grant_secret_read_access);
    assert!(lambda.forwarder_arn.is_none());

    let ecs = resolve_ecs(&DatadogEcsFargateProps {
        api_key: Some("1234".to_string()),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(ecs.registry, "public.ecr.aws/datadog/agent");
    assert_eq!(ecs.image_version, "latest");
    assert_eq!(ecs.site, "datadoghq.com");
    assert!(ecs.apm.is_enabled);
    assert!(ecs.dogstatsd.is_enabled);
    assert!(!ecs.cws.is_enabled);
    assert!(!ecs.log_collection.is_enabled);
    assert_eq!(ecs.environment_variables, BTreeMap::new());
}
