// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Runtime detection and Datadog layer selection.

use std::fmt;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::lambda::{DatadogLambdaStrictProps, LayerPin};
use crate::constants::{
    ARM_LAYER_SUFFIX, DD_ACCOUNT_ID, DD_GOV_ACCOUNT_ID, EXTENSION_LAYER_NAME, GOV_REGIONS,
};
use crate::diagnostics::Diagnostic;
use crate::lambda::function::{LambdaFunction, LayerReference};

const LAYER_PREFIX: &str = "DatadogLayer";
const EXTENSION_LAYER_PREFIX: &str = "DatadogExtension";

/// Runtime family of a function, which decides the layer and handler wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFamily {
    Dotnet,
    Node,
    Python,
    Java,
    Ruby,
    /// OS-only runtimes; only the extension applies.
    Custom,
    Unsupported,
}

impl RuntimeFamily {
    pub fn from_runtime(runtime: &str) -> Self {
        match runtime {
            "dotnet6" | "dotnet8" => RuntimeFamily::Dotnet,
            "nodejs12.x" | "nodejs14.x" | "nodejs16.x" | "nodejs18.x" | "nodejs20.x"
            | "nodejs22.x" | "nodejs24.x" => RuntimeFamily::Node,
            "python3.6" | "python3.7" | "python3.8" | "python3.9" | "python3.10"
            | "python3.11" | "python3.12" | "python3.13" | "python3.14" => RuntimeFamily::Python,
            "java8.al2" | "java11" | "java17" | "java21" | "java25" => RuntimeFamily::Java,
            "ruby3.2" | "ruby3.3" | "ruby3.4" => RuntimeFamily::Ruby,
            "provided" | "provided.al2" | "provided.al2023" => RuntimeFamily::Custom,
            _ => RuntimeFamily::Unsupported,
        }
    }

    pub fn is_supported(self) -> bool {
        self != RuntimeFamily::Unsupported
    }

    /// Setting name prefix used in error messages, e.g. `pythonLayerVersion`.
    fn setting_prefix(self) -> &'static str {
        match self {
            RuntimeFamily::Dotnet => "dotnet",
            RuntimeFamily::Node => "node",
            RuntimeFamily::Python => "python",
            RuntimeFamily::Java => "java",
            RuntimeFamily::Ruby => "ruby",
            RuntimeFamily::Custom | RuntimeFamily::Unsupported => "",
        }
    }

    fn pin(self, props: &DatadogLambdaStrictProps) -> Option<&LayerPin> {
        match self {
            RuntimeFamily::Dotnet => Some(&props.dotnet_layer),
            RuntimeFamily::Node => Some(&props.node_layer),
            RuntimeFamily::Python => Some(&props.python_layer),
            RuntimeFamily::Java => Some(&props.java_layer),
            RuntimeFamily::Ruby => Some(&props.ruby_layer),
            RuntimeFamily::Custom | RuntimeFamily::Unsupported => None,
        }
    }
}

impl fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeFamily::Dotnet => ".NET",
            RuntimeFamily::Node => "Node.js",
            RuntimeFamily::Python => "Python",
            RuntimeFamily::Java => "Java",
            RuntimeFamily::Ruby => "Ruby",
            RuntimeFamily::Custom => "custom",
            RuntimeFamily::Unsupported => "unsupported",
        };
        f.write_str(name)
    }
}

/// Base layer name for a runtime identifier.
pub fn runtime_layer_name(runtime: &str) -> Option<String> {
    let name = match RuntimeFamily::from_runtime(runtime) {
        RuntimeFamily::Dotnet => "dd-trace-dotnet".to_string(),
        RuntimeFamily::Java => "dd-trace-java".to_string(),
        RuntimeFamily::Node => {
            // nodejs20.x -> Datadog-Node20-x
            let version = runtime.trim_start_matches("nodejs").replace('.', "-");
            format!("Datadog-Node{version}")
        }
        RuntimeFamily::Python => {
            format!("Datadog-Python{}", runtime.trim_start_matches("python").replace('.', ""))
        }
        RuntimeFamily::Ruby => {
            format!("Datadog-Ruby{}", runtime.trim_start_matches("ruby").replace('.', "-"))
        }
        RuntimeFamily::Custom | RuntimeFamily::Unsupported => return None,
    };
    Some(name)
}

fn is_gov_region(region: &str) -> bool {
    GOV_REGIONS.contains(&region)
}

fn layer_arn(region: &str, layer_name: &str, version: u32, account: Option<&str>) -> String {
    if is_gov_region(region) {
        debug!("GovCloud region detected, using the GovCloud lambda layer");
        let account = account.unwrap_or(DD_GOV_ACCOUNT_ID);
        return format!("arn:aws-us-gov:lambda:{region}:{account}:layer:{layer_name}:{version}");
    }
    let account = account.unwrap_or(DD_ACCOUNT_ID);
    format!("arn:aws:lambda:{region}:{account}:layer:{layer_name}:{version}")
}

/// ARN of the runtime library layer. Node layers ship both architectures.
pub fn lambda_layer_arn(
    region: &str,
    version: u32,
    runtime: &str,
    is_arm: bool,
    account: Option<&str>,
) -> Option<String> {
    let base = runtime_layer_name(runtime)?;
    let name = if is_arm && RuntimeFamily::from_runtime(runtime) != RuntimeFamily::Node {
        format!("{base}{ARM_LAYER_SUFFIX}")
    } else {
        base
    };
    Some(layer_arn(region, &name, version, account))
}

pub fn extension_layer_arn(region: &str, version: u32, is_arm: bool, account: Option<&str>) -> String {
    let name = if is_arm {
        format!("{EXTENSION_LAYER_NAME}{ARM_LAYER_SUFFIX}")
    } else {
        EXTENSION_LAYER_NAME.to_string()
    };
    layer_arn(region, &name, version, account)
}

fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn lambda_layer_id(function_arn: &str, runtime: &str) -> String {
    format!("{LAYER_PREFIX}-{runtime}-{}", sha256_hex(function_arn))
}

pub fn extension_layer_id(function_arn: &str) -> String {
    format!("{EXTENSION_LAYER_PREFIX}-{}", sha256_hex(function_arn))
}

/// Why a function could not receive its library layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerOutcome {
    Applied,
    /// No library layer exists for the runtime; wiring continues without it.
    Skipped(Diagnostic),
    /// A layer exists but nothing pins its version; the function must not be instrumented.
    Missing(Diagnostic),
}

/// Attaches the runtime library layer selected by `props`.
pub fn apply_layers(function: &mut LambdaFunction, props: &DatadogLambdaStrictProps) -> LayerOutcome {
    let family = RuntimeFamily::from_runtime(&function.runtime);
    debug!("Applying layers to Lambda function {}", function.name);

    if family == RuntimeFamily::Unsupported {
        return LayerOutcome::Skipped(Diagnostic::UnsupportedRuntime {
            resource: function.name.clone(),
            runtime: function.runtime.clone(),
        });
    }
    let Some(pin) = family.pin(props) else {
        debug!("Custom runtime {}, no library layer to add", function.runtime);
        return LayerOutcome::Applied;
    };

    let arn = match (&pin.arn, pin.version) {
        (Some(arn), _) => Some(arn.clone()),
        (None, Some(version)) => lambda_layer_arn(
            &function.region,
            version,
            &function.runtime,
            function.is_arm(),
            props.use_layers_from_account.as_deref(),
        ),
        (None, None) => None,
    };
    let Some(arn) = arn else {
        return LayerOutcome::Missing(Diagnostic::MissingLayerVersion {
            resource: function.name.clone(),
            runtime: family.to_string(),
            setting: format!("{}LayerVersion", family.setting_prefix()),
        });
    };

    debug!("Using {} Lambda layer: {}", family, arn);
    let id = lambda_layer_id(&function.arn, &function.runtime);
    function.add_layer(LayerReference { id, arn });
    LayerOutcome::Applied
}

/// Attaches the Datadog Extension layer. Unsupported runtimes are left alone.
pub fn apply_extension_layer(function: &mut LambdaFunction, props: &DatadogLambdaStrictProps) {
    if !RuntimeFamily::from_runtime(&function.runtime).is_supported() {
        debug!("Unsupported runtime: {}", function.runtime);
        return;
    }
    let pin = &props.extension_layer;
    let arn = match (&pin.arn, pin.version) {
        (Some(arn), _) => arn.clone(),
        (None, Some(version)) => extension_layer_arn(
            &function.region,
            version,
            function.is_arm(),
            props.use_layers_from_account.as_deref(),
        ),
        (None, None) => return,
    };
    debug!("Using extension layer: {}", arn);
    let id = extension_layer_id(&function.arn);
    function.add_layer(LayerReference { id, arn });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::lambda::DatadogLambdaProps;
    use crate::config::{Resolve, ValidationOptions};
    use crate::lambda::function::Architecture;
    use duplicate::duplicate_item;

    #[duplicate_item(
        test_name                      runtime              expected;
        [test_layer_name_node20]       ["nodejs20.x"]       [Some("Datadog-Node20-x")];
        [test_layer_name_python312]    ["python3.12"]       [Some("Datadog-Python312")];
        [test_layer_name_python39]     ["python3.9"]        [Some("Datadog-Python39")];
        [test_layer_name_java21]       ["java21"]           [Some("dd-trace-java")];
        [test_layer_name_dotnet8]      ["dotnet8"]          [Some("dd-trace-dotnet")];
        [test_layer_name_ruby33]       ["ruby3.3"]          [Some("Datadog-Ruby3-3")];
        [test_layer_name_provided]     ["provided.al2023"]  [None];
        [test_layer_name_unknown]      ["cobol85"]          [None];
    )]
    #[test]
    fn test_name() {
        assert_eq!(runtime_layer_name(runtime).as_deref(), expected);
    }

    #[test]
    fn test_layer_arn_commercial_and_arm() {
        assert_eq!(
            lambda_layer_arn("us-east-1", 90, "python3.12", false, None).unwrap(),
            "arn:aws:lambda:us-east-1:464622532012:layer:Datadog-Python312:90"
        );
        assert_eq!(
            lambda_layer_arn("us-east-1", 90, "python3.12", true, None).unwrap(),
            "arn:aws:lambda:us-east-1:464622532012:layer:Datadog-Python312-ARM:90"
        );
        // node layers are multi-arch
        assert_eq!(
            lambda_layer_arn("us-east-1", 110, "nodejs20.x", true, None).unwrap(),
            "arn:aws:lambda:us-east-1:464622532012:layer:Datadog-Node20-x:110"
        );
    }

    #[test]
    fn test_layer_arn_gov_cloud() {
        assert_eq!(
            extension_layer_arn("us-gov-west-1", 60, false, None),
            "arn:aws-us-gov:lambda:us-gov-west-1:002406178527:layer:Datadog-Extension:60"
        );
    }

    #[test]
    fn test_layer_arn_custom_account() {
        assert_eq!(
            extension_layer_arn("eu-west-1", 60, true, Some("111111111111")),
            "arn:aws:lambda:eu-west-1:111111111111:layer:Datadog-Extension-ARM:60"
        );
    }

    #[test]
    fn test_layer_ids() {
        let arn = "arn:aws:lambda:us-east-1:1:function:fn";
        let id = lambda_layer_id(arn, "python3.12");
        assert!(id.starts_with("DatadogLayer-python3.12-"));
        assert_eq!(id.len(), "DatadogLayer-python3.12-".len() + 64);
        assert!(extension_layer_id(arn).starts_with("DatadogExtension-"));
    }

    fn strict(props: DatadogLambdaProps) -> DatadogLambdaStrictProps {
        props
            .resolve(&DatadogLambdaProps::default(), &ValidationOptions::default())
            .unwrap()
            .props
    }

    #[test]
    fn test_apply_layers_explicit_arn_wins() {
        let props = strict(DatadogLambdaProps {
            python_layer_version: Some(1),
            python_layer_arn: Some("arn:aws:lambda:us-east-1:1:layer:custom:3".to_string()),
            ..Default::default()
        });
        let mut function = LambdaFunction::new("fn", "123456789012", "us-east-1", "python3.12", "app.handler")
            .with_architecture(Architecture::Arm64);
        assert_eq!(apply_layers(&mut function, &props), LayerOutcome::Applied);
        assert_eq!(function.layers[0].arn, "arn:aws:lambda:us-east-1:1:layer:custom:3");
    }

    #[test]
    fn test_apply_layers_missing_version() {
        let props = strict(DatadogLambdaProps::default());
        let mut function = LambdaFunction::new("fn", "123456789012", "us-east-1", "nodejs20.x", "index.handler");
        assert!(matches!(
            apply_layers(&mut function, &props),
            LayerOutcome::Missing(Diagnostic::MissingLayerVersion { .. })
        ));
        assert!(function.layers.is_empty());
    }

    #[test]
    fn test_apply_layers_unsupported_runtime() {
        let props = strict(DatadogLambdaProps::default());
        let mut function = LambdaFunction::new("fn", "123456789012", "us-east-1", "go1.x", "main");
        assert!(matches!(
            apply_layers(&mut function, &props),
            LayerOutcome::Skipped(Diagnostic::UnsupportedRuntime { .. })
        ));
        assert!(function.layers.is_empty());
    }

    #[test]
    fn test_apply_extension_layer_on_custom_runtime() {
        let props = strict(DatadogLambdaProps {
            extension_layer_version: Some(65),
            api_key: Some("1234".to_string()),
            ..Default::default()
        });
        let mut function = LambdaFunction::new("fn", "123456789012", "us-east-1", "provided.al2023", "bootstrap");
        assert_eq!(apply_layers(&mut function, &props), LayerOutcome::Applied);
        apply_extension_layer(&mut function, &props);
        assert_eq!(function.layers.len(), 1);
        assert_eq!(
            function.layers[0].arn,
            "arn:aws:lambda:us-east-1:464622532012:layer:Datadog-Extension:65"
        );
    }
}
