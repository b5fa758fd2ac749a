// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use tracing::debug;

use crate::constants::lambda_env::{EXEC_WRAPPER, LAMBDA_HANDLER};
use crate::constants::{DD_WRAPPER, JS_HANDLER, JS_HANDLER_WITH_LAYERS, PYTHON_HANDLER};
use crate::diagnostics::Diagnostics;
use crate::lambda::env::set_env;
use crate::lambda::function::LambdaFunction;
use crate::lambda::layer::RuntimeFamily;

fn datadog_handler(family: RuntimeFamily, add_layers: bool) -> Option<&'static str> {
    match family {
        RuntimeFamily::Node if add_layers => Some(JS_HANDLER_WITH_LAYERS),
        RuntimeFamily::Node => Some(JS_HANDLER),
        RuntimeFamily::Python => Some(PYTHON_HANDLER),
        _ => None,
    }
}

/// Points the function at the Datadog handler, which loads the tracer and
/// then calls the original handler stored in `DD_LAMBDA_HANDLER`.
///
/// Java and .NET are wrapped through `AWS_LAMBDA_EXEC_WRAPPER` instead.
pub fn redirect_handler(function: &mut LambdaFunction, add_layers: bool, diagnostics: &mut Diagnostics) {
    debug!("Wrapping Lambda function handlers with Datadog handler...");
    let family = RuntimeFamily::from_runtime(&function.runtime);

    if matches!(family, RuntimeFamily::Java | RuntimeFamily::Dotnet) {
        set_env(function, diagnostics, EXEC_WRAPPER, DD_WRAPPER);
        return;
    }

    let Some(handler) = datadog_handler(family, add_layers) else {
        if family.is_supported() {
            let original = function.handler.clone();
            set_env(function, diagnostics, LAMBDA_HANDLER, &original);
        }
        debug!("No Datadog handler for runtime {}", function.runtime);
        return;
    };

    // already redirected; keep the recorded original
    if function.handler == handler {
        return;
    }
    let original = std::mem::replace(&mut function.handler, handler.to_string());
    set_env(function, diagnostics, LAMBDA_HANDLER, &original);
}
