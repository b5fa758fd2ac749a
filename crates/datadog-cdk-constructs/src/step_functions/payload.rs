// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace context injection into Step Functions task payloads.
//!
//! The injected value is a set of JSONPath references into the Step Functions
//! context object. Step Functions resolves them when the task runs, so the
//! downstream Lambda function or execution receives the live execution, state
//! and state machine identifiers and can link its spans to the parent trace.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::constants::TRACE_CONTEXT_KEY;
use crate::error::ConstructError;

/// Task payload as written in a state machine definition.
pub type Payload = Map<String, Value>;

/// A payload-like mapping trace context can be written into.
pub trait Injector {
    fn contains(&self, key: &str) -> bool;

    fn set(&mut self, key: &str, value: Value);
}

/// A payload-like mapping trace context can be removed from.
pub trait Extractor {
    fn take(&mut self, key: &str) -> Option<Value>;
}

impl Injector for Map<String, Value> {
    fn contains(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.insert(key.to_string(), value);
    }
}

impl Extractor for Map<String, Value> {
    fn take(&mut self, key: &str) -> Option<Value> {
        self.remove(key)
    }
}

impl Injector for HashMap<String, Value> {
    fn contains(&self, key: &str) -> bool {
        self.contains_key(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.insert(key.to_string(), value);
    }
}

impl Extractor for HashMap<String, Value> {
    fn take(&mut self, key: &str) -> Option<Value> {
        self.remove(key)
    }
}

/// Context references for a Lambda invoke task.
fn lambda_context() -> Value {
    json!({
        "Execution.$": "$$.Execution",
        "State.$": "$$.State",
        "StateMachine.$": "$$.StateMachine",
    })
}

/// Context references for a nested `StartExecution` task.
fn execution_context() -> Value {
    json!({
        "CONTEXT.$": "$$['Execution', 'State', 'StateMachine']",
    })
}

/// Writes `context` under the reserved key. A carrier that already uses the
/// key, or its JSONPath form, is left untouched.
pub fn inject<I: Injector>(carrier: &mut I, context: Value) -> Result<(), ConstructError> {
    let path_key = format!("{TRACE_CONTEXT_KEY}.$");
    for key in [TRACE_CONTEXT_KEY, path_key.as_str()] {
        if carrier.contains(key) {
            return Err(ConstructError::ReservedKeyConflict {
                key: key.to_string(),
            });
        }
    }
    carrier.set(TRACE_CONTEXT_KEY, context);
    Ok(())
}

/// Copies `payload` and adds the trace context for a Lambda invoke task, so
/// Step Functions traces can be merged with the downstream Lambda traces.
pub fn build_lambda_payload(payload: &Payload) -> Result<Payload, ConstructError> {
    let mut augmented = payload.clone();
    inject(&mut augmented, lambda_context())?;
    Ok(augmented)
}

/// Copies `input` and adds the trace context for a `StartExecution` task, so
/// the parent execution's trace continues into the child execution.
pub fn build_task_input(input: &Payload) -> Result<Payload, ConstructError> {
    let mut augmented = input.clone();
    inject(&mut augmented, execution_context())?;
    Ok(augmented)
}

/// Removes the injected trace context, returning the caller's original keys.
pub fn strip_trace_context<E: Extractor>(mut carrier: E) -> E {
    carrier.take(TRACE_CONTEXT_KEY);
    carrier
}
