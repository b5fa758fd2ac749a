// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration resolution.
//!
//! Each pipeline accepts a sparse "raw" props struct in which every field is
//! optional. Resolution layers three sources, in increasing precedence:
//!
//! 1. library-wide defaults (`library_defaults()` on each raw type),
//! 2. construct-level defaults supplied by the caller,
//! 3. the explicit raw values.
//!
//! The merged raw value is then validated and turned into a "strict" struct in
//! which every defaultable field is concrete. Resolution performs no I/O;
//! environment driven switches are read once into [`ValidationOptions`].

pub mod api_key;
pub mod cardinality;
pub mod ecs;
pub mod lambda;
pub mod step_functions;

use std::env;

use crate::constants::{BYPASS_SITE_VALIDATION_ENV_VAR, BYPASS_VALIDATION_ENV_VAR, SITE_LIST};
use crate::diagnostics::Diagnostics;
use crate::error::ConstructError;

/// Helper macro to merge `Option<T>` fields where T implements Clone
///
/// The target field is only replaced when the source holds a value.
#[macro_export]
macro_rules! merge_option {
    ($config:expr, $config_field:ident, $source:expr, $source_field:ident) => {
        if $source.$source_field.is_some() {
            $config.$config_field.clone_from(&$source.$source_field);
        }
    };
    ($config:expr, $source:expr, $field:ident) => {
        if $source.$field.is_some() {
            $config.$field.clone_from(&$source.$field);
        }
    };
}

/// Applies [`merge_option!`] to every listed field
#[macro_export]
macro_rules! merge_options {
    ($config:expr, $source:expr, [$($field:ident),* $(,)?]) => {
        $( $crate::merge_option!($config, $source, $field); )*
    };
}

/// Helper macro to deep merge nested `Option<T>` records where T implements [`Merge`]
///
/// When both sides hold a record the fields are merged one by one; otherwise the
/// source record is cloned over.
#[macro_export]
macro_rules! merge_nested {
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(source_value) = &$source.$field {
            match &mut $config.$field {
                Some(config_value) => $crate::config::Merge::merge(config_value, source_value),
                None => $config.$field = Some(source_value.clone()),
            }
        }
    };
}

/// Helper macro to merge `HashMap` fields key by key, source keys winning
#[macro_export]
macro_rules! merge_hashmap {
    ($config:expr, $source:expr, $field:ident) => {
        if let Some(source_map) = &$source.$field {
            let target = $config.$field.get_or_insert_with(Default::default);
            for (key, value) in source_map {
                target.insert(key.clone(), value.clone());
            }
        }
    };
}

/// Field-by-field merge of two sparse records; values set in `other` win.
pub trait Merge {
    fn merge(&mut self, other: &Self);
}

/// Switches read from the process environment that relax validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    pub bypass_site_validation: bool,
    pub bypass_validation: bool,
}

impl ValidationOptions {
    /// Reads `DD_CDK_BYPASS_SITE_VALIDATION` and `DD_CDK_BYPASS_VALIDATION`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            bypass_site_validation: env_flag(BYPASS_SITE_VALIDATION_ENV_VAR),
            bypass_validation: env_flag(BYPASS_VALIDATION_ENV_VAR),
        }
    }
}

fn env_flag(key: &str) -> bool {
    env::var(key)
        .map(|val| !val.is_empty() && val.to_lowercase() != "false")
        .unwrap_or(false)
}

/// Outcome of a successful resolution: the strict props and every non-fatal
/// finding raised along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub props: T,
    pub diagnostics: Diagnostics,
}

/// Implemented by every raw props type.
pub trait Resolve: Sized + Clone + Merge {
    type Strict;

    /// Built-in defaults applied underneath everything else.
    fn library_defaults() -> Self;

    /// Validates an already merged raw config and produces strict props.
    fn finalize(
        merged: Self,
        options: &ValidationOptions,
    ) -> Result<Resolved<Self::Strict>, ConstructError>;

    /// Merges `self` over `defaults` over the library defaults and validates the result.
    fn resolve(
        &self,
        defaults: &Self,
        options: &ValidationOptions,
    ) -> Result<Resolved<Self::Strict>, ConstructError> {
        let mut merged = Self::library_defaults();
        merged.merge(defaults);
        merged.merge(self);
        Self::finalize(merged, options)
    }
}

/// Accepts a known Datadog site or an unresolved deployment token.
pub fn validate_site(site: &str, options: &ValidationOptions) -> Result<(), ConstructError> {
    if options.bypass_site_validation || is_token(site) {
        return Ok(());
    }
    let site = site.to_lowercase();
    if SITE_LIST.contains(&site.as_str()) {
        return Ok(());
    }
    Err(ConstructError::config(format!(
        "Warning: Invalid site URL. Must be one of: {}.",
        SITE_LIST.join(", ")
    )))
}

/// True for values that are placeholders resolved at deploy time.
#[must_use]
pub fn is_token(value: &str) -> bool {
    value.starts_with("${Token[") && value.ends_with("]}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use duplicate::duplicate_item;
    use serial_test::serial;

    #[duplicate_item(
        test_name                    site;
        [test_accepts_us1_site]      ["datadoghq.com"];
        [test_accepts_eu_site]       ["datadoghq.eu"];
        [test_accepts_us3_site]      ["us3.datadoghq.com"];
        [test_accepts_us5_site]      ["us5.datadoghq.com"];
        [test_accepts_ap1_site]      ["ap1.datadoghq.com"];
        [test_accepts_ap2_site]      ["ap2.datadoghq.com"];
        [test_accepts_gov_site]      ["ddog-gov.com"];
        [test_accepts_uppercase]     ["DATADOGHQ.EU"];
        [test_accepts_token]         ["${Token[TOKEN.123]}"];
    )]
    #[test]
    fn test_name() {
        assert!(validate_site(site, &ValidationOptions::default()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_site() {
        let err = validate_site("datadoge.com", &ValidationOptions::default()).unwrap_err();
        assert!(err
            .to_string()
            .contains("Invalid site URL. Must be one of: datadoghq.com"));
    }

    #[test]
    fn test_bypass_site_validation() {
        let options = ValidationOptions {
            bypass_site_validation: true,
            ..Default::default()
        };
        assert!(validate_site("example.com", &options).is_ok());
    }

    #[test]
    #[serial]
    fn test_validation_options_from_env() {
        env::set_var(BYPASS_SITE_VALIDATION_ENV_VAR, "true");
        env::remove_var(BYPASS_VALIDATION_ENV_VAR);
        let options = ValidationOptions::from_env();
        assert!(options.bypass_site_validation);
        assert!(!options.bypass_validation);
        env::remove_var(BYPASS_SITE_VALIDATION_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_validation_options_false_value() {
        env::set_var(BYPASS_VALIDATION_ENV_VAR, "false");
        let options = ValidationOptions::from_env();
        assert!(!options.bypass_validation);
        env::remove_var(BYPASS_VALIDATION_ENV_VAR);
    }
}
