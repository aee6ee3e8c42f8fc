//! # Classification
//!
//! Renders merged output values as strings and routes each key to either the
//! ConfigMap (non-sensitive) or the Secret (sensitive).
//!
//! The routing rule is a [`SensitivityPolicy`]. The default,
//! [`DeclaredSensitivity`], trusts the `sensitive` flag recorded in the
//! Terraform state. [`SensitiveKeyAllowList`] ignores that flag and treats
//! exactly the configured keys as sensitive.

use super::merge::MergedOutputs;
use crate::config::{ControllerConfig, SensitivityPolicyKind};
use serde_json::{Number, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Decides whether an output belongs in the Secret
pub trait SensitivityPolicy: Send + Sync + std::fmt::Debug {
    fn is_sensitive(&self, key: &str, declared: bool) -> bool;

    /// Policy name for logs
    fn name(&self) -> &'static str;
}

/// Sensitivity as declared in the Terraform state
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredSensitivity;

impl SensitivityPolicy for DeclaredSensitivity {
    fn is_sensitive(&self, _key: &str, declared: bool) -> bool {
        declared
    }

    fn name(&self) -> &'static str {
        "declared"
    }
}

/// A fixed list of sensitive keys
#[derive(Debug, Clone, Default)]
pub struct SensitiveKeyAllowList {
    keys: BTreeSet<String>,
}

impl SensitiveKeyAllowList {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }
}

impl SensitivityPolicy for SensitiveKeyAllowList {
    fn is_sensitive(&self, key: &str, _declared: bool) -> bool {
        self.keys.contains(key)
    }

    fn name(&self) -> &'static str {
        "allow-list"
    }
}

/// Build the policy selected by the controller configuration
#[must_use]
pub fn policy_from_config(config: &ControllerConfig) -> Arc<dyn SensitivityPolicy> {
    match config.sensitivity_policy {
        SensitivityPolicyKind::Declared => Arc::new(DeclaredSensitivity),
        SensitivityPolicyKind::AllowList => {
            Arc::new(SensitiveKeyAllowList::new(config.sensitive_keys.iter().cloned()))
        }
    }
}

/// Render an output value as stored in a ConfigMap or Secret
///
/// Strings are used verbatim. Lists and objects become compact JSON with
/// object keys sorted, so an unchanged value always renders identically.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
        Value::Number(n) => render_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Shortest decimal form; integral floats drop their fraction (`3.0` renders as `3`)
fn render_number(n: &Number) -> String {
    // i64::MAX as f64 rounds up to 2^63, so the bound is exclusive
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < I64_BOUND => {
            #[allow(clippy::cast_possible_truncation, reason = "integral and within i64 range")]
            let integral = f as i64;
            integral.to_string()
        }
        _ => n.to_string(),
    }
}

/// Rendered outputs split by sensitivity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedOutputs {
    pub non_sensitive: BTreeMap<String, String>,
    pub sensitive: BTreeMap<String, String>,
}

/// Split merged outputs into non-sensitive and sensitive data
#[must_use]
pub fn classify(merged: &MergedOutputs, policy: &dyn SensitivityPolicy) -> ClassifiedOutputs {
    let mut classified = ClassifiedOutputs::default();

    for (key, value) in &merged.values {
        let declared = merged.sensitive.get(key).copied().unwrap_or(false);
        let rendered = render_value(value);
        if policy.is_sensitive(key, declared) {
            debug!(key = %key, policy = policy.name(), "Output marked as sensitive");
            classified.sensitive.insert(key.clone(), rendered);
        } else {
            debug!(key = %key, policy = policy.name(), "Output marked as non-sensitive");
            classified.non_sensitive.insert(key.clone(), rendered);
        }
    }

    classified
}
