use std::collections::BTreeSet;

use modular_types::entity::UserMeta;
use serde_json::{Map, Value};

use crate::error::{Error, ErrorType};

/// Enforce the caller's per-option allow-lists and inject auxiliary data.
///
/// Runs after parameter validation, so command defaults have already been
/// materialized: a restricted option whose effective default falls outside
/// the allow-list is rejected like an explicit value. Options absent from
/// the call (and without a default) are unrestricted. Auxiliary data is
/// injected under its option name unless the caller supplied an explicit
/// override, which is itself subject to the same allow-list rules.
pub fn apply_restrictions(meta: &UserMeta, params: &mut Map<String, Value>) -> Result<(), Error> {
    for (option, allowed) in &meta.allowed_values {
        if let Some(value) = params.get(option) {
            if !value_allowed(value, allowed) {
                return Err(ErrorType::RestrictedValue {
                    option: option.clone(),
                    value: render(value),
                }
                .into());
            }
        }
    }

    for (option, aux) in &meta.aux_data {
        if !params.contains_key(option) {
            params.insert(option.clone(), aux.clone());
        }
    }

    Ok(())
}

fn value_allowed(value: &Value, allowed: &BTreeSet<String>) -> bool {
    match value {
        Value::String(s) => allowed.contains(s),
        Value::Bool(_) | Value::Number(_) => allowed.contains(&value.to_string()),
        Value::Array(items) => items.iter().all(|item| value_allowed(item, allowed)),
        Value::Null | Value::Object(_) => false,
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn meta(allowed: &[(&str, &[&str])], aux: &[(&str, Value)]) -> UserMeta {
        UserMeta {
            allowed_values: allowed
                .iter()
                .map(|(k, vs)| {
                    (
                        (*k).to_string(),
                        vs.iter().map(ToString::to_string).collect(),
                    )
                })
                .collect(),
            aux_data: aux
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
        }
    }

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn allows_listed_values_only() {
        let meta = meta(&[("region", &["eu-central-1", "eu-west-1"])], &[]);

        let mut ok = params(&[("region", json!("eu-central-1"))]);
        apply_restrictions(&meta, &mut ok).unwrap();

        let mut bad = params(&[("region", json!("us-east-1"))]);
        let err = apply_restrictions(&meta, &mut bad).unwrap_err();
        match err.variant {
            ErrorType::RestrictedValue { option, value } => {
                assert_eq!(option, "region");
                assert_eq!(value, "us-east-1");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn absent_option_is_unrestricted() {
        let meta = meta(&[("region", &["eu-central-1"])], &[]);
        let mut none = params(&[("limit", json!(5))]);
        apply_restrictions(&meta, &mut none).unwrap();
    }

    #[test]
    fn list_values_check_every_element() {
        let meta = meta(&[("region", &["eu-central-1", "eu-west-1"])], &[]);

        let mut ok = params(&[("region", json!(["eu-central-1", "eu-west-1"]))]);
        apply_restrictions(&meta, &mut ok).unwrap();

        let mut bad = params(&[("region", json!(["eu-central-1", "us-east-1"]))]);
        assert!(apply_restrictions(&meta, &mut bad).is_err());
    }

    #[test]
    fn scalar_values_compare_by_rendering() {
        let meta = meta(&[("limit", &["5", "10"])], &[]);
        let mut ok = params(&[("limit", json!(5))]);
        apply_restrictions(&meta, &mut ok).unwrap();

        let mut bad = params(&[("limit", json!(7))]);
        assert!(apply_restrictions(&meta, &mut bad).is_err());
    }

    #[test]
    fn aux_data_is_injected_unless_overridden() {
        let meta = meta(
            &[("tenant", &["acme", "globex"])],
            &[("tenant", json!("acme")), ("trace", json!(true))],
        );

        let mut empty = params(&[]);
        apply_restrictions(&meta, &mut empty).unwrap();
        assert_eq!(empty["tenant"], json!("acme"));
        assert_eq!(empty["trace"], json!(true));

        // A permitted override wins over the injected value.
        let mut overridden = params(&[("tenant", json!("globex"))]);
        apply_restrictions(&meta, &mut overridden).unwrap();
        assert_eq!(overridden["tenant"], json!("globex"));

        // An override outside the allow-list is rejected.
        let mut bad = params(&[("tenant", json!("initech"))]);
        assert!(apply_restrictions(&meta, &mut bad).is_err());
    }
}
