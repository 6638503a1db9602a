use std::collections::BTreeMap;

use modular_types::module::ParameterMeta;
use serde_json::{Map, Value};

use crate::{
    error::{Error, ErrorType},
    registry::CommandMeta,
};

/// Type-check, merge and default the parameters of one call. Body values
/// arrive typed, query values arrive as text and are coerced against the
/// declared parameter kind. Unknown options are rejected.
pub fn normalize_params(
    meta: &CommandMeta,
    query: &BTreeMap<String, String>,
    body: &Map<String, Value>,
) -> Result<Map<String, Value>, Error> {
    let declared: BTreeMap<&str, &ParameterMeta> = meta
        .spec
        .parameters
        .iter()
        .map(|p| (p.name.as_str(), p))
        .collect();

    for name in body.keys() {
        if !declared.contains_key(name.as_str()) {
            return Err(unknown_option(meta, name));
        }
    }

    let mut params = body.clone();
    for (name, raw) in query {
        let Some(parameter) = declared.get(name.as_str()) else {
            return Err(unknown_option(meta, name));
        };
        if params.contains_key(name) {
            return Err(ErrorType::InvalidPayload(format!(
                "Option `{name}` was supplied both in the body and the query"
            ))
            .into());
        }
        let value = parameter.kind.coerce(raw).ok_or_else(|| {
            Error::from(ErrorType::InvalidPayload(format!(
                "Option `{name}` does not parse as {:?}",
                parameter.kind
            )))
        })?;
        params.insert(name.clone(), value);
    }

    for parameter in &meta.spec.parameters {
        match params.get(&parameter.name) {
            Some(value) => {
                if !parameter.kind.accepts(value) {
                    return Err(ErrorType::InvalidPayload(format!(
                        "Option `{}` has the wrong type, expected {:?}",
                        parameter.name, parameter.kind
                    ))
                    .into());
                }
            }
            None => {
                if let Some(default) = parameter.default.as_ref() {
                    params.insert(parameter.name.clone(), default.clone());
                } else if parameter.required {
                    return Err(ErrorType::InvalidPayload(format!(
                        "Required option `{}` is missing",
                        parameter.name
                    ))
                    .into());
                }
            }
        }
    }

    Ok(params)
}

fn unknown_option(meta: &CommandMeta, name: &str) -> Error {
    ErrorType::InvalidPayload(format!(
        "Unknown option `{name}` for command `{}`",
        meta.command_name()
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use hyper::Method;
    use modular_types::module::{
        AuthMode, CommandRoute, CommandSpec, ParameterKind, ParameterMeta,
    };
    use serde_json::json;

    use super::*;

    fn meta() -> CommandMeta {
        CommandMeta {
            module: "m3admin".into(),
            command_path: vec!["tenant".into(), "describe".into()],
            spec: CommandSpec {
                name: "describe".into(),
                description: None,
                parameters: vec![
                    ParameterMeta {
                        name: "region".into(),
                        kind: ParameterKind::String,
                        required: true,
                        default: None,
                        help: None,
                    },
                    ParameterMeta {
                        name: "limit".into(),
                        kind: ParameterKind::Integer,
                        required: false,
                        default: Some(json!(10)),
                        help: None,
                    },
                    ParameterMeta {
                        name: "verbose".into(),
                        kind: ParameterKind::Boolean,
                        required: false,
                        default: None,
                        help: None,
                    },
                ],
                route: CommandRoute {
                    method: Method::GET,
                    path: "/tenant/describe".into(),
                    auth: AuthMode::Required,
                },
                describe: true,
            },
            service_url: "http://m3admin:8000".into(),
            route_path: "/m3admin/tenant/describe".into(),
        }
    }

    fn query(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn coerces_query_and_fills_defaults() {
        let params = normalize_params(
            &meta(),
            &query(&[("region", "eu-central-1"), ("verbose", "true")]),
            &Map::new(),
        )
        .unwrap();
        assert_eq!(params["region"], json!("eu-central-1"));
        assert_eq!(params["verbose"], json!(true));
        assert_eq!(params["limit"], json!(10));
    }

    #[test]
    fn missing_required_option() {
        let err = normalize_params(&meta(), &query(&[]), &Map::new()).unwrap_err();
        assert!(matches!(err.variant, ErrorType::InvalidPayload(_)));
    }

    #[test]
    fn rejects_unknown_and_duplicate_options() {
        let err =
            normalize_params(&meta(), &query(&[("region", "x"), ("foo", "1")]), &Map::new())
                .unwrap_err();
        assert!(matches!(err.variant, ErrorType::InvalidPayload(_)));

        let mut body = Map::new();
        body.insert("region".into(), json!("eu-central-1"));
        let err = normalize_params(&meta(), &query(&[("region", "eu-west-1")]), &body).unwrap_err();
        assert!(matches!(err.variant, ErrorType::InvalidPayload(_)));
    }

    #[test]
    fn type_checks_body_values() {
        let mut body = Map::new();
        body.insert("region".into(), json!(5));
        let err = normalize_params(&meta(), &query(&[]), &body).unwrap_err();
        assert!(matches!(err.variant, ErrorType::InvalidPayload(_)));

        let err = normalize_params(&meta(), &query(&[("limit", "ten")]), &Map::new()).unwrap_err();
        assert!(matches!(err.variant, ErrorType::InvalidPayload(_)));
    }
}
