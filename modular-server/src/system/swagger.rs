use hyper::Method;
use modular_types::{
    module::{ParameterKind, ParameterMeta},
    response::Response,
};
use serde_json::{json, Map, Value};

use crate::{
    context::Context,
    error::{Error, ErrorType},
    response::SERVER_VERSION,
};

/// The API meta transformed into an OpenAPI v3 document. Disabled when
/// private mode is on.
pub fn handle_swagger(ctx: &Context) -> Result<Response, Error> {
    if ctx.config.enable_private_mode {
        return Err(ErrorType::NotFound("Not found".into()).into());
    }

    let catalog = ctx.registry.catalog();
    let mut paths = Map::new();
    for command in catalog.commands() {
        let method = command.spec.route.method.as_str().to_lowercase();
        let operation = json!({
            "operationId": format!("{}_{}", command.module, command.command_path.join("_")),
            "tags": [command.module],
            "summary": command.spec.description.clone().unwrap_or_default(),
            "parameters": query_parameters(command.spec.route.method.clone(), &command.spec.parameters),
            "requestBody": request_body(command.spec.route.method.clone(), &command.spec.parameters),
            "responses": {
                "200": { "description": "Successful invocation" },
                "403": { "description": "Denied by policy" }
            }
        });
        paths
            .entry(command.route_path.clone())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .map(|entry| entry.insert(method, operation));
    }

    let doc = json!({
        "openapi": "3.0.3",
        "info": {
            "title": "Modular API",
            "version": SERVER_VERSION,
        },
        "paths": paths,
    });
    Ok(Response::Raw(doc))
}

fn schema(kind: ParameterKind) -> Value {
    match kind {
        ParameterKind::String => json!({"type": "string"}),
        ParameterKind::Integer => json!({"type": "integer"}),
        ParameterKind::Boolean => json!({"type": "boolean"}),
        ParameterKind::StringList => json!({"type": "array", "items": {"type": "string"}}),
    }
}

fn query_parameters(method: Method, parameters: &[ParameterMeta]) -> Value {
    if method != Method::GET {
        return json!([]);
    }
    Value::Array(
        parameters
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "in": "query",
                    "required": p.required,
                    "description": p.help.clone().unwrap_or_default(),
                    "schema": schema(p.kind),
                })
            })
            .collect(),
    )
}

fn request_body(method: Method, parameters: &[ParameterMeta]) -> Value {
    if method == Method::GET || parameters.is_empty() {
        return Value::Null;
    }
    let mut properties = Map::new();
    let mut required = vec![];
    for parameter in parameters {
        properties.insert(parameter.name.clone(), schema(parameter.kind));
        if parameter.required {
            required.push(Value::String(parameter.name.clone()));
        }
    }
    json!({
        "content": {
            "application/json": {
                "schema": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        }
    })
}
