//! Binds request data to a route's declared parameters.
//!
//! Every coercion from request text to a typed argument happens here, before
//! the handler is called. A binding failure is a `BadRequest` and the handler
//! never runs.

use crate::core::{AppError, AppResult, DocId};
use crate::web::params::{Arg, BoundCall, ParamKind, ParamSpec};
use crate::web::session::SessionHandle;
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// Everything the binder may read for one request.
#[derive(Debug, Clone, Default)]
pub struct RequestData {
    pub captures: HashMap<String, String>,
    pub fields: Map<String, Value>,
    pub session: SessionHandle,
}

/// Query fields overlaid by body fields; the body wins on collision.
pub fn merge_fields(query: Map<String, Value>, body: Map<String, Value>) -> Map<String, Value> {
    let mut merged = query;
    merged.extend(body);
    merged
}

pub fn bind(params: &[ParamSpec], request: &RequestData) -> AppResult<BoundCall> {
    let mut names = Vec::with_capacity(params.len());
    let mut args = Vec::with_capacity(params.len());
    for spec in params {
        names.push(spec.name);
        args.push(bind_one(spec, request)?);
    }
    Ok(BoundCall::new(names, args))
}

fn bind_one(spec: &ParamSpec, request: &RequestData) -> AppResult<Arg> {
    let coerce: fn(&ParamSpec, Value) -> AppResult<Arg> = match spec.kind {
        ParamKind::Session => return Ok(Arg::Session(request.session.clone())),
        ParamKind::Partial => return bind_partial(spec, &request.fields),
        ParamKind::Str => |spec, raw| coerce_str(spec, raw).map(Arg::Str),
        ParamKind::Id => |spec, raw| coerce_id(spec, &raw).map(Arg::Id),
        ParamKind::Int => |spec, raw| coerce_int(spec, &raw).map(Arg::Int),
    };

    let raw = match request.captures.get(spec.name) {
        Some(captured) => Some(Value::String(captured.clone())),
        None => request.fields.get(spec.name).cloned(),
    };
    match raw {
        None | Some(Value::Null) => missing(spec),
        Some(Value::String(text)) if text.is_empty() && spec.optional => Ok(Arg::Absent),
        Some(value) => coerce(spec, value),
    }
}

fn missing(spec: &ParamSpec) -> AppResult<Arg> {
    if spec.optional {
        Ok(Arg::Absent)
    } else {
        Err(
            AppError::bad_request(format!("Missing required parameter '{}'", spec.name))
                .with_details(json!({ "parameter": spec.name })),
        )
    }
}

fn coerce_str(spec: &ParamSpec, raw: Value) -> AppResult<String> {
    match raw {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err(AppError::bad_request(format!(
            "Parameter '{}' must be a string",
            spec.name
        ))),
    }
}

fn coerce_id(spec: &ParamSpec, raw: &Value) -> AppResult<DocId> {
    let parsed = match raw {
        Value::String(text) => DocId::parse(text),
        other => Err(AppError::bad_request(format!("{other} is not a valid id"))),
    };
    parsed.map_err(|err| {
        AppError::bad_request(format!("Invalid id for parameter '{}': {err}", spec.name))
    })
}

fn coerce_int(spec: &ParamSpec, raw: &Value) -> AppResult<i64> {
    let parsed = match raw {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        AppError::bad_request(format!(
            "Parameter '{}' must be an integer, got {raw}",
            spec.name
        ))
    })
}

fn bind_partial(spec: &ParamSpec, fields: &Map<String, Value>) -> AppResult<Arg> {
    let mut object = Map::new();
    let mut seen = false;

    match fields.get(spec.name) {
        None | Some(Value::Null) => {}
        Some(Value::String(text)) if text.is_empty() => {}
        Some(Value::Object(direct)) => {
            seen = true;
            object = direct.clone();
        }
        Some(_) => {
            return Err(AppError::bad_request(format!(
                "Parameter '{}' must be an object",
                spec.name
            )));
        }
    }

    for (key, value) in fields {
        let Some(rest) = key.strip_prefix(spec.name) else {
            continue;
        };
        if !(rest.starts_with('.') || rest.starts_with('[')) {
            continue;
        }
        let segments = split_key(key)?;
        insert_path(&mut object, &segments[1..], value.clone(), key)?;
        seen = true;
    }

    if seen {
        Ok(Arg::Object(object))
    } else {
        missing(spec)
    }
}

/// Splits `a.b[c][0].d` into `["a", "b", "c", "0", "d"]`.
pub fn split_key(key: &str) -> AppResult<Vec<String>> {
    let malformed = || AppError::bad_request(format!("Malformed field name '{key}'"));
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = key.chars();
    // After a closing bracket the next segment may start without a dot.
    let mut after_bracket = false;

    while let Some(ch) = chars.next() {
        match ch {
            '.' => {
                if current.is_empty() && !after_bracket {
                    return Err(malformed());
                }
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                after_bracket = false;
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                } else if segments.is_empty() {
                    return Err(malformed());
                }
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some('[') | None => return Err(malformed()),
                        Some(c) => inner.push(c),
                    }
                }
                if inner.is_empty() {
                    return Err(malformed());
                }
                segments.push(inner);
                after_bracket = true;
            }
            ']' => return Err(malformed()),
            c => {
                if after_bracket && current.is_empty() && !segments.is_empty() {
                    // `a[b]c` has no separator before `c`.
                    return Err(malformed());
                }
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        segments.push(current);
    } else if !after_bracket {
        return Err(malformed());
    }
    Ok(segments)
}

fn insert_path(
    target: &mut Map<String, Value>,
    segments: &[String],
    value: Value,
    key: &str,
) -> AppResult<()> {
    let conflict = || AppError::bad_request(format!("Field '{key}' conflicts with another field"));
    let Some((last, parents)) = segments.split_last() else {
        return Err(conflict());
    };

    let mut node = target;
    for segment in parents {
        let child = node
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        node = match child {
            Value::Object(map) => map,
            _ => return Err(conflict()),
        };
    }

    match (node.get_mut(last), value) {
        (None, value) => {
            node.insert(last.clone(), value);
            Ok(())
        }
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (child_key, child_value) in incoming {
                insert_path(existing, &[child_key], child_value, key)?;
            }
            Ok(())
        }
        (Some(_), _) => Err(conflict()),
    }
}

/// Flattens nested objects into dotted keys under `prefix`.
///
/// Empty objects are kept as leaves. Keys containing `.`, `[` or `]` do not
/// survive a round trip through `unflatten`.
pub fn flatten(prefix: &str, object: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(prefix, object, &mut out);
    out
}

fn flatten_into(prefix: &str, object: &Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in object {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(&path, inner, out),
            other => {
                out.insert(path, other.clone());
            }
        }
    }
}

/// Rebuilds a nested object from dotted or bracketed keys.
pub fn unflatten(fields: &Map<String, Value>) -> AppResult<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in fields {
        let segments = split_key(key)?;
        insert_path(&mut out, &segments, value.clone(), key)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn request(captures: &[(&str, &str)], fields: Value) -> RequestData {
        RequestData {
            captures: captures
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fields: object(fields),
            session: SessionHandle::default(),
        }
    }

    #[test]
    fn binds_in_declaration_order_with_coercion() {
        let id = DocId::new();
        let params = [
            ParamSpec::session(),
            ParamSpec::id("_id"),
            ParamSpec::string("name"),
            ParamSpec::int("duration"),
        ];
        let req = request(
            &[("_id", &id.to_string())],
            json!({ "name": "Song", "duration": "215" }),
        );

        let call = bind(&params, &req).unwrap();
        assert_eq!(call.len(), 4);
        assert!(matches!(call.args()[0], Arg::Session(_)));
        assert_eq!(call.id("_id").unwrap(), id);
        assert_eq!(call.str("name").unwrap(), "Song");
        assert_eq!(call.int("duration").unwrap(), 215);
    }

    #[test]
    fn captures_take_precedence_over_fields() {
        let params = [ParamSpec::string("username")];
        let req = request(&[("username", "from-path")], json!({ "username": "from-body" }));
        assert_eq!(bind(&params, &req).unwrap().str("username").unwrap(), "from-path");
    }

    #[test]
    fn body_overrides_query_on_collision() {
        let merged = merge_fields(
            object(json!({ "a": "query", "b": "query" })),
            object(json!({ "b": "body" })),
        );
        assert_eq!(Value::Object(merged), json!({ "a": "query", "b": "body" }));
    }

    #[test]
    fn malformed_id_is_bad_request() {
        let params = [ParamSpec::id("_id")];
        let err = bind(&params, &request(&[("_id", "not-an-id")], json!({}))).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.starts_with("Invalid id for parameter '_id'")));

        let err = bind(&params, &request(&[], json!({ "_id": 5 }))).unwrap_err();
        assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn missing_required_and_optional() {
        let err = bind(&[ParamSpec::string("username")], &request(&[], json!({}))).unwrap_err();
        assert_eq!(err.to_string(), "Missing required parameter 'username'");

        let params = [
            ParamSpec::string("author").optional(),
            ParamSpec::id("item").optional(),
            ParamSpec::partial("options", &[]).optional(),
        ];
        let call = bind(&params, &request(&[], json!({ "item": "" }))).unwrap();
        assert!(call.args().iter().all(|arg| matches!(arg, Arg::Absent)));
    }

    #[test]
    fn scalar_strings_accept_numbers_but_not_objects() {
        let params = [ParamSpec::string("name")];
        let call = bind(&params, &request(&[], json!({ "name": 42 }))).unwrap();
        assert_eq!(call.str("name").unwrap(), "42");

        let err = bind(&params, &request(&[], json!({ "name": { "x": 1 } }))).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn integers_reject_fractions_and_words() {
        let params = [ParamSpec::int("position")];
        assert_eq!(
            bind(&params, &request(&[], json!({ "position": 2 })))
                .unwrap()
                .int("position")
                .unwrap(),
            2
        );
        assert!(bind(&params, &request(&[], json!({ "position": 2.5 }))).is_err());
        assert!(bind(&params, &request(&[], json!({ "position": "two" }))).is_err());
    }

    #[test]
    fn partial_merges_direct_and_prefixed_fields() {
        let params = [ParamSpec::partial("update", &["content", "options.backgroundColor"])];
        let req = request(
            &[],
            json!({
                "update": { "content": "hi" },
                "update.options.backgroundColor": "red",
                "unrelated": 1,
                "updated": 2
            }),
        );
        let call = bind(&params, &req).unwrap();
        assert_eq!(
            Value::Object(call.object("update").unwrap()),
            json!({ "content": "hi", "options": { "backgroundColor": "red" } })
        );
    }

    #[test]
    fn partial_accepts_bracketed_keys() {
        let params = [ParamSpec::partial("update", &[])];
        let req = request(&[], json!({ "update[options][backgroundColor]": "blue" }));
        let call = bind(&params, &req).unwrap();
        assert_eq!(
            Value::Object(call.object("update").unwrap()),
            json!({ "options": { "backgroundColor": "blue" } })
        );
    }

    #[test]
    fn partial_rejects_scalars_and_conflicts() {
        let params = [ParamSpec::partial("update", &[])];
        assert!(bind(&params, &request(&[], json!({ "update": 3 }))).is_err());

        let req = request(&[], json!({ "update.a": 1, "update.a.b": 2 }));
        assert!(matches!(bind(&params, &req), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn split_key_handles_mixed_notation() {
        assert_eq!(split_key("a.b[c][0].d").unwrap(), vec!["a", "b", "c", "0", "d"]);
        assert_eq!(split_key("plain").unwrap(), vec!["plain"]);
        for bad in ["", "a..b", ".a", "a.", "a[", "a[]", "[a]", "a]b", "a[b]c"] {
            assert!(split_key(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn unflatten_inverts_flatten() {
        let samples = [
            json!({ "a": 1 }),
            json!({ "a": { "b": { "c": "deep" }, "d": [1, 2] }, "e": null }),
            json!({ "options": { "backgroundColor": "red" }, "content": "x", "empty": {} }),
        ];
        for sample in samples {
            let original = object(sample);
            let flat = flatten("", &original);
            assert!(flat.values().all(|v| !matches!(v, Value::Object(m) if !m.is_empty())));
            assert_eq!(unflatten(&flat).unwrap(), original);
        }
    }

    #[test]
    fn flatten_with_prefix() {
        let flat = flatten("update", &object(json!({ "options": { "x": 1 } })));
        assert_eq!(Value::Object(flat), json!({ "update.options.x": 1 }));
    }
}
