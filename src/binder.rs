//! Request binder: turns a validated [`Invocation`] into an [`HttpRequest`].
//!
//! Binding is a pure function of the invocation and the endpoint, so binding
//! the same invocation twice yields equal requests with identical payload
//! bytes.

use crate::api::{BindingSpec, ParamType, TimestampFormat};
use crate::error::{ApiError, Result};
use crate::invocation::{BoundParam, Invocation, TemplatePart};
use crate::message::{HttpRequest, Payload};
use crate::validation::type_name;
use serde_json::Value;
use std::collections::HashMap;
use time::OffsetDateTime;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use url::Url;

const COERCION: &str = "coercion";

fn mismatch(param: &BoundParam, expected: &'static str, value: &Value) -> ApiError {
    ApiError::TypeMismatch {
        parameter: param.name.clone(),
        validator: COERCION.to_string(),
        expected,
        found: type_name(value),
    }
}

fn parse_timestamp(param: &BoundParam, value: &Value) -> Result<OffsetDateTime> {
    match value {
        Value::String(s) => OffsetDateTime::parse(s, &Rfc3339).map_err(|e| {
            ApiError::InvalidArgument {
                parameter: param.name.clone(),
                validator: COERCION.to_string(),
                reason: format!("'{}' is not an RFC 3339 timestamp: {}", s, e),
            }
        }),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
            .ok_or_else(|| ApiError::InvalidArgument {
                parameter: param.name.clone(),
                validator: COERCION.to_string(),
                reason: format!("{} is not a valid epoch timestamp", n),
            }),
        other => Err(mismatch(param, "timestamp", other)),
    }
}

fn format_timestamp(param: &BoundParam, ts: OffsetDateTime, format: TimestampFormat) -> Result<String> {
    let rendered = match format {
        TimestampFormat::Rfc3339 => ts.format(&Rfc3339),
        TimestampFormat::Rfc2822 => ts.format(&Rfc2822),
        TimestampFormat::EpochSeconds => return Ok(ts.unix_timestamp().to_string()),
    };
    rendered.map_err(|e| ApiError::InvalidArgument {
        parameter: param.name.clone(),
        validator: COERCION.to_string(),
        reason: e.to_string(),
    })
}

/// Render one non-null scalar under the parameter's declared type.
fn render_text(param: &BoundParam, value: &Value) -> Result<String> {
    match (param.param_type, value) {
        (ParamType::String | ParamType::Bytes, Value::String(s)) => Ok(s.clone()),
        (ParamType::String, Value::Number(n)) => Ok(n.to_string()),
        (ParamType::String, Value::Bool(b)) => Ok(b.to_string()),
        (ParamType::String | ParamType::Bytes, other) => Err(mismatch(param, "string", other)),
        (ParamType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        (ParamType::Integer, other) => Err(mismatch(param, "integer", other)),
        (ParamType::Boolean, Value::Bool(b)) => Ok(b.to_string()),
        (ParamType::Boolean, other) => Err(mismatch(param, "boolean", other)),
        (ParamType::Timestamp(format), v) => {
            let ts = parse_timestamp(param, v)?;
            format_timestamp(param, ts, format)
        }
        (ParamType::Json, v) => serde_json::to_string(v).map_err(|e| ApiError::InvalidArgument {
            parameter: param.name.clone(),
            validator: COERCION.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Render a header or query argument. Null yields nothing; arrays yield one
/// value per element unless the parameter is declared as JSON.
fn render_values(param: &BoundParam, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) if param.param_type != ParamType::Json => items
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| render_text(param, v))
            .collect(),
        v => Ok(vec![render_text(param, v)?]),
    }
}

fn render_payload(param: &BoundParam, content_type: &str, value: &Value) -> Result<Payload> {
    let bytes = match (param.param_type, value) {
        (ParamType::Json, v) => serde_json::to_vec(v).map_err(|e| ApiError::InvalidArgument {
            parameter: param.name.clone(),
            validator: COERCION.to_string(),
            reason: e.to_string(),
        })?,
        (ParamType::Bytes, Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| mismatch(param, "byte", item))
            })
            .collect::<Result<Vec<u8>>>()?,
        (_, v) => render_text(param, v)?.into_bytes(),
    };
    Ok(Payload::new(bytes, content_type))
}

/// Binds invocations against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct RequestBinder {
    endpoint: Url,
}

impl RequestBinder {
    /// `endpoint` is the service base; operation path templates are appended to
    /// its path.
    pub fn new(endpoint: Url) -> Result<Self> {
        if endpoint.cannot_be_a_base() {
            return Err(ApiError::Config(format!(
                "Endpoint '{}' cannot be used as a base URL",
                endpoint
            )));
        }
        Ok(Self { endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn bind(&self, invocation: &Invocation) -> Result<HttpRequest> {
        let operation = invocation.operation();
        let mut path_values: HashMap<&str, (&str, String)> = HashMap::new();
        let mut headers: Vec<(String, String)> = operation
            .headers()
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();
        let mut query = Vec::new();
        let mut payload = None;

        for (param, value) in invocation.bound_args() {
            match &param.binding {
                BindingSpec::Path(slot) => {
                    if value.is_null() {
                        return Err(ApiError::MissingPathParameter(slot.clone()));
                    }
                    path_values.insert(slot.as_str(), (param.name.as_str(), render_text(param, value)?));
                }
                BindingSpec::Header(name) => {
                    for v in render_values(param, value)? {
                        headers.push((name.clone(), v));
                    }
                }
                BindingSpec::Query(key) => {
                    for v in render_values(param, value)? {
                        query.push((key.clone(), v));
                    }
                }
                BindingSpec::Payload(content_type) => {
                    if !value.is_null() {
                        payload = Some(render_payload(param, content_type, value)?);
                    }
                }
            }
        }

        let endpoint = self.expand_path(invocation, &path_values)?;
        let mut builder = HttpRequest::builder(operation.method().clone(), endpoint);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        for (key, value) in query {
            builder = builder.query(key, value);
        }
        let request = builder.payload(payload).build();

        tracing::debug!(
            operation = %operation.name(),
            method = %request.method(),
            url = %request.url(),
            "Bound request"
        );
        Ok(request)
    }

    /// Split the template into path segments, substitute slots, and push each
    /// segment onto the endpoint so it is percent-encoded as a whole.
    ///
    /// A segment that a slot turns into `.` or `..` is rejected. URLs treat
    /// those (and their `%2E` spellings) as dot segments, so they cannot be
    /// sent as literal values.
    fn expand_path(
        &self,
        invocation: &Invocation,
        values: &HashMap<&str, (&str, String)>,
    ) -> Result<Url> {
        let mut segments = vec![String::new()];
        let mut sources: Vec<Option<&str>> = vec![None];
        for part in invocation.operation().template().parts() {
            match part {
                TemplatePart::Literal(text) => {
                    for (i, piece) in text.split('/').enumerate() {
                        if i > 0 {
                            segments.push(String::new());
                            sources.push(None);
                        }
                        if let Some(current) = segments.last_mut() {
                            current.push_str(piece);
                        }
                    }
                }
                TemplatePart::Slot(slot) => {
                    let (parameter, value) = values
                        .get(slot.as_str())
                        .ok_or_else(|| ApiError::MissingPathParameter(slot.clone()))?;
                    if let Some(current) = segments.last_mut() {
                        current.push_str(value);
                    }
                    if let Some(source) = sources.last_mut() {
                        *source = Some(*parameter);
                    }
                }
            }
        }

        for (segment, source) in segments.iter().zip(&sources) {
            if let Some(parameter) = source
                && matches!(segment.as_str(), "." | "..")
            {
                return Err(ApiError::InvalidArgument {
                    parameter: parameter.to_string(),
                    validator: COERCION.to_string(),
                    reason: format!("'{}' cannot be sent as a path segment", segment),
                });
            }
        }

        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.set_fragment(None);
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                ApiError::Config(format!("Endpoint '{}' cannot be used as a base URL", self.endpoint))
            })?;
            path.pop_if_empty();
            // The template starts with '/', so the first segment is always empty.
            for segment in segments.iter().skip(1) {
                path.push(segment);
            }
        }
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::OperationSpec;
    use crate::invocation::Operation;
    use crate::validation::ValidatorRegistry;
    use serde_json::json;
    use std::sync::Arc;

    fn binder() -> RequestBinder {
        RequestBinder::new(Url::parse("https://route53.amazonaws.com/").unwrap()).unwrap()
    }

    fn invocation(spec: serde_json::Value, args: Vec<Value>) -> Invocation {
        let spec: OperationSpec = serde_json::from_value(spec).unwrap();
        let op = Operation::resolve(&spec, &ValidatorRegistry::with_builtins()).unwrap();
        Invocation::new(Arc::new(op), args).unwrap()
    }

    fn change_rrsets(args: Vec<Value>) -> Invocation {
        invocation(
            json!({
                "name": "ChangeResourceRecordSets",
                "provider": "aws/route53",
                "method": "POST",
                "path": "/2012-02-29/hostedzone/{zoneId}/rrset",
                "headers": [{ "name": "Host", "value": "route53.amazonaws.com" }],
                "params": [
                    { "name": "zoneId", "binding": { "path": "zoneId" } },
                    { "name": "batch", "binding": { "payload": "application/xml" } }
                ]
            }),
            args,
        )
    }

    #[test]
    fn binds_path_and_payload() {
        let inv = change_rrsets(vec![json!("Z1PA6795UKMFR9"), json!("<ChangeBatch/>")]);
        let request = binder().bind(&inv).unwrap();

        assert_eq!(*request.method(), http::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://route53.amazonaws.com/2012-02-29/hostedzone/Z1PA6795UKMFR9/rrset"
        );
        assert_eq!(request.headers().first("host"), Some("route53.amazonaws.com"));
        let payload = request.payload().unwrap();
        assert_eq!(payload.bytes(), b"<ChangeBatch/>");
        assert_eq!(payload.content_type(), "application/xml");
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let inv = change_rrsets(vec![json!("a b/c?d"), Value::Null]);
        let request = binder().bind(&inv).unwrap();
        assert_eq!(
            request.endpoint().path(),
            "/2012-02-29/hostedzone/a%20b%2Fc%3Fd/rrset"
        );
        assert!(request.payload().is_none());
    }

    #[test]
    fn null_path_argument_is_missing_path_parameter() {
        let inv = change_rrsets(vec![Value::Null, json!("<x/>")]);
        assert_eq!(
            binder().bind(&inv).unwrap_err(),
            ApiError::MissingPathParameter("zoneId".to_string())
        );
    }

    #[test]
    fn endpoint_base_path_is_kept() {
        let binder =
            RequestBinder::new(Url::parse("https://api.example.com/v2/").unwrap()).unwrap();
        let inv = change_rrsets(vec![json!("Z1"), Value::Null]);
        let request = binder.bind(&inv).unwrap();
        assert_eq!(
            request.endpoint().path(),
            "/v2/2012-02-29/hostedzone/Z1/rrset"
        );
    }

    #[test]
    fn repeated_headers_keep_argument_order() {
        let inv = invocation(
            json!({
                "name": "Tag",
                "method": "PUT",
                "path": "/tags",
                "params": [
                    { "name": "first", "binding": { "header": "X-Tag" } },
                    { "name": "skip", "binding": { "header": "X-Other" } },
                    { "name": "second", "binding": { "header": "X-Tag" } }
                ]
            }),
            vec![json!("a"), Value::Null, json!(["b", "c"])],
        );
        let request = binder().bind(&inv).unwrap();
        assert_eq!(
            request.headers().get_all("X-Tag").collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert!(request.headers().first("X-Other").is_none());
    }

    #[test]
    fn null_query_arguments_are_omitted() {
        let inv = invocation(
            json!({
                "name": "ListZones",
                "method": "GET",
                "path": "/hostedzone",
                "params": [
                    { "name": "marker", "binding": { "query": "marker" } },
                    { "name": "maxitems", "binding": { "query": "maxitems" }, "type": "integer" },
                    { "name": "verbose", "binding": { "query": "verbose" }, "type": "boolean" }
                ]
            }),
            vec![Value::Null, json!(10), json!(true)],
        );
        let request = binder().bind(&inv).unwrap();
        assert_eq!(
            request.query(),
            &[
                ("maxitems".to_string(), "10".to_string()),
                ("verbose".to_string(), "true".to_string())
            ]
        );
    }

    #[test]
    fn timestamps_render_in_declared_format() {
        let inv = invocation(
            json!({
                "name": "History",
                "method": "GET",
                "path": "/history",
                "params": [
                    { "name": "since", "binding": { "query": "since" }, "type": { "timestamp": "epoch_seconds" } },
                    { "name": "until", "binding": { "query": "until" }, "type": { "timestamp": "rfc3339" } },
                    { "name": "date", "binding": { "header": "Date" }, "type": { "timestamp": "rfc2822" } }
                ]
            }),
            vec![
                json!("2013-01-22T03:29:03Z"),
                json!(1358825343),
                json!(1358825343),
            ],
        );
        let request = binder().bind(&inv).unwrap();
        assert_eq!(request.query()[0].1, "1358825343");
        assert_eq!(request.query()[1].1, "2013-01-22T03:29:03Z");
        assert_eq!(
            request.headers().first("Date"),
            Some("Tue, 22 Jan 2013 03:29:03 +0000")
        );
    }

    #[test]
    fn wrong_type_is_coercion_mismatch() {
        let inv = invocation(
            json!({
                "name": "ListZones",
                "method": "GET",
                "path": "/hostedzone",
                "params": [
                    { "name": "maxitems", "binding": { "query": "maxitems" }, "type": "integer" }
                ]
            }),
            vec![json!("ten")],
        );
        let err = binder().bind(&inv).unwrap_err();
        assert!(matches!(
            err,
            ApiError::TypeMismatch {
                expected: "integer",
                found: "string",
                ..
            }
        ));
    }

    #[test]
    fn json_payload_is_compact() {
        let inv = invocation(
            json!({
                "name": "CreateZone",
                "method": "POST",
                "path": "/zones",
                "params": [
                    { "name": "body", "binding": { "payload": "application/json" }, "type": "json" }
                ]
            }),
            vec![json!({ "name": "example.com." })],
        );
        let request = binder().bind(&inv).unwrap();
        assert_eq!(
            request.payload().unwrap().bytes(),
            br#"{"name":"example.com."}"#
        );
    }

    #[test]
    fn binding_is_idempotent() {
        let inv = change_rrsets(vec![json!("Z1PA6795UKMFR9"), json!("<ChangeBatch/>")]);
        let binder = binder();
        let first = binder.bind(&inv).unwrap();
        let second = binder.bind(&inv).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.payload().unwrap().bytes(),
            second.payload().unwrap().bytes()
        );
    }

    #[test]
    fn dot_path_segments_are_rejected() {
        for dots in [".", ".."] {
            let inv = change_rrsets(vec![json!(dots), Value::Null]);
            match binder().bind(&inv).unwrap_err() {
                ApiError::InvalidArgument {
                    parameter,
                    validator,
                    ..
                } => {
                    assert_eq!(parameter, "zoneId");
                    assert_eq!(validator, "coercion");
                }
                other => panic!("expected invalid argument for {dots:?}, got {other:?}"),
            }
        }
        let inv = change_rrsets(vec![json!(".hidden"), Value::Null]);
        assert_eq!(
            binder().bind(&inv).unwrap().endpoint().path(),
            "/2012-02-29/hostedzone/.hidden/rrset"
        );
    }

    fn upload(args: Vec<Value>) -> Invocation {
        invocation(
            json!({
                "name": "Upload",
                "method": "PUT",
                "path": "/blobs",
                "params": [
                    { "name": "data", "binding": { "payload": "application/octet-stream" }, "type": "bytes" }
                ]
            }),
            args,
        )
    }

    #[test]
    fn byte_array_becomes_payload_bytes() {
        let request = binder().bind(&upload(vec![json!([0, 7, 255])])).unwrap();
        let payload = request.payload().unwrap();
        assert_eq!(payload.bytes(), &[0u8, 7, 255]);
        assert_eq!(payload.content_type(), "application/octet-stream");
    }

    #[test]
    fn out_of_range_byte_is_mismatch() {
        let err = binder().bind(&upload(vec![json!([1, 256])])).unwrap_err();
        assert!(matches!(
            err,
            ApiError::TypeMismatch {
                expected: "byte",
                found: "integer",
                ..
            }
        ));
        let err = binder().bind(&upload(vec![json!(["a"])])).unwrap_err();
        assert!(matches!(err, ApiError::TypeMismatch { expected: "byte", .. }));
    }

    #[test]
    fn rejects_non_base_endpoint() {
        assert!(RequestBinder::new(Url::parse("mailto:ops@example.com").unwrap()).is_err());
    }
}
