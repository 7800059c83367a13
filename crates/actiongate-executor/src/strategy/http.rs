//! HTTP actions.
//!
//! Content is a JSON object:
//!
//! ```json
//! {"url": "https://host/path/{id}", "method": "GET", "headers": {}, "data": {"q": "{term}"}}
//! ```
//!
//! `data` goes out as a JSON body for `POST`, `PUT` and `PATCH`, and as query
//! parameters for every other method.

use std::collections::BTreeMap;

use actiongate_core::Parameters;
use reqwest::{Method, header::CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{StrategyContext, empty_object, is_success_status, parse_content};
use crate::{
    Completed, ExecutionError,
    template::{substitute, substitute_top_level},
};

#[derive(Debug, Deserialize)]
struct HttpConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default = "empty_object")]
    data: Value,
}

fn default_method() -> String {
    "GET".into()
}

/// Send the configured request and report status, headers and body.
///
/// # Errors
/// Returns `MalformedConfig` without sending anything when the content is
/// invalid, `Timeout` on deadline expiry and `Transport` for network errors.
/// A non-2xx status is a completed run with an `HttpStatus` failure.
pub async fn run(
    ctx: &StrategyContext<'_>,
    content: &str,
    params: &Parameters,
) -> Result<Completed, ExecutionError> {
    let HttpConfig {
        url,
        method,
        headers,
        mut data,
    } = parse_content(content)?;

    if !data.is_object() {
        return Err(ExecutionError::MalformedConfig(
            "data must be a JSON object".into(),
        ));
    }
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ExecutionError::MalformedConfig(format!("invalid HTTP method: {method}")))?;

    let url = substitute(&url, params);
    substitute_top_level(&mut data, params);

    let mut request = ctx
        .client
        .request(method.clone(), &url)
        .timeout(ctx.deadline.remaining());
    for (name, value) in &headers {
        request = request.header(name, value);
    }

    request = if sends_body(&method) {
        let body = serde_json::to_vec(&data).map_err(|e| {
            ExecutionError::MalformedConfig(format!("data cannot be encoded as JSON: {e}"))
        })?;
        if !has_header(&headers, CONTENT_TYPE.as_str()) {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        request.body(body)
    } else {
        request.query(&query_pairs(&data))
    };

    tracing::debug!(%method, %url, "Sending HTTP action request");
    let response = ctx.deadline.bound(request.send()).await??;

    let status = response.status().as_u16();
    let response_headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = ctx.deadline.bound(response.text()).await??;

    let output = serde_json::to_string_pretty(&json!({
        "status_code": status,
        "headers": response_headers,
        "body": body,
    }))
    .map_err(|e| ExecutionError::Transport(format!("failed to encode response: {e}")))?;

    if is_success_status(status) {
        Ok(Completed::success(output))
    } else {
        Ok(Completed::failure(output, ExecutionError::HttpStatus(status)))
    }
}

fn sends_body(method: &Method) -> bool {
    *method == Method::POST || *method == Method::PUT || *method == Method::PATCH
}

pub(crate) fn has_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}

fn query_pairs(data: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = data else {
        return Vec::new();
    };
    map.iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect()
}
