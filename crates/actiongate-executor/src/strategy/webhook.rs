//! Webhook actions: POST a templated JSON payload.

use std::collections::BTreeMap;

use actiongate_core::Parameters;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{StrategyContext, empty_object, http::has_header, is_success_status, parse_content};
use crate::{
    Completed, ExecutionError, WebhookTemplating,
    template::{substitute, substitute_leaves, substitute_raw_json},
};

#[derive(Debug, Deserialize)]
struct WebhookConfig {
    url: String,
    #[serde(default = "empty_object")]
    payload: Value,
    #[serde(default = "default_headers")]
    headers: BTreeMap<String, String>,
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([(CONTENT_TYPE.as_str().to_string(), "application/json".to_string())])
}

/// Deliver the payload and report the receiver's response.
///
/// # Errors
/// Returns `MalformedConfig` for invalid content (or a payload that is no
/// longer JSON in raw-text mode), `Timeout` on expiry and `Transport` for
/// network errors. A non-2xx status is a completed run with a failure.
pub async fn run(
    ctx: &StrategyContext<'_>,
    content: &str,
    params: &Parameters,
) -> Result<Completed, ExecutionError> {
    let WebhookConfig {
        url,
        payload,
        headers,
    } = parse_content(content)?;

    let url = substitute(&url, params);
    let payload = match ctx.config.webhook_templating {
        WebhookTemplating::StringLeaves => substitute_leaves(&payload, params),
        WebhookTemplating::RawText => substitute_raw_json(&payload, params)?,
    };
    let body = serde_json::to_vec(&payload).map_err(|e| {
        ExecutionError::MalformedConfig(format!("payload cannot be encoded as JSON: {e}"))
    })?;

    let mut request = ctx
        .client
        .post(&url)
        .timeout(ctx.deadline.remaining());
    for (name, value) in &headers {
        request = request.header(name, value);
    }
    if !has_header(&headers, CONTENT_TYPE.as_str()) {
        request = request.header(CONTENT_TYPE, "application/json");
    }

    tracing::debug!(%url, "Delivering webhook");
    let response = ctx.deadline.bound(request.body(body).send()).await??;
    let status = response.status().as_u16();
    let response_body = ctx.deadline.bound(response.text()).await??;

    let output = serde_json::to_string_pretty(&json!({
        "webhook_url": url,
        "status_code": status,
        "response": response_body,
    }))
    .map_err(|e| ExecutionError::Transport(format!("failed to encode response: {e}")))?;

    if is_success_status(status) {
        Ok(Completed::success(output))
    } else {
        Ok(Completed::failure(output, ExecutionError::HttpStatus(status)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockito::Matcher;

    use super::*;
    use crate::{Deadline, ExecutorConfig};

    async fn deliver(
        config: &ExecutorConfig,
        content: &str,
        params: &Parameters,
    ) -> Result<Completed, ExecutionError> {
        let client = reqwest::Client::new();
        let ctx = StrategyContext {
            config,
            client: &client,
            deadline: Deadline::after(Duration::from_secs(10)),
        };
        run(&ctx, content, params).await
    }

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_leaf_templating_keeps_payload_valid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/notify/build")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "text": "deploy said \"done\"",
                "meta": {"tags": ["build", 1]}
            })))
            .with_status(202)
            .with_body("accepted")
            .create_async()
            .await;

        let content = json!({
            "url": format!("{}/notify/{{channel}}", server.url()),
            "payload": {"text": "deploy said {msg}", "meta": {"tags": ["{channel}", 1]}}
        })
        .to_string();
        let completed = deliver(
            &ExecutorConfig::default(),
            &content,
            &params(&[("msg", "\"done\""), ("channel", "build")]),
        )
        .await
        .unwrap();

        mock.assert_async().await;
        assert!(completed.failure.is_none());
        let output: Value = serde_json::from_str(&completed.output).unwrap();
        assert_eq!(output["status_code"], 202);
        assert_eq!(output["response"], "accepted");
        assert_eq!(
            output["webhook_url"],
            format!("{}/notify/build", server.url())
        );
    }

    #[tokio::test]
    async fn test_raw_text_templating_can_fill_non_string_positions() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/raw")
            .match_body(Matcher::Json(json!({"id-7": "7"})))
            .with_status(200)
            .create_async()
            .await;

        let config = ExecutorConfig::default().with_webhook_templating(WebhookTemplating::RawText);
        let content = json!({
            "url": format!("{}/raw", server.url()),
            "payload": {"id-{n}": "{n}"}
        })
        .to_string();
        let completed = deliver(&config, &content, &params(&[("n", "7")]))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(completed.failure.is_none());
    }

    #[tokio::test]
    async fn test_raw_text_templating_rejects_broken_json() {
        let config = ExecutorConfig::default().with_webhook_templating(WebhookTemplating::RawText);
        let content = json!({"url": "http://127.0.0.1:9/", "payload": {"text": "{msg}"}}).to_string();
        let err = deliver(&config, &content, &params(&[("msg", "a\"b")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::MalformedConfig(_)));
    }

    #[tokio::test]
    async fn test_custom_headers_and_failure_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_header("x-signature", "s3cret")
            .match_header("content-type", "application/json")
            .with_status(404)
            .with_body("nope")
            .create_async()
            .await;

        let content = json!({
            "url": format!("{}/", server.url()),
            "headers": {"X-Signature": "s3cret"}
        })
        .to_string();
        let completed = deliver(&ExecutorConfig::default(), &content, &Parameters::new())
            .await
            .unwrap();
        assert!(matches!(
            completed.failure,
            Some(ExecutionError::HttpStatus(404))
        ));
        assert!(completed.output.contains("nope"));
    }
}
