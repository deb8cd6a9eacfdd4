//! `http_request` node: call an arbitrary HTTP endpoint.
//!
//! Config: `{url, method?, headers?, body?}`. In test mode the request is
//! described instead of sent.

use std::collections::BTreeMap;
use std::time::Duration;

use chainflow_core::engine::context::ExecutionContext;
use chainflow_core::engine::registry::{ActionError, ActionHandler};
use chainflow_types::workflow::Node;
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct HttpRequestConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

pub struct HttpRequestHandler {
    client: reqwest::Client,
}

impl HttpRequestHandler {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client })
    }
}

impl ActionHandler for HttpRequestHandler {
    fn node_type(&self) -> &str {
        "http_request"
    }

    async fn execute(&self, node: &Node, ctx: &ExecutionContext) -> Result<Value, ActionError> {
        let config: HttpRequestConfig = serde_json::from_value(Value::Object(node.config.clone()))
            .map_err(|e| ActionError::InvalidConfig(e.to_string()))?;
        let method = reqwest::Method::from_bytes(config.method.to_uppercase().as_bytes())
            .map_err(|_| ActionError::InvalidConfig(format!("unsupported method '{}'", config.method)))?;

        if ctx.test_mode {
            return Ok(json!({
                "simulated": true,
                "method": method.as_str(),
                "url": config.url,
                "body": config.body,
            }));
        }

        let mut request = self.client.request(method.clone(), &config.url);
        for (name, value) in &config.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &config.body {
            request = request.json(body);
        }

        tracing::debug!(node_id = %node.id, method = %method, url = %config.url, "http_request");

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::Provider(format!("request to {} failed: {e}", config.url)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ActionError::Provider(format!("failed to read response body: {e}")))?;
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        if !status.is_success() {
            return Err(ActionError::Provider(format!("HTTP {status}: {body}")));
        }

        Ok(json!({ "status": status.as_u16(), "body": body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainflow_types::execution::ExecutionRequest;
    use chainflow_types::workflow::WorkflowGraph;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn context(test_mode: bool) -> ExecutionContext {
        let mut request = ExecutionRequest::new(Uuid::now_v7(), WorkflowGraph::default(), json!({}));
        if test_mode {
            request = request.in_test_mode(None);
        }
        ExecutionContext::for_request(&request, Uuid::now_v7())
    }

    #[tokio::test]
    async fn test_live_request_returns_status_and_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(header("x-source", "chainflow"))
            .and(body_json(json!({ "amount": 150 })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "ord_1" })))
            .expect(1)
            .mount(&server)
            .await;

        let node = Node::new(
            "call",
            "http_request",
            json!({
                "url": format!("{}/orders", server.uri()),
                "method": "post",
                "headers": { "x-source": "chainflow" },
                "body": { "amount": 150 }
            }),
        );

        let output = HttpRequestHandler::new().unwrap().execute(&node, &context(false)).await.unwrap();
        assert_eq!(output["status"], 201);
        assert_eq!(output["body"]["id"], "ord_1");
    }

    #[tokio::test]
    async fn test_error_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let node = Node::new("call", "http_request", json!({ "url": server.uri() }));
        let err = HttpRequestHandler::new().unwrap().execute(&node, &context(false)).await.unwrap_err();
        assert!(matches!(err, ActionError::Provider(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_test_mode_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let node = Node::new("call", "http_request", json!({ "url": server.uri() }));
        let output = HttpRequestHandler::new().unwrap().execute(&node, &context(true)).await.unwrap();
        assert_eq!(output["simulated"], true);
        assert_eq!(output["method"], "GET");
    }

    #[tokio::test]
    async fn test_missing_url_is_invalid_config() {
        let node = Node::new("call", "http_request", json!({ "method": "GET" }));
        let err = HttpRequestHandler::new().unwrap().execute(&node, &context(true)).await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidConfig(_)));
    }
}
