//! Stdio JSON-RPC front end. Translates MCP requests into registry tool
//! invocations and converts every tool outcome, success or failure, into
//! the `{content, isError}` envelope. A failing tool never takes the
//! server down.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, BufRead};
use tracing::{debug, error, info};

use crate::error::GatewayError;
use crate::registry::Registry;

#[derive(Serialize, Deserialize, Debug)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Option<Value>,
    pub id: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn ok(id: Option<Value>, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result: Some(result),
        error: None,
        id,
    }
}

fn err(id: Option<Value>, code: i32, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.into(),
            data: None,
        }),
        id,
    }
}

/// Success envelope: the domain object pretty-printed for the agent.
pub fn tool_ok(payload: &Value) -> Value {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": false
    })
}

/// Failure envelope: one human-readable message naming the cause.
pub fn tool_err(error: &GatewayError) -> Value {
    json!({
        "content": [{ "type": "text", "text": error.to_string() }],
        "isError": true
    })
}

/// Run the stdio loop until EOF.
pub async fn run(registry: Registry) -> Result<()> {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    info!(
        tools = registry.tools().len(),
        "MCP server ready, waiting for JSON-RPC requests on stdin"
    );

    while let Some(Ok(line)) = lines.next() {
        if line.trim().is_empty() {
            continue;
        }
        debug!("received request: {}", line);

        let request: JsonRpcRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                error!("failed to parse JSON-RPC request: {}", e);
                let response = err(None, -32700, format!("Parse error: {e}"));
                println!("{}", serde_json::to_string(&response)?);
                continue;
            }
        };

        // Notifications carry no id and expect no response.
        if request.method.starts_with("notifications/") {
            continue;
        }

        let response = handle_request(&registry, request).await;
        println!("{}", serde_json::to_string(&response)?);
    }

    Ok(())
}

pub async fn handle_request(registry: &Registry, request: JsonRpcRequest) -> JsonRpcResponse {
    match request.method.as_str() {
        "initialize" => ok(
            request.id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        ),
        "ping" => ok(request.id, json!({})),
        "tools/list" => {
            let tools: Vec<Value> = registry
                .tools()
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name(),
                        "description": tool.description(),
                        "inputSchema": tool.schema(),
                    })
                })
                .collect();
            ok(request.id, json!({ "tools": tools }))
        }
        "tools/call" => {
            let Some(params) = &request.params else {
                return err(request.id, -32602, "Missing params");
            };
            let Some(tool_name) = params.get("name").and_then(Value::as_str) else {
                return err(request.id, -32602, "Missing 'name' parameter");
            };
            let args = params.get("arguments").cloned().unwrap_or(json!({}));

            let Some(tool) = registry.get_tool(tool_name) else {
                return err(request.id, -32601, format!("Tool not found: {tool_name}"));
            };

            // Domain failures become isError envelopes, never JSON-RPC
            // errors, so one bad call cannot be confused with a broken
            // server.
            let envelope = match tool.call(registry.context(), args).await {
                Ok(payload) => tool_ok(&payload),
                Err(e) => {
                    debug!(tool = tool_name, error = %e, "tool call failed");
                    tool_err(&e)
                }
            };
            ok(request.id, envelope)
        }
        other => err(request.id, -32601, format!("Method not found: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_wraps_pretty_json() {
        let envelope = tool_ok(&json!({"chainId": "ethereum"}));
        assert_eq!(envelope["isError"], false);
        assert_eq!(envelope["content"][0]["type"], "text");
        assert!(envelope["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("ethereum"));
    }

    #[test]
    fn error_envelope_names_the_cause() {
        let envelope = tool_err(&GatewayError::UnsupportedChain("near".into()));
        assert_eq!(envelope["isError"], true);
        assert_eq!(
            envelope["content"][0]["text"].as_str().unwrap(),
            "unsupported chain: near"
        );
    }
}
