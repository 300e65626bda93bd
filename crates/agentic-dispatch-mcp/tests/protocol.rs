//! Protocol-level integration tests for agentic-dispatch-mcp.
//!
//! Drives `ProtocolHandler` with raw JSON-RPC values, covering the handshake,
//! every category's list/invoke methods, and the dispatcher's failure modes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use agentic_dispatch::{
    handler_fn, CapabilityCategory, CapabilityDescriptor, Dispatcher, Output,
};
use agentic_dispatch_mcp::config::ServerConfig;
use agentic_dispatch_mcp::protocol::ProtocolHandler;
use agentic_dispatch_mcp::types::*;

// ─────────────────────── helpers ───────────────────────

/// Build an MCP JSON-RPC request.
fn mcp_request(id: i64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params
    })
}

fn init_request() -> Value {
    mcp_request(
        0,
        "initialize",
        json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": { "name": "test-client", "version": "1.0" }
        }),
    )
}

fn tool_call(id: i64, name: &str, arguments: Value) -> Value {
    mcp_request(id, "tools/call", json!({ "name": name, "arguments": arguments }))
}

async fn send(handler: &ProtocolHandler, msg: Value) -> Option<Value> {
    let parsed: JsonRpcMessage = serde_json::from_value(msg).unwrap();
    handler.handle_message(parsed).await
}

async fn send_unwrap(handler: &ProtocolHandler, msg: Value) -> Value {
    send(handler, msg).await.expect("expected response")
}

fn error_code(resp: &Value) -> i64 {
    resp["error"]["code"]
        .as_i64()
        .unwrap_or_else(|| panic!("expected error response, got: {resp}"))
}

fn first_text(resp: &Value) -> &str {
    resp["result"]["content"][0]["text"]
        .as_str()
        .unwrap_or_else(|| panic!("expected text content, got: {resp}"))
}

/// Default server plus a few test tools with controlled behaviour.
fn dispatcher_with(config: ServerConfig) -> Arc<Dispatcher> {
    let dispatcher = config.build_dispatcher().unwrap();
    dispatcher
        .add_tool(
            CapabilityDescriptor::new("slow"),
            handler_fn(|ctx, _| async move {
                ctx.sleep(Duration::from_secs(5)).await?;
                Ok(Output::text("slow done"))
            }),
        )
        .unwrap();
    dispatcher
        .add_tool(
            CapabilityDescriptor::new("quick"),
            handler_fn(|ctx, _| async move {
                ctx.sleep(Duration::from_millis(50)).await?;
                Ok(Output::text("quick done"))
            }),
        )
        .unwrap();
    dispatcher
        .add_tool(
            CapabilityDescriptor::new("explode"),
            handler_fn(|_, _| async {
                if Output::default().content.is_empty() {
                    panic!("handler blew up");
                }
                Ok(Output::default())
            }),
        )
        .unwrap();
    dispatcher
}

async fn ready_handler(config: ServerConfig) -> Arc<ProtocolHandler> {
    let handler = Arc::new(ProtocolHandler::new(dispatcher_with(config)));
    send_unwrap(&handler, init_request()).await;
    assert!(send(&handler, json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .await
        .is_none());
    handler
}

// ═══════════════════════════════════════════════════════
// HANDSHAKE
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_initialize_advertises_populated_categories() {
    let handler = ProtocolHandler::new(dispatcher_with(ServerConfig::default()));
    let resp = send_unwrap(&handler, init_request()).await;

    let result = &resp["result"];
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "agentic-dispatch-mcp");
    assert!(result["capabilities"]["tools"].is_object());
    assert!(result["capabilities"]["resources"].is_object());
    assert!(result["capabilities"]["prompts"].is_object());
    assert_eq!(result["capabilities"]["tools"]["listChanged"], true);
    assert!(result["instructions"].is_string());

    assert!(!handler.is_initialized().await);
    send(&handler, json!({"jsonrpc": "2.0", "method": "initialized"})).await;
    assert!(handler.is_initialized().await);
}

#[tokio::test]
async fn test_disabled_category_is_absent_and_method_not_found() {
    let mut config = ServerConfig::default();
    config.flags = config.flags.disable(CapabilityCategory::Prompt);
    let handler = ready_handler(config).await;

    let resp = send_unwrap(&handler, init_request()).await;
    assert!(resp["result"]["capabilities"].get("prompts").is_none());

    let list = send_unwrap(&handler, mcp_request(1, "prompts/list", json!({}))).await;
    assert_eq!(error_code(&list), -32601);

    let get = send_unwrap(
        &handler,
        mcp_request(2, "prompts/get", json!({"name": "summarize", "arguments": {"text": "x"}})),
    )
    .await;
    assert_eq!(error_code(&get), -32601);
}

#[tokio::test]
async fn test_protocol_errors() {
    let handler = ready_handler(ServerConfig::default()).await;

    let unknown = send_unwrap(&handler, mcp_request(1, "tools/destroy", json!({}))).await;
    assert_eq!(error_code(&unknown), -32601);

    let bad_version = send_unwrap(
        &handler,
        json!({"jsonrpc": "1.0", "id": 2, "method": "ping"}),
    )
    .await;
    assert_eq!(error_code(&bad_version), -32600);

    let missing_params = send_unwrap(&handler, json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call"})).await;
    assert_eq!(error_code(&missing_params), -32602);

    let ping = send_unwrap(&handler, mcp_request(4, "ping", json!({}))).await;
    assert_eq!(ping["result"], json!({}));
}

// ═══════════════════════════════════════════════════════
// TOOLS
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_tools_list_in_registration_order() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(&handler, mcp_request(1, "tools/list", json!({}))).await;

    let names: Vec<&str> = resp["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["get_time", "echo", "server_status", "slow", "quick", "explode"]
    );

    let echo = &resp["result"]["tools"][1];
    assert_eq!(echo["inputSchema"]["type"], "object");
    assert_eq!(echo["inputSchema"]["required"], json!(["message"]));
}

#[tokio::test]
async fn test_get_time_default_is_rfc3339() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(&handler, tool_call(1, "get_time", json!({}))).await;
    let text = first_text(&resp);
    assert!(
        chrono::DateTime::parse_from_rfc3339(text).is_ok(),
        "not RFC 3339: {text}"
    );
}

#[tokio::test]
async fn test_get_time_unix_is_digits() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(&handler, tool_call(1, "get_time", json!({"format": "Unix"}))).await;
    let text = first_text(&resp);
    assert!(!text.is_empty());
    assert!(text.chars().all(|c| c.is_ascii_digit()), "not digits: {text}");
}

#[tokio::test]
async fn test_echo_repeat_coerced_from_string() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(
        &handler,
        tool_call(1, "echo", json!({"message": "hi", "repeat": "3"})),
    )
    .await;
    assert_eq!(first_text(&resp), "hi\nhi\nhi");
}

#[tokio::test]
async fn test_unknown_tool_is_invalid_params_and_router_survives() {
    let handler = ready_handler(ServerConfig::default()).await;

    let resp = send_unwrap(&handler, tool_call(1, "no_such_tool", json!({}))).await;
    assert_eq!(error_code(&resp), -32602);
    assert_eq!(resp["error"]["data"]["reason"], "unknown target");
    assert_eq!(resp["error"]["data"]["target"], "no_such_tool");

    let ok = send_unwrap(&handler, tool_call(2, "echo", json!({"message": "still up"}))).await;
    assert_eq!(first_text(&ok), "still up");
}

#[tokio::test]
async fn test_validation_errors_listed_per_field() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(
        &handler,
        tool_call(1, "echo", json!({"repeat": "many", "extra": true})),
    )
    .await;
    assert_eq!(error_code(&resp), -32602);

    let fields: Vec<&str> = resp["error"]["data"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["message", "repeat", "extra"]);
}

#[tokio::test]
async fn test_lenient_arguments_ignore_extras() {
    let config = ServerConfig {
        strict_arguments: false,
        ..Default::default()
    };
    let handler = ready_handler(config).await;
    let resp = send_unwrap(
        &handler,
        tool_call(1, "echo", json!({"message": "ok", "extra": true})),
    )
    .await;
    assert_eq!(first_text(&resp), "ok");
}

#[tokio::test]
async fn test_panicking_tool_contained() {
    let handler = ready_handler(ServerConfig::default()).await;

    let resp = send_unwrap(&handler, tool_call(1, "explode", json!({}))).await;
    assert_eq!(error_code(&resp), -32603);
    assert!(!resp["error"]["message"]
        .as_str()
        .unwrap()
        .contains("blew up"));

    let ok = send_unwrap(&handler, tool_call(2, "echo", json!({"message": "after"}))).await;
    assert_eq!(first_text(&ok), "after");
}

#[tokio::test]
async fn test_server_status_reports_session() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(&handler, tool_call(1, "server_status", json!({}))).await;
    let status: Value = serde_json::from_str(first_text(&resp)).unwrap();
    assert_eq!(status["server"]["name"], "agentic-dispatch-mcp");
    assert_eq!(
        status["session_id"].as_str().unwrap(),
        handler.dispatcher().session().session_id().to_string()
    );
}

// ═══════════════════════════════════════════════════════
// CONCURRENCY
// ═══════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn test_cancel_one_request_other_completes() {
    let handler = ready_handler(ServerConfig::default()).await;

    let slow = {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move { send_unwrap(&handler, tool_call(41, "slow", json!({}))).await })
    };
    let quick = {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move { send_unwrap(&handler, tool_call(42, "quick", json!({}))).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    let cancel = json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": { "requestId": 41, "reason": "user aborted" }
    });
    assert!(send(&handler, cancel).await.is_none());

    let slow = slow.await.unwrap();
    assert_eq!(error_code(&slow), -32800);
    assert_eq!(slow["id"], 41);

    let quick = quick.await.unwrap();
    assert_eq!(first_text(&quick), "quick done");
    assert_eq!(handler.dispatcher().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_tracked_request_starts() {
    let handler = ready_handler(ServerConfig::default()).await;

    let request: JsonRpcRequest =
        serde_json::from_value(tool_call(51, "slow", json!({}))).unwrap();
    let ticket = handler.track(&request);
    assert!(ticket.is_some());

    let cancel = json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": { "requestId": 51 }
    });
    assert!(send(&handler, cancel).await.is_none());

    let resp = handler.handle_tracked(request, ticket).await;
    assert_eq!(resp["id"], 51);
    assert_eq!(error_code(&resp), -32800);
    assert_eq!(handler.dispatcher().in_flight(), 0);
}

#[tokio::test]
async fn test_only_invocations_are_tracked() {
    let handler = ready_handler(ServerConfig::default()).await;
    let ping: JsonRpcRequest =
        serde_json::from_value(mcp_request(60, "ping", json!({}))).unwrap();
    assert!(handler.track(&ping).is_none());
    assert_eq!(handler.dispatcher().in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_saturated_server_reports_retryable_exhaustion() {
    let config = ServerConfig {
        max_concurrent: 1,
        admission_timeout: Duration::from_millis(100),
        call_timeout: None,
        ..Default::default()
    };
    let handler = ready_handler(config).await;

    let holder = {
        let handler = Arc::clone(&handler);
        tokio::spawn(async move { send_unwrap(&handler, tool_call(1, "slow", json!({}))).await })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;

    let start = tokio::time::Instant::now();
    let resp = send_unwrap(&handler, tool_call(2, "echo", json!({"message": "x"}))).await;
    assert_eq!(error_code(&resp), -32902);
    assert_eq!(resp["error"]["data"]["retryable"], true);
    assert!(start.elapsed() >= Duration::from_millis(100));

    let held = holder.await.unwrap();
    assert_eq!(first_text(&held), "slow done");
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout_is_internal_error() {
    let config = ServerConfig {
        call_timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    let handler = ready_handler(config).await;
    let resp = send_unwrap(&handler, tool_call(1, "slow", json!({}))).await;
    assert_eq!(error_code(&resp), -32603);
    assert_eq!(resp["error"]["data"]["timeout_ms"], 200);
}

#[tokio::test]
async fn test_shutdown_refuses_new_calls() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(&handler, mcp_request(1, "shutdown", json!({}))).await;
    assert_eq!(resp["result"], json!({}));

    let after = send_unwrap(&handler, tool_call(2, "echo", json!({"message": "late"}))).await;
    assert_eq!(error_code(&after), -32603);
}

// ═══════════════════════════════════════════════════════
// RESOURCES
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_resources_and_templates_listed_separately() {
    let handler = ready_handler(ServerConfig::default()).await;

    let list = send_unwrap(&handler, mcp_request(1, "resources/list", json!({}))).await;
    let resources = list["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["uri"], "dispatch://session");
    assert_eq!(resources[0]["mimeType"], "application/json");

    let templates =
        send_unwrap(&handler, mcp_request(2, "resources/templates/list", json!({}))).await;
    let templates = templates["result"]["resourceTemplates"].as_array().unwrap();
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0]["uriTemplate"], "dispatch://capabilities/{category}");
}

#[tokio::test]
async fn test_read_session_resource() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(
        &handler,
        mcp_request(1, "resources/read", json!({"uri": "dispatch://session"})),
    )
    .await;

    let contents = &resp["result"]["contents"][0];
    assert_eq!(contents["uri"], "dispatch://session");
    assert_eq!(contents["mimeType"], "application/json");
    let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert!(body["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn test_read_templated_resource() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(
        &handler,
        mcp_request(1, "resources/read", json!({"uri": "dispatch://capabilities/prompts"})),
    )
    .await;

    let contents = &resp["result"]["contents"][0];
    assert_eq!(contents["uri"], "dispatch://capabilities/prompts");
    let body: Value = serde_json::from_str(contents["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["category"], "prompt");
    assert_eq!(body["count"], 1);
    assert_eq!(body["items"][0]["name"], "summarize");

    let bad = send_unwrap(
        &handler,
        mcp_request(2, "resources/read", json!({"uri": "dispatch://capabilities/widgets"})),
    )
    .await;
    assert_eq!(error_code(&bad), -32602);

    let missing = send_unwrap(
        &handler,
        mcp_request(3, "resources/read", json!({"uri": "dispatch://nowhere"})),
    )
    .await;
    assert_eq!(error_code(&missing), -32602);
}

#[tokio::test]
async fn test_subscribe_requires_advertisement() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(
        &handler,
        mcp_request(1, "resources/subscribe", json!({"uri": "dispatch://session"})),
    )
    .await;
    assert_eq!(error_code(&resp), -32601);

    let mut config = ServerConfig::default();
    config.flags.resources_subscribe = true;
    let handler = ready_handler(config).await;
    let resp = send_unwrap(
        &handler,
        mcp_request(2, "resources/subscribe", json!({"uri": "dispatch://session"})),
    )
    .await;
    assert_eq!(resp["result"], json!({}));
    assert_eq!(handler.subscriptions().await, vec!["dispatch://session".to_string()]);

    send_unwrap(
        &handler,
        mcp_request(3, "resources/unsubscribe", json!({"uri": "dispatch://session"})),
    )
    .await;
    assert!(handler.subscriptions().await.is_empty());
}

// ═══════════════════════════════════════════════════════
// PROMPTS
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_prompts_list_and_get() {
    let handler = ready_handler(ServerConfig::default()).await;

    let list = send_unwrap(&handler, mcp_request(1, "prompts/list", json!({}))).await;
    let prompt = &list["result"]["prompts"][0];
    assert_eq!(prompt["name"], "summarize");
    assert_eq!(prompt["arguments"][0]["name"], "text");
    assert_eq!(prompt["arguments"][0]["required"], true);

    let get = send_unwrap(
        &handler,
        mcp_request(
            2,
            "prompts/get",
            json!({"name": "summarize", "arguments": {"text": "Rust is fast.", "style": "bullets"}}),
        ),
    )
    .await;
    let result = &get["result"];
    assert_eq!(result["description"], "Summary (bullets)");
    assert_eq!(result["messages"][0]["role"], "user");
    let text = result["messages"][0]["content"]["text"].as_str().unwrap();
    assert!(text.contains("Rust is fast."));
}

#[tokio::test]
async fn test_prompt_missing_argument_is_invalid_params() {
    let handler = ready_handler(ServerConfig::default()).await;
    let resp = send_unwrap(
        &handler,
        mcp_request(1, "prompts/get", json!({"name": "summarize"})),
    )
    .await;
    assert_eq!(error_code(&resp), -32602);
    assert_eq!(resp["error"]["data"]["fields"][0]["field"], "text");
}
