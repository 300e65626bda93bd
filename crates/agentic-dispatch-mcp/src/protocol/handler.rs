//! Main request router: receives JSON-RPC messages and hands invocations to the dispatcher.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use agentic_dispatch::{
    CapabilityCategory, DispatchError, Dispatcher, InflightTicket, InvocationRequest, RequestKey,
};

use crate::types::*;

use super::formatter;
use super::negotiation::HandshakeState;
use super::validator::validate_request;

/// Dispatches incoming JSON-RPC messages. Shared by every in-flight request.
pub struct ProtocolHandler {
    dispatcher: Arc<Dispatcher>,
    handshake: Mutex<HandshakeState>,
    subscriptions: Mutex<BTreeSet<String>>,
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>, missing: &str) -> McpResult<T> {
    params
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| McpError::InvalidParams(e.to_string()))?
        .ok_or_else(|| McpError::InvalidParams(missing.to_string()))
}

fn to_value(result: impl Serialize) -> McpResult<Value> {
    serde_json::to_value(result).map_err(|e| McpError::InternalError(e.to_string()))
}

fn empty_result() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Methods that run a registered handler and can be cancelled by id.
fn is_invocation(method: &str) -> bool {
    matches!(method, "tools/call" | "resources/read" | "prompts/get")
}

fn invocation(
    category: CapabilityCategory,
    target: String,
    id: &RequestId,
    ticket: Option<InflightTicket>,
) -> InvocationRequest {
    let request = InvocationRequest::new(category, target);
    match ticket {
        Some(ticket) => request.with_ticket(ticket),
        None => request.with_request_id(RequestKey::from(id)),
    }
}

impl ProtocolHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            handshake: Mutex::new(HandshakeState::default()),
            subscriptions: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn is_initialized(&self) -> bool {
        self.handshake.lock().await.initialized
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.iter().cloned().collect()
    }

    /// Enter an invocation in the dispatcher's cancellation table.
    ///
    /// Transports call this while reading, before the request moves to its
    /// own task, so a cancellation on the next line still finds it.
    pub fn track(&self, request: &JsonRpcRequest) -> Option<InflightTicket> {
        (is_invocation(&request.method) && request.id != RequestId::Null)
            .then(|| self.dispatcher.track(RequestKey::from(&request.id)))
    }

    /// Handle a request whose ticket was taken with [`track`](Self::track).
    pub async fn handle_tracked(
        &self,
        request: JsonRpcRequest,
        ticket: Option<InflightTicket>,
    ) -> Value {
        self.handle_request(request, ticket).await
    }

    /// Handle one message. Requests always produce a response; notifications never do.
    pub async fn handle_message(&self, msg: JsonRpcMessage) -> Option<Value> {
        match msg {
            JsonRpcMessage::Request(req) => Some(self.handle_request(req, None).await),
            JsonRpcMessage::Notification(notif) => {
                self.handle_notification(notif).await;
                None
            }
            _ => {
                tracing::warn!("Received unexpected message type from client");
                None
            }
        }
    }

    async fn handle_request(
        &self,
        request: JsonRpcRequest,
        ticket: Option<InflightTicket>,
    ) -> Value {
        if let Err(e) = validate_request(&request) {
            return to_value(e.to_json_rpc_error(request.id)).unwrap_or_default();
        }

        let id = request.id.clone();
        let method = request.method.clone();
        let result = self.dispatch_request(request, ticket).await;

        match result {
            Ok(value) => to_value(JsonRpcResponse::new(id, value)).unwrap_or_default(),
            Err(e) => {
                tracing::debug!(%id, method = %method, code = e.code(), "Request failed: {e}");
                to_value(e.to_json_rpc_error(id)).unwrap_or_default()
            }
        }
    }

    async fn dispatch_request(
        &self,
        request: JsonRpcRequest,
        ticket: Option<InflightTicket>,
    ) -> McpResult<Value> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        if !matches!(method.as_str(), "initialize" | "ping") && !self.is_initialized().await {
            tracing::debug!(method = %method, "Request before initialization");
        }

        match method.as_str() {
            "initialize" => self.handle_initialize(params).await,
            "ping" => Ok(empty_result()),
            "shutdown" => self.handle_shutdown(),

            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&id, params, ticket).await,

            "resources/list" => self.handle_resources_list(),
            "resources/templates/list" => self.handle_resource_templates_list(),
            "resources/read" => self.handle_resources_read(&id, params, ticket).await,
            "resources/subscribe" => self.handle_subscription(&method, params, true).await,
            "resources/unsubscribe" => self.handle_subscription(&method, params, false).await,

            "prompts/list" => self.handle_prompts_list(),
            "prompts/get" => self.handle_prompts_get(&id, params, ticket).await,

            _ => Err(McpError::MethodNotFound(method)),
        }
    }

    async fn handle_notification(&self, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => {
                self.handshake.lock().await.mark_initialized();
            }
            "notifications/cancelled" | "$/cancelRequest" => {
                match parse_params::<CancelledParams>(notification.params, "requestId required") {
                    Ok(params) => {
                        let key = RequestKey::from(&params.request_id);
                        if !self.dispatcher.cancel(&key) {
                            tracing::debug!(request_id = %key, "Nothing to cancel");
                        }
                    }
                    Err(e) => tracing::warn!("Malformed cancellation: {e}"),
                }
            }
            _ => {
                tracing::debug!("Unknown notification: {}", notification.method);
            }
        }
    }

    fn require(&self, category: CapabilityCategory) -> McpResult<()> {
        if self.dispatcher.capabilities().supports(category) {
            Ok(())
        } else {
            Err(DispatchError::CategoryDisabled(category).into())
        }
    }

    async fn handle_initialize(&self, params: Option<Value>) -> McpResult<Value> {
        let init_params: InitializeParams = parse_params(params, "Initialize params required")?;
        let session = self.dispatcher.session();
        let result = self.handshake.lock().await.negotiate(init_params, &session);
        to_value(result)
    }

    fn handle_shutdown(&self) -> McpResult<Value> {
        tracing::info!("Shutdown requested");
        self.dispatcher.shutdown();
        Ok(empty_result())
    }

    fn handle_tools_list(&self) -> McpResult<Value> {
        self.require(CapabilityCategory::Tool)?;
        let tools = self.dispatcher.list(CapabilityCategory::Tool);
        to_value(ToolListResult {
            tools: tools.descriptors().map(formatter::tool_definition).collect(),
            next_cursor: None,
        })
    }

    async fn handle_tools_call(
        &self,
        id: &RequestId,
        params: Option<Value>,
        ticket: Option<InflightTicket>,
    ) -> McpResult<Value> {
        let call: ToolCallParams = parse_params(params, "Tool call params required")?;
        let request = invocation(CapabilityCategory::Tool, call.name, id, ticket);
        let request = match call.arguments {
            Some(args) => request.with_arguments(args),
            None => request,
        };

        let output = self.dispatcher.route(request).await?;
        to_value(formatter::tool_result(output))
    }

    fn handle_resources_list(&self) -> McpResult<Value> {
        self.require(CapabilityCategory::Resource)?;
        let resources = self.dispatcher.list(CapabilityCategory::Resource);
        to_value(ResourceListResult {
            resources: resources
                .descriptors()
                .filter(|d| !d.is_template())
                .map(formatter::resource_definition)
                .collect(),
            next_cursor: None,
        })
    }

    fn handle_resource_templates_list(&self) -> McpResult<Value> {
        self.require(CapabilityCategory::Resource)?;
        let resources = self.dispatcher.list(CapabilityCategory::Resource);
        to_value(ResourceTemplateListResult {
            resource_templates: resources
                .descriptors()
                .filter(|d| d.is_template())
                .map(formatter::template_definition)
                .collect(),
            next_cursor: None,
        })
    }

    /// Declared MIME type of whatever entry serves `uri`.
    fn resource_mime(&self, uri: &str) -> Option<String> {
        let registry = self.dispatcher.registry();
        registry
            .lookup(CapabilityCategory::Resource, uri)
            .ok()
            .or_else(|| registry.match_resource_template(uri).map(|(entry, _)| entry))
            .and_then(|entry| entry.descriptor().mime_type.clone())
    }

    async fn handle_resources_read(
        &self,
        id: &RequestId,
        params: Option<Value>,
        ticket: Option<InflightTicket>,
    ) -> McpResult<Value> {
        let read: ResourceReadParams = parse_params(params, "Resource read params required")?;
        let request = invocation(CapabilityCategory::Resource, read.uri.clone(), id, ticket);

        let output = self.dispatcher.route(request).await?;
        let mime = self.resource_mime(&read.uri);
        to_value(formatter::resource_result(&read.uri, mime.as_deref(), output))
    }

    async fn handle_subscription(
        &self,
        method: &str,
        params: Option<Value>,
        subscribe: bool,
    ) -> McpResult<Value> {
        if !self.dispatcher.capabilities().resources_subscribe() {
            return Err(McpError::MethodNotFound(method.to_string()));
        }
        let params: ResourceSubscribeParams = parse_params(params, "uri required")?;

        let mut subscriptions = self.subscriptions.lock().await;
        if subscribe {
            subscriptions.insert(params.uri);
        } else {
            subscriptions.remove(&params.uri);
        }
        Ok(empty_result())
    }

    fn handle_prompts_list(&self) -> McpResult<Value> {
        self.require(CapabilityCategory::Prompt)?;
        let prompts = self.dispatcher.list(CapabilityCategory::Prompt);
        to_value(PromptListResult {
            prompts: prompts.descriptors().map(formatter::prompt_definition).collect(),
            next_cursor: None,
        })
    }

    async fn handle_prompts_get(
        &self,
        id: &RequestId,
        params: Option<Value>,
        ticket: Option<InflightTicket>,
    ) -> McpResult<Value> {
        let get: PromptGetParams = parse_params(params, "Prompt get params required")?;
        let request = invocation(CapabilityCategory::Prompt, get.name, id, ticket);
        let request = match get.arguments {
            Some(args) => request.with_arguments(args),
            None => request,
        };

        let output = self.dispatcher.route(request).await?;
        to_value(formatter::prompt_result(output))
    }
}
