//! The dispatcher: routes invocation requests through lookup, validation, and execution.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::capabilities::ServerCapabilities;
use crate::capability::{Capability, CapabilityCategory, CapabilityDescriptor};
use crate::content::{InvocationResult, Output};
use crate::error::{DispatchError, DispatchResult};
use crate::executor::{Executor, ExecutorConfig};
use crate::handler::{Handler, HandlerContext, RequestKey};
use crate::negotiation::{negotiate, CapabilityFlags};
use crate::registry::{CapabilityList, DuplicatePolicy, Registry};
use crate::session::{ServerIdentity, SessionState};
use crate::validate::{validate_arguments, UnknownArguments};

/// One incoming call, already decoded from the wire.
#[derive(Debug)]
pub struct InvocationRequest {
    pub category: CapabilityCategory,
    pub target: String,
    pub arguments: Option<Value>,
    pub request_id: Option<RequestKey>,
    ticket: Option<InflightTicket>,
}

impl InvocationRequest {
    pub fn new(category: CapabilityCategory, target: impl Into<String>) -> Self {
        Self {
            category,
            target: target.into(),
            arguments: None,
            request_id: None,
            ticket: None,
        }
    }

    pub fn with_arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<RequestKey>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Run under a ticket taken earlier with [`Dispatcher::track`].
    pub fn with_ticket(mut self, ticket: InflightTicket) -> Self {
        self.request_id = Some(ticket.key.clone());
        self.ticket = Some(ticket);
        self
    }
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    identity: ServerIdentity,
    policy: DuplicatePolicy,
    flags: CapabilityFlags,
    executor: ExecutorConfig,
    unknown_arguments: UnknownArguments,
    pending: Vec<(CapabilityCategory, Capability)>,
}

impl DispatcherBuilder {
    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.identity.name = name.into();
        self.identity.version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.identity.instructions = Some(instructions.into());
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn capability_flags(mut self, flags: CapabilityFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn executor_config(mut self, config: ExecutorConfig) -> Self {
        self.executor = config;
        self
    }

    pub fn unknown_arguments(mut self, unknown: UnknownArguments) -> Self {
        self.unknown_arguments = unknown;
        self
    }

    pub fn tool(self, descriptor: CapabilityDescriptor, handler: Arc<dyn Handler>) -> Self {
        self.capability(CapabilityCategory::Tool, descriptor, handler)
    }

    pub fn resource(self, descriptor: CapabilityDescriptor, handler: Arc<dyn Handler>) -> Self {
        self.capability(CapabilityCategory::Resource, descriptor, handler)
    }

    pub fn prompt(self, descriptor: CapabilityDescriptor, handler: Arc<dyn Handler>) -> Self {
        self.capability(CapabilityCategory::Prompt, descriptor, handler)
    }

    pub fn capability(
        mut self,
        category: CapabilityCategory,
        descriptor: CapabilityDescriptor,
        handler: Arc<dyn Handler>,
    ) -> Self {
        self.pending
            .push((category, Capability::new(descriptor, handler)));
        self
    }

    /// Register everything, negotiate capabilities, and create the session.
    ///
    /// Fails on a duplicate name when the policy is [`DuplicatePolicy::Reject`].
    pub fn build(self) -> DispatchResult<Dispatcher> {
        let registry = Registry::new(self.policy);
        for (category, capability) in self.pending {
            registry.register(category, capability)?;
        }

        let capabilities = negotiate(&registry, &self.flags);
        let session = Arc::new(SessionState::new(self.identity, capabilities));

        tracing::info!(
            server = session.server_name(),
            version = session.server_version(),
            session_id = %session.session_id(),
            tools = registry.len(CapabilityCategory::Tool),
            resources = registry.len(CapabilityCategory::Resource),
            prompts = registry.len(CapabilityCategory::Prompt),
            "Dispatcher ready"
        );

        Ok(Dispatcher {
            registry: Arc::new(registry),
            flags: self.flags,
            session: RwLock::new(session),
            executor: Executor::new(self.executor),
            unknown_arguments: self.unknown_arguments,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            next_call: AtomicU64::new(0),
        })
    }
}

type InflightMap = Mutex<HashMap<RequestKey, (u64, CancellationToken)>>;

/// A request's entry in the cancellation table.
///
/// [`Dispatcher::cancel`] reaches the request from the moment the ticket is
/// taken. Dropping the ticket removes the entry, however the request ends.
#[derive(Debug)]
pub struct InflightTicket {
    inflight: Arc<InflightMap>,
    key: RequestKey,
    call: u64,
    token: CancellationToken,
}

impl InflightTicket {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for InflightTicket {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        // A newer call may have reused the key.
        if inflight.get(&self.key).map(|(call, _)| *call) == Some(self.call) {
            inflight.remove(&self.key);
        }
    }
}

/// Transport-agnostic request dispatcher.
pub struct Dispatcher {
    registry: Arc<Registry>,
    flags: CapabilityFlags,
    session: RwLock<Arc<SessionState>>,
    executor: Executor,
    unknown_arguments: UnknownArguments,
    inflight: Arc<InflightMap>,
    next_call: AtomicU64,
}

impl Dispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Handle for handlers that list the registry they live in.
    ///
    /// Weak, so a registered handler holding it does not keep the registry alive.
    pub fn registry_handle(&self) -> Weak<Registry> {
        Arc::downgrade(&self.registry)
    }

    pub fn session(&self) -> Arc<SessionState> {
        Arc::clone(&self.session.read())
    }

    pub fn capabilities(&self) -> ServerCapabilities {
        self.session().capabilities().clone()
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Recompute the advertisement from the current registry.
    ///
    /// In-flight handlers keep the session snapshot they started with.
    pub fn renegotiate(&self) -> Arc<SessionState> {
        let capabilities = negotiate(&self.registry, &self.flags);
        let mut slot = self.session.write();
        let next = Arc::new(slot.with_capabilities(capabilities));
        *slot = Arc::clone(&next);
        next
    }

    pub fn add_tool(
        &self,
        descriptor: CapabilityDescriptor,
        handler: Arc<dyn Handler>,
    ) -> DispatchResult<()> {
        self.add(CapabilityCategory::Tool, descriptor, handler)
    }

    pub fn add_resource(
        &self,
        descriptor: CapabilityDescriptor,
        handler: Arc<dyn Handler>,
    ) -> DispatchResult<()> {
        self.add(CapabilityCategory::Resource, descriptor, handler)
    }

    pub fn add_prompt(
        &self,
        descriptor: CapabilityDescriptor,
        handler: Arc<dyn Handler>,
    ) -> DispatchResult<()> {
        self.add(CapabilityCategory::Prompt, descriptor, handler)
    }

    pub fn add(
        &self,
        category: CapabilityCategory,
        descriptor: CapabilityDescriptor,
        handler: Arc<dyn Handler>,
    ) -> DispatchResult<()> {
        self.registry
            .register(category, Capability::new(descriptor, handler))
            .map(|_| ())
    }

    pub fn remove(&self, category: CapabilityCategory, name: &str) -> DispatchResult<()> {
        self.registry.unregister(category, name).map(|_| ())
    }

    pub fn list(&self, category: CapabilityCategory) -> CapabilityList {
        self.registry.list(category)
    }

    /// Subscribe to registry changes (category of each mutation).
    pub fn subscribe_changes(&self) -> broadcast::Receiver<CapabilityCategory> {
        self.registry.subscribe()
    }

    /// Enter `key` in the cancellation table ahead of routing.
    ///
    /// Transports take the ticket as soon as a request is read, so a cancel
    /// that follows it on the wire is not lost while the request waits to run.
    pub fn track(&self, key: RequestKey) -> InflightTicket {
        let call = self.next_call.fetch_add(1, Ordering::Relaxed);
        let token = self.executor.child_token();
        self.inflight
            .lock()
            .insert(key.clone(), (call, token.clone()));
        InflightTicket {
            inflight: Arc::clone(&self.inflight),
            key,
            call,
            token,
        }
    }

    /// Cancel one in-flight request. Returns false if it is not running.
    pub fn cancel(&self, key: &RequestKey) -> bool {
        match self.inflight.lock().get(key) {
            Some((_, token)) => {
                tracing::info!(request_id = %key, "Cancelling in-flight request");
                token.cancel();
                true
            }
            None => {
                tracing::debug!(request_id = %key, "Cancellation for unknown request ignored");
                false
            }
        }
    }

    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Cancel everything in flight and refuse further work.
    pub fn shutdown(&self) {
        self.executor.shutdown();
    }

    pub fn is_shut_down(&self) -> bool {
        self.executor.is_shut_down()
    }

    /// Route a request and return its envelope.
    pub async fn route(&self, request: InvocationRequest) -> InvocationResult {
        self.dispatch(request).await.map_err(DispatchError::into_envelope)
    }

    /// Route a request, keeping the typed error.
    pub async fn dispatch(&self, request: InvocationRequest) -> DispatchResult<Output> {
        let InvocationRequest {
            category,
            target,
            arguments,
            request_id,
            ticket,
        } = request;

        let session = self.session();
        if !session.capabilities().supports(category) {
            return Err(DispatchError::CategoryDisabled(category));
        }

        let (capability, arguments) = self.resolve(category, &target, arguments)?;
        let args = validate_arguments(
            &capability.descriptor().arguments,
            arguments,
            self.unknown_arguments,
        )?;

        tracing::debug!(%category, target = %target, "Dispatching");

        let ticket = ticket.or_else(|| request_id.clone().map(|key| self.track(key)));
        let token = match &ticket {
            Some(ticket) => ticket.token.clone(),
            None => self.executor.child_token(),
        };

        let ctx = HandlerContext::new(session, token, category, target, request_id);
        self.executor.invoke(capability, args, ctx).await
    }

    fn resolve(
        &self,
        category: CapabilityCategory,
        target: &str,
        arguments: Option<Value>,
    ) -> DispatchResult<(Arc<Capability>, Option<Value>)> {
        match self.registry.lookup(category, target) {
            Ok(capability) => Ok((capability, arguments)),
            Err(not_found) if category == CapabilityCategory::Resource => {
                let (capability, mut vars) = self
                    .registry
                    .match_resource_template(target)
                    .ok_or(not_found)?;
                // Explicit arguments are merged under the template variables.
                if let Some(Value::Object(extra)) = arguments {
                    for (k, v) in extra {
                        vars.entry(k).or_insert(v);
                    }
                }
                Ok((capability, Some(Value::Object(vars))))
            }
            Err(e) => Err(e),
        }
    }
}
