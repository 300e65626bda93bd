//! Handler trait and the per-invocation context handed to it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::arguments::Arguments;
use crate::capability::CapabilityCategory;
use crate::content::Output;
use crate::error::HandlerError;
use crate::session::SessionState;

pub type HandlerResult = Result<Output, HandlerError>;

/// User-supplied logic bound to a registered capability.
///
/// Implement this directly, or wrap an async closure with [`handler_fn`].
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, ctx: HandlerContext, args: Arguments) -> HandlerResult;
}

/// Wraps an async closure into a [`Handler`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(HandlerContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, ctx: HandlerContext, args: Arguments) -> HandlerResult {
        (self.f)(ctx, args).await
    }
}

pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(HandlerContext, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Transport-neutral key of an in-flight request, used for targeted cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for RequestKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Everything a handler may observe about the invocation it is serving.
///
/// Cancellation is cooperative: long-running handlers should check
/// [`is_cancelled`](Self::is_cancelled) or select on
/// [`cancelled`](Self::cancelled). Handlers that ignore it are aborted by the
/// executor once the grace period runs out.
#[derive(Clone)]
pub struct HandlerContext {
    session: Arc<SessionState>,
    cancel: CancellationToken,
    category: CapabilityCategory,
    target: String,
    request_id: Option<RequestKey>,
}

impl HandlerContext {
    pub fn new(
        session: Arc<SessionState>,
        cancel: CancellationToken,
        category: CapabilityCategory,
        target: impl Into<String>,
        request_id: Option<RequestKey>,
    ) -> Self {
        Self {
            session,
            cancel,
            category,
            target: target.into(),
            request_id,
        }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn category(&self) -> CapabilityCategory {
        self.category
    }

    /// The name or URI the request addressed. For template resources this is
    /// the concrete URI, not the template.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn request_id(&self) -> Option<&RequestKey> {
        self.request_id.as_ref()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the request is cancelled or timed out.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Sleep that wakes early with a cancellation error.
    pub async fn sleep(&self, duration: Duration) -> Result<(), HandlerError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancel.cancelled() => Err(HandlerError::cancelled()),
        }
    }

    /// Run `fut` unless the request is cancelled first.
    pub async fn run_until_cancelled<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("category", &self.category)
            .field("target", &self.target)
            .field("request_id", &self.request_id)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
