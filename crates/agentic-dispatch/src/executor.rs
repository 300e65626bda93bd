//! Handler execution: admission control, timeouts, cancellation, fault containment.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::arguments::Arguments;
use crate::capability::Capability;
use crate::content::Output;
use crate::error::{DispatchError, DispatchResult};
use crate::handler::{HandlerContext, HandlerResult};

/// Behaviour when every execution slot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Wait for a slot at most this long, then fail with `ResourceExhausted`.
    Wait(Duration),
    /// Fail with `ResourceExhausted` immediately.
    Reject,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of handlers running at once.
    pub max_concurrent: usize,
    pub admission: Admission,
    /// Per-call timeout. `None` disables it.
    pub call_timeout: Option<Duration>,
    /// How long a cancelled or timed-out handler may keep running before it
    /// is aborted.
    pub cancel_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 16,
            admission: Admission::Wait(Duration::from_secs(5)),
            call_timeout: Some(Duration::from_secs(60)),
            cancel_grace: Duration::from_secs(2),
        }
    }
}

enum Interrupt {
    TimedOut(Duration),
    Cancelled,
}

/// Aborts the handler task if the invoking future is dropped mid-call.
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Runs handlers in their own tasks, bounded by a semaphore.
///
/// Each task owns its permit, so a slot is released whenever the task ends:
/// normally, by panic, or by abort.
pub struct Executor {
    config: ExecutorConfig,
    slots: Arc<Semaphore>,
    root: CancellationToken,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        let max = config.max_concurrent.max(1);
        Self {
            config,
            slots: Arc::new(Semaphore::new(max)),
            root: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// A fresh token that is cancelled along with the executor.
    pub fn child_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Cancel all in-flight work and refuse new admissions.
    pub fn shutdown(&self) {
        if !self.root.is_cancelled() {
            tracing::info!("Executor shutting down, cancelling in-flight handlers");
        }
        self.root.cancel();
        self.slots.close();
    }

    pub fn is_shut_down(&self) -> bool {
        self.root.is_cancelled()
    }

    async fn admit(&self, cancel: &CancellationToken) -> DispatchResult<OwnedSemaphorePermit> {
        if self.is_shut_down() {
            return Err(DispatchError::ShuttingDown);
        }
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }

        match self.config.admission {
            Admission::Reject => match Arc::clone(&self.slots).try_acquire_owned() {
                Ok(permit) => Ok(permit),
                Err(TryAcquireError::NoPermits) => Err(DispatchError::ResourceExhausted {
                    waited: Duration::ZERO,
                }),
                Err(TryAcquireError::Closed) => Err(DispatchError::ShuttingDown),
            },
            Admission::Wait(limit) => {
                let acquire = Arc::clone(&self.slots).acquire_owned();
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(DispatchError::Cancelled),
                    acquired = tokio::time::timeout(limit, acquire) => match acquired {
                        Ok(Ok(permit)) => Ok(permit),
                        Ok(Err(_closed)) => Err(DispatchError::ShuttingDown),
                        Err(_elapsed) => Err(DispatchError::ResourceExhausted { waited: limit }),
                    },
                }
            }
        }
    }

    /// Run `capability`'s handler with `args`.
    ///
    /// The handler observes cancellation through `ctx`; the same token is
    /// cancelled when the per-call timeout fires.
    pub async fn invoke(
        &self,
        capability: Arc<Capability>,
        args: Arguments,
        ctx: HandlerContext,
    ) -> DispatchResult<Output> {
        let token = ctx.cancellation_token().clone();
        let permit = match self.admit(&token).await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::warn!(target_name = %capability.name(), error = %e, "Admission refused");
                return Err(e);
            }
        };

        let handler = Arc::clone(capability.handler());
        let mut task = tokio::spawn(async move {
            let _permit = permit;
            handler.call(ctx, args).await
        });
        let _abort = AbortOnDrop(task.abort_handle());

        let call_timeout = self.config.call_timeout;
        let deadline = async move {
            match call_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let interrupt = tokio::select! {
            biased;
            joined = &mut task => return finish(capability.name(), joined),
            _ = token.cancelled() => Interrupt::Cancelled,
            _ = deadline => Interrupt::TimedOut(call_timeout.unwrap_or_default()),
        };

        token.cancel();
        match tokio::time::timeout(self.config.cancel_grace, &mut task).await {
            Ok(_) => {
                tracing::debug!(target_name = %capability.name(), "Handler stopped after cancellation");
            }
            Err(_) => {
                tracing::warn!(
                    target_name = %capability.name(),
                    grace_ms = self.config.cancel_grace.as_millis() as u64,
                    "Handler ignored cancellation, aborting"
                );
                task.abort();
            }
        }

        Err(match interrupt {
            Interrupt::TimedOut(limit) => {
                tracing::warn!(target_name = %capability.name(), timeout_ms = limit.as_millis() as u64, "Handler timed out");
                DispatchError::TimedOut(limit)
            }
            Interrupt::Cancelled => {
                tracing::info!(target_name = %capability.name(), "Handler cancelled");
                DispatchError::Cancelled
            }
        })
    }
}

fn finish(name: &str, joined: Result<HandlerResult, JoinError>) -> DispatchResult<Output> {
    match joined {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => {
            tracing::error!(target_name = %name, error = %e, "Handler returned an error");
            Err(DispatchError::Handler(e))
        }
        Err(join) if join.is_panic() => {
            let message = panic_message(join.into_panic());
            tracing::error!(target_name = %name, panic = %message, "Handler panicked");
            Err(DispatchError::Panicked(message))
        }
        Err(_) => Err(DispatchError::Cancelled),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
