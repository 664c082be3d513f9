//! Single entry point for running code.
//!
//! The gateway tracks the backend's readiness:
//!
//! ```text
//! Uninitialized --initialize--> Initializing --ok--> Ready
//!                                    |
//!                                    +--err--> Failed --initialize--> Initializing
//! ```
//!
//! Initialization is single-flight: concurrent callers share one pending
//! handshake and all observe its outcome. Once `Ready`, the backend is never
//! initialized again.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use academy_core::{BackendKind, Config};
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, instrument, warn};

use crate::local::{LocalBackend, PythonInterpreter};
use crate::remote::RemoteBackend;
use crate::{ExecutionBackend, ExecutionResult, RuntimeError};

type PendingInit = Shared<BoxFuture<'static, Result<(), String>>>;

enum State {
    Uninitialized,
    Initializing { attempt: u64, pending: PendingInit },
    Ready,
    Failed(String),
}

/// Observable readiness of the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayState {
    /// No handshake has been attempted.
    Uninitialized,
    /// A handshake is in flight.
    Initializing,
    /// Code can be executed.
    Ready,
    /// The last handshake failed with this reason.
    Failed(String),
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

struct Inner {
    state: State,
    attempts: u64,
}

/// Dispatches code to one backend and tracks its readiness.
///
/// Cloning is cheap; clones share the backend and its state.
#[derive(Clone)]
pub struct ExecutionGateway {
    backend: Arc<dyn ExecutionBackend>,
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for ExecutionGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionGateway")
            .field("backend", &self.backend.name())
            .field("state", &self.state())
            .finish()
    }
}

impl ExecutionGateway {
    /// Wraps a backend. No handshake happens until [`initialize`](Self::initialize).
    #[must_use]
    pub fn new(backend: Arc<dyn ExecutionBackend>) -> Self {
        Self {
            backend,
            inner: Arc::new(Mutex::new(Inner {
                state: State::Uninitialized,
                attempts: 0,
            })),
        }
    }

    /// Builds the backend selected by `backend` in the configuration.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::HttpClient` if the remote client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, RuntimeError> {
        let backend: Arc<dyn ExecutionBackend> = match config.backend {
            BackendKind::Local => Arc::new(LocalBackend::new(
                PythonInterpreter::from_config(&config.execution),
                std::time::Duration::from_secs(config.execution.timeout_seconds),
            )),
            BackendKind::Remote => Arc::new(RemoteBackend::from_config(config)?),
        };
        info!(backend = backend.name(), "Execution backend selected");
        Ok(Self::new(backend))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Name of the wrapped backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Current readiness.
    #[must_use]
    pub fn state(&self) -> GatewayState {
        match &self.lock().state {
            State::Uninitialized => GatewayState::Uninitialized,
            State::Initializing { .. } => GatewayState::Initializing,
            State::Ready => GatewayState::Ready,
            State::Failed(reason) => GatewayState::Failed(reason.clone()),
        }
    }

    /// Whether code can be executed right now.
    #[must_use]
    pub fn ready(&self) -> bool {
        matches!(self.lock().state, State::Ready)
    }

    /// Brings the backend up, or joins a handshake already in flight.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError::BackendUnavailable` if the handshake fails. The
    /// gateway is then `Failed` and the next call starts a fresh handshake.
    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn initialize(&self) -> Result<(), RuntimeError> {
        let (attempt, pending) = {
            let mut inner = self.lock();
            if matches!(inner.state, State::Ready) {
                return Ok(());
            }
            if let State::Initializing { attempt, pending } = &inner.state {
                debug!(attempt, "Joining handshake in flight");
                (*attempt, pending.clone())
            } else {
                inner.attempts += 1;
                let attempt = inner.attempts;
                let backend = Arc::clone(&self.backend);
                let pending = async move { backend.initialize().await.map_err(|e| e.to_string()) }
                    .boxed()
                    .shared();
                inner.state = State::Initializing {
                    attempt,
                    pending: pending.clone(),
                };
                info!(attempt, "Starting backend handshake");
                (attempt, pending)
            }
        };

        let outcome = pending.await;

        {
            let mut inner = self.lock();
            // Only the attempt we awaited may move the state on.
            if matches!(&inner.state, State::Initializing { attempt: current, .. } if *current == attempt)
            {
                inner.state = match &outcome {
                    Ok(()) => {
                        info!(attempt, "Execution backend ready");
                        State::Ready
                    }
                    Err(reason) => {
                        warn!(attempt, reason = %reason, "Execution backend failed to initialize");
                        State::Failed(reason.clone())
                    }
                };
            }
        }

        outcome.map_err(|reason| RuntimeError::BackendUnavailable {
            backend: self.backend.name(),
            reason,
        })
    }

    /// Runs code on the backend.
    ///
    /// Before the gateway is ready this returns a failure result immediately,
    /// without touching the backend.
    pub async fn execute(&self, code: &str) -> ExecutionResult {
        if !self.ready() {
            debug!("Execute requested before the backend is ready");
            return ExecutionResult::not_ready();
        }
        self.backend.execute(code).await
    }
}
