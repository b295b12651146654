//! Lazy, single-flight engine bootstrap.
//!
//! ```text
//!  Unloaded ──load()──▶ Loading(spawned task) ──ok──▶ Loaded (terminal)
//!      ▲                        │
//!      └──────────── err ───────┘
//! ```
//!
//! The first caller spawns the acquisition as a tokio task; every caller that
//! arrives while it runs awaits the same [`Shared`] handle to it, so N
//! concurrent callers trigger one acquisition and all observe the same
//! outcome. The task records its own outcome in the loader state, so a load
//! keeps going (and still lands in `Loaded` or `Unloaded`) after every waiter
//! has given up. A failed load is not cached: the state drops back to
//! `Unloaded` and the next call starts a fresh attempt.
//!
//! Acquisition walks the configured [`EngineSource`]s in order on the
//! blocking pool and stops at the first success.

use crate::config::ConverterConfig;
use crate::engine::{EngineHandle, EngineSource, WorkerEndpoint};
use crate::error::EngineLoadError;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

type LoadOutcome = Result<Arc<EngineHandle>, Arc<EngineLoadError>>;
type LoadFuture = Shared<BoxFuture<'static, LoadOutcome>>;

enum LoadState {
    Unloaded,
    Loading { attempt: u64, future: LoadFuture },
    Loaded(Arc<EngineHandle>),
}

/// Observable bootstrap phase, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPhase {
    Unloaded,
    Loading,
    Loaded,
}

/// Memoised asynchronous engine factory with request coalescing.
pub struct EngineLoader {
    sources: Arc<[Arc<dyn EngineSource>]>,
    config: Arc<ConverterConfig>,
    state: Arc<Mutex<LoadState>>,
    attempts: Mutex<u64>,
}

impl EngineLoader {
    pub fn new(sources: Vec<Arc<dyn EngineSource>>, config: Arc<ConverterConfig>) -> Self {
        Self {
            sources: sources.into(),
            config,
            state: Arc::new(Mutex::new(LoadState::Unloaded)),
            attempts: Mutex::new(0),
        }
    }

    pub fn phase(&self) -> LoadPhase {
        match &*self.state.lock() {
            LoadState::Unloaded => LoadPhase::Unloaded,
            LoadState::Loading { .. } => LoadPhase::Loading,
            LoadState::Loaded(_) => LoadPhase::Loaded,
        }
    }

    /// Number of bootstrap attempts started so far.
    pub fn attempts(&self) -> u64 {
        *self.attempts.lock()
    }

    /// The engine, if it has finished loading.
    pub fn loaded(&self) -> Option<Arc<EngineHandle>> {
        match &*self.state.lock() {
            LoadState::Loaded(handle) => Some(Arc::clone(handle)),
            _ => None,
        }
    }

    /// Return the loaded engine, starting or joining a bootstrap as needed.
    ///
    /// Must be called from within a tokio runtime. Dropping the returned
    /// future does not cancel the bootstrap.
    pub async fn load(&self) -> LoadOutcome {
        let (attempt, future) = {
            let mut state = self.state.lock();
            match &*state {
                LoadState::Loaded(handle) => return Ok(Arc::clone(handle)),
                LoadState::Loading { attempt, future } => {
                    debug!(attempt, "Joining in-flight engine load");
                    (*attempt, future.clone())
                }
                LoadState::Unloaded => {
                    let attempt = {
                        let mut attempts = self.attempts.lock();
                        *attempts += 1;
                        *attempts
                    };
                    info!(attempt, sources = self.sources.len(), "Loading rendering engine");
                    let future = self.spawn_attempt(attempt);
                    *state = LoadState::Loading {
                        attempt,
                        future: future.clone(),
                    };
                    (attempt, future)
                }
            }
        };

        let outcome = future.await;
        // The task has normally settled the state already; this covers a task
        // that panicked or was cancelled before it could.
        settle(&self.state, attempt, &outcome);
        outcome
    }

    /// Spawn acquisition for `attempt`. The task settles the state itself,
    /// so it advances whether or not anyone is still waiting.
    ///
    /// Called with the state lock held. The task takes that lock only after
    /// acquisition, so it always finds `Loading { attempt }` already stored.
    fn spawn_attempt(&self, attempt: u64) -> LoadFuture {
        let sources = Arc::clone(&self.sources);
        let config = Arc::clone(&self.config);
        let state = Arc::clone(&self.state);

        let task = tokio::spawn(async move {
            let outcome = acquire(sources, config).await;
            settle(&state, attempt, &outcome);
            outcome
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| Err(Arc::new(EngineLoadError::Panicked(e.to_string()))))
        })
        .boxed()
        .shared()
    }
}

/// Move `Loading { attempt }` to its terminal state. Any other state is left
/// alone: a later attempt may already have replaced it.
fn settle(state: &Mutex<LoadState>, attempt: u64, outcome: &LoadOutcome) {
    let mut state = state.lock();
    if let LoadState::Loading { attempt: current, .. } = &*state {
        if *current == attempt {
            *state = match outcome {
                Ok(handle) => LoadState::Loaded(Arc::clone(handle)),
                Err(_) => LoadState::Unloaded,
            };
        }
    }
}

/// Try each source in order; configure the worker endpoint on the first
/// engine obtained.
async fn acquire(
    sources: Arc<[Arc<dyn EngineSource>]>,
    config: Arc<ConverterConfig>,
) -> LoadOutcome {
    let mut last = None;

    for source in sources.iter() {
        let name = source.name().to_string();
        let task_source = Arc::clone(source);
        let result = tokio::task::spawn_blocking(move || task_source.acquire())
            .await
            .unwrap_or_else(|e| Err(EngineLoadError::Panicked(e.to_string())));

        match result {
            Ok(engine) => {
                let version = engine.version();
                let endpoint = WorkerEndpoint::resolve(version.as_deref(), &config);
                engine.set_worker_endpoint(&endpoint);
                info!(
                    source = %name,
                    version = version.as_deref().unwrap_or("unknown"),
                    %endpoint,
                    "Rendering engine loaded"
                );
                return Ok(Arc::new(EngineHandle {
                    engine,
                    endpoint,
                    source: name,
                }));
            }
            Err(e) => {
                warn!(source = %name, error = %e, "Engine source failed; trying next");
                last = Some(e);
            }
        }
    }

    let err = match last {
        Some(last) => EngineLoadError::Exhausted {
            tried: sources.len(),
            last: Box::new(last),
        },
        None => EngineLoadError::NoSources,
    };
    Err(Arc::new(err))
}
