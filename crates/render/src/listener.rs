//! Page-side render listener
//!
//! Turns a bursty stream of Storybook channel events into exactly one
//! [`RenderOutcome`]. Successful renders are debounced on the trailing edge so
//! the last settled DOM wins; failures resolve immediately.
//!
//! ```text
//!   Idle ──rendered/unchanged──▶ AwaitingSettle ──timer──▶ Resolved
//!    │                              │   ▲                     ▲
//!    │                              └───┘ re-arm              │
//!    └──────────── missing / errored / exception / no root ───┘
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::{RenderError, RenderResult};
use crate::outcome::{
    events, ExceptionOrigin, RenderOutcome, RenderRequest, RootRef, CHANNEL_UNAVAILABLE_MESSAGE,
    STORY_MISSING_MESSAGE,
};

/// Default settle window after the last successful render event.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

pub type EventHandler = Box<dyn Fn(Value) + Send + Sync>;

/// What the listener needs from the page it runs in.
pub trait ChannelContext: Send + Sync {
    /// Whether the Storybook channel object exists in the page.
    fn channel_available(&self) -> bool;

    fn subscribe(&self, event: &str, handler: EventHandler);

    fn emit(&self, event: &str, payload: Value);

    /// First element child of the story root, if any.
    fn query_root(&self) -> Option<RootRef>;
}

enum Phase {
    Idle,
    AwaitingSettle {
        timer: JoinHandle<()>,
        candidate: RenderOutcome,
    },
    Resolved,
}

struct Machine {
    phase: Phase,
    /// Bumped on every re-arm; a timer only settles its own generation.
    generation: u64,
    settle_delay: Duration,
    runtime: Handle,
    done: Option<oneshot::Sender<RenderOutcome>>,
}

impl Machine {
    fn resolve(&mut self, outcome: RenderOutcome) {
        if let Phase::AwaitingSettle { timer, .. } = std::mem::replace(&mut self.phase, Phase::Resolved) {
            timer.abort();
        }
        info!(kind = outcome.kind(), "Render listener resolved");
        if let Some(done) = self.done.take() {
            let _ = done.send(outcome);
        }
    }

    fn settle(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        if let Phase::AwaitingSettle { candidate, .. } = std::mem::replace(&mut self.phase, Phase::Resolved) {
            info!(kind = candidate.kind(), "Render settled");
            if let Some(done) = self.done.take() {
                let _ = done.send(candidate);
            }
        }
    }
}

fn observe(shared: &Arc<Mutex<Machine>>, candidate: RenderOutcome) {
    let mut machine = shared.lock();

    if matches!(machine.phase, Phase::Resolved) {
        trace!(kind = candidate.kind(), "Ignoring event after resolution");
        return;
    }

    if candidate.is_terminal() {
        machine.resolve(candidate);
        return;
    }

    machine.generation += 1;
    let generation = machine.generation;
    let delay = machine.settle_delay;
    let timer_state = Arc::clone(shared);
    let timer = machine.runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        timer_state.lock().settle(generation);
    });

    debug!(kind = candidate.kind(), generation, "Arming settle timer");
    let previous = std::mem::replace(&mut machine.phase, Phase::AwaitingSettle { timer, candidate });
    if let Phase::AwaitingSettle { timer, .. } = previous {
        timer.abort();
    }
}

/// The outcome of one attached listener, not yet settled.
pub struct PendingOutcome {
    rx: oneshot::Receiver<RenderOutcome>,
    machine: Arc<Mutex<Machine>>,
}

impl PendingOutcome {
    /// Wait for the listener to resolve.
    pub async fn wait(self) -> RenderResult<RenderOutcome> {
        self.rx.await.map_err(|_| {
            RenderError::Transport("render listener was dropped before the story resolved".into())
        })
    }

    /// Take the outcome if the listener has already resolved.
    pub fn try_take(&mut self) -> Option<RenderOutcome> {
        self.rx.try_recv().ok()
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.machine.lock().phase, Phase::Resolved)
    }
}

/// Attaches render listeners to a page channel.
pub struct Listener;

impl Listener {
    /// Subscribe to the channel, request a remount and return the pending outcome.
    ///
    /// Must be called from within a tokio runtime; the settle timer is spawned
    /// on it even when channel events arrive on another thread.
    pub fn attach<C>(
        context: &Arc<C>,
        request: RenderRequest,
        settle_delay: Duration,
    ) -> RenderResult<PendingOutcome>
    where
        C: ChannelContext + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| RenderError::Transport(format!("render listener needs a tokio runtime: {}", e)))?;

        let (tx, rx) = oneshot::channel();
        let machine = Arc::new(Mutex::new(Machine {
            phase: Phase::Idle,
            generation: 0,
            settle_delay,
            runtime,
            done: Some(tx),
        }));

        if !context.channel_available() {
            warn!(story_id = request.story_id(), "Storybook channel is not available");
            let error = request.outcome_error(CHANNEL_UNAVAILABLE_MESSAGE);
            machine.lock().resolve(RenderOutcome::Exception {
                origin: ExceptionOrigin::Channel,
                error,
            });
            return Ok(PendingOutcome { rx, machine });
        }

        let request = Arc::new(request);
        let page: Weak<C> = Arc::downgrade(context);

        for event in subscribed_events(&request) {
            let request = Arc::clone(&request);
            let page = page.clone();
            let shared = Arc::clone(&machine);
            context.subscribe(
                event,
                Box::new(move |payload| {
                    debug!(event, "Channel event");
                    let root = || page.upgrade().and_then(|p| p.query_root());
                    if let Some(candidate) = candidate_for(&request, event, &payload, root) {
                        observe(&shared, candidate);
                    }
                }),
            );
        }

        debug!(story_id = request.story_id(), view_mode = %request.view_mode(), "Requesting remount");
        context.emit(events::FORCE_REMOUNT, request.remount_payload());

        Ok(PendingOutcome { rx, machine })
    }
}

fn subscribed_events(request: &RenderRequest) -> [&'static str; 6] {
    [
        request.view_mode().rendered_event(),
        events::STORY_UNCHANGED,
        events::STORY_ERRORED,
        events::STORY_THREW_EXCEPTION,
        events::STORY_MISSING,
        events::PLAY_FUNCTION_THREW_EXCEPTION,
    ]
}

fn payload_field(payload: &Value, field: &str) -> String {
    match payload.get(field).and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => payload.to_string(),
    }
}

/// Map one channel event to the outcome it would resolve with.
fn candidate_for(
    request: &RenderRequest,
    event: &str,
    payload: &Value,
    root: impl FnOnce() -> Option<RootRef>,
) -> Option<RenderOutcome> {
    match event {
        events::STORY_RENDERED | events::DOCS_RENDERED => Some(RenderOutcome::Rendered { root: root() }),
        events::STORY_UNCHANGED => Some(RenderOutcome::Unchanged { root: root() }),
        events::STORY_MISSING => {
            if payload.as_str() != Some(request.story_id()) {
                trace!(?payload, "Ignoring storyMissing for another story");
                return None;
            }
            Some(RenderOutcome::Missing {
                error: request.outcome_error(STORY_MISSING_MESSAGE),
            })
        }
        events::STORY_ERRORED => Some(RenderOutcome::Errored {
            error: request.outcome_error(&payload_field(payload, "description")),
        }),
        events::STORY_THREW_EXCEPTION => Some(RenderOutcome::Exception {
            origin: ExceptionOrigin::Story,
            error: request.outcome_error(&payload_field(payload, "message")),
        }),
        events::PLAY_FUNCTION_THREW_EXCEPTION => Some(RenderOutcome::Exception {
            origin: ExceptionOrigin::PlayFunction,
            error: request.outcome_error(&payload_field(payload, "message")),
        }),
        _ => None,
    }
}
