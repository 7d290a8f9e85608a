//! Per-session pipeline state and the registry that owns it
//!
//! The registry is an explicit, injectable table rather than ambient global
//! state, so tests construct isolated registries and sessions never share
//! locks or limiters with one another.

use std::collections::{BTreeMap, BinaryHeap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use voice_relay_config::PipelineSettings;
use voice_relay_core::{Sentence, SessionId, SynthesisTask, TurnId, VoiceConfig};

/// Everything one turn accumulates: the transcript buffer and the
/// `seq -> audio path` map the archiver reads on the last sentence.
pub(crate) struct TurnContext {
    pub id: TurnId,
    pub started: Instant,
    pub transcript: String,
    pub audio: BTreeMap<u32, std::path::PathBuf>,
}

impl TurnContext {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            started: Instant::now(),
            transcript: String::new(),
            audio: BTreeMap::new(),
        }
    }
}

/// Per-session counters, queues, flags, and concurrency primitives.
///
/// Created lazily on the first fragment of a turn, cleared on abort, and
/// destroyed on session close. All mutual exclusion here is session-scoped.
pub struct SessionState {
    session_id: SessionId,
    /// Ordering-key generator; `next_seq` starts each turn at 1.
    seq: AtomicU32,
    /// Bumped whenever the turn is reset. Completions carrying a stale
    /// epoch must become silent no-ops.
    epoch: AtomicU64,
    first_done: AtomicBool,
    playing: AtomicBool,
    /// At most one deferred stall re-check may be outstanding.
    recheck_scheduled: AtomicBool,
    /// Guards the sequencer's pick-and-dispatch critical section. Acquired
    /// with `try_lock` only; contention means another caller is advancing.
    pub(crate) gate: Mutex<()>,
    /// Undelivered sentences of the current turn, keyed by `seq`.
    pub(crate) pending: Mutex<BTreeMap<u32, Sentence>>,
    /// Synthesis work not yet started, highest priority popped first.
    pub(crate) queue: Mutex<BinaryHeap<SynthesisTask>>,
    /// Bounded synthesis concurrency. Swapped for a fresh semaphore on turn
    /// reset so queued drains never wait on permits held by doomed jobs.
    limiter: Mutex<Arc<Semaphore>>,
    pub(crate) turn: Mutex<TurnContext>,
    pub(crate) voice: Mutex<VoiceConfig>,
    last_activity: Mutex<Instant>,
}

impl SessionState {
    fn new(session_id: &str, limit: usize, voice: VoiceConfig) -> Self {
        Self {
            session_id: session_id.to_owned(),
            seq: AtomicU32::new(0),
            epoch: AtomicU64::new(0),
            first_done: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            recheck_scheduled: AtomicBool::new(false),
            gate: Mutex::new(()),
            pending: Mutex::new(BTreeMap::new()),
            queue: Mutex::new(BinaryHeap::new()),
            limiter: Mutex::new(Arc::new(Semaphore::new(limit))),
            turn: Mutex::new(TurnContext::new()),
            voice: Mutex::new(voice),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn next_seq(&self) -> u32 {
        self.seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn first_done(&self) -> bool {
        self.first_done.load(Ordering::Acquire)
    }

    pub(crate) fn mark_first_done(&self) {
        self.first_done.store(true, Ordering::Release);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub(crate) fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    /// Claim the right to schedule the single deferred stall re-check.
    pub(crate) fn claim_recheck(&self) -> bool {
        !self.recheck_scheduled.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn release_recheck(&self) {
        self.recheck_scheduled.store(false, Ordering::Release);
    }

    pub(crate) fn limiter(&self) -> Arc<Semaphore> {
        Arc::clone(&self.limiter.lock())
    }

    /// Refresh the liveness marker so slow synthesis is not mistaken for an
    /// idle session by the transport's inactivity timeout.
    pub(crate) fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    pub fn current_turn(&self) -> TurnId {
        self.turn.lock().id
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop all turn-scoped state and start fresh: clears the pending set
    /// and task queue, resets the ordering-key generator and first-done
    /// flag, bumps the epoch so in-flight completions become no-ops, and
    /// installs a fresh limiter so the next turn starts with full capacity.
    pub(crate) fn reset_turn(&self, limit: usize) -> TurnId {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.seq.store(0, Ordering::Release);
        self.first_done.store(false, Ordering::Release);
        self.pending.lock().clear();
        self.queue.lock().clear();
        *self.limiter.lock() = Arc::new(Semaphore::new(limit));

        let mut turn = self.turn.lock();
        *turn = TurnContext::new();
        turn.id
    }
}

/// Explicit table of per-session state, owned by the pipeline.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, Arc<SessionState>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get-or-create, idempotent under concurrent callers.
    pub(crate) fn ensure(
        &self,
        session: &str,
        settings: &PipelineSettings,
        voice: VoiceConfig,
    ) -> Arc<SessionState> {
        self.sessions
            .entry(session.to_owned())
            .or_insert_with(|| {
                tracing::info!(session, "creating session pipeline state");
                Arc::new(SessionState::new(
                    session,
                    settings.max_concurrent_synthesis,
                    voice,
                ))
            })
            .value()
            .clone()
    }

    pub fn get(&self, session: &str) -> Option<Arc<SessionState>> {
        self.sessions.get(session).map(|entry| entry.value().clone())
    }

    /// Remove all state for a session. Idempotent; returns whether anything
    /// was removed.
    pub fn remove(&self, session: &str) -> bool {
        self.sessions.remove(session).is_some()
    }

    pub fn contains(&self, session: &str) -> bool {
        self.sessions.contains_key(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
