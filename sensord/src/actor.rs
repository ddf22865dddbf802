//! Actor plumbing shared by every entity in the registry tree
//!
//! Each entity runs as a tokio task draining its own mailbox. This module holds the
//! pieces that make those tasks addressable and watchable:
//! - [`ActorId`]: process-unique identity, never reused
//! - [`Lifeline`] / [`ExitWatch`]: an entity announces its exit, watchers observe it
//! - [`Monitor`]: forwards the exit of watched entities into the watcher's mailbox
//! - [`ReplyTo`]: reply target carried inside a request

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::debug;

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a spawned entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ActorId(u64);

impl ActorId {
    /// Allocate a fresh identity
    pub fn next() -> Self {
        Self(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor-{}", self.0)
    }
}

/// Held by a running entity for as long as it lives
///
/// Calling [`Lifeline::exit`] (or dropping the lifeline, e.g. on panic) wakes every
/// [`ExitWatch`] cloned from it.
#[derive(Debug)]
pub struct Lifeline {
    id: ActorId,
    tx: watch::Sender<bool>,
}

impl Lifeline {
    /// Create a lifeline and the first watch on it
    pub fn new(id: ActorId) -> (Self, ExitWatch) {
        let (tx, rx) = watch::channel(false);
        (Self { id, tx }, ExitWatch { id, rx })
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Announce the exit to every watcher
    pub fn exit(&self) {
        debug!(actor = %self.id, "Lifeline::exit: called");
        self.tx.send_replace(true);
    }
}

/// Observer side of a [`Lifeline`]
#[derive(Debug, Clone)]
pub struct ExitWatch {
    id: ActorId,
    rx: watch::Receiver<bool>,
}

impl ExitWatch {
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// True once the entity announced its exit or dropped its lifeline
    pub fn has_exited(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve when the entity exits
    pub async fn exited(mut self) {
        // Err means the lifeline was dropped without an announcement, which is an exit too
        let _ = self.rx.wait_for(|exited| *exited).await;
    }
}

/// Explicit liveness monitoring
///
/// Each watch spawns a small forwarding task that waits on the target's [`ExitWatch`]
/// and then pushes a typed notice into the watcher's mailbox. The mailbox is held
/// weakly so a monitor never keeps its owner alive.
pub struct Monitor<M> {
    mailbox: mpsc::WeakSender<M>,
    watches: HashMap<ActorId, AbortHandle>,
}

impl<M: Send + 'static> Monitor<M> {
    pub fn new(mailbox: &mpsc::Sender<M>) -> Self {
        Self {
            mailbox: mailbox.downgrade(),
            watches: HashMap::new(),
        }
    }

    /// Deliver `on_exit(id)` to the mailbox once the watched entity exits
    ///
    /// Watching an entity that is already watched is a no-op.
    pub fn watch<F>(&mut self, target: ExitWatch, on_exit: F)
    where
        F: FnOnce(ActorId) -> M + Send + 'static,
    {
        let id = target.id();
        if self.watches.contains_key(&id) {
            return;
        }
        debug!(actor = %id, "Monitor::watch: called");

        let mailbox = self.mailbox.clone();
        let task = tokio::spawn(async move {
            target.exited().await;
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(on_exit(id)).await;
            }
        });
        self.watches.insert(id, task.abort_handle());
    }

    /// Stop watching; returns false if the entity was not watched
    pub fn unwatch(&mut self, id: ActorId) -> bool {
        match self.watches.remove(&id) {
            Some(task) => {
                debug!(actor = %id, "Monitor::unwatch: called");
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_watching(&self, id: ActorId) -> bool {
        self.watches.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}

impl<M> Drop for Monitor<M> {
    fn drop(&mut self) {
        for (_, task) in self.watches.drain() {
            task.abort();
        }
    }
}

/// Where a reply to a request should be delivered
#[derive(Debug)]
pub enum ReplyTo<T> {
    /// Single reply awaited by a caller
    Once(oneshot::Sender<T>),
    /// Reply folded into another entity's mailbox
    Mailbox(mpsc::Sender<T>),
}

impl<T> ReplyTo<T> {
    /// Create a one-shot reply target and the receiver awaiting it
    pub fn once() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (Self::Once(tx), rx)
    }

    /// Deliver the reply; false if nobody is listening anymore
    pub async fn send(self, msg: T) -> bool {
        match self {
            ReplyTo::Once(tx) => tx.send(msg).is_ok(),
            ReplyTo::Mailbox(tx) => tx.send(msg).await.is_ok(),
        }
    }
}

impl<T> From<oneshot::Sender<T>> for ReplyTo<T> {
    fn from(tx: oneshot::Sender<T>) -> Self {
        ReplyTo::Once(tx)
    }
}

impl<T> From<mpsc::Sender<T>> for ReplyTo<T> {
    fn from(tx: mpsc::Sender<T>) -> Self {
        ReplyTo::Mailbox(tx)
    }
}
