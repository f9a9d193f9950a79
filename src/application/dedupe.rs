//! Fan-out of concurrent identical reads onto a single producer.
//!
//! The first caller for a key registers a shared pending result and spawns
//! the producer on its own task; callers arriving while it runs await the
//! same shared result. The entry is removed as soon as the producer settles,
//! before the outcome is delivered, so later callers start a fresh call.

use std::{future::Future, hash::Hash, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use metrics::counter;
use thiserror::Error;
use tokio::sync::oneshot;

const METRIC_DEDUPE_JOINED: &str = "sheets_proxy_dedupe_joined_total";

type SharedOutcome<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// The producer for a key finished without delivering an outcome (it panicked
/// or its task was cancelled).
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("in-flight request ended without a result")]
pub struct Abandoned;

pub struct RequestDeduplicator<K, V, E> {
    in_flight: Arc<DashMap<K, SharedOutcome<V, E>>>,
}

impl<K, V, E> Clone for RequestDeduplicator<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<K, V, E> Default for RequestDeduplicator<K, V, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
        }
    }
}

enum Slot<K, V, E>
where
    K: Eq + Hash,
{
    Joined(SharedOutcome<V, E>),
    Leader {
        shared: SharedOutcome<V, E>,
        sender: oneshot::Sender<Result<V, E>>,
        guard: InFlightGuard<K, V, E>,
    },
}

impl<K, V, E> RequestDeduplicator<K, V, E>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + From<Abandoned> + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with a producer currently running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run `producer` for `key` unless one is already running, in which case
    /// wait for that one's outcome instead.
    pub async fn run_exclusive<F, Fut>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        match self.claim(key) {
            Slot::Joined(shared) => {
                counter!(METRIC_DEDUPE_JOINED).increment(1);
                shared.await
            }
            Slot::Leader {
                shared,
                sender,
                guard,
            } => {
                let work = producer();
                tokio::spawn(async move {
                    let outcome = work.await;
                    drop(guard);
                    let _ = sender.send(outcome);
                });
                shared.await
            }
        }
    }

    fn claim(&self, key: K) -> Slot<K, V, E> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => Slot::Joined(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let (sender, receiver) = oneshot::channel();
                let shared = receiver
                    .map(|delivered| delivered.unwrap_or_else(|_| Err(E::from(Abandoned))))
                    .boxed()
                    .shared();
                vacant.insert(shared.clone());
                Slot::Leader {
                    shared,
                    sender,
                    guard: InFlightGuard {
                        key,
                        in_flight: Arc::clone(&self.in_flight),
                    },
                }
            }
        }
    }
}

struct InFlightGuard<K, V, E>
where
    K: Eq + Hash,
{
    key: K,
    in_flight: Arc<DashMap<K, SharedOutcome<V, E>>>,
}

impl<K, V, E> Drop for InFlightGuard<K, V, E>
where
    K: Eq + Hash,
{
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}
