//! Observer registry
//!
//! Every published snapshot carries a sequence number taken under the queue's
//! state lock. Each observer has a small mailbox that accepts only snapshots
//! newer than the last one it accepted and hands them to the callback in
//! order, one caller at a time. Publishers on different threads can therefore
//! race freely without an observer ever ending on an outdated view.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::warn;

use crate::job::panic_message;
use crate::snapshot::QueueSnapshot;

/// Callback notified with a snapshot after every queue transition
pub type Observer = Arc<dyn Fn(&QueueSnapshot) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Mailbox {
    /// Sequence number of the newest snapshot accepted
    accepted: u64,
    pending: VecDeque<QueueSnapshot>,
    /// Some caller is currently draining `pending`
    draining: bool,
}

/// One registered observer
struct Slot {
    callback: Observer,
    mailbox: Mutex<Mailbox>,
    retired: AtomicBool,
}

impl Slot {
    fn new(callback: Observer) -> Self {
        Self {
            callback,
            mailbox: Mutex::new(Mailbox::default()),
            retired: AtomicBool::new(false),
        }
    }

    /// Offer snapshot `seq`, then drain the mailbox unless another caller
    /// already is. Re-entrant publishes from inside the callback land in the
    /// mailbox and are delivered once the callback returns.
    fn offer(&self, queue: &str, id: u64, seq: u64, snapshot: &QueueSnapshot) {
        {
            let mut mailbox = lock(&self.mailbox);
            if seq <= mailbox.accepted {
                return;
            }
            mailbox.accepted = seq;
            mailbox.pending.push_back(snapshot.clone());
            if mailbox.draining {
                return;
            }
            mailbox.draining = true;
        }

        loop {
            let next = {
                let mut mailbox = lock(&self.mailbox);
                match mailbox.pending.pop_front() {
                    Some(next) if !self.retired.load(Ordering::SeqCst) => next,
                    _ => {
                        mailbox.pending.clear();
                        mailbox.draining = false;
                        return;
                    }
                }
            };
            deliver(queue, id, &self.callback, &next);
        }
    }
}

#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: u64,
    observers: BTreeMap<u64, Arc<Slot>>,
}

impl ObserverRegistry {
    fn register(&mut self, observer: Observer) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.observers.insert(id, Arc::new(Slot::new(observer)));
        id
    }

    fn remove(&mut self, id: u64) {
        if let Some(slot) = self.observers.remove(&id) {
            slot.retired.store(true, Ordering::SeqCst);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

/// Shared handle to a registry.
///
/// Callbacks run with both the registry lock and the mailbox lock released,
/// so a callback may subscribe, unsubscribe, submit or read the queue.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    registry: Arc<Mutex<ObserverRegistry>>,
}

impl Observers {
    pub(crate) fn register(&self, observer: Observer) -> Subscription {
        let id = lock(&self.registry).register(observer);
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
            active: AtomicBool::new(true),
        }
    }

    pub(crate) fn count(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Deliver snapshot `seq` to every registered observer
    pub(crate) fn broadcast(&self, queue: &str, seq: u64, snapshot: &QueueSnapshot) {
        let targets: Vec<(u64, Arc<Slot>)> = lock(&self.registry)
            .observers
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect();

        // An earlier callback may unsubscribe a later observer; `retired`
        // keeps it from hearing this snapshot.
        for (id, slot) in targets {
            if slot.retired.load(Ordering::SeqCst) {
                continue;
            }
            slot.offer(queue, id, seq, snapshot);
        }
    }

    /// Deliver snapshot `seq` to a single observer
    pub(crate) fn deliver_to(
        &self,
        queue: &str,
        subscription: &Subscription,
        seq: u64,
        snapshot: &QueueSnapshot,
    ) {
        let slot = lock(&self.registry).observers.get(&subscription.id).cloned();
        if let Some(slot) = slot {
            slot.offer(queue, subscription.id, seq, snapshot);
        }
    }
}

fn deliver(queue: &str, id: u64, observer: &Observer, snapshot: &QueueSnapshot) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| observer(snapshot))) {
        warn!(
            queue = queue,
            observer = id,
            panic = %panic_message(panic.as_ref()),
            "Observer panicked; continuing"
        );
    }
}

/// Registration returned by `subscribe`.
///
/// Dropping a subscription does not unregister it; call [`Subscription::unsubscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ObserverRegistry>>,
    active: AtomicBool,
}

impl Subscription {
    /// Stop receiving snapshots. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).remove(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}
