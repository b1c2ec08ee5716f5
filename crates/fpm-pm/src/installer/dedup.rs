//! Per-run bookkeeping of which names are being or have been installed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use crate::package::InstallRecord;

enum Slot {
    InProgress(watch::Receiver<Option<String>>),
    Done(String),
}

#[derive(Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    records: Vec<InstallRecord>,
}

/// Outcome of [`DedupState::claim`]
pub enum Claim<'a> {
    /// Already installed in this run with the given version
    Resolved(String),
    /// Another task owns the name; the receiver yields its version once known
    Pending(watch::Receiver<Option<String>>),
    /// The caller owns the name until the guard is completed or dropped
    Owner(ClaimGuard<'a>),
}

#[derive(Default)]
pub struct DedupState {
    inner: Mutex<Inner>,
    cancelled: AtomicBool,
}

impl DedupState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn claim(&self, name: &str) -> Claim<'_> {
        let mut inner = self.lock();
        match inner.slots.get(name) {
            Some(Slot::Done(version)) => Claim::Resolved(version.clone()),
            Some(Slot::InProgress(receiver)) => Claim::Pending(receiver.clone()),
            None => {
                let (sender, receiver) = watch::channel(None);
                inner
                    .slots
                    .insert(name.to_string(), Slot::InProgress(receiver));
                Claim::Owner(ClaimGuard {
                    state: self,
                    name: name.to_string(),
                    sender,
                    completed: false,
                })
            }
        }
    }

    /// Version recorded for `name`, if it finished installing
    pub fn resolved_version(&self, name: &str) -> Option<String> {
        match self.lock().slots.get(name) {
            Some(Slot::Done(version)) => Some(version.clone()),
            _ => None,
        }
    }

    pub fn record(&self, record: InstallRecord) {
        self.lock().records.push(record);
    }

    pub fn records(&self) -> Vec<InstallRecord> {
        self.lock().records.clone()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Exclusive right to install one name. Dropping it without calling
/// [`complete`](Self::complete) releases the name so a later request may retry.
pub struct ClaimGuard<'a> {
    state: &'a DedupState,
    name: String,
    sender: watch::Sender<Option<String>>,
    completed: bool,
}

impl ClaimGuard<'_> {
    /// Mark the name done and wake every waiter with `version`.
    pub fn complete(mut self, version: &str) {
        self.state
            .lock()
            .slots
            .insert(self.name.clone(), Slot::Done(version.to_string()));
        self.sender.send_replace(Some(version.to_string()));
        self.completed = true;
    }
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut inner = self.state.lock();
        if matches!(inner.slots.get(&self.name), Some(Slot::InProgress(_))) {
            inner.slots.remove(&self.name);
        }
        // Waiters observe the closed channel once the sender drops
    }
}
