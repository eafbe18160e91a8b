//! Subscriber registry and lifecycle, spec §4.5/§4.6.
pub mod acceptor;
pub mod handler;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use log::info;

use crate::model::Envelope;

/// One connected subscriber, as tracked by the registry. The handler thread
/// owns the paired `Receiver<Envelope>` and the socket; the registry only
/// holds what the dispatch worker and acceptor need.
pub struct Subscriber {
    pub id: u64,
    pub alive: Arc<AtomicBool>,
    pub tx: Sender<Envelope>,
}

impl Subscriber {
    pub fn new(id: u64, tx: Sender<Envelope>) -> Self {
        Subscriber {
            id,
            alive: Arc::new(AtomicBool::new(true)),
            tx,
        }
    }
}

/// Mutex-guarded subscriber list. Locking order is registry-then-queue,
/// never the reverse, per spec §5: every method here takes the registry
/// lock for the duration of one pass and only ever performs non-blocking
/// sends on the per-subscriber queue while holding it.
#[derive(Default)]
pub struct Registry {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn insert(&self, subscriber: Subscriber) {
        self.subscribers.lock().unwrap().push(subscriber);
    }

    /// Drop a subscriber by id. Called by the handler thread on exit, or by
    /// the dispatch worker when a send fails.
    pub fn remove(&self, id: u64) {
        self.subscribers.lock().unwrap().retain(|s| s.id != id);
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fan `envelope` out to every subscriber with a non-blocking send.
    /// Subscribers whose queue is full are skipped, not removed — the
    /// handler thread is the sole owner of deregistration on its own
    /// disconnect. Returns `(delivered, dropped)`.
    pub fn fanout(&self, envelope: &Envelope) -> (usize, usize) {
        let subscribers = self.subscribers.lock().unwrap();
        let mut delivered = 0;
        let mut dropped = 0;
        for sub in subscribers.iter() {
            match sub.tx.try_send(envelope.clone()) {
                Ok(()) => delivered += 1,
                Err(crossbeam_channel::TrySendError::Full(_)) => {
                    dropped += 1;
                    info!("subscriber {} queue full, dropping seq={}", sub.id, envelope.seq);
                }
                Err(crossbeam_channel::TrySendError::Disconnected(_)) => {
                    dropped += 1;
                }
            }
        }
        (delivered, dropped)
    }

    /// Mark every subscriber dead so handler threads blocked in
    /// `recv_timeout` wake up and exit on their next poll.
    pub fn shutdown_all(&self) {
        let subscribers = self.subscribers.lock().unwrap();
        for sub in subscribers.iter() {
            sub.alive.store(false, Ordering::SeqCst);
        }
    }
}
