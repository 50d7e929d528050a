//! Ordered delivery queue.
//!
//! Work submitted to the queue runs concurrently, but the sink sees the
//! results strictly in submission order. Completed-but-unreleased results
//! are buffered until every earlier slot has completed; the longest
//! contiguous ready prefix is then handed to a single drain task which
//! awaits the sink one slot at a time.
//!
//! A failed slot still releases its position so later slots never wait on
//! it forever. Its sink side effect is skipped.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

/// Consumer of released slots.
pub trait DeliverySink<T>: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Side effect for one slot. Called in sequence order, one at a time.
    fn deliver(&self, seq: u64, item: T) -> impl Future<Output = Self::Output> + Send;
}

/// How a slot ended.
#[derive(Debug)]
pub enum SlotOutcome<O> {
    /// The sink consumed the slot and returned this value.
    Delivered(O),
    /// The slot's work failed; the sink never saw it.
    Failed(String),
}

impl<O> SlotOutcome<O> {
    pub fn is_delivered(&self) -> bool {
        matches!(self, SlotOutcome::Delivered(_))
    }
}

/// Handle to the outcome of one submitted slot.
#[derive(Debug)]
pub struct DeliveryReceipt<O> {
    seq: u64,
    rx: oneshot::Receiver<SlotOutcome<O>>,
}

impl<O> DeliveryReceipt<O> {
    /// Sequence number assigned at submission.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wait until the slot has been released and consumed.
    pub async fn wait(self) -> SlotOutcome<O> {
        self.rx
            .await
            .unwrap_or_else(|_| SlotOutcome::Failed("delivery queue closed".to_string()))
    }
}

struct Released<T, O> {
    seq: u64,
    result: Result<T, String>,
    receipt: oneshot::Sender<SlotOutcome<O>>,
}

struct QueueState<T, O> {
    next_seq: u64,
    head: u64,
    ready: BTreeMap<u64, (Result<T, String>, oneshot::Sender<SlotOutcome<O>>)>,
    release_tx: mpsc::UnboundedSender<Released<T, O>>,
}

impl<T, O> QueueState<T, O> {
    fn release_ready(&mut self) {
        while let Some((result, receipt)) = self.ready.remove(&self.head) {
            let released = Released {
                seq: self.head,
                result,
                receipt,
            };
            if self.release_tx.send(released).is_err() {
                tracing::warn!(seq = self.head, "delivery drain task is gone");
            }
            self.head += 1;
        }
    }
}

/// Queue that completes slots in submission order.
///
/// Must be created inside a tokio runtime: it spawns its drain task.
pub struct OrderedDeliveryQueue<T, O> {
    state: Arc<Mutex<QueueState<T, O>>>,
    consumed: Arc<AtomicU64>,
}

impl<T, O> OrderedDeliveryQueue<T, O>
where
    T: Send + 'static,
    O: Send + 'static,
{
    /// Create a queue feeding `sink`.
    pub fn new<S>(sink: S) -> Self
    where
        S: DeliverySink<T, Output = O>,
    {
        let (release_tx, mut release_rx) = mpsc::unbounded_channel::<Released<T, O>>();
        let consumed = Arc::new(AtomicU64::new(0));

        let drained = Arc::clone(&consumed);
        tokio::spawn(async move {
            while let Some(released) = release_rx.recv().await {
                let outcome = match released.result {
                    Ok(item) => SlotOutcome::Delivered(sink.deliver(released.seq, item).await),
                    Err(err) => {
                        tracing::debug!(seq = released.seq, "skipping failed slot: {err}");
                        SlotOutcome::Failed(err)
                    }
                };
                drained.fetch_add(1, Ordering::AcqRel);
                let _ = released.receipt.send(outcome);
            }
        });

        Self {
            state: Arc::new(Mutex::new(QueueState {
                next_seq: 0,
                head: 0,
                ready: BTreeMap::new(),
                release_tx,
            })),
            consumed,
        }
    }

    /// Reserve the next sequence number and run `work` for it.
    ///
    /// The work starts immediately; its result is consumed by the sink only
    /// after every earlier slot has been consumed or has failed.
    pub fn submit<F>(&self, work: F) -> DeliveryReceipt<O>
    where
        F: Future<Output = Result<T, String>> + Send + 'static,
    {
        let (receipt_tx, receipt_rx) = oneshot::channel();
        let seq = {
            let mut state = self.state.lock().expect("delivery queue lock poisoned");
            let seq = state.next_seq;
            state.next_seq += 1;
            seq
        };

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let result = match tokio::spawn(work).await {
                Ok(result) => result,
                Err(err) => Err(format!("delivery work aborted: {err}")),
            };
            let mut state = state.lock().expect("delivery queue lock poisoned");
            state.ready.insert(seq, (result, receipt_tx));
            state.release_ready();
        });

        DeliveryReceipt {
            seq,
            rx: receipt_rx,
        }
    }

    /// Submit an item that needs no preparation.
    pub fn submit_ready(&self, item: T) -> DeliveryReceipt<O> {
        self.submit(async move { Ok(item) })
    }

    /// Slots submitted whose sink call has not returned yet.
    ///
    /// A slot released to the drain task stays in flight until the sink is
    /// done with it.
    pub fn in_flight(&self) -> u64 {
        let state = self.state.lock().expect("delivery queue lock poisoned");
        state.next_seq - self.consumed.load(Ordering::Acquire)
    }
}

impl<T, O> std::fmt::Debug for OrderedDeliveryQueue<T, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("delivery queue lock poisoned");
        f.debug_struct("OrderedDeliveryQueue")
            .field("next_seq", &state.next_seq)
            .field("head", &state.head)
            .field("consumed", &self.consumed.load(Ordering::Acquire))
            .field("buffered", &state.ready.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
