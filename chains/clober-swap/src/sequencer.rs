//! FIFO transaction sequencer.
//!
//! All transactions of the active wallet go through a single worker task that
//! owns the nonce counter. A job is only started once the previous one has
//! reached a terminal state, so nonces are assigned strictly in enqueue order
//! and without gaps.
//!
//! The counter is seeded lazily from the pending transaction count and is
//! dropped whenever the signer changes, so the next job re-reads it.

use crate::chain::{short_hex, ChainClient, TxReceipt, TxRequest};
use crate::dashboard::{ActivityLog, DashboardEvent};
use anyhow::Result;
use chrono::{DateTime, Local};
use core_logic::{MetricsCollector, TxOutcomeKind};
use ethers::types::{H256, U256};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub type TxId = u64;

/// Node error fragments meaning the nonce we used is already taken.
const NONCE_CONSUMED_MARKERS: &[&str] = &[
    "nonce too low",
    "nonce has already been used",
    "already known",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Error,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Queued => "queued",
            TxStatus::Processing => "processing",
            TxStatus::Completed => "completed",
            TxStatus::Failed => "failed",
            TxStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct QueuedTx {
    pub id: TxId,
    pub description: String,
    pub enqueued_at: DateTime<Local>,
    pub status: TxStatus,
}

/// Terminal state of a sequenced transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Mined with success status.
    Completed(TxReceipt),
    /// Mined but reverted.
    Failed(TxReceipt),
    /// Never mined: build, submission or receipt wait failed.
    Error(String),
}

impl TxOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, TxOutcome::Completed(_))
    }

    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            TxOutcome::Completed(r) | TxOutcome::Failed(r) => Some(r.hash),
            TxOutcome::Error(_) => None,
        }
    }

    fn kind(&self) -> TxOutcomeKind {
        match self {
            TxOutcome::Completed(_) => TxOutcomeKind::Completed,
            TxOutcome::Failed(_) => TxOutcomeKind::Failed,
            TxOutcome::Error(_) => TxOutcomeKind::Error,
        }
    }
}

impl fmt::Display for TxOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxOutcome::Completed(r) => write!(f, "completed ({})", short_hex(r.hash)),
            TxOutcome::Failed(r) => write!(f, "reverted by contract ({})", short_hex(r.hash)),
            TxOutcome::Error(msg) => f.write_str(msg),
        }
    }
}

type BuildFuture = Pin<Box<dyn Future<Output = Result<H256>> + Send>>;
type BuildFn = Box<dyn FnOnce(Arc<dyn ChainClient>, U256) -> BuildFuture + Send>;

struct Job {
    id: TxId,
    build: BuildFn,
    reply: oneshot::Sender<TxOutcome>,
}

enum Command {
    Submit(Job),
    SwitchSigner(Arc<dyn ChainClient>),
}

#[derive(Default)]
struct BookInner {
    next_id: TxId,
    entries: Vec<QueuedTx>,
}

/// Observable list of transactions that have not reached a terminal state yet.
///
/// Every mutation publishes the resulting snapshot before releasing the lock,
/// so queue events reach the dashboard in the order the changes happened.
#[derive(Clone)]
struct QueueBook {
    inner: Arc<Mutex<BookInner>>,
    log: ActivityLog,
}

impl QueueBook {
    fn new(log: ActivityLog) -> Self {
        Self {
            inner: Arc::default(),
            log,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BookInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn publish(&self, inner: &BookInner) {
        self.log
            .publish(DashboardEvent::Queue(inner.entries.clone()));
    }

    fn snapshot(&self) -> Vec<QueuedTx> {
        self.lock().entries.clone()
    }

    /// Assigns the next id, records the entry and hands it to `dispatch`.
    /// The entry is dropped again when `dispatch` fails.
    fn insert<F>(&self, description: String, dispatch: F) -> TxId
    where
        F: FnOnce(TxId) -> bool,
    {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push(QueuedTx {
            id,
            description,
            enqueued_at: Local::now(),
            status: TxStatus::Queued,
        });
        if !dispatch(id) {
            inner.entries.retain(|e| e.id != id);
        }
        self.publish(&inner);
        id
    }

    fn set_status(&self, id: TxId, status: TxStatus) {
        let mut inner = self.lock();
        if let Some(entry) = inner.entries.iter_mut().find(|e| e.id == id) {
            entry.status = status;
        }
        self.publish(&inner);
    }

    fn remove(&self, id: TxId) {
        let mut inner = self.lock();
        inner.entries.retain(|e| e.id != id);
        self.publish(&inner);
    }
}

/// Awaitable handle to an enqueued transaction.
pub struct PendingTx {
    pub id: TxId,
    rx: oneshot::Receiver<TxOutcome>,
}

impl PendingTx {
    pub async fn outcome(self) -> TxOutcome {
        self.rx
            .await
            .unwrap_or_else(|_| TxOutcome::Error("Transaction sequencer stopped".to_string()))
    }
}

/// Cloneable handle to the sequencer worker.
#[derive(Clone)]
pub struct TxSequencer {
    commands: mpsc::UnboundedSender<Command>,
    book: QueueBook,
    log: ActivityLog,
}

impl TxSequencer {
    /// Starts the worker. It runs until every handle has been dropped.
    pub fn spawn(log: ActivityLog) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let book = QueueBook::new(log.clone());
        let worker = Worker {
            chain: None,
            next_nonce: None,
            book: book.clone(),
            log: log.clone(),
        };
        let handle = tokio::spawn(worker.run(rx));
        (Self { commands, book, log }, handle)
    }

    /// Makes `chain` the signer for every job enqueued after this call.
    pub fn switch_signer(&self, chain: Arc<dyn ChainClient>) {
        if self.commands.send(Command::SwitchSigner(chain)).is_err() {
            self.log.error("Transaction sequencer is not running");
        }
    }

    /// Appends a job. `build` receives the active signer and the nonce to use
    /// and must broadcast exactly one transaction with that nonce.
    pub fn enqueue<F, Fut>(&self, description: impl Into<String>, build: F) -> PendingTx
    where
        F: FnOnce(Arc<dyn ChainClient>, U256) -> Fut + Send + 'static,
        Fut: Future<Output = Result<H256>> + Send + 'static,
    {
        let description = description.into();
        let (reply, rx) = oneshot::channel();
        let build: BuildFn = Box::new(move |chain, nonce| Box::pin(build(chain, nonce)));

        // Id assignment and channel send share the book lock, so the worker
        // never sees a job the book does not hold yet.
        let id = self.book.insert(description.clone(), |id| {
            self.commands
                .send(Command::Submit(Job { id, build, reply }))
                .is_ok()
        });

        self.log.system(format!(
            "Transaction [{}] added to queue: {}",
            id, description
        ));

        PendingTx { id, rx }
    }

    /// Enqueues a plain transaction sent by the active signer.
    pub fn submit(&self, description: impl Into<String>, tx: TxRequest) -> PendingTx {
        self.enqueue(description, move |chain, nonce| async move {
            chain.send_transaction(tx, nonce).await
        })
    }

    pub fn queue(&self) -> Vec<QueuedTx> {
        self.book.snapshot()
    }
}

struct Worker {
    chain: Option<Arc<dyn ChainClient>>,
    next_nonce: Option<U256>,
    book: QueueBook,
    log: ActivityLog,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::SwitchSigner(chain) => {
                    self.chain = Some(chain);
                    self.next_nonce = None;
                }
                Command::Submit(job) => {
                    let id = job.id;
                    let reply = job.reply;
                    let outcome = self.process(id, job.build).await;

                    MetricsCollector::global().record_tx(outcome.kind());
                    self.book.remove(id);
                    // Caller may have stopped waiting; the outcome is already logged.
                    let _ = reply.send(outcome);
                }
            }
        }
    }

    fn mark(&self, id: TxId, status: TxStatus) {
        self.book.set_status(id, status);
    }

    async fn process(&mut self, id: TxId, build: BuildFn) -> TxOutcome {
        self.mark(id, TxStatus::Processing);

        let Some(chain) = self.chain.clone() else {
            return self.fail(id, "no active wallet".to_string());
        };

        let nonce = match self.next_nonce {
            Some(nonce) => nonce,
            None => match chain.pending_nonce().await {
                Ok(nonce) => {
                    self.log.debug(format!("Initial nonce: {}", nonce));
                    self.next_nonce = Some(nonce);
                    nonce
                }
                Err(e) => return self.fail(id, format!("{:#}", e)),
            },
        };

        let hash = match build(chain.clone(), nonce).await {
            Ok(hash) => hash,
            Err(e) => {
                let message = format!("{:#}", e);
                if is_nonce_consumed(&message) {
                    self.next_nonce = Some(nonce + 1);
                    self.log.system(format!(
                        "Nonce {} already used. Next nonce: {}",
                        nonce,
                        nonce + 1
                    ));
                }
                return self.fail(id, message);
            }
        };

        match chain.wait_for_receipt(hash).await {
            Ok(receipt) => {
                self.next_nonce = Some(nonce + 1);
                if receipt.success {
                    self.mark(id, TxStatus::Completed);
                    self.log.debug(format!(
                        "Transaction [{}] completed. Hash: {}",
                        id,
                        short_hex(receipt.hash)
                    ));
                    TxOutcome::Completed(receipt)
                } else {
                    self.mark(id, TxStatus::Failed);
                    self.log.error(format!(
                        "Transaction [{}] failed: reverted by contract",
                        id
                    ));
                    TxOutcome::Failed(receipt)
                }
            }
            Err(e) => {
                // Broadcast but fate unknown; re-read the pending count next time.
                self.next_nonce = None;
                self.fail(id, format!("{:#}", e))
            }
        }
    }

    fn fail(&self, id: TxId, message: String) -> TxOutcome {
        self.mark(id, TxStatus::Error);
        self.log
            .error(format!("Transaction [{}] failed: {}", id, message));
        TxOutcome::Error(message)
    }
}

fn is_nonce_consumed(message: &str) -> bool {
    let lower = message.to_lowercase();
    NONCE_CONSUMED_MARKERS.iter().any(|m| lower.contains(m))
}

/// One line per entry, or a placeholder when the queue is empty.
pub fn render_queue(entries: &[QueuedTx]) -> String {
    if entries.is_empty() {
        return "No transactions in queue.".to_string();
    }
    entries
        .iter()
        .map(|tx| {
            format!(
                "ID: {} | {} | {} | {}",
                tx.id,
                tx.description,
                tx.status,
                tx.enqueued_at.format("%H:%M:%S")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
