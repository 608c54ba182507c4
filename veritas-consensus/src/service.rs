//! The ordering service actor
//!
//! Single-writer discipline via the actor pattern: proposals and votes
//! arrive through a bounded mailbox, rounds close one at a time, and only
//! the actor task ever advances ledger state.
//!
//! Read-side authorization during voting happens against immutable
//! snapshots handed out by `state_snapshot`; the commit step alone touches
//! the live state.

use crate::config::Config;
use crate::event::{ChaincodeRequest, ConsensusEvent, EventStatus, RejectReason, Vote};
use crate::metrics::Metrics;
use crate::round::{Candidate, Round};
use crate::{Error, Result};
use std::collections::{HashSet, VecDeque};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;
use veritas_core::{
    permissions, verifier, Command, LedgerState, Transaction, TxHash, ValidatorSet,
};

/// Message sent to the ordering actor
pub enum OrderingMessage {
    /// Submit a transaction for ordering
    Submit {
        /// The signed transaction
        transaction: Transaction,
        /// Reply channel
        response: oneshot::Sender<Result<TxHash>>,
    },

    /// Cast a validator vote on a proposed transaction
    Vote {
        /// Hash of the transaction being voted on
        tx_hash: TxHash,
        /// The signed vote
        vote: Vote,
        /// Reply channel
        response: oneshot::Sender<Result<()>>,
    },

    /// Read-only snapshot of the latest committed state
    Snapshot {
        /// Reply channel
        response: oneshot::Sender<LedgerState>,
    },

    /// Shutdown actor
    Shutdown,
}

impl std::fmt::Debug for OrderingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderingMessage::Submit { .. } => "Submit",
            OrderingMessage::Vote { .. } => "Vote",
            OrderingMessage::Snapshot { .. } => "Snapshot",
            OrderingMessage::Shutdown => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Actor that orders transactions through voting rounds
pub struct OrderingService {
    /// Configuration
    config: Config,

    /// Latest committed ledger state (single writer: this task)
    state: LedgerState,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<OrderingMessage>,

    /// Round currently collecting proposals and votes
    round: Option<Round>,

    /// Deadline of the open round
    round_deadline: Option<Instant>,

    /// When the open round started (for the duration metric)
    round_opened_at: Option<Instant>,

    /// Hashes seen within the retention window
    seen: HashSet<TxHash>,

    /// Insertion order of seen hashes, for retention trimming
    seen_order: VecDeque<TxHash>,

    /// Outbound consensus events (persistence collaborator)
    events: mpsc::Sender<ConsensusEvent>,

    /// Outbound chaincode requests (execution collaborator)
    chaincode: mpsc::Sender<ChaincodeRequest>,

    /// Metrics
    metrics: Metrics,
}

impl std::fmt::Debug for OrderingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderingService")
            .field("node_id", &self.config.node_id)
            .field("committed_order", &self.state.committed_order)
            .finish_non_exhaustive()
    }
}

impl OrderingService {
    /// Create a new service over a genesis state
    pub fn new(
        config: Config,
        state: LedgerState,
        mailbox: mpsc::Receiver<OrderingMessage>,
        events: mpsc::Sender<ConsensusEvent>,
        chaincode: mpsc::Sender<ChaincodeRequest>,
        metrics: Metrics,
    ) -> Self {
        Self {
            config,
            state,
            mailbox,
            round: None,
            round_deadline: None,
            round_opened_at: None,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            events,
            chaincode,
            metrics,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        loop {
            let closed = match self.round_deadline {
                Some(deadline) => {
                    tokio::select! {
                        maybe = self.mailbox.recv() => match maybe {
                            Some(OrderingMessage::Shutdown) | None => {
                                // Decide what the current votes allow, then stop
                                self.close_round().await;
                                break;
                            }
                            Some(msg) => {
                                self.handle_message(msg).await;
                                false
                            }
                        },
                        _ = time::sleep_until(deadline) => {
                            debug!(node = %self.config.node_id, "round deadline elapsed");
                            self.close_round().await;
                            true
                        }
                    }
                }
                None => match self.mailbox.recv().await {
                    Some(OrderingMessage::Shutdown) | None => break,
                    Some(msg) => {
                        self.handle_message(msg).await;
                        false
                    }
                },
            };

            // Close early once every candidate is decided
            if !closed {
                if let Some(round) = &self.round {
                    if round.all_decided() {
                        self.close_round().await;
                    }
                }
            }
        }
    }

    /// Handle a single message
    async fn handle_message(&mut self, msg: OrderingMessage) {
        match msg {
            OrderingMessage::Submit {
                transaction,
                response,
            } => {
                let result = self.handle_submit(transaction).await;
                let _ = response.send(result);
            }

            OrderingMessage::Vote {
                tx_hash,
                vote,
                response,
            } => {
                let result = self.handle_vote(tx_hash, vote).await;
                let _ = response.send(result);
            }

            OrderingMessage::Snapshot { response } => {
                let _ = response.send(self.state.clone());
            }

            OrderingMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Verify, authorize, and propose a transaction into the open round
    async fn handle_submit(&mut self, transaction: Transaction) -> Result<TxHash> {
        let hash = transaction.hash;

        let in_round = self.round.as_ref().is_some_and(|r| r.contains(&hash));
        if self.seen.contains(&hash) || in_round {
            debug!(%hash, "duplicate transaction hash");
            return Err(veritas_core::Error::DuplicateHash(hash).into());
        }

        if let Err(e) = self.validate_submission(&transaction) {
            warn!(%hash, error = %e, "transaction rejected at submission");
            self.metrics.transactions_rejected.inc();
            self.emit_event(ConsensusEvent {
                round_id: None,
                transaction,
                endorsements: vec![],
                order: None,
                status: EventStatus::Rejected,
                reason: Some(RejectReason::from_error(&e)),
            })
            .await;
            return Err(e.into());
        }

        self.open_round_if_needed();
        let round_id = if let Some(round) = &mut self.round {
            round.propose(transaction.clone());
            Some(round.id)
        } else {
            None
        };
        self.metrics.transactions_submitted.inc();
        info!(node = %self.config.node_id, %hash, "transaction proposed");

        self.emit_event(ConsensusEvent {
            round_id,
            transaction,
            endorsements: vec![],
            order: None,
            status: EventStatus::Proposed,
            reason: None,
        })
        .await;
        Ok(hash)
    }

    /// Submission-time checks: crypto validity, authorization, and coverage
    /// of the required signer set
    fn validate_submission(&self, transaction: &Transaction) -> veritas_core::Result<()> {
        verifier::verify(transaction)?;

        let required =
            permissions::authorize(&self.state, &transaction.creator, &transaction.command)?;
        let signers = transaction.signer_keys();
        for key in &required {
            if !signers.contains(key) {
                return Err(veritas_core::Error::InvalidSignature(format!(
                    "missing required signer {key} on {}",
                    transaction.hash
                )));
            }
        }

        Ok(())
    }

    fn open_round_if_needed(&mut self) {
        if self.round.is_some() {
            return;
        }

        let validators = ValidatorSet::snapshot(&self.state);
        if validators.is_empty() {
            warn!("validator set is empty; nothing can reach quorum this round");
        }
        let round = Round::new(validators);
        debug!(round_id = %round.id, validators = round.validators().len(), "round opened");

        self.round = Some(round);
        self.round_deadline =
            Some(Instant::now() + Duration::from_millis(self.config.round.timeout_ms));
        self.round_opened_at = Some(Instant::now());
        self.metrics.rounds_total.inc();
    }

    async fn handle_vote(&mut self, tx_hash: TxHash, vote: Vote) -> Result<()> {
        let event = {
            let round = self.round.as_mut().ok_or(Error::NoActiveRound)?;

            if vote.signature.public_key != vote.voter {
                return Err(Error::InvalidVote(format!(
                    "signature key does not match voter {}",
                    vote.voter
                )));
            }
            if !vote.signature.verify(tx_hash.as_bytes()) {
                return Err(Error::InvalidVote(format!(
                    "vote signature by {} does not verify",
                    vote.voter
                )));
            }

            let first_vote = round.candidate(&tx_hash).is_some_and(|c| !c.has_votes());
            round.record_vote(tx_hash, vote)?;

            // The candidate moves Proposed -> Voted on its first vote
            if first_vote {
                let round_id = round.id;
                round.candidate(&tx_hash).map(|c| ConsensusEvent {
                    round_id: Some(round_id),
                    transaction: c.transaction.clone(),
                    endorsements: c.endorsements.values().cloned().collect(),
                    order: None,
                    status: EventStatus::Voted,
                    reason: None,
                })
            } else {
                None
            }
        };

        if let Some(event) = event {
            self.emit_event(event).await;
        }
        Ok(())
    }

    /// Close the open round: commit quorum-eligible candidates in hash
    /// order, reject the rest
    async fn close_round(&mut self) {
        let Some(round) = self.round.take() else {
            return;
        };
        self.round_deadline = None;
        if let Some(opened_at) = self.round_opened_at.take() {
            self.metrics
                .round_duration
                .observe(opened_at.elapsed().as_secs_f64());
        }

        let round_id = round.id;
        let outcome = round.close();

        for candidate in outcome.eligible {
            self.commit_candidate(round_id, candidate).await;
        }
        for candidate in outcome.voted_down {
            self.reject_candidate(round_id, candidate, RejectReason::VotedDown)
                .await;
        }
        for candidate in outcome.timed_out {
            self.reject_candidate(round_id, candidate, RejectReason::QuorumTimeout)
                .await;
        }
    }

    async fn commit_candidate(&mut self, round_id: Uuid, candidate: Candidate) {
        // Re-evaluate against the now-current state: an earlier commit in
        // this round may have invalidated this candidate
        let applied = permissions::authorize(
            &self.state,
            &candidate.transaction.creator,
            &candidate.transaction.command,
        )
        .and_then(|_| self.state.apply(&candidate.transaction.command));

        match applied {
            Ok(mut next) => {
                let Candidate {
                    transaction,
                    endorsements,
                    ..
                } = candidate;
                let order = self.state.committed_order + 1;
                next.committed_order = order;
                self.state = next;

                self.record_seen(transaction.hash);
                self.metrics.transactions_committed.inc();
                self.metrics.committed_order.set(order as i64);
                info!(
                    node = %self.config.node_id,
                    %round_id,
                    order,
                    hash = %transaction.hash,
                    command = transaction.command.name(),
                    "transaction committed"
                );

                self.forward_chaincode(&transaction.command).await;

                self.emit_event(ConsensusEvent {
                    round_id: Some(round_id),
                    transaction,
                    endorsements: endorsements.into_values().collect(),
                    order: Some(order),
                    status: EventStatus::Committed,
                    reason: None,
                })
                .await;
            }
            Err(e) => {
                warn!(
                    hash = %candidate.transaction.hash,
                    error = %e,
                    "quorum-eligible transaction failed at commit"
                );
                let reason = RejectReason::from_error(&e);
                self.reject_candidate(round_id, candidate, reason).await;
            }
        }
    }

    async fn reject_candidate(
        &mut self,
        round_id: Uuid,
        candidate: Candidate,
        reason: RejectReason,
    ) {
        let endorsements: Vec<_> = candidate.endorsements.into_values().collect();
        let transaction = candidate.transaction;

        // The hash stays recorded so resubmission inside the retention
        // window is rejected as a duplicate; no order index is consumed
        self.record_seen(transaction.hash);
        self.metrics.transactions_rejected.inc();
        info!(
            node = %self.config.node_id,
            %round_id,
            hash = %transaction.hash,
            ?reason,
            "transaction rejected"
        );

        self.emit_event(ConsensusEvent {
            round_id: Some(round_id),
            transaction,
            endorsements,
            order: None,
            status: EventStatus::Rejected,
            reason: Some(reason),
        })
        .await;
    }

    fn record_seen(&mut self, hash: TxHash) {
        if self.seen.insert(hash) {
            self.seen_order.push_back(hash);
            while self.seen_order.len() > self.config.limits.duplicate_retention {
                if let Some(old) = self.seen_order.pop_front() {
                    self.seen.remove(&old);
                }
            }
        }
    }

    /// Forward committed SetChaincode / Execute to the execution collaborator
    async fn forward_chaincode(&mut self, command: &Command) {
        let request = match command {
            Command::SetChaincode { chaincode } => Some(ChaincodeRequest::from(chaincode)),
            Command::Execute { name } => match self.state.find_chaincode(name) {
                Some(chaincode) => Some(ChaincodeRequest::from(chaincode)),
                None => {
                    warn!(name, "Execute names no stored chaincode");
                    None
                }
            },
            _ => None,
        };

        if let Some(request) = request {
            if self.chaincode.send(request).await.is_err() {
                warn!("chaincode channel closed; dropping request");
            }
        }
    }

    async fn emit_event(&mut self, event: ConsensusEvent) {
        if self.events.send(event).await.is_err() {
            warn!("event channel closed; dropping consensus event");
        }
    }
}

/// Handle for sending messages to the ordering actor
#[derive(Debug, Clone)]
pub struct OrderingHandle {
    sender: mpsc::Sender<OrderingMessage>,
}

impl OrderingHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<OrderingMessage>) -> Self {
        Self { sender }
    }

    /// Submit a transaction for ordering
    pub async fn submit_transaction(&self, transaction: Transaction) -> Result<TxHash> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrderingMessage::Submit {
                transaction,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Cast a validator vote on a proposed transaction
    pub async fn cast_vote(&self, tx_hash: TxHash, vote: Vote) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrderingMessage::Vote {
                tx_hash,
                vote,
                response: tx,
            })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Read-only snapshot of the latest committed state
    pub async fn state_snapshot(&self) -> Result<LedgerState> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(OrderingMessage::Snapshot { response: tx })
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(OrderingMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ordering service over a genesis state
///
/// Returns the cloneable handle plus the outbound channels for the
/// persistence and chaincode collaborators.
pub fn spawn_ordering_service(
    config: Config,
    state: LedgerState,
) -> Result<(
    OrderingHandle,
    mpsc::Receiver<ConsensusEvent>,
    mpsc::Receiver<ChaincodeRequest>,
)> {
    let metrics = Metrics::new()?;
    let (tx, rx) = mpsc::channel(config.limits.mailbox_capacity);
    let (events_tx, events_rx) = mpsc::channel(config.limits.event_channel_capacity);
    let (chaincode_tx, chaincode_rx) = mpsc::channel(config.limits.chaincode_channel_capacity);

    let service = OrderingService::new(config, state, rx, events_tx, chaincode_tx, metrics);

    tokio::spawn(async move {
        service.run().await;
    });

    Ok((OrderingHandle::new(tx), events_rx, chaincode_rx))
}
