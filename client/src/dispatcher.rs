//! Turn dispatch loop
//!
//! The dispatcher pulls snapshots off the session queue one at a time, hands
//! each to the registered policy and submits whatever it decided. Turns are
//! strictly sequential: the next snapshot is only looked at once the current
//! decision returned, failed or ran out of time.
//!
//! A snapshot is delivered only if its turn is strictly greater than the last
//! delivered one. Anything older or repeated is dropped before the policy
//! sees it.
//!
//! Per-turn failures never leave this module. Each one is logged once with
//! its turn number and reported back as a [`TurnOutcome`].

use crate::connection::DoneSignal;
use crate::error::PolicyError;
use crate::policy::DecisionPolicy;
use crate::sender::OrderSender;
use log::{debug, info, warn};
use shared::{OrderResponse, OrderSet, Snapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{timeout_at, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    AwaitingSnapshot,
    Deciding,
    Sent,
    Closed,
}

/// What happened to one snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Turn not newer than the last delivered one; the policy never ran
    Stale { last_turn: u32 },
    /// Policy exceeded the turn deadline
    Missed,
    /// Policy returned an error or panicked
    PolicyFailed,
    /// Session ended while deciding
    Discarded,
    Accepted(OrderResponse),
    Rejected(OrderResponse),
    TransportFailed,
}

type Decision = Result<Result<OrderSet, PolicyError>, JoinError>;

pub struct Dispatcher<P, S> {
    policy: Arc<P>,
    snapshots: mpsc::UnboundedReceiver<Snapshot>,
    sender: S,
    done: DoneSignal,
    deadline: Option<Duration>,
    last_turn: Option<u32>,
    state: DispatchState,
    /// Decision left running after a missed deadline
    lingering: Option<JoinHandle<Result<OrderSet, PolicyError>>>,
}

impl<P, S> Dispatcher<P, S>
where
    P: DecisionPolicy + 'static,
    S: OrderSender,
{
    pub fn new(
        policy: P,
        snapshots: mpsc::UnboundedReceiver<Snapshot>,
        sender: S,
        done: DoneSignal,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            policy: Arc::new(policy),
            snapshots,
            sender,
            done,
            deadline,
            last_turn: None,
            state: DispatchState::Idle,
            lingering: None,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn last_turn(&self) -> Option<u32> {
        self.last_turn
    }

    /// Runs until the session is done or the snapshot queue closes.
    pub async fn run(mut self) {
        debug!("Dispatcher started");

        loop {
            self.state = DispatchState::AwaitingSnapshot;

            let snapshot = tokio::select! {
                biased;
                _ = self.done.done() => break,
                snapshot = self.snapshots.recv() => match snapshot {
                    Some(snapshot) => snapshot,
                    None => break,
                },
            };

            self.dispatch(snapshot).await;
        }

        self.state = DispatchState::Closed;
        debug!("Dispatcher closed after turn {:?}", self.last_turn);
    }

    /// Drives one snapshot through decide and send. With a deadline set, the
    /// whole turn (including waiting out an earlier overdue decision) must
    /// finish deciding before it elapses.
    pub async fn dispatch(&mut self, snapshot: Snapshot) -> TurnOutcome {
        let turn = snapshot.turn;

        if let Some(last_turn) = self.last_turn {
            if turn <= last_turn {
                warn!(
                    "Turn {}: dropping snapshot, last delivered turn {}",
                    turn, last_turn
                );
                return TurnOutcome::Stale { last_turn };
            }
        }
        self.last_turn = Some(turn);
        self.state = DispatchState::Deciding;

        let deadline_at = self.deadline.map(|deadline| Instant::now() + deadline);

        if !self.settle_lingering(deadline_at).await {
            warn!(
                "Turn {}: previous decision still running at the deadline, no orders sent",
                turn
            );
            return TurnOutcome::Missed;
        }

        let order_set = match self.decide(snapshot, deadline_at).await {
            Some(Ok(Ok(order_set))) => order_set,
            Some(Ok(Err(e))) => {
                warn!("Turn {}: decision policy failed: {}", turn, e);
                return TurnOutcome::PolicyFailed;
            }
            Some(Err(e)) => {
                warn!("Turn {}: decision policy panicked: {}", turn, e);
                return TurnOutcome::PolicyFailed;
            }
            None => {
                warn!(
                    "Turn {}: decision missed the {:?} deadline, no orders sent",
                    turn,
                    self.deadline.unwrap_or_default()
                );
                return TurnOutcome::Missed;
            }
        };

        if self.done.is_done() {
            debug!("Turn {}: session ended while deciding, discarding orders", turn);
            return TurnOutcome::Discarded;
        }

        self.state = DispatchState::Sent;
        let order_count = order_set.len();

        match self.sender.send(turn, &order_set).await {
            Ok(response) => match response.rejection() {
                None => {
                    info!("Turn {}: {} orders accepted", turn, order_count);
                    TurnOutcome::Accepted(response)
                }
                Some(rejection) => {
                    warn!("Turn {}: {}", turn, rejection);
                    TurnOutcome::Rejected(response)
                }
            },
            Err(e) => {
                warn!("Turn {}: could not send orders: {}", turn, e);
                TurnOutcome::TransportFailed
            }
        }
    }

    /// Runs the policy on the blocking pool. `None` means the deadline passed;
    /// the call is then kept as lingering and its result thrown away later.
    async fn decide(&mut self, snapshot: Snapshot, deadline_at: Option<Instant>) -> Option<Decision> {
        let policy = Arc::clone(&self.policy);
        let mut decision = tokio::task::spawn_blocking(move || policy.decide(&snapshot));

        let Some(deadline_at) = deadline_at else {
            return Some(decision.await);
        };

        match timeout_at(deadline_at, &mut decision).await {
            Ok(result) => Some(result),
            Err(_) => {
                self.lingering = Some(decision);
                None
            }
        }
    }

    /// Waits out a decision that overran an earlier deadline, so that two
    /// decisions never run at the same time. Returns `false` if it is still
    /// running at `deadline_at`; it then stays lingering.
    async fn settle_lingering(&mut self, deadline_at: Option<Instant>) -> bool {
        let Some(mut lingering) = self.lingering.take() else {
            return true;
        };

        if !lingering.is_finished() {
            debug!("Waiting for the previous overdue decision to return");
        }

        match deadline_at {
            Some(deadline_at) => {
                if timeout_at(deadline_at, &mut lingering).await.is_err() {
                    self.lingering = Some(lingering);
                    return false;
                }
            }
            None => {
                let _ = lingering.await;
            }
        }
        true
    }
}
