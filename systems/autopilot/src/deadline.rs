use std::{
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use snake_ensemble_core::{AgentSnapshot, AgentView, EdgePolicy, GridPosition, GridSize};
use tracing::debug;

use crate::{Decision, DecisionContext, DecisionError, DecisionSource};

struct Request {
    sequence: u64,
    agent: AgentSnapshot,
    target: GridPosition,
    agents: AgentView,
    grid_size: GridSize,
    edge_policy: EdgePolicy,
}

struct Answer {
    sequence: u64,
    decision: Result<Decision, DecisionError>,
}

/// Runs a slow decision source on a worker thread under a per-request budget.
///
/// Each call to [`DecisionSource::decide`] hands an owned copy of the context
/// to the worker and waits at most `budget` for the answer. A missed budget
/// reports [`DecisionError::TimedOut`]; the late answer is discarded when it
/// eventually arrives because its sequence number is stale.
///
/// At most one request is in flight. While the worker is still busy with a
/// request that missed its budget, further calls time out immediately instead
/// of queueing behind it.
#[derive(Debug)]
pub struct DeadlineDecisions {
    requests: Option<Sender<Request>>,
    answers: Receiver<Answer>,
    budget: Duration,
    sequence: u64,
    in_flight: Option<u64>,
    worker: Option<JoinHandle<()>>,
}

impl DeadlineDecisions {
    /// Moves `source` onto a worker thread and answers within `budget`.
    #[must_use]
    pub fn spawn<S>(source: S, budget: Duration) -> Self
    where
        S: DecisionSource + Send + 'static,
    {
        let (requests, inbox) = mpsc::channel::<Request>();
        let (outbox, answers) = mpsc::channel::<Answer>();
        let worker = thread::spawn(move || serve(source, inbox, outbox));

        Self {
            requests: Some(requests),
            answers,
            budget,
            sequence: 0,
            in_flight: None,
            worker: Some(worker),
        }
    }

    fn timed_out(&self) -> DecisionError {
        DecisionError::TimedOut {
            budget_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Collects a late answer without blocking. Returns whether the worker is idle.
    fn settle(&mut self) -> bool {
        let Some(stale) = self.in_flight else {
            return true;
        };
        match self.answers.try_recv() {
            Ok(answer) => {
                debug!(sequence = answer.sequence, stale, "discarding late decision");
                self.in_flight = None;
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.in_flight = None;
                true
            }
        }
    }

    fn await_answer(&mut self, sequence: u64) -> Result<Decision, DecisionError> {
        let deadline = Instant::now() + self.budget;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.answers.recv_timeout(remaining) {
                Ok(answer) if answer.sequence == sequence => {
                    self.in_flight = None;
                    return answer.decision;
                }
                Ok(answer) => {
                    debug!(sequence = answer.sequence, "discarding late decision");
                }
                Err(RecvTimeoutError::Timeout) => return Err(self.timed_out()),
                Err(RecvTimeoutError::Disconnected) => {
                    self.in_flight = None;
                    return Err(DecisionError::Unavailable);
                }
            }
        }
    }
}

impl DecisionSource for DeadlineDecisions {
    fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<Decision, DecisionError> {
        if !self.settle() {
            return Err(self.timed_out());
        }

        self.sequence = self.sequence.wrapping_add(1);
        let sequence = self.sequence;
        let request = Request {
            sequence,
            agent: ctx.agent.clone(),
            target: ctx.target,
            agents: ctx.agents.clone(),
            grid_size: ctx.grid_size,
            edge_policy: ctx.edge_policy,
        };

        let sent = self
            .requests
            .as_ref()
            .is_some_and(|requests| requests.send(request).is_ok());
        if !sent {
            return Err(DecisionError::Unavailable);
        }

        self.in_flight = Some(sequence);
        self.await_answer(sequence)
    }
}

impl Drop for DeadlineDecisions {
    fn drop(&mut self) {
        // closing the request channel ends the worker loop
        drop(self.requests.take());
        let Some(worker) = self.worker.take() else {
            return;
        };
        if !self.settle() {
            // the worker exits on its own once the late answer is produced
            debug!("detaching busy decision worker");
            return;
        }
        if worker.join().is_err() {
            debug!("decision worker panicked");
        }
    }
}

fn serve<S>(mut source: S, inbox: Receiver<Request>, outbox: Sender<Answer>)
where
    S: DecisionSource,
{
    for request in inbox {
        let ctx = DecisionContext {
            agent: &request.agent,
            target: request.target,
            agents: &request.agents,
            grid_size: request.grid_size,
            edge_policy: request.edge_policy,
        };
        let answer = Answer {
            sequence: request.sequence,
            decision: source.decide(&ctx),
        };
        if outbox.send(answer).is_err() {
            break;
        }
    }
}
