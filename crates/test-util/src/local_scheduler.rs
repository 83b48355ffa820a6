// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::TimeDelta;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, trace};

use detsys_executor::{DeliveryError, Executor};
use detsys_scheduler_client::{Error, QueueSize, SchedulerApi};
use detsys_types::event::{
    OutgoingKind, ScheduledEventEnvelope, ScheduledKind, TickRequest, TimerArgs, TimerRequest,
    UnscheduledEvent,
};
use detsys_types::fault::FaultSet;
use detsys_types::history::{NetworkTraceEntry, Operation, OperationKind};
use detsys_types::identifiers::InvalidClientAddress;
use detsys_types::marshaler::Marshaler;
use detsys_types::time::simulation_epoch;
use detsys_types::{ClientId, CorrelationId, RunId, RunMeta, SimulatedTime, TestId};

/// Builds a client request for an agenda.
pub fn invoke(
    at: SimulatedTime,
    client: ClientId,
    to: &str,
    event: &str,
    args: Value,
) -> ScheduledEventEnvelope {
    ScheduledEventEnvelope {
        at,
        from: client.address(),
        to: to.to_owned(),
        kind: ScheduledKind::Invoke,
        event: event.to_owned(),
        args,
        meta: None,
    }
}

/// Everything observed during one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunHistory {
    pub meta: RunMeta,
    pub faults: FaultSet,
    pub seed: Option<u64>,
    pub tick_frequency: f64,
    /// Client requests and responses in the order they happened.
    pub operations: Vec<Operation>,
    /// Every internal message popped from the queue, delivered or dropped.
    pub network_trace: Vec<NetworkTraceEntry>,
    pub ticks: usize,
    pub timers: usize,
}

#[derive(Debug, thiserror::Error)]
enum DriveError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Client(#[from] InvalidClientAddress),
    #[error("undecodable timer request: {0}")]
    Timer(#[from] serde_json::Error),
    #[error("timer of {0}ns is out of range")]
    TimerOutOfRange(u64),
}

#[derive(Debug)]
enum Pending {
    Invoke(ScheduledEventEnvelope),
    Message(ScheduledEventEnvelope),
    Timer { to: String },
}

#[derive(Debug)]
struct Links {
    default: TimeDelta,
    overrides: HashMap<(String, String), TimeDelta>,
}

impl Links {
    fn latency(&self, from: &str, to: &str) -> TimeDelta {
        self.overrides
            .get(&(from.to_owned(), to.to_owned()))
            .copied()
            .unwrap_or(self.default)
    }
}

#[derive(Debug)]
struct State {
    tests: HashMap<TestId, Vec<ScheduledEventEnvelope>>,
    executor_id: Option<String>,
    components: Vec<String>,
    links: Links,
    seed: Option<u64>,
    tick_frequency: f64,
    faults: FaultSet,
    loaded: Option<TestId>,
    queue: BTreeMap<(SimulatedTime, u64), Pending>,
    sequence: u64,
    next_run_id: RunId,
    current: Option<RunMeta>,
    histories: BTreeMap<RunId, RunHistory>,
}

impl State {
    fn rejected(command: &'static str, reason: impl Into<String>) -> Error {
        Error::Rejected {
            command,
            reason: reason.into(),
        }
    }
}

/// A deterministic scheduler driving an in-process [`Executor`].
///
/// Messages are delivered in order of simulated arrival time, ties broken by the order they
/// were produced in. Every popped client request or internal message advances a logical clock,
/// dropped messages included; omission faults match against that clock.
pub struct LocalScheduler<M: Marshaler> {
    executor: Executor<M>,
    state: Arc<Mutex<State>>,
}

impl<M: Marshaler> Clone for LocalScheduler<M> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<M: Marshaler> LocalScheduler<M> {
    pub fn new(executor: Executor<M>) -> Self {
        Self {
            executor,
            state: Arc::new(Mutex::new(State {
                tests: HashMap::new(),
                executor_id: None,
                components: Vec::new(),
                links: Links {
                    default: TimeDelta::milliseconds(1),
                    overrides: HashMap::new(),
                },
                seed: None,
                tick_frequency: 0.0,
                faults: FaultSet::default(),
                loaded: None,
                queue: BTreeMap::new(),
                sequence: 0,
                next_run_id: RunId::new(0),
                current: None,
                histories: BTreeMap::new(),
            })),
        }
    }

    /// Sets the latency of every link without an override, one millisecond unless set.
    pub fn with_default_latency(self, latency: TimeDelta) -> Self {
        self.state.lock().links.default = latency;
        self
    }

    /// Overrides the latency of messages sent from `from` to `to`.
    pub fn set_link_latency(&self, from: &str, to: &str, latency: TimeDelta) {
        self.state
            .lock()
            .links
            .overrides
            .insert((from.to_owned(), to.to_owned()), latency);
    }

    /// Registers the agenda of `test_id`, replacing any previous one.
    pub fn add_test(&self, test_id: TestId, agenda: Vec<ScheduledEventEnvelope>) {
        self.state.lock().tests.insert(test_id, agenda);
    }

    pub fn history(&self, run_id: RunId) -> Option<RunHistory> {
        self.state.lock().histories.get(&run_id).cloned()
    }

    pub fn executor(&self) -> &Executor<M> {
        &self.executor
    }

    pub fn registered_components(&self) -> Vec<String> {
        self.state.lock().components.clone()
    }
}

#[async_trait]
impl<M: Marshaler> SchedulerApi for LocalScheduler<M> {
    async fn load_test(&self, test_id: TestId) -> Result<QueueSize, Error> {
        let mut state = self.state.lock();
        let agenda = state
            .tests
            .get(&test_id)
            .cloned()
            .ok_or_else(|| State::rejected("load-test!", format!("unknown test {test_id}")))?;

        state.queue.clear();
        for envelope in agenda {
            let key = (envelope.at, state.sequence);
            state.sequence += 1;
            let pending = match envelope.kind {
                ScheduledKind::Invoke => Pending::Invoke(envelope),
                ScheduledKind::Message | ScheduledKind::Fault => Pending::Message(envelope),
            };
            state.queue.insert(key, pending);
        }
        state.loaded = Some(test_id);
        Ok(QueueSize {
            queue_size: state.queue.len(),
        })
    }

    async fn register_executor(&self, executor_id: &str, components: Vec<String>) -> Result<(), Error> {
        debug!(executor_id, ?components, "Executor registered");
        let mut state = self.state.lock();
        state.executor_id = Some(executor_id.to_owned());
        state.components = components;
        Ok(())
    }

    async fn set_seed(&self, seed: u64) -> Result<(), Error> {
        self.state.lock().seed = Some(seed);
        Ok(())
    }

    async fn create_run(&self, test_id: TestId) -> Result<RunId, Error> {
        let mut state = self.state.lock();
        if state.loaded != Some(test_id) {
            return Err(State::rejected(
                "create-run!",
                format!("test {test_id} is not loaded"),
            ));
        }

        let run_id = state.next_run_id;
        state.next_run_id = run_id.next();
        let meta = RunMeta::new(test_id, run_id);
        state.current = Some(meta);
        let history = RunHistory {
            meta,
            faults: state.faults.clone(),
            seed: state.seed,
            tick_frequency: state.tick_frequency,
            operations: Vec::new(),
            network_trace: Vec::new(),
            ticks: 0,
            timers: 0,
        };
        state.histories.insert(run_id, history);
        Ok(run_id)
    }

    async fn inject_faults(&self, faults: &FaultSet) -> Result<(), Error> {
        self.state.lock().faults = faults.clone();
        Ok(())
    }

    async fn set_tick_frequency(&self, tick_frequency: f64) -> Result<(), Error> {
        if !(tick_frequency.is_finite() && tick_frequency >= 0.0) {
            return Err(State::rejected(
                "set-tick-frequency!",
                format!("invalid tick frequency {tick_frequency}"),
            ));
        }
        self.state.lock().tick_frequency = tick_frequency;
        Ok(())
    }

    #[instrument(level = "debug", skip_all)]
    async fn run(&self) -> Result<(), Error> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let meta = state
            .current
            .take()
            .ok_or_else(|| State::rejected("run!", "no run was created"))?;
        let history = state
            .histories
            .get_mut(&meta.run_id)
            .ok_or_else(|| State::rejected("run!", format!("no history for {meta}")))?;

        let tick_frequency = state.tick_frequency;
        let tick_interval = (tick_frequency > 0.0)
            .then(|| TimeDelta::nanoseconds(((1e9 / tick_frequency).round() as i64).max(1)));
        let driver = Driver {
            executor: &self.executor,
            links: &state.links,
            faults: &state.faults,
            meta,
            queue: std::mem::take(&mut state.queue),
            sequence: state.sequence,
            clock: 0,
            history,
        };

        driver
            .drive(tick_interval)
            .map_err(|err| State::rejected("run!", err.to_string()))?;
        info!(%meta, "Run finished");
        Ok(())
    }

    async fn status(&self) -> Result<Map<String, Value>, Error> {
        let state = self.state.lock();
        let status = json!({
            "test-id": state.loaded,
            "run-id": state.current.map(|meta| meta.run_id),
            "queue-size": state.queue.len(),
            "seed": state.seed,
            "tick-frequency": state.tick_frequency,
            "faults": state.faults,
            "executor-id": state.executor_id,
            "components": state.components,
        });
        match status {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    async fn reset(&self) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.queue.clear();
        state.sequence = 0;
        state.faults = FaultSet::default();
        state.tick_frequency = 0.0;
        state.loaded = None;
        state.current = None;
        Ok(())
    }
}

/// Drains the queue of one run.
struct Driver<'a, M: Marshaler> {
    executor: &'a Executor<M>,
    links: &'a Links,
    faults: &'a FaultSet,
    meta: RunMeta,
    queue: BTreeMap<(SimulatedTime, u64), Pending>,
    sequence: u64,
    clock: u64,
    history: &'a mut RunHistory,
}

impl<M: Marshaler> Driver<'_, M> {
    fn drive(mut self, tick_interval: Option<TimeDelta>) -> Result<(), DriveError> {
        let start = simulation_epoch();
        let inits = self.executor.list_inits()?;
        self.schedule(start, inits)?;

        let mut next_tick = tick_interval.map(|interval| start + interval);
        loop {
            let Some(at) = self.queue.keys().next().map(|(at, _)| *at) else {
                break;
            };

            // Ticks only fire while something is left to deliver.
            if let (Some(interval), Some(tick_at)) = (tick_interval, next_tick) {
                if tick_at <= at {
                    self.tick(tick_at)?;
                    next_tick = Some(tick_at + interval);
                    continue;
                }
            }

            if let Some(((at, sequence), pending)) = self.queue.pop_first() {
                self.deliver(at, sequence, pending)?;
            }
        }
        Ok(())
    }

    fn enqueue(&mut self, at: SimulatedTime, pending: Pending) {
        self.queue.insert((at, self.sequence), pending);
        self.sequence += 1;
    }

    fn tick(&mut self, at: SimulatedTime) -> Result<(), DriveError> {
        for component in self.executor.components() {
            let outs = self.executor.deliver_tick(TickRequest { component, at })?;
            self.schedule(at, outs)?;
        }
        self.history.ticks += 1;
        Ok(())
    }

    fn deliver(
        &mut self,
        at: SimulatedTime,
        sequence: u64,
        pending: Pending,
    ) -> Result<(), DriveError> {
        let corr_id = i64::try_from(sequence).map_or(CorrelationId::UNKNOWN, CorrelationId::new);
        let outs = match pending {
            Pending::Invoke(mut envelope) => {
                self.clock += 1;
                self.history.operations.push(Operation {
                    kind: OperationKind::Invoke,
                    client: envelope.from.parse()?,
                    at,
                    event: envelope.event.clone(),
                    args: envelope.args.clone(),
                });
                envelope.meta = Some(self.meta);
                self.executor.deliver_event(envelope, corr_id)?
            }
            Pending::Message(mut envelope) => {
                self.clock += 1;
                let dropped = self.faults.omits(&envelope.from, &envelope.to, self.clock);
                self.history.network_trace.push(NetworkTraceEntry {
                    at: self.clock,
                    simulated_time: at,
                    from: envelope.from.clone(),
                    to: envelope.to.clone(),
                    event: envelope.event.clone(),
                    dropped,
                });
                if dropped {
                    debug!(from = %envelope.from, to = %envelope.to, at = self.clock, "Dropped message");
                    return Ok(());
                }
                envelope.meta = Some(self.meta);
                self.executor.deliver_event(envelope, corr_id)?
            }
            Pending::Timer { to } => {
                self.history.timers += 1;
                self.executor.deliver_timer(
                    TimerRequest {
                        to,
                        at,
                        meta: Some(self.meta),
                    },
                    corr_id,
                )?
            }
        };
        self.schedule(at, outs)
    }

    fn schedule(&mut self, now: SimulatedTime, outs: Vec<UnscheduledEvent>) -> Result<(), DriveError> {
        for out in outs {
            trace!(from = %out.from, to = %out.to, kind = ?out.kind, event = %out.event, "Scheduling");
            match out.kind {
                OutgoingKind::Ok => {
                    let response = out.args.get("response").cloned().unwrap_or(Value::Null);
                    self.history.operations.push(Operation {
                        kind: OperationKind::Ok,
                        client: out.to.parse()?,
                        at: now,
                        event: out.event,
                        args: response,
                    });
                }
                OutgoingKind::Message => {
                    let arrival = now + self.links.latency(&out.from, &out.to);
                    self.enqueue(
                        arrival,
                        Pending::Message(ScheduledEventEnvelope {
                            at: arrival,
                            from: out.from,
                            to: out.to,
                            kind: ScheduledKind::Message,
                            event: out.event,
                            args: out.args,
                            meta: None,
                        }),
                    );
                }
                OutgoingKind::Timer => {
                    let timer: TimerArgs = serde_json::from_value(out.args)?;
                    let after = TimeDelta::from_std(timer.duration())
                        .map_err(|_| DriveError::TimerOutOfRange(timer.duration_ns))?;
                    self.enqueue(now + after, Pending::Timer { to: out.to });
                }
            }
        }
        Ok(())
    }
}
