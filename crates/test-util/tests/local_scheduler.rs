// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use googletest::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use test_log::test;

use detsys_executor::{ComponentLogger, Executor, TopologyError};
use detsys_scheduler_client::{Error, SchedulerApi};
use detsys_storage::MemoryStore;
use detsys_test_util::{invoke, LocalScheduler};
use detsys_types::deployment::DeploymentInfo;
use detsys_types::fault::{Fault, FaultSet};
use detsys_types::history::OperationKind;
use detsys_types::marshaler::{decode_payload, DecodeError, Marshaler};
use detsys_types::reactor::{Args, BoxedReactor, InEvent, OutEvent, Protocol, Reactor};
use detsys_types::time::simulation_epoch;
use detsys_types::{ClientId, RunMeta, SimulatedTime, TestId};

const TEST: TestId = TestId::new(7);

#[derive(Debug, Clone, PartialEq)]
struct PingPong;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ball {
    n: i64,
}

impl Protocol for PingPong {
    type Request = Ball;
    type Response = Ball;
    type Message = Ball;
}

struct PingPongMarshaler;

impl Marshaler for PingPongMarshaler {
    type Protocol = PingPong;

    fn unmarshal_request(&self, tag: &str, payload: &Value) -> std::result::Result<Ball, DecodeError> {
        match tag {
            "serve" => decode_payload(tag, payload),
            _ => Err(DecodeError::unknown_request(tag)),
        }
    }

    fn unmarshal_message(&self, tag: &str, payload: &Value) -> std::result::Result<Ball, DecodeError> {
        match tag {
            "ball" => decode_payload(tag, payload),
            _ => Err(DecodeError::unknown_message(tag)),
        }
    }

    fn marshal_event(&self, args: &Args<PingPong>) -> String {
        match args {
            Args::ClientResponse { .. } => "point".to_owned(),
            Args::InternalMessage(_) => "ball".to_owned(),
            Args::Timer { .. } => "timer".to_owned(),
        }
    }
}

#[derive(Default, Serialize)]
struct Pinger {
    client: Option<ClientId>,
    timers: u32,
}

impl Reactor for Pinger {
    type Protocol = PingPong;

    fn init(&mut self) -> Vec<OutEvent<PingPong>> {
        vec![OutEvent::timer("pinger", Duration::from_millis(5))]
    }

    fn receive(&mut self, _at: SimulatedTime, _from: &str, event: InEvent<PingPong>) -> Vec<OutEvent<PingPong>> {
        match event {
            InEvent::ClientRequest { id, request } => {
                self.client = Some(id);
                vec![OutEvent::message("ponger", request)]
            }
            InEvent::InternalMessage(ball) => self
                .client
                .take()
                .map(|id| OutEvent::reply(id, Ball { n: ball.n + 1 }))
                .into_iter()
                .collect(),
        }
    }

    fn timer(&mut self, _at: SimulatedTime) -> Vec<OutEvent<PingPong>> {
        self.timers += 1;
        Vec::new()
    }

    fn snapshot(&self) -> std::result::Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[derive(Serialize)]
struct Ponger {
    returned: u32,
    #[serde(skip)]
    logger: ComponentLogger,
}

impl Reactor for Ponger {
    type Protocol = PingPong;

    fn receive(&mut self, _at: SimulatedTime, from: &str, event: InEvent<PingPong>) -> Vec<OutEvent<PingPong>> {
        match event {
            InEvent::InternalMessage(ball) => {
                self.returned += 1;
                self.logger.info(format_args!("returning {} to {from}", ball.n));
                vec![OutEvent::message(from, Ball { n: ball.n + 1 })]
            }
            InEvent::ClientRequest { .. } => panic!("ponger does not serve clients"),
        }
    }

    fn snapshot(&self) -> std::result::Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

fn build(
    info: &DeploymentInfo,
    logger: ComponentLogger,
) -> std::result::Result<BoxedReactor<PingPong>, TopologyError> {
    match info.reactor_type.as_str() {
        "pinger" => Ok(Box::<Pinger>::default()),
        "ponger" => Ok(Box::new(Ponger { returned: 0, logger })),
        other => Err(TopologyError::UnknownReactorType {
            component: info.reactor.clone(),
            reactor_type: other.to_owned(),
        }),
    }
}

fn scheduler() -> LocalScheduler<PingPongMarshaler> {
    scheduler_with(Arc::new(MemoryStore::new()))
}

fn scheduler_with(store: Arc<MemoryStore>) -> LocalScheduler<PingPongMarshaler> {
    let executor = Executor::new(
        TEST,
        PingPongMarshaler,
        vec![
            DeploymentInfo::new("pinger", "pinger"),
            DeploymentInfo::new("ponger", "ponger"),
        ],
        build,
        store,
    )
    .unwrap();
    let scheduler = LocalScheduler::new(executor);
    scheduler.add_test(
        TEST,
        vec![invoke(
            simulation_epoch(),
            ClientId::new(0),
            "pinger",
            "serve",
            json!({"n": 1}),
        )],
    );
    scheduler
}

async fn run(
    scheduler: &LocalScheduler<PingPongMarshaler>,
    faults: FaultSet,
    tick_frequency: f64,
) -> RunMeta {
    scheduler.reset().await.unwrap();
    scheduler.inject_faults(&faults).await.unwrap();
    scheduler.set_tick_frequency(tick_frequency).await.unwrap();
    let queue = scheduler.load_test(TEST).await.unwrap();
    assert_that!(queue.queue_size, eq(1));
    let meta = RunMeta::new(TEST, scheduler.create_run(TEST).await.unwrap());
    scheduler.executor().reset(meta).unwrap();
    scheduler.run().await.unwrap();
    meta
}

fn ms(millis: i64) -> SimulatedTime {
    simulation_epoch() + TimeDelta::milliseconds(millis)
}

#[test(tokio::test)]
async fn delivers_in_simulated_time_order() {
    let scheduler = scheduler();
    let meta = run(&scheduler, FaultSet::default(), 0.0).await;

    let history = scheduler.history(meta.run_id).unwrap();
    assert_that!(history.operations.len(), eq(2));
    assert_that!(history.operations[0].kind, eq(OperationKind::Invoke));
    assert_that!(history.operations[1].kind, eq(OperationKind::Ok));
    assert_that!(history.operations[1].at, eq(ms(2)));
    assert_that!(history.operations[1].args, eq(json!({"n": 3})));

    let positions: Vec<_> = history
        .network_trace
        .iter()
        .map(|entry| (entry.at, entry.from.as_str(), entry.to.as_str(), entry.dropped))
        .collect();
    assert_that!(
        positions,
        elements_are![
            eq((2, "pinger", "ponger", false)),
            eq((3, "ponger", "pinger", false))
        ]
    );
    assert_that!(history.timers, eq(1));
    assert_that!(history.ticks, eq(0));
}

#[test(tokio::test)]
async fn omission_drops_the_message_at_its_position() {
    let scheduler = scheduler();
    let faults = FaultSet::from(vec![Fault::omission("pinger", "ponger", 2)]);
    let meta = run(&scheduler, faults.clone(), 0.0).await;

    let history = scheduler.history(meta.run_id).unwrap();
    assert_that!(history.faults, eq(faults));
    assert_that!(history.operations.len(), eq(1));
    assert_that!(history.network_trace.len(), eq(1));
    assert_that!(history.network_trace[0].dropped, eq(true));
}

#[test(tokio::test)]
async fn ticks_fire_until_the_queue_drains() {
    let scheduler = scheduler();
    let meta = run(&scheduler, FaultSet::default(), 1000.0).await;

    let history = scheduler.history(meta.run_id).unwrap();
    // The last event is the timer at 5ms.
    assert_that!(history.ticks, eq(5));
    assert_that!(history.timers, eq(1));
}

#[test(tokio::test)]
async fn runs_are_reproducible() {
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_with(store.clone());
    let first_meta = run(&scheduler, FaultSet::default(), 0.0).await;
    let second_meta = run(&scheduler, FaultSet::default(), 0.0).await;

    let first = scheduler.history(first_meta.run_id).unwrap();
    let second = scheduler.history(second_meta.run_id).unwrap();
    assert_that!(second.meta.run_id.as_u64(), eq(1));
    assert_that!(first.operations, eq(second.operations));
    assert_that!(first.network_trace, eq(second.network_trace));

    let steps = |meta: RunMeta| {
        store
            .steps_of(meta)
            .into_iter()
            .map(|step| (step.component, step.simulated_time, step.log_lines, step.heap_diff))
            .collect::<Vec<_>>()
    };
    let first_steps = steps(first_meta);
    // serve, ball to ponger, ball back to pinger, timer
    assert_that!(first_steps.len(), eq(4));
    assert_that!(
        first_steps[1],
        eq((
            "ponger".to_owned(),
            ms(1),
            vec!["INFO\treturning 1 to pinger".to_owned()],
            json!([{"op": "replace", "path": "/returned", "value": 1}])
        ))
    );
    assert_that!(first_steps, eq(steps(second_meta)));
}

#[test(tokio::test)]
async fn rejects_commands_out_of_order() {
    let scheduler = scheduler();

    let err = scheduler.load_test(TestId::new(99)).await.unwrap_err();
    assert_that!(err, pat!(Error::Rejected { .. }));

    let err = scheduler.create_run(TEST).await.unwrap_err();
    assert_that!(err.to_string(), contains_substring("not loaded"));

    let err = scheduler.run().await.unwrap_err();
    assert_that!(err.to_string(), contains_substring("no run was created"));
}
