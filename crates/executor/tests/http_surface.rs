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

use axum::body::Body;
use axum::Router;
use googletest::prelude::*;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use test_log::test;
use tower::ServiceExt;

use detsys_executor::rest_api::{create_router, CORRELATION_ID_HEADER};
use detsys_executor::{ComponentLogger, Executor, ExecutorService, TopologyError};
use detsys_storage::MemoryStore;
use detsys_types::config::ExecutorOptionsBuilder;
use detsys_types::deployment::DeploymentInfo;
use detsys_types::marshaler::{decode_payload, DecodeError, Marshaler};
use detsys_types::reactor::{Args, BoxedReactor, InEvent, OutEvent, Protocol, Reactor};
use detsys_types::{SimulatedTime, TestId};

#[derive(Debug, Clone, PartialEq)]
struct Counting;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Add {
    value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Total {
    total: i64,
}

impl Protocol for Counting {
    type Request = Add;
    type Response = Total;
    type Message = Add;
}

struct CountingMarshaler;

impl Marshaler for CountingMarshaler {
    type Protocol = Counting;

    fn unmarshal_request(&self, tag: &str, payload: &Value) -> std::result::Result<Add, DecodeError> {
        match tag {
            "add" => decode_payload(tag, payload),
            _ => Err(DecodeError::unknown_request(tag)),
        }
    }

    fn unmarshal_message(&self, tag: &str, payload: &Value) -> std::result::Result<Add, DecodeError> {
        match tag {
            "add" => decode_payload(tag, payload),
            _ => Err(DecodeError::unknown_message(tag)),
        }
    }

    fn marshal_event(&self, args: &Args<Counting>) -> String {
        match args {
            Args::ClientResponse { .. } => "total".to_owned(),
            Args::InternalMessage(_) => "add".to_owned(),
            Args::Timer { .. } => "timer".to_owned(),
        }
    }
}

#[derive(Serialize)]
struct Counter {
    total: i64,
    timers: u64,
    #[serde(skip)]
    peer: Option<String>,
    #[serde(skip)]
    logger: ComponentLogger,
}

impl Reactor for Counter {
    type Protocol = Counting;

    fn init(&mut self) -> Vec<OutEvent<Counting>> {
        self.peer
            .iter()
            .map(|peer| OutEvent::message(peer.clone(), Add { value: 0 }))
            .collect()
    }

    fn receive(
        &mut self,
        _at: SimulatedTime,
        _from: &str,
        event: InEvent<Counting>,
    ) -> Vec<OutEvent<Counting>> {
        match event {
            InEvent::ClientRequest { id, request } => {
                self.logger.info(format_args!("adding {}", request.value));
                self.total += request.value;
                vec![OutEvent::reply(id, Total { total: self.total })]
            }
            InEvent::InternalMessage(add) => {
                self.total += add.value;
                Vec::new()
            }
        }
    }

    fn tick(&mut self, _at: SimulatedTime) -> Vec<OutEvent<Counting>> {
        self.logger.debug("tick");
        Vec::new()
    }

    fn timer(&mut self, _at: SimulatedTime) -> Vec<OutEvent<Counting>> {
        self.timers += 1;
        self.logger.info(format_args!("timer {} fired", self.timers));
        Vec::new()
    }

    fn snapshot(&self) -> std::result::Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

fn build_counter(
    info: &DeploymentInfo,
    logger: ComponentLogger,
) -> std::result::Result<BoxedReactor<Counting>, TopologyError> {
    match info.reactor_type.as_str() {
        "counter" => Ok(Box::new(Counter {
            total: 0,
            timers: 0,
            peer: info.args["peer"].as_str().map(str::to_owned),
            logger,
        })),
        other => Err(TopologyError::UnknownReactorType {
            component: info.reactor.clone(),
            reactor_type: other.to_owned(),
        }),
    }
}

struct Fixture {
    executor: Executor<CountingMarshaler>,
    store: Arc<MemoryStore>,
}

impl Fixture {
    fn new(deployment: Vec<DeploymentInfo>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let executor = Executor::new(
            TestId::new(1),
            CountingMarshaler,
            deployment,
            build_counter,
            store.clone(),
        )
        .unwrap();
        Self { executor, store }
    }

    fn counters() -> Self {
        let mut first = DeploymentInfo::new("node1", "counter");
        first.args = json!({"peer": "node2"});
        Self::new(vec![first, DeploymentInfo::new("node2", "counter")])
    }

    fn router(&self) -> Router {
        create_router(self.executor.clone())
    }

    async fn bind(&self, run_id: u64) {
        let (status, _) = call(
            self.router(),
            request(
                Method::POST,
                "/api/v1/reset",
                json!({"test-id": 1, "run-id": run_id}),
            ),
        )
        .await;
        assert_that!(status, eq(StatusCode::OK));
    }
}

fn request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn invoke(to: &str, value: i64) -> Value {
    json!({
        "at": "1970-01-01T00:00:01Z",
        "from": "client:0",
        "to": to,
        "kind": "invoke",
        "event": "add",
        "args": {"value": value}
    })
}

async fn call(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, body)
}

#[test(tokio::test)]
async fn event_delivery_echoes_correlation_id() {
    let fixture = Fixture::counters();
    fixture.bind(0).await;

    let mut req = request(Method::POST, "/api/v1/event", invoke("node1", 3));
    req.headers_mut()
        .insert(CORRELATION_ID_HEADER, "7".parse().unwrap());
    let (status, body) = call(fixture.router(), req).await;

    assert_that!(status, eq(StatusCode::OK));
    assert_that!(
        body,
        eq(json!({"events": [{
            "from": "node1",
            "to": "client:0",
            "kind": "ok",
            "event": "total",
            "args": {"id": 0, "response": {"total": 3}},
            "corr-id": 7
        }]}))
    );
}

#[test(tokio::test)]
async fn missing_correlation_id_defaults_to_unknown() {
    let fixture = Fixture::counters();
    fixture.bind(0).await;

    let (status, body) = call(
        fixture.router(),
        request(Method::POST, "/api/v1/event", invoke("node2", 1)),
    )
    .await;

    assert_that!(status, eq(StatusCode::OK));
    assert_that!(body["events"][0]["corr-id"], eq(json!(-1)));
}

#[test(tokio::test)]
async fn delivery_records_execution_step() {
    let fixture = Fixture::counters();
    fixture.bind(5).await;

    call(
        fixture.router(),
        request(Method::POST, "/api/v1/event", invoke("node1", 2)),
    )
    .await;

    let steps = fixture.store.steps();
    assert_that!(steps.len(), eq(1));
    let step = &steps[0];
    assert_that!(step.run_id.as_u64(), eq(5));
    assert_that!(step.component.as_str(), eq("node1"));
    assert_that!(step.log_lines, elements_are![eq("INFO\tadding 2")]);
    assert_that!(
        step.heap_diff,
        eq(json!([{"op": "replace", "path": "/total", "value": 2}]))
    );
}

#[test(tokio::test)]
async fn tick_does_not_record_a_step() {
    let fixture = Fixture::counters();
    fixture.bind(0).await;

    let (status, body) = call(
        fixture.router(),
        request(
            Method::PUT,
            "/api/v1/tick",
            json!({"component": "node1", "at": "1970-01-01T00:00:02Z"}),
        ),
    )
    .await;

    assert_that!(status, eq(StatusCode::OK));
    assert_that!(body, eq(json!({"events": []})));
    assert_that!(fixture.store.steps(), empty());
}

#[test(tokio::test)]
async fn timer_records_a_step() {
    let fixture = Fixture::counters();
    fixture.bind(3).await;

    let (status, body) = call(
        fixture.router(),
        request(
            Method::POST,
            "/api/v1/timer",
            json!({"to": "node2", "at": "1970-01-01T00:00:02Z"}),
        ),
    )
    .await;

    assert_that!(status, eq(StatusCode::OK));
    assert_that!(body, eq(json!({"events": []})));
    let steps = fixture.store.steps();
    assert_that!(steps.len(), eq(1));
    let step = &steps[0];
    assert_that!(step.run_id.as_u64(), eq(3));
    assert_that!(step.component.as_str(), eq("node2"));
    assert_that!(step.log_lines, elements_are![eq("INFO\ttimer 1 fired")]);
    assert_that!(
        step.heap_diff,
        eq(json!([{"op": "replace", "path": "/timers", "value": 1}]))
    );
}

#[test(tokio::test)]
async fn inits_are_delivered_once_per_run() {
    let fixture = Fixture::counters();
    fixture.bind(0).await;

    let (status, body) = call(
        fixture.router(),
        request(Method::GET, "/api/v1/inits", Value::Null),
    )
    .await;
    assert_that!(status, eq(StatusCode::OK));
    assert_that!(
        body,
        eq(json!({"events": [{
            "from": "node1",
            "to": "node2",
            "kind": "message",
            "event": "add",
            "args": {"value": 0},
            "corr-id": -1
        }]}))
    );

    let (status, _) = call(
        fixture.router(),
        request(Method::GET, "/api/v1/inits", Value::Null),
    )
    .await;
    assert_that!(status, eq(StatusCode::CONFLICT));

    fixture.bind(1).await;
    let (status, _) = call(
        fixture.router(),
        request(Method::GET, "/api/v1/inits", Value::Null),
    )
    .await;
    assert_that!(status, eq(StatusCode::OK));
}

#[test(tokio::test)]
async fn empty_topology_has_no_inits() {
    let fixture = Fixture::new(Vec::new());

    let (status, body) = call(
        fixture.router(),
        request(Method::GET, "/api/v1/inits", Value::Null),
    )
    .await;

    assert_that!(status, eq(StatusCode::OK));
    assert_that!(body, eq(json!({"events": []})));
}

#[test(tokio::test)]
async fn wrong_method_is_rejected() {
    let fixture = Fixture::counters();

    let (status, body) = call(
        fixture.router(),
        request(Method::GET, "/api/v1/event", Value::Null),
    )
    .await;

    assert_that!(status, eq(StatusCode::NOT_FOUND));
    assert_that!(body, eq(json!({"error": "Method is not supported."})));
}

#[test(tokio::test)]
async fn delivery_before_binding_conflicts() {
    let fixture = Fixture::counters();

    let (status, body) = call(
        fixture.router(),
        request(Method::POST, "/api/v1/event", invoke("node1", 1)),
    )
    .await;

    assert_that!(status, eq(StatusCode::CONFLICT));
    assert_that!(body["error"].as_str(), some(contains_substring("not bound")));
}

#[test(tokio::test)]
async fn bad_deliveries_are_client_errors() {
    let fixture = Fixture::counters();
    fixture.bind(0).await;

    let (status, _) = call(
        fixture.router(),
        request(Method::POST, "/api/v1/event", invoke("node3", 1)),
    )
    .await;
    assert_that!(status, eq(StatusCode::NOT_FOUND));

    let mut unknown_tag = invoke("node1", 1);
    unknown_tag["event"] = json!("subtract");
    let (status, _) = call(
        fixture.router(),
        request(Method::POST, "/api/v1/event", unknown_tag),
    )
    .await;
    assert_that!(status, eq(StatusCode::BAD_REQUEST));

    let malformed = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/event")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _) = call(fixture.router(), malformed).await;
    assert_that!(status, eq(StatusCode::BAD_REQUEST));

    let (status, _) = call(
        fixture.router(),
        request(Method::POST, "/api/v1/reset", json!({"test-id": 2, "run-id": 0})),
    )
    .await;
    assert_that!(status, eq(StatusCode::CONFLICT));
}

#[test(tokio::test)]
async fn delivery_for_another_test_conflicts() {
    let fixture = Fixture::counters();
    fixture.bind(0).await;

    let mut foreign = invoke("node1", 1);
    foreign["meta"] = json!({"test-id": 2, "run-id": 0});
    let (status, body) = call(
        fixture.router(),
        request(Method::POST, "/api/v1/event", foreign),
    )
    .await;
    assert_that!(status, eq(StatusCode::CONFLICT));
    assert_that!(body["error"].as_str(), some(contains_substring("test 2")));

    let (status, _) = call(
        fixture.router(),
        request(
            Method::POST,
            "/api/v1/timer",
            json!({"to": "node1", "at": "1970-01-01T00:00:02Z", "meta": {"test-id": 2, "run-id": 0}}),
        ),
    )
    .await;
    assert_that!(status, eq(StatusCode::CONFLICT));
    assert_that!(fixture.store.steps(), empty());
}

#[test(tokio::test)]
async fn service_serves_until_drained() {
    let fixture = Fixture::counters();
    let opts = ExecutorOptionsBuilder::default()
        .bind_address(([127, 0, 0, 1], 0).into())
        .build()
        .unwrap();
    let (service, start_signal) = ExecutorService::new(fixture.executor.clone(), &opts);
    let (drain_signal, watch) = drain::channel();
    let server = tokio::spawn(service.run(watch));

    let address = start_signal.await.unwrap();
    let health: Value = reqwest::get(format!("http://{address}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_that!(
        health,
        eq(json!({"test-id": 1, "run": null, "components": ["node1", "node2"]}))
    );

    drain_signal.drain().await;
    server.await.unwrap().unwrap();
}
