// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{error, Span};

use detsys_types::event::{
    EventsResponse, ScheduledEventEnvelope, TickRequest, TimerRequest, UnscheduledEvent,
};
use detsys_types::marshaler::Marshaler;
use detsys_types::{CorrelationId, RunMeta};

use super::error::ExecutorApiError;
use crate::executor::{DeliveryError, Executor};

pub const CORRELATION_ID_HEADER: &str = "correlation-id";

fn correlation_id(headers: &HeaderMap) -> CorrelationId {
    CorrelationId::parse_or_unknown(
        headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|value| value.to_str().ok()),
    )
}

fn parse<T: DeserializeOwned>(body: Result<Bytes, BytesRejection>) -> Result<T, ExecutorApiError> {
    Ok(serde_json::from_slice(&body?)?)
}

/// Runs a delivery on the blocking pool.
///
/// A panicking reactor is a broken fixture or system under test: the offending request is
/// dumped and the process aborts.
async fn run_delivery<F>(
    request_dump: String,
    delivery: F,
) -> Result<Json<EventsResponse>, ExecutorApiError>
where
    F: FnOnce() -> Result<Vec<UnscheduledEvent>, DeliveryError> + Send + 'static,
{
    let span = Span::current();
    match tokio::task::spawn_blocking(move || span.in_scope(delivery)).await {
        Ok(events) => Ok(Json(EventsResponse::from(events?))),
        Err(err) if err.is_panic() => {
            error!(
                request = %request_dump,
                "Reactor panicked while handling a delivery, this is a contract violation. Aborting"
            );
            std::process::abort()
        }
        Err(err) => Err(ExecutorApiError::Internal(err.to_string())),
    }
}

fn dump<T: serde::Serialize>(request: &T) -> String {
    serde_json::to_string(request).unwrap_or_else(|err| format!("<unserializable: {err}>"))
}

pub async fn deliver_event<M: Marshaler>(
    State(executor): State<Executor<M>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<EventsResponse>, ExecutorApiError> {
    let envelope: ScheduledEventEnvelope = parse(body)?;
    let corr_id = correlation_id(&headers);
    let request_dump = dump(&envelope);

    run_delivery(request_dump, move || {
        executor.deliver_event(envelope, corr_id)
    })
    .await
}

pub async fn deliver_tick<M: Marshaler>(
    State(executor): State<Executor<M>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<EventsResponse>, ExecutorApiError> {
    let request: TickRequest = parse(body)?;
    let request_dump = dump(&request);

    run_delivery(request_dump, move || executor.deliver_tick(request)).await
}

pub async fn deliver_timer<M: Marshaler>(
    State(executor): State<Executor<M>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<EventsResponse>, ExecutorApiError> {
    let request: TimerRequest = parse(body)?;
    let corr_id = correlation_id(&headers);
    let request_dump = dump(&request);

    run_delivery(request_dump, move || {
        executor.deliver_timer(request, corr_id)
    })
    .await
}

pub async fn list_inits<M: Marshaler>(
    State(executor): State<Executor<M>>,
) -> Result<Json<EventsResponse>, ExecutorApiError> {
    run_delivery("inits".to_owned(), move || executor.list_inits()).await
}

pub async fn reset<M: Marshaler>(
    State(executor): State<Executor<M>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<RunMeta>, ExecutorApiError> {
    let meta: RunMeta = parse(body)?;
    tokio::task::spawn_blocking(move || executor.reset(meta))
        .await
        .map_err(|err| ExecutorApiError::Internal(err.to_string()))??;
    Ok(Json(meta))
}

pub async fn method_not_supported() -> ExecutorApiError {
    ExecutorApiError::MethodNotSupported
}
