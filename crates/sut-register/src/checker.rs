// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::{BTreeSet, HashMap};

use tracing::info;

use detsys_types::history::{Operation, OperationKind};
use detsys_types::marshaler::{DecodeError, Marshaler};
use detsys_types::ClientId;

use crate::protocol::{RegisterMarshaler, RegisterRequest, RegisterResponse};

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("{client} read {read:?} although {acknowledged:?} had been acknowledged")]
    StaleRead {
        client: ClientId,
        read: Vec<i64>,
        acknowledged: Vec<i64>,
    },
    #[error("{0} received a response without an outstanding request")]
    UnexpectedResponse(ClientId),
    #[error("{0} issued a request while another one was outstanding")]
    ConcurrentInvoke(ClientId),
    #[error("{client} received '{response}' in reply to '{request}'")]
    MismatchedResponse {
        client: ClientId,
        request: &'static str,
        response: &'static str,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Checks that no read misses a write whose acknowledgement preceded the read.
///
/// Writes that were never acknowledged may or may not be visible. Every client issues one
/// request at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaleReadChecker;

impl StaleReadChecker {
    pub const MODEL: &'static str = "stale-read";

    pub fn check(history: &[Operation]) -> Result<(), HistoryError> {
        let marshaler = RegisterMarshaler;
        let mut acknowledged = BTreeSet::new();
        // outstanding request per client, with the writes acknowledged when it was issued
        let mut outstanding: HashMap<ClientId, (RegisterRequest, BTreeSet<i64>)> =
            HashMap::new();

        for operation in history {
            match operation.kind {
                OperationKind::Invoke => {
                    let request = marshaler.unmarshal_request(&operation.event, &operation.args)?;
                    if outstanding
                        .insert(operation.client, (request, acknowledged.clone()))
                        .is_some()
                    {
                        return Err(HistoryError::ConcurrentInvoke(operation.client));
                    }
                }
                OperationKind::Ok => {
                    let (request, visible) = outstanding
                        .remove(&operation.client)
                        .ok_or(HistoryError::UnexpectedResponse(operation.client))?;
                    let response =
                        marshaler.unmarshal_response(&operation.event, &operation.args)?;

                    match (request, response) {
                        (RegisterRequest::Write(write), RegisterResponse::Ack(_)) => {
                            acknowledged.insert(write.value);
                        }
                        (RegisterRequest::Read(_), RegisterResponse::Contents(contents)) => {
                            if !visible.iter().all(|value| contents.value.contains(value)) {
                                return Err(HistoryError::StaleRead {
                                    client: operation.client,
                                    read: contents.value,
                                    acknowledged: visible.into_iter().collect(),
                                });
                            }
                        }
                        (request, response) => {
                            return Err(HistoryError::MismatchedResponse {
                                client: operation.client,
                                request: request.tag(),
                                response: response.tag(),
                            })
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// [`StaleReadChecker::check`] as a verdict, logging the violation if there is one.
    pub fn passes(history: &[Operation]) -> bool {
        Self::check(history)
            .inspect_err(|err| info!(%err, "History violates {}", Self::MODEL))
            .is_ok()
    }
}
