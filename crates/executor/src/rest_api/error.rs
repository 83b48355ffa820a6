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
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use detsys_types::event::EnvelopeError;

use crate::executor::DeliveryError;

/// This error is used by handlers to propagate API errors,
/// and later converted to a response through the IntoResponse implementation
#[derive(Debug, thiserror::Error)]
pub enum ExecutorApiError {
    #[error("Method is not supported.")]
    MethodNotSupported,
    #[error("cannot read request body: {0}")]
    Body(#[from] BytesRejection),
    #[error("malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorDescriptionResponse {
    error: String,
}

impl IntoResponse for ExecutorApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ExecutorApiError::MethodNotSupported => StatusCode::NOT_FOUND,
            ExecutorApiError::Body(rejection) => rejection.status(),
            ExecutorApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ExecutorApiError::Delivery(err) => match err {
                DeliveryError::Envelope(
                    EnvelopeError::Decode(_)
                    | EnvelopeError::InvalidClient(_)
                    | EnvelopeError::FaultNotDeliverable { .. },
                ) => StatusCode::BAD_REQUEST,
                DeliveryError::UnknownComponent(_) => StatusCode::NOT_FOUND,
                DeliveryError::NotBound
                | DeliveryError::InitsAlreadyDelivered(_)
                | DeliveryError::TestMismatch { .. } => StatusCode::CONFLICT,
                DeliveryError::Topology(_)
                | DeliveryError::Snapshot { .. }
                | DeliveryError::Encode { .. }
                | DeliveryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ExecutorApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status_code,
            Json(ErrorDescriptionResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
