// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use serde::de::DeserializeOwned;

use crate::reactor::{Args, Protocol};

/// Which decoding entry point of the marshaler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Request,
    Message,
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadKind::Request => f.write_str("request"),
            PayloadKind::Message => f.write_str("message"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown {kind} tag '{tag}'")]
    UnknownTag { kind: PayloadKind, tag: String },
    #[error("malformed payload for tag '{tag}': {source}")]
    Payload {
        tag: String,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    pub fn unknown_request(tag: &str) -> Self {
        DecodeError::UnknownTag {
            kind: PayloadKind::Request,
            tag: tag.to_owned(),
        }
    }

    pub fn unknown_message(tag: &str) -> Self {
        DecodeError::UnknownTag {
            kind: PayloadKind::Message,
            tag: tag.to_owned(),
        }
    }
}

/// Deserializes the payload of a tagged envelope, attributing failures to `tag`.
pub fn decode_payload<T: DeserializeOwned>(
    tag: &str,
    payload: &serde_json::Value,
) -> Result<T, DecodeError> {
    T::deserialize(payload).map_err(|source| DecodeError::Payload {
        tag: tag.to_owned(),
        source,
    })
}

/// Codec between the generic tagged wire envelope and the typed payloads of a [`Protocol`].
///
/// One marshaler is bound per topology. Outgoing payloads are matched exhaustively, so a
/// marshaler that compiles handles every [`Args`] its protocol can produce.
pub trait Marshaler: Send + Sync + 'static {
    type Protocol: Protocol;

    fn unmarshal_request(
        &self,
        tag: &str,
        payload: &serde_json::Value,
    ) -> Result<<Self::Protocol as Protocol>::Request, DecodeError>;

    fn unmarshal_message(
        &self,
        tag: &str,
        payload: &serde_json::Value,
    ) -> Result<<Self::Protocol as Protocol>::Message, DecodeError>;

    /// The wire tag of an outgoing payload.
    fn marshal_event(&self, args: &Args<Self::Protocol>) -> String;
}
