// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! A replicated register used as the reference system under test.
//!
//! One front end relays client reads and writes to two registers. The default
//! [`FrontEnd`] acknowledges a write as soon as either register stored it, which lets a
//! single dropped message surface as a stale read. [`CountingFrontEnd`] retries but counts
//! a register answering twice as a quorum, so it fails under a few omissions. The
//! [`QuorumFrontEnd`] and [`TimerQuorumFrontEnd`] wait for both registers, resend to the
//! silent one and survive any single omission.

mod checker;
mod deployment;
mod frontend;
pub mod protocol;
mod register;

pub use checker::{HistoryError, StaleReadChecker};
pub use deployment::{agenda, deployment, FrontEndKind, RegisterReactors};
pub use frontend::{
    CountingFrontEnd, FrontEnd, QuorumFrontEnd, TimerQuorumFrontEnd, RETRY_INTERVAL,
};
pub use protocol::{RegisterMarshaler, RegisterProtocol};
pub use register::Register;

pub const FRONTEND: &str = "frontend";
pub const REGISTER1: &str = "register1";
pub const REGISTER2: &str = "register2";
pub const REGISTERS: [&str; 2] = [REGISTER1, REGISTER2];
