// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use chrono::{DateTime, TimeZone, Utc};

/// The scheduler-controlled clock. Reactors only ever observe time through values of this type.
pub type SimulatedTime = DateTime<Utc>;

/// The instant every run starts at.
pub fn simulation_epoch() -> SimulatedTime {
    Utc.timestamp_nanos(0)
}
