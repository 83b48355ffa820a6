// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Per-component capture of reactor diagnostics.
//!
//! Reactors log through a [`ComponentLogger`]. Every line is buffered for the component and
//! run that produced it, so it can be attached to the execution step of the delivery in
//! progress, and is also re-emitted as a `tracing` event.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn, Level};

use detsys_types::RunMeta;

#[derive(Debug, Default)]
struct Buffer {
    run: Option<RunMeta>,
    lines: Vec<String>,
}

/// Logger handed to a reactor at construction time.
#[derive(Debug, Clone)]
pub struct ComponentLogger {
    component: Arc<str>,
    buffer: Arc<Mutex<Buffer>>,
}

macro_rules! log_method {
    ($name:ident, $level:expr, $macro:ident) => {
        pub fn $name(&self, message: impl Display) {
            let line = message.to_string();
            let run = self.push($level, &line);
            $macro!(
                component = %self.component,
                test_id = run.map(|m| m.test_id.as_u64()),
                run_id = run.map(|m| m.run_id.as_u64()),
                "{line}"
            );
        }
    };
}

impl ComponentLogger {
    log_method!(debug, Level::DEBUG, debug);
    log_method!(info, Level::INFO, info);
    log_method!(warn, Level::WARN, warn);
    log_method!(error, Level::ERROR, error);

    pub fn component(&self) -> &str {
        &self.component
    }

    fn push(&self, level: Level, line: &str) -> Option<RunMeta> {
        let mut buffer = self.buffer.lock();
        buffer.lines.push(format!("{level}\t{line}"));
        buffer.run
    }
}

/// Owner of every component buffer of an executor.
///
/// Buffers outlive reactor instances: a reset rebuilds the reactors but hands them loggers
/// sharing the existing buffers, rebound to the new run.
#[derive(Debug, Default, Clone)]
pub struct LogCapture {
    buffers: Arc<Mutex<HashMap<String, Arc<Mutex<Buffer>>>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logger(&self, component: &str) -> ComponentLogger {
        let buffer = self
            .buffers
            .lock()
            .entry(component.to_owned())
            .or_default()
            .clone();
        ComponentLogger {
            component: Arc::from(component),
            buffer,
        }
    }

    /// Takes the lines buffered for `component` since the last drain.
    pub fn drain(&self, component: &str) -> Vec<String> {
        self.buffers
            .lock()
            .get(component)
            .map(|buffer| std::mem::take(&mut buffer.lock().lines))
            .unwrap_or_default()
    }

    /// Binds every buffer to `meta`, discarding lines left over from the previous run.
    pub fn rebind(&self, meta: RunMeta) {
        for buffer in self.buffers.lock().values() {
            let mut buffer = buffer.lock();
            buffer.run = Some(meta);
            buffer.lines.clear();
        }
    }
}
