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

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument};

use detsys_scheduler_client::SchedulerApi;
use detsys_storage::{StepLog, StorageError};
use detsys_types::deployment::{DeploymentInfo, ExecutionStep};
use detsys_types::event::{
    EnvelopeError, ScheduledEventEnvelope, TickRequest, TimerRequest, UnscheduledEvent,
};
use detsys_types::marshaler::Marshaler;
use detsys_types::reactor::{BoxedReactor, OutEvent, Reactor};
use detsys_types::{CorrelationId, RunMeta, SimulatedTime, TestId};

use crate::heap_diff::heap_diff;
use crate::log_capture::LogCapture;
use crate::topology::{ReactorFactory, Slot, Topology, TopologyError};

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("unknown component '{0}'")]
    UnknownComponent(String),
    #[error("executor is not bound to a run: reset it or pass 'meta' with the delivery")]
    NotBound,
    #[error("inits were already delivered for {0}")]
    InitsAlreadyDelivered(String),
    #[error("executor hosts test {hosted}, cannot bind it to test {requested}")]
    TestMismatch { hosted: TestId, requested: TestId },
    #[error("cannot snapshot component '{component}': {source}")]
    Snapshot {
        component: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot encode out events of component '{component}': {source}")]
    Encode {
        component: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

#[derive(Debug, Default)]
struct Binding {
    run: Option<RunMeta>,
    inits_delivered: bool,
}

struct Inner<M: Marshaler> {
    test_id: TestId,
    marshaler: M,
    topology: RwLock<Topology<M::Protocol>>,
    capture: LogCapture,
    step_log: Arc<dyn StepLog>,
    binding: Mutex<Binding>,
}

/// Hosts the topology of one test and dispatches deliveries to its reactors.
///
/// Cheap to clone; clones share the same topology.
pub struct Executor<M: Marshaler> {
    inner: Arc<Inner<M>>,
}

impl<M: Marshaler> Clone for Executor<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn snapshot<R: Reactor + ?Sized>(
    reactor: &R,
    component: &str,
) -> Result<serde_json::Value, DeliveryError> {
    reactor.snapshot().map_err(|source| DeliveryError::Snapshot {
        component: component.to_owned(),
        source,
    })
}

impl<M: Marshaler> Executor<M> {
    pub fn new(
        test_id: TestId,
        marshaler: M,
        deployment: Vec<DeploymentInfo>,
        factory: impl ReactorFactory<M::Protocol>,
        step_log: Arc<dyn StepLog>,
    ) -> Result<Self, TopologyError> {
        let capture = LogCapture::new();
        let topology = Topology::new(deployment, factory, &capture)?;
        Ok(Self::from_topology(
            test_id, marshaler, topology, capture, step_log,
        ))
    }

    /// Wraps an already constructed topology. `capture` must be the one its loggers came from.
    pub fn from_topology(
        test_id: TestId,
        marshaler: M,
        topology: Topology<M::Protocol>,
        capture: LogCapture,
        step_log: Arc<dyn StepLog>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                test_id,
                marshaler,
                topology: RwLock::new(topology),
                capture,
                step_log,
                binding: Mutex::new(Binding::default()),
            }),
        }
    }

    pub fn test_id(&self) -> TestId {
        self.inner.test_id
    }

    pub fn bound_run(&self) -> Option<RunMeta> {
        self.inner.binding.lock().run
    }

    /// Hosted component names in registration order.
    pub fn components(&self) -> Vec<String> {
        self.inner
            .topology
            .read()
            .names()
            .map(str::to_owned)
            .collect()
    }

    fn check_test(&self, meta: RunMeta) -> Result<RunMeta, DeliveryError> {
        if meta.test_id != self.inner.test_id {
            return Err(DeliveryError::TestMismatch {
                hosted: self.inner.test_id,
                requested: meta.test_id,
            });
        }
        Ok(meta)
    }

    fn resolve_meta(&self, meta: Option<RunMeta>) -> Result<RunMeta, DeliveryError> {
        meta.or_else(|| self.bound_run())
            .ok_or(DeliveryError::NotBound)
            .and_then(|meta| self.check_test(meta))
    }

    fn encode(
        &self,
        component: &str,
        outs: Vec<OutEvent<M::Protocol>>,
        corr_id: CorrelationId,
    ) -> Result<Vec<UnscheduledEvent>, DeliveryError> {
        UnscheduledEvent::encode_all(&self.inner.marshaler, component, outs, corr_id).map_err(
            |source| DeliveryError::Encode {
                component: component.to_owned(),
                source,
            },
        )
    }

    /// Runs `f` on the reactor of `component`, recording the state diff and captured log lines
    /// as an execution step.
    fn with_recorded_step<F>(
        &self,
        meta: RunMeta,
        component: &str,
        at: SimulatedTime,
        f: F,
    ) -> Result<Vec<OutEvent<M::Protocol>>, DeliveryError>
    where
        F: FnOnce(&mut BoxedReactor<M::Protocol>) -> Vec<OutEvent<M::Protocol>>,
    {
        let topology = self.inner.topology.read();
        let slot: &Slot<M::Protocol> = topology
            .component(component)
            .ok_or_else(|| DeliveryError::UnknownComponent(component.to_owned()))?;
        let mut reactor = slot.lock();

        let before = snapshot(&**reactor, component)?;
        let outs = f(&mut *reactor);
        let after = snapshot(&**reactor, component)?;
        drop(reactor);

        let step = ExecutionStep {
            test_id: meta.test_id,
            run_id: meta.run_id,
            component: component.to_owned(),
            simulated_time: at,
            log_lines: self.inner.capture.drain(component),
            heap_diff: heap_diff(&before, &after),
        };
        self.inner.step_log.append(step)?;
        Ok(outs)
    }

    /// Delivers a scheduled client request or internal message.
    #[instrument(level = "debug", skip_all, fields(component = %envelope.to, kind = ?envelope.kind, event = %envelope.event))]
    pub fn deliver_event(
        &self,
        envelope: ScheduledEventEnvelope,
        corr_id: CorrelationId,
    ) -> Result<Vec<UnscheduledEvent>, DeliveryError> {
        let meta = self.resolve_meta(envelope.meta)?;
        let event = envelope.decode(&self.inner.marshaler)?;

        let outs = self.with_recorded_step(meta, &event.to, event.at, |reactor| {
            reactor.receive(event.at, &event.from, event.event)
        })?;
        debug!(out_events = outs.len(), "Delivered event");
        self.encode(&envelope.to, outs, corr_id)
    }

    /// Fires a periodic tick. Ticks don't produce execution steps.
    #[instrument(level = "debug", skip_all, fields(component = %request.component))]
    pub fn deliver_tick(&self, request: TickRequest) -> Result<Vec<UnscheduledEvent>, DeliveryError> {
        let topology = self.inner.topology.read();
        let slot = topology
            .component(&request.component)
            .ok_or_else(|| DeliveryError::UnknownComponent(request.component.clone()))?;
        let outs = slot.lock().tick(request.at);
        drop(topology);

        self.inner.capture.drain(&request.component);
        self.encode(&request.component, outs, CorrelationId::UNKNOWN)
    }

    /// Fires a timer previously requested by the addressed reactor.
    #[instrument(level = "debug", skip_all, fields(component = %request.to))]
    pub fn deliver_timer(
        &self,
        request: TimerRequest,
        corr_id: CorrelationId,
    ) -> Result<Vec<UnscheduledEvent>, DeliveryError> {
        let meta = self.resolve_meta(request.meta)?;
        let outs = self.with_recorded_step(meta, &request.to, request.at, |reactor| {
            reactor.timer(request.at)
        })?;
        self.encode(&request.to, outs, corr_id)
    }

    /// Calls `init` on every component in registration order. Allowed once per run binding.
    #[instrument(level = "debug", skip_all)]
    pub fn list_inits(&self) -> Result<Vec<UnscheduledEvent>, DeliveryError> {
        {
            let mut binding = self.inner.binding.lock();
            if binding.inits_delivered {
                let run = binding
                    .run
                    .map(|meta| meta.to_string())
                    .unwrap_or_else(|| "the unbound executor".to_owned());
                return Err(DeliveryError::InitsAlreadyDelivered(run));
            }
            binding.inits_delivered = true;
        }

        let topology = self.inner.topology.read();
        let mut events = Vec::new();
        for (component, slot) in topology.iter() {
            let outs = slot.lock().init();
            self.inner.capture.drain(component);
            events.extend(self.encode(component, outs, CorrelationId::UNKNOWN)?);
        }
        Ok(events)
    }

    /// Discards every reactor, builds fresh ones and binds the executor to `meta`.
    #[instrument(level = "debug", skip(self))]
    pub fn reset(&self, meta: RunMeta) -> Result<(), DeliveryError> {
        let meta = self.check_test(meta)?;

        let mut topology = self.inner.topology.write();
        let mut binding = self.inner.binding.lock();
        topology.rebuild(&self.inner.capture)?;
        self.inner.capture.rebind(meta);
        *binding = Binding {
            run: Some(meta),
            inits_delivered: false,
        };
        info!(%meta, "Executor reset");
        Ok(())
    }

    /// Announces `advertised_address` and the hosted components to the scheduler.
    pub async fn register(
        &self,
        scheduler: &dyn SchedulerApi,
        advertised_address: &url::Url,
    ) -> Result<(), detsys_scheduler_client::Error> {
        let components = self.components();
        info!(
            executor = %advertised_address,
            ?components,
            "Registering executor"
        );
        scheduler
            .register_executor(advertised_address.as_str(), components)
            .await
    }
}
