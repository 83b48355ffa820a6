// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Name-indexed registry of the reactor instances hosted by an executor.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use detsys_storage::{DeploymentStore, StorageError};
use detsys_types::deployment::DeploymentInfo;
use detsys_types::reactor::{BoxedReactor, Protocol};
use detsys_types::TestId;

use crate::log_capture::{ComponentLogger, LogCapture};

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("component '{component}' has unknown reactor type '{reactor_type}'")]
    UnknownReactorType {
        component: String,
        reactor_type: String,
    },
    #[error("component '{0}' is deployed more than once")]
    DuplicateComponent(String),
    #[error("cannot construct component '{component}': {reason}")]
    Construction { component: String, reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Builds fresh reactor instances from their deployment metadata.
pub trait ReactorFactory<P: Protocol>: Send + Sync + 'static {
    fn build(
        &self,
        info: &DeploymentInfo,
        logger: ComponentLogger,
    ) -> Result<BoxedReactor<P>, TopologyError>;
}

impl<P, F> ReactorFactory<P> for F
where
    P: Protocol,
    F: Fn(&DeploymentInfo, ComponentLogger) -> Result<BoxedReactor<P>, TopologyError>
        + Send
        + Sync
        + 'static,
{
    fn build(
        &self,
        info: &DeploymentInfo,
        logger: ComponentLogger,
    ) -> Result<BoxedReactor<P>, TopologyError> {
        self(info, logger)
    }
}

pub type Slot<P> = Mutex<BoxedReactor<P>>;

/// Mapping from unique component name to an owned reactor, in registration order.
///
/// Each reactor sits behind its own lock so that distinct components can be driven
/// concurrently while one component is never re-entered.
pub struct Topology<P: Protocol> {
    deployment: Vec<DeploymentInfo>,
    factory: Arc<dyn ReactorFactory<P>>,
    index: HashMap<String, usize>,
    reactors: Vec<Slot<P>>,
}

impl<P: Protocol> Topology<P> {
    pub fn new(
        deployment: Vec<DeploymentInfo>,
        factory: impl ReactorFactory<P>,
        capture: &LogCapture,
    ) -> Result<Self, TopologyError> {
        let mut index = HashMap::with_capacity(deployment.len());
        for (i, info) in deployment.iter().enumerate() {
            if index.insert(info.reactor.clone(), i).is_some() {
                return Err(TopologyError::DuplicateComponent(info.reactor.clone()));
            }
        }

        let factory: Arc<dyn ReactorFactory<P>> = Arc::new(factory);
        let reactors = Self::construct(&deployment, factory.as_ref(), capture)?;
        Ok(Self {
            deployment,
            factory,
            index,
            reactors,
        })
    }

    /// Builds the topology of `test_id` from persisted deployment metadata.
    pub fn from_deployment(
        store: &dyn DeploymentStore,
        test_id: TestId,
        factory: impl ReactorFactory<P>,
        capture: &LogCapture,
    ) -> Result<Self, TopologyError> {
        Self::new(store.deployment(test_id)?, factory, capture)
    }

    fn construct(
        deployment: &[DeploymentInfo],
        factory: &dyn ReactorFactory<P>,
        capture: &LogCapture,
    ) -> Result<Vec<Slot<P>>, TopologyError> {
        deployment
            .iter()
            .map(|info| {
                factory
                    .build(info, capture.logger(&info.reactor))
                    .map(Mutex::new)
            })
            .collect()
    }

    /// Discards every reactor and constructs fresh ones, keeping the component names.
    pub fn rebuild(&mut self, capture: &LogCapture) -> Result<(), TopologyError> {
        self.reactors = Self::construct(&self.deployment, self.factory.as_ref(), capture)?;
        debug!(components = self.reactors.len(), "Rebuilt topology");
        Ok(())
    }

    pub fn component(&self, name: &str) -> Option<&Slot<P>> {
        self.index.get(name).map(|i| &self.reactors[*i])
    }

    /// Component names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.deployment.iter().map(|info| info.reactor.as_str())
    }

    /// Components with their reactors, in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot<P>)> {
        self.names().zip(self.reactors.iter())
    }

    pub fn deployment(&self) -> &[DeploymentInfo] {
        &self.deployment
    }

    pub fn len(&self) -> usize {
        self.reactors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactors.is_empty()
    }
}
