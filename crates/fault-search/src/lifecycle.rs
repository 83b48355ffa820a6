// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use detsys_executor::{DeliveryError, Executor};
use detsys_scheduler_client::SchedulerApi;
use detsys_types::marshaler::Marshaler;
use detsys_types::RunMeta;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    Scheduler(#[from] detsys_scheduler_client::Error),
    #[error("executor at '{url}' is unreachable: {source}")]
    Http {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

/// Hooks around every run of a search.
///
/// `prepare` is called after the run was created and before it is started, so that executors
/// can discard the state of the previous run and announce themselves to the scheduler.
#[async_trait]
pub trait RunLifecycle: Send + Sync {
    async fn prepare(&self, scheduler: &dyn SchedulerApi, meta: RunMeta)
        -> Result<(), LifecycleError>;

    async fn teardown(&self, _meta: RunMeta) -> Result<(), LifecycleError> {
        Ok(())
    }
}

/// Executors are managed elsewhere.
#[async_trait]
impl RunLifecycle for () {
    async fn prepare(
        &self,
        _scheduler: &dyn SchedulerApi,
        _meta: RunMeta,
    ) -> Result<(), LifecycleError> {
        Ok(())
    }
}

/// An executor hosted by the process running the search.
pub struct ExecutorLifecycle<M: Marshaler> {
    executor: Executor<M>,
    advertised_address: Url,
}

impl<M: Marshaler> ExecutorLifecycle<M> {
    pub fn new(executor: Executor<M>, advertised_address: Url) -> Self {
        Self {
            executor,
            advertised_address,
        }
    }
}

#[async_trait]
impl<M: Marshaler> RunLifecycle for ExecutorLifecycle<M> {
    async fn prepare(
        &self,
        scheduler: &dyn SchedulerApi,
        meta: RunMeta,
    ) -> Result<(), LifecycleError> {
        self.executor.reset(meta)?;
        self.executor
            .register(scheduler, &self.advertised_address)
            .await?;
        Ok(())
    }

    async fn teardown(&self, meta: RunMeta) -> Result<(), LifecycleError> {
        debug!(%meta, bound = ?self.executor.bound_run(), "Run finished");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct Health {
    components: Vec<String>,
}

/// An executor running in another process, driven through its HTTP surface.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    client: reqwest::Client,
    base_url: Url,
}

impl RemoteExecutor {
    /// `base_url` is the advertised address of the executor, e.g. `http://localhost:3001/api/v1/`.
    pub fn new(base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn http_error(url: &Url) -> impl FnOnce(reqwest::Error) -> LifecycleError + '_ {
        move |source| LifecycleError::Http {
            url: url.clone(),
            source,
        }
    }
}

#[async_trait]
impl RunLifecycle for RemoteExecutor {
    async fn prepare(
        &self,
        scheduler: &dyn SchedulerApi,
        meta: RunMeta,
    ) -> Result<(), LifecycleError> {
        let reset_url = self.base_url.join("reset")?;
        self.client
            .post(reset_url.clone())
            .json(&meta)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Self::http_error(&reset_url))?;

        let health_url = self.base_url.join("/health")?;
        let health: Health = self
            .client
            .get(health_url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Self::http_error(&health_url))?
            .json()
            .await
            .map_err(Self::http_error(&health_url))?;

        info!(executor = %self.base_url, %meta, "Executor reset");
        scheduler
            .register_executor(self.base_url.as_str(), health.components)
            .await?;
        Ok(())
    }
}
