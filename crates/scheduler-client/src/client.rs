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
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use detsys_types::config::SchedulerOptions;
use detsys_types::fault::FaultSet;
use detsys_types::{RunId, TestId};

use crate::command::{CreatedRun, QueueSize, SchedulerCommand};
use crate::errors::{ApiError, Error};
use crate::SchedulerApi;

/// [`SchedulerApi`] over HTTP.
#[derive(Clone, Debug)]
pub struct SchedulerClient {
    inner: reqwest::Client,
    url: reqwest::Url,
}

impl SchedulerClient {
    pub fn new(opts: &SchedulerOptions) -> Result<Self, Error> {
        let inner = reqwest::Client::builder()
            .user_agent(format!(
                "{}/{} {}-{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH,
            ))
            .timeout(opts.request_timeout.into())
            .build()?;

        Ok(Self {
            inner,
            url: opts.url()?,
        })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    async fn send(&self, command: SchedulerCommand) -> Result<bytes::Bytes, Error> {
        let name = command.name();
        debug!(command = name, "Sending scheduler command");

        let resp = self
            .inner
            .post(self.url.clone())
            .json(&command)
            .send()
            .await?;

        let http_status_code = resp.status();
        let url = resp.url().clone();
        if !http_status_code.is_success() {
            let body = resp.text().await?;
            info!("Response from {} ({})", url, http_status_code);
            info!("  {}", body);
            return Err(Error::Api(ApiError {
                http_status_code,
                url,
                command: name,
                body,
            }));
        }

        Ok(resp.bytes().await?)
    }

    async fn send_parse<R: DeserializeOwned>(&self, command: SchedulerCommand) -> Result<R, Error> {
        let body = self.send(command).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl SchedulerApi for SchedulerClient {
    async fn load_test(&self, test_id: TestId) -> Result<QueueSize, Error> {
        self.send_parse(SchedulerCommand::LoadTest { test_id }).await
    }

    async fn register_executor(
        &self,
        executor_id: &str,
        components: Vec<String>,
    ) -> Result<(), Error> {
        self.send(SchedulerCommand::RegisterExecutor {
            executor_id: executor_id.to_owned(),
            components,
        })
        .await
        .map(drop)
    }

    async fn set_seed(&self, seed: u64) -> Result<(), Error> {
        self.send(SchedulerCommand::SetSeed { new_seed: seed })
            .await
            .map(drop)
    }

    async fn create_run(&self, test_id: TestId) -> Result<RunId, Error> {
        let created: CreatedRun = self.send_parse(SchedulerCommand::CreateRun { test_id }).await?;
        Ok(created.run_id)
    }

    async fn inject_faults(&self, faults: &FaultSet) -> Result<(), Error> {
        self.send(SchedulerCommand::InjectFaults {
            faults: faults.clone(),
        })
        .await
        .map(drop)
    }

    async fn set_tick_frequency(&self, tick_frequency: f64) -> Result<(), Error> {
        self.send(SchedulerCommand::SetTickFrequency {
            new_tick_frequency: tick_frequency,
        })
        .await
        .map(drop)
    }

    async fn run(&self) -> Result<(), Error> {
        self.send(SchedulerCommand::Run {}).await.map(drop)
    }

    async fn status(&self) -> Result<serde_json::Map<String, serde_json::Value>, Error> {
        self.send_parse(SchedulerCommand::Status {}).await
    }

    async fn reset(&self) -> Result<(), Error> {
        self.send(SchedulerCommand::Reset {}).await.map(drop)
    }
}

// Ensure that client is Send + Sync. Compiler will fail if it's not.
const _: () = {
    const fn assert_send<T: Send + Sync>() {}
    assert_send::<SchedulerClient>();
};
