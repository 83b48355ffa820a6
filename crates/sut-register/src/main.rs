// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use detsys_executor::{Executor, ExecutorService, LogCapture, Topology};
use detsys_fault_search::{CommandChecker, LdfiOracle, RemoteExecutor, RunLoop, SearchOutcome};
use detsys_scheduler_client::SchedulerClient;
use detsys_storage::{DeploymentStore, FileStore, StorageError};
use detsys_sut_register::{deployment, FrontEndKind, RegisterMarshaler, RegisterReactors};
use detsys_tracing_instrumentation::init_tracing_and_logging;
use detsys_types::config::{Configuration, LogFormat};
use detsys_types::config_loader::ConfigLoaderBuilder;
use detsys_types::TestId;

mod signal;

const EXIT_CODE_FAILURE: i32 = 1;

#[derive(Debug, clap::Parser)]
#[command(author, version, about)]
struct RegisterArguments {
    /// Set a configuration file to use.
    #[arg(
        short,
        long = "config-file",
        env = "DETSYS_CONFIG",
        value_name = "FILE",
        global = true
    )]
    config_file: Option<PathBuf>,

    /// Overrides the configured log format.
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Hosts the register topology of a test behind the executor HTTP surface.
    Executor {
        #[arg(long, default_value_t = 0)]
        test_id: u64,
        /// Front end deployed when the test has no stored deployment yet.
        #[arg(long, value_enum, default_value_t = FrontEndKind::default())]
        front_end: FrontEndKind,
    },
    /// Searches for fault sets that violate the configured model, using a running executor.
    Search {
        #[arg(long)]
        test_id: u64,
    },
}

fn main() {
    let cli_args = RegisterArguments::parse();

    let config = ConfigLoaderBuilder::default()
        .load_env(true)
        .path(cli_args.config_file.clone())
        .build()
        .context("invalid configuration loader")
        .and_then(|loader| loader.load_once().context("cannot load configuration"));
    let mut config = match config {
        Ok(config) => config,
        Err(err) => {
            // tracing is not configured yet
            eprintln!("{err:#}");
            std::process::exit(EXIT_CODE_FAILURE);
        }
    };
    if let Some(log_format) = cli_args.log_format {
        config.common.log_format = log_format;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to build the tokio runtime: {err}");
            std::process::exit(EXIT_CODE_FAILURE);
        }
    };

    if let Err(err) = runtime.block_on(run(cli_args.command, config)) {
        error!("{err:#}");
        std::process::exit(EXIT_CODE_FAILURE);
    }
}

async fn run(command: Command, config: Configuration) -> anyhow::Result<()> {
    let _tracing_guard = init_tracing_and_logging(&config.common, "detsys-register")?;
    match command {
        Command::Executor { test_id, front_end } => {
            serve(config, TestId::new(test_id), front_end).await
        }
        Command::Search { test_id } => search(config, TestId::new(test_id)).await,
    }
}

fn ensure_deployment(
    store: &FileStore,
    test_id: TestId,
    front_end: FrontEndKind,
) -> anyhow::Result<()> {
    match store.deployment(test_id) {
        Ok(_) => Ok(()),
        Err(StorageError::UnknownTest(_)) => {
            info!(%test_id, %front_end, "Storing default register deployment");
            Ok(store.insert_deployment(test_id, deployment(front_end))?)
        }
        Err(err) => Err(err.into()),
    }
}

async fn serve(
    config: Configuration,
    test_id: TestId,
    front_end: FrontEndKind,
) -> anyhow::Result<()> {
    let store = Arc::new(FileStore::open(&config.storage)?);
    ensure_deployment(&store, test_id, front_end)?;

    let capture = LogCapture::new();
    let topology = Topology::from_deployment(store.as_ref(), test_id, RegisterReactors, &capture)?;
    let executor = Executor::from_topology(test_id, RegisterMarshaler, topology, capture, store);

    let (service, start_signal) = ExecutorService::new(executor.clone(), &config.executor);
    let (drain_signal, watch) = drain::channel();
    let server = tokio::spawn(service.run(watch));

    let Ok(address) = start_signal.await else {
        server.await??;
        anyhow::bail!("executor stopped before it started listening");
    };
    info!(%address, %test_id, "Executor started");

    let scheduler = SchedulerClient::new(&config.scheduler)?;
    executor
        .register(&scheduler, &config.executor.advertised_url()?)
        .await
        .context("cannot register with the scheduler")?;

    signal::shutdown().await;
    drain_signal.drain().await;
    server.await??;
    info!("Executor stopped");
    Ok(())
}

async fn search(config: Configuration, test_id: TestId) -> anyhow::Result<()> {
    let scheduler = SchedulerClient::new(&config.scheduler)?;
    let oracle = LdfiOracle::from_options(&config.search);
    let checker = CommandChecker::from_options(&config.search);
    let executor = RemoteExecutor::new(config.executor.advertised_url()?);

    let run_loop = RunLoop::new(
        &scheduler,
        &oracle,
        &checker,
        &executor,
        config.search.clone(),
    );
    match run_loop.search(test_id).await? {
        SearchOutcome::Counterexample {
            run_id,
            faults,
            runs,
            ..
        } => {
            warn!(%test_id, %run_id, ?faults, runs, "Found a counterexample");
            let faults: Vec<_> = faults.iter().map(ToString::to_string).collect();
            println!(
                "counterexample: test {test_id}, run {run_id}, faults [{}]",
                faults.join(", ")
            );
        }
        SearchOutcome::Certified { run_ids, runs, .. } => {
            info!(%test_id, runs, "No counterexample found");
            println!("certified: test {test_id} after {} runs", run_ids.len());
        }
    }
    Ok(())
}
