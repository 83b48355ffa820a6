// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt::Display;

use detsys_types::config::{CommonOptions, LogFormat};
use tracing::{info, Level};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload::Handle;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "cannot parse log configuration {} environment variable: {0}",
        EnvFilter::DEFAULT_ENV
    )]
    LogDirectiveParseError(#[from] ParseError),
    #[error("could not install the global subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

fn build_logging_layer<S>(common_opts: &CommonOptions) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    match common_opts.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(
                // Write WARN and ERR to stderr, everything else to stdout
                std::io::stderr
                    .with_max_level(Level::WARN)
                    .or_else(std::io::stdout),
            )
            .with_ansi(!common_opts.log_disable_ansi_codes)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(!common_opts.log_disable_ansi_codes)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(!common_opts.log_disable_ansi_codes)
            .boxed(),
    }
}

/// Instruments the process with logging. The returned [`TracingGuard`] allows changing the log
/// filter at runtime.
///
/// Fails if there is already a global subscriber configured.
pub fn init_tracing_and_logging(
    common_opts: &CommonOptions,
    service_name: impl Display,
) -> Result<TracingGuard, Error> {
    let filter = EnvFilter::try_new(&common_opts.log_filter)?;
    let (filter, reload_handle) = tracing_subscriber::reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(build_logging_layer(common_opts).with_filter(filter))
        .try_init()?;

    info!(service = %service_name, log_format = ?common_opts.log_format, "Logging initialized");

    Ok(TracingGuard { reload_handle })
}

#[derive(Debug)]
pub struct TracingGuard {
    reload_handle: Handle<EnvFilter, Registry>,
}

impl TracingGuard {
    pub fn reload_log_filter(&self, common_opts: &CommonOptions) {
        info!("Setting log filter to '{}'", common_opts.log_filter);
        let _ = &self.reload_handle.modify(|f| {
            let new_filter = EnvFilter::try_new(&common_opts.log_filter);
            match new_filter {
                Ok(new_filter) => {
                    *f = new_filter;
                }
                // don't use logging here, tracing will panic!
                Err(e) => eprintln!("Failed to reload log filter: '{}'", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use detsys_types::config::CommonOptionsBuilder;

    #[test]
    fn every_format_builds_a_layer() {
        for format in [LogFormat::Pretty, LogFormat::Compact, LogFormat::Json] {
            let opts = CommonOptionsBuilder::default()
                .log_format(format)
                .log_disable_ansi_codes(true)
                .build()
                .unwrap();
            let subscriber = tracing_subscriber::registry().with(build_logging_layer(&opts));
            tracing::subscriber::with_default(subscriber, || {
                tracing::info!(component = "frontend", "hello");
            });
        }
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let opts = CommonOptionsBuilder::default()
            .log_filter("frontend=notalevel".to_owned())
            .build()
            .unwrap();
        assert!(matches!(
            init_tracing_and_logging(&opts, "test"),
            Err(Error::LogDirectiveParseError(_))
        ));
    }
}
