// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::net::SocketAddr;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use http::{Request, Response, StatusCode};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, debug_span, info, Span};

use detsys_types::config::ExecutorOptions;
use detsys_types::marshaler::Marshaler;

use crate::executor::Executor;
use crate::rest_api;

pub type StartSignal = oneshot::Receiver<SocketAddr>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed binding to address '{address}' specified in 'executor.bind-address'")]
    Binding {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("error while running executor http server: {0}")]
    Running(#[source] std::io::Error),
}

/// Serves an [`Executor`] over HTTP until the shutdown watch fires.
pub struct ExecutorService<M: Marshaler> {
    executor: Executor<M>,
    bind_address: SocketAddr,
    concurrency_limit: usize,
    max_request_body_bytes: usize,
    start_signal_tx: oneshot::Sender<SocketAddr>,
}

impl<M: Marshaler> ExecutorService<M> {
    pub fn new(executor: Executor<M>, opts: &ExecutorOptions) -> (Self, StartSignal) {
        let (start_signal_tx, start_signal_rx) = oneshot::channel();
        let service = Self {
            executor,
            bind_address: opts.bind_address,
            concurrency_limit: opts.concurrent_requests_limit,
            max_request_body_bytes: opts.max_request_body_bytes,
            start_signal_tx,
        };
        (service, start_signal_rx)
    }

    pub async fn run(self, drain: drain::Watch) -> Result<(), Error> {
        let ExecutorService {
            executor,
            bind_address,
            concurrency_limit,
            max_request_body_bytes,
            start_signal_tx,
        } = self;

        let router = rest_api::create_router(executor)
            .layer(DefaultBodyLimit::max(max_request_body_bytes))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(|_| async {
                        StatusCode::TOO_MANY_REQUESTS
                    }))
                    .layer(tower::load_shed::LoadShedLayer::new())
                    .layer(tower::limit::GlobalConcurrencyLimitLayer::new(
                        concurrency_limit,
                    )),
            )
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &Request<_>| {
                        debug_span!(
                            "executor-request",
                            http.request.method = %request.method(),
                            url.path = request.uri().path(),
                        )
                    })
                    .on_request(())
                    .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                        debug!(
                            parent: span,
                            http.response.status_code = response.status().as_u16(),
                            http.response.latency = ?latency,
                            "Replied"
                        )
                    }),
            );

        let listener = TcpListener::bind(bind_address)
            .await
            .map_err(|source| Error::Binding {
                address: bind_address,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| Error::Binding {
            address: bind_address,
            source,
        })?;

        info!(
            server.address = %local_addr.ip(),
            server.port = %local_addr.port(),
            "Executor listening"
        );
        let _ = start_signal_tx.send(local_addr);

        // The release handle is parked until the server has finished in-flight requests.
        let (release_tx, release_rx) = oneshot::channel();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let release = drain.signaled().await;
                let _ = release_tx.send(release);
            })
            .await
            .map_err(Error::Running)?;
        drop(release_rx);

        info!("Executor stopped");
        Ok(())
    }
}
