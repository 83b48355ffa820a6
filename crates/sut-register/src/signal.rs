// Copyright (c) 2023 - 2025 Restate Software, Inc., Restate GmbH.
// All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

#[cfg(unix)]
mod platform {
    use tokio::signal::unix::{signal, SignalKind};
    use tracing::{info, warn};

    pub async fn shutdown() -> &'static str {
        let signal = tokio::select! {
            () = await_signal(SignalKind::interrupt()) => "SIGINT",
            () = await_signal(SignalKind::terminate()) => "SIGTERM"
        };

        info!(%signal, "Received signal, starting shutdown.");
        signal
    }

    async fn await_signal(kind: SignalKind) {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(%err, ?kind, "Cannot listen for signal");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use tracing::{info, warn};

    pub async fn shutdown() -> &'static str {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "Cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("Received ctrl-c, starting shutdown.");
        "ctrl-c"
    }
}

pub use platform::shutdown;
