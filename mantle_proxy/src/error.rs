// Copyright 2026 the Mantle Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors from proxy start-up and shutdown.
//!
//! Steady-state pipeline calls never fail: aborts are values and invariant
//! violations are assertions.

use thiserror::Error;

/// Failure to start, drain, or stop a proxy's consumer side.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The consumer thread could not be spawned.
    #[error("failed to spawn the consumer thread")]
    Spawn(#[source] std::io::Error),
    /// The consumer thread went away before answering.
    #[error("the consumer thread exited unexpectedly")]
    ConsumerGone,
    /// The consumer thread panicked.
    #[error("the consumer thread panicked")]
    ConsumerPanicked,
    /// The proxy was already stopped.
    #[error("the proxy has been stopped")]
    Stopped,
}
