//! Service control adapter
//!
//! When the supervisor was started by a service manager, it must answer that
//! manager's lifecycle contract: report `StartPending` then `Running`, serve
//! control requests, and report `StopPending` / `Stopped` on the way out. The
//! contract is one capability, [`ServiceHandler::execute`], which consumes a
//! stream of [`ControlRequest`]s and reports through a [`StatusSink`].
//!
//! A [`ServiceDispatcher`] connects a handler to a concrete manager:
//!
//! - [`SystemdDispatcher`]: systemd `Type=notify` services (Unix)
//! - [`ChannelDispatcher`]: in-process, driven through a [`ChannelController`]
//!
//! Outside a service manager nothing in this module is instantiated.

use crate::Result;
use async_trait::async_trait;
use schema::{ControlCommand, ServiceStatus};
use tokio::sync::mpsc;

pub mod adapter;
pub mod channel;
pub mod session;
#[cfg(unix)]
pub mod systemd;

pub use adapter::{AdapterConfig, ServiceAdapter, StopOutcome, QUIT_ACK_TIMEOUT, SETTLE_DELAY};
pub use channel::{channel_dispatcher, ChannelController, ChannelDispatcher};
pub use session::{start_session, ServiceSession};
#[cfg(unix)]
pub use systemd::SystemdDispatcher;

/// A control request from the service manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    /// The command issued
    pub command: ControlCommand,
    /// What the manager believes the current status is
    pub current_status: ServiceStatus,
}

/// Where lifecycle status reports go
pub trait StatusSink: Send + Sync {
    /// Report a status change to the service manager
    fn report(&self, status: ServiceStatus) -> Result<()>;
}

/// The service lifecycle callback contract
#[async_trait]
pub trait ServiceHandler: Send {
    /// Serve the service manager until stopped
    async fn execute(
        &mut self,
        requests: mpsc::Receiver<ControlRequest>,
        status: &dyn StatusSink,
    ) -> StopOutcome;
}

/// Binds a [`ServiceHandler`] to a concrete service manager
#[async_trait]
pub trait ServiceDispatcher: Send + Sync {
    /// Whether this process was launched by the service manager
    fn is_service(&self) -> bool;

    /// Run `handler` as service `name` until it returns
    async fn run(&self, name: &str, handler: &mut dyn ServiceHandler) -> Result<StopOutcome>;
}
