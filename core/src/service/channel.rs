//! In-process service manager
//!
//! [`ChannelDispatcher`] stands in for an operating-system service manager:
//! the paired [`ChannelController`] issues control requests and observes the
//! status reports. Used by tests and by embedders that host the supervisor
//! inside their own manager.

use super::{ControlRequest, ServiceDispatcher, ServiceHandler, StatusSink, StopOutcome};
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{ControlCommand, ServiceState, ServiceStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Create a connected dispatcher/controller pair
///
/// `capacity` bounds the number of queued control requests.
pub fn channel_dispatcher(capacity: usize) -> (ChannelDispatcher, ChannelController) {
    let (request_tx, request_rx) = mpsc::channel(capacity.max(1));
    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let current = Arc::new(Mutex::new(ServiceStatus::new(ServiceState::Stopped)));

    let dispatcher = ChannelDispatcher {
        requests: Mutex::new(Some(request_rx)),
        sink: ChannelStatusSink {
            tx: status_tx,
            current: current.clone(),
        },
    };
    let controller = ChannelController {
        requests: request_tx,
        statuses: status_rx,
        current,
    };
    (dispatcher, controller)
}

/// Dispatcher half of [`channel_dispatcher`]
#[derive(Debug)]
pub struct ChannelDispatcher {
    requests: Mutex<Option<mpsc::Receiver<ControlRequest>>>,
    sink: ChannelStatusSink,
}

#[derive(Debug, Clone)]
struct ChannelStatusSink {
    tx: mpsc::UnboundedSender<ServiceStatus>,
    current: Arc<Mutex<ServiceStatus>>,
}

impl StatusSink for ChannelStatusSink {
    fn report(&self, status: ServiceStatus) -> Result<()> {
        if let Ok(mut current) = self.current.lock() {
            *current = status;
        }
        // A dropped controller is not an error for the service
        let _ = self.tx.send(status);
        Ok(())
    }
}

#[async_trait]
impl ServiceDispatcher for ChannelDispatcher {
    fn is_service(&self) -> bool {
        true
    }

    async fn run(&self, name: &str, handler: &mut dyn ServiceHandler) -> Result<StopOutcome> {
        let requests = self
            .requests
            .lock()
            .map_err(|_| CoreError::ServiceError("dispatcher state poisoned".into()))?
            .take()
            .ok_or_else(|| {
                CoreError::ServiceError(format!("service '{}' is already dispatched", name))
            })?;
        Ok(handler.execute(requests, &self.sink).await)
    }
}

/// Controller half of [`channel_dispatcher`]
#[derive(Debug)]
pub struct ChannelController {
    requests: mpsc::Sender<ControlRequest>,
    statuses: mpsc::UnboundedReceiver<ServiceStatus>,
    current: Arc<Mutex<ServiceStatus>>,
}

impl ChannelController {
    /// Issue a control command, tagged with the last reported status
    pub async fn send(&self, command: ControlCommand) -> Result<()> {
        let request = ControlRequest {
            command,
            current_status: self.current_status(),
        };
        self.requests
            .send(request)
            .await
            .map_err(|_| CoreError::ServiceError("service is no longer serving requests".into()))
    }

    /// Most recent status reported by the service
    pub fn current_status(&self) -> ServiceStatus {
        self.current
            .lock()
            .map(|s| *s)
            .unwrap_or_else(|p| *p.into_inner())
    }

    /// Next status report, in order; `None` once the service is gone
    pub async fn next_status(&mut self) -> Option<ServiceStatus> {
        self.statuses.recv().await
    }

    /// Wait until `state` is reported, skipping earlier reports
    ///
    /// Returns `false` on timeout or when the service goes away first.
    pub async fn wait_for(&mut self, state: ServiceState, timeout: Duration) -> bool {
        let wait = async {
            while let Some(status) = self.statuses.recv().await {
                if status.state == state {
                    return true;
                }
            }
            false
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }

    /// Close the request stream; the service treats this as Stop
    pub fn close(self) -> mpsc::UnboundedReceiver<ServiceStatus> {
        self.statuses
    }
}
