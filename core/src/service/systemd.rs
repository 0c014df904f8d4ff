//! systemd `Type=notify` integration
//!
//! Status reports go out as `sd_notify` datagrams on `$NOTIFY_SOCKET`.
//! systemd has no control-request channel of its own, so control requests are
//! mapped from signals:
//!
//! | signal    | request      |
//! |-----------|--------------|
//! | `SIGTERM` | Stop         |
//! | `SIGUSR1` | Pause        |
//! | `SIGUSR2` | Continue     |
//! | `SIGHUP`  | Interrogate  |

use super::{ControlRequest, ServiceDispatcher, ServiceHandler, StatusSink, StopOutcome};
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{ControlCommand, ServiceState, ServiceStatus};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Environment variable systemd sets for notify services
pub const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

/// Dispatcher for services managed by systemd
#[derive(Debug, Clone, Default)]
pub struct SystemdDispatcher {
    notify_socket: Option<PathBuf>,
}

impl SystemdDispatcher {
    /// Detect systemd from `$NOTIFY_SOCKET`
    pub fn from_env() -> Self {
        Self::new(std::env::var_os(NOTIFY_SOCKET_ENV).map(PathBuf::from))
    }

    /// Use an explicit notify socket; an empty path means "not a service"
    pub fn new(notify_socket: Option<PathBuf>) -> Self {
        Self {
            notify_socket: notify_socket.filter(|p| !p.as_os_str().is_empty()),
        }
    }

    /// The notify socket address, if running under systemd
    pub fn notify_socket(&self) -> Option<&Path> {
        self.notify_socket.as_deref()
    }
}

#[async_trait]
impl ServiceDispatcher for SystemdDispatcher {
    fn is_service(&self) -> bool {
        self.notify_socket.is_some()
    }

    async fn run(&self, name: &str, handler: &mut dyn ServiceHandler) -> Result<StopOutcome> {
        let socket = self.notify_socket.as_deref().ok_or_else(|| {
            CoreError::ServiceError(format!("{} is not set", NOTIFY_SOCKET_ENV))
        })?;
        let sink = NotifySink::connect(socket)?;
        let mut control = ControlSignals::register()?;

        let (tx, rx) = mpsc::channel(8);
        let current = sink.current.clone();
        let pump = tokio::spawn(async move {
            loop {
                let command = control.recv().await;
                let current_status = current.lock().map(|s| *s).unwrap_or_else(|p| *p.into_inner());
                debug!(command = %command, "Control request from signal");
                let request = ControlRequest {
                    command,
                    current_status,
                };
                if tx.send(request).await.is_err() {
                    break;
                }
            }
        });

        info!(service = %name, socket = %socket.display(), "Dispatching as systemd service");
        let outcome = handler.execute(rx, &sink).await;
        pump.abort();
        Ok(outcome)
    }
}

/// The `sd_notify` payload for a status report
pub fn notify_message(status: &ServiceStatus) -> String {
    match status.state {
        ServiceState::StartPending => "STATUS=Starting".to_string(),
        ServiceState::Running => "READY=1\nSTATUS=Running".to_string(),
        ServiceState::PausePending | ServiceState::Paused => "STATUS=Paused".to_string(),
        ServiceState::ContinuePending => "STATUS=Continuing".to_string(),
        ServiceState::StopPending => "STOPPING=1\nSTATUS=Stopping".to_string(),
        ServiceState::Stopped => "STATUS=Stopped".to_string(),
    }
}

struct NotifySink {
    socket: UnixDatagram,
    current: Arc<Mutex<ServiceStatus>>,
}

impl NotifySink {
    fn connect(addr: &Path) -> Result<Self> {
        let socket = UnixDatagram::unbound()?;
        match addr.as_os_str().as_bytes().strip_prefix(b"@") {
            Some(name) => connect_abstract(&socket, name)?,
            None => socket.connect(addr).map_err(|e| {
                CoreError::ServiceError(format!(
                    "connect notify socket '{}': {}",
                    addr.display(),
                    e
                ))
            })?,
        }
        Ok(Self {
            socket,
            current: Arc::new(Mutex::new(ServiceStatus::new(ServiceState::Stopped))),
        })
    }
}

#[cfg(target_os = "linux")]
fn connect_abstract(socket: &UnixDatagram, name: &[u8]) -> Result<()> {
    use std::os::linux::net::SocketAddrExt;
    use std::os::unix::net::SocketAddr;

    let addr = SocketAddr::from_abstract_name(name)?;
    socket
        .connect_addr(&addr)
        .map_err(|e| CoreError::ServiceError(format!("connect abstract notify socket: {}", e)))
}

#[cfg(not(target_os = "linux"))]
fn connect_abstract(_socket: &UnixDatagram, _name: &[u8]) -> Result<()> {
    Err(CoreError::ServiceError(
        "abstract notify sockets are only supported on Linux".into(),
    ))
}

impl StatusSink for NotifySink {
    fn report(&self, status: ServiceStatus) -> Result<()> {
        if let Ok(mut current) = self.current.lock() {
            *current = status;
        }
        self.socket
            .send(notify_message(&status).as_bytes())
            .map_err(|e| CoreError::ServiceError(format!("sd_notify: {}", e)))?;
        Ok(())
    }
}

struct ControlSignals {
    stop: Signal,
    pause: Signal,
    resume: Signal,
    interrogate: Signal,
}

impl ControlSignals {
    fn register() -> Result<Self> {
        let install = |kind: SignalKind, label: &str| {
            signal(kind).map_err(|e| {
                CoreError::ServiceError(format!("install {} handler: {}", label, e))
            })
        };
        Ok(Self {
            stop: install(SignalKind::terminate(), "SIGTERM")?,
            pause: install(SignalKind::user_defined1(), "SIGUSR1")?,
            resume: install(SignalKind::user_defined2(), "SIGUSR2")?,
            interrogate: install(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    async fn recv(&mut self) -> ControlCommand {
        tokio::select! {
            Some(()) = self.stop.recv() => ControlCommand::Stop,
            Some(()) = self.pause.recv() => ControlCommand::Pause,
            Some(()) = self.resume.recv() => ControlCommand::Continue,
            Some(()) = self.interrogate.recv() => ControlCommand::Interrogate,
            else => std::future::pending().await,
        }
    }
}
