//! Embedded coordination service for high-availability mode.
//!
//! A single ensemble member listening on an ephemeral loopback port. The
//! cluster discovers it through the `host:port` quorum address the harness
//! records at startup; reachability is verified with a line-oriented
//! liveness probe (`PING` -> `PONG`) before the cluster is constructed.

use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::Result;
use crate::ShutdownError;
use crate::StartupError;


pub(crate) const PROBE_REQUEST: &str = "PING";
pub(crate) const PROBE_RESPONSE: &str = "PONG";

/// An embedded coordination-service ensemble member.
///
/// Owned by the harness only when HA mode is active. Fully initialized once
/// `start()` returns: the quorum address is known and the accept loop is
/// serving probes.
pub struct CoordinationService {
    address: SocketAddr,
    shutdown_tx: watch::Sender<()>,
    accept_handle: JoinHandle<()>,
}

impl CoordinationService {
    /// Launches the ensemble member on an ephemeral loopback port and waits
    /// for it to become ready (bound, accept loop running).
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .map_err(StartupError::CoordinationService)?;
        let address = listener
            .local_addr()
            .map_err(StartupError::CoordinationService)?;

        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        let accept_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        debug!("Coordination service accept loop exiting.");
                        break;
                    }
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!("Coordination service accepted probe connection from {peer}.");
                            tokio::spawn(serve_probes(stream));
                        }
                        Err(e) => {
                            warn!("Coordination service accept failed: {e}");
                        }
                    }
                }
            }
        });

        info!("Coordination service started on {}.", address);
        Ok(Self {
            address,
            shutdown_tx,
            accept_handle,
        })
    }

    /// Quorum address (`host:port`) clients use to discover the ensemble.
    pub fn quorum(&self) -> String {
        self.address.to_string()
    }

    /// Shuts the ensemble member down. Errors are surfaced, not swallowed.
    pub async fn stop(self) -> Result<()> {
        info!("Stopping coordination service on {}.", self.address);
        let _ = self.shutdown_tx.send(());
        self.accept_handle
            .await
            .map_err(|e| ShutdownError::CoordinationStop(e.to_string()))?;
        Ok(())
    }
}

/// Answers the configured quorum with the liveness probe.
///
/// Returns `false` when the endpoint cannot be reached, does not speak the
/// probe protocol, or does not answer within `timeout`.
pub(crate) async fn probe_quorum(
    quorum: &str,
    timeout: Duration,
) -> bool {
    let attempt = async {
        let stream = TcpStream::connect(quorum).await.ok()?;
        let (reader, mut writer) = stream.into_split();
        writer
            .write_all(format!("{PROBE_REQUEST}\n").as_bytes())
            .await
            .ok()?;
        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.ok()?;
        Some(line.trim() == PROBE_RESPONSE)
    };

    match time::timeout(timeout, attempt).await {
        Ok(Some(answered)) => answered,
        _ => false,
    }
}

async fn serve_probes(stream: TcpStream) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let reply = if line.trim() == PROBE_REQUEST {
            PROBE_RESPONSE
        } else {
            "ERR"
        };
        if writer.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
            break;
        }
    }
}
