use std::net::Ipv4Addr;
use std::net::TcpListener;

use tracing::info;

use crate::Result;
use crate::StartupError;

/// Returns an ephemeral port that was available when the method was called.
///
/// Binds a listener on port 0, reads back the OS-assigned port and releases
/// the bind on return. The port may be reclaimed by another process between
/// release and actual use by the cluster; callers accept that window as a
/// documented limitation.
pub fn acquire_available_port() -> Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .map_err(StartupError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(StartupError::PortAllocation)?
        .port();
    info!("Allocated ephemeral port {}.", port);
    Ok(port)
}
