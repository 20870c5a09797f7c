//! UDP command server: one datagram in, one response datagram out.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::context::AppContext;
use crate::protocol;
use crate::shutdown::ShutdownSignal;

/// Largest command datagram accepted
pub const MAX_DATAGRAM: usize = 1024;

/// Serve commands until cancelled
pub async fn serve_commands(ctx: Arc<AppContext>, socket: UdpSocket, signal: ShutdownSignal) {
    match socket.local_addr() {
        Ok(addr) => tracing::info!(%addr, "[CommandServer] Listening"),
        Err(e) => tracing::warn!(error = %e, "[CommandServer] Listening on unknown address"),
    }

    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let received = tokio::select! {
            _ = signal.triggered() => None,
            received = socket.recv_from(&mut buf) => Some(received),
        };
        let (len, peer) = match received {
            None => break,
            Some(Ok(datagram)) => datagram,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "[CommandServer] Receive error");
                if !signal.sleep(Duration::from_secs(1)).await {
                    break;
                }
                continue;
            }
        };

        let raw = String::from_utf8_lossy(&buf[..len]).into_owned();
        tracing::info!(%peer, command = %raw.trim(), "[CommandServer] Processing command");

        let response = protocol::execute(&ctx, &raw).await.to_string();
        if let Err(e) = socket.send_to(response.as_bytes(), peer).await {
            tracing::warn!(%peer, error = %e, "[CommandServer] Failed to send response");
        }
    }

    tracing::info!("[CommandServer] Stopped");
}
