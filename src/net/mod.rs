// Network module - the tasks that run the device
//
// Three loops share one ShutdownSignal:
// 1. sampler: back-to-back RMS measurements (drives stability and recognition)
// 2. server: UDP command socket
// 3. telemetry: periodic UDP broadcast of the latest reading

pub mod sampler;
pub mod server;
pub mod telemetry;

pub use sampler::run_sampler;
pub use server::{serve_commands, MAX_DATAGRAM};
pub use telemetry::{broadcast_telemetry, build_packet};

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::context::AppContext;
use crate::shutdown::ShutdownSignal;

/// Running device tasks
pub struct Service {
    signal: ShutdownSignal,
    tasks: Vec<JoinHandle<()>>,
    command_addr: SocketAddr,
}

impl Service {
    /// Bind both sockets and spawn the sampler, command server and broadcaster
    ///
    /// # Errors
    /// Socket bind failures, or a telemetry target that is not an IP address.
    pub async fn start(ctx: Arc<AppContext>) -> io::Result<Self> {
        let network = ctx.config().network.clone();
        let target_ip: IpAddr = network.telemetry_target.parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid telemetry target {:?}: {}", network.telemetry_target, e),
            )
        })?;
        let target = SocketAddr::new(target_ip, network.telemetry_port);

        let command_socket = UdpSocket::bind(("0.0.0.0", network.command_port)).await?;
        let command_addr = command_socket.local_addr()?;
        let telemetry_socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        telemetry_socket.set_broadcast(true)?;

        let signal = ShutdownSignal::new();
        let tasks = vec![
            tokio::spawn(run_sampler(Arc::clone(&ctx), signal.clone())),
            tokio::spawn(serve_commands(
                Arc::clone(&ctx),
                command_socket,
                signal.clone(),
            )),
            tokio::spawn(broadcast_telemetry(ctx, telemetry_socket, target, signal.clone())),
        ];

        tracing::info!(%command_addr, %target, "[Service] Started");
        Ok(Self {
            signal,
            tasks,
            command_addr,
        })
    }

    pub fn command_addr(&self) -> SocketAddr {
        self.command_addr
    }

    pub fn signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Cancel every task and wait for them to exit
    pub async fn shutdown(self) {
        self.signal.trigger();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "[Service] Task ended abnormally");
            }
        }
        tracing::info!("[Service] Stopped");
    }
}
