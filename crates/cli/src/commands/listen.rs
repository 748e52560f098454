//! `listen` command implementation.

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tracing::{info, warn};

use super::shutdown_signal;
use crate::cli::ListenArgs;

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 65_507;

/// Execute the `listen` command
pub async fn run_listen(args: &ListenArgs) -> Result<()> {
    let socket = UdpSocket::bind(args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;

    info!(bind = %socket.local_addr()?, "Listening for OSC float messages");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut buf = vec![0u8; MAX_DATAGRAM];
    let mut received: u64 = 0;

    while args.count == 0 || received < args.count {
        tokio::select! {
            result = socket.recv_from(&mut buf) => {
                let (len, from) = result.context("Failed to receive datagram")?;
                match dispatcher::decode_float_message(&buf[..len]) {
                    Ok(message) => {
                        received += 1;
                        println!("{} {}", message.address, message.value);
                    }
                    Err(e) => warn!(%from, bytes = len, error = %e, "Ignoring undecodable datagram"),
                }
            }
            _ = &mut shutdown => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    info!(received, "Listener stopped");
    Ok(())
}
