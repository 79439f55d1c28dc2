use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::command::{reply, Command};
use crate::session::RecordingController;

/// Run the command server until an EXIT command arrives.
///
/// One spawned task per connection; commands are dispatched to the controller
/// and answered with plain ASCII reply tokens. The protocol always answers
/// with a definite status string; degraded outcomes surface in the produced
/// files and the logs, not on the wire.
pub async fn run(listener: TcpListener, controller: Arc<RecordingController>) -> Result<()> {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    if let Ok(addr) = listener.local_addr() {
        info!("Recording server listening on {}", addr);
    }

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                info!("Client connected: {}", peer);
                let controller = Arc::clone(&controller);
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(socket, controller, shutdown_tx).await {
                        warn!("Client {} connection error: {}", peer, e);
                    }
                });
            }
        }
    }

    // EXIT already stopped the session, but a shutdown must never leave
    // devices held regardless of which path got here
    controller.stop(None).await?;
    info!("Recording server shut down");
    Ok(())
}

/// Serve one connection: one command per delivered message, one reply each.
async fn handle_client(
    mut socket: TcpStream,
    controller: Arc<RecordingController>,
    shutdown_tx: watch::Sender<bool>,
) -> Result<()> {
    let mut buf = [0u8; 1024];

    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        let text = String::from_utf8_lossy(&buf[..n]);
        let command = Command::parse(&text);
        info!("Received command: {:?}", command);

        let reply = dispatch(&command, &controller).await;
        socket.write_all(reply.as_bytes()).await?;

        if command == Command::Exit {
            // Reply is on the wire; now bring the whole server down
            let _ = shutdown_tx.send(true);
            break;
        }
    }

    Ok(())
}

async fn dispatch(command: &Command, controller: &RecordingController) -> &'static str {
    match command {
        Command::Start { path } => {
            let requested = path.as_ref().map(PathBuf::from);
            if let Err(e) = controller.start(requested).await {
                error!("Failed to start recording: {:#}", e);
            }
            reply::RECORDING_STARTED
        }
        Command::Stop { path } => {
            let final_path = path.as_ref().map(PathBuf::from);
            match controller.stop(final_path).await {
                Ok(Some(result)) => {
                    info!(
                        "Recording stopped: {:?} (succeeded={})",
                        result.mixed_path, result.succeeded
                    );
                }
                Ok(None) => {}
                Err(e) => error!("Failed to stop recording: {:#}", e),
            }
            reply::RECORDING_STOPPED
        }
        Command::Exit => {
            if let Err(e) = controller.stop(None).await {
                error!("Failed to stop recording on exit: {:#}", e);
            }
            reply::SERVER_STOPPING
        }
        Command::Unknown => reply::UNKNOWN_COMMAND,
    }
}
