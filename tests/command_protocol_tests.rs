// Integration tests for the TCP command boundary
//
// A real listener on an ephemeral port, a scripted capture factory behind the
// controller, and a plain TcpStream as the client.

use anyhow::Result;
use duplex_recorder::{
    server, NativeFormat, PipelineConfig, RecordingController, Script, ScriptedFactory,
    SessionConfig,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const MONO_16K: NativeFormat = NativeFormat {
    sample_rate: 16000,
    bits_per_sample: 16,
    channels: 1,
};

async fn spawn_server(dir: &Path) -> Result<(std::net::SocketAddr, tokio::task::JoinHandle<Result<()>>)> {
    let config = SessionConfig {
        recordings_dir: dir.to_path_buf(),
        grace_interval: Duration::from_millis(50),
        padding_threshold: Duration::from_millis(50),
        pipeline: PipelineConfig {
            target: MONO_16K,
            fallback_silence_ms: 1000,
            default_output_dir: dir.to_path_buf(),
        },
    };
    let controller = Arc::new(RecordingController::new(
        config,
        Arc::new(ScriptedFactory {
            format: MONO_16K,
            system: Some(Script::burst(10, 1600, 900)),
            microphone: Some(Script::burst(10, 1600, 400)),
        }),
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(server::run(listener, controller));
    Ok((addr, handle))
}

async fn send(socket: &mut TcpStream, command: &str) -> Result<String> {
    socket.write_all(command.as_bytes()).await?;
    let mut buf = [0u8; 256];
    let n = socket.read(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
}

#[tokio::test]
async fn test_full_command_cycle() -> Result<()> {
    let temp = TempDir::new()?;
    let (addr, server_handle) = spawn_server(temp.path()).await?;

    let mut socket = TcpStream::connect(addr).await?;

    assert_eq!(send(&mut socket, "START_RECORDING").await?, "RECORDING_STARTED");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let out = temp.path().join("session.wav");
    let stop = format!("STOP_RECORDING:{}", out.display());
    assert_eq!(send(&mut socket, &stop).await?, "RECORDING_STOPPED");
    assert!(out.exists(), "stop must leave the mixed file behind");

    assert_eq!(send(&mut socket, "EXIT").await?, "SERVER_STOPPING");

    // EXIT brings the accept loop down
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn test_unknown_command_reply() -> Result<()> {
    let temp = TempDir::new()?;
    let (addr, server_handle) = spawn_server(temp.path()).await?;

    let mut socket = TcpStream::connect(addr).await?;
    assert_eq!(send(&mut socket, "MAKE_COFFEE").await?, "UNKNOWN_COMMAND");
    assert_eq!(send(&mut socket, "QUIT").await?, "SERVER_STOPPING");

    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn test_stop_while_idle_still_acknowledges() -> Result<()> {
    let temp = TempDir::new()?;
    let (addr, server_handle) = spawn_server(temp.path()).await?;

    let mut socket = TcpStream::connect(addr).await?;

    // Protocol always answers with a definite status, active session or not
    assert_eq!(send(&mut socket, "STOP_RECORDING").await?, "RECORDING_STOPPED");
    assert_eq!(
        std::fs::read_dir(temp.path())?.count(),
        0,
        "an idle stop creates no files"
    );

    assert_eq!(send(&mut socket, "EXIT").await?, "SERVER_STOPPING");
    server_handle.await??;
    Ok(())
}

#[tokio::test]
async fn test_start_path_argument_with_colons() -> Result<()> {
    let temp = TempDir::new()?;
    let (addr, server_handle) = spawn_server(temp.path()).await?;

    let mut socket = TcpStream::connect(addr).await?;

    // Only the first ':' separates command from path
    let nested = temp.path().join("a:b").join("out.wav");
    let start = format!("START_RECORDING:{}", nested.display());
    assert_eq!(send(&mut socket, &start).await?, "RECORDING_STARTED");
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(send(&mut socket, "STOP_RECORDING").await?, "RECORDING_STOPPED");
    assert!(nested.exists(), "colon-bearing path should be honored verbatim");

    assert_eq!(send(&mut socket, "EXIT").await?, "SERVER_STOPPING");
    server_handle.await??;
    Ok(())
}
