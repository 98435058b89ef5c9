use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, instrument, warn};

use crate::core::codec::WireCodec;
use crate::core::packet::Packet;
use crate::error::{ProtocolError, Result};

/// Connect to a service's Unix domain socket.
///
/// Failure to reach the endpoint is reported as `ProtocolError::Connect`.
pub async fn connect(path: &Path) -> Result<UnixStream> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| ProtocolError::Connect {
            endpoint: path.to_path_buf(),
            source,
        })?;
    debug!(endpoint = %path.display(), "Connected");
    Ok(stream)
}

/// Answer framed requests on a Unix socket until `shutdown_rx` fires.
///
/// Each request payload is passed to `handler` and its return value is sent
/// back under the request's sequence id. This is a stand-in peer for tests
/// and tools; it has no notion of what the payloads mean.
#[instrument(skip(path, handler, shutdown_rx), fields(socket_path = %path.as_ref().display()))]
pub async fn serve_with_shutdown<P, H>(
    path: P,
    handler: H,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()>
where
    P: AsRef<Path>,
    H: Fn(Bytes) -> Bytes + Send + Sync + 'static,
{
    if path.as_ref().exists() {
        tokio::fs::remove_file(&path).await.ok();
    }

    let path_buf: PathBuf = path.as_ref().to_path_buf();

    let listener = UnixListener::bind(&path_buf)?;
    info!(path = %path_buf.display(), "Listening on unix socket");

    let handler = Arc::new(handler);
    let active_connections = Arc::new(Mutex::new(0u32));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down. Waiting for connections to close...");

                let timeout = tokio::time::sleep(Duration::from_secs(5));
                tokio::pin!(timeout);

                loop {
                    tokio::select! {
                        _ = &mut timeout => {
                            warn!("Shutdown timeout reached, forcing exit");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(50)) => {
                            if *active_connections.lock().await == 0 {
                                break;
                            }
                        }
                    }
                }

                if path_buf.exists() {
                    if let Err(e) = tokio::fs::remove_file(&path_buf).await {
                        error!(error = %e, path = %path_buf.display(), "Failed to remove socket file");
                    }
                }

                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let active_connections = active_connections.clone();
                        let handler = handler.clone();

                        *active_connections.lock().await += 1;

                        tokio::spawn(async move {
                            let mut framed = Framed::new(stream, WireCodec::default());

                            while let Some(next) = framed.next().await {
                                let request = match next {
                                    Ok(request) => request,
                                    Err(e) => {
                                        warn!(error = %e, "Dropping connection");
                                        break;
                                    }
                                };
                                debug!(
                                    sequence_id = request.sequence_id,
                                    len = request.payload.len(),
                                    "Request received"
                                );
                                let reply = Packet::new(request.sequence_id, handler(request.payload));
                                if framed.send(reply).await.is_err() {
                                    break;
                                }
                            }

                            *active_connections.lock().await -= 1;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}
