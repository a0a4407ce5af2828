//! Listener loop: binds a TCP port, accepts connections, and runs one
//! session task per connection up to a configured cap.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use filedepot_checkpoint::CheckpointStore;
use filedepot_storage::FileArea;

use crate::ServerError;
use crate::session::Session;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Root of the file area.
    pub root: PathBuf,
    /// Backing file for the shared checkpoint store.
    pub checkpoint_path: PathBuf,
    /// How long a session may sit idle between commands before it is
    /// treated as closed.
    pub idle_timeout: Duration,
    /// Maximum concurrent sessions; further connections are dropped.
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 0,
            root: PathBuf::from("uploaded"),
            // Kept outside the file area so LIST never reports it.
            checkpoint_path: PathBuf::from("checkpoints.json"),
            idle_timeout: Duration::from_secs(300),
            max_sessions: 64,
        }
    }
}

/// The filedepot TCP server.
pub struct FileServer {
    config: ServerConfig,
    area: Arc<FileArea>,
    checkpoints: Arc<CheckpointStore>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
    session_permits: Arc<Semaphore>,
}

impl FileServer {
    /// Creates a server, opening the file area and checkpoint store.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, ServerError> {
        let area = Arc::new(FileArea::new(&config.root)?);
        let checkpoints = Arc::new(CheckpointStore::open(&config.checkpoint_path)?);
        let session_permits = Arc::new(Semaphore::new(config.max_sessions));
        Ok(Arc::new(Self {
            config,
            area,
            checkpoints,
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
            session_permits,
        }))
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Gracefully shuts down the server.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the accept loop until cancellation.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let addr: SocketAddr = ([127, 0, 0, 1], self.config.port).into();
        let listener = TcpListener::bind(addr).await?;

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!("file server listening on {local_addr}");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let permit = match Arc::clone(&self.session_permits)
                                .try_acquire_owned()
                            {
                                Ok(p) => p,
                                Err(_) => {
                                    tracing::warn!(
                                        %peer_addr,
                                        "session limit reached, dropping connection"
                                    );
                                    continue;
                                }
                            };

                            let session = Session::new(
                                peer_addr,
                                Arc::clone(&self.area),
                                Arc::clone(&self.checkpoints),
                                self.config.idle_timeout,
                            );
                            let cancel = self.cancel.clone();
                            tokio::spawn(async move {
                                tokio::select! {
                                    _ = cancel.cancelled() => {}
                                    _ = session.run(stream) => {}
                                }
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }
}
