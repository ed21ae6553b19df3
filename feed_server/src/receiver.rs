//! TCP accept loop of the feed server.
use crate::service::FeedService;
use feed_common::Result;
use log::{debug, error, info};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread;

/// TCP listener accepting feed clients.
///
/// Every accepted connection is served on its own thread by
/// `FeedService::handle_connection`; a failing client is logged and does not
/// affect the accept loop or other clients.
pub struct FeedListener {
    /// The underlying TCP listening socket.
    pub(crate) socket: TcpListener,
}

impl FeedListener {
    /// Bind a new listener to `bind_addr` (e.g., `0.0.0.0:8080`).
    pub fn bind(bind_addr: &str) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr)?;
        Ok(Self { socket })
    }

    /// Address actually bound, useful with port `0`.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocking accept loop.
    pub fn run(self, service: Arc<FeedService>) -> Result<()> {
        info!("Feed server is listening on {}", self.socket.local_addr()?);

        for stream in self.socket.incoming() {
            match stream {
                Ok(stream) => {
                    let peer = stream
                        .peer_addr()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|_| "unknown".into());
                    debug!("Accepted {}", peer);

                    let service = Arc::clone(&service);
                    let spawned = thread::Builder::new()
                        .name(format!("client-{}", peer))
                        .spawn(move || {
                            if let Err(e) = service.handle_connection(stream) {
                                error!("Connection {} failed: {}", peer, e);
                            }
                        });
                    if let Err(e) = spawned {
                        error!("Could not spawn a connection thread: {}", e);
                    }
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        Ok(())
    }
}
