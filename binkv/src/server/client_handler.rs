use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, error};

use super::handler;
use crate::memcache::store as storage;
use crate::protocol::binary::connection::MemcacheBinaryConnection;
use crate::protocol::binary::decoder::BinaryRequest;
use crate::protocol::binary::encoder::BinaryResponse;

pub struct ClientConfig {
    pub(crate) item_size_limit: u32,
    pub(crate) rx_timeout_secs: u32,
}

pub struct Client {
    stream: MemcacheBinaryConnection,
    addr: SocketAddr,
    config: ClientConfig,
    handler: handler::BinaryHandler,
    /// Max connection semaphore.
    ///
    /// When the handler is dropped, a permit is returned to this semaphore. If
    /// the listener is waiting for connections to close, it will be notified of
    /// the newly available permit and resume accepting connections.
    limit_connections: Arc<Semaphore>,
}

impl Client {
    pub fn new(
        store: Arc<storage::MemcStore>,
        socket: TcpStream,
        addr: SocketAddr,
        config: ClientConfig,
        limit_connections: Arc<Semaphore>,
    ) -> Self {
        Client {
            stream: MemcacheBinaryConnection::new(socket, config.item_size_limit),
            addr,
            config,
            handler: handler::BinaryHandler::new(store),
            limit_connections,
        }
    }

    pub async fn handle(&mut self) {
        debug!("New client connected: {}", self.addr);

        loop {
            match timeout(
                Duration::from_secs(self.config.rx_timeout_secs as u64),
                self.stream.read_frame(),
            )
            .await
            {
                Ok(req_or_none) => {
                    let client_close = self.handle_frame(req_or_none).await;
                    if client_close {
                        return;
                    }
                }
                Err(err) => {
                    debug!(
                        "Timeout {}s elapsed, disconnecting client: {}, error: {}",
                        self.config.rx_timeout_secs, self.addr, err
                    );
                    return;
                }
            }
        }
    }

    async fn handle_frame(&mut self, req: Result<Option<BinaryRequest>, io::Error>) -> bool {
        match req {
            Ok(re) => {
                match re {
                    Some(request) => self.handle_request(request).await,
                    None => {
                        // clean shutdown, the peer closed between frames
                        debug!("Connection closed: {}", self.addr);
                        true
                    }
                }
            }
            Err(err) => {
                // framing errors leave the stream unusable, close without
                // a response
                error!("Error when reading frame; error = {:?}", err);
                true
            }
        }
    }

    /// Handles a single binary request.
    /// Returns true if we should leave the client receive loop.
    async fn handle_request(&mut self, request: BinaryRequest) -> bool {
        debug!("Got request {:?}", request.get_header());

        let resp = self.handler.handle_request(request);
        match resp {
            Some(response) => {
                let mut socket_close = false;
                if let BinaryResponse::Quit(_resp) = &response {
                    socket_close = true;
                }

                debug!("Sending response {:?}", response);
                if let Err(e) = self.stream.write(&response).await {
                    error!("error on sending response; error = {:?}", e);
                    return true;
                }

                if socket_close {
                    debug!("Closing client socket quit command");
                    if let Err(_e) = self.stream.shutdown().await.map_err(log_error) {}
                    return true;
                }
                false
            }
            None => false,
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Add a permit back to the semaphore.
        //
        // Doing so unblocks the listener if the max number of
        // connections has been reached.
        //
        // This is done in a `Drop` implementation in order to guarantee that
        // the permit is added even if the task handling the connection panics.
        self.limit_connections.add_permits(1);
    }
}

fn log_error(e: io::Error) {
    // in most cases its not an error
    // the client may just drop the connection
    if e.kind() == io::ErrorKind::NotConnected {
        info!("Error: {}", e);
    } else {
        error!("Error: {}", e);
    }
}
