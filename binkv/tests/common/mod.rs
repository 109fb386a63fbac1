use binkv::client::CacheClient;
use binkv::memory_store::sharded_store::ShardedMemoryStore;
use binkv::server::memc_tcp::{MemcacheServerConfig, MemcacheTcpServer};
use binkv::server::timer::SystemTimer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const RX_TIMEOUT_SECS: u32 = 60;
const CONNECTION_LIMIT: u32 = 64;
const ITEM_SIZE_LIMIT: u32 = 1024 * 1024;
const LISTEN_BACKLOG: u32 = 128;

/// Binds to an ephemeral port to find a free one, then releases it for
/// the server. The server listener sets reuse_address so the rebind
/// succeeds even when the probe socket lingers.
fn free_listen_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Starts a server on a free port inside the current runtime and
/// returns its address once it accepts connections.
pub async fn spawn_server() -> SocketAddr {
    let addr = free_listen_addr();

    let timer = Arc::new(SystemTimer::new());
    let store = Arc::new(ShardedMemoryStore::new(timer.clone()));
    let config = MemcacheServerConfig::new(
        RX_TIMEOUT_SECS,
        CONNECTION_LIMIT,
        ITEM_SIZE_LIMIT,
        LISTEN_BACKLOG,
    );
    let mut server = MemcacheTcpServer::new(config, store);

    tokio::spawn(async move { server.run(addr).await.unwrap() });
    tokio::spawn(async move { timer.run().await });

    addr
}

/// Connects with retries, the spawned server task may not have bound
/// its listener yet.
pub async fn connect(addr: SocketAddr) -> CacheClient {
    for _ in 0..50 {
        if let Ok(client) = CacheClient::connect(addr).await {
            return client;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server at {} did not come up", addr);
}

pub async fn spawn_and_connect() -> CacheClient {
    let addr = spawn_server().await;
    connect(addr).await
}
