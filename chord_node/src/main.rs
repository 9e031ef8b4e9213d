use chord_proto::chord::chord_server::ChordServer;
use clap::Parser;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tonic::transport::Server;

use chord_node::constants::{
    DEFAULT_PORT, FINGER_TABLE_SIZE, FIX_FINGERS_INTERVAL_MS, LOCALHOST,
    MAINTAIN_REPLICATION_INTERVAL_MS, STABILIZATION_INTERVAL_MS, SUCCESSOR_LIST_NORMAL_LEN,
};
use chord_node::Node;
use chord_proto::hash_addr;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address of a node to join
    #[arg(short, long)]
    join: Option<String>,

    /// Monitor address
    #[arg(short, long)]
    monitor: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let addr_str = format!("{}:{}", LOCALHOST, args.port);
    let addr: SocketAddr = addr_str.parse()?;
    let id = hash_addr(&addr_str);

    log::info!("node starting at {addr_str} with id {id}");

    let node = Node::new(id, addr_str.clone(), SUCCESSOR_LIST_NORMAL_LEN);

    // The gRPC server has to be listening before anyone — including this
    // node's own `join` — can dial it; a node that hasn't bound yet is
    // indistinguishable from a dead one.
    let server_node = node.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = Server::builder()
            .add_service(ChordServer::new(server_node))
            .serve(addr)
            .await
        {
            log::error!("server error: {e}");
        }
    });
    sleep(Duration::from_millis(100)).await;

    match args.join {
        Some(join_addr) => {
            log::info!("joining ring via {join_addr}");
            node.join(&join_addr).await?;
            log::info!("joined successfully");
        }
        None => node.mark_joined(),
    }

    let monitor_addr = args.monitor.clone();
    let tick_node = node.clone();
    let finger_idx = Arc::new(AtomicUsize::new(0));
    tokio::spawn(async move {
        loop {
            sleep(Duration::from_millis(STABILIZATION_INTERVAL_MS)).await;
            tick_node.stabilize().await;

            sleep(Duration::from_millis(FIX_FINGERS_INTERVAL_MS)).await;
            let idx = finger_idx.fetch_add(1, Ordering::Relaxed) % FINGER_TABLE_SIZE;
            tick_node.fix_fingers(idx).await;

            sleep(Duration::from_millis(MAINTAIN_REPLICATION_INTERVAL_MS)).await;
            tick_node.maintain_replication().await;

            if let Some((pending_self, pending_mediator)) = tick_node.drain_retry_slot().await {
                log::warn!(
                    "retrying join of {} via {}",
                    pending_self.address,
                    pending_mediator.address
                );
                if let Err(e) = tick_node.join(&pending_mediator.address).await {
                    log::warn!("join retry failed: {e}");
                }
            }

            if let Some(ref m_addr) = monitor_addr {
                tick_node.report_to_monitor(m_addr).await;
            }
        }
    });

    server_handle.await?;
    Ok(())
}
