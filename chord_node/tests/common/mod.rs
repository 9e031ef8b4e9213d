use chord_node::constants::{FINGER_TABLE_SIZE, SUCCESSOR_LIST_NORMAL_LEN};
use chord_node::Node;
use chord_proto::chord::chord_server::ChordServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpListener;
use tonic::transport::Server;

/// Helper to start a node in a background task.
/// Returns the Node and a JoinHandle to the server task (allowing it to be aborted).
pub async fn start_node(addr: String) -> (Node, tokio::task::JoinHandle<()>) {
    let addr: SocketAddr = addr.parse().unwrap();
    let listener = TcpListener::bind(addr).await.unwrap();
    let local_addr = listener.local_addr().unwrap();
    let local_addr_str = local_addr.to_string();

    // Calculate ID based on the actual bound address
    let id = chord_proto::hash_addr(&local_addr_str);

    let node = Node::new(id, local_addr_str.clone(), SUCCESSOR_LIST_NORMAL_LEN);
    let node_clone = node.clone();

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(ChordServer::new(node_clone))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    // Give it a moment to start
    tokio::time::sleep(Duration::from_millis(200)).await;
    node.mark_joined();
    (node, handle)
}

/// As `start_node`, but takes an explicit id instead of deriving one from
/// the address — needed by scenarios pinning a node to a specific ring
/// position.
pub async fn start_node_with_id(id: u64, addr: String) -> (Node, tokio::task::JoinHandle<()>) {
    let bind_addr: SocketAddr = addr.parse().unwrap();
    let listener = TcpListener::bind(bind_addr).await.unwrap();
    let local_addr_str = listener.local_addr().unwrap().to_string();

    let node = Node::new(id, local_addr_str, SUCCESSOR_LIST_NORMAL_LEN);
    let node_clone = node.clone();

    let handle = tokio::spawn(async move {
        Server::builder()
            .add_service(ChordServer::new(node_clone))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    node.mark_joined();
    (node, handle)
}

pub async fn stabilize_ring(nodes: &[Node], rounds: usize) {
    println!("Stabilizing ring for {} rounds...", rounds);
    let finger_idx = AtomicUsize::new(0);
    for _ in 0..rounds {
        for node in nodes {
            node.stabilize().await;
            let idx = finger_idx.fetch_add(1, Ordering::Relaxed) % FINGER_TABLE_SIZE;
            node.fix_fingers(idx).await;
            node.maintain_replication().await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
