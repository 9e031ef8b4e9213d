//! Replication side-effects of joining and of the periodic maintenance
//! tick: delegated primary data fans out to the new successor set, and new
//! primary data written after convergence reaches replicas on the next
//! `maintain_replication` pass.

mod common;

use chord_core::DataStore;
use common::Registry;

#[tokio::test]
async fn join_delegates_primary_data_and_replicates_both_ways() {
    let registry = Registry::new();
    let a = registry.spawn_with_id("a", 500).await;
    a.data_store.put_local(400, "a-owns").await;
    a.data_store.put_local(50, "b-owns-low").await;
    a.data_store.put_local(600, "b-owns-high").await;

    let b = registry.spawn_with_id("b", 300).await;
    b.join("a").await.unwrap();

    // b now primary-owns everything outside (300, 500]...
    assert_eq!(b.data_store.get_local(50).await, Some("b-owns-low".to_string()));
    assert_eq!(b.data_store.get_local(600).await, Some("b-owns-high".to_string()));
    assert_eq!(b.data_store.get_local(400).await, None);

    // ...and a kept the key still inside its own range.
    assert_eq!(a.data_store.get_local(400).await, Some("a-owns".to_string()));
    assert_eq!(a.data_store.get_local(50).await, None);

    // In a two-node ring each node is the other's sole successor, so the
    // join's replica fan-out (step 7) should have handed each a full copy
    // of the other's primary data.
    let mut a_replica_of_b: Vec<_> = a
        .data_store
        .get_all_replica_by_master_node(300)
        .await
        .into_iter()
        .map(|kv| kv.id)
        .collect();
    a_replica_of_b.sort();
    assert_eq!(a_replica_of_b, vec![50, 600]);

    let b_replica_of_a: Vec<_> = b
        .data_store
        .get_all_replica_by_master_node(500)
        .await
        .into_iter()
        .map(|kv| kv.id)
        .collect();
    assert_eq!(b_replica_of_a, vec![400]);
}

#[tokio::test]
async fn maintain_replication_pushes_new_primary_writes_to_successors() {
    let registry = Registry::new();
    let a = registry.spawn_with_id("a", 100).await;
    let b = registry.spawn_with_id("b", 200).await;
    b.join("a").await.unwrap();
    a.stabilize_successor().await.unwrap();
    b.stabilize_successor().await.unwrap();

    a.data_store.put_local(150, "fresh").await;
    a.maintain_replication().await;

    let replicated = b.data_store.get_all_replica_by_master_node(100).await;
    assert!(
        replicated.iter().any(|kv| kv.id == 150 && kv.value == "fresh"),
        "b should hold a replica of a's newly written key after a maintenance tick"
    );
}

#[tokio::test]
async fn delete_replica_drops_the_whole_group() {
    let registry = Registry::new();
    let a = registry.spawn_with_id("a", 100).await;
    let b = registry.spawn_with_id("b", 200).await;
    b.join("a").await.unwrap();
    a.stabilize_successor().await.unwrap();

    a.data_store.put_local(150, "x").await;
    a.maintain_replication().await;
    assert!(!b.data_store.get_all_replica_by_master_node(100).await.is_empty());

    b.data_store.delete_replica(a.info()).await;
    assert!(b.data_store.get_all_replica_by_master_node(100).await.is_empty());
}
