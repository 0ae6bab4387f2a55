//! Whole clusters of consensus services talking over an `InMemoryNetwork`.

use std::time::Duration;

use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle, time};
use yac_consensus::{
    ClusterOrdering, Config, Ed25519Crypto, GateObject, InMemoryNetwork, Peer, Round, SecretKey,
    TimeDiff, YacHandle, YacHash,
};
use yac_hashing::Digest;

struct Node {
    handle: YacHandle,
    outcomes: UnboundedReceiver<GateObject>,
    _join_handle: JoinHandle<()>,
}

fn secret_key(index: usize) -> SecretKey {
    SecretKey::from_bytes([index as u8 + 1; SecretKey::LENGTH]).unwrap()
}

fn hash(name: &str) -> YacHash {
    YacHash::new(Digest::hash(name), Digest::hash(name))
}

async fn start_cluster(size: usize, config: Config) -> (InMemoryNetwork, ClusterOrdering, Vec<Node>) {
    let network = InMemoryNetwork::new();
    let peers = (0..size)
        .map(|index| Peer::new(format!("node-{}", index), secret_key(index).public_key()))
        .collect();
    let ordering = ClusterOrdering::create(peers).unwrap();

    let mut nodes = Vec::new();
    for index in 0..size {
        let secret_key = secret_key(index);
        let public_key = secret_key.public_key();
        let (handle, join_handle) = yac_consensus::service::spawn(
            network.clone(),
            Ed25519Crypto::new(secret_key),
            config.clone(),
        );
        network.register(public_key, &handle);
        let outcomes = handle.subscribe().await.unwrap();
        nodes.push(Node {
            handle,
            outcomes,
            _join_handle: join_handle,
        });
    }
    (network, ordering, nodes)
}

async fn next_outcome(node: &mut Node) -> GateObject {
    time::timeout(Duration::from_secs(30), node.outcomes.recv())
        .await
        .expect("no outcome in time")
        .expect("service stopped")
}

#[tokio::test]
async fn all_nodes_commit_the_common_hash() {
    let (_network, ordering, mut nodes) = start_cluster(4, Config::default()).await;
    for node in &nodes {
        node.handle.vote(hash("block"), ordering.clone()).await.unwrap();
    }

    for node in &mut nodes {
        match next_outcome(node).await {
            GateObject::Commit(commit) => {
                assert_eq!(commit.hash(), Some(hash("block")));
                assert_eq!(commit.round(), Some(Round::new(0, 0)));
                assert!(commit.votes().len() >= 3);
            }
            other => panic!("unexpected outcome {}", other),
        }
    }

    // The cluster moves on to the next block round together.
    for node in &nodes {
        node.handle.vote(hash("next"), ordering.clone()).await.unwrap();
    }
    for node in &mut nodes {
        assert_eq!(next_outcome(node).await.round(), Some(Round::new(1, 0)));
    }
}

#[tokio::test]
async fn distinct_hashes_are_rejected() {
    let (_network, ordering, mut nodes) = start_cluster(4, Config::default()).await;
    for (index, node) in nodes.iter().enumerate() {
        node.handle
            .vote(hash(&format!("block {}", index)), ordering.clone())
            .await
            .unwrap();
    }

    for node in &mut nodes {
        match next_outcome(node).await {
            GateObject::Reject(reject) => assert_eq!(reject.round(), Some(Round::new(0, 0))),
            other => panic!("unexpected outcome {}", other),
        }
    }
}

#[tokio::test]
async fn one_faulty_node_is_tolerated() {
    let (network, ordering, mut nodes) = start_cluster(4, Config::default()).await;
    let offline = nodes.pop().unwrap();
    assert!(network.remove_node(&secret_key(3).public_key()));
    offline.handle.shutdown();

    for node in &nodes {
        node.handle.vote(hash("block"), ordering.clone()).await.unwrap();
    }
    for node in &mut nodes {
        assert!(matches!(next_outcome(node).await, GateObject::Commit(_)));
    }
}

#[tokio::test(start_paused = true)]
async fn round_times_out_without_quorum() {
    let config = Config {
        round_timeout: TimeDiff::from_seconds(1),
        ..Config::default()
    };
    let (network, ordering, mut nodes) = start_cluster(4, config).await;
    for index in [2, 3] {
        assert!(network.remove_node(&secret_key(index).public_key()));
    }
    nodes.truncate(2);

    for node in &nodes {
        node.handle.vote(hash("block"), ordering.clone()).await.unwrap();
    }
    for node in &mut nodes {
        match next_outcome(node).await {
            GateObject::Reject(reject) => assert!(reject.votes().len() <= 2),
            other => panic!("unexpected outcome {}", other),
        }
    }
}
