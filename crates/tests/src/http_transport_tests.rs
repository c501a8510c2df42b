//! The HTTP JSON-RPC transport driven by a pool against mockito endpoints.

use crate::mock_infrastructure::{
    bounded, test_builder, wait_for, wait_for_head, wait_for_state, RpcMockBuilder,
};
use multinode_core::{
    types::NodeConfig,
    upstream::{
        HttpTransportFactory, NodeCallError, NodePool, NodeState, PoolConfigBuilder, PoolError,
    },
};
use serde_json::json;
use std::time::Duration;

fn http_node(name: &str, mock: &RpcMockBuilder) -> NodeConfig {
    NodeConfig::new(name, format!("ws://{name}.test"), mock.url())
}

/// Probes go over real sockets, so the poll interval leaves room for the probe timeout.
fn http_builder(mode: &str) -> PoolConfigBuilder {
    test_builder(mode).poll_interval(Duration::from_millis(200))
}

fn start(configs: multinode_core::upstream::ClientConfigs) -> NodePool {
    let pool = NodePool::new(configs, &HttpTransportFactory::default()).unwrap();
    pool.start().unwrap();
    pool
}

#[tokio::test]
async fn test_pool_selects_highest_http_node() {
    let mut leader = RpcMockBuilder::new().await;
    leader.mock_latest_block(100, None).await;
    let mut follower = RpcMockBuilder::new().await;
    follower.mock_latest_block(90, None).await;

    let pool = start(
        http_builder("HighestHead")
            .nodes(vec![http_node("follower", &follower), http_node("leader", &leader)])
            .build()
            .unwrap(),
    );

    assert!(wait_for_head(&pool, 100).await);
    assert!(wait_for(|| pool.node_states().iter().all(|s| s.head > 0)).await);
    assert_eq!(pool.select("job").unwrap().name(), "leader");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_failing_http_node_becomes_unreachable() {
    let mut healthy = RpcMockBuilder::new().await;
    healthy.mock_latest_block(10, None).await;
    let mut broken = RpcMockBuilder::new().await;
    broken.mock_server_error().await;

    let pool = start(
        http_builder("PriorityLevel")
            .nodes(vec![
                http_node("broken", &broken).with_order(1),
                http_node("healthy", &healthy).with_order(2),
            ])
            .build()
            .unwrap(),
    );

    assert!(wait_for_state(&pool, "broken", NodeState::Unreachable).await);
    assert_eq!(pool.select("job").unwrap().name(), "healthy");

    broken.reset().await;
    broken.mock_latest_block(11, None).await;
    assert!(wait_for_state(&pool, "broken", NodeState::Alive).await);
    assert_eq!(pool.select("job").unwrap().name(), "broken");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_http_syncing_node_is_excluded() {
    let mut synced = RpcMockBuilder::new().await;
    synced.mock_latest_block(500, None).await;
    synced.mock_not_syncing().await;
    let mut syncing = RpcMockBuilder::new().await;
    syncing.mock_latest_block(500, None).await;
    syncing.mock_syncing(120, 500).await;

    let pool = start(
        http_builder("PriorityLevel")
            .node_is_syncing_enabled(true)
            .nodes(vec![
                http_node("syncing", &syncing).with_order(1),
                http_node("synced", &synced).with_order(2),
            ])
            .build()
            .unwrap(),
    );

    assert!(wait_for_state(&pool, "syncing", NodeState::Syncing).await);
    assert_eq!(pool.select("job").unwrap().name(), "synced");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_total_difficulty_over_http() {
    let mut light = RpcMockBuilder::new().await;
    light.mock_latest_block(200, Some(1_000)).await;
    let mut heavy = RpcMockBuilder::new().await;
    heavy.mock_latest_block(150, Some(9_000)).await;

    let pool = start(
        http_builder("TotalDifficulty")
            .nodes(vec![http_node("light", &light), http_node("heavy", &heavy)])
            .build()
            .unwrap(),
    );

    assert!(wait_for(|| pool.node_states().iter().all(|s| s.total_difficulty.is_some())).await);
    assert_eq!(pool.select("job").unwrap().name(), "heavy");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_call_through_pool_over_http() {
    let mut node = RpcMockBuilder::new().await;
    node.mock_result("eth_chainId", json!("0x1")).await;
    node.mock_rpc_error("eth_nope", -32601, "the method eth_nope does not exist").await;

    let configs = http_builder("HighestHead").node(http_node("node", &node)).build().unwrap();
    let pool = NodePool::new(configs, &HttpTransportFactory::default()).unwrap();

    assert_eq!(pool.call("job", "eth_chainId", None).await.unwrap(), json!("0x1"));

    let err = pool.call("job", "eth_nope", Some(json!([]))).await.unwrap_err();
    assert!(matches!(err, PoolError::Call { source: NodeCallError::RpcError(-32601, _), .. }));
    assert_eq!(pool.node_states()[0].consecutive_failures, 0);

    bounded(pool.close()).await.unwrap();
}
