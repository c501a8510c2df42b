//! Probe-driven state transitions observed through a running pool.

use crate::mock_infrastructure::{
    bounded, node_config, ordered_node_config, start_pool, test_builder, test_configs, wait_for,
    wait_for_head, wait_for_state, MockTransportFactory,
};
use multinode_core::upstream::{NodeState, PoolError};
use std::time::Duration;

fn state_of(pool: &multinode_core::upstream::NodePool, name: &str) -> NodeState {
    pool.node_states().into_iter().find(|s| s.name == name).map(|s| s.state).expect("known node")
}

#[tokio::test]
async fn test_node_unreachable_after_threshold_then_recovers() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head(10);
    factory.transport("b").set_head(5);

    let pool =
        start_pool(test_configs("HighestHead", vec![node_config("a"), node_config("b")]), &factory);
    assert!(wait_for_head(&pool, 10).await);
    assert_eq!(pool.select("job").unwrap().name(), "a");

    factory.transport("a").fail_head();
    assert!(wait_for_state(&pool, "a", NodeState::Unreachable).await);
    assert_eq!(pool.select("job").unwrap().name(), "b");

    factory.transport("a").set_head(11);
    assert!(wait_for_state(&pool, "a", NodeState::Alive).await);
    let status = pool.node_states().into_iter().find(|s| s.name == "a").unwrap();
    assert_eq!(status.consecutive_failures, 0);
    assert_eq!(pool.select("job").unwrap().name(), "a");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_hanging_probe_counts_as_failure() {
    let factory = MockTransportFactory::new();
    factory.transport("a").hang_head();

    let pool = start_pool(test_configs("HighestHead", vec![node_config("a")]), &factory);

    assert!(wait_for_state(&pool, "a", NodeState::Unreachable).await);
    assert!(matches!(pool.select("job"), Err(PoolError::Exhausted)));

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_zero_threshold_keeps_failing_node_alive() {
    let factory = MockTransportFactory::new();
    factory.transport("a").fail_head();

    let configs = test_builder("HighestHead")
        .poll_failure_threshold(0)
        .node(node_config("a"))
        .build()
        .unwrap();
    let pool = start_pool(configs, &factory);

    assert!(wait_for(|| pool.node_states()[0].consecutive_failures >= 3).await);
    assert_eq!(state_of(&pool, "a"), NodeState::Alive);
    assert_eq!(pool.select("job").unwrap().name(), "a");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_lagging_syncing_node_is_excluded_until_caught_up() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head(100);
    factory.transport("b").set_head(100);
    factory.transport("b").set_syncing(50);

    let configs = test_builder("PriorityLevel")
        .node_is_syncing_enabled(true)
        .nodes(vec![ordered_node_config("b", 1), ordered_node_config("a", 2)])
        .build()
        .unwrap();
    let pool = start_pool(configs, &factory);

    assert!(wait_for_state(&pool, "b", NodeState::Syncing).await);
    assert_eq!(pool.select("job").unwrap().name(), "a");

    factory.transport("b").set_syncing(98);
    assert!(wait_for_state(&pool, "b", NodeState::Alive).await);
    assert_eq!(pool.select("job").unwrap().name(), "b");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_syncing_within_threshold_stays_alive() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head(100);
    factory.transport("a").set_syncing(96);

    let configs = test_builder("HighestHead")
        .node_is_syncing_enabled(true)
        .node(node_config("a"))
        .build()
        .unwrap();
    let pool = start_pool(configs, &factory);

    let transport = factory.transport("a");
    assert!(wait_for(|| transport.sync_probes() >= 3).await);
    assert_eq!(state_of(&pool, "a"), NodeState::Alive);

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_failed_sync_check_keeps_node_alive() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head(7);
    factory.transport("a").fail_sync();

    let configs = test_builder("HighestHead")
        .node_is_syncing_enabled(true)
        .node(node_config("a"))
        .build()
        .unwrap();
    let pool = start_pool(configs, &factory);

    let transport = factory.transport("a");
    assert!(wait_for(|| transport.sync_probes() >= 4).await);

    let status = &pool.node_states()[0];
    assert_eq!(status.state, NodeState::Alive);
    assert_eq!(status.head, 7);
    assert_eq!(status.consecutive_failures, 0);
    assert_eq!(pool.select("job").unwrap().name(), "a");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_failed_sync_check_keeps_previous_sync_state() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head(100);
    factory.transport("b").set_head(100);
    factory.transport("b").set_syncing(50);

    let configs = test_builder("HighestHead")
        .node_is_syncing_enabled(true)
        .nodes(vec![node_config("a"), node_config("b")])
        .build()
        .unwrap();
    let pool = start_pool(configs, &factory);
    assert!(wait_for_state(&pool, "b", NodeState::Syncing).await);

    let transport = factory.transport("b");
    transport.fail_sync();
    let seen = transport.sync_probes();
    assert!(wait_for(|| transport.sync_probes() >= seen + 3).await);
    assert_eq!(state_of(&pool, "b"), NodeState::Syncing);
    assert_eq!(pool.node_states()[1].consecutive_failures, 0);

    transport.set_synced();
    assert!(wait_for_state(&pool, "b", NodeState::Alive).await);

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_sync_not_probed_when_disabled() {
    let factory = MockTransportFactory::new();
    let pool = start_pool(test_configs("HighestHead", vec![node_config("a")]), &factory);

    let transport = factory.transport("a");
    assert!(wait_for(|| transport.head_probes() >= 3).await);
    assert_eq!(transport.sync_probes(), 0);

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_pool_head_is_highest_current_head() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head(40);
    factory.transport("b").set_head(42);
    factory.transport("c").set_head(41);

    let pool = start_pool(
        test_configs("RoundRobin", vec![node_config("a"), node_config("b"), node_config("c")]),
        &factory,
    );
    assert!(wait_for_head(&pool, 42).await);

    factory.transport("b").set_head(30);
    assert!(wait_for(|| pool.highest_head() == 41).await);

    bounded(pool.close()).await.unwrap();
    assert_eq!(pool.highest_head(), 0);
}

#[tokio::test]
async fn test_spiking_head_does_not_hold_syncing_node_back() {
    let factory = MockTransportFactory::new();
    factory.transport("spiky").set_head(1_000_000);
    factory.transport("b").set_head(98);
    factory.transport("b").set_syncing(98);

    let configs = test_builder("HighestHead")
        .node_is_syncing_enabled(true)
        .nodes(vec![node_config("spiky"), node_config("b")])
        .build()
        .unwrap();
    let pool = start_pool(configs, &factory);
    assert!(wait_for_state(&pool, "b", NodeState::Syncing).await);

    factory.transport("spiky").set_head(100);
    assert!(wait_for_state(&pool, "b", NodeState::Alive).await);
    assert_eq!(pool.highest_head(), 100);

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_probe_cadence_follows_poll_interval() {
    let factory = MockTransportFactory::new();
    let configs = test_builder("HighestHead")
        .poll_interval(Duration::from_millis(200))
        .node(node_config("a"))
        .build()
        .unwrap();
    let pool = start_pool(configs, &factory);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let probes = factory.transport("a").head_probes();
    assert!((1..=3).contains(&probes), "expected about two probes, saw {probes}");

    bounded(pool.close()).await.unwrap();
}
