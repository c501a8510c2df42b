//! Selection modes driven by live monitor state.

use crate::mock_infrastructure::{
    bounded, node_config, ordered_node_config, start_pool, test_configs, wait_for, wait_for_head,
    wait_for_state, MockTransportFactory,
};
use multinode_core::upstream::{NodeState, PoolError};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_highest_head_follows_the_leader() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head(10);
    factory.transport("b").set_head(30);
    factory.transport("c").set_head(20);

    let pool = start_pool(
        test_configs("HighestHead", vec![node_config("a"), node_config("b"), node_config("c")]),
        &factory,
    );
    assert!(wait_for_head(&pool, 30).await);
    assert!(wait_for(|| pool.node_states().iter().all(|s| s.head > 0)).await);
    assert_eq!(pool.select("job").unwrap().name(), "b");

    factory.transport("b").fail_head();
    assert!(wait_for_state(&pool, "b", NodeState::Unreachable).await);
    assert_eq!(pool.select("job").unwrap().name(), "c");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_highest_head_tie_prefers_order_then_name() {
    let factory = MockTransportFactory::new();
    for name in ["zeta", "beta", "alpha"] {
        factory.transport(name).set_head(50);
    }

    let pool = start_pool(
        test_configs(
            "HighestHead",
            vec![
                ordered_node_config("zeta", 1),
                ordered_node_config("beta", 2),
                ordered_node_config("alpha", 2),
            ],
        ),
        &factory,
    );
    assert!(wait_for(|| pool.node_states().iter().all(|s| s.head == 50)).await);
    assert_eq!(pool.select("job").unwrap().name(), "zeta");

    factory.transport("zeta").fail_head();
    assert!(wait_for_state(&pool, "zeta", NodeState::Unreachable).await);
    assert_eq!(pool.select("job").unwrap().name(), "alpha");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_round_robin_rotates_and_skips_unhealthy() {
    let factory = MockTransportFactory::new();
    let pool = start_pool(
        test_configs(
            "RoundRobin",
            vec![ordered_node_config("c", 3), ordered_node_config("a", 1), ordered_node_config("b", 2)],
        ),
        &factory,
    );

    let picks: Vec<String> =
        (0..6).map(|_| pool.select("job").unwrap().name().to_string()).collect();
    assert_eq!(picks, ["a", "b", "c", "a", "b", "c"]);

    factory.transport("b").fail_head();
    assert!(wait_for_state(&pool, "b", NodeState::Unreachable).await);

    let picks: Vec<String> =
        (0..4).map(|_| pool.select("job").unwrap().name().to_string()).collect();
    assert_eq!(picks, ["a", "c", "a", "c"]);

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_priority_level_prefers_lowest_order() {
    let factory = MockTransportFactory::new();
    let pool = start_pool(
        test_configs(
            "PriorityLevel",
            vec![ordered_node_config("backup", 5), ordered_node_config("primary", 1)],
        ),
        &factory,
    );

    for _ in 0..3 {
        assert_eq!(pool.select("job").unwrap().name(), "primary");
    }

    factory.transport("primary").fail_head();
    assert!(wait_for_state(&pool, "primary", NodeState::Unreachable).await);
    assert_eq!(pool.select("job").unwrap().name(), "backup");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_total_difficulty_prefers_heaviest_chain() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head_with_difficulty(120, 1_000);
    factory.transport("b").set_head_with_difficulty(100, 5_000);

    let pool =
        start_pool(test_configs("TotalDifficulty", vec![node_config("a"), node_config("b")]), &factory);
    assert!(wait_for(|| pool.node_states().iter().all(|s| s.total_difficulty.is_some())).await);
    assert_eq!(pool.select("job").unwrap().name(), "b");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_total_difficulty_without_difficulty_uses_head() {
    let factory = MockTransportFactory::new();
    factory.transport("a").set_head(120);
    factory.transport("b").set_head(100);

    let pool =
        start_pool(test_configs("TotalDifficulty", vec![node_config("a"), node_config("b")]), &factory);
    assert!(wait_for(|| pool.node_states().iter().all(|s| s.head > 0)).await);
    assert_eq!(pool.select("job").unwrap().name(), "a");

    bounded(pool.close()).await.unwrap();
}

#[tokio::test]
async fn test_exhausted_pool_fails_immediately() {
    let factory = MockTransportFactory::new();
    factory.transport("a").fail_head();
    factory.transport("b").hang_head();

    let pool =
        start_pool(test_configs("HighestHead", vec![node_config("a"), node_config("b")]), &factory);
    assert!(wait_for(|| pool.alive_count() == 0).await);

    let started = Instant::now();
    assert!(matches!(pool.select("job"), Err(PoolError::Exhausted)));
    assert!(started.elapsed() < Duration::from_millis(50));

    bounded(pool.close()).await.unwrap();
}
