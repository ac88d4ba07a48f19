mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use cmqueue_core::{BacklogLimit, QueueError};
use cmqueue_dispatcher::{
    DistributedQueue, InMemoryLeaseStore, LeaseState, WeightedShareStrategy,
};

use common::{fast_config, init_tracing, RecordingDispatcher};

async fn start_queue(dispatcher: Arc<RecordingDispatcher>) -> Arc<DistributedQueue> {
    init_tracing();
    DistributedQueue::start(
        fast_config(),
        Arc::new(WeightedShareStrategy::new()),
        dispatcher,
        Arc::new(InMemoryLeaseStore::new()),
    )
    .await
    .unwrap()
}

async fn wait_active(queue: &DistributedQueue) {
    for _ in 0..200 {
        if queue.lease_state() == LeaseState::Active {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("队列未在预期时间内取得调度权");
}

async fn wait_dispatched(dispatcher: &RecordingDispatcher, expected: usize) {
    for _ in 0..200 {
        if dispatcher.total().await >= expected {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "下发数量未达到预期: {} < {expected}",
        dispatcher.total().await
    );
}

#[tokio::test]
async fn test_nine_messages_follow_two_to_one_weights() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    queue
        .join_worker("worker-a", 2, BacklogLimit::ByMessages(100))
        .await
        .unwrap();
    queue
        .join_worker("worker-b", 1, BacklogLimit::ByMessages(100))
        .await
        .unwrap();

    for sequence_id in 1..=9u64 {
        queue.on_message_arrived(sequence_id, 100).await.unwrap();
    }

    wait_dispatched(&dispatcher, 9).await;
    assert_eq!(dispatcher.count_for("worker-a").await, 6);
    assert_eq!(dispatcher.count_for("worker-b").await, 3);
    assert_eq!(queue.unassigned_message_count().await, 0);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_backlog_ceiling_caps_the_heavier_worker() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    queue
        .join_worker("worker-a", 2, BacklogLimit::ByMessages(5))
        .await
        .unwrap();
    queue
        .join_worker("worker-b", 1, BacklogLimit::ByMessages(5))
        .await
        .unwrap();

    for sequence_id in 1..=9u64 {
        queue.on_message_arrived(sequence_id, 100).await.unwrap();
    }

    wait_dispatched(&dispatcher, 9).await;
    // 上限5把worker-a压在5条，多出的那条流向worker-b
    assert_eq!(dispatcher.count_for("worker-a").await, 5);
    assert_eq!(dispatcher.count_for("worker-b").await, 4);
    assert_eq!(queue.worker_task_count("worker-a").await.unwrap(), 5);
    assert_eq!(queue.unassigned_message_count().await, 0);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_bytes_limit_defers_until_capacity_frees() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    queue
        .join_worker("worker-a", 1, BacklogLimit::ByBytes(1000))
        .await
        .unwrap();

    queue.on_message_arrived(1, 600).await.unwrap();
    queue.on_message_arrived(2, 600).await.unwrap();

    wait_dispatched(&dispatcher, 1).await;
    sleep(Duration::from_millis(100)).await;
    // 第二条超出字节上限，暂缓分配
    assert_eq!(dispatcher.total().await, 1);
    assert_eq!(queue.unassigned_message_count().await, 1);

    // 完成第一条释放容量后，第二条自动跟上
    queue
        .on_worker_complete("worker-a", 1, Utc::now())
        .await
        .unwrap();
    wait_dispatched(&dispatcher, 2).await;
    assert_eq!(queue.unassigned_message_count().await, 0);
    assert_eq!(dispatcher.dispatched().await[1], ("worker-a".to_string(), 2));

    queue.shutdown().await;
}

#[tokio::test]
async fn test_worker_departure_reroutes_in_flight_messages() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    queue
        .join_worker("worker-a", 1, BacklogLimit::ByMessages(10))
        .await
        .unwrap();
    for sequence_id in 1..=3u64 {
        queue.on_message_arrived(sequence_id, 100).await.unwrap();
    }
    wait_dispatched(&dispatcher, 3).await;
    assert_eq!(dispatcher.count_for("worker-a").await, 3);

    queue
        .join_worker("worker-b", 1, BacklogLimit::ByMessages(10))
        .await
        .unwrap();
    queue.leave_worker("worker-a").await.unwrap();

    // 3条在途消息全部回到未分配并重新流向worker-b
    for _ in 0..200 {
        if dispatcher.count_for("worker-b").await == 3 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(dispatcher.count_for("worker-b").await, 3);
    assert_eq!(queue.unassigned_message_count().await, 0);
    assert!(matches!(
        queue.worker_weight("worker-a").await,
        Err(QueueError::UnknownWorker { .. })
    ));

    queue.shutdown().await;
}

#[tokio::test]
async fn test_second_completion_is_rejected_without_double_decrement() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    queue
        .join_worker("worker-a", 1, BacklogLimit::ByMessages(10))
        .await
        .unwrap();
    queue.on_message_arrived(1, 100).await.unwrap();
    wait_dispatched(&dispatcher, 1).await;

    queue
        .on_worker_complete("worker-a", 1, Utc::now())
        .await
        .unwrap();
    assert_eq!(queue.worker_task_count("worker-a").await.unwrap(), 0);

    let second = queue.on_worker_complete("worker-a", 1, Utc::now()).await;
    assert!(matches!(second, Err(QueueError::InvalidTransition { .. })));
    // 计数没有被二次回落
    assert_eq!(queue.worker_task_count("worker-a").await.unwrap(), 0);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_sequence_is_rejected() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;

    queue.on_message_arrived(1, 100).await.unwrap();
    let replay = queue.on_message_arrived(1, 100).await;
    assert!(matches!(
        replay,
        Err(QueueError::DuplicateSequence { sequence_id: 1 })
    ));

    queue.shutdown().await;
}

#[tokio::test]
async fn test_admin_misuse_fails_without_partial_mutation() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;

    queue
        .join_worker("worker-a", 2, BacklogLimit::ByMessages(5))
        .await
        .unwrap();

    assert!(matches!(
        queue.set_worker_weight("worker-a", 0).await,
        Err(QueueError::InvalidWeight { weight: 0 })
    ));
    assert_eq!(queue.worker_weight("worker-a").await.unwrap(), 2);

    assert!(matches!(
        queue.set_worker_weight("worker-x", 3).await,
        Err(QueueError::UnknownWorker { .. })
    ));

    assert!(matches!(
        queue
            .set_backlog_limit("worker-a", BacklogLimit::ByMessages(0))
            .await,
        Err(QueueError::InvalidArgument(_))
    ));

    queue.set_worker_weight("worker-a", 4).await.unwrap();
    assert_eq!(queue.worker_weight("worker-a").await.unwrap(), 4);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_messages_wait_when_no_worker_is_registered() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    queue.on_message_arrived(1, 100).await.unwrap();
    queue.on_message_arrived(2, 100).await.unwrap();
    sleep(Duration::from_millis(100)).await;

    assert_eq!(dispatcher.total().await, 0);
    assert_eq!(queue.unassigned_message_count().await, 2);
    let holder = queue.current_scheduler_holder().await.unwrap();
    assert_eq!(holder.as_deref(), Some(queue.node_id()));

    // Worker加入后积压立即排空
    queue
        .join_worker("worker-a", 1, BacklogLimit::ByMessages(10))
        .await
        .unwrap();
    wait_dispatched(&dispatcher, 2).await;
    assert_eq!(queue.unassigned_message_count().await, 0);

    queue.shutdown().await;
}

#[tokio::test]
async fn test_retention_purges_completed_entries() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    queue
        .set_completion_retention(Duration::ZERO)
        .await
        .unwrap();
    queue
        .join_worker("worker-a", 1, BacklogLimit::ByMessages(10))
        .await
        .unwrap();

    queue.on_message_arrived(1, 100).await.unwrap();
    wait_dispatched(&dispatcher, 1).await;
    queue
        .on_worker_complete("worker-a", 1, Utc::now())
        .await
        .unwrap();

    // 保留时长为0：下个清理周期后，台账遗忘该序列号，重放不再视为重复
    for _ in 0..200 {
        if queue.on_message_arrived(1, 100).await.is_ok() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    wait_dispatched(&dispatcher, 2).await;

    queue.shutdown().await;
}

#[tokio::test]
async fn test_default_join_uses_configured_weight_and_backlog() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    // fast_config未改动权重与积压默认值：权重1，积压上限1条
    queue.join_worker_with_defaults("worker-a").await.unwrap();
    assert_eq!(queue.worker_weight("worker-a").await.unwrap(), 1);

    queue.on_message_arrived(1, 100).await.unwrap();
    queue.on_message_arrived(2, 100).await.unwrap();
    wait_dispatched(&dispatcher, 1).await;
    sleep(Duration::from_millis(100)).await;

    // 默认积压上限一次只放行一条
    assert_eq!(dispatcher.total().await, 1);
    assert_eq!(queue.unassigned_message_count().await, 1);

    queue
        .on_worker_complete("worker-a", 1, Utc::now())
        .await
        .unwrap();
    wait_dispatched(&dispatcher, 2).await;

    queue.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_releases_the_lease() {
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let queue = start_queue(dispatcher.clone()).await;
    wait_active(&queue).await;

    queue.shutdown().await;

    assert_eq!(queue.lease_state(), LeaseState::Idle);
    let holder = queue.current_scheduler_holder().await.unwrap();
    assert_eq!(holder, None);
}
