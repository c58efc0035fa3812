//! Many producers and consumers on one queue: every item is delivered exactly once

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use pdqueue_core::port::{Acl, ChildWatcher, CoordinationClient, CoordinationError, CreateMode};
use pdqueue_core::{DistributedPriorityQueue, QueueConfig};
use pdqueue_infra_memory::CoordinationSession;
use pdqueue_integration_tests::{text, Cluster, QUEUE_ROOT};
use rand::Rng;
use tokio::task::JoinSet;
use tokio::time::timeout;

const PRODUCERS: usize = 4;
const ITEMS_PER_PRODUCER: usize = 25;
const TOTAL: usize = PRODUCERS * ITEMS_PER_PRODUCER;

fn tag(producer: usize, item: usize) -> String {
    format!("p{}-i{}", producer, item)
}

fn expected_tags() -> HashSet<String> {
    (0..PRODUCERS)
        .flat_map(|p| (0..ITEMS_PER_PRODUCER).map(move |i| tag(p, i)))
        .collect()
}

async fn produce(cluster: &Cluster) {
    let producers = (0..PRODUCERS).map(|p| {
        let queue = cluster.queue();
        async move {
            for i in 0..ITEMS_PER_PRODUCER {
                let priority = rand::thread_rng().gen_range(0..10);
                queue.offer(tag(p, i).as_bytes(), priority).await.unwrap();
                tokio::task::yield_now().await;
            }
        }
    });
    join_all(producers).await;
}

fn assert_exactly_once(received: Vec<String>) {
    assert_eq!(received.len(), TOTAL, "items lost or duplicated");
    let unique: HashSet<String> = received.into_iter().collect();
    assert_eq!(unique.len(), TOTAL, "duplicate delivery");
    assert_eq!(unique, expected_tags());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_polling_consumers_receive_each_item_once() {
    let cluster = Cluster::new();
    let consumed = Arc::new(AtomicUsize::new(0));

    let mut consumers = JoinSet::new();
    for _ in 0..3 {
        let queue = cluster.queue();
        let consumed = Arc::clone(&consumed);
        consumers.spawn(async move {
            let mut mine = Vec::new();
            while consumed.load(Ordering::SeqCst) < TOTAL {
                match queue.poll().await.unwrap() {
                    Some(payload) => {
                        consumed.fetch_add(1, Ordering::SeqCst);
                        mine.push(text(&payload));
                    }
                    None => tokio::time::sleep(Duration::from_millis(5)).await,
                }
            }
            mine
        });
    }

    produce(&cluster).await;

    let mut received = Vec::new();
    let all = timeout(Duration::from_secs(30), async {
        while let Some(result) = consumers.join_next().await {
            received.extend(result.unwrap());
        }
    })
    .await;
    assert!(all.is_ok(), "consumers did not drain the queue");

    assert_exactly_once(received);
    assert!(cluster.queue().is_empty().await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_taking_consumers_receive_each_item_once() {
    const CONSUMERS: usize = 4;
    let cluster = Cluster::new();

    let consumers: Vec<_> = (0..CONSUMERS)
        .map(|_| {
            let queue = cluster.queue();
            tokio::spawn(async move {
                let mut mine = Vec::new();
                for _ in 0..TOTAL / CONSUMERS {
                    mine.push(text(&queue.take().await.unwrap()));
                }
                mine
            })
        })
        .collect();

    produce(&cluster).await;

    let results = timeout(Duration::from_secs(30), join_all(consumers))
        .await
        .expect("takers did not receive every item");
    let received: Vec<String> = results.into_iter().flat_map(|r| r.unwrap()).collect();

    assert_exactly_once(received);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_urgent_offer_between_polls_jumps_backlog() {
    let cluster = Cluster::new();
    let queue = cluster.queue();
    let producer = cluster.queue();

    for i in 0..20 {
        queue.offer(format!("backlog-{}", i).as_bytes(), 500).await.unwrap();
    }

    assert_eq!(queue.poll().await.unwrap(), Some(b"backlog-0".to_vec()));
    producer.offer(b"urgent", 0).await.unwrap();
    assert_eq!(queue.poll().await.unwrap(), Some(b"urgent".to_vec()));
    assert_eq!(queue.poll().await.unwrap(), Some(b"backlog-1".to_vec()));
}

/// Consumer session on which a competing producer offers one item right
/// after the consumer's first payload read, i.e. in the middle of a scan.
struct OfferAfterFirstRead {
    session: CoordinationSession,
    producer: Arc<DistributedPriorityQueue>,
    pending: Mutex<Option<(&'static [u8], i32)>>,
}

#[async_trait]
impl CoordinationClient for OfferAfterFirstRead {
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: Acl,
        mode: CreateMode,
    ) -> Result<String, CoordinationError> {
        self.session.create(path, data, acl, mode).await
    }

    async fn get_children(
        &self,
        path: &str,
        watcher: Option<Arc<dyn ChildWatcher>>,
    ) -> Result<Vec<String>, CoordinationError> {
        self.session.get_children(path, watcher).await
    }

    async fn get_data(&self, path: &str) -> Result<Vec<u8>, CoordinationError> {
        let data = self.session.get_data(path).await?;
        let next = self.pending.lock().unwrap().take();
        if let Some((payload, priority)) = next {
            self.producer.offer(payload, priority).await.unwrap();
        }
        Ok(data)
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<(), CoordinationError> {
        self.session.delete(path, version).await
    }

    async fn exists(&self, path: &str) -> Result<bool, CoordinationError> {
        self.session.exists(path).await
    }
}

async fn consumer_racing_one_offer(
    cluster: &Cluster,
    payload: &'static [u8],
    priority: i32,
) -> DistributedPriorityQueue {
    let producer = cluster.queue();
    for i in 0..3 {
        producer.offer(format!("backlog-{}", i).as_bytes(), 500).await.unwrap();
    }

    let client = Arc::new(OfferAfterFirstRead {
        session: cluster.service.connect(),
        producer,
        pending: Mutex::new(Some((payload, priority))),
    });
    let config = QueueConfig::new(QUEUE_ROOT).with_create_parents(true);
    DistributedPriorityQueue::with_simple_codec(client, config).unwrap()
}

#[tokio::test]
async fn test_urgent_offer_during_scan_preempts_candidate() {
    let cluster = Cluster::new();
    let consumer = consumer_racing_one_offer(&cluster, b"urgent", 0).await;

    assert_eq!(consumer.poll().await.unwrap(), Some(b"urgent".to_vec()));
    assert_eq!(consumer.poll().await.unwrap(), Some(b"backlog-0".to_vec()));
    assert_eq!(cluster.service.child_count(QUEUE_ROOT), Some(2));
}

#[tokio::test]
async fn test_equal_priority_offer_during_scan_keeps_candidate() {
    let cluster = Cluster::new();
    let consumer = consumer_racing_one_offer(&cluster, b"late", 500).await;

    assert_eq!(consumer.poll().await.unwrap(), Some(b"backlog-0".to_vec()));
    assert_eq!(cluster.service.child_count(QUEUE_ROOT), Some(3));

    let rest: Vec<String> = [
        consumer.poll().await.unwrap(),
        consumer.poll().await.unwrap(),
        consumer.poll().await.unwrap(),
    ]
    .into_iter()
    .map(|p| text(&p.unwrap()))
    .collect();
    assert_eq!(rest, vec!["backlog-1", "backlog-2", "late"]);
}
