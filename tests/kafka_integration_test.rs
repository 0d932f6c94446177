//! End-to-end tests against a real Kafka broker
//!
//! Run with `cargo test -- --ignored` against a broker reachable at
//! `KAFKA_BROKERS` (default `localhost:9092`) with topic auto-creation
//! enabled.

use kafka_utility::{
    ConsumerConfig, I64Deserializer, ManagedConsumer, StringDeserializer,
};
use rand::distributions::{Alphanumeric, DistString};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serial_test::serial;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

fn brokers() -> String {
    std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string())
}

fn unique_topic(prefix: &str) -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), 8);
    format!("{}-{}", prefix, suffix.to_lowercase())
}

fn random_string() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), 16)
}

fn producer() -> FutureProducer {
    ClientConfig::new()
        .set("bootstrap.servers", brokers())
        .set("message.timeout.ms", "5000")
        .create()
        .expect("failed to create producer")
}

async fn produce(producer: &FutureProducer, topic: &str, key: &[u8], value: &[u8]) {
    let record = FutureRecord::to(topic).key(key).payload(value);
    producer
        .send(record, Duration::from_secs(5))
        .await
        .expect("failed to produce");
}

fn consumer_config(topic: &str) -> ConsumerConfig {
    ConsumerConfig::builder()
        .brokers(brokers())
        .group_id(format!("{}-group", topic))
        .topic(topic)
        .poll_timeout(Duration::from_millis(500))
        .auto_offset_reset("earliest")
        .build()
}

async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Kafka broker"]
async fn valid_record_is_consumed_with_matching_key_and_value() {
    let topic = unique_topic("kafka-utility-valid");
    let key = random_string();
    let value = random_string();

    let consumer = ManagedConsumer::<String, String, _, _>::connect(
        consumer_config(&topic),
        StringDeserializer,
        StringDeserializer,
    )
    .unwrap();
    consumer.run().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    consumer.on_record_processed(move |record| {
        seen_clone
            .lock()
            .unwrap()
            .push((record.key().cloned(), record.value().clone()));
    });

    produce(&producer(), &topic, key.as_bytes(), value.as_bytes()).await;

    assert!(wait_for(|| !seen.lock().unwrap().is_empty(), Duration::from_secs(30)).await);
    assert_eq!(*seen.lock().unwrap(), vec![(Some(key), value)]);

    // Single partition: the committed offset advanced past the record.
    assert_eq!(consumer.committed_offset(&topic, 0), Some(0));

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Kafka broker"]
async fn i64_record_is_consumed_typed() {
    let topic = unique_topic("kafka-utility-long");
    let key = 424242i64;
    let value = 9000i64;

    let consumer = ManagedConsumer::<i64, i64, _, _>::connect(
        consumer_config(&topic),
        I64Deserializer,
        I64Deserializer,
    )
    .unwrap();
    consumer.run().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(AtomicUsize::new(0));

    let seen_clone = seen.clone();
    consumer.on_record_processed(move |record| {
        seen_clone
            .lock()
            .unwrap()
            .push((record.key().copied(), *record.value()));
    });
    let failures_clone = failures.clone();
    consumer.on_consume_errored(move |_| {
        failures_clone.fetch_add(1, Ordering::SeqCst);
    });
    let failures_clone = failures.clone();
    consumer.on_commit_errored(move |_, _| {
        failures_clone.fetch_add(1, Ordering::SeqCst);
    });
    let failures_clone = failures.clone();
    consumer.on_process_errored(move |_, _| {
        failures_clone.fetch_add(1, Ordering::SeqCst);
    });

    produce(
        &producer(),
        &topic,
        &key.to_be_bytes(),
        &value.to_be_bytes(),
    )
    .await;

    assert!(wait_for(|| !seen.lock().unwrap().is_empty(), Duration::from_secs(30)).await);
    assert_eq!(*seen.lock().unwrap(), vec![(Some(key), value)]);
    assert_eq!(failures.load(Ordering::SeqCst), 0);

    consumer.shutdown().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Kafka broker"]
async fn no_events_fire_after_cancellation() {
    let topic = unique_topic("kafka-utility-cancel");

    let consumer = ManagedConsumer::<String, String, _, _>::connect(
        consumer_config(&topic),
        StringDeserializer,
        StringDeserializer,
    )
    .unwrap();

    let cancellation = CancellationToken::new();
    consumer.run_with_cancellation(cancellation.clone()).unwrap();

    let events = Arc::new(AtomicUsize::new(0));
    let events_clone = events.clone();
    consumer.on_record_processed(move |_| {
        events_clone.fetch_add(1, Ordering::SeqCst);
    });
    let events_clone = events.clone();
    consumer.on_consume_errored(move |_| {
        events_clone.fetch_add(1, Ordering::SeqCst);
    });

    // Let the group stabilize, then cancel before producing anything.
    tokio::time::sleep(Duration::from_secs(2)).await;
    cancellation.cancel();
    consumer.shutdown().await.unwrap();

    let producer = producer();
    for _ in 0..10 {
        produce(&producer, &topic, b"late", b"record").await;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(events.load(Ordering::SeqCst), 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires a running Kafka broker"]
async fn multiple_records_are_all_consumed() {
    let topic = unique_topic("kafka-utility-multi");
    let pairs: Vec<(String, String)> = (0..5).map(|_| (random_string(), random_string())).collect();

    let consumer = ManagedConsumer::<String, String, _, _>::connect(
        consumer_config(&topic),
        StringDeserializer,
        StringDeserializer,
    )
    .unwrap();
    consumer.run().unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    consumer.on_record_processed(move |record| {
        seen_clone.lock().unwrap().push((
            record.key().cloned().unwrap_or_default(),
            record.value().clone(),
        ));
    });

    let producer = producer();
    for (key, value) in &pairs {
        produce(&producer, &topic, key.as_bytes(), value.as_bytes()).await;
    }

    assert!(wait_for(|| seen.lock().unwrap().len() == pairs.len(), Duration::from_secs(30)).await);

    let mut produced = pairs.clone();
    let mut observed = seen.lock().unwrap().clone();
    produced.sort();
    observed.sort();
    assert_eq!(observed, produced);

    consumer.shutdown().await.unwrap();
}
