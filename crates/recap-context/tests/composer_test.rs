use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use recap_context::{
    Digest, DigestComposer, DigestSettings, FailureCause, GenerationError, GenerationGateway,
    GenerationRequest, PromptBook,
};
use recap_store::{BucketKey, ChatMessage, ConversationStore};

/// What the stub saw on each call
#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Bucket { key: BucketKey, messages: usize },
    Merge { sections: usize },
}

/// Deterministic gateway: `S(n)` for a bucket of n messages, `MERGE(k)` for
/// a reduce over k tagged summaries. Can be told to fail on the n-th call.
#[derive(Default)]
struct StubGateway {
    calls: Mutex<Vec<Call>>,
    budgets: Mutex<Vec<u32>>,
    counter: AtomicUsize,
    fail_on_call: Mutex<Option<usize>>,
    yield_first: bool,
}

impl StubGateway {
    fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Mutex::new(Some(call)),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn budgets(&self) -> Vec<u32> {
        self.budgets.lock().unwrap().clone()
    }

    fn bucket_calls(&self, key: BucketKey) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Bucket { key: k, .. } if *k == key))
            .count()
    }
}

#[async_trait]
impl GenerationGateway for StubGateway {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        if self.yield_first {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;

        let fail_now = {
            let mut fail = self.fail_on_call.lock().unwrap();
            if *fail == Some(n) {
                *fail = None;
                true
            } else {
                false
            }
        };

        let prompt = &request.user_prompt;
        let (call, reply) = if let Some((_, json)) = prompt.split_once("Messages:\n") {
            let messages: Vec<ChatMessage> = serde_json::from_str(json).expect("messages json");
            let key = BucketKey::from_timestamp(messages[0].created_at);
            (
                Call::Bucket { key, messages: messages.len() },
                format!("S({})", messages.len()),
            )
        } else {
            let sections = prompt.matches(" UTC]").count();
            (Call::Merge { sections }, format!("MERGE({})", sections))
        };

        if fail_now {
            return Err(GenerationError::new(FailureCause::Status, "stubbed 503"));
        }
        self.calls.lock().unwrap().push(call);
        self.budgets.lock().unwrap().push(request.max_output_tokens);
        Ok(reply)
    }
}

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
}

fn key(hour: u32) -> BucketKey {
    BucketKey::from_timestamp(at(hour, 0))
}

fn setup(gateway: Arc<StubGateway>) -> (Arc<ConversationStore>, DigestComposer) {
    let store = Arc::new(ConversationStore::new());
    let settings = DigestSettings {
        call_delay: Duration::ZERO,
        ..DigestSettings::default()
    };
    let composer = DigestComposer::new(store.clone(), gateway, Arc::new(PromptBook::default()), settings);
    (store, composer)
}

fn ingest(store: &ConversationStore, id: i64, ts: DateTime<Utc>) {
    store
        .messages()
        .append(ChatMessage::new(7, id, 100 + id, format!("user{}", id), format!("text {}", id), ts));
}

#[tokio::test]
async fn test_two_bucket_window_maps_then_reduces() {
    let gateway = Arc::new(StubGateway::default());
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(10, 5));
    ingest(&store, 2, at(10, 40));
    ingest(&store, 3, at(11, 10));

    let digest = composer.digest_window(7, at(10, 0), at(12, 0)).await.unwrap();

    assert_eq!(
        digest,
        Digest::Merged {
            buckets: vec![key(10), key(11)],
            text: "MERGE(2)".to_string(),
        }
    );
    assert_eq!(store.summaries().try_get(7, key(10)).as_deref(), Some("S(2)"));
    assert_eq!(store.summaries().try_get(7, key(11)).as_deref(), Some("S(1)"));
    assert_eq!(
        gateway.calls(),
        vec![
            Call::Bucket { key: key(10), messages: 2 },
            Call::Bucket { key: key(11), messages: 1 },
            Call::Merge { sections: 2 },
        ]
    );
}

#[tokio::test]
async fn test_empty_window_makes_no_calls() {
    let gateway = Arc::new(StubGateway::default());
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(8, 0));

    let digest = composer.digest_window(7, at(10, 0), at(12, 0)).await.unwrap();

    assert_eq!(digest, Digest::Empty);
    assert!(digest.text().is_none());
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_conversation_is_empty() {
    let gateway = Arc::new(StubGateway::default());
    let (_store, composer) = setup(gateway.clone());

    let digest = composer.digest_window(404, at(10, 0), at(12, 0)).await.unwrap();

    assert_eq!(digest, Digest::Empty);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_fully_cached_window_makes_no_further_calls() {
    let gateway = Arc::new(StubGateway::default());
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(10, 5));
    ingest(&store, 2, at(11, 10));
    ingest(&store, 3, at(12, 15));

    let first = composer.digest_window(7, at(10, 0), at(13, 0)).await.unwrap();
    let calls_after_first = gateway.calls().len();
    let second = composer.digest_window(7, at(10, 0), at(13, 0)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(gateway.calls().len(), calls_after_first);
}

#[tokio::test]
async fn test_cached_bucket_is_not_recomputed_for_late_messages() {
    let gateway = Arc::new(StubGateway::default());
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(10, 5));

    let first = composer.digest_window(7, at(10, 0), at(11, 0)).await.unwrap();
    ingest(&store, 2, at(10, 50));
    let second = composer.digest_window(7, at(10, 0), at(11, 0)).await.unwrap();

    assert_eq!(first.text(), Some("S(1)"));
    assert_eq!(second.text(), Some("S(1)"));
    assert_eq!(gateway.bucket_calls(key(10)), 1);
}

#[tokio::test]
async fn test_overlapping_requests_generate_each_bucket_once() {
    let gateway = Arc::new(StubGateway {
        yield_first: true,
        ..StubGateway::default()
    });
    let (store, composer) = setup(gateway.clone());
    let composer = Arc::new(composer);
    ingest(&store, 1, at(9, 30));
    ingest(&store, 2, at(10, 5));
    ingest(&store, 3, at(11, 10));

    let windows = [
        (at(9, 0), at(12, 0)),
        (at(10, 0), at(12, 0)),
        (at(10, 0), at(11, 0)),
        (at(9, 0), at(11, 0)),
        (at(9, 0), at(12, 0)),
    ];
    let handles: Vec<_> = windows
        .into_iter()
        .map(|(start, end)| {
            let composer = composer.clone();
            tokio::spawn(async move { composer.digest_window(7, start, end).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for hour in [9, 10, 11] {
        assert_eq!(gateway.bucket_calls(key(hour)), 1, "bucket {hour}");
    }
}

#[tokio::test]
async fn test_map_failure_keeps_earlier_buckets_cached() {
    // Second call of the first request fails: bucket 11 of {10, 11, 12}.
    let gateway = Arc::new(StubGateway::failing_on(2));
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(10, 5));
    ingest(&store, 2, at(11, 10));
    ingest(&store, 3, at(12, 15));

    let err = composer.digest_window(7, at(10, 0), at(13, 0)).await.unwrap_err();
    assert_eq!(err.cause(), FailureCause::Status);
    assert_eq!(store.summaries().keys(7), vec![key(10)]);

    composer.digest_window(7, at(10, 0), at(13, 0)).await.unwrap();

    assert_eq!(gateway.bucket_calls(key(10)), 1);
    assert_eq!(gateway.bucket_calls(key(11)), 1);
    assert_eq!(gateway.bucket_calls(key(12)), 1);
}

#[tokio::test]
async fn test_reduce_failure_keeps_all_bucket_summaries() {
    // Calls 1 and 2 are the buckets, call 3 is the reduce.
    let gateway = Arc::new(StubGateway::failing_on(3));
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(10, 5));
    ingest(&store, 2, at(11, 10));

    let err = composer.digest_window(7, at(10, 0), at(12, 0)).await.unwrap_err();
    assert!(err.to_string().contains("generation failed"));
    assert_eq!(store.summaries().keys(7), vec![key(10), key(11)]);

    let digest = composer.digest_window(7, at(10, 0), at(12, 0)).await.unwrap();
    assert_eq!(digest.text(), Some("MERGE(2)"));
    assert_eq!(gateway.bucket_calls(key(10)), 1);
    assert_eq!(gateway.bucket_calls(key(11)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_uncached_buckets_are_paced() {
    let gateway = Arc::new(StubGateway::default());
    let store = Arc::new(ConversationStore::new());
    let settings = DigestSettings {
        call_delay: Duration::from_secs(2),
        ..DigestSettings::default()
    };
    let composer = DigestComposer::new(store.clone(), gateway.clone(), Arc::new(PromptBook::default()), settings);
    ingest(&store, 1, at(10, 5));
    ingest(&store, 2, at(11, 10));
    ingest(&store, 3, at(12, 15));

    let started = tokio::time::Instant::now();
    composer.digest_window(7, at(10, 0), at(13, 0)).await.unwrap();

    // Three uncached buckets, two pauses between them.
    assert!(started.elapsed() >= Duration::from_secs(4));
}

#[tokio::test]
async fn test_prompt_override_applies_to_bucket_generation() {
    #[derive(Default)]
    struct PromptCapture(Mutex<Vec<String>>);

    #[async_trait]
    impl GenerationGateway for PromptCapture {
        async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
            self.0.lock().unwrap().push(request.user_prompt);
            Ok("x".to_string())
        }
    }

    let gateway = Arc::new(PromptCapture::default());
    let store = Arc::new(ConversationStore::new());
    let prompts = Arc::new(PromptBook::default());
    prompts.set_prompt(recap_context::PromptKind::Summary, "only facts").await;
    let composer = DigestComposer::new(store.clone(), gateway.clone(), prompts, DigestSettings::default());
    ingest(&store, 1, at(10, 5));

    composer.digest_window(7, at(10, 0), at(11, 0)).await.unwrap();

    assert!(gateway.0.lock().unwrap()[0].starts_with("only facts"));
}

#[tokio::test(start_paused = true)]
async fn test_aborted_map_stage_keeps_finished_buckets() {
    let gateway = Arc::new(StubGateway::default());
    let store = Arc::new(ConversationStore::new());
    let settings = DigestSettings {
        call_delay: Duration::from_secs(10),
        ..DigestSettings::default()
    };
    let composer = Arc::new(DigestComposer::new(
        store.clone(),
        gateway.clone(),
        Arc::new(PromptBook::default()),
        settings,
    ));
    ingest(&store, 1, at(10, 5));
    ingest(&store, 2, at(11, 10));
    ingest(&store, 3, at(12, 15));

    let request = tokio::spawn({
        let composer = composer.clone();
        async move { composer.digest_window(7, at(10, 0), at(13, 0)).await }
    });
    // Bucket 10 is generated right away, bucket 11 waits out the pause.
    tokio::time::sleep(Duration::from_secs(5)).await;
    request.abort();
    assert!(request.await.unwrap_err().is_cancelled());

    assert_eq!(store.summaries().keys(7), vec![key(10)]);

    let digest = composer.digest_window(7, at(10, 0), at(13, 0)).await.unwrap();
    assert_eq!(digest.text(), Some("MERGE(3)"));
    assert_eq!(
        gateway.calls(),
        vec![
            Call::Bucket { key: key(10), messages: 1 },
            Call::Bucket { key: key(11), messages: 1 },
            Call::Bucket { key: key(12), messages: 1 },
            Call::Merge { sections: 3 },
        ]
    );
}

#[tokio::test]
async fn test_last_hour_across_two_buckets_is_one_answer() {
    let gateway = Arc::new(StubGateway::default());
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(9, 20));
    ingest(&store, 2, at(9, 45));
    ingest(&store, 3, at(10, 15));

    let digest = composer.digest_last_hour(7, at(10, 30)).await.unwrap();

    assert_eq!(
        digest,
        Digest::Single {
            bucket: key(10),
            text: "S(2)".to_string(),
        }
    );
    assert_eq!(gateway.calls(), vec![Call::Bucket { key: key(9), messages: 2 }]);
    assert_eq!(gateway.budgets(), vec![500]);
    assert!(store.summaries().keys(7).is_empty());
}

#[tokio::test]
async fn test_last_hour_inside_one_bucket_reuses_bucket_summary() {
    let gateway = Arc::new(StubGateway::default());
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(10, 5));
    ingest(&store, 2, at(10, 20));

    let first = composer.digest_last_hour(7, at(10, 30)).await.unwrap();
    let second = composer.digest_last_hour(7, at(10, 50)).await.unwrap();

    assert_eq!(first.text(), Some("S(2)"));
    assert_eq!(second, first);
    assert_eq!(gateway.budgets(), vec![500]);
    assert_eq!(store.summaries().keys(7), vec![key(10)]);
}

#[tokio::test]
async fn test_last_hour_without_messages_is_empty() {
    let gateway = Arc::new(StubGateway::default());
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(8, 0));

    assert_eq!(composer.digest_last_hour(7, at(10, 30)).await.unwrap(), Digest::Empty);
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn test_gates_released_once_conversation_is_gone() {
    let gateway = Arc::new(StubGateway::default());
    let (store, composer) = setup(gateway.clone());
    ingest(&store, 1, at(10, 5));
    composer.digest_window(7, at(10, 0), at(11, 0)).await.unwrap();

    assert_eq!(composer.release_idle_gates(), 0);

    store.messages().prune(7, at(23, 0));
    assert_eq!(composer.release_idle_gates(), 1);
    assert_eq!(composer.release_idle_gates(), 0);
}
