//! Synthesis queue integration tests

use std::sync::Arc;
use std::time::Duration;

use parley::Error;
use parley::engine::{InferenceResource, VoiceEngine};
use parley::voice::{
    OverflowPolicy, ProfileOptions, ProfileStore, SynthesisOptions, SynthesisQueue, Synthesizer,
};
use tempfile::TempDir;

mod common;
use common::{MockVoiceEngine, write_sample};

struct Fixture {
    queue: SynthesisQueue,
    profile_id: String,
    _dir: TempDir,
}

async fn fixture(voice: Arc<MockVoiceEngine>, capacity: usize, overflow: OverflowPolicy) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let voice: Arc<dyn VoiceEngine> = voice;
    let resource = InferenceResource::new(voice);
    let timeout = Duration::from_secs(5);

    let store = Arc::new(
        ProfileStore::open(dir.path().join("profiles.json"), resource.clone(), timeout).unwrap(),
    );
    let sample = vec![write_sample(dir.path(), "voice.wav")];
    let profile = store
        .create_profile("Speaker", &sample, ProfileOptions::default())
        .await
        .unwrap();

    Fixture {
        queue: SynthesisQueue::new(Synthesizer::new(store, resource, timeout), capacity, overflow),
        profile_id: profile.id,
        _dir: dir,
    }
}

fn live(session: &str) -> SynthesisOptions {
    SynthesisOptions {
        language: "es".to_string(),
        real_time: true,
        session_id: Some(session.to_string()),
        ..SynthesisOptions::default()
    }
}

fn spawn_submit(
    queue: &SynthesisQueue,
    text: &str,
    profile_id: &str,
    options: SynthesisOptions,
) -> tokio::task::JoinHandle<parley::Result<parley::voice::VoiceCloneResult>> {
    let queue = queue.clone();
    let text = text.to_string();
    let profile_id = profile_id.to_string();
    tokio::spawn(async move { queue.submit(text, profile_id, options).await })
}

#[tokio::test]
async fn test_requests_run_in_submission_order() {
    let voice = Arc::new(MockVoiceEngine::new().with_delay(Duration::from_millis(10)));
    let f = fixture(Arc::clone(&voice), 16, OverflowPolicy::DropOldest).await;
    let id = f.profile_id.as_str();

    let (one, two, three) = tokio::join!(
        f.queue.submit("one", id, SynthesisOptions::default()),
        f.queue.submit("two", id, SynthesisOptions::default()),
        f.queue.submit("three", id, SynthesisOptions::default()),
    );

    assert!(one.is_ok() && two.is_ok() && three.is_ok());
    assert_eq!(voice.synthesized(), ["one", "two", "three"]);
    assert!(f.queue.is_empty());
}

#[tokio::test]
async fn test_failed_request_does_not_block_queue() {
    let voice = Arc::new(MockVoiceEngine::new().failing_on("two"));
    let f = fixture(Arc::clone(&voice), 16, OverflowPolicy::DropOldest).await;
    let id = f.profile_id.as_str();

    let (one, two, three) = tokio::join!(
        f.queue.submit("one", id, SynthesisOptions::default()),
        f.queue.submit("two", id, SynthesisOptions::default()),
        f.queue.submit("three", id, SynthesisOptions::default()),
    );

    assert!(one.is_ok());
    assert!(matches!(two, Err(Error::SynthesisFailed(_))));
    let three = three.unwrap();
    assert!(three.duration_secs > 0.0);
    assert!((0.0..=1.0).contains(&three.similarity));
}

#[tokio::test]
async fn test_unknown_profile_fails_alone() {
    let voice = Arc::new(MockVoiceEngine::new());
    let f = fixture(voice, 16, OverflowPolicy::DropOldest).await;

    let err = f
        .queue
        .submit("hola", "missing", SynthesisOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProfileNotFound(_)));

    let ok = f
        .queue
        .submit("hola", f.profile_id.as_str(), SynthesisOptions::default())
        .await;
    assert!(ok.is_ok());
}

#[tokio::test]
async fn test_full_queue_rejects_new_requests() {
    let voice = Arc::new(MockVoiceEngine::new().with_delay(Duration::from_millis(300)));
    let f = fixture(voice, 1, OverflowPolicy::RejectNew).await;

    let first = spawn_submit(&f.queue, "first", &f.profile_id, SynthesisOptions::default());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = spawn_submit(&f.queue, "second", &f.profile_id, SynthesisOptions::default());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(f.queue.len(), 1);

    let err = f
        .queue
        .submit("third", f.profile_id.as_str(), SynthesisOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QueueFull { capacity: 1 }));

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_full_queue_drops_oldest_real_time_request() {
    let voice = Arc::new(MockVoiceEngine::new().with_delay(Duration::from_millis(300)));
    let f = fixture(Arc::clone(&voice), 1, OverflowPolicy::DropOldest).await;

    let first = spawn_submit(&f.queue, "first", &f.profile_id, live("call"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stale = spawn_submit(&f.queue, "stale", &f.profile_id, live("call"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fresh = f
        .queue
        .submit("fresh", f.profile_id.as_str(), live("call"))
        .await;

    assert!(fresh.is_ok());
    assert!(matches!(stale.await.unwrap(), Err(Error::Cancelled)));
    assert!(first.await.unwrap().is_ok());
    assert_eq!(voice.synthesized(), ["first", "fresh"]);
}

#[tokio::test]
async fn test_cancel_session_leaves_in_flight_request() {
    let voice = Arc::new(MockVoiceEngine::new().with_delay(Duration::from_millis(200)));
    let f = fixture(Arc::clone(&voice), 16, OverflowPolicy::DropOldest).await;

    let in_flight = spawn_submit(&f.queue, "speaking", &f.profile_id, live("call-a"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    let a = spawn_submit(&f.queue, "pending a", &f.profile_id, live("call-a"));
    let b = spawn_submit(&f.queue, "pending b", &f.profile_id, live("call-b"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(f.queue.len(), 2);

    assert_eq!(f.queue.cancel_session("call-a"), 1);
    assert!(matches!(a.await.unwrap(), Err(Error::Cancelled)));
    assert!(in_flight.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
    assert_eq!(voice.synthesized(), ["speaking", "pending b"]);
}
