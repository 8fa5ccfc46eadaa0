use std::sync::Arc;
use std::time::Duration;

use sessionlock_session::{ReadOutcome, SessionConfig, SessionHandler};
use sessionlock_store::KeyValueStore;
use sessionlock_store_memory::MemoryStore;

fn config(spin_lock_wait: u64, lock_max_wait: u64) -> SessionConfig {
    SessionConfig {
        prefix: "sess:".into(),
        spin_lock_wait,
        lock_max_wait: Some(lock_max_wait),
        ..SessionConfig::default()
    }
}

fn handler(store: &Arc<MemoryStore>, config: &SessionConfig) -> SessionHandler<Arc<MemoryStore>> {
    SessionHandler::new(Arc::clone(store), config).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_concurrent_reader_gets_the_lock() {
    let store = Arc::new(MemoryStore::new());
    // One attempt each: losers report the lock as unavailable.
    let config = config(2_000_000, 1);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let mut handler = handler(&store, &config);
        tasks.push(tokio::spawn(async move {
            let outcome = handler.read("shared").await.unwrap();
            let token = handler.lock_token().map(str::to_owned);
            (outcome, token, handler)
        }));
    }

    let mut winners = Vec::new();
    let mut handlers = Vec::new();
    for task in tasks {
        let (outcome, token, handler) = task.await.unwrap();
        if outcome == ReadOutcome::Data(Vec::new()) {
            winners.push(token.unwrap());
        } else {
            assert_eq!(outcome, ReadOutcome::LockUnavailable);
            assert!(token.is_none());
        }
        handlers.push(handler);
    }
    assert_eq!(winners.len(), 1);

    let stored = store.get("sess:shared.lock").await.unwrap();
    assert_eq!(stored.as_deref(), Some(winners[0].as_bytes()));

    for mut handler in handlers {
        handler.close().await.unwrap();
    }
    assert!(store.get("sess:shared.lock").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn waiting_reader_proceeds_after_release() {
    let store = Arc::new(MemoryStore::new());
    let config = config(100_000, 5);

    let mut first = handler(&store, &config);
    first.read("abc").await.unwrap();
    first.write("abc", b"counter=1").await.unwrap();

    let mut second = handler(&store, &config);
    let waiter = tokio::spawn(async move {
        let outcome = second.read("abc").await.unwrap();
        (outcome, second)
    });

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(!waiter.is_finished());
    first.close().await.unwrap();

    let (outcome, mut second) = waiter.await.unwrap();
    assert_eq!(outcome.into_data().unwrap(), b"counter=1");
    assert!(second.is_locked());
    second.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn expired_holder_cannot_release_the_new_owners_lock() {
    let store = Arc::new(MemoryStore::new());
    let config = config(100_000, 1);

    let mut stale = handler(&store, &config);
    stale.read("abc").await.unwrap();
    assert!(stale.is_locked());

    // The lock TTL is 1001 ms; let it lapse.
    tokio::time::advance(Duration::from_millis(1100)).await;

    let mut fresh = handler(&store, &config);
    fresh.read("abc").await.unwrap();
    let fresh_token = fresh.lock_token().unwrap().to_owned();
    assert_ne!(stale.lock_token().unwrap(), fresh_token);

    assert!(stale.close().await.unwrap());
    assert!(!stale.is_locked());
    let stored = store.get("sess:abc.lock").await.unwrap();
    assert_eq!(stored.as_deref(), Some(fresh_token.as_bytes()));

    fresh.close().await.unwrap();
    assert!(store.get("sess:abc.lock").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn session_expires_with_configured_ttl() {
    let store = Arc::new(MemoryStore::new());
    let config = SessionConfig {
        ttl: 60,
        cookie_lifetime: 120,
        locking: false,
        ..config(100_000, 1)
    };

    let mut handler = handler(&store, &config);
    handler.write("abc", b"data").await.unwrap();
    assert_eq!(
        store.time_to_live("sess:abc"),
        Some(Duration::from_secs(120))
    );

    tokio::time::advance(Duration::from_secs(121)).await;
    assert_eq!(
        handler.read("abc").await.unwrap(),
        ReadOutcome::Data(Vec::new())
    );
}

#[tokio::test(start_paused = true)]
async fn lock_and_session_keys_without_prefix() {
    let store = Arc::new(MemoryStore::new());
    let config = SessionConfig {
        prefix: String::new(),
        ..SessionConfig::default()
    };

    let mut handler = handler(&store, &config);
    handler.read("abc").await.unwrap();
    handler.write("abc", b"data").await.unwrap();

    assert!(store.get("abc.lock").await.unwrap().is_some());
    assert_eq!(store.get("abc").await.unwrap().as_deref(), Some(&b"data"[..]));
    handler.close().await.unwrap();
}
