// Tests for concurrent admission into the result store

use gatefinder_core::ResultStore;
use gatefinder_core::store::DEFAULT_HOST_CAP;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Race `attempts` admissions for one fresh host across `threads` OS threads.
fn race_threads(attempts: usize, threads: usize) -> (Arc<ResultStore>, usize) {
    let store = Arc::new(ResultStore::default());
    let next = Arc::new(AtomicUsize::new(0));
    let admitted = Arc::new(AtomicUsize::new(0));

    thread::scope(|scope| {
        for _ in 0..threads {
            let store = store.clone();
            let next = next.clone();
            let admitted = admitted.clone();
            scope.spawn(move || {
                loop {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    if i >= attempts {
                        break;
                    }
                    if store.record_discovery("race.test", &format!("http://race.test/{i}")) {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                    if i % 7 == 0 {
                        thread::yield_now();
                    }
                }
            });
        }
    });

    let admitted = admitted.load(Ordering::SeqCst);
    (store, admitted)
}

#[test]
fn test_exactly_cap_admissions_under_thread_races() {
    for (attempts, threads) in [(501, 2), (750, 4), (1000, 8), (2000, 16), (5000, 32)] {
        let (store, admitted) = race_threads(attempts, threads);
        let host = store.host("race.test").unwrap();

        assert_eq!(admitted, DEFAULT_HOST_CAP, "{attempts} attempts on {threads} threads");
        assert_eq!(host.count, DEFAULT_HOST_CAP);
        assert_eq!(host.urls.len(), host.count);

        let unique: HashSet<_> = host.urls.iter().collect();
        assert_eq!(unique.len(), DEFAULT_HOST_CAP);
    }
}

#[test]
fn test_under_cap_everything_is_admitted() {
    let (store, admitted) = race_threads(300, 8);
    assert_eq!(admitted, 300);
    assert_eq!(store.host("race.test").unwrap().count, 300);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_exactly_cap_admissions_under_task_races() {
    let store = Arc::new(ResultStore::default());
    let mut handles = Vec::new();

    for i in 0..1200 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            if i % 3 == 0 {
                tokio::task::yield_now().await;
            }
            store.record_discovery("tasks.test", &format!("http://tasks.test/{i}"))
        }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            admitted += 1;
        }
    }

    let host = store.host("tasks.test").unwrap();
    assert_eq!(admitted, DEFAULT_HOST_CAP);
    assert_eq!(host.count, DEFAULT_HOST_CAP);
    assert_eq!(host.urls.len(), DEFAULT_HOST_CAP);
}

#[test]
fn test_concurrent_login_records_stay_within_urls() {
    let store = Arc::new(ResultStore::new(50));

    thread::scope(|scope| {
        for t in 0..8 {
            let store = store.clone();
            scope.spawn(move || {
                for i in 0..20 {
                    let url = format!("http://mixed.test/{t}/{i}");
                    if store.record_discovery("mixed.test", &url) && i % 2 == 0 {
                        store.record_login_url("mixed.test", &url);
                    }
                    let snapshot = store.snapshot();
                    if let Some(host) = snapshot.get("mixed.test") {
                        assert_eq!(host.count, host.urls.len());
                        assert!(host.count <= 50);
                        for login in &host.login_urls {
                            assert!(host.urls.contains(login));
                        }
                    }
                }
            });
        }
    });

    let host = store.host("mixed.test").unwrap();
    assert_eq!(host.count, 50);
    assert!(host.login_urls.len() <= 50);
}
