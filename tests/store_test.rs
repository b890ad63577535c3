use webhook_fanout::{InMemoryStore, ProxyAddress, Store};

#[tokio::test]
async fn no_proxies_means_direct_sends() {
    let store = InMemoryStore::new();
    assert_eq!(store.select_proxy().await.expect("select"), None);
}

#[tokio::test]
async fn selection_picks_least_used_and_increments_it() {
    let store = InMemoryStore::new();
    store.add_proxy("http://proxy1.test:8080", 1).await;
    store.add_proxy("http://proxy2.test:8080", 0).await;

    let selected = store.select_proxy().await.expect("select");
    assert_eq!(
        selected,
        Some(ProxyAddress::new("http://proxy2.test:8080"))
    );
    assert_eq!(store.proxy_usage("http://proxy2.test:8080").await, Some(1));
    assert_eq!(store.proxy_usage("http://proxy1.test:8080").await, Some(1));
}

#[tokio::test]
async fn ties_break_by_natural_key_order() {
    let store = InMemoryStore::new();
    store.add_proxy("http://proxy2.test:8080", 3).await;
    store.add_proxy("http://proxy1.test:8080", 3).await;

    let selected = store.select_proxy().await.expect("select");
    assert_eq!(
        selected,
        Some(ProxyAddress::new("http://proxy1.test:8080"))
    );
}

#[tokio::test]
async fn repeated_selection_rotates_across_proxies() {
    let store = InMemoryStore::new();
    store.add_proxy("http://proxy1.test:8080", 0).await;
    store.add_proxy("http://proxy2.test:8080", 0).await;

    let mut picks = Vec::new();
    for _ in 0..4 {
        let proxy = store.select_proxy().await.expect("select").expect("some proxy");
        picks.push(proxy.0);
    }

    // Counters only increase, so four selections spread evenly.
    assert_eq!(store.proxy_usage("http://proxy1.test:8080").await, Some(2));
    assert_eq!(store.proxy_usage("http://proxy2.test:8080").await, Some(2));
    assert_eq!(picks[0], "http://proxy1.test:8080");
    assert_eq!(picks[1], "http://proxy2.test:8080");
}

#[tokio::test]
async fn add_unsubscriber_is_idempotent() {
    let store = InMemoryStore::new();
    store.add_unsubscriber("12345/abcdef").await.expect("add");
    store.add_unsubscriber("12345/abcdef").await.expect("add again");

    let unsubscribers = store.unsubscribers().await.expect("read");
    assert_eq!(unsubscribers.len(), 1);
    assert!(unsubscribers.contains("12345/abcdef"));
}
