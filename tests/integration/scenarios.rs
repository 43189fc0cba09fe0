//! End-to-end scenarios over the in-memory backends

use std::sync::Arc;
use sticky::cache::{CacheStorage, DiskCacheStorage, MemoryCacheStorage};
use sticky::config::ProxyConfig;
use sticky::integrity::{DigestScheme, Integrity};
use sticky::manifest::Manifest;
use sticky::net::{CacheMode, MemoryNetwork, Response};
use sticky::proxy::Proxy;
use sticky::store::{KeyValueStore, MemoryStore, VersionStore};
use sticky::worker::{LocalWorkerHost, Phase, UpdateCoordinator, Version, WorkerHost};
use sticky::StickyError;
use url::Url;

const ORIGIN: &str = "https://example.com";
const SCRIPT: &str = "https://example.com/sw.js";
const IMMUTABLE: &str = "public, max-age=31536000, immutable";

fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

/// An origin serving `files` and a manifest that lists them
fn site(files: &[(&str, &str)]) -> (Arc<MemoryNetwork>, Manifest) {
    let network = Arc::new(MemoryNetwork::new());
    let mut manifest = Manifest::new(DigestScheme::TransportIntegrity);
    for (path, body) in files {
        network.route(url(path).as_str(), Response::new(200, *body));
        manifest
            .insert(path, Integrity::compute(body.as_bytes(), DigestScheme::TransportIntegrity))
            .unwrap();
    }
    (network, manifest)
}

fn proxy(network: Arc<MemoryNetwork>, manifest: Manifest, storage: Arc<dyn CacheStorage>) -> Proxy {
    Proxy::new(
        Url::parse(ORIGIN).unwrap(),
        manifest,
        &ProxyConfig::default(),
        network,
        storage,
    )
    .unwrap()
}

#[tokio::test]
async fn verified_entries_are_served_without_network() {
    let (network, manifest) = site(&[("/index.html", "<h1>home</h1>"), ("/app.js", "run()")]);
    let proxy = proxy(network.clone(), manifest, Arc::new(MemoryCacheStorage::new()));

    let report = proxy.install(|_, _| {}).await.unwrap();
    assert_eq!(report.entries, 2);
    let fetched = network.total_hits();

    network.set_offline(true);
    for _ in 0..3 {
        let response = proxy
            .handle(&url("/"), CacheMode::Default)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.body, b"<h1>home</h1>");
    }
    assert_eq!(network.total_hits(), fetched);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_one_disk_generation() {
    let dir = tempfile::TempDir::new().unwrap();
    let body = "x".repeat(128 * 1024);
    let (network, manifest) = site(&[("/bundle.js", body.as_str())]);
    let storage = Arc::new(DiskCacheStorage::new(dir.path().join("caches")));
    let proxy = Arc::new(proxy(network.clone(), manifest, storage.clone()));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let proxy = proxy.clone();
            tokio::spawn(async move {
                proxy
                    .handle(&url("/bundle.js"), CacheMode::Default)
                    .await
                    .unwrap()
                    .unwrap()
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().body, body.as_bytes());
    }

    network.set_offline(true);
    let cached = storage
        .lookup(proxy.generations().name(), url("/bundle.js").as_str())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.body, body.as_bytes());
}

#[tokio::test]
async fn first_fallback_hit_wins() {
    let (network, manifest) = site(&[
        ("/about/index.html", "dir"),
        ("/about.html", "suffix"),
        ("/about/_index.html", "hidden"),
    ]);
    let proxy = proxy(network.clone(), manifest, Arc::new(MemoryCacheStorage::new()));

    let response = proxy
        .handle(&url("/about/"), CacheMode::Default)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.body, b"dir");
    assert_eq!(network.hits(url("/about/index.html").as_str()), 1);
    assert_eq!(network.hits(url("/about.html").as_str()), 0);
    assert_eq!(network.hits(url("/about/_index.html").as_str()), 0);
}

#[tokio::test]
async fn tampered_content_is_never_cached() {
    let (network, manifest) = site(&[("/app.js", "run()")]);
    network.route(url("/app.js").as_str(), Response::new(200, "steal()"));
    let storage = Arc::new(MemoryCacheStorage::new());
    let proxy = proxy(network, manifest, storage.clone());

    let err = proxy
        .handle(&url("/app.js"), CacheMode::Default)
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, StickyError::IntegrityMismatch { .. }));

    let generation = proxy.generations().name();
    assert!(storage
        .lookup(generation, url("/app.js").as_str())
        .await
        .unwrap()
        .is_none());

    let response = proxy
        .respond(&url("/app.js"), CacheMode::Default)
        .await
        .unwrap();
    assert_eq!(response.status, 500);
    assert_ne!(response.body, b"steal()");
}

#[tokio::test]
async fn new_deployment_replaces_old_generation() {
    let storage = Arc::new(MemoryCacheStorage::new());

    let (old_network, old_manifest) = site(&[("/index.html", "v1")]);
    let old = proxy(old_network, old_manifest, storage.clone());
    old.install(|_, _| {}).await.unwrap();
    old.activate().await.unwrap();

    storage.open("foreign-cache").await.unwrap();

    let (new_network, new_manifest) = site(&[("/index.html", "v2")]);
    let new = proxy(new_network, new_manifest, storage.clone());
    new.install(|_, _| {}).await.unwrap();
    let deleted = new.activate().await.unwrap();

    assert_eq!(deleted, vec![old.generations().name().to_string()]);
    let mut names = storage.names().await.unwrap();
    names.sort();
    assert_eq!(
        names,
        vec![new.generations().name().to_string(), "foreign-cache".to_string()]
    );
}

struct Client {
    host: Arc<LocalWorkerHost>,
    coordinator: Arc<UpdateCoordinator>,
    listener: tokio::task::JoinHandle<()>,
}

impl Client {
    fn start(network: Arc<MemoryNetwork>, store: Arc<MemoryStore>) -> Self {
        let (host, events) = LocalWorkerHost::in_memory(network.clone());
        let host = Arc::new(host);
        let coordinator = Arc::new(
            UpdateCoordinator::new(
                Url::parse(SCRIPT).unwrap(),
                &ProxyConfig::default(),
                network,
                host.clone(),
                store,
            )
            .unwrap(),
        );
        let listener = coordinator.clone().listen(events);
        Self {
            host,
            coordinator,
            listener,
        }
    }

    async fn stop(self) {
        self.host.close();
        self.listener.await.unwrap();
    }
}

/// Serve `body` as the canonical script and at its versioned URL
fn publish(network: &MemoryNetwork, body: &str) -> Version {
    let version = Version::of_script(body.as_bytes(), 6);
    let script = Response::new(200, body).with_header("cache-control", IMMUTABLE);
    network.route(SCRIPT, script.clone());
    network.route(&format!("{}/sw.{}.js", ORIGIN, version), script);
    version
}

#[tokio::test]
async fn pinned_worker_changes_only_on_applied_update() {
    let network = Arc::new(MemoryNetwork::new());
    let v1 = publish(&network, "self.version = 1");
    let client = Client::start(network.clone(), Arc::new(MemoryStore::new()));

    client.coordinator.register().await.unwrap();
    let v2 = publish(&network, "self.version = 2");

    let update = client
        .coordinator
        .check_for_update()
        .await
        .unwrap()
        .unwrap();
    assert_eq!((update.current.clone(), update.latest.clone()), (v1.clone(), v2.clone()));
    let active = client.host.active().await.unwrap().unwrap();
    assert_eq!(active.script_url, format!("{}/sw.{}.js", ORIGIN, v1));

    assert!(client.coordinator.apply_update(&update).await.unwrap());
    let active = client.host.active().await.unwrap().unwrap();
    assert_eq!(active.script_url, format!("{}/sw.{}.js", ORIGIN, v2));
    assert_eq!(client.coordinator.phase(), Phase::Pinned(v2.clone()));

    // A second updater sees the pin already advanced
    assert!(!client.coordinator.apply_update(&update).await.unwrap());
    client.stop().await;
}

#[tokio::test]
async fn unsolicited_install_bricks_the_client() {
    let network = Arc::new(MemoryNetwork::new());
    let v0 = Version::new("000000");
    let v1 = publish(&network, "self.version = 1");

    let store = Arc::new(MemoryStore::new());
    let versions = VersionStore::new(store.clone(), "");
    versions.set_current(Some(&v0)).unwrap();
    versions.set_pending(Some(&v1)).unwrap();

    let Client {
        host,
        coordinator,
        listener,
        ..
    } = Client::start(network.clone(), store.clone());
    let attacker_url = Url::parse(&format!("{}/sw.{}.js", ORIGIN, v1)).unwrap();
    host.install_unsolicited(&attacker_url).await.unwrap();
    host.close();
    listener.await.unwrap();

    assert_eq!(coordinator.phase(), Phase::Bricked);
    let state = coordinator.versions().state().unwrap();
    assert!(state.bricked);
    assert!(state.current_version.is_none());
    assert!(state.pending_version.is_none());
    assert_eq!(store.keys().unwrap().len(), 1);
    assert!(host.active().await.unwrap().is_none());

    let hits = network.total_hits();
    for _ in 0..2 {
        let err = coordinator.register().await.unwrap_err();
        assert!(matches!(err, StickyError::Bricked));
    }
    assert_eq!(network.total_hits(), hits);

    // A restarted client stays bricked
    let restarted = Client::start(network.clone(), store);
    assert!(matches!(
        restarted.coordinator.register().await.unwrap_err(),
        StickyError::Bricked
    ));
    assert_eq!(network.total_hits(), hits);
    restarted.stop().await;
}
