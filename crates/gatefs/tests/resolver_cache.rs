//! Cache behavior of the resolver: handle reuse, TTL and
//! credential-derived expiry, LRU eviction, and single construction
//! under contention.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{CountingFactory, ManualClock, MockCatalog, MockClient};
use gatefs::{Credential, Error, FilesetIdent, FilesetResolver, GvfsOptions};

fn ident() -> FilesetIdent {
    FilesetIdent::extract("lake", "fileset/cat/sch/fs").expect("ident")
}

fn resolver_with(
    client: Arc<MockClient>,
    factory: Arc<CountingFactory>,
    clock: Arc<ManualClock>,
    options: GvfsOptions,
) -> FilesetResolver {
    FilesetResolver::with_clock(client, factory, options, clock)
}

#[tokio::test]
async fn backend_handle_is_reused_within_ttl() {
    let mut catalog = MockCatalog::new("s3a://bucket/root");
    catalog.credentials = vec![Credential::S3SecretKey {
        access_key_id: "ak".into(),
        secret_access_key: "sk".into(),
    }];
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(1_000_000);
    let resolver = resolver_with(client, factory.clone(), clock.clone(), GvfsOptions::default());

    let catalog = resolver.catalog("cat").await.expect("catalog");
    let id = ident();
    for _ in 0..5 {
        resolver
            .backend("s3a://bucket/root", &catalog, &id, None)
            .await
            .expect("backend");
    }
    assert_eq!(factory.build_count(), 1);
}

#[tokio::test]
async fn ttl_expiry_rebuilds_exactly_once() {
    let mut catalog = MockCatalog::new("s3a://bucket/root");
    catalog.credentials = vec![Credential::S3SecretKey {
        access_key_id: "ak".into(),
        secret_access_key: "sk".into(),
    }];
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(1_000_000);
    let options = GvfsOptions {
        cache_ttl_secs: 60,
        ..GvfsOptions::default()
    };
    let resolver = resolver_with(client, factory.clone(), clock.clone(), options);

    let catalog = resolver.catalog("cat").await.expect("catalog");
    let id = ident();
    resolver
        .backend("s3a://bucket/root", &catalog, &id, None)
        .await
        .expect("backend");
    assert_eq!(factory.build_count(), 1);

    // One millisecond short of the TTL the handle is still live.
    clock.advance(59_999);
    resolver
        .backend("s3a://bucket/root", &catalog, &id, None)
        .await
        .expect("backend");
    assert_eq!(factory.build_count(), 1);

    clock.advance(1);
    resolver
        .backend("s3a://bucket/root", &catalog, &id, None)
        .await
        .expect("backend");
    assert_eq!(factory.build_count(), 2);

    // The rebuilt handle is reused in turn.
    resolver
        .backend("s3a://bucket/root", &catalog, &id, None)
        .await
        .expect("backend");
    assert_eq!(factory.build_count(), 2);
}

#[tokio::test]
async fn credential_expiry_ratio_bounds_handle_lifetime() {
    let clock = ManualClock::new(1_000_000);
    let mut catalog = MockCatalog::new("s3a://bucket/root");
    // Credential good for 100 seconds; at ratio 0.5 the handle dies
    // after 50.
    catalog.credentials = vec![Credential::S3Token {
        access_key_id: "ak".into(),
        secret_access_key: "sk".into(),
        session_token: "tok".into(),
        expires_at_ms: 1_000_000 + 100_000,
    }];
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let resolver = resolver_with(client, factory.clone(), clock.clone(), GvfsOptions::default());

    let catalog = resolver.catalog("cat").await.expect("catalog");
    let id = ident();
    resolver
        .backend("s3a://bucket/root", &catalog, &id, None)
        .await
        .expect("backend");
    assert_eq!(factory.build_count(), 1);

    clock.advance(49_999);
    resolver
        .backend("s3a://bucket/root", &catalog, &id, None)
        .await
        .expect("backend");
    assert_eq!(factory.build_count(), 1);

    clock.advance(1);
    resolver
        .backend("s3a://bucket/root", &catalog, &id, None)
        .await
        .expect("backend");
    assert_eq!(factory.build_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_resolutions_construct_once() {
    let mut catalog = MockCatalog::new("s3a://bucket/root");
    catalog.credentials = vec![Credential::S3SecretKey {
        access_key_id: "ak".into(),
        secret_access_key: "sk".into(),
    }];
    // Slow construction wide open so every task arrives while the first
    // one is still building.
    catalog.credential_delay = Some(Duration::from_millis(50));
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(1_000_000);
    let resolver = Arc::new(resolver_with(
        client,
        factory.clone(),
        clock,
        GvfsOptions::default(),
    ));

    let catalog = resolver.catalog("cat").await.expect("catalog");
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let resolver = resolver.clone();
        let catalog = catalog.clone();
        tasks.push(tokio::spawn(async move {
            resolver
                .backend("s3a://bucket/root", &catalog, &ident(), None)
                .await
                .expect("backend");
        }));
    }
    for task in tasks {
        task.await.expect("join");
    }
    assert_eq!(factory.build_count(), 1);
}

#[tokio::test]
async fn catalog_cache_evicts_least_recently_used() {
    let mut client = MockClient::default();
    for name in ["a", "b", "c"] {
        client.catalogs.insert(
            name.to_string(),
            Arc::new(MockCatalog::new("s3a://bucket/root")),
        );
    }
    let client = Arc::new(client);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(0);
    let options = GvfsOptions {
        catalog_cache_max_entries: 2,
        ..GvfsOptions::default()
    };
    let resolver = resolver_with(client.clone(), factory, clock, options);

    resolver.catalog("a").await.expect("a");
    resolver.catalog("b").await.expect("b");
    // Touch "a" so "b" is the eviction victim when "c" arrives.
    resolver.catalog("a").await.expect("a");
    resolver.catalog("c").await.expect("c");

    resolver.catalog("a").await.expect("a");
    assert_eq!(client.loads_of("a"), 1);
    resolver.catalog("b").await.expect("b");
    assert_eq!(client.loads_of("b"), 2);
    assert_eq!(client.loads_of("c"), 1);
}

#[tokio::test]
async fn missing_catalog_is_not_found() {
    let client = Arc::new(MockClient::default());
    let factory = CountingFactory::new();
    let clock = ManualClock::new(0);
    let resolver = resolver_with(client, factory, clock, GvfsOptions::default());

    let err = resolver.catalog("nope").await.expect_err("missing");
    assert!(err.is_not_found());
    assert!(matches!(err, Error::CatalogNotFound(name) if name == "nope"));
}

#[tokio::test]
async fn vended_credential_wins_over_static_configuration() {
    let mut catalog = MockCatalog::new("s3a://bucket/root");
    catalog.credentials = vec![Credential::S3Token {
        access_key_id: "vended-ak".into(),
        secret_access_key: "sk".into(),
        session_token: "tok".into(),
        expires_at_ms: 0,
    }];
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(0);
    let options = GvfsOptions {
        s3: gatefs::config::S3Options {
            access_key_id: Some("static-ak".into()),
            secret_access_key: Some("static-sk".into()),
            endpoint: None,
        },
        ..GvfsOptions::default()
    };
    let resolver = resolver_with(client, factory.clone(), clock, options);

    let catalog = resolver.catalog("cat").await.expect("catalog");
    resolver
        .backend("s3a://bucket/root", &catalog, &ident(), None)
        .await
        .expect("backend");

    let spec = factory.last_spec().expect("spec");
    assert!(matches!(
        spec.credential,
        Some(Credential::S3Token { ref access_key_id, .. }) if access_key_id == "vended-ak"
    ));
}

#[tokio::test]
async fn static_configuration_backstops_unvended_credentials() {
    let catalog = MockCatalog::new("s3a://bucket/root");
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(0);
    let options = GvfsOptions {
        s3: gatefs::config::S3Options {
            access_key_id: Some("static-ak".into()),
            secret_access_key: Some("static-sk".into()),
            endpoint: None,
        },
        ..GvfsOptions::default()
    };
    let resolver = resolver_with(client, factory.clone(), clock, options);

    let catalog = resolver.catalog("cat").await.expect("catalog");
    resolver
        .backend("s3a://bucket/root", &catalog, &ident(), None)
        .await
        .expect("backend");

    let spec = factory.last_spec().expect("spec");
    assert!(matches!(
        spec.credential,
        Some(Credential::S3SecretKey { ref access_key_id, .. }) if access_key_id == "static-ak"
    ));
}

#[tokio::test]
async fn no_credential_anywhere_is_an_error() {
    let catalog = MockCatalog::new("s3a://bucket/root");
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(0);
    let resolver = resolver_with(client, factory.clone(), clock, GvfsOptions::default());

    let catalog = resolver.catalog("cat").await.expect("catalog");
    let err = resolver
        .backend("s3a://bucket/root", &catalog, &ident(), None)
        .await
        .expect_err("no credential");
    assert!(matches!(
        err,
        Error::MissingCredential {
            backend: "s3",
            option: "s3.access-key-id"
        }
    ));
    assert_eq!(factory.build_count(), 0);
}

#[tokio::test]
async fn catalog_endpoint_property_wins_over_static_endpoint() {
    let mut catalog = MockCatalog::new("s3a://bucket/root");
    catalog.credentials = vec![Credential::S3SecretKey {
        access_key_id: "ak".into(),
        secret_access_key: "sk".into(),
    }];
    catalog
        .properties
        .insert("s3-endpoint".into(), "http://minio:9000".into());
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(0);
    let options = GvfsOptions {
        s3: gatefs::config::S3Options {
            access_key_id: None,
            secret_access_key: None,
            endpoint: Some("http://elsewhere:9000".into()),
        },
        ..GvfsOptions::default()
    };
    let resolver = resolver_with(client, factory.clone(), clock, options);

    let catalog = resolver.catalog("cat").await.expect("catalog");
    resolver
        .backend("s3a://bucket/root", &catalog, &ident(), None)
        .await
        .expect("backend");

    let spec = factory.last_spec().expect("spec");
    assert_eq!(spec.endpoint.as_deref(), Some("http://minio:9000"));
}

#[tokio::test]
async fn local_backend_needs_no_credential() {
    let catalog = MockCatalog::new("file:/tmp/root");
    let client = MockClient::with_catalog("cat", catalog);
    let factory = CountingFactory::new();
    let clock = ManualClock::new(0);
    let resolver = resolver_with(client, factory.clone(), clock, GvfsOptions::default());

    let catalog = resolver.catalog("cat").await.expect("catalog");
    resolver
        .backend("file:/tmp/root", &catalog, &ident(), None)
        .await
        .expect("backend");

    let spec = factory.last_spec().expect("spec");
    assert!(spec.credential.is_none());
    assert!(spec.endpoint.is_none());
}
