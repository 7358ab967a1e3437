//! Both transports against a live server: one contract, two protocols.

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::TryStreamExt;
use tokio::io::BufReader;
use tokio::net::TcpListener;

use vaultsync::auth::{BearerCredential, OwnerId, TokenAuthority};
use vaultsync::crypto::{open_content, seal, EncryptedEnvelope};
use vaultsync::errors::{ErrorKind, VaultSyncError};
use vaultsync::server::{self, EnvelopeStore, Limits, SecretService, ServerHandle};
use vaultsync::sync::{ItemAction, SyncEngine};
use vaultsync::transport::wire::{
    read_frame, write_frame, Metadata, RpcCall, RpcFrame,
};
use vaultsync::transport::{
    CallContext, HttpTransport, RemoteRecord, RpcTransport, SecretChannel, SecretTransport,
};
use vaultsync::vault::{LocalCache, SecretPayload, SecretStore, SecretType};

use support::{keys, login, text};

const TOKEN_SECRET: &str = "transport-tests-signing-secret";

struct Fixture {
    handle: ServerHandle,
    authority: TokenAuthority,
}

impl Fixture {
    async fn start() -> Self {
        let authority = TokenAuthority::new(TOKEN_SECRET, "vaultsync").unwrap();
        let resolver = TokenAuthority::new(TOKEN_SECRET, "vaultsync").unwrap();
        let service = Arc::new(SecretService::new(
            Arc::new(resolver),
            EnvelopeStore::in_memory().unwrap(),
        ));
        let handle = server::start("127.0.0.1:0", "127.0.0.1:0", Limits::default(), service)
            .await
            .expect("start server");
        Self { handle, authority }
    }

    fn token(&self, owner: &str) -> BearerCredential {
        self.authority
            .issue(&OwnerId::new(owner).unwrap(), Duration::from_secs(300))
            .unwrap()
    }

    fn http(&self) -> Arc<dyn SecretTransport> {
        Arc::new(HttpTransport::new(&self.handle.http_url()).unwrap())
    }

    fn rpc(&self) -> Arc<dyn SecretTransport> {
        Arc::new(RpcTransport::new(self.handle.rpc_addr().to_string()))
    }
}

fn ctx() -> CallContext {
    CallContext::with_timeout(Duration::from_secs(10))
}

fn sealed_text(name: &str, content: &str) -> EncryptedEnvelope {
    let secret = text(name, content);
    seal(&keys().public, name, SecretType::Text, &secret.content()).unwrap()
}

fn opened_text(envelope: &EncryptedEnvelope) -> String {
    match open_content(&keys().private, envelope).unwrap().payload {
        SecretPayload::Text(note) => note.content,
        other => panic!("unexpected payload {other:?}"),
    }
}

/// The behaviour every transport must share.
async fn check_contract(fixture: &Fixture, transport: Arc<dyn SecretTransport>) {
    let ctx = ctx();
    let alice = fixture.token("alice");
    let bob = fixture.token("bob");
    let texts = SecretChannel::new(transport.clone(), SecretType::Text);

    // Empty type lists as empty, not as an error.
    assert!(texts.list(&ctx, &alice).await.unwrap().is_empty());

    // Absent names are not found.
    let err = texts.get(&ctx, &alice, "missing").await.unwrap_err();
    assert!(err.is_not_found(), "{err:?}");

    // Save replaces.
    texts
        .save(&ctx, &alice, &sealed_text("note1", "first"))
        .await
        .unwrap();
    texts
        .save(&ctx, &alice, &sealed_text("note1", "second"))
        .await
        .unwrap();
    let record = texts.get(&ctx, &alice, "note1").await.unwrap();
    assert_eq!(record.secret_owner, "alice");
    assert_eq!(opened_text(&record.envelope()), "second");

    // Names that need escaping survive the trip.
    let odd = "work/mail note?#1";
    texts
        .save(&ctx, &alice, &sealed_text(odd, "odd"))
        .await
        .unwrap();
    assert_eq!(
        opened_text(&texts.get(&ctx, &alice, odd).await.unwrap().envelope()),
        "odd"
    );

    // Lists are ordered by name.
    texts
        .save(&ctx, &alice, &sealed_text("a-first", "a"))
        .await
        .unwrap();
    let names: Vec<String> = texts
        .list(&ctx, &alice)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.secret_name)
        .collect();
    assert_eq!(names, vec!["a-first", "note1", odd]);

    // Types are separate namespaces.
    let logins = SecretChannel::new(transport.clone(), SecretType::UsernamePassword);
    assert!(logins.list(&ctx, &alice).await.unwrap().is_empty());

    // Owners are isolated.
    assert!(texts.list(&ctx, &bob).await.unwrap().is_empty());
    assert!(texts.get(&ctx, &bob, "note1").await.unwrap_err().is_not_found());

    // Delete is idempotent.
    texts.delete(&ctx, &alice, "note1").await.unwrap();
    texts.delete(&ctx, &alice, "note1").await.unwrap();
    assert!(texts.get(&ctx, &alice, "note1").await.unwrap_err().is_not_found());

    // A secret literally called "delete" is an ordinary secret.
    texts
        .save(&ctx, &alice, &sealed_text("delete", "named delete"))
        .await
        .unwrap();
    assert_eq!(
        opened_text(&texts.get(&ctx, &alice, "delete").await.unwrap().envelope()),
        "named delete"
    );

    // Bad credentials are authentication failures, never not-found.
    let forged = TokenAuthority::new("some-other-signing-secret", "vaultsync")
        .unwrap()
        .issue(&OwnerId::new("alice").unwrap(), Duration::from_secs(60))
        .unwrap();
    let err = texts.get(&ctx, &forged, "delete").await.unwrap_err();
    assert!(
        matches!(err, VaultSyncError::InvalidCredential(_)),
        "{err:?}"
    );
    let err = texts.list(&ctx, &forged).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);

    // Envelopes with nothing in them are refused.
    let mut empty = sealed_text("empty", "x");
    empty.ciphertext.clear();
    let err = texts.save(&ctx, &alice, &empty).await.unwrap_err();
    assert!(matches!(err, VaultSyncError::Validation(_)), "{err:?}");

    // Dot names are refused by the adapter or the server, never mis-routed.
    for name in [".", ".."] {
        let err = transport
            .save(&ctx, &alice, &sealed_text(name, "dots"))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultSyncError::Validation(_)), "{name}: {err:?}");
        let err = transport
            .get(&ctx, &alice, SecretType::Text, name)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultSyncError::Validation(_)), "{name}: {err:?}");
        let err = texts.delete(&ctx, &alice, name).await.unwrap_err();
        assert!(matches!(err, VaultSyncError::Validation(_)), "{name}: {err:?}");
    }
    assert_eq!(
        texts.list(&ctx, &alice).await.unwrap().len(),
        3,
        "dot names left no trace"
    );
}

#[tokio::test]
async fn http_transport_meets_the_contract() {
    let fixture = Fixture::start().await;
    HttpTransport::new(&fixture.handle.http_url())
        .unwrap()
        .health(&ctx())
        .await
        .expect("health check");
    check_contract(&fixture, fixture.http()).await;
    fixture.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn rpc_transport_meets_the_contract() {
    let fixture = Fixture::start().await;
    check_contract(&fixture, fixture.rpc()).await;
    fixture.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn both_transports_see_the_same_store() {
    let fixture = Fixture::start().await;
    let ctx = ctx();
    let alice = fixture.token("alice");

    let http = SecretChannel::new(fixture.http(), SecretType::Text);
    let rpc = SecretChannel::new(fixture.rpc(), SecretType::Text);

    http.save(&ctx, &alice, &sealed_text("shared", "via http"))
        .await
        .unwrap();
    let record = rpc.get(&ctx, &alice, "shared").await.unwrap();
    assert_eq!(opened_text(&record.envelope()), "via http");
    assert_eq!(http.get(&ctx, &alice, "shared").await.unwrap(), record);

    fixture.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn rpc_list_streams_records_in_order() {
    let fixture = Fixture::start().await;
    let ctx = ctx();
    let alice = fixture.token("alice");
    let transport = RpcTransport::new(fixture.handle.rpc_addr().to_string());

    for name in ["c", "a", "b"] {
        transport
            .save(&ctx, &alice, &sealed_text(name, name))
            .await
            .unwrap();
    }

    let records: Vec<_> = transport
        .list_stream(&ctx, &alice, SecretType::Text)
        .try_collect()
        .await
        .unwrap();
    let names: Vec<&str> = records.iter().map(|r| r.secret_name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);

    fixture.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let cred = BearerCredential::new("irrelevant").unwrap();
    let ctx = ctx();
    let transports: [Arc<dyn SecretTransport>; 2] = [
        Arc::new(HttpTransport::new(&format!("http://{addr}")).unwrap()),
        Arc::new(RpcTransport::new(addr.to_string())),
    ];
    for transport in transports {
        let err = transport
            .list(&ctx, &cred, SecretType::Text)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport, "{err:?}");
    }
    let err = HttpTransport::new(&format!("http://{addr}"))
        .unwrap()
        .health(&ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport, "{err:?}");
}

// ---------------------------------------------------------------------------
// RPC lists that break off mid-stream
// ---------------------------------------------------------------------------

fn stray_record(name: &str) -> RemoteRecord {
    RemoteRecord {
        secret_owner: "alice".to_string(),
        secret_name: name.to_string(),
        secret_type: SecretType::Text,
        ciphertext: vec![1; 32],
        wrapped_key: vec![2; 32],
        timestamp: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// A one-shot RPC peer: reads the two request frames, then answers with
/// `frames` and hangs up.
async fn scripted_rpc_peer(frames: Vec<RpcFrame>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut conn = BufReader::new(stream);
        let _: Option<Metadata> = read_frame(&mut conn).await.unwrap();
        let call: Option<RpcCall> = read_frame(&mut conn).await.unwrap();
        assert!(matches!(call, Some(RpcCall::List { .. })));
        for frame in &frames {
            write_frame(&mut conn, frame).await.unwrap();
        }
    });
    addr
}

#[tokio::test]
async fn rpc_list_closed_before_end_frame_is_an_error() {
    let addr = scripted_rpc_peer(vec![RpcFrame::Record {
        record: stray_record("only"),
    }])
    .await;

    let err = RpcTransport::new(addr)
        .list(&ctx(), &BearerCredential::new("t").unwrap(), SecretType::Text)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport, "{err:?}");
}

#[tokio::test]
async fn rpc_list_with_short_count_is_an_error() {
    let addr = scripted_rpc_peer(vec![
        RpcFrame::Record {
            record: stray_record("one"),
        },
        RpcFrame::End { count: 2 },
    ])
    .await;

    let err = RpcTransport::new(addr)
        .list(&ctx(), &BearerCredential::new("t").unwrap(), SecretType::Text)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport, "{err:?}");
}

// ---------------------------------------------------------------------------
// End to end: two devices sharing one owner
// ---------------------------------------------------------------------------

async fn sync_then_download(fixture: &Fixture, transport: Arc<dyn SecretTransport>) {
    let ctx = ctx();
    let cred = fixture.token("carol");

    let laptop = SecretStore::in_memory(keys().clone()).unwrap();
    laptop.put(&text("note1", "hello")).unwrap();
    laptop.put(&login("mail", "carol", "hunter2")).unwrap();

    let report = SyncEngine::new(&laptop, transport.clone(), keys(), &cred)
        .run(&ctx, &SecretType::ALL)
        .await
        .unwrap();
    assert!(report.is_done(), "{report:?}");
    assert_eq!(report.count(ItemAction::Pushed), 2);

    let phone = SecretStore::in_memory(keys().clone()).unwrap();
    let report = SyncEngine::new(&phone, transport, keys(), &cred)
        .download(&ctx, &SecretType::ALL, false)
        .await
        .unwrap();
    assert!(report.is_done(), "{report:?}");
    assert_eq!(report.count(ItemAction::Pulled), 2);

    for secret_type in [SecretType::Text, SecretType::UsernamePassword] {
        let mine = laptop.list_by_type(secret_type).unwrap();
        let theirs = phone.list_by_type(secret_type).unwrap();
        assert_eq!(mine.len(), theirs.len());
        for (a, b) in mine.iter().zip(&theirs) {
            assert_eq!(a.name, b.name);
            assert_eq!(a.payload, b.payload);
            assert_eq!(a.meta, b.meta);
        }
    }
}

#[tokio::test]
async fn devices_converge_over_http() {
    let fixture = Fixture::start().await;
    sync_then_download(&fixture, fixture.http()).await;
    fixture.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn devices_converge_over_rpc() {
    let fixture = Fixture::start().await;
    sync_then_download(&fixture, fixture.rpc()).await;
    fixture.handle.shutdown().await.unwrap();
}
