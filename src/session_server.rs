//! Session server (spec §4.7): binds one TCP listener, upgrades HTTP
//! connections to WebSocket, and routes each connection to the service
//! named by its path. Each connection gets its own [`Peer`] and read/write
//! task pair.
//!
//! A thin per-path upgrade handler hands off into a shared connection loop,
//! generalized from a single `/ws` route to six service-selected paths.

use crate::codec::{encode_message, MessageDecoder, RawMessage};
use crate::peer::Peer;
use crate::service::Service;
use crate::services::config_service::ConfigService;
use crate::services::document::DocumentService;
use crate::services::login::LoginService;
use crate::services::matching::MatchingService;
use crate::services::serverdb::ServerDbService;
use crate::services::transaction::TransactionService;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::mpsc;

/// The six concrete services, constructed once at startup and shared by
/// every connection routed to them.
pub struct Services {
    pub login: Arc<LoginService>,
    pub config: Arc<ConfigService>,
    pub document: Arc<DocumentService>,
    pub matching: Arc<MatchingService>,
    pub serverdb: Arc<ServerDbService>,
    pub transaction: Arc<TransactionService>,
}

impl Services {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            login: Arc::new(LoginService::new(state.clone())),
            config: Arc::new(ConfigService::new(state.clone())),
            document: Arc::new(DocumentService::new(state.clone())),
            matching: Arc::new(MatchingService::new(state.clone())),
            serverdb: Arc::new(ServerDbService::new(state.clone())),
            transaction: Arc::new(TransactionService::new()),
        }
    }
}

#[derive(Clone)]
struct RouterState {
    app: Arc<AppState>,
    services: Arc<Services>,
}

#[derive(Debug, Deserialize, Default)]
struct ConnectParams {
    api_key: Option<String>,
}

/// Build the router with the six service paths (spec §6), plus the
/// auxiliary `/v1/metrics` HTTP surface when enabled.
pub fn router(app: Arc<AppState>, services: Arc<Services>) -> Router {
    let metrics_enabled = app.config.metrics.enabled;

    let service_router = Router::new()
        .route("/login", get(upgrade_login))
        .route("/config", get(upgrade_config))
        .route("/document", get(upgrade_document))
        .route("/matching", get(upgrade_matching))
        .route("/serverdb", get(upgrade_serverdb))
        .route("/transaction", get(upgrade_transaction))
        .with_state(RouterState {
            app: app.clone(),
            services,
        });

    if !metrics_enabled {
        return service_router;
    }

    let metrics_router = Router::new()
        .route("/v1/metrics", get(crate::metrics_http::metrics_handler))
        .route(
            "/v1/metrics/prom",
            get(crate::metrics_http::prometheus_metrics_handler),
        )
        .with_state(app);

    service_router.merge(metrics_router)
}

macro_rules! upgrade_handler {
    ($name:ident, $field:ident) => {
        async fn $name(
            ws: WebSocketUpgrade,
            ConnectInfo(addr): ConnectInfo<SocketAddr>,
            State(state): State<RouterState>,
        ) -> Response {
            accept(ws, addr, state.app, state.services.$field.clone(), true).await
        }
    };
}

upgrade_handler!(upgrade_login, login);
upgrade_handler!(upgrade_config, config);
upgrade_handler!(upgrade_document, document);
upgrade_handler!(upgrade_matching, matching);
upgrade_handler!(upgrade_transaction, transaction);

async fn upgrade_serverdb(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<RouterState>,
    Query(params): Query<ConnectParams>,
) -> Response {
    let authorized = match &state.app.config.security.server_db_api_key {
        Some(expected) => params
            .api_key
            .as_deref()
            .map(|provided| bool::from(provided.as_bytes().ct_eq(expected.as_bytes())))
            .unwrap_or(false),
        None => true,
    };

    tracing::info!(client = %addr, authorized, "OnAuthorizationResult");
    if !authorized {
        return axum::http::StatusCode::UNAUTHORIZED.into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, addr, state.app, state.services.serverdb.clone()))
}

/// Non-ServerDB paths have no API key requirement; `authorized` is always
/// true once the caller reaches this point, but the event still fires once
/// per connection per spec §4.7.
async fn accept(
    ws: WebSocketUpgrade,
    addr: SocketAddr,
    app: Arc<AppState>,
    service: Arc<dyn Service>,
    authorized: bool,
) -> Response {
    tracing::info!(client = %addr, authorized, "OnAuthorizationResult");
    if !authorized {
        return axum::http::StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, addr, app, service))
}

/// Drive one accepted connection for its full lifetime: decode inbound
/// frames into packets dispatched to `service`, and drain outbound sends
/// queued on the peer's channel, until either side closes or the peer is
/// cancelled (spec §4.2, §4.7).
async fn handle_socket(socket: WebSocket, addr: SocketAddr, app: Arc<AppState>, service: Arc<dyn Service>) {
    let (mut sink, mut stream) = {
        use futures_util::StreamExt;
        socket.split()
    };
    let (tx, mut rx) = mpsc::unbounded_channel::<RawMessage>();
    let peer = Arc::new(Peer::new(addr, tx));

    app.metrics.increment_connections();
    tracing::info!(client = %addr, service = service.name(), peer_id = %peer.id, "OnServicePeerConnected");
    service.on_peer_connected(peer.clone()).await;

    let cancel = peer.cancellation_token();
    let writer_cancel = cancel.clone();
    let writer_app = app.clone();
    let writer_service = service.clone();
    let writer_peer = peer.clone();
    let writer = tokio::spawn(async move {
        use futures_util::SinkExt;
        loop {
            tokio::select! {
                _ = writer_cancel.cancelled() => break,
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    let frame = encode_message(message.type_symbol, &message.body);
                    if sink.send(Message::Binary(frame)).await.is_err() {
                        break;
                    }
                    writer_app.metrics.increment_packets_sent();
                    tracing::debug!(peer_id = %writer_peer.id, type_symbol = message.type_symbol, "OnServicePacketSent");
                    writer_service.on_packet_sent(writer_peer.clone(), &message).await;
                }
            }
        }
    });

    let max_message_size = (app.config.security.max_message_size as u64).max(1);
    let mut decoder = MessageDecoder::new(max_message_size);

    loop {
        use futures_util::StreamExt;
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        let bytes = match next {
            Some(Ok(Message::Binary(bytes))) => bytes,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(_)) => break,
        };

        decoder.feed(&bytes);
        match decoder.decode_available() {
            Ok(packet) if packet.is_empty() => continue,
            Ok(packet) => {
                for message in &packet {
                    app.metrics.increment_packets_received();
                    tracing::debug!(peer_id = %peer.id, type_symbol = message.type_symbol, "OnServicePacketReceived");
                    service.on_packet_received(peer.clone(), message).await;
                }
                service.handle_packet(peer.clone(), packet).await
            }
            Err(err) => {
                tracing::warn!(client = %addr, error = %err, "codec desync, closing connection");
                break;
            }
        }
    }

    peer.close();
    writer.abort();
    app.metrics.decrement_active_connections();
    tracing::info!(client = %addr, service = service.name(), peer_id = %peer.id, "OnServicePeerDisconnected");
    service.on_peer_disconnected(peer).await;
}
