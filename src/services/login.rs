//! Login service (spec §4.3): authentication, profile fetch/update,
//! login-time broadcast of channel info, documents, and login settings.

use crate::auth::AuthError;
use crate::codec::{Packet, RawMessage};
use crate::messages::{self, type_symbol};
use crate::peer::Peer;
use crate::service::{PeerSet, Service};
use crate::state::AppState;
use crate::storage::resources::{AccountResource, ChannelInfo, ClientProfile, LoginSettings, ServerProfile};
use crate::xplatform::XPlatformId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const ACCOUNTS_COLLECTION: &str = "accounts";
const LOGIN_SETTINGS_RESOURCE: &str = "login_settings";
const CHANNEL_INFO_RESOURCE: &str = "channel_info";
const DOCUMENTS_COLLECTION: &str = "documents";

/// Per-peer state stashed in the opaque session slot after a successful
/// login (spec §9 "opaque per-peer session slot").
#[derive(Clone)]
struct LoginSessionData {
    session_guid: crate::security::SessionGuid,
}

pub struct LoginService {
    state: Arc<AppState>,
    peers: PeerSet,
}

impl LoginService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            peers: PeerSet::new(),
        }
    }

    fn now_unix() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }

    async fn load_account(&self, user_id: &XPlatformId) -> Option<AccountResource> {
        self.state
            .storage
            .get_item(ACCOUNTS_COLLECTION, &user_id.sanitized_key())
            .await
            .ok()
            .flatten()
    }

    async fn save_account(&self, account: &AccountResource) -> Result<(), crate::storage::StorageError> {
        self.state
            .storage
            .set_item(ACCOUNTS_COLLECTION, &account.xplatform_id.sanitized_key(), account)
            .await
    }

    fn new_account(user_id: XPlatformId) -> AccountResource {
        let now = Self::now_unix();
        AccountResource {
            xplatform_id: user_id.clone(),
            client_profile: ClientProfile {
                xplatform_id: user_id.clone(),
                fields: Default::default(),
            },
            server_profile: ServerProfile::new(user_id, "player", now),
        }
    }

    async fn handle_login(&self, peer: &Arc<Peer>, message: &RawMessage) {
        self.state.metrics.increment_login_attempts();

        let Ok(req) = messages::decode::<messages::LoginRequest>(message) else {
            tracing::debug!("login: malformed LoginRequest body");
            return;
        };

        let Ok(user_id) = req.user_id.parse::<XPlatformId>() else {
            self.state.metrics.increment_login_failures();
            let failure = messages::LoginFailure {
                code: "bad_request".to_string(),
            };
            if let Ok(msg) = messages::encode(type_symbol::LOGIN_FAILURE, &failure) {
                peer.send(msg);
            }
            peer.close();
            return;
        };

        // (1) invalidate any prior session stored on this peer.
        if let Some(prior) = peer.get_session_data::<LoginSessionData>("login") {
            self.state.session_cache.shorten_on_disconnect(&prior.session_guid);
            peer.clear_session_data("login");
        }

        // (2) ACL check.
        if let Err(AuthError::Forbidden) = self.state.acl.authorize(&user_id) {
            self.state.metrics.increment_login_failures();
            let failure = messages::LoginFailure {
                code: "forbidden".to_string(),
            };
            if let Ok(msg) = messages::encode(type_symbol::LOGIN_FAILURE, &failure) {
                peer.send(msg);
            }
            peer.close();
            return;
        }

        // (3)-(4) fresh session_guid, stored with the default (long) TTL.
        let session_guid = crate::security::SessionGuid::generate();
        self.state.session_cache.insert(session_guid, user_id.clone());

        // (5) peer session slot + authenticated event.
        peer.set_session_data("login", LoginSessionData { session_guid });
        let display_name = self
            .load_account(&user_id)
            .await
            .map(|a| a.server_profile.display_name);
        if peer.update_user_authentication(user_id.clone(), display_name) {
            tracing::info!(peer_id = %peer.id, "OnServicePeerAuthenticated");
            self.on_peer_authenticated(peer.clone()).await;
        }

        // Ensure the account exists so later profile operations can load it.
        if self.load_account(&user_id).await.is_none() {
            let _ = self.save_account(&Self::new_account(user_id.clone())).await;
        }

        // (6) LoginSuccess, TcpConnectionUnrequireEvent, LoginSettings.
        let success = messages::LoginSuccess {
            user_id: user_id.render(),
            session_guid: session_guid.to_string(),
        };
        self.state.metrics.increment_login_successes();
        if let Ok(msg) = messages::encode(type_symbol::LOGIN_SUCCESS, &success) {
            peer.send(msg);
        }
        if let Ok(msg) = messages::encode(
            type_symbol::TCP_CONNECTION_UNREQUIRE_EVENT,
            &messages::TcpConnectionUnrequireEvent,
        ) {
            peer.send(msg);
        }

        let settings: LoginSettings = self
            .state
            .storage
            .get(LOGIN_SETTINGS_RESOURCE)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        if let Ok(msg) = messages::encode(
            type_symbol::LOGIN_SETTINGS,
            &messages::LoginSettingsMessage(settings),
        ) {
            peer.send(msg);
        }
    }

    async fn handle_profile_request(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::LoggedInUserProfileRequest>(message) else {
            return;
        };
        let (Ok(user_id), Ok(guid)) = (
            req.user_id.parse::<XPlatformId>(),
            req.session_guid.parse::<crate::security::SessionGuid>(),
        ) else {
            self.send_profile_failure(peer, 400, "bad request");
            return;
        };

        if !self.state.session_cache.validate(&guid, &user_id) {
            self.send_profile_failure(peer, 401, "Invalid Session");
            return;
        }

        match self.load_account(&user_id).await {
            Some(account) => {
                if let Ok(msg) = messages::encode(
                    type_symbol::LOGGED_IN_USER_PROFILE_SUCCESS,
                    &account,
                ) {
                    peer.send(msg);
                }
            }
            None => self.send_profile_failure(peer, 404, "not found"),
        }
    }

    fn send_profile_failure(&self, peer: &Arc<Peer>, status: u16, reason: &str) {
        let failure = messages::TypedFailure::new(status, reason);
        if let Ok(msg) = messages::encode(type_symbol::LOGGED_IN_USER_PROFILE_FAILURE, &failure) {
            peer.send(msg);
        }
    }

    async fn handle_other_profile_request(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::OtherUserProfileRequest>(message) else {
            return;
        };
        let Ok(user_id) = req.user_id.parse::<XPlatformId>() else {
            return;
        };
        if let Some(account) = self.load_account(&user_id).await {
            if let Ok(msg) =
                messages::encode(type_symbol::OTHER_USER_PROFILE_SUCCESS, &account.server_profile)
            {
                peer.send(msg);
            }
        }
    }

    async fn handle_update_profile(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::UpdateProfileRequest>(message) else {
            return;
        };
        let (Ok(user_id), Ok(guid)) = (
            req.user_id.parse::<XPlatformId>(),
            req.session_guid.parse::<crate::security::SessionGuid>(),
        ) else {
            self.send_update_failure(peer, 400, "bad request");
            return;
        };
        if !self.state.session_cache.validate(&guid, &user_id) {
            self.send_update_failure(peer, 401, "Invalid Session");
            return;
        }
        if req.client_profile.xplatform_id != user_id {
            self.send_update_failure(peer, 400, "xplatform_id mismatch");
            return;
        }

        let Some(mut account) = self.load_account(&user_id).await else {
            self.send_update_failure(peer, 404, "not found");
            return;
        };
        account.client_profile = req.client_profile;
        let now = Self::now_unix();
        account.server_profile.update_time = now;
        account.server_profile.modify_time = now;

        if self.save_account(&account).await.is_ok() {
            if let Ok(msg) = messages::encode(type_symbol::UPDATE_PROFILE_SUCCESS, &()) {
                peer.send(msg);
            }
        } else {
            self.send_update_failure(peer, 500, "storage error");
        }
    }

    fn send_update_failure(&self, peer: &Arc<Peer>, status: u16, reason: &str) {
        let failure = messages::TypedFailure::new(status, reason);
        if let Ok(msg) = messages::encode(type_symbol::UPDATE_PROFILE_FAILURE, &failure) {
            peer.send(msg);
        }
    }

    async fn handle_server_profile_update(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::UserServerProfileUpdateRequest>(message) else {
            return;
        };
        let Ok(user_id) = req.user_id.parse::<XPlatformId>() else {
            return;
        };
        let Some(mut account) = self.load_account(&user_id).await else {
            return;
        };

        let mut server_value = match serde_json::to_value(&account.server_profile) {
            Ok(v) => v,
            Err(_) => return,
        };
        crate::merge::merge(&mut server_value, &req.delta);

        let merged: ServerProfile = match serde_json::from_value(server_value) {
            Ok(v) => v,
            Err(_) => return,
        };
        if merged.xplatform_id != user_id {
            return;
        }
        account.server_profile = merged;

        if self.save_account(&account).await.is_ok() {
            if let Ok(msg) =
                messages::encode(type_symbol::USER_SERVER_PROFILE_UPDATE_SUCCESS, &())
            {
                peer.send(msg);
            }
        }
    }

    async fn handle_channel_info_request(&self, peer: &Arc<Peer>) {
        let info: ChannelInfo = self
            .state
            .storage
            .get(CHANNEL_INFO_RESOURCE)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();
        if let Ok(msg) = messages::encode(type_symbol::CHANNEL_INFO_SUCCESS, &info) {
            peer.send(msg);
        }
    }

    async fn handle_document_request(&self, peer: &Arc<Peer>, message: &RawMessage) {
        let Ok(req) = messages::decode::<messages::DocumentRequestV2>(message) else {
            return;
        };
        if self.state.symbols.symbol_for(&req.language).is_none() {
            let failure = messages::TypedFailure::new(404, "unknown language symbol");
            if let Ok(msg) = messages::encode(type_symbol::DOCUMENT_FAILURE, &failure) {
                peer.send(msg);
            }
            return;
        }

        let key = crate::storage::resources::DocumentResource::collection_key(
            &req.resource_type,
            &req.language,
        );
        match self
            .state
            .storage
            .get_item::<crate::storage::resources::DocumentResource>(DOCUMENTS_COLLECTION, &key)
            .await
        {
            Ok(Some(doc)) => {
                if let Ok(msg) =
                    messages::encode(type_symbol::DOCUMENT_SUCCESS, &messages::DocumentSuccess(doc))
                {
                    peer.send(msg);
                }
            }
            _ => {
                let failure = messages::TypedFailure::new(404, "document not found");
                if let Ok(msg) = messages::encode(type_symbol::DOCUMENT_FAILURE, &failure) {
                    peer.send(msg);
                }
            }
        }
    }
}

#[async_trait]
impl Service for LoginService {
    fn name(&self) -> &'static str {
        "login"
    }

    fn path(&self) -> &'static str {
        "/login"
    }

    async fn on_peer_connected(&self, peer: Arc<Peer>) {
        self.peers.insert(peer);
    }

    async fn handle_packet(&self, peer: Arc<Peer>, packet: Packet) {
        for message in &packet {
            match message.type_symbol {
                type_symbol::LOGIN_REQUEST => self.handle_login(&peer, message).await,
                type_symbol::LOGGED_IN_USER_PROFILE_REQUEST => {
                    self.handle_profile_request(&peer, message).await
                }
                type_symbol::OTHER_USER_PROFILE_REQUEST => {
                    self.handle_other_profile_request(&peer, message).await
                }
                type_symbol::UPDATE_PROFILE => self.handle_update_profile(&peer, message).await,
                type_symbol::USER_SERVER_PROFILE_UPDATE_REQUEST => {
                    self.handle_server_profile_update(&peer, message).await
                }
                type_symbol::CHANNEL_INFO_REQUEST => self.handle_channel_info_request(&peer).await,
                type_symbol::DOCUMENT_REQUEST_V2 => {
                    self.handle_document_request(&peer, message).await
                }
                unknown => {
                    tracing::debug!(unknown, "login: unrecognized message type, ignoring");
                }
            }
        }
    }

    async fn on_peer_disconnected(&self, peer: Arc<Peer>) {
        if let Some(session) = peer.get_session_data::<LoginSessionData>("login") {
            self.state
                .session_cache
                .shorten_on_disconnect(&session.session_guid);
        }
        self.peers.remove(peer.id);
    }
}
