//! Message vocabulary for the five session-server services (spec §4.3-§4.6).
//!
//! Bodies are JSON: the framing envelope (§4.1) is the only part of the wire
//! format this core owns; the concrete shape of individual message bodies is
//! explicitly out of scope beyond the handful of control messages defined
//! here, so JSON keeps them self-describing without inventing a binary
//! schema nobody asked for. Type symbols are a small fixed space, distinct
//! from the data [`crate::symbols::SymbolCache`] (regions, documents,
//! configs are *data*; message types are part of the protocol itself).

use crate::codec::RawMessage;
use crate::storage::resources::{ClientProfile, ConfigResource, DocumentResource, LoginSettings};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("failed to serialize message body: {0}")]
    Encode(#[from] serde_json::Error),
}

pub fn encode<T: Serialize>(type_symbol: i64, body: &T) -> Result<RawMessage, MessageError> {
    let bytes = serde_json::to_vec(body)?;
    Ok(RawMessage {
        type_symbol,
        body: Bytes::from(bytes),
    })
}

pub fn decode<T: DeserializeOwned>(message: &RawMessage) -> Result<T, serde_json::Error> {
    serde_json::from_slice(&message.body)
}

/// Fixed, hardcoded type-symbol space for the control messages named in the
/// spec. A full catalog of game-specific message types lives outside this
/// core (spec §1 non-goal: "concrete wire encoding of individual game
/// messages").
pub mod type_symbol {
    pub const LOGIN_REQUEST: i64 = 100;
    pub const LOGIN_SUCCESS: i64 = 101;
    pub const LOGIN_FAILURE: i64 = 102;
    pub const TCP_CONNECTION_UNREQUIRE_EVENT: i64 = 103;
    pub const LOGIN_SETTINGS: i64 = 104;
    pub const LOGGED_IN_USER_PROFILE_REQUEST: i64 = 110;
    pub const LOGGED_IN_USER_PROFILE_SUCCESS: i64 = 111;
    pub const LOGGED_IN_USER_PROFILE_FAILURE: i64 = 112;
    pub const OTHER_USER_PROFILE_REQUEST: i64 = 113;
    pub const OTHER_USER_PROFILE_SUCCESS: i64 = 114;
    pub const UPDATE_PROFILE: i64 = 115;
    pub const UPDATE_PROFILE_SUCCESS: i64 = 116;
    pub const UPDATE_PROFILE_FAILURE: i64 = 117;
    pub const USER_SERVER_PROFILE_UPDATE_REQUEST: i64 = 118;
    pub const USER_SERVER_PROFILE_UPDATE_SUCCESS: i64 = 119;
    pub const CHANNEL_INFO_REQUEST: i64 = 120;
    pub const CHANNEL_INFO_SUCCESS: i64 = 121;
    pub const DOCUMENT_REQUEST_V2: i64 = 130;
    pub const DOCUMENT_SUCCESS: i64 = 131;
    pub const DOCUMENT_FAILURE: i64 = 132;

    pub const CONFIG_REQUEST: i64 = 200;
    pub const CONFIG_SUCCESS: i64 = 201;
    pub const CONFIG_FAILURE: i64 = 202;

    pub const TRANSACTION_REQUEST: i64 = 300;
    pub const TRANSACTION_ACK: i64 = 301;

    pub const REGISTER_GAME_SERVER: i64 = 400;
    pub const REGISTRATION_FAILURE: i64 = 401;
    pub const REGISTRATION_SUCCESS: i64 = 402;
    pub const LOBBY_SESSION_STARTED_V4: i64 = 403;
    pub const PLAYER_JOIN: i64 = 404;
    pub const PLAYER_LEAVE: i64 = 405;
    pub const LOBBY_SESSION_ENDED: i64 = 406;
    pub const REGISTRATION_UPDATE: i64 = 407;
    pub const LOBBY_SESSION_NEW: i64 = 408;

    pub const LOBBY_CREATE_SESSION_REQUEST_V9: i64 = 500;
    pub const LOBBY_FIND_SESSION_REQUEST_V11: i64 = 501;
    pub const LOBBY_JOIN_SESSION_REQUEST_V7: i64 = 502;
    pub const LOBBY_SESSION_SUCCESS_V5: i64 = 503;
    pub const LOBBY_SESSION_FAILURE: i64 = 504;
}

/// A typed failure reply, mapped to the protocol's HTTP-style status codes
/// (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypedFailure {
    pub status: u16,
    pub reason: String,
}

impl TypedFailure {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }
}

// ---- Login ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub user_id: String,
    pub account_info: Value,
    pub client_session_guid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSuccess {
    pub user_id: String,
    pub session_guid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginFailure {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConnectionUnrequireEvent;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginSettingsMessage(pub LoginSettings);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedInUserProfileRequest {
    pub user_id: String,
    pub session_guid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherUserProfileRequest {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub user_id: String,
    pub session_guid: String,
    pub client_profile: ClientProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserServerProfileUpdateRequest {
    pub user_id: String,
    pub delta: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfoRequest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRequestV2 {
    pub resource_type: String,
    pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSuccess(pub DocumentResource);

// ---- Config ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigRequest {
    pub resource_type: String,
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSuccess(pub ConfigResource);

// ---- Transaction ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub transaction_id: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionAck {
    pub transaction_id: String,
}

// ---- ServerDB / registry ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterGameServerRequest {
    pub server_id: u64,
    pub internal_address: String,
    pub external_address: String,
    pub port: u16,
    pub region_symbol: i64,
    pub version_lock: i64,
    pub is_public: bool,
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationFailure {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySessionStartedV4 {
    pub session_guid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerJoin {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeave {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySessionEnded;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationUpdate {
    pub is_public: Option<bool>,
    pub capacity: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySessionNew {
    pub server_id: u64,
    pub session_guid: String,
    pub level_symbol: i64,
    pub game_mode_symbol: i64,
}

// ---- Matching ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyCreateSessionRequestV9 {
    pub level_symbol: i64,
    pub game_mode_symbol: i64,
    pub region_symbol: Option<i64>,
    pub version_lock: i64,
    pub ping_ms: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyFindSessionRequestV11 {
    pub level_symbol: i64,
    pub game_mode_symbol: i64,
    pub region_symbol: Option<i64>,
    pub version_lock: i64,
    pub ping_ms: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyJoinSessionRequestV7 {
    pub session_guid: String,
    pub ping_ms: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySessionSuccessV5 {
    pub session_guid: String,
    pub endpoint: String,
    pub team_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbySessionFailure {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let req = LoginRequest {
            user_id: "steam:1".into(),
            account_info: Value::Null,
            client_session_guid: None,
        };
        let raw = encode(type_symbol::LOGIN_REQUEST, &req).unwrap();
        assert_eq!(raw.type_symbol, type_symbol::LOGIN_REQUEST);
        let decoded: LoginRequest = decode(&raw).unwrap();
        assert_eq!(decoded.user_id, req.user_id);
    }
}
