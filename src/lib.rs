#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::struct_excessive_bools,
    clippy::too_many_arguments,
    clippy::too_many_lines,
    clippy::similar_names
)]

//! # Arena Relay Server
//!
//! The central relay for a multiplayer VR arena game: authentication,
//! profile and config brokering, dedicated game-server registration with
//! liveness validation, and session matching.

/// Connection authorization (ACL) and session-token error taxonomy.
pub mod auth;

/// Wire framing: the length-prefixed message envelope shared by every
/// service.
pub mod codec;

/// Server configuration and environment variables.
pub mod config;

/// Structured logging configuration.
pub mod logging;

/// Pure deep-merge semantics for partial profile updates.
pub mod merge;

/// The typed message vocabulary exchanged over the wire.
pub mod messages;

/// Metrics collection and reporting.
pub mod metrics;

/// Auxiliary HTTP surface exposing metrics as JSON and Prometheus text.
pub mod metrics_http;

/// Per-connection state shared by every service.
pub mod peer;

/// Rate limiting implementation.
pub mod rate_limit;

/// The game-server registry and its UDP liveness probe.
pub mod registry;

/// Retry logic utilities.
pub mod retry;

/// TLS utilities and CSPRNG-backed identifiers.
pub mod security;

/// The accept loop and per-path routing to services.
pub mod session_server;

/// Session-guid to account TTL cache.
pub mod session_cache;

/// The service trait and the peer-set composition helper.
pub mod service;

/// The six concrete services: Login, Config, Document, Matching, ServerDB,
/// Transaction.
pub mod services;

/// Shared application state handed to every service.
pub mod state;

/// Storage contract and backends (filesystem, remote).
pub mod storage;

/// Bidirectional symbol cache.
pub mod symbols;

/// Canonical cross-platform account identifier.
pub mod xplatform;
