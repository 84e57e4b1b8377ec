//! The five concrete services the session server dispatches to (spec §2
//! item 5, §4.3-§4.6): Login, Config, Document, Matching, ServerDB,
//! Transaction.

pub mod config_service;
pub mod document;
pub mod login;
pub mod matching;
pub mod serverdb;
pub mod transaction;
