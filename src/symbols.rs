//! Bidirectional symbol cache: 64-bit numeric symbols <-> textual names.
//!
//! Loaded once at startup (spec §4, §9 "Symbol cache") and read-only
//! afterward, so lookups use a plain `HashMap` behind an `Arc` rather than
//! a `DashMap`, which this codebase reserves for genuinely mutable hot
//! paths (e.g. the game-server registry).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub type Symbol = i64;

#[derive(Debug, Error)]
pub enum SymbolCacheError {
    #[error("failed to read symbol cache file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse symbol cache file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate symbol {symbol} (names {first:?} and {second:?})")]
    DuplicateSymbol {
        symbol: Symbol,
        first: String,
        second: String,
    },
    #[error("duplicate name {name:?} (symbols {first} and {second})")]
    DuplicateName {
        name: String,
        first: Symbol,
        second: Symbol,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SymbolEntry {
    symbol: Symbol,
    name: String,
}

/// A read-only bijection between symbols and names, built once from a JSON
/// array of `{ "symbol": i64, "name": string }` entries.
#[derive(Debug, Default)]
pub struct SymbolCache {
    by_symbol: HashMap<Symbol, String>,
    by_name: HashMap<String, Symbol>,
}

impl SymbolCache {
    /// An empty cache. Useful for tests and for `--print-config`-style dry
    /// runs that never touch the filesystem.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a cache directly from `(symbol, name)` pairs, bypassing the
    /// JSON file format. Used by tests that need a populated cache without
    /// writing one to disk.
    pub fn from_pairs(entries: impl IntoIterator<Item = (Symbol, String)>) -> Self {
        let mut by_symbol = HashMap::new();
        let mut by_name = HashMap::new();
        for (symbol, name) in entries {
            by_symbol.insert(symbol, name.clone());
            by_name.insert(name, symbol);
        }
        Self { by_symbol, by_name }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, SymbolCacheError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SymbolCacheError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw, path)
    }

    fn from_json_str(raw: &str, path: &Path) -> Result<Self, SymbolCacheError> {
        let entries: Vec<SymbolEntry> =
            serde_json::from_str(raw).map_err(|source| SymbolCacheError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_entries(entries)
    }

    fn from_entries(entries: Vec<SymbolEntry>) -> Result<Self, SymbolCacheError> {
        let mut by_symbol = HashMap::with_capacity(entries.len());
        let mut by_name = HashMap::with_capacity(entries.len());

        for entry in entries {
            if let Some(existing) = by_symbol.insert(entry.symbol, entry.name.clone()) {
                return Err(SymbolCacheError::DuplicateSymbol {
                    symbol: entry.symbol,
                    first: existing,
                    second: entry.name,
                });
            }
            if let Some(existing) = by_name.insert(entry.name.clone(), entry.symbol) {
                return Err(SymbolCacheError::DuplicateName {
                    name: entry.name,
                    first: existing,
                    second: entry.symbol,
                });
            }
        }

        Ok(Self { by_symbol, by_name })
    }

    /// Resolve a name to its symbol. Absent for unknown names (spec §3).
    pub fn symbol_for(&self, name: &str) -> Option<Symbol> {
        self.by_name.get(name).copied()
    }

    /// Resolve a symbol back to its name.
    pub fn name_for(&self, symbol: Symbol) -> Option<&str> {
        self.by_symbol.get(&symbol).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SymbolCache {
        SymbolCache::from_entries(vec![
            SymbolEntry {
                symbol: 1,
                name: "na-east".to_string(),
            },
            SymbolEntry {
                symbol: 2,
                name: "na-west".to_string(),
            },
        ])
        .unwrap()
    }

    #[test]
    fn bijection_round_trip() {
        let cache = sample();
        assert_eq!(cache.symbol_for("na-east"), Some(1));
        assert_eq!(cache.name_for(1), Some("na-east"));
        assert_eq!(cache.symbol_for("unknown"), None);
        assert_eq!(cache.name_for(999), None);
    }

    #[test]
    fn rejects_duplicate_symbol() {
        let err = SymbolCache::from_entries(vec![
            SymbolEntry {
                symbol: 1,
                name: "a".to_string(),
            },
            SymbolEntry {
                symbol: 1,
                name: "b".to_string(),
            },
        ])
        .unwrap_err();
        assert!(matches!(err, SymbolCacheError::DuplicateSymbol { .. }));
    }

    #[test]
    fn rejects_duplicate_name() {
        let err = SymbolCache::from_entries(vec![
            SymbolEntry {
                symbol: 1,
                name: "a".to_string(),
            },
            SymbolEntry {
                symbol: 2,
                name: "a".to_string(),
            },
        ])
        .unwrap_err();
        assert!(matches!(err, SymbolCacheError::DuplicateName { .. }));
    }
}
