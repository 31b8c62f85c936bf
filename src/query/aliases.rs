//! Known column-alias corrections.
//!
//! Maps vocabulary words that upstream text generators use in place of the real
//! column names (localized names, the canonical spelling of a misspelled
//! column) to the identifiers the store actually has. Matching is whole-token
//! and case-insensitive on bare words only; string literals, quoted
//! identifiers and comments are never rewritten.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::config::QueryConfig;
use crate::query::lexer::{Token, TokenKind};

/// One applied alias substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasRewrite {
    /// Word as written in the candidate.
    pub from: String,
    pub to: String,
    /// Byte offset in the candidate.
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    entries: BTreeMap<String, String>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

impl AliasTable {
    /// Keys are matched case-insensitively.
    #[must_use]
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn from_config(cfg: &QueryConfig) -> Self {
        Self::new(cfg.aliases.iter().map(|(k, v)| (k, v.clone())))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replacement column for a bare word, if it is a known alias.
    #[must_use]
    pub fn lookup(&self, word: &str) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries
            .get(&word.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Replacement for `token` when it is a bare word with a known alias.
    #[must_use]
    pub fn correct(&self, token: &Token<'_>) -> Option<AliasRewrite> {
        if token.kind != TokenKind::Word {
            return None;
        }
        let to = self.lookup(token.text)?;
        if to == token.text {
            return None;
        }
        Some(AliasRewrite {
            from: token.text.to_string(),
            to: to.to_string(),
            offset: token.start,
        })
    }
}
