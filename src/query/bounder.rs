//! Read-only gate and row-limit bounding for candidate SQL.
//!
//! `QueryBounder::bound` turns an untrusted candidate into the effective query:
//!
//! 1. trim whitespace, trailing comments and one trailing `;`
//! 2. reject anything that is not a single statement starting with `SELECT`
//! 3. apply known alias corrections to bare words
//! 4. clamp a top-level `LIMIT <n>` into `[min_rows, max_rows]`, or wrap the
//!    whole statement as `SELECT * FROM (<candidate>) AS subq LIMIT <max_rows>`
//!
//! Column existence is never checked here; the store reports that.

#![allow(missing_docs)]

use std::borrow::Cow;

use serde::Serialize;

use crate::core::config::QueryConfig;
use crate::core::errors::{Result, TpmsError};
use crate::query::aliases::{AliasRewrite, AliasTable};
use crate::query::lexer::{Token, TokenKind, tokenize};

/// Alias used for the wrapping subquery.
pub const WRAP_ALIAS: &str = "subq";

/// What happened to the row limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LimitAction {
    /// Existing top-level limit was already inside the window.
    Kept { limit: u64 },
    /// Existing limit was below `min_rows`.
    Raised { from: u64, to: u64 },
    /// Existing limit was above `max_rows`.
    Lowered { from: u64, to: u64 },
    /// No clampable top-level limit; statement wrapped with `LIMIT max_rows`.
    Wrapped { limit: u64 },
}

impl LimitAction {
    #[must_use]
    pub const fn effective_limit(&self) -> u64 {
        match *self {
            Self::Kept { limit } | Self::Wrapped { limit } => limit,
            Self::Raised { to, .. } | Self::Lowered { to, .. } => to,
        }
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Kept { .. } => "kept",
            Self::Raised { .. } => "raised",
            Self::Lowered { .. } => "lowered",
            Self::Wrapped { .. } => "wrapped",
        }
    }
}

/// Result of bounding one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoundedQuery {
    pub candidate: String,
    /// The only text ever sent to the store.
    pub effective: String,
    pub limit: LimitAction,
    pub rewritten_aliases: Vec<AliasRewrite>,
}

#[derive(Debug, Clone)]
pub struct QueryBounder {
    min_rows: u64,
    max_rows: u64,
    aliases: AliasTable,
}

impl Default for QueryBounder {
    fn default() -> Self {
        Self::from_config(&QueryConfig::default())
    }
}

impl QueryBounder {
    /// Fails when the window is empty or inverted.
    pub fn new(min_rows: u64, max_rows: u64, aliases: AliasTable) -> Result<Self> {
        if min_rows == 0 || min_rows > max_rows {
            return Err(TpmsError::InvalidConfig {
                details: format!(
                    "row window must satisfy 1 <= min_rows <= max_rows, got [{min_rows}, {max_rows}]"
                ),
            });
        }
        Ok(Self {
            min_rows,
            max_rows,
            aliases,
        })
    }

    /// Build from a validated config.
    #[must_use]
    pub fn from_config(cfg: &QueryConfig) -> Self {
        Self {
            min_rows: cfg.min_rows,
            max_rows: cfg.max_rows,
            aliases: AliasTable::from_config(cfg),
        }
    }

    #[must_use]
    pub const fn window(&self) -> (u64, u64) {
        (self.min_rows, self.max_rows)
    }

    #[must_use]
    pub const fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn bound(&self, candidate: &str) -> Result<BoundedQuery> {
        let tokens = tokenize(candidate)?;
        let body = statement_body(&tokens)?;
        ensure_select(body)?;

        let mut pieces: Vec<Cow<'_, str>> = body.iter().map(|t| Cow::Borrowed(t.text)).collect();
        let mut rewritten_aliases = Vec::new();
        for (idx, token) in body.iter().enumerate() {
            if let Some(rewrite) = self.aliases.correct(token) {
                pieces[idx] = Cow::Owned(rewrite.to.clone());
                rewritten_aliases.push(rewrite);
            }
        }

        let limit = match top_level_limit(body) {
            Some((idx, n)) => {
                let action = self.clamp(n);
                pieces[idx] = Cow::Owned(action.effective_limit().to_string());
                action
            }
            None => LimitAction::Wrapped {
                limit: self.max_rows,
            },
        };

        let inner: String = pieces.concat();
        let effective = match limit {
            LimitAction::Wrapped { limit } => {
                format!("SELECT * FROM ({inner}) AS {WRAP_ALIAS} LIMIT {limit}")
            }
            _ => inner,
        };

        Ok(BoundedQuery {
            candidate: candidate.to_string(),
            effective,
            limit,
            rewritten_aliases,
        })
    }

    fn clamp(&self, n: u64) -> LimitAction {
        if n < self.min_rows {
            LimitAction::Raised {
                from: n,
                to: self.min_rows,
            }
        } else if n > self.max_rows {
            LimitAction::Lowered {
                from: n,
                to: self.max_rows,
            }
        } else {
            LimitAction::Kept { limit: n }
        }
    }
}

/// Strip surrounding trivia and one trailing terminator; reject interior terminators.
fn statement_body<'t, 'a>(tokens: &'t [Token<'a>]) -> Result<&'t [Token<'a>]> {
    let mut end = tokens.len();
    while end > 0 && tokens[end - 1].is_trivia() {
        end -= 1;
    }
    if end > 0 && tokens[end - 1].kind == TokenKind::Semicolon {
        end -= 1;
        while end > 0 && tokens[end - 1].is_trivia() {
            end -= 1;
        }
    }
    let start = tokens[..end]
        .iter()
        .position(|t| !t.is_trivia())
        .unwrap_or(end);
    let body = &tokens[start..end];

    if let Some(extra) = body.iter().find(|t| t.kind == TokenKind::Semicolon) {
        return Err(TpmsError::NotAReadQuery {
            reason: format!(
                "only a single statement is accepted; found ';' at byte {}",
                extra.start
            ),
        });
    }
    Ok(body)
}

fn ensure_select(body: &[Token<'_>]) -> Result<()> {
    match body.first() {
        None => Err(TpmsError::NotAReadQuery {
            reason: "empty statement".to_string(),
        }),
        Some(first) if first.is_keyword("SELECT") => Ok(()),
        Some(first) => Err(TpmsError::NotAReadQuery {
            reason: format!("statement must start with SELECT, found {}", first.text),
        }),
    }
}

/// Index of the count token of the first depth-0 `LIMIT`, with its value.
///
/// Handles `LIMIT n`, `LIMIT n OFFSET m` and the `LIMIT offset, n` form. Any
/// other shape (`LIMIT ALL`, a parameter, an expression) reports no limit.
fn top_level_limit(body: &[Token<'_>]) -> Option<(usize, u64)> {
    let significant: Vec<(usize, &Token<'_>)> = body
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_trivia())
        .collect();

    let mut depth = 0_i32;
    for (pos, (_, token)) in significant.iter().enumerate() {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => depth -= 1,
            TokenKind::Word if depth == 0 && token.is_keyword("LIMIT") => {
                return limit_count(&significant[pos + 1..]);
            }
            _ => {}
        }
    }
    None
}

fn limit_count(after: &[(usize, &Token<'_>)]) -> Option<(usize, u64)> {
    let (idx, first) = after.first()?;
    if !first.is_integer() {
        return None;
    }
    let count = match after.get(1) {
        Some((_, comma)) if comma.kind == TokenKind::Comma => {
            let (count_idx, count) = after.get(2)?;
            if !count.is_integer() {
                return None;
            }
            (*count_idx, parse_count(count.text))
        }
        Some((_, next)) if !ends_limit_clause(next) => return None,
        _ => (*idx, parse_count(first.text)),
    };
    Some(count)
}

/// Tokens that may legally follow a plain `LIMIT n` in a single SELECT.
fn ends_limit_clause(token: &Token<'_>) -> bool {
    token.is_keyword("OFFSET") || token.kind == TokenKind::RParen
}

/// Digits-only input; overflow saturates so it always clamps down.
fn parse_count(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounder() -> QueryBounder {
        QueryBounder::new(10_000, 50_000, AliasTable::default()).unwrap()
    }

    #[test]
    fn small_limit_raised_to_min() {
        let q = bounder().bound("SELECT * FROM t LIMIT 5").unwrap();
        assert_eq!(q.effective, "SELECT * FROM t LIMIT 10000");
        assert_eq!(q.limit, LimitAction::Raised { from: 5, to: 10_000 });
    }

    #[test]
    fn large_limit_lowered_to_max() {
        let q = bounder().bound("SELECT * FROM t LIMIT 999999").unwrap();
        assert_eq!(q.effective, "SELECT * FROM t LIMIT 50000");
        assert_eq!(
            q.limit,
            LimitAction::Lowered {
                from: 999_999,
                to: 50_000
            }
        );
    }

    #[test]
    fn limit_inside_window_kept() {
        let q = bounder().bound("select * from t limit 20000").unwrap();
        assert_eq!(q.effective, "select * from t limit 20000");
        assert_eq!(q.limit, LimitAction::Kept { limit: 20_000 });
    }

    #[test]
    fn missing_limit_wraps_candidate() {
        let q = bounder().bound("SELECT placa FROM t WHERE pressure < 100").unwrap();
        assert_eq!(
            q.effective,
            "SELECT * FROM (SELECT placa FROM t WHERE pressure < 100) AS subq LIMIT 50000"
        );
        assert_eq!(q.limit, LimitAction::Wrapped { limit: 50_000 });
    }

    #[test]
    fn trailing_terminator_and_whitespace_trimmed() {
        let q = bounder().bound("  SELECT 1 FROM t ;  \n").unwrap();
        assert_eq!(q.effective, "SELECT * FROM (SELECT 1 FROM t) AS subq LIMIT 50000");
        let q = bounder().bound("SELECT 1 FROM t LIMIT 5; -- done").unwrap();
        assert_eq!(q.effective, "SELECT 1 FROM t LIMIT 10000");
    }

    #[test]
    fn trailing_comment_cannot_swallow_wrapper() {
        let q = bounder().bound("SELECT 1 FROM t -- note").unwrap();
        assert!(q.effective.ends_with(") AS subq LIMIT 50000"));
        assert!(!q.effective.contains("note"));
    }

    #[test]
    fn non_select_statements_rejected() {
        for sql in ["DELETE FROM t", "DROP TABLE t", "UPDATE t SET x = 1", "", "  ;  "] {
            let err = bounder().bound(sql).unwrap_err();
            assert_eq!(err.code(), "TPM-2101", "expected rejection for {sql:?}");
        }
    }

    #[test]
    fn stacked_statements_rejected() {
        let err = bounder()
            .bound("SELECT * FROM t; DROP TABLE t")
            .unwrap_err();
        assert!(matches!(err, TpmsError::NotAReadQuery { .. }));
    }

    #[test]
    fn leading_comment_skipped() {
        let q = bounder().bound("/* generated */ SELECT 1 LIMIT 3").unwrap();
        assert_eq!(q.effective, "SELECT 1 LIMIT 10000");
    }

    #[test]
    fn nested_limit_is_not_outermost() {
        let q = bounder()
            .bound("SELECT * FROM (SELECT * FROM t LIMIT 5) x")
            .unwrap();
        assert_eq!(q.limit, LimitAction::Wrapped { limit: 50_000 });
        assert!(q.effective.contains("LIMIT 5) x) AS subq LIMIT 50000"));
    }

    #[test]
    fn outer_limit_clamped_when_inner_also_limited() {
        let q = bounder()
            .bound("SELECT * FROM (SELECT * FROM t LIMIT 5) x LIMIT 1")
            .unwrap();
        assert_eq!(
            q.effective,
            "SELECT * FROM (SELECT * FROM t LIMIT 5) x LIMIT 10000"
        );
    }

    #[test]
    fn limit_with_offset_forms() {
        let q = bounder().bound("SELECT * FROM t LIMIT 100 OFFSET 20").unwrap();
        assert_eq!(q.effective, "SELECT * FROM t LIMIT 10000 OFFSET 20");

        let q = bounder().bound("SELECT * FROM t LIMIT 20, 999999").unwrap();
        assert_eq!(q.effective, "SELECT * FROM t LIMIT 20, 50000");
    }

    #[test]
    fn unclampable_limits_wrap() {
        for sql in [
            "SELECT * FROM t LIMIT ?",
            "SELECT * FROM t LIMIT -1",
            "SELECT * FROM t LIMIT 5 + 5",
        ] {
            let q = bounder().bound(sql).unwrap();
            assert_eq!(q.limit, LimitAction::Wrapped { limit: 50_000 }, "{sql}");
        }
    }

    #[test]
    fn limit_inside_literal_ignored() {
        let q = bounder()
            .bound("SELECT * FROM t WHERE note = 'LIMIT 5'")
            .unwrap();
        assert_eq!(q.limit, LimitAction::Wrapped { limit: 50_000 });
        assert!(q.effective.contains("'LIMIT 5'"));
    }

    #[test]
    fn overflowing_limit_saturates_then_lowers() {
        let q = bounder()
            .bound("SELECT * FROM t LIMIT 99999999999999999999999")
            .unwrap();
        assert_eq!(q.effective, "SELECT * FROM t LIMIT 50000");
    }

    #[test]
    fn aliases_corrected_before_bounding() {
        let q = bounder()
            .bound("SELECT AVG(temperatura), MAX(Pressao), longitude FROM t WHERE placa = 'temperatura'")
            .unwrap();
        assert_eq!(
            q.effective,
            "SELECT * FROM (SELECT AVG(temperature), MAX(pressure), longtitude FROM t WHERE placa = 'temperatura') AS subq LIMIT 50000"
        );
        let froms: Vec<&str> = q.rewritten_aliases.iter().map(|r| r.from.as_str()).collect();
        assert_eq!(froms, vec!["temperatura", "Pressao", "longitude"]);
    }

    #[test]
    fn inverted_window_rejected() {
        let err = QueryBounder::new(100, 10, AliasTable::empty()).unwrap_err();
        assert_eq!(err.code(), "TPM-1001");
        assert!(QueryBounder::new(0, 10, AliasTable::empty()).is_err());
    }

    #[test]
    fn candidate_preserved_verbatim() {
        let q = bounder().bound("  SELECT 1;").unwrap();
        assert_eq!(q.candidate, "  SELECT 1;");
    }

    #[test]
    fn limit_action_serializes_with_tag() {
        let json = serde_json::to_value(LimitAction::Raised { from: 5, to: 10 }).unwrap();
        assert_eq!(json["action"], "raised");
        assert_eq!(json["from"], 5);
    }
}
