//! Candidate SQL gating, alias correction and row-limit bounding.

pub mod aliases;
pub mod bounder;
pub mod lexer;

pub use aliases::{AliasRewrite, AliasTable};
pub use bounder::{BoundedQuery, LimitAction, QueryBounder};
