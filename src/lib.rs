//! cmdgate: an authorization gate for shell commands proposed by an agent.
//!
//! A raw command string is split into its compound parts, each part is
//! normalized (redirection stripped, `bash -c` unwrapped), and the parts
//! are matched against allow and deny rules. The result is one of
//! [`eval::Decision::Approve`], [`eval::Decision::Ask`] or
//! [`eval::Decision::Deny`]; across a compound command the most
//! restrictive vote wins.
//!
//! # Architecture
//!
//! - **[`parse`]**: quote tracking, compound splitting, component normalization.
//! - **[`eval`]**: rules, the permission evaluator, and the session approval cache.
//! - **[`exec`]**: runs approved commands through `sh -c` and reports results.
//! - **[`session`]**: ties an evaluator and executor together for one agent session.
//! - **[`config`]**: embedded default rules plus a user overlay.
//! - **[`logging`]**: logger setup and decision records.

pub mod config;
pub mod error;
/// Permission evaluation: rules, decisions, approval cache.
pub mod eval;
pub mod exec;
pub mod logging;
/// Shell command parsing: quotes, operators, redirection, `bash -c`.
pub mod parse;
pub mod session;

use std::sync::Arc;

use eval::{ApprovalCache, PermissionEvaluator, RuleMatch};

/// Evaluate a command against the default configuration.
///
/// Each call uses a fresh approval cache. For anything longer-lived,
/// build a [`session::Session`] or [`eval::PermissionEvaluator`].
pub fn evaluate(command: &str) -> RuleMatch {
    let config = config::Config::default_config();
    PermissionEvaluator::from_config(&config, Arc::new(ApprovalCache::new())).check(command)
}
