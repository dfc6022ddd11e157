//! # Arena Player Client Library
//!
//! Client side of a turn-based, server-authoritative arena. Every turn the
//! server broadcasts a full snapshot of the match; each player answers within
//! the turn window with a set of orders and gets a verdict back.
//!
//! ## Turn Loop
//!
//! ```text
//! snapshot ──▶ dispatcher ──▶ policy ──▶ order sender ──▶ verdict (logged)
//! ```
//!
//! Turns are handled one at a time. A snapshot that is not newer than the
//! last delivered one never reaches the policy, a policy that overruns the
//! turn deadline simply misses that turn, and any per-turn failure is logged
//! and forgotten. Only a failed connection at startup stops the process.
//!
//! ## Module Organization
//!
//! - `connection`: handshake, inbound packet routing, done signal, stop
//! - `dispatcher`: per-turn state machine and deadline enforcement
//! - `sender`: order submission and acknowledgement matching
//! - `supervisor`: interrupt vs. session-end shutdown race
//! - `policy`: the decision seam plus the bundled `ChaseAndShoot` policy
//! - `config`: typed player configuration
//! - `error`: error classes
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::{config::PlayerConfig, connection, policy::ChaseAndShoot, supervisor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PlayerConfig::default();
//!     let (done, mut session) = connection::connect(&config).await?;
//!     session.on_new_turn(ChaseAndShoot::new(session.identity()))?;
//!
//!     supervisor::supervise(
//!         session,
//!         done,
//!         supervisor::ctrl_c(),
//!         config.timing.shutdown_timeout(),
//!     )
//!     .await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod sender;
pub mod supervisor;

#[cfg(test)]
mod test_log;
