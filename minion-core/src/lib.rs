//! Coordination kernel for minion-comms.
//!
//! This crate holds the domain models, the pure policy rules and the SQLite
//! store that several agent processes share. It knows nothing about the MCP
//! transport that exposes it.
//!
//! # Usage
//!
//! ```no_run
//! use minion_core::db::Database;
//! use minion_core::models::*;
//!
//! let db = Database::open(std::path::Path::new("/tmp/minion-comms/messages.db"))?;
//! db.migrate()?;
//!
//! db.register(RegisterAgentInput {
//!     name: "boss".into(),
//!     agent_class: AgentClass::Lead,
//!     model: None,
//!     description: None,
//!     transport: Transport::Terminal,
//! })?;
//! db.set_battle_plan("boss", "Ship the parser")?;
//! # Ok::<(), minion_core::error::CommsError>(())
//! ```

pub mod db;
pub mod error;
pub mod models;
pub mod policy;

// Re-export commonly used types at crate root
pub use db::Database;
pub use error::{CommsError, Result};
