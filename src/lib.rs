//! # RoseKV
//!
//! An embedded key-value engine with five data types over one append-only
//! log abstraction:
//! - Strings, lists, hashes, sets and sorted sets, each in its own segment family
//! - Crash recovery by replaying segments into in-memory indexes
//! - Lazy per-key TTL expiration
//! - Background merge that drops superseded entries
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Engine (Arc<Engine>)                     │
//! │          typed operations, validation, gate RwLock           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ one RwLock per data type
//!     ┌────────┬────────┼────────┬────────┐
//!     ▼        ▼        ▼        ▼        ▼
//!  ┌──────┐ ┌──────┐ ┌──────┐ ┌──────┐ ┌──────┐
//!  │ str  │ │ list │ │ hash │ │ set  │ │ zset │   Store: index + expiry ledger
//!  └──┬───┘ └──┬───┘ └──┬───┘ └──┬───┘ └──┬───┘
//!     ▼        ▼        ▼        ▼        ▼
//!  ┌─────────────────────────────────────────────┐
//!  │  FileSet: active segment + archived segments │   write-log-then-apply
//!  └─────────────────────────────────────────────┘
//!                       ▲
//!                       │ rewrite live entries
//!              ┌────────┴────────┐
//!              │  Merge ticker   │
//!              └─────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod ds;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, IndexMode, RwMethod};
pub use ds::InsertOption;
pub use engine::{Engine, SegmentStats};
pub use error::{Result, RoseError};
pub use storage::DataType;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of RoseKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
