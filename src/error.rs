//! Error types for RoseKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using RoseError
pub type Result<T> = std::result::Result<T, RoseError>;

/// Unified error type for RoseKV operations
#[derive(Debug, Error)]
pub enum RoseError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Input Validation Errors
    // -------------------------------------------------------------------------
    #[error("the key is empty")]
    EmptyKey,

    #[error("key exceeded the max length")]
    KeyTooLarge,

    #[error("value exceeded the max length")]
    ValueTooLarge,

    #[error("invalid ttl, must be greater than zero")]
    InvalidTtl,

    #[error("extra contains the reserved separator \\0")]
    ExtraContainsSeparator,

    #[error("wrong number of arguments")]
    WrongNumberArgs,

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("key not exist")]
    KeyNotExist,

    #[error("key is expired")]
    KeyExpired,

    // -------------------------------------------------------------------------
    // Log Entry / Segment Errors
    // -------------------------------------------------------------------------
    #[error("entry or the key of entry is empty")]
    EmptyEntry,

    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("invalid crc: expected {expected:#010x}, got {actual:#010x}")]
    InvalidCrc { expected: u32, actual: u32 },

    #[error("end of entries")]
    EndOfEntry,

    #[error("short write: expected {expected} bytes, wrote {written}")]
    WriteSizeMismatch { expected: usize, written: usize },

    #[error("entry of {size} bytes does not fit in a mapped segment of {capacity} bytes")]
    EntryTooLarge { size: u64, capacity: u64 },

    // -------------------------------------------------------------------------
    // Engine State Errors
    // -------------------------------------------------------------------------
    #[error("a merge is already in progress")]
    AlreadyMerging,

    #[error("no data type reached the merge threshold")]
    ThresholdNotReached,

    #[error("db is closed, reopen it")]
    DbClosed,

    #[error("segment {id} of type {data_type} exists in both the data and merge directories")]
    MergeConflict {
        data_type: crate::storage::DataType,
        id: u32,
    },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
