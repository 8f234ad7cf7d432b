//! Log Entry Codec
//!
//! Every mutation is persisted as one self-describing entry:
//! a fixed 34-byte little-endian header followed by key, value and extra bytes.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, RoseError};

use super::DataType;

/// crc(4) + key size(4) + value size(4) + extra size(4) + state(2) + timestamp(8) + reserved(8)
pub const ENTRY_HEADER_SIZE: usize = 34;

/// Bytes of the header actually carrying fields; the rest is reserved and zero
const HEADER_FIELDS_SIZE: usize = 26;

/// A single log entry
///
/// `timestamp` is the write time in nanoseconds for plain writes and the
/// absolute deadline in unix seconds for expire marks. Which one applies is
/// decided by the mark, never converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub extra: Vec<u8>,
    pub timestamp: u64,
    state: u16,
    crc: u32,
}

/// Decoded fixed header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryHeader {
    pub crc: u32,
    pub key_size: u32,
    pub value_size: u32,
    pub extra_size: u32,
    pub state: u16,
    pub timestamp: u64,
}

impl EntryHeader {
    /// Parse the header at the start of `buf`
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ENTRY_HEADER_SIZE {
            return Err(RoseError::InvalidEntry(format!(
                "header needs {} bytes, got {}",
                ENTRY_HEADER_SIZE,
                buf.len()
            )));
        }
        let mut cursor = &buf[..HEADER_FIELDS_SIZE];
        Ok(Self {
            crc: cursor.get_u32_le(),
            key_size: cursor.get_u32_le(),
            value_size: cursor.get_u32_le(),
            extra_size: cursor.get_u32_le(),
            state: cursor.get_u16_le(),
            timestamp: cursor.get_u64_le(),
        })
    }

    pub fn payload_len(&self) -> usize {
        self.key_size as usize + self.value_size as usize + self.extra_size as usize
    }
}

impl Entry {
    /// New entry stamped with the current time in nanoseconds
    pub fn new(
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        extra: impl Into<Vec<u8>>,
        data_type: DataType,
        mark: impl Into<u16>,
    ) -> Self {
        let state = pack_state(data_type, mark.into());
        Self::from_parts(key.into(), value.into(), extra.into(), state, now_nanos())
    }

    /// New entry without extra bytes
    pub fn no_extra(
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        data_type: DataType,
        mark: impl Into<u16>,
    ) -> Self {
        Self::new(key, value, Vec::new(), data_type, mark)
    }

    /// New entry whose timestamp field carries an absolute deadline (unix seconds)
    pub fn with_deadline(
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        deadline: i64,
        data_type: DataType,
        mark: impl Into<u16>,
    ) -> Self {
        let state = pack_state(data_type, mark.into());
        Self::from_parts(key.into(), value.into(), Vec::new(), state, deadline.max(0) as u64)
    }

    fn from_parts(key: Vec<u8>, value: Vec<u8>, extra: Vec<u8>, state: u16, timestamp: u64) -> Self {
        let crc = crc32fast::hash(&value);
        Self { key, value, extra, timestamp, state, crc }
    }

    // =========================================================================
    // State Accessors
    // =========================================================================

    pub fn state(&self) -> u16 {
        self.state
    }

    /// High byte of the state
    pub fn get_type(&self) -> u16 {
        self.state >> 8
    }

    /// Low byte of the state
    pub fn get_mark(&self) -> u16 {
        self.state & 0xFF
    }

    pub fn data_type(&self) -> Option<DataType> {
        DataType::from_u8(self.get_type() as u8)
    }

    /// Deadline carried by expire marks
    pub fn deadline(&self) -> i64 {
        self.timestamp as i64
    }

    pub fn crc(&self) -> u32 {
        self.crc
    }

    /// Encoded size in bytes
    pub fn size(&self) -> u64 {
        (ENTRY_HEADER_SIZE + self.key.len() + self.value.len() + self.extra.len()) as u64
    }

    // =========================================================================
    // Codec
    // =========================================================================

    /// Serialize to the on-disk layout
    pub fn encode(&self) -> Result<Bytes> {
        if self.key.is_empty() {
            return Err(RoseError::EmptyEntry);
        }

        let mut buf = BytesMut::with_capacity(self.size() as usize);
        buf.put_u32_le(self.crc);
        buf.put_u32_le(self.key.len() as u32);
        buf.put_u32_le(self.value.len() as u32);
        buf.put_u32_le(self.extra.len() as u32);
        buf.put_u16_le(self.state);
        buf.put_u64_le(self.timestamp);
        buf.put_bytes(0, ENTRY_HEADER_SIZE - HEADER_FIELDS_SIZE);
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);
        buf.put_slice(&self.extra);
        Ok(buf.freeze())
    }

    /// Deserialize a complete encoded entry, verifying the value checksum
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let header = EntryHeader::decode(buf)?;
        if header.key_size == 0 {
            return Err(RoseError::InvalidEntry("zero key size".to_string()));
        }
        let payload = &buf[ENTRY_HEADER_SIZE..];
        if payload.len() < header.payload_len() {
            return Err(RoseError::InvalidEntry(format!(
                "payload needs {} bytes, got {}",
                header.payload_len(),
                payload.len()
            )));
        }
        Self::from_header(header, &payload[..header.payload_len()])
    }

    /// Build from a decoded header and exactly `header.payload_len()` bytes
    pub(crate) fn from_header(header: EntryHeader, payload: &[u8]) -> Result<Self> {
        let ks = header.key_size as usize;
        let vs = header.value_size as usize;
        let (key, rest) = payload.split_at(ks);
        let (value, extra) = rest.split_at(vs);

        let actual = crc32fast::hash(value);
        if actual != header.crc {
            return Err(RoseError::InvalidCrc { expected: header.crc, actual });
        }

        Ok(Self {
            key: key.to_vec(),
            value: value.to_vec(),
            extra: extra.to_vec(),
            timestamp: header.timestamp,
            state: header.state,
            crc: header.crc,
        })
    }
}

fn pack_state(data_type: DataType, mark: u16) -> u16 {
    ((data_type as u16) << 8) | (mark & 0xFF)
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
