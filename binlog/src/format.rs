//! Per-connection parameters learned from the format-description event,
//! trimmed to the fields the assembler actually consults.

use common::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    None,
    Crc32,
}

impl ChecksumAlgorithm {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ChecksumAlgorithm::None),
            1 => Ok(ChecksumAlgorithm::Crc32),
            other => Err(ProtocolError::Malformed(format!(
                "unsupported checksum algorithm code {other}"
            ))
            .into()),
        }
    }
}

/// Learned once per connection from the first format-description event,
/// and replaceable by any later one (the master may re-emit it across a
/// binlog rotation or a server-version change). The zero value means "not
/// yet learned" — only a fake rotate may precede it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogFormat {
    pub format_version: u16,
    pub server_version: String,
    pub header_length: u8,
    /// Post-header length by event type code, indexed `[type_code - 1]`.
    pub post_header_lengths: Vec<u8>,
    pub checksum: ChecksumAlgorithm,
}

impl Default for BinlogFormat {
    fn default() -> Self {
        Self {
            format_version: 0,
            server_version: String::new(),
            header_length: 0,
            post_header_lengths: Vec::new(),
            checksum: ChecksumAlgorithm::None,
        }
    }
}

impl BinlogFormat {
    pub fn is_zero(&self) -> bool {
        self.format_version == 0
    }

    pub fn post_header_length(&self, event_type: u8) -> u8 {
        self.post_header_lengths
            .get(event_type.saturating_sub(1) as usize)
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_zero() {
        assert!(BinlogFormat::default().is_zero());
    }

    #[test]
    fn checksum_algorithm_rejects_unknown_code() {
        assert!(ChecksumAlgorithm::from_code(2).is_err());
    }
}
