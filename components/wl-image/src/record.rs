use alloc::vec::Vec;

use crate::error::{Advisory, Error, Result};
use crate::ERASED_BYTE;

/// Encoded size of a `WlStateRecord`.
pub const STATE_RECORD_SIZE: usize = 48;
/// Container format version written by `pack`.
pub const WL_VERSION: u32 = 2;
/// Running CRC value the checksum starts from (zlib `crc32(data, CRC_SEED)`).
pub const CRC_SEED: u32 = u32::MAX;

const CRC_OFFSET: usize = STATE_RECORD_SIZE - 4;
const RESERVED_LEN: usize = 12;
const RESERVED_OFFSET: usize = CRC_OFFSET - RESERVED_LEN;

/// Bookkeeping record stored in the state sectors of a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WlStateRecord {
    pub pos: u32,
    pub max_pos: u32,
    pub move_count: u32,
    pub access_count: u32,
    pub max_count: u32,
    pub block_size: u32,
    pub version: u32,
    pub device_id: u32,
    pub reserved: [u8; RESERVED_LEN],
    pub crc32: u32,
}

impl WlStateRecord {
    /// Fresh record for a container with `max_pos` data sectors, checksum included.
    pub fn new(max_pos: u32, block_size: u32, update_rate: u32) -> Self {
        let mut record = Self {
            pos: 0,
            max_pos,
            move_count: 0,
            access_count: 0,
            max_count: update_rate.wrapping_mul(max_pos),
            block_size,
            version: WL_VERSION,
            device_id: 0,
            reserved: [ERASED_BYTE; RESERVED_LEN],
            crc32: 0,
        };
        record.crc32 = record.computed_crc();
        record
    }

    /// Parse and verify a record.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let raw: &[u8; STATE_RECORD_SIZE] = buf
            .try_into()
            .map_err(|_| Error::MalformedLength { len: buf.len() })?;
        let record = Self::parse(raw);
        let computed = record.computed_crc();
        if record.crc32 != computed {
            trace_now!("crc mismatch {:08x} != {:08x}", record.crc32, computed);
            return Err(Error::ChecksumMismatch {
                stored: record.crc32,
                computed,
            });
        }
        Ok(record)
    }

    /// Parse the fixed layout without looking at the checksum.
    pub fn parse(raw: &[u8; STATE_RECORD_SIZE]) -> Self {
        let word = |idx: usize| {
            let mut le = [0u8; 4];
            le.copy_from_slice(&raw[idx * 4..idx * 4 + 4]);
            u32::from_le_bytes(le)
        };
        let mut reserved = [0u8; RESERVED_LEN];
        reserved.copy_from_slice(&raw[RESERVED_OFFSET..CRC_OFFSET]);
        Self {
            pos: word(0),
            max_pos: word(1),
            move_count: word(2),
            access_count: word(3),
            max_count: word(4),
            block_size: word(5),
            version: word(6),
            device_id: word(7),
            reserved,
            crc32: word(CRC_OFFSET / 4),
        }
    }

    /// Serialize as stored, the `crc32` field is written verbatim.
    pub fn to_bytes(&self) -> [u8; STATE_RECORD_SIZE] {
        let mut raw = [0u8; STATE_RECORD_SIZE];
        let words = [
            self.pos,
            self.max_pos,
            self.move_count,
            self.access_count,
            self.max_count,
            self.block_size,
            self.version,
            self.device_id,
        ];
        for (chunk, word) in raw[..RESERVED_OFFSET].chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        raw[RESERVED_OFFSET..CRC_OFFSET].copy_from_slice(&self.reserved);
        raw[CRC_OFFSET..].copy_from_slice(&self.crc32.to_le_bytes());
        raw
    }

    /// One state sector: the record followed by erased bytes.
    pub fn to_sector(&self, sector_size: usize) -> Vec<u8> {
        let mut sector = Vec::with_capacity(sector_size.max(STATE_RECORD_SIZE));
        sector.extend_from_slice(&self.to_bytes());
        sector.resize(sector_size.max(STATE_RECORD_SIZE), ERASED_BYTE);
        sector
    }

    pub fn computed_crc(&self) -> u32 {
        checksum(&self.to_bytes()[..CRC_OFFSET])
    }

    pub fn is_valid(&self) -> bool {
        self.crc32 == self.computed_crc()
    }

    /// Well-formed but unexpected content, reported instead of rejected.
    pub fn advisory(&self) -> Option<Advisory> {
        (self.version != WL_VERSION).then_some(Advisory::UnsupportedVersion(self.version))
    }
}

/// CRC-32 (IEEE) continued from `CRC_SEED`, as the device computes it.
pub fn checksum(bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(CRC_SEED);
    hasher.update(bytes);
    hasher.finalize()
}

/// Encoded fresh record, see `WlStateRecord::new`.
pub fn encode(max_pos: u32, block_size: u32, update_rate: u32) -> [u8; STATE_RECORD_SIZE] {
    WlStateRecord::new(max_pos, block_size, update_rate).to_bytes()
}

/// Verified record from exactly `STATE_RECORD_SIZE` bytes.
pub fn decode(buf: &[u8]) -> Result<WlStateRecord> {
    WlStateRecord::decode(buf)
}
