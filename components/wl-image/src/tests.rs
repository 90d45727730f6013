use std::string::ToString;
use std::vec::Vec;

use quickcheck::TestResult;
use rand::{thread_rng, Rng};

use crate::{
    checksum, decode, detect, encode, is_wrapped, pack, unwrap_image, Advisory, ConfigError, Error,
    Layout, WlConfig, WlStateRecord, ERASED_BYTE, STATE_RECORD_SIZE, WL_VERSION,
};

const SECTOR: u32 = 4096;
const SECTOR_SIZES: [u32; 4] = [512, 1024, 2048, 4096];

/// Partition just large enough for `len` bytes plus `spare` unused data sectors.
fn partition_for(len: usize, sector_size: u32, spare: u32) -> u32 {
    let needed = (len as u32).div_ceil(sector_size).max(1);
    (needed + spare + 5) * sector_size
}

fn padded(raw: &[u8], capacity: usize) -> Vec<u8> {
    let mut expected = raw.to_vec();
    expected.resize(capacity, ERASED_BYTE);
    expected
}

#[test]
fn checksum_continues_from_all_ones() {
    // zlib: crc32(b"123456789", 0xffffffff)
    assert_eq!(checksum(b"123456789"), 0xd202_d277);
}

#[test]
fn encode_known_record() {
    let raw = encode(363, 4096, 16);
    let expected: [u8; STATE_RECORD_SIZE] = [
        0x00, 0x00, 0x00, 0x00, 0x6b, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0xb0, 0x16, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xa1,
        0x04, 0xbb, 0xa8,
    ];
    assert_eq!(raw, expected);
    assert_eq!(encode(363, 4096, 16), raw);
}

#[test]
fn decode_returns_encoded_fields() {
    let record = decode(&encode(1, 4096, 16)).unwrap();
    assert_eq!(record.pos, 0);
    assert_eq!(record.max_pos, 1);
    assert_eq!(record.move_count, 0);
    assert_eq!(record.access_count, 0);
    assert_eq!(record.max_count, 16);
    assert_eq!(record.block_size, 4096);
    assert_eq!(record.version, WL_VERSION);
    assert_eq!(record.device_id, 0);
    assert_eq!(record.reserved, [0xFF; 12]);
    assert_eq!(record.crc32, 0x4014_754d);
    assert!(record.is_valid());
    assert_eq!(record.advisory(), None);
}

#[test]
fn decode_rejects_wrong_lengths() {
    let raw = encode(10, 4096, 16);
    assert_eq!(
        decode(&raw[..47]),
        Err(Error::MalformedLength { len: 47 })
    );
    let mut long = raw.to_vec();
    long.push(0xFF);
    assert_eq!(decode(&long), Err(Error::MalformedLength { len: 49 }));
    assert_eq!(decode(&[]), Err(Error::MalformedLength { len: 0 }));
}

#[test]
fn decode_reports_stored_and_computed_crc() {
    let mut raw = encode(10, 4096, 16);
    raw[44..].copy_from_slice(&0xdead_beefu32.to_le_bytes());
    match decode(&raw) {
        Err(Error::ChecksumMismatch { stored, computed }) => {
            assert_eq!(stored, 0xdead_beef);
            assert_eq!(computed, WlStateRecord::new(10, 4096, 16).crc32);
        }
        other => panic!("unexpected decode result: {other:?}"),
    }
}

#[test]
fn other_versions_are_advisories_not_errors() {
    let record = WlStateRecord {
        version: 3,
        ..WlStateRecord::new(10, 4096, 16)
    };
    let record = WlStateRecord {
        crc32: record.computed_crc(),
        ..record
    };
    let decoded = decode(&record.to_bytes()).unwrap();
    assert_eq!(decoded.advisory(), Some(Advisory::UnsupportedVersion(3)));
}

#[test]
fn pack_concrete_partition() {
    let raw = [b'A'; 12];
    let wrapped = pack(&raw, 1_507_328, &WlConfig::default()).unwrap();
    assert_eq!(wrapped.len(), 1_507_328);

    let record = decode(&wrapped[..STATE_RECORD_SIZE]).unwrap();
    assert_eq!(record.max_pos, 363);
    assert_eq!(record.block_size, 4096);
    assert_eq!(record.version, 2);
    assert_eq!(record.max_count, 5808);

    assert_eq!(&wrapped[8192..8192 + 12], &raw);
    let data_end = 8192 + 363 * 4096;
    assert!(wrapped[8192 + 12..data_end].iter().all(|&b| b == 0xFF));
}

#[test]
fn pack_region_contents() {
    let config = WlConfig::default();
    let wrapped = pack(b"payload", 8 * SECTOR, &config).unwrap();
    let layout = Layout::for_partition(8 * SECTOR, SECTOR).unwrap();
    let sector = SECTOR as usize;

    let state = &wrapped[..sector];
    assert_eq!(&state[..STATE_RECORD_SIZE], &encode(3, SECTOR, 16));
    assert!(state[STATE_RECORD_SIZE..].iter().all(|&b| b == 0xFF));
    assert_eq!(&wrapped[sector..2 * sector], state);
    assert!(wrapped[layout.temp()].iter().all(|&b| b == 0xFF));
    assert_eq!(&wrapped[layout.trailing_state()], &wrapped[layout.leading_state()]);
}

#[test]
fn pack_is_deterministic() {
    let mut raw = vec![0u8; 3000];
    thread_rng().fill(&mut raw[..]);
    let config = WlConfig::new(1024).with_update_rate(4);
    let first = pack(&raw, 16 * 1024, &config).unwrap();
    let second = pack(&raw, 16 * 1024, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn minimum_partition() {
    let config = WlConfig::default();
    let fits = vec![0x5A; SECTOR as usize];
    let wrapped = pack(&fits, 6 * SECTOR, &config).unwrap();
    assert_eq!(wrapped.len(), 6 * SECTOR as usize);
    assert_eq!(unwrap_image(&wrapped, SECTOR).unwrap().payload, &fits[..]);

    let too_large = vec![0x5A; SECTOR as usize + 1];
    assert_eq!(
        pack(&too_large, 6 * SECTOR, &config),
        Err(Error::ImageTooLarge {
            len: SECTOR as usize + 1,
            capacity: SECTOR as usize,
        })
    );
}

#[test]
fn pack_rejects_unusable_partitions() {
    let config = WlConfig::default();
    assert_eq!(
        pack(b"", 5 * SECTOR, &config),
        Err(Error::PartitionTooSmall {
            partition_size: 5 * SECTOR,
            sector_size: SECTOR,
        })
    );
    assert!(matches!(
        pack(b"", 7 * SECTOR + 100, &config),
        Err(Error::PartitionTooSmall { .. })
    ));
    assert!(matches!(
        pack(b"", 0, &config),
        Err(Error::PartitionTooSmall { .. })
    ));
}

#[test]
fn pack_rejects_invalid_config() {
    assert_eq!(
        pack(b"", 6 * 32, &WlConfig::new(32)),
        Err(Error::InvalidConfig(ConfigError::SectorTooSmall { sector_size: 32 }))
    );
    assert_eq!(
        pack(b"", 6 * SECTOR, &WlConfig::default().with_update_rate(0)),
        Err(Error::InvalidConfig(ConfigError::ZeroUpdateRate))
    );
    // 1_000_005 sectors of 512 bytes: max_count = 2^13 * 1_000_000 overflows u32
    let config = WlConfig::new(512).with_update_rate(1 << 13);
    assert_eq!(
        pack(b"", 1_000_005 * 512, &config),
        Err(Error::InvalidConfig(ConfigError::MaxCountOverflow {
            update_rate: 1 << 13,
            max_pos: 1_000_000,
        }))
    );
}

#[test]
fn unwrap_keeps_padding() {
    let wrapped = pack(b"abc", 10 * 512, &WlConfig::new(512)).unwrap();
    let unwrapped = unwrap_image(&wrapped, 512).unwrap();
    assert_eq!(unwrapped.payload.len(), 5 * 512);
    assert_eq!(&unwrapped.payload[..3], b"abc");
    assert!(unwrapped.payload[3..].iter().all(|&b| b == 0xFF));
    assert_eq!(unwrapped.state.max_pos, 5);
    assert!(unwrapped.advisories.is_empty());
}

#[test]
fn negative_detection() {
    let erased = vec![0xFF; 16 * SECTOR as usize];
    assert!(!is_wrapped(&erased, SECTOR));

    let wrapped = pack(b"short", 6 * SECTOR, &WlConfig::default()).unwrap();
    assert!(is_wrapped(&wrapped, SECTOR));
    assert!(!is_wrapped(&wrapped[..5 * SECTOR as usize], SECTOR));

    // FAT boot sector at offset 0: no valid record there
    let mut raw = vec![0u8; 8 * SECTOR as usize];
    raw[..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
    raw[3..11].copy_from_slice(b"MSDOS5.0");
    assert!(!is_wrapped(&raw, SECTOR));
    assert_eq!(unwrap_image(&raw, SECTOR), Err(Error::NotWrapped));
}

#[test]
fn valid_record_with_wrong_geometry_is_not_a_container() {
    // record claims 10 data sectors but the blob only has 8 sectors
    let mut blob = vec![0xFF; 8 * SECTOR as usize];
    blob[..STATE_RECORD_SIZE].copy_from_slice(&encode(10, SECTOR, 16));
    assert_eq!(detect(&blob, SECTOR), Err(Error::NotWrapped));
    assert!(!is_wrapped(&blob, SECTOR));

    // right sector count, wrong block size
    blob[..STATE_RECORD_SIZE].copy_from_slice(&encode(3, 512, 16));
    assert!(!is_wrapped(&blob, SECTOR));

    // a container is only recognised with the sector size it was built for
    let wrapped = pack(b"x", 16 * 512, &WlConfig::new(512)).unwrap();
    assert!(is_wrapped(&wrapped, 512));
    assert!(!is_wrapped(&wrapped, 1024));
}

#[test]
fn detect_explains_rejections() {
    let mut wrapped = pack(b"x", 6 * SECTOR, &WlConfig::default()).unwrap();
    wrapped[4] ^= 0x01;
    assert!(matches!(
        detect(&wrapped, SECTOR),
        Err(Error::ChecksumMismatch { .. })
    ));
    assert_eq!(unwrap_image(&wrapped, SECTOR), Err(Error::NotWrapped));
    assert_eq!(detect(&wrapped[..100], SECTOR), Err(Error::NotWrapped));
}

#[test]
fn trailing_state_disagreement_is_advisory() {
    let config = WlConfig::default();
    let mut wrapped = pack(b"data", 12 * SECTOR, &config).unwrap();
    let layout = Layout::for_partition(12 * SECTOR, SECTOR).unwrap();

    // device moved on: trailing copy has a different position
    let moved = WlStateRecord {
        pos: 3,
        ..WlStateRecord::new(7, SECTOR, 16)
    };
    let moved = WlStateRecord {
        crc32: moved.computed_crc(),
        ..moved
    };
    let trailing = layout.trailing_state().start;
    wrapped[trailing..trailing + STATE_RECORD_SIZE].copy_from_slice(&moved.to_bytes());

    let unwrapped = unwrap_image(&wrapped, SECTOR).unwrap();
    assert_eq!(&unwrapped.payload[..4], b"data");
    assert_eq!(unwrapped.state.pos, 0);
    assert_eq!(
        unwrapped.advisories.as_slice(),
        &[Advisory::InconsistentTrailingState]
    );
}

#[test]
fn errors_render_reasons() {
    let err = Error::PartitionTooSmall {
        partition_size: 5 * SECTOR,
        sector_size: SECTOR,
    };
    assert_eq!(
        err.to_string(),
        "partition too small: need >=6 sectors of 4096 bytes, have 5"
    );
    let err = Error::PartitionTooSmall {
        partition_size: 6 * SECTOR + 7,
        sector_size: SECTOR,
    };
    assert_eq!(
        err.to_string(),
        "partition too small: need >=6 sectors of 4096 bytes, have 6 (+7 unaligned bytes)"
    );
    let err = WlConfig::new(32).validate().unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid wear-leveling configuration: sector size 32 cannot hold a 48 byte state record"
    );
    let err = WlConfig::new(512)
        .with_update_rate(1 << 13)
        .max_count(1_000_000)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid wear-leveling configuration: update rate 8192 x 1000000 data sectors overflows max_count"
    );
}

quickcheck::quickcheck! {
    fn roundtrip(raw: Vec<u8>, spare: u8, pick: u8) -> bool {
        let sector_size = SECTOR_SIZES[pick as usize % SECTOR_SIZES.len()];
        let partition_size = partition_for(raw.len(), sector_size, u32::from(spare % 8));
        let config = WlConfig::new(sector_size);

        let wrapped = pack(&raw, partition_size, &config).unwrap();
        let unwrapped = unwrap_image(&wrapped, sector_size).unwrap();
        let capacity = Layout::for_partition(partition_size, sector_size)
            .unwrap()
            .data_capacity();

        is_wrapped(&wrapped, sector_size)
            && unwrapped.payload == &padded(&raw, capacity)[..]
            && unwrapped.advisories.is_empty()
    }

    fn output_fills_partition(len: u16, sectors: u16, pick: u8) -> TestResult {
        let sector_size = SECTOR_SIZES[pick as usize % SECTOR_SIZES.len()];
        let total = u32::from(sectors % 512);
        let partition_size = total * sector_size;
        let raw = vec![0x11; usize::from(len)];
        match pack(&raw, partition_size, &WlConfig::new(sector_size)) {
            Ok(wrapped) => TestResult::from_bool(wrapped.len() == partition_size as usize),
            Err(Error::PartitionTooSmall { .. }) => TestResult::from_bool(total < 6),
            Err(Error::ImageTooLarge { capacity, .. }) => {
                TestResult::from_bool(raw.len() > capacity)
            }
            Err(_) => TestResult::failed(),
        }
    }

    fn single_bit_flip_is_detected(max_pos: u32, update_rate: u8, bit: u16) -> bool {
        let mut raw = encode(max_pos, SECTOR, u32::from(update_rate));
        let bit = usize::from(bit) % (44 * 8);
        raw[bit / 8] ^= 1 << (bit % 8);
        matches!(decode(&raw), Err(Error::ChecksumMismatch { .. }))
    }
}
