//! Resolution behavior across the root and encoding tables.

use casc_formats::flags::{content, locale};
use casc_formats::{EncodingKey, EncodingTable, RootTable};
use casc_source::{resolve_encoding_key, Error};

/// Modern v1 root payload from (content_flags, locale_flags, records).
fn root_bytes(blocks: &[(u32, u32, Vec<(i32, [u8; 16])>)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"TSFM");
    data.extend_from_slice(&0x18u32.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes()); // version
    data.extend_from_slice(&0u32.to_le_bytes()); // totalFileCount
    data.extend_from_slice(&0u32.to_le_bytes()); // namedFileCount
    data.extend_from_slice(&0u32.to_le_bytes()); // padding
    for (content_flags, locale_flags, records) in blocks {
        data.extend_from_slice(&(records.len() as u32).to_le_bytes());
        data.extend_from_slice(&content_flags.to_le_bytes());
        data.extend_from_slice(&locale_flags.to_le_bytes());
        for (delta, _) in records {
            data.extend_from_slice(&delta.to_le_bytes());
        }
        for (_, ckey) in records {
            data.extend_from_slice(ckey);
        }
        data.extend_from_slice(&vec![0u8; 8 * records.len()]);
    }
    data
}

/// One-page encoding payload from (ckey, ekey) pairs.
fn encoding_bytes(pairs: &[([u8; 16], [u8; 16])]) -> Vec<u8> {
    let mut page = Vec::new();
    for (ckey, ekey) in pairs {
        page.push(1u8);
        page.extend_from_slice(&[0, 0, 0, 0, 0]); // 40-bit size
        page.extend_from_slice(ckey);
        page.extend_from_slice(ekey);
    }
    page.resize(1024, 0);

    let mut data = Vec::new();
    data.extend_from_slice(b"EN");
    data.push(1);
    data.push(16);
    data.push(16);
    data.extend_from_slice(&1u16.to_be_bytes());
    data.extend_from_slice(&0u16.to_be_bytes());
    data.extend_from_slice(&1u32.to_be_bytes());
    data.extend_from_slice(&0u32.to_be_bytes());
    data.push(0);
    data.extend_from_slice(&0u32.to_be_bytes());
    data.extend_from_slice(&[0u8; 32]);
    data.extend_from_slice(&page);
    data
}

#[test]
fn low_violence_type_loses_to_later_type() {
    // FileDataID 100 exists under two root types: type 0 is low violence,
    // type 1 is plain enUS. Resolution must land on type 1's key.
    let root = RootTable::parse(&root_bytes(&[
        (
            content::LOW_VIOLENCE,
            locale::EN_US,
            vec![(100, [0xA0; 16])],
        ),
        (0, locale::EN_US, vec![(100, [0xB0; 16])]),
    ]))
    .unwrap();
    let encoding = EncodingTable::parse(&encoding_bytes(&[
        ([0xA0; 16], [0xA1; 16]),
        ([0xB0; 16], [0xB1; 16]),
    ]))
    .unwrap();

    let ekey = resolve_encoding_key(&root, &encoding, locale::EN_US, 100).unwrap();
    assert_eq!(ekey, EncodingKey::new([0xB1; 16]));
}

#[test]
fn lower_type_index_wins_when_both_visible() {
    let root = RootTable::parse(&root_bytes(&[
        (0, locale::EN_US, vec![(7, [0x01; 16])]),
        (0, locale::EN_US, vec![(7, [0x02; 16])]),
    ]))
    .unwrap();
    let encoding = EncodingTable::parse(&encoding_bytes(&[
        ([0x01; 16], [0x11; 16]),
        ([0x02; 16], [0x22; 16]),
    ]))
    .unwrap();

    let ekey = resolve_encoding_key(&root, &encoding, locale::EN_US, 7).unwrap();
    assert_eq!(ekey, EncodingKey::new([0x11; 16]));
}

#[test]
fn skips_content_keys_missing_from_encoding() {
    // Type 0's key is absent from the encoding table; resolution falls
    // through to type 1.
    let root = RootTable::parse(&root_bytes(&[
        (0, locale::EN_US, vec![(9, [0x0A; 16])]),
        (0, locale::EN_US, vec![(9, [0x0B; 16])]),
    ]))
    .unwrap();
    let encoding = EncodingTable::parse(&encoding_bytes(&[([0x0B; 16], [0xBB; 16])])).unwrap();

    let ekey = resolve_encoding_key(&root, &encoding, locale::EN_US, 9).unwrap();
    assert_eq!(ekey, EncodingKey::new([0xBB; 16]));
}

#[test]
fn every_valid_entry_resolves() {
    let root = RootTable::parse(&root_bytes(&[
        (0, locale::EN_US, vec![(1, [0x01; 16]), (2, [0x02; 16])]),
        (content::LOW_VIOLENCE, locale::EN_US, vec![(0, [0x03; 16])]),
        (0, locale::KO_KR, vec![(5, [0x04; 16])]),
    ]))
    .unwrap();
    let encoding = EncodingTable::parse(&encoding_bytes(&[
        ([0x01; 16], [0x11; 16]),
        ([0x02; 16], [0x12; 16]),
        ([0x04; 16], [0x14; 16]),
    ]))
    .unwrap();

    let valid = root.valid_entries(locale::EN_US);
    assert_eq!(valid, vec![1, 4]);
    for fdid in valid {
        assert!(resolve_encoding_key(&root, &encoding, locale::EN_US, fdid).is_ok());
    }
}

#[test]
fn unknown_file_id_is_not_found() {
    let root = RootTable::parse(&root_bytes(&[(0, locale::EN_US, vec![(1, [0x01; 16])])]))
        .unwrap();
    let encoding = EncodingTable::parse(&encoding_bytes(&[([0x01; 16], [0x11; 16])])).unwrap();

    assert!(matches!(
        resolve_encoding_key(&root, &encoding, locale::EN_US, 999),
        Err(Error::FileIdNotFound(999))
    ));
}

#[test]
fn invisible_entries_leave_no_encoding_key() {
    // The FileDataID exists but only under a filtered-out locale.
    let root = RootTable::parse(&root_bytes(&[(0, locale::KO_KR, vec![(3, [0x01; 16])])]))
        .unwrap();
    let encoding = EncodingTable::parse(&encoding_bytes(&[([0x01; 16], [0x11; 16])])).unwrap();

    assert!(matches!(
        resolve_encoding_key(&root, &encoding, locale::EN_US, 3),
        Err(Error::EncodingKeyNotFound(3))
    ));
    assert!(root.valid_entries(locale::EN_US).is_empty());
}
