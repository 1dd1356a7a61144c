use crate::block_id::BlockId;
use crate::blockstore::BlockStore;
use crate::compress::{self, CompressionKind};
use crate::record::BlockRecord;
use crate::testutil::{block_of, temp_prefix};

#[test]
fn open_rejects_out_of_range_levels() {
    let prefix = temp_prefix();
    assert!(BlockStore::open(prefix.path(), 1).is_err());
    assert!(BlockStore::open(prefix.path(), 6).is_err());
    assert!(BlockStore::open(prefix.path(), 0).is_err());
}

#[test]
fn open_creates_fanout_and_marker_once() {
    let prefix = temp_prefix();
    let _store = BlockStore::open(prefix.path(), 2).unwrap();

    let data = prefix.path().join("data");
    assert!(data.join(".done").is_file());
    assert!(data.join("00").join("00").is_dir());
    assert!(data.join("ff").join("ff").is_dir());
    assert!(data.join("ab").join("cd").is_dir());

    // Reopening must short-circuit on the marker, not rebuild the tree.
    let reopened = BlockStore::open(prefix.path(), 2);
    assert!(reopened.is_ok());
}

#[test]
fn put_get_has_needed() {
    let prefix = temp_prefix();
    let store = BlockStore::open(prefix.path(), 2).unwrap();

    let b1 = block_of(b"first block contents");
    let b2 = block_of(b"second block contents");
    let absent = BlockId::compute(b"never stored");

    assert!(!store.has(&b1.hash));
    store.put(&b1).unwrap();
    assert!(store.has(&b1.hash));

    // Round trip preserves payload and descriptor.
    let got = store.get(&b1.hash).unwrap();
    assert_eq!(got.data, b1.data);
    assert_eq!(got.cmptype, CompressionKind::None);
    assert_eq!(got.uncmplen, b1.data.len() as u64);

    // Same-digest put is idempotent.
    store.put(&b1).unwrap();
    assert_eq!(store.get(&b1.hash).unwrap().data, b1.data);

    // Missing digest is a distinct error.
    assert!(matches!(
        store.get(&absent),
        Err(crate::error::KeeperError::BlockNotFound(_))
    ));

    // needed: order-stable, deduplicated, present digests filtered out.
    let input = [b2.hash, b1.hash, absent, b2.hash, absent];
    let needed = store.needed(&input);
    assert_eq!(needed, vec![b2.hash, absent]);

    // Idempotence: nothing was stored in between, so a second pass agrees.
    assert_eq!(store.needed(&needed), needed);

    store.put(&b2).unwrap();
    assert_eq!(store.needed(&input), vec![absent]);
}

#[test]
fn compressed_block_round_trip() {
    let prefix = temp_prefix();
    let store = BlockStore::open(prefix.path(), 2).unwrap();

    let original = b"a block that compresses reasonably well ".repeat(64);
    let payload = compress::compress(CompressionKind::Zlib, &original).unwrap();
    let block = BlockRecord {
        hash: BlockId::compute(&original),
        size: payload.len() as u64,
        data: payload,
        cmptype: CompressionKind::Zlib,
        uncmplen: original.len() as u64,
    };
    store.put(&block).unwrap();

    let got = store.get(&block.hash).unwrap();
    assert_eq!(got.cmptype, CompressionKind::Zlib);
    assert_eq!(got.uncmplen, original.len() as u64);
    assert_eq!(got.uncompressed().unwrap(), original);
    // The stored payload hashes back to its name once inflated.
    assert_eq!(BlockId::compute(&got.uncompressed().unwrap()), block.hash);
}

#[test]
fn missing_sidecar_degrades_to_plain() {
    let prefix = temp_prefix();
    let store = BlockStore::open(prefix.path(), 2).unwrap();

    let block = block_of(b"sidecar goes missing");
    store.put(&block).unwrap();

    let hex = block.hash.to_hex();
    let sidecar = prefix
        .path()
        .join("data")
        .join(&hex[0..2])
        .join(&hex[2..4])
        .join(format!("{}.meta", &hex[4..]));
    assert!(sidecar.is_file());
    std::fs::remove_file(&sidecar).unwrap();

    let got = store.get(&block.hash).unwrap();
    assert_eq!(got.cmptype, CompressionKind::None);
    assert_eq!(got.uncmplen, block.data.len() as u64);
    assert_eq!(got.data, block.data);
}
