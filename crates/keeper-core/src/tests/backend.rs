use crate::backend::{Backend, FileBackend, MemoryBackend};
use crate::block_id::BlockId;
use crate::query::ListQuery;
use crate::testutil::{block_of, sample_version, temp_prefix};

/// Behavioural suite both realisations must pass.
fn exercise(backend: &dyn Backend) {
    let b1 = block_of(b"shared block");
    let absent = BlockId::compute(b"nobody stored this");

    // Dedup across hosts: the block is global, the logs are per host.
    let mut v1 = sample_version("/home/alice/notes", 100);
    v1.hash_list = vec![b1.hash];
    let mut v2 = sample_version("/home/bob/notes", 200);
    v2.hash_list = vec![b1.hash];

    assert_eq!(backend.needed(&[b1.hash]).unwrap(), vec![b1.hash]);
    backend.store_block(&b1).unwrap();
    assert!(backend.needed(&[b1.hash]).unwrap().is_empty());

    backend.store_metadata("h1", &v1).unwrap();
    backend.store_metadata("h2", &v2).unwrap();

    let h1 = backend.list_files("h1", &ListQuery::match_all()).unwrap();
    let h2 = backend.list_files("h2", &ListQuery::match_all()).unwrap();
    assert_eq!(h1.len(), 1);
    assert_eq!(h2.len(), 1);
    assert_eq!(h1[0].name, "/home/alice/notes");
    assert_eq!(h2[0].name, "/home/bob/notes");

    // needed is order-stable, deduplicated, and idempotent.
    let needed = backend.needed(&[absent, b1.hash, absent]).unwrap();
    assert_eq!(needed, vec![absent]);
    assert_eq!(backend.needed(&needed).unwrap(), needed);

    // Round trip through get_block.
    let got = backend.get_block(&b1.hash).unwrap();
    assert_eq!(got.uncompressed().unwrap(), b"shared block");
    assert!(backend.get_block(&absent).is_err());

    // latest-only collapses versions of one path.
    for mtime in [1, 2, 3] {
        backend
            .store_metadata("h3", &sample_version("/versioned", mtime))
            .unwrap();
    }
    let mut latest = ListQuery::match_all();
    latest.latest = true;
    let records = backend.list_files("h3", &latest).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mtime, 3);

    // Unknown host: empty, not an error.
    assert!(backend
        .list_files("no-such-host", &ListQuery::match_all())
        .unwrap()
        .is_empty());
}

#[test]
fn memory_backend_behaviour() {
    let backend = MemoryBackend::new();
    exercise(&backend);
}

#[test]
fn file_backend_behaviour() {
    let prefix = temp_prefix();
    let backend = FileBackend::open(prefix.path(), 2).unwrap();
    exercise(&backend);
}
