use tempfile::TempDir;

use crate::record::{BlockRecord, FileVersion};

pub fn temp_prefix() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

pub fn sample_version(name: &str, mtime: u64) -> FileVersion {
    FileVersion {
        file_type: 1,
        inode: 4242,
        mode: 0o100644,
        atime: mtime,
        ctime: mtime,
        mtime,
        size: 38_680,
        owner: "root".into(),
        group: "root".into(),
        uid: 0,
        gid: 0,
        name: name.into(),
        link: String::new(),
        hash_list: Vec::new(),
    }
}

pub fn block_of(data: &[u8]) -> BlockRecord {
    BlockRecord::from_plain(data.to_vec())
}
