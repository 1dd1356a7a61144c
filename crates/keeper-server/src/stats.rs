use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

use serde_json::json;

/// Lock-free request and volume counters behind `/Stats.json`.
///
/// The JSON snapshot keeps the counter tree of the original protocol: per-URL
/// GET and POST counters under their method, plus the file count and byte
/// gauges at the top level.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub get_requests: AtomicU64,
    pub get_stats: AtomicU64,
    pub get_version_json: AtomicU64,
    pub get_version_txt: AtomicU64,
    pub get_file_list: AtomicU64,
    pub get_data_hash: AtomicU64,
    pub get_data_hash_array: AtomicU64,
    pub get_unknown_json: AtomicU64,
    pub get_unknown_txt: AtomicU64,

    pub post_requests: AtomicU64,
    pub post_meta: AtomicU64,
    pub post_data: AtomicU64,
    pub post_data_array: AtomicU64,
    pub post_hash_array: AtomicU64,
    pub post_unknown: AtomicU64,

    pub unknown_requests: AtomicU64,

    /// File versions announced via `/Meta.json`.
    pub files_saved: AtomicU64,
    /// Sum of announced file sizes.
    pub total_bytes: AtomicU64,
    /// Block payload bytes received (after client-side dedup).
    pub dedup_bytes: AtomicU64,
    /// Metadata bytes received.
    pub meta_bytes: AtomicU64,
}

impl ServerStats {
    pub fn bump(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, bytes: u64) {
        counter.fetch_add(bytes, Relaxed);
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let get = self.get_requests.load(Relaxed);
        let post = self.post_requests.load(Relaxed);
        let unknown = self.unknown_requests.load(Relaxed);
        json!({
            "Requests": {
                "Total requests": get + post + unknown,
                "GET": {
                    "Total requests": get,
                    "/Stats.json": self.get_stats.load(Relaxed),
                    "/Version.json": self.get_version_json.load(Relaxed),
                    "/Version": self.get_version_txt.load(Relaxed),
                    "/File/List.json": self.get_file_list.load(Relaxed),
                    "/Data/0xxxx.json": self.get_data_hash.load(Relaxed),
                    "/Data/Hash_Array.json": self.get_data_hash_array.load(Relaxed),
                    "/unknown.json": self.get_unknown_json.load(Relaxed),
                    "/unknown": self.get_unknown_txt.load(Relaxed),
                },
                "POST": {
                    "Total requests": post,
                    "/Meta.json": self.post_meta.load(Relaxed),
                    "/Data.json": self.post_data.load(Relaxed),
                    "/Data_Array.json": self.post_data_array.load(Relaxed),
                    "/Hash_Array.json": self.post_hash_array.load(Relaxed),
                    "/unknown.json": self.post_unknown.load(Relaxed),
                },
                "Unknown": {
                    "Total requests": unknown,
                },
            },
            "files": self.files_saved.load(Relaxed),
            "total size": self.total_bytes.load(Relaxed),
            "dedup size": self.dedup_bytes.load(Relaxed),
            "meta data size": self.meta_bytes.load(Relaxed),
        })
    }
}
