use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::block_id::BlockId;
use crate::error::{KeeperError, Result};
use crate::query::ListQuery;
use crate::record::FileVersion;

/// Scans read the log in fixed-size chunks; a record may span several.
const SCAN_BUFFER_SIZE: usize = 1024 * 1024;

/// A record has 13 fixed comma-separated fields before the digest sequence,
/// so a real end-of-record newline is only ever seen after at least 12
/// top-level commas. Newlines inside quoted fields never qualify.
const MIN_TOP_LEVEL_COMMAS: usize = 12;

/// Append-only per-host metadata logs under `<prefix>/meta/<hostname>`.
///
/// One line per file version. Fields are comma-separated; textual fields are
/// double-quoted and `name`/`link` are additionally base64-encoded, which
/// guarantees no field carries an unescaped comma, quote, or newline.
pub struct MetaLog {
    root: PathBuf,
}

impl MetaLog {
    pub fn open(prefix: &Path) -> Result<Self> {
        let root = prefix.join("meta");
        fs::create_dir_all(&root)?;
        Ok(MetaLog { root })
    }

    /// A hostname names a file directly under `meta/`; reject anything that
    /// could escape it.
    fn host_path(&self, hostname: &str) -> Result<PathBuf> {
        if hostname.is_empty()
            || hostname == "."
            || hostname == ".."
            || hostname.contains('/')
            || hostname.contains('\\')
            || hostname.contains('\0')
        {
            return Err(KeeperError::InvalidHostname(hostname.to_string()));
        }
        Ok(self.root.join(hostname))
    }

    /// Append one record to a host's log, creating the log if absent.
    ///
    /// Callers for the same host must be serialised (the metadata writer
    /// thread is the single caller in the server). Returns the encoded line
    /// length in bytes.
    pub fn append(&self, hostname: &str, meta: &FileVersion) -> Result<u64> {
        let path = self.host_path(hostname)?;
        let line = encode_line(meta);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(line.len() as u64)
    }

    /// Sequentially scan a host's log, returning the records the filter
    /// accepts, in log (= arrival) order. An unknown host yields an empty
    /// list. Malformed lines are skipped with a warning rather than failing
    /// the whole scan.
    pub fn scan(&self, hostname: &str, query: &ListQuery) -> Result<Vec<FileVersion>> {
        let path = self.host_path(hostname)?;
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut scanner = LineScanner::new(file);
        let mut out = Vec::new();
        while let Some(line) = scanner.next_line()? {
            match decode_matching(&line, query) {
                Ok(Some(meta)) => out.push(meta),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(host = hostname, error = %e, "skipping malformed log line");
                }
            }
        }
        Ok(out)
    }
}

/// Encode one record as a log line, terminating `\n` included.
pub fn encode_line(meta: &FileVersion) -> String {
    let name64 = BASE64.encode(meta.name.as_bytes());
    let link64 = BASE64.encode(meta.link.as_bytes());
    let mut line = format!(
        "{}, {}, {}, {}, {}, {}, {}, \"{}\", \"{}\", {}, {}, \"{}\", \"{}\"",
        meta.file_type,
        meta.inode,
        meta.mode,
        meta.atime,
        meta.ctime,
        meta.mtime,
        meta.size,
        meta.owner,
        meta.group,
        meta.uid,
        meta.gid,
        name64,
        link64,
    );
    for id in &meta.hash_list {
        line.push_str(", \"");
        line.push_str(&id.to_base64());
        line.push('"');
    }
    line.push('\n');
    line
}

/// Decode a line and apply the filter; `Ok(None)` means "well-formed but
/// filtered out". The name is decoded and regex-tested before anything else
/// so non-matching lines cost as little as possible.
fn decode_matching(line: &str, query: &ListQuery) -> Result<Option<FileVersion>> {
    let parts = split_top_level(line, 14);
    if parts.len() < 13 {
        return Err(KeeperError::MalformedRecord(format!(
            "{} fields, expected at least 13",
            parts.len()
        )));
    }

    let name = decode_base64_text(unquote(parts[11]))?;
    if !query.regex.is_match(&name) {
        return Ok(None);
    }

    let mtime = parse_u64(parts[5], "mtime")?;
    if !query.mtime_matches(mtime) {
        return Ok(None);
    }

    let file_type = parse_u64(parts[0], "file type")? as u8;
    let size = parse_u64(parts[6], "size")?;

    if query.reduced {
        return Ok(Some(FileVersion {
            file_type,
            mtime,
            size,
            name,
            ..FileVersion::default()
        }));
    }

    let hash_list = match parts.get(13) {
        Some(tail) => parse_hash_list(tail)?,
        None => Vec::new(),
    };

    Ok(Some(FileVersion {
        file_type,
        inode: parse_u64(parts[1], "inode")?,
        mode: parse_u64(parts[2], "mode")? as u32,
        atime: parse_u64(parts[3], "atime")?,
        ctime: parse_u64(parts[4], "ctime")?,
        mtime,
        size,
        owner: unquote(parts[7]).to_string(),
        group: unquote(parts[8]).to_string(),
        uid: parse_u64(parts[9], "uid")? as u32,
        gid: parse_u64(parts[10], "gid")? as u32,
        name,
        link: decode_base64_text(unquote(parts[12]))?,
        hash_list,
    }))
}

/// Split on commas outside quoted fields, yielding at most `max` parts; the
/// last part keeps the rest of the line (the digest sequence).
fn split_top_level(line: &str, max: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (i, b) in line.bytes().enumerate() {
        match b {
            b'"' => in_string = !in_string,
            b',' if !in_string => {
                parts.push(&line[start..i]);
                start = i + 1;
                if parts.len() == max - 1 {
                    break;
                }
            }
            _ => {}
        }
    }
    parts.push(&line[start..]);
    parts
}

fn unquote(field: &str) -> &str {
    field.trim().trim_matches('"')
}

fn parse_u64(field: &str, what: &str) -> Result<u64> {
    field
        .trim()
        .parse()
        .map_err(|_| KeeperError::MalformedRecord(format!("bad {what} field '{}'", field.trim())))
}

fn decode_base64_text(field: &str) -> Result<String> {
    let bytes = BASE64
        .decode(field.as_bytes())
        .map_err(|e| KeeperError::MalformedRecord(format!("bad base64 field: {e}")))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn parse_hash_list(tail: &str) -> Result<Vec<BlockId>> {
    let mut out = Vec::new();
    for item in tail.split(',') {
        let item = unquote(item);
        if item.is_empty() {
            continue;
        }
        out.push(BlockId::from_base64(item)?);
    }
    Ok(out)
}

/// Reassembles logical lines from fixed-size reads.
///
/// A line only ends at a newline that is outside quotes and follows at least
/// `MIN_TOP_LEVEL_COMMAS` top-level commas; anything else is content. Because
/// records are appended whole with a trailing `\n`, a scan racing a writer
/// sees a prefix of the log ending on a record boundary, never a torn record.
struct LineScanner<R: Read> {
    reader: R,
    buf: Vec<u8>,
    len: usize,
    pos: usize,
}

impl<R: Read> LineScanner<R> {
    fn new(reader: R) -> Self {
        LineScanner {
            reader,
            buf: vec![0u8; SCAN_BUFFER_SIZE],
            len: 0,
            pos: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = Vec::new();
        let mut in_string = false;
        let mut commas = 0usize;

        loop {
            if self.pos >= self.len {
                self.len = self.reader.read(&mut self.buf)?;
                self.pos = 0;
                if self.len == 0 {
                    if line.is_empty() {
                        return Ok(None);
                    }
                    // Unterminated tail (external truncation); let the
                    // decoder decide whether it is usable.
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
            }
            let b = self.buf[self.pos];
            self.pos += 1;
            match b {
                b'"' => {
                    in_string = !in_string;
                    line.push(b);
                }
                b',' if !in_string => {
                    commas += 1;
                    line.push(b);
                }
                b'\n' if !in_string && commas >= MIN_TOP_LEVEL_COMMAS => {
                    return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
                }
                _ => line.push(b),
            }
        }
    }
}
