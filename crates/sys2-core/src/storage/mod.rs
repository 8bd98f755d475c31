//! Storage: snapshot codec and adapters
//!
//! A session snapshot is an opaque byte image of the vector/KB state:
//! a magic header, the format version, the strategy id and geometry, the
//! vocabulary in insertion order, and every fact record (with its
//! strategy-serialized vector) in exact insertion order. Preserving fact
//! order keeps the rebuilt KB bundle byte-identical on reload.
//!
//! Adapters move those opaque bytes (and theory texts) to and from a
//! backing store; the engine never interprets adapter keys.

use crate::dsl::Span;
use crate::hdc::StrategyError;
use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Snapshot file magic
pub const MAGIC: [u8; 4] = *b"SYS2";

/// Current snapshot format version
pub const FORMAT_VERSION: u16 = 1;

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Storage error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem failure in an adapter
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Unknown storage key
    #[error("Key not found: {0}")]
    KeyNotFound(String),
    /// Snapshot bytes failed structural validation
    #[error("Malformed snapshot: {0}")]
    Malformed(String),
    /// Codec failure while reading a stored vector
    #[error(transparent)]
    Strategy(#[from] StrategyError),
    /// No usable default data directory
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// ADAPTERS
// ============================================================================

/// Pluggable byte store. Keys are opaque names chosen by the caller.
pub trait StorageAdapter {
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()>;
    fn load(&self, key: &str) -> Result<Vec<u8>>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-memory adapter, for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    entries: FxHashMap<String, Vec<u8>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryAdapter {
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }
}

/// One-file-per-key adapter rooted at a directory
#[derive(Debug)]
pub struct FileAdapter {
    root: PathBuf,
}

impl FileAdapter {
    /// Create an adapter; `None` picks the platform data directory
    pub fn new(root: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => directories::ProjectDirs::from("org", "outfinity", "sys2")
                .ok_or_else(|| {
                    StorageError::Init("could not determine a data directory".to_string())
                })?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys become file names; anything path-hostile is flattened.
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.s2b", safe))
    }
}

impl StorageAdapter for FileAdapter {
    fn save(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        std::fs::write(self.path_for(key), bytes)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }
        Ok(std::fs::read(path)?)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if !path.exists() {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }
        std::fs::remove_file(path)?;
        Ok(())
    }
}

// ============================================================================
// SNAPSHOT IMAGE
// ============================================================================

/// One fact as stored in a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct FactImage {
    pub operator: String,
    pub args: Vec<String>,
    pub inner_operator: Option<String>,
    pub inner_args: Option<Vec<String>>,
    pub level: u32,
    pub source_rule: Option<String>,
    pub span: Option<Span>,
    pub created_at_millis: i64,
    /// Strategy-serialized vector bytes
    pub vector_bytes: Vec<u8>,
}

/// Decoded snapshot, ready to restore a session from
#[derive(Debug, Clone, PartialEq)]
pub struct SessionImage {
    pub strategy_id: String,
    pub geometry: usize,
    /// Vocabulary atoms in insertion order
    pub vocab_names: Vec<String>,
    /// Facts in exact insertion order
    pub facts: Vec<FactImage>,
}

// ============================================================================
// CODEC
// ============================================================================

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_u32(out, s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

fn put_opt_str(out: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            out.push(1);
            put_str(out, s);
        }
        None => out.push(0),
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(out, bytes.len() as u32);
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let slice = self
            .bytes
            .get(self.at..self.at + n)
            .ok_or_else(|| StorageError::Malformed(format!("truncated at offset {}", self.at)))?;
        self.at += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(i64::from_le_bytes(buf))
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let slice = self.take(len)?;
        String::from_utf8(slice.to_vec())
            .map_err(|_| StorageError::Malformed("non-UTF-8 string".to_string()))
    }

    fn opt_string(&mut self) -> Result<Option<String>> {
        Ok(match self.u8()? {
            0 => None,
            _ => Some(self.string()?),
        })
    }

    fn blob(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string_list(&mut self) -> Result<Vec<String>> {
        let count = self.u32()? as usize;
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(self.string()?);
        }
        Ok(out)
    }
}

/// Encode a session image. Byte-stable: the same image always produces the
/// same bytes.
pub fn encode(image: &SessionImage) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    put_str(&mut out, &image.strategy_id);
    put_u32(&mut out, image.geometry as u32);

    put_u32(&mut out, image.vocab_names.len() as u32);
    for name in &image.vocab_names {
        put_str(&mut out, name);
    }

    put_u32(&mut out, image.facts.len() as u32);
    for fact in &image.facts {
        put_str(&mut out, &fact.operator);
        put_u32(&mut out, fact.args.len() as u32);
        for arg in &fact.args {
            put_str(&mut out, arg);
        }
        put_opt_str(&mut out, fact.inner_operator.as_deref());
        match &fact.inner_args {
            Some(args) => {
                out.push(1);
                put_u32(&mut out, args.len() as u32);
                for arg in args {
                    put_str(&mut out, arg);
                }
            }
            None => out.push(0),
        }
        put_u32(&mut out, fact.level);
        put_opt_str(&mut out, fact.source_rule.as_deref());
        match fact.span {
            Some(span) => {
                out.push(1);
                put_u32(&mut out, span.line);
                put_u32(&mut out, span.column);
            }
            None => out.push(0),
        }
        out.extend_from_slice(&fact.created_at_millis.to_le_bytes());
        put_bytes(&mut out, &fact.vector_bytes);
    }
    out
}

/// Decode snapshot bytes back into a session image
pub fn decode(bytes: &[u8]) -> Result<SessionImage> {
    let mut r = Reader { bytes, at: 0 };
    if r.take(4)? != MAGIC {
        return Err(StorageError::Malformed("bad magic".to_string()));
    }
    let version = r.u16()?;
    if version != FORMAT_VERSION {
        return Err(StorageError::Malformed(format!(
            "unsupported format version {}",
            version
        )));
    }
    let strategy_id = r.string()?;
    let geometry = r.u32()? as usize;
    let vocab_names = r.string_list()?;

    let fact_count = r.u32()? as usize;
    let mut facts = Vec::with_capacity(fact_count.min(4096));
    for _ in 0..fact_count {
        let operator = r.string()?;
        let args = r.string_list()?;
        let inner_operator = r.opt_string()?;
        let inner_args = match r.u8()? {
            0 => None,
            _ => Some(r.string_list()?),
        };
        let level = r.u32()?;
        let source_rule = r.opt_string()?;
        let span = match r.u8()? {
            0 => None,
            _ => Some(Span {
                line: r.u32()?,
                column: r.u32()?,
            }),
        };
        let created_at_millis = r.i64()?;
        let vector_bytes = r.blob()?;
        facts.push(FactImage {
            operator,
            args,
            inner_operator,
            inner_args,
            level,
            source_rule,
            span,
            created_at_millis,
            vector_bytes,
        });
    }
    if r.at != bytes.len() {
        return Err(StorageError::Malformed("trailing bytes".to_string()));
    }
    Ok(SessionImage {
        strategy_id,
        geometry,
        vocab_names,
        facts,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image() -> SessionImage {
        SessionImage {
            strategy_id: "dense-binary".to_string(),
            geometry: 2048,
            vocab_names: vec!["Fido".into(), "Dog".into(), "IS_A".into()],
            facts: vec![FactImage {
                operator: "IS_A".into(),
                args: vec!["Fido".into(), "Dog".into()],
                inner_operator: None,
                inner_args: None,
                level: 0,
                source_rule: None,
                span: Some(Span { line: 3, column: 1 }),
                created_at_millis: 1_750_000_000_000,
                vector_bytes: vec![1, 2, 3, 4],
            }],
        }
    }

    #[test]
    fn test_roundtrip() {
        let image = sample_image();
        let bytes = encode(&image);
        assert_eq!(&bytes[..4], &MAGIC);
        assert_eq!(decode(&bytes).unwrap(), image);
    }

    #[test]
    fn test_encoding_is_byte_stable() {
        let image = sample_image();
        assert_eq!(encode(&image), encode(&image));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut bytes = encode(&sample_image());
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(StorageError::Malformed(_))));
    }

    #[test]
    fn test_truncation_rejected() {
        let bytes = encode(&sample_image());
        assert!(decode(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut bytes = encode(&sample_image());
        bytes[4] = 0xff;
        bytes[5] = 0xff;
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_memory_adapter_roundtrip() {
        let mut adapter = MemoryAdapter::new();
        adapter.save("theory-core", b"IS_A IS_A transitive_relation").unwrap();
        assert_eq!(
            adapter.load("theory-core").unwrap(),
            b"IS_A IS_A transitive_relation"
        );
        adapter.remove("theory-core").unwrap();
        assert!(matches!(
            adapter.load("theory-core"),
            Err(StorageError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_file_adapter_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut adapter = FileAdapter::new(Some(dir.path().to_path_buf())).unwrap();
        let bytes = encode(&sample_image());
        adapter.save("session snapshot", &bytes).unwrap();
        assert_eq!(adapter.load("session snapshot").unwrap(), bytes);
        adapter.remove("session snapshot").unwrap();
        assert!(adapter.load("session snapshot").is_err());
    }
}
