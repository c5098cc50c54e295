//! Storage: bundled read-only assets, the key-value save area, and the
//! single-writer save stream.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use polaris_core::{PolarisError, PolarisResult, StorageConfig};

/// Key-value persistence for save data.
pub trait SaveStore: Send {
    fn read(&self, key: &str) -> Option<Vec<u8>>;

    fn write(&mut self, key: &str, data: &[u8]) -> PolarisResult<()>;

    fn contains(&self, key: &str) -> bool {
        self.read(key).is_some()
    }

    /// Make sure the backing area exists.
    fn prepare(&mut self) -> PolarisResult<()> {
        Ok(())
    }
}

/// Saves that live only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySaveStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SaveStore for MemorySaveStore {
    fn read(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn write(&mut self, key: &str, data: &[u8]) -> PolarisResult<()> {
        self.entries.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

/// Saves kept in one JSON document mapping each key to a base64 payload.
///
/// The whole document is rewritten on every `write`.
#[derive(Debug)]
pub struct JsonSaveStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonSaveStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> PolarisResult<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            BTreeMap::new()
        };
        tracing::debug!(path = %path.display(), entries = entries.len(), "save store opened");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> PolarisResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SaveStore for JsonSaveStore {
    fn read(&self, key: &str) -> Option<Vec<u8>> {
        let encoded = self.entries.get(key)?;
        match STANDARD.decode(encoded) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt save entry");
                None
            }
        }
    }

    fn write(&mut self, key: &str, data: &[u8]) -> PolarisResult<()> {
        self.entries.insert(key.to_string(), STANDARD.encode(data));
        self.persist()
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn prepare(&mut self) -> PolarisResult<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

struct SaveStream {
    key: String,
    buffer: Vec<u8>,
}

/// The file side of the HAL: assets plus saves.
pub struct Storage {
    assets_dir: PathBuf,
    save_prefix: String,
    saves: Box<dyn SaveStore>,
    stream: Option<SaveStream>,
}

impl Storage {
    pub fn new(assets_dir: impl Into<PathBuf>, save_prefix: &str, saves: Box<dyn SaveStore>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            save_prefix: save_prefix.to_string(),
            saves,
            stream: None,
        }
    }

    /// Build from configuration with a JSON save store.
    pub fn from_config(config: &StorageConfig) -> PolarisResult<Self> {
        let saves = JsonSaveStore::open(&config.save_file)?;
        Ok(Self::new(&config.assets_dir, &config.save_prefix, Box::new(saves)))
    }

    pub fn make_sav_dir(&mut self) -> PolarisResult<()> {
        self.saves.prepare()
    }

    fn save_key<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.save_prefix.as_str())
    }

    fn asset_path(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            tracing::warn!(name, "asset path leaves the asset directory");
            return None;
        }
        Some(self.assets_dir.join(relative))
    }

    pub fn check_file_exist(&self, name: &str) -> bool {
        match self.save_key(name) {
            Some(key) => self.saves.contains(key),
            None => self.asset_path(name).is_some_and(|p| p.is_file()),
        }
    }

    /// Whole-file read. Saves come from the store, everything else from the
    /// asset directory. Any failure is reported as `None`.
    pub fn get_file_contents(&self, name: &str) -> Option<Vec<u8>> {
        if let Some(key) = self.save_key(name) {
            return self.saves.read(key);
        }
        let path = self.asset_path(name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "asset not readable");
                None
            }
        }
    }

    /// Start a new save stream, discarding any unclosed one.
    ///
    /// Only names under the save prefix can be written; anything else would
    /// read back from the assets directory. Such names open nothing.
    pub fn open_save_file(&mut self, name: &str) {
        if let Some(stale) = self.stream.take() {
            tracing::warn!(key = stale.key, "save stream reopened before close");
        }
        let Some(key) = self.save_key(name) else {
            tracing::warn!(name, prefix = %self.save_prefix, "save stream needs the save prefix");
            return;
        };
        self.stream = Some(SaveStream {
            key: key.to_string(),
            buffer: Vec::new(),
        });
    }

    pub fn write_save_file(&mut self, byte: u8) {
        match self.stream.as_mut() {
            Some(stream) => stream.buffer.push(byte),
            None => tracing::warn!("save write without an open stream"),
        }
    }

    /// Persist the stream's bytes under its key.
    pub fn close_save_file(&mut self) -> PolarisResult<()> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| PolarisError::Storage("no save stream is open".to_string()))?;
        self.saves.write(&stream.key, &stream.buffer)?;
        tracing::debug!(key = stream.key, bytes = stream.buffer.len(), "save stream closed");
        Ok(())
    }

    pub fn is_save_stream_open(&self) -> bool {
        self.stream.is_some()
    }
}

/// Join `dir` and `file` into `dst` as a NUL-terminated string.
///
/// At most `dst.len() - 1` bytes of path are written, cut back to a UTF-8
/// character boundary. Returns the path length without the terminator.
pub fn make_valid_path(dir: Option<&str>, file: Option<&str>, dst: &mut [u8]) -> usize {
    if dst.is_empty() {
        return 0;
    }
    let dir = dir.unwrap_or_default();
    let file = file.unwrap_or_default();
    let joined = if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    };

    let mut len = joined.len().min(dst.len() - 1);
    while !joined.is_char_boundary(len) {
        len -= 1;
    }
    dst[..len].copy_from_slice(&joined.as_bytes()[..len]);
    dst[len] = 0;
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_storage(assets: &Path) -> Storage {
        Storage::new(assets, "sav/", Box::new(MemorySaveStore::new()))
    }

    #[test]
    fn test_make_valid_path_joins() {
        let mut buf = [0xAAu8; 32];
        let n = make_valid_path(Some("cg"), Some("bg.png"), &mut buf);
        assert_eq!(&buf[..n], b"cg/bg.png");
        assert_eq!(buf[n], 0);
    }

    #[test]
    fn test_make_valid_path_none_components() {
        let mut buf = [0u8; 16];
        let n = make_valid_path(None, Some("conf.txt"), &mut buf);
        assert_eq!(&buf[..n], b"conf.txt");
        let n = make_valid_path(Some("sav"), None, &mut buf);
        assert_eq!(&buf[..n], b"sav/");
    }

    #[test]
    fn test_make_valid_path_truncates_on_char_boundary() {
        let mut buf = [0xFFu8; 6];
        // "d/あい" is 1 + 1 + 3 + 3 bytes; five fit, the second kana does not.
        let n = make_valid_path(Some("d"), Some("あい"), &mut buf);
        assert_eq!(n, 5);
        assert_eq!(std::str::from_utf8(&buf[..n]).unwrap(), "d/あ");
        assert_eq!(buf[5], 0);
    }

    #[test]
    fn test_make_valid_path_single_byte_buffer() {
        let mut buf = [7u8; 1];
        assert_eq!(make_valid_path(Some("a"), Some("b"), &mut buf), 0);
        assert_eq!(buf, [0]);
    }

    #[test]
    fn test_save_stream_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = memory_storage(dir.path());
        storage.open_save_file("sav/001.sav");
        for b in b"hello" {
            storage.write_save_file(*b);
        }
        storage.close_save_file().unwrap();
        assert_eq!(storage.get_file_contents("sav/001.sav"), Some(b"hello".to_vec()));
        assert!(storage.check_file_exist("sav/001.sav"));
    }

    #[test]
    fn test_open_resets_accumulator() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = memory_storage(dir.path());
        storage.open_save_file("sav/a");
        storage.write_save_file(1);
        storage.open_save_file("sav/a");
        storage.write_save_file(2);
        storage.close_save_file().unwrap();
        assert_eq!(storage.get_file_contents("sav/a"), Some(vec![2]));
    }

    #[test]
    fn test_open_outside_save_prefix_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = memory_storage(dir.path());
        storage.open_save_file("001.sav");
        assert!(!storage.is_save_stream_open());
        storage.write_save_file(9);
        assert!(storage.close_save_file().is_err());
        assert_eq!(storage.get_file_contents("001.sav"), None);
        assert_eq!(storage.get_file_contents("sav/001.sav"), None);
    }

    #[test]
    fn test_close_without_open_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = memory_storage(dir.path());
        assert!(storage.close_save_file().is_err());
    }

    #[test]
    fn test_missing_files_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = memory_storage(dir.path());
        assert_eq!(storage.get_file_contents("sav/none"), None);
        assert_eq!(storage.get_file_contents("txt/none.txt"), None);
        assert!(!storage.check_file_exist("txt/none.txt"));
    }

    #[test]
    fn test_assets_are_read_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("txt")).unwrap();
        std::fs::write(dir.path().join("txt/init.txt"), b"@bg").unwrap();
        let storage = memory_storage(dir.path());
        assert_eq!(storage.get_file_contents("txt/init.txt"), Some(b"@bg".to_vec()));
        assert!(storage.check_file_exist("txt/init.txt"));
        assert_eq!(storage.get_file_contents("../init.txt"), None);
    }

    #[test]
    fn test_json_store_persists_base64() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sav").join("saves.json");
        {
            let mut store = JsonSaveStore::open(&path).unwrap();
            store.prepare().unwrap();
            store.write("g001", &[0, 159, 255]).unwrap();
        }
        let raw = std::fs::read_to_string(&path).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["g001"], "AJ//");

        let store = JsonSaveStore::open(&path).unwrap();
        assert_eq!(store.read("g001"), Some(vec![0, 159, 255]));
    }

    #[test]
    fn test_json_store_corrupt_entry_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.json");
        std::fs::write(&path, r#"{"bad": "***"}"#).unwrap();
        let store = JsonSaveStore::open(&path).unwrap();
        assert!(store.contains("bad"));
        assert_eq!(store.read("bad"), None);
    }
}
