use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;
use vanilla_appstream_silo::document_digest;

const DOCUMENT_FILENAME: &str = "metadata.xml.gz";
const INDEX_FILENAME: &str = "metadata.index";
const TMP_SUFFIX: &str = ".tmp";

/// Filesystem cache for the compressed metadata document and its compiled
/// index.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn document_path(&self) -> PathBuf {
        self.root.join(DOCUMENT_FILENAME)
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILENAME)
    }

    pub fn temp_index_path(&self) -> PathBuf {
        self.root.join(format!("{INDEX_FILENAME}{TMP_SUFFIX}"))
    }

    fn temp_document_path(&self) -> PathBuf {
        self.root.join(format!("{DOCUMENT_FILENAME}{TMP_SUFFIX}"))
    }

    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// Time since the cached document was last written, `None` when it is
    /// missing. A modification time in the future counts as zero.
    pub fn age(&self) -> Option<Duration> {
        let modified = fs::metadata(self.document_path())
            .and_then(|metadata| metadata.modified())
            .ok()?;
        Some(
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
        )
    }

    /// True when the document is missing or at least `max_age` old.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.age() {
            Some(age) => age >= max_age,
            None => true,
        }
    }

    pub fn has_document(&self) -> bool {
        self.document_path().is_file()
    }

    /// Atomically replaces the cached document.
    pub fn write(&self, bytes: &[u8]) -> io::Result<()> {
        self.ensure_dirs()?;
        let tmp_path = self.temp_document_path();
        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, self.document_path())
    }

    /// Digest of the cached document, matching the one recorded in silos
    /// compiled from it.
    pub fn digest(&self) -> io::Result<String> {
        let bytes = fs::read(self.document_path())?;
        Ok(document_digest(&bytes))
    }
}
