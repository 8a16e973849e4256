use chrono::{DateTime, Utc};

/// Metadata a backend reports for a remote file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
}

/// A file's content plus the metadata needed to place it remotely.
///
/// For uploads `path` and `name` say where the content should go; for
/// downloads every field is filled in from what the server reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFile {
    name: String,
    extension: String,
    path: String,
    content: Vec<u8>,
    accessed: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
}

impl TransferFile {
    pub fn new(path: impl Into<String>, name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        let name = name.into();
        Self {
            extension: extension_of(&name).to_string(),
            name,
            path: path.into(),
            content: content.into(),
            accessed: None,
            modified: None,
        }
    }

    #[must_use]
    pub fn with_timestamps(
        mut self,
        accessed: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        self.accessed = accessed;
        self.modified = modified;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// Always the length of `content`.
    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub const fn accessed(&self) -> Option<DateTime<Utc>> {
        self.accessed
    }

    pub const fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }

    /// A name is usable remotely when it is non-blank and holds no separator.
    pub fn has_valid_name(&self) -> bool {
        !self.name.trim().is_empty() && !self.name.contains('/')
    }
}

fn extension_of(name: &str) -> &str {
    name.rsplit_once('.').map_or("", |(_, ext)| ext)
}

/// Splits `dir/sub/name` into its root-relative directory and file name.
///
/// Leading and trailing separators are stripped from the directory, and an
/// empty directory means the endpoint root. Returns `None` when the path
/// has no file name, e.g. `""` or `"reports/"`.
pub fn split_remote_path(path: &str) -> Option<(&str, &str)> {
    let (dir, name) = path.rsplit_once('/').unwrap_or(("", path));
    if name.trim().is_empty() {
        return None;
    }
    Some((dir.trim_matches('/'), name))
}
