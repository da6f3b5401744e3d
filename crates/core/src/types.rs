use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository-relative POSIX path to a source file.
///
/// Forward slashes only, no leading slash. Construction normalizes
/// backslashes and strips `./` prefixes so paths coming from diffs,
/// tree listings, and the filesystem all compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilePath(String);

impl FilePath {
    pub fn new(raw: impl Into<String>) -> Self {
        let mut s: String = raw.into();
        if s.contains('\\') {
            s = s.replace('\\', "/");
        }
        while let Some(stripped) = s.strip_prefix("./") {
            s = stripped.to_string();
        }
        while s.starts_with('/') {
            s.remove(0);
        }
        FilePath(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shard this path belongs to: its POSIX parent directory.
    pub fn shard_id(&self) -> ShardId {
        match self.0.rfind('/') {
            Some(idx) => ShardId(self.0[..idx].to_string()),
            None => ShardId::root(),
        }
    }

    pub fn file_name(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[idx + 1..],
            None => &self.0,
        }
    }

    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        name.rfind('.').map(|idx| &name[idx + 1..]).filter(|e| !e.is_empty())
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FilePath {
    fn from(raw: &str) -> Self {
        FilePath::new(raw)
    }
}

/// POSIX parent directory of a file path; empty string for the repo root.
///
/// Always derived from a [`FilePath`], never stored independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(pub(crate) String);

impl ShardId {
    pub fn root() -> Self {
        ShardId(String::new())
    }

    pub fn new(dir: impl Into<String>) -> Self {
        ShardId(dir.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A 40-character lowercase hex git commit SHA.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitSha(String);

impl CommitSha {
    /// Parse and validate a SHA read from an untrusted boundary.
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let s: String = raw.into();
        let valid = s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase());
        if !valid {
            return Err(CoreError::InvalidSha(s));
        }
        Ok(CommitSha(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive range of 1-based line numbers within a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

impl LineRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(CoreError::InvalidRange { start, end });
        }
        Ok(LineRange { start, end })
    }

    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, line: u32) -> bool {
        self.start <= line && line <= self.end
    }

    pub fn overlaps(&self, other: &LineRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_path_normalizes_separators_and_prefixes() {
        assert_eq!(FilePath::new("src\\lib.rs").as_str(), "src/lib.rs");
        assert_eq!(FilePath::new("./a/b.py").as_str(), "a/b.py");
        assert_eq!(FilePath::new("/a/b.py").as_str(), "a/b.py");
    }

    #[test]
    fn shard_id_is_posix_parent() {
        assert_eq!(FilePath::new("a/b/c.py").shard_id().as_str(), "a/b");
        assert_eq!(FilePath::new("top.py").shard_id(), ShardId::root());
        assert!(FilePath::new("top.py").shard_id().is_root());
    }

    #[test]
    fn file_path_extension() {
        assert_eq!(FilePath::new("a/b.test.ts").extension(), Some("ts"));
        assert_eq!(FilePath::new("Makefile").extension(), None);
        assert_eq!(FilePath::new("a/trailing.").extension(), None);
    }

    #[test]
    fn commit_sha_validation() {
        let ok = "a".repeat(40);
        assert!(CommitSha::parse(ok.clone()).is_ok());
        assert_eq!(CommitSha::parse(ok).unwrap().short().len(), 12);
        assert!(CommitSha::parse("abc").is_err());
        assert!(CommitSha::parse("A".repeat(40)).is_err());
        assert!(CommitSha::parse("z".repeat(40)).is_err());
    }

    #[test]
    fn line_range_bounds() {
        let r = LineRange::new(3, 7).unwrap();
        assert_eq!(r.len(), 5);
        assert!(r.contains(3));
        assert!(r.contains(7));
        assert!(!r.contains(8));
        assert!(LineRange::new(7, 3).is_err());
    }

    #[test]
    fn line_range_overlap() {
        let a = LineRange::new(1, 10).unwrap();
        let b = LineRange::new(10, 20).unwrap();
        let c = LineRange::new(11, 20).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }
}
