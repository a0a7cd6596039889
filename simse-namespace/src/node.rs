//! Tree entities and the metadata snapshots handed out to callers.
//!
//! A node never records its own name or its parent. The name is the key it
//! is stored under in the parent's entry map, and the parent is whatever
//! directory the caller navigated through to reach it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, RawRwLock, RwLock};
use serde::Serialize;

pub const DEFAULT_DIR_MODE: u32 = 0o755;
pub const DEFAULT_FILE_MODE: u32 = 0o644;

pub(crate) type NodeRef = Arc<RwLock<Node>>;
pub(crate) type Entries = HashMap<String, NodeRef>;
pub(crate) type ReadGuard = ArcRwLockReadGuard<RawRwLock, Node>;
pub(crate) type WriteGuard = ArcRwLockWriteGuard<RawRwLock, Node>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

#[derive(Debug)]
pub(crate) enum Contents {
    File(Vec<u8>),
    Directory(Entries),
}

#[derive(Debug)]
pub(crate) struct Node {
    contents: Contents,
    mode: u32,
    mod_time: SystemTime,
}

/// Metadata snapshot of a single node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Leaf component, or `"/"` for the root.
    pub name: String,
    /// Content length in bytes; always 0 for directories.
    pub size: u64,
    pub mode: u32,
    pub mod_time: SystemTime,
    pub is_dir: bool,
}

impl FileInfo {
    pub fn kind(&self) -> NodeKind {
        if self.is_dir {
            NodeKind::Directory
        } else {
            NodeKind::File
        }
    }
}

impl Node {
    pub(crate) fn directory(mode: u32) -> NodeRef {
        Arc::new(RwLock::new(Self {
            contents: Contents::Directory(HashMap::new()),
            mode,
            mod_time: SystemTime::now(),
        }))
    }

    pub(crate) fn file(content: Vec<u8>, mode: u32) -> NodeRef {
        Arc::new(RwLock::new(Self {
            contents: Contents::File(content),
            mode,
            mod_time: SystemTime::now(),
        }))
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self.contents {
            Contents::File(_) => NodeKind::File,
            Contents::Directory(_) => NodeKind::Directory,
        }
    }

    pub(crate) fn entries(&self) -> Option<&Entries> {
        match &self.contents {
            Contents::Directory(entries) => Some(entries),
            Contents::File(_) => None,
        }
    }

    pub(crate) fn entries_mut(&mut self) -> Option<&mut Entries> {
        match &mut self.contents {
            Contents::Directory(entries) => Some(entries),
            Contents::File(_) => None,
        }
    }

    pub(crate) fn content(&self) -> Option<&[u8]> {
        match &self.contents {
            Contents::File(data) => Some(data.as_slice()),
            Contents::Directory(_) => None,
        }
    }

    pub(crate) fn content_mut(&mut self) -> Option<&mut Vec<u8>> {
        match &mut self.contents {
            Contents::File(data) => Some(data),
            Contents::Directory(_) => None,
        }
    }

    /// Stored size: the content length for files, 0 for directories.
    pub(crate) fn size(&self) -> u64 {
        self.content().map_or(0, |data| data.len() as u64)
    }

    /// Record a structural or content change.
    pub(crate) fn touch(&mut self) {
        self.mod_time = SystemTime::now();
    }

    pub(crate) fn info(&self, name: &str) -> FileInfo {
        FileInfo {
            name: name.to_string(),
            size: self.size(),
            mode: self.mode,
            mod_time: self.mod_time,
            is_dir: self.kind() == NodeKind::Directory,
        }
    }

    /// Sum of all file sizes at or below this node.
    ///
    /// Read locks are taken top-down and held while descending, so the total
    /// reflects one consistent state of each directory.
    pub(crate) fn total_size(&self) -> u64 {
        match &self.contents {
            Contents::File(data) => data.len() as u64,
            Contents::Directory(entries) => entries
                .values()
                .map(|child| child.read().total_size())
                .sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_info_reports_content_length() {
        let node = Node::file(b"hello".to_vec(), 0o600);
        let info = node.read().info("a.txt");
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.size, 5);
        assert_eq!(info.mode, 0o600);
        assert!(!info.is_dir);
        assert_eq!(info.kind(), NodeKind::File);
    }

    #[test]
    fn directory_reports_zero_size() {
        let dir = Node::directory(DEFAULT_DIR_MODE);
        dir.write()
            .entries_mut()
            .unwrap()
            .insert("f".to_string(), Node::file(vec![1; 10], DEFAULT_FILE_MODE));
        let guard = dir.read();
        assert_eq!(guard.size(), 0);
        assert_eq!(guard.total_size(), 10);
        assert!(guard.info("d").is_dir);
    }

    #[test]
    fn kinds_are_exclusive() {
        let file = Node::file(Vec::new(), DEFAULT_FILE_MODE);
        assert!(file.read().entries().is_none());
        let dir = Node::directory(DEFAULT_DIR_MODE);
        assert!(dir.read().content().is_none());
    }

    #[test]
    fn total_size_is_recursive() {
        let root = Node::directory(DEFAULT_DIR_MODE);
        let sub = Node::directory(DEFAULT_DIR_MODE);
        sub.write()
            .entries_mut()
            .unwrap()
            .insert("deep".to_string(), Node::file(vec![0; 7], DEFAULT_FILE_MODE));
        {
            let mut guard = root.write();
            let entries = guard.entries_mut().unwrap();
            entries.insert("sub".to_string(), sub);
            entries.insert("top".to_string(), Node::file(vec![0; 3], DEFAULT_FILE_MODE));
        }
        assert_eq!(root.read().total_size(), 10);
    }

    #[test]
    fn touch_advances_mod_time() {
        let node = Node::file(Vec::new(), DEFAULT_FILE_MODE);
        let before = node.read().mod_time;
        std::thread::sleep(std::time::Duration::from_millis(2));
        node.write().touch();
        assert!(node.read().mod_time > before);
    }

    #[test]
    fn file_info_serializes_camel_case() {
        let info = Node::directory(0o700).read().info("d");
        let v = serde_json::to_value(&info).unwrap();
        assert_eq!(v["isDir"], true);
        assert_eq!(v["mode"], 0o700);
        assert!(v.get("modTime").is_some());
    }
}
