// ---------------------------------------------------------------------------
// Namespace: concurrent in-memory tree with one reader/writer lock per node
// ---------------------------------------------------------------------------
//
// Lock protocol:
//   - descents lock-couple: a child is locked before its parent is released;
//   - mutations write-lock only the directory whose entries change (plus the
//     file itself when its content changes in place);
//   - every thread acquires locks in canonical order (a node before anything
//     below it; unrelated nodes in lexicographic order of their component
//     sequences), and never re-locks a node it already holds.
// ---------------------------------------------------------------------------

use std::sync::Arc;

use crate::error::NamespaceError;
use crate::node::{
	Entries, FileInfo, Node, NodeKind, NodeRef, ReadGuard, WriteGuard, DEFAULT_DIR_MODE,
	DEFAULT_FILE_MODE,
};
use crate::path::{self, NamespaceLimits};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceOptions {
	pub limits: NamespaceLimits,
	/// Mode bits reported for `/`.
	pub root_mode: u32,
	/// Mode given to files created by `write_file` and `append_file`.
	pub default_file_mode: u32,
}

impl Default for NamespaceOptions {
	fn default() -> Self {
		Self {
			limits: NamespaceLimits::default(),
			root_mode: DEFAULT_DIR_MODE,
			default_file_mode: DEFAULT_FILE_MODE,
		}
	}
}

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

/// A resolved, validated path.
pub(crate) struct Target {
	pub(crate) parts: Vec<String>,
	pub(crate) display: String,
}

impl Target {
	fn from_parts(parts: Vec<String>) -> Self {
		let display = path::join(&parts);
		Self { parts, display }
	}

	/// Final component and the components of its parent directory.
	fn split(&self, action: &str) -> Result<(&str, &[String]), NamespaceError> {
		self.parts
			.split_last()
			.map(|(name, parent)| (name.as_str(), parent))
			.ok_or_else(|| NamespaceError::InvalidName(format!("{} the root directory", action)))
	}
}

/// The two directories a rename touches, write-locked.
///
/// `path` holds the directories between the parents and the node where
/// their paths meet. It must outlive the mutation.
enum ParentLocks {
	Shared(WriteGuard),
	Split {
		from: WriteGuard,
		to: WriteGuard,
		path: Vec<ReadGuard>,
	},
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(path: &str) -> NamespaceError {
	NamespaceError::NotFound(path.to_string())
}

fn dir<'a>(node: &'a Node, path: &str) -> Result<&'a Entries, NamespaceError> {
	node.entries()
		.ok_or_else(|| NamespaceError::NotADirectory(path.to_string()))
}

fn dir_mut<'a>(node: &'a mut Node, path: &str) -> Result<&'a mut Entries, NamespaceError> {
	node.entries_mut()
		.ok_or_else(|| NamespaceError::NotADirectory(path.to_string()))
}

fn child<'a>(node: &'a Node, name: &str, path: &str) -> Result<&'a NodeRef, NamespaceError> {
	dir(node, path)?.get(name).ok_or_else(|| not_found(path))
}

/// Lock-couple downwards from an already held node through `via`.
fn couple_read(
	mut guard: ReadGuard,
	via: &[String],
	path: &str,
) -> Result<ReadGuard, NamespaceError> {
	for name in via {
		let next = child(&guard, name, path)?.read_arc();
		guard = next;
	}
	Ok(guard)
}

/// Write-lock the node at `rest` below `start`, which the caller holds.
///
/// Every directory passed on the way stays read-locked in the returned
/// chain, so none of them can be detached while the caller keeps it.
fn descend_write(
	start: &Node,
	rest: &[String],
	path: &str,
) -> Result<(Vec<ReadGuard>, WriteGuard), NamespaceError> {
	let (name, via) = rest.split_last().ok_or_else(|| {
		NamespaceError::InvalidOperation(format!("Nothing to lock below {}", path))
	})?;
	let mut chain: Vec<ReadGuard> = Vec::with_capacity(via.len());
	for step in via {
		let next = match chain.last() {
			Some(parent) => child(parent, step, path)?.read_arc(),
			None => child(start, step, path)?.read_arc(),
		};
		chain.push(next);
	}
	let node = match chain.last() {
		Some(parent) => child(parent, name, path)?.write_arc(),
		None => child(start, name, path)?.write_arc(),
	};
	Ok((chain, node))
}

fn open_existing(
	parent: &Node,
	name: &str,
	path: &str,
) -> Result<Option<WriteGuard>, NamespaceError> {
	Ok(dir(parent, path)?.get(name).map(|node| node.write_arc()))
}

fn append_to(mut file: WriteGuard, content: &[u8], path: &str) -> Result<(), NamespaceError> {
	let data = file
		.content_mut()
		.ok_or_else(|| NamespaceError::NotADirectory(path.to_string()))?;
	data.extend_from_slice(content);
	file.touch();
	tracing::trace!(path, appended = content.len(), "appended to file");
	Ok(())
}

fn list_entries(node: &Node, path: &str) -> Result<Vec<FileInfo>, NamespaceError> {
	Ok(dir(node, path)?
		.iter()
		.map(|(name, entry)| entry.read().info(name))
		.collect())
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// An in-memory directory tree safe to share between threads.
///
/// Every instance is independent; there is no global state.
pub struct Namespace {
	root: NodeRef,
	options: NamespaceOptions,
}

impl Default for Namespace {
	fn default() -> Self {
		Self::new()
	}
}

impl Namespace {
	// -- Constructor ------------------------------------------------------

	pub fn new() -> Self {
		Self::with_options(NamespaceOptions::default())
	}

	pub fn with_options(options: NamespaceOptions) -> Self {
		Self {
			root: Node::directory(options.root_mode),
			options,
		}
	}

	pub fn options(&self) -> &NamespaceOptions {
		&self.options
	}

	// -- Navigation (private) ---------------------------------------------

	pub(crate) fn target(&self, path: &str) -> Result<Target, NamespaceError> {
		let parts = path::resolve(path)?;
		path::validate(&parts, &self.options.limits)?;
		Ok(Target::from_parts(parts))
	}

	/// Read-lock the node at `parts`, coupling from the root.
	fn lock_read(&self, parts: &[String], path: &str) -> Result<ReadGuard, NamespaceError> {
		couple_read(self.root.read_arc(), parts, path)
	}

	/// Write-lock the node at `parts`; its ancestors are only read-coupled.
	fn lock_write(&self, parts: &[String], path: &str) -> Result<WriteGuard, NamespaceError> {
		let Some((name, via)) = parts.split_last() else {
			return Ok(self.root.write_arc());
		};
		let parent = self.lock_read(via, path)?;
		let node = child(&parent, name, path)?.write_arc();
		Ok(node)
	}

	/// Resolve a path to its node without keeping any lock.
	pub(crate) fn locate(&self, path: &str) -> Result<(Target, NodeRef), NamespaceError> {
		let target = self.target(path)?;
		let node = match target.parts.split_last() {
			None => Arc::clone(&self.root),
			Some((name, via)) => {
				let parent = self.lock_read(via, &target.display)?;
				let node = Arc::clone(child(&parent, name, &target.display)?);
				node
			}
		};
		Ok((target, node))
	}

	/// Write-lock both rename parents in canonical order.
	fn lock_parents(
		&self,
		from: &[String],
		from_path: &str,
		to: &[String],
		to_path: &str,
	) -> Result<ParentLocks, NamespaceError> {
		if from == to {
			return Ok(ParentLocks::Shared(self.lock_write(from, from_path)?));
		}

		let from_first = from < to;
		let (first, first_path, second, second_path) = if from_first {
			(from, from_path, to, to_path)
		} else {
			(to, to_path, from, from_path)
		};

		let (path, first_guard, second_guard) = if second.starts_with(first) {
			// The first parent is an ancestor of the second: descend through
			// the guard already held instead of locking it twice.
			let first_guard = self.lock_write(first, first_path)?;
			let (path, second_guard) =
				descend_write(&first_guard, &second[first.len()..], second_path)?;
			(path, first_guard, second_guard)
		} else {
			// Unrelated parents: both descents start below their deepest
			// common ancestor. Everything from it down to either parent stays
			// read-locked so neither side can be detached on its own.
			let common = first
				.iter()
				.zip(second)
				.take_while(|(a, b)| a == b)
				.count();
			let anchor = self.lock_read(&first[..common], first_path)?;
			let (mut path, first_guard) = descend_write(&anchor, &first[common..], first_path)?;
			let (second_chain, second_guard) =
				descend_write(&anchor, &second[common..], second_path)?;
			path.extend(second_chain);
			path.push(anchor);
			(path, first_guard, second_guard)
		};

		Ok(if from_first {
			ParentLocks::Split {
				from: first_guard,
				to: second_guard,
				path,
			}
		} else {
			ParentLocks::Split {
				from: second_guard,
				to: first_guard,
				path,
			}
		})
	}

	// -- Directory operations ---------------------------------------------

	pub fn create_dir(&self, path: &str, mode: u32) -> Result<(), NamespaceError> {
		let target = self.target(path)?;
		self.make_dir(&target, mode, false)
	}

	/// Create every missing directory along `path`.
	pub fn mkdir_all(&self, path: &str, mode: u32) -> Result<(), NamespaceError> {
		let target = self.target(path)?;
		for depth in 1..=target.parts.len() {
			let prefix = Target::from_parts(target.parts[..depth].to_vec());
			self.make_dir(&prefix, mode, true)?;
		}
		Ok(())
	}

	fn make_dir(&self, target: &Target, mode: u32, exist_ok: bool) -> Result<(), NamespaceError> {
		let (name, via) = target.split("Cannot create")?;
		let mut parent = self.lock_write(via, &target.display)?;
		let entries = dir_mut(&mut parent, &target.display)?;

		if let Some(existing) = entries.get(name) {
			let is_dir = existing.read().kind() == NodeKind::Directory;
			return match (is_dir, exist_ok) {
				(true, true) => Ok(()),
				(false, true) => Err(NamespaceError::NotADirectory(target.display.clone())),
				_ => Err(NamespaceError::AlreadyExists(target.display.clone())),
			};
		}

		entries.insert(name.to_string(), Node::directory(mode));
		parent.touch();
		tracing::trace!(path = %target.display, mode, "created directory");
		Ok(())
	}

	pub fn list_dir(&self, path: &str) -> Result<Vec<FileInfo>, NamespaceError> {
		let target = self.target(path)?;
		let node = self.lock_read(&target.parts, &target.display)?;
		let mut infos = list_entries(&node, &target.display)?;
		drop(node);
		infos.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(infos)
	}

	// -- File operations --------------------------------------------------

	/// Create a file, or replace the content of an existing one.
	///
	/// `mode` applies only when the file is new.
	pub fn create_file(
		&self,
		path: &str,
		content: impl AsRef<[u8]>,
		mode: u32,
	) -> Result<(), NamespaceError> {
		let target = self.target(path)?;
		let (name, via) = target.split("Cannot write")?;
		let content = content.as_ref();
		let mut parent = self.lock_write(via, &target.display)?;
		let entries = dir_mut(&mut parent, &target.display)?;

		if let Some(existing) = entries.get(name) {
			let mut file = existing.write();
			let data = file
				.content_mut()
				.ok_or_else(|| NamespaceError::NotADirectory(target.display.clone()))?;
			data.clear();
			data.extend_from_slice(content);
			file.touch();
			tracing::trace!(path = %target.display, size = content.len(), "replaced file content");
			return Ok(());
		}

		entries.insert(name.to_string(), Node::file(content.to_vec(), mode));
		parent.touch();
		tracing::trace!(path = %target.display, size = content.len(), mode, "created file");
		Ok(())
	}

	pub fn write_file(&self, path: &str, content: impl AsRef<[u8]>) -> Result<(), NamespaceError> {
		self.create_file(path, content, self.options.default_file_mode)
	}

	pub fn read_file(&self, path: &str) -> Result<Vec<u8>, NamespaceError> {
		let target = self.target(path)?;
		let node = self.lock_read(&target.parts, &target.display)?;
		match node.content() {
			Some(data) => Ok(data.to_vec()),
			None => Err(NamespaceError::NotAFile(target.display)),
		}
	}

	/// Append to a file, creating it with the default file mode if absent.
	pub fn append_file(&self, path: &str, content: impl AsRef<[u8]>) -> Result<(), NamespaceError> {
		let target = self.target(path)?;
		let (name, via) = target.split("Cannot append to")?;
		let content = content.as_ref();

		// Appending to an existing file leaves the parent's entries alone,
		// so a read lock on the parent is enough.
		let parent = self.lock_read(via, &target.display)?;
		let existing = open_existing(&parent, name, &target.display)?;
		drop(parent);
		if let Some(file) = existing {
			return append_to(file, content, &target.display);
		}

		let mut parent = self.lock_write(via, &target.display)?;
		let raced = open_existing(&parent, name, &target.display)?;
		if let Some(file) = raced {
			drop(parent);
			return append_to(file, content, &target.display);
		}
		dir_mut(&mut parent, &target.display)?.insert(
			name.to_string(),
			Node::file(content.to_vec(), self.options.default_file_mode),
		);
		parent.touch();
		tracing::trace!(path = %target.display, size = content.len(), "created file by append");
		Ok(())
	}

	// -- Removal ----------------------------------------------------------

	/// Remove a file or an empty directory.
	pub fn remove(&self, path: &str) -> Result<(), NamespaceError> {
		self.unlink(path, false)
	}

	/// Remove a node and everything below it.
	pub fn remove_all(&self, path: &str) -> Result<(), NamespaceError> {
		self.unlink(path, true)
	}

	fn unlink(&self, path: &str, recursive: bool) -> Result<(), NamespaceError> {
		let target = self.target(path)?;
		let (name, via) = target.split("Cannot remove")?;
		let mut parent = self.lock_write(via, &target.display)?;
		let entries = dir_mut(&mut parent, &target.display)?;

		let node = entries.get(name).ok_or_else(|| not_found(&target.display))?;
		if !recursive && node.read().entries().is_some_and(|c| !c.is_empty()) {
			return Err(NamespaceError::DirectoryNotEmpty(target.display.clone()));
		}

		entries.remove(name);
		parent.touch();
		tracing::trace!(path = %target.display, recursive, "removed");
		Ok(())
	}

	// -- Navigation -------------------------------------------------------

	pub fn stat(&self, path: &str) -> Result<FileInfo, NamespaceError> {
		let target = self.target(path)?;
		let node = self.lock_read(&target.parts, &target.display)?;
		Ok(node.info(path::base_name(&target.parts)))
	}

	/// Whether `path` names an existing node. Never fails.
	pub fn exists(&self, path: &str) -> bool {
		self.target(path)
			.and_then(|target| self.lock_read(&target.parts, &target.display).map(drop))
			.is_ok()
	}

	/// Move or rename a node.
	pub fn rename(&self, old_path: &str, new_path: &str) -> Result<(), NamespaceError> {
		let from = self.target(old_path)?;
		let to = self.target(new_path)?;
		let (from_name, from_dir) = from.split("Cannot rename")?;
		let (to_name, to_dir) = to.split("Cannot replace")?;

		if from.parts == to.parts {
			return self.lock_read(&from.parts, &from.display).map(drop);
		}

		match self.lock_parents(from_dir, &from.display, to_dir, &to.display)? {
			ParentLocks::Shared(mut parent) => {
				let entries = dir_mut(&mut parent, &from.display)?;
				if !entries.contains_key(from_name) {
					return Err(not_found(&from.display));
				}
				if entries.contains_key(to_name) {
					return Err(NamespaceError::AlreadyExists(to.display.clone()));
				}
				if let Some(node) = entries.remove(from_name) {
					entries.insert(to_name.to_string(), node);
				}
				parent.touch();
			}
			ParentLocks::Split {
				from: mut from_parent,
				to: mut to_parent,
				path: _path,
			} => {
				let source = dir_mut(&mut from_parent, &from.display)?;
				let dest = dir_mut(&mut to_parent, &to.display)?;
				if !source.contains_key(from_name) {
					return Err(not_found(&from.display));
				}
				if dest.contains_key(to_name) {
					return Err(NamespaceError::AlreadyExists(to.display.clone()));
				}
				if to.parts.starts_with(&from.parts) {
					return Err(NamespaceError::InvalidOperation(format!(
						"Cannot move directory into its own descendant: {} -> {}",
						from.display, to.display
					)));
				}
				if let Some(node) = source.remove(from_name) {
					dest.insert(to_name.to_string(), node);
				}
				from_parent.touch();
				to_parent.touch();
			}
		}

		tracing::trace!(from = %from.display, to = %to.display, "renamed");
		Ok(())
	}

	// -- Query operations -------------------------------------------------

	/// Total bytes stored at or below `path`.
	pub fn size(&self, path: &str) -> Result<u64, NamespaceError> {
		let target = self.target(path)?;
		let node = self.lock_read(&target.parts, &target.display)?;
		Ok(node.total_size())
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
