// ---------------------------------------------------------------------------
// Walker: depth-first, pre-order traversal of a subtree
// ---------------------------------------------------------------------------

use std::sync::Arc;

use serde::Serialize;

use crate::error::NamespaceError;
use crate::namespace::Namespace;
use crate::node::{FileInfo, Node, NodeKind, NodeRef};
use crate::path;

/// One visited node: its full path and a metadata snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkEntry {
	pub path: String,
	pub info: FileInfo,
}

/// Lazy pre-order iterator; children are visited in name order.
///
/// Each node is read-locked only while its entry is produced. Nodes detached
/// after they were queued are still visited.
pub struct Walker {
	stack: Vec<(String, String, NodeRef)>,
}

impl Iterator for Walker {
	type Item = WalkEntry;

	fn next(&mut self) -> Option<WalkEntry> {
		let (path, name, node) = self.stack.pop()?;
		let guard = node.read();
		let info = guard.info(&name);
		if let Some(entries) = guard.entries() {
			let mut children: Vec<(String, NodeRef)> = entries
				.iter()
				.map(|(child_name, child)| (child_name.clone(), Arc::clone(child)))
				.collect();
			// Reverse order so the smallest name is popped first.
			children.sort_by(|a, b| b.0.cmp(&a.0));
			for (child_name, child) in children {
				self.stack
					.push((path::join_child(&path, &child_name), child_name, child));
			}
		}
		drop(guard);
		Some(WalkEntry { path, info })
	}
}

impl Namespace {
	/// Start a fresh traversal of the subtree at `path`.
	pub fn walker(&self, path: &str) -> Result<Walker, NamespaceError> {
		let (target, node) = self.locate(path)?;
		let name = path::base_name(&target.parts).to_string();
		Ok(Walker {
			stack: vec![(target.display, name, node)],
		})
	}

	/// Visit every node at or below `path` in pre-order.
	///
	/// The first error returned by `visit` stops the walk and is returned.
	pub fn walk<F, E>(&self, path: &str, mut visit: F) -> Result<(), E>
	where
		F: FnMut(&str, &FileInfo) -> Result<(), E>,
		E: From<NamespaceError>,
	{
		for entry in self.walker(path)? {
			visit(&entry.path, &entry.info)?;
		}
		Ok(())
	}

	/// Render the directory at `path` as an ASCII tree.
	pub fn tree(&self, path: &str) -> Result<String, NamespaceError> {
		let (target, node) = self.locate(path)?;
		let guard = node.read();
		if guard.kind() != NodeKind::Directory {
			return Err(NamespaceError::NotADirectory(target.display));
		}

		let mut lines = vec![path::base_name(&target.parts).to_string()];
		build_tree(&guard, "", &mut lines);
		Ok(lines.join("\n"))
	}
}

fn build_tree(dir: &Node, prefix: &str, lines: &mut Vec<String>) {
	let Some(entries) = dir.entries() else {
		return;
	};
	let mut children: Vec<(&String, &NodeRef)> = entries.iter().collect();
	children.sort_by(|a, b| a.0.cmp(b.0));

	for (i, (name, child)) in children.iter().enumerate() {
		let is_last = i == children.len() - 1;
		let connector = if is_last {
			"\u{2514}\u{2500}\u{2500} "
		} else {
			"\u{251C}\u{2500}\u{2500} "
		};
		let child_prefix = if is_last { "    " } else { "\u{2502}   " };

		let node = child.read();
		if node.kind() == NodeKind::Directory {
			lines.push(format!("{}{}{}/", prefix, connector, name));
			build_tree(&node, &format!("{}{}", prefix, child_prefix), lines);
		} else {
			lines.push(format!(
				"{}{}{} ({} bytes)",
				prefix,
				connector,
				name,
				node.size()
			));
		}
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;

	fn sample() -> Namespace {
		let ns = Namespace::new();
		ns.mkdir_all("/walk/sub", 0o755).unwrap();
		ns.write_file("/walk/b.txt", "bb").unwrap();
		ns.write_file("/walk/a.txt", "a").unwrap();
		ns.write_file("/walk/sub/c.txt", "ccc").unwrap();
		ns
	}

	fn paths(ns: &Namespace, path: &str) -> Vec<String> {
		ns.walker(path).unwrap().map(|e| e.path).collect()
	}

	// -- walker --

	#[test]
	fn walker_is_pre_order_and_sorted() {
		let ns = sample();
		assert_eq!(
			paths(&ns, "/walk"),
			vec![
				"/walk",
				"/walk/a.txt",
				"/walk/b.txt",
				"/walk/sub",
				"/walk/sub/c.txt",
			]
		);
	}

	#[test]
	fn walker_from_root_includes_root() {
		let ns = sample();
		let entries: Vec<WalkEntry> = ns.walker("/").unwrap().collect();
		assert_eq!(entries[0].path, "/");
		assert_eq!(entries[0].info.name, "/");
		assert_eq!(entries.len(), 6);
	}

	#[test]
	fn walker_on_file_yields_single_entry() {
		let ns = sample();
		let entries: Vec<WalkEntry> = ns.walker("/walk/sub/c.txt").unwrap().collect();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0].info.size, 3);
		assert_eq!(entries[0].info.name, "c.txt");
	}

	#[test]
	fn walker_missing_path_fails() {
		let ns = sample();
		assert!(matches!(ns.walker("/nope"), Err(NamespaceError::NotFound(_))));
	}

	#[test]
	fn walker_restarts_from_scratch() {
		let ns = sample();
		let first = paths(&ns, "/walk");
		ns.write_file("/walk/z.txt", "z").unwrap();
		let second = paths(&ns, "/walk");
		assert_eq!(second.len(), first.len() + 1);
		assert_eq!(second.last().map(String::as_str), Some("/walk/z.txt"));
	}

	#[test]
	fn walker_does_not_block_writers() {
		let ns = sample();
		let mut walker = ns.walker("/walk").unwrap();
		assert_eq!(walker.next().unwrap().path, "/walk");
		// Mutating mid-walk must not deadlock.
		ns.remove("/walk/b.txt").unwrap();
		let rest: Vec<String> = walker.map(|e| e.path).collect();
		assert!(rest.contains(&"/walk/sub/c.txt".to_string()));
	}

	#[test]
	fn walk_entry_serializes() {
		let ns = sample();
		let entry = ns.walker("/walk/a.txt").unwrap().next().unwrap();
		let v = serde_json::to_value(&entry).unwrap();
		assert_eq!(v["path"], "/walk/a.txt");
		assert_eq!(v["info"]["size"], 1);
	}

	// -- walk --

	#[test]
	fn walk_visits_every_node() {
		let ns = sample();
		let mut files = 0;
		let mut bytes = 0;
		ns.walk("/walk", |_, info| {
			if !info.is_dir {
				files += 1;
				bytes += info.size;
			}
			Ok::<(), NamespaceError>(())
		})
		.unwrap();
		assert_eq!(files, 3);
		assert_eq!(bytes, 6);
	}

	#[derive(Debug, PartialEq)]
	enum VisitError {
		Stop(String),
		Namespace(NamespaceError),
	}

	impl From<NamespaceError> for VisitError {
		fn from(err: NamespaceError) -> Self {
			Self::Namespace(err)
		}
	}

	#[test]
	fn walk_stops_at_first_visitor_error() {
		let ns = sample();
		let mut seen = Vec::new();
		let result = ns.walk("/walk", |path, _| {
			seen.push(path.to_string());
			if path == "/walk/b.txt" {
				return Err(VisitError::Stop(path.to_string()));
			}
			Ok(())
		});
		assert_eq!(result, Err(VisitError::Stop("/walk/b.txt".to_string())));
		assert_eq!(seen, vec!["/walk", "/walk/a.txt", "/walk/b.txt"]);
	}

	#[test]
	fn walk_reports_namespace_errors() {
		let ns = sample();
		let result = ns.walk("/ghost", |_, _| Ok::<(), VisitError>(()));
		assert!(matches!(
			result,
			Err(VisitError::Namespace(NamespaceError::NotFound(_)))
		));
	}

	// -- tree --

	#[test]
	fn tree_renders_sorted_children() {
		let ns = Namespace::new();
		ns.write_file("/a.txt", "a").unwrap();
		ns.create_dir("/dir", 0o755).unwrap();
		ns.write_file("/dir/b.txt", "bb").unwrap();
		let expected = [
			"/",
			"\u{251C}\u{2500}\u{2500} a.txt (1 bytes)",
			"\u{2514}\u{2500}\u{2500} dir/",
			"    \u{2514}\u{2500}\u{2500} b.txt (2 bytes)",
		]
		.join("\n");
		assert_eq!(ns.tree("/").unwrap(), expected);
	}

	#[test]
	fn tree_of_subdirectory() {
		let ns = sample();
		let t = ns.tree("/walk").unwrap();
		assert!(t.starts_with("walk\n"));
		assert!(t.contains("sub/"));
		assert!(t.contains("\u{2514}\u{2500}\u{2500} sub/"));
		assert!(t.contains("c.txt (3 bytes)"));
	}

	#[test]
	fn tree_of_file_fails() {
		let ns = sample();
		assert!(matches!(ns.tree("/walk/a.txt"), Err(NamespaceError::NotADirectory(_))));
		assert!(matches!(ns.tree("/ghost"), Err(NamespaceError::NotFound(_))));
	}
}
