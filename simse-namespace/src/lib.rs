pub mod config;
pub mod demo;
pub mod error;
pub mod namespace;
pub mod node;
pub mod path;
pub mod walk;

pub use error::NamespaceError;
pub use namespace::{Namespace, NamespaceOptions};
pub use node::{FileInfo, NodeKind, DEFAULT_DIR_MODE, DEFAULT_FILE_MODE};
pub use path::NamespaceLimits;
pub use walk::{WalkEntry, Walker};
