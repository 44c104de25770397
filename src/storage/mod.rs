// Workspace backends for cases, steps and grants

pub mod memory;
pub mod file;
pub mod cached;

pub use memory::{InMemoryWorkspace, Membership, WorkspaceSnapshot};
pub use file::WorkspaceFile;
pub use cached::CachedPermissionLookup;
