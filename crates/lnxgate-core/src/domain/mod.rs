//! Domain types for the LNXGate VFS core.
//!
//! Pure data types describing filesystem objects as the storage manager
//! reports them, plus the setattr and statfs request/reply shapes. No
//! business logic and no external dependencies beyond serde.

pub mod attr;
pub mod errors;

pub use attr::{DirListing, FsStats, NodeKind, RemoteAttr, RemoteDirEntry, SetAttrRequest};
pub use errors::DomainError;
