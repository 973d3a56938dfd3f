//! Document-store abstraction over the `users`, `personalInfo`, `motorInfo`,
//! `documents`, `Admin`, and `admin_logs` collections.

pub mod memory;
pub mod records;
pub mod store;

pub use memory::{Collection, DirectorySnapshot, MemoryDirectory, SnapshotError};
pub use records::{
    AccountDocument, AccountId, AccountPatch, AdminProfile, Document, DocumentRecord,
    PersonalInfo, VehicleInfo,
};
pub use store::{DirectoryStore, StoreError};
