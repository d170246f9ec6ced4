mod store;

pub use store::{AuditError, AuditStore, Page};
