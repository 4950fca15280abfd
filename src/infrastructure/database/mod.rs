//! SQLite-backed persistence: connection pool, queue, and audit log.

pub mod audit_repo;
pub mod connection;
pub mod queue_repo;
pub mod utils;

pub use audit_repo::AuditLogRepositoryImpl;
pub use connection::DatabaseConnection;
pub use queue_repo::QueueRepositoryImpl;
