//! Domain layer shared by the HTTP service and dashboard clients: candidate types,
//! input validation, and the in-memory view state (table, search, cache, dialogs).

pub mod confirm;
pub mod dashboard;
pub mod events;
pub mod query;
pub mod search;
pub mod stats;
pub mod table;
pub mod types;
pub mod validation;
