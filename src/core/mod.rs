//! Core business logic, independent of any user interface.

/// Contracts and their sign-off rosters
pub mod contract;
/// Customers, areas and profiles
pub mod customer;
/// Batched dashboard read model
pub mod dashboard;
/// Copying contracts between years
pub mod import;
/// Cadence changes and the reshaping of recorded progress
pub mod migration;
/// Cadence parsing and active months
pub mod period;
/// Per-period progress and yearly status
pub mod progress;
/// Single-period writes: steps, uploads and notes
pub mod tracking;
