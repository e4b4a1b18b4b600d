//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod area;
pub mod contract;
pub mod customer;
pub mod monthly_progress;
pub mod profile;
pub mod signature;
pub mod signature_progress;

// Re-export specific types to avoid conflicts
pub use area::{Column as AreaColumn, Entity as Area, Model as AreaModel};
pub use contract::{Column as ContractColumn, Entity as Contract, Model as ContractModel};
pub use customer::{Column as CustomerColumn, Entity as Customer, Model as CustomerModel};
pub use monthly_progress::{
    Column as MonthlyProgressColumn, Entity as MonthlyProgress, Model as MonthlyProgressModel,
};
pub use profile::{Column as ProfileColumn, Entity as Profile, Model as ProfileModel};
pub use signature::{Column as SignatureColumn, Entity as Signature, Model as SignatureModel};
pub use signature_progress::{
    Column as SignatureProgressColumn, Entity as SignatureProgress,
    Model as SignatureProgressModel,
};
