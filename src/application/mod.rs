//! Application services: entity store contracts, search and orchestration.

pub mod accounts;
pub mod comments;
pub mod deadline;
pub mod error;
pub mod posts;
pub mod repos;
pub mod search;
pub mod tasks;
