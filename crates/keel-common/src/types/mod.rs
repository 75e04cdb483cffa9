//! Core type definitions for KeelDB.

mod ids;

pub use ids::{Lsn, PageId};
