//! Data models

pub mod anomaly;
pub mod import_batch;

pub use anomaly::*;
pub use import_batch::*;
