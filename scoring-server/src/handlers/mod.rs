//! HTTP handlers

pub mod anomalies;
pub mod health;
pub mod predictions;
pub mod storage;
