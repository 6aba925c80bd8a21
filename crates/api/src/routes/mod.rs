//! HTTP Route Handlers

pub mod dashboard;
pub mod sensors;
pub mod sheets;
