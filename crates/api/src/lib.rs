//! HTTP trigger service: run reconciliation passes on demand.

pub mod app;
