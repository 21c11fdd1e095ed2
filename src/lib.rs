// src/lib.rs — Library root for sqlbuddy

pub mod app;
pub mod cli;
pub mod core;
pub mod infra;
pub mod memory;
pub mod provider;
pub mod retrieval;
pub mod sql;
pub mod util;
