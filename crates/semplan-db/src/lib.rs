//! Persistence layer for semplan: row models, connection pool, embedded
//! migrations, and per-table query functions.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
