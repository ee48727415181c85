//! Compiler test modules.
//!
//! - `core`: structure, parameter naming, errors, converter injection
//! - `dialects`: MySQL and PostgreSQL rendering

mod core;
