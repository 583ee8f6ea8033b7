//! Deterministic, pure logic for the exploration loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (UI-tree text, reply text, session state) and return deterministic
//! outputs suitable for tests.

pub mod action;
pub mod element;
pub mod extract;
pub mod grid;
pub mod reflection;
pub mod reply;
pub mod session;
