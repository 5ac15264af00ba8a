//! # conman-core
//!
//! Host-level primitives shared by the runtime service and the shim:
//! - **fs**: existence checks, atomic temp-file-then-rename writes, and
//!   recursive root filesystem copies.
//! - **fd**: handing a descriptor to a spawned child at a fixed number,
//!   and adopting one inherited from a parent.
//! - **socket**: shim control-socket address derivation, listener
//!   creation with stale-socket recovery, and address persistence.
//! - **reap**: sub-reaper registration and non-blocking child reaping.
//!
//! All unsafe system calls are encapsulated in safe wrappers with
//! `// SAFETY:` documentation.

#![allow(unsafe_code)]
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod fd;
pub mod fs;
pub mod reap;
pub mod socket;
