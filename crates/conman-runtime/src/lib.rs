//! Container lifecycle management for conman.
//!
//! The [`service::RuntimeService`] drives containers through
//! `created -> running` by combining:
//! - [`handle::Handle`]: identity, on-disk layout, and atomic status file.
//! - [`store::InMemStore`]: the registry of known handles.
//! - [`oci::OciRuntime`]: the launcher handshake and OCI runtime calls.
//! - [`saga::CreateSaga`]: rollback of partially completed creations.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod api;
pub mod backoff;
pub mod getter;
pub mod handle;
pub mod instance;
pub mod oci;
pub mod saga;
pub mod service;
pub mod store;
