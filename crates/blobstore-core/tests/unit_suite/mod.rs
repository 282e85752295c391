//! Unit tests for blobstore-core.
//!
//! Everything here runs in-process: the cloud adapters run over an
//! in-memory object store and the REST adapters talk to fake servers bound
//! to an ephemeral local port.

pub mod contract;
pub mod helpers;
pub mod kvpbase;
pub mod pagination;
