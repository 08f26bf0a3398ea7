//! Domain services behind the admission gate and the render guard.
//!
//! ARCHITECTURE
//! ============
//! Service modules own classification, decoding, and session state so the
//! route layer can stay focused on request plumbing. Nothing here verifies a
//! signature; this subsystem decodes and fails closed, it does not prove.

pub mod classifier;
pub mod codec;
pub mod errors;
pub mod session;
