//! IO modules - side effects (network, filesystem)

pub mod atomic;
pub mod download;
pub mod source;
