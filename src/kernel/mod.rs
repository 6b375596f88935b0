//! Kernel management
//!
//! Two flavours of kernel listing are supported:
//! - pacman repositories plus the AUR (`manager`)
//! - Manjaro's `mhwd-kernel` (`mhwd_kernel`)

pub mod manager;
pub mod mhwd_kernel;
pub mod parser;

pub use manager::KernelManager;
pub use mhwd_kernel::MhwdKernelManager;
