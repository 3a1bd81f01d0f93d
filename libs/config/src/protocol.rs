//! Runtime protocol constants
//!
//! Limits and defaults shared by the host boundary and the capability
//! configuration.

/// Guest memory layout
pub mod memory {
    /// Linear memory grows in pages of this size
    pub const PAGE_SIZE: u64 = 64 * 1024;

    /// Largest addressable guest memory (32-bit address space)
    pub const PLATFORM_MAX_MEMORY: u64 = 4 * 1024 * 1024 * 1024;

    /// Pages a fresh process starts with
    pub const INITIAL_PAGES: u64 = 1;
}

/// Scratch message defaults
pub mod message {
    /// Buffer capacity reserved when the caller passes no hint
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Upper bound on the capacity hint honoured up front
    pub const MAX_RESERVED_CAPACITY: usize = 16 * 1024 * 1024;
}

/// Timeout encoding at the host boundary
pub mod timeouts {
    /// Raw timeout meaning "wait forever"
    pub const WAIT_FOREVER: u64 = u64::MAX;
}
