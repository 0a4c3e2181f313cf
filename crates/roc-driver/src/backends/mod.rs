//! Register window implementations
//!
//! - **Mmap**: a BAR resource file mapped into the process (hardware)
//! - **Memory**: a word array (tests, dry runs)

pub mod memory;
pub mod mmap;

pub use memory::MemoryRegion;
pub use mmap::MmapRegion;
