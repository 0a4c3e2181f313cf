//! In-memory register window
//!
//! A plain word array standing in for a mapped BAR. Used to exercise the
//! register accessors and front-ends without a card installed.

use crate::bar::RegisterReadWrite;
use crate::error::{Result, RocError};

/// Register window backed by a `Vec<u32>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    words: Vec<u32>,
    bar_index: usize,
}

impl MemoryRegion {
    /// Zeroed window of `words` registers claiming to be BAR `bar_index`
    #[must_use]
    pub fn new(bar_index: usize, words: usize) -> Self {
        Self {
            words: vec![0; words],
            bar_index,
        }
    }

    /// Set a register, builder style
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` if `index` is out of range.
    pub fn preset(&mut self, index: usize, value: u32) -> Result<&mut Self> {
        self.write_register(index, value)?;
        Ok(self)
    }

    /// Register contents
    #[must_use]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    fn out_of_range(bar_index: usize, words: usize, index: usize) -> RocError {
        RocError::invalid_access(
            bar_index,
            bar_index,
            format!("register index {index:#x} beyond {words} words"),
        )
    }
}

impl RegisterReadWrite for MemoryRegion {
    fn read_register(&self, index: usize) -> Result<u32> {
        self.words
            .get(index)
            .copied()
            .ok_or_else(|| Self::out_of_range(self.bar_index, self.words.len(), index))
    }

    fn write_register(&mut self, index: usize, value: u32) -> Result<()> {
        let (bar_index, words) = (self.bar_index, self.words.len());
        let word = self
            .words
            .get_mut(index)
            .ok_or_else(|| Self::out_of_range(bar_index, words, index))?;
        *word = value;
        Ok(())
    }

    fn bar_index(&self) -> usize {
        self.bar_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_back_writes() {
        let mut region = MemoryRegion::new(0, 8);
        region.write_register(7, 42).unwrap();
        assert_eq!(region.read_register(7).unwrap(), 42);
        assert_eq!(region.read_register(0).unwrap(), 0);
        assert!(region.read_register(8).is_err());
        assert!(region.write_register(8, 1).is_err());
    }
}
