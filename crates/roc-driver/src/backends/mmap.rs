//! Memory-mapped BAR window
//!
//! Maps a sysfs `resourceN` file and exposes it as a bounds-checked,
//! word-indexed register window. The only unsafe code of the crate lives
//! here: the mapping itself and the volatile accesses.

use crate::bar::RegisterReadWrite;
use crate::error::{Result, RocError};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Memory-mapped PCI BAR
#[derive(Debug)]
pub struct MmapRegion {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    path: PathBuf,
    bar_index: usize,
}

impl MmapRegion {
    /// Map the BAR resource file at `path`
    ///
    /// # Errors
    ///
    /// Returns `RocError::Pci` if the file cannot be opened, is empty, or
    /// cannot be mapped.
    pub fn new(path: &Path, bar_index: usize) -> Result<Self> {
        tracing::debug!("Mapping BAR{bar_index}: {}", path.display());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| RocError::pci(format!("Cannot open {}: {e}", path.display())))?;

        // BAR sizes fit in usize on every supported (64-bit) target
        #[allow(clippy::cast_possible_truncation)]
        let size = file
            .metadata()
            .map_err(|e| RocError::pci(format!("Cannot stat {}: {e}", path.display())))?
            .len() as usize;

        if size == 0 {
            return Err(RocError::pci(format!(
                "BAR{bar_index} size is 0 ({}; device not enabled?)",
                path.display()
            )));
        }

        // SAFETY: the fd was just opened read/write and stays open in `_file`
        // for the lifetime of the mapping; size is non-zero and the offset is
        // the start of the BAR. The mapping is released in Drop.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
        }
        .map_err(|e| RocError::pci(format!("mmap of {} failed: {e}", path.display())))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| RocError::pci("mmap returned a null mapping"))?;

        tracing::info!("Mapped BAR{bar_index} ({size} bytes at {ptr:p})");

        Ok(Self {
            ptr,
            size,
            _file: file,
            path: path.to_path_buf(),
            bar_index,
        })
    }

    /// Read the 32-bit register at byte `offset`
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` if the access is out of bounds.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check_bounds(offset, "read")?;

        // SAFETY: offset + 4 <= size was checked above and the mapping is
        // live. BAR registers are 4-byte aligned; volatile because MMIO reads
        // have side effects.
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };

        Ok(value)
    }

    /// Write the 32-bit register at byte `offset`
    ///
    /// # Errors
    ///
    /// Returns `RocError::InvalidAccess` if the access is out of bounds.
    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check_bounds(offset, "write")?;

        // SAFETY: as in `read_u32`; `&mut self` gives exclusive access.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }

        Ok(())
    }

    fn check_bounds(&self, offset: usize, what: &str) -> Result<()> {
        if offset % 4 != 0 || offset.checked_add(4).map_or(true, |end| end > self.size) {
            return Err(RocError::invalid_access(
                self.bar_index,
                self.bar_index,
                format!(
                    "out of bounds {what}: offset={offset:#x}, limit={:#x}",
                    self.size
                ),
            ));
        }
        Ok(())
    }

    /// Mapped size in bytes
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Resource file backing the mapping
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MmapRegion {
    fn register_offset(&self, index: usize) -> Result<usize> {
        index.checked_mul(4).ok_or_else(|| {
            RocError::invalid_access(
                self.bar_index,
                self.bar_index,
                format!("register index {index:#x} out of bounds, limit={:#x}", self.size),
            )
        })
    }
}

impl RegisterReadWrite for MmapRegion {
    fn read_register(&self, index: usize) -> Result<u32> {
        self.read_u32(self.register_offset(index)?)
    }

    fn write_register(&mut self, index: usize, value: u32) -> Result<()> {
        let offset = self.register_offset(index)?;
        self.write_u32(offset, value)
    }

    fn bar_index(&self) -> usize {
        self.bar_index
    }
}

impl Drop for MmapRegion {
    fn drop(&mut self) {
        tracing::debug!("Unmapping BAR{} ({})", self.bar_index, self.path.display());

        // SAFETY: ptr and size are exactly what mmap returned and was given
        // in `new`; the mapping is not used after drop.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: the region owns its mapping exclusively; writes need `&mut self`
// and every access is bounds-checked.
unsafe impl Send for MmapRegion {}

// SAFETY: shared access only performs volatile reads of the mapping.
unsafe impl Sync for MmapRegion {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn resource_file(words: &[u32]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for word in words {
            file.write_all(&word.to_ne_bytes()).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn maps_a_regular_file() {
        let file = resource_file(&[0x1111_1111, 0x2222_2222, 0x3333_3333, 0x4444_4444]);
        let mut region = MmapRegion::new(file.path(), 2).unwrap();

        assert_eq!(region.size(), 16);
        assert_eq!(region.bar_index(), 2);
        assert_eq!(region.read_register(1).unwrap(), 0x2222_2222);

        region.write_register(3, 0xdead_beef).unwrap();
        assert_eq!(region.read_u32(12).unwrap(), 0xdead_beef);
    }

    #[test]
    fn out_of_bounds_rejected() {
        let file = resource_file(&[0; 4]);
        let mut region = MmapRegion::new(file.path(), 0).unwrap();

        assert!(matches!(
            region.read_register(4),
            Err(RocError::InvalidAccess { .. })
        ));
        assert!(region.write_u32(13, 0).is_err());
        assert!(region.read_u32(usize::MAX - 1).is_err());
    }

    #[test]
    fn huge_register_index_rejected() {
        let file = resource_file(&[0; 4]);
        let mut region = MmapRegion::new(file.path(), 2).unwrap();

        for index in [usize::MAX / 2, usize::MAX / 4 + 1, usize::MAX] {
            assert!(matches!(
                region.read_register(index),
                Err(RocError::InvalidAccess { expected: 2, actual: 2, .. })
            ));
            assert!(matches!(
                region.write_register(index, 0xdead_beef),
                Err(RocError::InvalidAccess { .. })
            ));
        }
    }

    #[test]
    fn empty_resource_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            MmapRegion::new(file.path(), 0),
            Err(RocError::Pci { .. })
        ));
    }
}
