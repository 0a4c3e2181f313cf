//! Raw PCI access
//!
//! [`PciAccess`] is everything enumeration and the front-ends need from the
//! platform: list devices by identity pair, map a BAR, read the PCI address
//! and NUMA node. [`SysfsPci`] implements it over `/sys/bus/pci/devices`.

use crate::bar::RegisterReadWrite;
use crate::backends::MmapRegion;
use crate::card::PciId;
use crate::error::{Result, RocError};
use crate::parameters::PciAddress;
use roc_chip::bar::MAX_BARS;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Environment variable overriding the sysfs PCI device root
pub const SYSFS_ROOT_ENV: &str = "ROC_SYSFS_PCI_ROOT";

/// Default sysfs PCI device root
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/bus/pci/devices";

/// Platform PCI access
///
/// Failures are returned to the caller, never retried.
pub trait PciAccess {
    /// Opaque device handle
    type Handle: Clone + fmt::Debug;

    /// Mapped BAR window
    type Window: RegisterReadWrite;

    /// All devices with identity `id`, in discovery order
    ///
    /// # Errors
    ///
    /// Returns an error if the devices cannot be listed.
    fn devices(&self, id: PciId) -> Result<Vec<Self::Handle>>;

    /// Map BAR `bar_index` of `device`
    ///
    /// # Errors
    ///
    /// Returns an error if the BAR does not exist or cannot be mapped.
    fn map_bar(&self, device: &Self::Handle, bar_index: usize) -> Result<Self::Window>;

    /// PCI address of `device`
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be determined.
    fn address(&self, device: &Self::Handle) -> Result<PciAddress>;

    /// NUMA node of `device`, `-1` when the platform reports none
    ///
    /// # Errors
    ///
    /// Returns an error if the node cannot be read.
    fn numa_node(&self, device: &Self::Handle) -> Result<i32>;
}

/// A device directory under the sysfs root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsDevice {
    path: PathBuf,
}

impl SysfsDevice {
    /// Device directory
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name, `dddd:bb:dd.f` on a real system
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// [`PciAccess`] over sysfs
#[derive(Debug, Clone)]
pub struct SysfsPci {
    root: PathBuf,
}

impl SysfsPci {
    /// Sysfs access rooted at `$ROC_SYSFS_PCI_ROOT`, or the system root
    #[must_use]
    pub fn new() -> Self {
        let root = std::env::var_os(SYSFS_ROOT_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_SYSFS_ROOT), PathBuf::from);
        Self::with_root(root)
    }

    /// Sysfs access rooted at `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        tracing::debug!("PCI device root: {}", root.display());
        Self { root }
    }

    /// Device root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_hex_sysfs(path: &Path) -> Result<u16> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RocError::pci(format!("Cannot read {}: {e}", path.display())))?;

        let trimmed = content.trim().trim_start_matches("0x");

        u16::from_str_radix(trimmed, 16).map_err(|e| {
            RocError::pci(format!("Invalid hex value in {}: {e}", path.display()))
        })
    }
}

impl Default for SysfsPci {
    fn default() -> Self {
        Self::new()
    }
}

impl PciAccess for SysfsPci {
    type Handle = SysfsDevice;
    type Window = MmapRegion;

    fn devices(&self, id: PciId) -> Result<Vec<SysfsDevice>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            RocError::pci(format!("Cannot read PCI devices in {}: {e}", self.root.display()))
        })?;

        let mut matches = Vec::new();

        for entry in entries {
            let path = entry?.path();

            // Entries without readable IDs are not PCI functions we can use
            let vendor = Self::read_hex_sysfs(&path.join("vendor")).ok();
            let device = Self::read_hex_sysfs(&path.join("device")).ok();

            if vendor == Some(id.vendor) && device == Some(id.device) {
                tracing::debug!("Found {id} at {}", path.display());
                matches.push(SysfsDevice { path });
            }
        }

        // read_dir order is unspecified
        matches.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(matches)
    }

    fn map_bar(&self, device: &SysfsDevice, bar_index: usize) -> Result<MmapRegion> {
        if bar_index >= MAX_BARS {
            return Err(RocError::pci(format!(
                "BAR{bar_index} does not exist (a PCI function has {MAX_BARS})"
            )));
        }
        MmapRegion::new(&device.path.join(format!("resource{bar_index}")), bar_index)
    }

    fn address(&self, device: &SysfsDevice) -> Result<PciAddress> {
        PciAddress::from_sysfs_name(&device.name())
    }

    fn numa_node(&self, device: &SysfsDevice) -> Result<i32> {
        let path = device.path.join("numa_node");
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            // Kernels without NUMA support have no such attribute
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(-1),
            Err(e) => {
                return Err(RocError::pci(format!("Cannot read {}: {e}", path.display())))
            }
        };

        content.trim().parse().map_err(|e| {
            RocError::pci(format!("Invalid NUMA node in {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn device_dir(root: &Path, name: &str, vendor: &str, device: &str) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("vendor"), format!("{vendor}\n")).unwrap();
        fs::write(dir.join("device"), format!("{device}\n")).unwrap();
        dir
    }

    #[test]
    fn lists_matching_devices_sorted() {
        let root = tempfile::tempdir().unwrap();
        device_dir(root.path(), "0000:83:00.0", "0x1172", "0xe001");
        device_dir(root.path(), "0000:02:00.0", "0x1172", "0xe001");
        device_dir(root.path(), "0000:03:00.0", "0x8086", "0x1533");
        fs::create_dir(root.path().join("not-a-device")).unwrap();

        let pci = SysfsPci::with_root(root.path());
        let devices = pci.devices(PciId::new(0x1172, 0xe001)).unwrap();
        let names: Vec<_> = devices.iter().map(SysfsDevice::name).collect();
        assert_eq!(names, ["0000:02:00.0", "0000:83:00.0"]);

        assert_eq!(
            pci.address(&devices[1]).unwrap(),
            PciAddress::new(0x83, 0, 0).unwrap()
        );
    }

    #[test]
    fn numa_node_missing_or_present() {
        let root = tempfile::tempdir().unwrap();
        let dir = device_dir(root.path(), "0000:02:00.0", "0x10dc", "0x0033");
        let pci = SysfsPci::with_root(root.path());
        let device = SysfsDevice { path: dir.clone() };

        assert_eq!(pci.numa_node(&device).unwrap(), -1);
        fs::write(dir.join("numa_node"), "1\n").unwrap();
        assert_eq!(pci.numa_node(&device).unwrap(), 1);
        fs::write(dir.join("numa_node"), "x\n").unwrap();
        assert!(matches!(pci.numa_node(&device), Err(RocError::Pci { .. })));
    }

    #[test]
    fn missing_root_is_pci_error() {
        let pci = SysfsPci::with_root("/nonexistent/sysfs/root");
        assert!(matches!(
            pci.devices(PciId::new(0x10dc, 0x0033)),
            Err(RocError::Pci { .. })
        ));
    }

    #[test]
    fn bar_index_bounded() {
        let root = tempfile::tempdir().unwrap();
        let dir = device_dir(root.path(), "0000:02:00.0", "0x10dc", "0x0033");
        let pci = SysfsPci::with_root(root.path());
        assert!(pci.map_bar(&SysfsDevice { path: dir }, MAX_BARS).is_err());
    }
}
