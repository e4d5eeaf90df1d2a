//! The FatFs-shaped block-device surface a host filesystem driver mounts
//! against: `status`/`read`/`write`/`ioctl`, indexed by drive number.
//!
//! Everything above this module is a pure, allocation-free `Disk`. This
//! layer is the one place that introduces shared, lockable state and the
//! one place logging happens (see the crate's `DESIGN.md`): a
//! [`DriveRegistry`] is an explicit value the host owns and passes by
//! reference, never a `static`/`lazy_static` singleton, holding one
//! `spin::Mutex<Disk>` slot per drive number.

use spin::Mutex;

use crate::disk::Disk;
use crate::error::{DriveStatus, IoResult, IoctlCommand};

/// A fixed-size table of up to `N` drive slots, each either empty or
/// holding a lock around one [`Disk`]. `'a` is the lifetime of every
/// registered disk's file providers.
pub struct DriveRegistry<'a, const N: usize> {
    slots: [Option<Mutex<Disk<'a>>>; N],
}

impl<'a, const N: usize> DriveRegistry<'a, N> {
    pub fn new() -> Self {
        DriveRegistry {
            slots: core::array::from_fn(|_| None),
        }
    }

    /// Installs `disk` at `drive`, replacing whatever was there. Returns
    /// the previous occupant, if any, so a caller can detect a double
    /// registration rather than silently dropping a disk mid-use.
    pub fn register(&mut self, drive: usize, disk: Disk<'a>) -> Option<Disk<'a>> {
        let slot = self.slots.get_mut(drive)?;
        let old = core::mem::replace(slot, Some(Mutex::new(disk)));
        old.map(Mutex::into_inner)
    }

    pub fn deregister(&mut self, drive: usize) -> Option<Disk<'a>> {
        self.slots.get_mut(drive)?.take().map(Mutex::into_inner)
    }

    fn slot(&self, drive: usize) -> Option<&Mutex<Disk<'a>>> {
        self.slots.get(drive)?.as_ref()
    }

    /// Mirrors FatFs's `disk_initialize`: original_source took the address
    /// of a local/global pointer here, a bug (see the crate's
    /// `DESIGN.md`). The correct contract is a no-op — report current
    /// status without mutating the registry or the disk it already holds.
    pub fn initialize(&self, drive: usize) -> DriveStatus {
        self.status(drive)
    }

    /// Always carries `WRITE_PROTECTED`; carries `NOT_INITIALIZED` only
    /// when `drive` has no disk registered.
    pub fn status(&self, drive: usize) -> DriveStatus {
        match self.slot(drive) {
            Some(_) => DriveStatus::WRITE_PROTECTED,
            None => DriveStatus::WRITE_PROTECTED | DriveStatus::NOT_INITIALIZED,
        }
    }

    /// Reads `count` sectors starting at `sector` into `buf`
    /// (`buf.len() >= count * disk.sector_size()`). Returns `IoError` when
    /// fewer sectors were produced than requested — spec's "sector out of
    /// range" case becomes a reportable condition at this boundary, not in
    /// the engine itself — logging one line naming the shortfall.
    pub fn read(&self, drive: usize, buf: &mut [u8], sector: u32, count: u32) -> IoResult {
        let slot = match self.slot(drive) {
            Some(slot) => slot,
            None => return IoResult::NotReady,
        };
        let mut disk = slot.lock();
        let ss = disk.sector_size() as usize;
        let needed = ss * count as usize;
        if buf.len() < needed {
            return IoResult::ParamError;
        }
        let produced = disk.read_sectors(sector, count, &mut buf[..needed]);
        if produced < count {
            log::warn!(
                "drive {drive}: short read at sector {sector}, wanted {count} got {produced}"
            );
            IoResult::IoError
        } else {
            IoResult::Ok
        }
    }

    /// This device accepts no writes, ever; the registry and the disk
    /// underneath are left completely untouched.
    pub fn write(&self, drive: usize, _buf: &[u8], _sector: u32, _count: u32) -> IoResult {
        if self.slot(drive).is_none() {
            return IoResult::NotReady;
        }
        IoResult::WriteProtected
    }

    /// Entry point for a host passing FatFs's raw numeric ioctl command
    /// (see [`IoctlCommand::from_raw`]); an unmapped number is `ParamError`
    /// before a drive is even consulted, matching spec's ioctl contract.
    pub fn ioctl_raw(&self, drive: usize, cmd: u8, buf: &mut [u8]) -> IoResult {
        match IoctlCommand::from_raw(cmd) {
            Some(cmd) => self.ioctl(drive, cmd, buf),
            None => IoResult::ParamError,
        }
    }

    /// `SYNC` and `ERASE` are no-ops (there is nothing to flush or erase on
    /// a synthesized read-only disk); the `GET_*` commands report the
    /// geometry the host needs to mount.
    pub fn ioctl(&self, drive: usize, cmd: IoctlCommand, buf: &mut [u8]) -> IoResult {
        let slot = match self.slot(drive) {
            Some(slot) => slot,
            None => return IoResult::NotReady,
        };
        let disk = slot.lock();
        match cmd {
            IoctlCommand::CtrlSync | IoctlCommand::CtrlErase => IoResult::Ok,
            IoctlCommand::GetSectorCount => {
                if buf.len() < 4 {
                    return IoResult::ParamError;
                }
                buf[..4].copy_from_slice(&disk.sector_count().to_le_bytes());
                IoResult::Ok
            }
            IoctlCommand::GetSectorSize => {
                if buf.len() < 2 {
                    return IoResult::ParamError;
                }
                buf[..2].copy_from_slice(&disk.sector_size().to_le_bytes());
                IoResult::Ok
            }
            IoctlCommand::GetBlockSize => {
                if buf.len() < 4 {
                    return IoResult::ParamError;
                }
                // Block size equals one sector: this engine has no notion
                // of an erase block distinct from a sector.
                buf[..4].copy_from_slice(&(disk.sector_size() as u32).to_le_bytes());
                IoResult::Ok
            }
        }
    }
}

impl<'a, const N: usize> Default for DriveRegistry<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FileInfo, FileProvider};

    struct Empty;
    impl FileProvider for Empty {
        fn file_info(&self, _id: u64) -> Option<FileInfo<'_>> {
            None
        }
    }

    #[test]
    fn unregistered_drive_reports_not_initialized() {
        let registry: DriveRegistry<4> = DriveRegistry::new();
        assert!(registry.status(0).contains(DriveStatus::NOT_INITIALIZED));
        assert!(registry.status(0).contains(DriveStatus::WRITE_PROTECTED));
    }

    #[test]
    fn registered_drive_is_ready_and_write_protected() {
        let provider = Empty;
        let mut disk = Disk::new(512).unwrap();
        disk.add_partition(1, 100, 16, &provider).unwrap();
        let mut registry: DriveRegistry<4> = DriveRegistry::new();
        registry.register(0, disk);
        let status = registry.status(0);
        assert!(!status.contains(DriveStatus::NOT_INITIALIZED));
        assert!(status.contains(DriveStatus::WRITE_PROTECTED));
    }

    #[test]
    fn write_is_always_refused() {
        let provider = Empty;
        let mut disk = Disk::new(512).unwrap();
        disk.add_partition(1, 100, 16, &provider).unwrap();
        let mut registry: DriveRegistry<4> = DriveRegistry::new();
        registry.register(0, disk);
        assert_eq!(registry.write(0, &[0u8; 512], 0, 1), IoResult::WriteProtected);
    }

    #[test]
    fn ioctl_reports_geometry() {
        let provider = Empty;
        let mut disk = Disk::new(512).unwrap();
        disk.add_partition(1, 100, 16, &provider).unwrap();
        let mut registry: DriveRegistry<4> = DriveRegistry::new();
        registry.register(0, disk);
        let mut buf = [0u8; 4];
        assert_eq!(
            registry.ioctl(0, IoctlCommand::GetSectorSize, &mut buf),
            IoResult::Ok
        );
        assert_eq!(u16::from_le_bytes([buf[0], buf[1]]), 512);
    }

    #[test]
    fn unmapped_raw_command_is_param_error() {
        let provider = Empty;
        let mut disk = Disk::new(512).unwrap();
        disk.add_partition(1, 100, 16, &provider).unwrap();
        let mut registry: DriveRegistry<4> = DriveRegistry::new();
        registry.register(0, disk);
        let mut buf = [0u8; 4];
        assert_eq!(registry.ioctl_raw(0, 0xFF, &mut buf), IoResult::ParamError);
    }

    #[test]
    fn unknown_drive_ioctl_is_not_ready() {
        let registry: DriveRegistry<4> = DriveRegistry::new();
        let mut buf = [0u8; 4];
        assert_eq!(
            registry.ioctl(5, IoctlCommand::GetSectorSize, &mut buf),
            IoResult::NotReady
        );
    }
}
