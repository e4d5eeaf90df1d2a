//! Error and status types for partition setup and the block-device adapter.
//!
//! The engine's own read path (see [`crate::disk`]) never fails: a
//! synthesizer that cannot produce a sector is handled with a best-effort
//! fallback, not a `Result`. The types below cover the two places a caller
//! can actually be told "no": configuring a disk, and the adapter surface
//! in [`crate::adapter`].

/// Why [`crate::disk::Disk::add_partition`] refused a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddPartitionError {
    /// Sector size is below 512 bytes or not a power of two.
    BadSectorSize,
    /// `sectors_per_cluster` is not one of 1, 2, 4, ..., 128.
    BadSectorsPerCluster,
    /// The disk already holds [`crate::MAX_PARTITIONS`] partitions.
    PartitionTableFull,
}

/// Result codes mirroring a FatFs-style `DRESULT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoResult {
    Ok,
    /// A read produced fewer sectors than requested.
    IoError,
    /// This device never accepts writes.
    WriteProtected,
    /// Bad drive number, bad sector range, or unsupported ioctl command.
    ParamError,
    /// The drive number has no [`crate::Disk`] registered.
    NotReady,
}

/// A tiny hand-rolled stand-in for the `bitflags!` macro: this crate's
/// status word only ever needs `|`/`contains`, not a dependency.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
        pub struct $name(pub $ty);

        impl $name {
            $(pub const $variant: $name = $name($value);)*

            pub const fn empty() -> Self {
                $name(0)
            }

            pub const fn contains(self, other: Self) -> bool {
                (self.0 & other.0) == other.0
            }

            pub const fn bits(self) -> $ty {
                self.0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }

        impl core::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

bitflags_like! {
    /// Mirrors FatFs's `STA_*` status bits. Always carries `WRITE_PROTECTED`;
    /// never `NOT_INITIALIZED` once a disk has been registered — see
    /// [`crate::adapter::DriveRegistry::initialize`].
    pub struct DriveStatus: u8 {
        const NOT_INITIALIZED = 0x01;
        const NO_DISK = 0x02;
        const WRITE_PROTECTED = 0x04;
    }
}

/// Ioctl command numbers accepted by [`crate::adapter::DriveRegistry::ioctl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlCommand {
    CtrlSync,
    GetSectorCount,
    GetSectorSize,
    GetBlockSize,
    CtrlErase,
}

impl IoctlCommand {
    /// Mirrors FatFs's raw command numbers (`CTRL_SYNC` = 0, `GET_SECTOR_COUNT`
    /// = 1, `GET_SECTOR_SIZE` = 2, `GET_BLOCK_SIZE` = 3, `CTRL_TRIM`/`CTRL_ERASE`
    /// = 4). Anything else is the host's `PARAM_ERR` case, returned as `None`
    /// rather than this crate inventing a catch-all variant.
    pub fn from_raw(cmd: u8) -> Option<IoctlCommand> {
        match cmd {
            0 => Some(IoctlCommand::CtrlSync),
            1 => Some(IoctlCommand::GetSectorCount),
            2 => Some(IoctlCommand::GetSectorSize),
            3 => Some(IoctlCommand::GetBlockSize),
            4 => Some(IoctlCommand::CtrlErase),
            _ => None,
        }
    }
}
