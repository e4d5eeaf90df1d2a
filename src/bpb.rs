//! Geometry derivation and synthesis of the reserved region: the boot
//! sector's BPB, the FAT32 FSInfo sector, and the FAT32 backup copies.
//!
//! Layout of a synthesized partition, relative sector 0 upward:
//! ```text
//! [ reserved sectors ][ FAT copy 1 ][ FAT copy 2 ][ root dir ]*[ data region ]
//! ```
//! `*` root dir only exists as a separate region on FAT12/FAT16 — on FAT32
//! the root directory is an ordinary cluster chain starting at cluster 2,
//! inside the data region. See [`Geometry::root_dir_sectors`].
//!
//! Every multi-byte field is written with an explicit little-endian
//! conversion (`to_le_bytes`) rather than an overlaid `#[repr(packed)]`
//! struct, so the output is identical regardless of host endianness.

use crate::error::AddPartitionError;
use crate::{write_u16_le, write_u32_le, MAX_CLUSTER_FAT12, MAX_CLUSTER_FAT16};

/// Which of the three FAT flavors a partition's cluster count selects.
///
/// There is no such thing as a FAT12 volume with more than 4084 clusters,
/// a FAT16 volume with fewer than 4085 or more than 65524, or a FAT32
/// volume with fewer than 65525 — the type follows from the cluster count,
/// it is never chosen independently of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

impl FatType {
    pub fn from_cluster_count(count_data_clusters: u32) -> FatType {
        if count_data_clusters < MAX_CLUSTER_FAT12 {
            FatType::Fat12
        } else if count_data_clusters < MAX_CLUSTER_FAT16 {
            FatType::Fat16
        } else {
            FatType::Fat32
        }
    }

    /// Bits occupied by one FAT entry on the wire.
    pub fn entry_bits(self) -> u32 {
        match self {
            FatType::Fat12 => 12,
            FatType::Fat16 => 16,
            FatType::Fat32 => 32,
        }
    }

    pub fn is_fat32(self) -> bool {
        matches!(self, FatType::Fat32)
    }

    pub fn label(self) -> &'static [u8; 8] {
        match self {
            FatType::Fat12 => b"FAT12   ",
            FatType::Fat16 => b"FAT16   ",
            FatType::Fat32 => b"FAT32   ",
        }
    }
}

/// The always-2 FATs this crate synthesizes. original_source never varies
/// this, and nothing in the callers' use of `add_partition` needs to.
pub const NUM_FATS: u8 = 2;

/// FAT32 places the FSInfo sector and a spare "third boot sector" right
/// after the boot sector, then a backup of all three six sectors later.
pub const FSINFO_SECTOR: u16 = 1;
pub const BACKUP_BOOT_SECTOR: u16 = 6;

/// All derived geometry for one partition. Computed once by
/// [`Geometry::compute`] and then read by every synthesizer — nothing here
/// is mutated after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub fat_type: FatType,
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sector_count: u16,
    pub root_dir_entries: u16,
    pub sectors_per_fat: u32,
    pub count_data_clusters: u32,
    pub volume_serial: u32,
}

impl Geometry {
    /// Validates and derives geometry from the caller's chosen sector
    /// size, cluster size, and (FAT12/16 only) root directory capacity.
    pub fn compute(
        bytes_per_sector: u16,
        sectors_per_cluster: u8,
        count_data_clusters: u32,
        root_dir_entries: u16,
        volume_serial: u32,
    ) -> Result<Geometry, AddPartitionError> {
        if bytes_per_sector < 512 || !bytes_per_sector.is_power_of_two() {
            return Err(AddPartitionError::BadSectorSize);
        }
        if !sectors_per_cluster.is_power_of_two() || sectors_per_cluster > 128 {
            return Err(AddPartitionError::BadSectorsPerCluster);
        }

        let fat_type = FatType::from_cluster_count(count_data_clusters);
        let reserved_sector_count: u16 = if fat_type.is_fat32() { 32 } else { 1 };

        // +2 for the two reserved entries at the head of every FAT.
        let entries = count_data_clusters as u64 + 2;
        let bits = fat_type.entry_bits() as u64;
        let fat_bytes = (entries * bits + 7) / 8;
        let sectors_per_fat = ((fat_bytes + bytes_per_sector as u64 - 1)
            / bytes_per_sector as u64) as u32;

        Ok(Geometry {
            fat_type,
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sector_count,
            root_dir_entries,
            sectors_per_fat,
            count_data_clusters,
            volume_serial,
        })
    }

    pub fn root_dir_sectors(&self) -> u32 {
        if self.fat_type.is_fat32() {
            0
        } else {
            let bytes = self.root_dir_entries as u32 * crate::DIRENT_SIZE as u32;
            (bytes + self.bytes_per_sector as u32 - 1) / self.bytes_per_sector as u32
        }
    }

    pub fn fat_region_sectors(&self) -> u32 {
        NUM_FATS as u32 * self.sectors_per_fat
    }

    pub fn first_fat_sector(&self, fat_index: u8) -> u32 {
        self.reserved_sector_count as u32 + fat_index as u32 * self.sectors_per_fat
    }

    pub fn first_root_dir_sector(&self) -> u32 {
        self.reserved_sector_count as u32 + self.fat_region_sectors()
    }

    pub fn first_data_sector(&self) -> u32 {
        self.first_root_dir_sector() + self.root_dir_sectors()
    }

    /// The root directory's own first cluster on FAT32, where it is an
    /// ordinary cluster chain rather than a fixed region.
    pub const ROOT_CLUSTER_FAT32: u32 = 2;

    /// How many clusters the FAT32 root directory occupies, sized from
    /// `root_dir_entries` the same way the BPB's fixed root region would
    /// be on FAT12/16 — this is the "root directory as an ordinary
    /// cluster chain" shortcut: it never grows once a partition is added,
    /// so a provider whose file count outgrows it is a configuration
    /// error caught at `add_partition` time, not a later synthesis bug.
    pub fn root_dir_clusters_fat32(&self) -> u32 {
        let cluster_bytes = self.bytes_per_sector as u32 * self.sectors_per_cluster as u32;
        let needed_bytes = self.root_dir_entries as u32 * crate::DIRENT_SIZE as u32;
        ((needed_bytes + cluster_bytes - 1) / cluster_bytes).max(1)
    }

    /// First cluster number available for file data: on FAT32 this is
    /// after the root directory's own clusters, on FAT12/16 it is simply
    /// cluster 2 since the root directory lives outside the cluster area.
    pub fn first_file_data_cluster(&self) -> u32 {
        if self.fat_type.is_fat32() {
            Self::ROOT_CLUSTER_FAT32 + self.root_dir_clusters_fat32()
        } else {
            2
        }
    }

    pub fn cluster_to_sector(&self, cluster: u32) -> u32 {
        self.first_data_sector() + (cluster - 2) * self.sectors_per_cluster as u32
    }

    pub fn total_sectors(&self) -> u32 {
        self.first_data_sector() + self.count_data_clusters * self.sectors_per_cluster as u32
    }
}

/// Writes the boot sector (BPB + either the FAT12/16 or FAT32 extension)
/// into a full-size sector buffer. `partition_start_lba` becomes
/// `BPB_HiddSec`; `volume_label` is copied, space-padded, to 11 bytes.
pub fn write_boot_sector(buf: &mut [u8], geo: &Geometry, partition_start_lba: u32, volume_label: &str) {
    for b in buf.iter_mut() {
        *b = 0;
    }

    buf[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]); // BS_jmpBoot: jmp short + nop
    buf[3..11].copy_from_slice(b"MSDOS5.0"); // BS_OEMName
    write_u16_le(buf, 11, geo.bytes_per_sector); // BPB_BytsPerSec
    buf[13] = geo.sectors_per_cluster; // BPB_SecPerClus
    write_u16_le(buf, 14, geo.reserved_sector_count); // BPB_RsvdSecCnt
    buf[16] = NUM_FATS; // BPB_NumFATs
    write_u16_le(buf, 17, geo.root_dir_entries); // BPB_RootEntCnt
    let total = geo.total_sectors();
    if total < 0x10000 && !geo.fat_type.is_fat32() {
        write_u16_le(buf, 19, total as u16); // BPB_TotSec16
    } else {
        write_u16_le(buf, 19, 0);
    }
    buf[21] = 0xF8; // BPB_Media: fixed disk
    if geo.fat_type.is_fat32() {
        write_u16_le(buf, 22, 0); // BPB_FATSz16 unused on FAT32
    } else {
        write_u16_le(buf, 22, geo.sectors_per_fat as u16); // BPB_FATSz16
    }
    write_u16_le(buf, 24, 63); // BPB_SecPerTrk
    write_u16_le(buf, 26, 255); // BPB_NumHeads
    write_u32_le(buf, 28, partition_start_lba); // BPB_HiddSec
    if total >= 0x10000 || geo.fat_type.is_fat32() {
        write_u32_le(buf, 32, total); // BPB_TotSec32
    } else {
        write_u32_le(buf, 32, 0);
    }

    if geo.fat_type.is_fat32() {
        write_fat32_extension(buf, geo, volume_label);
    } else {
        write_fat12_16_extension(buf, geo, volume_label);
    }

    write_u16_le(buf, 510, 0xAA55); // boot sector signature
}

fn write_fat12_16_extension(buf: &mut [u8], geo: &Geometry, volume_label: &str) {
    buf[36] = 0x00; // BS_DrvNum
    buf[37] = 0; // BS_Reserved1
    buf[38] = 0x29; // BS_BootSig
    write_u32_le(buf, 39, geo.volume_serial); // BS_VolID
    write_padded_label(&mut buf[43..54], volume_label); // BS_VolLab
    buf[54..62].copy_from_slice(geo.fat_type.label()); // BS_FilSysType
}

fn write_fat32_extension(buf: &mut [u8], geo: &Geometry, volume_label: &str) {
    write_u32_le(buf, 36, geo.sectors_per_fat); // BPB_FATSz32
    write_u16_le(buf, 40, 0); // BPB_ExtFlags: mirrored, FAT #0 active
    write_u16_le(buf, 42, 0x0000); // BPB_FSVer
    write_u32_le(buf, 44, Geometry::ROOT_CLUSTER_FAT32); // BPB_RootClus
    write_u16_le(buf, 48, FSINFO_SECTOR); // BPB_FSInfo
    write_u16_le(buf, 50, BACKUP_BOOT_SECTOR); // BPB_BkBootSec
    // bytes 52..64 (BPB_Reserved) already zeroed
    buf[64] = 0x00; // BS_DrvNum
    buf[65] = 0; // BS_Reserved1
    buf[66] = 0x29; // BS_BootSig
    write_u32_le(buf, 67, geo.volume_serial); // BS_VolID
    write_padded_label(&mut buf[71..82], volume_label); // BS_VolLab
    buf[82..90].copy_from_slice(b"FAT32   "); // BS_FilSysType
}

fn write_padded_label(dest: &mut [u8], label: &str) {
    for b in dest.iter_mut() {
        *b = b' ';
    }
    let bytes = label.as_bytes();
    let len = bytes.len().min(dest.len());
    dest[..len].copy_from_slice(&bytes[..len]);
}

/// FAT32's FSInfo sector. This crate never allocates clusters, so the
/// free-cluster count and next-free hint are always reported as unknown
/// (`0xFFFFFFFF`) rather than a real, maintained value.
pub fn write_fsinfo(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    write_u32_le(buf, 0, 0x4161_5252); // FSI_LeadSig
    write_u32_le(buf, 484, 0x6141_7272); // FSI_StrucSig
    write_u32_le(buf, 488, 0xFFFF_FFFF); // FSI_Free_Count: unknown
    write_u32_le(buf, 492, 0xFFFF_FFFF); // FSI_Nxt_Free: unknown
    write_u16_le(buf, 510, 0xAA55); // FSI_TrailSig (low half of 0xAA550000)
}

/// FAT32's spare "third boot sector" (reserved sector 2 and its backup):
/// entirely reserved, carries only the boot sector signature.
pub fn write_third_boot_sector(buf: &mut [u8]) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    write_u16_le(buf, 510, 0xAA55);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_count_selects_fat_type() {
        assert_eq!(FatType::from_cluster_count(100), FatType::Fat12);
        assert_eq!(FatType::from_cluster_count(5000), FatType::Fat16);
        assert_eq!(FatType::from_cluster_count(70000), FatType::Fat32);
    }

    #[test]
    fn fat32_reserves_32_sectors_and_skips_root_region() {
        let geo = Geometry::compute(512, 8, 70_000, 0, 0).unwrap();
        assert_eq!(geo.reserved_sector_count, 32);
        assert_eq!(geo.root_dir_sectors(), 0);
    }

    #[test]
    fn fat16_root_region_sized_from_entry_count() {
        let geo = Geometry::compute(512, 4, 5000, 512, 0).unwrap();
        // 512 entries * 32 bytes / 512 bytes-per-sector = 32 sectors exactly.
        assert_eq!(geo.root_dir_sectors(), 32);
    }

    #[test]
    fn rejects_bad_sector_size() {
        assert_eq!(
            Geometry::compute(300, 4, 5000, 512, 0),
            Err(AddPartitionError::BadSectorSize)
        );
    }

    #[test]
    fn rejects_bad_cluster_size() {
        assert_eq!(
            Geometry::compute(512, 3, 5000, 512, 0),
            Err(AddPartitionError::BadSectorsPerCluster)
        );
    }

    #[test]
    fn boot_sector_carries_signature_and_geometry() {
        let geo = Geometry::compute(512, 4, 5000, 512, 0xDEAD_BEEF).unwrap();
        let mut buf = [0u8; 512];
        write_boot_sector(&mut buf, &geo, 0, "TESTVOL");
        assert_eq!(&buf[510..512], &[0x55, 0xAA]);
        assert_eq!(u16::from_le_bytes([buf[11], buf[12]]), 512);
        assert_eq!(buf[13], 4);
    }
}
