//! Synthesis of the Master Boot Record: sector 0 of the whole disk.
//!
//! Only the four-entry primary partition table matters here — there is no
//! extended partition support (see the crate's Non-goals). Each entry's
//! CHS fields are a fixed `(0, 1, 1)` placeholder rather than a computed
//! geometry: every modern reader trusts the LBA fields, and the CHS triple
//! exists only so ancient BIOSes see something plausible.

use crate::write_u32_le;

/// One partition's worth of information needed to fill its MBR entry.
#[derive(Debug, Clone, Copy)]
pub struct PartitionTableEntry {
    pub bootable: bool,
    pub partition_type: u8,
    pub first_sector_lba: u32,
    pub sector_count: u32,
}

const PARTITION_TABLE_OFFSET: usize = 446;
const PARTITION_ENTRY_SIZE: usize = 16;

/// `partitions.len()` must be at most [`crate::MAX_PARTITIONS`]; entries
/// beyond that are silently ignored by the caller's own bookkeeping, never
/// by this function (the disk assembly layer enforces the limit).
pub fn write_mbr(buf: &mut [u8], partitions: &[PartitionTableEntry]) {
    for b in buf.iter_mut() {
        *b = 0;
    }

    for (i, part) in partitions.iter().take(crate::MAX_PARTITIONS).enumerate() {
        let offset = PARTITION_TABLE_OFFSET + i * PARTITION_ENTRY_SIZE;
        buf[offset] = if part.bootable { 0x80 } else { 0x00 };
        buf[offset + 1..offset + 4].copy_from_slice(&[1, 1, 0]); // CHS first sector: (c=0,h=1,s=1)
        buf[offset + 4] = part.partition_type;
        buf[offset + 5..offset + 8].copy_from_slice(&[1, 1, 0]); // CHS last sector: same shortcut
        write_u32_le(buf, offset + 8, part.first_sector_lba);
        write_u32_le(buf, offset + 12, part.sector_count);
    }

    crate::write_u16_le(buf, 510, 0xAA55);
}

/// MBR partition type byte for a given FAT flavor and partition size.
/// FAT32 is always the LBA type 0x0C; FAT12 is always 0x01 (it has no
/// large-volume variant); FAT16 switches from 0x04 to 0x06 once the
/// partition needs a sector count too big for `BPB_TotSec16` to carry,
/// the same 0x10000-sector threshold the boot sector's own 16/32-bit
/// total-sectors fields switch on.
pub fn partition_type_byte(fat_type: crate::bpb::FatType, total_sectors: u32) -> u8 {
    use crate::bpb::FatType;
    match fat_type {
        FatType::Fat12 => 0x01,
        FatType::Fat16 if total_sectors <= 0xFFFF => 0x04,
        FatType::Fat16 => 0x06,
        FatType::Fat32 => 0x0C,
    }
}
