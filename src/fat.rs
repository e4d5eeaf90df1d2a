//! FAT entry synthesis: filling one sector of a File Allocation Table.
//!
//! Cluster ownership is never stored — it falls straight out of the
//! contiguous-allocation rule this crate uses throughout: the root
//! directory (FAT32 only) and every file in turn get a run of consecutive
//! clusters exactly as long as their content needs, in enumeration order,
//! starting right after the reserved/root region. A FAT entry's value is
//! therefore always one of: the two reserved head entries, "points at the
//! next cluster in this owner's run", "end of this owner's chain", or
//! "free" (past the last file, in the unused tail of the data region).
//!
//! FAT12 packs two 12-bit entries into three bytes, so an entry's bytes
//! can straddle a sector boundary — the one case BPB_BytsPerSec's
//! guaranteed divisibility by 2 and 4 does not save you from (see
//! `bpb.rs`). This is handled by reconstructing whichever 3-byte triplets
//! overlap the requested sector and copying only the bytes that land
//! inside it, rather than assuming entries start exactly at a sector edge.

use crate::bpb::{FatType, Geometry};
use crate::partition::Partition;
use crate::{write_u16_le, write_u32_le};

const FAT12_EOC: u32 = 0x0FFF;
const FAT16_EOC: u32 = 0xFFFF;
const FAT32_EOC: u32 = 0x0FFF_FFFF;

/// The value stored at FAT entry `cluster` (2..), derived purely from
/// geometry and the partition's file enumerator — never cached beyond the
/// enumerator's own one-file cache.
fn entry_value(partition: &mut Partition, geo: &Geometry, cluster: u32) -> u32 {
    let root_clusters = if geo.fat_type.is_fat32() {
        geo.root_dir_clusters_fat32()
    } else {
        0
    };
    let first_file_cluster = geo.first_file_data_cluster();

    if geo.fat_type.is_fat32()
        && cluster >= Geometry::ROOT_CLUSTER_FAT32
        && cluster < first_file_cluster
    {
        let last_root_cluster = Geometry::ROOT_CLUSTER_FAT32 + root_clusters - 1;
        return if cluster == last_root_cluster {
            eoc(geo.fat_type)
        } else {
            cluster + 1
        };
    }

    if cluster < first_file_cluster {
        return crate::FREE_CLUSTER;
    }

    let (enumerator, provider) = partition.enumerator_and_provider();
    match enumerator.locate_cluster(provider, cluster) {
        Some((first, count)) if count > 0 => {
            if cluster == first + count - 1 {
                eoc(geo.fat_type)
            } else {
                cluster + 1
            }
        }
        // No file covers this cluster: either past the last file's data
        // (end of the allocated region) or a gap left by a provider that
        // terminated enumeration early. Either way it reads as "bad
        // cluster", not "free" — a synthesized disk never has free space
        // beyond what providers actually claimed.
        _ => crate::BAD_CLUSTER_FAT32,
    }
}

fn eoc(fat_type: FatType) -> u32 {
    match fat_type {
        FatType::Fat12 => FAT12_EOC,
        FatType::Fat16 => FAT16_EOC,
        FatType::Fat32 => FAT32_EOC,
    }
}

/// FAT[0] carries the media descriptor in its low byte; FAT[1] is the
/// clean-shutdown/no-error marker, which this crate always reports since
/// a synthesized disk can never have had a dirty unmount or a bad sector.
fn reserved_entry(index: u32, fat_type: FatType) -> u32 {
    match (index, fat_type) {
        (0, FatType::Fat12) => 0x0F00 | 0xF8,
        (0, FatType::Fat16) => 0xFF00 | 0xF8,
        (0, FatType::Fat32) => 0x0FFF_FF00 | 0xF8,
        (1, _) => eoc(fat_type),
        _ => unreachable!("only entries 0 and 1 are reserved"),
    }
}

fn entry_for(partition: &mut Partition, geo: &Geometry, cluster: u32) -> u32 {
    if cluster < 2 {
        reserved_entry(cluster, geo.fat_type)
    } else {
        entry_value(partition, geo, cluster)
    }
}

/// Writes one sector of a FAT copy. `relative_sector` is relative to the
/// start of that FAT copy (sector 0 is the first FAT sector, holding
/// entries 0.. up to however many fit).
pub fn write_fat_sector(
    partition: &mut Partition,
    geo: &Geometry,
    relative_sector: u32,
    buf: &mut [u8],
) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    let sector_bytes = geo.bytes_per_sector as u64;
    let byte_start = relative_sector as u64 * sector_bytes;
    let byte_end = byte_start + buf.len() as u64;

    match geo.fat_type {
        FatType::Fat16 => {
            let first_entry = (byte_start / 2) as u32;
            let entry_count = (buf.len() / 2) as u32;
            for i in 0..entry_count {
                let value = entry_for(partition, geo, first_entry + i);
                write_u16_le(buf, (i * 2) as usize, value as u16);
            }
        }
        FatType::Fat32 => {
            let first_entry = (byte_start / 4) as u32;
            let entry_count = (buf.len() / 4) as u32;
            for i in 0..entry_count {
                let value = entry_for(partition, geo, first_entry + i) & 0x0FFF_FFFF;
                write_u32_le(buf, (i * 4) as usize, value);
            }
        }
        FatType::Fat12 => {
            let first_group = byte_start / 3;
            let last_group = (byte_end - 1) / 3;
            for group in first_group..=last_group {
                let e0 = entry_for(partition, geo, (group * 2) as u32) & 0x0FFF;
                let e1 = entry_for(partition, geo, (group * 2 + 1) as u32) & 0x0FFF;
                let triplet = [
                    (e0 & 0xFF) as u8,
                    ((e0 >> 8) as u8 & 0x0F) | (((e1 & 0x0F) as u8) << 4),
                    (e1 >> 4) as u8,
                ];
                let group_byte_start = group * 3;
                for (i, byte) in triplet.iter().enumerate() {
                    let abs = group_byte_start + i as u64;
                    if abs >= byte_start && abs < byte_end {
                        buf[(abs - byte_start) as usize] = *byte;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_entries_carry_media_descriptor_and_eoc() {
        assert_eq!(reserved_entry(0, FatType::Fat16) & 0xFF, 0xF8);
        assert_eq!(reserved_entry(1, FatType::Fat16), 0xFFFF);
    }

    #[test]
    fn fat12_triplet_packs_two_entries_into_three_bytes() {
        // e0 = 0x001, e1 = 0xFFF -> bytes [0x01, 0xF0 | low nibble of e1 (0xF), 0xFF]
        let e0: u32 = 0x001;
        let e1: u32 = 0xFFF;
        let triplet = [
            (e0 & 0xFF) as u8,
            ((e0 >> 8) as u8 & 0x0F) | (((e1 & 0x0F) as u8) << 4),
            (e1 >> 4) as u8,
        ];
        assert_eq!(triplet, [0x01, 0xF0, 0xFF]);
    }
}
