//! The router and the read loop: turns an absolute sector number into a
//! synthesizer call, remembering the last decision so that a run of
//! sequential reads against the same region skips re-routing.
//!
//! A [`Disk`] is the only stateful value in this crate's core — and even
//! it holds O(partitions) bytes: up to [`crate::MAX_PARTITIONS`] partition
//! records plus one cached route. Nothing here allocates.

use crate::bpb::Geometry;
use crate::error::AddPartitionError;
use crate::mbr::{self, PartitionTableEntry};
use crate::partition::Partition;
use crate::provider::FileProvider;
use crate::{bpb, dir, fat, MAX_PARTITIONS};

/// Which synthesizer owns a routed sector, and (for anything inside a
/// partition) which partition slot it lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SynthKind {
    Mbr,
    /// Zero-fill: the gap before the first partition, between partitions,
    /// or after the last one, out to `disk.sector_count`.
    Null,
    Reserved { partition: usize },
    Fat { partition: usize },
    Directory { partition: usize },
    Content { partition: usize },
}

/// The router's one cached decision: a synthesizer plus the absolute
/// sector range over which that same decision would be reached again.
/// Never stores per-sector derived values (e.g. which file owns a
/// cluster) — those are cheap to recompute and must be, since other reads
/// sharing the same partition's single enumerator cursor can move it
/// between calls.
#[derive(Debug, Clone, Copy)]
struct RouteCache {
    kind: SynthKind,
    first_sector: u32,
    last_sector: u32,
}

impl RouteCache {
    fn covers(&self, sector: u32) -> bool {
        sector >= self.first_sector && sector <= self.last_sector
    }
}

/// A read-only disk: up to [`MAX_PARTITIONS`] partitions over a fixed
/// sector size, plus the one cached router decision every `read_sectors`
/// call consults before re-routing.
pub struct Disk<'a> {
    sector_size: u16,
    sector_count: u32,
    partitions: [Option<Partition<'a>>; MAX_PARTITIONS],
    partition_count: usize,
    cache: Option<RouteCache>,
}

impl<'a> Disk<'a> {
    /// `sector_size` must be at least 512 and a power of two. The disk
    /// starts at one sector (the MBR) with no partitions.
    pub fn new(sector_size: u16) -> Result<Self, AddPartitionError> {
        if sector_size < 512 || !sector_size.is_power_of_two() {
            return Err(AddPartitionError::BadSectorSize);
        }
        Ok(Disk {
            sector_size,
            sector_count: 1,
            partitions: core::array::from_fn(|_| None),
            partition_count: 0,
            cache: None,
        })
    }

    pub fn sector_size(&self) -> u16 {
        self.sector_size
    }

    pub fn sector_count(&self) -> u32 {
        self.sector_count
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    pub fn partition_geometry(&self, index: usize) -> Option<&Geometry> {
        self.partitions.get(index)?.as_ref().map(Partition::geometry)
    }

    pub fn partition_start_sector(&self, index: usize) -> Option<u32> {
        self.partitions.get(index)?.as_ref().map(Partition::start_sector)
    }

    /// Appends a partition with volume serial 0. See
    /// [`Disk::add_partition_with_serial`] for the full contract.
    pub fn add_partition(
        &mut self,
        sectors_per_cluster: u8,
        count_data_clusters: u32,
        root_dir_entries: u16,
        provider: &'a dyn FileProvider,
    ) -> Result<(), AddPartitionError> {
        self.add_partition_with_serial(
            sectors_per_cluster,
            count_data_clusters,
            root_dir_entries,
            0,
            provider,
        )
    }

    /// Appends a partition immediately after whatever is already on the
    /// disk (the first partition starts at sector 1, right after the
    /// MBR). Fails without mutating the disk if the table is full or the
    /// geometry is invalid; see [`AddPartitionError`].
    pub fn add_partition_with_serial(
        &mut self,
        sectors_per_cluster: u8,
        count_data_clusters: u32,
        root_dir_entries: u16,
        volume_serial: u32,
        provider: &'a dyn FileProvider,
    ) -> Result<(), AddPartitionError> {
        if self.partition_count >= MAX_PARTITIONS {
            return Err(AddPartitionError::PartitionTableFull);
        }
        let geometry = Geometry::compute(
            self.sector_size,
            sectors_per_cluster,
            count_data_clusters,
            root_dir_entries,
            volume_serial,
        )?;
        let start_sector = self.sector_count;
        let partition = Partition::new(geometry, start_sector, provider);
        let total = partition.sector_count();
        self.partitions[self.partition_count] = Some(partition);
        self.partition_count += 1;
        self.sector_count = start_sector + total;
        self.cache = None;
        Ok(())
    }

    /// Fills `buf` (at least `count * sector_size` bytes) with sectors
    /// `[start_sector, start_sector + produced)`. Stops, returning fewer
    /// than `count`, the moment it would have to read at or past
    /// `sector_count` — there is nothing past the edge of the disk to
    /// synthesize. Everything in bounds always produces at least one
    /// sector per loop iteration: a content generator that fails is
    /// covered by the 0xFF best-effort fallback, not treated as an
    /// out-of-bounds read.
    pub fn read_sectors(&mut self, start_sector: u32, count: u32, buf: &mut [u8]) -> u32 {
        let ss = self.sector_size as usize;
        let mut sector = start_sector;
        let mut remaining = count;
        let mut produced: u32 = 0;

        while remaining > 0 {
            if sector >= self.sector_count {
                break;
            }
            if !self.cache.map_or(false, |c| c.covers(sector)) {
                self.cache = self.route(sector);
                if self.cache.is_none() {
                    break;
                }
            }
            let cache = match self.cache {
                Some(c) => c,
                None => break,
            };
            let budget = (cache.last_sector - sector + 1).min(remaining);
            let byte_offset = produced as usize * ss;
            let out = &mut buf[byte_offset..byte_offset + budget as usize * ss];
            let made = self.synthesize(cache.kind, sector, budget, out);
            let made = if made == 0 {
                buf[byte_offset..byte_offset + ss].fill(0xFF);
                1
            } else {
                made
            };
            sector += made;
            remaining -= made;
            produced += made;
        }
        produced
    }

    fn route(&mut self, sector: u32) -> Option<RouteCache> {
        if sector >= self.sector_count {
            return None;
        }
        if sector == 0 {
            return Some(RouteCache {
                kind: SynthKind::Mbr,
                first_sector: 0,
                last_sector: 0,
            });
        }
        let mut prev_end = 1u32;
        for idx in 0..self.partition_count {
            let (start, end) = {
                let part = self.partitions[idx].as_ref().expect("partition_count bounds live slots");
                (part.start_sector(), part.end_sector())
            };
            if sector < start {
                return Some(RouteCache {
                    kind: SynthKind::Null,
                    first_sector: prev_end,
                    last_sector: start - 1,
                });
            }
            if sector < end {
                return Some(self.route_within_partition(idx, sector));
            }
            prev_end = end;
        }
        Some(RouteCache {
            kind: SynthKind::Null,
            first_sector: prev_end,
            last_sector: self.sector_count - 1,
        })
    }

    fn route_within_partition(&mut self, idx: usize, sector: u32) -> RouteCache {
        let (geo, start) = {
            let part = self.partitions[idx].as_ref().unwrap();
            (*part.geometry(), part.start_sector())
        };
        let local = sector - start;

        let address_fat = geo.reserved_sector_count as u32;
        let address_root_dir = address_fat + geo.fat_region_sectors();
        let address_data = address_root_dir + geo.root_dir_sectors();

        if local < address_fat {
            return RouteCache {
                kind: SynthKind::Reserved { partition: idx },
                first_sector: start,
                last_sector: start + address_fat - 1,
            };
        }
        if local < address_root_dir {
            let offset_into_fats = local - address_fat;
            let fat_index = offset_into_fats / geo.sectors_per_fat;
            let fat_start = start + address_fat + fat_index * geo.sectors_per_fat;
            return RouteCache {
                kind: SynthKind::Fat { partition: idx },
                first_sector: fat_start,
                last_sector: fat_start + geo.sectors_per_fat - 1,
            };
        }
        if local < address_data {
            return RouteCache {
                kind: SynthKind::Directory { partition: idx },
                first_sector: start + address_root_dir,
                last_sector: start + address_data - 1,
            };
        }

        let spc = geo.sectors_per_cluster as u32;
        let data_cluster = (local - address_data) / spc + 2;
        let first_file_cluster = geo.first_file_data_cluster();

        if geo.fat_type.is_fat32() && data_cluster < first_file_cluster {
            let last_root_cluster = first_file_cluster - 1;
            return RouteCache {
                kind: SynthKind::Directory { partition: idx },
                first_sector: start + geo.cluster_to_sector(Geometry::ROOT_CLUSTER_FAT32),
                last_sector: start + geo.cluster_to_sector(last_root_cluster) + spc - 1,
            };
        }

        // Past the last file's clusters: the unused tail of the data
        // region, contiguous out to the end of the partition. The router
        // only needs to know the range; `write_content_sectors` redoes
        // the file lookup itself at synthesis time regardless, since
        // other reads sharing this partition's one enumerator cursor may
        // have moved it since.
        let part = self.partitions[idx].as_mut().unwrap();
        let (enumerator, provider) = part.enumerator_and_provider();
        match enumerator.locate_cluster(provider, data_cluster) {
            Some((first, count)) if count > 0 => {
                let last_cluster = first + count - 1;
                RouteCache {
                    kind: SynthKind::Content { partition: idx },
                    first_sector: start + geo.cluster_to_sector(first),
                    last_sector: start + geo.cluster_to_sector(last_cluster) + spc - 1,
                }
            }
            _ => RouteCache {
                kind: SynthKind::Null,
                first_sector: sector,
                last_sector: start + geo.total_sectors() - 1,
            },
        }
    }

    fn synthesize(&mut self, kind: SynthKind, sector: u32, max_count: u32, buf: &mut [u8]) -> u32 {
        let ss = self.sector_size as usize;
        match kind {
            SynthKind::Mbr => {
                self.write_mbr(&mut buf[..ss]);
                1
            }
            SynthKind::Null => {
                let n = max_count as usize;
                buf[..n * ss].fill(0);
                max_count
            }
            SynthKind::Reserved { partition } => {
                let local = {
                    let part = self.partitions[partition].as_ref().unwrap();
                    sector - part.start_sector()
                };
                self.write_reserved_sector(partition, local, &mut buf[..ss]);
                1
            }
            SynthKind::Fat { partition } => {
                let part = self.partitions[partition].as_mut().unwrap();
                let geo = *part.geometry();
                let address_fat = geo.reserved_sector_count as u32;
                let local = sector - part.start_sector();
                let relative = (local - address_fat) % geo.sectors_per_fat;
                fat::write_fat_sector(part, &geo, relative, &mut buf[..ss]);
                1
            }
            SynthKind::Directory { partition } => {
                let part = self.partitions[partition].as_mut().unwrap();
                let geo = *part.geometry();
                let local = sector - part.start_sector();
                let entries_per_sector = (ss / crate::DIRENT_SIZE) as u64;
                let sector_within_root = (local - geo.first_root_dir_sector()) as u64;
                let first_entry_index = sector_within_root * entries_per_sector;
                dir::write_directory_sector(part, &geo, first_entry_index, &mut buf[..ss]);
                1
            }
            SynthKind::Content { partition } => {
                self.write_content_sectors(partition, sector, max_count, buf)
            }
        }
    }

    fn write_mbr(&self, buf: &mut [u8]) {
        let mut entries = [PartitionTableEntry {
            bootable: false,
            partition_type: 0,
            first_sector_lba: 0,
            sector_count: 0,
        }; MAX_PARTITIONS];
        for (i, slot) in self.partitions[..self.partition_count].iter().enumerate() {
            let part = slot.as_ref().unwrap();
            let geo = part.geometry();
            entries[i] = PartitionTableEntry {
                bootable: true,
                partition_type: mbr::partition_type_byte(geo.fat_type, geo.total_sectors()),
                first_sector_lba: part.start_sector(),
                sector_count: geo.total_sectors(),
            };
        }
        mbr::write_mbr(buf, &entries[..self.partition_count]);
    }

    fn write_reserved_sector(&self, partition: usize, local: u32, buf: &mut [u8]) {
        let part = self.partitions[partition].as_ref().unwrap();
        let geo = *part.geometry();
        let start_lba = part.start_sector();
        const VOLUME_LABEL: &str = "NO NAME";

        if !geo.fat_type.is_fat32() {
            if local == 0 {
                bpb::write_boot_sector(buf, &geo, start_lba, VOLUME_LABEL);
            } else {
                buf.fill(0);
            }
            return;
        }

        match local {
            0 | bpb::BACKUP_BOOT_SECTOR as u32 => {
                bpb::write_boot_sector(buf, &geo, start_lba, VOLUME_LABEL)
            }
            n if n == bpb::FSINFO_SECTOR as u32 || n == bpb::BACKUP_BOOT_SECTOR as u32 + 1 => {
                bpb::write_fsinfo(buf)
            }
            n if n == bpb::FSINFO_SECTOR as u32 + 1 || n == bpb::BACKUP_BOOT_SECTOR as u32 + 2 => {
                bpb::write_third_boot_sector(buf)
            }
            _ => buf.fill(0),
        }
    }

    fn write_content_sectors(
        &mut self,
        partition: usize,
        sector: u32,
        max_count: u32,
        buf: &mut [u8],
    ) -> u32 {
        let ss = self.sector_size as usize;
        let part = self.partitions[partition].as_mut().unwrap();
        let geo = *part.geometry();
        let start = part.start_sector();
        let local = sector - start;
        let address_data = geo.first_data_sector();
        let spc = geo.sectors_per_cluster as u32;
        let data_cluster = (local - address_data) / spc + 2;

        let (enumerator, provider) = part.enumerator_and_provider();
        let range = enumerator.locate_cluster(provider, data_cluster);
        let (first_cluster, num_clusters) = match range {
            Some((first, count)) if count > 0 => (first, count),
            _ => {
                buf[..ss].fill(0xFF);
                return 0;
            }
        };
        let info = match enumerator.current(provider) {
            Some(info) => info,
            None => {
                buf[..ss].fill(0xFF);
                return 0;
            }
        };
        let generator = match info.contents {
            Some(g) => g,
            None => {
                buf[..ss].fill(0xFF);
                return 0;
            }
        };

        let file_first_sector_local = geo.cluster_to_sector(first_cluster);
        let relative_sector = (local - file_first_sector_local) as u64;
        let remaining_in_file = (num_clusters * spc) as u64 - relative_sector;
        let capped = max_count.min(remaining_in_file as u32);

        let produced = generator.generate(relative_sector, capped, &mut buf[..capped as usize * ss]);
        if produced == 0 {
            log::warn!(
                "content generator for file id {} produced no data at relative sector {}",
                info.id,
                relative_sector
            );
            buf[..ss].fill(0xFF);
            0
        } else {
            produced.min(capped)
        }
    }
}
