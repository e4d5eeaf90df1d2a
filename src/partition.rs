//! One partition's geometry, provider, and enumeration cursor.
//!
//! A `Partition` owns no file data and no heap state: it is geometry (see
//! [`crate::bpb::Geometry`]) plus a borrowed [`FileProvider`] plus the one
//! [`FileEnumerator`] cursor that every FAT and directory sector synthesis
//! call shares. Nothing here is `Send`/`Sync` on its own — callers that
//! need that get it from [`crate::adapter::DriveRegistry`], which wraps a
//! whole [`crate::disk::Disk`] in a lock.

use crate::bpb::Geometry;
use crate::enumerator::FileEnumerator;
use crate::provider::FileProvider;

pub struct Partition<'a> {
    geometry: Geometry,
    start_sector: u32,
    provider: &'a dyn FileProvider,
    enumerator: FileEnumerator,
}

impl<'a> Partition<'a> {
    pub fn new(geometry: Geometry, start_sector: u32, provider: &'a dyn FileProvider) -> Self {
        let cluster_bytes = geometry.bytes_per_sector as u32 * geometry.sectors_per_cluster as u32;
        let first_file_cluster = geometry.first_file_data_cluster();
        Partition {
            geometry,
            start_sector,
            provider,
            enumerator: FileEnumerator::new(cluster_bytes, first_file_cluster),
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn start_sector(&self) -> u32 {
        self.start_sector
    }

    pub fn sector_count(&self) -> u32 {
        self.geometry.total_sectors()
    }

    pub fn end_sector(&self) -> u32 {
        self.start_sector + self.sector_count()
    }

    /// Borrow the enumerator and the provider it walks at the same time —
    /// every FAT/directory synthesizer call needs both, and the borrow
    /// checker can't see that splitting `&mut self` into two fields is
    /// safe unless it's done explicitly like this.
    pub fn enumerator_and_provider(&mut self) -> (&mut FileEnumerator, &'a dyn FileProvider) {
        (&mut self.enumerator, self.provider)
    }
}
