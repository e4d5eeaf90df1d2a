//! The caller-supplied collaborators: a file provider and content generator.
//!
//! Every file a synthesized partition exposes comes from two traits the
//! host implements: [`FileProvider`] answers "what is file N" and the
//! [`ContentGenerator`] it hands back for a given file answers "what bytes
//! does sector K of that file's data hold". Neither is owned by this
//! crate's types — a [`crate::partition::Partition`] only ever borrows a
//! `&dyn FileProvider` for as long as it lives.

use crate::PackedDateTime;

/// Produces [`FileInfo`] for a dense, zero-based id space. Id 0 is the
/// first file in the root directory, id 1 the second, and so on; a
/// provider with `n` files answers `Some` for `0..n` and `None` for `n`
/// and above. The id space has no gaps — a provider that wants to model a
/// deleted file simply shrinks, it does not return `None` for a middle id.
pub trait FileProvider {
    /// Look up file `id`. Returns `None` once `id` is past the last file;
    /// the [`crate::enumerator::FileEnumerator`] relies on this boundary to
    /// know when the root directory ends.
    fn file_info(&self, id: u64) -> Option<FileInfo<'_>>;
}

/// Everything needed to synthesize one root-directory entry and, if the
/// file has content, to answer reads against it.
#[derive(Clone, Copy)]
pub struct FileInfo<'a> {
    pub id: u64,
    /// An 8.3-shaped name such as `"readme.txt"` or `"data"` (no
    /// extension). Case is irrelevant — the directory synthesizer
    /// uppercases it. Longer names, embedded dots beyond the first, or
    /// non-ASCII bytes are a caller bug; see [`crate::dir::format_short_name`].
    pub filename: &'a str,
    pub size: u64,
    pub attributes: u8,
    pub created: PackedDateTime,
    pub modified: PackedDateTime,
    pub accessed: PackedDateTime,
    /// `None` means a zero-length file (first cluster field stays 0, no
    /// cluster chain is ever walked for it). `Some` must be present
    /// whenever `size > 0`.
    pub contents: Option<&'a dyn ContentGenerator>,
}

impl<'a> FileInfo<'a> {
    pub fn is_directory(&self) -> bool {
        self.attributes & crate::ATTR_DIRECTORY != 0
    }
}

/// Produces the bytes of one file's data, one synthesizer call at a time.
///
/// `sector` is relative to the start of the file's own data (sector 0 is
/// the file's first byte), not an absolute disk sector. A generator may
/// produce fewer than `max_count` sectors — the router will call it again
/// at the next sector to pick up where it left off — and a generator that
/// produces 0 is treated by [`crate::disk::Disk::read_sectors`] as "this
/// sector is unavailable", filled with `0xFF` rather than failing the read.
pub trait ContentGenerator {
    fn generate(&self, sector: u64, max_count: u32, buf: &mut [u8]) -> u32;
}

/// A [`ContentGenerator`] that always reports failure; useful for testing
/// the `0xFF` fallback path and for callers that advertise a file's size
/// without yet having bytes to back it.
pub struct NeverGenerator;

impl ContentGenerator for NeverGenerator {
    fn generate(&self, _sector: u64, _max_count: u32, _buf: &mut [u8]) -> u32 {
        0
    }
}

/// A [`ContentGenerator`] that repeats a fixed byte pattern, useful for
/// tests and for degenerate "all files read as zeros" providers.
pub struct FillGenerator(pub u8);

impl ContentGenerator for FillGenerator {
    fn generate(&self, _sector: u64, max_count: u32, buf: &mut [u8]) -> u32 {
        for b in buf.iter_mut() {
            *b = self.0;
        }
        max_count
    }
}
