//! Directory entry synthesis: turning a provider's file list into 32-byte
//! short directory entries, one root-directory sector at a time.
//!
//! This crate never emits long-filename entries (see the crate's
//! Non-goals) — every file is represented by exactly one short entry, so
//! entry index and file id are the same number, and `root_dir_entries *
//! 32` is the only capacity this crate's root directory ever needs.

use crate::bpb::Geometry;
use crate::partition::Partition;
use crate::{write_u16_le, write_u32_le, DIRENT_SIZE};

/// Characters the FAT spec forbids anywhere in `DIR_Name`.
const ILLEGAL_NAME_CHARS: &[char] = &[
    '"', '*', '+', ',', '.', '/', ':', ';', '<', '=', '>', '?', '[', '\\', ']', '|',
];

/// Whether `name` (without its extension separator already split out, so
/// callers pass the base and extension independently) is short enough and
/// free of characters the FAT spec forbids in `DIR_Name`.
fn is_valid_name_part(part: &str, max_len: usize) -> bool {
    part.is_ascii()
        && part.len() <= max_len
        && !part.is_empty()
        && !part.chars().any(|c| ILLEGAL_NAME_CHARS.contains(&c) || (c as u32) < 0x20)
}

/// Splits `"readme.txt"` into 8.3 name bytes, uppercased and space-padded.
/// A name with no `.` is treated as having an empty extension. Returns
/// `false` if the name doesn't fit an 8.3 short name at all — the caller
/// (the directory synthesizer) logs and skips such an entry rather than
/// corrupting the directory with a truncated name.
pub fn format_short_name(name: &str, out: &mut [u8; 11]) -> bool {
    let (base, ext) = match name.find('.') {
        Some(i) => (&name[..i], &name[i + 1..]),
        None => (name, ""),
    };
    if !is_valid_name_part(base, 8) || (!ext.is_empty() && !is_valid_name_part(ext, 3)) {
        return false;
    }
    out.fill(b' ');
    for (i, b) in base.bytes().enumerate() {
        out[i] = b.to_ascii_uppercase();
    }
    for (i, b) in ext.bytes().enumerate() {
        out[8 + i] = b.to_ascii_uppercase();
    }
    true
}

const ENTRY_OFFSET_NAME: usize = 0;
const ENTRY_OFFSET_ATTR: usize = 11;
const ENTRY_OFFSET_CRT_TIME_TENTH: usize = 13;
const ENTRY_OFFSET_CRT_TIME: usize = 14;
const ENTRY_OFFSET_CRT_DATE: usize = 16;
const ENTRY_OFFSET_LST_ACC_DATE: usize = 18;
const ENTRY_OFFSET_FST_CLUS_HI: usize = 20;
const ENTRY_OFFSET_WRT_TIME: usize = 22;
const ENTRY_OFFSET_WRT_DATE: usize = 24;
const ENTRY_OFFSET_FST_CLUS_LO: usize = 26;
const ENTRY_OFFSET_FILE_SIZE: usize = 28;

fn write_entry(buf: &mut [u8], first_cluster: u32, info: &crate::provider::FileInfo<'_>) {
    let mut name = [b' '; 11];
    if !format_short_name(info.filename, &mut name) {
        log::warn!("file id {} has an unrepresentable 8.3 name, writing as blank", info.id);
    }
    buf[ENTRY_OFFSET_NAME..ENTRY_OFFSET_NAME + 11].copy_from_slice(&name);
    buf[ENTRY_OFFSET_ATTR] = info.attributes;
    buf[ENTRY_OFFSET_CRT_TIME_TENTH] = info.created.to_fat_time_tenth();
    write_u16_le(buf, ENTRY_OFFSET_CRT_TIME, info.created.to_fat_time());
    write_u16_le(buf, ENTRY_OFFSET_CRT_DATE, info.created.to_fat_date());
    write_u16_le(buf, ENTRY_OFFSET_LST_ACC_DATE, info.accessed.to_fat_date());
    write_u16_le(buf, ENTRY_OFFSET_FST_CLUS_HI, (first_cluster >> 16) as u16);
    write_u16_le(buf, ENTRY_OFFSET_WRT_TIME, info.modified.to_fat_time());
    write_u16_le(buf, ENTRY_OFFSET_WRT_DATE, info.modified.to_fat_date());
    write_u16_le(buf, ENTRY_OFFSET_FST_CLUS_LO, first_cluster as u16);
    write_u32_le(buf, ENTRY_OFFSET_FILE_SIZE, info.size as u32);
}

/// Fills one root-directory sector starting at entry `first_entry_index`
/// (entry 0 is the first 32 bytes of the root directory). Once the
/// provider's id space runs out, the rest of the sector — and, by
/// implication, every later directory sector — is left zeroed, which is
/// exactly the `DIR_Name[0] == 0x00` "no more entries" marker.
pub fn write_directory_sector(
    partition: &mut Partition,
    geo: &Geometry,
    first_entry_index: u64,
    buf: &mut [u8],
) {
    for b in buf.iter_mut() {
        *b = 0;
    }
    let entries_per_sector = (buf.len() / DIRENT_SIZE) as u64;
    for slot in 0..entries_per_sector {
        let entry_index = first_entry_index + slot;
        let id = entry_index; // one short entry per file, no LFN entries
        let (enumerator, provider) = partition.enumerator_and_provider();
        if !enumerator.seek_id(provider, id) {
            // DIR_Name[0] == 0x00 already satisfied by the zero-fill above.
            break;
        }
        let range = enumerator.current_range();
        let info = enumerator
            .current(provider)
            .expect("seek_id just confirmed this id exists");
        let first_cluster = range
            .map(|(first, count)| if count == 0 { 0 } else { first })
            .unwrap_or(0);
        let entry_buf = &mut buf[(slot as usize) * DIRENT_SIZE..(slot as usize + 1) * DIRENT_SIZE];
        write_entry(entry_buf, first_cluster, &info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_base_and_extension_uppercased_and_padded() {
        let mut out = [0u8; 11];
        assert!(format_short_name("readme.txt", &mut out));
        assert_eq!(&out, b"README  TXT");
    }

    #[test]
    fn name_without_extension_pads_extension_with_spaces() {
        let mut out = [0u8; 11];
        assert!(format_short_name("data", &mut out));
        assert_eq!(&out, b"DATA       ");
    }

    #[test]
    fn rejects_name_too_long_for_8dot3() {
        let mut out = [0u8; 11];
        assert!(!format_short_name("averylongname.txt", &mut out));
    }

    #[test]
    fn rejects_illegal_characters() {
        let mut out = [0u8; 11];
        assert!(!format_short_name("a?b.txt", &mut out));
    }
}
