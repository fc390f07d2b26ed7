//! # Sector Map
//!
//! The free-space index of a region file: one bit per sector, set when the sector
//! belongs to the header or to a chunk.
//!
//! The bit set is allocated once at `MAX_SECTOR_COUNT` bits and never reallocated.
//! `len` is the number of sectors the file currently spans; every bit at or past
//! `len` is clear.

use bitvec::prelude::*;
use log::error;

use super::{Section, HEADER_SECTORS, MAX_SECTOR_COUNT};

/// Per-sector occupancy of one region file.
pub struct SectorMap {
    bits: BitVec,
    len: usize,
}

impl SectorMap {
    /// Creates a map for a file spanning `len` sectors with only the header filled.
    ///
    /// `len` is clamped to `HEADER_SECTORS..=MAX_SECTOR_COUNT`.
    pub fn new(len: usize) -> Self {
        let mut bits = bitvec![0; MAX_SECTOR_COUNT];
        bits[..HEADER_SECTORS].fill(true);
        SectorMap {
            bits,
            len: len.clamp(HEADER_SECTORS, MAX_SECTOR_COUNT),
        }
    }

    /// Number of sectors the file spans.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: the header sectors are part of every map.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `sector` is in use. Sectors past the end of the file are free.
    pub fn is_filled(&self, sector: usize) -> bool {
        sector < self.len && self.bits[sector]
    }

    /// Whether any sector of `section` inside the file is already in use.
    pub fn overlaps(&self, section: Section) -> bool {
        let end = section.end().min(self.len);
        section.start < end && self.bits[section.start..end].any()
    }

    /// Extends the file length to `len` sectors. The new sectors are free.
    pub fn grow_to(&mut self, len: usize) {
        if len > self.len {
            self.len = len.min(MAX_SECTOR_COUNT);
        }
    }

    /// Marks every sector of `section` as filled, growing the file if needed.
    ///
    /// The caller checks `section.end() <= MAX_SECTOR_COUNT` first.
    pub fn fill(&mut self, section: Section) {
        self.grow_to(section.end());
        let end = section.end().min(self.len);
        for sector in section.start..end {
            if self.bits[sector] {
                error!("sector {} already filled, possible chunk overlap", sector);
            }
        }
        self.bits[section.start..end].fill(true);
    }

    /// Marks every sector of `section` inside the file as free.
    pub fn free(&mut self, section: Section) {
        let end = section.end().min(self.len);
        if section.start < end {
            self.bits[section.start..end].fill(false);
        }
    }

    /// Finds a start sector for a chunk needing `required` sectors.
    ///
    /// Scans runs of free sectors from the first data sector. A run qualifies when it
    /// holds at least `required` sectors; among qualifying runs the shortest one wins,
    /// the earliest on ties, and an exact fit ends the scan. With no qualifying run the
    /// chunk goes at the end of the file.
    ///
    /// The run touching the end of the file counts like any other, so sectors freed
    /// at the tail, such as those given back by a chunk that shrank in place, are
    /// reused before the file grows.
    pub fn find_free_run(&self, required: usize) -> usize {
        let mut best: Option<Section> = None;
        let mut run = Section::new(HEADER_SECTORS, 0);

        for sector in HEADER_SECTORS..=self.len {
            let filled = sector == self.len || self.bits[sector];
            if !filled {
                if run.count == 0 {
                    run.start = sector;
                }
                run.count += 1;
                continue;
            }

            if run.count >= required && best.map_or(true, |b| run.count < b.count) {
                best = Some(run);
                if run.count == required {
                    break;
                }
            }
            run.count = 0;
        }

        best.map_or(self.len, |section| section.start)
    }

    /// Number of filled and free sectors past the header.
    pub fn usage(&self) -> (usize, usize) {
        let filled = self.bits[HEADER_SECTORS..self.len].count_ones();
        (filled, self.len - HEADER_SECTORS - filled)
    }

    /// Renders the map 32 sectors per line, prefixed with the first sector in hex.
    pub fn rows(&self) -> Vec<String> {
        self.bits[..self.len]
            .chunks(32)
            .enumerate()
            .map(|(row, bits)| {
                let mut line = format!("{:04x}:", row * 32);
                line.extend(bits.iter().map(|bit| if *bit { '1' } else { '0' }));
                line
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(len: usize, filled: &[Section]) -> SectorMap {
        let mut map = SectorMap::new(len);
        for section in filled {
            map.fill(*section);
        }
        map
    }

    #[test]
    fn fresh_map_reserves_header() {
        let map = SectorMap::new(2);
        assert!(map.is_filled(0));
        assert!(map.is_filled(1));
        assert!(!map.is_filled(2));
        assert_eq!(map.find_free_run(1), 2);
    }

    #[test]
    fn prefers_closest_fitting_run() {
        // free runs: [2..6) len 4, [7..9) len 2, [10..13) len 3
        let map = map_with(14, &[Section::new(6, 1), Section::new(9, 1), Section::new(13, 1)]);
        assert_eq!(map.find_free_run(2), 7);
        assert_eq!(map.find_free_run(3), 10);
        assert_eq!(map.find_free_run(4), 2);
    }

    #[test]
    fn earliest_run_wins_ties() {
        let map = map_with(10, &[Section::new(5, 1), Section::new(9, 1)]);
        // free runs [2..5) and [6..9), both three long
        assert_eq!(map.find_free_run(2), 2);
    }

    #[test]
    fn appends_when_no_run_fits() {
        let map = map_with(8, &[Section::new(2, 2), Section::new(5, 3)]);
        assert_eq!(map.find_free_run(2), 8);
    }

    #[test]
    fn trailing_run_is_a_candidate() {
        let map = map_with(8, &[Section::new(2, 2)]);
        assert_eq!(map.find_free_run(3), 4);
        assert_eq!(map.find_free_run(5), 8);
    }

    #[test]
    fn fill_grows_and_free_releases() {
        let mut map = SectorMap::new(2);
        map.fill(Section::new(2, 3));
        assert_eq!(map.len(), 5);
        assert_eq!(map.usage(), (3, 0));

        map.free(Section::new(2, 3));
        assert_eq!(map.usage(), (0, 3));
        assert!(!map.overlaps(Section::new(2, 3)));
    }

    #[test]
    fn overlap_ignores_sectors_past_end() {
        let map = map_with(4, &[Section::new(2, 2)]);
        assert!(map.overlaps(Section::new(3, 4)));
        assert!(!map.overlaps(Section::new(4, 4)));
        assert!(map.overlaps(Section::new(0, 1)));
    }

    #[test]
    fn rows_render_occupancy() {
        let map = map_with(4, &[Section::new(3, 1)]);
        assert_eq!(map.rows(), vec!["0000:1101".to_string()]);
    }
}
