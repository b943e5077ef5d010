//! Set-associative cache store.
//!
//! This module implements the tag/valid/data arrays shared by the
//! instruction and data cache controllers. It provides:
//! 1. **Lookup:** Non-mutating hit test decomposing an address into tag, set, and word.
//! 2. **Maintenance:** Line fill, invalidation, and whole-array flush.
//! 3. **Replacement:** Pseudo-LRU victim selection with per-set usage bits.
//! 4. **Write-through support:** Byte-enable merge of store data into a hit line.
//!
//! The arrays are flat `Vec`s indexed by `set * ways + way`; geometry is
//! fixed at construction and already validated, so no operation resizes or
//! reallocates anything.

/// Pseudo-LRU replacement state.
pub mod plru;

use crate::common::WORD_BYTES;
use crate::config::CacheGeometry;

pub use plru::Plru;

/// Result of a successful cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheHit {
    /// Way holding the matching line.
    pub way: usize,
    /// The addressed 32-bit word.
    pub data: u32,
}

/// One set-associative cache array (tags, valid bits, data, pseudo-LRU).
#[derive(Debug, Clone)]
pub struct CacheArray {
    sets: usize,
    ways: usize,
    words: usize,
    tags: Vec<u32>,
    valid: Vec<bool>,
    data: Vec<u32>,
    plru: Plru,
}

impl CacheArray {
    /// Creates a zeroed, all-invalid cache array.
    ///
    /// The geometry must already be validated (see
    /// [`crate::config::XcacheConfig::validate`]).
    pub fn new(geometry: &CacheGeometry) -> Self {
        let lines = geometry.sets * geometry.ways;
        Self {
            sets: geometry.sets,
            ways: geometry.ways,
            words: geometry.words,
            tags: vec![0; lines],
            valid: vec![false; lines],
            data: vec![0; lines * geometry.words],
            plru: Plru::new(geometry.sets, geometry.ways),
        }
    }

    /// Words per line.
    #[inline]
    pub fn words_per_line(&self) -> usize {
        self.words
    }

    /// Set index of `addr`.
    #[inline]
    pub fn set_of(&self, addr: u32) -> usize {
        (addr as usize / self.line_bytes()) % self.sets
    }

    /// Tag of `addr` (the address bits above set index and line offset).
    #[inline]
    pub fn tag_of(&self, addr: u32) -> u32 {
        addr / (self.line_bytes() * self.sets) as u32
    }

    /// Word index of `addr` within its line.
    #[inline]
    pub fn word_of(&self, addr: u32) -> usize {
        (addr / WORD_BYTES) as usize % self.words
    }

    /// First byte address of the line containing `addr`.
    #[inline]
    pub fn line_base(&self, addr: u32) -> u32 {
        addr & !(self.line_bytes() as u32 - 1)
    }

    #[inline]
    fn line_bytes(&self) -> usize {
        self.words * WORD_BYTES as usize
    }

    #[inline]
    fn line_index(&self, set: usize, way: usize) -> usize {
        set * self.ways + way
    }

    /// Scans the indexed set for a valid line with a matching tag.
    ///
    /// Pure probe: replacement state is not updated here. Callers that
    /// service the hit must follow up with [`CacheArray::touch`] (the
    /// combinational phase probes, the commit phase touches).
    pub fn lookup(&self, addr: u32) -> Option<CacheHit> {
        let set = self.set_of(addr);
        let tag = self.tag_of(addr);
        let word = self.word_of(addr);
        for way in 0..self.ways {
            let line = self.line_index(set, way);
            if self.valid[line] && self.tags[line] == tag {
                return Some(CacheHit {
                    way,
                    data: self.data[line * self.words + word],
                });
            }
        }
        None
    }

    /// Whether the line at `(set, way)` holds valid contents.
    #[inline]
    pub fn line_valid(&self, set: usize, way: usize) -> bool {
        self.valid[self.line_index(set, way)]
    }

    /// Marks `(set, way)` as most recently used.
    pub fn touch(&mut self, set: usize, way: usize) {
        self.plru.touch(set, way);
    }

    /// Returns the way the pseudo-LRU pattern designates as victim for `set`.
    #[inline]
    pub fn select_victim(&self, set: usize) -> usize {
        self.plru.victim(set)
    }

    /// Overwrites `(set_of(addr), way)` with a fresh line.
    ///
    /// `line` must hold exactly one line of words. The filled way becomes
    /// most recently used.
    pub fn fill(&mut self, addr: u32, way: usize, line: &[u32]) {
        debug_assert_eq!(line.len(), self.words);
        let set = self.set_of(addr);
        let index = self.line_index(set, way);
        self.tags[index] = self.tag_of(addr);
        self.valid[index] = true;
        self.data[index * self.words..(index + 1) * self.words].copy_from_slice(line);
        self.plru.touch(set, way);
    }

    /// Clears the valid bit of `(set, way)`.
    pub fn invalidate(&mut self, set: usize, way: usize) {
        let index = self.line_index(set, way);
        self.valid[index] = false;
    }

    /// Clears every valid bit and the replacement state.
    pub fn flush(&mut self) {
        self.valid.fill(false);
        self.plru.reset();
    }

    /// Merges store data into the word at `(set, way, word)` under a 4-bit
    /// byte enable, and marks the way most recently used.
    ///
    /// Write-through: this update is advisory; memory is the authority.
    pub fn write_word(&mut self, set: usize, way: usize, word: usize, data: u32, be: u8) {
        let index = self.line_index(set, way) * self.words + word;
        let mut mask = 0u32;
        for byte in 0..4 {
            if (be >> byte) & 1 == 1 {
                mask |= 0xFF << (byte * 8);
            }
        }
        self.data[index] = (self.data[index] & !mask) | (data & mask);
        self.plru.touch(set, way);
    }
}
