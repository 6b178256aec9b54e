//! Marker dictionaries and code matching.
//!
//! A dictionary is a fixed table of square binary patterns, one `u64` code
//! per marker id. Bits are stored row-major over the data grid with
//! **black = 1**; the least significant bit is the top-left cell. The
//! printed marker wraps the data grid in a one-cell black border, so a
//! 4×4 dictionary prints as a 6×6 cell pattern.

use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("unknown dictionary '{0}'")]
    UnknownName(String),
}

/// A fixed marker dictionary.
#[derive(Clone, Copy, Debug)]
pub struct Dictionary {
    /// Name used in CLIs and config files.
    pub name: &'static str,
    /// Data-grid side length in bits.
    pub dim: usize,
    /// Bit errors the code spacing of this table can safely correct.
    pub max_correction_bits: u8,
    /// One code per marker id.
    pub codes: &'static [u64],
}

impl Dictionary {
    /// Look up a builtin dictionary by name.
    pub fn builtin(name: &str) -> Result<Dictionary, DictionaryError> {
        match name {
            "4x4_50" => Ok(DICT_4X4_50),
            "4x4_100" => Ok(DICT_4X4_100),
            _ => Err(DictionaryError::UnknownName(name.to_string())),
        }
    }

    /// Names accepted by [`Dictionary::builtin`].
    pub fn builtin_names() -> &'static [&'static str] {
        &["4x4_50", "4x4_100"]
    }

    /// Number of marker ids in the dictionary.
    #[inline]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Total data bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.dim * self.dim
    }

    /// Code for a marker id, if the id is in range.
    #[inline]
    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Whether data cell (x, y) of `code` is black.
    #[inline]
    pub fn bit(&self, code: u64, x: usize, y: usize) -> bool {
        (code >> (y * self.dim + x)) & 1 == 1
    }
}

/// Rotate a row-major code 90° clockwise `rot` times.
pub fn rotate_code(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    #[inline]
    fn get(code: u64, idx: usize) -> u64 {
        (code >> idx) & 1
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                0 => (x, y),
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            let sidx = sy * n + sx;
            let didx = y * n + x;
            out |= get(code, sidx) << didx;
        }
    }
    out
}

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CodeMatch {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that `observed == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance after rotation.
    pub hamming: u8,
}

/// Matcher over a fixed dictionary.
///
/// Pre-computes all four rotations of every code and searches them brute
/// force; for tables of 50-250 codes that beats any lookup structure worth
/// maintaining.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    /// Build a matcher allowing up to `max_hamming` bit errors.
    ///
    /// The threshold clamps to the dictionary's own correction capacity;
    /// a looser threshold than the code spacing supports would make
    /// distinct ids ambiguous.
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        assert!(dict.bit_count() <= 64, "dictionary exceeds u64 code storage");

        let effective = max_hamming.min(dict.max_correction_bits);
        if effective < max_hamming {
            debug!(
                "clamping max hamming {} to {} for {}",
                max_hamming, effective, dict.name
            );
        }

        let mut rotated = Vec::with_capacity(dict.codes.len());
        for &base in dict.codes {
            rotated.push([
                rotate_code(base, dict.dim, 0),
                rotate_code(base, dict.dim, 1),
                rotate_code(base, dict.dim, 2),
                rotate_code(base, dict.dim, 3),
            ]);
        }

        Self {
            dict,
            max_hamming: effective,
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> Dictionary {
        self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Best match for an observed code within `max_hamming`.
    pub fn match_code(&self, observed: u64) -> Option<CodeMatch> {
        let mut best: Option<CodeMatch> = None;

        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                let m = CodeMatch {
                    id: id as u32,
                    rotation: rot as u8,
                    hamming: h,
                };
                if best.map_or(true, |prev| m.hamming < prev.hamming) {
                    best = Some(m);
                    if h == 0 {
                        return best;
                    }
                }
            }
        }

        best
    }
}

/// ArUco 4x4_50 code table.
#[rustfmt::skip]
pub const DICT_4X4_50_CODES: [u64; 50] = [
    0x4cad, 0x59f0, 0xb4cc, 0x6299,
    0x792a, 0xb39e, 0x7479, 0x4f23,
    0x5b7f, 0x6af3, 0x899f, 0xe588,
    0xed70, 0xf054, 0x8d24, 0x7c64,
    0xa662, 0x0066, 0x7a36, 0xf56e,
    0xd161, 0xd40d, 0xab33, 0x41bb,
    0xe27f, 0x8e29, 0x2735, 0x2aa5,
    0xc484, 0xf62c, 0xa822, 0x4dea,
    0xf379, 0xd30f, 0x7510, 0x9490,
    0xae18, 0xff20, 0x6fb0, 0x5a38,
    0x18e8, 0x1454, 0x314c, 0x4d1c,
    0x1724, 0xd774, 0xfcb4, 0x26d2,
    0x740a, 0xc80a,
];

/// ArUco 4x4_100 code table; the first 50 ids coincide with 4x4_50.
#[rustfmt::skip]
pub const DICT_4X4_100_CODES: [u64; 100] = [
    0x4cad, 0x59f0, 0xb4cc, 0x6299,
    0x792a, 0xb39e, 0x7479, 0x4f23,
    0x5b7f, 0x6af3, 0x899f, 0xe588,
    0xed70, 0xf054, 0x8d24, 0x7c64,
    0xa662, 0x0066, 0x7a36, 0xf56e,
    0xd161, 0xd40d, 0xab33, 0x41bb,
    0xe27f, 0x8e29, 0x2735, 0x2aa5,
    0xc484, 0xf62c, 0xa822, 0x4dea,
    0xf379, 0xd30f, 0x7510, 0x9490,
    0xae18, 0xff20, 0x6fb0, 0x5a38,
    0x18e8, 0x1454, 0x314c, 0x4d1c,
    0x1724, 0xd774, 0xfcb4, 0x26d2,
    0x740a, 0xc80a, 0x298a, 0x16aa,
    0x82ba, 0xe9fa, 0x8016, 0xe616,
    0x2486, 0x9786, 0x48d6, 0xa7f6,
    0xfbe6, 0xd87e, 0x0501, 0x22c1,
    0x45d1, 0x5ec9, 0x3621, 0x54a1,
    0x39a1, 0x9139, 0x85f9, 0x3edd,
    0x203d, 0xda6d, 0x13fd, 0xd5ed,
    0xf853, 0x4693, 0x1a9b, 0xabcb,
    0x1933, 0x05e3, 0xeca3, 0xba97,
    0xa49f, 0xdddf, 0x5477, 0xb2ef,
    0xaeac, 0xb551, 0xe86e, 0xf350,
    0xd260, 0x83b4, 0x1b92, 0x2fc2,
    0x6cf2, 0xcbf2, 0x2796, 0xe30e,
];

pub const DICT_4X4_50: Dictionary = Dictionary {
    name: "4x4_50",
    dim: 4,
    max_correction_bits: 1,
    codes: &DICT_4X4_50_CODES,
};

pub const DICT_4X4_100: Dictionary = Dictionary {
    name: "4x4_100",
    dim: 4,
    max_correction_bits: 1,
    codes: &DICT_4X4_100_CODES,
};
