//! # Geohash Codec
//!
//! Places are deduplicated by the geohash of their coordinates: two photos taken a
//! few hundred meters apart should land on the same [`crate::model::Place`].
//!
//! ## Encoding
//!
//! The world is bisected repeatedly, alternating between longitude (even bit
//! index) and latitude (odd bit index). Each bisection contributes one bit: `1`
//! when the point lies in the upper half. Every 5 bits are emitted as one
//! character of the base-32 alphabet:
//!
//! ```text
//! 0123456789bcdefghjkmnpqrstuvwxyz      (no a, i, l, o)
//! ```
//!
//! Shorter hashes denote larger cells. A hash is a prefix of every longer hash
//! of the same point.
//!
//! | Length | Cell at equator      |
//! |--------|----------------------|
//! | 5      | ~4.9 km × 4.9 km     |
//! | 8      | ~38 m × 19 m         |
//!
//! [`PLACE_PRECISION`] (5) is intentionally coarse so nearby photo locations
//! merge into one place.
//!
//! ## Decoding
//!
//! [`decode`] returns the center of the cell, [`decode_bounds`] the cell itself.
//! Characters outside the alphabet fail with [`TokiError::Decode`].

use crate::error::{Result, TokiError};

/// Geohash length used as the place deduplication key.
pub const PLACE_PRECISION: usize = 5;

const ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Rectangular cell covered by a geohash.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl Bounds {
    fn world() -> Self {
        Self {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Half of the cell height and width, in degrees: the worst-case error of [`decode`].
    pub fn half_extent(&self) -> (f64, f64) {
        (
            (self.max_lat - self.min_lat) / 2.0,
            (self.max_lon - self.min_lon) / 2.0,
        )
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lon >= self.min_lon && lon <= self.max_lon
    }
}

/// Encode a coordinate into a geohash of exactly `length` characters.
///
/// Callers are expected to pass coordinates within ±90 / ±180; values outside
/// saturate into the edge cells.
pub fn encode(lat: f64, lon: f64, length: usize) -> String {
    let mut bounds = Bounds::world();
    let mut out = String::with_capacity(length);
    let mut even = true;
    let mut bits = 0u8;
    let mut ch = 0usize;

    while out.len() < length {
        if even {
            let mid = (bounds.min_lon + bounds.max_lon) / 2.0;
            if lon >= mid {
                ch = (ch << 1) | 1;
                bounds.min_lon = mid;
            } else {
                ch <<= 1;
                bounds.max_lon = mid;
            }
        } else {
            let mid = (bounds.min_lat + bounds.max_lat) / 2.0;
            if lat >= mid {
                ch = (ch << 1) | 1;
                bounds.min_lat = mid;
            } else {
                ch <<= 1;
                bounds.max_lat = mid;
            }
        }
        even = !even;
        bits += 1;

        if bits == 5 {
            out.push(ALPHABET[ch] as char);
            bits = 0;
            ch = 0;
        }
    }

    out
}

/// Decode a geohash to the center of its cell as `(lat, lon)`.
pub fn decode(hash: &str) -> Result<(f64, f64)> {
    Ok(decode_bounds(hash)?.center())
}

/// Decode a geohash to the cell it denotes.
pub fn decode_bounds(hash: &str) -> Result<Bounds> {
    let mut bounds = Bounds::world();
    let mut even = true;

    for (position, ch) in hash.chars().enumerate() {
        let value = index_of(ch).ok_or_else(|| TokiError::Decode {
            hash: hash.to_string(),
            position,
            ch,
        })?;

        for shift in (0..5).rev() {
            let bit = (value >> shift) & 1 == 1;
            if even {
                let mid = (bounds.min_lon + bounds.max_lon) / 2.0;
                if bit {
                    bounds.min_lon = mid;
                } else {
                    bounds.max_lon = mid;
                }
            } else {
                let mid = (bounds.min_lat + bounds.max_lat) / 2.0;
                if bit {
                    bounds.min_lat = mid;
                } else {
                    bounds.max_lat = mid;
                }
            }
            even = !even;
        }
    }

    Ok(bounds)
}

fn index_of(ch: char) -> Option<usize> {
    if !ch.is_ascii() {
        return None;
    }
    ALPHABET.iter().position(|&b| b == ch as u8)
}
