//! Row bands
//!
//! A band is the half-open row range `[from_y, to_y)` handed to one worker.
//! For `n` bands over `height` rows, band `i` covers
//! `[i * height / n, (i + 1) * height / n)`, so the bands tile `[0, height)`
//! with no gap and no overlap. When `height < n` some bands are empty.

use serde::Serialize;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Band {
    pub index: usize,
    pub from_y: usize,
    pub to_y: usize,
}

impl Band {
    /// Number of rows in the band
    pub fn len(&self) -> usize {
        self.to_y - self.from_y
    }

    pub fn is_empty(&self) -> bool {
        self.from_y == self.to_y
    }

    pub fn contains(&self, y: usize) -> bool {
        self.rows().contains(&y)
    }

    pub fn rows(&self) -> Range<usize> {
        self.from_y..self.to_y
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "band {} [{}, {})", self.index, self.from_y, self.to_y)
    }
}

/// Split `height` rows into `bands` contiguous bands (`0` is treated as `1`)
pub fn partition(height: usize, bands: usize) -> Vec<Band> {
    let n = bands.max(1);
    (0..n)
        .map(|i| Band {
            index: i,
            from_y: i * height / n,
            to_y: (i + 1) * height / n,
        })
        .collect()
}
