//! Fixed-size two-dimensional grid
//!
//! Cells are stored row-major in a single vector so a band of rows is one
//! contiguous slice.

use serde::de::Error as _;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::MapError;

/// Row-major grid of `height` rows by `width` columns
///
/// A grid with zero width always has zero height.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Grid with no rows that still remembers its width
    pub fn empty(width: usize) -> Self {
        Self {
            width,
            height: 0,
            cells: Vec::new(),
        }
    }

    /// Build a grid from rows, all of which must share a length
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, MapError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut cells = Vec::with_capacity(width * height);

        for (y, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(MapError::invalid_grid(format!(
                    "row {y} has {} cells, expected {width}",
                    row.len()
                )));
            }
            cells.extend(row);
        }

        if width == 0 {
            return Ok(Self::empty(0));
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Build a grid from row-major cells
    pub fn from_vec(width: usize, cells: Vec<T>) -> Result<Self, MapError> {
        if width == 0 {
            if !cells.is_empty() {
                return Err(MapError::invalid_grid(
                    "zero-width grid cannot hold cells",
                ));
            }
            return Ok(Self::empty(0));
        }
        if cells.len() % width != 0 {
            return Err(MapError::invalid_grid(format!(
                "{} cells do not divide into rows of {width}",
                cells.len()
            )));
        }
        Ok(Self {
            width,
            height: cells.len() / width,
            cells,
        })
    }

    /// Stitch together row blocks produced in band order
    pub(crate) fn from_row_blocks(width: usize, height: usize, blocks: Vec<Vec<T>>) -> Self {
        let mut cells = Vec::with_capacity(width * height);
        for block in blocks {
            cells.extend(block);
        }
        debug_assert_eq!(cells.len(), width * height);
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y * self.width + x)
    }

    /// Row `y` as a slice
    pub fn row(&self, y: usize) -> Option<&[T]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.width;
        Some(&self.cells[start..start + self.width])
    }

    /// Contiguous cells of rows `[from_y, to_y)`
    pub fn rows_range(&self, from_y: usize, to_y: usize) -> &[T] {
        let to_y = to_y.min(self.height);
        let from_y = from_y.min(to_y);
        &self.cells[from_y * self.width..to_y * self.width]
    }

    /// Iterate over rows in order
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks(0) panics, and a zero-width grid has no cells anyway
        self.cells.chunks(self.width.max(1))
    }

    /// Iterate over `(x, y, cell)`
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        let width = self.width.max(1);
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (i % width, i / width, cell))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    pub fn into_vec(self) -> Vec<T> {
        self.cells
    }
}

impl<T: Clone> Grid<T> {
    /// Grid with every cell set to `value`
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        if width == 0 {
            return Self::empty(0);
        }
        Self {
            width,
            height,
            cells: vec![value; width * height],
        }
    }

    pub fn into_rows(self) -> Vec<Vec<T>> {
        self.rows().map(<[T]>::to_vec).collect()
    }
}

impl<T: Serialize> Serialize for Grid<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.height))?;
        for row in self.rows() {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Grid<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let rows = Vec::<Vec<T>>::deserialize(deserializer)?;
        Grid::from_rows(rows).map_err(D::Error::custom)
    }
}
