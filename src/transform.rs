//! Transform composition
//!
//! [`LatentGrid`] queues cell transforms and runs them all in a single
//! parallel pass, so a chain of N operations costs one traversal instead of N.

use std::convert::Infallible;
use std::sync::Arc;

use crate::error::MapError;
use crate::grid::Grid;
use crate::parallel::{BandMapper, Interrupter, ProgressFn};

/// Shareable cell transform
pub type CellOp<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;

/// `x -> second(first(x))`
pub fn compose<T, F, G>(first: F, second: G) -> impl Fn(&T) -> T + Send + Sync
where
    F: Fn(&T) -> T + Send + Sync,
    G: Fn(&T) -> T + Send + Sync,
{
    move |x| second(&first(x))
}

/// Apply `ops` left to right; an empty chain clones the input
pub fn apply_chain<T: Clone>(ops: &[CellOp<T>], cell: &T) -> T {
    match ops.split_first() {
        None => cell.clone(),
        Some((head, rest)) => rest.iter().fold(head(cell), |acc, op| op(&acc)),
    }
}

/// Grid with transforms queued but not yet applied
pub struct LatentGrid<T> {
    source: Arc<Grid<T>>,
    pending: Vec<CellOp<T>>,
}

impl<T> LatentGrid<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(grid: impl Into<Arc<Grid<T>>>) -> Self {
        Self {
            source: grid.into(),
            pending: Vec::new(),
        }
    }

    /// Queue `f` after every transform already queued
    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        self.pending.push(Arc::new(f));
        self
    }

    /// Queue an already shared transform
    pub fn transform_shared(mut self, op: CellOp<T>) -> Self {
        self.pending.push(op);
        self
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Run every queued transform in one pass over the grid
    pub fn to_grid(&self, mapper: &BandMapper) -> Result<Grid<T>, MapError> {
        self.to_grid_with(mapper, &Interrupter::new(), None)
    }

    /// Same as [`LatentGrid::to_grid`], interruptible and with band progress
    pub fn to_grid_with(
        &self,
        mapper: &BandMapper,
        interrupter: &Interrupter,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<Grid<T>, MapError> {
        let ops: Arc<[CellOp<T>]> = self.pending.clone().into();
        tracing::debug!("applying {} queued transforms", ops.len());
        mapper.try_map_with(
            self.source.clone(),
            move |cell| Ok::<T, Infallible>(apply_chain(&ops, cell)),
            interrupter,
            progress,
        )
    }
}
