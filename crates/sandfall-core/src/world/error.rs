//! World-level error types

use std::collections::TryReserveError;
use thiserror::Error;

/// Failures surfaced to whoever bootstraps or persists a world.
///
/// Grid-level problems (out-of-bounds access, stalled chunks) are handled
/// locally and never produce one of these.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("invalid grid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("failed to allocate {layer} buffer of {cells} cells")]
    Allocation {
        layer: &'static str,
        cells: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("persistence failure: {0:#}")]
    Persistence(anyhow::Error),
}

impl From<anyhow::Error> for WorldError {
    fn from(err: anyhow::Error) -> Self {
        WorldError::Persistence(err)
    }
}

/// Allocate a buffer of `cells` copies of `value`, reporting allocation
/// failure instead of aborting.
pub(crate) fn try_alloc<T: Clone>(
    layer: &'static str,
    cells: usize,
    value: T,
) -> Result<Vec<T>, WorldError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(cells)
        .map_err(|source| WorldError::Allocation {
            layer,
            cells,
            source,
        })?;
    buffer.resize(cells, value);
    Ok(buffer)
}
