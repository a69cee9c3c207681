//! Splitting a bucket's operations into bounded add-operations requests.
//!
//! Each batch remembers its offset into the full operation list so that
//! per-request partial-failure indices can be mapped back to the bucket.

use crate::error::AppError;

/// Limits applied to a single add-operations request.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    /// Maximum operations per request.
    pub max_items: usize,
}

impl BatchConfig {
    pub fn new(max_items: usize) -> Result<Self, AppError> {
        if max_items == 0 {
            return Err(AppError::Config("batch size must be greater than 0".into()));
        }
        Ok(Self { max_items })
    }
}

/// One request's worth of operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a, T> {
    /// Index of `items[0]` in the full list.
    pub offset: usize,
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maps a per-request operation index to its index in the full list.
    pub fn global_index(&self, local: usize) -> usize {
        self.offset + local
    }
}

/// Splits `items` into consecutive batches of at most `config.max_items`.
///
/// An empty slice yields no batches; the last batch may be short.
pub fn split<'a, T>(items: &'a [T], config: BatchConfig) -> Vec<Batch<'a, T>> {
    items
        .chunks(config.max_items)
        .enumerate()
        .map(|(i, chunk)| Batch {
            offset: i * config.max_items,
            items: chunk,
        })
        .collect()
}
