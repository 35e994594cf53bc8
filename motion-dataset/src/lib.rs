mod config;
mod dataloader;
mod datasets;
mod error;
pub mod transform;
pub use config::*;
pub use dataloader::*;
pub use datasets::*;
pub use error::*;

use std::sync::Arc;

/// An indexable source of samples.
///
/// `get` must return `Some` for every index below `len()` and `None` for every
/// index at or above it. Implementations backed by fallible storage should
/// degrade to a placeholder sample instead of returning `None` for an
/// in-range index, so that one bad record never ends a pass.
pub trait Dataset {
    type Item;

    /// Gets the item at the given index.
    fn get(&self, index: usize) -> Option<Self::Item>;

    /// Gets the number of items in the dataset.
    fn len(&self) -> usize;

    /// Checks if the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the dataset.
    fn iter(&self) -> DatasetIterator<'_, Self::Item>
    where
        Self: Sized,
    {
        DatasetIterator::new(self)
    }
}

impl<D> Dataset for Arc<D>
where
    D: Dataset + ?Sized,
{
    type Item = D::Item;

    fn get(&self, index: usize) -> Option<Self::Item> {
        self.as_ref().get(index)
    }

    fn len(&self) -> usize {
        self.as_ref().len()
    }
}

//===========================================================//
//                Iter
//===========================================================//

pub struct DatasetIterator<'a, I> {
    current: usize,
    dataset: &'a dyn Dataset<Item = I>,
}

impl<'a, I> DatasetIterator<'a, I> {
    /// Creates a new dataset iterator.
    pub fn new<D>(dataset: &'a D) -> Self
    where
        D: Dataset<Item = I>,
    {
        DatasetIterator {
            current: 0,
            dataset,
        }
    }
}

impl<I> Iterator for DatasetIterator<'_, I> {
    type Item = I;

    fn next(&mut self) -> Option<I> {
        let item = self.dataset.get(self.current)?;
        self.current += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.dataset.len().saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

//===========================================================//
//                Vec Dataset
//===========================================================//

/// A dataset holding all of its samples in memory.
#[derive(Debug, Clone, Default)]
pub struct VecDataset<I> {
    items: Vec<I>,
}

impl<I> VecDataset<I> {
    pub fn new(items: Vec<I>) -> Self {
        Self { items }
    }

    pub fn into_inner(self) -> Vec<I> {
        self.items
    }
}

impl<I> From<Vec<I>> for VecDataset<I> {
    fn from(items: Vec<I>) -> Self {
        Self::new(items)
    }
}

impl<I> FromIterator<I> for VecDataset<I> {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<I> Dataset for VecDataset<I>
where
    I: Clone,
{
    type Item = I;

    fn get(&self, index: usize) -> Option<I> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
