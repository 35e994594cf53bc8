use std::marker::PhantomData;
use crate::Dataset;

/// A per-sample transformation applied lazily by [`MapDataset`].
pub trait Map {
    type Item;
    type Output;
    fn map(&self, item: Self::Item) -> Self::Output;
}

/// Adapts a closure into a [`Map`].
pub struct MapFn<F, I> {
    f: F,
    input: PhantomData<fn(I)>,
}

impl<F, I, O> MapFn<F, I>
where
    F: Fn(I) -> O,
{
    pub fn new(f: F) -> Self {
        Self { f, input: PhantomData }
    }
}

impl<F, I, O> Map for MapFn<F, I>
where
    F: Fn(I) -> O,
{
    type Item = I;
    type Output = O;

    fn map(&self, item: I) -> O {
        (self.f)(item)
    }
}

/// A dataset whose samples are produced by mapping another dataset's samples.
///
/// Mapping happens on `get`, so expensive work such as decoding only runs for
/// the samples a batch actually asks for.
pub struct MapDataset<D, M>
where
    D: Dataset,
    M: Map<Item = D::Item>,
{
    dataset: D,
    map: M,
}

impl<D, M> MapDataset<D, M>
where
    D: Dataset,
    M: Map<Item = D::Item>,
{
    pub fn new(dataset: D, map: M) -> Self {
        Self { dataset, map }
    }

    pub fn inner(&self) -> &D {
        &self.dataset
    }
}

impl<D, F, O> MapDataset<D, MapFn<F, D::Item>>
where
    D: Dataset,
    F: Fn(D::Item) -> O,
{
    pub fn from_fn(dataset: D, f: F) -> Self {
        Self::new(dataset, MapFn::new(f))
    }
}

impl<D, M> Dataset for MapDataset<D, M>
where
    D: Dataset,
    M: Map<Item = D::Item>,
{
    type Item = M::Output;

    fn get(&self, index: usize) -> Option<Self::Item> {
        let item = self.dataset.get(index);
        item.map(|item| self.map.map(item))
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}
