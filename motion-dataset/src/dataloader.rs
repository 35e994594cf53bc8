use std::{cell::{Cell, RefCell}, fmt, iter::FusedIterator, sync::Arc};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use crate::{Dataset, DatasetError, DatasetResult, LoaderConfig};

/// Splits a dataset into fixed-size batches, one pass at a time.
///
/// The loader owns a permutation of `[0, len)` that defines the traversal
/// order. With `shuffle` enabled the permutation is shuffled once on
/// construction and again at the start of every pass, always with the same
/// generator, which is seeded once per loader.
///
/// A pass is driven either through the cursor protocol:
///
/// ```
/// use motion_dataset::{BatchLoader, VecDataset};
///
/// let loader = BatchLoader::new(VecDataset::new((0..7).collect()), 3, false).unwrap();
/// let end = loader.end_sentinel();
/// let mut cursor = loader.begin_pass();
/// let mut lens = vec![];
/// while cursor != end {
///     lens.push(cursor.dereference().len());
///     cursor.advance();
/// }
/// assert_eq!(lens, vec![3, 3, 1]);
/// ```
///
/// or with a plain `for batch in &loader` loop.
///
/// The loader is not `Sync`: one pass at a time. Beginning a new pass while a
/// cursor of the previous pass is still in use reshuffles the order under it.
pub struct BatchLoader<D: Dataset> {
    dataset: Arc<D>,
    batch_size: usize,
    shuffle: bool,
    rng: RefCell<StdRng>,
    permutation: RefCell<Vec<usize>>,
    passes: Cell<usize>,
}

impl<D: Dataset> BatchLoader<D> {
    /// Creates a loader whose generator is seeded from the operating system.
    pub fn new(dataset: D, batch_size: usize, shuffle: bool) -> DatasetResult<Self> {
        Self::build(Arc::new(dataset), batch_size, shuffle, StdRng::from_os_rng())
    }

    /// Creates a loader with a deterministic generator.
    pub fn with_seed(dataset: D, batch_size: usize, shuffle: bool, seed: u64) -> DatasetResult<Self> {
        Self::build(Arc::new(dataset), batch_size, shuffle, StdRng::seed_from_u64(seed))
    }

    /// Like [`new`](Self::new), for a dataset that is shared with other owners.
    pub fn from_shared(dataset: Arc<D>, batch_size: usize, shuffle: bool) -> DatasetResult<Self> {
        Self::build(dataset, batch_size, shuffle, StdRng::from_os_rng())
    }

    pub fn from_config(dataset: D, config: &LoaderConfig) -> DatasetResult<Self> {
        Self::from_arc(Arc::new(dataset), config)
    }

    /// Creates a loader over a dataset that is shared with other owners.
    pub fn from_arc(dataset: Arc<D>, config: &LoaderConfig) -> DatasetResult<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::build(dataset, config.batch_size, config.shuffle, rng)
    }

    fn build(dataset: Arc<D>, batch_size: usize, shuffle: bool, mut rng: StdRng) -> DatasetResult<Self> {
        if batch_size == 0 {
            return Err(DatasetError::ZeroBatchSize);
        }

        let mut permutation: Vec<usize> = (0..dataset.len()).collect();
        if shuffle {
            permutation.shuffle(&mut rng);
        }

        log::debug!(
            "created batch loader over {} samples (batch size: {}, shuffle: {})",
            permutation.len(), batch_size, shuffle,
        );

        Ok(Self {
            dataset,
            batch_size,
            shuffle,
            rng: RefCell::new(rng),
            permutation: RefCell::new(permutation),
            passes: Cell::new(0),
        })
    }

    /// Starts a new pass, reshuffling first if shuffling is enabled.
    pub fn begin_pass(&self) -> BatchCursor<'_, D> {
        let pass = self.passes.get() + 1;
        self.passes.set(pass);

        if self.shuffle {
            let mut rng = self.rng.borrow_mut();
            self.permutation.borrow_mut().shuffle(&mut *rng);
        }

        log::debug!(
            "begin pass {}: {} samples in {} batches (shuffle: {})",
            pass, self.len(), self.batch_count(), self.shuffle,
        );

        BatchCursor { loader: self, offset: 0, pass }
    }

    /// A cursor positioned at the end of a pass, for loop termination.
    pub fn end_sentinel(&self) -> BatchCursor<'_, D> {
        BatchCursor {
            loader: self,
            offset: self.len(),
            pass: self.passes.get(),
        }
    }

    /// Starts a new pass and returns it as an iterator of batches.
    pub fn iter(&self) -> Batches<'_, D> {
        let cursor = self.begin_pass();
        let end = self.end_sentinel();
        Batches { cursor, end }
    }

    pub fn dataset(&self) -> &Arc<D> {
        &self.dataset
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Number of samples visited by one pass.
    pub fn len(&self) -> usize {
        self.permutation.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of batches yielded by one pass, the last one possibly short.
    pub fn batch_count(&self) -> usize {
        self.len().div_ceil(self.batch_size)
    }

    /// The traversal order of the current pass.
    pub fn permutation(&self) -> Vec<usize> {
        self.permutation.borrow().clone()
    }

    /// Number of passes begun so far.
    pub fn passes(&self) -> usize {
        self.passes.get()
    }

    fn resolve(&self, index: usize) -> D::Item {
        match self.dataset.get(index) {
            Some(item) => item,
            None => panic!(
                "dataset returned no sample for permuted index {} (dataset size {}, pass size {})",
                index, self.dataset.len(), self.len(),
            ),
        }
    }
}

impl<D: Dataset> fmt::Debug for BatchLoader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchLoader")
            .field("len", &self.len())
            .field("batch_size", &self.batch_size)
            .field("shuffle", &self.shuffle)
            .field("passes", &self.passes.get())
            .finish()
    }
}

impl<'a, D: Dataset> IntoIterator for &'a BatchLoader<D> {
    type Item = Vec<D::Item>;
    type IntoIter = Batches<'a, D>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

//===========================================================//
//                Cursor
//===========================================================//

/// Position inside a pass of a [`BatchLoader`].
///
/// Advancing is cheap. Samples are only fetched from the dataset by
/// [`dereference`](BatchCursor::dereference).
pub struct BatchCursor<'a, D: Dataset> {
    loader: &'a BatchLoader<D>,
    offset: usize,
    pass: usize,
}

impl<'a, D: Dataset> BatchCursor<'a, D> {
    /// Fetches the batch at the current position.
    ///
    /// Returns the samples of `permutation[offset..offset + batch_size]`, in
    /// permutation order, clipped to the end of the pass. A cursor at or past
    /// the end yields an empty batch.
    ///
    /// # Panics
    ///
    /// Panics if the dataset has no sample for an index below the pass size,
    /// which means the dataset shrank after the loader was built.
    pub fn dereference(&self) -> Vec<D::Item> {
        let permutation = self.loader.permutation.borrow();
        let len = permutation.len();
        if self.offset >= len {
            return Vec::new();
        }

        if self.pass != self.loader.passes.get() {
            log::warn!(
                "dereferencing a cursor of pass {} while pass {} is active",
                self.pass, self.loader.passes.get(),
            );
        }

        let end = (self.offset + self.loader.batch_size).min(len);
        log::trace!("pass {}: loading samples [{}, {})", self.pass, self.offset, end);

        permutation[self.offset..end]
            .iter()
            .map(|&index| self.loader.resolve(index))
            .collect()
    }

    /// Moves forward by one batch. Moving past the end is allowed.
    pub fn advance(&mut self) {
        self.offset = self.offset.saturating_add(self.loader.batch_size);
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.loader.len()
    }

    /// Samples left in the pass, counting the batch under the cursor.
    pub fn remaining(&self) -> usize {
        self.loader.len().saturating_sub(self.offset)
    }

    fn position(&self) -> usize {
        self.offset.min(self.loader.len())
    }
}

impl<D: Dataset> Clone for BatchCursor<'_, D> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader,
            offset: self.offset,
            pass: self.pass,
        }
    }
}

/// Cursors are equal when they belong to the same loader and sit at the same
/// position. Every position at or past the end counts as the end.
impl<D: Dataset> PartialEq for BatchCursor<'_, D> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.loader, other.loader) && self.position() == other.position()
    }
}

impl<D: Dataset> Eq for BatchCursor<'_, D> {}

impl<D: Dataset> fmt::Debug for BatchCursor<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCursor")
            .field("offset", &self.offset)
            .field("pass", &self.pass)
            .finish()
    }
}

//===========================================================//
//                Iter
//===========================================================//

/// One pass of a [`BatchLoader`] as an [`Iterator`].
pub struct Batches<'a, D: Dataset> {
    cursor: BatchCursor<'a, D>,
    end: BatchCursor<'a, D>,
}

impl<D: Dataset> Iterator for Batches<'_, D> {
    type Item = Vec<D::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == self.end {
            return None;
        }
        let batch = self.cursor.dereference();
        self.cursor.advance();
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let batches = self.cursor.remaining().div_ceil(self.cursor.loader.batch_size);
        (batches, Some(batches))
    }
}

impl<D: Dataset> ExactSizeIterator for Batches<'_, D> {}

impl<D: Dataset> FusedIterator for Batches<'_, D> {}

#[cfg(test)]
mod test {
    use std::{cell::Cell, collections::BTreeSet, sync::Arc};
    use crate::{Dataset, DatasetError, LoaderConfig, VecDataset};
    use super::BatchLoader;

    fn indices(n: usize) -> VecDataset<usize> {
        VecDataset::new((0..n).collect())
    }

    /// Drives a pass through the cursor protocol.
    fn run_pass<D: Dataset>(loader: &BatchLoader<D>) -> Vec<Vec<D::Item>> {
        let end = loader.end_sentinel();
        let mut cursor = loader.begin_pass();
        let mut batches = vec![];
        while cursor != end {
            batches.push(cursor.dereference());
            cursor.advance();
        }
        batches
    }

    struct CountingDataset {
        len: usize,
        reads: Cell<usize>,
    }

    impl Dataset for CountingDataset {
        type Item = usize;

        fn get(&self, index: usize) -> Option<usize> {
            if index >= self.len {
                return None;
            }
            self.reads.set(self.reads.get() + 1);
            Some(index)
        }

        fn len(&self) -> usize {
            self.len
        }
    }

    struct HollowDataset;

    impl Dataset for HollowDataset {
        type Item = ();

        fn get(&self, _index: usize) -> Option<()> {
            None
        }

        fn len(&self) -> usize {
            3
        }
    }

    #[test]
    fn test_sequential_pass() {
        for n in [1, 2, 5, 7, 10, 16, 33] {
            for batch_size in [1, 2, 3, 4, 10, 40] {
                let loader = BatchLoader::new(indices(n), batch_size, false).unwrap();
                let batches = run_pass(&loader);
                assert_eq!(batches.len(), n.div_ceil(batch_size));
                assert_eq!(batches.len(), loader.batch_count());
                let flat: Vec<usize> = batches.into_iter().flatten().collect();
                assert_eq!(flat, (0..n).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_short_last_batch() {
        let loader = BatchLoader::new(indices(7), 3, false).unwrap();
        let lens: Vec<usize> = run_pass(&loader).iter().map(Vec::len).collect();
        assert_eq!(lens, vec![3, 3, 1]);
    }

    #[test]
    fn test_single_full_batch() {
        let loader = BatchLoader::new(indices(10), 10, false).unwrap();
        let batches = run_pass(&loader);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 10);
    }

    #[test]
    fn test_empty_dataset() {
        let loader = BatchLoader::new(indices(0), 4, true).unwrap();
        assert!(loader.is_empty());
        assert_eq!(loader.batch_count(), 0);
        assert!(loader.begin_pass() == loader.end_sentinel());

        let mut visited = 0;
        for _ in &loader {
            visited += 1;
        }
        assert_eq!(visited, 0);
    }

    #[test]
    fn test_zero_batch_size() {
        let err = BatchLoader::new(indices(5), 0, false).unwrap_err();
        assert!(matches!(err, DatasetError::ZeroBatchSize));

        let err = BatchLoader::from_config(indices(5), &LoaderConfig::new(0, true)).unwrap_err();
        assert!(matches!(err, DatasetError::ZeroBatchSize));
    }

    #[test]
    fn test_shuffled_pass_is_permutation() {
        let loader = BatchLoader::with_seed(indices(50), 7, true, 11).unwrap();
        let first: Vec<usize> = run_pass(&loader).into_iter().flatten().collect();
        let second: Vec<usize> = run_pass(&loader).into_iter().flatten().collect();

        let expected: BTreeSet<usize> = (0..50).collect();
        assert_eq!(first.len(), 50);
        assert_eq!(first.iter().copied().collect::<BTreeSet<_>>(), expected);
        assert_eq!(second.iter().copied().collect::<BTreeSet<_>>(), expected);
        assert_ne!(first, second);
        assert_eq!(loader.passes(), 2);
    }

    #[test]
    fn test_entropy_seeded_pass_is_permutation() {
        let loader = BatchLoader::new(indices(50), 7, true).unwrap();
        for _ in 0..2 {
            let pass: Vec<usize> = loader.iter().flatten().collect();
            assert_eq!(pass.len(), 50);
            assert_eq!(pass.into_iter().collect::<BTreeSet<_>>(), (0..50).collect::<BTreeSet<_>>());
        }
    }

    #[test]
    fn test_shared_dataset() {
        let dataset = Arc::new(indices(9));
        let loader = BatchLoader::from_shared(Arc::clone(&dataset), 4, false).unwrap();
        assert!(Arc::ptr_eq(loader.dataset(), &dataset));
        assert_eq!(Arc::strong_count(&dataset), 2);
        assert_eq!(loader.iter().flatten().collect::<Vec<_>>(), (0..9).collect::<Vec<_>>());

        let err = BatchLoader::from_shared(dataset, 0, true).unwrap_err();
        assert!(matches!(err, DatasetError::ZeroBatchSize));
    }

    #[test]
    fn test_shuffled_on_construction() {
        let loader = BatchLoader::with_seed(indices(50), 5, true, 3).unwrap();
        let permutation = loader.permutation();
        assert_ne!(permutation, (0..50).collect::<Vec<_>>());

        let mut sorted = permutation.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());

        let loader = BatchLoader::with_seed(indices(50), 5, false, 3).unwrap();
        assert_eq!(loader.permutation(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_pass_follows_permutation() {
        let loader = BatchLoader::with_seed(indices(20), 6, true, 5).unwrap();
        let cursor = loader.begin_pass();
        let permutation = loader.permutation();
        assert_eq!(cursor.dereference(), permutation[..6].to_vec());
    }

    #[test]
    fn test_same_seed_same_order() {
        let a = BatchLoader::with_seed(indices(30), 4, true, 99).unwrap();
        let b = BatchLoader::from_config(indices(30), &LoaderConfig::new(4, true).with_seed(99)).unwrap();
        for _ in 0..3 {
            assert_eq!(run_pass(&a), run_pass(&b));
        }
    }

    #[test]
    fn test_end_sentinel_keeps_order() {
        let loader = BatchLoader::with_seed(indices(25), 4, true, 1).unwrap();
        let before = loader.permutation();
        let end = loader.end_sentinel();
        assert!(end.is_exhausted());
        assert_eq!(end.offset(), 25);
        assert_eq!(loader.permutation(), before);
        assert_eq!(loader.passes(), 0);
    }

    #[test]
    fn test_dereference_past_end() {
        let loader = BatchLoader::new(indices(4), 3, false).unwrap();
        assert!(loader.end_sentinel().dereference().is_empty());

        let mut cursor = loader.begin_pass();
        cursor.advance();
        cursor.advance();
        cursor.advance();
        assert_eq!(cursor.offset(), 9);
        assert_eq!(cursor.remaining(), 0);
        assert!(cursor.dereference().is_empty());
        assert!(cursor == loader.end_sentinel());
    }

    #[test]
    fn test_dereference_idempotent() {
        let loader = BatchLoader::with_seed(indices(12), 5, true, 8).unwrap();
        let mut cursor = loader.begin_pass();
        cursor.advance();
        let snapshot = cursor.clone();
        assert_eq!(cursor.dereference(), cursor.dereference());
        assert_eq!(cursor.dereference(), snapshot.dereference());
        assert!(cursor == snapshot);
    }

    #[test]
    fn test_dereference_is_lazy() {
        let dataset = CountingDataset { len: 10, reads: Cell::new(0) };
        let loader = BatchLoader::new(dataset, 4, true).unwrap();

        let mut cursor = loader.begin_pass();
        cursor.advance();
        let _ = loader.begin_pass();
        assert_eq!(loader.dataset().reads.get(), 0);

        assert_eq!(cursor.dereference().len(), 4);
        assert_eq!(loader.dataset().reads.get(), 4);
    }

    #[test]
    fn test_cursors_of_other_loaders_differ() {
        let a = BatchLoader::new(indices(6), 2, false).unwrap();
        let b = BatchLoader::new(indices(6), 2, false).unwrap();
        assert!(a.end_sentinel() != b.end_sentinel());
        assert!(a.begin_pass() != b.begin_pass());
        assert!(a.end_sentinel() == a.end_sentinel());
    }

    #[test]
    fn test_stale_cursor_still_loads() {
        let loader = BatchLoader::with_seed(indices(9), 4, true, 2).unwrap();
        let stale = loader.begin_pass();
        let fresh = loader.begin_pass();
        assert_eq!(stale.dereference(), fresh.dereference());
    }

    #[test]
    fn test_iterator_surface() {
        let loader = BatchLoader::new(indices(11), 4, false).unwrap();
        let mut batches = loader.iter();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches.next(), Some(vec![0, 1, 2, 3]));
        assert_eq!(batches.len(), 2);
        assert_eq!(batches.next(), Some(vec![4, 5, 6, 7]));
        assert_eq!(batches.next(), Some(vec![8, 9, 10]));
        assert_eq!(batches.next(), None);
        assert_eq!(batches.next(), None);

        let total: usize = (&loader).into_iter().map(|batch| batch.len()).sum();
        assert_eq!(total, 11);
        assert_eq!(loader.passes(), 2);
    }

    #[test]
    #[should_panic(expected = "no sample for permuted index")]
    fn test_missing_sample_panics() {
        let loader = BatchLoader::new(HollowDataset, 2, false).unwrap();
        let _ = loader.begin_pass().dereference();
    }
}
