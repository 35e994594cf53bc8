use std::sync::Arc;
use rand::{seq::SliceRandom, Rng};
use crate::{Dataset, DatasetError, DatasetResult};

/// A view over a shared dataset restricted to a list of indices.
pub struct SubsetDataset<D>
where
    D: Dataset,
{
    pub wrapped: Arc<D>,
    pub indices: Vec<usize>,
}

impl<D: Dataset> SubsetDataset<D> {
    /// Creates a new selection dataset with the given dataset and indices without checking bounds.
    ///
    /// ## Arguments
    ///
    /// * `dataset` - The original dataset to select from.
    /// * `indices` - A vector of indices to select from the dataset.
    pub fn new(dataset: Arc<D>, indices: Vec<usize>) -> Self {
        Self { wrapped: dataset, indices }
    }

    /// Creates a new selection dataset with the given dataset and indices.
    ///
    /// Checks that all indices are within the bounds of the dataset.
    pub fn from_indices(dataset: Arc<D>, indices: Vec<usize>) -> DatasetResult<Self> {
        let len = dataset.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(DatasetError::IndexOutOfRange { index, len, op: "select from indices" });
        }

        Ok(Self::new(dataset, indices))
    }

    /// Creates a new selection dataset that selects all indices from the dataset.
    pub fn select_all(dataset: Arc<D>) -> Self {
        let len = dataset.len();
        Self::new(dataset, iota(len))
    }

    /// Creates a new dataset from the selection indices `[start..end]`.
    ///
    /// Shares the same wrapped dataset.
    pub fn slice(&self, start: usize, end: usize) -> DatasetResult<Self> {
        let len = self.len();
        if end > len {
            return Err(DatasetError::IndexOutOfRange { index: end, len, op: "slice" });
        }
        if start > end {
            return Err(DatasetError::IndexOutOfRange { index: start, len: end, op: "slice" });
        }
        Ok(Self::new(Arc::clone(&self.wrapped), self.indices[start..end].to_vec()))
    }

    /// Split into `num` datasets by slicing the selection indices evenly.
    ///
    /// The first `len % num` parts get one extra index.
    pub fn split(&self, num: usize) -> DatasetResult<Vec<Self>> {
        if num == 0 {
            return Err(DatasetError::ZeroSplit);
        }

        let n = self.indices.len();
        let mut datasets = Vec::with_capacity(num);

        let base_size = n / num;
        let remainder = n % num;

        let mut start = 0;
        for i in 0..num {
            let size = base_size + usize::from(i < remainder);
            let end = start + size;

            datasets.push(self.slice(start, end)?);

            start = end;
        }

        Ok(datasets)
    }
}

impl<D: Dataset> Dataset for SubsetDataset<D> {
    type Item = D::Item;

    fn get(&self, index: usize) -> Option<Self::Item> {
        let index = self.indices.get(index)?;
        self.wrapped.get(*index)
    }

    fn len(&self) -> usize {
        self.indices.len()
    }
}

/// Randomly partitions a dataset in two, the first part holding
/// `floor(len * ratio)` samples.
pub fn random_split<D, R>(
    dataset: Arc<D>,
    ratio: f64,
    rng: &mut R,
) -> DatasetResult<(SubsetDataset<D>, SubsetDataset<D>)>
where
    D: Dataset,
    R: Rng + ?Sized,
{
    if !(0.0..=1.0).contains(&ratio) {
        return Err(DatasetError::InvalidRatio(ratio));
    }

    let length = dataset.len();
    let mut indices = iota(length);
    indices.shuffle(rng);

    let split_idx = ((length as f64 * ratio).floor() as usize).min(length);
    let (indices1, indices2) = indices.split_at(split_idx);

    let subset1 = SubsetDataset::new(Arc::clone(&dataset), indices1.to_vec());
    let subset2 = SubsetDataset::new(dataset, indices2.to_vec());

    Ok((subset1, subset2))
}

#[inline(always)]
fn iota(size: usize) -> Vec<usize> {
    (0..size).collect()
}
