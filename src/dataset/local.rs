use super::dataset::ParallelDataset;

use rayon::prelude::*;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDataset<T> {
    partitions: Vec<Vec<T>>,
}

impl<T> LocalDataset<T> {
    /// Splits `items` into `partitions` contiguous slices.
    ///
    /// Slice `i` covers `[i * len / n, (i + 1) * len / n)`, so sizes differ by at
    /// most one and input order is kept across partitions.
    pub fn parallelize(items: Vec<T>, partitions: usize) -> Self {
        let n = partitions.max(1);
        let len = items.len();
        let mut remaining = items.into_iter();
        let partitions = (0..n)
            .map(|i| {
                let size = ((i + 1) * len) / n - (i * len) / n;
                remaining.by_ref().take(size).collect()
            })
            .collect();
        Self { partitions }
    }

    pub fn from_partitions(partitions: Vec<Vec<T>>) -> Self {
        Self { partitions }
    }

    pub fn partitions(&self) -> &[Vec<T>] {
        &self.partitions
    }

    pub fn into_partitions(self) -> Vec<Vec<T>> {
        self.partitions
    }
}

impl<T: Send + 'static> ParallelDataset<T> for LocalDataset<T> {
    type Mapped<U: Send + 'static> = LocalDataset<U>;

    fn num_partitions(&self) -> usize {
        self.partitions.len()
    }

    fn map<U, F>(self, f: F) -> Self::Mapped<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync,
    {
        let partitions = self
            .partitions
            .into_par_iter()
            .map(|partition| partition.into_iter().map(&f).collect())
            .collect();
        LocalDataset { partitions }
    }

    fn for_each_partition<F, Fut, R>(self, f: F) -> impl Future<Output = Vec<R>> + Send
    where
        F: Fn(usize, Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static,
    {
        async move {
            let count = self.partitions.len();
            let f = Arc::new(f);
            let mut workers = JoinSet::new();

            for (index, partition) in self.partitions.into_iter().enumerate() {
                let f = f.clone();
                workers.spawn(async move { (index, (*f)(index, partition).await) });
            }

            let mut results: Vec<Option<R>> = (0..count).map(|_| None).collect();
            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok((index, result)) => results[index] = Some(result),
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    Err(e) => tracing::error!("Partition worker did not finish: {}", e),
                }
            }
            results.into_iter().flatten().collect()
        }
    }

    fn collect(self) -> Vec<T> {
        self.partitions.into_iter().flatten().collect()
    }

    fn count(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }
}
