use std::future::Future;

/// A partitioned collection processed one partition per worker.
///
/// Partition order is stable: `for_each_partition` returns results indexed by
/// partition, whatever order the workers finish in.
pub trait ParallelDataset<T: Send + 'static>: Sized + Send {
    type Mapped<U: Send + 'static>: ParallelDataset<U>;

    fn num_partitions(&self) -> usize;

    /// Element-wise transform that keeps the partitioning.
    fn map<U, F>(self, f: F) -> Self::Mapped<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync;

    /// Runs `f` once per partition, concurrently, and gathers the results.
    fn for_each_partition<F, Fut, R>(self, f: F) -> impl Future<Output = Vec<R>> + Send
    where
        F: Fn(usize, Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Send + 'static;

    fn collect(self) -> Vec<T>;

    fn count(&self) -> usize;
}
