//!
//! # Execution Engine
//!
//! Collections split into slices that are computed independently by an engine.
//!

mod adapters;
mod local;
mod parallel;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::debug;

use crate::Result;

pub use self::adapters::CollectionExt;
pub use self::adapters::Filter;
pub use self::adapters::Map;
pub use self::local::LocalEngine;
pub use self::parallel::ParallelCollection;

/// A unit of work handed to an engine
pub type Unit<T> = BoxFuture<'static, Result<T>>;

/// Schedules units of work and returns their outputs in unit order.
/// The first failing unit fails the whole run.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn run_units<T>(&self, units: Vec<Unit<T>>) -> Result<Vec<T>>
    where
        T: Send + 'static;
}

/// A collection whose elements are computed slice by slice, possibly remotely
#[async_trait]
pub trait DistributedCollection: Send + Sync + 'static {
    type Item: Send + 'static;
    type Slice: Debug + Clone + Send + Sync + 'static;

    /// Plans the slices of one evaluation.
    async fn slices(&self) -> Result<Vec<Self::Slice>>;

    /// Computes the elements of one slice.
    async fn compute(&self, slice: Self::Slice) -> Result<Vec<Self::Item>>;
}

/// one unit per slice, each producing whatever `task` returns for its slice
pub(crate) async fn units_for<C, T, F, Fut>(collection: &Arc<C>, task: F) -> Result<Vec<Unit<T>>>
where
    C: DistributedCollection,
    T: Send + 'static,
    F: Fn(Arc<C>, C::Slice) -> Fut,
    Fut: std::future::Future<Output = Result<T>> + Send + 'static,
{
    let slices = collection.slices().await?;
    debug!(slices = slices.len(), "planned collection");
    Ok(slices
        .into_iter()
        .map(|slice| task(collection.clone(), slice).boxed())
        .collect())
}

/// Elements of every slice, one `Vec` per slice in slice order.
pub async fn collect_slices<C, E>(collection: Arc<C>, engine: &E) -> Result<Vec<Vec<C::Item>>>
where
    C: DistributedCollection,
    E: ExecutionEngine,
{
    let units = units_for(&collection, |collection, slice| async move {
        collection.compute(slice).await
    })
    .await?;
    engine.run_units(units).await
}

/// All elements, concatenated in slice order.
pub async fn collect<C, E>(collection: Arc<C>, engine: &E) -> Result<Vec<C::Item>>
where
    C: DistributedCollection,
    E: ExecutionEngine,
{
    let slices = collect_slices(collection, engine).await?;
    Ok(slices.into_iter().flatten().collect())
}

pub async fn count<C, E>(collection: Arc<C>, engine: &E) -> Result<usize>
where
    C: DistributedCollection,
    E: ExecutionEngine,
{
    let units = units_for(&collection, |collection, slice| async move {
        collection.compute(slice).await.map(|items| items.len())
    })
    .await?;
    Ok(engine.run_units(units).await?.into_iter().sum())
}

#[cfg(test)]
mod test {

    use std::sync::Arc;

    use super::collect;
    use super::collect_slices;
    use super::count;
    use super::CollectionExt;
    use super::LocalEngine;
    use super::ParallelCollection;

    #[tokio::test]
    async fn test_collect_keeps_slice_order() {
        let collection = Arc::new(ParallelCollection::from_vec((0..10).collect::<Vec<i32>>(), 3));
        let engine = LocalEngine::new(2);

        let slices = collect_slices(collection.clone(), &engine).await.expect("slices");
        assert_eq!(slices.len(), 3);
        assert_eq!(slices[0], vec![0, 1, 2, 3]);

        let all = collect(collection, &engine).await.expect("collect");
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_adapters_and_count() {
        let collection = ParallelCollection::from_vec((1..=20).collect::<Vec<u32>>(), 4)
            .filter(|n| n % 2 == 0)
            .map(|n| n * 10);
        let collection = Arc::new(collection);
        let engine = LocalEngine::default();

        assert_eq!(count(collection.clone(), &engine).await.expect("count"), 10);
        let items = collect(collection, &engine).await.expect("collect");
        assert_eq!(items.first(), Some(&20));
        assert_eq!(items.last(), Some(&200));
    }
}
