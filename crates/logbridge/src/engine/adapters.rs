use async_trait::async_trait;

use crate::Result;

use super::DistributedCollection;

/// Element wise transformations, applied inside each slice's computation
pub trait CollectionExt: DistributedCollection + Sized {
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: Fn(Self::Item) -> U + Send + Sync + 'static,
        U: Send + 'static,
    {
        Map { inner: self, f }
    }

    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: Fn(&Self::Item) -> bool + Send + Sync + 'static,
    {
        Filter {
            inner: self,
            predicate,
        }
    }
}

impl<C: DistributedCollection> CollectionExt for C {}

pub struct Map<C, F> {
    inner: C,
    f: F,
}

impl<C, F> Map<C, F> {
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C, F, U> DistributedCollection for Map<C, F>
where
    C: DistributedCollection,
    F: Fn(C::Item) -> U + Send + Sync + 'static,
    U: Send + 'static,
{
    type Item = U;
    type Slice = C::Slice;

    async fn slices(&self) -> Result<Vec<Self::Slice>> {
        self.inner.slices().await
    }

    async fn compute(&self, slice: Self::Slice) -> Result<Vec<U>> {
        let items = self.inner.compute(slice).await?;
        Ok(items.into_iter().map(&self.f).collect())
    }
}

pub struct Filter<C, F> {
    inner: C,
    predicate: F,
}

impl<C, F> Filter<C, F> {
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C, F> DistributedCollection for Filter<C, F>
where
    C: DistributedCollection,
    F: Fn(&C::Item) -> bool + Send + Sync + 'static,
{
    type Item = C::Item;
    type Slice = C::Slice;

    async fn slices(&self) -> Result<Vec<Self::Slice>> {
        self.inner.slices().await
    }

    async fn compute(&self, slice: Self::Slice) -> Result<Vec<C::Item>> {
        let items = self.inner.compute(slice).await?;
        Ok(items
            .into_iter()
            .filter(|item| (self.predicate)(item))
            .collect())
    }
}
