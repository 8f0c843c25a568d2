use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

use super::DistributedCollection;

/// In memory collection split into contiguous slices of nearly equal size
#[derive(Debug)]
pub struct ParallelCollection<T> {
    items: Arc<Vec<T>>,
    slices: usize,
}

impl<T> Clone for ParallelCollection<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            slices: self.slices,
        }
    }
}

impl<T> ParallelCollection<T> {
    pub fn from_vec(items: Vec<T>, slices: usize) -> Self {
        Self {
            items: Arc::new(items),
            slices: slices.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn ranges(&self) -> Vec<Range<usize>> {
        let total = self.items.len();
        let chunk = total.div_ceil(self.slices).max(1);
        (0..total)
            .step_by(chunk)
            .map(|start| start..(start + chunk).min(total))
            .collect()
    }
}

#[async_trait]
impl<T> DistributedCollection for ParallelCollection<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Item = T;
    type Slice = Range<usize>;

    async fn slices(&self) -> Result<Vec<Range<usize>>> {
        Ok(self.ranges())
    }

    async fn compute(&self, slice: Range<usize>) -> Result<Vec<T>> {
        Ok(self.items.get(slice).map(<[T]>::to_vec).unwrap_or_default())
    }
}
