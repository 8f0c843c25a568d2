use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::BridgeError;
use crate::Result;

use super::ExecutionEngine;
use super::Unit;

const DEFAULT_PARALLELISM: usize = 4;

/// Runs units as tokio tasks in the current runtime, at most `parallelism` at a time.
///
/// When a unit fails, every other unit is aborted. Aborted units drop
/// whatever they hold, in flight requests included.
#[derive(Debug, Clone)]
pub struct LocalEngine {
    parallelism: usize,
}

impl Default for LocalEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLELISM)
    }
}

impl LocalEngine {
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }
}

#[async_trait]
impl ExecutionEngine for LocalEngine {
    async fn run_units<T>(&self, units: Vec<Unit<T>>) -> Result<Vec<T>>
    where
        T: Send + 'static,
    {
        let total = units.len();
        let permits = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();

        for (index, unit) in units.into_iter().enumerate() {
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|err| BridgeError::Execution(err.to_string()))?;
                unit.await.map(|output| (index, output))
            });
        }

        let mut outputs: Vec<Option<T>> = (0..total).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok(Ok((index, output))) => {
                    outputs[index] = Some(output);
                    continue;
                }
                Ok(Err(err)) => err,
                Err(join_err) => BridgeError::Execution(join_err.to_string()),
            };
            debug!(%failure, remaining = tasks.len(), "unit failed, aborting the rest");
            tasks.abort_all();
            return Err(failure);
        }

        outputs
            .into_iter()
            .enumerate()
            .map(|(index, output)| {
                output.ok_or_else(|| BridgeError::Execution(format!("unit {index} produced no output")))
            })
            .collect()
    }
}

#[cfg(test)]
mod test {

    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::FutureExt;

    use crate::engine::ExecutionEngine;
    use crate::engine::Unit;
    use crate::BridgeError;
    use crate::ErrorKind;

    use super::LocalEngine;

    #[tokio::test]
    async fn test_outputs_follow_unit_order() {
        let units: Vec<Unit<u64>> = (0..5u64)
            .map(|i| {
                async move {
                    tokio::time::sleep(Duration::from_millis(50 - i * 10)).await;
                    Ok(i)
                }
                .boxed()
            })
            .collect();

        let outputs = LocalEngine::new(5).run_units(units).await.expect("run");
        assert_eq!(outputs, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let units: Vec<Unit<()>> = (0..8)
            .map(|_| {
                let running = running.clone();
                let peak = peak.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
                .boxed()
            })
            .collect();

        LocalEngine::new(2).run_units(units).await.expect("run");
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_others() {
        let finished = Arc::new(AtomicUsize::new(0));
        let slow: Unit<i32> = {
            let finished = finished.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            }
            .boxed()
        };
        let failing: Unit<i32> = async { Err(BridgeError::TopicNotFound("gone".to_owned())) }.boxed();

        let err = LocalEngine::new(2)
            .run_units(vec![slow, failing])
            .await
            .expect_err("fails");
        assert!(matches!(err, BridgeError::TopicNotFound(_)));
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_unit_is_execution_error() {
        let panicking: Unit<u8> = async {
            let exploded: Option<u8> = None;
            Ok(exploded.expect("unit exploded"))
        }
        .boxed();
        let err = LocalEngine::default()
            .run_units(vec![panicking])
            .await
            .expect_err("panic");
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[tokio::test]
    async fn test_no_units() {
        let outputs = LocalEngine::default()
            .run_units(Vec::<Unit<u8>>::new())
            .await
            .expect("empty");
        assert!(outputs.is_empty());
    }
}
