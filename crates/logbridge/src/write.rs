use std::sync::Arc;

use bytes::Bytes;
use tracing::info;
use tracing::instrument;

use crate::config::PublishConfig;
use crate::engine::units_for;
use crate::engine::DistributedCollection;
use crate::engine::ExecutionEngine;
use crate::publisher::TopicPublisher;
use crate::Result;

type ToRecord<T> = fn(T) -> (Option<Bytes>, Bytes);

/// Publishes every element of `collection` to `topic` without a key.
///
/// Each slice is computed and published by its own unit with its own
/// publisher. Returns the number of records sent.
#[instrument(skip(collection, config, engine))]
pub async fn write_to_broker<C, E>(
    collection: Arc<C>,
    topic: &str,
    config: &PublishConfig,
    engine: &E,
) -> Result<usize>
where
    C: DistributedCollection,
    C::Item: Into<Bytes>,
    E: ExecutionEngine,
{
    publish(collection, topic, config, engine, |value| (None, value.into())).await
}

/// Publishes `(key, value)` elements of `collection` to `topic`.
#[instrument(skip(collection, config, engine))]
pub async fn write_with_keys_to_broker<C, E, K, V>(
    collection: Arc<C>,
    topic: &str,
    config: &PublishConfig,
    engine: &E,
) -> Result<usize>
where
    C: DistributedCollection<Item = (K, V)>,
    K: Into<Bytes> + Send + 'static,
    V: Into<Bytes> + Send + 'static,
    E: ExecutionEngine,
{
    publish(collection, topic, config, engine, |(key, value)| {
        (Some(key.into()), value.into())
    })
    .await
}

async fn publish<C, E>(
    collection: Arc<C>,
    topic: &str,
    config: &PublishConfig,
    engine: &E,
    to_record: ToRecord<C::Item>,
) -> Result<usize>
where
    C: DistributedCollection,
    E: ExecutionEngine,
{
    let units = units_for(&collection, |collection, slice| {
        let topic = topic.to_owned();
        let config = config.clone();
        async move {
            let items = collection.compute(slice).await?;
            let mut publisher = TopicPublisher::connect(&topic, &config).await?;
            let result = publish_items(&mut publisher, items, to_record).await;
            let sent = publisher.close();
            result.map(|_| sent)
        }
    })
    .await?;

    let sent: usize = engine.run_units(units).await?.into_iter().sum();
    info!(sent, "published collection");
    Ok(sent)
}

async fn publish_items<T>(
    publisher: &mut TopicPublisher,
    items: Vec<T>,
    to_record: ToRecord<T>,
) -> Result<()> {
    for item in items {
        let (key, value) = to_record(item);
        publisher.send(key, value).await?;
    }
    publisher.flush().await
}
