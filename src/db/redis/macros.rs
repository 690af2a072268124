/// Read-through caching over [`Cache`](crate::db::Cache).
///
/// Returns the cached value when present. Otherwise awaits `$block`, queues
/// the result for a background write with the given TTL, and returns it.
/// Cache read failures are logged and treated as a miss so that Redis being
/// down never fails the wrapped call. Errors from `$block` are propagated
/// with `?`.
///
/// # Arguments
/// * `$cache`: a [`Cache`](crate::db::Cache); the write goes through its
///   background writer, so it may land after the macro has returned.
/// * `$key`: the [`CacheKey`](crate::db::CacheKey) to read and write.
/// * `$ttl`: time-to-live of the written value, in seconds.
/// * `$block`: a future computing the value on a miss.
///
/// # Example
/// ```rust,ignore
/// let embedding: Embedding = cached!(cache, key, ttl, provider.embed(text))?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await {
            Ok(Some(cached)) => Ok(cached),
            Ok(None) => {
                let value = $block.await?;
                $cache.set_in_background(&key, &value, $ttl);
                Ok(value)
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, bypassing cache");
                let value = $block.await?;
                $cache.set_in_background(&key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
