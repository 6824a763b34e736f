//! In-process `Datastore` with per-entity versions.
//!
//! Backs the development server and tests. Conditional writes compare the
//! stored version, which gives the same optimistic-concurrency behaviour the
//! order store expects from a managed document store.

use super::{Datastore, Direction, Entity, Key, PutOutcome, Query, Versioned};
use crate::error::{ShopError, ShopResult};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    next_id: i64,
    entities: HashMap<(&'static str, i64), Versioned>,
}

#[derive(Default)]
pub struct MemoryDatastore {
    inner: RwLock<Inner>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities of a kind
    pub async fn count(&self, kind: &str) -> usize {
        self.inner
            .read()
            .await
            .entities
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn create(&self, key: Key, entity: Entity) -> ShopResult<Key> {
        if key.is_complete() {
            return Err(ShopError::Storage(format!(
                "create expects an incomplete key, got {:?}",
                key
            )));
        }

        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner
            .entities
            .insert((key.kind, id), Versioned { version: 1, entity });
        Ok(Key::new(key.kind, id))
    }

    async fn get(&self, key: Key) -> ShopResult<Option<Versioned>> {
        let id = complete_id(&key)?;
        Ok(self.inner.read().await.entities.get(&(key.kind, id)).cloned())
    }

    async fn put_if_version(
        &self,
        key: Key,
        expected_version: u64,
        entity: Entity,
    ) -> ShopResult<PutOutcome> {
        let id = complete_id(&key)?;
        let mut inner = self.inner.write().await;
        let stored = inner
            .entities
            .get_mut(&(key.kind, id))
            .ok_or(ShopError::NotFound { kind: key.kind, id })?;

        if stored.version != expected_version {
            return Ok(PutOutcome::Conflict);
        }
        stored.version += 1;
        stored.entity = entity;
        Ok(PutOutcome::Committed)
    }

    async fn query(&self, query: &Query) -> ShopResult<Vec<(Key, Entity)>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<(Key, Entity)> = inner
            .entities
            .iter()
            .filter(|((kind, _), _)| *kind == query.kind)
            .filter(|(_, stored)| {
                query
                    .filters
                    .iter()
                    .all(|(property, value)| stored.entity.get(property) == Some(value))
            })
            .map(|((kind, id), stored)| (Key::new(*kind, *id), stored.entity.clone()))
            .collect();

        rows.sort_by(|(ka, a), (kb, b)| {
            let by_id = ka.id.cmp(&kb.id);
            match &query.order {
                Some((property, direction)) => {
                    let ord = compare(a.get(property), b.get(property)).then(by_id);
                    match direction {
                        Direction::Ascending => ord,
                        Direction::Descending => ord.reverse(),
                    }
                }
                None => by_id,
            }
        });

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

fn complete_id(key: &Key) -> ShopResult<i64> {
    key.id
        .ok_or_else(|| ShopError::Storage(format!("incomplete key for {}", key.kind)))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let store = MemoryDatastore::new();
        let a = store
            .create(Key::incomplete("Thing"), entity(json!({"n": 1})))
            .await
            .unwrap();
        let b = store
            .create(Key::incomplete("Thing"), entity(json!({"n": 2})))
            .await
            .unwrap();

        assert!(a.is_complete());
        assert_ne!(a.id, b.id);
        assert_eq!(store.count("Thing").await, 2);
        assert!(store
            .create(Key::new("Thing", 9), Entity::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_versioned_put() {
        let store = MemoryDatastore::new();
        let key = store
            .create(Key::incomplete("Thing"), entity(json!({"n": 1})))
            .await
            .unwrap();

        let stored = store.get(key).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);

        let outcome = store
            .put_if_version(key, 1, entity(json!({"n": 2})))
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Committed);

        let stale = store
            .put_if_version(key, 1, entity(json!({"n": 3})))
            .await
            .unwrap();
        assert_eq!(stale, PutOutcome::Conflict);

        let stored = store.get(key).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.entity["n"], 2);
    }

    #[tokio::test]
    async fn test_query_filter_order_limit() {
        let store = MemoryDatastore::new();
        for (n, color) in [(3, "red"), (1, "blue"), (2, "red"), (5, "red")] {
            store
                .create(Key::incomplete("Thing"), entity(json!({"n": n, "color": color})))
                .await
                .unwrap();
        }
        store
            .create(Key::incomplete("Other"), entity(json!({"n": 9, "color": "red"})))
            .await
            .unwrap();

        let rows = store
            .query(
                &Query::new("Thing")
                    .filter("color", "red")
                    .order_by("n", Direction::Descending)
                    .limit(2),
            )
            .await
            .unwrap();

        let ns: Vec<i64> = rows.iter().map(|(_, e)| e["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![5, 3]);
    }
}
