//! # Order Store
//!
//! Persistence of orders over a document store collaborator.
//!
//! The `Datastore` trait is the storage contract (create / get / versioned put /
//! query). `OrderStore` adds the order encoding and the bounded optimistic
//! transaction used for every update.

mod memory;
pub mod record;

pub use memory::MemoryDatastore;

use crate::error::{ShopError, ShopResult};
use crate::order::{Order, OrderStatus};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Entity kind under which orders are stored
pub const ORDER_KIND: &str = "Order";

/// Attempts made by a transaction before giving up
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 3;

/// Property bag persisted by the datastore
pub type Entity = serde_json::Map<String, Value>;

/// Entity key; incomplete until the datastore assigns an id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key {
    pub kind: &'static str,
    pub id: Option<i64>,
}

impl Key {
    pub fn incomplete(kind: &'static str) -> Self {
        Self { kind, id: None }
    }

    pub fn new(kind: &'static str, id: i64) -> Self {
        Self { kind, id: Some(id) }
    }

    pub fn is_complete(&self) -> bool {
        self.id.is_some()
    }
}

/// An entity together with its write version
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub version: u64,
    pub entity: Entity,
}

/// Outcome of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Committed,
    /// Someone else wrote the entity since it was read
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Query over one entity kind: equality filters, one sort property, a limit
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub kind: &'static str,
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    pub fn filter(mut self, property: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((property.into(), value.into()));
        self
    }

    pub fn order_by(mut self, property: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((property.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document store contract consumed by the order store.
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Persist a new entity under an incomplete key and return the completed key.
    async fn create(&self, key: Key, entity: Entity) -> ShopResult<Key>;

    /// Fetch an entity and its version; `None` if the key does not exist.
    async fn get(&self, key: Key) -> ShopResult<Option<Versioned>>;

    /// Overwrite an entity only if it is still at `expected_version`.
    async fn put_if_version(
        &self,
        key: Key,
        expected_version: u64,
        entity: Entity,
    ) -> ShopResult<PutOutcome>;

    /// Run a query, returning matching keys and entities.
    async fn query(&self, query: &Query) -> ShopResult<Vec<(Key, Entity)>>;
}

/// Orders over a `Datastore`
#[derive(Clone)]
pub struct OrderStore {
    datastore: Arc<dyn Datastore>,
    max_attempts: u32,
}

impl OrderStore {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self {
            datastore,
            max_attempts: MAX_TRANSACTION_ATTEMPTS,
        }
    }

    /// Builder: change the transaction attempt budget
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Persist a new order and return it with its assigned id
    #[instrument(skip(self, order), fields(items = order.product_ids.len()))]
    pub async fn create(&self, mut order: Order) -> ShopResult<Order> {
        if order.id.is_some() {
            return Err(ShopError::Validation(
                "order already has an id; use update".to_string(),
            ));
        }

        let entity = record::encode(&order)?;
        let key = self
            .datastore
            .create(Key::incomplete(ORDER_KIND), entity)
            .await?;
        let id = key
            .id
            .ok_or_else(|| ShopError::Storage("datastore returned an incomplete key".to_string()))?;

        order.id = Some(id);
        info!(order_id = id, "Created order");
        Ok(order)
    }

    /// Fetch an order by id
    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> ShopResult<Order> {
        let stored = self
            .datastore
            .get(Key::new(ORDER_KIND, id))
            .await?
            .ok_or(ShopError::NotFound {
                kind: ORDER_KIND,
                id,
            })?;
        record::decode(id, stored.entity)
    }

    /// Full-overwrite update of the editable fields (see `Order::apply_update`)
    #[instrument(skip(self, order), fields(order_id = ?order.id))]
    pub async fn update(&self, order: &Order) -> ShopResult<Order> {
        let id = order.require_id()?;
        self.update_with(id, |stored| stored.apply_update(order))
            .await
    }

    /// Read-modify-write an order inside an optimistic transaction.
    ///
    /// `change` may run once per attempt against a freshly read copy, so it
    /// must not have effects outside the order it is given. Returns the
    /// committed order, or `TooManyConcurrentTransactions` once the attempt
    /// budget is spent on write conflicts.
    pub async fn update_with<F>(&self, id: i64, change: F) -> ShopResult<Order>
    where
        F: Fn(&mut Order) -> ShopResult<()> + Send + Sync,
    {
        let key = Key::new(ORDER_KIND, id);

        for attempt in 1..=self.max_attempts {
            let stored = self.datastore.get(key).await?.ok_or(ShopError::NotFound {
                kind: ORDER_KIND,
                id,
            })?;

            let mut order = record::decode(id, stored.entity)?;
            change(&mut order)?;
            let entity = record::encode(&order)?;

            match self
                .datastore
                .put_if_version(key, stored.version, entity)
                .await?
            {
                PutOutcome::Committed => {
                    debug!(order_id = id, attempt, "Committed order update");
                    return Ok(order);
                }
                PutOutcome::Conflict => {
                    warn!(order_id = id, attempt, "Order update conflicted, retrying");
                }
            }
        }

        Err(ShopError::TooManyConcurrentTransactions {
            attempts: self.max_attempts,
        })
    }

    /// All orders, newest first
    #[instrument(skip(self))]
    pub async fn list(&self) -> ShopResult<Vec<Order>> {
        self.run_query(Query::new(ORDER_KIND).order_by(record::CREATED, Direction::Descending))
            .await
    }

    /// Orders in one status, newest first
    #[instrument(skip(self))]
    pub async fn list_with_status(&self, status: OrderStatus) -> ShopResult<Vec<Order>> {
        self.run_query(
            Query::new(ORDER_KIND)
                .filter(record::STATUS, status.as_str())
                .order_by(record::CREATED, Direction::Descending),
        )
        .await
    }

    async fn run_query(&self, query: Query) -> ShopResult<Vec<Order>> {
        self.datastore
            .query(&query)
            .await?
            .into_iter()
            .map(|(key, entity)| {
                let id = key.id.ok_or_else(|| {
                    ShopError::Storage("query returned an incomplete key".to_string())
                })?;
                record::decode(id, entity)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{CustomerInfo, ProductDetails, ShippingAddress};
    use crate::product::Product;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn new_order(name: &str) -> Order {
        let customer = CustomerInfo {
            shipping: ShippingAddress {
                name: name.into(),
                ..ShippingAddress::default()
            },
            email: format!("{}@example.com", name.to_lowercase()),
            phone: String::new(),
        };
        Order::new(
            customer,
            vec![Product::new(1, "Widget", 1000), Product::new(2, "Gadget", 250)],
            vec![2, 4],
            vec![ProductDetails::for_product(1), ProductDetails::for_product(2)],
            8.0,
        )
        .unwrap()
    }

    fn store() -> OrderStore {
        OrderStore::new(Arc::new(MemoryDatastore::new()))
    }

    #[tokio::test]
    async fn test_create_then_get_round_trip() {
        let store = store();
        let input = new_order("Ada");

        let created = store.create(input.clone()).await.unwrap();
        let id = created.id.unwrap();
        let fetched = store.get(id).await.unwrap();

        assert_eq!(fetched.products, input.products);
        assert_eq!(fetched.product_ids, input.product_ids);
        assert_eq!(fetched.quantities, input.quantities);
        assert_eq!(fetched.product_details, input.product_details);
        assert_eq!(fetched.amount().unwrap(), input.amount().unwrap());
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_missing_order() {
        let err = store().get(404).await.unwrap_err();
        assert!(matches!(err, ShopError::NotFound { kind: "Order", id: 404 }));
    }

    #[tokio::test]
    async fn test_create_rejects_saved_order() {
        let mut order = new_order("Ada");
        order.id = Some(3);
        assert!(matches!(
            store().create(order).await.unwrap_err(),
            ShopError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first_and_by_status() {
        let store = store();
        let first = store.create(new_order("Ada")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.create(new_order("Grace")).await.unwrap();

        store
            .update_with(first.id.unwrap(), |o| {
                o.status = OrderStatus::Pending;
                Ok(())
            })
            .await
            .unwrap();

        let all: Vec<_> = store.list().await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(all, vec![second.id, first.id]);

        let pending = store.list_with_status(OrderStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first.id);
    }

    #[tokio::test]
    async fn test_update_overwrites_editable_fields() {
        let store = store();
        let mut order = store.create(new_order("Ada")).await.unwrap();

        order.shipping.city = "Zurich".into();
        order.status = OrderStatus::Processing;
        order.tax_percent = 99.0;
        store.update(&order).await.unwrap();

        let fetched = store.get(order.id.unwrap()).await.unwrap();
        assert_eq!(fetched.shipping.city, "Zurich");
        assert_eq!(fetched.status, OrderStatus::Processing);
        assert_eq!(fetched.tax_percent, 8.0);
    }

    #[tokio::test]
    async fn test_failed_change_leaves_order_untouched() {
        let store = store();
        let order = store.create(new_order("Ada")).await.unwrap();
        let id = order.id.unwrap();

        let err = store
            .update_with(id, |o| {
                o.status = OrderStatus::Shipped;
                Err(ShopError::Validation("nope".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ShopError::Validation(_)));
        assert_eq!(store.get(id).await.unwrap().status, OrderStatus::Started);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_disjoint_updates_both_land() {
        let store = store();
        let id = store.create(new_order("Ada")).await.unwrap().id.unwrap();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_with(id, |o| {
                        o.address_verified = true;
                        Ok(())
                    })
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_with(id, |o| {
                        o.checkout_step = "payinfo".into();
                        Ok(())
                    })
                    .await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let fetched = store.get(id).await.unwrap();
        assert!(fetched.address_verified);
        assert_eq!(fetched.checkout_step, "payinfo");
    }

    /// Datastore whose conditional writes always lose the race
    struct AlwaysConflicting {
        inner: MemoryDatastore,
        puts: AtomicU32,
    }

    #[async_trait]
    impl Datastore for AlwaysConflicting {
        async fn create(&self, key: Key, entity: Entity) -> ShopResult<Key> {
            self.inner.create(key, entity).await
        }

        async fn get(&self, key: Key) -> ShopResult<Option<Versioned>> {
            self.inner.get(key).await
        }

        async fn put_if_version(&self, _: Key, _: u64, _: Entity) -> ShopResult<PutOutcome> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(PutOutcome::Conflict)
        }

        async fn query(&self, query: &Query) -> ShopResult<Vec<(Key, Entity)>> {
            self.inner.query(query).await
        }
    }

    #[tokio::test]
    async fn test_transaction_exhaustion_is_reported() {
        let datastore = Arc::new(AlwaysConflicting {
            inner: MemoryDatastore::new(),
            puts: AtomicU32::new(0),
        });
        let store = OrderStore::new(datastore.clone());
        let id = store.create(new_order("Ada")).await.unwrap().id.unwrap();

        let err = store
            .update_with(id, |o| {
                o.address_verified = true;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ShopError::TooManyConcurrentTransactions { attempts: 3 }
        ));
        assert_eq!(datastore.puts.load(Ordering::SeqCst), MAX_TRANSACTION_ATTEMPTS);
        assert!(!store.get(id).await.unwrap().address_verified);
    }
}
