//! Cart persistence.
//!
//! The cart is a JSON array of items stored under one session key. Reads are
//! lenient: a missing or unreadable value is an empty cart, never an error.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tower_sessions::Session;

use campus_cart_core::{Cart, CartItem};

use crate::error::add_breadcrumb;
use crate::models::session::keys;

/// Errors that can occur when writing a cart back to storage.
#[derive(Debug, Error)]
pub enum CartStoreError {
    /// Session backend rejected the write.
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Cart could not be encoded.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Storage for one visitor's cart.
pub trait CartStore: Send + Sync {
    /// Load the persisted cart. Absent or unparseable state is an empty cart.
    fn load(&self) -> impl Future<Output = Cart> + Send;

    /// Persist `cart`, replacing whatever was stored.
    fn save(&self, cart: &Cart) -> impl Future<Output = Result<(), CartStoreError>> + Send;
}

/// Cart store backed by the request's `tower-sessions` session.
#[derive(Clone)]
pub struct SessionCartStore {
    session: Session,
}

impl SessionCartStore {
    /// Wrap a session.
    #[must_use]
    pub const fn new(session: Session) -> Self {
        Self { session }
    }
}

impl CartStore for SessionCartStore {
    async fn load(&self) -> Cart {
        let value = match self.session.get::<serde_json::Value>(keys::CART).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read cart from session");
                return Cart::new();
            }
        };

        let Some(value) = value else {
            return Cart::new();
        };

        match serde_json::from_value::<Cart>(value) {
            Ok(cart) => cart,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable cart");
                Cart::new()
            }
        }
    }

    async fn save(&self, cart: &Cart) -> Result<(), CartStoreError> {
        self.session.insert(keys::CART, cart).await?;
        Ok(())
    }
}

/// In-memory cart store holding the raw persisted JSON.
///
/// Clones share the same slot, so a test can keep one handle and inspect what
/// the code under test wrote.
#[derive(Clone, Default)]
pub struct MemoryCartStore {
    raw: Arc<Mutex<Option<String>>>,
}

impl MemoryCartStore {
    /// An empty store (nothing persisted yet).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with raw persisted text, valid or not.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    /// The raw persisted text, if anything was stored.
    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.raw
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CartStore for MemoryCartStore {
    async fn load(&self) -> Cart {
        Cart::from_json(self.raw().as_deref())
    }

    async fn save(&self, cart: &Cart) -> Result<(), CartStoreError> {
        let json = cart.to_json()?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(json);
        Ok(())
    }
}

/// Cart mutations over any [`CartStore`].
///
/// Every mutation loads the current state, applies the change, and writes the
/// whole cart back before returning the new state.
pub struct CartService<S> {
    store: S,
}

impl<S: CartStore> CartService<S> {
    /// Create a cart service over `store`.
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The current cart.
    pub async fn current(&self) -> Cart {
        self.store.load().await
    }

    /// Append an item.
    ///
    /// # Errors
    ///
    /// Returns `CartStoreError` if the updated cart cannot be saved.
    pub async fn add(&self, item: CartItem) -> Result<Cart, CartStoreError> {
        let mut cart = self.store.load().await;
        add_breadcrumb("cart", "Added item", Some(&[("item_id", item.id.as_str())]));
        cart.push(item);
        self.store.save(&cart).await?;
        Ok(cart)
    }

    /// Replace the cart with a single item.
    ///
    /// # Errors
    ///
    /// Returns `CartStoreError` if the updated cart cannot be saved.
    pub async fn buy_now(&self, item: CartItem) -> Result<Cart, CartStoreError> {
        let mut cart = self.store.load().await;
        add_breadcrumb("cart", "Buy now", Some(&[("item_id", item.id.as_str())]));
        cart.replace_with(item);
        self.store.save(&cart).await?;
        Ok(cart)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartStoreError` if the empty cart cannot be saved.
    pub async fn clear(&self) -> Result<Cart, CartStoreError> {
        let cart = Cart::new();
        self.store.save(&cart).await?;
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use campus_cart_core::Cents;

    use super::*;
    use crate::cart::CartView;

    fn item(id: &str, cents: u64) -> CartItem {
        CartItem::new(id, format!("Item {id}"), Cents::new(cents))
    }

    #[tokio::test]
    async fn test_adding_n_items_shows_count_n() {
        let cart = CartService::new(MemoryCartStore::new());
        for n in 1..=4 {
            let state = cart.add(item("1", 250)).await.unwrap_or_default();
            assert_eq!(CartView::from(&state).icon_label, format!("Cart ({n})"));
        }
        assert_eq!(cart.current().await.len(), 4);
    }

    #[tokio::test]
    async fn test_every_mutation_is_persisted() {
        let store = MemoryCartStore::new();
        let cart = CartService::new(store.clone());

        assert_eq!(store.raw(), None);
        let _ = cart.add(item("1", 1500)).await;
        assert_eq!(
            store.raw().as_deref(),
            Some(r#"[{"id":"1","name":"Item 1","price":1500}]"#)
        );

        let _ = cart.buy_now(item("2", 799)).await;
        assert_eq!(
            store.raw().as_deref(),
            Some(r#"[{"id":"2","name":"Item 2","price":799}]"#)
        );

        let _ = cart.clear().await;
        assert_eq!(store.raw().as_deref(), Some("[]"));
        assert!(cart.current().await.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_state_loads_empty() {
        for raw in ["", "{", "null", "{\"items\":[]}", r#"[{"id":1}]"#] {
            let cart = CartService::new(MemoryCartStore::with_raw(raw));
            assert!(cart.current().await.is_empty(), "raw {raw:?}");
        }
    }

    #[tokio::test]
    async fn test_add_after_corrupt_state_starts_fresh() {
        let store = MemoryCartStore::with_raw("not json");
        let cart = CartService::new(store.clone());

        let state = cart.add(item("5", 100)).await.unwrap_or_default();
        assert_eq!(state.len(), 1);
        assert_eq!(Cart::from_json(store.raw().as_deref()), state);
    }

    #[tokio::test]
    async fn test_session_store_round_trips_through_session() {
        let session = Session::new(None, Arc::new(tower_sessions::MemoryStore::default()), None);
        let cart = CartService::new(SessionCartStore::new(session.clone()));

        let _ = cart.add(item("1", 100)).await;
        let _ = cart.add(item("2", 200)).await;

        let reloaded = SessionCartStore::new(session).load().await;
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.total(), Cents::new(300));
    }

    #[tokio::test]
    async fn test_session_store_discards_wrong_shape() {
        let session = Session::new(None, Arc::new(tower_sessions::MemoryStore::default()), None);
        let _ = session.insert(keys::CART, "definitely not a cart").await;

        let cart = SessionCartStore::new(session).load().await;
        assert!(cart.is_empty());
    }
}
