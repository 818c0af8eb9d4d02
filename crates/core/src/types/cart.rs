//! Client cart: an ordered list of purchasable line items.
//!
//! A cart is mutated only by appending an item or by replacing its whole
//! contents. There is no single-item removal and no quantity merging; adding
//! the same listing twice yields two lines.

use serde::{Deserialize, Serialize};

use super::price::Cents;

/// A single line in the cart.
///
/// Serialized as `{ "id": string, "name": string, "price": integer }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Identifier of the purchased thing (a listing id rendered as a string).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Price in cents.
    pub price: Cents,
}

impl CartItem {
    /// Create a cart item.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Cents) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
        }
    }
}

/// Ordered sequence of [`CartItem`]s.
///
/// Serialized as a bare JSON array so the persisted form is exactly the list
/// of items.
///
/// # Examples
///
/// ```
/// use campus_cart_core::{Cart, CartItem, Cents};
///
/// let mut cart = Cart::new();
/// cart.push(CartItem::new("1", "Calculator", Cents::new(1500)));
/// cart.push(CartItem::new("2", "Lab coat", Cents::new(799)));
///
/// assert_eq!(cart.len(), 2);
/// assert_eq!(cart.total().decimal(), "22.99");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Load a cart from its persisted JSON form.
    ///
    /// Absent or unparseable input yields an empty cart; a corrupt stored
    /// value must never break the page.
    #[must_use]
    pub fn from_json(raw: Option<&str>) -> Self {
        raw.and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    }

    /// Load a cart from an already-decoded JSON value, with the same
    /// leniency as [`Cart::from_json`].
    #[must_use]
    pub fn from_value(value: Option<serde_json::Value>) -> Self {
        value
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    /// The persisted JSON form (an array of items).
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails, which cannot
    /// happen for well-formed items.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Append an item.
    pub fn push(&mut self, item: CartItem) {
        self.items.push(item);
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Replace the whole cart with a single item.
    pub fn replace_with(&mut self, item: CartItem) {
        self.items.clear();
        self.items.push(item);
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Sum of all item prices.
    #[must_use]
    pub fn total(&self) -> Cents {
        self.items.iter().map(|item| item.price).sum()
    }
}

impl FromIterator<CartItem> for Cart {
    fn from_iter<T: IntoIterator<Item = CartItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: &str, price: u64) -> CartItem {
        CartItem::new(id, format!("Item {id}"), Cents::new(price))
    }

    #[test]
    fn test_push_counts_every_add() {
        let mut cart = Cart::new();
        for n in 1..=5 {
            cart.push(item("7", 100));
            assert_eq!(cart.len(), n);
        }
        // Same id twice is two lines, not a quantity
        assert!(cart.items().iter().all(|i| i.id == "7"));
    }

    #[test]
    fn test_total_is_sum_of_prices() {
        let cart: Cart = [item("1", 1500), item("2", 799), item("3", 1)]
            .into_iter()
            .collect();
        assert_eq!(cart.total(), Cents::new(2300));
        assert_eq!(cart.total().decimal(), "23.00");
        assert_eq!(Cart::new().total(), Cents::ZERO);
    }

    #[test]
    fn test_clear_and_replace() {
        let mut cart: Cart = [item("1", 100), item("2", 200)].into_iter().collect();
        cart.replace_with(item("9", 900));
        assert_eq!(cart.items(), &[item("9", 900)]);

        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.to_json().unwrap(), "[]");
    }

    #[test]
    fn test_persisted_form_is_array_of_items() {
        let cart: Cart = [item("1", 1500)].into_iter().collect();
        assert_eq!(
            cart.to_json().unwrap(),
            r#"[{"id":"1","name":"Item 1","price":1500}]"#
        );
        let json = cart.to_json().unwrap();
        assert_eq!(Cart::from_json(Some(json.as_str())), cart);
    }

    #[test]
    fn test_from_json_is_lenient() {
        assert!(Cart::from_json(None).is_empty());
        assert!(Cart::from_json(Some("")).is_empty());
        assert!(Cart::from_json(Some("not json")).is_empty());
        assert!(Cart::from_json(Some("{\"id\":1}")).is_empty());
        // A NaN price from a broken attribute serializes as null
        assert!(Cart::from_json(Some(r#"[{"id":"1","name":"x","price":null}]"#)).is_empty());
        assert!(Cart::from_json(Some(r#"[{"id":"1","name":"x","price":-3}]"#)).is_empty());
    }

    #[test]
    fn test_from_value_is_lenient() {
        assert!(Cart::from_value(None).is_empty());
        assert!(Cart::from_value(Some(serde_json::json!("oops"))).is_empty());
        let cart = Cart::from_value(Some(serde_json::json!([
            {"id": "4", "name": "Drafter", "price": 350}
        ])));
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.total(), Cents::new(350));
    }
}
