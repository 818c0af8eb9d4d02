//! Cart display data for templates.

use campus_cart_core::{Cart, CartItem, Cents};

/// One rendered cart line: `{name} - ${price}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLineView {
    pub name: String,
    /// Price with currency sign, e.g. `$15.00`.
    pub price: String,
}

impl From<&CartItem> for CartLineView {
    fn from(item: &CartItem) -> Self {
        Self {
            name: item.name.clone(),
            price: item.price.display(),
        }
    }
}

/// Everything the cart fragments show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    /// Cart icon text, `Cart (N)`.
    pub icon_label: String,
    pub count: usize,
    /// Lines in insertion order.
    pub lines: Vec<CartLineView>,
    /// Total without currency sign, e.g. `23.00`.
    pub total: String,
    /// Total in cents, sent as the checkout amount.
    pub amount: Cents,
    pub is_empty: bool,
}

impl CartView {
    /// The view of an empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::from(&Cart::new())
    }
}

impl From<&Cart> for CartView {
    fn from(cart: &Cart) -> Self {
        let amount = cart.total();
        Self {
            icon_label: format!("Cart ({})", cart.len()),
            count: cart.len(),
            lines: cart.items().iter().map(CartLineView::from).collect(),
            total: amount.decimal(),
            amount,
            is_empty: cart.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_of_populated_cart() {
        let cart: Cart = [
            CartItem::new("1", "Calculator", Cents::new(1500)),
            CartItem::new("2", "Lab coat", Cents::new(799)),
            CartItem::new("1", "Calculator", Cents::new(1500)),
        ]
        .into_iter()
        .collect();

        let view = CartView::from(&cart);
        assert_eq!(view.icon_label, "Cart (3)");
        assert_eq!(view.total, "37.99");
        assert_eq!(view.amount, Cents::new(3799));
        assert!(!view.is_empty);
        assert_eq!(
            view.lines,
            vec![
                CartLineView {
                    name: "Calculator".to_string(),
                    price: "$15.00".to_string()
                },
                CartLineView {
                    name: "Lab coat".to_string(),
                    price: "$7.99".to_string()
                },
                CartLineView {
                    name: "Calculator".to_string(),
                    price: "$15.00".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_empty_view() {
        let view = CartView::empty();
        assert_eq!(view.icon_label, "Cart (0)");
        assert_eq!(view.total, "0.00");
        assert!(view.lines.is_empty());
        assert!(view.is_empty);
    }

    #[test]
    fn test_sub_dollar_prices_keep_two_decimals() {
        let cart: Cart = [CartItem::new("9", "Eraser", Cents::new(5))]
            .into_iter()
            .collect();
        let view = CartView::from(&cart);
        assert_eq!(view.lines[0].price, "$0.05");
        assert_eq!(view.total, "0.05");
    }
}
