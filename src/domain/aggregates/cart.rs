//! Cart Aggregate
//!
//! A session-owned mapping of product id to quantity. Entries always hold at
//! least one unit; prices are not stored and are read from the catalog
//! whenever details are computed.

use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::product::Product;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Money { self.product.price().multiply(self.quantity) }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CartDetails {
    pub lines: Vec<CartLine>,
    pub total_quantity: u32,
    pub total_price: Money,
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    /// Rebuild from stored rows. Zero quantities are dropped and duplicate ids merged.
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items.into_iter().filter(|i| i.quantity > 0) {
            match cart.items.iter_mut().find(|i| i.product_id == item.product_id) {
                Some(existing) => existing.quantity += item.quantity,
                None => cart.items.push(item),
            }
        }
        cart
    }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn product_ids(&self) -> impl Iterator<Item = Uuid> + '_ { self.items.iter().map(|i| i.product_id) }

    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.items.iter().find(|i| i.product_id == product_id).map_or(0, |i| i.quantity)
    }

    /// Add one unit. Returns false, leaving the cart untouched, when the
    /// product cannot cover the resulting quantity.
    pub fn add_item(&mut self, product: &Product) -> bool {
        let current = self.quantity_of(product.id());
        if !product.has_enough_stock(current + 1) { return false; }
        match self.items.iter_mut().find(|i| i.product_id == product.id()) {
            Some(existing) => existing.quantity += 1,
            None => self.items.push(CartItem { product_id: product.id(), quantity: 1 }),
        }
        true
    }

    pub fn remove_item(&mut self, product_id: Uuid) { self.items.retain(|i| i.product_id != product_id); }

    pub fn decrease_item(&mut self, product_id: Uuid) {
        let Some(pos) = self.items.iter().position(|i| i.product_id == product_id) else { return };
        if self.items[pos].quantity < 2 { self.items.remove(pos); } else { self.items[pos].quantity -= 1; }
    }

    pub fn clear(&mut self) { self.items.clear(); }

    /// Price the cart against current catalog data. Ids the resolver no
    /// longer knows are skipped.
    pub fn details<F>(&self, mut resolve: F) -> CartDetails
    where
        F: FnMut(Uuid) -> Option<Product>,
    {
        let mut details = CartDetails::default();
        for item in &self.items {
            let Some(product) = resolve(item.product_id) else { continue };
            let line = CartLine { product, quantity: item.quantity };
            details.total_quantity += line.quantity;
            details.total_price = details.total_price + line.line_total();
            details.lines.push(line);
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64, stock: u32) -> Product {
        Product::create("Canvas tote", Money::from_minor(price), stock).unwrap()
    }

    #[test]
    fn test_cart_operations() {
        let p = product(1500, 10);
        let mut cart = Cart::new();
        assert!(cart.add_item(&p));
        assert!(cart.add_item(&p));
        assert_eq!(cart.quantity_of(p.id()), 2);
        cart.decrease_item(p.id());
        assert_eq!(cart.quantity_of(p.id()), 1);
        cart.decrease_item(p.id());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_past_stock_is_refused() {
        let p = product(1000, 2);
        let mut cart = Cart::new();
        assert!(cart.add_item(&p));
        assert!(cart.add_item(&p));
        assert!(!cart.add_item(&p));
        assert_eq!(cart.quantity_of(p.id()), 2);
    }

    #[test]
    fn test_add_out_of_stock_product_never_creates_entry() {
        let p = product(1000, 0);
        let mut cart = Cart::new();
        assert!(!cart.add_item(&p));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_is_unconditional() {
        let p = product(1000, 5);
        let mut cart = Cart::new();
        cart.add_item(&p);
        cart.add_item(&p);
        cart.remove_item(p.id());
        cart.remove_item(Uuid::new_v4());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_from_items_drops_zero_and_merges() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let cart = Cart::from_items([
            CartItem { product_id: a, quantity: 2 },
            CartItem { product_id: b, quantity: 0 },
            CartItem { product_id: a, quantity: 1 },
        ]);
        assert_eq!(cart.items(), &[CartItem { product_id: a, quantity: 3 }]);
    }

    #[test]
    fn test_details_skip_unresolvable_products() {
        let kept = product(1250, 10);
        let gone = product(999, 10);
        let mut cart = Cart::new();
        cart.add_item(&kept);
        cart.add_item(&kept);
        cart.add_item(&gone);

        let catalog = [kept.clone()];
        let details = cart.details(|id| catalog.iter().find(|p| p.id() == id).cloned());
        assert_eq!(details.lines.len(), 1);
        assert_eq!(details.total_quantity, 2);
        assert_eq!(details.total_price, Money::from_minor(2500));
    }

    #[test]
    fn test_details_use_current_price() {
        let mut p = product(1000, 10);
        let mut cart = Cart::new();
        cart.add_item(&p);
        p.update_price(Money::from_minor(1200)).unwrap();
        let details = cart.details(|_| Some(p.clone()));
        assert_eq!(details.total_price, Money::from_minor(1200));
    }
}
