//! Catalog pricing and inventory rules.

use rust_decimal::Decimal;

use crate::domain::value_objects::Quantity;

/// Pricing fields of a product. The selling price is always derived from
/// MRP and discount percent; it is never stored independently, so
/// `selling_price <= mrp` holds by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pricing {
    pub cost_price: Decimal,
    pub mrp: Decimal,
    pub discount_percent: u32,
}

impl Pricing {
    pub fn new(cost_price: Decimal, mrp: Decimal, discount_percent: u32) -> Result<Self, PricingError> {
        if discount_percent > 100 {
            return Err(PricingError::DiscountOutOfRange);
        }
        if mrp < Decimal::ZERO || cost_price < Decimal::ZERO {
            return Err(PricingError::NegativePrice);
        }
        Ok(Self { cost_price, mrp, discount_percent })
    }

    /// Amount knocked off the MRP by the percentage discount.
    pub fn discount_amount(&self) -> Decimal {
        self.mrp * Decimal::from(self.discount_percent) / Decimal::from(100u32)
    }

    /// The price a line item is charged at: MRP less the discount.
    pub fn selling_price(&self) -> Decimal {
        self.mrp - self.discount_amount()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PricingError {
    DiscountOutOfRange,
    NegativePrice,
}
impl std::error::Error for PricingError {}
impl std::fmt::Display for PricingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DiscountOutOfRange => write!(f, "discount percent must be 0-100"),
            Self::NegativePrice => write!(f, "prices must be non-negative"),
        }
    }
}

/// Inventory state of a product. Stock reservations fail rather than go
/// negative, which is what keeps orders from overselling.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Inventory {
    quantity: Quantity,
}

impl Inventory {
    pub fn new(quantity: u32) -> Self {
        Self { quantity: Quantity::new(quantity) }
    }

    pub fn quantity(&self) -> u32 {
        self.quantity.value()
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Takes `qty` units out of stock, or fails when fewer are available.
    pub fn reserve(&self, qty: u32) -> Result<Inventory, InventoryError> {
        let remaining = self
            .quantity
            .subtract(qty)
            .ok_or(InventoryError::Insufficient { available: self.quantity.value(), requested: qty })?;
        Ok(Inventory { quantity: remaining })
    }

    /// Puts units back, e.g. on cancellation or a processed return.
    pub fn restock(&self, qty: u32) -> Inventory {
        Inventory { quantity: self.quantity.add(qty) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    Insufficient { available: u32, requested: u32 },
}
impl std::error::Error for InventoryError {}
impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Insufficient { available, requested } => {
                write!(f, "insufficient stock: {requested} requested, {available} available")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn selling_price_applies_percentage_discount() {
        let p = Pricing::new(dec("60"), dec("100"), 15).unwrap();
        assert_eq!(p.discount_amount(), dec("15"));
        assert_eq!(p.selling_price(), dec("85"));
    }

    #[test]
    fn selling_price_never_exceeds_mrp() {
        for pct in [0u32, 1, 50, 99, 100] {
            let p = Pricing::new(dec("10"), dec("49.99"), pct).unwrap();
            assert!(p.selling_price() <= p.mrp);
        }
    }

    #[test]
    fn discount_over_100_rejected() {
        assert_eq!(
            Pricing::new(dec("1"), dec("2"), 101).unwrap_err(),
            PricingError::DiscountOutOfRange
        );
    }

    #[test]
    fn reserve_rejects_oversell() {
        let inv = Inventory::new(5);
        let err = inv.reserve(6).unwrap_err();
        assert_eq!(err, InventoryError::Insufficient { available: 5, requested: 6 });
        let after = inv.reserve(5).unwrap();
        assert!(after.is_out_of_stock());
    }

    #[test]
    fn restock_after_cancellation() {
        let inv = Inventory::new(2).reserve(2).unwrap().restock(2);
        assert_eq!(inv.quantity(), 2);
    }
}
