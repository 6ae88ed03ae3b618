//! Value objects shared by the order and catalog aggregates.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// SKU (Stock Keeping Unit) value object.
///
/// Generated codes are the first segment of a v4 UUID, uppercased,
/// matching the catalog's historical format.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> Result<Self, SkuError> {
        let value = value.into().trim().to_uppercase();
        if value.is_empty() {
            return Err(SkuError::Empty);
        }
        if value.len() > 50 {
            return Err(SkuError::TooLong);
        }
        Ok(Self(value))
    }

    /// Generates a short unique product code. Uniqueness is enforced by
    /// the database constraint; collisions surface as insert errors.
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().to_string();
        let head = raw.split('-').next().unwrap_or("00000000");
        Self(head.to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum SkuError {
    Empty,
    TooLong,
}
impl std::error::Error for SkuError {}
impl fmt::Display for SkuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "SKU empty"),
            Self::TooLong => write!(f, "SKU too long"),
        }
    }
}

/// Non-negative stock quantity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self {
        Self(value)
    }
    pub fn value(&self) -> u32 {
        self.0
    }
    pub fn add(&self, other: u32) -> Self {
        Self(self.0.saturating_add(other))
    }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 {
            None
        } else {
            Some(Self(self.0 - other))
        }
    }
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_normalizes_case() {
        let sku = Sku::new("prod-001").unwrap();
        assert_eq!(sku.as_str(), "PROD-001");
    }

    #[test]
    fn sku_rejects_empty() {
        assert!(Sku::new("   ").is_err());
    }

    #[test]
    fn generated_sku_is_short_and_upper() {
        let sku = Sku::generate();
        assert_eq!(sku.as_str().len(), 8);
        assert_eq!(sku.as_str(), sku.as_str().to_uppercase());
    }

    #[test]
    fn quantity_never_goes_negative() {
        let q = Quantity::new(3);
        assert_eq!(q.subtract(5), None);
        assert_eq!(q.subtract(3).unwrap().value(), 0);
    }
}
