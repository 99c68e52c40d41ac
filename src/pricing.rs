//! Order total arithmetic: subtotal, shipping tier and coupon discount.
//!
//! All amounts are in minor currency units.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const FREE_SHIPPING_THRESHOLD: i64 = 5_000;
pub const STANDARD_SHIPPING_FEE: i64 = 500;
pub const EXPRESS_SHIPPING_FEE: i64 = 1_500;
/// Highest unit price a product may be listed at (1,000,000.00).
pub const MAX_UNIT_PRICE: i64 = 100_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    #[default]
    Standard,
    Express,
}

impl ShippingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "standard",
            ShippingMethod::Express => "express",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// Whole percent, 1..=100.
    Percent(i64),
    Fixed(i64),
}

impl Discount {
    /// Build a discount from the `discount_type`/`value` pair stored on a coupon.
    pub fn from_parts(discount_type: &str, value: i64) -> Option<Self> {
        if value <= 0 {
            return None;
        }
        match discount_type {
            "percent" if value <= 100 => Some(Discount::Percent(value)),
            "fixed" => Some(Discount::Fixed(value)),
            _ => None,
        }
    }
}

pub fn shipping_fee(method: ShippingMethod, subtotal: i64) -> i64 {
    if subtotal <= 0 {
        return 0;
    }
    match method {
        ShippingMethod::Standard if subtotal >= FREE_SHIPPING_THRESHOLD => 0,
        ShippingMethod::Standard => STANDARD_SHIPPING_FEE,
        ShippingMethod::Express => EXPRESS_SHIPPING_FEE,
    }
}

/// `price * quantity`, or `None` when it does not fit in an i64.
pub fn line_total(price: i64, quantity: i32) -> Option<i64> {
    price.checked_mul(i64::from(quantity))
}

/// Sum of `(unit price, quantity)` lines, or `None` on overflow.
pub fn cart_subtotal<I>(lines: I) -> Option<i64>
where
    I: IntoIterator<Item = (i64, i32)>,
{
    lines
        .into_iter()
        .try_fold(0_i64, |acc, (price, quantity)| acc.checked_add(line_total(price, quantity)?))
}

/// Discount never exceeds the subtotal.
pub fn coupon_discount(discount: Discount, subtotal: i64) -> i64 {
    if subtotal <= 0 {
        return 0;
    }
    let amount = match discount {
        // Widened so large subtotals cannot overflow; the result is <= subtotal.
        Discount::Percent(pct) => (i128::from(subtotal) * i128::from(pct.clamp(0, 100)) / 100) as i64,
        Discount::Fixed(value) => value.max(0),
    };
    amount.min(subtotal)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub shipping_fee: i64,
    pub discount: i64,
    pub total: i64,
}

impl OrderTotals {
    pub fn compute(subtotal: i64, method: ShippingMethod, discount: Option<Discount>) -> Self {
        let subtotal = subtotal.max(0);
        let shipping_fee = shipping_fee(method, subtotal);
        let discount = discount
            .map(|d| coupon_discount(d, subtotal))
            .unwrap_or(0);
        let total = (subtotal - discount).saturating_add(shipping_fee).max(0);
        Self {
            subtotal,
            shipping_fee,
            discount,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_shipping_is_free_above_threshold() {
        assert_eq!(shipping_fee(ShippingMethod::Standard, 4_999), STANDARD_SHIPPING_FEE);
        assert_eq!(shipping_fee(ShippingMethod::Standard, FREE_SHIPPING_THRESHOLD), 0);
    }

    #[test]
    fn express_shipping_is_flat() {
        assert_eq!(shipping_fee(ShippingMethod::Express, 100), EXPRESS_SHIPPING_FEE);
        assert_eq!(shipping_fee(ShippingMethod::Express, 100_000), EXPRESS_SHIPPING_FEE);
    }

    #[test]
    fn empty_cart_ships_for_free() {
        assert_eq!(shipping_fee(ShippingMethod::Express, 0), 0);
    }

    #[test]
    fn percent_discount_rounds_down() {
        assert_eq!(coupon_discount(Discount::Percent(15), 999), 149);
    }

    #[test]
    fn fixed_discount_is_capped_at_subtotal() {
        assert_eq!(coupon_discount(Discount::Fixed(2_000), 1_500), 1_500);
    }

    #[test]
    fn totals_combine_discount_and_shipping() {
        let totals = OrderTotals::compute(4_000, ShippingMethod::Standard, Some(Discount::Percent(10)));
        assert_eq!(totals.discount, 400);
        assert_eq!(totals.shipping_fee, STANDARD_SHIPPING_FEE);
        assert_eq!(totals.total, 4_000 - 400 + STANDARD_SHIPPING_FEE);
    }

    #[test]
    fn full_discount_still_charges_shipping() {
        let totals = OrderTotals::compute(1_000, ShippingMethod::Express, Some(Discount::Fixed(5_000)));
        assert_eq!(totals.discount, 1_000);
        assert_eq!(totals.total, EXPRESS_SHIPPING_FEE);
    }

    #[test]
    fn percent_discount_on_huge_subtotal_does_not_overflow() {
        let subtotal = i64::MAX / 2;
        assert_eq!(coupon_discount(Discount::Percent(10), subtotal), subtotal / 10);
        assert_eq!(coupon_discount(Discount::Percent(100), i64::MAX), i64::MAX);
    }

    #[test]
    fn totals_saturate_instead_of_wrapping() {
        let totals = OrderTotals::compute(i64::MAX, ShippingMethod::Express, None);
        assert_eq!(totals.shipping_fee, EXPRESS_SHIPPING_FEE);
        assert_eq!(totals.total, i64::MAX);
    }

    #[test]
    fn subtotal_reports_overflow() {
        assert_eq!(cart_subtotal([(1_250, 2), (500, 3)]), Some(4_000));
        assert_eq!(cart_subtotal([(i64::MAX / 2, 3)]), None);
        assert_eq!(cart_subtotal([(i64::MAX / 2, 2), (i64::MAX / 2, 2)]), None);
        assert_eq!(line_total(MAX_UNIT_PRICE, i32::MAX), Some(MAX_UNIT_PRICE * i64::from(i32::MAX)));
    }

    #[test]
    fn discount_parts_are_validated() {
        assert_eq!(Discount::from_parts("percent", 20), Some(Discount::Percent(20)));
        assert_eq!(Discount::from_parts("percent", 120), None);
        assert_eq!(Discount::from_parts("fixed", 0), None);
        assert_eq!(Discount::from_parts("bogo", 5), None);
    }
}
