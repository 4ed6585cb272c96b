//! Shipping, tax and payment-fee policy.
//!
//! Every charge is computed from the exact (unrounded) subtotal. Each
//! component is reported rounded to currency precision, and the grand total
//! is rounded once over the exact sum, so it can differ by a paisa from the
//! sum of the displayed components.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bazaar_core::{PaymentMethod, Price};
use rust_decimal::Decimal;

use crate::models::OrderTotals;

/// Default GST rate applied to the subtotal.
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 2);

/// Default gateway processing fee for online payments.
pub const DEFAULT_PAYMENT_FEE_RATE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Computes the shipping charge for a cart subtotal.
pub trait ShippingRule: Send + Sync + fmt::Debug {
    fn shipping_cost(&self, subtotal: Price) -> Price;
}

/// Built-in shipping rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShippingPolicy {
    /// Shipping is always free.
    #[default]
    Free,
    /// The same fee on every order.
    Flat { fee: Price },
    /// Free at or above `threshold`, otherwise `fee`.
    FreeAbove { threshold: Price, fee: Price },
}

impl ShippingRule for ShippingPolicy {
    fn shipping_cost(&self, subtotal: Price) -> Price {
        match *self {
            Self::Free => Price::ZERO,
            Self::Flat { fee } => fee,
            Self::FreeAbove { threshold, fee } => {
                if subtotal >= threshold {
                    Price::ZERO
                } else {
                    fee
                }
            }
        }
    }
}

/// Error parsing a shipping policy string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid shipping policy '{0}': expected free, flat:<fee> or free_above:<threshold>:<fee>")]
pub struct ParseShippingPolicyError(String);

impl FromStr for ShippingPolicy {
    type Err = ParseShippingPolicyError;

    /// Parses `free`, `flat:<fee>` or `free_above:<threshold>:<fee>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseShippingPolicyError(s.to_string());
        let amount = |v: &str| {
            v.trim()
                .parse::<Decimal>()
                .ok()
                .filter(|d| !d.is_sign_negative())
                .map(Price::new)
                .ok_or_else(err)
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        match parts.as_slice() {
            ["free"] => Ok(Self::Free),
            ["flat", fee] => Ok(Self::Flat { fee: amount(fee)? }),
            ["free_above", threshold, fee] => Ok(Self::FreeAbove {
                threshold: amount(threshold)?,
                fee: amount(fee)?,
            }),
            _ => Err(err()),
        }
    }
}

/// All charges applied on top of the cart subtotal.
#[derive(Debug, Clone)]
pub struct PricingPolicy {
    shipping: Arc<dyn ShippingRule>,
    tax_rate: Decimal,
    payment_fee_rate: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self::new(
            ShippingPolicy::default(),
            DEFAULT_TAX_RATE,
            DEFAULT_PAYMENT_FEE_RATE,
        )
    }
}

impl PricingPolicy {
    #[must_use]
    pub fn new(
        shipping: impl ShippingRule + 'static,
        tax_rate: Decimal,
        payment_fee_rate: Decimal,
    ) -> Self {
        Self {
            shipping: Arc::new(shipping),
            tax_rate,
            payment_fee_rate,
        }
    }

    /// Replace the shipping rule.
    #[must_use]
    pub fn with_shipping(mut self, shipping: impl ShippingRule + 'static) -> Self {
        self.shipping = Arc::new(shipping);
        self
    }

    #[must_use]
    pub const fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    #[must_use]
    pub const fn payment_fee_rate(&self) -> Decimal {
        self.payment_fee_rate
    }

    /// Shipping for an exact subtotal, rounded.
    #[must_use]
    pub fn shipping_cost(&self, subtotal: Price) -> Price {
        self.shipping.shipping_cost(subtotal).rounded()
    }

    /// Tax for an exact subtotal, rounded.
    #[must_use]
    pub fn tax(&self, subtotal: Price) -> Price {
        subtotal.scale(self.tax_rate).rounded()
    }

    /// Processing fee for an exact subtotal, rounded. Zero for cash on delivery.
    #[must_use]
    pub fn payment_fee(&self, subtotal: Price, method: PaymentMethod) -> Price {
        self.exact_fee(subtotal, method).rounded()
    }

    fn exact_fee(&self, subtotal: Price, method: PaymentMethod) -> Price {
        match method {
            PaymentMethod::Cod => Price::ZERO,
            PaymentMethod::Online => subtotal.scale(self.payment_fee_rate),
        }
    }

    /// Full breakdown for an exact subtotal.
    #[must_use]
    pub fn quote(&self, subtotal: Price, method: PaymentMethod) -> OrderTotals {
        let shipping = self.shipping.shipping_cost(subtotal);
        let tax = subtotal.scale(self.tax_rate);
        let fee = self.exact_fee(subtotal, method);

        OrderTotals {
            subtotal: subtotal.rounded(),
            shipping_cost: shipping.rounded(),
            tax_amount: tax.rounded(),
            payment_fee: fee.rounded(),
            total_amount: (subtotal + shipping + tax + fee).rounded(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    #[test]
    fn test_shipping_policies() {
        let below = Price::from_major(499);
        let at = Price::from_major(500);

        assert_eq!(ShippingPolicy::Free.shipping_cost(below), Price::ZERO);

        let flat = ShippingPolicy::Flat {
            fee: Price::from_major(40),
        };
        assert_eq!(flat.shipping_cost(at), Price::from_major(40));

        let free_above = ShippingPolicy::FreeAbove {
            threshold: at,
            fee: Price::from_major(49),
        };
        assert_eq!(free_above.shipping_cost(below), Price::from_major(49));
        assert_eq!(free_above.shipping_cost(at), Price::ZERO);
    }

    #[test]
    fn test_parse_shipping_policy() {
        assert_eq!("free".parse::<ShippingPolicy>().unwrap(), ShippingPolicy::Free);
        assert_eq!(
            "flat:40".parse::<ShippingPolicy>().unwrap(),
            ShippingPolicy::Flat {
                fee: Price::from_major(40)
            }
        );
        assert_eq!(
            "free_above:500:49.50".parse::<ShippingPolicy>().unwrap(),
            ShippingPolicy::FreeAbove {
                threshold: Price::from_major(500),
                fee: Price::new(dec!(49.50)),
            }
        );
        assert!("flat".parse::<ShippingPolicy>().is_err());
        assert!("flat:-5".parse::<ShippingPolicy>().is_err());
        assert!("express:10".parse::<ShippingPolicy>().is_err());
    }

    #[test]
    fn test_quote_cod_has_no_payment_fee() {
        let totals = PricingPolicy::default().quote(Price::from_major(1000), PaymentMethod::Cod);

        assert_eq!(totals.subtotal, Price::from_major(1000));
        assert_eq!(totals.shipping_cost, Price::ZERO);
        assert_eq!(totals.tax_amount, Price::from_major(180));
        assert_eq!(totals.payment_fee, Price::ZERO);
        assert_eq!(totals.total_amount, Price::from_major(1180));
    }

    #[test]
    fn test_quote_online_adds_fee_separately_from_tax() {
        let totals = PricingPolicy::default().quote(Price::from_major(1000), PaymentMethod::Online);

        assert_eq!(totals.tax_amount, Price::from_major(180));
        assert_eq!(totals.payment_fee, Price::from_major(20));
        assert_eq!(totals.total_amount, Price::from_major(1200));
    }

    #[test]
    fn test_total_is_rounded_once() {
        // 0.18 * 0.25 = 0.045 and 0.02 * 0.25 = 0.005: each rounds up on its
        // own, but the exact sum 0.30 needs no rounding.
        let subtotal = Price::new(dec!(0.25));
        let totals = PricingPolicy::default().quote(subtotal, PaymentMethod::Online);

        assert_eq!(totals.tax_amount, Price::new(dec!(0.05)));
        assert_eq!(totals.payment_fee, Price::new(dec!(0.01)));
        assert_eq!(totals.total_amount, Price::new(dec!(0.30)));
    }

    #[test]
    fn test_custom_shipping_rule() {
        #[derive(Debug)]
        struct PerRupee;
        impl ShippingRule for PerRupee {
            fn shipping_cost(&self, subtotal: Price) -> Price {
                subtotal.scale(dec!(0.1))
            }
        }

        let policy = PricingPolicy::default().with_shipping(PerRupee);
        assert_eq!(
            policy.shipping_cost(Price::from_major(200)),
            Price::from_major(20)
        );
    }
}
