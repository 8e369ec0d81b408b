//! The totals pipeline: a pure function from line items, discount codes and
//! the selected fulfillment fee to an ordered total breakdown.
//!
//! Invariant: `total == subtotal - discount + fulfillment + tax`, clamped at
//! zero. The output sequence always contains subtotal and total; discount,
//! fulfillment and tax entries appear only when non-zero, in the fixed order
//! subtotal, discount, fulfillment, tax, total.

use merx_shared::totals::{round_half_up, Total, TotalKind};
use merx_shared::wire::AppliedDiscount;
use serde::{Deserialize, Serialize};

use crate::models::LineItem;

/// A configured discount: percentage off the subtotal for a fixed code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscountRule {
    pub code: String,
    pub title: String,
    pub percent_off: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TaxPolicy {
    /// Fraction of the taxable base, e.g. 0.2 for 20% VAT.
    pub rate: f64,
}

/// Resolve submitted codes against the configured rule table. Codes with no
/// matching rule are ignored. Discounts never push the subtotal below zero.
pub fn apply_discounts(
    codes: &[String],
    rules: &[DiscountRule],
    subtotal: i64,
) -> (i64, Vec<AppliedDiscount>) {
    let mut amount = 0i64;
    let mut applied = Vec::new();

    for code in codes {
        if let Some(rule) = rules.iter().find(|r| r.code == *code) {
            let off = round_half_up(subtotal as f64 * f64::from(rule.percent_off) / 100.0);
            amount += off;
            applied.push(AppliedDiscount {
                code: rule.code.clone(),
                title: rule.title.clone(),
                amount: off,
            });
        }
    }

    (amount.min(subtotal), applied)
}

pub fn compute_totals(
    line_items: &[LineItem],
    discount_codes: &[String],
    fulfillment_fee: i64,
    rules: &[DiscountRule],
    tax: &TaxPolicy,
) -> (Vec<Total>, Vec<AppliedDiscount>) {
    let subtotal: i64 = line_items
        .iter()
        .map(|li| li.item.price * i64::from(li.quantity))
        .sum();

    let (discount, applied) = apply_discounts(discount_codes, rules, subtotal);

    let taxable = subtotal - discount + fulfillment_fee;
    let tax_amount = round_half_up(tax.rate * taxable as f64);
    let total = (subtotal - discount + fulfillment_fee + tax_amount).max(0);

    let mut out = vec![Total::new(TotalKind::Subtotal, subtotal)];
    if discount > 0 {
        out.push(Total::new(TotalKind::Discount, discount));
    }
    if fulfillment_fee > 0 {
        out.push(Total::new(TotalKind::Fulfillment, fulfillment_fee));
    }
    if tax_amount > 0 {
        out.push(Total::new(TotalKind::Tax, tax_amount));
    }
    out.push(Total::new(TotalKind::Total, total));

    (out, applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use merx_core::catalog::CatalogItem;
    use merx_shared::totals::total_of;

    fn line(price: i64, quantity: u32) -> LineItem {
        LineItem::new(
            CatalogItem {
                id: "widget-x".into(),
                title: "Widget".into(),
                price,
                in_stock: true,
                image_url: None,
            },
            quantity,
        )
    }

    fn rules() -> Vec<DiscountRule> {
        vec![DiscountRule {
            code: "PARTNER_20".into(),
            title: "Partner 20% Off".into(),
            percent_off: 20,
        }]
    }

    #[test]
    fn test_totals_identity_holds() {
        let items = vec![line(55_000, 100)];
        let codes = vec!["PARTNER_20".to_string()];
        let (totals, applied) =
            compute_totals(&items, &codes, 2_500, &rules(), &TaxPolicy { rate: 0.2 });

        let subtotal = total_of(&totals, TotalKind::Subtotal).unwrap();
        let discount = total_of(&totals, TotalKind::Discount).unwrap();
        let fulfillment = total_of(&totals, TotalKind::Fulfillment).unwrap();
        let tax = total_of(&totals, TotalKind::Tax).unwrap();
        let total = total_of(&totals, TotalKind::Total).unwrap();

        assert_eq!(subtotal, 5_500_000);
        assert_eq!(discount, 1_100_000);
        assert_eq!(fulfillment, 2_500);
        assert_eq!(tax, 880_500);
        assert_eq!(total, subtotal - discount + fulfillment + tax);
        assert!(total >= 0);
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].code, "PARTNER_20");
    }

    #[test]
    fn test_zero_entries_are_omitted() {
        let items = vec![line(1_000, 1)];
        let (totals, applied) = compute_totals(&items, &[], 0, &rules(), &TaxPolicy { rate: 0.0 });

        let kinds: Vec<TotalKind> = totals.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TotalKind::Subtotal, TotalKind::Total]);
        assert!(applied.is_empty());
        assert_eq!(total_of(&totals, TotalKind::Total), Some(1_000));
    }

    #[test]
    fn test_entry_order_is_fixed() {
        let items = vec![line(10_000, 2)];
        let codes = vec!["PARTNER_20".to_string()];
        let (totals, _) = compute_totals(&items, &codes, 500, &rules(), &TaxPolicy { rate: 0.1 });
        let kinds: Vec<TotalKind> = totals.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TotalKind::Subtotal,
                TotalKind::Discount,
                TotalKind::Fulfillment,
                TotalKind::Tax,
                TotalKind::Total,
            ]
        );
    }

    #[test]
    fn test_unknown_codes_are_ignored() {
        let (amount, applied) = apply_discounts(&["NOPE".to_string()], &rules(), 10_000);
        assert_eq!(amount, 0);
        assert!(applied.is_empty());
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let stacked = vec![
            DiscountRule {
                code: "A".into(),
                title: "A".into(),
                percent_off: 80,
            },
            DiscountRule {
                code: "B".into(),
                title: "B".into(),
                percent_off: 80,
            },
        ];
        let codes = vec!["A".to_string(), "B".to_string()];
        let (amount, _) = apply_discounts(&codes, &stacked, 10_000);
        assert_eq!(amount, 10_000);

        let items = vec![line(10_000, 1)];
        let (totals, _) = compute_totals(&items, &codes, 0, &stacked, &TaxPolicy { rate: 0.2 });
        assert_eq!(total_of(&totals, TotalKind::Total), Some(0));
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 0.2 * 1013 = 202.6 -> 203; 0.05 * 1010 = 50.5 -> 51
        let items = vec![line(1_013, 1)];
        let (totals, _) = compute_totals(&items, &[], 0, &[], &TaxPolicy { rate: 0.2 });
        assert_eq!(total_of(&totals, TotalKind::Tax), Some(203));

        let items = vec![line(1_010, 1)];
        let (totals, _) = compute_totals(&items, &[], 0, &[], &TaxPolicy { rate: 0.05 });
        assert_eq!(total_of(&totals, TotalKind::Tax), Some(51));
    }
}
