use serde::{Deserialize, Serialize};

/// Kind of a monetary line in a totals breakdown.
///
/// Sequence order in a response is significant and fixed:
/// subtotal, discount, fulfillment, tax, total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TotalKind {
    Subtotal,
    Discount,
    Fulfillment,
    Tax,
    Total,
}

/// One entry of an ordered totals breakdown. Amounts are integer minor
/// currency units (pence/cents).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Total {
    #[serde(rename = "type")]
    pub kind: TotalKind,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_text: Option<String>,
}

impl Total {
    pub fn new(kind: TotalKind, amount: i64) -> Self {
        Self {
            kind,
            amount,
            display_text: None,
        }
    }
}

/// Pull a single entry out of a breakdown by kind.
pub fn total_of(totals: &[Total], kind: TotalKind) -> Option<i64> {
    totals.iter().find(|t| t.kind == kind).map(|t| t.amount)
}

/// Round-half-up to the nearest minor unit. Inputs are non-negative in this
/// domain (tax and discount bases are clamped before rounding).
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.4), 2);
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.6), 3);
        assert_eq!(round_half_up(0.0), 0);
    }

    #[test]
    fn test_total_lookup() {
        let totals = vec![
            Total::new(TotalKind::Subtotal, 1000),
            Total::new(TotalKind::Total, 1000),
        ];
        assert_eq!(total_of(&totals, TotalKind::Total), Some(1000));
        assert_eq!(total_of(&totals, TotalKind::Tax), None);
    }

    #[test]
    fn test_wire_kind_is_snake_case() {
        let t = Total::new(TotalKind::Subtotal, 5);
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["type"], "subtotal");
        assert_eq!(v["amount"], 5);
    }
}
