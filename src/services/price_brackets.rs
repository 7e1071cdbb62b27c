//! Validation of tiered quantity-based pricing schedules.
//!
//! A bracket list is valid when, sorted by `min`, it starts at zero, each
//! tier starts exactly where the previous one ends, every tier has
//! `max >= min`, and the top tier is effectively unbounded (`max` above
//! 50,000). The same rules run against the textual
//! `"min-max:salePrice:discountPercent,..."` form after parsing.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;

/// Upper bound the last tier must exceed so that no order quantity falls
/// off the end of the schedule.
fn open_ended_minimum() -> Decimal {
    Decimal::from(50_000)
}

/// One quantity tier of a pricing schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBracket {
    pub min: Decimal,
    pub max: Decimal,
    pub sale_price: Decimal,
    pub discount_percent: Decimal,
}

impl PriceBracket {
    fn rounded(&self) -> Self {
        Self {
            min: self.min.round_dp(2),
            max: self.max.round_dp(2),
            sale_price: self.sale_price,
            discount_percent: self.discount_percent,
        }
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.min < other.max && other.min < self.max
    }
}

/// Validates a bracket list, returning the sorted, bound-rounded schedule
/// that should be persisted. Any violation invalidates the whole list.
pub fn validate_brackets(brackets: &[PriceBracket]) -> Result<Vec<PriceBracket>, ServiceError> {
    if brackets.is_empty() {
        return Err(ServiceError::ValidationError(
            "price bracket list must not be empty".to_string(),
        ));
    }

    let mut sorted: Vec<PriceBracket> = brackets.iter().map(PriceBracket::rounded).collect();
    sorted.sort_by(|a, b| a.min.cmp(&b.min));

    let first = &sorted[0];
    if first.min != Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "first bracket must start at 0, found {}",
            first.min
        )));
    }

    for (i, bracket) in sorted.iter().enumerate() {
        if bracket.max < bracket.min {
            return Err(ServiceError::ValidationError(format!(
                "bracket {}-{} has max below min",
                bracket.min, bracket.max
            )));
        }
        if bracket.sale_price < Decimal::ZERO || bracket.discount_percent < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "bracket {}-{} carries a negative price or discount",
                bracket.min, bracket.max
            )));
        }
        if i > 0 {
            let prev = &sorted[i - 1];
            if bracket.min != prev.max {
                return Err(ServiceError::ValidationError(format!(
                    "brackets are not contiguous: {} ends at {} but the next starts at {}",
                    prev.min, prev.max, bracket.min
                )));
            }
        }
    }

    let last = sorted.last().expect("non-empty checked above");
    if last.max <= open_ended_minimum() {
        return Err(ServiceError::ValidationError(format!(
            "last bracket must extend beyond {}, found {}",
            open_ended_minimum(),
            last.max
        )));
    }

    Ok(sorted)
}

/// Parses the textual `"min-max:salePrice:discountPercent,..."` form into a
/// schedule and runs the same validation, plus a pairwise overlap check
/// (contiguity should preclude overlap, but the textual path is fed by
/// operators and gets the extra guard).
pub fn parse_bracket_string(raw: &str) -> Result<Vec<PriceBracket>, ServiceError> {
    let mut brackets = Vec::new();
    for (idx, part) in raw.split(',').enumerate() {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let fields: Vec<&str> = part.split(':').collect();
        if fields.len() != 3 {
            return Err(ServiceError::InvalidInput(format!(
                "bracket {} must look like min-max:salePrice:discountPercent, found '{}'",
                idx + 1,
                part
            )));
        }
        let bounds: Vec<&str> = fields[0].split('-').collect();
        if bounds.len() != 2 {
            return Err(ServiceError::InvalidInput(format!(
                "bracket {} range must look like min-max, found '{}'",
                idx + 1,
                fields[0]
            )));
        }
        let parse = |raw: &str, what: &str| -> Result<Decimal, ServiceError> {
            raw.trim().parse::<Decimal>().map_err(|_| {
                ServiceError::InvalidInput(format!(
                    "bracket {} has a non-numeric {}: '{}'",
                    idx + 1,
                    what,
                    raw
                ))
            })
        };
        brackets.push(PriceBracket {
            min: parse(bounds[0], "min")?,
            max: parse(bounds[1], "max")?,
            sale_price: parse(fields[1], "sale price")?,
            discount_percent: parse(fields[2], "discount percent")?,
        });
    }

    let validated = validate_brackets(&brackets)?;

    for i in 0..validated.len() {
        for j in (i + 1)..validated.len() {
            if validated[i].overlaps(&validated[j]) {
                return Err(ServiceError::ValidationError(format!(
                    "brackets {}-{} and {}-{} overlap",
                    validated[i].min, validated[i].max, validated[j].min, validated[j].max
                )));
            }
        }
    }

    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn bracket(min: Decimal, max: Decimal) -> PriceBracket {
        PriceBracket {
            min,
            max,
            sale_price: dec!(9.5),
            discount_percent: dec!(5),
        }
    }

    #[test]
    fn contiguous_open_ended_schedule_is_valid() {
        let list = vec![
            bracket(dec!(10), dec!(25)),
            bracket(dec!(0), dec!(10)),
            bracket(dec!(25), dec!(50001)),
        ];
        let sorted = validate_brackets(&list).unwrap();
        assert_eq!(sorted[0].min, dec!(0));
        assert_eq!(sorted[2].max, dec!(50001));
    }

    #[test_case(vec![(0, 10), (15, 50001)] ; "gap between tiers")]
    #[test_case(vec![(0, 10), (10, 25), (30, 50001)] ; "gap later in the list")]
    #[test_case(vec![(5, 10), (10, 50001)] ; "first tier starts above zero")]
    #[test_case(vec![(0, 10), (10, 40000)] ; "top tier not open ended")]
    #[test_case(vec![(0, 10), (10, 5)] ; "max below min")]
    fn invalid_schedules_are_rejected(ranges: Vec<(i64, i64)>) {
        let list: Vec<PriceBracket> = ranges
            .into_iter()
            .map(|(lo, hi)| bracket(Decimal::from(lo), Decimal::from(hi)))
            .collect();
        assert!(validate_brackets(&list).is_err());
    }

    #[test]
    fn bounds_are_rounded_to_two_decimals() {
        let list = vec![
            bracket(dec!(0), dec!(10.004)),
            bracket(dec!(10.004), dec!(50001)),
        ];
        let sorted = validate_brackets(&list).unwrap();
        assert_eq!(sorted[0].max, dec!(10.00));
        assert_eq!(sorted[1].min, dec!(10.00));
    }

    #[test]
    fn textual_form_parses_and_validates() {
        let parsed = parse_bracket_string("0-10:95.5:5, 10-25:90:10, 25-50001:85:15").unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].sale_price, dec!(90));
    }

    #[test]
    fn textual_form_rejects_gaps() {
        assert!(parse_bracket_string("0-10:95:5,10-25:90:10,30-50001:85:15").is_err());
    }

    #[test]
    fn textual_form_rejects_malformed_fields() {
        assert!(parse_bracket_string("0-10:95").is_err());
        assert!(parse_bracket_string("0..10:95:5").is_err());
        assert!(parse_bracket_string("0-ten:95:5").is_err());
    }
}
