use crate::core::models::campaign::BidStrategy;

/// Per-impression price in dollars for one strategy. CPM inputs divide
/// by 1000; `bid_floor` is the impression's floor (same unit as the
/// returned price) and only influences the dynamic strategy, which
/// bumps itself just above a floor it would otherwise straddle.
pub fn bid_price(strategy: &BidStrategy, bid_floor: f64) -> f64 {
    match strategy {
        BidStrategy::FixedCpm { cpm } => cpm / 1000.0,
        BidStrategy::DynamicCpm {
            min_cpm,
            max_cpm,
            bid_shading,
        } => {
            let mut price = max_cpm / 1000.0;
            if *bid_shading > 0.0 && *bid_shading < 1.0 {
                price *= 1.0 - bid_shading;
            }
            price = price.max(min_cpm / 1000.0);
            if bid_floor > 0.0 {
                price = price.max(bid_floor * 1.01);
            }
            price
        }
        // no conversion predictor here; bid the ceiling or a token CPM
        BidStrategy::TargetCpa { max_cpm, .. } => match max_cpm {
            Some(cpm) => cpm / 1000.0,
            None => 0.001 / 1000.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_cpm_divides_down() {
        assert_eq!(bid_price(&BidStrategy::FixedCpm { cpm: 1500.0 }, 0.0), 1.5);
    }

    #[test]
    fn dynamic_applies_shading_and_min_clamp() {
        let s = BidStrategy::DynamicCpm {
            min_cpm: 1000.0,
            max_cpm: 2000.0,
            bid_shading: 0.6,
        };
        // 2.0 * 0.4 = 0.8, clamped up to min 1.0
        assert_eq!(bid_price(&s, 0.0), 1.0);
    }

    #[test]
    fn dynamic_bumps_over_floor() {
        let s = BidStrategy::DynamicCpm {
            min_cpm: 0.0,
            max_cpm: 1000.0,
            bid_shading: 0.0,
        };
        let price = bid_price(&s, 2.0);
        assert!((price - 2.02).abs() < 1e-9);
    }

    #[test]
    fn shading_outside_unit_interval_ignored() {
        let s = BidStrategy::DynamicCpm {
            min_cpm: 0.0,
            max_cpm: 1000.0,
            bid_shading: 1.5,
        };
        assert_eq!(bid_price(&s, 0.0), 1.0);
    }

    #[test]
    fn target_cpa_fallbacks() {
        let with_cap = BidStrategy::TargetCpa {
            target_cpa: 3.0,
            max_cpm: Some(500.0),
        };
        assert_eq!(bid_price(&with_cap, 0.0), 0.5);

        let without = BidStrategy::TargetCpa {
            target_cpa: 3.0,
            max_cpm: None,
        };
        assert_eq!(bid_price(&without, 0.0), 0.000001);
    }
}
