//! Post-fill reactions and their scheduled reversions.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use zz_core::{MarketId, PairConfig};

/// A temporary change applied to a pair after a confirmed fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Stop quoting the market for `secs`.
    Cooldown { secs: u64 },
    /// Add `delta` to `min_spread` for `secs`.
    WidenSpread { delta: Decimal, secs: u64 },
    /// Add `delta` to `max_size` for `secs`.
    ShiftSize { delta: Decimal, secs: u64 },
}

impl Adjustment {
    /// Reactions configured for `pair`, in the order they are applied.
    pub fn plan_after_fill(pair: &PairConfig) -> Vec<Adjustment> {
        let mut plan = Vec::new();
        if let Some(secs) = pair.delay_after_fill {
            plan.push(Adjustment::Cooldown { secs });
        }
        if let Some((delta, secs)) = pair.increase_spread_after_fill {
            plan.push(Adjustment::WidenSpread { delta, secs });
        }
        if let Some((delta, secs)) = pair.change_size_after_fill {
            plan.push(Adjustment::ShiftSize { delta, secs });
        }
        plan
    }

    /// Apply the change to `pair`.
    pub fn apply(&self, pair: &mut PairConfig) {
        match *self {
            Adjustment::Cooldown { .. } => pair.active = false,
            Adjustment::WidenSpread { delta, .. } => pair.min_spread += delta,
            Adjustment::ShiftSize { delta, .. } => pair.max_size += delta,
        }
    }

    pub fn delay(&self) -> Duration {
        match *self {
            Adjustment::Cooldown { secs }
            | Adjustment::WidenSpread { secs, .. }
            | Adjustment::ShiftSize { secs, .. } => Duration::from_secs(secs),
        }
    }
}

/// Timer payloads fed back into the engine when a delay elapses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    CooldownEnded { market_id: MarketId, generation: u64 },
    SpreadReverted { market_id: MarketId, delta: Decimal },
    SizeReverted { market_id: MarketId, delta: Decimal },
}

/// Cooldown generations per market. Only the newest cooldown may reactivate.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    generations: HashMap<MarketId, u64>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a cooldown, superseding any running one.
    pub fn start(&mut self, market_id: &str) -> u64 {
        let generation = self.generations.entry(market_id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    /// True if `generation` is the latest cooldown for the market.
    pub fn finish(&self, market_id: &str, generation: u64) -> bool {
        self.generations.get(market_id) == Some(&generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use zz_core::SideBias;

    fn pair() -> PairConfig {
        PairConfig {
            active: true,
            side: SideBias::Both,
            min_spread: dec!(0.001),
            slippage_rate: dec!(0.0001),
            min_size: dec!(0.01),
            max_size: dec!(10),
            price_feed_primary: "constant:2000".to_string(),
            price_feed_secondary: None,
            delay_after_fill: Some(30),
            increase_spread_after_fill: Some((dec!(0.002), 60)),
            change_size_after_fill: Some((dec!(-5), 120)),
            mode: None,
            init_price: None,
        }
    }

    #[test]
    fn test_plan_and_apply() {
        let mut pair = pair();
        let plan = Adjustment::plan_after_fill(&pair);
        assert_eq!(
            plan,
            vec![
                Adjustment::Cooldown { secs: 30 },
                Adjustment::WidenSpread { delta: dec!(0.002), secs: 60 },
                Adjustment::ShiftSize { delta: dec!(-5), secs: 120 },
            ]
        );

        for adjustment in &plan {
            adjustment.apply(&mut pair);
        }
        assert!(!pair.active);
        assert_eq!(pair.min_spread, dec!(0.003));
        assert_eq!(pair.max_size, dec!(5));
        assert_eq!(plan[2].delay(), Duration::from_secs(120));
    }

    #[test]
    fn test_no_reactions_configured() {
        let mut pair = pair();
        pair.delay_after_fill = None;
        pair.increase_spread_after_fill = None;
        pair.change_size_after_fill = None;
        assert!(Adjustment::plan_after_fill(&pair).is_empty());
    }

    #[test]
    fn test_newer_cooldown_supersedes() {
        let mut tracker = CooldownTracker::new();
        let first = tracker.start("ETH-USDC");
        let second = tracker.start("ETH-USDC");

        assert!(!tracker.finish("ETH-USDC", first));
        assert!(tracker.finish("ETH-USDC", second));
        assert!(!tracker.finish("BTC-USDC", 1));

        let third = tracker.start("ETH-USDC");
        assert_eq!(third, 3);
        assert!(!tracker.finish("ETH-USDC", second));
    }
}
