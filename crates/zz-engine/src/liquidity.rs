//! Tiered liquidity ladder.

use rust_decimal::Decimal;
use zz_core::{round_sig_figs, LiquidityEntry, PairConfig, Side, QUOTE_SIG_FIGS};

/// Number of rungs per side.
pub const LADDER_TIERS: u32 = 10;

/// Ladder entries expire this long after publication.
pub const LADDER_TTL_SECS: u64 = 10;

/// Build the ladder for one pair.
///
/// `base_balance` / `quote_balance` are the largest single-wallet holdings.
/// Each side is capped at `max_size` and split evenly across the tiers; a
/// side with nothing to offer is left out.
pub fn build_ladder(
    pair: &PairConfig,
    mid: Decimal,
    base_balance: Decimal,
    quote_balance: Decimal,
    now_secs: u64,
) -> Vec<LiquidityEntry> {
    if mid <= Decimal::ZERO {
        return Vec::new();
    }

    let max_sell = base_balance.min(pair.max_size);
    let max_buy = quote_balance
        .checked_div(mid)
        .map_or(pair.max_size, |b| b.min(pair.max_size));
    let tiers = Decimal::from(LADDER_TIERS);
    let expires = now_secs + LADDER_TTL_SECS;

    let bids = pair.side.quotes_bids() && max_buy > Decimal::ZERO;
    let asks = pair.side.quotes_asks() && max_sell > Decimal::ZERO;

    let mut ladder = Vec::new();
    for i in 1..=LADDER_TIERS {
        let step = Decimal::from(i) / tiers;
        if bids {
            let price = rung_price(mid, pair, max_buy * step, Side::Buy);
            if let Some(price) = price.filter(|p| *p > Decimal::ZERO) {
                ladder.push(LiquidityEntry {
                    side: Side::Buy,
                    price: round_sig_figs(price, QUOTE_SIG_FIGS),
                    size: max_buy / tiers,
                    expires,
                });
            }
        }
        if asks {
            if let Some(price) = rung_price(mid, pair, max_sell * step, Side::Sell) {
                ladder.push(LiquidityEntry {
                    side: Side::Sell,
                    price: round_sig_figs(price, QUOTE_SIG_FIGS),
                    size: max_sell / tiers,
                    expires,
                });
            }
        }
    }
    ladder
}

/// Mid moved away by the spread plus slippage on `size`; `None` on overflow.
fn rung_price(mid: Decimal, pair: &PairConfig, size: Decimal, side: Side) -> Option<Decimal> {
    let offset = pair
        .slippage_rate
        .checked_mul(size)?
        .checked_add(pair.min_spread)?;
    let factor = match side {
        Side::Buy => Decimal::ONE.checked_sub(offset)?,
        Side::Sell => Decimal::ONE.checked_add(offset)?,
    };
    mid.checked_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use zz_core::SideBias;

    fn pair(side: SideBias) -> PairConfig {
        PairConfig {
            active: true,
            side,
            min_spread: dec!(0.001),
            slippage_rate: dec!(0.0001),
            min_size: dec!(0.01),
            max_size: dec!(10),
            price_feed_primary: "constant:2000".to_string(),
            price_feed_secondary: None,
            delay_after_fill: None,
            increase_spread_after_fill: None,
            change_size_after_fill: None,
            mode: None,
            init_price: None,
        }
    }

    #[test]
    fn test_two_sided_ladder() {
        let ladder = build_ladder(&pair(SideBias::Both), dec!(2000), dec!(5), dec!(4000), 100);
        assert_eq!(ladder.len(), 20);

        // max_buy = 4000 / 2000 = 2, max_sell = 5
        let first_bid = &ladder[0];
        assert_eq!(first_bid.side, Side::Buy);
        assert_eq!(first_bid.size, dec!(0.2));
        assert_eq!(first_bid.price, dec!(1997.96)); // 2000 * (1 - 0.001 - 0.00002)
        assert_eq!(first_bid.expires, 110);

        let first_ask = &ladder[1];
        assert_eq!(first_ask.side, Side::Sell);
        assert_eq!(first_ask.size, dec!(0.5));
        assert_eq!(first_ask.price, dec!(2002.1)); // 2000 * (1 + 0.001 + 0.00005)

        let last_ask = &ladder[19];
        assert_eq!(last_ask.price, dec!(2003)); // 2000 * (1 + 0.001 + 0.0005)
    }

    #[test]
    fn test_ladder_widens_with_tier() {
        let ladder = build_ladder(&pair(SideBias::Both), dec!(2000), dec!(5), dec!(4000), 0);
        let bids: Vec<_> = ladder.iter().filter(|e| e.side == Side::Buy).collect();
        let asks: Vec<_> = ladder.iter().filter(|e| e.side == Side::Sell).collect();
        assert!(bids.windows(2).all(|w| w[0].price > w[1].price));
        assert!(asks.windows(2).all(|w| w[0].price < w[1].price));
    }

    #[test]
    fn test_bias_limits_sides() {
        let bids_only = build_ladder(&pair(SideBias::BuyOnly), dec!(2000), dec!(5), dec!(4000), 0);
        assert_eq!(bids_only.len(), 10);
        assert!(bids_only.iter().all(|e| e.side == Side::Buy));

        let asks_only = build_ladder(&pair(SideBias::SellOnly), dec!(2000), dec!(5), dec!(4000), 0);
        assert_eq!(asks_only.len(), 10);
        assert!(asks_only.iter().all(|e| e.side == Side::Sell));
    }

    #[test]
    fn test_size_capped_at_max_size() {
        let ladder = build_ladder(&pair(SideBias::SellOnly), dec!(2000), dec!(500), dec!(0), 0);
        assert!(ladder.iter().all(|e| e.size == dec!(1)));
    }

    #[test]
    fn test_tiny_mid_caps_bid_size() {
        let mid = Decimal::new(1, 28);
        let ladder = build_ladder(&pair(SideBias::Both), mid, dec!(0), Decimal::MAX, 0);
        assert!(ladder.iter().all(|e| e.side == Side::Buy && e.size == dec!(1)));
    }

    #[test]
    fn test_empty_side_skipped() {
        let ladder = build_ladder(&pair(SideBias::Both), dec!(2000), dec!(0), dec!(4000), 0);
        assert!(ladder.iter().all(|e| e.side == Side::Buy));
        assert!(build_ladder(&pair(SideBias::Both), dec!(2000), dec!(0), dec!(0), 0).is_empty());
    }
}
