use std::collections::BTreeMap;

/// Canonical bid/ask view of one binary contract, prices in whole cents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedBook {
    // price -> aggregate quantity
    pub bids: BTreeMap<i64, u64>, // highest price = best bid
    pub asks: BTreeMap<i64, u64>, // lowest price  = best ask
}

impl UnifiedBook {
    pub fn new() -> Self {
        Self { bids: BTreeMap::new(), asks: BTreeMap::new() }
    }

    pub fn best_bid(&self) -> Option<i64> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<i64> {
        self.asks.keys().next().copied()
    }

    pub fn total_bid_depth(&self) -> u64 {
        self.bids.values().sum()
    }

    pub fn total_ask_depth(&self) -> u64 {
        self.asks.values().sum()
    }
}

/// Fold the venue's two one-sided ledgers into a single bid/ask book.
///
/// In a binary market a resting order on the opposing outcome at `p` cents is
/// economically an ask on this outcome at `100 - p`:
/// - YES bid at X   -> bid at X
/// - NO bid at Y    -> ask at (100 - Y)
///
/// Duplicate price levels within one ledger sum their quantities; levels with
/// zero quantity are carried as-is (the venue reports them, depth sums ignore
/// them naturally).
pub fn unify_ledgers(yes: &[(i64, u64)], no: &[(i64, u64)]) -> UnifiedBook {
    let mut book = UnifiedBook::new();

    for &(price, qty) in yes {
        *book.bids.entry(price).or_default() += qty;
    }
    for &(price, qty) in no {
        *book.asks.entry(100 - price).or_default() += qty;
    }

    book
}
