// Market data module entrypoint
pub mod adapters; // venue-specific fetchers (e.g. Kalshi)
pub mod book;     // unified bid/ask book built from the venue's yes/no ledgers
pub mod snapshot; // pure snapshot assembly from a unified book
