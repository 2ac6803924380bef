//! Ledger tuning knobs: defaults plus chained setters

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// A pending withdrawal of the same amount inside this window is a duplicate
    pub duplicate_window: chrono::Duration,
    /// How long a money-moving operation waits for a row lock
    pub lock_timeout: Duration,
    /// Name of the per-organization beneficiary that receives allocations
    pub general_fund_name: String,
    pub transaction_reference_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            duplicate_window: chrono::Duration::minutes(5),
            lock_timeout: Duration::from_secs(5),
            general_fund_name: "General Fund".to_string(),
            transaction_reference_prefix: "TXN".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_duplicate_window(mut self, window: chrono::Duration) -> Self {
        self.duplicate_window = window;
        self
    }
    pub fn set_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
    pub fn set_general_fund_name(mut self, name: impl Into<String>) -> Self {
        self.general_fund_name = name.into();
        self
    }
    pub fn set_transaction_reference_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.transaction_reference_prefix = prefix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_override_defaults() {
        let config = LedgerConfig::new()
            .set_duplicate_window(chrono::Duration::minutes(1))
            .set_lock_timeout(Duration::from_millis(50))
            .set_general_fund_name("Operations");

        assert_eq!(config.duplicate_window, chrono::Duration::minutes(1));
        assert_eq!(config.lock_timeout, Duration::from_millis(50));
        assert_eq!(config.general_fund_name, "Operations");
        assert_eq!(config.transaction_reference_prefix, "TXN");
    }
}
