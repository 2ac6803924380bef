//! Smoke Screen Unit tests for ledger components
//!
//! These tests span the public surface of the crate, exercising each piece in
//! isolation from the end-to-end scenarios. They mostly cover the happy path.
//!

use chrono::{Datelike, Timelike, Utc};
use donation_ledger::{
    LedgerError,
    allocator::{Candidate, allocate},
    balance::BalanceSheet,
    clock::{Clock, ManualClock, SystemClock},
    config::LedgerConfig,
    records::{Donation, Organization},
    types::{Amount, DonationStatus, ReviewAction, TimeStamp, WithdrawalStatus},
    utils::{DONATION_HRP, ORGANIZATION_HRP, new_transaction_reference, new_uuid_to_bech32},
};

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Ids carry their entity prefix
    #[test]
    fn ids_start_with_entity_hrp() {
        let org = new_uuid_to_bech32(ORGANIZATION_HRP).unwrap();
        let donation = new_uuid_to_bech32(DONATION_HRP).unwrap();

        assert!(org.starts_with("org_1"));
        assert!(donation.starts_with("don_1"));
    }

    #[test]
    fn empty_hrp_is_rejected() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn ids_are_unique() {
        let id1 = new_uuid_to_bech32(ORGANIZATION_HRP).unwrap();
        let id2 = new_uuid_to_bech32(ORGANIZATION_HRP).unwrap();
        assert_ne!(id1, id2);
    }

    #[test]
    fn transaction_reference_uses_prefix() {
        let reference = new_transaction_reference("GIFT", 42);
        assert!(reference.starts_with("GIFT-"));
        assert!(reference.ends_with("-42"));
    }
}

// TYPES MODULE TESTS
#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn timestamp_new_with_creates_specific_time() {
        let ts = TimeStamp::new_with(2024, 6, 15, 10, 30, 0);
        let dt = ts.to_datetime_utc();

        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn amount_cbor_roundtrip() {
        let original = Amount::from_minor(1_234_567);

        let encoded = minicbor::to_vec(original).unwrap();
        let decoded: Amount = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }

    #[test]
    fn withdrawal_status_claims() {
        assert!(WithdrawalStatus::Pending.reserves_funds());
        assert!(!WithdrawalStatus::Pending.is_spent());
        assert!(WithdrawalStatus::Approved.is_spent());
        assert!(WithdrawalStatus::Completed.is_spent());
        assert!(!WithdrawalStatus::Rejected.reserves_funds());
    }

    #[test]
    fn review_action_round_trips_through_labels() {
        for action in [ReviewAction::Approve, ReviewAction::Reject] {
            assert_eq!(action.as_str().parse::<ReviewAction>().unwrap(), action);
        }
    }
}

// CLOCK & CONFIG TESTS
#[cfg(test)]
mod clock_config_tests {
    use super::*;

    #[test]
    fn system_clock_is_close_to_now() {
        let diff = (Utc::now() - SystemClock.now().to_datetime_utc())
            .num_seconds()
            .abs();
        assert!(diff < 1);
    }

    #[test]
    fn manual_clock_moves_forward() {
        let clock = ManualClock::starting_at(TimeStamp::new_with(2024, 1, 1, 0, 0, 0));
        let before = clock.now();
        clock.advance(chrono::Duration::minutes(5));
        assert!(clock.now() > before);
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = LedgerConfig::default();
        assert_eq!(config.duplicate_window, chrono::Duration::minutes(5));
        assert_eq!(config.general_fund_name, "General Fund");
        assert_eq!(config.transaction_reference_prefix, "TXN");
    }
}

// RECORDS & CALCULATION TESTS
#[cfg(test)]
mod ledger_math_tests {
    use super::*;

    #[test]
    fn organization_cache_refresh() {
        let mut org = Organization::new("org_1".into(), "Trust".into());
        org.total_received = Amount::from_major(120);
        org.total_spent = Amount::from_major(45);
        org.refresh_available_balance();

        assert_eq!(org.available_balance, Amount::from_major(75));
    }

    #[test]
    fn donation_status_thresholds() {
        let total = Amount::from_major(10);
        assert_eq!(
            Donation::derive_status(total, Amount::from_major(11)),
            DonationStatus::FullySpent
        );
        assert_eq!(
            Donation::derive_status(total, Amount::from_minor(1)),
            DonationStatus::PartiallySpent
        );
    }

    #[test]
    fn empty_history_has_nothing_available() {
        let sheet = BalanceSheet::from_history(&[], &[]).unwrap();
        assert_eq!(sheet.available(), Amount::ZERO);
        assert!(!sheet.admits_request(Amount::from_minor(1)));
        assert!(sheet.admits_request(Amount::ZERO));
    }

    #[test]
    fn allocation_of_nothing_is_empty() {
        let candidates = vec![Candidate {
            donation_id: "don_1".into(),
            donated_at: TimeStamp::new(),
            amount_total: Amount::from_major(5),
            amount_allocated: Amount::ZERO,
        }];
        assert!(allocate(candidates, Amount::ZERO).unwrap().is_empty());
    }

    #[test]
    fn allocation_without_donations_is_internal() {
        let err = allocate(Vec::new(), Amount::from_major(1)).unwrap_err();
        assert!(matches!(err, LedgerError::Internal(_)));
        assert_eq!(err.to_string(), "internal ledger error");
    }
}
