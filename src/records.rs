//! Persisted ledger rows. Each is CBOR encoded under its own key prefix.
use crate::types::{
    AdminRole, AllocationStatus, Amount, DonationStatus, PaymentMethod, ReviewAction, TimeStamp,
    VerificationStatus, WithdrawalStatus,
};
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Organization {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub is_active: bool, // owning account is active
    #[n(3)]
    pub verification_status: VerificationStatus,
    #[n(4)]
    pub total_received: Amount,
    #[n(5)]
    pub total_spent: Amount,
    #[n(6)]
    pub available_balance: Amount, // display cache, never used for admission
    #[n(7)]
    pub verified_at: Option<TimeStamp<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Donor {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub is_active: bool,
    #[n(3)]
    pub total_donated: Amount,
    #[n(4)]
    pub donation_count: u64,
    #[n(5)]
    pub last_donation_at: Option<TimeStamp<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Admin {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub is_active: bool,
    #[n(3)]
    pub role: AdminRole,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Donation {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub donor_id: String,
    #[n(2)]
    pub organization_id: String,
    #[n(3)]
    pub amount_total: Amount,
    #[n(4)]
    pub payment_method: PaymentMethod,
    #[n(5)]
    pub transaction_reference: String,
    #[n(6)]
    pub status: DonationStatus,
    #[n(7)]
    pub donated_at: TimeStamp<Utc>, // defines FIFO order
    #[n(8)]
    pub is_recurring: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Withdrawal {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub organization_id: String,
    #[n(2)]
    pub amount: Amount,
    #[n(3)]
    pub status: WithdrawalStatus,
    #[n(4)]
    pub bank_account_number: String,
    #[n(5)]
    pub purpose: String,
    #[n(6)]
    pub requested_at: TimeStamp<Utc>,
    #[n(7)]
    pub processed_at: Option<TimeStamp<Utc>>,
    #[n(8)]
    pub processed_by: Option<String>, // admin id
    #[n(9)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct DonationAllocation {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub donation_id: String,
    #[n(2)]
    pub withdrawal_id: String,
    #[n(3)]
    pub beneficiary_id: String,
    #[n(4)]
    pub impact_story_id: Option<String>,
    #[n(5)]
    pub amount_spent: Amount,
    #[n(6)]
    pub purpose: String,
    #[n(7)]
    pub status: AllocationStatus,
    #[n(8)]
    pub spent_at: TimeStamp<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Beneficiary {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub organization_id: String,
    #[n(2)]
    pub name: String,
    #[n(3)]
    pub kind: String,
    #[n(4)]
    pub location: String,
    #[n(5)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ImpactStory {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub organization_id: String,
    #[n(2)]
    pub title: String,
    #[n(3)]
    pub total_funding: Amount,
    #[n(4)]
    pub allocation_count: u64,
}

/// Structured before/after snapshot attached to an audit entry
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ChangeDetails {
    #[n(0)]
    pub previous_status: String,
    #[n(1)]
    pub new_status: String,
    #[n(2)]
    pub amount: Option<Amount>,
    #[n(3)]
    pub organization_id: String,
    #[n(4)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct AuditEntry {
    #[n(0)]
    pub actor_id: String,
    #[n(1)]
    pub action_type: ReviewAction,
    #[n(2)]
    pub entity_type: String,
    #[n(3)]
    pub entity_id: String,
    #[n(4)]
    pub description: String,
    #[n(5)]
    pub details: ChangeDetails,
    #[n(6)]
    pub performed_at: TimeStamp<Utc>,
}

impl AuditEntry {
    /// Encode the entry and derive its content hash, which doubles as its key.
    pub fn build(&self) -> anyhow::Result<(String, Vec<u8>)> {
        let cbor = minicbor::to_vec(self)?;
        let hash = sha256::digest(cbor.as_slice());

        Ok((hash, cbor))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct VerificationRecord {
    #[n(0)]
    pub organization_id: String,
    #[n(1)]
    pub reviewed_by: String,
    #[n(2)]
    pub previous_status: VerificationStatus,
    #[n(3)]
    pub new_status: VerificationStatus,
    #[n(4)]
    pub remarks: Option<String>,
    #[n(5)]
    pub reviewed_at: TimeStamp<Utc>,
}

impl Organization {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            is_active: true,
            verification_status: VerificationStatus::Pending,
            total_received: Amount::ZERO,
            total_spent: Amount::ZERO,
            available_balance: Amount::ZERO,
            verified_at: None,
        }
    }
    /// Refresh the display cache from the two running totals.
    pub fn refresh_available_balance(&mut self) {
        self.available_balance = self.total_received.saturating_sub(self.total_spent);
    }
}

impl Donor {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            is_active: true,
            total_donated: Amount::ZERO,
            donation_count: 0,
            last_donation_at: None,
        }
    }
}

impl Donation {
    /// Derive status from the sum of this donation's completed allocations.
    pub fn derive_status(amount_total: Amount, completed: Amount) -> DonationStatus {
        if completed.is_zero() {
            DonationStatus::Allocated
        } else if completed >= amount_total {
            DonationStatus::FullySpent
        } else {
            DonationStatus::PartiallySpent
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(remarks: Option<&str>) -> AuditEntry {
        AuditEntry {
            actor_id: "admin_1".into(),
            action_type: ReviewAction::Approve,
            entity_type: "withdrawal".into(),
            entity_id: "wdr_1".into(),
            description: "Approved withdrawal of $10.00".into(),
            details: ChangeDetails {
                previous_status: "pending".into(),
                new_status: "approved".into(),
                amount: Some(Amount::from_major(10)),
                organization_id: "org_1".into(),
                remarks: remarks.map(str::to_string),
            },
            performed_at: TimeStamp::new_with(2025, 3, 1, 9, 0, 0),
        }
    }

    #[test]
    fn audit_entry_hash_tracks_content() {
        let (hash_a, cbor) = sample_entry(None).build().unwrap();
        let (hash_b, _) = sample_entry(None).build().unwrap();
        let (hash_c, _) = sample_entry(Some("ok")).build().unwrap();

        assert_eq!(hash_a, hash_b);
        assert_ne!(hash_a, hash_c);

        let decoded: AuditEntry = minicbor::decode(&cbor).unwrap();
        assert_eq!(decoded, sample_entry(None));
    }

    #[test]
    fn donation_status_from_completed_spend() {
        let total = Amount::from_major(50);
        assert_eq!(Donation::derive_status(total, Amount::ZERO), DonationStatus::Allocated);
        assert_eq!(
            Donation::derive_status(total, Amount::from_major(20)),
            DonationStatus::PartiallySpent
        );
        assert_eq!(Donation::derive_status(total, total), DonationStatus::FullySpent);
    }
}
