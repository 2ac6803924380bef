//! Recording incoming donations and the donor/organization running totals
use crate::error::{LedgerError, LedgerResult};
use crate::records::{Donation, Donor, Organization};
use crate::service::{LedgerService, log_failure};
use crate::store::{abort, keys, lift};
use crate::types::{Amount, DonationStatus, PaymentMethod, TimeStamp};
use crate::utils;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonorStats {
    pub total_donated: Amount,
    pub donation_count: u64,
    pub last_donation_at: Option<TimeStamp<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationReceipt {
    pub donation: Donation,
    pub donor_stats: DonorStats,
}

impl DonationReceipt {
    pub fn donation_id(&self) -> &str {
        &self.donation.id
    }
    pub fn transaction_reference(&self) -> &str {
        &self.donation.transaction_reference
    }
}

impl From<&Donor> for DonorStats {
    fn from(donor: &Donor) -> Self {
        Self {
            total_donated: donor.total_donated,
            donation_count: donor.donation_count,
            last_donation_at: donor.last_donation_at.clone(),
        }
    }
}

impl LedgerService {
    /// Record a donation and bump the donor's and organization's running totals.
    ///
    /// The organization does not need to be approved yet; donations may arrive
    /// while verification is still pending.
    pub fn record_donation(
        &self,
        donor_id: &str,
        organization_id: &str,
        amount: Amount,
        payment_method: PaymentMethod,
    ) -> LedgerResult<DonationReceipt> {
        self.record_donation_inner(donor_id, organization_id, amount, payment_method)
            .inspect_err(|e| log_failure("record_donation", e))
    }

    fn record_donation_inner(
        &self,
        donor_id: &str,
        organization_id: &str,
        amount: Amount,
        payment_method: PaymentMethod,
    ) -> LedgerResult<DonationReceipt> {
        if donor_id.trim().is_empty() || organization_id.trim().is_empty() {
            return Err(LedgerError::Validation(
                "donor id and organization id are required".into(),
            ));
        }
        if amount.is_zero() {
            return Err(LedgerError::Validation("amount must be greater than 0".into()));
        }

        let _org_row = self
            .store
            .lock_organization(organization_id, self.config.lock_timeout)?;

        let now = self.clock.now();
        let donation_id = utils::new_uuid_to_bech32(utils::DONATION_HRP)?;
        let transaction_reference = utils::new_transaction_reference(
            &self.config.transaction_reference_prefix,
            now.to_datetime_utc().timestamp(),
        );

        let receipt = self.store.transact(|tx| {
            let mut donor: Donor = tx.require(keys::DONOR, "donor", donor_id)?;
            let mut org: Organization =
                tx.require(keys::ORGANIZATION, "organization", organization_id)?;

            // FIFO order follows donated_at, so it must strictly increase per
            // organization even if the wall clock steps back
            let donated_at = match tx.donations_of(&org.id)?.into_iter().map(|d| d.donated_at).max() {
                Some(newest) if newest >= now => newest.next_tick(),
                _ => now.clone(),
            };

            let reference_key = keys::of(keys::TX_REFERENCE, &transaction_reference);
            if tx.contains(&reference_key)? {
                return abort(LedgerError::internal(format!(
                    "transaction reference collision: {transaction_reference}"
                )));
            }

            let donation = Donation {
                id: donation_id.clone(),
                donor_id: donor.id.clone(),
                organization_id: org.id.clone(),
                amount_total: amount,
                payment_method,
                transaction_reference: transaction_reference.clone(),
                status: DonationStatus::Allocated,
                donated_at: donated_at.clone(),
                is_recurring: false,
            };
            tx.put(&keys::of(keys::DONATION, &donation.id), &donation)?;
            tx.put(&reference_key, &donation.id)?;
            tx.push_index(keys::ORG_DONATIONS, &org.id, &donation.id)?;

            donor.total_donated = lift(donor.total_donated.checked_add(amount))?;
            donor.donation_count += 1;
            donor.last_donation_at = Some(donated_at.clone());
            tx.put(&keys::of(keys::DONOR, &donor.id), &donor)?;

            org.total_received = lift(org.total_received.checked_add(amount))?;
            org.refresh_available_balance();
            tx.put(&keys::of(keys::ORGANIZATION, &org.id), &org)?;

            Ok(DonationReceipt {
                donor_stats: DonorStats::from(&donor),
                donation,
            })
        })?;

        tracing::info!(
            donation_id = %receipt.donation.id,
            donor_id,
            organization_id,
            amount = %amount,
            reference = %receipt.donation.transaction_reference,
            "donation recorded"
        );

        Ok(receipt)
    }
}
