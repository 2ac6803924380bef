//! Withdrawal lifecycle: request, approve, reject.
//!
//! ```text
//! pending ──approve──▶ approved ──(disbursement, external)──▶ completed
//!    └─────reject────▶ rejected
//! ```
//!
//! Requests reserve donation remainders through pending allocations. Approval
//! re-checks the balance and finalizes the allocations; rejection deletes them,
//! which hands the capacity back to future requests.
use crate::allocator;
use crate::balance::{self, BalanceSheet};
use crate::error::{LedgerError, LedgerResult};
use crate::records::{
    AuditEntry, Beneficiary, ChangeDetails, Donation, DonationAllocation, ImpactStory,
    Organization, Withdrawal,
};
use crate::service::{LedgerService, log_failure, normalize_remarks};
use crate::store::{TxResult, Txn, abort, keys, lift};
use crate::types::{
    AllocationStatus, Amount, ReviewAction, TimeStamp, VerificationStatus, WithdrawalStatus,
};
use crate::utils;
use chrono::Utc;
use std::collections::BTreeSet;

/// A draft withdrawal request, filled in with chained setters and checked by
/// [`WithdrawalRequest::validate`] before anything touches the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WithdrawalRequest {
    organization_id: String,
    amount: Amount,
    bank_account_number: String,
    purpose: String,
    impact_story_id: Option<String>,
}

impl WithdrawalRequest {
    pub fn new(organization_id: &str, amount: Amount) -> Self {
        Self {
            organization_id: organization_id.to_string(),
            amount,
            ..Self::default()
        }
    }
    pub fn set_bank_account(mut self, account_number: &str) -> Self {
        self.bank_account_number = account_number.trim().to_string();
        self
    }
    pub fn set_purpose(mut self, purpose: &str) -> Self {
        self.purpose = purpose.trim().to_string();
        self
    }
    pub fn set_impact_story(mut self, story_id: &str) -> Self {
        let story_id = story_id.trim();
        self.impact_story_id = (!story_id.is_empty()).then(|| story_id.to_string());
        self
    }
    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }
    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.organization_id.trim().is_empty() {
            return Err(LedgerError::Validation("organization id is required".into()));
        }
        if self.amount.is_zero() {
            return Err(LedgerError::Validation("amount must be greater than 0".into()));
        }
        if self.bank_account_number.is_empty() {
            return Err(LedgerError::Validation("bank account number is required".into()));
        }
        if self.purpose.is_empty() {
            return Err(LedgerError::Validation("purpose is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalReceipt {
    pub withdrawal: Withdrawal,
    pub allocations_count: usize,
    pub available_balance_after: Amount,
}

impl LedgerService {
    /// Request a withdrawal, reserving donation remainders oldest-first.
    pub fn request_withdrawal(&self, request: WithdrawalRequest) -> LedgerResult<WithdrawalReceipt> {
        self.request_withdrawal_inner(&request)
            .inspect_err(|e| log_failure("request_withdrawal", e))
    }

    /// Approve or reject a pending withdrawal.
    pub fn process_withdrawal(
        &self,
        admin_id: &str,
        withdrawal_id: &str,
        action: ReviewAction,
        remarks: &str,
    ) -> LedgerResult<Withdrawal> {
        self.process_withdrawal_inner(admin_id, withdrawal_id, action, remarks)
            .inspect_err(|e| log_failure("process_withdrawal", e))
    }

    fn request_withdrawal_inner(&self, request: &WithdrawalRequest) -> LedgerResult<WithdrawalReceipt> {
        request.validate()?;
        let organization_id = request.organization_id.as_str();
        let amount = request.amount;

        let _org_row = self
            .store
            .lock_organization(organization_id, self.config.lock_timeout)?;

        let now = self.clock.now();
        let withdrawal_id = utils::new_uuid_to_bech32(utils::WITHDRAWAL_HRP)?;
        let window_start: TimeStamp<Utc> =
            (now.to_datetime_utc() - self.config.duplicate_window).into();

        let receipt = self.store.transact(|tx| {
            let org = match tx.get::<Organization>(&keys::of(keys::ORGANIZATION, organization_id))? {
                Some(org) => org,
                None => {
                    return abort(LedgerError::Unauthorized("organization not found".into()));
                }
            };
            if !org.is_active {
                return abort(LedgerError::Unauthorized("account is deactivated".into()));
            }
            if org.verification_status != VerificationStatus::Approved {
                return abort(LedgerError::Unauthorized(
                    "only approved organizations can make withdrawals".into(),
                ));
            }

            let donations = tx.donations_of(organization_id)?;
            let withdrawals = tx.withdrawals_of(organization_id)?;
            let sheet = lift(BalanceSheet::from_history(&donations, &withdrawals))?;
            if !sheet.admits_request(amount) {
                return abort(LedgerError::InsufficientBalance {
                    available: sheet.available(),
                });
            }

            if let Some(existing) = withdrawals.iter().find(|w| {
                w.status == WithdrawalStatus::Pending
                    && w.amount == amount
                    && w.requested_at > window_start
            }) {
                return abort(LedgerError::DuplicateRequest {
                    existing_withdrawal_id: existing.id.clone(),
                });
            }

            let story = match &request.impact_story_id {
                Some(story_id) => match tx.get::<ImpactStory>(&keys::of(keys::STORY, story_id))? {
                    Some(story) if story.organization_id == organization_id => Some(story),
                    _ => {
                        return abort(LedgerError::Validation(
                            "invalid impact story selected".into(),
                        ));
                    }
                },
                None => None,
            };

            let withdrawal = Withdrawal {
                id: withdrawal_id.clone(),
                organization_id: organization_id.to_string(),
                amount,
                status: WithdrawalStatus::Pending,
                bank_account_number: request.bank_account_number.clone(),
                purpose: request.purpose.clone(),
                requested_at: now.clone(),
                processed_at: None,
                processed_by: None,
                remarks: None,
            };
            tx.put(&keys::of(keys::WITHDRAWAL, &withdrawal.id), &withdrawal)?;
            tx.push_index(keys::ORG_WITHDRAWALS, organization_id, &withdrawal.id)?;

            let candidates = allocator::candidates(tx, organization_id)?;
            let slices = lift(allocator::allocate(candidates, amount))?;
            let beneficiary_id = self.general_fund(tx, organization_id)?;

            for slice in &slices {
                let allocation = DonationAllocation {
                    id: lift(utils::new_uuid_to_bech32(utils::ALLOCATION_HRP).map_err(Into::into))?,
                    donation_id: slice.donation_id.clone(),
                    withdrawal_id: withdrawal.id.clone(),
                    beneficiary_id: beneficiary_id.clone(),
                    impact_story_id: request.impact_story_id.clone(),
                    amount_spent: slice.amount,
                    purpose: request.purpose.clone(),
                    status: AllocationStatus::Pending,
                    spent_at: now.clone(),
                };
                tx.put(&keys::of(keys::ALLOCATION, &allocation.id), &allocation)?;
                tx.push_index(keys::DONATION_ALLOCATIONS, &slice.donation_id, &allocation.id)?;
                tx.push_index(keys::WITHDRAWAL_ALLOCATIONS, &withdrawal.id, &allocation.id)?;
            }

            if let Some(mut story) = story {
                story.total_funding = lift(story.total_funding.checked_add(amount))?;
                story.allocation_count += slices.len() as u64;
                tx.put(&keys::of(keys::STORY, &story.id), &story)?;
            }

            Ok(WithdrawalReceipt {
                allocations_count: slices.len(),
                available_balance_after: sheet.available().saturating_sub(amount),
                withdrawal,
            })
        })?;

        tracing::info!(
            withdrawal_id = %receipt.withdrawal.id,
            organization_id,
            amount = %amount,
            allocations = receipt.allocations_count,
            available_after = %receipt.available_balance_after,
            "withdrawal requested"
        );

        Ok(receipt)
    }

    /// Resolve the organization's general fund beneficiary, creating it on first use.
    fn general_fund(&self, tx: &Txn<'_>, organization_id: &str) -> TxResult<String> {
        let index_key = keys::of(keys::GENERAL_FUND, organization_id);
        if let Some(existing) = tx.get::<String>(&index_key)? {
            return Ok(existing);
        }

        let beneficiary = Beneficiary {
            id: lift(utils::new_uuid_to_bech32(utils::BENEFICIARY_HRP).map_err(Into::into))?,
            organization_id: organization_id.to_string(),
            name: self.config.general_fund_name.clone(),
            kind: "project".into(),
            location: "Organization Operations".into(),
            description: "General operational fund for the organization".into(),
        };
        tx.put(&keys::of(keys::BENEFICIARY, &beneficiary.id), &beneficiary)?;
        tx.put(&index_key, &beneficiary.id)?;
        Ok(beneficiary.id)
    }

    fn process_withdrawal_inner(
        &self,
        admin_id: &str,
        withdrawal_id: &str,
        action: ReviewAction,
        remarks: &str,
    ) -> LedgerResult<Withdrawal> {
        let admin = self.active_admin(admin_id)?;
        if !admin.role.can_process_withdrawals() {
            return Err(LedgerError::Unauthorized(
                "finance admin or super admin required".into(),
            ));
        }

        // the owning organization never changes, so it is safe to read before locking
        let organization_id = self.store.withdrawal(withdrawal_id)?.organization_id;
        let _org_row = self
            .store
            .lock_organization(&organization_id, self.config.lock_timeout)?;
        let _withdrawal_row = self
            .store
            .lock_withdrawal(withdrawal_id, self.config.lock_timeout)?;

        let now = self.clock.now();
        let remarks = normalize_remarks(remarks);

        let processed = self.store.transact(|tx| {
            let mut withdrawal: Withdrawal = tx.require(keys::WITHDRAWAL, "withdrawal", withdrawal_id)?;
            if withdrawal.status != WithdrawalStatus::Pending {
                return abort(LedgerError::StateConflict {
                    entity: "withdrawal",
                    id: withdrawal.id.clone(),
                    status: withdrawal.status.to_string(),
                });
            }
            let mut org: Organization =
                tx.require(keys::ORGANIZATION, "organization", &organization_id)?;

            match action {
                ReviewAction::Approve => {
                    let sheet = balance::balance_sheet(tx, &org.id)?;
                    if !sheet.admits_approval(withdrawal.amount) {
                        return abort(LedgerError::InsufficientBalance {
                            available: sheet.total_donations.saturating_sub(sheet.spent),
                        });
                    }
                    withdrawal.status = WithdrawalStatus::Approved;

                    org.total_spent = lift(org.total_spent.checked_add(withdrawal.amount))?;
                    org.refresh_available_balance();
                    tx.put(&keys::of(keys::ORGANIZATION, &org.id), &org)?;

                    finalize_allocations(tx, &withdrawal.id)?;
                }
                ReviewAction::Reject => {
                    withdrawal.status = WithdrawalStatus::Rejected;
                    release_allocations(tx, &withdrawal.id)?;
                }
            }

            withdrawal.processed_at = Some(now.clone());
            withdrawal.processed_by = Some(admin.id.clone());
            withdrawal.remarks = remarks.clone();
            tx.put(&keys::of(keys::WITHDRAWAL, &withdrawal.id), &withdrawal)?;

            let verb = match action {
                ReviewAction::Approve => "Approved",
                ReviewAction::Reject => "Rejected",
            };
            tx.append_audit(&AuditEntry {
                actor_id: admin.id.clone(),
                action_type: action,
                entity_type: "withdrawal".into(),
                entity_id: withdrawal.id.clone(),
                description: format!("{verb} withdrawal of {} for {}", withdrawal.amount, org.name),
                details: ChangeDetails {
                    previous_status: WithdrawalStatus::Pending.to_string(),
                    new_status: withdrawal.status.to_string(),
                    amount: Some(withdrawal.amount),
                    organization_id: org.id.clone(),
                    remarks: remarks.clone(),
                },
                performed_at: now.clone(),
            })?;

            Ok(withdrawal)
        })?;

        tracing::info!(
            withdrawal_id,
            admin_id,
            organization_id = %organization_id,
            action = action.as_str(),
            status = %processed.status,
            amount = %processed.amount,
            "withdrawal processed"
        );

        Ok(processed)
    }
}

/// Mark every allocation of the withdrawal completed and re-derive the status
/// of each donation it drew from.
fn finalize_allocations(tx: &Txn<'_>, withdrawal_id: &str) -> TxResult<()> {
    let mut touched = BTreeSet::new();
    for mut allocation in tx.allocations_of_withdrawal(withdrawal_id)? {
        allocation.status = AllocationStatus::Completed;
        tx.put(&keys::of(keys::ALLOCATION, &allocation.id), &allocation)?;
        touched.insert(allocation.donation_id);
    }

    for donation_id in touched {
        let mut donation: Donation = tx.require(keys::DONATION, "donation", &donation_id)?;
        let completed = lift(Amount::sum(
            tx.allocations_of_donation(&donation_id)?
                .iter()
                .filter(|a| a.status == AllocationStatus::Completed || a.withdrawal_id == withdrawal_id)
                .map(|a| &a.amount_spent),
        ))?;
        donation.status = Donation::derive_status(donation.amount_total, completed);
        tx.put(&keys::of(keys::DONATION, &donation.id), &donation)?;
    }
    Ok(())
}

/// Delete every allocation of the withdrawal, returning its reservation.
fn release_allocations(tx: &Txn<'_>, withdrawal_id: &str) -> TxResult<()> {
    for allocation in tx.allocations_of_withdrawal(withdrawal_id)? {
        tx.remove(&keys::of(keys::ALLOCATION, &allocation.id))?;
        tx.drop_from_index(keys::DONATION_ALLOCATIONS, &allocation.donation_id, &allocation.id)?;
    }
    tx.remove(&keys::of(keys::WITHDRAWAL_ALLOCATIONS, withdrawal_id))
}
