//! Available balance, always recomputed from donation and withdrawal rows.
//!
//! The cached `Organization::available_balance` is for display only. Both the
//! request-time and the approval-time admission checks go through
//! [`BalanceSheet`] so the two can never disagree about which withdrawal
//! statuses count.
use crate::error::LedgerResult;
use crate::records::{Donation, Withdrawal};
use crate::store::{TxResult, Txn, lift};
use crate::types::Amount;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BalanceSheet {
    /// Sum of every donation the organization has received
    pub total_donations: Amount,
    /// Withdrawals that hold a claim on funds: pending, approved, completed
    pub reserved: Amount,
    /// Withdrawals whose funds have left: approved, completed
    pub spent: Amount,
}

impl BalanceSheet {
    pub fn from_history(donations: &[Donation], withdrawals: &[Withdrawal]) -> LedgerResult<Self> {
        let total_donations = Amount::sum(donations.iter().map(|d| &d.amount_total))?;
        let reserved = Amount::sum(
            withdrawals
                .iter()
                .filter(|w| w.status.reserves_funds())
                .map(|w| &w.amount),
        )?;
        let spent = Amount::sum(
            withdrawals
                .iter()
                .filter(|w| w.status.is_spent())
                .map(|w| &w.amount),
        )?;

        Ok(Self {
            total_donations,
            reserved,
            spent,
        })
    }

    /// Donations minus every non-rejected withdrawal.
    pub fn available(&self) -> Amount {
        self.total_donations.saturating_sub(self.reserved)
    }

    /// A new request is admitted only if it fits inside [`Self::available`].
    pub fn admits_request(&self, amount: Amount) -> bool {
        amount <= self.available()
    }

    /// Approval re-check: donations minus already spent minus this amount must not go negative.
    pub fn admits_approval(&self, amount: Amount) -> bool {
        self.total_donations
            .checked_sub(self.spent)
            .and_then(|left| left.checked_sub(amount))
            .is_some()
    }
}

/// Recompute the balance sheet of one organization inside a transaction.
pub(crate) fn balance_sheet(tx: &Txn<'_>, organization_id: &str) -> TxResult<BalanceSheet> {
    let donations = tx.donations_of(organization_id)?;
    let withdrawals = tx.withdrawals_of(organization_id)?;

    lift(BalanceSheet::from_history(&donations, &withdrawals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DonationStatus, PaymentMethod, TimeStamp, WithdrawalStatus};

    fn donation(major: u64) -> Donation {
        Donation {
            id: format!("don_{major}"),
            donor_id: "donor_1".into(),
            organization_id: "org_1".into(),
            amount_total: Amount::from_major(major),
            payment_method: PaymentMethod::Card,
            transaction_reference: format!("TXN-{major}"),
            status: DonationStatus::Allocated,
            donated_at: TimeStamp::new(),
            is_recurring: false,
        }
    }

    fn withdrawal(major: u64, status: WithdrawalStatus) -> Withdrawal {
        Withdrawal {
            id: format!("wdr_{major}_{status}"),
            organization_id: "org_1".into(),
            amount: Amount::from_major(major),
            status,
            bank_account_number: "0001".into(),
            purpose: "rent".into(),
            requested_at: TimeStamp::new(),
            processed_at: None,
            processed_by: None,
            remarks: None,
        }
    }

    #[test]
    fn rejected_withdrawals_do_not_reserve() {
        let sheet = BalanceSheet::from_history(
            &[donation(100), donation(50)],
            &[
                withdrawal(30, WithdrawalStatus::Pending),
                withdrawal(20, WithdrawalStatus::Approved),
                withdrawal(10, WithdrawalStatus::Completed),
                withdrawal(80, WithdrawalStatus::Rejected),
            ],
        )
        .unwrap();

        assert_eq!(sheet.total_donations, Amount::from_major(150));
        assert_eq!(sheet.reserved, Amount::from_major(60));
        assert_eq!(sheet.spent, Amount::from_major(30));
        assert_eq!(sheet.available(), Amount::from_major(90));
    }

    #[test]
    fn request_admission_is_inclusive() {
        let sheet = BalanceSheet::from_history(&[donation(100)], &[]).unwrap();

        assert!(sheet.admits_request(Amount::from_major(100)));
        assert!(!sheet.admits_request(Amount::from_major(150)));
    }

    #[test]
    fn approval_ignores_pending_claims() {
        // two legacy pending rows that together exceed the donations
        let sheet = BalanceSheet::from_history(
            &[donation(100)],
            &[
                withdrawal(70, WithdrawalStatus::Pending),
                withdrawal(60, WithdrawalStatus::Pending),
            ],
        )
        .unwrap();
        assert!(sheet.admits_approval(Amount::from_major(70)));

        let after_one = BalanceSheet::from_history(
            &[donation(100)],
            &[
                withdrawal(70, WithdrawalStatus::Approved),
                withdrawal(60, WithdrawalStatus::Pending),
            ],
        )
        .unwrap();
        assert!(!after_one.admits_approval(Amount::from_major(60)));
    }
}
