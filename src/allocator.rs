//! FIFO allocation of a withdrawal amount across unspent donation remainders
use crate::error::{LedgerError, LedgerResult};
use crate::store::{TxResult, Txn, lift};
use crate::types::{Amount, TimeStamp};
use chrono::Utc;

/// A donation together with how much of it existing allocations already claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub donation_id: String,
    pub donated_at: TimeStamp<Utc>,
    pub amount_total: Amount,
    pub amount_allocated: Amount,
}

impl Candidate {
    pub fn remainder(&self) -> Amount {
        self.amount_total.saturating_sub(self.amount_allocated)
    }
}

/// One slice of a withdrawal, drawn from one donation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    pub donation_id: String,
    pub amount: Amount,
}

/// Split `amount` across `candidates`, oldest donation first.
///
/// Ties on `donated_at` are broken by donation id so the split is reproducible.
/// Running out of remainders before `amount` is covered means the balance check
/// that should have preceded this call was wrong, and is reported as an
/// internal error rather than a short allocation.
pub fn allocate(mut candidates: Vec<Candidate>, amount: Amount) -> LedgerResult<Vec<Slice>> {
    candidates.sort_by(|a, b| {
        a.donated_at
            .cmp(&b.donated_at)
            .then_with(|| a.donation_id.cmp(&b.donation_id))
    });

    let mut still_needed = amount;
    let mut slices = Vec::new();

    for candidate in candidates.iter().filter(|c| !c.remainder().is_zero()) {
        if still_needed.is_zero() {
            break;
        }
        let take = candidate.remainder().min(still_needed);
        still_needed = still_needed.saturating_sub(take);
        slices.push(Slice {
            donation_id: candidate.donation_id.clone(),
            amount: take,
        });
    }

    if !still_needed.is_zero() {
        return Err(LedgerError::internal(format!(
            "donation remainders exhausted with {still_needed} of {amount} unallocated"
        )));
    }

    Ok(slices)
}

/// Gather the organization's donations and their allocated totals (any status).
pub(crate) fn candidates(tx: &Txn<'_>, organization_id: &str) -> TxResult<Vec<Candidate>> {
    let mut out = Vec::new();
    for donation in tx.donations_of(organization_id)? {
        let allocations = tx.allocations_of_donation(&donation.id)?;
        let amount_allocated = lift(Amount::sum(allocations.iter().map(|a| &a.amount_spent)))?;
        out.push(Candidate {
            donation_id: donation.id,
            donated_at: donation.donated_at,
            amount_total: donation.amount_total,
            amount_allocated,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, minute: u32, total: u64, allocated: u64) -> Candidate {
        Candidate {
            donation_id: id.into(),
            donated_at: TimeStamp::new_with(2025, 1, 1, 0, minute, 0),
            amount_total: Amount::from_major(total),
            amount_allocated: Amount::from_major(allocated),
        }
    }

    #[test]
    fn oldest_donations_are_consumed_first() {
        let slices = allocate(
            vec![
                candidate("d3", 3, 100, 0),
                candidate("d1", 1, 50, 0),
                candidate("d2", 2, 30, 0),
            ],
            Amount::from_major(70),
        )
        .unwrap();

        assert_eq!(
            slices,
            vec![
                Slice { donation_id: "d1".into(), amount: Amount::from_major(50) },
                Slice { donation_id: "d2".into(), amount: Amount::from_major(20) },
            ]
        );
    }

    #[test]
    fn fully_allocated_donations_are_skipped() {
        let slices = allocate(
            vec![candidate("d1", 1, 50, 50), candidate("d2", 2, 30, 10)],
            Amount::from_major(15),
        )
        .unwrap();

        assert_eq!(
            slices,
            vec![Slice { donation_id: "d2".into(), amount: Amount::from_major(15) }]
        );
    }

    #[test]
    fn identical_timestamps_break_ties_by_id() {
        let slices = allocate(
            vec![candidate("db", 1, 10, 0), candidate("da", 1, 10, 0)],
            Amount::from_major(5),
        )
        .unwrap();

        assert_eq!(slices[0].donation_id, "da");
    }

    #[test]
    fn exhaustion_is_an_internal_error() {
        let err = allocate(vec![candidate("d1", 1, 10, 0)], Amount::from_major(11)).unwrap_err();
        assert!(matches!(err, LedgerError::Internal(_)));
    }
}
