//! Ledger store: typed CBOR rows in sled, transactional access and row locks
use crate::error::{LedgerError, LedgerResult};
use crate::locks::{LockTable, RowGuard};
use crate::records::{
    Admin, AuditEntry, Beneficiary, Donation, DonationAllocation, Donor, ImpactStory, Organization,
    VerificationRecord, Withdrawal,
};
use crate::types::{AdminRole, Amount};
use crate::utils;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use std::sync::Arc;
use std::time::Duration;

pub(crate) mod keys {
    pub const ORGANIZATION: &str = "org/";
    pub const DONOR: &str = "donor/";
    pub const ADMIN: &str = "admin/";
    pub const DONATION: &str = "donation/";
    pub const WITHDRAWAL: &str = "withdrawal/";
    pub const ALLOCATION: &str = "allocation/";
    pub const BENEFICIARY: &str = "beneficiary/";
    pub const STORY: &str = "story/";
    pub const AUDIT: &str = "audit/";
    pub const VERIFICATION: &str = "verification/";
    pub const TX_REFERENCE: &str = "txref/";
    pub const ORG_DONATIONS: &str = "idx/org_donations/";
    pub const ORG_WITHDRAWALS: &str = "idx/org_withdrawals/";
    pub const DONATION_ALLOCATIONS: &str = "idx/donation_allocations/";
    pub const WITHDRAWAL_ALLOCATIONS: &str = "idx/withdrawal_allocations/";
    pub const GENERAL_FUND: &str = "idx/general_fund/";

    pub fn of(prefix: &str, id: &str) -> String {
        format!("{prefix}{id}")
    }
}

pub(crate) type TxResult<T> = ConflictableTransactionResult<T, LedgerError>;

/// Abort the enclosing transaction, rolling back every write made so far.
pub(crate) fn abort<T>(e: LedgerError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(e))
}

/// Carry a plain ledger result into a transaction, aborting on `Err`.
pub(crate) fn lift<T>(result: LedgerResult<T>) -> TxResult<T> {
    result.map_err(ConflictableTransactionError::Abort)
}

/// Typed view over one sled transaction.
pub(crate) struct Txn<'a> {
    tree: &'a TransactionalTree,
}

impl Txn<'_> {
    pub fn get<T>(&self, key: &str) -> TxResult<Option<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => match minicbor::decode(&*bytes) {
                Ok(value) => Ok(Some(value)),
                Err(e) => abort(e.into()),
            },
            None => Ok(None),
        }
    }

    pub fn require<T>(&self, prefix: &str, entity: &'static str, id: &str) -> TxResult<T>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.get(&keys::of(prefix, id))? {
            Some(value) => Ok(value),
            None => abort(LedgerError::not_found(entity, id)),
        }
    }

    pub fn contains(&self, key: &str) -> TxResult<bool> {
        Ok(self.tree.get(key.as_bytes())?.is_some())
    }

    pub fn put<T: minicbor::Encode<()>>(&self, key: &str, value: &T) -> TxResult<()> {
        let bytes = match minicbor::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => return abort(e.into()),
        };
        self.tree.insert(key.as_bytes(), bytes)?;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> TxResult<()> {
        self.tree.remove(key.as_bytes())?;
        Ok(())
    }

    pub fn index(&self, prefix: &str, owner: &str) -> TxResult<Vec<String>> {
        Ok(self.get(&keys::of(prefix, owner))?.unwrap_or_default())
    }

    pub fn push_index(&self, prefix: &str, owner: &str, id: &str) -> TxResult<()> {
        let mut ids = self.index(prefix, owner)?;
        ids.push(id.to_string());
        self.put(&keys::of(prefix, owner), &ids)
    }

    pub fn drop_from_index(&self, prefix: &str, owner: &str, id: &str) -> TxResult<()> {
        let mut ids = self.index(prefix, owner)?;
        ids.retain(|existing| existing != id);
        self.put(&keys::of(prefix, owner), &ids)
    }

    /// Load every row listed under an index key.
    pub fn children<T>(
        &self,
        index_prefix: &str,
        owner: &str,
        row_prefix: &str,
        entity: &'static str,
    ) -> TxResult<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        self.index(index_prefix, owner)?
            .iter()
            .map(|id| self.require(row_prefix, entity, id))
            .collect()
    }

    pub fn donations_of(&self, organization_id: &str) -> TxResult<Vec<Donation>> {
        self.children(
            keys::ORG_DONATIONS,
            organization_id,
            keys::DONATION,
            "donation",
        )
    }

    pub fn withdrawals_of(&self, organization_id: &str) -> TxResult<Vec<Withdrawal>> {
        self.children(
            keys::ORG_WITHDRAWALS,
            organization_id,
            keys::WITHDRAWAL,
            "withdrawal",
        )
    }

    pub fn allocations_of_donation(&self, donation_id: &str) -> TxResult<Vec<DonationAllocation>> {
        self.children(
            keys::DONATION_ALLOCATIONS,
            donation_id,
            keys::ALLOCATION,
            "allocation",
        )
    }

    pub fn allocations_of_withdrawal(
        &self,
        withdrawal_id: &str,
    ) -> TxResult<Vec<DonationAllocation>> {
        self.children(
            keys::WITHDRAWAL_ALLOCATIONS,
            withdrawal_id,
            keys::ALLOCATION,
            "allocation",
        )
    }

    /// Append an audit row under `audit/<sortable key>/<content hash>`.
    /// Identical entries still get their own rows.
    pub fn append_audit(&self, entry: &AuditEntry) -> TxResult<String> {
        let (hash, cbor) = match entry.build() {
            Ok(built) => built,
            Err(e) => return abort(e.into()),
        };
        let key = format!("{}{}/{hash}", keys::AUDIT, utils::new_sortable_key());
        self.tree.insert(key.as_bytes(), cbor)?;
        Ok(hash)
    }
}

/// Durable storage for every ledger entity.
pub struct LedgerStore {
    instance: Arc<sled::Db>,
    pub(crate) locks: LockTable,
}

impl LedgerStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self {
            instance,
            locks: LockTable::new(),
        }
    }

    /// Run `f` as one atomic unit. An `Err` from `f` rolls back all of its writes.
    /// The closure may be re-run by sled on conflict, so it must not have side effects.
    pub(crate) fn transact<T, F>(&self, f: F) -> LedgerResult<T>
    where
        F: Fn(&Txn<'_>) -> TxResult<T>,
    {
        self.instance
            .transaction(|tree| f(&Txn { tree }))
            .map_err(LedgerError::from)
    }

    pub(crate) fn lock_organization(&self, id: &str, timeout: Duration) -> LedgerResult<RowGuard<'_>> {
        self.locks.lock_row(&keys::of(keys::ORGANIZATION, id), timeout)
    }

    pub(crate) fn lock_withdrawal(&self, id: &str, timeout: Duration) -> LedgerResult<RowGuard<'_>> {
        self.locks.lock_row(&keys::of(keys::WITHDRAWAL, id), timeout)
    }

    fn read<T>(&self, prefix: &str, entity: &'static str, id: &str) -> LedgerResult<T>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.instance.get(keys::of(prefix, id))? {
            Some(bytes) => Ok(minicbor::decode(&*bytes)?),
            None => Err(LedgerError::not_found(entity, id)),
        }
    }

    fn write<T: minicbor::Encode<()>>(&self, prefix: &str, id: &str, value: &T) -> LedgerResult<()> {
        self.instance
            .insert(keys::of(prefix, id), minicbor::to_vec(value)?)?;
        Ok(())
    }

    fn read_index<T>(
        &self,
        index_prefix: &str,
        owner: &str,
        row_prefix: &str,
        entity: &'static str,
    ) -> LedgerResult<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let ids: Vec<String> = match self.instance.get(keys::of(index_prefix, owner))? {
            Some(bytes) => minicbor::decode(&*bytes)?,
            None => Vec::new(),
        };
        ids.iter()
            .map(|id| self.read(row_prefix, entity, id))
            .collect()
    }

    fn scan<T>(&self, prefix: &str) -> LedgerResult<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        self.instance
            .scan_prefix(prefix)
            .values()
            .map(|bytes| -> LedgerResult<T> { Ok(minicbor::decode(&*bytes?)?) })
            .collect()
    }

    pub fn register_organization(&self, name: &str) -> LedgerResult<Organization> {
        let org = Organization::new(utils::new_uuid_to_bech32(utils::ORGANIZATION_HRP)?, name.into());
        self.write(keys::ORGANIZATION, &org.id, &org)?;
        Ok(org)
    }

    pub fn register_donor(&self, name: &str) -> LedgerResult<Donor> {
        let donor = Donor::new(utils::new_uuid_to_bech32(utils::DONOR_HRP)?, name.into());
        self.write(keys::DONOR, &donor.id, &donor)?;
        Ok(donor)
    }

    pub fn register_admin(&self, name: &str, role: AdminRole) -> LedgerResult<Admin> {
        let admin = Admin {
            id: utils::new_uuid_to_bech32(utils::ADMIN_HRP)?,
            name: name.into(),
            is_active: true,
            role,
        };
        self.write(keys::ADMIN, &admin.id, &admin)?;
        Ok(admin)
    }

    pub fn add_impact_story(&self, organization_id: &str, title: &str) -> LedgerResult<ImpactStory> {
        self.organization(organization_id)?;
        let story = ImpactStory {
            id: utils::new_uuid_to_bech32(utils::STORY_HRP)?,
            organization_id: organization_id.into(),
            title: title.into(),
            total_funding: Amount::ZERO,
            allocation_count: 0,
        };
        self.write(keys::STORY, &story.id, &story)?;
        Ok(story)
    }

    pub(crate) fn put_organization(&self, org: &Organization) -> LedgerResult<()> {
        self.write(keys::ORGANIZATION, &org.id, org)
    }

    pub fn set_admin_active(&self, id: &str, is_active: bool) -> LedgerResult<()> {
        let mut admin = self.admin(id)?;
        admin.is_active = is_active;
        self.write(keys::ADMIN, id, &admin)
    }

    /// Insert a withdrawal row as-is, bypassing every business check.
    /// Meant for migrating legacy rows and for seeding test fixtures.
    pub fn put_withdrawal(&self, withdrawal: &Withdrawal) -> LedgerResult<()> {
        self.transact(|tx| {
            let key = keys::of(keys::WITHDRAWAL, &withdrawal.id);
            if !tx.contains(&key)? {
                tx.push_index(keys::ORG_WITHDRAWALS, &withdrawal.organization_id, &withdrawal.id)?;
            }
            tx.put(&key, withdrawal)
        })
    }

    pub fn organization(&self, id: &str) -> LedgerResult<Organization> {
        self.read(keys::ORGANIZATION, "organization", id)
    }

    pub fn donor(&self, id: &str) -> LedgerResult<Donor> {
        self.read(keys::DONOR, "donor", id)
    }

    pub fn admin(&self, id: &str) -> LedgerResult<Admin> {
        self.read(keys::ADMIN, "admin", id)
    }

    pub fn donation(&self, id: &str) -> LedgerResult<Donation> {
        self.read(keys::DONATION, "donation", id)
    }

    pub fn withdrawal(&self, id: &str) -> LedgerResult<Withdrawal> {
        self.read(keys::WITHDRAWAL, "withdrawal", id)
    }

    pub fn impact_story(&self, id: &str) -> LedgerResult<ImpactStory> {
        self.read(keys::STORY, "impact story", id)
    }

    pub fn beneficiary(&self, id: &str) -> LedgerResult<Beneficiary> {
        self.read(keys::BENEFICIARY, "beneficiary", id)
    }

    pub fn donations_for_organization(&self, organization_id: &str) -> LedgerResult<Vec<Donation>> {
        self.read_index(keys::ORG_DONATIONS, organization_id, keys::DONATION, "donation")
    }

    pub fn withdrawals_for_organization(
        &self,
        organization_id: &str,
    ) -> LedgerResult<Vec<Withdrawal>> {
        self.read_index(keys::ORG_WITHDRAWALS, organization_id, keys::WITHDRAWAL, "withdrawal")
    }

    pub fn allocations_for_withdrawal(
        &self,
        withdrawal_id: &str,
    ) -> LedgerResult<Vec<DonationAllocation>> {
        self.read_index(
            keys::WITHDRAWAL_ALLOCATIONS,
            withdrawal_id,
            keys::ALLOCATION,
            "allocation",
        )
    }

    pub fn allocations_for_donation(
        &self,
        donation_id: &str,
    ) -> LedgerResult<Vec<DonationAllocation>> {
        self.read_index(
            keys::DONATION_ALLOCATIONS,
            donation_id,
            keys::ALLOCATION,
            "allocation",
        )
    }

    pub fn audit_entries(&self) -> LedgerResult<Vec<AuditEntry>> {
        let mut entries: Vec<AuditEntry> = self.scan(keys::AUDIT)?;
        entries.sort_by(|a, b| a.performed_at.cmp(&b.performed_at));
        Ok(entries)
    }

    pub fn verification_history(&self, organization_id: &str) -> LedgerResult<Vec<VerificationRecord>> {
        self.scan(&format!("{}{organization_id}/", keys::VERIFICATION))
    }
}
