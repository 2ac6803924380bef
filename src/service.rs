//! Service layer API for donation and withdrawal workflow operations
use crate::balance;
use crate::clock::{Clock, SystemClock};
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::records::{Admin, Organization};
use crate::store::{LedgerStore, keys};
use crate::types::Amount;
use std::sync::Arc;

/// Entry point for every money-moving operation.
///
/// Holds no per-request state: each call coordinates with concurrent callers
/// only through row locks and sled transactions, so one service can be shared
/// across threads behind an `Arc`.
pub struct LedgerService {
    pub(crate) store: LedgerStore,
    pub(crate) config: LedgerConfig,
    pub(crate) clock: Arc<dyn Clock>,
}

impl LedgerService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self::with_config(instance, LedgerConfig::default(), Arc::new(SystemClock))
    }

    pub fn with_config(instance: Arc<sled::Db>, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: LedgerStore::new(instance),
            config,
            clock,
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Donations minus every pending, approved or completed withdrawal.
    pub fn get_available_balance(&self, organization_id: &str) -> LedgerResult<Amount> {
        self.store.transact(|tx| {
            tx.require::<Organization>(keys::ORGANIZATION, "organization", organization_id)?;
            Ok(balance::balance_sheet(tx, organization_id)?.available())
        })
    }

    /// Flip the owning account's active flag, as the identity collaborator does.
    pub fn set_organization_active(&self, organization_id: &str, is_active: bool) -> LedgerResult<()> {
        let _org_row = self
            .store
            .lock_organization(organization_id, self.config.lock_timeout)?;
        let mut org = self.store.organization(organization_id)?;
        org.is_active = is_active;
        self.store.put_organization(&org)?;

        tracing::info!(organization_id, is_active, "organization activity changed");
        Ok(())
    }

    /// Resolve an admin that is allowed to act. Unknown and inactive admins are unauthorized.
    pub(crate) fn active_admin(&self, admin_id: &str) -> LedgerResult<Admin> {
        let admin = match self.store.admin(admin_id) {
            Ok(admin) => admin,
            Err(LedgerError::NotFound { .. }) => {
                return Err(LedgerError::Unauthorized(
                    "admin not found or inactive".into(),
                ));
            }
            Err(e) => return Err(e),
        };
        if !admin.is_active {
            return Err(LedgerError::Unauthorized(
                "admin not found or inactive".into(),
            ));
        }
        Ok(admin)
    }
}

/// Log a failed operation at the level its kind deserves.
pub(crate) fn log_failure(operation: &'static str, err: &LedgerError) {
    match err {
        // already recorded with full detail where it was raised
        LedgerError::Internal(_) => {}
        LedgerError::Contention(_) => tracing::warn!(operation, %err, "operation hit lock contention"),
        _ => tracing::warn!(operation, %err, "operation rejected"),
    }
}

/// Empty remarks are stored as absent.
pub(crate) fn normalize_remarks(remarks: &str) -> Option<String> {
    let trimmed = remarks.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
