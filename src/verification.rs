//! Admin review of organization registrations
use crate::error::LedgerResult;
use crate::records::{AuditEntry, ChangeDetails, Organization, VerificationRecord};
use crate::service::{LedgerService, log_failure, normalize_remarks};
use crate::store::keys;
use crate::types::{ReviewAction, VerificationStatus};
use crate::utils;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub organization: Organization,
    pub previous_status: VerificationStatus,
    pub new_status: VerificationStatus,
}

impl LedgerService {
    /// Approve or reject an organization. Only approved organizations may withdraw.
    pub fn verify_organization(
        &self,
        admin_id: &str,
        organization_id: &str,
        action: ReviewAction,
        remarks: &str,
    ) -> LedgerResult<VerificationOutcome> {
        self.verify_organization_inner(admin_id, organization_id, action, remarks)
            .inspect_err(|e| log_failure("verify_organization", e))
    }

    fn verify_organization_inner(
        &self,
        admin_id: &str,
        organization_id: &str,
        action: ReviewAction,
        remarks: &str,
    ) -> LedgerResult<VerificationOutcome> {
        let admin = self.active_admin(admin_id)?;
        let _org_row = self
            .store
            .lock_organization(organization_id, self.config.lock_timeout)?;

        let now = self.clock.now();
        let remarks = normalize_remarks(remarks);
        let record_key = format!(
            "{}{organization_id}/{}",
            keys::VERIFICATION,
            utils::new_sortable_key()
        );
        let new_status = match action {
            ReviewAction::Approve => VerificationStatus::Approved,
            ReviewAction::Reject => VerificationStatus::Rejected,
        };

        let outcome = self.store.transact(|tx| {
            let mut org: Organization =
                tx.require(keys::ORGANIZATION, "organization", organization_id)?;
            let previous_status = org.verification_status;

            org.verification_status = new_status;
            if new_status == VerificationStatus::Approved {
                org.verified_at = Some(now.clone());
            }
            tx.put(&keys::of(keys::ORGANIZATION, &org.id), &org)?;

            tx.put(
                &record_key,
                &VerificationRecord {
                    organization_id: org.id.clone(),
                    reviewed_by: admin.id.clone(),
                    previous_status,
                    new_status,
                    remarks: remarks.clone(),
                    reviewed_at: now.clone(),
                },
            )?;

            tx.append_audit(&AuditEntry {
                actor_id: admin.id.clone(),
                action_type: action,
                entity_type: "organization".into(),
                entity_id: org.id.clone(),
                description: format!(
                    "Admin '{}' {} organization '{}' (previously: {previous_status})",
                    admin.name, new_status, org.name
                ),
                details: ChangeDetails {
                    previous_status: previous_status.to_string(),
                    new_status: new_status.to_string(),
                    amount: None,
                    organization_id: org.id.clone(),
                    remarks: remarks.clone(),
                },
                performed_at: now.clone(),
            })?;

            Ok(VerificationOutcome {
                organization: org,
                previous_status,
                new_status,
            })
        })?;

        tracing::info!(
            organization_id,
            admin_id,
            previous = %outcome.previous_status,
            new = %outcome.new_status,
            "organization reviewed"
        );

        Ok(outcome)
    }
}
