//! Privileged-attribute synchronizer.
//!
//! Role and enabled status live both in the store and in the authorization
//! directory. A change is written to the store first, then mirrored to the
//! directory. If the directory step fails, the store write and any directory
//! steps already applied are compensated, and the original error surfaces.
//!
//! Both compensating writes are conditional on the store still holding the
//! value this sync wrote. A concurrent sync that has since replaced it owns
//! both systems from then on, so the restore is skipped for it.

use std::sync::Arc;

use trackvault_core::directory::{
    DirectoryClient, DirectoryError, PrivilegedChange, SyncError, SyncOutcome,
};
use trackvault_core::library::{Account, Role};
use trackvault_core::storage::{AccountRepository, RepositoryError};

/// A directory write that has been applied and can be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DirectoryStep {
    AddedToGroup(String),
    RemovedFromGroup(String),
    Enabled,
    Disabled,
}

/// Keeps the directory consistent with the store for privileged attributes.
#[derive(Debug)]
pub struct PrivilegeSynchronizer<R, D> {
    accounts: Arc<R>,
    directory: Arc<D>,
}

impl<R, D> Clone for PrivilegeSynchronizer<R, D> {
    fn clone(&self) -> Self {
        Self {
            accounts: Arc::clone(&self.accounts),
            directory: Arc::clone(&self.directory),
        }
    }
}

impl<R: AccountRepository, D: DirectoryClient> PrivilegeSynchronizer<R, D> {
    pub fn new(accounts: Arc<R>, directory: Arc<D>) -> Self {
        Self {
            accounts,
            directory,
        }
    }

    /// Changes the role of `subject_id` in both systems.
    pub async fn change_role(
        &self,
        caller_id: &str,
        subject_id: &str,
        role: Role,
    ) -> Result<SyncOutcome, SyncError> {
        self.sync_privileged_attribute(caller_id, subject_id, PrivilegedChange::Role(role))
            .await
    }

    /// Disables or re-enables `subject_id` in both systems.
    pub async fn set_disabled(
        &self,
        caller_id: &str,
        subject_id: &str,
        disabled: bool,
    ) -> Result<SyncOutcome, SyncError> {
        self.sync_privileged_attribute(caller_id, subject_id, PrivilegedChange::Disabled(disabled))
            .await
    }

    /// Applies `change` to `subject_id` in the store, then in the directory.
    ///
    /// Callers may not change their own attributes. An account that already
    /// holds the value is returned as [`SyncOutcome::Unchanged`] without
    /// touching either system. A directory failure is compensated and
    /// returned as [`SyncError::Directory`]; if compensation fails too, the
    /// result is [`SyncError::Inconsistent`].
    pub async fn sync_privileged_attribute(
        &self,
        caller_id: &str,
        subject_id: &str,
        change: PrivilegedChange,
    ) -> Result<SyncOutcome, SyncError> {
        if caller_id == subject_id {
            tracing::warn!(caller = %caller_id, %change, "Rejected privileged self-modification");
            return Err(SyncError::SelfModification);
        }

        let snapshot = self.accounts.get_account(subject_id).await?;
        if change.is_satisfied_by(&snapshot) {
            tracing::debug!(subject = %subject_id, %change, "Privileged attribute unchanged");
            return Ok(SyncOutcome::Unchanged(snapshot));
        }

        let updated = self.write_store(subject_id, change, &snapshot).await?;

        let mut applied = Vec::new();
        match self.apply_directory(subject_id, change, &mut applied).await {
            Ok(()) => {
                tracing::info!(
                    caller = %caller_id,
                    subject = %subject_id,
                    %change,
                    "Privileged attribute synced"
                );
                Ok(SyncOutcome::Applied(updated))
            }
            Err(cause) => Err(self
                .compensate(subject_id, change.snapshot_of(&snapshot), &updated, applied, cause)
                .await),
        }
    }

    /// Writes `change` to the store, conditioned on the attribute still
    /// holding its value in `current`.
    async fn write_store(
        &self,
        subject_id: &str,
        change: PrivilegedChange,
        current: &Account,
    ) -> Result<Account, RepositoryError> {
        match change {
            PrivilegedChange::Role(role) => {
                self.accounts
                    .set_role(subject_id, role, Some(current.role))
                    .await
            }
            PrivilegedChange::Disabled(disabled) => {
                self.accounts
                    .set_disabled(subject_id, disabled, Some(current.disabled))
                    .await
            }
        }
    }

    /// Reads the directory and applies whatever `change` still needs,
    /// recording each applied write in `applied`.
    async fn apply_directory(
        &self,
        subject_id: &str,
        change: PrivilegedChange,
        applied: &mut Vec<DirectoryStep>,
    ) -> Result<(), DirectoryError> {
        match change {
            PrivilegedChange::Role(role) => {
                let groups = self.directory.get_groups(subject_id).await?;
                let target = role.group_name();

                // Add before removing so the subject never holds no role.
                if !groups.iter().any(|group| group == target) {
                    self.directory.add_to_group(subject_id, target).await?;
                    applied.push(DirectoryStep::AddedToGroup(target.to_string()));
                }
                for group in groups {
                    if group != target && Role::from_group_name(&group).is_some() {
                        self.directory.remove_from_group(subject_id, &group).await?;
                        applied.push(DirectoryStep::RemovedFromGroup(group));
                    }
                }
            }
            PrivilegedChange::Disabled(disabled) => {
                let enabled = self.directory.is_enabled(subject_id).await?;
                if disabled && enabled {
                    self.directory.disable(subject_id).await?;
                    applied.push(DirectoryStep::Disabled);
                } else if !disabled && !enabled {
                    self.directory.enable(subject_id).await?;
                    applied.push(DirectoryStep::Enabled);
                }
            }
        }
        Ok(())
    }

    async fn undo(&self, subject_id: &str, step: &DirectoryStep) -> Result<(), DirectoryError> {
        match step {
            DirectoryStep::AddedToGroup(group) => {
                self.directory.remove_from_group(subject_id, group).await
            }
            DirectoryStep::RemovedFromGroup(group) => {
                self.directory.add_to_group(subject_id, group).await
            }
            DirectoryStep::Enabled => self.directory.disable(subject_id).await,
            DirectoryStep::Disabled => self.directory.enable(subject_id).await,
        }
    }

    /// Restores the store to `restore` and undoes `applied` in reverse
    /// order. Every step is attempted even after one fails.
    async fn compensate(
        &self,
        subject_id: &str,
        restore: PrivilegedChange,
        updated: &Account,
        applied: Vec<DirectoryStep>,
        cause: DirectoryError,
    ) -> SyncError {
        tracing::warn!(
            subject = %subject_id,
            error = %cause,
            restore = %restore,
            directory_steps = applied.len(),
            "Directory update failed, compensating"
        );

        let mut failures = Vec::new();

        match self.write_store(subject_id, restore, updated).await {
            Ok(_) => {}
            Err(RepositoryError::Conflict { .. }) => {
                tracing::warn!(
                    subject = %subject_id,
                    "Privileged attribute changed concurrently, leaving the newer value"
                );
            }
            Err(err) => failures.push(format!("store restore: {err}")),
        }

        for step in applied.iter().rev() {
            if let Err(err) = self.undo(subject_id, step).await {
                failures.push(format!("undo {step:?}: {err}"));
            }
        }

        if failures.is_empty() {
            return SyncError::Directory(cause);
        }

        let compensation = failures.join("; ");
        tracing::error!(
            subject = %subject_id,
            cause = %cause,
            compensation = %compensation,
            "Store and directory diverged, manual reconciliation required"
        );
        SyncError::Inconsistent {
            subject: subject_id.to_string(),
            cause,
            compensation,
        }
    }
}
