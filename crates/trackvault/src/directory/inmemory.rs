//! In-memory directory for testing.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use trackvault_core::directory::{DirectoryClient, DirectoryError, Result};

/// Directory operations, for failure injection and call inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectoryOperation {
    GetGroups,
    AddToGroup,
    RemoveFromGroup,
    IsEnabled,
    Enable,
    Disable,
}

/// One recorded call. `group` is set for membership changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCall {
    pub operation: DirectoryOperation,
    pub subject: String,
    pub group: Option<String>,
}

#[derive(Debug, Clone)]
struct Subject {
    groups: BTreeSet<String>,
    enabled: bool,
}

/// In-memory directory.
///
/// Clones share state, so a test can keep a handle while the synchronizer
/// owns another. Unknown subjects fail with `SubjectNotFound`, like a real
/// user pool.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    subjects: Arc<RwLock<HashMap<String, Subject>>>,
    failures: Arc<Mutex<HashMap<DirectoryOperation, VecDeque<DirectoryError>>>>,
    calls: Arc<Mutex<Vec<DirectoryCall>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an enabled subject with the given groups.
    pub async fn add_subject<I, G>(&self, subject: &str, groups: I)
    where
        I: IntoIterator<Item = G>,
        G: Into<String>,
    {
        self.subjects.write().await.insert(
            subject.to_string(),
            Subject {
                groups: groups.into_iter().map(Into::into).collect(),
                enabled: true,
            },
        );
    }

    /// Makes the next call of `operation` fail with `error`. Queued failures
    /// are consumed in order.
    pub async fn fail_next(&self, operation: DirectoryOperation, error: DirectoryError) {
        self.failures
            .lock()
            .await
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Current groups of `subject`, sorted. `None` for unknown subjects.
    pub async fn groups_of(&self, subject: &str) -> Option<Vec<String>> {
        self.subjects
            .read()
            .await
            .get(subject)
            .map(|s| s.groups.iter().cloned().collect())
    }

    /// Current enabled flag of `subject`. `None` for unknown subjects.
    pub async fn enabled_state(&self, subject: &str) -> Option<bool> {
        self.subjects.read().await.get(subject).map(|s| s.enabled)
    }

    /// Every call made so far, in order, including failed ones.
    pub async fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.lock().await.clone()
    }

    /// Calls that would have changed directory state.
    pub async fn write_calls(&self) -> Vec<DirectoryCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|call| {
                !matches!(
                    call.operation,
                    DirectoryOperation::GetGroups | DirectoryOperation::IsEnabled
                )
            })
            .cloned()
            .collect()
    }

    async fn begin(
        &self,
        operation: DirectoryOperation,
        subject: &str,
        group: Option<&str>,
    ) -> Result<()> {
        self.calls.lock().await.push(DirectoryCall {
            operation,
            subject: subject.to_string(),
            group: group.map(str::to_string),
        });
        let injected = self
            .failures
            .lock()
            .await
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn with_subject<T>(
        &self,
        subject: &str,
        f: impl FnOnce(&mut Subject) -> T,
    ) -> Result<T> {
        let mut subjects = self.subjects.write().await;
        let entry = subjects
            .get_mut(subject)
            .ok_or_else(|| DirectoryError::SubjectNotFound(subject.to_string()))?;
        Ok(f(entry))
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn get_groups(&self, subject: &str) -> Result<Vec<String>> {
        self.begin(DirectoryOperation::GetGroups, subject, None)
            .await?;
        self.with_subject(subject, |s| s.groups.iter().cloned().collect())
            .await
    }

    async fn add_to_group(&self, subject: &str, group: &str) -> Result<()> {
        self.begin(DirectoryOperation::AddToGroup, subject, Some(group))
            .await?;
        self.with_subject(subject, |s| {
            s.groups.insert(group.to_string());
        })
        .await
    }

    async fn remove_from_group(&self, subject: &str, group: &str) -> Result<()> {
        self.begin(DirectoryOperation::RemoveFromGroup, subject, Some(group))
            .await?;
        self.with_subject(subject, |s| {
            s.groups.remove(group);
        })
        .await
    }

    async fn is_enabled(&self, subject: &str) -> Result<bool> {
        self.begin(DirectoryOperation::IsEnabled, subject, None)
            .await?;
        self.with_subject(subject, |s| s.enabled).await
    }

    async fn enable(&self, subject: &str) -> Result<()> {
        self.begin(DirectoryOperation::Enable, subject, None).await?;
        self.with_subject(subject, |s| s.enabled = true).await
    }

    async fn disable(&self, subject: &str) -> Result<()> {
        self.begin(DirectoryOperation::Disable, subject, None)
            .await?;
        self.with_subject(subject, |s| s.enabled = false).await
    }
}
