//! Per-user registry of quizzes hidden from listings.
//!
//! Each user's set lives in the preference store under
//! `hidden_quizzes.<user id>` as an ascending, comma-joined id list.
//! Exactly one user's set is loaded at a time.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use quiz_core::model::{QuizId, UserId};
use storage::repository::PreferenceRepository;

use crate::error::{HiddenSetError, StorageContext};

const KEY_PREFIX: &str = "hidden_quizzes.";

fn scope_key(user: UserId) -> String {
    format!("{KEY_PREFIX}{user}")
}

/// Parse a stored id list, skipping anything that is not an id.
fn decode(raw: &str) -> BTreeSet<QuizId> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| match part.parse::<QuizId>() {
            Ok(id) => Some(id),
            Err(_) => {
                tracing::warn!(entry = part, "skipping malformed hidden quiz entry");
                None
            }
        })
        .collect()
}

fn encode(ids: &BTreeSet<QuizId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

struct Scope {
    user: UserId,
    ids: BTreeSet<QuizId>,
}

/// Hidden quiz ids for the active user, mirrored from the preference store.
///
/// Mutations (`hide`, `unhide`, `clear`, `set_scope`) hold the write lock
/// through the store write, so they never interleave; a failed write leaves
/// the in-memory set untouched. Reads share the lock and only ever observe
/// completed writes.
pub struct HiddenSet {
    prefs: Arc<dyn PreferenceRepository>,
    scope: RwLock<Scope>,
}

impl HiddenSet {
    /// Load the set for `user`, making it the active scope.
    ///
    /// # Errors
    ///
    /// Returns `HiddenSetError::Storage` if the preference store fails.
    pub async fn load(
        prefs: Arc<dyn PreferenceRepository>,
        user: UserId,
    ) -> Result<Self, HiddenSetError> {
        let ids = read_scope(prefs.as_ref(), user).await?;
        Ok(Self {
            prefs,
            scope: RwLock::new(Scope { user, ids }),
        })
    }

    /// Switch to `user`'s set, discarding the one currently loaded.
    ///
    /// # Errors
    ///
    /// Returns `HiddenSetError::Storage` if the preference store fails; the
    /// previous scope stays active in that case.
    pub async fn set_scope(&self, user: UserId) -> Result<(), HiddenSetError> {
        let mut scope = self.scope.write().await;
        let ids = read_scope(self.prefs.as_ref(), user).await?;
        tracing::debug!(%user, hidden = ids.len(), "hidden quiz scope switched");
        *scope = Scope { user, ids };
        Ok(())
    }

    /// Add `quiz` to the active user's set and persist it.
    ///
    /// # Errors
    ///
    /// Returns `HiddenSetError::Storage` if persisting fails.
    pub async fn hide(&self, quiz: QuizId) -> Result<(), HiddenSetError> {
        self.update(None, |ids| ids.insert(quiz)).await
    }

    /// Like `hide`, but only if `user`'s set is the active one, checked
    /// under the same lock as the write.
    ///
    /// # Errors
    ///
    /// Returns `HiddenSetError::ScopeMismatch` if another scope is active.
    /// Returns `HiddenSetError::Storage` if persisting fails.
    pub async fn hide_for(&self, user: UserId, quiz: QuizId) -> Result<(), HiddenSetError> {
        self.update(Some(user), |ids| ids.insert(quiz)).await
    }

    /// Remove `quiz` from the active user's set and persist it.
    ///
    /// # Errors
    ///
    /// Returns `HiddenSetError::Storage` if persisting fails.
    pub async fn unhide(&self, quiz: QuizId) -> Result<(), HiddenSetError> {
        self.update(None, |ids| ids.remove(&quiz)).await
    }

    /// Like `unhide`, but only if `user`'s set is the active one.
    ///
    /// # Errors
    ///
    /// Returns `HiddenSetError::ScopeMismatch` if another scope is active.
    /// Returns `HiddenSetError::Storage` if persisting fails.
    pub async fn unhide_for(&self, user: UserId, quiz: QuizId) -> Result<(), HiddenSetError> {
        self.update(Some(user), |ids| ids.remove(&quiz)).await
    }

    /// Empty the active user's set and persist it.
    ///
    /// # Errors
    ///
    /// Returns `HiddenSetError::Storage` if persisting fails.
    pub async fn clear(&self) -> Result<(), HiddenSetError> {
        self.update(None, |ids| {
            let changed = !ids.is_empty();
            ids.clear();
            changed
        })
        .await
    }

    pub async fn is_hidden(&self, quiz: QuizId) -> bool {
        self.scope.read().await.ids.contains(&quiz)
    }

    /// The user whose set is currently loaded.
    pub async fn scope(&self) -> UserId {
        self.scope.read().await.user
    }

    /// A copy of the active set.
    pub async fn snapshot(&self) -> BTreeSet<QuizId> {
        self.scope.read().await.ids.clone()
    }

    /// Apply `change` to a copy of the set, persist it, then publish it.
    /// With `expected`, the active scope must belong to that user.
    async fn update<F>(&self, expected: Option<UserId>, change: F) -> Result<(), HiddenSetError>
    where
        F: FnOnce(&mut BTreeSet<QuizId>) -> bool,
    {
        let mut scope = self.scope.write().await;
        if let Some(expected) = expected.filter(|user| *user != scope.user) {
            return Err(HiddenSetError::ScopeMismatch {
                active: scope.user,
                expected,
            });
        }
        let mut next = scope.ids.clone();
        if !change(&mut next) {
            return Ok(());
        }

        let key = scope_key(scope.user);
        self.prefs
            .put_preference(&key, &encode(&next))
            .await
            .context("put_preference", &key)?;
        scope.ids = next;
        Ok(())
    }
}

async fn read_scope(
    prefs: &dyn PreferenceRepository,
    user: UserId,
) -> Result<BTreeSet<QuizId>, HiddenSetError> {
    let key = scope_key(user);
    let raw = prefs
        .get_preference(&key)
        .await
        .context("get_preference", &key)?;
    Ok(raw.as_deref().map(decode).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use storage::repository::{InMemoryRepository, StorageError};

    async fn hidden_set(user: u64) -> (InMemoryRepository, HiddenSet) {
        let repo = InMemoryRepository::new();
        let set = HiddenSet::load(Arc::new(repo.clone()), UserId::new(user))
            .await
            .unwrap();
        (repo, set)
    }

    #[test]
    fn decode_skips_malformed_entries() {
        let ids = decode(" 3, x,,5 ,-1, 12abc,7");
        let ids: Vec<_> = ids.into_iter().map(|id| id.value()).collect();
        assert_eq!(ids, vec![3, 5, 7]);
    }

    #[test]
    fn encode_is_sorted_and_comma_joined() {
        let ids = BTreeSet::from([QuizId::new(9), QuizId::new(2), QuizId::new(5)]);
        assert_eq!(encode(&ids), "2,5,9");
        assert_eq!(encode(&BTreeSet::new()), "");
    }

    #[tokio::test]
    async fn hide_persists_under_scope_key() {
        let (repo, set) = hidden_set(1).await;
        set.hide(QuizId::new(5)).await.unwrap();
        set.hide(QuizId::new(2)).await.unwrap();

        assert!(set.is_hidden(QuizId::new(5)).await);
        assert_eq!(
            repo.get_preference("hidden_quizzes.1").await.unwrap().as_deref(),
            Some("2,5")
        );
    }

    #[tokio::test]
    async fn scope_switch_round_trips_through_store() {
        let (_repo, set) = hidden_set(1).await;
        set.hide(QuizId::new(5)).await.unwrap();

        set.set_scope(UserId::new(2)).await.unwrap();
        assert_eq!(set.scope().await, UserId::new(2));
        assert!(!set.is_hidden(QuizId::new(5)).await);

        set.set_scope(UserId::new(1)).await.unwrap();
        assert!(set.is_hidden(QuizId::new(5)).await);
    }

    #[tokio::test]
    async fn clear_empties_only_the_active_scope() {
        let (repo, set) = hidden_set(1).await;
        set.hide(QuizId::new(1)).await.unwrap();
        set.hide(QuizId::new(2)).await.unwrap();
        set.set_scope(UserId::new(2)).await.unwrap();
        set.hide(QuizId::new(3)).await.unwrap();

        set.set_scope(UserId::new(1)).await.unwrap();
        set.clear().await.unwrap();
        assert!(!set.is_hidden(QuizId::new(1)).await);
        assert!(!set.is_hidden(QuizId::new(2)).await);
        assert_eq!(
            repo.get_preference("hidden_quizzes.1").await.unwrap().as_deref(),
            Some("")
        );
        assert_eq!(
            repo.get_preference("hidden_quizzes.2").await.unwrap().as_deref(),
            Some("3")
        );
    }

    #[tokio::test]
    async fn unhide_removes_a_single_id() {
        let (_repo, set) = hidden_set(4).await;
        set.hide(QuizId::new(1)).await.unwrap();
        set.hide(QuizId::new(2)).await.unwrap();
        set.unhide(QuizId::new(1)).await.unwrap();

        assert_eq!(set.snapshot().await, BTreeSet::from([QuizId::new(2)]));
    }

    #[tokio::test]
    async fn load_tolerates_garbage_in_store() {
        let repo = InMemoryRepository::new();
        repo.put_preference("hidden_quizzes.8", "4,oops,,6").await.unwrap();

        let set = HiddenSet::load(Arc::new(repo), UserId::new(8)).await.unwrap();
        assert_eq!(
            set.snapshot().await,
            BTreeSet::from([QuizId::new(4), QuizId::new(6)])
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_hides_are_not_lost() {
        let (repo, set) = hidden_set(1).await;
        let set = Arc::new(set);

        let mut handles = Vec::new();
        for id in 1..=50 {
            let set = Arc::clone(&set);
            handles.push(tokio::spawn(async move { set.hide(QuizId::new(id)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(set.snapshot().await.len(), 50);
        let reloaded = HiddenSet::load(Arc::new(repo), UserId::new(1)).await.unwrap();
        assert_eq!(reloaded.snapshot().await.len(), 50);
    }

    /// Preference store whose writes can be switched off.
    struct FlakyPrefs {
        inner: InMemoryRepository,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl PreferenceRepository for FlakyPrefs {
        async fn get_preference(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get_preference(key).await
        }

        async fn put_preference(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("disk full".into()));
            }
            self.inner.put_preference(key, value).await
        }
    }

    #[tokio::test]
    async fn failed_persist_keeps_previous_state() {
        let prefs = Arc::new(FlakyPrefs {
            inner: InMemoryRepository::new(),
            fail_writes: AtomicBool::new(false),
        });
        let set = HiddenSet::load(prefs.clone(), UserId::new(1)).await.unwrap();
        set.hide(QuizId::new(1)).await.unwrap();

        prefs.fail_writes.store(true, Ordering::SeqCst);
        let err = set.hide(QuizId::new(2)).await.unwrap_err();
        let failure = match err {
            HiddenSetError::Storage(failure) => failure,
            other => panic!("expected storage failure, got {other:?}"),
        };
        assert_eq!(failure.operation, "put_preference");
        assert_eq!(failure.target, "hidden_quizzes.1");

        assert!(set.is_hidden(QuizId::new(1)).await);
        assert!(!set.is_hidden(QuizId::new(2)).await);
    }

    #[tokio::test]
    async fn scoped_writes_refuse_another_users_set() {
        let (repo, set) = hidden_set(1).await;
        set.hide_for(UserId::new(1), QuizId::new(4)).await.unwrap();

        set.set_scope(UserId::new(2)).await.unwrap();
        let err = set.hide_for(UserId::new(1), QuizId::new(5)).await.unwrap_err();
        assert!(matches!(
            err,
            HiddenSetError::ScopeMismatch { active, expected }
                if active == UserId::new(2) && expected == UserId::new(1)
        ));
        assert!(matches!(
            set.unhide_for(UserId::new(1), QuizId::new(4)).await,
            Err(HiddenSetError::ScopeMismatch { .. })
        ));
        assert!(set.snapshot().await.is_empty());
        assert_eq!(repo.get_preference("hidden_quizzes.2").await.unwrap(), None);
        assert_eq!(
            repo.get_preference("hidden_quizzes.1").await.unwrap().as_deref(),
            Some("4")
        );
    }
}
