//! Three-way set reconciliation between desired and live entries.
//!
//! Entries on both sides are matched by a key. A live entry whose key is not
//! desired (or whose key was already claimed by an earlier live entry) is
//! deleted; every desired entry is then either unchanged, an update of its
//! matched live entry, or a create.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use tracing::debug;

/// What to do with one desired entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a, D, L> {
    /// No live entry has the key.
    Create(&'a D),
    /// A live entry has the key but differs.
    Update {
        /// Desired entry.
        desired: &'a D,
        /// Matched live entry.
        live: &'a L,
    },
    /// A live entry has the key and is identical.
    Unchanged {
        /// Desired entry.
        desired: &'a D,
        /// Matched live entry.
        live: &'a L,
    },
}

impl<D, L> Action<'_, D, L> {
    /// Returns true if the action mutates the gateway.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

/// Result of a three-way diff over one collection.
#[derive(Debug, Clone)]
pub struct SetDiff<'a, D, L> {
    /// Live entries to delete, in live order.
    pub deletes: Vec<&'a L>,
    /// One action per desired entry, in desired order.
    pub actions: Vec<Action<'a, D, L>>,
}

impl<D, L> SetDiff<'_, D, L> {
    /// Number of creates.
    #[must_use]
    pub fn creates(&self) -> usize {
        self.actions.iter().filter(|a| matches!(a, Action::Create(_))).count()
    }

    /// Number of updates.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.actions.iter().filter(|a| matches!(a, Action::Update { .. })).count()
    }

    /// Number of unchanged entries.
    #[must_use]
    pub fn unchanged(&self) -> usize {
        self.actions.iter().filter(|a| !a.is_change()).count()
    }

    /// Returns true if nothing needs to change.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.deletes.is_empty() && self.actions.iter().all(|a| !a.is_change())
    }
}

/// Computes the three-way diff of one collection.
///
/// `same` decides whether a desired entry equals the live entry it matched.
pub fn three_way<'a, D, L, K>(
    desired: &'a [D],
    live: &'a [L],
    desired_key: impl Fn(&D) -> K,
    live_key: impl Fn(&L) -> K,
    same: impl Fn(&D, &L) -> bool,
) -> SetDiff<'a, D, L>
where
    K: Eq + Hash,
{
    let wanted: HashSet<K> = desired.iter().map(&desired_key).collect();

    let mut claimed: HashMap<K, &'a L> = HashMap::new();
    let mut deletes = Vec::new();
    for entry in live {
        let key = live_key(entry);
        if wanted.contains(&key) && !claimed.contains_key(&key) {
            claimed.insert(key, entry);
        } else {
            deletes.push(entry);
        }
    }

    let actions = desired
        .iter()
        .map(|entry| match claimed.get(&desired_key(entry)).copied() {
            Some(live) if same(entry, live) => Action::Unchanged { desired: entry, live },
            Some(live) => Action::Update { desired: entry, live },
            None => Action::Create(entry),
        })
        .collect();

    let diff = SetDiff { deletes, actions };
    debug!(
        "Diff: {} delete(s), {} create(s), {} update(s), {} unchanged",
        diff.deletes.len(),
        diff.creates(),
        diff.updates(),
        diff.unchanged()
    );
    diff
}
