//! At most one cycle per `(user, provider)` pair.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::item::UserId;
use crate::provider::ProviderKind;

type Pair = (UserId, ProviderKind);

#[derive(Debug, Default)]
pub(crate) struct InFlight {
    pairs: Mutex<HashSet<Pair>>,
}

impl InFlight {
    /// Claim the pair, or `None` if a cycle for it is already running.
    pub fn try_begin(
        self: &Arc<Self>,
        user: &UserId,
        provider: ProviderKind,
    ) -> Option<InFlightGuard> {
        let pair = (user.clone(), provider);
        let mut pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
        if !pairs.insert(pair.clone()) {
            return None;
        }
        Some(InFlightGuard {
            set: Arc::clone(self),
            pair,
        })
    }

    pub fn is_running(&self, user: &UserId, provider: ProviderKind) -> bool {
        let pairs = self.pairs.lock().unwrap_or_else(PoisonError::into_inner);
        pairs.contains(&(user.clone(), provider))
    }
}

/// Releases the pair on drop, including when the cycle's task is aborted.
pub(crate) struct InFlightGuard {
    set: Arc<InFlight>,
    pair: Pair,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut pairs = self.set.pairs.lock().unwrap_or_else(PoisonError::into_inner);
        pairs.remove(&self.pair);
    }
}
