use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::use_cases::plans::{PlanCache, SubscriptionPlanProfile};

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

impl<T> Entry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

#[derive(Default)]
struct CacheState {
    plans: HashMap<Uuid, Entry<SubscriptionPlanProfile>>,
    active_list: Option<Entry<Vec<SubscriptionPlanProfile>>>,
}

/// In-process plan cache. Entries expire after `ttl`; writes through
/// `PlanUseCases` invalidate eagerly.
pub struct TtlPlanCache {
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl TtlPlanCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // A panic while holding the lock cannot leave the maps half-written.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlanCache for TtlPlanCache {
    fn get(&self, id: Uuid) -> Option<SubscriptionPlanProfile> {
        let mut state = self.lock();
        match state.plans.get(&id) {
            Some(entry) if entry.is_fresh(self.ttl) => Some(entry.value.clone()),
            Some(_) => {
                state.plans.remove(&id);
                None
            }
            None => None,
        }
    }

    fn put(&self, plan: SubscriptionPlanProfile) {
        self.lock().plans.insert(plan.id, Entry::new(plan));
    }

    fn get_active_list(&self) -> Option<Vec<SubscriptionPlanProfile>> {
        let mut state = self.lock();
        match &state.active_list {
            Some(entry) if entry.is_fresh(self.ttl) => Some(entry.value.clone()),
            Some(_) => {
                state.active_list = None;
                None
            }
            None => None,
        }
    }

    fn put_active_list(&self, plans: Vec<SubscriptionPlanProfile>) {
        self.lock().active_list = Some(Entry::new(plans));
    }

    fn invalidate(&self, id: Uuid) {
        let mut state = self.lock();
        state.plans.remove(&id);
        state.active_list = None;
    }
}
