use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;
use crate::store::Store;
use crate::types::CampListing;

pub const DEFAULT_CAMP_CACHE_TTL: Duration = Duration::from_secs(60);

struct Snapshot {
    loaded_at: Instant,
    camps: Arc<Vec<CampListing>>,
}

#[derive(Default)]
struct State {
    /// Bumped by every invalidation. A load only installs its snapshot if no
    /// invalidation happened while it was reading the store.
    generation: u64,
    snapshot: Option<Snapshot>,
}

/// Read-through cache of every camp joined with its program.
///
/// Owned by whoever serves camp listings and handed the store on each call.
/// A snapshot older than `ttl` is reloaded on the next [`CampDirectory::get`].
pub struct CampDirectory {
    ttl: Duration,
    state: RwLock<State>,
}

fn load(store: &dyn Store) -> Result<Vec<CampListing>> {
    let programs: HashMap<_, _> = store
        .list_programs()?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut camps = Vec::new();
    for camp in store.list_camps()? {
        match programs.get(&camp.program_id) {
            Some(program) => camps.push(CampListing {
                program: program.clone(),
                camp,
            }),
            None => warn!(
                "Skipping camp {} whose program {} is missing",
                camp.id, camp.program_id
            ),
        }
    }
    Ok(camps)
}

impl CampDirectory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: RwLock::new(State::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True when there is no snapshot or it has outlived the staleness window.
    pub fn is_stale(&self) -> bool {
        let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
        match guard.snapshot.as_ref() {
            Some(snapshot) => snapshot.loaded_at.elapsed() >= self.ttl,
            None => true,
        }
    }

    pub fn get(&self, store: &dyn Store) -> Result<Arc<Vec<CampListing>>> {
        {
            let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
            if let Some(snapshot) = guard.snapshot.as_ref() {
                if snapshot.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&snapshot.camps));
                }
            }
        }
        self.refresh(store)
    }

    /// Reloads unconditionally and replaces the snapshot, unless the directory
    /// was invalidated while the load was in flight. The freshly loaded camps are
    /// returned either way.
    pub fn refresh(&self, store: &dyn Store) -> Result<Arc<Vec<CampListing>>> {
        let generation = self.generation();
        let camps = Arc::new(load(store)?);
        self.install(generation, Arc::clone(&camps));
        Ok(camps)
    }

    pub fn invalidate(&self) {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        guard.generation += 1;
        guard.snapshot = None;
    }

    fn generation(&self) -> u64 {
        self.state.read().unwrap_or_else(|e| e.into_inner()).generation
    }

    fn install(&self, generation: u64, camps: Arc<Vec<CampListing>>) {
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        if guard.generation != generation {
            debug!("Discarding camp directory load superseded by an invalidation");
            return;
        }
        debug!("Refreshed camp directory with {} camps", camps.len());
        guard.snapshot = Some(Snapshot {
            loaded_at: Instant::now(),
            camps,
        });
    }
}

impl Default for CampDirectory {
    fn default() -> Self {
        Self::new(DEFAULT_CAMP_CACHE_TTL)
    }
}
