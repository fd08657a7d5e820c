//! Lazy compaction scheduler: single-in-flight, single-enqueued vacuum
//! passes over stale postings.
//!
//! Modeled as a cooperative task rather than anything lock-based: concurrent
//! mutation is out of scope entirely, so the scheduler's state lives behind
//! a plain `Rc<RefCell<..>>` — "single owner, single thread" — and is driven
//! on a `tokio` current-thread runtime via `LocalSet`/`spawn_local`.
//! Multiple callers of `vacuum()` while a pass is outstanding share one
//! `futures::future::Shared` clone, so at most one pass is ever in flight
//! and at most one more is ever queued behind it.

use std::cell::RefCell;
use std::pin::Pin;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};

use crate::config::VacuumConditions;
use crate::ids::ShortId;

pub type SharedVacuumFuture = Shared<LocalBoxFuture<'static, ()>>;

/// Everything the scheduler needs from the index to run a pass, without
/// depending on `ExtId` — object-safe so the scheduler can hold a trait
/// object instead of being generic itself.
pub trait VacuumHost {
    fn doc_count(&self) -> u64;
    fn dirt_count(&self) -> u64;
    fn set_dirt_count(&mut self, value: u64);
    fn is_live(&self, short_id: ShortId) -> bool;
    /// Snapshot of current postings terms, taken once per pass so the sweep
    /// can walk a stable list while mutating the tree underneath it.
    fn terms_snapshot(&self) -> Vec<String>;
    /// Scrubs stale (non-live) short-id references under one term across
    /// every field, pruning empty field and term submaps. Returns the
    /// number of (field, short_id) entries removed.
    fn scrub_term(&mut self, term: &str) -> u64;
}

pub struct VacuumParams {
    pub batch_size: usize,
    pub batch_wait_ms: u64,
}

struct SchedulerState {
    current: Option<SharedVacuumFuture>,
    enqueued: Option<(SharedVacuumFuture, Option<VacuumConditions>)>,
}

/// The scheduler itself is `Clone`-cheap (an `Rc` pair); clones share state,
/// matching the single `SearchIndex` value that owns it.
#[derive(Clone)]
pub struct VacuumScheduler {
    host: Rc<RefCell<dyn VacuumHost>>,
    state: Rc<RefCell<SchedulerState>>,
}

fn dirt_factor(dirt_count: u64, doc_count: u64) -> f64 {
    dirt_count as f64 / (1.0 + doc_count as f64 + dirt_count as f64)
}

/// An already-resolved vacuum future, for call sites that need to hand back
/// a `SharedVacuumFuture` but have nothing to run (auto-vacuum disabled, or
/// conditions unmet).
pub fn resolved() -> SharedVacuumFuture {
    resolved_future()
}

fn resolved_future() -> SharedVacuumFuture {
    let fut: LocalBoxFuture<'static, ()> = Box::pin(futures::future::ready(()));
    fut.shared()
}

async fn sweep_pass(host: Rc<RefCell<dyn VacuumHost>>, params: VacuumParams) {
    let initial_dirt_count = host.borrow().dirt_count();
    let terms = host.borrow().terms_snapshot();

    for (visited, term) in terms.iter().enumerate() {
        host.borrow_mut().scrub_term(term);
        if params.batch_size > 0 && (visited + 1) % params.batch_size == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(params.batch_wait_ms)).await;
        }
    }

    let mut host_mut = host.borrow_mut();
    let remaining = host_mut.dirt_count().saturating_sub(initial_dirt_count);
    host_mut.set_dirt_count(remaining);
    drop(host_mut);

    // Trailing yield: guarantees the current -> None transition below is
    // only observed by callers after at least one more suspension point.
    tokio::task::yield_now().await;
}

impl VacuumScheduler {
    pub fn new(host: Rc<RefCell<dyn VacuumHost>>) -> Self {
        VacuumScheduler {
            host,
            state: Rc::new(RefCell::new(SchedulerState { current: None, enqueued: None })),
        }
    }

    pub fn is_vacuuming(&self) -> bool {
        self.state.borrow().current.is_some()
    }

    /// Runs (or joins, or enqueues behind) a vacuum pass gated by
    /// `conditions`; `None` means unconditional.
    pub fn vacuum(&self, params: VacuumParams, conditions: Option<VacuumConditions>) -> SharedVacuumFuture {
        let currently_running = self.state.borrow().current.clone();

        let Some(current) = currently_running else {
            let met = conditions
                .map(|c| c.met(self.host.borrow().dirt_count(), dirt_factor(self.host.borrow().dirt_count(), self.host.borrow().doc_count())))
                .unwrap_or(true);
            if !met {
                return resolved_future();
            }
            return self.start_pass(params, conditions);
        };

        let already_enqueued = self.state.borrow().enqueued.clone();
        if let Some((enqueued_future, enqueued_conditions)) = already_enqueued {
            let narrowed = match (enqueued_conditions, conditions) {
                (None, _) | (_, None) => None,
                (Some(a), Some(b)) => Some(a.narrow(b)),
            };
            self.state.borrow_mut().enqueued = Some((enqueued_future.clone(), narrowed));
            return enqueued_future;
        }

        self.enqueue_after(current, params, conditions)
    }

    /// Runs `vacuum` with the configured thresholds if auto-vacuum is
    /// enabled, returning the resulting future; `None` when auto-vacuum is
    /// disabled entirely (the caller should fall back to [`resolved`] if it
    /// needs a future unconditionally).
    pub fn maybe_auto_vacuum(&self, setting: &crate::config::AutoVacuumSetting) -> Option<SharedVacuumFuture> {
        setting.options().map(|opts| {
            let params = VacuumParams { batch_size: opts.batch_size, batch_wait_ms: opts.batch_wait_ms };
            self.vacuum(params, Some(opts.as_conditions()))
        })
    }

    fn start_pass(&self, params: VacuumParams, conditions: Option<VacuumConditions>) -> SharedVacuumFuture {
        let host = self.host.clone();
        let state = self.state.clone();
        let _ = conditions; // conditions are the gate checked before starting; the pass itself is unconditional once started
        let fut: LocalBoxFuture<'static, ()> = Box::pin(async move {
            sweep_pass(host, params).await;
            let mut s = state.borrow_mut();
            if let Some((enqueued_future, _)) = s.enqueued.take() {
                s.current = Some(enqueued_future);
            } else {
                s.current = None;
            }
        });
        let shared = fut.shared();
        self.state.borrow_mut().current = Some(shared.clone());
        shared
    }

    /// Creates the enqueued future for "something is running, nothing
    /// enqueued yet": it waits for `current` to resolve, promotes itself to
    /// `current`, reads the (possibly narrowed by later callers) enqueued
    /// conditions, and runs. A placeholder cell breaks the self-reference
    /// needed for the future to install its own `Shared` clone as the new
    /// `current`.
    fn enqueue_after(
        &self,
        current: SharedVacuumFuture,
        params: VacuumParams,
        conditions: Option<VacuumConditions>,
    ) -> SharedVacuumFuture {
        let host = self.host.clone();
        let state = self.state.clone();
        let self_handle: Rc<RefCell<Option<SharedVacuumFuture>>> = Rc::new(RefCell::new(None));
        let self_handle_for_future = self_handle.clone();

        let fut: LocalBoxFuture<'static, ()> = Box::pin(async move {
            current.clone().await;

            let (own_future, own_conditions) = {
                let mut s = state.borrow_mut();
                let (_, conds) = s.enqueued.take().expect("enqueued slot populated by construction");
                let own = self_handle_for_future.borrow().clone().expect("self handle installed before poll");
                s.current = Some(own.clone());
                (own, conds)
            };
            let _ = own_future;

            let met = own_conditions
                .map(|c| c.met(host.borrow().dirt_count(), dirt_factor(host.borrow().dirt_count(), host.borrow().doc_count())))
                .unwrap_or(true);
            if met {
                sweep_pass(host, params).await;
            }

            let mut s = state.borrow_mut();
            if let Some((next_future, _)) = s.enqueued.take() {
                s.current = Some(next_future);
            } else {
                s.current = None;
            }
        });

        let shared = fut.shared();
        *self_handle.borrow_mut() = Some(shared.clone());
        self.state.borrow_mut().enqueued = Some((shared.clone(), conditions));
        shared
    }
}

/// Drives the scheduler's futures on a single-threaded cooperative runtime.
/// Embedders that already run their own `tokio` current-thread runtime can
/// instead just `.await` the futures `SearchIndex` hands back directly.
pub fn block_on_local<F: std::future::Future<Output = ()> + 'static>(fut: F) {
    let local = tokio::task::LocalSet::new();
    let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().expect("current-thread runtime");
    local.block_on(&rt, fut);
}

pub type BoxedLocalFuture = Pin<Box<dyn std::future::Future<Output = ()>>>;
