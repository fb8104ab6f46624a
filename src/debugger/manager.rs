//! Central store for all breakpoints of a debug session.
//!
//! The manager is the single owner of breakpoint state. Components never
//! hold `Breakpoint` values across calls; they look state up by
//! `(type, address)` so there is exactly one source of truth, and they learn
//! about changes through [`BreakpointListener`] callbacks.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, error, info};

use crate::debugger::address::BreakpointAddress;
use crate::debugger::breakpoint::{Breakpoint, BreakpointStatus, BreakpointType};
use crate::errors::BreakpointError;
use crate::expr::condition::ConditionTree;

/// Observer of breakpoint store changes.
///
/// Callbacks are invoked without any store lock held, so a listener may call
/// back into the manager. A panicking listener is logged and skipped; it
/// never disturbs the store or the other listeners.
pub trait BreakpointListener: Send + Sync {
    fn breakpoints_added(&self, breakpoints: &[Breakpoint]) {
        let _ = breakpoints;
    }

    fn breakpoints_removed(&self, kind: BreakpointType, addresses: &[BreakpointAddress]) {
        let _ = (kind, addresses);
    }

    fn breakpoints_status_changed(
        &self,
        kind: BreakpointType,
        addresses: &[BreakpointAddress],
        status: BreakpointStatus,
    ) {
        let _ = (kind, addresses, status);
    }

    fn breakpoint_condition_changed(&self, breakpoint: &Breakpoint) {
        let _ = breakpoint;
    }

    fn breakpoint_description_changed(&self, breakpoint: &Breakpoint) {
        let _ = breakpoint;
    }
}

#[derive(Default)]
struct Stores {
    regular: BTreeMap<BreakpointAddress, Breakpoint>,
    echo: BTreeMap<BreakpointAddress, Breakpoint>,
    step: BTreeMap<BreakpointAddress, Breakpoint>,
}

impl Stores {
    fn store(&self, kind: BreakpointType) -> &BTreeMap<BreakpointAddress, Breakpoint> {
        match kind {
            BreakpointType::Regular => &self.regular,
            BreakpointType::Echo => &self.echo,
            BreakpointType::Step => &self.step,
        }
    }

    fn store_mut(&mut self, kind: BreakpointType) -> &mut BTreeMap<BreakpointAddress, Breakpoint> {
        match kind {
            BreakpointType::Regular => &mut self.regular,
            BreakpointType::Echo => &mut self.echo,
            BreakpointType::Step => &mut self.step,
        }
    }
}

/// Thread-safe breakpoint store with type hierarchy enforcement.
pub struct BreakpointManager {
    stores: Mutex<Stores>,
    listeners: Mutex<Vec<Arc<dyn BreakpointListener>>>,
}

impl Default for BreakpointManager {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakpointManager {
    pub fn new() -> Self {
        Self {
            stores: Mutex::new(Stores::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn BreakpointListener>) {
        self.lock_listeners().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn BreakpointListener>) {
        self.lock_listeners()
            .retain(|known| !Arc::ptr_eq(known, listener));
    }

    /// Adds breakpoints of the given type, enforcing the type priority:
    ///
    /// * an address covered by a higher-priority breakpoint is skipped,
    /// * existing lower-priority breakpoints at the address are displaced,
    /// * duplicates of the same type are skipped silently.
    ///
    /// Returns the addresses that actually entered the store.
    pub fn add_breakpoints(
        &self,
        kind: BreakpointType,
        addresses: &[BreakpointAddress],
    ) -> Vec<BreakpointAddress> {
        let mut added = Vec::new();
        let mut displaced: Vec<(BreakpointType, Vec<BreakpointAddress>)> = Vec::new();
        let mut new_breakpoints = Vec::new();

        {
            let mut stores = self.lock_stores();

            for &address in addresses {
                if stores.store(kind).contains_key(&address) {
                    continue;
                }

                let covered = BreakpointType::ALL.into_iter().any(|other| {
                    other.priority() > kind.priority()
                        && stores.store(other).contains_key(&address)
                });
                if covered {
                    continue;
                }

                for other in BreakpointType::ALL {
                    if other.priority() < kind.priority()
                        && stores.store_mut(other).remove(&address).is_some()
                    {
                        match displaced.iter_mut().find(|(found, _)| *found == other) {
                            Some((_, displaced_addresses)) => displaced_addresses.push(address),
                            None => displaced.push((other, vec![address])),
                        }
                    }
                }

                let breakpoint = Breakpoint::new(kind, address);
                new_breakpoints.push(breakpoint.clone());
                stores.store_mut(kind).insert(address, breakpoint);
                added.push(address);
            }
        }

        for (displaced_kind, displaced_addresses) in &displaced {
            info!(
                "{} {} breakpoints displaced by {}",
                displaced_addresses.len(),
                displaced_kind,
                kind
            );
            self.notify(|listener| {
                listener.breakpoints_removed(*displaced_kind, displaced_addresses);
            });
        }

        if !new_breakpoints.is_empty() {
            debug!("added {} {} breakpoints", new_breakpoints.len(), kind);
            self.notify(|listener| listener.breakpoints_added(&new_breakpoints));
        }

        added
    }

    pub fn has_breakpoint(&self, kind: BreakpointType, address: BreakpointAddress) -> bool {
        self.lock_stores().store(kind).contains_key(&address)
    }

    /// Snapshot of one breakpoint's state.
    pub fn breakpoint(
        &self,
        kind: BreakpointType,
        address: BreakpointAddress,
    ) -> Result<Breakpoint, BreakpointError> {
        self.lock_stores()
            .store(kind)
            .get(&address)
            .cloned()
            .ok_or(BreakpointError::NotFound { kind, address })
    }

    pub fn status(
        &self,
        kind: BreakpointType,
        address: BreakpointAddress,
    ) -> Result<BreakpointStatus, BreakpointError> {
        self.breakpoint(kind, address)
            .map(|breakpoint| breakpoint.status())
    }

    /// Snapshot of all breakpoints of one type, in address order.
    pub fn breakpoints(&self, kind: BreakpointType) -> Vec<Breakpoint> {
        self.lock_stores().store(kind).values().cloned().collect()
    }

    pub fn count(&self, kind: BreakpointType) -> usize {
        self.lock_stores().store(kind).len()
    }

    /// Sets the status of a batch of breakpoints and notifies listeners once
    /// for the whole batch.
    ///
    /// Fails without touching the store if any address has no breakpoint of
    /// the given type.
    pub fn set_breakpoint_status(
        &self,
        kind: BreakpointType,
        addresses: &[BreakpointAddress],
        status: BreakpointStatus,
    ) -> Result<(), BreakpointError> {
        {
            let mut stores = self.lock_stores();
            let store = stores.store_mut(kind);
            for address in addresses {
                if !store.contains_key(address) {
                    return Err(BreakpointError::NotFound {
                        kind,
                        address: *address,
                    });
                }
            }
            for address in addresses {
                if let Some(breakpoint) = store.get_mut(address) {
                    breakpoint.set_status(status);
                }
            }
        }

        if !addresses.is_empty() {
            self.notify(|listener| listener.breakpoints_status_changed(kind, addresses, status));
        }
        Ok(())
    }

    /// Flips breakpoints between enabled and disabled. Disabled breakpoints
    /// become enabled; armed or pending ones become disabled. Invalid and
    /// deleting breakpoints are left alone.
    pub fn toggle_breakpoints(
        &self,
        kind: BreakpointType,
        addresses: &[BreakpointAddress],
    ) -> Result<(), BreakpointError> {
        let mut to_enable = Vec::new();
        let mut to_disable = Vec::new();

        {
            let stores = self.lock_stores();
            let store = stores.store(kind);
            for &address in addresses {
                let breakpoint = store
                    .get(&address)
                    .ok_or(BreakpointError::NotFound { kind, address })?;
                match breakpoint.status() {
                    BreakpointStatus::Disabled => to_enable.push(address),
                    BreakpointStatus::Active
                    | BreakpointStatus::Inactive
                    | BreakpointStatus::Enabled
                    | BreakpointStatus::Hit => to_disable.push(address),
                    BreakpointStatus::Invalid | BreakpointStatus::Deleting => {}
                }
            }
        }

        self.set_breakpoint_status(kind, &to_enable, BreakpointStatus::Enabled)?;
        self.set_breakpoint_status(kind, &to_disable, BreakpointStatus::Disabled)?;
        Ok(())
    }

    /// Starts removal of breakpoints.
    ///
    /// Breakpoints that may be armed in the target (active, enabled or hit)
    /// move to [`BreakpointStatus::Deleting`] and stay in the store until
    /// the agent confirms via [`confirm_removed`](Self::confirm_removed).
    /// Breakpoints the target never saw are dropped immediately.
    ///
    /// Returns the addresses that still need an agent round trip.
    pub fn remove_breakpoints(
        &self,
        kind: BreakpointType,
        addresses: &[BreakpointAddress],
    ) -> Result<Vec<BreakpointAddress>, BreakpointError> {
        let mut deleting = Vec::new();
        let mut dropped = Vec::new();

        {
            let mut stores = self.lock_stores();
            let store = stores.store_mut(kind);
            for &address in addresses {
                let breakpoint = store
                    .get(&address)
                    .ok_or(BreakpointError::NotFound { kind, address })?;
                match breakpoint.status() {
                    BreakpointStatus::Active
                    | BreakpointStatus::Enabled
                    | BreakpointStatus::Hit => deleting.push(address),
                    BreakpointStatus::Inactive
                    | BreakpointStatus::Disabled
                    | BreakpointStatus::Invalid => dropped.push(address),
                    // Removal already in flight
                    BreakpointStatus::Deleting => {}
                }
            }
            for address in &deleting {
                if let Some(breakpoint) = store.get_mut(address) {
                    breakpoint.set_status(BreakpointStatus::Deleting);
                }
            }
            for address in &dropped {
                store.remove(address);
            }
        }

        if !deleting.is_empty() {
            self.notify(|listener| {
                listener.breakpoints_status_changed(kind, &deleting, BreakpointStatus::Deleting);
            });
        }
        if !dropped.is_empty() {
            self.notify(|listener| listener.breakpoints_removed(kind, &dropped));
        }

        Ok(deleting)
    }

    /// Drops breakpoints whose removal the agent confirmed.
    ///
    /// Unknown addresses are ignored; the agent may confirm a removal the
    /// user already retracted.
    pub fn confirm_removed(&self, kind: BreakpointType, addresses: &[BreakpointAddress]) {
        let mut removed = Vec::new();
        {
            let mut stores = self.lock_stores();
            let store = stores.store_mut(kind);
            for &address in addresses {
                if store.remove(&address).is_some() {
                    removed.push(address);
                }
            }
        }
        if !removed.is_empty() {
            debug!("agent confirmed removal of {} {} breakpoints", removed.len(), kind);
            self.notify(|listener| listener.breakpoints_removed(kind, &removed));
        }
    }

    /// Drops every breakpoint of the given type without consulting the
    /// agent, used when the target went away.
    ///
    /// Regular breakpoints represent user intent that must survive the
    /// session, so clearing them passively is a contract violation.
    pub fn clear_passive(&self, kind: BreakpointType) -> Result<(), BreakpointError> {
        if kind == BreakpointType::Regular {
            return Err(BreakpointError::InvalidOperation {
                kind,
                operation: "passive clear",
            });
        }

        let removed: Vec<BreakpointAddress> = {
            let mut stores = self.lock_stores();
            let store = stores.store_mut(kind);
            let addresses = store.keys().copied().collect();
            store.clear();
            addresses
        };

        if !removed.is_empty() {
            self.notify(|listener| listener.breakpoints_removed(kind, &removed));
        }
        Ok(())
    }

    pub fn set_condition(
        &self,
        address: BreakpointAddress,
        condition: Option<ConditionTree>,
    ) -> Result<(), BreakpointError> {
        let snapshot = {
            let mut stores = self.lock_stores();
            let breakpoint = stores.regular.get_mut(&address).ok_or(
                BreakpointError::NotFound {
                    kind: BreakpointType::Regular,
                    address,
                },
            )?;
            breakpoint.set_condition(condition);
            breakpoint.clone()
        };

        self.notify(|listener| listener.breakpoint_condition_changed(&snapshot));
        Ok(())
    }

    pub fn set_description(
        &self,
        address: BreakpointAddress,
        description: impl Into<String>,
    ) -> Result<(), BreakpointError> {
        let description = description.into();
        let snapshot = {
            let mut stores = self.lock_stores();
            let breakpoint = stores.regular.get_mut(&address).ok_or(
                BreakpointError::NotFound {
                    kind: BreakpointType::Regular,
                    address,
                },
            )?;
            breakpoint.set_description(description);
            breakpoint.clone()
        };

        self.notify(|listener| listener.breakpoint_description_changed(&snapshot));
        Ok(())
    }

    fn lock_stores(&self) -> std::sync::MutexGuard<'_, Stores> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn BreakpointListener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Invokes `callback` on a snapshot of the listener list. No store lock
    /// is held here, so listeners may call back into the manager.
    fn notify(&self, callback: impl Fn(&dyn BreakpointListener)) {
        let listeners: Vec<Arc<dyn BreakpointListener>> = self.lock_listeners().clone();
        for listener in listeners {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(listener.as_ref())));
            if result.is_err() {
                error!("breakpoint listener panicked; continuing with remaining listeners");
            }
        }
    }
}
