//! A debug session against one target process.
//!
//! The session owns the agent connection, the breakpoint store and the
//! process mirror, and is the single place where agent messages are turned
//! into state changes. User-facing components talk to the session; they
//! never interpret wire messages themselves.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use anyhow::Result;
use log::{debug, info, warn};

use crate::connection::{
    DebugConnection, DebugReply, ModuleDescription, ReplyEnvelope, ReplyListener, Transport,
};
use crate::debugger::address::{BreakpointAddress, RelocatedAddress};
use crate::debugger::breakpoint::{BreakpointStatus, BreakpointType};
use crate::debugger::echo::EchoHitBudget;
use crate::debugger::manager::BreakpointManager;
use crate::debugger::module::{MemoryModule, ModuleId};
use crate::debugger::process::{ProcessMirror, Thread, ThreadId, ThreadState};
use crate::expr::condition::ConditionTree;

/// How often an echo breakpoint may be hit before it is retired.
const ECHO_HIT_BUDGET: u32 = 3;

struct SessionState {
    connection: DebugConnection,
    manager: BreakpointManager,
    process: Mutex<ProcessMirror>,
    echo_budget: Mutex<EchoHitBudget>,
    next_module_id: Mutex<u32>,
}

/// Forwards agent messages into the owning session without keeping it
/// alive; a dropped session stops receiving.
struct ReplyAdapter {
    state: Weak<SessionState>,
}

impl ReplyListener for ReplyAdapter {
    fn reply_received(&self, envelope: &ReplyEnvelope) {
        if let Some(state) = self.state.upgrade() {
            state.apply(envelope);
        }
    }
}

/// Facade over one debugging session.
pub struct DebugSession {
    state: Arc<SessionState>,
}

impl DebugSession {
    /// Builds a session on an established transport and starts listening
    /// for agent messages.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let state = Arc::new(SessionState {
            connection: DebugConnection::new(transport),
            manager: BreakpointManager::new(),
            process: Mutex::new(ProcessMirror::new()),
            echo_budget: Mutex::new(EchoHitBudget::new(ECHO_HIT_BUDGET)),
            next_module_id: Mutex::new(0),
        });
        state.connection.add_listener(Arc::new(ReplyAdapter {
            state: Arc::downgrade(&state),
        }));
        Self { state }
    }

    pub fn connection(&self) -> &DebugConnection {
        &self.state.connection
    }

    pub fn breakpoints(&self) -> &BreakpointManager {
        &self.state.manager
    }

    /// Runs `reader` against the current process mirror.
    pub fn with_process<T>(&self, reader: impl FnOnce(&ProcessMirror) -> T) -> T {
        reader(&lock(&self.state.process))
    }

    /// Registers a module known from static analysis. The module stays
    /// unmapped until the agent reports it loaded.
    pub fn register_module(&self, module: MemoryModule) {
        let mut process = lock(&self.state.process);
        let mut next_id = lock(&self.state.next_module_id);
        *next_id = (*next_id).max(module.id().value() + 1);
        process.add_module(module);
    }

    /// Adds breakpoints to the store and arms the ones whose module is
    /// currently mapped. Breakpoints in unmapped modules wait for the
    /// module load event.
    pub fn set_breakpoints(
        &self,
        kind: BreakpointType,
        addresses: &[BreakpointAddress],
    ) -> Result<()> {
        let added = self.state.manager.add_breakpoints(kind, addresses);
        let armable = self.state.relocate_all(&added);
        if !armable.is_empty() {
            self.state.connection.send_set_breakpoints(kind, armable)?;
        }
        Ok(())
    }

    /// Starts removal of breakpoints. Armed breakpoints enter the deleting
    /// state until the agent confirms; the rest disappear immediately.
    pub fn remove_breakpoints(
        &self,
        kind: BreakpointType,
        addresses: &[BreakpointAddress],
    ) -> Result<()> {
        let pending = self.state.manager.remove_breakpoints(kind, addresses)?;
        let relocated = self.state.relocate_all(&pending);
        if !relocated.is_empty() {
            self.state
                .connection
                .send_remove_breakpoints(kind, relocated)?;
        }
        Ok(())
    }

    /// Attaches a condition to a regular breakpoint and pushes its
    /// flattened form to the agent if the breakpoint is armable.
    pub fn set_breakpoint_condition(
        &self,
        address: BreakpointAddress,
        condition: Option<ConditionTree>,
    ) -> Result<()> {
        let flattened = condition
            .as_ref()
            .map(ConditionTree::flatten)
            .unwrap_or_default();
        self.state.manager.set_condition(address, condition)?;
        if let Some(relocated) = self.state.relocate(address) {
            self.state
                .connection
                .send_set_breakpoint_condition(relocated, flattened)?;
        }
        Ok(())
    }

    /// Ends the session. Echo and step breakpoints are discarded, regular
    /// breakpoints fall back to inactive so a later session can rearm
    /// them, and the connection stops.
    pub fn close(&self) {
        info!("closing debug session");
        if !self.state.connection.is_shut_down() {
            if let Err(error) = self.state.connection.send_detach() {
                debug!("detach request failed during close: {}", error);
            }
        }
        self.state.target_went_away();
        self.state.connection.shutdown();
    }
}

impl Drop for DebugSession {
    fn drop(&mut self) {
        self.state.connection.shutdown();
    }
}

impl SessionState {
    fn apply(&self, envelope: &ReplyEnvelope) {
        match &envelope.reply {
            DebugReply::BreakpointsSet { kind, results } => {
                let mut armed = Vec::new();
                let mut rejected = Vec::new();
                for result in results {
                    let Some(address) = self.unrelocate(result.address) else {
                        warn!("set reply for address outside any module: {}", result.address);
                        continue;
                    };
                    if result.is_success() {
                        armed.push(address);
                    } else {
                        warn!(
                            "agent rejected {} breakpoint at {} (code {})",
                            kind, address, result.error_code
                        );
                        rejected.push(address);
                    }
                }
                self.mark_status(*kind, &armed, BreakpointStatus::Active);
                self.mark_status(*kind, &rejected, BreakpointStatus::Invalid);
            }
            DebugReply::BreakpointsRemoved { kind, results } => {
                let confirmed: Vec<BreakpointAddress> = results
                    .iter()
                    .filter(|result| result.is_success())
                    .filter_map(|result| self.unrelocate(result.address))
                    .collect();
                self.manager.confirm_removed(*kind, &confirmed);
            }
            DebugReply::ConditionSet { error_code } => {
                if *error_code != 0 {
                    warn!("agent rejected breakpoint condition (code {})", error_code);
                }
            }
            DebugReply::BreakpointHit {
                kind,
                address,
                thread,
                registers,
            } => self.handle_hit(*kind, *address, *thread, registers.clone()),
            DebugReply::TargetHalted { thread } => {
                let mut process = lock(&self.process);
                self.ensure_thread(&mut process, *thread);
                for id in process.threads().map(Thread::id).collect::<Vec<_>>() {
                    process.set_thread_state(id, ThreadState::Suspended);
                }
                process.set_active_thread(Some(*thread));
            }
            DebugReply::TargetResumed => {
                let mut process = lock(&self.process);
                for id in process.threads().map(Thread::id).collect::<Vec<_>>() {
                    process.set_thread_state(id, ThreadState::Running);
                }
                drop(process);
                self.reset_hit_breakpoints();
            }
            DebugReply::SingleStepped { thread, registers } => {
                let mut process = lock(&self.process);
                self.ensure_thread(&mut process, *thread);
                process.set_thread_state(*thread, ThreadState::Suspended);
                process.set_thread_registers(*thread, registers.clone());
            }
            DebugReply::ThreadResumed { thread } => {
                lock(&self.process).set_thread_state(*thread, ThreadState::Running);
            }
            DebugReply::ThreadSuspended { thread } => {
                lock(&self.process).set_thread_state(*thread, ThreadState::Suspended);
            }
            DebugReply::Registers { threads } => {
                let mut process = lock(&self.process);
                for (thread, registers) in threads {
                    self.ensure_thread(&mut process, *thread);
                    process.set_thread_registers(*thread, registers.clone());
                }
            }
            DebugReply::RegisterSet { thread } => {
                debug!("register written on {}", thread);
            }
            DebugReply::ThreadCreated { thread } => {
                lock(&self.process).add_thread(Thread::new(*thread, ThreadState::Running));
            }
            DebugReply::ThreadClosed { thread } => {
                lock(&self.process).remove_thread(*thread);
            }
            DebugReply::ModuleLoaded { module } => self.handle_module_loaded(module),
            DebugReply::ModuleUnloaded { load_base } => self.handle_module_unloaded(*load_base),
            DebugReply::ExceptionRaised {
                thread,
                code,
                address,
            } => {
                info!("exception {:#x} at {} on {}", code, address, thread);
                let mut process = lock(&self.process);
                self.ensure_thread(&mut process, *thread);
                process.set_thread_state(*thread, ThreadState::Suspended);
                process.set_active_thread(Some(*thread));
            }
            DebugReply::ProcessClosed | DebugReply::Terminated | DebugReply::Detached => {
                info!("target went away: {:?}", envelope.reply);
                self.target_went_away();
            }
            DebugReply::RequestFailed { error_code } => {
                warn!(
                    "agent could not carry out {:?} (code {})",
                    envelope.packet_id, error_code
                );
            }
            // State-neutral answers; consumers observe them through their
            // own connection listeners
            DebugReply::MemoryRead { .. }
            | DebugReply::MemoryWritten { .. }
            | DebugReply::SearchResult { .. }
            | DebugReply::MemoryMap { .. }
            | DebugReply::MemoryRange { .. }
            | DebugReply::FileSystem { .. }
            | DebugReply::ProcessList { .. }
            | DebugReply::TargetSelected
            | DebugReply::SelectionCancelled
            | DebugReply::ExceptionSettingsSet
            | DebugReply::EventSettingsSet => {
                debug!("pass-through reply: {:?}", envelope.reply);
            }
        }
    }

    fn handle_hit(
        &self,
        kind: BreakpointType,
        relocated: RelocatedAddress,
        thread: ThreadId,
        registers: std::collections::HashMap<String, u64>,
    ) {
        {
            let mut process = lock(&self.process);
            self.ensure_thread(&mut process, thread);
            process.set_thread_state(thread, ThreadState::Suspended);
            process.set_thread_registers(thread, registers);
            process.set_active_thread(Some(thread));
        }

        let Some(address) = self.unrelocate(relocated) else {
            warn!("{} breakpoint hit outside any known module: {}", kind, relocated);
            return;
        };

        match kind {
            BreakpointType::Regular => {
                self.mark_status(kind, &[address], BreakpointStatus::Hit);
            }
            BreakpointType::Echo => {
                let exhausted = lock(&self.echo_budget).register_hit(address);
                if exhausted {
                    debug!("echo breakpoint at {} exhausted its hit budget", address);
                    self.manager.confirm_removed(kind, &[address]);
                    if let Err(error) = self
                        .connection
                        .send_remove_breakpoints(kind, vec![relocated])
                    {
                        warn!("failed to retire echo breakpoint: {}", error);
                    }
                } else {
                    self.mark_status(kind, &[address], BreakpointStatus::Hit);
                }
            }
            // Step breakpoints are single-use
            BreakpointType::Step => {
                self.manager.confirm_removed(kind, &[address]);
                if let Err(error) = self
                    .connection
                    .send_remove_breakpoints(kind, vec![relocated])
                {
                    warn!("failed to remove step breakpoint: {}", error);
                }
            }
        }
    }

    fn handle_module_loaded(&self, description: &ModuleDescription) {
        let mut process = lock(&self.process);
        let known = process
            .modules()
            .find(|module| module.name() == description.name)
            .map(MemoryModule::id);

        let id = match known {
            Some(id) => id,
            None => {
                let mut next = lock(&self.next_module_id);
                let id = ModuleId::new(*next);
                *next += 1;
                // Nothing known statically; the image claims to live where
                // it was mapped
                process.add_module(MemoryModule::new(
                    id,
                    description.name.clone(),
                    description.load_base.value(),
                    description.size,
                ));
                id
            }
        };

        let mut pending = Vec::new();
        if let Some(module) = process.module(id) {
            let mut updated = module.clone();
            updated.set_load_base(description.load_base.value());
            for breakpoint in self.manager.breakpoints(BreakpointType::Regular) {
                if breakpoint.address().module() == id
                    && breakpoint.status() == BreakpointStatus::Inactive
                {
                    if let Some(relocated) = updated.relocate(breakpoint.address().address()) {
                        pending.push(relocated);
                    }
                }
            }
            process.add_module(updated);
        }
        drop(process);

        // Arm the breakpoints that were waiting for this module
        if !pending.is_empty() {
            info!(
                "module {} loaded, arming {} pending breakpoints",
                description.name,
                pending.len()
            );
            if let Err(error) = self
                .connection
                .send_set_breakpoints(BreakpointType::Regular, pending)
            {
                warn!("failed to arm pending breakpoints: {}", error);
            }
        }
    }

    fn handle_module_unloaded(&self, load_base: RelocatedAddress) {
        let mut process = lock(&self.process);
        let unloaded = process
            .modules()
            .find(|module| module.load_base() == Some(load_base.value()))
            .map(MemoryModule::id);

        let Some(id) = unloaded else {
            warn!("unload event for unknown base {}", load_base);
            return;
        };

        if let Some(module) = process.module(id) {
            let mut updated = module.clone();
            updated.clear_load_base();
            process.add_module(updated);
        }
        drop(process);

        // Breakpoints in the module cannot stay armed. Disabled ones keep
        // their flag so a reload does not silently re-enable them.
        let in_module = |kind| -> Vec<BreakpointAddress> {
            self.manager
                .breakpoints(kind)
                .into_iter()
                .map(|breakpoint| breakpoint.address())
                .filter(|address| address.module() == id)
                .collect()
        };
        let armed_regulars: Vec<BreakpointAddress> = self
            .manager
            .breakpoints(BreakpointType::Regular)
            .into_iter()
            .filter(|breakpoint| breakpoint.address().module() == id)
            .filter(|breakpoint| breakpoint.status() != BreakpointStatus::Disabled)
            .map(|breakpoint| breakpoint.address())
            .collect();
        self.mark_status(
            BreakpointType::Regular,
            &armed_regulars,
            BreakpointStatus::Inactive,
        );
        self.manager
            .confirm_removed(BreakpointType::Echo, &in_module(BreakpointType::Echo));
        self.manager
            .confirm_removed(BreakpointType::Step, &in_module(BreakpointType::Step));
    }

    /// The target is gone. Transient breakpoints are discarded, regular
    /// ones fall back to inactive (disabled ones stay disabled), and the
    /// mirror empties.
    fn target_went_away(&self) {
        for kind in [BreakpointType::Echo, BreakpointType::Step] {
            if let Err(error) = self.manager.clear_passive(kind) {
                warn!("failed to clear {} breakpoints: {}", kind, error);
            }
        }

        let mut deleting = Vec::new();
        let mut surviving = Vec::new();
        for breakpoint in self.manager.breakpoints(BreakpointType::Regular) {
            match breakpoint.status() {
                BreakpointStatus::Deleting => deleting.push(breakpoint.address()),
                // Disabled breakpoints keep their flag across sessions
                BreakpointStatus::Disabled => {}
                _ => surviving.push(breakpoint.address()),
            }
        }
        self.manager
            .confirm_removed(BreakpointType::Regular, &deleting);
        self.mark_status(
            BreakpointType::Regular,
            &surviving,
            BreakpointStatus::Inactive,
        );

        lock(&self.process).clear();
    }

    /// Regular breakpoints left in the hit state go back to active when
    /// the target resumes.
    fn reset_hit_breakpoints(&self) {
        for kind in [BreakpointType::Regular, BreakpointType::Echo] {
            let hit: Vec<BreakpointAddress> = self
                .manager
                .breakpoints(kind)
                .into_iter()
                .filter(|breakpoint| breakpoint.status() == BreakpointStatus::Hit)
                .map(|breakpoint| breakpoint.address())
                .collect();
            self.mark_status(kind, &hit, BreakpointStatus::Active);
        }
    }

    fn mark_status(
        &self,
        kind: BreakpointType,
        addresses: &[BreakpointAddress],
        status: BreakpointStatus,
    ) {
        if addresses.is_empty() {
            return;
        }
        // The user may have removed a breakpoint while its reply was in
        // flight; a missing address only downgrades to a log line.
        if let Err(error) = self.manager.set_breakpoint_status(kind, addresses, status) {
            debug!("stale status change ignored: {}", error);
        }
    }

    fn ensure_thread(&self, process: &mut ProcessMirror, thread: ThreadId) {
        if process.thread(thread).is_none() {
            process.add_thread(Thread::new(thread, ThreadState::Running));
        }
    }

    fn relocate(&self, address: BreakpointAddress) -> Option<RelocatedAddress> {
        lock(&self.process)
            .module(address.module())
            .and_then(|module| module.relocate(address.address()))
    }

    fn relocate_all(&self, addresses: &[BreakpointAddress]) -> Vec<RelocatedAddress> {
        addresses
            .iter()
            .filter_map(|&address| self.relocate(address))
            .collect()
    }

    fn unrelocate(&self, address: RelocatedAddress) -> Option<BreakpointAddress> {
        let process = lock(&self.process);
        let module = process.modules().find(|module| module.contains(address))?;
        let unrelocated = module.unrelocate(address)?;
        Some(BreakpointAddress::new(module.id(), unrelocated))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
