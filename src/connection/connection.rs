//! Asynchronous connection to the debug agent.
//!
//! Callers send typed requests from any thread and get back the packet id
//! the eventual answer will carry. A dedicated receive thread pumps
//! messages off the transport and fans them out to registered listeners,
//! so a slow agent never blocks the caller.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::{fmt, io};

use log::{debug, error, info};

use crate::connection::packet::{PacketId, PacketIdGenerator};
use crate::connection::reply::ReplyEnvelope;
use crate::connection::request::{
    DebugRequest, DebuggerEventSettings, ExceptionSetting, RequestEnvelope,
};
use crate::debugger::address::RelocatedAddress;
use crate::debugger::breakpoint::BreakpointType;
use crate::debugger::process::ThreadId;
use crate::errors::ConnectionError;
use crate::expr::condition::ConditionInstruction;

/// Wire channel to the debug agent.
///
/// `send` may be called from any thread; `receive` is only ever called from
/// the connection's receive thread and blocks until a message arrives.
/// `receive` returning `Ok(None)` means the agent closed the channel.
pub trait Transport: Send + Sync {
    fn send(&self, envelope: &RequestEnvelope) -> io::Result<()>;

    fn receive(&self) -> io::Result<Option<ReplyEnvelope>>;

    /// Asks the transport to unblock a pending `receive`. Called once
    /// during shutdown.
    fn close(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Observer of messages arriving from the agent.
///
/// Called on the receive thread; implementations hand heavy work off
/// instead of stalling the pump. A panicking listener is logged and
/// skipped.
pub trait ReplyListener: Send + Sync {
    fn reply_received(&self, envelope: &ReplyEnvelope);
}

/// Connection to a debug agent with correlation-based request tracking.
pub struct DebugConnection {
    transport: Arc<dyn Transport>,
    packet_ids: PacketIdGenerator,
    listeners: Arc<Mutex<Vec<Arc<dyn ReplyListener>>>>,
    shut_down: Arc<AtomicBool>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for DebugConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugConnection")
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl DebugConnection {
    /// Wraps an established transport and starts the receive thread.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let listeners: Arc<Mutex<Vec<Arc<dyn ReplyListener>>>> = Arc::new(Mutex::new(Vec::new()));
        let shut_down = Arc::new(AtomicBool::new(false));

        let pump = {
            let transport = transport.clone();
            let listeners = listeners.clone();
            let shut_down = shut_down.clone();
            thread::spawn(move || receive_loop(transport, listeners, shut_down))
        };

        Self {
            transport,
            packet_ids: PacketIdGenerator::new(),
            listeners,
            shut_down,
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Runs `establish` to bring up the transport and wraps the result.
    /// An establishment failure comes back as [`ConnectionError::Connect`];
    /// no receive thread is started in that case.
    pub fn connect<T, F>(establish: F) -> Result<Self, ConnectionError>
    where
        T: Transport + 'static,
        F: FnOnce() -> io::Result<T>,
    {
        let transport = establish().map_err(ConnectionError::Connect)?;
        Ok(Self::new(Arc::new(transport)))
    }

    pub fn add_listener(&self, listener: Arc<dyn ReplyListener>) {
        lock(&self.listeners).push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ReplyListener>) {
        lock(&self.listeners).retain(|known| !Arc::ptr_eq(known, listener));
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stops the connection. Safe to call more than once; every call after
    /// the first is a no-op. Messages still in flight when the flag is set
    /// are dropped by the receive thread.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("shutting down connection to the debug agent");
        if let Err(error) = self.transport.close() {
            debug!("transport close failed during shutdown: {}", error);
        }
        if let Some(handle) = lock(&self.pump).take() {
            // A listener may call shutdown from the receive thread itself;
            // joining would then deadlock, and the loop exits on its own
            // once the transport reports closed.
            if handle.thread().id() == thread::current().id() {
                debug!("shutdown requested from the receive thread, skipping join");
            } else if handle.join().is_err() {
                error!("receive thread panicked during shutdown");
            }
        }
    }

    pub fn send_set_breakpoints(
        &self,
        kind: BreakpointType,
        addresses: Vec<RelocatedAddress>,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SetBreakpoints { kind, addresses })
    }

    pub fn send_remove_breakpoints(
        &self,
        kind: BreakpointType,
        addresses: Vec<RelocatedAddress>,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::RemoveBreakpoints { kind, addresses })
    }

    /// Sends a flattened breakpoint condition. An empty instruction list
    /// clears the condition on the agent side.
    pub fn send_set_breakpoint_condition(
        &self,
        address: RelocatedAddress,
        condition: Vec<ConditionInstruction>,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SetBreakpointCondition { address, condition })
    }

    pub fn send_halt(&self) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::Halt)
    }

    pub fn send_resume(&self) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::Resume)
    }

    pub fn send_single_step(&self, thread: ThreadId) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SingleStep { thread })
    }

    pub fn send_resume_thread(&self, thread: ThreadId) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::ResumeThread { thread })
    }

    pub fn send_suspend_thread(&self, thread: ThreadId) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SuspendThread { thread })
    }

    pub fn send_read_memory(
        &self,
        address: RelocatedAddress,
        length: u64,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::ReadMemory { address, length })
    }

    pub fn send_write_memory(
        &self,
        address: RelocatedAddress,
        bytes: Vec<u8>,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::WriteMemory { address, bytes })
    }

    pub fn send_read_registers(&self) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::ReadRegisters)
    }

    pub fn send_set_register(
        &self,
        thread: ThreadId,
        register: impl Into<String>,
        value: u64,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SetRegister {
            thread,
            register: register.into(),
            value,
        })
    }

    pub fn send_search_memory(
        &self,
        start: RelocatedAddress,
        length: u64,
        pattern: Vec<u8>,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SearchMemory {
            start,
            length,
            pattern,
        })
    }

    /// Asks for the memory map. Answered by an uncorrelated event.
    pub fn send_request_memory_map(&self) -> Result<(), ConnectionError> {
        self.send_uncorrelated(DebugRequest::MemoryMap)
    }

    pub fn send_request_memory_range(
        &self,
        address: RelocatedAddress,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::MemoryRange { address })
    }

    /// Asks for a directory listing. Answered by an uncorrelated event.
    pub fn send_request_file_system(
        &self,
        path: Option<String>,
    ) -> Result<(), ConnectionError> {
        self.send_uncorrelated(DebugRequest::ListFileSystem { path })
    }

    pub fn send_request_process_list(&self) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::ListProcesses)
    }

    /// Selects the executable to debug. Answered by an uncorrelated event.
    pub fn send_select_file(&self, path: impl Into<String>) -> Result<(), ConnectionError> {
        self.send_uncorrelated(DebugRequest::SelectFile { path: path.into() })
    }

    pub fn send_select_process(&self, process_id: u64) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SelectProcess { process_id })
    }

    pub fn send_cancel_target_selection(&self) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::CancelTargetSelection)
    }

    pub fn send_exception_settings(
        &self,
        settings: Vec<ExceptionSetting>,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SetExceptionSettings { settings })
    }

    pub fn send_debugger_event_settings(
        &self,
        settings: DebuggerEventSettings,
    ) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::SetDebuggerEventSettings { settings })
    }

    pub fn send_detach(&self) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::Detach)
    }

    pub fn send_terminate(&self) -> Result<PacketId, ConnectionError> {
        self.send_correlated(DebugRequest::Terminate)
    }

    fn send_correlated(&self, request: DebugRequest) -> Result<PacketId, ConnectionError> {
        debug_assert!(request.expects_reply());
        let packet_id = self.packet_ids.next();
        self.send_envelope(RequestEnvelope {
            packet_id: Some(packet_id),
            request,
        })?;
        Ok(packet_id)
    }

    fn send_uncorrelated(&self, request: DebugRequest) -> Result<(), ConnectionError> {
        debug_assert!(!request.expects_reply());
        self.send_envelope(RequestEnvelope {
            packet_id: None,
            request,
        })
    }

    fn send_envelope(&self, envelope: RequestEnvelope) -> Result<(), ConnectionError> {
        if self.is_shut_down() {
            return Err(ConnectionError::Closed);
        }
        debug!("sending {:?}", envelope.request);
        self.transport.send(&envelope).map_err(ConnectionError::Send)
    }
}

impl Drop for DebugConnection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn receive_loop(
    transport: Arc<dyn Transport>,
    listeners: Arc<Mutex<Vec<Arc<dyn ReplyListener>>>>,
    shut_down: Arc<AtomicBool>,
) {
    loop {
        match transport.receive() {
            Ok(Some(envelope)) => {
                if shut_down.load(Ordering::SeqCst) {
                    debug!("dropping message received after shutdown");
                    continue;
                }
                dispatch(&listeners, &envelope);
            }
            Ok(None) => {
                info!("debug agent closed the connection");
                break;
            }
            Err(error) => {
                if !shut_down.load(Ordering::SeqCst) {
                    error!("receive failed: {}", error);
                }
                break;
            }
        }
    }
}

/// Fans one message out to a snapshot of the listener list, so listeners
/// may register or deregister others from inside the callback.
fn dispatch(listeners: &Mutex<Vec<Arc<dyn ReplyListener>>>, envelope: &ReplyEnvelope) {
    let snapshot: Vec<Arc<dyn ReplyListener>> = lock(listeners).clone();
    for listener in snapshot {
        let result = panic::catch_unwind(AssertUnwindSafe(|| listener.reply_received(envelope)));
        if result.is_err() {
            error!("reply listener panicked; continuing with remaining listeners");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
