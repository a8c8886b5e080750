//! Host-side block dispatch.
//!
//! [`Dispatcher`] is the [`TransportCallback`] that runs the effect chain.
//! Each block it:
//!
//! 1. drains the parameter events posted since the previous block,
//! 2. for every active module, in chain order: applies the events addressed
//!    to it, refreshes its parameters and renders the block (bypassed
//!    modules only take their events),
//! 3. fills the channels the module did not produce with its last one,
//! 4. hands the result of the last module to the transport.
//!
//! Modules are chained through two pre-allocated buffers swapped after each
//! module, so nothing is allocated on the audio thread. An empty chain
//! copies its input.
//!
//! [`HostStatus`] is the only thing the audio thread shares with the control
//! thread besides the event queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use fxrig_core::{
    BufferSet, BufferSetMut, EventReceiver, ModuleState, ParamEvent, ProcInfo, Processable,
};

use crate::transport::{TransportCallback, aligned_len};

/// Events drained per block when no capacity is given.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Counters and flags written by the audio thread.
#[derive(Debug, Default)]
pub struct HostStatus {
    exit_requested: AtomicBool,
    dropouts: AtomicU64,
    blocks: AtomicU64,
    rejected_events: AtomicU64,
}

impl HostStatus {
    /// All counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags the device for re-initialisation.
    pub fn request_exit(&self) {
        self.exit_requested.store(true, Ordering::Release);
    }

    /// Returns true if re-initialisation was requested.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested.load(Ordering::Acquire)
    }

    /// Returns and clears the re-initialisation request.
    pub fn take_exit_request(&self) -> bool {
        self.exit_requested.swap(false, Ordering::AcqRel)
    }

    /// Blocks lost by the device.
    pub fn dropouts(&self) -> u64 {
        self.dropouts.load(Ordering::Relaxed)
    }

    /// Blocks processed.
    pub fn blocks(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Events naming a slot outside the chain or a parameter the module
    /// does not have.
    pub fn rejected_events(&self) -> u64 {
        self.rejected_events.load(Ordering::Relaxed)
    }

    fn add_dropout(&self) {
        self.dropouts.fetch_add(1, Ordering::Relaxed);
    }
}

/// Runs a chain of modules block by block.
pub struct Dispatcher {
    modules: Vec<Box<dyn Processable>>,
    active: Vec<bool>,
    bypassed: Vec<bool>,
    events: EventReceiver,
    pending: Vec<ParamEvent>,
    scratch: Vec<ParamEvent>,
    event_capacity: usize,
    ping: Vec<f32>,
    pong: Vec<f32>,
    nbr_chn: usize,
    stride: usize,
    max_block: usize,
    latency: usize,
    status: Arc<HostStatus>,
}

impl Dispatcher {
    /// Empty chain working on `nbr_chn` channels, fed by `events`.
    pub fn new(nbr_chn: usize, events: EventReceiver, status: Arc<HostStatus>) -> Self {
        Self {
            modules: Vec::new(),
            active: Vec::new(),
            bypassed: Vec::new(),
            events,
            pending: Vec::new(),
            scratch: Vec::new(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            ping: Vec::new(),
            pong: Vec::new(),
            nbr_chn,
            stride: 0,
            max_block: 0,
            latency: 0,
            status,
        }
    }

    /// Sets how many events are drained per block. Extra events wait for
    /// the next block.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Appends a module to the chain. Its slot is the chain length before
    /// the call.
    pub fn push(&mut self, module: Box<dyn Processable>) -> usize {
        self.modules.push(module);
        self.active.push(false);
        self.bypassed.push(false);
        self.modules.len() - 1
    }

    /// Appends a module that keeps its slot and receives its events but
    /// does not process audio.
    pub fn push_bypassed(&mut self, module: Box<dyn Processable>) -> usize {
        let slot = self.push(module);
        self.bypassed[slot] = true;
        slot
    }

    /// Number of modules in the chain.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Module at `slot`.
    pub fn module(&self, slot: usize) -> Option<&dyn Processable> {
        self.modules.get(slot).map(|m| m.as_ref())
    }

    /// Returns true if the module at `slot` is processed.
    pub fn is_active(&self, slot: usize) -> bool {
        self.active.get(slot).copied().unwrap_or(false)
    }

    /// Returns true if the module at `slot` is bypassed.
    pub fn is_bypassed(&self, slot: usize) -> bool {
        self.bypassed.get(slot).copied().unwrap_or(false)
    }

    /// Summed latency of the active modules, in samples.
    pub fn latency(&self) -> usize {
        self.latency
    }

    /// Shared status.
    pub fn status(&self) -> &Arc<HostStatus> {
        &self.status
    }

    /// Clears the audio state of every module.
    pub fn clean_quick(&mut self) {
        for module in &mut self.modules {
            module.clean_quick();
        }
    }
}

/// Copies `src` into `dst`, repeating the last source channel; silence if
/// `src` has none.
fn load_channels(dst: &mut BufferSetMut<'_>, src: &BufferSet<'_>) {
    let nbr_src = src.nbr_chn();
    for chn in 0..dst.nbr_chn() {
        let d = dst.channel_mut(chn);
        if nbr_src == 0 {
            d.fill(0.0);
        } else {
            let s = src.channel(chn.min(nbr_src - 1));
            let len = d.len().min(s.len());
            d[..len].copy_from_slice(&s[..len]);
            d[len..].fill(0.0);
        }
    }
}

/// Fills the channels after `produced` with the last produced one.
fn replicate_last(buf: &mut BufferSetMut<'_>, produced: usize) {
    if produced == 0 {
        buf.clear();
        return;
    }
    for chn in produced..buf.nbr_chn() {
        buf.copy_channel(produced - 1, chn);
    }
}

impl TransportCallback for Dispatcher {
    fn process_block(&mut self, outputs: &mut BufferSetMut<'_>, inputs: &BufferSet<'_>, nbr_spl: usize) {
        let n = nbr_spl.min(self.max_block);
        let stride = self.stride;

        self.pending.clear();
        self.events.drain_into(&mut self.pending);
        let nbr_slots = self.modules.len();
        let misrouted = self.pending.iter().filter(|e| e.slot >= nbr_slots).count();
        if misrouted > 0 {
            self.status
                .rejected_events
                .fetch_add(misrouted as u64, Ordering::Relaxed);
        }

        load_channels(&mut BufferSetMut::new(&mut self.ping, stride, n), inputs);

        for (slot, module) in self.modules.iter_mut().enumerate() {
            if !self.active[slot] || module.state() != ModuleState::Active {
                continue;
            }

            self.scratch.clear();
            self.scratch
                .extend(self.pending.iter().filter(|e| e.slot == slot).copied());
            let params = module.param_set_mut();
            for ev in &self.scratch {
                if params.set_target(ev.key, ev.value).is_err() {
                    self.status.rejected_events.fetch_add(1, Ordering::Relaxed);
                }
            }
            if self.bypassed[slot] {
                continue;
            }
            module.update_params(n);

            let mut info = ProcInfo {
                inputs: BufferSet::new(&self.ping, stride, n),
                outputs: BufferSetMut::new(&mut self.pong, stride, n),
                nbr_spl: n,
                events: &self.scratch,
            };
            let produced = module.process_block(&mut info).min(info.outputs.nbr_chn());
            replicate_last(&mut info.outputs, produced);

            std::mem::swap(&mut self.ping, &mut self.pong);
        }

        load_channels(outputs, &BufferSet::new(&self.ping, stride, n));
        self.status.blocks.fetch_add(1, Ordering::Relaxed);
    }

    fn request_exit(&mut self) {
        self.status.request_exit();
    }

    fn notify_dropout(&mut self) {
        self.status.add_dropout();
    }

    fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        self.stride = aligned_len(max_block_size);
        self.max_block = max_block_size;
        self.ping = vec![0.0; self.nbr_chn * self.stride];
        self.pong = vec![0.0; self.nbr_chn * self.stride];
        self.pending = Vec::with_capacity(self.event_capacity);
        self.scratch = Vec::with_capacity(self.event_capacity);

        self.latency = 0;
        for (slot, module) in self.modules.iter_mut().enumerate() {
            match module.reset(sample_rate, max_block_size) {
                Ok(latency) => {
                    self.active[slot] = true;
                    if !self.bypassed[slot] {
                        self.latency += latency;
                    }
                }
                Err(err) => {
                    self.active[slot] = false;
                    tracing::warn!(slot, error = %err, "module deactivated");
                }
            }
        }
        tracing::info!(
            sample_rate,
            max_block_size,
            modules = self.modules.len(),
            active = self.active.iter().filter(|&&a| a).count(),
            latency = self.latency,
            "chain prepared"
        );
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("modules", &self.modules.len())
            .field("active", &self.active)
            .field("nbr_chn", &self.nbr_chn)
            .field("max_block", &self.max_block)
            .finish_non_exhaustive()
    }
}
