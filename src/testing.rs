//! Test doubles for the radio, tuner, timer and sink collaborators.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use crate::capture::{FrameCategory, FrameHandler, IdentifierSink, SourceTag};
use crate::radio::{
    Bandwidth, BufferConfig, ChannelTuner, FrameCallback, FrameFilter, Radio, RadioError, RadioOp,
};
use crate::region::Region;
use crate::timer::{TimerCallback, TimerService};

/// Minimal management frame header with `addr2` as transmitter.
pub fn mgmt_frame(addr2: [u8; 6]) -> Vec<u8> {
    let mut frame = std::vec![0u8; 24];
    frame[0] = 0x40; // probe request
    frame[4..10].copy_from_slice(&[0xFF; 6]);
    frame[10..16].copy_from_slice(&addr2);
    frame[16..22].copy_from_slice(&[0xFF; 6]);
    frame
}

/// Give a test value the `'static` lifetime the lifecycle controller needs.
pub fn leak<T: 'static>(value: T) -> &'static T {
    Box::leak(Box::new(value))
}

#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    observed: Arc<Mutex<Vec<([u8; 6], SourceTag)>>>,
}

impl RecordingSink {
    pub fn observed(&self) -> Vec<([u8; 6], SourceTag)> {
        self.observed.lock().unwrap().clone()
    }
}

impl IdentifierSink for RecordingSink {
    fn on_identifier_observed(&self, address: [u8; 6], source: SourceTag) {
        self.observed.lock().unwrap().push((address, source));
    }
}

#[derive(Debug, Default, Clone)]
pub struct MockTuner {
    tuned: Arc<Mutex<Vec<(u8, Bandwidth)>>>,
    fail_code: Arc<AtomicI32>,
}

impl MockTuner {
    pub fn tuned(&self) -> Vec<(u8, Bandwidth)> {
        self.tuned.lock().unwrap().clone()
    }

    pub fn fail_with(&self, code: i32) {
        self.fail_code.store(code, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.fail_code.store(0, Ordering::SeqCst);
    }
}

impl ChannelTuner for MockTuner {
    fn set_channel(&self, channel: u8, bandwidth: Bandwidth) -> Result<(), RadioError> {
        match self.fail_code.load(Ordering::SeqCst) {
            0 => {
                self.tuned.lock().unwrap().push((channel, bandwidth));
                Ok(())
            }
            code => Err(RadioError::new(RadioOp::SetChannel, code)),
        }
    }
}

/// Driver calls recorded by [`MockRadio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init(BufferConfig),
    SetCountry(&'static str),
    SetFilter(FrameFilter),
    Register(FrameCallback),
    Promiscuous(bool),
    Deinit,
}

#[derive(Default)]
struct RadioState {
    calls: Mutex<Vec<Call>>,
    callback: Mutex<Option<FrameCallback>>,
    fail_on: Mutex<Option<RadioOp>>,
    channel_count: AtomicU32,
    discarded: AtomicU32,
    up: AtomicBool,
}

/// Radio double. Clones share state so a test can keep a handle after the
/// radio is moved into the controller.
#[derive(Clone)]
pub struct MockRadio {
    state: Arc<RadioState>,
    capture: &'static dyn FrameHandler,
}

impl MockRadio {
    pub fn new(capture: &'static dyn FrameHandler) -> Self {
        Self {
            state: Arc::new(RadioState::default()),
            capture,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.state.calls.lock().unwrap().clear();
    }

    pub fn fail_on(&self, op: RadioOp) {
        *self.state.fail_on.lock().unwrap() = Some(op);
    }

    pub fn recover(&self) {
        *self.state.fail_on.lock().unwrap() = None;
    }

    /// Channel count reported by the driver; 0 keeps the table value.
    pub fn report_channel_count(&self, count: u8) {
        self.state.channel_count.store(count as u32, Ordering::SeqCst);
    }

    pub fn is_up(&self) -> bool {
        self.state.up.load(Ordering::SeqCst)
    }

    pub fn callback(&self) -> Option<FrameCallback> {
        *self.state.callback.lock().unwrap()
    }

    pub fn discarded(&self) -> u32 {
        self.state.discarded.load(Ordering::SeqCst)
    }

    /// Deliver a frame the way the driver would.
    pub fn deliver(&self, payload: &[u8], rssi: i8, category: FrameCategory) {
        match self.callback() {
            Some(FrameCallback::Capture) => self.capture.on_frame(payload, rssi, category),
            _ => {
                self.state.discarded.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn record(&self, call: Call, op: RadioOp) -> Result<(), RadioError> {
        self.state.calls.lock().unwrap().push(call);
        if *self.state.fail_on.lock().unwrap() == Some(op) {
            return Err(RadioError::new(op, -1));
        }
        Ok(())
    }
}

impl Radio for MockRadio {
    fn init(&mut self, buffers: &BufferConfig) -> Result<(), RadioError> {
        self.record(Call::Init(*buffers), RadioOp::Init)?;
        self.state.up.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_country(&mut self, region: &Region) -> Result<(), RadioError> {
        self.record(Call::SetCountry(region.country), RadioOp::SetCountry)
    }

    fn region_channel_count(&self) -> Result<u8, RadioError> {
        if *self.state.fail_on.lock().unwrap() == Some(RadioOp::GetCountry) {
            return Err(RadioError::new(RadioOp::GetCountry, -1));
        }
        Ok(self.state.channel_count.load(Ordering::SeqCst) as u8)
    }

    fn set_frame_filter(&mut self, filter: FrameFilter) -> Result<(), RadioError> {
        self.record(Call::SetFilter(filter), RadioOp::SetFilter)
    }

    fn register_frame_callback(&mut self, callback: FrameCallback) -> Result<(), RadioError> {
        self.record(Call::Register(callback), RadioOp::SetCallback)?;
        *self.state.callback.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn set_promiscuous(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.record(Call::Promiscuous(enabled), RadioOp::SetPromiscuous)
    }

    fn deinit(&mut self) {
        self.state.calls.lock().unwrap().push(Call::Deinit);
        self.state.up.store(false, Ordering::SeqCst);
    }
}

struct TimerSlot {
    period_ms: u32,
    callback: &'static dyn TimerCallback,
    running: bool,
}

#[derive(Default)]
struct TimerState {
    slots: Mutex<Vec<TimerSlot>>,
    live: AtomicU32,
    fail_on: Mutex<Option<RadioOp>>,
}

/// Timer double. Timers fire only when the test calls [`MockTimers::fire`].
#[derive(Clone, Default)]
pub struct MockTimers {
    state: Arc<TimerState>,
}

/// Handle for a [`MockTimers`] timer; dropping it destroys the timer.
pub struct MockTimerHandle {
    id: usize,
    state: Arc<TimerState>,
}

impl Drop for MockTimerHandle {
    fn drop(&mut self) {
        if let Some(slot) = self.state.slots.lock().unwrap().get_mut(self.id) {
            slot.running = false;
        }
        self.state.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTimers {
    /// Timers created and not yet dropped.
    pub fn live(&self) -> u32 {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.state
            .slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.running)
            .count()
    }

    pub fn last_period_ms(&self) -> Option<u32> {
        self.state.slots.lock().unwrap().last().map(|s| s.period_ms)
    }

    pub fn fail_on(&self, op: RadioOp) {
        *self.state.fail_on.lock().unwrap() = Some(op);
    }

    /// Expire every running timer once.
    pub fn fire(&self) {
        let callbacks: Vec<&'static dyn TimerCallback> = self
            .state
            .slots
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.running)
            .map(|s| s.callback)
            .collect();
        for cb in callbacks {
            cb.on_timer();
        }
    }

    fn check(&self, op: RadioOp) -> Result<(), RadioError> {
        if *self.state.fail_on.lock().unwrap() == Some(op) {
            return Err(RadioError::new(op, -1));
        }
        Ok(())
    }
}

impl TimerService for MockTimers {
    type Handle = MockTimerHandle;

    fn create_periodic(
        &mut self,
        period_ms: u32,
        callback: &'static dyn TimerCallback,
    ) -> Result<Self::Handle, RadioError> {
        self.check(RadioOp::TimerCreate)?;
        let mut slots = self.state.slots.lock().unwrap();
        slots.push(TimerSlot {
            period_ms,
            callback,
            running: false,
        });
        self.state.live.fetch_add(1, Ordering::SeqCst);
        Ok(MockTimerHandle {
            id: slots.len() - 1,
            state: self.state.clone(),
        })
    }

    fn start(&mut self, handle: &mut Self::Handle) -> Result<(), RadioError> {
        self.check(RadioOp::TimerStart)?;
        self.state.slots.lock().unwrap()[handle.id].running = true;
        Ok(())
    }

    fn stop(&mut self, handle: &mut Self::Handle) -> Result<(), RadioError> {
        self.check(RadioOp::TimerStop)?;
        self.state.slots.lock().unwrap()[handle.id].running = false;
        Ok(())
    }
}
