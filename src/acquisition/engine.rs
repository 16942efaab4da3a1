use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use critical_section::Mutex;

use super::sampler::{accumulate, RawPixel, Sampler};
use super::sequencer::{Sequencer, SessionPlan, State};
use crate::design_parameters::{ADC_AVERAGING, PIXELS};
use crate::hardware::{PixelAdc, SensorLines};

/// Flags shared between the foreground and both interrupt handlers.
pub struct SessionFlags {
    armed: AtomicBool,
    ready: AtomicBool,
    state: AtomicU8,
}

impl SessionFlags {
    const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            state: AtomicU8::new(State::Stop as u8),
        }
    }

    pub fn armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn state(&self) -> State {
        State::try_from(self.state.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    /// A pixel is being read out and its conversions are still wanted.
    pub fn pixel_wanted(&self) -> bool {
        self.ready.load(Ordering::Acquire) && self.state() == State::Read
    }

    fn publish(&self, state: State) {
        self.state.store(state.into(), Ordering::Release);
    }
}

/// The acquisition engine shared by the foreground and the two interrupt handlers.
///
/// The tick handler owns the [Sequencer], the pixel-ready handler owns the [Sampler]. The
/// foreground only touches either of them while the engine is disarmed.
///
/// The conversions of a pixel run outside of the critical section. The tick interrupt
/// preempts them and a tick that clears the ready flag ends the burst early.
pub struct Engine<L, A> {
    flags: SessionFlags,
    sequencer: Mutex<RefCell<Sequencer<L>>>,
    sampler: Mutex<RefCell<Sampler<A>>>,
}

impl<L: SensorLines, A: PixelAdc> Engine<L, A> {
    pub fn new(lines: L, adc: A) -> Self {
        Self {
            flags: SessionFlags::new(),
            sequencer: Mutex::new(RefCell::new(Sequencer::new(lines))),
            sampler: Mutex::new(RefCell::new(Sampler::new(adc))),
        }
    }

    pub fn flags(&self) -> &SessionFlags {
        &self.flags
    }

    pub fn is_armed(&self) -> bool {
        self.flags.armed()
    }

    /// The session has reached its terminal state.
    pub fn is_stopped(&self) -> bool {
        self.flags.state() == State::Stop
    }

    /// Tick interrupt handler.
    ///
    /// Returns whether the pixel-ready interrupt should be pended.
    pub fn on_tick(&self) -> bool {
        if !self.flags.armed() {
            return false;
        }

        let (step, state) = critical_section::with(|cs| {
            let mut sequencer = self.sequencer.borrow_ref_mut(cs);
            let step = sequencer.tick();
            (step, sequencer.state())
        });

        self.flags.ready.store(step.pixel_ready, Ordering::Release);
        self.flags.publish(state);
        step.pixel_ready
    }

    /// Pixel-ready interrupt handler.
    pub fn on_pixel_ready(&self) {
        if !self.flags.armed() || !self.flags.pixel_wanted() {
            return;
        }

        let Some((index, mut adc)) = critical_section::with(|cs| {
            self.sampler.borrow_ref_mut(cs).lend()
        }) else {
            return;
        };

        let mut slot = RawPixel::default();
        accumulate(&mut adc, &mut slot, ADC_AVERAGING, || {
            self.flags.pixel_wanted()
        });

        critical_section::with(|cs| {
            self.sampler.borrow_ref_mut(cs).settle(index, slot, adc)
        });
    }

    /// Set up a new session and arm the handlers. The tick source is started afterwards.
    ///
    /// Returns `false` without effect if a session is already armed.
    pub fn begin(&self, plan: &SessionPlan) -> bool {
        if self.flags.armed() {
            return false;
        }

        critical_section::with(|cs| {
            self.sampler.borrow_ref_mut(cs).arm();
            self.sequencer.borrow_ref_mut(cs).start(plan);
        });
        self.flags.ready.store(false, Ordering::Release);
        self.flags.publish(State::Lead);
        self.flags.armed.store(true, Ordering::Release);
        true
    }

    /// Disarm the handlers and park the lines. The tick source is stopped before.
    pub fn finish(&self) {
        self.flags.armed.store(false, Ordering::Release);
        self.flags.ready.store(false, Ordering::Release);
        critical_section::with(|cs| {
            self.sequencer.borrow_ref_mut(cs).shutdown();
            self.sampler.borrow_ref_mut(cs).release();
        });
        self.flags.publish(State::Stop);
    }

    /// Access the raw buffer of the last session.
    pub fn with_raw<R>(&self, f: impl FnOnce(&[RawPixel; PIXELS]) -> R) -> R {
        critical_section::with(|cs| f(self.sampler.borrow_ref(cs).raw()))
    }

    pub fn with_lines<R>(&self, f: impl FnOnce(&L) -> R) -> R {
        critical_section::with(|cs| f(self.sequencer.borrow_ref(cs).lines()))
    }

    /// Access the ADC. `None` while a burst is converting.
    pub fn with_adc<R>(&self, f: impl FnOnce(&A) -> R) -> Option<R> {
        critical_section::with(|cs| self.sampler.borrow_ref(cs).adc().map(f))
    }
}
