//! Sensor clock and start pulse sequencing
//!
//! One call of [Sequencer::tick] per timer period walks the session through
//! `Lead -> Reset -> Reset2 -> Integration -> Read -> Trail -> Stop`. The two reset passes flush
//! the photodiodes before the exposure. Line levels computed during one tick are only written
//! out at the start of the next one so that the pin edges have a fixed latency from the timer
//! update.
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::IntoStaticStr;

use super::timing::SensorTimingTable;
use crate::design_parameters::{
    us_to_ticks, DEFAULT_LEAD_TICKS, EXT_TRIGGER_HIGH_TICKS, PIXELS,
    READ_TICKS, TICKS_PER_PIXEL, TRAIL_TICKS,
};
use crate::hardware::SensorLines;

const READ: u32 = READ_TICKS as u32;
const TRAIL: u32 = TRAIL_TICKS as u32;

#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
    IntoStaticStr,
)]
#[repr(u8)]
pub enum State {
    Lead,
    Reset,
    Reset2,
    Integration,
    Read,
    Trail,
    #[default]
    Stop,
}

/// Parameters of one acquisition session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SessionPlan {
    /// Exposure ticks between the second reset pass and the readout.
    pub integration_ticks: u32,
    /// Route the external trigger output.
    pub trigger: bool,
    /// Lead of the trigger rising edge over the start of integration, 0 for no pulse.
    pub trigger_delay_ticks: u32,
    /// Route the external light source output.
    pub light: bool,
}

impl SessionPlan {
    pub fn new(
        integration_ticks: u32,
        trigger_delay_us: u32,
        trigger: bool,
        light: bool,
    ) -> Self {
        let trigger_delay_ticks = if trigger {
            us_to_ticks(trigger_delay_us) & !1
        } else {
            0
        };
        Self {
            integration_ticks,
            trigger,
            trigger_delay_ticks,
            light,
        }
    }

    /// The same session without the external trigger output.
    pub fn without_trigger(self) -> Self {
        Self {
            trigger: false,
            trigger_delay_ticks: 0,
            ..self
        }
    }

    fn triggered(&self) -> bool {
        self.trigger && self.trigger_delay_ticks > 0
    }

    /// Ticks in the lead state. Long trigger delays extend the lead so that the trigger pulse
    /// still starts after the session.
    pub fn lead_ticks(&self) -> u32 {
        if self.triggered()
            && self.trigger_delay_ticks > DEFAULT_LEAD_TICKS + 2 * READ
        {
            self.trigger_delay_ticks - 2 * READ
        } else {
            DEFAULT_LEAD_TICKS
        }
    }

    /// Initial value of the trigger countdown. The output rises when the countdown reaches
    /// the pulse length and falls at zero.
    pub fn trigger_countdown(&self) -> u32 {
        if self.triggered() {
            EXT_TRIGGER_HIGH_TICKS + self.lead_ticks() + 2 * READ
                - self.trigger_delay_ticks
        } else {
            0
        }
    }

    /// Total number of ticks from start to the stop state.
    pub fn session_ticks(&self) -> u32 {
        self.lead_ticks() + 3 * READ + self.integration_ticks + TRAIL
    }
}

/// What a tick asks of the rest of the engine.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Step {
    /// A pixel is valid, the sampler should convert it.
    pub pixel_ready: bool,
    /// The last pixel window just ended.
    pub read_complete: bool,
}

/// The tick handler half of an acquisition session.
pub struct Sequencer<L> {
    lines: L,
    table: SensorTimingTable,
    state: State,
    counter: u32,
    // Levels written at the start of the next tick.
    clock: bool,
    strobe: bool,
    integration_ticks: u32,
    lead_ticks: u32,
    trigger_countdown: u32,
    trigger: bool,
    light: bool,
}

impl<L: SensorLines> Sequencer<L> {
    pub fn new(lines: L) -> Self {
        Self {
            lines,
            table: SensorTimingTable::build(
                PIXELS,
                TICKS_PER_PIXEL,
                TRAIL_TICKS,
            ),
            state: State::Stop,
            counter: 0,
            clock: false,
            strobe: false,
            integration_ticks: 0,
            lead_ticks: DEFAULT_LEAD_TICKS,
            trigger_countdown: 0,
            trigger: false,
            light: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn lines(&self) -> &L {
        &self.lines
    }

    /// Prepare a new session and put the lines into their idle levels.
    pub fn start(&mut self, plan: &SessionPlan) {
        let plan = if self.lines.has_trigger() {
            *plan
        } else {
            plan.without_trigger()
        };

        self.integration_ticks = plan.integration_ticks;
        self.lead_ticks = plan.lead_ticks();
        self.trigger_countdown = plan.trigger_countdown();
        self.trigger = plan.trigger;
        self.light = plan.light;

        self.state = State::Lead;
        self.counter = 0;
        self.clock = true;
        self.strobe = true;
        self.lines.set_clock(false);
        self.lines.set_strobe(true);

        if self.trigger {
            // With a delay of exactly the lead and both reset passes the pulse starts right
            // away. The countdown would skip the rising edge otherwise.
            self.lines
                .set_trigger(self.trigger_countdown == EXT_TRIGGER_HIGH_TICKS);
        }
        if self.light {
            self.lines.set_light(false);
        }
    }

    /// Advance by one tick.
    pub fn tick(&mut self) -> Step {
        let mut step = Step::default();

        self.lines.set_clock(self.clock);
        self.lines.set_strobe(self.strobe);
        self.clock = !self.clock;

        match self.state {
            State::Lead => {
                self.counter += 1;
                if self.counter >= self.lead_ticks {
                    self.counter = 0;
                    self.state = State::Reset;
                    self.strobe = self.table.strobe_level(0);
                }
            }
            State::Reset => {
                self.counter += 1;
                if self.counter >= READ {
                    self.counter = 0;
                    self.state = State::Reset2;
                }
                self.strobe = self.table.strobe_level(self.counter as usize);
            }
            State::Reset2 => {
                self.counter += 1;
                if self.counter >= READ {
                    self.counter = 0;
                    self.state = State::Integration;
                    if self.light {
                        self.lines.set_light(true);
                    }
                } else {
                    self.strobe =
                        self.table.strobe_level(self.counter as usize);
                }
            }
            State::Integration => {
                self.counter += 1;
                if self.counter >= self.integration_ticks {
                    self.counter = 0;
                    self.state = State::Read;
                    self.strobe = self.table.strobe_level(0);
                }
            }
            State::Read => {
                step.pixel_ready = self.table.pixel_ready(self.counter as usize);
                self.counter += 1;
                if self.counter >= READ {
                    self.counter = 0;
                    self.state = State::Trail;
                    step.read_complete = true;
                } else {
                    self.strobe =
                        self.table.strobe_level(self.counter as usize);
                }
            }
            State::Trail => {
                self.counter += 1;
                if self.counter >= TRAIL {
                    self.counter = 0;
                    self.state = State::Stop;
                    self.clock = false;
                    self.strobe = false;
                    if self.light {
                        self.lines.set_light(false);
                    }
                }
            }
            State::Stop => {
                self.clock = false;
            }
        }

        if self.trigger_countdown > 0 {
            self.trigger_countdown -= 1;
            if self.trigger_countdown == EXT_TRIGGER_HIGH_TICKS {
                self.lines.set_trigger(true);
            } else if self.trigger_countdown == 0 {
                self.lines.set_trigger(false);
            }
        }

        step
    }

    /// Drive all lines low and drop the output routing.
    pub fn shutdown(&mut self) {
        self.lines.set_clock(false);
        self.lines.set_strobe(false);
        if self.trigger {
            self.lines.set_trigger(false);
        }
        if self.light {
            self.lines.set_light(false);
        }
        self.trigger = false;
        self.light = false;
        self.trigger_countdown = 0;
        self.clock = false;
        self.strobe = false;
        self.state = State::Stop;
    }
}
