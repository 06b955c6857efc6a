//! Arm-then-commit confirmation for a tile press.
//!
//! A press arms a countdown of N one-second ticks; a second press before it
//! reaches zero cancels it. Each arming hands out a fresh [`ArmToken`] and ticks
//! carrying any other token are ignored, so a cancelled driver task simply sees
//! `Stale` and stops.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArmToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    Idle,
    Arming { token: ArmToken, remaining: u32 },
    Committed { token: ArmToken, linger: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Armed(ArmToken),
    Cancelled,
    /// Already sent; the press is ignored until the confirmation clears.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Pending(u32),
    Commit,
    Linger,
    Done,
    Stale,
}

/// Ticks spent showing the confirmation after the commit.
const LINGER_TICKS: u32 = 2;

#[derive(Debug, Clone)]
pub struct Countdown {
    ticks: u32,
    generation: u64,
    state: CountdownState,
}

impl Countdown {
    pub fn new(ticks: u32) -> Self {
        Self {
            ticks: ticks.max(1),
            generation: 0,
            state: CountdownState::Idle,
        }
    }

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn press(&mut self) -> Press {
        match self.state {
            CountdownState::Idle => {
                self.generation += 1;
                let token = ArmToken(self.generation);
                self.state = CountdownState::Arming {
                    token,
                    remaining: self.ticks,
                };
                Press::Armed(token)
            }
            CountdownState::Arming { .. } => {
                self.state = CountdownState::Idle;
                Press::Cancelled
            }
            CountdownState::Committed { .. } => Press::Ignored,
        }
    }

    pub fn tick(&mut self, token: ArmToken) -> Step {
        match self.state {
            CountdownState::Arming { token: current, remaining } if current == token => {
                let remaining = remaining - 1;
                if remaining == 0 {
                    self.state = CountdownState::Committed {
                        token,
                        linger: LINGER_TICKS,
                    };
                    Step::Commit
                } else {
                    self.state = CountdownState::Arming { token, remaining };
                    Step::Pending(remaining)
                }
            }
            CountdownState::Committed { token: current, linger } if current == token => {
                if linger <= 1 {
                    self.state = CountdownState::Idle;
                    Step::Done
                } else {
                    self.state = CountdownState::Committed {
                        token,
                        linger: linger - 1,
                    };
                    Step::Linger
                }
            }
            _ => Step::Stale,
        }
    }
}
