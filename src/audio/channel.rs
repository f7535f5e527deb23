//! Playback channel state with load generations.
//!
//! Every load attempt takes a ticket stamped with the channel generation.
//! Stopping bumps the generation, so a load that resolves after a stop no
//! longer matches and cannot bring the channel back to life.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Loading { track: String },
    Playing { track: String },
    Paused { track: String },
    Failed { track: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

#[derive(Debug)]
pub struct AudioChannel {
    state: ChannelState,
    generation: u64,
}

impl Default for AudioChannel {
    fn default() -> Self {
        Self {
            state: ChannelState::Idle,
            generation: 0,
        }
    }
}

impl AudioChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn begin_load(&mut self, track: &str) -> LoadTicket {
        self.generation += 1;
        self.state = ChannelState::Loading {
            track: track.to_string(),
        };
        LoadTicket(self.generation)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.generation && matches!(self.state, ChannelState::Loading { .. })
    }

    /// Loading -> Playing. Stale tickets are rejected.
    pub fn finish_load(&mut self, ticket: LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if let ChannelState::Loading { track } = &self.state {
            self.state = ChannelState::Playing {
                track: track.clone(),
            };
        }
        true
    }

    pub fn fail(&mut self, ticket: LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if let ChannelState::Loading { track } = &self.state {
            self.state = ChannelState::Failed {
                track: track.clone(),
            };
        }
        true
    }

    pub fn pause(&mut self) -> bool {
        if let ChannelState::Playing { track } = &self.state {
            self.state = ChannelState::Paused {
                track: track.clone(),
            };
            return true;
        }
        false
    }

    pub fn resume(&mut self) -> bool {
        if let ChannelState::Paused { track } = &self.state {
            self.state = ChannelState::Playing {
                track: track.clone(),
            };
            return true;
        }
        false
    }

    /// Back to idle; invalidates every outstanding ticket.
    pub fn stop(&mut self) {
        self.generation += 1;
        self.state = ChannelState::Idle;
    }
}
