pub mod controller;
pub mod state;

pub use controller::TimerController;
pub use state::{
    AdvancePolicy, Mode, PhaseCompletion, SessionMachine, SessionSnapshot, SessionState, Tick,
    TimerError, SESSIONS_PER_CYCLE,
};
