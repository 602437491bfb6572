//! Session orchestration: `Authorization -> Home -> Game -> Home`.
//!
//! Split the same way throughout: [`state`] is plain data, [`update`] is the
//! pure transition function, [`runtime`] executes the effects it returns.

pub mod effects;
pub mod events;
pub mod runtime;
pub mod state;
pub mod update;

pub use effects::SessionEffect;
pub use events::{SessionEvent, SessionInput};
pub use runtime::{SessionController, SessionDeps, SessionHandle};
pub use state::{ActiveGame, AppState, ScopeId, SessionState};
