//! Core of the chessdesk client: OAuth login, server streams, the session
//! state machine and the game clock. Presentation lives in `chessdesk-cli`.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod session;
pub mod stream;
pub mod token_store;

pub use api::{BoardAction, BoardApi};
pub use auth::{AuthFlow, AuthResult};
pub use clock::{ClockDisplay, ClockState, GameClock};
pub use config::{Config, Endpoints};
pub use session::{AppState, SessionController, SessionDeps, SessionEvent, SessionHandle};
pub use stream::{GameStreamDecoder, GameStreamEvent, StreamClient};
pub use token_store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
