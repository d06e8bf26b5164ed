//! Client-side control plane for a Spotify Connect speaker: zeroconf
//! credential hand-off, the dealer WebSocket session, the SpClient REST
//! facade, the windowed context resolver, and the connect-state handler that
//! ties them together (§1 Overview).

pub mod auth;
pub mod codec;
pub mod config;
pub mod connect_state;
pub mod context;
pub mod crypto;
pub mod dealer;
pub mod error;
pub mod events;
pub mod ids;
pub mod logging;
pub mod session;
pub mod spclient;
pub mod track_provider;

pub use error::{CoreError, CoreResult};
pub use session::{Session, SessionConfig};
