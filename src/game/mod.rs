//! Duel session core: validation, state, lifecycle and broadcast

pub mod broadcast;
pub mod error;
pub mod manager;
pub mod physics;
pub mod referee;
pub mod session;
pub mod slot;
pub mod validate;

pub use error::SessionError;
pub use manager::SessionHandle;
pub use referee::{ExternalReferee, Referee, ServerReferee};
pub use session::{Phase, Session};
