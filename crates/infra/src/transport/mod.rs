//! Transport router: HTTP for queries and mutations, a persistent channel
//! for subscriptions

pub mod channel;
pub mod session_client;
pub mod slot;

pub use channel::{channel_url, Channel, SubscriptionStream};
pub use session_client::{Dispatched, SessionClient};
pub use slot::TransportSlot;
