pub mod admin;
pub mod bus;

pub use admin::{SendEntry, SendRequest, SendResponse};
pub use bus::{BusMessage, PollItem, PollOptions, PollRequest, WireAtom, WireChannel};
