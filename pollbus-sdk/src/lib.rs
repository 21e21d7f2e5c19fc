//! Shared wire types and HTTP clients for the pollbus long-poll bus.
//!
//! The `objects` module is the protocol: what goes over `POST /bus/poll`
//! and the admin publish endpoint. The `client` module (cargo feature
//! `client`) adds `reqwest`-backed typed clients so downstream crates
//! that only need the types do not pull in an HTTP stack.

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
