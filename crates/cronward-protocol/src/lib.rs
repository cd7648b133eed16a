//! `cronward-protocol`: wire types for the daemon's control protocol.
//!
//! Clients exchange JSON text frames over a WebSocket: one `req` frame per
//! call, answered by exactly one `res` frame with the same `id`. Transport
//! faults come back as `ok: false` with an [`frames::ErrorShape`]; the
//! outcome of a job or scheduler operation is always an `ok: true` frame
//! whose payload is a [`results::CallResult`].

pub mod frames;
pub mod methods;
pub mod params;
pub mod results;
