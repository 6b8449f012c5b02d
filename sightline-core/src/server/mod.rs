//! Room relay server
//!
//! Rooms fan raw stream bytes out to every seat bound to them. Exposed over
//! HTTP by [`api`].

pub mod api;
mod registry;
mod room;

pub use api::{router, serve, serve_on, ApiError};
pub use registry::RoomRegistry;
pub use room::{ClientSender, RoomHandle, MAX_ROOM_ID};
