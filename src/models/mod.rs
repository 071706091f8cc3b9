//! Wire-level frame models.
//!
//! The upstream protocol is JSON text frames with a top-level `type`
//! discriminator in both directions. Outbound frames are in
//! [`client_message`], inbound frames in [`server_message`].

mod client_message;
mod server_message;

pub use client_message::{ClientMessage, ListenData};
pub use server_message::{MessageData, ServerMessage};
