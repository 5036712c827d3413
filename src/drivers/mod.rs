//! Application logic expressed as scheduler tasks.
//!
//! Both drivers speak the same framing: one unsigned length byte (0 to 255)
//! followed by that many raw bytes. The server echoes each payload unchanged
//! on the same connection; the client checks that what comes back is
//! byte-for-byte what it sent.
//!
//! | driver | task | start policy |
//! |---|---|---|
//! | [`client::client_loop`] | one per connection | eager |
//! | [`server::accept_loop`] | one per listener | eager |
//! | [`server::echo_connection`] | one per accepted connection | lazy |

pub mod client;
pub mod server;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;
