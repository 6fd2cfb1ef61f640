// Device Link UDP client.
//
// Device Link is the server's stateless datagram interface for actor
// coordinates. Requests carry numeric opcodes, answers echo the opcode
// of the request they belong to, and that echo is the only correlation
// the protocol offers.

pub mod client;
mod codec;
mod messages;

pub use client::{DeviceLinkClient, DeviceLinkSettings};

/// Most messages one request datagram may carry. Larger batches are
/// split across sequential datagrams.
pub(crate) const MAX_GROUP_SIZE: usize = 40;
