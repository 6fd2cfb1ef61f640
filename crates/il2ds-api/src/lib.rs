// il2ds-api: Async clients for the IL-2 FB dedicated server.
//
// The dedicated server speaks two interfaces designed for humans and
// fire-and-forget telemetry, not programs: a line-based text console over
// TCP and the opcode-based "Device Link" protocol over UDP. Neither
// carries request identifiers, so both clients here serialize requests
// strictly (one in flight per connection) and infer completion from the
// wire: a command-prompt marker line on the console, opcode matching on
// Device Link.

pub mod console;
pub mod device_link;
pub mod error;

pub use console::{ChatTarget, ConsoleClient, ConsoleSettings};
pub use device_link::{DeviceLinkClient, DeviceLinkSettings};
pub use error::Error;
