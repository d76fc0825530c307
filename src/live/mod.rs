pub mod channel;
pub mod protocol;

pub use channel::{ChannelEvent, ChannelState, LiveChannel};
pub use protocol::{ClientMessage, ServerMessage};
