pub mod client;
pub mod logging;
#[cfg(test)]
pub mod mock_client;
pub mod normalize;
pub mod stream;

pub use client::{ByteStream, ChatClient};
pub use normalize::{normalize, ChatEvent};
pub use stream::{EventRecord, EventType, FrameDecoder};
