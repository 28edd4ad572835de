mod block;
mod session;

pub use block::{
    Block, BlockId, BlockKind, RenderedContent, SessionUpdate, ToolEntry, ToolPayload, ToolPhase,
};
pub use session::Session;
