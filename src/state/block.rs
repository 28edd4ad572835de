use serde_json::Value;

/// Stable handle the renderer keys on. Ids increase monotonically for the
/// lifetime of the session and are never reused, so blocks from earlier turns
/// stay addressable on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Response,
    Thinking,
    Tool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolPhase {
    Call,
    Result,
    Error,
}

/// One bubble inside a tool block: the invocation, its result, or its error.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolEntry {
    pub phase: ToolPhase,
    pub name: String,
    pub payload: ToolPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    /// Structured call arguments.
    Arguments(Value),
    /// Result or error text, shown verbatim.
    Text(String),
}

/// A logical unit of rendered conversation content. Mutated in place while
/// open; `finalized` flips when the turn ends or a different kind supersedes
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub text: String,
    pub tool_entries: Vec<ToolEntry>,
    pub finalized: bool,
}

impl Block {
    pub fn new(id: BlockId, kind: BlockKind) -> Self {
        Self {
            id,
            kind,
            text: String::new(),
            tool_entries: Vec::new(),
            finalized: false,
        }
    }

    /// Blocks with no visible text and no tool entries are removed on
    /// finalization.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.tool_entries.is_empty()
    }
}

/// Content handed to the renderer: either verbatim text or the line-oriented
/// list markup produced by the text post-processor.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedContent {
    Plain(String),
    Markup(String),
}

/// Block-mutation intents. The renderer is an opaque sink for these; all
/// visual concerns stay on its side of the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    OpenBlock {
        id: BlockId,
        kind: BlockKind,
        label: Option<String>,
    },
    AppendText {
        id: BlockId,
        delta: String,
    },
    SetContent {
        id: BlockId,
        content: RenderedContent,
    },
    AddToolEntry {
        id: BlockId,
        entry: ToolEntry,
    },
    RemoveBlock {
        id: BlockId,
    },
    ErrorNotice {
        message: String,
    },
    InputUnlocked,
}
