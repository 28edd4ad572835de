use crate::api::normalize::{ChatEvent, UNKNOWN_TOOL_NAME};
use crate::state::block::{
    Block, BlockId, BlockKind, RenderedContent, SessionUpdate, ToolEntry, ToolPayload, ToolPhase,
};
use crate::text;
use serde_json::Value;
use std::collections::HashMap;

const THINKING_LABEL: &str = "Thinking";

/// A tool invocation still waiting for its result or error.
#[derive(Debug, Clone)]
struct PendingToolCall {
    name: String,
    block: BlockId,
}

/// Discriminant of the previously applied event; consecutive text events of
/// one kind merge into the open block, anything else forces a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastEvent {
    Start,
    Message,
    Thinking,
    ToolCall,
    ToolResult,
    ToolError,
    Error,
    Terminal,
}

/// Per-conversation session reducer: consumes canonical events one at a time
/// and emits block-mutation intents for the renderer. Strictly sequential;
/// the ordered block list reflects arrival order of each block's first
/// contributing event and is never reordered.
pub struct Session {
    blocks: Vec<Block>,
    response_text: String,
    thinking_text: String,
    open_response: Option<BlockId>,
    open_thinking: Option<BlockId>,
    pending_tool_calls: HashMap<String, PendingToolCall>,
    last_event: Option<LastEvent>,
    input_locked: bool,
    next_block_id: u64,
    preformatted: fn(&str) -> bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            response_text: String::new(),
            thinking_text: String::new(),
            open_response: None,
            open_thinking: None,
            pending_tool_calls: HashMap::new(),
            last_event: None,
            input_locked: false,
            next_block_id: 0,
            preformatted: text::looks_preformatted,
        }
    }

    /// Swap out the preformatted-content sniff, e.g. for a stricter
    /// producer-supplied content-type signal.
    pub fn with_preformatted_predicate(mut self, predicate: fn(&str) -> bool) -> Self {
        self.preformatted = predicate;
        self
    }

    /// Blocks of the current turn, in arrival order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn input_locked(&self) -> bool {
        self.input_locked
    }

    /// Called by the app when a turn is submitted; every finalizing path
    /// (`done`, `end`, `error`, transport failure) unlocks again.
    pub fn lock_input(&mut self) {
        self.input_locked = true;
    }

    pub fn has_pending_tool_call(&self, id: &str) -> bool {
        self.pending_tool_calls.contains_key(id)
    }

    pub fn apply(&mut self, event: ChatEvent) -> Vec<SessionUpdate> {
        match event {
            ChatEvent::Start => self.on_start(),
            ChatEvent::Message { text } => self.on_message(text),
            ChatEvent::Thinking { text } => self.on_thinking(text),
            ChatEvent::ToolCall {
                id,
                name,
                arguments,
            } => self.on_tool_call(id, name, arguments),
            ChatEvent::ToolResult { id, name, output } => {
                self.on_tool_settled(id, name, output, ToolPhase::Result)
            }
            ChatEvent::ToolError { id, name, error } => {
                self.on_tool_settled(id, name, error, ToolPhase::Error)
            }
            ChatEvent::Error { message } => self.on_error(message),
            ChatEvent::Done | ChatEvent::End => self.on_terminal(),
        }
    }

    fn on_start(&mut self) -> Vec<SessionUpdate> {
        self.blocks.clear();
        self.response_text.clear();
        self.thinking_text.clear();
        self.open_response = None;
        self.open_thinking = None;
        self.pending_tool_calls.clear();
        self.last_event = Some(LastEvent::Start);
        Vec::new()
    }

    fn on_message(&mut self, text: String) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();

        if !text.is_empty() {
            let block_id = match (self.last_event, self.open_response) {
                (Some(LastEvent::Message), Some(id)) => id,
                _ => {
                    self.response_text.clear();
                    let id = self.open_block(BlockKind::Response, None, &mut updates);
                    self.open_response = Some(id);
                    id
                }
            };

            self.response_text.push_str(&text);
            let accumulated = self.response_text.clone();
            let rendered = self.render_response(&accumulated);
            if let Some(block) = self.block_mut(block_id) {
                block.text = accumulated;
            }
            updates.push(SessionUpdate::SetContent {
                id: block_id,
                content: rendered,
            });
        }

        self.last_event = Some(LastEvent::Message);
        updates
    }

    fn on_thinking(&mut self, text: String) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();

        if !text.is_empty() {
            let block_id = match (self.last_event, self.open_thinking) {
                (Some(LastEvent::Thinking), Some(id)) => id,
                _ => {
                    self.thinking_text.clear();
                    let id = self.open_block(
                        BlockKind::Thinking,
                        Some(THINKING_LABEL.to_string()),
                        &mut updates,
                    );
                    self.open_thinking = Some(id);
                    id
                }
            };

            self.thinking_text.push_str(&text);
            let accumulated = self.thinking_text.clone();
            if let Some(block) = self.block_mut(block_id) {
                block.text = accumulated;
            }
            // Thinking text is never list-processed; stream it verbatim.
            updates.push(SessionUpdate::AppendText {
                id: block_id,
                delta: text,
            });
        }

        self.last_event = Some(LastEvent::Thinking);
        updates
    }

    fn on_tool_call(
        &mut self,
        id: Option<String>,
        name: String,
        arguments: Value,
    ) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        self.interrupt_text_blocks();

        let block_id = match &id {
            Some(call_id) => {
                // A second call with the same unresolved id lands in the same
                // block; its name wins (last-writer-wins, see DESIGN.md).
                if let Some(pending) = self.pending_tool_calls.get_mut(call_id) {
                    pending.name = name.clone();
                    pending.block
                } else {
                    let block = self.open_block(BlockKind::Tool, None, &mut updates);
                    self.pending_tool_calls.insert(
                        call_id.clone(),
                        PendingToolCall {
                            name: name.clone(),
                            block,
                        },
                    );
                    block
                }
            }
            // Without a correlation key there is nothing to merge with later.
            None => self.open_block(BlockKind::Tool, None, &mut updates),
        };

        self.add_tool_entry(
            block_id,
            ToolEntry {
                phase: ToolPhase::Call,
                name,
                payload: ToolPayload::Arguments(arguments),
            },
            &mut updates,
        );

        self.last_event = Some(LastEvent::ToolCall);
        updates
    }

    fn on_tool_settled(
        &mut self,
        id: Option<String>,
        name: Option<String>,
        payload_text: String,
        phase: ToolPhase,
    ) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();

        let matched = id
            .as_deref()
            .and_then(|call_id| self.pending_tool_calls.remove(call_id));

        let (block_id, entry_name) = match matched {
            Some(pending) => (pending.block, pending.name),
            None => {
                // Unknown or already-resolved id: render standalone rather
                // than guessing at a merge target.
                let block = self.open_block(BlockKind::Tool, None, &mut updates);
                (
                    block,
                    name.unwrap_or_else(|| UNKNOWN_TOOL_NAME.to_string()),
                )
            }
        };

        self.add_tool_entry(
            block_id,
            ToolEntry {
                phase,
                name: entry_name,
                payload: ToolPayload::Text(payload_text),
            },
            &mut updates,
        );

        self.last_event = Some(match phase {
            ToolPhase::Error => LastEvent::ToolError,
            _ => LastEvent::ToolResult,
        });
        updates
    }

    fn on_error(&mut self, message: String) -> Vec<SessionUpdate> {
        self.last_event = Some(LastEvent::Error);
        self.input_locked = false;
        vec![
            SessionUpdate::ErrorNotice { message },
            SessionUpdate::InputUnlocked,
        ]
    }

    fn on_terminal(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();

        if let Some(block_id) = self.open_response {
            if !self.response_text.is_empty() {
                self.response_text = text::strip_extra_blank_lines(&self.response_text);
                let accumulated = self.response_text.clone();
                let rendered = self.render_response(&accumulated);
                if let Some(block) = self.block_mut(block_id) {
                    block.text = accumulated;
                }
                updates.push(SessionUpdate::SetContent {
                    id: block_id,
                    content: rendered,
                });
            }
        }

        if let Some(block_id) = self.open_thinking {
            if !self.thinking_text.is_empty() {
                self.thinking_text = text::strip_extra_blank_lines(&self.thinking_text);
                let accumulated = self.thinking_text.clone();
                if let Some(block) = self.block_mut(block_id) {
                    block.text = accumulated.clone();
                }
                updates.push(SessionUpdate::SetContent {
                    id: block_id,
                    content: RenderedContent::Plain(accumulated),
                });
            }
        }

        for block in &mut self.blocks {
            block.finalized = true;
        }

        // Zero-content events can leave behind empty containers; drop them.
        let removed: Vec<BlockId> = self
            .blocks
            .iter()
            .filter(|block| block.is_empty())
            .map(|block| block.id)
            .collect();
        self.blocks.retain(|block| !block.is_empty());
        for id in removed {
            if self.open_response == Some(id) {
                self.open_response = None;
            }
            if self.open_thinking == Some(id) {
                self.open_thinking = None;
            }
            updates.push(SessionUpdate::RemoveBlock { id });
        }

        self.input_locked = false;
        updates.push(SessionUpdate::InputUnlocked);
        self.last_event = Some(LastEvent::Terminal);
        updates
    }

    fn render_response(&self, accumulated: &str) -> RenderedContent {
        if (self.preformatted)(accumulated) {
            RenderedContent::Plain(accumulated.to_string())
        } else {
            RenderedContent::Markup(text::render_markdownish(accumulated))
        }
    }

    fn open_block(
        &mut self,
        kind: BlockKind,
        label: Option<String>,
        updates: &mut Vec<SessionUpdate>,
    ) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.blocks.push(Block::new(id, kind));
        updates.push(SessionUpdate::OpenBlock { id, kind, label });
        id
    }

    fn add_tool_entry(
        &mut self,
        block_id: BlockId,
        entry: ToolEntry,
        updates: &mut Vec<SessionUpdate>,
    ) {
        if let Some(block) = self.block_mut(block_id) {
            block.tool_entries.push(entry.clone());
        }
        updates.push(SessionUpdate::AddToolEntry {
            id: block_id,
            entry,
        });
    }

    /// A tool event supersedes any open text block; the next text event must
    /// open a fresh one instead of appending.
    fn interrupt_text_blocks(&mut self) {
        if let Some(id) = self.open_response.take() {
            if let Some(block) = self.block_mut(id) {
                block.finalized = true;
            }
        }
        if let Some(id) = self.open_thinking.take() {
            if let Some(block) = self.block_mut(id) {
                block.finalized = true;
            }
        }
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.iter_mut().find(|block| block.id == id)
    }
}
