use crate::state::{BlockId, RenderedContent, SessionUpdate, ToolEntry, ToolPayload, ToolPhase};

/// Renderer-side projection of the conversation. The session only speaks in
/// block-mutation intents; this store turns them into display lines and keeps
/// earlier turns on screen after the per-turn block list resets.
#[derive(Default)]
pub struct Transcript {
    entries: Vec<Entry>,
}

enum Entry {
    User(String),
    Block(BlockView),
    Error(String),
}

struct BlockView {
    id: BlockId,
    label: Option<String>,
    text: String,
    tool_lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user_message(&mut self, message: &str) {
        self.entries.push(Entry::User(message.to_string()));
    }

    pub fn apply(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::OpenBlock { id, label, .. } => {
                self.entries.push(Entry::Block(BlockView {
                    id,
                    label,
                    text: String::new(),
                    tool_lines: Vec::new(),
                }));
            }
            SessionUpdate::AppendText { id, delta } => {
                if let Some(block) = self.block_mut(id) {
                    block.text.push_str(&delta);
                }
            }
            SessionUpdate::SetContent { id, content } => {
                if let Some(block) = self.block_mut(id) {
                    block.text = match content {
                        RenderedContent::Plain(text) => text,
                        RenderedContent::Markup(markup) => markup_to_display(&markup),
                    };
                }
            }
            SessionUpdate::AddToolEntry { id, entry } => {
                let lines = tool_entry_lines(&entry);
                if let Some(block) = self.block_mut(id) {
                    block.tool_lines.extend(lines);
                }
            }
            SessionUpdate::RemoveBlock { id } => {
                self.entries.retain(|entry| match entry {
                    Entry::Block(block) => block.id != id,
                    _ => true,
                });
            }
            SessionUpdate::ErrorNotice { message } => {
                self.entries.push(Entry::Error(format!("Error: {message}")));
            }
            SessionUpdate::InputUnlocked => {}
        }
    }

    /// Flattened display lines, oldest first.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for entry in &self.entries {
            if !out.is_empty() {
                out.push(String::new());
            }
            match entry {
                Entry::User(message) => {
                    for (index, line) in message.split('\n').enumerate() {
                        let prefix = if index == 0 { "> " } else { "  " };
                        out.push(format!("{prefix}{line}"));
                    }
                }
                Entry::Error(message) => out.push(format!("! {message}")),
                Entry::Block(block) => {
                    if let Some(label) = &block.label {
                        out.push(format!("[{label}]"));
                    }
                    if !block.text.is_empty() {
                        out.extend(block.text.split('\n').map(ToOwned::to_owned));
                    }
                    out.extend(block.tool_lines.iter().cloned());
                }
            }
        }
        out
    }

    fn block_mut(&mut self, id: BlockId) -> Option<&mut BlockView> {
        self.entries.iter_mut().find_map(|entry| match entry {
            Entry::Block(block) if block.id == id => Some(block),
            _ => None,
        })
    }
}

fn tool_entry_lines(entry: &ToolEntry) -> Vec<String> {
    let header = match entry.phase {
        ToolPhase::Call => format!("* Tool call: {}", entry.name),
        ToolPhase::Result => format!("+ Tool result: {}", entry.name),
        ToolPhase::Error => format!("- Tool error: {}", entry.name),
    };

    let mut lines = vec![header];
    let payload = match &entry.payload {
        ToolPayload::Arguments(value) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        ToolPayload::Text(text) => text.clone(),
    };
    // Tool payloads render verbatim; list markup never applies here.
    for line in payload.split('\n') {
        lines.push(format!("    {line}"));
    }
    lines
}

/// Collapse the post-processor's list markup back into terminal lines:
/// bullets become `•`, ordered items pick up their run's numbering, and
/// entity escapes are undone since the terminal never interprets markup.
fn markup_to_display(markup: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut ordered_next: Option<u64> = None;

    for line in markup.split('\n') {
        if line == "<ul>" || line == "</ul>" || line == "</ol>" {
            ordered_next = None;
            continue;
        }
        if let Some(start) = line
            .strip_prefix("<ol start=\"")
            .and_then(|rest| rest.strip_suffix("\">"))
        {
            ordered_next = start.parse::<u64>().ok();
            continue;
        }
        if let Some(item) = line
            .strip_prefix("<li>")
            .and_then(|rest| rest.strip_suffix("</li>"))
        {
            match ordered_next {
                Some(number) => {
                    out.push(format!("{number}. {}", decode_entities(item)));
                    ordered_next = Some(number + 1);
                }
                None => out.push(format!("\u{2022} {}", decode_entities(item))),
            }
            continue;
        }
        out.push(decode_entities(line));
    }

    out.join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
