use crate::api::{normalize, ChatClient, ChatEvent, FrameDecoder};
use crate::config::Config;
use crate::state::Session;
use crate::terminal;
use crate::ui::input_metrics::clamp_to_char_boundary_left;
use crate::ui::layout::split_chat_layout;
use crate::ui::render::{
    input_visual_rows, render_input, render_status_line, render_transcript,
};
use crate::ui::transcript::Transcript;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::Frame;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(30);
const MAX_INPUT_PANE_ROWS: usize = 6;

/// What the stream task reports back to the UI task. Events cross the channel
/// as values; the session itself never leaves the UI task.
enum TurnUpdate {
    Event(ChatEvent),
    TransportFailure(String),
}

pub struct App {
    client: ChatClient,
    session: Session,
    transcript: Transcript,
    input: String,
    cursor_byte: usize,
    scroll: usize,
    auto_follow: bool,
    should_quit: bool,
    turn_rx: Option<mpsc::UnboundedReceiver<TurnUpdate>>,
    cancel: CancellationToken,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        Ok(Self {
            client: ChatClient::new(&config),
            session: Session::new(),
            transcript: Transcript::new(),
            input: String::new(),
            cursor_byte: 0,
            scroll: 0,
            auto_follow: true,
            should_quit: false,
            turn_rx: None,
            cancel: CancellationToken::new(),
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut term = terminal::setup()?;
        let run_result = self.run_loop(&mut term).await;
        let _ = terminal::restore();
        run_result
    }

    async fn run_loop(&mut self, term: &mut terminal::TerminalType) -> Result<()> {
        while !self.should_quit {
            self.drain_turn_updates();
            term.draw(|frame| draw(frame, self))?;

            if event::poll(EVENT_POLL_INTERVAL)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Release {
                        self.on_key(key);
                    }
                }
            }
            // Give the stream task a chance to run between frames.
            tokio::task::yield_now().await;
        }
        self.cancel.cancel();
        Ok(())
    }

    fn drain_turn_updates(&mut self) {
        let Some(rx) = self.turn_rx.as_mut() else {
            return;
        };

        let mut disconnected = false;
        loop {
            match rx.try_recv() {
                Ok(update) => match update {
                    TurnUpdate::Event(event) => {
                        for update in self.session.apply(event) {
                            self.transcript.apply(update);
                        }
                    }
                    TurnUpdate::TransportFailure(message) => {
                        let event = ChatEvent::Error { message };
                        for update in self.session.apply(event) {
                            self.transcript.apply(update);
                        }
                    }
                },
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    break;
                }
            }
        }

        if disconnected {
            self.turn_rx = None;
            // Stream ended without a terminal event; finalize so input is
            // never left wedged.
            if self.session.input_locked() {
                for update in self.session.apply(ChatEvent::Done) {
                    self.transcript.apply(update);
                }
            }
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Esc, _) => {
                self.should_quit = true;
            }
            (KeyCode::Enter, _) => self.submit_turn(),
            (KeyCode::Backspace, _) => self.delete_before_cursor(),
            (KeyCode::Left, _) => {
                self.cursor_byte =
                    clamp_to_char_boundary_left(&self.input, self.cursor_byte.saturating_sub(1));
            }
            (KeyCode::Right, _) => {
                let rest = &self.input[self.cursor_byte..];
                if let Some(ch) = rest.chars().next() {
                    self.cursor_byte += ch.len_utf8();
                }
            }
            (KeyCode::Up, _) => {
                self.scroll = self.scroll.saturating_sub(1);
                self.auto_follow = false;
            }
            (KeyCode::Down, _) => {
                self.scroll = self.scroll.saturating_add(1);
            }
            (KeyCode::End, _) => self.auto_follow = true,
            (KeyCode::Char(ch), KeyModifiers::NONE | KeyModifiers::SHIFT) => {
                self.input.insert(self.cursor_byte, ch);
                self.cursor_byte += ch.len_utf8();
            }
            _ => {}
        }
    }

    fn delete_before_cursor(&mut self) {
        if self.cursor_byte == 0 {
            return;
        }
        let previous =
            clamp_to_char_boundary_left(&self.input, self.cursor_byte.saturating_sub(1));
        self.input.replace_range(previous..self.cursor_byte, "");
        self.cursor_byte = previous;
    }

    fn submit_turn(&mut self) {
        if self.session.input_locked() {
            return;
        }
        let query = self.input.trim().to_string();
        if query.is_empty() {
            return;
        }
        self.input.clear();
        self.cursor_byte = 0;
        self.auto_follow = true;

        self.transcript.push_user_message(&query);
        self.session.lock_input();

        let (tx, rx) = mpsc::unbounded_channel();
        self.turn_rx = Some(rx);
        let client = self.client.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            stream_turn(client, query, tx, cancel).await;
        });
    }

    fn status_label(&self) -> &'static str {
        if self.session.input_locked() {
            "streaming"
        } else {
            "ready"
        }
    }
}

/// Runs one turn's stream to completion: open, decode, normalize, forward.
/// Any read failure surfaces as a transport failure and terminates the turn.
async fn stream_turn(
    client: ChatClient,
    query: String,
    tx: mpsc::UnboundedSender<TurnUpdate>,
    cancel: CancellationToken,
) {
    use futures::StreamExt;

    let mut stream = match client.open_stream(&query).await {
        Ok(stream) => stream,
        Err(error) => {
            let _ = tx.send(TurnUpdate::TransportFailure(error.to_string()));
            return;
        }
    };

    let mut decoder = FrameDecoder::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            chunk = stream.next() => match chunk {
                Some(Ok(bytes)) => {
                    for record in decoder.feed(&bytes) {
                        if tx.send(TurnUpdate::Event(normalize(record))).is_err() {
                            return;
                        }
                    }
                }
                Some(Err(error)) => {
                    let _ = tx.send(TurnUpdate::TransportFailure(error.to_string()));
                    return;
                }
                None => return,
            },
        }
    }
}

fn draw(frame: &mut Frame<'_>, app: &mut App) {
    let area = frame.area();
    let input_width = area.width.saturating_sub(2).max(1) as usize;
    let input_rows = input_visual_rows(&app.input, input_width).min(MAX_INPUT_PANE_ROWS) as u16;
    let panes = split_chat_layout(area, input_rows);

    render_status_line(
        frame,
        panes.header,
        &format!("tide [{}]", app.status_label()),
    );

    let lines = app.transcript.lines();
    if app.auto_follow {
        app.scroll = lines.len().saturating_sub(panes.transcript.height as usize);
    }
    render_transcript(frame, panes.transcript, &lines, app.scroll);
    render_input(frame, panes.input, &app.input, app.cursor_byte);
}
