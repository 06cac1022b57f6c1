use anyhow::{anyhow, Result};
use ratatui::widgets::ListState;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::ai::{OllamaClient, OpenAIClient};
use crate::config::Config;
use crate::prompt;
use crate::provider::Provider;
use crate::session::{Session, Submit};
use crate::tui::{AppEvent, RevealTimer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state; mutated only by swapping in transition results
    pub session: Session,

    // Draft input
    pub input: String,
    pub input_cursor: usize, // cursor position in input, in chars

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of chat area, set during render
    pub chat_width: u16,  // inner width of chat area, for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // In-flight request and active reveal timer
    pub request_task: Option<JoinHandle<Result<String>>>,
    reveal_timer: Option<RevealTimer>,
    events_tx: UnboundedSender<AppEvent>,

    // Provider state
    pub current_provider: Provider,
    pub selected_model: String,
    pub ollama: OllamaClient,
    pub openai: Option<OpenAIClient>,

    // Shared context, read once at startup
    pub context: Option<String>,
    pub config: Config,

    // Model picker state
    pub show_model_picker: bool,
    pub available_models: Vec<String>,
    pub model_picker_state: ListState,

    // Provider picker state
    pub show_provider_picker: bool,
    pub provider_picker_state: ListState,
}

impl App {
    pub async fn new(config: Config, events_tx: UnboundedSender<AppEvent>) -> Result<Self> {
        let current_provider = config
            .provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or(Provider::Ollama);

        let selected_model = config
            .model
            .clone()
            .unwrap_or_else(|| current_provider.default_model().to_string());

        let ollama = OllamaClient::new(config.ollama_url());
        let openai = config
            .resolve_api_key()
            .map(|key| OpenAIClient::new(config.chat_url(), &key));

        let context = match &config.context_file {
            Some(path) => Some(prompt::load_context_file(path).await?),
            None => None,
        };

        Ok(Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            session: Session::new(),

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            request_task: None,
            reveal_timer: None,
            events_tx,

            current_provider,
            selected_model,
            ollama,
            openai,

            context,
            config,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),

            show_provider_picker: false,
            provider_picker_state: ListState::default(),
        })
    }

    /// Swap the session through a transition function.
    fn apply(&mut self, transition: impl FnOnce(Session) -> Session) {
        let session = std::mem::take(&mut self.session);
        self.session = transition(session);
    }

    /// Try to submit the current draft. Rejected drafts (blank, or while a
    /// request/reveal is active) leave everything untouched.
    pub fn submit_draft(&mut self) {
        let draft = self.input.clone();
        let session = std::mem::take(&mut self.session);
        let (session, outcome) = session.submit(&draft);
        self.session = session;

        if outcome != Submit::Accepted {
            return;
        }

        self.input.clear();
        self.input_cursor = 0;
        self.animation_frame = 0;
        self.spawn_request();
        self.scroll_to_bottom();
    }

    /// Spawn the one request task for the turn just submitted.
    fn spawn_request(&mut self) {
        let model = self.selected_model.clone();
        let context = self.context.clone();
        let messages = self.session.messages().to_vec();

        match self.current_provider {
            Provider::Ollama => {
                let ollama = self.ollama.clone();
                let prompt = prompt::build_prompt(context.as_deref(), &messages);
                self.request_task = Some(tokio::spawn(async move {
                    ollama.generate(&model, &prompt).await
                }));
            }
            Provider::OpenAI => {
                if let Some(client) = self.openai.clone() {
                    self.request_task = Some(tokio::spawn(async move {
                        client.chat(&model, context.as_deref(), &messages).await
                    }));
                } else {
                    self.apply(|s| {
                        s.request_failed(
                            "OpenAI API key not configured. Set OPENAI_API_KEY or add api_key to the config file.",
                        )
                    });
                }
            }
        }
    }

    /// Check the in-flight request; on completion feed the result through
    /// the session and, on success, start the reveal timer.
    pub async fn poll_request(&mut self) {
        if !self
            .request_task
            .as_ref()
            .is_some_and(|task| task.is_finished())
        {
            return;
        }
        let Some(task) = self.request_task.take() else {
            return;
        };

        let result = match task.await {
            Ok(result) => result,
            Err(join_err) => Err(anyhow!("request task failed: {join_err}")),
        };

        match result {
            Ok(response) => {
                self.apply(|s| s.request_succeeded(&response));
                self.start_reveal_timer();
            }
            Err(err) => {
                self.apply(|s| s.request_failed(&err.to_string()));
            }
        }
        self.scroll_to_bottom();
    }

    fn start_reveal_timer(&mut self) {
        self.cancel_reveal_timer();
        self.reveal_timer = Some(RevealTimer::start(self.events_tx.clone()));
    }

    fn cancel_reveal_timer(&mut self) {
        if let Some(timer) = self.reveal_timer.take() {
            timer.cancel();
        }
    }

    /// One reveal timer tick. When the tick finishes the reveal, the timer
    /// is unregistered as well.
    pub fn on_reveal_tick(&mut self) {
        if !self.session.is_revealing() {
            // stale tick delivered after a stop
            self.cancel_reveal_timer();
            return;
        }
        self.apply(Session::reveal_tick);
        self.scroll_to_bottom();
        if !self.session.is_revealing() {
            self.cancel_reveal_timer();
        }
    }

    /// Stop an active reveal, keeping the partial text. No-op otherwise.
    pub fn stop_reveal(&mut self) {
        self.apply(Session::stop_reveal);
        self.cancel_reveal_timer();
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Scroll the chat so the newest content is visible. Estimates wrapped
    /// line counts from the last known chat width.
    pub fn scroll_to_bottom(&mut self) {
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.session.messages() {
            total_lines += 1; // Role line ("You:" or "AI:")
            for line in msg.content.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1; // Empty line still takes one line
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // Blank line after message
        }

        if self.session.is_waiting() {
            total_lines += 2; // "AI:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        if total_lines > visible_height {
            self.chat_scroll = total_lines.saturating_sub(visible_height);
        } else {
            self.chat_scroll = 0;
        }
    }

    // Model picker methods
    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(i) = self.model_picker_state.selected() {
            if let Some(model) = self.available_models.get(i) {
                self.selected_model = model.clone();
                self.show_model_picker = false;
                self.config.model = Some(self.selected_model.clone());
                let _ = self.config.save();
            }
        }
    }

    // Provider picker methods
    pub fn provider_picker_nav_down(&mut self) {
        let len = Provider::all().len();
        if len > 0 {
            let i = self.provider_picker_state.selected().unwrap_or(0);
            self.provider_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn provider_picker_nav_up(&mut self) {
        let i = self.provider_picker_state.selected().unwrap_or(0);
        self.provider_picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Switch provider and pick a model for it, persisting both.
    pub fn select_provider(&mut self, provider: Provider, first_model: Option<String>) {
        self.current_provider = provider;
        self.selected_model =
            first_model.unwrap_or_else(|| provider.default_model().to_string());
        self.config.provider = Some(provider.as_str().to_string());
        self.config.model = Some(self.selected_model.clone());
        let _ = self.config.save();
    }

    /// Returns the source of the credential for a provider: "env",
    /// "config", "local", or None when the provider is unusable as-is.
    pub fn key_source(&self, provider: Provider) -> Option<&'static str> {
        match provider {
            Provider::Ollama => Some("local"),
            Provider::OpenAI => {
                if std::env::var("OPENAI_API_KEY").is_ok() {
                    Some("env")
                } else if self.openai.is_some() {
                    Some("config")
                } else {
                    None
                }
            }
        }
    }
}
