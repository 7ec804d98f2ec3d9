//! Terminal UI (TUI) for the OncoPredict intake wizard.
//!
//! Layout:
//! - Centered window titled "OncoPredict Intake Wizard"
//! - Left panel with the step list (current, completed and unreachable steps)
//! - Main content panel for the current step
//! - Status line and a bottom button row: [ Back ] [ Next ] [ Cancel ]
//! - Modal overlays (restore prompt, confirmations, messages, help, about, progress)
//!
//! Note: Logging is file-only in TUI mode (stdout logging is disabled) to avoid corrupting the terminal UI.

mod keymap;

use crate::api::analysis::{AnalysisError, AnalysisPipeline, AnalysisProgress, ProgressEmitter};
use crate::models::fields::FieldDef;
use crate::models::requests::PatientSummary;
use crate::models::state::WizardSession;
use crate::persistence::{PersistenceManager, RestoreCandidate};
use crate::render::{self, RenderPlan, Tone};
use crate::report::ReportExporter;
use crate::utils::validation::Constraint as FieldConstraint;
use crate::wizard::{WizardError, WizardStep};
use anyhow::Result;
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use keymap::{map_key, Command};
use log::{info, warn};
use ratatui::backend::{CrosstermBackend, TestBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

const TICK: Duration = Duration::from_millis(50);
const WINDOW_TITLE: &str = "OncoPredict Intake Wizard";
const DEMO_LOADED: &str = "Demo Patient Data (Oral Squamous Cell Carcinoma) Loaded Successfully!";
const AUTOSAVE_FLASH: Duration = Duration::from_secs(2);
const RESTART_PROMPT: &str = "Start New Assessment?\nCurrent progress will be reset.";

/// Everything the interactive loop needs besides its own view state.
pub struct TuiContext {
    pub session: Arc<WizardSession>,
    pub persistence: Arc<PersistenceManager>,
    pub pipeline: Arc<AnalysisPipeline>,
    pub exporter: ReportExporter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ButtonFocus {
    Back,
    Next,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FocusTarget {
    Field(usize),
    Button(ButtonFocus),
}

#[derive(Debug, Clone, PartialEq)]
enum Modal {
    ConfirmRestore(RestoreCandidate),
    ConfirmRestart,
    ConfirmCancel,
    Message { title: String, body: String },
    Help,
    About,
}

#[derive(Debug, Clone)]
struct TextInput {
    value: String,
    /// Cursor position in chars, not bytes.
    cursor: usize,
    /// Enter inserts a line break instead of being left to the key map.
    multiline: bool,
}

impl TextInput {
    fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            cursor: value.chars().count(),
            value,
            multiline: false,
        }
    }

    fn multiline(mut self, multiline: bool) -> Self {
        self.multiline = multiline;
        self
    }

    fn insert(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// Pasted text goes in at the cursor. Single-line inputs get spaces for line breaks.
    fn insert_str(&mut self, text: &str) {
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        for c in text.chars() {
            match c {
                '\n' if !self.multiline => self.insert(' '),
                '\t' => self.insert(' '),
                c if c.is_control() && c != '\n' => {}
                c => self.insert(c),
            }
        }
    }

    fn len(&self) -> usize {
        self.value.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.value.len())
    }

    /// Returns true when the key was consumed.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char(c) => {
                self.insert(c);
                true
            }
            KeyCode::Enter if self.multiline => {
                self.insert('\n');
                true
            }
            KeyCode::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    let at = self.byte_index(self.cursor);
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor < self.len() {
                    let at = self.byte_index(self.cursor);
                    self.value.remove(at);
                }
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                true
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(self.len());
                true
            }
            KeyCode::Home => {
                self.cursor = 0;
                true
            }
            KeyCode::End => {
                self.cursor = self.len();
                true
            }
            _ => false,
        }
    }

    fn spans(&self, focused: bool) -> Vec<Span<'static>> {
        if !focused {
            return vec![Span::raw(self.value.clone())];
        }
        let split = self.byte_index(self.cursor);
        let (before, rest) = self.value.split_at(split);
        let mut chars = rest.chars();
        let at_cursor = chars.next().map(String::from).unwrap_or_else(|| " ".to_string());
        vec![
            Span::raw(before.to_string()),
            Span::styled(at_cursor, Style::default().add_modifier(Modifier::REVERSED)),
            Span::raw(chars.as_str().to_string()),
        ]
    }

    /// Render with line breaks, each line prefixed by `indent`.
    fn lines(&self, focused: bool, indent: &str) -> Vec<Line<'static>> {
        let cursor_style = Style::default().add_modifier(Modifier::REVERSED);
        let mut lines = Vec::new();
        let mut spans = vec![Span::raw(indent.to_string())];
        let mut run = String::new();

        for (i, c) in self.value.chars().enumerate() {
            let at_cursor = focused && i == self.cursor;
            if at_cursor {
                spans.push(Span::raw(std::mem::take(&mut run)));
                let shown = if c == '\n' { ' ' } else { c };
                spans.push(Span::styled(shown.to_string(), cursor_style));
            }
            if c == '\n' {
                if !at_cursor {
                    spans.push(Span::raw(std::mem::take(&mut run)));
                }
                lines.push(Line::from(std::mem::take(&mut spans)));
                spans.push(Span::raw(indent.to_string()));
            } else if !at_cursor {
                run.push(c);
            }
        }

        spans.push(Span::raw(run));
        if focused && self.cursor >= self.len() {
            spans.push(Span::styled(" ", cursor_style));
        }
        lines.push(Line::from(spans));
        lines
    }
}

#[derive(Debug)]
enum UiMsg {
    AnalysisProgress(AnalysisProgress),
    AnalysisFinished(Result<(), AnalysisError>),
    AutoSaved,
}

struct UiState {
    focus: FocusTarget,
    modal: Option<Modal>,
    /// Which answer a confirmation modal has focused (true = affirmative).
    modal_confirm: bool,
    /// One input per schema field, in schema order.
    inputs: Vec<TextInput>,
    touched: Vec<bool>,
    progress: Option<AnalysisProgress>,
    notice: Option<String>,
    plan: Option<RenderPlan>,
    results_scroll: u16,
    last_export: Option<PathBuf>,
    autosaved_at: Option<Instant>,
    service_url: String,
    quit: bool,
}

impl UiState {
    fn new(session: &WizardSession) -> Self {
        let mut state = Self {
            focus: FocusTarget::Field(0),
            modal: None,
            modal_confirm: false,
            inputs: Vec::new(),
            touched: Vec::new(),
            progress: None,
            notice: None,
            plan: None,
            results_scroll: 0,
            last_export: None,
            autosaved_at: None,
            service_url: String::new(),
            quit: false,
        };
        sync_inputs(&mut state, session);
        state
    }

    fn open_modal(&mut self, modal: Modal, confirm_focused: bool) {
        self.modal = Some(modal);
        self.modal_confirm = confirm_focused;
    }

    fn message(&mut self, title: &str, body: impl Into<String>) {
        self.open_modal(
            Modal::Message {
                title: title.to_string(),
                body: body.into(),
            },
            true,
        );
    }
}

fn sync_inputs(state: &mut UiState, session: &WizardSession) {
    state.inputs = session
        .schema()
        .fields()
        .iter()
        .map(|f| TextInput::new(session.field(f.key)).multiline(f.multiline))
        .collect();
    state.touched = vec![false; state.inputs.len()];
}

/// Schema indices of the fields shown on `step`.
fn page_fields(session: &WizardSession, step: WizardStep) -> Vec<usize> {
    session
        .schema()
        .fields()
        .iter()
        .enumerate()
        .filter(|(_, f)| f.step == step)
        .map(|(i, _)| i)
        .collect()
}

fn reset_focus(state: &mut UiState, session: &WizardSession) {
    state.focus = if page_fields(session, session.current_step()).is_empty() {
        FocusTarget::Button(ButtonFocus::Next)
    } else {
        FocusTarget::Field(0)
    };
    state.results_scroll = 0;
}

fn can_go_back(session: &WizardSession) -> bool {
    session.current_step() != WizardStep::FIRST && !session.is_busy()
}

fn next_label(session: &WizardSession) -> &'static str {
    match session.current_step() {
        WizardStep::Intake | WizardStep::Results => "Next",
        WizardStep::Biomarkers if session.is_busy() => "Analyzing...",
        WizardStep::Biomarkers => "Analyze",
        WizardStep::Export => "Export",
        WizardStep::Done => "New Assessment",
    }
}

pub async fn run(ctx: TuiContext) -> Result<()> {
    info!("[PHASE: tui] [STEP: start] Starting TUI wizard");

    let mut terminal = setup_terminal()?;
    let result = run_loop(&mut terminal, &ctx).await;
    restore_terminal(&mut terminal)?;
    ctx.persistence.flush();

    info!("[PHASE: tui] [STEP: exit] TUI wizard closed");
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ctx: &TuiContext,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<UiMsg>();
    let mut state = UiState::new(&ctx.session);
    state.service_url = ctx.pipeline.service_url();

    let tx_saved = tx.clone();
    ctx.persistence.set_on_saved(Arc::new(move |_: chrono::DateTime<chrono::Utc>| {
        let _ = tx_saved.send(UiMsg::AutoSaved);
    }));

    // Restore gate: nothing else is handled until this is answered.
    if let Some(candidate) = ctx.persistence.restore(ctx.session.schema()) {
        state.open_modal(Modal::ConfirmRestore(candidate), true);
    }

    while !state.quit {
        drain_messages(&mut state, &rx, &ctx.session);
        terminal.draw(|f| draw(f.size(), f, &state, &ctx.session))?;

        // Never block the runtime: spawned tasks share this thread.
        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    handle_key(&mut state, key, ctx, &tx);
                }
                Event::Paste(text) => handle_paste(&mut state, &text, ctx),
                _ => {}
            }
        }

        tokio::time::sleep(TICK).await;
    }

    Ok(())
}

fn drain_messages(state: &mut UiState, rx: &mpsc::Receiver<UiMsg>, session: &WizardSession) {
    while let Ok(msg) = rx.try_recv() {
        match msg {
            UiMsg::AnalysisProgress(p) => {
                state.progress = Some(p);
            }
            UiMsg::AutoSaved => {
                state.autosaved_at = Some(Instant::now());
            }
            UiMsg::AnalysisFinished(result) => {
                state.progress = None;
                match result {
                    Ok(()) => {
                        state.plan = session.result().map(|r| render::render(&r));
                        state.notice = None;
                        reset_focus(state, session);
                    }
                    Err(AnalysisError::Validation(v)) => {
                        state.message("Check your input", v.message);
                    }
                    Err(AnalysisError::RequestFailed { user_message, .. }) => {
                        state.message("Analysis failed", user_message);
                    }
                    Err(AnalysisError::AlreadyInFlight) => {}
                }
            }
        }
    }
}

fn handle_key(state: &mut UiState, key: KeyEvent, ctx: &TuiContext, tx: &mpsc::Sender<UiMsg>) {
    let command = map_key(key);

    if command == Some(Command::Quit) {
        state.quit = true;
        return;
    }

    if state.modal.is_some() {
        handle_modal_key(state, key.code, ctx);
        return;
    }

    // Plain Enter in free text is a line break, not "activate".
    if key.code == KeyCode::Enter
        && key.modifiers == KeyModifiers::NONE
        && focused_input(state, &ctx.session).is_some_and(|i| i.multiline)
    {
        edit_focused_field(state, key.code, ctx);
        return;
    }

    match command {
        Some(cmd) => handle_command(state, cmd, ctx, tx),
        None => edit_focused_field(state, key.code, ctx),
    }
}

fn handle_modal_key(state: &mut UiState, code: KeyCode, ctx: &TuiContext) {
    let Some(modal) = state.modal.clone() else {
        return;
    };
    let session = &ctx.session;

    match modal {
        Modal::Message { .. } | Modal::Help | Modal::About => {
            if matches!(code, KeyCode::Enter | KeyCode::Esc) {
                state.modal = None;
            }
        }
        Modal::ConfirmRestore(candidate) => match code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                state.modal_confirm = !state.modal_confirm;
            }
            KeyCode::Enter => {
                state.modal = None;
                if state.modal_confirm {
                    session.apply_snapshot(&candidate.snapshot);
                    sync_inputs(state, session);
                    info!(
                        "[PHASE: autosave] [STEP: restore] Restored saved state from {}",
                        candidate.age
                    );
                } else {
                    info!("[PHASE: autosave] [STEP: restore] Saved state discarded by user");
                }
            }
            _ => {}
        },
        Modal::ConfirmRestart | Modal::ConfirmCancel => match code {
            KeyCode::Left | KeyCode::Right | KeyCode::Tab | KeyCode::BackTab => {
                state.modal_confirm = !state.modal_confirm;
            }
            KeyCode::Enter => {
                state.modal = None;
                if state.modal_confirm {
                    if modal == Modal::ConfirmCancel {
                        state.quit = true;
                    } else {
                        restart(state, ctx);
                    }
                }
            }
            KeyCode::Esc => {
                state.modal = None;
            }
            _ => {}
        },
    }
}

fn restart(state: &mut UiState, ctx: &TuiContext) {
    let session = &ctx.session;
    session.reset();
    sync_inputs(state, session);
    state.plan = None;
    state.progress = None;
    state.notice = None;
    state.last_export = None;
    reset_focus(state, session);
    info!("[PHASE: wizard] [STEP: restart] New assessment started");

    // Same gate as a fresh start: a draft still on disk is offered again.
    ctx.persistence.flush();
    if let Some(candidate) = ctx.persistence.restore(session.schema()) {
        state.open_modal(Modal::ConfirmRestore(candidate), true);
    }
}

fn handle_command(state: &mut UiState, cmd: Command, ctx: &TuiContext, tx: &mpsc::Sender<UiMsg>) {
    let session = &ctx.session;
    match cmd {
        Command::FocusNext => cycle_focus(state, session, true),
        Command::FocusPrev => cycle_focus(state, session, false),
        Command::Activate => match state.focus {
            FocusTarget::Field(_) => cycle_focus(state, session, true),
            FocusTarget::Button(b) => press_button(state, b, ctx, tx),
        },
        Command::NextStep => {
            if let Some(next) = session.current_step().next() {
                jump(state, session, next);
            }
        }
        Command::PrevStep => {
            if let Some(prev) = session.current_step().prev() {
                jump(state, session, prev);
            }
        }
        Command::JumpTo(step) => jump(state, session, step),
        Command::Analyze => {
            if session.current_step() == WizardStep::Biomarkers {
                start_analysis(state, ctx, tx);
            }
        }
        Command::Dismiss => state.notice = None,
        Command::Help => state.open_modal(Modal::Help, true),
        Command::About => state.open_modal(Modal::About, true),
        Command::LoadDemo => {
            if session.is_busy() {
                return;
            }
            let snapshot = session.load_demo();
            sync_inputs(state, session);
            ctx.persistence.record_change(snapshot);
            state.message("Demo Data", DEMO_LOADED);
        }
        Command::Restart => {
            if !session.is_busy() {
                state.open_modal(Modal::ConfirmRestart, false);
            }
        }
        Command::Quit => state.quit = true,
        Command::ScrollUp => state.results_scroll = state.results_scroll.saturating_sub(5),
        Command::ScrollDown => state.results_scroll = state.results_scroll.saturating_add(5),
    }
}

fn jump(state: &mut UiState, session: &WizardSession, step: WizardStep) {
    if session.is_busy() {
        return;
    }
    match session.jump_to(step) {
        Ok(_) => reset_focus(state, session),
        Err(e) => state.message("Navigation", e.to_string()),
    }
}

fn cycle_focus(state: &mut UiState, session: &WizardSession, forward: bool) {
    let fields = page_fields(session, session.current_step()).len();
    let mut order: Vec<FocusTarget> = (0..fields).map(FocusTarget::Field).collect();
    order.extend([
        FocusTarget::Button(ButtonFocus::Back),
        FocusTarget::Button(ButtonFocus::Next),
        FocusTarget::Button(ButtonFocus::Cancel),
    ]);
    let pos = order.iter().position(|f| *f == state.focus).unwrap_or(0);
    let len = order.len();
    let next = if forward {
        (pos + 1) % len
    } else {
        (pos + len - 1) % len
    };
    state.focus = order[next];
}

/// Schema index of the focused field, if focus is on one.
fn focused_index(state: &UiState, session: &WizardSession) -> Option<usize> {
    let FocusTarget::Field(n) = state.focus else {
        return None;
    };
    page_fields(session, session.current_step()).get(n).copied()
}

fn focused_input<'a>(state: &'a UiState, session: &WizardSession) -> Option<&'a TextInput> {
    focused_index(state, session).and_then(|idx| state.inputs.get(idx))
}

fn edit_focused_field(state: &mut UiState, code: KeyCode, ctx: &TuiContext) {
    edit_focused(state, ctx, |input| input.handle_key(code));
}

fn handle_paste(state: &mut UiState, text: &str, ctx: &TuiContext) {
    if state.modal.is_some() {
        return;
    }
    edit_focused(state, ctx, |input| {
        input.insert_str(text);
        true
    });
}

/// Apply `edit` to the focused input and push a changed value into the session.
fn edit_focused(state: &mut UiState, ctx: &TuiContext, edit: impl FnOnce(&mut TextInput) -> bool) {
    let session = &ctx.session;
    let Some(idx) = focused_index(state, session) else {
        return;
    };
    let Some(input) = state.inputs.get_mut(idx) else {
        return;
    };

    let before = input.value.clone();
    if !edit(&mut *input) || input.value == before {
        return;
    }
    state.touched[idx] = true;

    let key = session.schema().fields()[idx].key;
    match session.set_field(key, input.value.clone()) {
        Ok(snapshot) => ctx.persistence.record_change(snapshot),
        Err(e) => warn!("[PHASE: tui] [STEP: edit] {}", e),
    }
}

fn press_button(state: &mut UiState, button: ButtonFocus, ctx: &TuiContext, tx: &mpsc::Sender<UiMsg>) {
    let session = &ctx.session;
    match button {
        ButtonFocus::Back => {
            if can_go_back(session) {
                session.retreat();
                reset_focus(state, session);
            }
        }
        ButtonFocus::Cancel => state.open_modal(Modal::ConfirmCancel, false),
        ButtonFocus::Next => {
            if session.is_busy() {
                return;
            }
            match session.current_step() {
                WizardStep::Biomarkers => start_analysis(state, ctx, tx),
                WizardStep::Export => export_report(state, ctx),
                WizardStep::Done => state.open_modal(Modal::ConfirmRestart, false),
                WizardStep::Intake | WizardStep::Results => advance(state, session),
            }
        }
    }
}

fn advance(state: &mut UiState, session: &WizardSession) {
    match session.advance() {
        Ok(_) => reset_focus(state, session),
        Err(WizardError::Validation(v)) => {
            // Surface the failing field's live message too.
            if let Some(idx) = session.schema().fields().iter().position(|f| f.key == v.field) {
                state.touched[idx] = true;
            }
            state.message("Check your input", v.message);
        }
        Err(e) => state.message("Navigation", e.to_string()),
    }
}

fn export_report(state: &mut UiState, ctx: &TuiContext) {
    let session = &ctx.session;
    let summary = session.summary();
    let result = session.result();
    match ctx.exporter.export(summary.as_deref(), result.as_deref()) {
        Ok(path) => {
            state.notice = Some(format!("Report saved to {}", path.display()));
            state.last_export = Some(path);
            advance(state, session);
        }
        Err(e) => {
            warn!("[PHASE: export] [STEP: write] {}", e);
            state.message("Export failed", e.to_string());
        }
    }
}

fn start_analysis(state: &mut UiState, ctx: &TuiContext, tx: &mpsc::Sender<UiMsg>) {
    if ctx.session.is_busy() {
        return;
    }
    state.progress = None;
    state.notice = None;

    let tx_progress = tx.clone();
    let emit: ProgressEmitter = Arc::new(move |p: AnalysisProgress| {
        let _ = tx_progress.send(UiMsg::AnalysisProgress(p));
    });
    let pipeline = Arc::clone(&ctx.pipeline);
    let session = Arc::clone(&ctx.session);
    let tx = tx.clone();

    tokio::spawn(async move {
        let result = pipeline.run(&session, &emit).await.map(|_| ());
        let _ = tx.send(UiMsg::AnalysisFinished(result));
    });
}

// =========================
// Smoke mode
// =========================

/// Non-interactive smoke mode: render a single frame and exit.
/// Targets: intake|biomarkers|results|export|done|restore|progress|help
pub fn smoke(session: Arc<WizardSession>, target: &str) -> Result<String> {
    info!(
        "[PHASE: tui] [STEP: smoke] Rendering single-frame TUI smoke target={}",
        target
    );

    let t = target.trim().to_ascii_lowercase();
    let state = new_smoke_state(&session, t.as_str())?;

    // In-memory backend: no raw mode, no alternate screen.
    let backend = TestBackend::new(100, 32);
    let mut terminal = Terminal::new(backend)?;
    terminal.draw(|f| draw(f.size(), f, &state, &session))?;

    let buffer = terminal.backend().buffer().clone();
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer.get(x, y).symbol());
        }
        text.push('\n');
    }
    Ok(text)
}

fn sample_result() -> Result<crate::models::responses::ResultModel> {
    Ok(serde_json::from_value(serde_json::json!({
        "risk_level": "High",
        "risk_score": 82,
        "risk_factors": { "TP53 Mutation": 30, "Ki-67 Proliferation": 25, "EGFR Overexpression": 20 },
        "drug_options": ["Cetuximab", "Cisplatin"],
        "explainability": { "Ki-67": "Proliferation index above 80% indicates aggressive growth." },
        "drug_sensitivity": { "Cetuximab": "Sensitive", "Cisplatin": "Moderate response" },
        "analysis_text": "Biomarker profile indicates aggressive, non-HPV-associated disease.",
        "biomarker_valuation": "**TP53**: mutated\n**EGFR**: overexpressed",
        "major_points": ["High proliferation index"],
        "recommended_next_steps": ["Refer to multidisciplinary tumor board"],
        "methodology": "Weighted biomarker scoring",
        "reference_databases": ["COSMIC", "TCGA"]
    }))?)
}

fn new_smoke_state(session: &WizardSession, target: &str) -> Result<UiState> {
    let mut state = UiState::new(session);
    let reach = |step: WizardStep| -> Result<()> {
        session.load_demo();
        while session.current_step() < step {
            session.advance()?;
        }
        Ok(())
    };

    match target {
        "biomarkers" => reach(WizardStep::Biomarkers)?,
        "results" | "export" | "done" => {
            session.load_demo();
            let summary = PatientSummary::from_snapshot(&session.snapshot());
            let result = session.publish(summary, sample_result()?);
            session.show_results();
            state.plan = Some(render::render(&result));
            reach(match target {
                "export" => WizardStep::Export,
                "done" => WizardStep::Done,
                _ => WizardStep::Results,
            })?;
        }
        "restore" => {
            session.load_demo();
            state.open_modal(
                Modal::ConfirmRestore(RestoreCandidate {
                    snapshot: session.snapshot(),
                    saved_at: session.clock().now(),
                    age: "5 minutes ago".to_string(),
                }),
                true,
            );
            session.reset();
        }
        "progress" => {
            reach(WizardStep::Biomarkers)?;
            state.progress = Some(AnalysisProgress {
                correlation_id: "smoke".to_string(),
                percent: 60,
                message: "Evaluating risk factors...".to_string(),
                elapsed_ms: 0,
            });
        }
        "help" => state.open_modal(Modal::Help, true),
        _ => {}
    }

    sync_inputs(&mut state, session);
    reset_focus(&mut state, session);
    Ok(state)
}

// =========================
// Drawing
// =========================

fn draw(area: Rect, f: &mut ratatui::Frame<'_>, state: &UiState, session: &WizardSession) {
    let window_area = centered_window(area, 100, 32);

    let outer_block = Block::default().borders(Borders::ALL).title(WINDOW_TITLE);
    f.render_widget(outer_block, window_area);

    let inner = window_area.inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(1)].as_ref())
        .split(inner);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(26), Constraint::Min(0)].as_ref())
        .split(rows[0]);

    draw_step_list(f, cols[0], session);

    let step = session.current_step();
    let content_block = Block::default().borders(Borders::ALL).title(step.title());
    f.render_widget(content_block, cols[1]);
    let content_inner = cols[1].inner(&Margin {
        vertical: 1,
        horizontal: 1,
    });

    let (text, scroll) = match step {
        WizardStep::Intake | WizardStep::Biomarkers => (form_text(state, session, step), 0),
        WizardStep::Results => (results_text(state, session), state.results_scroll),
        WizardStep::Export => (export_text(session), 0),
        WizardStep::Done => (done_text(state), 0),
    };
    let content = Paragraph::new(text)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(content, content_inner);

    let status = match state.notice.as_deref() {
        Some(n) => Line::from(Span::styled(n.to_string(), Style::default().fg(Color::Green))),
        None if autosave_flash_visible(state, Instant::now()) => Line::from(Span::styled(
            "\u{2713} Auto-saved",
            Style::default().fg(Color::Green),
        )),
        None => Line::from(Span::styled(
            "Tab: move  Enter: select  Ctrl+\u{2190}/\u{2192}: steps  F1: help  F2: demo",
            Style::default().fg(Color::DarkGray),
        )),
    };
    f.render_widget(Paragraph::new(status), rows[1]);

    draw_buttons(f, rows[2], state, session);

    if session.is_busy() || state.progress.is_some() {
        draw_progress_modal(f, window_area, state.progress.as_ref());
    }

    if let Some(modal) = state.modal.as_ref() {
        match modal {
            Modal::ConfirmRestore(candidate) => draw_confirm_modal(
                f,
                window_area,
                "Restore saved data?",
                &candidate.prompt(),
                ("Restore", "Discard"),
                state.modal_confirm,
            ),
            Modal::ConfirmRestart => draw_confirm_modal(
                f,
                window_area,
                "New Assessment",
                RESTART_PROMPT,
                ("Yes, start over", "No"),
                state.modal_confirm,
            ),
            Modal::ConfirmCancel => draw_confirm_modal(
                f,
                window_area,
                "Exit OncoPredict?",
                "Unsaved changes are kept in the auto-save and offered again on next start.",
                ("Yes, exit", "No"),
                state.modal_confirm,
            ),
            Modal::Message { title, body } => draw_message_modal(f, window_area, title, body),
            Modal::Help => draw_message_modal(f, window_area, "Help", &help_text()),
            Modal::About => draw_message_modal(
                f,
                window_area,
                "About",
                &about_text(&state.service_url),
            ),
        }
    }
}

fn centered_window(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width.saturating_sub(2)).max(60).min(area.width);
    let h = height.min(area.height.saturating_sub(2)).max(20).min(area.height);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect {
        x,
        y,
        width: w,
        height: h,
    }
}

fn centered_modal(window_area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(window_area.width.saturating_sub(4)).max(30);
    let h = height.min(window_area.height.saturating_sub(4)).max(6);
    Rect {
        x: window_area.x + (window_area.width.saturating_sub(w)) / 2,
        y: window_area.y + (window_area.height.saturating_sub(h)) / 2,
        width: w,
        height: h,
    }
}

fn tone_style(tone: Tone) -> Style {
    match tone {
        Tone::HighAlert => Style::default().fg(Color::Red),
        Tone::Caution => Style::default().fg(Color::Yellow),
        Tone::Favorable => Style::default().fg(Color::Green),
        Tone::Neutral => Style::default(),
    }
}

fn draw_step_list(f: &mut ratatui::Frame<'_>, area: Rect, session: &WizardSession) {
    let current = session.current_step();
    let highest = session.highest_reached();

    let mut lines = vec![Line::from("")];
    for step in WizardStep::ALL {
        let (marker, style) = if step == current {
            ("\u{25b6}", Style::default().add_modifier(Modifier::BOLD))
        } else if session.is_completed(step) {
            ("\u{2713}", Style::default().fg(Color::Green))
        } else if step <= highest {
            (" ", Style::default())
        } else {
            (" ", Style::default().fg(Color::DarkGray))
        };
        lines.push(Line::from(Span::styled(
            format!(" {} {}. {}", marker, step.index() + 1, step.title()),
            style,
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        " Alt+1..5 jumps to a step",
        Style::default().fg(Color::DarkGray),
    )));

    let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL).title("Steps"));
    f.render_widget(p, area);
}

fn field_hint(def: &FieldDef) -> Option<String> {
    def.constraints.iter().find_map(|c| match c {
        FieldConstraint::OneOf(options) => Some(options.join("/")),
        FieldConstraint::Range { min, max } => Some(format!("{}-{}", min, max)),
        FieldConstraint::AtLeast { min } => Some(format!(">= {}", min)),
        FieldConstraint::Required => None,
    })
}

fn form_text(state: &UiState, session: &WizardSession, step: WizardStep) -> Text<'static> {
    let fields = session.schema().fields();
    let mut lines = Vec::new();
    lines.push(Line::from(match step {
        WizardStep::Intake => "Enter the patient details. Fields marked * are required.",
        _ => "Enter biomarker results and clinical notes, then select Analyze.",
    }));
    lines.push(Line::from(""));

    for (n, idx) in page_fields(session, step).into_iter().enumerate() {
        let def = &fields[idx];
        let focused = state.focus == FocusTarget::Field(n);
        let required = def.constraints.contains(&FieldConstraint::Required);
        let label = format!(
            "{} {:<16}",
            if focused { ">" } else { " " },
            format!("{}{}", def.label, if required { " *" } else { "" })
        );

        let mut spans = vec![Span::styled(
            label,
            if focused {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            },
        )];
        let input = &state.inputs[idx];
        if def.multiline {
            // Free text goes under the label, one row per line break.
            lines.push(Line::from(spans));
            lines.extend(input.lines(focused, "    "));
        } else {
            spans.extend(input.spans(focused));
            if input.value.is_empty() && !focused {
                if let Some(hint) = field_hint(def) {
                    spans.push(Span::styled(hint, Style::default().fg(Color::DarkGray)));
                }
            }
            lines.push(Line::from(spans));
        }

        if state.touched[idx] {
            if let Some(err) = session.field_error(def.key) {
                lines.push(Line::from(Span::styled(
                    format!("    {}", err.message),
                    Style::default().fg(Color::Red),
                )));
            }
        }
    }
    Text::from(lines)
}

fn summary_lines(summary: &PatientSummary) -> Vec<Line<'static>> {
    vec![
        Line::from(format!(
            "Patient {}  |  Age {}  |  {}  |  Stage {}",
            summary.id, summary.age, summary.cancer_type, summary.stage
        )),
        Line::from(""),
    ]
}

fn results_text(state: &UiState, session: &WizardSession) -> Text<'static> {
    let Some(plan) = state.plan.as_ref() else {
        return Text::from("No analysis result yet. Complete the Biomarker Data step and select Analyze.");
    };
    let heading = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = Vec::new();

    if let Some(summary) = session.summary() {
        lines.extend(summary_lines(&summary));
    }

    lines.push(Line::from(vec![
        Span::raw("Risk Level: "),
        Span::styled(
            format!(" {} ", plan.badge.label),
            tone_style(plan.badge.tone).add_modifier(Modifier::REVERSED | Modifier::BOLD),
        ),
        Span::raw(format!("   Score: {}", plan.score_text)),
    ]));
    lines.push(Line::from(""));

    if !plan.factor_bars.is_empty() {
        lines.push(Line::from(Span::styled("Risk Factors", heading)));
        let width = 24usize;
        for bar in &plan.factor_bars {
            let filled = ((bar.percent / 100.0) * width as f64).round() as usize;
            lines.push(Line::from(vec![
                Span::raw(format!("  {:<22} ", bar.name)),
                Span::styled("\u{2588}".repeat(filled), Style::default().fg(Color::Cyan)),
                Span::raw(" ".repeat(width.saturating_sub(filled))),
                Span::raw(format!(" {}", bar.value_text)),
            ]));
        }
        lines.push(Line::from(""));
    }

    if !plan.drugs.is_empty() {
        lines.push(Line::from(Span::styled("Suggested Therapies", heading)));
        lines.push(Line::from(format!("  {}", plan.drugs.join(", "))));
        lines.push(Line::from(""));
    }

    if !plan.sensitivity.is_empty() {
        lines.push(Line::from(Span::styled("Drug Sensitivity", heading)));
        for row in &plan.sensitivity {
            lines.push(Line::from(vec![
                Span::raw(format!("  {:<22} ", row.drug)),
                Span::styled(row.response.clone(), tone_style(row.tone)),
            ]));
        }
        lines.push(Line::from(""));
    }

    if !plan.explainability.is_empty() {
        lines.push(Line::from(Span::styled("Why", heading)));
        for (label, text) in &plan.explainability {
            lines.push(Line::from(vec![
                Span::styled(format!("  {}: ", label), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(text.clone()),
            ]));
        }
        lines.push(Line::from(""));
    }

    lines.push(Line::from(Span::styled("Biomarker Interpretation", heading)));
    if !plan.analysis_text.is_empty() {
        lines.push(Line::from(plan.analysis_text.clone()));
    }
    for paragraph in &plan.valuation {
        lines.push(Line::from(
            paragraph
                .iter()
                .map(|s| {
                    if s.emphasis {
                        Span::styled(s.text.clone(), Style::default().add_modifier(Modifier::BOLD))
                    } else {
                        Span::raw(s.text.clone())
                    }
                })
                .collect::<Vec<_>>(),
        ));
    }
    lines.push(Line::from(""));

    if !plan.implications.is_empty() {
        lines.push(Line::from(Span::styled("What this means", heading)));
        for item in &plan.implications {
            lines.push(Line::from(format!("  \u{2022} {}", item)));
        }
        lines.push(Line::from(""));
    }

    if !plan.methodology.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Methodology: {}", plan.methodology),
            Style::default().fg(Color::DarkGray),
        )));
    }
    if !plan.reference_databases.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("References: {}", plan.reference_databases.join(", ")),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines.push(Line::from(Span::styled(
        "PgUp/PgDn scroll",
        Style::default().fg(Color::DarkGray),
    )));
    Text::from(lines)
}

fn export_text(session: &WizardSession) -> Text<'static> {
    let mut lines = Vec::new();
    if let Some(summary) = session.summary() {
        lines.extend(summary_lines(&summary));
    }
    lines.push(Line::from("Select Export to write a Markdown report to:"));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("  {}", session_export_hint(session)),
        Style::default().add_modifier(Modifier::BOLD),
    )));
    Text::from(lines)
}

fn session_export_hint(session: &WizardSession) -> String {
    let id = session.summary().map(|s| s.id.clone()).unwrap_or_default();
    crate::report::report_file_name(&id)
}

fn done_text(state: &UiState) -> Text<'static> {
    let mut lines = vec![Line::from("The assessment is complete."), Line::from("")];
    if let Some(path) = state.last_export.as_ref() {
        lines.push(Line::from(format!("Report: {}", path.display())));
        lines.push(Line::from(""));
    }
    lines.push(Line::from("Select New Assessment to start over, or Cancel to exit."));
    Text::from(lines)
}

fn autosave_flash_visible(state: &UiState, now: Instant) -> bool {
    state
        .autosaved_at
        .is_some_and(|at| now.saturating_duration_since(at) < AUTOSAVE_FLASH)
}

fn help_text() -> String {
    [
        "System usage:",
        "1. Enter Patient ID, Age, Cancer Type and Stage",
        "2. Input biomarker data and clinical notes",
        "3. Select Analyze (or press Ctrl+Enter / F5)",
        "",
        "Tab/Shift+Tab move focus, Enter selects.",
        "In Clinical Notes, Enter starts a new line; use Tab to leave it.",
        "Ctrl+Left/Right move between reached steps.",
        "F2 loads demo data, Ctrl+R starts over, Ctrl+Q quits.",
    ]
    .join("\n")
}

fn about_text(service_url: &str) -> String {
    let mut text = format!(
        "OncoPredict Intake Wizard v{}\nTerminal client for the OncoPredict risk analysis service.",
        env!("CARGO_PKG_VERSION")
    );
    if !service_url.is_empty() {
        text.push_str(&format!("\n\nService: {}", service_url));
    }
    text
}

fn draw_buttons(f: &mut ratatui::Frame<'_>, area: Rect, state: &UiState, session: &WizardSession) {
    let busy = session.is_busy();
    let back = button_text(
        "Back",
        state.focus == FocusTarget::Button(ButtonFocus::Back),
        can_go_back(session),
    );
    let next = button_text(
        next_label(session),
        state.focus == FocusTarget::Button(ButtonFocus::Next),
        !busy,
    );
    let cancel = button_text(
        "Cancel",
        state.focus == FocusTarget::Button(ButtonFocus::Cancel),
        true,
    );

    let line = Line::from(vec![back, Span::raw(" "), next, Span::raw(" "), cancel]);
    let p = Paragraph::new(Text::from(line)).alignment(Alignment::Right);
    f.render_widget(p, area);
}

fn button_text(label: &str, focused: bool, enabled: bool) -> Span<'static> {
    let mut style = Style::default();
    if !enabled {
        style = style.fg(Color::DarkGray);
    }
    if focused && enabled {
        style = style.add_modifier(Modifier::REVERSED);
    }
    Span::styled(format!("[ {} ]", label), style)
}

fn modal_buttons_area(area: Rect) -> Rect {
    Rect {
        x: area.x + 1,
        y: area.y + area.height.saturating_sub(2),
        width: area.width.saturating_sub(2),
        height: 1,
    }
}

fn draw_confirm_modal(
    f: &mut ratatui::Frame<'_>,
    window_area: Rect,
    title: &str,
    body: &str,
    labels: (&str, &str),
    confirm_focused: bool,
) {
    let area = centered_modal(window_area, 62, 8);
    f.render_widget(Clear, area);

    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let p = Paragraph::new(Text::from(body.to_string()))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);

    let focused = Style::default().add_modifier(Modifier::REVERSED);
    let yes = Span::styled(
        format!("[ {} ]", labels.0),
        if confirm_focused { focused } else { Style::default() },
    );
    let no = Span::styled(
        format!("[ {} ]", labels.1),
        if confirm_focused { Style::default() } else { focused },
    );
    let line = Line::from(vec![yes, Span::raw(" "), no]);
    f.render_widget(
        Paragraph::new(Text::from(line)).alignment(Alignment::Right),
        modal_buttons_area(area),
    );
}

fn draw_message_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, title: &str, body: &str) {
    let height = (body.lines().count() as u16 + 5).max(7);
    let area = centered_modal(window_area, 70, height);
    f.render_widget(Clear, area);

    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let p = Paragraph::new(Text::from(body.to_string()))
        .block(block)
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);

    let ok = Span::styled("[ OK ]", Style::default().add_modifier(Modifier::REVERSED));
    f.render_widget(
        Paragraph::new(Text::from(Line::from(vec![ok]))).alignment(Alignment::Right),
        modal_buttons_area(area),
    );
}

fn draw_progress_modal(f: &mut ratatui::Frame<'_>, window_area: Rect, progress: Option<&AnalysisProgress>) {
    let area = centered_modal(window_area, 56, 6);
    f.render_widget(Clear, area);

    let pct = progress.map(|p| p.percent).unwrap_or(0);
    let msg = progress
        .map(|p| p.message.clone())
        .unwrap_or_else(|| "Starting analysis...".to_string());
    let width = 36usize;
    let filled = (pct as usize * width) / 100;
    let bar = format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        " ".repeat(width.saturating_sub(filled)),
        pct
    );

    let p = Paragraph::new(Text::from(vec![Line::from(bar), Line::from(""), Line::from(msg)]))
        .block(Block::default().borders(Borders::ALL).title("Analyzing"))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}
