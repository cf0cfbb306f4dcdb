// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use agentdesk_app::{
    Agent, AgentId, AppCommand, AppEvent, AppState, FormField, Llm, LlmOptions, LlmProvider,
    Navigator, Notification, Notifier, Route, Severity, SubmitPlan, apply_effects,
    submission_error_message,
};
use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info, warn};

const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const NO_RESULTS: &str = "No results.";
const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
const TABLE_COLUMNS: [&str; 5] = ["name", "description", "active", "model", "created"];

/// Display preferences handed over by the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiOptions {
    /// Provider whose model catalog the creation dialog offers.
    pub provider: LlmProvider,
    /// Model preselected in a fresh draft instead of the built-in default.
    pub default_model: Option<String>,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            default_model: None,
        }
    }
}

pub trait AppRuntime {
    fn load_agents(&mut self) -> Result<Vec<Agent>>;
    fn load_agent(&mut self, id: &AgentId) -> Result<Agent>;
    fn load_llms(&mut self) -> Result<Vec<Llm>>;
    fn submit_agent(&mut self, plan: &SubmitPlan) -> Result<Agent>;
    fn spawn_llm_load(&mut self, request_id: u64, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self.load_llms().map_err(|error| format!("{error:#}"));
        tx.send(InternalEvent::LlmsLoaded { request_id, result })
            .map_err(|_| anyhow!("llm event channel closed"))?;
        Ok(())
    }
    fn cancel_llm_load(&mut self, _request_id: u64) -> Result<()> {
        Ok(())
    }
    fn spawn_submission(&mut self, plan: SubmitPlan, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .submit_agent(&plan)
            .map(|agent| agent.id)
            .map_err(|error| submission_error_message(&error));
        tx.send(InternalEvent::SubmitFinished(result))
            .map_err(|_| anyhow!("submission event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    LlmsLoaded {
        request_id: u64,
        result: Result<Vec<Llm>, String>,
    },
    SubmitFinished(Result<AgentId, String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ListView {
    agents: Vec<Agent>,
    error: Option<String>,
    selected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct DetailView {
    agent: Option<Agent>,
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct FormUiState {
    field_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    options: UiOptions,
    list: ListView,
    detail: DetailView,
    form: FormUiState,
    filter_editing: bool,
    status_token: u64,
    tick: usize,
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: UiOptions,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData {
        options,
        ..ViewData::default()
    };
    let (internal_tx, internal_rx) = mpsc::channel();
    start_session(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);
        view_data.tick = view_data.tick.wrapping_add(1);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    if state.llm_request.is_some() {
        dispatch(
            state,
            runtime,
            &mut view_data,
            &internal_tx,
            AppCommand::CancelLlmLoad,
        );
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn start_session<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    reload_agents(runtime, &mut view_data.list);
    if let Some(error) = view_data.list.error.clone() {
        dispatch(
            state,
            runtime,
            view_data,
            tx,
            AppCommand::SetStatus(Notification::error(format!("load failed: {error}"))),
        );
    }
    dispatch(state, runtime, view_data, tx, AppCommand::StartLlmLoad);
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::LlmsLoaded { request_id, result } => {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    tx,
                    AppCommand::LlmsLoaded { request_id, result },
                );
            }
            InternalEvent::SubmitFinished(result) => {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    tx,
                    AppCommand::SubmitFinished(result),
                );
            }
        }
    }
}

fn dispatch<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    apply_events(state, runtime, view_data, tx, &events);
}

fn apply_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    events: &[AppEvent],
) {
    {
        let mut navigator = RouteLoader {
            runtime: &mut *runtime,
            list: &mut view_data.list,
            detail: &mut view_data.detail,
        };
        let mut notifier = StatusTimer {
            token: &mut view_data.status_token,
            tx,
        };
        apply_effects(events, &mut navigator, &mut notifier);
    }

    for event in events {
        match event {
            AppEvent::LlmLoadRequested {
                request_id,
                superseded,
            } => {
                if let Some(previous) = superseded
                    && let Err(error) = runtime.cancel_llm_load(*previous)
                {
                    warn!(request_id = previous, error = %format!("{error:#}"), "cancel llm load");
                }
                if let Err(error) = runtime.spawn_llm_load(*request_id, tx.clone()) {
                    state.dispatch(AppCommand::LlmsLoaded {
                        request_id: *request_id,
                        result: Err(format!("{error:#}")),
                    });
                }
            }
            AppEvent::LlmLoadCancelled { request_id } => {
                if let Err(error) = runtime.cancel_llm_load(*request_id) {
                    warn!(request_id, error = %format!("{error:#}"), "cancel llm load");
                }
            }
            AppEvent::SubmitRequested(plan) => {
                if let Err(error) = runtime.spawn_submission(plan.clone(), tx.clone()) {
                    dispatch(
                        state,
                        runtime,
                        view_data,
                        tx,
                        AppCommand::SubmitFinished(Err(submission_error_message(&error))),
                    );
                }
            }
            AppEvent::DialogOpened => {
                view_data.form = FormUiState::default();
                if let Some(model) = view_data.options.default_model.clone() {
                    state.dispatch(AppCommand::SetField(FormField::LlmModel, model));
                }
            }
            AppEvent::ValidationFailed(errors) => {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    tx,
                    AppCommand::SetStatus(Notification::error(format!("form invalid: {errors}"))),
                );
            }
            AppEvent::SubmitBlocked(block) => {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    tx,
                    AppCommand::SetStatus(Notification::info(block.message())),
                );
            }
            AppEvent::FilterChanged(_) => {
                view_data.list.selected = 0;
            }
            AppEvent::StatusUpdated(_) => {
                restart_status_timer(&mut view_data.status_token, tx);
            }
            _ => {}
        }
    }
}

/// Loads whatever the destination route shows.
struct RouteLoader<'a, R: AppRuntime> {
    runtime: &'a mut R,
    list: &'a mut ListView,
    detail: &'a mut DetailView,
}

impl<R: AppRuntime> Navigator for RouteLoader<'_, R> {
    fn push(&mut self, route: &Route) {
        debug!(path = %route.path(), "navigate");
        match route {
            Route::AgentList => reload_agents(self.runtime, self.list),
            Route::AgentDetail(id) => load_detail(self.runtime, self.detail, id),
            Route::LlmSettings => {}
        }
    }

    fn refresh(&mut self) {
        reload_agents(self.runtime, self.list);
    }
}

struct StatusTimer<'a> {
    token: &'a mut u64,
    tx: &'a Sender<InternalEvent>,
}

impl Notifier for StatusTimer<'_> {
    fn notify(&mut self, notification: &Notification) {
        match notification.severity {
            Severity::Info => info!(message = %notification.message, "notify"),
            Severity::Error => warn!(message = %notification.message, "notify"),
        }
        restart_status_timer(self.token, self.tx);
    }
}

fn restart_status_timer(token: &mut u64, tx: &Sender<InternalEvent>) {
    *token = token.saturating_add(1);
    schedule_status_clear(tx, *token);
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn reload_agents<R: AppRuntime>(runtime: &mut R, list: &mut ListView) {
    match runtime.load_agents() {
        Ok(agents) => {
            list.agents = agents;
            list.error = None;
        }
        Err(error) => {
            warn!(error = %format!("{error:#}"), "load agents");
            list.error = Some(format!("{error:#}"));
        }
    }
    list.selected = list.selected.min(list.agents.len().saturating_sub(1));
}

fn load_detail<R: AppRuntime>(runtime: &mut R, detail: &mut DetailView, id: &AgentId) {
    *detail = match runtime.load_agent(id) {
        Ok(agent) => DetailView {
            agent: Some(agent),
            error: None,
        },
        Err(error) => {
            warn!(agent = %id, error = %format!("{error:#}"), "load agent");
            DetailView {
                agent: None,
                error: Some(format!("{error:#}")),
            }
        }
    };
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
    {
        return true;
    }

    if state.dialog.is_open() {
        handle_dialog_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.filter_editing {
        handle_filter_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    match state.route.clone() {
        Route::AgentList => handle_list_key(state, runtime, view_data, internal_tx, key),
        Route::AgentDetail(id) => {
            handle_detail_key(state, runtime, view_data, internal_tx, key, &id);
            false
        }
        Route::LlmSettings => {
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') => {
                    dispatch(state, runtime, view_data, internal_tx, AppCommand::Back);
                }
                KeyCode::Char('r') => {
                    dispatch(
                        state,
                        runtime,
                        view_data,
                        internal_tx,
                        AppCommand::StartLlmLoad,
                    );
                }
                _ => {}
            }
            false
        }
    }
}

fn handle_list_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('/') => view_data.filter_editing = true,
        KeyCode::Esc if state.filter.is_active() => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::SetFilter(String::new()),
            );
        }
        KeyCode::Char('j') | KeyCode::Down => move_selection(state, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_selection(state, view_data, -1),
        KeyCode::Char('g') | KeyCode::Home => view_data.list.selected = 0,
        KeyCode::Char('G') | KeyCode::End => {
            let count = state.filter.apply(&view_data.list.agents).len();
            view_data.list.selected = count.saturating_sub(1);
        }
        KeyCode::Enter => {
            if let Some(id) = selected_agent_id(state, view_data) {
                dispatch(
                    state,
                    runtime,
                    view_data,
                    internal_tx,
                    AppCommand::Navigate(Route::AgentDetail(id)),
                );
            }
        }
        KeyCode::Char('n') => {
            dispatch(state, runtime, view_data, internal_tx, AppCommand::OpenDialog);
        }
        KeyCode::Char('l') => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::Navigate(Route::LlmSettings),
            );
        }
        KeyCode::Char('r') => {
            reload_agents(runtime, &mut view_data.list);
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::StartLlmLoad,
            );
        }
        _ => {}
    }
    false
}

fn handle_filter_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.filter_editing = false;
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::SetFilter(String::new()),
            );
        }
        KeyCode::Enter => view_data.filter_editing = false,
        KeyCode::Backspace => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::PopFilterChar,
            );
        }
        KeyCode::Char(ch) => {
            dispatch(
                state,
                runtime,
                view_data,
                internal_tx,
                AppCommand::PushFilterChar(ch),
            );
        }
        _ => {}
    }
}

fn handle_detail_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
    id: &AgentId,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('q') => {
            dispatch(state, runtime, view_data, internal_tx, AppCommand::Back);
        }
        KeyCode::Char('r') => load_detail(runtime, &mut view_data.detail, id),
        KeyCode::Char('n') => {
            dispatch(state, runtime, view_data, internal_tx, AppCommand::OpenDialog);
        }
        _ => {}
    }
}

fn handle_dialog_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let field = focused_field(view_data);

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        let command = match key.code {
            KeyCode::Char('r') => Some(AppCommand::StartLlmLoad),
            KeyCode::Char('l') => Some(AppCommand::Navigate(Route::LlmSettings)),
            _ => None,
        };
        if let Some(command) = command {
            dispatch(state, runtime, view_data, internal_tx, command);
        }
        return;
    }

    let command = match key.code {
        KeyCode::Esc => Some(AppCommand::CloseDialog),
        KeyCode::Enter => Some(AppCommand::SubmitDialog),
        KeyCode::Tab | KeyCode::Down => {
            move_field_focus(view_data, 1);
            None
        }
        KeyCode::BackTab | KeyCode::Up => {
            move_field_focus(view_data, -1);
            None
        }
        KeyCode::Char(' ') if field == FormField::IsActive => Some(AppCommand::ToggleActive),
        KeyCode::Left if field == FormField::LlmModel => cycle_model(state, view_data, -1),
        KeyCode::Right if field == FormField::LlmModel => cycle_model(state, view_data, 1),
        KeyCode::Char(ch @ '1'..='9') if field == FormField::LlmModel => {
            let index = ch as usize - '1' as usize;
            view_data
                .options
                .provider
                .model_options()
                .get(index)
                .map(|option| AppCommand::SetField(FormField::LlmModel, option.value.to_owned()))
        }
        KeyCode::Backspace if is_text_field(field) => Some(AppCommand::PopFieldChar(field)),
        KeyCode::Char(ch) if is_text_field(field) => Some(AppCommand::PushFieldChar(field, ch)),
        _ => None,
    };

    if let Some(command) = command {
        dispatch(state, runtime, view_data, internal_tx, command);
    }
}

fn is_text_field(field: FormField) -> bool {
    matches!(field, FormField::Name | FormField::Description)
}

fn focused_field(view_data: &ViewData) -> FormField {
    FormField::ALL[view_data.form.field_index.min(FormField::ALL.len() - 1)]
}

fn move_field_focus(view_data: &mut ViewData, delta: isize) {
    let count = FormField::ALL.len() as isize;
    let next = (view_data.form.field_index as isize + delta).rem_euclid(count);
    view_data.form.field_index = next as usize;
}

fn cycle_model(state: &AppState, view_data: &ViewData, delta: isize) -> Option<AppCommand> {
    let options = view_data.options.provider.model_options();
    if options.is_empty() {
        return None;
    }
    let current = state
        .dialog
        .draft()
        .and_then(|draft| {
            options
                .iter()
                .position(|option| option.value == draft.input.llm_model)
        })
        .map_or(-1, |index| index as isize);
    let next = if current < 0 && delta < 0 {
        options.len() as isize - 1
    } else {
        (current + delta).rem_euclid(options.len() as isize)
    };
    Some(AppCommand::SetField(
        FormField::LlmModel,
        options[next as usize].value.to_owned(),
    ))
}

fn move_selection(state: &AppState, view_data: &mut ViewData, delta: isize) {
    let count = state.filter.apply(&view_data.list.agents).len();
    if count == 0 {
        view_data.list.selected = 0;
        return;
    }
    let next = (view_data.list.selected as isize + delta).clamp(0, count as isize - 1);
    view_data.list.selected = next as usize;
}

fn selected_agent_id(state: &AppState, view_data: &ViewData) -> Option<AgentId> {
    state
        .filter
        .apply(&view_data.list.agents)
        .get(view_data.list.selected)
        .map(|agent| agent.id.clone())
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    let header = Paragraph::new(state.route.path())
        .block(Block::default().title("agentdesk").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    match &state.route {
        Route::AgentList => render_agent_list(frame, layout[1], state, view_data),
        Route::AgentDetail(id) => {
            let body = Paragraph::new(render_detail_text(id, &view_data.detail))
                .wrap(Wrap { trim: false })
                .block(Block::default().title("agent").borders(Borders::ALL));
            frame.render_widget(body, layout[1]);
        }
        Route::LlmSettings => {
            let body = Paragraph::new(render_llm_settings_text(&state.llms))
                .block(Block::default().title("LLMs").borders(Borders::ALL));
            frame.render_widget(body, layout[1]);
        }
    }

    let status_color = match state.status_line.as_ref().map(|status| status.severity) {
        Some(Severity::Error) => Color::Red,
        _ => Color::Yellow,
    };
    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(status_color))
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(status, layout[2]);

    if state.dialog.is_open() {
        let area = centered_rect(64, 72, frame.area());
        frame.render_widget(Clear, area);
        let dialog = Paragraph::new(render_dialog_text(state, view_data))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("new agent")
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Cyan)),
            );
        frame.render_widget(dialog, area);
    }
}

fn render_agent_list(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    state: &AppState,
    view_data: &ViewData,
) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let filter = Paragraph::new(filter_bar_text(state, view_data))
        .block(Block::default().title("filter").borders(Borders::ALL));
    frame.render_widget(filter, sections[0]);

    let header = Row::new(TABLE_COLUMNS.iter().map(|label| {
        Cell::from(*label).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let has_matches = !state.filter.apply(&view_data.list.agents).is_empty();
    let rows = list_rows(state, view_data)
        .into_iter()
        .enumerate()
        .map(|(index, cells)| {
            let mut style = Style::default();
            if !has_matches {
                style = style.fg(Color::DarkGray);
            } else if index == view_data.list.selected {
                style = style
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD);
            }
            Row::new(cells.into_iter().map(Cell::from)).style(style)
        });
    let widths = [
        Constraint::Percentage(20),
        Constraint::Percentage(40),
        Constraint::Length(6),
        Constraint::Percentage(20),
        Constraint::Length(10),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(list_title(state, view_data))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, sections[1]);
}

fn filter_bar_text(state: &AppState, view_data: &ViewData) -> String {
    let query = state.filter.query();
    if view_data.filter_editing {
        format!("/{query}_")
    } else if query.is_empty() {
        "Filter names... (press /)".to_owned()
    } else {
        format!("/{query}")
    }
}

fn list_title(state: &AppState, view_data: &ViewData) -> String {
    let total = view_data.list.agents.len();
    if let Some(error) = &view_data.list.error {
        return format!("agents (load failed: {error})");
    }
    if state.filter.is_active() {
        let shown = state.filter.apply(&view_data.list.agents).len();
        format!("agents ({shown}/{total})")
    } else {
        format!("agents ({total})")
    }
}

/// Rows as displayed, with a single placeholder row when nothing matches.
fn list_rows(state: &AppState, view_data: &ViewData) -> Vec<Vec<String>> {
    let rows = state
        .filter
        .apply(&view_data.list.agents)
        .into_iter()
        .map(|agent| {
            vec![
                agent.name.clone(),
                agent.description.clone(),
                active_label(agent.is_active).to_owned(),
                agent.llm_model.clone(),
                format_created(agent.created_at),
            ]
        })
        .collect::<Vec<_>>();
    if rows.is_empty() {
        return vec![vec![NO_RESULTS.to_owned()]];
    }
    rows
}

fn active_label(is_active: bool) -> &'static str {
    if is_active { "yes" } else { "no" }
}

fn format_created(value: Option<OffsetDateTime>) -> String {
    value
        .and_then(|value| value.format(&format_description!("[year]-[month]-[day]")).ok())
        .unwrap_or_default()
}

fn render_detail_text(id: &AgentId, detail: &DetailView) -> String {
    if let Some(error) = &detail.error {
        return format!("could not load agent {id}: {error}\n\nr retry | esc back");
    }
    let Some(agent) = &detail.agent else {
        return format!("loading agent {id}...");
    };
    [
        format!("name: {}", agent.name),
        format!("description: {}", agent.description),
        format!("active: {}", active_label(agent.is_active)),
        format!("model: {}", agent.llm_model),
        format!("prompt: {}", agent.prompt.as_deref().unwrap_or("(none)")),
        format!("created: {}", format_created(agent.created_at)),
        format!("updated: {}", format_created(agent.updated_at)),
    ]
    .join("\n")
}

fn render_llm_settings_text(llms: &LlmOptions) -> String {
    let mut lines = match llms {
        LlmOptions::Loaded(llms) if !llms.is_empty() => {
            llms.iter().map(Llm::title).collect::<Vec<_>>()
        }
        _ => llms.banner().into_iter().collect(),
    };
    lines.push(String::new());
    lines.push("r reload | esc back".to_owned());
    lines.join("\n")
}

fn render_dialog_text(state: &AppState, view_data: &ViewData) -> String {
    let Some(draft) = state.dialog.draft() else {
        return String::new();
    };
    let provider = view_data.options.provider;
    let focused = focused_field(view_data);

    let mut lines = vec!["Create a new agent".to_owned(), String::new()];
    if let Some(banner) = state.llms.banner() {
        lines.push(banner);
        match &state.llms {
            LlmOptions::Loaded(_) => lines.push("ctrl+l configure a LLM".to_owned()),
            LlmOptions::Failed(_) => lines.push("ctrl+r retry".to_owned()),
            LlmOptions::Loading => {}
        }
        lines.push(String::new());
    }

    for field in FormField::ALL {
        let cursor = if field == focused { ">" } else { " " };
        let value = match field {
            FormField::Name => text_or_placeholder(&draft.input.name, field),
            FormField::Description => text_or_placeholder(&draft.input.description, field),
            FormField::IsActive => {
                if draft.input.is_active {
                    "[x]".to_owned()
                } else {
                    "[ ]".to_owned()
                }
            }
            FormField::LlmModel => model_title(provider, &draft.input.llm_model),
        };
        lines.push(format!("{cursor} {}: {value}", field.label()));
        if let Some(error) = draft.errors.get(field) {
            lines.push(format!("    ! {error}"));
        }
        if field == FormField::LlmModel && field == focused {
            for (index, option) in provider.model_options().iter().enumerate() {
                let mark = if option.value == draft.input.llm_model {
                    "*"
                } else {
                    " "
                };
                lines.push(format!("   {mark} {} {}", index + 1, option.title));
            }
        }
    }
    lines.push(format!(
        "  Make sure you have access to these models in your {} account",
        provider.label()
    ));

    if let Some(error) = &draft.submit_error {
        lines.push(String::new());
        lines.push(format!("error: {error}"));
    }

    lines.push(String::new());
    if state.dialog.is_submitting() {
        let frame = SPINNER_FRAMES[view_data.tick % SPINNER_FRAMES.len()];
        lines.push(format!("{frame} creating..."));
    } else {
        lines.push("enter create | esc cancel".to_owned());
    }
    lines.join("\n")
}

fn text_or_placeholder(value: &str, field: FormField) -> String {
    if value.is_empty() {
        format!("({})", field.placeholder())
    } else {
        value.to_owned()
    }
}

fn model_title(provider: LlmProvider, value: &str) -> String {
    if value.is_empty() {
        return format!("({})", FormField::LlmModel.placeholder());
    }
    provider
        .model_options()
        .iter()
        .find(|option| option.value == value)
        .map_or_else(|| value.to_owned(), |option| option.title.to_owned())
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let hints = if state.dialog.is_open() {
        "tab field | space toggle | ←/→ 1-9 model | ctrl+r reload LLMs | ctrl+q"
    } else if view_data.filter_editing {
        "type to filter | enter keep | esc clear"
    } else {
        match state.route {
            Route::AgentList => "j/k move | enter open | / filter | n new | l LLMs | r reload | q",
            Route::AgentDetail(_) => "esc back | r reload | n new",
            Route::LlmSettings => "esc back | r reload",
        }
    };
    match &state.status_line {
        Some(status) => format!("{} | {hints}", status.message),
        None => hints.to_owned(),
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, NO_RESULTS, UiOptions, ViewData, handle_key_event, list_rows,
        process_internal_events, render_dialog_text, render_llm_settings_text, start_session,
        status_text,
    };
    use agentdesk_app::{
        AGENT_CREATED_MESSAGE, Agent, AgentId, AppState, DialogState, Llm, LlmOptions, LlmProvider,
        Notification, Route, Severity, SubmitPlan,
    };
    use agentdesk_testkit::{agent, llm};
    use anyhow::anyhow;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Debug, Default)]
    struct TestRuntime {
        agents: Vec<Agent>,
        llms: Vec<Llm>,
        llm_error: Option<String>,
        submit_error: Option<String>,
        submitted: Vec<SubmitPlan>,
        list_loads: usize,
        detail_loads: Vec<AgentId>,
        cancelled: Vec<u64>,
    }

    impl AppRuntime for TestRuntime {
        fn load_agents(&mut self) -> anyhow::Result<Vec<Agent>> {
            self.list_loads += 1;
            Ok(self.agents.clone())
        }

        fn load_agent(&mut self, id: &AgentId) -> anyhow::Result<Agent> {
            self.detail_loads.push(id.clone());
            self.agents
                .iter()
                .find(|agent| &agent.id == id)
                .cloned()
                .ok_or_else(|| anyhow!("agent {id} not found"))
        }

        fn load_llms(&mut self) -> anyhow::Result<Vec<Llm>> {
            match &self.llm_error {
                Some(error) => Err(anyhow!("{error}")),
                None => Ok(self.llms.clone()),
            }
        }

        fn submit_agent(&mut self, plan: &SubmitPlan) -> anyhow::Result<Agent> {
            self.submitted.push(plan.clone());
            if let Some(error) = &self.submit_error {
                return Err(anyhow!("{error}"));
            }
            let created = Agent {
                name: plan.agent.name.clone(),
                description: plan.agent.description.clone(),
                is_active: plan.agent.is_active,
                llm_model: plan.agent.llm_model.clone(),
                ..agent("a-new", &plan.agent.name)
            };
            self.agents.push(created.clone());
            Ok(created)
        }

        fn cancel_llm_load(&mut self, request_id: u64) -> anyhow::Result<()> {
            self.cancelled.push(request_id);
            Ok(())
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn start(runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            let mut harness = Self {
                state: AppState::default(),
                runtime,
                view_data: ViewData::default(),
                tx,
                rx,
            };
            start_session(
                &mut harness.state,
                &mut harness.runtime,
                &mut harness.view_data,
                &harness.tx,
            );
            harness.pump();
            harness
        }

        fn pump(&mut self) {
            process_internal_events(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn key(&mut self, key: KeyEvent) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                key,
            );
            self.pump();
            quit
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.key(KeyEvent::new(code, KeyModifiers::NONE))
        }

        fn ctrl(&mut self, ch: char) -> bool {
            self.key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL))
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }

        fn dialog_text(&self) -> String {
            render_dialog_text(&self.state, &self.view_data)
        }
    }

    fn runtime_with_agents() -> TestRuntime {
        TestRuntime {
            agents: vec![
                agent("a-1", "Support bot"),
                agent("a-2", "Docs helper"),
                agent("a-3", "SUPPORT escalations"),
            ],
            llms: vec![llm("m1")],
            ..TestRuntime::default()
        }
    }

    #[test]
    fn startup_loads_agents_and_llms() {
        let harness = Harness::start(runtime_with_agents());
        assert_eq!(harness.runtime.list_loads, 1);
        assert_eq!(harness.view_data.list.agents.len(), 3);
        assert_eq!(harness.state.llms, LlmOptions::Loaded(vec![llm("m1")]));
        assert_eq!(harness.state.llm_request, None);
    }

    #[test]
    fn slash_filter_narrows_rows_case_insensitively() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('/'));
        harness.type_text("support");

        let names = list_rows(&harness.state, &harness.view_data)
            .into_iter()
            .map(|row| row[0].clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["Support bot", "SUPPORT escalations"]);

        harness.press(KeyCode::Enter);
        assert!(!harness.view_data.filter_editing);
        assert_eq!(harness.state.filter.query(), "support");

        harness.press(KeyCode::Char('/'));
        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.filter.query(), "");
        assert_eq!(list_rows(&harness.state, &harness.view_data).len(), 3);
    }

    #[test]
    fn unmatched_filter_shows_no_results_row() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('/'));
        harness.type_text("zzz");
        assert_eq!(
            list_rows(&harness.state, &harness.view_data),
            vec![vec![NO_RESULTS.to_owned()]]
        );
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Enter);
        assert_eq!(harness.state.route, Route::AgentList);
    }

    #[test]
    fn enter_opens_selected_agent_and_esc_returns() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('j'));
        harness.press(KeyCode::Enter);

        assert_eq!(
            harness.state.route,
            Route::AgentDetail(AgentId::new("a-2"))
        );
        assert_eq!(harness.runtime.detail_loads, vec![AgentId::new("a-2")]);
        assert_eq!(
            harness
                .view_data
                .detail
                .agent
                .as_ref()
                .map(|agent| agent.name.as_str()),
            Some("Docs helper")
        );

        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.route, Route::AgentList);
    }

    #[test]
    fn create_flow_submits_and_lands_on_new_agent() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('n'));
        assert!(harness.state.dialog.is_open());

        harness.type_text("Helper");
        harness.press(KeyCode::Tab);
        harness.type_text("does things");
        harness.press(KeyCode::Enter);

        assert_eq!(harness.runtime.submitted.len(), 1);
        let plan = &harness.runtime.submitted[0];
        assert_eq!(plan.agent.name, "Helper");
        assert_eq!(plan.agent.description, "does things");
        assert_eq!(plan.llm_id.as_str(), "m1");

        assert_eq!(harness.state.dialog, DialogState::Closed);
        assert_eq!(
            harness.state.route,
            Route::AgentDetail(AgentId::new("a-new"))
        );
        assert_eq!(harness.runtime.list_loads, 2);
        assert_eq!(harness.runtime.detail_loads, vec![AgentId::new("a-new")]);
        assert_eq!(
            harness.state.status_line,
            Some(Notification::info(AGENT_CREATED_MESSAGE))
        );
    }

    #[test]
    fn failed_create_keeps_dialog_and_shows_error() {
        let mut harness = Harness::start(TestRuntime {
            submit_error: Some("quota exceeded".to_owned()),
            ..runtime_with_agents()
        });
        harness.press(KeyCode::Char('n'));
        harness.type_text("Helper");
        harness.press(KeyCode::Tab);
        harness.type_text("d");
        harness.press(KeyCode::Enter);

        assert!(matches!(harness.state.dialog, DialogState::Open(_)));
        assert_eq!(harness.state.route, Route::AgentList);
        let status = harness.state.status_line.clone().expect("status expected");
        assert_eq!(status.severity, Severity::Error);
        assert_eq!(status.message, "quota exceeded");
        let text = harness.dialog_text();
        assert!(text.contains("error: quota exceeded"));
        assert!(text.contains("Name: Helper"));
    }

    #[test]
    fn empty_submit_shows_field_errors_without_calling_runtime() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('n'));
        harness.press(KeyCode::Enter);

        assert!(harness.runtime.submitted.is_empty());
        let text = harness.dialog_text();
        assert!(text.contains("Name is required"));
        assert!(text.contains("Description is required"));
        assert!(status_text(&harness.state, &harness.view_data).contains("form invalid"));
    }

    #[test]
    fn missing_llms_block_submit_and_offer_settings_shortcut() {
        let mut harness = Harness::start(TestRuntime {
            llms: Vec::new(),
            ..runtime_with_agents()
        });
        harness.press(KeyCode::Char('n'));
        harness.type_text("Helper");
        harness.press(KeyCode::Tab);
        harness.type_text("d");
        harness.press(KeyCode::Enter);

        assert!(harness.runtime.submitted.is_empty());
        assert!(
            harness
                .dialog_text()
                .contains("Heads up! You haven't configured a LLM.")
        );

        harness.ctrl('l');
        assert_eq!(harness.state.route, Route::LlmSettings);
        assert_eq!(harness.state.dialog, DialogState::Closed);
        assert!(render_llm_settings_text(&harness.state.llms).contains("Heads up!"));
    }

    #[test]
    fn failed_llm_load_can_be_retried_from_dialog() {
        let mut harness = Harness::start(TestRuntime {
            llm_error: Some("connection refused".to_owned()),
            ..runtime_with_agents()
        });
        harness.press(KeyCode::Char('n'));
        assert!(
            harness
                .dialog_text()
                .contains("Could not load LLMs: connection refused")
        );

        harness.runtime.llm_error = None;
        harness.ctrl('r');
        assert_eq!(harness.state.llms, LlmOptions::Loaded(vec![llm("m1")]));
        assert!(harness.state.dialog.is_open());
    }

    #[test]
    fn model_field_cycles_and_picks_from_catalog() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('n'));
        for _ in 0..3 {
            harness.press(KeyCode::Tab);
        }

        let options = LlmProvider::OpenAi.model_options();
        harness.press(KeyCode::Right);
        let draft = harness.state.dialog.draft().expect("open");
        assert_eq!(draft.input.llm_model, options[1].value);

        harness.press(KeyCode::Char('4'));
        let draft = harness.state.dialog.draft().expect("open");
        assert_eq!(draft.input.llm_model, options[3].value);
        assert!(harness.dialog_text().contains(&format!("* 4 {}", options[3].title)));

        harness.press(KeyCode::Left);
        harness.press(KeyCode::Left);
        let draft = harness.state.dialog.draft().expect("open");
        assert_eq!(draft.input.llm_model, options[1].value);
    }

    #[test]
    fn space_toggles_active_only_on_active_field() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('n'));
        harness.type_text("a b");
        let draft = harness.state.dialog.draft().expect("open");
        assert_eq!(draft.input.name, "a b");
        assert!(draft.input.is_active);

        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Char(' '));
        let draft = harness.state.dialog.draft().expect("open");
        assert!(!draft.input.is_active);
        assert!(harness.dialog_text().contains("> Active: [ ]"));
    }

    #[test]
    fn reopening_dialog_starts_from_defaults() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('n'));
        harness.type_text("draft");
        harness.press(KeyCode::Tab);
        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.dialog, DialogState::Closed);

        harness.press(KeyCode::Char('n'));
        let draft = harness.state.dialog.draft().expect("open");
        assert!(draft.input.name.is_empty());
        assert_eq!(harness.view_data.form.field_index, 0);
    }

    #[test]
    fn configured_default_model_is_preselected() {
        let (tx, rx) = mpsc::channel();
        let mut harness = Harness {
            state: AppState::default(),
            runtime: runtime_with_agents(),
            view_data: ViewData {
                options: UiOptions {
                    provider: LlmProvider::OpenAi,
                    default_model: Some("GPT_4_0613".to_owned()),
                },
                ..ViewData::default()
            },
            tx,
            rx,
        };
        harness.press(KeyCode::Char('n'));
        let draft = harness.state.dialog.draft().expect("open");
        assert_eq!(draft.input.llm_model, "GPT_4_0613");
    }

    #[test]
    fn stale_status_clear_is_ignored() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('n'));
        harness.press(KeyCode::Enter);
        assert!(harness.state.status_line.is_some());

        let current = harness.view_data.status_token;
        harness
            .tx
            .send(InternalEvent::ClearStatus {
                token: current.saturating_sub(1),
            })
            .expect("send");
        harness.pump();
        assert!(harness.state.status_line.is_some());

        harness
            .tx
            .send(InternalEvent::ClearStatus { token: current })
            .expect("send");
        harness.pump();
        assert!(harness.state.status_line.is_none());
    }

    #[test]
    fn quit_keys_end_session() {
        let mut harness = Harness::start(runtime_with_agents());
        assert!(harness.ctrl('q'));
        assert!(harness.press(KeyCode::Char('q')));

        harness.press(KeyCode::Char('n'));
        assert!(!harness.press(KeyCode::Char('q')));
        let draft = harness.state.dialog.draft().expect("open");
        assert_eq!(draft.input.name, "q");
    }

    #[test]
    fn dialog_text_shows_provider_hint_and_placeholders() {
        let mut harness = Harness::start(runtime_with_agents());
        harness.press(KeyCode::Char('n'));
        let text = harness.dialog_text();
        assert!(text.contains("> Name: (E.g My agent)"));
        assert!(text.contains("Make sure you have access to these models in your OpenAI account"));
        assert!(text.contains("Model: gpt-3.5-turbo-16k-0613"));
        assert!(text.contains("enter create | esc cancel"));
    }
}
