// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, info, warn};

use crate::{
    AgentFormInput, AgentId, FieldErrors, FormField, Llm, LlmId, LlmOptions, NewAgent,
    Notification, Route, RowFilter,
};

pub const AGENT_CREATED_MESSAGE: &str = "New agent created!";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DraftState {
    pub input: AgentFormInput,
    pub errors: FieldErrors,
    pub submit_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DialogState {
    #[default]
    Closed,
    Open(DraftState),
    Submitting(DraftState),
}

impl DialogState {
    pub fn draft(&self) -> Option<&DraftState> {
        match self {
            Self::Closed => None,
            Self::Open(draft) | Self::Submitting(draft) => Some(draft),
        }
    }

    pub const fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }

    pub const fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting(_))
    }
}

/// Everything the two creation calls need, captured when submission starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitPlan {
    pub agent: NewAgent,
    pub llm_id: LlmId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBlock {
    DialogClosed,
    InFlight,
    NoLlms,
}

impl SubmitBlock {
    pub const fn message(self) -> &'static str {
        match self {
            Self::DialogClosed => "no form open",
            Self::InFlight => "agent creation already in progress",
            Self::NoLlms => "configure a LLM before creating agents",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub route: Route,
    pub filter: RowFilter,
    pub llms: LlmOptions,
    pub llm_request: Option<u64>,
    pub dialog: DialogState,
    pub status_line: Option<Notification>,
    next_request_id: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            route: Route::AgentList,
            filter: RowFilter::default(),
            llms: LlmOptions::Loading,
            llm_request: None,
            dialog: DialogState::Closed,
            status_line: None,
            next_request_id: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    SetFilter(String),
    PushFilterChar(char),
    PopFilterChar,
    StartLlmLoad,
    CancelLlmLoad,
    LlmsLoaded {
        request_id: u64,
        result: Result<Vec<Llm>, String>,
    },
    OpenDialog,
    CloseDialog,
    SetField(FormField, String),
    PushFieldChar(FormField, char),
    PopFieldChar(FormField),
    ToggleActive,
    SubmitDialog,
    SubmitFinished(Result<AgentId, String>),
    Navigate(Route),
    Back,
    SetStatus(Notification),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    FilterChanged(String),
    LlmLoadRequested {
        request_id: u64,
        superseded: Option<u64>,
    },
    LlmLoadCancelled {
        request_id: u64,
    },
    LlmsUpdated,
    StaleLlmLoadIgnored {
        request_id: u64,
    },
    DialogOpened,
    DialogClosed,
    DraftChanged(FormField),
    ValidationFailed(FieldErrors),
    SubmitBlocked(SubmitBlock),
    SubmitRequested(SubmitPlan),
    Notified(Notification),
    RefreshRequested,
    Navigated(Route),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::SetFilter(query) => {
                self.filter.set_query(query);
                vec![AppEvent::FilterChanged(self.filter.query().to_owned())]
            }
            AppCommand::PushFilterChar(ch) => {
                self.filter.push_char(ch);
                vec![AppEvent::FilterChanged(self.filter.query().to_owned())]
            }
            AppCommand::PopFilterChar => {
                if self.filter.pop_char() {
                    vec![AppEvent::FilterChanged(self.filter.query().to_owned())]
                } else {
                    Vec::new()
                }
            }
            AppCommand::StartLlmLoad => {
                let superseded = self.llm_request.take();
                let request_id = self.next_request_id();
                self.llm_request = Some(request_id);
                self.llms = LlmOptions::Loading;
                debug!(request_id, ?superseded, "llm load requested");
                vec![AppEvent::LlmLoadRequested {
                    request_id,
                    superseded,
                }]
            }
            AppCommand::CancelLlmLoad => match self.llm_request.take() {
                Some(request_id) => vec![AppEvent::LlmLoadCancelled { request_id }],
                None => Vec::new(),
            },
            AppCommand::LlmsLoaded { request_id, result } => {
                self.apply_llm_result(request_id, result)
            }
            AppCommand::OpenDialog => {
                if self.dialog.is_open() {
                    return Vec::new();
                }
                self.dialog = DialogState::Open(DraftState::default());
                vec![AppEvent::DialogOpened]
            }
            AppCommand::CloseDialog => match self.dialog {
                DialogState::Closed => Vec::new(),
                DialogState::Submitting(_) => {
                    vec![self.set_status(SubmitBlock::InFlight.message())]
                }
                DialogState::Open(_) => {
                    self.dialog = DialogState::Closed;
                    vec![AppEvent::DialogClosed]
                }
            },
            AppCommand::SetField(field, value) => self.edit_draft(field, |input| {
                if let Some(text) = input.text_mut(field) {
                    *text = value;
                }
            }),
            AppCommand::PushFieldChar(field, ch) => self.edit_draft(field, |input| {
                if let Some(text) = input.text_mut(field) {
                    text.push(ch);
                }
            }),
            AppCommand::PopFieldChar(field) => self.edit_draft(field, |input| {
                if let Some(text) = input.text_mut(field) {
                    text.pop();
                }
            }),
            AppCommand::ToggleActive => self.edit_draft(FormField::IsActive, |input| {
                input.is_active = !input.is_active;
            }),
            AppCommand::SubmitDialog => self.begin_submit(),
            AppCommand::SubmitFinished(result) => self.finish_submit(result),
            AppCommand::Navigate(route) => self.navigate(route),
            AppCommand::Back => {
                if self.route == Route::AgentList {
                    return Vec::new();
                }
                self.navigate(Route::AgentList)
            }
            AppCommand::SetStatus(notification) => {
                let message = notification.message.clone();
                self.status_line = Some(notification);
                vec![AppEvent::StatusUpdated(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn next_request_id(&mut self) -> u64 {
        self.next_request_id = self.next_request_id.saturating_add(1);
        if self.next_request_id == 0 {
            self.next_request_id = 1;
        }
        self.next_request_id
    }

    fn apply_llm_result(
        &mut self,
        request_id: u64,
        result: Result<Vec<Llm>, String>,
    ) -> Vec<AppEvent> {
        if self.llm_request != Some(request_id) {
            debug!(request_id, "ignoring stale llm load");
            return vec![AppEvent::StaleLlmLoadIgnored { request_id }];
        }
        self.llm_request = None;
        self.llms = match result {
            Ok(llms) => {
                info!(count = llms.len(), "llms loaded");
                LlmOptions::Loaded(llms)
            }
            Err(error) => {
                warn!(%error, "llm load failed");
                LlmOptions::Failed(error)
            }
        };
        vec![AppEvent::LlmsUpdated]
    }

    fn edit_draft(
        &mut self,
        field: FormField,
        edit: impl FnOnce(&mut AgentFormInput),
    ) -> Vec<AppEvent> {
        let DialogState::Open(draft) = &mut self.dialog else {
            return Vec::new();
        };
        edit(&mut draft.input);
        // Stale messages would point at text the user already fixed.
        if draft.errors.get(field).is_some() {
            draft.errors = draft.input.validate().err().unwrap_or_default();
        }
        vec![AppEvent::DraftChanged(field)]
    }

    fn begin_submit(&mut self) -> Vec<AppEvent> {
        let draft = match &mut self.dialog {
            DialogState::Closed => {
                return vec![AppEvent::SubmitBlocked(SubmitBlock::DialogClosed)];
            }
            DialogState::Submitting(_) => {
                return vec![AppEvent::SubmitBlocked(SubmitBlock::InFlight)];
            }
            DialogState::Open(draft) => draft,
        };

        let Some(llm) = self.llms.association_target() else {
            return vec![AppEvent::SubmitBlocked(SubmitBlock::NoLlms)];
        };

        let agent = match draft.input.to_new_agent() {
            Ok(agent) => agent,
            Err(errors) => {
                draft.errors = errors.clone();
                return vec![AppEvent::ValidationFailed(errors)];
            }
        };

        let plan = SubmitPlan {
            agent,
            llm_id: llm.id.clone(),
        };
        draft.errors = FieldErrors::default();
        draft.submit_error = None;
        let draft = std::mem::take(draft);
        self.dialog = DialogState::Submitting(draft);
        info!(name = %plan.agent.name, llm = %plan.llm_id, "agent submission started");
        vec![AppEvent::SubmitRequested(plan)]
    }

    fn finish_submit(&mut self, result: Result<AgentId, String>) -> Vec<AppEvent> {
        let DialogState::Submitting(draft) = &mut self.dialog else {
            debug!("submission result arrived without a pending submission");
            return Vec::new();
        };

        match result {
            Ok(agent_id) => {
                self.dialog = DialogState::Closed;
                let notification = Notification::info(AGENT_CREATED_MESSAGE);
                self.status_line = Some(notification.clone());
                let route = Route::AgentDetail(agent_id);
                self.route = route.clone();
                vec![
                    AppEvent::DialogClosed,
                    AppEvent::Notified(notification),
                    AppEvent::RefreshRequested,
                    AppEvent::Navigated(route),
                ]
            }
            Err(error) => {
                warn!(%error, "agent submission failed");
                draft.submit_error = Some(error.clone());
                let draft = std::mem::take(draft);
                self.dialog = DialogState::Open(draft);
                let notification = Notification::error(error);
                self.status_line = Some(notification.clone());
                vec![AppEvent::Notified(notification)]
            }
        }
    }

    fn navigate(&mut self, route: Route) -> Vec<AppEvent> {
        let mut events = Vec::new();
        match self.dialog {
            DialogState::Submitting(_) => {
                return vec![self.set_status(SubmitBlock::InFlight.message())];
            }
            DialogState::Open(_) => {
                self.dialog = DialogState::Closed;
                events.push(AppEvent::DialogClosed);
            }
            DialogState::Closed => {}
        }
        self.route = route.clone();
        events.push(AppEvent::Navigated(route));
        events
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(Notification::info(message));
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AGENT_CREATED_MESSAGE, AppCommand, AppEvent, AppState, DialogState, SubmitBlock};
    use crate::{
        AgentFormInput, AgentId, DEFAULT_LLM_MODEL, FormField, Llm, LlmId, LlmOptions,
        LlmProvider, Notification, Route,
    };

    fn llm(id: &str) -> Llm {
        Llm {
            id: LlmId::new(id),
            provider: LlmProvider::OpenAi,
        }
    }

    fn loaded_state() -> AppState {
        AppState {
            llms: LlmOptions::Loaded(vec![llm("m1")]),
            ..AppState::default()
        }
    }

    fn fill_valid_draft(state: &mut AppState) {
        state.dispatch(AppCommand::OpenDialog);
        state.dispatch(AppCommand::SetField(FormField::Name, "A".to_owned()));
        state.dispatch(AppCommand::SetField(FormField::Description, "d".to_owned()));
        state.dispatch(AppCommand::SetField(FormField::LlmModel, "m1".to_owned()));
    }

    #[test]
    fn open_dialog_starts_with_defaults() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::OpenDialog);
        assert_eq!(events, vec![AppEvent::DialogOpened]);
        let draft = state.dialog.draft().expect("dialog should be open");
        assert_eq!(draft.input, AgentFormInput::default());
        assert_eq!(draft.input.llm_model, DEFAULT_LLM_MODEL);
    }

    #[test]
    fn close_and_reopen_resets_draft() {
        let mut state = loaded_state();
        fill_valid_draft(&mut state);
        state.dispatch(AppCommand::ToggleActive);

        assert_eq!(
            state.dispatch(AppCommand::CloseDialog),
            vec![AppEvent::DialogClosed]
        );
        state.dispatch(AppCommand::OpenDialog);

        let draft = state.dialog.draft().expect("dialog should be open");
        assert_eq!(draft.input, AgentFormInput::default());
    }

    #[test]
    fn invalid_draft_reports_field_errors_without_plan() {
        let mut state = loaded_state();
        state.dispatch(AppCommand::OpenDialog);

        let events = state.dispatch(AppCommand::SubmitDialog);
        let [AppEvent::ValidationFailed(errors)] = events.as_slice() else {
            panic!("expected validation failure, got {events:?}");
        };
        assert_eq!(errors.get(FormField::Name), Some("Name is required"));
        assert!(matches!(state.dialog, DialogState::Open(_)));
    }

    #[test]
    fn editing_a_flagged_field_clears_its_error() {
        let mut state = loaded_state();
        state.dispatch(AppCommand::OpenDialog);
        state.dispatch(AppCommand::SubmitDialog);
        state.dispatch(AppCommand::PushFieldChar(FormField::Name, 'x'));

        let draft = state.dialog.draft().expect("open");
        assert_eq!(draft.errors.get(FormField::Name), None);
        assert!(draft.errors.get(FormField::Description).is_some());
    }

    #[test]
    fn submit_is_blocked_without_llms_even_when_valid() {
        for llms in [
            LlmOptions::Loading,
            LlmOptions::Loaded(Vec::new()),
            LlmOptions::Failed("down".to_owned()),
        ] {
            let mut state = AppState {
                llms,
                ..AppState::default()
            };
            fill_valid_draft(&mut state);
            assert_eq!(
                state.dispatch(AppCommand::SubmitDialog),
                vec![AppEvent::SubmitBlocked(SubmitBlock::NoLlms)]
            );
        }
    }

    #[test]
    fn submit_moves_to_submitting_and_blocks_second_submit() {
        let mut state = loaded_state();
        fill_valid_draft(&mut state);

        let events = state.dispatch(AppCommand::SubmitDialog);
        let [AppEvent::SubmitRequested(plan)] = events.as_slice() else {
            panic!("expected submit plan, got {events:?}");
        };
        assert_eq!(plan.agent.name, "A");
        assert_eq!(plan.llm_id, LlmId::new("m1"));
        assert!(state.dialog.is_submitting());

        assert_eq!(
            state.dispatch(AppCommand::SubmitDialog),
            vec![AppEvent::SubmitBlocked(SubmitBlock::InFlight)]
        );
        assert_eq!(
            state.dispatch(AppCommand::PushFieldChar(FormField::Name, 'x')),
            Vec::new()
        );
    }

    #[test]
    fn close_is_refused_while_submitting() {
        let mut state = loaded_state();
        fill_valid_draft(&mut state);
        state.dispatch(AppCommand::SubmitDialog);

        let events = state.dispatch(AppCommand::CloseDialog);
        assert_eq!(
            events,
            vec![AppEvent::StatusUpdated(
                SubmitBlock::InFlight.message().to_owned()
            )]
        );
        assert!(state.dialog.is_submitting());
    }

    #[test]
    fn successful_submit_notifies_refreshes_and_navigates() {
        let mut state = loaded_state();
        fill_valid_draft(&mut state);
        state.dispatch(AppCommand::SubmitDialog);

        let events = state.dispatch(AppCommand::SubmitFinished(Ok(AgentId::new("a-42"))));
        let route = Route::AgentDetail(AgentId::new("a-42"));
        assert_eq!(
            events,
            vec![
                AppEvent::DialogClosed,
                AppEvent::Notified(Notification::info(AGENT_CREATED_MESSAGE)),
                AppEvent::RefreshRequested,
                AppEvent::Navigated(route.clone()),
            ]
        );
        assert_eq!(state.route, route);
        assert_eq!(state.dialog, DialogState::Closed);
    }

    #[test]
    fn failed_submit_keeps_draft_and_reports_message() {
        let mut state = loaded_state();
        fill_valid_draft(&mut state);
        state.dispatch(AppCommand::SubmitDialog);

        let events =
            state.dispatch(AppCommand::SubmitFinished(Err("quota exceeded".to_owned())));
        assert_eq!(
            events,
            vec![AppEvent::Notified(Notification::error("quota exceeded"))]
        );
        assert_eq!(state.route, Route::AgentList);
        let DialogState::Open(draft) = &state.dialog else {
            panic!("dialog should reopen");
        };
        assert_eq!(draft.input.name, "A");
        assert_eq!(draft.input.description, "d");
        assert_eq!(draft.submit_error.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn stray_submit_result_is_ignored() {
        let mut state = loaded_state();
        let events = state.dispatch(AppCommand::SubmitFinished(Ok(AgentId::new("a-1"))));
        assert!(events.is_empty());
        assert_eq!(state.route, Route::AgentList);
    }

    #[test]
    fn stale_llm_load_is_ignored() {
        let mut state = AppState::default();
        let first = state.dispatch(AppCommand::StartLlmLoad);
        let second = state.dispatch(AppCommand::StartLlmLoad);
        assert_eq!(
            first,
            vec![AppEvent::LlmLoadRequested {
                request_id: 1,
                superseded: None
            }]
        );
        assert_eq!(
            second,
            vec![AppEvent::LlmLoadRequested {
                request_id: 2,
                superseded: Some(1)
            }]
        );

        let stale = state.dispatch(AppCommand::LlmsLoaded {
            request_id: 1,
            result: Ok(vec![llm("old")]),
        });
        assert_eq!(stale, vec![AppEvent::StaleLlmLoadIgnored { request_id: 1 }]);
        assert_eq!(state.llms, LlmOptions::Loading);

        state.dispatch(AppCommand::LlmsLoaded {
            request_id: 2,
            result: Ok(vec![llm("m1")]),
        });
        assert_eq!(state.llms, LlmOptions::Loaded(vec![llm("m1")]));
        assert_eq!(state.llm_request, None);
    }

    #[test]
    fn cancelled_llm_load_does_not_update_state() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::StartLlmLoad);
        assert_eq!(
            state.dispatch(AppCommand::CancelLlmLoad),
            vec![AppEvent::LlmLoadCancelled { request_id: 1 }]
        );
        state.dispatch(AppCommand::LlmsLoaded {
            request_id: 1,
            result: Ok(vec![llm("m1")]),
        });
        assert_eq!(state.llms, LlmOptions::Loading);
    }

    #[test]
    fn failed_llm_load_is_kept_distinct() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::StartLlmLoad);
        state.dispatch(AppCommand::LlmsLoaded {
            request_id: 1,
            result: Err("connection refused".to_owned()),
        });
        assert_eq!(
            state.llms,
            LlmOptions::Failed("connection refused".to_owned())
        );
    }

    #[test]
    fn navigate_from_open_dialog_discards_draft() {
        let mut state = loaded_state();
        fill_valid_draft(&mut state);
        let events = state.dispatch(AppCommand::Navigate(Route::LlmSettings));
        assert_eq!(
            events,
            vec![
                AppEvent::DialogClosed,
                AppEvent::Navigated(Route::LlmSettings)
            ]
        );
        assert_eq!(state.dialog, DialogState::Closed);

        let back = state.dispatch(AppCommand::Back);
        assert_eq!(back, vec![AppEvent::Navigated(Route::AgentList)]);
        assert!(state.dispatch(AppCommand::Back).is_empty());
    }

    #[test]
    fn status_line_set_and_cleared() {
        let mut state = AppState::default();
        let events = state.dispatch(AppCommand::SetStatus(Notification::error("load failed")));
        assert_eq!(events, vec![AppEvent::StatusUpdated("load failed".to_owned())]);
        assert_eq!(state.status_line, Some(Notification::error("load failed")));

        assert_eq!(
            state.dispatch(AppCommand::ClearStatus),
            vec![AppEvent::StatusCleared]
        );
        assert_eq!(state.status_line, None);
    }

    #[test]
    fn filter_commands_track_query() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::PushFilterChar('b'));
        let events = state.dispatch(AppCommand::PushFilterChar('o'));
        assert_eq!(events, vec![AppEvent::FilterChanged("bo".to_owned())]);
        state.dispatch(AppCommand::PopFilterChar);
        state.dispatch(AppCommand::PopFilterChar);
        assert!(state.dispatch(AppCommand::PopFilterChar).is_empty());
        state.dispatch(AppCommand::SetFilter("x".to_owned()));
        assert_eq!(state.filter.query(), "x");
    }
}
