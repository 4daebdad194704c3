use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendCall};
use crate::capabilities::{Capabilities, KeyNamespace, KvKey, StoredSession};
use crate::config::AppConfig;
use crate::event::Event;
use crate::format::format_relative;
use crate::model::{
    CaseSlim, CaseView, DialogView, Model, Notice, Region, Route, Username, ViewId, ViewModel,
};
use crate::session::{Notification, SessionRecord};
use crate::vote_dialog::VoteEditDialog;
use crate::{AppError, ErrorKind};

#[derive(Default)]
pub struct App;

impl App {
    fn home_region(model: &Model) -> Region {
        model
            .config
            .as_ref()
            .map_or_else(Region::home_default, |config| config.home_region().clone())
    }

    fn session_key(config: &AppConfig) -> Result<String, AppError> {
        KvKey::new(KeyNamespace::Session, config.session_key())
            .map(|key| key.raw())
            .map_err(AppError::from)
    }

    fn report(model: &mut Model, error: &AppError) {
        warn!(code = error.code(), message = %error.message, "operation failed");
        model.push_notice(Notice::error(error.message.clone()));
    }

    /// Returns `false` when any call could not be sent.
    fn dispatch(model: &mut Model, calls: Vec<BackendCall>, caps: &Capabilities) -> bool {
        if calls.is_empty() {
            return true;
        }
        let Some(config) = model.config.clone() else {
            Self::report(
                model,
                &AppError::new(ErrorKind::Configuration, "The app has not been configured yet"),
            );
            return false;
        };

        let token = model.session.token_at(model.now);
        let backend = Backend::new(&caps.http, &config, token);
        let mut failures = Vec::new();
        for call in calls {
            if let Err(error) = backend.dispatch(call) {
                failures.push(error);
            }
        }
        for error in &failures {
            Self::report(model, error);
        }
        failures.is_empty()
    }

    fn is_current(model: &Model, view: ViewId, epoch: u64) -> bool {
        match view {
            ViewId::Region => model.region.epoch() == epoch,
            ViewId::Home => model.home.epoch() == epoch,
        }
    }

    /// Fans a session transition out to every subscribed view.
    fn notify(model: &mut Model, notification: Notification, caps: &Capabilities) {
        info!(change = ?notification.change, subscribers = notification.subscribers.len(), "session changed");
        let username = model.username().cloned();
        let home_region = Self::home_region(model);

        let mut calls = Vec::new();
        for view in notification.subscribers {
            match view {
                ViewId::Region => calls.extend(model.region.session_changed(username.as_ref())),
                ViewId::Home => {
                    calls.extend(model.home.session_changed(username.as_ref(), &home_region));
                }
            }
        }
        Self::dispatch(model, calls, caps);
    }

    fn enter_route(model: &mut Model, route: Route, caps: &Capabilities) {
        let previous = std::mem::replace(&mut model.route, route.clone());
        if let Some(view) = previous.view().filter(|v| Some(*v) != route.view()) {
            model.session.unsubscribe(view);
        }
        if model.config.is_none() {
            debug!(route = %route.path(), "route activation deferred until configured");
            return;
        }

        let username: Option<Username> = model.username().cloned();
        let calls = match route {
            Route::Home => {
                model.session.subscribe(ViewId::Home);
                let home_region = Self::home_region(model);
                model.home.activate(username.as_ref(), &home_region)
            }
            Route::Region { region } => {
                model.session.subscribe(ViewId::Region);
                model.region.navigate(region, username.as_ref())
            }
            Route::Ask { .. } => Vec::new(),
            Route::NotFound { path } => {
                debug!(path = %path, "no view for route");
                Vec::new()
            }
        };
        debug!(subscribers = ?model.session.subscribers(), "route entered");
        Self::dispatch(model, calls, caps);
    }

    fn sign_in(model: &mut Model, record: SessionRecord, persist: bool, caps: &Capabilities) {
        let stored = StoredSession::from_record(&record);
        match model.session.sign_in(record, model.now) {
            Ok(notification) => {
                if persist {
                    Self::persist_session(model, &stored, caps);
                }
                Self::notify(model, notification, caps);
            }
            Err(e) => Self::report(model, &e.into()),
        }
    }

    fn persist_session(model: &mut Model, stored: &StoredSession, caps: &Capabilities) {
        let Some(config) = model.config.as_ref() else {
            debug!("session write deferred until configured");
            model.session_unsynced = true;
            return;
        };
        let written = Self::session_key(config)
            .and_then(|key| stored.encode().map(|bytes| (key, bytes)).map_err(AppError::from));
        match written {
            Ok((key, bytes)) => caps
                .key_value
                .set(key, bytes, |result| Event::SessionPersisted { ok: result.is_ok() }),
            Err(error) => Self::report(model, &error),
        }
    }

    fn forget_session(model: &mut Model, caps: &Capabilities) {
        let Some(config) = model.config.as_ref() else {
            debug!("session removal deferred until configured");
            model.session_unsynced = true;
            return;
        };
        match Self::session_key(config) {
            Ok(key) => caps
                .key_value
                .delete(key, |result| Event::SessionPersisted { ok: result.is_ok() }),
            Err(error) => Self::report(model, &error),
        }
    }

    fn case_views(cases: &[CaseSlim], model: &Model) -> Vec<CaseView> {
        cases
            .iter()
            .map(|case| CaseView {
                id: case.id.get(),
                subject: case.subject.clone(),
                region: case.region.to_string(),
                tally: case.tally(),
                created_label: format_relative(case.created, model.now),
            })
            .collect()
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        model.update_timestamp();
        debug!(event = event.name(), user = event.is_user_initiated(), "update");

        if let Some(notification) = model.session.expire(model.now) {
            Self::forget_session(model, caps);
            Self::notify(model, notification, caps);
        }

        match event {
            Event::Started(startup) => match AppConfig::try_from(startup) {
                Ok(config) => {
                    info!(api_base = %config.api_base(), "core configured");
                    let key = Self::session_key(&config);
                    model.config = Some(config);
                    if std::mem::take(&mut model.session_unsynced) {
                        // a login or logout before start is newer than storage
                        let current = model
                            .session
                            .record_at(model.now)
                            .map(StoredSession::from_record);
                        match current {
                            Some(stored) => Self::persist_session(model, &stored, caps),
                            None => Self::forget_session(model, caps),
                        }
                    } else {
                        match key {
                            Ok(key) => caps.key_value.get(key, |result| {
                                let stored = result
                                    .ok()
                                    .flatten()
                                    .and_then(|bytes| StoredSession::decode(&bytes).ok());
                                Event::SessionRestored(stored)
                            }),
                            Err(error) => Self::report(model, &error),
                        }
                    }
                    let route = model.route.clone();
                    Self::enter_route(model, route, caps);
                }
                Err(e) => Self::report(model, &e.into()),
            },

            Event::SessionRestored(None) => debug!("no stored session"),

            Event::SessionRestored(Some(_)) if model.session.is_logged_in(model.now) => {
                debug!("keeping the session signed in since start");
            }

            Event::SessionRestored(Some(stored)) => match stored.into_record() {
                Ok(record) if record.is_expired(model.now) => {
                    info!("stored session has expired");
                    Self::forget_session(model, caps);
                }
                Ok(record) => Self::sign_in(model, record, false, caps),
                Err(e) => {
                    warn!(error = %e, "discarding unreadable stored session");
                    Self::forget_session(model, caps);
                }
            },

            Event::SessionPersisted { ok } => {
                if !ok {
                    warn!("session storage write failed");
                }
            }

            Event::LoggedIn {
                username,
                token,
                expires_at,
            } => match Username::new(username) {
                Ok(username) => Self::sign_in(
                    model,
                    SessionRecord {
                        username,
                        token,
                        expires_at,
                    },
                    true,
                    caps,
                ),
                Err(e) => Self::report(model, &AppError::new(ErrorKind::Validation, e.to_string())),
            },

            Event::LoggedOut => {
                if let Some(notification) = model.session.sign_out() {
                    Self::forget_session(model, caps);
                    Self::notify(model, notification, caps);
                }
            }

            Event::Navigated { path } => {
                Self::enter_route(model, Route::from_path(&path), caps);
            }

            Event::LoadMore => {
                let call = match model.route {
                    Route::Region { .. } => model.region.next_batch(model.username()),
                    Route::Home => model.home.get_more(),
                    Route::Ask { .. } | Route::NotFound { .. } => None,
                };
                Self::dispatch(model, call.into_iter().collect(), caps);
            }

            Event::AskQuestion => {
                if let Some(route) = model.region.ask_question_route() {
                    Self::enter_route(model, route, caps);
                } else {
                    model.push_notice(Notice::info("You cannot ask a question in this region"));
                }
            }

            Event::CasesLoaded { view, epoch, result } => match result {
                Ok(page) => {
                    match view {
                        ViewId::Region => model.region.on_page(epoch, page),
                        ViewId::Home => model.home.on_page(epoch, page),
                    };
                }
                Err(failure) if Self::is_current(model, view, epoch) => {
                    Self::report(model, &failure.into());
                }
                Err(failure) => warn!(?view, epoch, error = %failure, "dropping stale page failure"),
            },

            Event::EligibilityLoaded { view, epoch, result } => match result {
                Ok(eligibility) => {
                    match view {
                        ViewId::Region => model.region.on_eligibility(epoch, &eligibility),
                        ViewId::Home => model.home.on_eligibility(epoch, &eligibility),
                    };
                }
                Err(failure) if Self::is_current(model, view, epoch) => {
                    Self::report(model, &failure.into());
                }
                Err(failure) => {
                    warn!(?view, epoch, error = %failure, "dropping stale eligibility failure");
                }
            },

            Event::RegionsLoaded { epoch, result } => match result {
                Ok(regions) => {
                    model.home.on_regions(epoch, regions);
                }
                Err(failure) if Self::is_current(model, ViewId::Home, epoch) => {
                    Self::report(model, &failure.into());
                }
                Err(failure) => warn!(epoch, error = %failure, "dropping stale regions failure"),
            },

            Event::OpenVoteDialog { is_edit, entity } => {
                model.last_dialog_result = None;
                model.vote_dialog = Some(VoteEditDialog::open(is_edit, entity));
            }

            Event::EditVoteField { name, value } => {
                let result = match model.vote_dialog.as_mut() {
                    Some(dialog) => dialog.set_field(&name, value).map_err(AppError::from),
                    None => Err(AppError::new(ErrorKind::InvalidState, "No vote dialog is open")),
                };
                if let Err(error) = result {
                    Self::report(model, &error);
                }
            }

            Event::SaveVote => {
                let saved = match model.vote_dialog.as_mut() {
                    Some(dialog) => dialog.save().map_err(AppError::from),
                    None => Err(AppError::new(ErrorKind::InvalidState, "No vote dialog is open")),
                };
                match saved {
                    Ok(call) => {
                        if !Self::dispatch(model, vec![call], caps) {
                            if let Some(dialog) = model.vote_dialog.as_mut() {
                                dialog.abort_save();
                            }
                        }
                    }
                    Err(error) => Self::report(model, &error),
                }
            }

            Event::CancelVote => {
                if let Some(mut dialog) = model.vote_dialog.take() {
                    dialog.cancel();
                    model.last_dialog_result = dialog.result().cloned();
                }
            }

            Event::VoteCreated(result) => {
                if let Some(dialog) = model.vote_dialog.as_mut() {
                    if let Some(notice) = dialog.on_created(result) {
                        model.push_notice(notice);
                    }
                }
            }

            Event::VoteUpdated(result) => {
                if let Some(dialog) = model.vote_dialog.as_mut() {
                    if let Some(notice) = dialog.on_updated(result) {
                        model.push_notice(notice);
                    }
                }
            }

            Event::DismissNotice => {
                model.notices.pop_front();
            }
        }

        if model.vote_dialog.as_ref().is_some_and(VoteEditDialog::is_closed) {
            model.last_dialog_result = model
                .vote_dialog
                .take()
                .and_then(|dialog| dialog.result().cloned());
        }

        caps.render.render();
    }

    fn view(&self, model: &Model) -> ViewModel {
        let username = model.username();

        let (cases, has_no_cases, more, can_create_case, region) = match &model.route {
            Route::Region { .. } => (
                Self::case_views(model.region.cases(), model),
                model.region.has_no_cases(),
                model.region.more(),
                model.region.can_create_case(),
                model.region.region().map(ToString::to_string),
            ),
            Route::Home => (
                Self::case_views(model.home.cases(), model),
                model.home.has_no_cases(),
                model.home.more(),
                model.home.can_create_case(),
                None,
            ),
            Route::Ask { region } => (Vec::new(), true, false, false, Some(region.to_string())),
            Route::NotFound { .. } => (Vec::new(), true, false, false, None),
        };

        ViewModel {
            route: model.route.path(),
            logged_in: username.is_some(),
            username: username.map(ToString::to_string),
            region,
            cases,
            has_no_cases,
            more,
            can_create_case,
            my_regions: model.home.regions().iter().map(ToString::to_string).collect(),
            dialog: model.vote_dialog.as_ref().map(|dialog| DialogView {
                is_edit: dialog.is_edit(),
                saving: matches!(dialog.state(), crate::vote_dialog::DialogState::Saving),
                editable_columns: dialog
                    .editable_columns()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                entity: dialog.entity().clone(),
            }),
            notices: model.notices.iter().cloned().collect(),
        }
    }
}
