use crate::billing::BillingState;
use crate::clusters::{ClustersState, ClustersView};
use crate::common::{ApiClient, Session};
use crate::credentials::{CredentialsState, CredentialsView};
use crate::config::Config;
use crate::endpoint::{EndpointState, EndpointTab};
use crate::endpoints::{EndpointsState, EndpointsView};
use crate::menu::MenuState;
use crate::session::SessionState;
use crate::settings::SettingsState;
use crate::spec_admin::{SpecAdminState, SpecAdminView};
use crate::specs::SpecsState;
use crate::tasks::TasksState;
use crate::worker::{WorkerState, WorkerTab};
use color_eyre::eyre::Result;
use crossterm::event::EventStream;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style, Stylize},
    text::Line,
    widgets::Paragraph,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum AppView {
    Menu,
    Settings,
    /// No user or the session expired, shows the sign-in URL.
    SignedOut,
    Endpoints(EndpointsView),
    Endpoint(EndpointTab),
    Worker(WorkerTab),
    Tasks,
    Specs,
    Credentials(CredentialsView),
    Clusters(ClustersView),
    SpecAdmin(SpecAdminView),
    Billing,
}

/// State of every view.
///
/// Views that poll own their feeds here, replacing or resetting a field
/// cancels everything that view had in flight.
#[derive(Default, Debug)]
pub struct AppState {
    pub menu: MenuState,
    pub settings: SettingsState,
    pub session: SessionState,
    pub endpoints: EndpointsState,
    /// Detail of the endpoint being looked at, kept while its worker drawer is open.
    pub endpoint: Option<EndpointState>,
    pub worker: Option<WorkerState>,
    pub tasks: TasksState,
    pub specs: SpecsState,
    pub credentials: CredentialsState,
    pub clusters: ClustersState,
    pub spec_admin: SpecAdminState,
    pub billing: BillingState,
}

impl AppState {
    /// Drops every view that talks to the API.
    fn reset_views(&mut self) {
        self.worker = None;
        self.endpoint = None;
        self.endpoints = EndpointsState::default();
        self.tasks = TasksState::default();
        self.specs = SpecsState::default();
        self.credentials = CredentialsState::default();
        self.clusters = ClustersState::default();
        self.spec_admin = SpecAdminState::default();
        self.billing = BillingState::default();
    }
}

/// A message shown in the footer for a few seconds.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub is_error: bool,
    pub shown_at: Instant,
}

/// How long a notification replaces the footer help.
const NOTIFICATION_TTL: Duration = Duration::from_secs(5);

/// 60 FPS = 1000ms / 60 = 16.67ms per frame
const FPS_RATE: Duration = Duration::from_millis(1000 / 60);

#[derive(Debug)]
pub struct App {
    /// Active application view.
    pub view: AppView,
    /// Application state.
    ///
    /// This is shared among all views.
    pub state: AppState,
    /// Is the application running?
    pub is_running: bool,
    /// Event stream.
    pub event_stream: EventStream,
    /// Configuration.
    pub config: Config,
    /// Signed-in user, shared with the API client.
    pub session: Arc<Session>,
    /// Console API client.
    pub api: ApiClient,
    /// Transient footer message.
    pub notification: Option<Notification>,
}

impl App {
    /// Construct a new instance of [`App`].
    pub fn new(config: Config) -> Result<Self> {
        Self::new_with_view(config, AppView::Menu)
    }

    pub fn new_with_view(config: Config, view: AppView) -> Result<Self> {
        let session = Arc::new(Session::new(&config.portal_url));
        let api = ApiClient::new(&config, session.clone())?;
        let mut state = AppState::default();
        state.settings.temp_config = config.clone();

        Ok(Self {
            view,
            state,
            is_running: false,
            event_stream: EventStream::new(),
            config,
            session,
            api,
            notification: None,
        })
    }

    /// Run the application's main loop.
    pub async fn run(mut self, mut terminal: ratatui::DefaultTerminal) -> Result<()> {
        self.is_running = true;
        self.start_session();
        self.enter_view();

        // create a ticker for redraws
        let mut interval = tokio::time::interval(FPS_RATE);

        while self.is_running {
            self.tick_session();

            // draw first, background results are applied right after
            terminal.draw(|frame| self.draw(frame))?;

            // process ticks
            match self.view.clone() {
                AppView::Endpoints(view) => self.tick_endpoints(&view),
                AppView::Endpoint(tab) => self.tick_endpoint(&tab),
                AppView::Worker(tab) => self.tick_worker(&tab),
                AppView::Tasks => self.tick_tasks(),
                AppView::Specs => self.tick_specs(),
                AppView::Credentials(_) => self.tick_credentials(),
                AppView::Clusters(view) => self.tick_clusters(&view),
                AppView::SpecAdmin(_) => self.tick_spec_admin(),
                AppView::Billing => self.tick_billing(),
                _ => {
                    // nothing polls on the menu, settings and sign-in screens
                }
            }

            // handle events with timeout to allow redraws
            tokio::select! {
                _ = interval.tick() => {
                    continue;
                }
                result = self.handle_crossterm_events() => {
                    result?;
                }
            }
        }
        Ok(())
    }

    /// Starts whatever the initial view polls, used when the app is created
    /// directly on a view other than the menu.
    fn enter_view(&mut self) {
        match self.view.clone() {
            AppView::Endpoints(_) => self.open_endpoints(),
            AppView::Tasks => self.open_tasks(),
            AppView::Specs => self.open_specs(),
            AppView::Credentials(_) => self.open_credentials(),
            AppView::Clusters(_) => self.open_clusters(),
            AppView::SpecAdmin(_) => self.open_spec_admin(),
            AppView::Billing => self.open_billing(),
            _ => {}
        }
    }

    /// Renders the user interface.
    fn draw(&mut self, frame: &mut Frame) {
        match self.view.clone() {
            AppView::Menu => self.draw_menu(frame),
            AppView::Settings => self.draw_settings(frame),
            AppView::SignedOut => self.draw_signed_out(frame),
            AppView::Endpoints(view) => self.draw_endpoints(frame, &view),
            AppView::Endpoint(tab) => self.draw_endpoint(frame, &tab),
            AppView::Worker(tab) => self.draw_worker(frame, &tab),
            AppView::Tasks => self.draw_tasks(frame),
            AppView::Specs => self.draw_specs(frame),
            AppView::Credentials(view) => self.draw_credentials(frame, &view),
            AppView::Clusters(view) => self.draw_clusters(frame, &view),
            AppView::SpecAdmin(view) => self.draw_spec_admin(frame, &view),
            AppView::Billing => self.draw_billing(frame),
        }
    }

    /// Reads the crossterm events and updates the state of [`App`].
    async fn handle_crossterm_events(&mut self) -> Result<()> {
        use crossterm::event::{Event, KeyEventKind};
        use futures::{FutureExt, StreamExt};

        let event = self.event_stream.next().fuse().await;
        if let Some(Ok(Event::Key(key))) = event {
            if key.kind == KeyEventKind::Press {
                match &self.view.clone() {
                    AppView::Menu => self.handle_menu_input(key),
                    AppView::Settings => self.handle_settings_input(key),
                    AppView::SignedOut => self.handle_signed_out_input(key),
                    AppView::Endpoints(view) => self.handle_endpoints_input(key, view),
                    AppView::Endpoint(tab) => self.handle_endpoint_input(key, tab),
                    AppView::Worker(tab) => self.handle_worker_input(key, tab),
                    AppView::Tasks => self.handle_tasks_input(key),
                    AppView::Specs => self.handle_specs_input(key),
                    AppView::Credentials(view) => self.handle_credentials_input(key, view),
                    AppView::Clusters(view) => self.handle_clusters_input(key, view),
                    AppView::SpecAdmin(view) => self.handle_spec_admin_input(key, view),
                    AppView::Billing => self.handle_billing_input(key),
                }
            }
        }
        Ok(())
    }

    /// Applies the user fetch and leaves every API view once the session expired.
    fn tick_session(&mut self) {
        self.apply_session_results();

        if self.session.is_expired()
            && !matches!(self.view, AppView::SignedOut | AppView::Settings)
        {
            tracing::info!("session expired, signing out");
            self.state.reset_views();
            self.view = AppView::SignedOut;
        }
    }

    /// Rebuilds the session and the API client from `self.config`.
    pub(crate) fn reconnect(&mut self) -> Result<()> {
        let session = Arc::new(Session::new(&self.config.portal_url));
        self.api = ApiClient::new(&self.config, session.clone())?;
        self.session = session;
        self.state.reset_views();
        self.start_session();
        Ok(())
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notification = Some(Notification {
            message: message.into(),
            is_error: false,
            shown_at: Instant::now(),
        });
    }

    pub fn notify_error(&mut self, message: impl Into<String>) {
        self.notification = Some(Notification {
            message: message.into(),
            is_error: true,
            shown_at: Instant::now(),
        });
    }

    /// Notifies about the outcome of a mutation.
    pub(crate) fn notify_outcome(&mut self, outcome: Result<String, String>) {
        match outcome {
            Ok(message) => self.notify(message),
            Err(message) => self.notify_error(message),
        }
    }

    /// Footer help line, replaced by a recent notification.
    pub(crate) fn draw_footer(&self, frame: &mut Frame, area: Rect, help: &str) {
        let line = match &self.notification {
            Some(n) if n.shown_at.elapsed() < NOTIFICATION_TTL && n.is_error => {
                Line::from(n.message.as_str()).red()
            }
            Some(n) if n.shown_at.elapsed() < NOTIFICATION_TTL => {
                Line::from(n.message.as_str()).green()
            }
            _ => Line::from(help).style(Style::default().fg(Color::DarkGray)),
        };
        frame.render_widget(Paragraph::new(line).centered(), area);
    }

    /// Set running to false to quit the application.
    pub fn quit(&mut self) {
        self.is_running = false;
    }
}
