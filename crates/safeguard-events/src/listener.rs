//! Persistent event listener.
//!
//! Keeps an event subscription alive across token expiry, network loss and
//! server restarts. Each connection attempt opens a fresh channel; a channel
//! is never reused once it has disconnected.
//!
//! ```text
//! Disconnected --start--> Connecting --open ok--> Connected
//!                             ^   |                   |
//!                             |   | transient error   | transient disconnect
//!                             |   v                   v
//!                           RetryScheduled <----------+
//!
//! fatal error / permanent disconnect / dispose --> PermanentlyFailed (terminal)
//! stop (any non-terminal state) --> Disconnected
//! ```
//!
//! The token is refreshed before an attempt when its lifetime has run out,
//! or when the previous attempt was refused because of the token.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use safeguard_core::error::{AuthError, ListenerError};
use safeguard_core::events::panic_message;
use safeguard_core::{
    DisconnectNotifier, DisconnectReason, DisconnectSignal, EventChannel, EventSubscriptions,
    EventTransport, HandlerResult, Result, Session,
};

use crate::options::ListenerOptions;
use crate::signalr::SignalrTransport;

/// Lifecycle state of a [`PersistentEventListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// Not started, or stopped.
    Disconnected,
    /// Refreshing the token if needed and opening a channel.
    Connecting,
    /// A channel is live and dispatching events.
    Connected,
    /// Waiting before the next connection attempt.
    RetryScheduled,
    /// Will never connect again.
    PermanentlyFailed,
}

impl ListenerState {
    /// Returns true for [`ListenerState::PermanentlyFailed`].
    pub fn is_terminal(self) -> bool {
        self == ListenerState::PermanentlyFailed
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ListenerState::Disconnected => "disconnected",
            ListenerState::Connecting => "connecting",
            ListenerState::Connected => "connected",
            ListenerState::RetryScheduled => "retry scheduled",
            ListenerState::PermanentlyFailed => "permanently failed",
        };
        f.write_str(name)
    }
}

/// Callback invoked with every new listener state.
pub type StateCallback = Arc<dyn Fn(ListenerState) + Send + Sync>;

/// Keeps an event subscription alive until stopped.
///
/// Handlers are registered on the listener and carried over to every channel
/// it opens. Only the first connection attempt made inside
/// [`PersistentEventListener::start`] reports errors to the caller; anything
/// that happens later is visible through the state callback.
///
/// # Example
///
/// ```no_run
/// use safeguard_core::{ApplianceAddress, Credential, SecretMaterial};
/// use safeguard_events::{ListenerOptions, PersistentEventListener};
/// use safeguard_rsts::{ConnectOptions, connect};
///
/// # async fn run() -> safeguard_core::Result<()> {
/// let appliance = ApplianceAddress::new("sg.example.com")?;
/// let credential = Credential::thumbprint("ABC123")?;
/// let session = connect(appliance, credential, ConnectOptions::default()).await?;
///
/// let listener = PersistentEventListener::signalr(session, ListenerOptions::default());
/// listener.register_event_handler("UserCreated", |name, body| {
///     println!("{}: {}", name, body);
///     Ok(())
/// });
/// listener.set_state_callback(|state| println!("listener {}", state));
/// listener.start().await?;
/// # Ok(())
/// # }
/// ```
pub struct PersistentEventListener<S: Session + 'static, T: EventTransport> {
    inner: Arc<ListenerInner<S, T>>,
}

struct ListenerInner<S, T> {
    session: Arc<S>,
    owns_session: bool,
    transport: T,
    subscriptions: Arc<EventSubscriptions>,
    options: ListenerOptions,
    state: Mutex<ListenerState>,
    state_callback: RwLock<Option<StateCallback>>,
    control: AsyncMutex<Control>,
    disposed: AtomicBool,
}

#[derive(Default)]
struct Control {
    supervisor: Option<Supervisor>,
}

struct Supervisor {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

type Connection<C> = (C, DisconnectSignal);

impl<S: Session + 'static> PersistentEventListener<S, SignalrTransport> {
    /// Listen to the SignalR event hub of the session's appliance, taking
    /// ownership of the session.
    pub fn signalr(session: S, options: ListenerOptions) -> Self {
        let transport = SignalrTransport::for_session(&session, options.clone());
        Self::new(session, transport, options)
    }
}

impl<S: Session + 'static, T: EventTransport> PersistentEventListener<S, T> {
    /// Create a listener that owns `session` and disposes it on
    /// [`PersistentEventListener::dispose`].
    pub fn new(session: S, transport: T, options: ListenerOptions) -> Self {
        Self::build(Arc::new(session), true, transport, options)
    }

    /// Create a listener over a session shared with the caller. Disposing the
    /// listener leaves the session alone.
    pub fn with_shared_session(session: Arc<S>, transport: T, options: ListenerOptions) -> Self {
        Self::build(session, false, transport, options)
    }

    /// Create a listener that owns an independent clone of `session`.
    pub fn from_session_clone(session: &S, transport: T, options: ListenerOptions) -> Result<Self> {
        let clone = session.try_clone()?;
        Ok(Self::new(clone, transport, options))
    }

    fn build(session: Arc<S>, owns_session: bool, transport: T, options: ListenerOptions) -> Self {
        Self {
            inner: Arc::new(ListenerInner {
                session,
                owns_session,
                transport,
                subscriptions: Arc::new(EventSubscriptions::new()),
                options,
                state: Mutex::new(ListenerState::Disconnected),
                state_callback: RwLock::new(None),
                control: AsyncMutex::new(Control::default()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// The session tokens are drawn from.
    pub fn session(&self) -> &Arc<S> {
        &self.inner.session
    }

    /// The current state.
    pub fn state(&self) -> ListenerState {
        self.inner.state()
    }

    /// Handle events named `name`, replacing any earlier handler for it.
    /// Takes effect on the live channel too.
    pub fn register_event_handler<F>(&self, name: &str, handler: F)
    where
        F: Fn(&str, &str) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.subscriptions.register(name, handler);
    }

    /// Handle every event that has no named handler.
    pub fn register_all_events_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &str) -> HandlerResult + Send + Sync + 'static,
    {
        self.inner.subscriptions.register_all(handler);
    }

    /// Observe state transitions. The callback runs synchronously on the task
    /// making the transition; panics are caught and logged.
    pub fn set_state_callback<F>(&self, callback: F)
    where
        F: Fn(ListenerState) + Send + Sync + 'static,
    {
        let mut slot = self
            .inner
            .state_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Arc::new(callback));
    }

    /// Connect and keep reconnecting until stopped.
    ///
    /// Returns once the first attempt has either connected or scheduled a
    /// retry. A fatal first attempt (disposed session, rejected credential)
    /// moves the listener to [`ListenerState::PermanentlyFailed`] and returns
    /// the error. Starting a running listener does nothing.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let mut control = self.inner.control.lock().await;

        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(ListenerError::Disposed.into());
        }
        if self.inner.state().is_terminal() {
            return Err(ListenerError::PermanentlyFailed.into());
        }
        if control.supervisor.is_some() {
            debug!("Listener already started");
            return Ok(());
        }

        info!("Starting event listener");
        self.inner.transition(ListenerState::Connecting);

        let mut refresh_next = false;
        let first = match self.inner.connect_once(false).await {
            Ok(connection) => {
                self.inner.transition(ListenerState::Connected);
                Some(connection)
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Event listener failed to start");
                self.inner.transition(ListenerState::PermanentlyFailed);
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "First connection attempt failed, retrying");
                refresh_next = e.is_token_rejected();
                self.inner.transition(ListenerState::RetryScheduled);
                None
            }
        };

        let (cancel, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(
            self.inner.clone(),
            first,
            refresh_next,
            cancel_rx,
        ));
        control.supervisor = Some(Supervisor { cancel, task });
        Ok(())
    }

    /// Close the live channel, cancel any pending retry and return to
    /// [`ListenerState::Disconnected`].
    ///
    /// Idempotent, and a no-op once the listener has permanently failed.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut control = self.inner.control.lock().await;
        self.inner.stop_locked(&mut control).await;
    }

    /// Stop, dispose the session if the listener owns it, and move to
    /// [`ListenerState::PermanentlyFailed`]. Idempotent.
    #[instrument(skip(self))]
    pub async fn dispose(&self) {
        let mut control = self.inner.control.lock().await;
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.inner.stop_locked(&mut control).await;
        if self.inner.owns_session {
            self.inner.session.dispose();
        }
        if !self.inner.state().is_terminal() {
            self.inner.transition(ListenerState::PermanentlyFailed);
        }
        debug!("Event listener disposed");
    }

    /// Returns true once [`PersistentEventListener::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl<S: Session + 'static, T: EventTransport> Drop for PersistentEventListener<S, T> {
    fn drop(&mut self) {
        // Cannot await here; cancel and abort so the live channel is dropped.
        if let Ok(mut control) = self.inner.control.try_lock() {
            if let Some(supervisor) = control.supervisor.take() {
                let _ = supervisor.cancel.send(true);
                supervisor.task.abort();
            }
        }
        if self.inner.owns_session {
            self.inner.session.dispose();
        }
    }
}

impl<S: Session + 'static, T: EventTransport> fmt::Debug for PersistentEventListener<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentEventListener")
            .field("appliance", self.inner.session.appliance())
            .field("state", &self.state())
            .field("subscriptions", &self.inner.subscriptions)
            .field("owns_session", &self.inner.owns_session)
            .finish()
    }
}

impl<S: Session + 'static, T: EventTransport> ListenerInner<S, T> {
    fn state(&self) -> ListenerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` and notify the callback if the state changed.
    fn transition(&self, next: ListenerState) {
        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, next)
        };
        if previous == next {
            return;
        }

        debug!(from = %previous, to = %next, "Listener state changed");

        let callback = self
            .state_callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(next))) {
                error!(
                    state = %next,
                    panic = %panic_message(panic.as_ref()),
                    "State callback panicked"
                );
            }
        }
    }

    /// Refresh the token if it has run out or `force_refresh` is set, then
    /// open a channel.
    async fn connect_once(&self, force_refresh: bool) -> Result<Connection<T::Channel>> {
        if force_refresh {
            debug!("Access token refused, refreshing");
            self.session.refresh_access_token().await?;
        } else if self.session.access_token_lifetime_remaining() == 0 {
            debug!("Access token expired, refreshing");
            self.session.refresh_access_token().await?;
        }

        let token = self
            .session
            .access_token()
            .ok_or(AuthError::SessionDisposed)?;

        let (notifier, signal) = DisconnectNotifier::channel();
        let channel = self
            .transport
            .open(&token, self.subscriptions.clone(), notifier)
            .await?;
        Ok((channel, signal))
    }

    async fn stop_locked(&self, control: &mut Control) {
        if let Some(supervisor) = control.supervisor.take() {
            let _ = supervisor.cancel.send(true);
            if let Err(e) = supervisor.task.await {
                warn!(error = %e, "Listener task ended abnormally");
            }
        }

        if self.state().is_terminal() {
            debug!("Listener permanently failed, nothing to stop");
            return;
        }
        if self.state() != ListenerState::Disconnected {
            info!("Event listener stopped");
        }
        self.transition(ListenerState::Disconnected);
    }
}

/// Reconnect loop. Runs until cancelled or permanently failed.
async fn supervise<S: Session + 'static, T: EventTransport>(
    inner: Arc<ListenerInner<S, T>>,
    mut current: Option<Connection<T::Channel>>,
    mut refresh_next: bool,
    mut cancel: watch::Receiver<bool>,
) {
    let mut attempt: u32 = if current.is_some() { 0 } else { 1 };

    loop {
        if let Some((mut channel, signal)) = current.take() {
            tokio::select! {
                reason = signal.wait() => {
                    channel.close().await;
                    if reason.is_permanent() {
                        error!(%reason, "Event channel permanently disconnected");
                        inner.transition(ListenerState::PermanentlyFailed);
                        return;
                    }
                    warn!(%reason, "Event channel disconnected");
                    if reason == DisconnectReason::Graceful && *cancel.borrow() {
                        return;
                    }
                    attempt = 1;
                    inner.transition(ListenerState::RetryScheduled);
                }
                _ = cancelled(&mut cancel) => {
                    channel.close().await;
                    return;
                }
            }
        }

        let delay = inner.options.backoff.delay(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancelled(&mut cancel) => return,
        }

        inner.transition(ListenerState::Connecting);
        let result = tokio::select! {
            result = inner.connect_once(refresh_next) => result,
            _ = cancelled(&mut cancel) => return,
        };

        match result {
            Ok(connection) => {
                info!(attempt, "Event channel reconnected");
                refresh_next = false;
                inner.transition(ListenerState::Connected);
                current = Some(connection);
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Reconnect failed permanently");
                inner.transition(ListenerState::PermanentlyFailed);
                return;
            }
            Err(e) => {
                warn!(attempt, error = %e, "Reconnect attempt failed");
                refresh_next = e.is_token_rejected();
                attempt = attempt.saturating_add(1);
                inner.transition(ListenerState::RetryScheduled);
            }
        }
    }
}

/// Completes once cancellation is requested or the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    // An Err means the listener was dropped, which also cancels.
    let _ = cancel.wait_for(|stop| *stop).await;
}
