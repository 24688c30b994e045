//! Credential-backed authenticated session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use safeguard_core::error::AuthError;
use safeguard_core::traits::{Session, TokenProvider};
use safeguard_core::{AccessToken, ApplianceAddress, Credential, ProviderScope, Result};

/// A session holding one credential and the token it last obtained.
///
/// The token lives behind a synchronous lock that is only held for the swap
/// itself, never across the token request.
///
/// # Security
///
/// Disposing the session (explicitly or by dropping it) wipes the credential
/// and the token. Debug output never contains either.
pub struct AuthenticationSession {
    appliance: ApplianceAddress,
    provider: Arc<dyn TokenProvider>,
    state: RwLock<SessionState>,
    disposed: AtomicBool,
}

#[derive(Default)]
struct SessionState {
    credential: Option<Arc<Credential>>,
    scope: Option<ProviderScope>,
    token: Option<AccessToken>,
}

impl AuthenticationSession {
    /// Create a session that has not authenticated yet.
    pub fn new(
        appliance: ApplianceAddress,
        provider: Arc<dyn TokenProvider>,
        credential: Credential,
    ) -> Self {
        Self {
            appliance,
            provider,
            state: RwLock::new(SessionState {
                credential: Some(Arc::new(credential)),
                scope: None,
                token: None,
            }),
            disposed: AtomicBool::new(false),
        }
    }

    /// Create a session and obtain its first token.
    pub async fn authenticate(
        appliance: ApplianceAddress,
        provider: Arc<dyn TokenProvider>,
        credential: Credential,
    ) -> Result<Self> {
        let session = Self::new(appliance, provider, credential);
        session.refresh_access_token().await?;
        Ok(session)
    }

    /// The scope this session authenticates with, once resolved.
    pub fn scope(&self) -> Option<ProviderScope> {
        self.read().scope.clone()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(AuthError::SessionDisposed.into())
        } else {
            Ok(())
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Session for AuthenticationSession {
    fn appliance(&self) -> &ApplianceAddress {
        &self.appliance
    }

    fn access_token(&self) -> Option<AccessToken> {
        if self.is_disposed() {
            return None;
        }
        self.read().token.clone()
    }

    fn access_token_lifetime_remaining(&self) -> u64 {
        self.access_token()
            .map(|t| t.lifetime_remaining_secs())
            .unwrap_or(0)
    }

    #[instrument(skip(self), fields(appliance = %self.appliance))]
    async fn refresh_access_token(&self) -> Result<()> {
        self.ensure_live()?;

        let (credential, scope) = {
            let state = self.read();
            (state.credential.clone(), state.scope.clone())
        };
        let credential = credential.ok_or(AuthError::SessionDisposed)?;

        let scope = match scope {
            Some(scope) => scope,
            None => {
                let scope = self.provider.resolve_scope(&credential).await?;
                self.write().scope = Some(scope.clone());
                scope
            }
        };

        info!("Refreshing access token");
        let token = self.provider.authenticate(&credential, Some(&scope)).await?;

        // Dispose may have run while the request was in flight.
        let mut state = self.write();
        if self.disposed.load(Ordering::Acquire) {
            return Err(AuthError::SessionDisposed.into());
        }
        state.token = Some(token);
        debug!("Access token replaced");
        Ok(())
    }

    fn try_clone(&self) -> Result<Self> {
        self.ensure_live()?;

        let state = self.read();
        let credential = state
            .credential
            .as_deref()
            .ok_or(AuthError::SessionDisposed)?
            .clone();

        debug!(appliance = %self.appliance, "Cloning session");
        Ok(Self {
            appliance: self.appliance.clone(),
            provider: self.provider.clone(),
            state: RwLock::new(SessionState {
                credential: Some(Arc::new(credential)),
                scope: state.scope.clone(),
                token: state.token.clone(),
            }),
            disposed: AtomicBool::new(false),
        })
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let released = std::mem::take(&mut *self.write());
        drop(released);
        debug!(appliance = %self.appliance, "Session disposed");
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for AuthenticationSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for AuthenticationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("AuthenticationSession")
            .field("appliance", &self.appliance)
            .field("credential", &state.credential.as_ref().map(|c| c.kind()))
            .field("scope", &state.scope)
            .field("token", &state.token.as_ref().map(|_| "[REDACTED]"))
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safeguard_core::SecretMaterial;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Issues `token-1`, `token-2`, ... each valid for `lifetime`.
    struct CountingProvider {
        calls: AtomicUsize,
        resolves: AtomicUsize,
        lifetime: Duration,
    }

    impl CountingProvider {
        fn new(lifetime: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                resolves: AtomicUsize::new(0),
                lifetime,
            })
        }
    }

    #[async_trait]
    impl TokenProvider for CountingProvider {
        async fn resolve_scope(&self, credential: &Credential) -> Result<ProviderScope> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            Ok(credential.default_scope())
        }

        async fn authenticate(
            &self,
            _credential: &Credential,
            _scope: Option<&ProviderScope>,
        ) -> Result<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AccessToken::new(format!("token-{}", n), self.lifetime))
        }
    }

    fn appliance() -> ApplianceAddress {
        ApplianceAddress::new("sg.example.com").unwrap()
    }

    fn credential() -> Credential {
        Credential::password("admin", SecretMaterial::from("pw")).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn authenticate_yields_token_and_lifetime() {
        let provider = CountingProvider::new(Duration::from_secs(600));
        let session = AuthenticationSession::authenticate(appliance(), provider, credential())
            .await
            .unwrap();

        assert_eq!(session.access_token().unwrap().as_str(), "token-1");
        assert_eq!(session.access_token_lifetime_remaining(), 600);
        assert_eq!(
            session.scope().unwrap().as_str(),
            "rsts:sts:primaryproviderid:local"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lifetime_decreases_and_clamps_at_zero() {
        let provider = CountingProvider::new(Duration::from_secs(10));
        let session = AuthenticationSession::authenticate(appliance(), provider, credential())
            .await
            .unwrap();

        let first = session.access_token_lifetime_remaining();
        tokio::time::advance(Duration::from_secs(4)).await;
        let second = session.access_token_lifetime_remaining();
        tokio::time::advance(Duration::from_secs(60)).await;

        assert!(second < first);
        assert_eq!(session.access_token_lifetime_remaining(), 0);
    }

    #[tokio::test]
    async fn unauthenticated_session_has_no_token() {
        let provider = CountingProvider::new(Duration::from_secs(10));
        let session = AuthenticationSession::new(appliance(), provider, credential());

        assert!(session.access_token().is_none());
        assert_eq!(session.access_token_lifetime_remaining(), 0);
    }

    #[tokio::test]
    async fn refresh_replaces_token_and_reuses_scope() {
        let provider = CountingProvider::new(Duration::from_secs(60));
        let session =
            AuthenticationSession::authenticate(appliance(), provider.clone(), credential())
                .await
                .unwrap();

        session.refresh_access_token().await.unwrap();

        assert_eq!(session.access_token().unwrap().as_str(), "token-2");
        assert_eq!(provider.resolves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_after_dispose_fails_without_calling_provider() {
        let provider = CountingProvider::new(Duration::from_secs(60));
        let session =
            AuthenticationSession::authenticate(appliance(), provider.clone(), credential())
                .await
                .unwrap();

        session.dispose();
        let err = session.refresh_access_token().await.unwrap_err();

        assert!(matches!(
            err,
            safeguard_core::Error::Auth(AuthError::SessionDisposed)
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(session.access_token().is_none());
    }

    #[tokio::test]
    async fn dispose_is_idempotent() {
        let provider = CountingProvider::new(Duration::from_secs(60));
        let session = AuthenticationSession::authenticate(appliance(), provider, credential())
            .await
            .unwrap();

        session.dispose();
        session.dispose();

        assert!(session.is_disposed());
        assert_eq!(session.access_token_lifetime_remaining(), 0);
    }

    #[tokio::test]
    async fn clone_is_independent_of_original() {
        let provider = CountingProvider::new(Duration::from_secs(60));
        let original =
            AuthenticationSession::authenticate(appliance(), provider.clone(), credential())
                .await
                .unwrap();

        let copy = original.try_clone().unwrap();
        assert_eq!(copy.access_token().unwrap().as_str(), "token-1");

        copy.dispose();
        assert_eq!(original.access_token().unwrap().as_str(), "token-1");

        original.refresh_access_token().await.unwrap();
        assert_eq!(original.access_token().unwrap().as_str(), "token-2");
        assert!(copy.access_token().is_none());
    }

    #[tokio::test]
    async fn clone_of_disposed_session_fails() {
        let provider = CountingProvider::new(Duration::from_secs(60));
        let session = AuthenticationSession::new(appliance(), provider, credential());
        session.dispose();

        assert!(session.try_clone().is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let provider = CountingProvider::new(Duration::from_secs(60));
        let session = AuthenticationSession::new(appliance(), provider, credential());
        let debug = format!("{:?}", session);
        assert!(debug.contains("password"));
        assert!(!debug.contains("pw"));
    }
}
