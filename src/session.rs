//! Authenticated session: saved cookies first, credential login second.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::approval::{INTERACTIVE_WAIT_FLOOR, OperatorInput, read_line_within};
use crate::browser::{CookieRecord, Locator, Surface, goto_with_retry, selectors};
use crate::config::Credentials;
use crate::error::SessionError;
use crate::pacing::{PacePoint, Pacer};
use crate::triage::discovery::NAVIGATION_TIMEOUT;

/// How the session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMethod {
    /// The surface was already logged in.
    Active,
    SavedSession,
    Credentials,
}

/// Cookie file on disk.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved cookies, or `None` when no file exists.
    pub async fn load(&self) -> Result<Option<Vec<CookieRecord>>, SessionError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let cookies: Vec<CookieRecord> = serde_json::from_str(&raw)?;
        Ok(Some(cookies))
    }

    pub async fn save(&self, cookies: &[CookieRecord]) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(cookies)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

/// Establishes an authenticated session on a surface.
pub struct SessionManager {
    store: SessionStore,
    credentials: Option<Credentials>,
    non_interactive: bool,
    operator: Arc<dyn OperatorInput>,
    locator: Locator,
    pacer: Pacer,
}

impl SessionManager {
    pub fn new(
        store: SessionStore,
        credentials: Option<Credentials>,
        non_interactive: bool,
        operator: Arc<dyn OperatorInput>,
    ) -> Self {
        Self {
            store,
            credentials,
            non_interactive,
            operator,
            locator: Locator::default(),
            pacer: Pacer::default(),
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Keep a live session, or establish a new one when it has lapsed.
    pub async fn ensure<S: Surface + ?Sized>(&self, surface: &S) -> Result<LoginMethod, SessionError> {
        if self.is_active(surface).await {
            debug!("Session still active");
            return Ok(LoginMethod::Active);
        }
        info!("No active session, establishing one");
        self.establish(surface).await
    }

    async fn is_active<S: Surface + ?Sized>(&self, surface: &S) -> bool {
        if let Err(e) = goto_with_retry(surface, selectors::FEED_URL, NAVIGATION_TIMEOUT).await {
            debug!(error = %e, "Feed unreachable while checking session");
            return false;
        }
        self.locator
            .locate(surface, &selectors::authenticated_marker(), None)
            .await
            .is_some()
    }

    /// Try the saved session, then log in with credentials and save the new one.
    pub async fn establish<S: Surface + ?Sized>(&self, surface: &S) -> Result<LoginMethod, SessionError> {
        match self.store.load().await {
            Ok(Some(cookies)) => match self.resume(surface, &cookies).await {
                Ok(()) => {
                    info!(path = %self.store.path().display(), "Resumed saved session");
                    return Ok(LoginMethod::SavedSession);
                }
                Err(e) => warn!(error = %e, "Saved session rejected, logging in with credentials"),
            },
            Ok(None) => debug!(path = %self.store.path().display(), "No saved session"),
            Err(e) => warn!(error = %e, "Saved session unreadable, logging in with credentials"),
        }

        let credentials = self.credentials().await?;
        self.login(surface, &credentials).await?;
        info!(email = %credentials.email, "Logged in with credentials");

        match surface.cookies().await {
            Ok(cookies) => {
                if let Err(e) = self.store.save(&cookies).await {
                    warn!(path = %self.store.path().display(), error = %e, "Could not save session");
                }
            }
            Err(e) => warn!(error = %e, "Could not read session cookies"),
        }
        Ok(LoginMethod::Credentials)
    }

    async fn resume<S: Surface + ?Sized>(&self, surface: &S, cookies: &[CookieRecord]) -> Result<(), SessionError> {
        surface.set_cookies(cookies).await?;
        goto_with_retry(surface, selectors::FEED_URL, NAVIGATION_TIMEOUT).await?;
        self.pacer.pause(PacePoint::Navigate).await;
        if self
            .locator
            .locate(surface, &selectors::authenticated_marker(), None)
            .await
            .is_none()
        {
            return Err(SessionError::Invalid("no authenticated marker after loading cookies".into()));
        }
        Ok(())
    }

    async fn credentials(&self) -> Result<Credentials, SessionError> {
        if let Some(credentials) = &self.credentials {
            return Ok(credentials.clone());
        }
        if self.non_interactive {
            return Err(SessionError::CredentialsUnavailable);
        }

        let email = self.ask("Account email: ").await;
        let password = self.ask("Account password: ").await;
        match (email, password) {
            (Some(email), Some(password)) => Ok(Credentials {
                email,
                password: SecretString::from(password),
            }),
            _ => Err(SessionError::CredentialsUnavailable),
        }
    }

    async fn ask(&self, prompt: &str) -> Option<String> {
        self.operator.drain();
        self.operator.present(prompt);
        read_line_within(&self.operator, INTERACTIVE_WAIT_FLOOR)
            .await
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
    }

    async fn login<S: Surface + ?Sized>(&self, surface: &S, credentials: &Credentials) -> Result<(), SessionError> {
        goto_with_retry(surface, selectors::HOME_URL, NAVIGATION_TIMEOUT).await?;
        self.pacer.pause(PacePoint::Navigate).await;

        match self.locator.locate(surface, &selectors::sign_in_link(), None).await {
            Some(link) => {
                surface.click(&link).await?;
                self.pacer.pause(PacePoint::Navigate).await;
            }
            None => {
                debug!("No sign-in control, opening the login page directly");
                goto_with_retry(surface, selectors::LOGIN_URL, NAVIGATION_TIMEOUT).await?;
            }
        }

        let username = self
            .locator
            .locate(surface, &selectors::username_field(), None)
            .await
            .ok_or_else(|| SessionError::Invalid("login form not found".into()))?;
        self.type_paced(surface, &username, &credentials.email).await?;
        self.pacer.pause(PacePoint::Step).await;

        let password = self
            .locator
            .locate(surface, &selectors::password_field(), None)
            .await
            .ok_or_else(|| SessionError::Invalid("password field not found".into()))?;
        self.type_paced(surface, &password, credentials.password.expose_secret())
            .await?;
        self.pacer.pause(PacePoint::Step).await;

        self.submit(surface).await?;
        if self
            .locator
            .locate(surface, &selectors::post_login_marker(), None)
            .await
            .is_none()
        {
            return Err(SessionError::Invalid("no response to the login form".into()));
        }

        if let Some(pin_field) = self
            .locator
            .locate(surface, &selectors::verification_pin_field(), None)
            .await
        {
            self.verify_pin(surface, &pin_field).await?;
        }

        if self
            .locator
            .locate(surface, &selectors::authenticated_marker(), None)
            .await
            .is_none()
        {
            return Err(SessionError::Invalid("login did not reach an authenticated page".into()));
        }
        Ok(())
    }

    async fn verify_pin<S: Surface + ?Sized>(&self, surface: &S, field: &S::Node) -> Result<(), SessionError> {
        if self.non_interactive {
            return Err(SessionError::Invalid(
                "verification PIN required but no operator is present".into(),
            ));
        }
        info!("Verification PIN requested");
        let pin = self
            .ask("Verification PIN from your email: ")
            .await
            .ok_or_else(|| SessionError::Invalid("no verification PIN entered".into()))?;
        self.type_paced(surface, field, &pin).await?;
        self.submit(surface).await?;
        self.pacer.pause(PacePoint::Navigate).await;
        Ok(())
    }

    async fn submit<S: Surface + ?Sized>(&self, surface: &S) -> Result<(), SessionError> {
        let button = self
            .locator
            .locate(surface, &selectors::submit_button(), None)
            .await
            .ok_or_else(|| SessionError::Invalid("submit control not found".into()))?;
        surface.click(&button).await?;
        Ok(())
    }

    async fn type_paced<S: Surface + ?Sized>(&self, surface: &S, field: &S::Node, text: &str) -> Result<(), SessionError> {
        surface.click(field).await?;
        surface.clear(field).await?;
        for ch in text.chars() {
            let mut buf = [0u8; 4];
            surface.type_text(field, ch.encode_utf8(&mut buf)).await?;
            self.pacer.pause(PacePoint::Keystroke).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::approval::NoOperator;
    use crate::browser::memory::{FakeAccount, MemorySurface, SESSION_COOKIE};

    struct LinesOperator {
        lines: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl OperatorInput for LinesOperator {
        fn present(&self, _text: &str) {}

        async fn read_line(&self) -> Option<String> {
            let mut lines = self.lines.lock().unwrap();
            if lines.is_empty() {
                None
            } else {
                Some(lines.remove(0).to_string())
            }
        }

        fn drain(&self) {}
    }

    fn account(pin: Option<&str>) -> FakeAccount {
        FakeAccount {
            email: "me@example.com".into(),
            password: "hunter2".into(),
            pin: pin.map(str::to_string),
            token: "AQEDAT-token".into(),
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            email: "me@example.com".into(),
            password: SecretString::from("hunter2"),
        }
    }

    fn session_cookie(value: &str) -> CookieRecord {
        CookieRecord {
            name: SESSION_COOKIE.into(),
            value: value.into(),
            domain: ".linkedin.com".into(),
            path: "/".into(),
            expires: -1.0,
            http_only: true,
            secure: true,
            same_site: None,
        }
    }

    fn manager(
        dir: &tempfile::TempDir,
        credentials: Option<Credentials>,
        non_interactive: bool,
        operator: Arc<dyn OperatorInput>,
    ) -> SessionManager {
        SessionManager::new(
            SessionStore::new(dir.path().join("cookies.json")),
            credentials,
            non_interactive,
            operator,
        )
        .with_pacer(Pacer::instant())
    }

    #[tokio::test]
    async fn store_round_trips_camel_case_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested").join("cookies.json"));
        assert!(store.load().await.unwrap().is_none());

        store.save(&[session_cookie("abc")]).await.unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"httpOnly\""));
        assert_eq!(store.load().await.unwrap().unwrap()[0].value, "abc");
    }

    #[tokio::test(start_paused = true)]
    async fn saved_session_skips_login() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, None, true, Arc::new(NoOperator));
        manager.store.save(&[session_cookie("AQEDAT-token")]).await.unwrap();

        let surface = MemorySurface::requiring_login(account(None));
        assert_eq!(manager.establish(&surface).await.unwrap(), LoginMethod::SavedSession);
        assert!(surface.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_session_falls_back_to_credentials_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, Some(credentials()), true, Arc::new(NoOperator));
        manager.store.save(&[session_cookie("expired")]).await.unwrap();

        let surface = MemorySurface::requiring_login(account(None));
        assert_eq!(manager.establish(&surface).await.unwrap(), LoginMethod::Credentials);
        assert!(surface.is_authenticated());

        let saved = manager.store.load().await.unwrap().unwrap();
        assert_eq!(saved[0].value, "AQEDAT-token");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credentials_are_fatal_without_operator() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, None, true, Arc::new(NoOperator));
        let surface = MemorySurface::requiring_login(account(None));

        let err = manager.establish(&surface).await.unwrap_err();
        assert!(matches!(err, SessionError::CredentialsUnavailable));
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_password_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let wrong = Credentials {
            email: "me@example.com".into(),
            password: SecretString::from("nope"),
        };
        let manager = manager(&dir, Some(wrong), true, Arc::new(NoOperator));
        let surface = MemorySurface::requiring_login(account(None));

        let err = manager.establish(&surface).await.unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));
        assert!(!surface.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn interactive_login_prompts_for_credentials_and_pin() {
        let dir = tempfile::tempdir().unwrap();
        let operator = Arc::new(LinesOperator {
            lines: Mutex::new(vec!["me@example.com", "hunter2", "424242"]),
        });
        let manager = manager(&dir, None, false, operator);
        let surface = MemorySurface::requiring_login(account(Some("424242")));

        assert_eq!(manager.establish(&surface).await.unwrap(), LoginMethod::Credentials);
        assert!(surface.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn live_session_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, Some(credentials()), true, Arc::new(NoOperator));
        let surface = MemorySurface::requiring_login(account(None));

        assert_eq!(manager.ensure(&surface).await.unwrap(), LoginMethod::Credentials);
        assert_eq!(manager.ensure(&surface).await.unwrap(), LoginMethod::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn lapsed_session_is_re_established() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, Some(credentials()), true, Arc::new(NoOperator));
        let surface = MemorySurface::requiring_login(account(None));
        manager.ensure(&surface).await.unwrap();

        surface.expire_session();
        assert_eq!(manager.ensure(&surface).await.unwrap(), LoginMethod::Credentials);
        assert!(surface.is_authenticated());
        let saved = manager.store.load().await.unwrap().unwrap();
        assert_eq!(saved[0].value, "AQEDAT-token-revoked");
    }

    #[tokio::test(start_paused = true)]
    async fn pin_without_operator_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir, Some(credentials()), true, Arc::new(NoOperator));
        let surface = MemorySurface::requiring_login(account(Some("424242")));

        let err = manager.establish(&surface).await.unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));
    }
}
