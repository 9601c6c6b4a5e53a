//! Phone verification: form, one-time code, resend cooldown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::models::{
    AuthForm, AuthTab, FieldError, InputOutcome, OtpCountdown, OtpInput, UserType,
};
use crate::services::backend::OtpGateway;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthStage {
    Form,
    OtpSent,
    Verified,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("auth session {0} not found")]
    NotFound(String),
    #[error("please correct the highlighted fields")]
    InvalidForm(Vec<FieldError>),
    #[error("enter all 6 digits of the code")]
    IncompleteCode,
    #[error("the code you entered is incorrect")]
    IncorrectCode,
    #[error("you can resend the code in {0} seconds")]
    ResendTooSoon(u32),
    #[error("not available while {0:?}")]
    WrongStage(AuthStage),
    #[error("verification service unavailable: {0}")]
    Backend(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub id: String,
    pub user_type: UserType,
    pub tab: AuthTab,
    pub stage: AuthStage,
    /// `+91` prefixed, shown on the code screen.
    pub phone: String,
    pub otp: OtpInput,
    /// OTP box that should hold focus.
    pub focus: usize,
    pub countdown: OtpCountdown,
    pub redirect: Option<&'static str>,
    #[serde(skip)]
    epoch: u64,
}

impl AuthSession {
    fn require(&self, stage: AuthStage) -> Result<(), AuthError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(AuthError::WrongStage(self.stage))
        }
    }
}

pub struct AuthService {
    sessions: Mutex<HashMap<String, AuthSession>>,
    gateway: Arc<dyn OtpGateway>,
    tick: Duration,
}

impl AuthService {
    pub fn new(gateway: Arc<dyn OtpGateway>) -> Arc<Self> {
        Self::with_tick(gateway, Duration::from_secs(1))
    }

    pub fn with_tick(gateway: Arc<dyn OtpGateway>, tick: Duration) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            gateway,
            tick,
        })
    }

    pub fn get(&self, id: &str) -> Result<AuthSession, AuthError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AuthError::NotFound(id.to_string()))
    }

    /// Validates the form and sends the first code.
    pub async fn submit(self: &Arc<Self>, form: AuthForm) -> Result<AuthSession, AuthError> {
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(AuthError::InvalidForm(errors));
        }

        let phone = form.display_phone();
        self.gateway
            .send_otp(&phone)
            .await
            .map_err(AuthError::Backend)?;

        let session = AuthSession {
            id: uuid::Uuid::new_v4().to_string(),
            user_type: form.user_type,
            tab: form.tab,
            stage: AuthStage::OtpSent,
            phone,
            otp: OtpInput::new(),
            focus: 0,
            countdown: OtpCountdown::new(),
            redirect: None,
            epoch: 1,
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        self.start_countdown(&session.id, session.epoch);

        tracing::info!(auth_id = %session.id, user_type = ?session.user_type, "code sent");
        Ok(session)
    }

    pub async fn enter_digit(
        self: &Arc<Self>,
        id: &str,
        index: usize,
        value: char,
    ) -> Result<AuthSession, AuthError> {
        let complete = self.update_otp(id, |otp| otp.enter(index, value))?;
        self.verify_if(id, complete).await
    }

    pub fn backspace(&self, id: &str, index: usize) -> Result<AuthSession, AuthError> {
        self.update_otp(id, |otp| otp.backspace(index))?;
        self.get(id)
    }

    pub async fn paste(self: &Arc<Self>, id: &str, text: &str) -> Result<AuthSession, AuthError> {
        let complete = self.update_otp(id, |otp| otp.paste(text))?;
        self.verify_if(id, complete).await
    }

    fn update_otp(
        &self,
        id: &str,
        edit: impl FnOnce(&mut OtpInput) -> InputOutcome,
    ) -> Result<bool, AuthError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AuthError::NotFound(id.to_string()))?;
        session.require(AuthStage::OtpSent)?;

        let outcome = edit(&mut session.otp);
        session.focus = outcome.focus;
        Ok(outcome.complete)
    }

    /// Filling the last box submits the code without a separate tap.
    async fn verify_if(self: &Arc<Self>, id: &str, complete: bool) -> Result<AuthSession, AuthError> {
        if complete {
            self.verify(id).await
        } else {
            self.get(id)
        }
    }

    pub async fn verify(&self, id: &str) -> Result<AuthSession, AuthError> {
        let (phone, code) = {
            let sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get(id)
                .ok_or_else(|| AuthError::NotFound(id.to_string()))?;
            session.require(AuthStage::OtpSent)?;
            let code = session.otp.code().ok_or(AuthError::IncompleteCode)?;
            (session.phone.clone(), code)
        };

        let accepted = self
            .gateway
            .verify_otp(&phone, &code)
            .await
            .map_err(AuthError::Backend)?;

        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AuthError::NotFound(id.to_string()))?;
        // The user may have changed phone while the check was in flight.
        session.require(AuthStage::OtpSent)?;

        if !accepted {
            session.otp.clear();
            session.focus = 0;
            tracing::warn!(auth_id = %id, "code rejected");
            return Err(AuthError::IncorrectCode);
        }

        session.stage = AuthStage::Verified;
        session.epoch += 1;
        session.redirect = Some(session.user_type.redirect_path());
        tracing::info!(auth_id = %id, redirect = session.user_type.redirect_path(), "phone verified");
        Ok(session.clone())
    }

    pub async fn resend(self: &Arc<Self>, id: &str) -> Result<AuthSession, AuthError> {
        let phone = {
            let sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get(id)
                .ok_or_else(|| AuthError::NotFound(id.to_string()))?;
            session.require(AuthStage::OtpSent)?;
            if !session.countdown.can_resend() {
                return Err(AuthError::ResendTooSoon(session.countdown.remaining()));
            }
            session.phone.clone()
        };

        self.gateway
            .send_otp(&phone)
            .await
            .map_err(AuthError::Backend)?;

        let session = {
            let mut sessions = self.sessions.lock().unwrap();
            let session = sessions
                .get_mut(id)
                .ok_or_else(|| AuthError::NotFound(id.to_string()))?;
            // The user may have changed phone while the code was being sent.
            session.require(AuthStage::OtpSent)?;
            session.otp.clear();
            session.focus = 0;
            session.countdown.reset();
            session.epoch += 1;
            session.clone()
        };
        self.start_countdown(id, session.epoch);

        tracing::info!(auth_id = %id, "code resent");
        Ok(session)
    }

    /// Back to the form; the running countdown stops on its next tick.
    pub fn change_phone(&self, id: &str) -> Result<AuthSession, AuthError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AuthError::NotFound(id.to_string()))?;
        session.require(AuthStage::OtpSent)?;

        session.stage = AuthStage::Form;
        session.otp.clear();
        session.focus = 0;
        session.countdown.reset();
        session.epoch += 1;
        Ok(session.clone())
    }

    fn start_countdown(self: &Arc<Self>, id: &str, epoch: u64) {
        let service = Arc::clone(self);
        let id = id.to_string();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(service.tick);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let finished = {
                    let mut sessions = service.sessions.lock().unwrap();
                    match sessions.get_mut(&id) {
                        Some(session) if session.epoch == epoch => session.countdown.tick() == 0,
                        _ => true,
                    }
                };
                if finished {
                    break;
                }
            }
            tracing::debug!(auth_id = %id, epoch, "countdown stopped");
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::models::auth::OTP_COOLDOWN_SECS;
    use crate::services::backend::{SimulatedBackend, SimulatedDelays};

    fn service() -> Arc<AuthService> {
        AuthService::with_tick(
            Arc::new(SimulatedBackend::new(SimulatedDelays::instant())),
            Duration::from_millis(1),
        )
    }

    fn slow_service() -> Arc<AuthService> {
        AuthService::new(Arc::new(SimulatedBackend::new(SimulatedDelays::instant())))
    }

    fn form(user_type: UserType) -> AuthForm {
        AuthForm {
            user_type,
            tab: AuthTab::SignIn,
            name: None,
            phone: "98765 43210".into(),
            password: "secret".into(),
        }
    }

    struct RejectingGateway;

    #[async_trait]
    impl OtpGateway for RejectingGateway {
        async fn send_otp(&self, _phone: &str) -> anyhow::Result<()> {
            Ok(())
        }

        async fn verify_otp(&self, _phone: &str, _code: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
    }

    /// Sends the first code immediately and holds every later send until released.
    #[derive(Default)]
    struct HeldResend {
        sends: AtomicUsize,
        release: Notify,
    }

    #[async_trait]
    impl OtpGateway for HeldResend {
        async fn send_otp(&self, _phone: &str) -> anyhow::Result<()> {
            if self.sends.fetch_add(1, Ordering::SeqCst) > 0 {
                self.release.notified().await;
            }
            Ok(())
        }

        async fn verify_otp(&self, _phone: &str, _code: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_invalid_form_reports_fields() {
        let svc = slow_service();
        let bad = AuthForm {
            phone: "123".into(),
            password: String::new(),
            ..form(UserType::Patient)
        };
        let err = svc.submit(bad).await.unwrap_err();
        match err {
            AuthError::InvalidForm(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
                assert_eq!(fields, vec!["phone", "password"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_paste_auto_verifies_and_redirects() {
        let svc = slow_service();
        let session = svc.submit(form(UserType::Hospital)).await.unwrap();
        assert_eq!(session.stage, AuthStage::OtpSent);
        assert_eq!(session.phone, "+919876543210");

        let verified = svc.paste(&session.id, "12-34-56").await.unwrap();
        assert_eq!(verified.stage, AuthStage::Verified);
        assert_eq!(verified.redirect, Some("/dashboard"));
    }

    #[tokio::test]
    async fn test_digits_then_verify_for_patient() {
        let svc = slow_service();
        let id = svc.submit(form(UserType::Patient)).await.unwrap().id;

        for (i, c) in "12345".chars().enumerate() {
            let s = svc.enter_digit(&id, i, c).await.unwrap();
            assert_eq!(s.focus, i + 1);
        }
        assert!(matches!(svc.verify(&id).await, Err(AuthError::IncompleteCode)));

        let done = svc.enter_digit(&id, 5, '6').await.unwrap();
        assert_eq!(done.redirect, Some("/book"));
    }

    #[tokio::test]
    async fn test_resend_blocked_until_countdown_ends() {
        let svc = slow_service();
        let id = svc.submit(form(UserType::Patient)).await.unwrap().id;

        match svc.resend(&id).await {
            Err(AuthError::ResendTooSoon(secs)) => assert!(secs > 0),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_countdown_reaches_zero_then_resend_restarts_it() {
        let svc = service();
        let id = svc.submit(form(UserType::Patient)).await.unwrap().id;
        svc.enter_digit(&id, 0, '4').await.unwrap();

        for _ in 0..500 {
            if svc.get(&id).unwrap().countdown.can_resend() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(svc.get(&id).unwrap().countdown.remaining(), 0);

        let resent = svc.resend(&id).await.unwrap();
        assert_eq!(resent.countdown.remaining(), OTP_COOLDOWN_SECS);
        assert_eq!(resent.otp, OtpInput::new());
    }

    #[tokio::test]
    async fn test_change_phone_returns_to_form() {
        let svc = slow_service();
        let id = svc.submit(form(UserType::Patient)).await.unwrap().id;
        svc.paste(&id, "123").await.unwrap();

        let s = svc.change_phone(&id).unwrap();
        assert_eq!(s.stage, AuthStage::Form);
        assert_eq!(s.otp, OtpInput::new());
        assert!(matches!(
            svc.enter_digit(&id, 0, '1').await,
            Err(AuthError::WrongStage(AuthStage::Form))
        ));
    }

    #[tokio::test]
    async fn test_resend_after_phone_change_keeps_form() {
        let gateway = Arc::new(HeldResend::default());
        let svc = AuthService::with_tick(gateway.clone(), Duration::from_millis(1));
        let id = svc.submit(form(UserType::Patient)).await.unwrap().id;

        for _ in 0..500 {
            if svc.get(&id).unwrap().countdown.can_resend() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let resend = tokio::spawn({
            let svc = Arc::clone(&svc);
            let id = id.clone();
            async move { svc.resend(&id).await }
        });
        while gateway.sends.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        svc.change_phone(&id).unwrap();
        gateway.release.notify_one();

        assert!(matches!(
            resend.await.unwrap(),
            Err(AuthError::WrongStage(AuthStage::Form))
        ));
        let s = svc.get(&id).unwrap();
        assert_eq!(s.stage, AuthStage::Form);
        assert_eq!(s.otp, OtpInput::new());
    }

    #[tokio::test]
    async fn test_rejected_code_clears_input() {
        let svc = AuthService::new(Arc::new(RejectingGateway));
        let id = svc.submit(form(UserType::Patient)).await.unwrap().id;

        assert!(matches!(
            svc.paste(&id, "000000").await,
            Err(AuthError::IncorrectCode)
        ));
        let s = svc.get(&id).unwrap();
        assert_eq!(s.stage, AuthStage::OtpSent);
        assert!(!s.otp.is_complete());
    }
}
