//! Owns the live booking sessions and runs the effects the state machine asks for.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::db::queries;
use crate::models::{Booking, BookingSession, PaymentQuote, Screen};
use crate::services::backend::BookingBackend;
use crate::services::flow::{transition, Effect, FlowError, FlowEvent, Stage};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    NotFound(String),
    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Snapshot sent to clients, on request and over the update stream.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: BookingSession,
    pub step: u8,
    pub quote: Option<PaymentQuote>,
}

impl From<BookingSession> for SessionView {
    fn from(session: BookingSession) -> Self {
        Self {
            step: session.screen.step(),
            quote: session.payment_quote(),
            session,
        }
    }
}

pub struct SessionController {
    sessions: Mutex<HashMap<String, BookingSession>>,
    backend: Arc<dyn BookingBackend>,
    db: Arc<Mutex<Connection>>,
    updates: broadcast::Sender<BookingSession>,
}

impl SessionController {
    pub fn new(backend: Arc<dyn BookingBackend>, db: Arc<Mutex<Connection>>) -> Arc<Self> {
        let (updates, _) = broadcast::channel(256);
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            backend,
            db,
            updates,
        })
    }

    pub fn create(&self) -> BookingSession {
        let session = BookingSession::new(uuid::Uuid::new_v4().to_string());
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session.clone());
        tracing::info!(session_id = %session.id, "booking session created");
        session
    }

    pub fn get(&self, id: &str) -> Result<BookingSession, SessionError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Every applied change for every session. Subscribers filter by id.
    pub fn subscribe(&self) -> broadcast::Receiver<BookingSession> {
        self.updates.subscribe()
    }

    /// Applies one event and starts whatever async work it requested.
    pub fn dispatch(
        self: &Arc<Self>,
        id: &str,
        event: FlowEvent,
    ) -> Result<BookingSession, SessionError> {
        let (step, changed, confirmed) = {
            let mut sessions = self.sessions.lock().unwrap();
            let current = sessions
                .get(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

            let step = transition(current, event)?;
            let changed = step.session != *current;
            let confirmed = current.screen != Screen::Confirmation
                && step.session.screen == Screen::Confirmation;

            if changed {
                sessions.insert(id.to_string(), step.session.clone());
            }
            (step, changed, confirmed)
        };

        if changed {
            tracing::info!(
                session_id = %id,
                screen = step.session.screen.as_str(),
                epoch = step.session.epoch,
                "session updated"
            );
            let _ = self.updates.send(step.session.clone());
        }

        if confirmed {
            self.record_booking(&step.session);
        }

        if let Some(effect) = step.effect {
            self.spawn_effect(id.to_string(), effect);
        }

        Ok(step.session)
    }

    fn record_booking(&self, session: &BookingSession) {
        let Some(booking) = Booking::from_session(session) else {
            tracing::error!(session_id = %session.id, "confirmed session is missing booking details");
            return;
        };

        let db = self.db.lock().unwrap();
        match queries::create_booking(&db, &booking) {
            Ok(()) => tracing::info!(
                session_id = %session.id,
                booking_id = %booking.id,
                total = booking.total_paid,
                "booking recorded"
            ),
            Err(e) => tracing::error!(
                session_id = %session.id,
                error = %e,
                "failed to record booking"
            ),
        }
    }

    fn is_current(&self, id: &str, epoch: u64) -> bool {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .map(|s| s.epoch == epoch)
            .unwrap_or(false)
    }

    fn complete(self: &Arc<Self>, id: &str, event: FlowEvent) {
        if let Err(e) = self.dispatch(id, event) {
            tracing::debug!(session_id = %id, error = %e, "completion not applied");
        }
    }

    fn spawn_effect(self: &Arc<Self>, id: String, effect: Effect) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            match effect {
                Effect::Transcribe { epoch } => controller.stream_transcript(&id, epoch).await,
                other => {
                    for event in run_effect(controller.backend.as_ref(), other).await {
                        controller.complete(&id, event);
                    }
                }
            }
        });
    }

    /// Forwards partial transcripts as they arrive, and stops the backend
    /// once the session has moved past this listening epoch.
    async fn stream_transcript(self: &Arc<Self>, id: &str, epoch: u64) {
        let (tx, mut rx) = mpsc::channel(16);
        let backend = Arc::clone(&self.backend);
        let task = tokio::spawn(async move { backend.transcribe(tx).await });

        while let Some(text) = rx.recv().await {
            if !self.is_current(id, epoch) {
                task.abort();
                return;
            }
            self.complete(id, FlowEvent::TranscriptUpdated { epoch, text });
        }

        let event = match task.await {
            Ok(Ok(())) => FlowEvent::TranscriptionFinished { epoch },
            Ok(Err(e)) => failed(epoch, Stage::Transcription, e),
            Err(e) => failed(epoch, Stage::Transcription, e.into()),
        };
        self.complete(id, event);
    }
}

fn failed(epoch: u64, stage: Stage, error: anyhow::Error) -> FlowEvent {
    tracing::error!(epoch, ?stage, error = %error, "backend call failed");
    FlowEvent::BackendFailed {
        epoch,
        stage,
        reason: error.to_string(),
    }
}

/// Runs one effect to completion and returns the events it produced, in order.
pub async fn run_effect(backend: &dyn BookingBackend, effect: Effect) -> Vec<FlowEvent> {
    match effect {
        Effect::Transcribe { epoch } => {
            let (tx, mut rx) = mpsc::channel(16);
            let collect = async {
                let mut events = vec![];
                while let Some(text) = rx.recv().await {
                    events.push(FlowEvent::TranscriptUpdated { epoch, text });
                }
                events
            };
            let (result, mut events) = tokio::join!(backend.transcribe(tx), collect);
            events.push(match result {
                Ok(()) => FlowEvent::TranscriptionFinished { epoch },
                Err(e) => failed(epoch, Stage::Transcription, e),
            });
            events
        }
        Effect::ExtractSymptoms { epoch, transcript } => {
            vec![match backend.extract_symptoms(&transcript).await {
                Ok(entities) => FlowEvent::SymptomsExtracted { epoch, entities },
                Err(e) => failed(epoch, Stage::SymptomExtraction, e),
            }]
        }
        Effect::VerifySlots { epoch, hospital } => {
            vec![match backend.verify_slots(&hospital).await {
                Ok(slots) => FlowEvent::SlotsVerified { epoch, slots },
                Err(e) => failed(epoch, Stage::SlotVerification, e),
            }]
        }
        Effect::Charge {
            epoch,
            method,
            quote,
        } => {
            vec![match backend.charge(method, quote.total).await {
                Ok(receipt) => FlowEvent::PaymentCompleted {
                    epoch,
                    method,
                    receipt,
                },
                Err(e) => failed(epoch, Stage::Payment, e),
            }]
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db;
    use crate::models::{BookingStatus, PaymentMethod};
    use crate::services::backend::{SimulatedBackend, SimulatedDelays};
    use crate::services::flow::UserAction;

    fn controller() -> Arc<SessionController> {
        let conn = db::init_db(":memory:").unwrap();
        SessionController::new(
            Arc::new(SimulatedBackend::new(SimulatedDelays::instant())),
            Arc::new(Mutex::new(conn)),
        )
    }

    async fn wait_for(
        controller: &SessionController,
        id: &str,
        screen: Screen,
    ) -> BookingSession {
        for _ in 0..200 {
            let session = controller.get(id).unwrap();
            if session.screen == screen {
                return session;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("session never reached {}", screen.as_str());
    }

    #[tokio::test]
    async fn test_run_effect_streams_transcript() {
        let backend = SimulatedBackend::new(SimulatedDelays::instant());
        let events = run_effect(&backend, Effect::Transcribe { epoch: 3 }).await;

        assert!(events.len() > 1);
        assert!(matches!(
            events.last(),
            Some(FlowEvent::TranscriptionFinished { epoch: 3 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let controller = controller();
        let err = controller
            .dispatch("nope", UserAction::StartListening.into())
            .unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_full_booking_is_recorded() {
        let controller = controller();
        let id = controller.create().id;

        controller
            .dispatch(
                &id,
                UserAction::SubmitText {
                    text: "fever and stomach pain".into(),
                }
                .into(),
            )
            .unwrap();
        wait_for(&controller, &id, Screen::EntityReview).await;

        for action in [
            UserAction::ConfirmEntities,
            UserAction::SelectSpecialty { id: 1 },
            UserAction::SelectHospital { id: 2 },
        ] {
            controller.dispatch(&id, action.into()).unwrap();
        }
        let session = controller.get(&id).unwrap();
        assert_eq!(session.screen, Screen::SlotSelection);

        let slot = session.available_slots[2];
        controller
            .dispatch(&id, UserAction::SelectSlot { slot }.into())
            .unwrap();
        controller
            .dispatch(
                &id,
                UserAction::SubmitPatientInfo {
                    patient: serde_json::from_value(serde_json::json!({
                        "name": "Asha Rao",
                        "age": 34,
                        "gender": "F",
                        "phone": "9876543210"
                    }))
                    .unwrap(),
                }
                .into(),
            )
            .unwrap();
        controller
            .dispatch(
                &id,
                UserAction::Pay {
                    method: PaymentMethod::Upi,
                }
                .into(),
            )
            .unwrap();

        let session = wait_for(&controller, &id, Screen::Confirmation).await;
        let payment = session.payment_info.unwrap();
        assert_eq!(payment.total, 650);

        let db = controller.db.lock().unwrap();
        let stored = queries::get_all_bookings(&db, Some(&BookingStatus::Confirmed), 10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].transaction_id, payment.transaction_id);
    }

    #[tokio::test]
    async fn test_updates_are_broadcast() {
        let controller = controller();
        let mut rx = controller.subscribe();
        let id = controller.create().id;

        controller
            .dispatch(&id, UserAction::StartListening.into())
            .unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.id, id);
        assert_eq!(update.screen, Screen::Listening);
    }
}
