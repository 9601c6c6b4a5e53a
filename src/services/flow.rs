//! The booking conversation as a pure state machine.
//!
//! [`transition`] takes the current session and one event and returns the
//! next session, plus at most one [`Effect`]: a request for async work whose
//! result comes back later as another [`FlowEvent`]. Nothing here sleeps,
//! locks, or talks to a backend.

use serde::{Deserialize, Serialize};

use crate::models::catalog::{find_specialty, hospitals_for};
use crate::models::{
    BookingSession, ChargeReceipt, Entity, Hospital, PatientForm, PatientInfoError, PaymentInfo,
    PaymentMethod, PaymentQuote, Screen, Slot, Speaker,
};

const SYMPTOMS_NOTED: &str =
    "Thank you. I've noted your symptoms. Let me recommend the best specialists for you...";
const ALL_ENTITIES_REMOVED: &str =
    "I notice you removed all symptoms. Could you please tell me what's bothering you?";
const NOTHING_EXTRACTED: &str =
    "I couldn't pick out any symptoms from that. Could you describe what's bothering you?";
const RECOMMEND_SPECIALISTS: &str =
    "Based on your symptoms, I recommend seeing one of these specialists:";
const HOSPITAL_OPTIONS: &str = "Here are the best options for you:";
const PICK_SLOT: &str = "Please pick a time that works for you.";
const ASK_PATIENT_INFO: &str = "Almost done. Please share the patient's details.";
const PAYMENT_DONE: &str = "Payment successful. Your appointment is confirmed!";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserAction {
    StartListening,
    StopListening,
    CancelListening,
    SubmitText { text: String },
    RemoveEntity { id: u32 },
    ConfirmEntities,
    SelectSpecialty { id: u32 },
    SelectHospital { id: u32 },
    SelectSlot { slot: Slot },
    SubmitPatientInfo { patient: PatientForm },
    Pay { method: PaymentMethod },
    StartOver,
}

impl UserAction {
    pub fn name(&self) -> &'static str {
        match self {
            UserAction::StartListening => "start_listening",
            UserAction::StopListening => "stop_listening",
            UserAction::CancelListening => "cancel_listening",
            UserAction::SubmitText { .. } => "submit_text",
            UserAction::RemoveEntity { .. } => "remove_entity",
            UserAction::ConfirmEntities => "confirm_entities",
            UserAction::SelectSpecialty { .. } => "select_specialty",
            UserAction::SelectHospital { .. } => "select_hospital",
            UserAction::SelectSlot { .. } => "select_slot",
            UserAction::SubmitPatientInfo { .. } => "submit_patient_info",
            UserAction::Pay { .. } => "pay",
            UserAction::StartOver => "start_over",
        }
    }
}

/// The async step a failure came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Transcription,
    SymptomExtraction,
    SlotVerification,
    Payment,
}

#[derive(Debug, Clone)]
pub enum FlowEvent {
    User(UserAction),
    TranscriptUpdated { epoch: u64, text: String },
    TranscriptionFinished { epoch: u64 },
    SymptomsExtracted { epoch: u64, entities: Vec<Entity> },
    SlotsVerified { epoch: u64, slots: Vec<Slot> },
    PaymentCompleted {
        epoch: u64,
        method: PaymentMethod,
        receipt: ChargeReceipt,
    },
    BackendFailed {
        epoch: u64,
        stage: Stage,
        reason: String,
    },
}

impl From<UserAction> for FlowEvent {
    fn from(action: UserAction) -> Self {
        FlowEvent::User(action)
    }
}

impl FlowEvent {
    fn epoch(&self) -> Option<u64> {
        match self {
            FlowEvent::User(_) => None,
            FlowEvent::TranscriptUpdated { epoch, .. }
            | FlowEvent::TranscriptionFinished { epoch }
            | FlowEvent::SymptomsExtracted { epoch, .. }
            | FlowEvent::SlotsVerified { epoch, .. }
            | FlowEvent::PaymentCompleted { epoch, .. }
            | FlowEvent::BackendFailed { epoch, .. } => Some(*epoch),
        }
    }
}

/// Async work requested by a transition. The epoch is the ticket the
/// completion must carry to be accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Transcribe {
        epoch: u64,
    },
    ExtractSymptoms {
        epoch: u64,
        transcript: String,
    },
    VerifySlots {
        epoch: u64,
        hospital: Hospital,
    },
    Charge {
        epoch: u64,
        method: PaymentMethod,
        quote: PaymentQuote,
    },
}

#[derive(Debug, Clone)]
pub struct Step {
    pub session: BookingSession,
    pub effect: Option<Effect>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("{action} is not allowed on the {screen} screen")]
    InvalidTransition {
        screen: &'static str,
        action: &'static str,
    },
    #[error("please describe your symptoms first")]
    EmptyTranscript,
    #[error("no symptom with id {0}")]
    UnknownEntity(u32),
    #[error("no symptoms left to confirm")]
    NoEntities,
    #[error("unknown specialty {0}")]
    UnknownSpecialty(u32),
    #[error("hospital {0} is not offered for the selected specialty")]
    HospitalNotOffered(u32),
    #[error("slot {0} is not offered by the selected hospital")]
    SlotNotOffered(Slot),
    #[error(transparent)]
    InvalidPatientInfo(#[from] PatientInfoError),
}

enum Outcome {
    Ignored,
    Next(Option<Effect>),
}

pub fn transition(session: &BookingSession, event: FlowEvent) -> Result<Step, FlowError> {
    let mut next = session.clone();

    if let FlowEvent::User(action) = event {
        let effect = apply_action(&mut next, action)?;
        return Ok(Step {
            session: next,
            effect,
        });
    }

    if event.epoch() != Some(session.epoch) {
        tracing::debug!(
            session_id = %session.id,
            epoch = session.epoch,
            event_epoch = ?event.epoch(),
            "dropping stale completion"
        );
        return Ok(unchanged(session));
    }

    match apply_completion(&mut next, event) {
        Outcome::Next(effect) => Ok(Step {
            session: next,
            effect,
        }),
        Outcome::Ignored => {
            tracing::debug!(
                session_id = %session.id,
                screen = session.screen.as_str(),
                "completion does not apply to current screen"
            );
            Ok(unchanged(session))
        }
    }
}

fn unchanged(session: &BookingSession) -> Step {
    Step {
        session: session.clone(),
        effect: None,
    }
}

fn require(session: &BookingSession, screen: Screen, action: &UserAction) -> Result<(), FlowError> {
    if session.screen == screen {
        Ok(())
    } else {
        Err(invalid(session, action))
    }
}

fn invalid(session: &BookingSession, action: &UserAction) -> FlowError {
    FlowError::InvalidTransition {
        screen: session.screen.as_str(),
        action: action.name(),
    }
}

/// Hands out a new ticket, making anything already in flight stale.
fn issue(session: &mut BookingSession) -> u64 {
    session.epoch += 1;
    session.epoch
}

/// The input-awaiting screen to fall back to: the welcome screen on a fresh
/// session, the re-prompt once a conversation has started.
fn input_prompt(session: &BookingSession) -> Screen {
    if session.conversation_history.is_empty() {
        Screen::Welcome
    } else {
        Screen::AwaitingInput
    }
}

fn apply_action(next: &mut BookingSession, action: UserAction) -> Result<Option<Effect>, FlowError> {
    match &action {
        UserAction::StartListening => {
            if !next.screen.accepts_input() {
                return Err(invalid(next, &action));
            }
            next.transcript.clear();
            next.screen = Screen::Listening;
            Ok(Some(Effect::Transcribe { epoch: issue(next) }))
        }

        UserAction::StopListening => {
            require(next, Screen::Listening, &action)?;
            Ok(finish_listening(next))
        }

        UserAction::CancelListening => {
            require(next, Screen::Listening, &action)?;
            issue(next);
            next.transcript.clear();
            next.screen = input_prompt(next);
            Ok(None)
        }

        UserAction::SubmitText { text } => {
            if !next.screen.accepts_input() {
                return Err(invalid(next, &action));
            }
            let text = text.trim();
            if text.is_empty() {
                return Err(FlowError::EmptyTranscript);
            }
            next.transcript = text.to_string();
            next.say(Speaker::User, text);
            next.screen = Screen::Processing;
            Ok(Some(Effect::ExtractSymptoms {
                epoch: issue(next),
                transcript: next.transcript.clone(),
            }))
        }

        UserAction::RemoveEntity { id } => {
            require(next, Screen::EntityReview, &action)?;
            let pos = next
                .entities
                .iter()
                .position(|e| e.id == *id)
                .ok_or(FlowError::UnknownEntity(*id))?;
            next.entities.remove(pos);

            if next.entities.is_empty() {
                next.transcript.clear();
                next.say(Speaker::Assistant, ALL_ENTITIES_REMOVED);
                next.screen = Screen::AwaitingInput;
            }
            Ok(None)
        }

        UserAction::ConfirmEntities => {
            require(next, Screen::EntityReview, &action)?;
            if next.entities.is_empty() {
                return Err(FlowError::NoEntities);
            }
            next.say(Speaker::Assistant, RECOMMEND_SPECIALISTS);
            next.screen = Screen::SpecialtySelection;
            Ok(None)
        }

        UserAction::SelectSpecialty { id } => {
            require(next, Screen::SpecialtySelection, &action)?;
            let specialty = find_specialty(*id).ok_or(FlowError::UnknownSpecialty(*id))?;
            next.say(
                Speaker::Assistant,
                format!(
                    "Great choice. Let me find available {} doctors near you...",
                    specialty.name
                ),
            );
            next.say(Speaker::Assistant, HOSPITAL_OPTIONS);
            next.selected_specialty = Some(specialty);
            next.screen = Screen::HospitalSelection;
            Ok(None)
        }

        UserAction::SelectHospital { id } => {
            require(next, Screen::HospitalSelection, &action)?;
            let specialty_id = next
                .selected_specialty
                .as_ref()
                .map(|s| s.id)
                .ok_or_else(|| invalid(next, &action))?;
            let hospital = hospitals_for(specialty_id)
                .into_iter()
                .find(|h| h.id == *id)
                .ok_or(FlowError::HospitalNotOffered(*id))?;

            next.selected_slot = None;
            next.selected_hospital = Some(hospital.clone());

            if hospital.requires_slot_verification() {
                next.available_slots.clear();
                next.say(
                    Speaker::Assistant,
                    format!(
                        "{}'s clinic isn't in our instant network. To verify the slot, I will now call the clinic on your behalf. This may take 1-2 minutes.",
                        hospital.doctor
                    ),
                );
                next.screen = Screen::VerifyingSlots;
                Ok(Some(Effect::VerifySlots {
                    epoch: issue(next),
                    hospital,
                }))
            } else {
                next.available_slots = hospital.slots;
                next.say(Speaker::Assistant, PICK_SLOT);
                next.screen = Screen::SlotSelection;
                Ok(None)
            }
        }

        UserAction::SelectSlot { slot } => {
            require(next, Screen::SlotSelection, &action)?;
            if !next.available_slots.contains(slot) {
                return Err(FlowError::SlotNotOffered(*slot));
            }
            next.selected_slot = Some(*slot);
            next.say(Speaker::Assistant, ASK_PATIENT_INFO);
            next.screen = Screen::PatientInfo;
            Ok(None)
        }

        UserAction::SubmitPatientInfo { patient } => {
            require(next, Screen::PatientInfo, &action)?;
            let info = patient.clone().into_patient_info()?;
            next.patient_info = Some(info);

            if let Some(quote) = next.payment_quote() {
                next.say(
                    Speaker::Assistant,
                    format!(
                        "Consultation fee ₹{} + platform fee ₹{}. Total payable: ₹{}.",
                        quote.consultation_fee, quote.platform_fee, quote.total
                    ),
                );
            }
            next.screen = Screen::Payment;
            Ok(None)
        }

        UserAction::Pay { method } => {
            require(next, Screen::Payment, &action)?;
            let quote = next.payment_quote().ok_or_else(|| invalid(next, &action))?;
            next.screen = Screen::ProcessingPayment;
            Ok(Some(Effect::Charge {
                epoch: issue(next),
                method: *method,
                quote,
            }))
        }

        UserAction::StartOver => {
            *next = next.reset();
            Ok(None)
        }
    }
}

/// Leaves the listening screen: an empty transcript goes back to the input
/// prompt, anything else is handed to symptom processing.
fn finish_listening(next: &mut BookingSession) -> Option<Effect> {
    let transcript = next.transcript.trim().to_string();
    if transcript.is_empty() {
        issue(next);
        next.screen = input_prompt(next);
        return None;
    }

    next.transcript = transcript.clone();
    next.say(Speaker::User, transcript.clone());
    next.screen = Screen::Processing;
    Some(Effect::ExtractSymptoms {
        epoch: issue(next),
        transcript,
    })
}

fn apply_completion(next: &mut BookingSession, event: FlowEvent) -> Outcome {
    match (next.screen, event) {
        (Screen::Listening, FlowEvent::TranscriptUpdated { text, .. }) => {
            next.transcript = text;
            Outcome::Next(None)
        }

        (Screen::Listening, FlowEvent::TranscriptionFinished { .. }) => {
            Outcome::Next(finish_listening(next))
        }

        (Screen::Processing, FlowEvent::SymptomsExtracted { entities, .. }) => {
            if entities.is_empty() {
                next.transcript.clear();
                next.say(Speaker::Assistant, NOTHING_EXTRACTED);
                next.screen = Screen::AwaitingInput;
            } else {
                next.entities = entities;
                next.say(Speaker::Assistant, SYMPTOMS_NOTED);
                next.screen = Screen::EntityReview;
            }
            Outcome::Next(None)
        }

        (Screen::VerifyingSlots, FlowEvent::SlotsVerified { slots, .. }) => {
            let doctor = next
                .selected_hospital
                .as_ref()
                .map(|h| h.doctor.clone())
                .unwrap_or_default();

            if slots.is_empty() {
                next.selected_hospital = None;
                next.say(
                    Speaker::Assistant,
                    format!("{doctor}'s clinic has no open slots right now. Please choose another option."),
                );
                next.screen = Screen::HospitalSelection;
            } else {
                next.available_slots = slots;
                next.say(
                    Speaker::Assistant,
                    format!("Good news! {doctor}'s clinic confirmed these slots. {PICK_SLOT}"),
                );
                next.screen = Screen::SlotSelection;
            }
            Outcome::Next(None)
        }

        (
            Screen::ProcessingPayment,
            FlowEvent::PaymentCompleted {
                method, receipt, ..
            },
        ) => {
            let Some(quote) = next.payment_quote() else {
                return Outcome::Ignored;
            };
            next.payment_info = Some(PaymentInfo::completed(method, quote, receipt));
            next.say(Speaker::Assistant, PAYMENT_DONE);
            next.screen = Screen::Confirmation;
            Outcome::Next(None)
        }

        (screen, FlowEvent::BackendFailed { stage, reason, .. }) => {
            tracing::warn!(session_id = %next.id, ?stage, %reason, "backend step failed");
            match (screen, stage) {
                (Screen::Listening, Stage::Transcription) => {
                    next.transcript.clear();
                    next.screen = input_prompt(next);
                    next.say(
                        Speaker::Assistant,
                        "I couldn't hear that clearly. Please try again or type your symptoms.",
                    );
                }
                (Screen::Processing, Stage::SymptomExtraction) => {
                    next.transcript.clear();
                    next.say(
                        Speaker::Assistant,
                        "Sorry, I couldn't process that. Could you describe your symptoms again?",
                    );
                    next.screen = Screen::AwaitingInput;
                }
                (Screen::VerifyingSlots, Stage::SlotVerification) => {
                    let clinic = next
                        .selected_hospital
                        .take()
                        .map(|h| h.clinic)
                        .unwrap_or_default();
                    next.say(
                        Speaker::Assistant,
                        format!("We couldn't reach {clinic} to confirm a slot. Please choose another option."),
                    );
                    next.screen = Screen::HospitalSelection;
                }
                (Screen::ProcessingPayment, Stage::Payment) => {
                    next.say(
                        Speaker::Assistant,
                        "The payment could not be completed. You have not been charged; please try again.",
                    );
                    next.screen = Screen::Payment;
                }
                _ => return Outcome::Ignored,
            }
            Outcome::Next(None)
        }

        _ => Outcome::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::{find_hospital, GENERAL_PHYSICIAN};
    use crate::models::{AgeInput, EntityCategory};
    use chrono::NaiveDateTime;

    fn act(session: &BookingSession, action: UserAction) -> Step {
        transition(session, action.into()).unwrap()
    }

    fn demo_entities() -> Vec<Entity> {
        vec![
            Entity::symptom(1, "Fever"),
            Entity::symptom(2, "Stomach Pain"),
            Entity::duration(3, "2 Days"),
        ]
    }

    fn patient_form() -> PatientForm {
        PatientForm {
            name: "Test User".into(),
            age: Some(AgeInput::Number(30)),
            gender: "M".into(),
            phone: "9999999999".into(),
            email: None,
            notes: None,
            attachments: vec![],
        }
    }

    /// Walks a session up to entity review via the text path.
    fn at_entity_review() -> BookingSession {
        let s = BookingSession::new("s-1");
        let step = act(&s, UserAction::SubmitText { text: "I have fever and stomach pain".into() });
        let epoch = match step.effect {
            Some(Effect::ExtractSymptoms { epoch, ref transcript }) => {
                assert_eq!(transcript, "I have fever and stomach pain");
                epoch
            }
            other => panic!("unexpected effect {other:?}"),
        };
        transition(
            &step.session,
            FlowEvent::SymptomsExtracted {
                epoch,
                entities: demo_entities(),
            },
        )
        .unwrap()
        .session
    }

    fn at_hospital_selection() -> BookingSession {
        let s = act(&at_entity_review(), UserAction::ConfirmEntities).session;
        act(&s, UserAction::SelectSpecialty { id: GENERAL_PHYSICIAN }).session
    }

    #[test]
    fn test_text_path_visits_screens_in_order() {
        let mut steps = vec![];
        let s = BookingSession::new("s-1");
        steps.push(s.screen.step());

        let s = at_entity_review();
        assert_eq!(s.screen, Screen::EntityReview);
        let s = act(&s, UserAction::ConfirmEntities).session;
        steps.push(s.screen.step());
        let s = act(&s, UserAction::SelectSpecialty { id: GENERAL_PHYSICIAN }).session;
        steps.push(s.screen.step());
        let s = act(&s, UserAction::SelectHospital { id: 2 }).session;
        steps.push(s.screen.step());
        let slot = Slot::parse("2025-11-14 4:00 PM").unwrap();
        let s = act(&s, UserAction::SelectSlot { slot }).session;
        steps.push(s.screen.step());
        let s = act(&s, UserAction::SubmitPatientInfo { patient: patient_form() }).session;
        steps.push(s.screen.step());

        assert_eq!(steps, vec![1, 5, 6, 7, 8, 9]);
        assert_eq!(s.screen, Screen::Payment);
    }

    #[test]
    fn test_actions_out_of_order_are_rejected() {
        let s = BookingSession::new("s-1");
        let err = transition(&s, UserAction::SelectSpecialty { id: 1 }.into()).unwrap_err();
        assert_eq!(
            err,
            FlowError::InvalidTransition {
                screen: "welcome",
                action: "select_specialty"
            }
        );

        let s = at_entity_review();
        assert!(transition(&s, UserAction::Pay { method: PaymentMethod::Upi }.into()).is_err());
        assert!(transition(&s, UserAction::SelectHospital { id: 2 }.into()).is_err());
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let s = BookingSession::new("s-1");
        let err = transition(&s, UserAction::SubmitText { text: "   ".into() }.into()).unwrap_err();
        assert_eq!(err, FlowError::EmptyTranscript);
    }

    #[test]
    fn test_removing_every_entity_reprompts() {
        let mut s = at_entity_review();
        for id in [1, 2, 3] {
            s = act(&s, UserAction::RemoveEntity { id }).session;
        }
        assert_eq!(s.screen, Screen::AwaitingInput);
        assert!(s.entities.is_empty());
        assert_eq!(
            s.conversation_history.last().map(|m| m.text.as_str()),
            Some(ALL_ENTITIES_REMOVED)
        );

        // The re-prompt accepts a new description.
        let step = act(&s, UserAction::SubmitText { text: "headache".into() });
        assert_eq!(step.session.screen, Screen::Processing);
    }

    #[test]
    fn test_removing_some_entities_stays_on_review() {
        let s = act(&at_entity_review(), UserAction::RemoveEntity { id: 3 }).session;
        assert_eq!(s.screen, Screen::EntityReview);
        assert_eq!(s.entities.len(), 2);
        assert!(s.entities.iter().all(|e| e.category == EntityCategory::Symptom));

        let err = transition(&s, UserAction::RemoveEntity { id: 3 }.into()).unwrap_err();
        assert_eq!(err, FlowError::UnknownEntity(3));
    }

    #[test]
    fn test_hospital_must_match_specialty() {
        let s = at_hospital_selection();
        let err = transition(&s, UserAction::SelectHospital { id: 3 }.into()).unwrap_err();
        assert_eq!(err, FlowError::HospitalNotOffered(3));
    }

    #[test]
    fn test_slot_must_belong_to_selected_hospital() {
        let s = act(&at_hospital_selection(), UserAction::SelectHospital { id: 2 }).session;
        // Offered by Dr. Iyer, not Dr. Patel.
        let foreign = Slot::parse("2025-11-14 9:30 AM").unwrap();
        let err = transition(&s, UserAction::SelectSlot { slot: foreign }.into()).unwrap_err();
        assert_eq!(err, FlowError::SlotNotOffered(foreign));
        assert_eq!(s.available_slots, find_hospital(2).unwrap().slots);
    }

    #[test]
    fn test_verification_path_materializes_slots() {
        let step = act(&at_hospital_selection(), UserAction::SelectHospital { id: 1 });
        assert_eq!(step.session.screen, Screen::VerifyingSlots);
        assert_eq!(step.session.screen.step(), 7);
        let epoch = match step.effect {
            Some(Effect::VerifySlots { epoch, ref hospital }) => {
                assert_eq!(hospital.id, 1);
                epoch
            }
            other => panic!("unexpected effect {other:?}"),
        };

        let slot = Slot::parse("2025-11-13 3:15 PM").unwrap();
        let s = transition(&step.session, FlowEvent::SlotsVerified { epoch, slots: vec![slot] })
            .unwrap()
            .session;
        assert_eq!(s.screen, Screen::SlotSelection);
        assert_eq!(s.available_slots, vec![slot]);
    }

    #[test]
    fn test_patient_info_validation_blocks() {
        let s = act(&at_hospital_selection(), UserAction::SelectHospital { id: 2 }).session;
        let slot = s.available_slots[0];
        let s = act(&s, UserAction::SelectSlot { slot }).session;

        let bad = PatientForm {
            age: Some(AgeInput::Number(121)),
            ..patient_form()
        };
        let err = transition(&s, UserAction::SubmitPatientInfo { patient: bad }.into()).unwrap_err();
        match err {
            FlowError::InvalidPatientInfo(e) => assert_eq!(e.field, "age"),
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(s.screen, Screen::PatientInfo);
    }

    #[test]
    fn test_payment_completion_reaches_confirmation() {
        let s = act(&at_hospital_selection(), UserAction::SelectHospital { id: 2 }).session;
        let slot = s.available_slots[0];
        let s = act(&s, UserAction::SelectSlot { slot }).session;
        let s = act(&s, UserAction::SubmitPatientInfo { patient: patient_form() }).session;

        let step = act(&s, UserAction::Pay { method: PaymentMethod::Upi });
        assert_eq!(step.session.screen, Screen::ProcessingPayment);
        let (epoch, quote) = match step.effect {
            Some(Effect::Charge { epoch, quote, .. }) => (epoch, quote),
            other => panic!("unexpected effect {other:?}"),
        };
        assert_eq!(quote.total, 650);

        let receipt = ChargeReceipt {
            transaction_id: "TXN123".into(),
            timestamp: NaiveDateTime::parse_from_str("2025-11-13 10:00:00", "%Y-%m-%d %H:%M:%S")
                .unwrap(),
        };
        let s = transition(
            &step.session,
            FlowEvent::PaymentCompleted {
                epoch,
                method: PaymentMethod::Upi,
                receipt,
            },
        )
        .unwrap()
        .session;
        assert_eq!(s.screen, Screen::Confirmation);
        let payment = s.payment_info.unwrap();
        assert_eq!(payment.total, payment.consultation_fee + payment.platform_fee);
        assert_eq!(payment.total, 650);
    }

    #[test]
    fn test_start_over_resets_everything() {
        let s = at_hospital_selection();
        assert!(!s.conversation_history.is_empty());
        let reset = act(&s, UserAction::StartOver).session;

        assert_eq!(
            BookingSession {
                epoch: 0,
                ..reset.clone()
            },
            BookingSession::new("s-1")
        );
        assert!(reset.epoch > s.epoch);
    }

    #[test]
    fn test_completion_after_start_over_is_ignored() {
        let s = BookingSession::new("s-1");
        let step = act(&s, UserAction::SubmitText { text: "fever".into() });
        let Some(Effect::ExtractSymptoms { epoch, .. }) = step.effect else {
            panic!("expected extraction effect");
        };

        let reset = act(&step.session, UserAction::StartOver).session;
        let after = transition(
            &reset,
            FlowEvent::SymptomsExtracted {
                epoch,
                entities: demo_entities(),
            },
        )
        .unwrap()
        .session;
        assert_eq!(after, reset);
        assert!(after.entities.is_empty());
    }

    #[test]
    fn test_voice_path_and_cancel() {
        let s = BookingSession::new("s-1");
        let step = act(&s, UserAction::StartListening);
        assert_eq!(step.session.screen, Screen::Listening);
        let Some(Effect::Transcribe { epoch }) = step.effect else {
            panic!("expected transcribe effect");
        };

        let s = transition(
            &step.session,
            FlowEvent::TranscriptUpdated {
                epoch,
                text: "I have fever".into(),
            },
        )
        .unwrap()
        .session;
        assert_eq!(s.transcript, "I have fever");

        let cancelled = act(&s, UserAction::CancelListening).session;
        assert_eq!(cancelled.screen, Screen::Welcome);
        assert!(cancelled.transcript.is_empty());

        // Late partials from the cancelled transcription do nothing.
        let late = transition(
            &cancelled,
            FlowEvent::TranscriptUpdated {
                epoch,
                text: "I have fever and".into(),
            },
        )
        .unwrap()
        .session;
        assert_eq!(late, cancelled);
    }

    #[test]
    fn test_transcription_finished_advances_to_processing() {
        let step = act(&BookingSession::new("s-1"), UserAction::StartListening);
        let Some(Effect::Transcribe { epoch }) = step.effect else {
            panic!("expected transcribe effect");
        };
        let s = transition(
            &step.session,
            FlowEvent::TranscriptUpdated {
                epoch,
                text: "I have fever and stomach pain for the last 2 days".into(),
            },
        )
        .unwrap()
        .session;
        let step = transition(&s, FlowEvent::TranscriptionFinished { epoch }).unwrap();
        assert_eq!(step.session.screen, Screen::Processing);
        assert!(matches!(step.effect, Some(Effect::ExtractSymptoms { .. })));
        assert_eq!(step.session.conversation_history.len(), 1);
    }

    #[test]
    fn test_stop_with_empty_transcript_returns_to_prompt() {
        let s = act(&BookingSession::new("s-1"), UserAction::StartListening).session;
        let step = act(&s, UserAction::StopListening);
        assert_eq!(step.session.screen, Screen::Welcome);
        assert!(step.effect.is_none());
    }

    #[test]
    fn test_payment_failure_returns_to_payment() {
        let s = act(&at_hospital_selection(), UserAction::SelectHospital { id: 2 }).session;
        let slot = s.available_slots[0];
        let s = act(&s, UserAction::SelectSlot { slot }).session;
        let s = act(&s, UserAction::SubmitPatientInfo { patient: patient_form() }).session;
        let step = act(&s, UserAction::Pay { method: PaymentMethod::Card });

        let failed = transition(
            &step.session,
            FlowEvent::BackendFailed {
                epoch: step.session.epoch,
                stage: Stage::Payment,
                reason: "gateway timeout".into(),
            },
        )
        .unwrap()
        .session;
        assert_eq!(failed.screen, Screen::Payment);
        assert!(failed.payment_info.is_none());
    }
}
