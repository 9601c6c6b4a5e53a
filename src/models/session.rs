use serde::{Deserialize, Serialize};

use super::catalog::{Hospital, Slot, Specialty};
use super::patient::PatientInfo;
use super::payment::{PaymentInfo, PaymentQuote};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    Welcome,
    Listening,
    Processing,
    EntityReview,
    /// Re-prompt after the user removed every extracted entity.
    AwaitingInput,
    SpecialtySelection,
    HospitalSelection,
    VerifyingSlots,
    SlotSelection,
    PatientInfo,
    Payment,
    ProcessingPayment,
    Confirmation,
}

impl Screen {
    pub fn as_str(&self) -> &'static str {
        match self {
            Screen::Welcome => "welcome",
            Screen::Listening => "listening",
            Screen::Processing => "processing",
            Screen::EntityReview => "entity_review",
            Screen::AwaitingInput => "awaiting_input",
            Screen::SpecialtySelection => "specialty_selection",
            Screen::HospitalSelection => "hospital_selection",
            Screen::VerifyingSlots => "verifying_slots",
            Screen::SlotSelection => "slot_selection",
            Screen::PatientInfo => "patient_info",
            Screen::Payment => "payment",
            Screen::ProcessingPayment => "processing_payment",
            Screen::Confirmation => "confirmation",
        }
    }

    /// Position of the screen in the ten-step booking sequence. Sub-states
    /// share the step of the screen they belong to.
    pub fn step(&self) -> u8 {
        match self {
            Screen::Welcome => 1,
            Screen::Listening => 2,
            Screen::Processing => 3,
            Screen::EntityReview | Screen::AwaitingInput => 4,
            Screen::SpecialtySelection => 5,
            Screen::HospitalSelection => 6,
            Screen::VerifyingSlots | Screen::SlotSelection => 7,
            Screen::PatientInfo => 8,
            Screen::Payment | Screen::ProcessingPayment => 9,
            Screen::Confirmation => 10,
        }
    }

    /// Screens that accept a fresh symptom description.
    pub fn accepts_input(&self) -> bool {
        matches!(self, Screen::Welcome | Screen::AwaitingInput)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Symptom,
    Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub id: u32,
    pub text: String,
    pub category: EntityCategory,
}

impl Entity {
    pub fn symptom(id: u32, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            category: EntityCategory::Symptom,
        }
    }

    pub fn duration(id: u32, text: &str) -> Self {
        Self {
            id,
            text: text.to_string(),
            category: EntityCategory::Duration,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingSession {
    pub id: String,
    pub screen: Screen,
    pub transcript: String,
    pub entities: Vec<Entity>,
    pub selected_specialty: Option<Specialty>,
    pub selected_hospital: Option<Hospital>,
    pub available_slots: Vec<Slot>,
    pub selected_slot: Option<Slot>,
    pub patient_info: Option<PatientInfo>,
    pub payment_info: Option<PaymentInfo>,
    pub conversation_history: Vec<ConversationMessage>,
    /// Ticket for in-flight async work. Completions carrying an older epoch are dropped.
    pub epoch: u64,
}

impl BookingSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            screen: Screen::Welcome,
            transcript: String::new(),
            entities: vec![],
            selected_specialty: None,
            selected_hospital: None,
            available_slots: vec![],
            selected_slot: None,
            patient_info: None,
            payment_info: None,
            conversation_history: vec![],
            epoch: 0,
        }
    }

    /// The empty session that replaces this one on "start over".
    pub fn reset(&self) -> Self {
        Self {
            epoch: self.epoch + 1,
            ..Self::new(self.id.clone())
        }
    }

    pub fn say(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.conversation_history.push(ConversationMessage {
            speaker,
            text: text.into(),
        });
    }

    pub fn payment_quote(&self) -> Option<PaymentQuote> {
        self.selected_hospital.as_ref().map(PaymentQuote::for_hospital)
    }
}
