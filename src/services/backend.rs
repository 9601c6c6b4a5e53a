//! Async operations behind the booking and verification flows.
//!
//! The simulated implementation stands in for the real services with fixed
//! delays and canned data; every call succeeds.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::models::catalog::Slot;
use crate::models::{ChargeReceipt, Entity, Hospital, PaymentMethod};
use crate::services::ai::{DemoExtractor, SymptomExtractor};

/// What the simulated voice input "hears".
pub const DEMO_UTTERANCE: &str = "I have fever and stomach pain for the last 2 days";

#[async_trait]
pub trait BookingBackend: Send + Sync {
    /// Streams the growing transcript. Each message replaces the previous one.
    async fn transcribe(&self, partials: mpsc::Sender<String>) -> anyhow::Result<()>;

    async fn extract_symptoms(&self, transcript: &str) -> anyhow::Result<Vec<Entity>>;

    /// Confirms availability with the clinic and returns the slots it offers.
    async fn verify_slots(&self, hospital: &Hospital) -> anyhow::Result<Vec<Slot>>;

    async fn charge(&self, method: PaymentMethod, amount: u32) -> anyhow::Result<ChargeReceipt>;
}

#[async_trait]
pub trait OtpGateway: Send + Sync {
    async fn send_otp(&self, phone: &str) -> anyhow::Result<()>;

    async fn verify_otp(&self, phone: &str, code: &str) -> anyhow::Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedDelays {
    pub transcript_char: Duration,
    pub transcript_settle: Duration,
    pub symptom_processing: Duration,
    pub slot_verification: Duration,
    pub payment: Duration,
    pub otp_send: Duration,
    pub otp_verify: Duration,
}

impl Default for SimulatedDelays {
    fn default() -> Self {
        Self {
            transcript_char: Duration::from_millis(100),
            transcript_settle: Duration::from_millis(800),
            symptom_processing: Duration::from_millis(1500),
            slot_verification: Duration::from_millis(3000),
            payment: Duration::from_millis(2000),
            otp_send: Duration::from_millis(1000),
            otp_verify: Duration::from_millis(1500),
        }
    }
}

impl SimulatedDelays {
    pub fn instant() -> Self {
        Self {
            transcript_char: Duration::ZERO,
            transcript_settle: Duration::ZERO,
            symptom_processing: Duration::ZERO,
            slot_verification: Duration::ZERO,
            payment: Duration::ZERO,
            otp_send: Duration::ZERO,
            otp_verify: Duration::ZERO,
        }
    }
}

pub struct SimulatedBackend {
    delays: SimulatedDelays,
    extractor: Box<dyn SymptomExtractor>,
}

impl SimulatedBackend {
    pub fn new(delays: SimulatedDelays) -> Self {
        Self::with_extractor(delays, Box::new(DemoExtractor))
    }

    pub fn with_extractor(delays: SimulatedDelays, extractor: Box<dyn SymptomExtractor>) -> Self {
        Self { delays, extractor }
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

/// Slots a clinic outside the instant network offers once called.
pub fn verified_slots(hospital: &Hospital) -> Vec<Slot> {
    if !hospital.slots.is_empty() {
        return hospital.slots.clone();
    }
    ["2025-11-13 3:15 PM", "2025-11-13 5:30 PM", "2025-11-14 11:00 AM"]
        .iter()
        .filter_map(|s| Slot::parse(s).ok())
        .collect()
}

pub fn new_transaction_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TXN{}", &id[..12])
}

#[async_trait]
impl BookingBackend for SimulatedBackend {
    async fn transcribe(&self, partials: mpsc::Sender<String>) -> anyhow::Result<()> {
        for end in DEMO_UTTERANCE
            .char_indices()
            .map(|(i, c)| i + c.len_utf8())
        {
            pause(self.delays.transcript_char).await;
            if partials.send(DEMO_UTTERANCE[..end].to_string()).await.is_err() {
                // Receiver dropped: listening was stopped.
                return Ok(());
            }
        }
        pause(self.delays.transcript_settle).await;
        Ok(())
    }

    async fn extract_symptoms(&self, transcript: &str) -> anyhow::Result<Vec<Entity>> {
        pause(self.delays.symptom_processing).await;
        self.extractor.extract(transcript).await
    }

    async fn verify_slots(&self, hospital: &Hospital) -> anyhow::Result<Vec<Slot>> {
        tracing::info!(clinic = %hospital.clinic, "calling clinic to verify slots");
        pause(self.delays.slot_verification).await;
        Ok(verified_slots(hospital))
    }

    async fn charge(&self, method: PaymentMethod, amount: u32) -> anyhow::Result<ChargeReceipt> {
        pause(self.delays.payment).await;
        let receipt = ChargeReceipt {
            transaction_id: new_transaction_id(),
            timestamp: Utc::now().naive_utc(),
        };
        tracing::info!(
            method = method.label(),
            amount,
            transaction_id = %receipt.transaction_id,
            "payment captured"
        );
        Ok(receipt)
    }
}

#[async_trait]
impl OtpGateway for SimulatedBackend {
    async fn send_otp(&self, phone: &str) -> anyhow::Result<()> {
        pause(self.delays.otp_send).await;
        tracing::info!(phone, "otp sent");
        Ok(())
    }

    async fn verify_otp(&self, phone: &str, _code: &str) -> anyhow::Result<bool> {
        pause(self.delays.otp_verify).await;
        tracing::info!(phone, "otp verified");
        Ok(true)
    }
}
