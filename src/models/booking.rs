use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::BookingSession;

/// Appointments last a fixed half hour.
pub const APPOINTMENT_MINUTES: i32 = 30;

/// A booking session that has reached confirmation, flattened into the
/// shape the receipt, calendar export and dashboard work from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: String,
    pub transaction_id: String,
    pub payment_method: String,
    pub consultation_fee: u32,
    pub platform_fee: u32,
    pub total_paid: u32,
    pub paid_at: NaiveDateTime,
    pub doctor: String,
    pub specialty: String,
    pub clinic: String,
    pub address: String,
    pub starts_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub patient_name: String,
    pub patient_age: u32,
    pub patient_gender: String,
    pub patient_phone: String,
    pub patient_email: Option<String>,
    pub notes: Option<String>,
    pub symptoms: Vec<String>,
    pub status: BookingStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => BookingStatus::Completed,
            "cancelled" => BookingStatus::Cancelled,
            _ => BookingStatus::Confirmed,
        }
    }
}

impl Booking {
    /// Returns `None` unless every piece a confirmed booking needs is present.
    pub fn from_session(session: &BookingSession) -> Option<Self> {
        let specialty = session.selected_specialty.as_ref()?;
        let hospital = session.selected_hospital.as_ref()?;
        let slot = session.selected_slot?;
        let patient = session.patient_info.as_ref()?;
        let payment = session.payment_info.as_ref()?;
        let now = Utc::now().naive_utc();

        Some(Booking {
            id: format!("bk-{}", payment.transaction_id.to_lowercase()),
            transaction_id: payment.transaction_id.clone(),
            payment_method: payment.method.label().to_string(),
            consultation_fee: payment.consultation_fee,
            platform_fee: payment.platform_fee,
            total_paid: payment.total,
            paid_at: payment.timestamp,
            doctor: hospital.doctor.clone(),
            specialty: specialty.name.clone(),
            clinic: hospital.clinic.clone(),
            address: hospital.address.clone(),
            starts_at: slot.starts_at(),
            duration_minutes: APPOINTMENT_MINUTES,
            patient_name: patient.name.clone(),
            patient_age: patient.age,
            patient_gender: patient.gender_label().to_string(),
            patient_phone: patient.phone.clone(),
            patient_email: patient.email.clone(),
            notes: patient.notes.clone(),
            symptoms: session.entities.iter().map(|e| e.text.clone()).collect(),
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        })
    }
}
