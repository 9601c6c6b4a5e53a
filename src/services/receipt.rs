use std::fmt::Display;

use crate::models::{Booking, BookingSession, Screen};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReceiptError {
    #[error("booking is not confirmed yet")]
    NotConfirmed,
}

/// The confirmed booking behind a session, if it has reached confirmation.
pub fn confirmed_booking(session: &BookingSession) -> Result<Booking, ReceiptError> {
    if session.screen != Screen::Confirmation {
        return Err(ReceiptError::NotConfirmed);
    }
    Booking::from_session(session).ok_or(ReceiptError::NotConfirmed)
}

/// One `Label:  value` row, values aligned in a single column.
fn row(label: &str, value: impl Display) -> String {
    format!("{:<18}{value}", format!("{label}:"))
}

pub fn render_receipt(booking: &Booking) -> String {
    let rule = "=".repeat(40);

    let mut patient = vec![
        row("Name", &booking.patient_name),
        row("Age", booking.patient_age),
        row("Gender", &booking.patient_gender),
        row("Phone", &booking.patient_phone),
    ];
    if let Some(email) = &booking.patient_email {
        patient.push(row("Email", email));
    }
    if !booking.symptoms.is_empty() {
        patient.push(row("Symptoms", booking.symptoms.join(", ")));
    }
    if let Some(notes) = &booking.notes {
        patient.push(row("Notes", notes));
    }

    let lines = [
        rule.clone(),
        "AROGYA - APPOINTMENT RECEIPT".to_string(),
        rule.clone(),
        String::new(),
        "PAYMENT DETAILS".to_string(),
        row("Transaction ID", &booking.transaction_id),
        row("Paid On", booking.paid_at.format("%d %b %Y, %-I:%M %p")),
        row("Payment Method", &booking.payment_method),
        row("Consultation Fee", format!("Rs. {}", booking.consultation_fee)),
        row("Platform Fee", format!("Rs. {}", booking.platform_fee)),
        row("Total Paid", format!("Rs. {}", booking.total_paid)),
        String::new(),
        "APPOINTMENT DETAILS".to_string(),
        row("Doctor", &booking.doctor),
        row("Specialty", &booking.specialty),
        row("Clinic", &booking.clinic),
        row("Address", &booking.address),
        row("Date", booking.starts_at.format("%A, %d %B %Y")),
        row("Time", booking.starts_at.format("%-I:%M %p")),
        String::new(),
        "PATIENT DETAILS".to_string(),
    ]
    .into_iter()
    .chain(patient)
    .chain([
        String::new(),
        rule,
        "Please arrive 10 minutes before your appointment.".to_string(),
    ]);

    lines.map(|line| line + "\n").collect()
}
