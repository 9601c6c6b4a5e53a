use chrono::Duration;

use crate::models::Booking;

const STAMP: &str = "%Y%m%dT%H%M%S";

pub fn generate_ics(booking: &Booking) -> String {
    let dtstart = booking.starts_at.format(STAMP).to_string();
    let dtend = (booking.starts_at + Duration::minutes(booking.duration_minutes as i64))
        .format(STAMP)
        .to_string();
    let dtstamp = booking.created_at.format(STAMP).to_string();
    let uid = format!("{}@arogya", booking.id);

    let summary = escape(&format!(
        "Appointment with {} ({})",
        booking.doctor, booking.specialty
    ));
    let description = escape(&format!(
        "Patient: {}. Transaction: {}. Paid: Rs. {}.",
        booking.patient_name, booking.transaction_id, booking.total_paid
    ));
    let location = escape(&format!("{}, {}", booking.clinic, booking.address));

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Arogya//Appointment Booking//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         LOCATION:{location}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}

/// TEXT value escaping for iCalendar properties.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}
