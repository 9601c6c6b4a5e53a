use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Specialty {
    pub id: u32,
    pub name: String,
    pub reason: String,
}

/// A bookable date/time offered by one hospital.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl Slot {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    /// Parses the display form, e.g. `2025-11-14 4:00 PM`.
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let dt = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %I:%M %p")?;
        Ok(Self::new(dt.date(), dt.time()))
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn time_label(&self) -> String {
        self.time.format("%-I:%M %p").to_string()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date.format("%Y-%m-%d"), self.time_label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hospital {
    pub id: u32,
    pub doctor: String,
    pub specialty_id: u32,
    pub clinic: String,
    pub address: String,
    pub distance_km: f32,
    pub rating: f32,
    pub consultation_fee: u32,
    /// Clinic is outside the instant network; slots must be confirmed by a call first.
    pub needs_verification: bool,
    pub slots: Vec<Slot>,
}

impl Hospital {
    pub fn requires_slot_verification(&self) -> bool {
        self.needs_verification || self.slots.is_empty()
    }
}

pub const GENERAL_PHYSICIAN: u32 = 1;
pub const GASTROENTEROLOGIST: u32 = 2;

pub fn specialties() -> Vec<Specialty> {
    vec![
        Specialty {
            id: GENERAL_PHYSICIAN,
            name: "General Physician".to_string(),
            reason: "For general symptoms and initial diagnosis".to_string(),
        },
        Specialty {
            id: GASTROENTEROLOGIST,
            name: "Gastroenterologist".to_string(),
            reason: "Specialized in digestive system issues".to_string(),
        },
    ]
}

pub fn find_specialty(id: u32) -> Option<Specialty> {
    specialties().into_iter().find(|s| s.id == id)
}

pub fn hospitals() -> Vec<Hospital> {
    vec![
        Hospital {
            id: 1,
            doctor: "Dr. Sharma".to_string(),
            specialty_id: GENERAL_PHYSICIAN,
            clinic: "City Health Center".to_string(),
            address: "123 Health Street, New Delhi".to_string(),
            distance_km: 2.3,
            rating: 4.8,
            consultation_fee: 500,
            needs_verification: true,
            slots: vec![],
        },
        Hospital {
            id: 2,
            doctor: "Dr. Patel".to_string(),
            specialty_id: GENERAL_PHYSICIAN,
            clinic: "Apollo Clinic".to_string(),
            address: "45 Ring Road, Lajpat Nagar, New Delhi".to_string(),
            distance_km: 3.1,
            rating: 4.9,
            consultation_fee: 600,
            needs_verification: false,
            slots: vec![
                slot(2025, 11, 13, 16, 0),
                slot(2025, 11, 14, 10, 30),
                slot(2025, 11, 14, 16, 0),
                slot(2025, 11, 15, 11, 0),
            ],
        },
        Hospital {
            id: 3,
            doctor: "Dr. Iyer".to_string(),
            specialty_id: GASTROENTEROLOGIST,
            clinic: "Digestive Care Institute".to_string(),
            address: "8 Aurobindo Marg, New Delhi".to_string(),
            distance_km: 4.5,
            rating: 4.7,
            consultation_fee: 900,
            needs_verification: false,
            slots: vec![
                slot(2025, 11, 14, 9, 30),
                slot(2025, 11, 14, 14, 0),
                slot(2025, 11, 16, 12, 0),
            ],
        },
        Hospital {
            id: 4,
            doctor: "Dr. Mehta".to_string(),
            specialty_id: GASTROENTEROLOGIST,
            clinic: "Sunrise Hospital".to_string(),
            address: "210 Nehru Place, New Delhi".to_string(),
            distance_km: 5.2,
            rating: 4.6,
            consultation_fee: 800,
            needs_verification: true,
            slots: vec![],
        },
    ]
}

pub fn find_hospital(id: u32) -> Option<Hospital> {
    hospitals().into_iter().find(|h| h.id == id)
}

pub fn hospitals_for(specialty_id: u32) -> Vec<Hospital> {
    hospitals()
        .into_iter()
        .filter(|h| h.specialty_id == specialty_id)
        .collect()
}

fn slot(y: i32, m: u32, d: u32, hour: u32, min: u32) -> Slot {
    // Catalog literals are valid calendar values.
    Slot::new(
        NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
        NaiveTime::from_hms_opt(hour, min, 0).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_parse_and_display() {
        let s = Slot::parse("2025-11-14 4:00 PM").unwrap();
        assert_eq!(s.date, NaiveDate::from_ymd_opt(2025, 11, 14).unwrap());
        assert_eq!(s.time, NaiveTime::from_hms_opt(16, 0, 0).unwrap());
        assert_eq!(s.to_string(), "2025-11-14 4:00 PM");
    }

    #[test]
    fn test_slot_parse_morning() {
        let s = Slot::parse("2025-11-14 10:30 AM").unwrap();
        assert_eq!(s.time_label(), "10:30 AM");
    }

    #[test]
    fn test_hospitals_filtered_by_specialty() {
        let gp = hospitals_for(GENERAL_PHYSICIAN);
        assert_eq!(gp.len(), 2);
        assert!(gp.iter().all(|h| h.specialty_id == GENERAL_PHYSICIAN));
        assert!(hospitals_for(99).is_empty());
    }

    #[test]
    fn test_verification_required() {
        assert!(find_hospital(1).unwrap().requires_slot_verification());
        assert!(!find_hospital(2).unwrap().requires_slot_verification());
    }
}
