use base64::Engine;
use serde::{Deserialize, Serialize};

pub const MIN_AGE: u32 = 1;
pub const MAX_AGE: u32 = 120;
pub const MIN_PHONE_LEN: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub content_type: String,
    pub size_bytes: usize,
}

/// An attachment as uploaded by the client, content base64-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentUpload {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub data: String,
}

impl AttachmentUpload {
    pub fn decode(&self) -> Result<Attachment, PatientInfoError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|e| PatientInfoError::new("attachments", format!("{}: {e}", self.name)))?;

        Ok(Attachment {
            name: self.name.clone(),
            content_type: self
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            size_bytes: bytes.len(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientInfo {
    pub name: String,
    pub age: u32,
    pub gender: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Age as typed into the form: a number, or the raw input text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgeInput {
    Number(i64),
    Decimal(f64),
    Text(String),
}

impl AgeInput {
    fn parse(&self) -> Result<u32, PatientInfoError> {
        let value = match self {
            AgeInput::Number(n) => *n,
            AgeInput::Decimal(_) => {
                return Err(PatientInfoError::new("age", "age must be a whole number"));
            }
            AgeInput::Text(t) if t.trim().is_empty() => {
                return Err(PatientInfoError::new("age", "age is required"));
            }
            AgeInput::Text(t) => t
                .trim()
                .parse::<i64>()
                .map_err(|_| PatientInfoError::new("age", "age must be a number"))?,
        };
        u32::try_from(value).map_err(|_| age_range_error())
    }
}

fn age_range_error() -> PatientInfoError {
    PatientInfoError::new("age", format!("age must be between {MIN_AGE} and {MAX_AGE}"))
}

/// The patient-info form as submitted. Every field may be missing or blank;
/// the validation gate reports which one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: Option<AgeInput>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentUpload>,
}

impl PatientForm {
    /// Decodes attachments and runs the validation gate.
    pub fn into_patient_info(self) -> Result<PatientInfo, PatientInfoError> {
        if self.name.trim().is_empty() {
            return Err(PatientInfoError::new("name", "name is required"));
        }
        let age = self
            .age
            .as_ref()
            .ok_or_else(|| PatientInfoError::new("age", "age is required"))?
            .parse()?;

        let attachments = self
            .attachments
            .iter()
            .map(AttachmentUpload::decode)
            .collect::<Result<Vec<_>, _>>()?;

        let info = PatientInfo {
            name: self.name.trim().to_string(),
            age,
            gender: self.gender.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.filter(|e| !e.trim().is_empty()),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            attachments,
        };
        info.validate()?;
        Ok(info)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct PatientInfoError {
    pub field: &'static str,
    pub message: String,
}

impl PatientInfoError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl PatientInfo {
    /// Checks required fields in form order and reports the first failure.
    pub fn validate(&self) -> Result<(), PatientInfoError> {
        if self.name.trim().is_empty() {
            return Err(PatientInfoError::new("name", "name is required"));
        }
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(age_range_error());
        }
        if self.gender.trim().is_empty() {
            return Err(PatientInfoError::new("gender", "gender is required"));
        }
        let phone = self.phone.trim();
        if phone.is_empty() {
            return Err(PatientInfoError::new("phone", "phone is required"));
        }
        if phone.chars().count() < MIN_PHONE_LEN {
            return Err(PatientInfoError::new(
                "phone",
                format!("phone must be at least {MIN_PHONE_LEN} characters"),
            ));
        }
        Ok(())
    }

    pub fn gender_label(&self) -> &str {
        match self.gender.trim() {
            "M" | "m" => "Male",
            "F" | "f" => "Female",
            "O" | "o" => "Other",
            other => other,
        }
    }
}
