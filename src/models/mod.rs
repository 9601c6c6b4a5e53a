pub mod auth;
pub mod booking;
pub mod catalog;
pub mod patient;
pub mod payment;
pub mod session;

pub use auth::{AuthForm, AuthTab, FieldError, InputOutcome, OtpCountdown, OtpInput, UserType};
pub use booking::{Booking, BookingStatus};
pub use catalog::{Hospital, Slot, Specialty};
pub use patient::{AgeInput, Attachment, AttachmentUpload, PatientForm, PatientInfo, PatientInfoError};
pub use payment::{ChargeReceipt, PaymentInfo, PaymentMethod, PaymentQuote, PaymentStatus};
pub use session::{BookingSession, ConversationMessage, Entity, EntityCategory, Screen, Speaker};
