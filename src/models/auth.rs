use serde::{Deserialize, Serialize};

pub const OTP_LENGTH: usize = 6;
pub const OTP_COOLDOWN_SECS: u32 = 30;
pub const PHONE_DIGITS: usize = 10;
pub const COUNTRY_PREFIX: &str = "+91";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Patient,
    Hospital,
}

impl UserType {
    /// Where the client goes once the phone is verified.
    pub fn redirect_path(&self) -> &'static str {
        match self {
            UserType::Patient => "/book",
            UserType::Hospital => "/dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthTab {
    #[default]
    SignIn,
    SignUp,
}

/// Sign-in and sign-up share one form; `name` is only read on sign-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthForm {
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub tab: AuthTab,
    #[serde(default)]
    pub name: Option<String>,
    pub phone: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl AuthForm {
    /// Every failing field is reported, matching how the form highlights them all at once.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.tab == AuthTab::SignUp {
            let name_ok = self
                .name
                .as_deref()
                .map(|n| n.trim().chars().count() >= 2)
                .unwrap_or(false);
            if !name_ok {
                errors.push(FieldError {
                    field: "name",
                    message: "Please enter your full name",
                });
            }
        }

        let digits = normalize_phone(&self.phone);
        if digits.len() != PHONE_DIGITS {
            errors.push(FieldError {
                field: "phone",
                message: "Please enter a valid 10-digit phone number",
            });
        }

        let password_ok = match self.tab {
            AuthTab::SignIn => !self.password.is_empty(),
            AuthTab::SignUp => self.password.chars().count() >= 6,
        };
        if !password_ok {
            errors.push(FieldError {
                field: "password",
                message: match self.tab {
                    AuthTab::SignIn => "Please enter your password",
                    AuthTab::SignUp => "Password must be at least 6 characters",
                },
            });
        }

        errors
    }

    pub fn display_phone(&self) -> String {
        format!("{COUNTRY_PREFIX}{}", normalize_phone(&self.phone))
    }
}

/// Phone inputs only keep digits.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Result of typing into one OTP position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputOutcome {
    pub focus: usize,
    pub complete: bool,
}

/// The six single-digit OTP boxes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpInput {
    digits: [Option<u8>; OTP_LENGTH],
}

impl OtpInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Typing a digit fills the box and moves focus forward; anything else
    /// clears the box and keeps focus there.
    pub fn enter(&mut self, index: usize, value: char) -> InputOutcome {
        let index = index.min(OTP_LENGTH - 1);
        match value.to_digit(10) {
            Some(d) => {
                self.digits[index] = Some(d as u8);
                let focus = if index < OTP_LENGTH - 1 { index + 1 } else { index };
                InputOutcome {
                    focus,
                    complete: self.is_complete(),
                }
            }
            None => {
                self.digits[index] = None;
                InputOutcome {
                    focus: index,
                    complete: false,
                }
            }
        }
    }

    /// Backspace on an empty box moves focus to the previous one.
    pub fn backspace(&mut self, index: usize) -> InputOutcome {
        let index = index.min(OTP_LENGTH - 1);
        let focus = if self.digits[index].is_some() {
            self.digits[index] = None;
            index
        } else {
            index.saturating_sub(1)
        };
        InputOutcome {
            focus,
            complete: false,
        }
    }

    /// Pasted text has non-digits stripped and fills boxes from the first one.
    pub fn paste(&mut self, text: &str) -> InputOutcome {
        let pasted: Vec<u8> = text
            .chars()
            .filter_map(|c| c.to_digit(10))
            .take(OTP_LENGTH)
            .map(|d| d as u8)
            .collect();

        for (slot, d) in self.digits.iter_mut().zip(pasted.iter()) {
            *slot = Some(*d);
        }

        InputOutcome {
            focus: pasted.len().min(OTP_LENGTH - 1),
            complete: self.is_complete(),
        }
    }

    pub fn clear(&mut self) {
        self.digits = [None; OTP_LENGTH];
    }

    pub fn is_complete(&self) -> bool {
        self.digits.iter().all(Option::is_some)
    }

    pub fn code(&self) -> Option<String> {
        if !self.is_complete() {
            return None;
        }
        Some(
            self.digits
                .iter()
                .flatten()
                .map(|d| char::from(b'0' + d))
                .collect(),
        )
    }
}

/// Resend cooldown, ticked once per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpCountdown {
    remaining: u32,
}

impl Default for OtpCountdown {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpCountdown {
    pub fn new() -> Self {
        Self {
            remaining: OTP_COOLDOWN_SECS,
        }
    }

    /// Returns the seconds left after this tick.
    pub fn tick(&mut self) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining
    }

    pub fn reset(&mut self) {
        self.remaining = OTP_COOLDOWN_SECS;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn can_resend(&self) -> bool {
        self.remaining == 0
    }
}
