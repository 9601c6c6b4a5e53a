use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::catalog::Hospital;

/// Flat platform fee added to every consultation, in rupees.
pub const PLATFORM_FEE: u32 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Upi,
    Card,
    NetBanking,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Upi => "UPI",
            PaymentMethod::Card => "Card",
            PaymentMethod::NetBanking => "Net Banking",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentQuote {
    pub consultation_fee: u32,
    pub platform_fee: u32,
    pub total: u32,
}

impl PaymentQuote {
    pub fn for_hospital(hospital: &Hospital) -> Self {
        Self {
            consultation_fee: hospital.consultation_fee,
            platform_fee: PLATFORM_FEE,
            total: hospital.consultation_fee + PLATFORM_FEE,
        }
    }
}

/// What the payment processor returns for a successful charge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargeReceipt {
    pub transaction_id: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub consultation_fee: u32,
    pub platform_fee: u32,
    pub total: u32,
    pub transaction_id: String,
    pub timestamp: NaiveDateTime,
    pub status: PaymentStatus,
}

impl PaymentInfo {
    pub fn completed(method: PaymentMethod, quote: PaymentQuote, receipt: ChargeReceipt) -> Self {
        Self {
            method,
            consultation_fee: quote.consultation_fee,
            platform_fee: quote.platform_fee,
            total: quote.total,
            transaction_id: receipt.transaction_id,
            timestamp: receipt.timestamp,
            status: PaymentStatus::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::hospitals;

    #[test]
    fn test_total_is_fee_plus_platform_fee() {
        for hospital in hospitals() {
            let quote = PaymentQuote::for_hospital(&hospital);
            assert_eq!(quote.total, hospital.consultation_fee + 50, "{}", hospital.doctor);
            assert_eq!(quote.platform_fee, PLATFORM_FEE);
        }
    }
}
