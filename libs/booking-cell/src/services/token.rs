// libs/booking-cell/src/services/token.rs
use chrono::{Datelike, NaiveDate};
use rand::Rng;

/// Confirmation token handed to the patient after booking, e.g.
/// `CLB-2024-1215-4821`. Branch code, appointment date, and a 4-digit
/// random suffix. Human-readable and phone-friendly; uniqueness is
/// enforced by the appointment row, not by the token.
pub fn confirmation_token(branch_code: &str, date: NaiveDate) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);

    format!(
        "{}-{}-{:02}{:02}-{:04}",
        branch_code.to_uppercase(),
        date.year(),
        date.month(),
        date.day(),
        suffix
    )
}
