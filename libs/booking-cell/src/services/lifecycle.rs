// libs/booking-cell/src/services/lifecycle.rs
use crate::models::{AppointmentStatus, BookingError};

/// Statuses an appointment may move to from its current one.
/// `completed` and `cancelled` are terminal.
pub fn get_valid_transitions(current: &AppointmentStatus) -> Vec<AppointmentStatus> {
    match current {
        AppointmentStatus::Pending => {
            vec![AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
        }
        AppointmentStatus::Confirmed => {
            vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled]
        }
        AppointmentStatus::Completed => vec![],
        AppointmentStatus::Cancelled => vec![],
    }
}

pub fn validate_status_transition(
    current: &AppointmentStatus,
    next: &AppointmentStatus,
) -> Result<(), BookingError> {
    if get_valid_transitions(current).contains(next) {
        Ok(())
    } else {
        Err(BookingError::InvalidStatusTransition(current.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pending_can_confirm_or_cancel() {
        assert!(
            validate_status_transition(&AppointmentStatus::Pending, &AppointmentStatus::Confirmed)
                .is_ok()
        );
        assert!(
            validate_status_transition(&AppointmentStatus::Pending, &AppointmentStatus::Cancelled)
                .is_ok()
        );
        assert_matches!(
            validate_status_transition(&AppointmentStatus::Pending, &AppointmentStatus::Completed),
            Err(BookingError::InvalidStatusTransition(
                AppointmentStatus::Pending
            ))
        );
    }

    #[test]
    fn confirmed_can_complete_or_cancel() {
        assert!(validate_status_transition(
            &AppointmentStatus::Confirmed,
            &AppointmentStatus::Completed
        )
        .is_ok());
        assert!(validate_status_transition(
            &AppointmentStatus::Confirmed,
            &AppointmentStatus::Cancelled
        )
        .is_ok());
    }

    #[test]
    fn terminal_statuses_allow_nothing() {
        for terminal in [AppointmentStatus::Completed, AppointmentStatus::Cancelled] {
            for next in [
                AppointmentStatus::Pending,
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ] {
                assert!(validate_status_transition(&terminal, &next).is_err());
            }
        }
    }
}
