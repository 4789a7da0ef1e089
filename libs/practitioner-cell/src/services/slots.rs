// libs/practitioner-cell/src/services/slots.rs
use chrono::{Duration, NaiveDate, NaiveTime};

use crate::models::{PractitionerSchedule, Slot};
use crate::services::availability::is_workable;

/// Fixed slot granularity in minutes. Every bookable time lies on this
/// grid, measured from the start of the working window.
pub const SLOT_MINUTES: i64 = 30;

/// Peak windows, inclusive-start / exclusive-end.
fn peak_windows() -> [(NaiveTime, NaiveTime); 2] {
    [
        (
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
        ),
        (
            NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        ),
    ]
}

pub fn is_peak(time: NaiveTime) -> bool {
    peak_windows()
        .iter()
        .any(|(start, end)| time >= *start && time < *end)
}

/// Enumerate the day's slots in strictly increasing order. Unworkable
/// dates yield an empty vector so the function stays total; a trailing
/// period shorter than the granularity is dropped.
///
/// Reservation state is not known here; `is_reserved` is overlaid by
/// the booking session from the conflict guard and the day's confirmed
/// appointments.
pub fn generate_slots(schedule: &PractitionerSchedule, date: NaiveDate) -> Vec<Slot> {
    if is_workable(schedule, date).is_err() {
        return Vec::new();
    }

    let step = Duration::minutes(SLOT_MINUTES);
    let end = schedule.working_hours.end;

    let mut slots = Vec::new();
    let mut current = schedule.working_hours.start;
    loop {
        // overflowing_add keeps midnight wrap-around from producing a
        // bogus early-morning slot.
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 || next > end {
            break;
        }
        slots.push(Slot {
            time: current,
            is_peak: is_peak(current),
            is_reserved: false,
        });
        current = next;
    }

    slots
}

/// Whether `time` is one of the slots offered on `date`.
pub fn is_valid_slot_time(schedule: &PractitionerSchedule, date: NaiveDate, time: NaiveTime) -> bool {
    generate_slots(schedule, date)
        .iter()
        .any(|slot| slot.time == time)
}
