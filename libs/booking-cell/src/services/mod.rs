pub mod booking;
pub mod lifecycle;
pub mod notify;
pub mod reservation;
pub mod session;
pub mod token;
