pub mod store;

pub use store::ClinicStore;
