pub mod profile_store;
pub mod progress;
pub mod spreadsheet;
