pub mod json_store;
pub mod catalog;

pub use json_store::{load_json, read_json, save_json};
pub use catalog::{AppDetailsStore, AppsStore, DetailsStore, FnpackDetailsStore, FnpacksStore};
