pub mod diff;
pub mod report;
pub mod updater;

pub use diff::{find_modified_apps, find_modified_fnpacks, CatalogDiff};
pub use report::{BatchReport, FailedItem};
pub use updater::{CatalogUpdater, FnpackTarget};
