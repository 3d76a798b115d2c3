pub mod issue;
pub mod pull_request;
pub mod report;

pub use issue::{process_app_issue, process_fnpack_issue, AppSubmission, IssueOutcome};
pub use pull_request::{
    check_app_id_exists, check_fnpack_key_exists, validate_pr, EntryCheck, PrValidationReport,
};
