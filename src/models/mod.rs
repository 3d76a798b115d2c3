pub mod repo;
pub mod issue;
pub mod catalog;
pub mod fnpack;
pub mod lenient;

pub use repo::*;
pub use issue::*;
pub use catalog::*;
pub use fnpack::*;
