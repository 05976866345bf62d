pub mod link;
pub mod visit;

pub use link::{CreateLinkRequest, Link, LinkResponse};
pub use visit::{LocationCount, LocationSource, Visit};
