pub mod handlers;
pub mod middleware;
pub mod resolver;
pub mod routes;

pub use handlers::RedirectState;
pub use resolver::{RedirectOutcome, RedirectResolver};
pub use routes::create_redirect_router;
