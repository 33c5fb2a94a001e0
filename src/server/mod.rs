//! Server module: shared state, router assembly and the `ServerBuilder`

pub mod builder;
pub mod router;
pub mod state;

pub use builder::ServerBuilder;
pub use router::build_router;
pub use state::AppState;
