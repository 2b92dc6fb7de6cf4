mod database {
    pub mod actions;
    pub mod error;
    pub mod filter;
    pub mod form;
    pub mod membership;
    pub mod schema;
    pub mod shopping_list;
    pub mod validation;
}
mod authentication {
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod constants;

mod cache {
    pub mod cache;
}

pub mod config;
pub mod routes;
pub mod state;

pub use authentication::*;
pub use cache::cache::*;
pub use constants::*;
pub use database::*;
pub use state::{serve, State};
