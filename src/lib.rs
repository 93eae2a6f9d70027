pub mod auth;
pub mod dataset;
pub mod error;
pub mod fetch;
pub mod forecast;
pub mod los;
pub mod output;
pub mod pipeline;
pub mod resources;
pub mod session;
pub mod utility;
