// Authentication and session core for the university counseling
// appointment service: token issuance and verification, password hashing,
// request identity resolution, and the client-side session guard.

pub mod auth;
pub mod client;
pub mod configuration;
pub mod error;
pub mod logger;
pub mod middleware;
pub mod routes;
pub mod startup;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod validators;
