//! Generational evolution of two competing agent populations.
//!
//! Boats and pirates live through fixed-length simulation windows while an
//! external collaborator credits their scores. At the end of each window the
//! [`lifecycle::Lifecycle`] ranks both populations, keeps the fittest as
//! parents and breeds the next generation from them. The
//! [`scheduler::Scheduler`] decides when a window is over.

pub mod arena;
pub mod breeding;
pub mod collab;
pub mod config;
pub mod error;
pub mod fitness;
pub mod genome;
pub mod lifecycle;
pub mod manager;
pub mod mutation;
pub mod population;
pub mod scheduler;
pub mod score;

pub use error::SimError;
