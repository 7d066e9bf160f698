pub mod assignment;
pub mod creation;
pub mod queue;
pub mod response;
pub mod roster;
pub mod scoring;
pub mod service;
pub mod status;
