pub mod actor;
pub mod assignment;
pub mod courier;
pub mod delivery;
pub mod location;
pub mod tracking;
pub mod variant;
