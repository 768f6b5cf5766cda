pub mod client;
pub mod index;
pub mod reconcile;
