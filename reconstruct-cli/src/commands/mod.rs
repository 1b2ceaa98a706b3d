pub mod audit;
pub mod reconstruct;
pub mod snapshot;
pub mod verify;
