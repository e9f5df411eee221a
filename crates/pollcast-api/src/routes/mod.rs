pub mod polls;
pub mod send;
pub mod subscribers;
pub mod webhook;
