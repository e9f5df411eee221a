pub mod broadcast;
pub mod poll;
pub mod subscriber;
