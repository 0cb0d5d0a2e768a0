//! Wire models

pub mod message;
