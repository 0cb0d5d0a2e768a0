//! Long-running worker loops

pub mod builder;
pub mod consumer;
pub mod dispatcher;
pub mod reconciler;
