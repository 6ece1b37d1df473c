//! Delivery handler implementations

pub mod slack;

pub use slack::SlackHandler;

pub use crate::core::{DeliveryHandler, HandlerFactory};
