//! Notification bus carrying transport events to the dispatch registry.
//!
//! Provides a `NotificationBus` that invokes every subscribed listener with
//! each `MeshEvent`, synchronously, on the publishing transport's thread.

pub mod bus;

pub use bus::{NotificationBus, SubscriptionId};
