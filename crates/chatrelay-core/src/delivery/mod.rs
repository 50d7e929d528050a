//! Ordered, rate limited delivery of outbound messages.

pub mod ordered;
pub mod throttle;

pub use ordered::{DeliveryReceipt, DeliverySink, OrderedDeliveryQueue, SlotOutcome};
pub use throttle::SendThrottle;
