//! Core marketplace engine.
//!
//! This crate orchestrates the order lifecycle: the transition state
//! machine, checkout, driver assignment and availability, scheduled-order
//! promotion, integrity repair and the role dashboard views, all wired
//! over the shared document store and a typed event bus.

pub mod builder;
pub mod checkout;
pub mod dispatch;
pub mod engine;
pub mod recovery;
pub mod schedule;
pub mod state;
pub mod views;

#[cfg(test)]
pub(crate) mod testutil;

pub use builder::{MarketplaceBuilder, MarketplaceFactories};
pub use checkout::{CartItem, CheckoutError, CheckoutReceipt, CheckoutRequest, CheckoutService};
pub use dispatch::{DispatchError, DispatchManager};
pub use engine::{event_bus::EventBus, EngineError, MarketplaceEngine};
pub use recovery::{RepairReport, RepairService};
pub use schedule::{PromotionReport, SchedulePromoter};
pub use state::{LifecycleError, OrderLifecycle};
pub use views::DashboardViews;
