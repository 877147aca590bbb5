//! External gateway module for the mealflow marketplace.
//!
//! This module defines the boundaries to services the engine consumes but
//! does not own: the payment-intent service, the address geocoding
//! service, and the best-effort notification fan-out. Payment and geocode
//! follow the pluggable-implementation pattern (trait + factory +
//! registry); notifications are store-backed and concrete.

/// Address geocoding gateway.
pub mod geocode;
/// Store-backed notification appends.
pub mod notify;
/// Payment-intent gateway.
pub mod payment;

pub use geocode::{GeocodeError, GeocodeInterface, GeocodeService};
pub use notify::{Notifier, NotifyError};
pub use payment::{PaymentError, PaymentInterface, PaymentIntent, PaymentService};
