//! Broker-level error type.

use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};

/// Failure modes of broker registry operations.
///
/// Subscription mutations require a registered subscriber callback; nothing
/// else in the broker can fail. Unknown publisher lookups and no-op
/// unsubscribes succeed silently.
pub enum BrokerError {
    /// A subscription mutation was attempted with no registered subscriber
    /// callback. State is unchanged.
    NoSubscriberRegistered,
}

impl Debug for BrokerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::NoSubscriberRegistered => write!(f, "NoSubscriberRegistered"),
        }
    }
}

impl Display for BrokerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BrokerError::NoSubscriberRegistered => {
                write!(
                    f,
                    "no subscriber callback registered; register one before mutating subscriptions"
                )
            }
        }
    }
}

impl Error for BrokerError {}
