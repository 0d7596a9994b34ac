//! Outcome notifications.
//!
//! Recipient rules subscribe notifiers to category tags. Routing an outcome
//! delivers its text to every destination of every rule subscribed to the
//! outcome's tag, through every notifier whose name matches the rule
//! (case-insensitively).
//!
//! A delivery failure stops the rest of that rule; the remaining rules are
//! still dispatched and the first failure is returned once they are done.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

use certkeeper_common::category;
use certkeeper_config::RecipientConfig;

use crate::errors::{CollaboratorError, NotifyError};

mod logging;
mod mail;
mod rocket;

pub use self::logging::LogNotifier;
pub use self::mail::MailNotifier;
pub use self::rocket::RocketNotifier;

/// What a notifier did with a message, e.g. "Rocket message sent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery(String);

impl Delivery {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A channel that can deliver text to a destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Name recipient rules refer to
    fn name(&self) -> &str;

    /// Deliver `text` to `destination`
    async fn send_message(&self, text: &str, destination: &str)
        -> Result<Delivery, CollaboratorError>;
}

/// An outcome message and the category it is routed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub category: &'static str,
    pub text: String,
}

impl Outcome {
    /// A renewed certificate was deployed.
    pub fn renewed(url: &str) -> Self {
        Self {
            category: category::RENEW,
            text: format!("[{}] New certificate upload;", url),
        }
    }

    /// A forced renewal completed.
    pub fn forced(url: &str) -> Self {
        Self {
            category: category::RENEW,
            text: format!("[{}] Force Renew;", url),
        }
    }

    /// A site renewal failed.
    pub fn failed(url: &str, error: &dyn fmt::Display) -> Self {
        Self {
            category: category::ERROR,
            text: format!("[{}] Error: {};", url, error),
        }
    }
}

/// Dispatches outcomes according to recipient rules.
#[derive(Clone)]
pub struct NotificationRouter {
    rules: Vec<RecipientConfig>,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl NotificationRouter {
    pub fn new(rules: Vec<RecipientConfig>, notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { rules, notifiers }
    }

    pub fn rules(&self) -> &[RecipientConfig] {
        &self.rules
    }

    pub fn notifier_count(&self) -> usize {
        self.notifiers.len()
    }

    /// Route an [`Outcome`] under its own category.
    pub async fn route(&self, outcome: &Outcome) -> Result<usize, NotifyError> {
        self.route_by_category(&outcome.text, outcome.category).await
    }

    /// Deliver `message` to every recipient subscribed to `tag`.
    ///
    /// Returns the number of successful deliveries, or the first failure.
    pub async fn route_by_category(&self, message: &str, tag: &str) -> Result<usize, NotifyError> {
        let mut delivered = 0;
        let mut first_failure = None;

        for rule in self.rules.iter().filter(|rule| rule.subscribes_to(tag)) {
            match self.dispatch_rule(rule, message, tag).await {
                Ok(count) => delivered += count,
                Err((count, err)) => {
                    delivered += count;
                    error!(
                        notifier = %err.notifier,
                        destination = %err.destination,
                        error = %err.source,
                        "Notification delivery failed; skipping the rest of this recipient rule"
                    );
                    first_failure.get_or_insert(err);
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => {
                debug!(tag = %tag, delivered, "Routed notification");
                Ok(delivered)
            }
        }
    }

    async fn dispatch_rule(
        &self,
        rule: &RecipientConfig,
        message: &str,
        tag: &str,
    ) -> Result<usize, (usize, NotifyError)> {
        let mut delivered = 0;

        for notifier in self
            .notifiers
            .iter()
            .filter(|n| rule.notifier.matches(n.name()))
        {
            for destination in &rule.destinations {
                match notifier.send_message(message, destination).await {
                    Ok(delivery) => {
                        delivered += 1;
                        if category::is_error(tag) {
                            error!(
                                notifier = %notifier.name(),
                                destination = %destination,
                                delivery = %delivery,
                                "{}",
                                message
                            );
                        } else {
                            info!(
                                notifier = %notifier.name(),
                                destination = %destination,
                                delivery = %delivery,
                                "{}",
                                message
                            );
                        }
                    }
                    Err(source) => {
                        return Err((
                            delivered,
                            NotifyError {
                                notifier: notifier.name().to_string(),
                                destination: destination.clone(),
                                source,
                            },
                        ));
                    }
                }
            }
        }

        Ok(delivered)
    }
}

impl fmt::Debug for NotificationRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationRouter")
            .field("rules", &self.rules)
            .field(
                "notifiers",
                &self.notifiers.iter().map(|n| n.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
