//! Test modules for the notification system

mod event_subscription_and_handling;
