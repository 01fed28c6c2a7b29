//! Test suites for the queue system, organized by functional area

mod inbound;
mod manager;
