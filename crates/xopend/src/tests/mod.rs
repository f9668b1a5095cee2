//! Test suites for the xopen daemon.

mod dispatch_behaviour;
mod support;
