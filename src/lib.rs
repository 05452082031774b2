//! Leavepay - batch payment pipeline for a paid-leave benefits program.
//!
//! Reconciles payment data between a case-management system, a state
//! accounting system and a payment processor (PUB). Every tracked entity
//! (payment, employee, reference file) moves through named states with a
//! full audit history; pipeline stages run as independently committed
//! steps so a late failure never invalidates completed stages.

pub mod config;
pub mod extract;
pub mod model;
pub mod outbound;
pub mod pipeline;
pub mod postprocess;
pub mod report;
pub mod storage;
pub mod validation;

#[cfg(test)]
pub mod test_utils;
