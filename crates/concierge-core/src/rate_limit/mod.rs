//! Admission control in front of provider calls.

pub mod limiter;
