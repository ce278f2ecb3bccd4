//! Apply-phase work units
//!
//! Each submodule owns one area of the host and drives it through a
//! [`StepRunner`](crate::engine::steps::StepRunner).

pub mod home;
pub mod runtime;
pub mod shellrc;
