//! # sshkit
//!
//! Thin Rust wrapper over the OpenSSH client.
//!
//! This crate provides:
//! - A [`Transport`] trait for running commands and copying files on a host
//! - [`SshBackend`], which shells out to `ssh`/`scp`
//! - [`MockBackend`], which scripts outcomes and records calls for tests
//! - [`RemoteCommand`], an argument vector rendered with shell quoting
//!
//! ## Example
//!
//! ```no_run
//! use sshkit::{RemoteCommand, SshBackend, Target, Transport};
//!
//! let backend = SshBackend::new();
//! let target = Target::parse("gpu-box").expect("valid host");
//!
//! let cmd = RemoteCommand::new("ls").args(["-la", "my dir"]);
//! let outcome = backend.exec(&target, cmd.as_str()).expect("ssh started");
//! if !outcome.succeeded {
//!     eprintln!("{}", outcome.stderr);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::ssh::SshBackend;
pub use backend::{Call, MockBackend, Transport};
pub use error::{Error, FailureCategory, Result};
pub use types::{CommandOutcome, RemoteCommand, Target, sh_quote};
