//! Test helpers for sealink.
//!
//! [`FakeNodeBinary`] installs a shell script that answers the node binary's
//! subcommands well enough to drive the CLI control plane end to end:
//! `node create` runs in the foreground and prints log lines, `node delete`
//! stops it, `node show`/`node list` report canned or tracked status, and
//! `identity create` prints an identifier. Every invocation is logged.
//!
//! Unix only.

#[cfg(unix)]
mod fake_binary;

#[cfg(unix)]
pub use fake_binary::FakeNodeBinary;
