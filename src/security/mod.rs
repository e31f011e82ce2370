//! Security module for devbot command execution
//!
//! This module decides what the agent is allowed to run before anything
//! reaches a shell:
//! - Command validation (allowlist, deny-list, git policy)
//! - Input sanitization for branch names and commit messages
//!
//! # Gate
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  model output: "git push origin main && ls"                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  CommandValidator::authorize                                    │
//! │    1. empty?            → reject                                │
//! │    2. deny-list hit?    → reject                                │
//! │    3. chain / pipe      → every segment re-checked              │
//! │    4. allowlist         → reject unknown base command           │
//! │    5. git policy        → reject destructive / protected push   │
//! └─────────────────────────────────────────────────────────────────┘
//!                              │
//!                  ValidatedCommand (only way in)
//!                              ▼
//!                     executor::CommandRunner
//! ```
//!
//! The validator is a string classifier in front of a trusted shell. It does
//! not isolate the process it lets through.

pub mod sanitize;
pub mod validator;

pub use sanitize::{sanitize_branch_name, sanitize_commit_message};
pub use validator::{CommandPolicy, CommandValidator, ValidatedCommand, Verdict};
