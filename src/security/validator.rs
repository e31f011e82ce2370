//! Command validation for model-requested shell commands
//!
//! # Precedence
//!
//! The first rule that fires decides the verdict:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  1. EMPTY        trimmed command is empty                          │
//! │  2. DENY-LIST    case-folded substring match, literal entries     │
//! │  3. STRUCTURE    &&, ||, ;, newline, & → each part re-validated    │
//! │                  |                     → each segment's base cmd   │
//! │                  $(..), `..`, <(..)    → rejected outright         │
//! │  4. ALLOWLIST    first token, path stripped, case-sensitive        │
//! │  5. GIT POLICY   destructive phrases, pushes naming main/master   │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deny-list entries are matched as plain substrings even when they look
//! like regular expressions (`curl.*|.*sh` only matches that literal text).
//! Piped downloads are still caught at step 3, because `sh` is not on the
//! allowlist.

use std::fmt;

/// Maximum recursion depth when re-validating chained sub-commands
const MAX_DEPTH: usize = 4;

/// Maximum number of sub-commands in one chain
const MAX_SEGMENTS: usize = 32;

/// Characters an operator-command argument may never contain
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '$', '`', '<', '>', '(', ')', '{', '}', '\n', '\r', '\\', '"', '\'', '*', '?',
    '!', '~',
];

/// Shell constructs that run a nested command we cannot see into
const SUBSTITUTIONS: &[&str] = &["$(", "`", "<(", ">("];

// ═══════════════════════════════════════════════════════════════════════════
// CommandPolicy
// ═══════════════════════════════════════════════════════════════════════════
// WHAT IT IS:
//   The immutable lists the validator consults. Built once at startup and
//   injected, so tests can swap in a narrower or wider policy.
//
// DEFAULTS:
//   allowed            read-only inspection tools plus common build tools
//   denied             destructive or exfiltrating shell fragments
//   blocked_git        history-rewriting or work-discarding git phrases
//   protected_branches branches that may only be pushed with -u
// ═══════════════════════════════════════════════════════════════════════════

/// Allow/deny lists consulted by [`CommandValidator`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    /// Base commands the agent may run
    pub allowed: Vec<String>,
    /// Literal fragments that reject a command anywhere they appear
    pub denied: Vec<String>,
    /// Destructive git phrases
    pub blocked_git: Vec<String>,
    /// Branches that may not be pushed to directly
    pub protected_branches: Vec<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        Self {
            allowed: owned(&[
                "git", "gh", "ls", "cat", "head", "tail", "find", "grep", "wc", "diff", "echo",
                "pwd", "date", "which", "file", "stat", "make", "mvn", "gradle", "npm", "yarn",
                "pnpm", "cargo", "go",
            ]),
            denied: owned(&[
                "rm -rf /",
                "rm -rf ~",
                "rm -rf $HOME",
                "> /dev/",
                "mkfs",
                "dd if=",
                ":(){:|:&};:",
                "curl.*|.*sh",
                "wget.*|.*sh",
                "sudo",
                "su -",
                "chmod 777",
                "chown root",
                "/etc/passwd",
                "/etc/shadow",
                "~/.ssh",
                ".ssh/",
                "printenv",
                "export.*=",
            ]),
            blocked_git: owned(&[
                "push --force",
                "push -f",
                "reset --hard",
                "clean -f",
                "clean -fd",
                "checkout .",
                "restore .",
            ]),
            protected_branches: owned(&["main", "master"]),
        }
    }
}

/// Outcome of validating one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub reason: String,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: "allowed".to_string(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allowed {
            write!(f, "allowed")
        } else {
            write!(f, "rejected: {}", self.reason)
        }
    }
}

/// A command string that has passed validation.
///
/// The field is private to this module, so the only ways to obtain one are
/// [`CommandValidator::authorize`] and [`CommandValidator::authorize_operator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCommand(String);

impl ValidatedCommand {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pre-execution classifier for shell command strings
#[derive(Debug, Clone)]
pub struct CommandValidator {
    policy: CommandPolicy,
    denied_folded: Vec<(String, String)>,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new(CommandPolicy::default())
    }
}

impl CommandValidator {
    pub fn new(policy: CommandPolicy) -> Self {
        let denied_folded = policy
            .denied
            .iter()
            .map(|entry| (entry.to_lowercase(), entry.clone()))
            .collect();
        Self {
            policy,
            denied_folded,
        }
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    /// Allowlisted base commands, for disclosure in the tool catalog
    pub fn allowed_commands(&self) -> &[String] {
        &self.policy.allowed
    }

    /// Classify a command. Total: every input yields a verdict.
    pub fn validate(&self, command: &str) -> Verdict {
        self.check(command, 0)
    }

    /// Validate and, on success, wrap the command for the runner.
    pub fn authorize(&self, command: &str) -> Result<ValidatedCommand, Verdict> {
        let verdict = self.validate(command);
        if verdict.allowed {
            Ok(ValidatedCommand(command.trim().to_string()))
        } else {
            Err(verdict)
        }
    }

    /// Authorize an operator-configured command (build/test) with optional
    /// model-supplied arguments.
    ///
    /// The operator command itself is trusted configuration. Arguments are
    /// held to a stricter bar than ordinary commands: no shell
    /// metacharacters at all, and no deny-list fragments.
    pub fn authorize_operator(
        &self,
        command: &str,
        args: Option<&str>,
    ) -> Result<ValidatedCommand, Verdict> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Verdict::reject("no command configured"));
        }

        let args = args.map(str::trim).unwrap_or("");
        if args.is_empty() {
            return Ok(ValidatedCommand(command.to_string()));
        }

        if let Some(c) = args.chars().find(|c| SHELL_METACHARACTERS.contains(c)) {
            return Err(Verdict::reject(format!(
                "argument contains shell metacharacter: {:?}",
                c
            )));
        }
        if let Some(hit) = self.denied_hit(args) {
            return Err(Verdict::reject(format!(
                "command contains dangerous pattern: {}",
                hit
            )));
        }

        Ok(ValidatedCommand(format!("{} {}", command, args)))
    }

    fn check(&self, command: &str, depth: usize) -> Verdict {
        let command = command.trim();
        if command.is_empty() {
            return Verdict::reject("empty command");
        }

        if let Some(hit) = self.denied_hit(command) {
            return Verdict::reject(format!("command contains dangerous pattern: {}", hit));
        }

        if let Some(sub) = SUBSTITUTIONS.iter().find(|s| command.contains(**s)) {
            return Verdict::reject(format!("command substitution not allowed: {}", sub));
        }

        let parts = split_chain(command);
        if parts.len() > 1 {
            if depth >= MAX_DEPTH || parts.len() > MAX_SEGMENTS {
                return Verdict::reject("command chain too complex");
            }
            let mut checked = 0;
            for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
                let verdict = self.check(part, depth + 1);
                if !verdict.allowed {
                    return verdict;
                }
                checked += 1;
            }
            return if checked == 0 {
                Verdict::reject("empty command")
            } else {
                Verdict::allow()
            };
        }

        if command.contains('|') {
            return self.check_pipeline(command);
        }

        let base = base_command(command);
        if !self.is_allowed(base) {
            return Verdict::reject(format!("command not allowed: {}", base));
        }
        if base == "git" {
            return self.check_git(command);
        }

        Verdict::allow()
    }

    fn check_pipeline(&self, command: &str) -> Verdict {
        let mut segments = command.split('|').map(str::trim).filter(|s| !s.is_empty()).peekable();
        if segments.peek().is_none() {
            return Verdict::reject("empty command");
        }
        for segment in segments {
            let base = base_command(segment);
            if !self.is_allowed(base) {
                return Verdict::reject(format!("command not allowed in pipe: {}", base));
            }
            if base == "git" {
                let verdict = self.check_git(segment);
                if !verdict.allowed {
                    return verdict;
                }
            }
        }
        Verdict::allow()
    }

    fn check_git(&self, command: &str) -> Verdict {
        let lowered = command.to_lowercase();

        for blocked in &self.policy.blocked_git {
            if lowered.contains(&blocked.to_lowercase()) {
                return Verdict::reject(format!("git operation not allowed: {}", blocked));
            }
        }

        if lowered.contains("push") {
            let protected = self
                .policy
                .protected_branches
                .iter()
                .find(|branch| lowered.contains(&branch.to_lowercase()));
            if let Some(branch) = protected {
                if !lowered.contains("-u") && !lowered.contains("--set-upstream") {
                    return Verdict::reject(format!("direct push to {} not allowed", branch));
                }
            }
        }

        Verdict::allow()
    }

    fn denied_hit(&self, command: &str) -> Option<&str> {
        let lowered = command.to_lowercase();
        self.denied_folded
            .iter()
            .find(|(folded, _)| lowered.contains(folded.as_str()))
            .map(|(_, original)| original.as_str())
    }

    fn is_allowed(&self, base: &str) -> bool {
        self.policy.allowed.iter().any(|allowed| allowed == base)
    }
}

/// First whitespace-delimited token with any path prefix removed
fn base_command(command: &str) -> &str {
    let first = command.split_whitespace().next().unwrap_or("");
    first.rsplit('/').next().unwrap_or(first)
}

/// Split on sequencing operators: `&&`, `||`, `;`, newlines and a
/// background `&`. A `&` touching a redirection (`2>&1`, `&>`) is kept.
/// Single `|` is left in place for pipeline handling.
fn split_chain(command: &str) -> Vec<&str> {
    let bytes = command.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        let sep_len = match bytes[i] {
            b'&' if next == Some(b'&') => 2,
            b'|' if next == Some(b'|') => 2,
            b';' | b'\n' => 1,
            b'&' => {
                let prev = if i > 0 { Some(bytes[i - 1]) } else { None };
                let redirect =
                    matches!(prev, Some(b'>') | Some(b'<')) || next == Some(b'>');
                if redirect {
                    0
                } else {
                    1
                }
            }
            _ => 0,
        };

        if sep_len > 0 {
            parts.push(&command[start..i]);
            i += sep_len;
            start = i;
        } else {
            i += 1;
        }
    }
    parts.push(&command[start..]);
    parts
}
