//! Sanitizers for model-supplied git inputs

/// Longest branch name we hand to git
pub const MAX_BRANCH_NAME_LEN: usize = 100;

/// Sequences git refuses (or misreads) in a ref name
const UNSAFE_BRANCH_SEQUENCES: &[&str] = &[
    " ", "..", "~", "^", ":", "?", "*", "[", "]", "\\", "@{",
];

/// Make a model-chosen branch name safe to pass to `git checkout -b`.
///
/// Every unsafe character or sequence becomes `-`, the result is capped at
/// 100 characters, then leading and trailing `-`/`/` are trimmed.
/// An empty result means the input had nothing usable.
pub fn sanitize_branch_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    // Left-to-right, non-overlapping: the same way a multi-pattern replacer
    // walks the input.
    'outer: while !rest.is_empty() {
        for seq in UNSAFE_BRANCH_SEQUENCES {
            if let Some(tail) = rest.strip_prefix(seq) {
                out.push('-');
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }

    // cap first, so the cut can't leave a trailing separator
    let capped: String = out.chars().take(MAX_BRANCH_NAME_LEN).collect();
    capped.trim_matches(|c| c == '-' || c == '/').to_string()
}

/// Strip shell-significant characters from a commit message.
///
/// Backticks become single quotes; `$` and `\` are removed.
pub fn sanitize_commit_message(message: &str) -> String {
    message
        .chars()
        .filter_map(|c| match c {
            '`' => Some('\''),
            '$' | '\\' => None,
            other => Some(other),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_name_replaces_unsafe_sequences() {
        assert_eq!(sanitize_branch_name("fix the bug"), "fix-the-bug");
        assert_eq!(sanitize_branch_name("feature/a..b"), "feature/a-b");
        assert_eq!(sanitize_branch_name("wip@{1}"), "wip-1}");
        assert_eq!(sanitize_branch_name("a~b^c:d?e*f[g]h\\i"), "a-b-c-d-e-f-g-h-i");
    }

    #[test]
    fn test_branch_name_trims_edges() {
        assert_eq!(sanitize_branch_name("/-feature/x-/"), "feature/x");
        assert_eq!(sanitize_branch_name("  "), "");
        assert_eq!(sanitize_branch_name("***"), "");
    }

    #[test]
    fn test_branch_name_is_capped() {
        let long = "b".repeat(250);
        assert_eq!(sanitize_branch_name(&long).len(), MAX_BRANCH_NAME_LEN);
    }

    #[test]
    fn test_cap_never_ends_on_separator() {
        let name = format!("{} tail", "a".repeat(99));
        assert_eq!(sanitize_branch_name(&name), "a".repeat(99));

        let name = format!("{}/feature", "b".repeat(99));
        assert_eq!(sanitize_branch_name(&name), "b".repeat(99));
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(
            sanitize_commit_message("use `cargo` for $HOME\\bin"),
            "use 'cargo' for HOMEbin"
        );
        assert_eq!(sanitize_commit_message("plain message"), "plain message");
    }
}
