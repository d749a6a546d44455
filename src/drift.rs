//! Drift detection for the main configuration file.

/// True when the newly rendered content differs byte-for-byte from the
/// previously applied content, in which case only a restart makes the
/// daemon pick it up reliably.
///
/// The policy is deliberately coarse: any difference in the main
/// configuration file, however small, warrants a restart, and only the main
/// configuration file participates in the decision. The tables and key
/// files carry no restart semantics of their own; the daemon sees their
/// changes through the unconditional reload. A previously absent file reads
/// back as the empty string, so a first render always counts as drift.
pub fn needs_restart(new: &str, previous: &str) -> bool {
    new != previous
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn differing_content_is_drift() {
        assert!(needs_restart("B", "A"));
    }

    #[test]
    fn identical_content_is_not_drift() {
        assert!(!needs_restart("A", "A"));
    }

    #[test]
    fn absent_previous_content_is_drift() {
        assert!(needs_restart("A", ""));
    }
}
