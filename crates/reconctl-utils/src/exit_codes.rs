//! Process exit codes, per the external-interfaces contract.
//!
//! Kept deliberately small: four codes, no per-error-category sprawl. A
//! caller scripting around this binary only ever needs to branch on these.

/// Every run exited cleanly: no stage failed (or failures were non-fatal and
/// `--strict` was not set).
pub const SUCCESS: i32 = 0;

/// At least one stage reported `Failed` and `--strict` was set, so the run
/// as a whole is considered unsuccessful.
pub const STAGE_FAILED_STRICT: i32 = 1;

/// The invocation itself was invalid: bad flags, missing target, or the
/// required authorization flag was absent. No Run directory is created.
pub const INVALID_INVOCATION: i32 = 2;

/// Something the engine cannot recover from: a corrupt State Journal, a
/// poisoned lock, an I/O error writing to the artifact store.
pub const FATAL_INTERNAL: i32 = 3;

/// Maps a code back to a human label, used by `reconctl status` and tests.
pub fn describe(code: i32) -> &'static str {
    match code {
        SUCCESS => "success",
        STAGE_FAILED_STRICT => "stage failed (strict)",
        INVALID_INVOCATION => "invalid invocation",
        FATAL_INTERNAL => "fatal internal error",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_describe_to_non_empty_strings() {
        for code in [SUCCESS, STAGE_FAILED_STRICT, INVALID_INVOCATION, FATAL_INTERNAL] {
            assert_ne!(describe(code), "unknown");
        }
    }

    #[test]
    fn unknown_code_describes_as_unknown() {
        assert_eq!(describe(99), "unknown");
    }
}
