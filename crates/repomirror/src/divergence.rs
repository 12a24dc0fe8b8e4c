//! Ahead/behind counting against the remote tracking branch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Commit counts between a local branch and its remote tracking branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivergenceResult {
    /// Commits on the remote tracking branch missing locally.
    pub behind: u32,
    /// Local commits missing on the remote tracking branch.
    pub ahead: u32,
    /// Branch the counts were computed for.
    pub branch: String,
}

impl DivergenceResult {
    pub fn is_up_to_date(&self) -> bool {
        self.behind == 0 && self.ahead == 0
    }
}

/// The count output did not contain exactly two non-negative integers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected '<behind> <ahead>', got {input:?}")]
pub struct DivergenceParseError {
    pub input: String,
}

/// Symmetric-difference range with the remote tracking branch on the left
/// and the local `HEAD` on the right.
pub fn comparison_range(branch: &str) -> String {
    format!("origin/{}...HEAD", branch)
}

/// Parses `rev-list --left-right --count` output into counts for `branch`.
///
/// The first non-blank line must hold exactly two integers separated by a
/// tab or spaces: left-only (behind) then right-only (ahead).
pub fn compute_divergence(
    branch: &str,
    raw: &str,
) -> std::result::Result<DivergenceResult, DivergenceParseError> {
    let err = || DivergenceParseError {
        input: raw.to_string(),
    };

    let line = raw
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(err)?;

    let parts: Vec<&str> = line
        .split(|c: char| c == '\t' || c == ' ')
        .filter(|part| !part.is_empty())
        .collect();

    let [behind, ahead] = parts.as_slice() else {
        return Err(err());
    };

    let behind = behind.parse::<u32>().map_err(|_| err())?;
    let ahead = ahead.parse::<u32>().map_err(|_| err())?;

    Ok(DivergenceResult {
        behind,
        ahead,
        branch: branch.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_separated_counts() {
        let result = compute_divergence("main", "3\t5\n").unwrap();
        assert_eq!(result.behind, 3);
        assert_eq!(result.ahead, 5);
        assert_eq!(result.branch, "main");
        assert!(!result.is_up_to_date());
    }

    #[test]
    fn test_space_separated_counts() {
        let result = compute_divergence("dev", "  0   2  ").unwrap();
        assert_eq!((result.behind, result.ahead), (0, 2));
    }

    #[test]
    fn test_zero_counts_are_up_to_date() {
        let result = compute_divergence("main", "0\t0").unwrap();
        assert!(result.is_up_to_date());
    }

    #[test]
    fn test_unparseable_input_is_an_error_not_zero() {
        for raw in [
            "",
            "\n",
            "fatal: ambiguous argument 'origin/main...HEAD'",
            "3",
            "3\t5\t7",
            "-1\t2",
            "x\ty",
            "3.0\t1",
        ] {
            let err = compute_divergence("main", raw).unwrap_err();
            assert_eq!(err.input, raw);
        }
    }

    #[test]
    fn test_uses_first_non_blank_line() {
        let result = compute_divergence("main", "\n  \n1\t4\ntrailing noise\n").unwrap();
        assert_eq!((result.behind, result.ahead), (1, 4));
    }

    #[test]
    fn test_comparison_range() {
        assert_eq!(comparison_range("main"), "origin/main...HEAD");
        assert_eq!(comparison_range("feature/x"), "origin/feature/x...HEAD");
    }
}
