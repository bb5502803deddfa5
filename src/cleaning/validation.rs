use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::profile::ProfileConfig;

static SECTION_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\n\s*\d+\.\s+[A-Z]").expect("valid section header pattern")
});

/// Why a cleaning result was vetoed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Too many legal-section headers appeared or disappeared.
    SectionCountMismatch,
    /// Too much text was removed.
    ExcessiveReduction,
    /// The result fell below the character floor.
    TooShort,
    /// A structural marker present before cleaning is gone.
    MarkerLost,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::SectionCountMismatch => "section count mismatch",
            Self::ExcessiveReduction => "excessive reduction",
            Self::TooShort => "cleaned text too short",
            Self::MarkerLost => "structural marker lost",
        };
        f.write_str(label)
    }
}

/// A failed validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Failed check.
    pub reason: RejectionReason,
    /// Measured values behind the failure.
    pub details: String,
}

/// A vetoed cleaning result, kept for operator review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRejection {
    /// Artifact whose cleaning was vetoed.
    pub file: String,
    /// Failed check.
    pub reason: RejectionReason,
    /// Measured values behind the failure.
    pub details: String,
}

impl ValidationRejection {
    /// Attach the artifact name to a violation.
    pub fn new(file: impl Into<String>, violation: Violation) -> Self {
        Self {
            file: file.into(),
            reason: violation.reason,
            details: violation.details,
        }
    }
}

/// Number of legal-section headers (`N. Heading` at a line start).
pub fn count_sections(text: &str) -> usize {
    SECTION_HEADER.find_iter(text).count()
}

/// Compare a cleaning result against its input under the profile's limits.
pub fn validate(original: &str, cleaned: &str, config: &ProfileConfig) -> Result<(), Violation> {
    let limits = config.thresholds;

    let before = count_sections(original);
    let after = count_sections(cleaned);
    if before > 0 {
        let drift = before.abs_diff(after) as f64 / before as f64;
        if drift > limits.section_tolerance {
            return Err(Violation {
                reason: RejectionReason::SectionCountMismatch,
                details: format!(
                    "sections {before} -> {after} ({:.1}% drift, limit {:.1}%)",
                    drift * 100.0,
                    limits.section_tolerance * 100.0
                ),
            });
        }
    }

    let original_chars = original.chars().count();
    let cleaned_chars = cleaned.chars().count();
    if original_chars > 0 && (cleaned_chars as f64) < original_chars as f64 * limits.min_retention {
        let reduction = (original_chars - cleaned_chars) as f64 / original_chars as f64 * 100.0;
        return Err(Violation {
            reason: RejectionReason::ExcessiveReduction,
            details: format!(
                "{original_chars} -> {cleaned_chars} chars ({reduction:.1}% removed, keep at least {:.0}%)",
                limits.min_retention * 100.0
            ),
        });
    }

    if cleaned_chars < limits.min_chars {
        return Err(Violation {
            reason: RejectionReason::TooShort,
            details: format!("{cleaned_chars} chars, floor {}", limits.min_chars),
        });
    }

    let original_upper = original.to_uppercase();
    let cleaned_upper = cleaned.to_uppercase();
    for group in config.marker_groups {
        let present = |text: &str| {
            group
                .phrases
                .iter()
                .any(|phrase| text.contains(&phrase.to_uppercase()))
        };
        if present(&original_upper) && !present(&cleaned_upper) {
            return Err(Violation {
                reason: RejectionReason::MarkerLost,
                details: format!("{} no longer present", group.name),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaning::SourceProfile;

    fn statute(sections: usize, filler: usize) -> String {
        let mut text = String::from("THE SAMPLE ACT\n");
        for n in 1..=sections {
            text.push_str(&format!("\n{n}. Section heading {n}\n"));
            text.push_str(&"x".repeat(filler));
        }
        text
    }

    #[test]
    fn counts_line_start_section_headers() {
        assert_eq!(count_sections(&statute(10, 5)), 10);
        assert_eq!(count_sections("see section 5. Above"), 0);
    }

    #[test]
    fn losing_half_the_sections_is_rejected_by_every_profile() {
        let original = statute(10, 80);
        let stripped: String = original
            .split_inclusive('\n')
            .filter(|line| {
                !["1.", "3.", "5.", "7.", "9."]
                    .iter()
                    .any(|prefix| line.starts_with(prefix))
            })
            .collect();
        for profile in SourceProfile::ALL {
            let violation =
                validate(&original, &stripped, &profile.config()).expect_err("must reject");
            assert_eq!(violation.reason, RejectionReason::SectionCountMismatch);
        }
    }

    #[test]
    fn retention_threshold_depends_on_profile() {
        let original = "a".repeat(1_000);
        let cleaned = "a".repeat(700);
        assert!(validate(&original, &cleaned, &SourceProfile::PakistanCode.config()).is_ok());
        let violation = validate(&original, &cleaned, &SourceProfile::KpCode.config())
            .expect_err("kp keeps 75%");
        assert_eq!(violation.reason, RejectionReason::ExcessiveReduction);
    }

    #[test]
    fn tiny_results_are_degenerate() {
        let violation = validate("short", "short", &SourceProfile::BalochistanCode.config())
            .expect_err("below floor");
        assert_eq!(violation.reason, RejectionReason::TooShort);
    }

    #[test]
    fn judgment_heading_must_survive() {
        let original = format!("IN THE SUPREME COURT OF PAKISTAN\nJUDGMENT\n{}", "y".repeat(400));
        let cleaned = format!("IN THE SUPREME COURT OF PAKISTAN\n\n{}", "y".repeat(400));
        let violation = validate(&original, &cleaned, &SourceProfile::SupremeCourt.config())
            .expect_err("marker lost");
        assert_eq!(violation.reason, RejectionReason::MarkerLost);
        assert!(violation.details.contains("judgment heading"));
    }
}
