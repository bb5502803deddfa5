//! Source-aware, all-or-nothing text cleaning.
//!
//! Each [`SourceProfile`] names an ordered list of [`CleaningStep`]s and the limits the result
//! must satisfy. A result that fails validation is discarded and the input is kept verbatim.

mod profile;
mod steps;
mod validation;

pub use profile::{MarkerGroup, ProfileConfig, SourceProfile, Thresholds};
pub use steps::CleaningStep;
pub use validation::{
    RejectionReason, ValidationRejection, Violation, count_sections, validate,
};

/// Result of cleaning one document.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanOutcome {
    /// Text to write: the transformed text, or the original when vetoed.
    pub text: String,
    /// Character count of the input.
    pub original_chars: usize,
    /// Character count of `text`.
    pub cleaned_chars: usize,
    /// Set when validation vetoed the transformation.
    pub violation: Option<Violation>,
}

impl CleanOutcome {
    /// Percentage of characters removed, rounded to two decimals.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_chars == 0 {
            return 0.0;
        }
        let removed = self.original_chars as f64 - self.cleaned_chars as f64;
        (removed / self.original_chars as f64 * 10_000.0).round() / 100.0
    }
}

/// Run `profile`'s steps over `text` and validate the result.
pub fn clean(text: &str, profile: SourceProfile) -> CleanOutcome {
    let config = profile.config();
    let transformed = config
        .steps
        .iter()
        .fold(text.to_string(), |current, step| step.apply(&current));
    let original_chars = text.chars().count();

    match validate(text, &transformed, &config) {
        Ok(()) => CleanOutcome {
            cleaned_chars: transformed.chars().count(),
            text: transformed,
            original_chars,
            violation: None,
        },
        Err(violation) => CleanOutcome {
            text: text.to_string(),
            original_chars,
            cleaned_chars: original_chars,
            violation: Some(violation),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kp_document() -> String {
        let mut text = String::from("THE KHYBER PAKHTUNKHWA SAMPLE ACT, 2013\n\n");
        for n in 1..=6 {
            text.push_str(&format!(
                "{n}. Heading number {n}.- The provisions of this section apply throughout the Province.   \n\n\n\n"
            ));
            text.push_str(&format!("{n} | P a g e\n"));
        }
        text.push_str("\n1 Substituted vide Khyber Pakhtunkhwa Act No. V of 2013, section 2.\n");
        text
    }

    #[test]
    fn kp_profile_removes_noise_and_keeps_sections() {
        let input = kp_document();
        let outcome = clean(&input, SourceProfile::KpCode);
        assert!(outcome.violation.is_none(), "{:?}", outcome.violation);
        assert!(!outcome.text.contains("P a g e"));
        assert!(outcome.text.contains("[Amendment 1: Substituted vide"));
        assert_eq!(count_sections(&outcome.text), count_sections(&input));
        assert!(outcome.reduction_percent() > 0.0);
    }

    #[test]
    fn rejected_cleaning_returns_input_unchanged() {
        let input = format!("1 | P a g e\n{}", "body ".repeat(10));
        let outcome = clean(&input, SourceProfile::KpCode);
        let violation = outcome.violation.as_ref().expect("too short after cleaning");
        assert_eq!(violation.reason, RejectionReason::TooShort);
        assert_eq!(outcome.text, input);
        assert_eq!(outcome.reduction_percent(), 0.0);
    }

    #[test]
    fn supreme_court_profile_only_touches_whitespace() {
        let body = "IN THE SUPREME COURT OF PAKISTAN\n(Appellate Jurisdiction)\n\n\n\n\nJUDGMENT   \nThe appeal is dismissed for the reasons recorded below in detail by the bench.";
        let outcome = clean(body, SourceProfile::SupremeCourt);
        assert!(outcome.violation.is_none());
        assert_eq!(
            outcome.text,
            "IN THE SUPREME COURT OF PAKISTAN\n(Appellate Jurisdiction)\n\nJUDGMENT\nThe appeal is dismissed for the reasons recorded below in detail by the bench."
        );
    }

    #[test]
    fn reduction_is_rounded_to_two_decimals() {
        let outcome = CleanOutcome {
            text: String::new(),
            original_chars: 3,
            cleaned_chars: 2,
            violation: None,
        };
        assert_eq!(outcome.reduction_percent(), 33.33);
    }
}
