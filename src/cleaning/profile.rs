use super::steps::CleaningStep;

/// Document collections with their own cleaning rules and validation tolerances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceProfile {
    /// Federal statutes from pakistancode.gov.pk; the noisiest layout, cleaned most aggressively.
    PakistanCode,
    /// Khyber Pakhtunkhwa code with `N | P a g e` footers and amendment footnotes.
    KpCode,
    /// Balochistan code; minimal touch.
    BalochistanCode,
    /// Supreme Court judgments; whitespace only.
    SupremeCourt,
}

/// Validation limits for one profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Largest tolerated relative change in the legal-section header count.
    pub section_tolerance: f64,
    /// Smallest fraction of the original character count the result may keep.
    pub min_retention: f64,
    /// Results shorter than this many characters are considered degenerate.
    pub min_chars: usize,
}

/// Phrases of which at least one must survive cleaning if any was present before.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerGroup {
    /// Name used in rejection details.
    pub name: &'static str,
    /// Literal phrases, compared case-insensitively.
    pub phrases: &'static [&'static str],
}

/// Everything the cleaning engine needs to know about one profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileConfig {
    /// Transformations, applied in order.
    pub steps: &'static [CleaningStep],
    /// Validation limits.
    pub thresholds: Thresholds,
    /// Structural markers that must not disappear.
    pub marker_groups: &'static [MarkerGroup],
}

const PAKISTAN_STEPS: &[CleaningStep] = &[
    CleaningStep::PageOfTotalMarkers,
    CleaningStep::RepeatedActTitle,
    CleaningStep::AdminDateStamps,
    CleaningStep::SeparatorLines,
    CleaningStep::TableOfContents,
    CleaningStep::CollapseSpacing,
    CleaningStep::ShortFootnotes,
    CleaningStep::Trim,
];

const KP_STEPS: &[CleaningStep] = &[
    CleaningStep::PipePageMarkers,
    CleaningStep::ParagraphSpacing,
    CleaningStep::DashAndMixedSeparators,
    CleaningStep::AmendmentNotes,
    CleaningStep::Trim,
];

const BALOCHISTAN_STEPS: &[CleaningStep] = &[
    CleaningStep::BlankLineRuns,
    CleaningStep::DashSeparators,
    CleaningStep::LegislativeNotes,
    CleaningStep::Trim,
];

const SUPREME_COURT_STEPS: &[CleaningStep] = &[CleaningStep::BlankLineRuns, CleaningStep::Trim];

const SUPREME_COURT_MARKERS: &[MarkerGroup] = &[
    MarkerGroup {
        name: "case title",
        phrases: &[
            "IN THE SUPREME COURT OF PAKISTAN",
            "SUPREME COURT OF PAKISTAN",
            "Civil Petition",
            "Criminal Appeal",
            "Constitutional Petition",
        ],
    },
    MarkerGroup {
        name: "judgment heading",
        phrases: &["JUDGMENT", "ORDER", "OPINION"],
    },
];

impl SourceProfile {
    /// Every known profile.
    pub const ALL: [SourceProfile; 4] = [
        SourceProfile::PakistanCode,
        SourceProfile::KpCode,
        SourceProfile::BalochistanCode,
        SourceProfile::SupremeCourt,
    ];

    /// Select the profile for a record's `source_website`.
    pub fn for_source_website(source_website: &str) -> Option<Self> {
        match source_website.trim().to_ascii_lowercase().as_str() {
            "pakistan-code" | "pakistancode" => Some(Self::PakistanCode),
            "kp-code" | "kpcode" => Some(Self::KpCode),
            "balochistan-code" | "balochistancode" => Some(Self::BalochistanCode),
            "supremecourt" | "supremecourt-judgments" | "supreme-court" => {
                Some(Self::SupremeCourt)
            }
            _ => None,
        }
    }

    /// Stable name recorded in `cleaning_info.profile`.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PakistanCode => "pakistan-code",
            Self::KpCode => "kp-code",
            Self::BalochistanCode => "balochistan-code",
            Self::SupremeCourt => "supremecourt",
        }
    }

    /// Steps and limits for this profile.
    pub const fn config(self) -> ProfileConfig {
        match self {
            Self::PakistanCode => ProfileConfig {
                steps: PAKISTAN_STEPS,
                thresholds: Thresholds {
                    section_tolerance: 0.10,
                    min_retention: 0.50,
                    min_chars: 100,
                },
                marker_groups: &[],
            },
            Self::KpCode => ProfileConfig {
                steps: KP_STEPS,
                thresholds: Thresholds {
                    section_tolerance: 0.05,
                    min_retention: 0.75,
                    min_chars: 100,
                },
                marker_groups: &[],
            },
            Self::BalochistanCode => ProfileConfig {
                steps: BALOCHISTAN_STEPS,
                thresholds: Thresholds {
                    section_tolerance: 0.02,
                    min_retention: 0.80,
                    min_chars: 100,
                },
                marker_groups: &[],
            },
            Self::SupremeCourt => ProfileConfig {
                steps: SUPREME_COURT_STEPS,
                thresholds: Thresholds {
                    section_tolerance: 0.02,
                    min_retention: 0.95,
                    min_chars: 100,
                },
                marker_groups: SUPREME_COURT_MARKERS,
            },
        }
    }
}

impl std::fmt::Display for SourceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
