use std::sync::LazyLock;

use regex::{Captures, Regex};

/// One transformation in a profile's cleaning sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleaningStep {
    /// Drop `Page X of Y` footers.
    PageOfTotalMarkers,
    /// Keep the first all-caps act title and drop later copies standing on their own line.
    RepeatedActTitle,
    /// Drop `RI - Date: DD-MM-YYYY` style stamps.
    AdminDateStamps,
    /// Drop lines of 10+ `_-*` and 15+ mixed separator characters.
    SeparatorLines,
    /// Squeeze dot leaders and spacing inside the table of contents.
    TableOfContents,
    /// Collapse inner space runs, cap blank lines at one, and drop spaces before punctuation.
    CollapseSpacing,
    /// Drop bare footnote numbers and parenthesise `1Subs. by ...` notes.
    ShortFootnotes,
    /// Drop `N | P a g e` footers.
    PipePageMarkers,
    /// Cap blank lines at one, drop trailing spaces, shrink deep indentation.
    ParagraphSpacing,
    /// Drop lines of 10+ `_-` and 15+ mixed separator characters.
    DashAndMixedSeparators,
    /// Rewrite `N Substituted ...` footnotes as `[Amendment N: ...]`.
    AmendmentNotes,
    /// Collapse 4+ newlines and drop trailing spaces.
    BlankLineRuns,
    /// Drop lines of 10+ `_-`.
    DashSeparators,
    /// Rewrite `N This Act was passed ...` notes as `[Legislative Note N: ...]`.
    LegislativeNotes,
    /// Trim leading and trailing whitespace.
    Trim,
}

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("valid pattern ", stringify!($name))));
    };
}

pattern!(PAGE_OF_TOTAL, r"(?i)Page\s+\d+\s+of\s+\d+\s*\n?");
pattern!(
    ACT_TITLE,
    r"(?m)^([A-Z\s,'\(\)&-]{10,}(?:ACT|ORDINANCE|CODE)[A-Z\s,'\(\)&\d-]*)\s*\n"
);
pattern!(ADMIN_DATE, r"(?i)\n?\s*(RI|RGN)?\s*-?\s*Date:\s*\d{2}-\d{2}-\d{4}\s*\n?");
pattern!(SEPARATOR_SOLID, r"\n\s*[_\-\*]{10,}\s*\n");
pattern!(SEPARATOR_DASH, r"\n\s*[_\-]{10,}\s*\n");
pattern!(SEPARATOR_MIXED, r"\n\s*[_\-\*\s]{15,}\s*\n");
pattern!(TOC_HEADER, r"CONTENTS\s*\n");
pattern!(
    TOC_END,
    r"\n\n[A-Z]{3,}[A-Z\s]+\n|\nPRELIMINARY\n|\nCHAPTER|\n\d+\.|\nAn Act"
);
pattern!(DOT_LEADER, r"\.{5,}");
pattern!(WIDE_GAP, r"\s{3,}");
pattern!(NEWLINES_3, r"\n{3,}");
pattern!(NEWLINES_4, r"\n{4,}");
pattern!(TRAILING_SPACES, r" +\n");
pattern!(SPACE_BEFORE_PUNCT, r" +([.,;:)])");
pattern!(BARE_FOOTNOTE, r"\n\d+\s*\n");
pattern!(SHORT_AMENDMENT, r"\n\d+([A-Za-z]+\.?\s+by\s+[^\n]+)");
pattern!(PIPE_PAGE, r"(?i)\n\d+\s*\|\s*P\s*a\s*g\s*e\s*\n");
pattern!(PIPE_PAGE_WORD, r"(?i)\n\d+\s*\|\s*Page\s*\n");
pattern!(PIPE_PAGE_LEADING, r"(?i)\A\d+\s*\|\s*P\s*a\s*g\s*e\s*\n");
pattern!(DEEP_INDENT, r"\n {3,}");
pattern!(
    AMENDMENT_NOTE,
    r"\n(\d+)\s+((?:Substituted|Inserted|Omitted|Added|Amended)[^\n]{30,})\n"
);
pattern!(
    LEGISLATIVE_NOTE,
    r"\n(\d+)\s+(This (?:Act|Ordinance) was (?:passed|enacted|promulgated)[^\n]{50,})\n"
);

impl CleaningStep {
    /// Apply the step to `text`.
    pub fn apply(self, text: &str) -> String {
        match self {
            Self::PageOfTotalMarkers => PAGE_OF_TOTAL.replace_all(text, "").into_owned(),
            Self::RepeatedActTitle => drop_repeated_title(text),
            Self::AdminDateStamps => ADMIN_DATE.replace_all(text, "").into_owned(),
            Self::SeparatorLines => {
                let text = SEPARATOR_SOLID.replace_all(text, "\n\n");
                SEPARATOR_MIXED.replace_all(&text, "\n\n").into_owned()
            }
            Self::TableOfContents => tidy_table_of_contents(text),
            Self::CollapseSpacing => {
                let text = collapse_inner_spaces(text);
                let text = NEWLINES_3.replace_all(&text, "\n\n");
                let text = TRAILING_SPACES.replace_all(&text, "\n");
                SPACE_BEFORE_PUNCT.replace_all(&text, "$1").into_owned()
            }
            Self::ShortFootnotes => {
                let text = BARE_FOOTNOTE.replace_all(text, "\n");
                SHORT_AMENDMENT.replace_all(&text, "\n(${1})").into_owned()
            }
            Self::PipePageMarkers => {
                let text = PIPE_PAGE.replace_all(text, "\n");
                let text = PIPE_PAGE_WORD.replace_all(&text, "\n");
                PIPE_PAGE_LEADING.replace_all(&text, "").into_owned()
            }
            Self::ParagraphSpacing => {
                let text = NEWLINES_3.replace_all(text, "\n\n");
                let text = TRAILING_SPACES.replace_all(&text, "\n");
                DEEP_INDENT.replace_all(&text, "\n ").into_owned()
            }
            Self::DashAndMixedSeparators => {
                let text = SEPARATOR_DASH.replace_all(text, "\n\n");
                SEPARATOR_MIXED.replace_all(&text, "\n\n").into_owned()
            }
            Self::AmendmentNotes => annotate(&AMENDMENT_NOTE, text, "Amendment"),
            Self::BlankLineRuns => {
                let text = NEWLINES_4.replace_all(text, "\n\n");
                TRAILING_SPACES.replace_all(&text, "\n").into_owned()
            }
            Self::DashSeparators => SEPARATOR_DASH.replace_all(text, "\n\n").into_owned(),
            Self::LegislativeNotes => annotate(&LEGISLATIVE_NOTE, text, "Legislative Note"),
            Self::Trim => text.trim().to_string(),
        }
    }
}

fn drop_repeated_title(text: &str) -> String {
    let Some(title) = ACT_TITLE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|title| !title.is_empty())
    else {
        return text.to_string();
    };
    let Some(first) = text.find(title) else {
        return text.to_string();
    };
    let Ok(repeat) = Regex::new(&format!(r"\n\s*{}\s*\n", regex::escape(title))) else {
        return text.to_string();
    };
    let split = first + title.len();
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..split]);
    out.push_str(&repeat.replace_all(&text[split..], "\n\n"));
    out
}

fn tidy_table_of_contents(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search = 0;
    while let Some(header) = TOC_HEADER.find_at(text, search) {
        // Without a terminator the listing never ends and is left alone.
        let Some(end) = TOC_END.find_at(text, header.end()) else {
            break;
        };
        out.push_str(&text[copied..header.end()]);
        let body = DOT_LEADER.replace_all(&text[header.end()..end.start()], " ");
        out.push_str(&WIDE_GAP.replace_all(&body, "  "));
        copied = end.start();
        search = end.start();
    }
    out.push_str(&text[copied..]);
    out
}

/// Collapse runs of spaces inside lines to one; indentation is capped at two spaces.
fn collapse_inner_spaces(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            out.push('\n');
        }
        let body = line.trim_start_matches(' ');
        let indent = line.len() - body.len();
        out.push_str(&" ".repeat(indent.min(2)));
        let mut previous_space = false;
        for ch in body.chars() {
            if ch == ' ' {
                if !previous_space {
                    out.push(ch);
                }
                previous_space = true;
            } else {
                out.push(ch);
                previous_space = false;
            }
        }
    }
    out
}

fn annotate(pattern: &Regex, text: &str, label: &str) -> String {
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            format!("\n\n[{label} {}: {}]\n", &caps[1], caps[2].trim())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_of_total_markers_are_removed() {
        let text = "1. Short title\nPage 3 of 44\n2. Extent";
        assert_eq!(
            CleaningStep::PageOfTotalMarkers.apply(text),
            "1. Short title\n2. Extent"
        );
    }

    #[test]
    fn repeated_title_keeps_first_occurrence() {
        let text = "THE CONTRACT ACT, 1872\n1. Short title\n\nTHE CONTRACT ACT, 1872\n2. Extent\n";
        let cleaned = CleaningStep::RepeatedActTitle.apply(text);
        assert_eq!(cleaned.matches("THE CONTRACT ACT, 1872").count(), 1);
        assert!(cleaned.starts_with("THE CONTRACT ACT, 1872\n"));
        assert!(cleaned.contains("2. Extent"));
    }

    #[test]
    fn table_of_contents_loses_dot_leaders_only() {
        let text = "CONTENTS\n1 Short title ........ 1\n\nPRELIMINARY\n1. Short title";
        let cleaned = CleaningStep::TableOfContents.apply(text);
        assert_eq!(
            cleaned,
            "CONTENTS\n1 Short title  1\n\nPRELIMINARY\n1. Short title"
        );
    }

    #[test]
    fn table_of_contents_without_terminator_is_untouched() {
        let text = "CONTENTS\nSomething ........ 4";
        assert_eq!(CleaningStep::TableOfContents.apply(text), text);
    }

    #[test]
    fn collapse_spacing_preserves_short_indentation() {
        let text = "  (a)  the   Court ,\n\n\n\nnext line   \n    deep";
        assert_eq!(
            CleaningStep::CollapseSpacing.apply(text),
            "  (a) the Court,\n\nnext line\n  deep"
        );
    }

    #[test]
    fn short_footnotes_are_parenthesised() {
        let text = "clause\n3\n1Subs. by Act XVI of 1973\nnext";
        assert_eq!(
            CleaningStep::ShortFootnotes.apply(text),
            "clause\n(Subs. by Act XVI of 1973)\nnext"
        );
    }

    #[test]
    fn pipe_page_markers_are_removed_everywhere() {
        let text = "1 | P a g e\nbody\n2 | Page\nmore\n3 | P a g e\nend";
        assert_eq!(CleaningStep::PipePageMarkers.apply(text), "body\nmore\nend");
    }

    #[test]
    fn amendment_notes_are_labelled() {
        let text = "body\n1 Substituted vide Khyber Pakhtunkhwa Act No. V of 2013 \nend";
        assert_eq!(
            CleaningStep::AmendmentNotes.apply(text),
            "body\n\n[Amendment 1: Substituted vide Khyber Pakhtunkhwa Act No. V of 2013]\nend"
        );
    }

    #[test]
    fn legislative_notes_need_long_text() {
        let short = "x\n1 This Act was passed briefly.\ny";
        assert_eq!(CleaningStep::LegislativeNotes.apply(short), short);

        let long = "x\n2 This Act was passed by the Provincial Assembly of Balochistan on 12th March 2010.\ny";
        assert!(
            CleaningStep::LegislativeNotes
                .apply(long)
                .contains("[Legislative Note 2: This Act was passed by the Provincial Assembly")
        );
    }

    #[test]
    fn separators_need_their_minimum_length() {
        let text = "a\n----------\nb\n-----\nc";
        assert_eq!(CleaningStep::DashSeparators.apply(text), "a\n\nb\n-----\nc");
    }
}
