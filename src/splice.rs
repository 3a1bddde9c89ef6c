//! Offset-Tracking Splicer
//!
//! Rewrites a text by replacing each grouped range with wrapper markup.
//! Ranges are in original-text coordinates while the working copy grows with
//! every insertion, so a running `offset` (in chars) translates each range
//! before use. Groups are applied left to right, which keeps earlier
//! insertions from shifting ranges that were not yet translated.

use std::borrow::Cow;

use crate::diagnostic::{DiagnosticGroups, Range, RangeFault};
use crate::rules::RuleCode;

/// Produces the markup for one annotated slice
pub trait Wrapper {
    fn wrap(&mut self, slice: &str, kinds: &[RuleCode]) -> String;

    /// Encoding for text left outside every wrapper
    fn plain<'a>(&self, text: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(text)
    }
}

impl<F> Wrapper for F
where
    F: FnMut(&str, &[RuleCode]) -> String,
{
    fn wrap(&mut self, slice: &str, kinds: &[RuleCode]) -> String {
        self(slice, kinds)
    }
}

/// Result of one splicing pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Splice {
    pub markup: String,
    /// Number of groups wrapped
    pub applied: usize,
    /// Groups dropped from this pass
    pub rejected: Vec<(Range, RangeFault)>,
}

impl Splice {
    /// True when nothing was wrapped and the caller should leave the node alone
    pub fn is_unchanged(&self) -> bool {
        self.applied == 0
    }
}

/// Byte index of the `n`-th char in `s` (or `s.len()` past the end)
fn byte_index(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Splice wrapper markup into `text` for every valid group
pub fn splice<W: Wrapper>(text: &str, groups: &DiagnosticGroups, wrapper: &mut W) -> Splice {
    let text_len = text.chars().count();
    let mut working = text.to_string();
    let mut offset: isize = 0;
    let mut previous_end = 0usize;
    // Byte spans of inserted markup inside `working`, ascending
    let mut inserted: Vec<(usize, usize)> = Vec::new();
    let mut result = Splice::default();

    for (range, kinds) in groups.iter() {
        if let Err(fault) = range.check(text_len) {
            result.rejected.push((*range, fault));
            continue;
        }
        if range.start < previous_end {
            result.rejected.push((*range, RangeFault::Overlap { previous_end }));
            continue;
        }

        let adj_start = (range.start as isize + offset) as usize;
        let adj_end = (range.end as isize + offset) as usize;
        let byte_start = byte_index(&working, adj_start);
        let byte_end = byte_index(&working, adj_end);

        let wrapped = wrapper.wrap(&working[byte_start..byte_end], kinds);
        offset += wrapped.chars().count() as isize - range.len() as isize;

        inserted.push((byte_start, byte_start + wrapped.len()));
        working.replace_range(byte_start..byte_end, &wrapped);
        previous_end = range.end;
        result.applied += 1;
    }

    for (range, fault) in &result.rejected {
        log::warn!("[splice] Dropping diagnostic group {}: {}", range, fault);
    }

    let mut markup = String::with_capacity(working.len());
    let mut cursor = 0;
    for (start, end) in inserted {
        markup.push_str(&wrapper.plain(&working[cursor..start]));
        markup.push_str(&working[start..end]);
        cursor = end;
    }
    markup.push_str(&wrapper.plain(&working[cursor..]));
    result.markup = markup;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{group_diagnostics, join_kinds, Diagnostic};
    use RuleCode::*;

    fn brackets() -> impl FnMut(&str, &[RuleCode]) -> String {
        |slice: &str, kinds: &[RuleCode]| format!("[{}|{}]", join_kinds(kinds), slice)
    }

    #[test]
    fn test_offsets_track_growth() {
        let groups = group_diagnostics(&[
            Diagnostic::new(DuplicatedWord, 1, 3, ""),
            Diagnostic::new(MonosyllableAccented, 4, 5, ""),
        ]);

        let result = splice("abcdef", &groups, &mut brackets());
        assert_eq!(result.markup, "a[DW|bc]d[MA|e]f");
        assert_eq!(result.applied, 2);
        assert!(result.rejected.is_empty());
    }

    #[test]
    fn test_merged_group_wrapped_once() {
        let groups = group_diagnostics(&[
            Diagnostic::new(MissingDoubleAccents, 0, 2, ""),
            Diagnostic::new(MissingAccentCapital, 0, 2, ""),
        ]);

        let result = splice("xy...", &groups, &mut brackets());
        assert_eq!(result.markup, "[MDA, MAC|xy]...");
        assert_eq!(result.applied, 1);
    }

    #[test]
    fn test_touching_ranges() {
        let groups = group_diagnostics(&[
            Diagnostic::new(AddFinalN, 0, 2, ""),
            Diagnostic::new(RemoveFinalN, 2, 4, ""),
        ]);

        let result = splice("abcd", &groups, &mut brackets());
        assert_eq!(result.markup, "[AFN|ab][RFN|cd]");
    }

    #[test]
    fn test_multibyte_offsets_count_chars() {
        let groups = group_diagnostics(&[
            Diagnostic::new(MultisyllableNotAccented, 0, 8, "καλημέρα"),
            Diagnostic::new(OutdatedSpelling, 9, 14, ""),
        ]);

        let result = splice("καλημερα κόσμε", &groups, &mut brackets());
        assert_eq!(result.markup, "[MNA|καλημερα] [OS|κόσμε]");
    }

    #[test]
    fn test_empty_groups_leave_text() {
        let result = splice("plain text", &DiagnosticGroups::default(), &mut brackets());
        assert_eq!(result.markup, "plain text");
        assert!(result.is_unchanged());
    }

    #[test]
    fn test_malformed_ranges_rejected_individually() {
        let groups = group_diagnostics(&[
            Diagnostic::new(DuplicatedWord, 4, 2, ""),
            Diagnostic::new(MixedScripts, 3, 40, ""),
            Diagnostic::new(AmbiguousChar, 0, 1, ""),
        ]);

        let result = splice("abcdef", &groups, &mut brackets());
        assert_eq!(result.markup, "[AC|a]bcdef");
        assert_eq!(result.applied, 1);
        assert_eq!(result.rejected.len(), 2);
        assert!(result
            .rejected
            .contains(&(Range::new(4, 2), RangeFault::Inverted)));
        assert!(result
            .rejected
            .contains(&(Range::new(3, 40), RangeFault::OutOfBounds { len: 6 })));
    }

    #[test]
    fn test_partial_overlap_rejected() {
        let groups = group_diagnostics(&[
            Diagnostic::new(DuplicatedWord, 0, 4, ""),
            Diagnostic::new(MonosyllableAccented, 2, 6, ""),
        ]);

        let result = splice("abcdefgh", &groups, &mut brackets());
        assert_eq!(result.markup, "[DW|abcd]efgh");
        assert_eq!(
            result.rejected,
            vec![(Range::new(2, 6), RangeFault::Overlap { previous_end: 4 })]
        );
    }

    struct Escaping;

    impl Wrapper for Escaping {
        fn wrap(&mut self, slice: &str, _kinds: &[RuleCode]) -> String {
            format!("<{}>", slice.to_uppercase())
        }

        fn plain<'a>(&self, text: &'a str) -> Cow<'a, str> {
            Cow::Owned(text.replace('<', "&lt;"))
        }
    }

    #[test]
    fn test_plain_encoding_skips_inserted_markup() {
        let groups = group_diagnostics(&[Diagnostic::new(AmbiguousChar, 2, 3, "")]);
        let result = splice("<ab<", &groups, &mut Escaping);
        assert_eq!(result.markup, "&lt;a<B>&lt;");
    }
}
