//! Inline mark arithmetic.
//!
//! Marks are block-relative, sorted and non-overlapping. Edits elsewhere in
//! the buffer never touch them; only edits inside the owning block and
//! `format` operations rewrite the list.

use crate::editing::tree::{Mark, MarkAttrs};

/// Layer `attrs` onto `[start, end)`.
///
/// Existing marks are split at `start` and `end`, pieces inside the range get
/// `attrs` layered over their own attributes, and uncovered gaps inside the
/// range get a new mark carrying `attrs`. The result exactly covers
/// `[start, end)` and stays sorted and non-overlapping.
pub fn apply_format(marks: &[Mark], start: usize, end: usize, attrs: &MarkAttrs) -> Vec<Mark> {
    let mut out = Vec::with_capacity(marks.len() + 2);
    let mut covered = Vec::new();

    for mark in marks {
        if mark.end <= start || mark.start >= end {
            out.push(mark.clone());
            continue;
        }
        if mark.start < start {
            out.push(Mark {
                start: mark.start,
                end: start,
                attrs: mark.attrs.clone(),
            });
        }
        let inner_start = mark.start.max(start);
        let inner_end = mark.end.min(end);
        let mut layered = mark.attrs.clone();
        layered.layer(attrs);
        out.push(Mark {
            start: inner_start,
            end: inner_end,
            attrs: layered,
        });
        covered.push((inner_start, inner_end));
        if mark.end > end {
            out.push(Mark {
                start: end,
                end: mark.end,
                attrs: mark.attrs.clone(),
            });
        }
    }

    // Fill the gaps of [start, end) no existing mark covered
    let mut cursor = start;
    for (covered_start, covered_end) in covered {
        if covered_start > cursor {
            out.push(Mark {
                start: cursor,
                end: covered_start,
                attrs: attrs.clone(),
            });
        }
        cursor = covered_end;
    }
    if cursor < end {
        out.push(Mark {
            start: cursor,
            end,
            attrs: attrs.clone(),
        });
    }

    out.sort_by_key(|mark| mark.start);
    coalesce(out)
}

/// Adjust marks for `len` chars inserted at block-relative `offset`.
///
/// Text inserted strictly inside a mark extends it; at or before a mark's start it shifts the mark.
pub fn shift_for_insert(marks: &mut [Mark], offset: usize, len: usize) {
    for mark in marks {
        if mark.start >= offset {
            mark.start += len;
            mark.end += len;
        } else if mark.end > offset {
            mark.end += len;
        }
    }
}

/// Adjust marks for `len` chars deleted at block-relative `offset`, dropping marks that vanish.
pub fn clip_for_delete(marks: &mut Vec<Mark>, offset: usize, len: usize) {
    let map = |x: usize| {
        if x <= offset {
            x
        } else if x >= offset + len {
            x - len
        } else {
            offset
        }
    };
    for mark in marks.iter_mut() {
        mark.start = map(mark.start);
        mark.end = map(mark.end);
    }
    marks.retain(|mark| mark.start < mark.end);
    *marks = coalesce(std::mem::take(marks));
}

/// Merge touching marks with identical attributes.
fn coalesce(marks: Vec<Mark>) -> Vec<Mark> {
    let mut out: Vec<Mark> = Vec::with_capacity(marks.len());
    for mark in marks {
        match out.last_mut() {
            Some(last) if last.end == mark.start && last.attrs == mark.attrs => last.end = mark.end,
            _ => out.push(mark),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mark(start: usize, end: usize, attrs: MarkAttrs) -> Mark {
        Mark { start, end, attrs }
    }

    fn bold_italic() -> MarkAttrs {
        let mut attrs = MarkAttrs::bold();
        attrs.italic = Some(true);
        attrs
    }

    #[test]
    fn test_format_on_unmarked_block() {
        let marks = apply_format(&[], 2, 5, &MarkAttrs::bold());
        assert_eq!(marks, vec![mark(2, 5, MarkAttrs::bold())]);
    }

    #[test]
    fn test_format_splits_and_layers_overlapping_mark() {
        let existing = vec![mark(0, 6, MarkAttrs::bold())];
        let marks = apply_format(&existing, 2, 4, &MarkAttrs::italic());
        assert_eq!(
            marks,
            vec![
                mark(0, 2, MarkAttrs::bold()),
                mark(2, 4, bold_italic()),
                mark(4, 6, MarkAttrs::bold()),
            ]
        );
    }

    #[test]
    fn test_format_fills_gaps_between_marks() {
        let existing = vec![mark(1, 2, MarkAttrs::bold()), mark(4, 5, MarkAttrs::bold())];
        let marks = apply_format(&existing, 0, 6, &MarkAttrs::italic());
        assert_eq!(
            marks,
            vec![
                mark(0, 1, MarkAttrs::italic()),
                mark(1, 2, bold_italic()),
                mark(2, 4, MarkAttrs::italic()),
                mark(4, 5, bold_italic()),
                mark(5, 6, MarkAttrs::italic()),
            ]
        );
    }

    #[test]
    fn test_format_coalesces_equal_neighbours() {
        let existing = vec![mark(0, 3, MarkAttrs::bold())];
        let marks = apply_format(&existing, 3, 6, &MarkAttrs::bold());
        assert_eq!(marks, vec![mark(0, 6, MarkAttrs::bold())]);
    }

    #[test]
    fn test_format_leaves_marks_outside_range() {
        let existing = vec![mark(0, 2, MarkAttrs::bold()), mark(8, 9, MarkAttrs::italic())];
        let marks = apply_format(&existing, 4, 6, &MarkAttrs::bold());
        assert_eq!(
            marks,
            vec![
                mark(0, 2, MarkAttrs::bold()),
                mark(4, 6, MarkAttrs::bold()),
                mark(8, 9, MarkAttrs::italic()),
            ]
        );
    }

    #[test]
    fn test_insert_inside_mark_extends_it() {
        let mut marks = vec![mark(2, 5, MarkAttrs::bold()), mark(7, 9, MarkAttrs::italic())];
        shift_for_insert(&mut marks, 3, 2);
        assert_eq!(
            marks,
            vec![mark(2, 7, MarkAttrs::bold()), mark(9, 11, MarkAttrs::italic())]
        );
    }

    #[test]
    fn test_insert_at_mark_edges() {
        let mut marks = vec![mark(2, 5, MarkAttrs::bold())];
        shift_for_insert(&mut marks, 5, 1);
        assert_eq!(marks, vec![mark(2, 5, MarkAttrs::bold())]);
        shift_for_insert(&mut marks, 2, 1);
        assert_eq!(marks, vec![mark(3, 6, MarkAttrs::bold())]);
    }

    #[test]
    fn test_delete_clips_and_drops_marks() {
        let mut marks = vec![
            mark(0, 2, MarkAttrs::bold()),
            mark(3, 4, MarkAttrs::italic()),
            mark(5, 8, MarkAttrs::bold()),
        ];
        // Remove [1, 6): clips the first, drops the second, clips the third
        clip_for_delete(&mut marks, 1, 5);
        assert_eq!(marks, vec![mark(0, 3, MarkAttrs::bold())]);
    }
}
