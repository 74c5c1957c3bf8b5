//! Marker-delimited sections inside line-oriented documents.
//!
//! A section is the run of lines between `# BEGIN <marker>` and
//! `# END <marker>`. Everything outside the section belongs to whoever else
//! edits the document and is never touched. A document where only one of the
//! two marker lines can be found is treated exactly like a document without
//! the section: it is never repaired, since the file was likely edited by hand.

use crate::error::Error;
use std::ops::RangeInclusive;
use tracing::warn;

#[must_use]
pub fn begin_line(marker: &str) -> String {
    format!("# BEGIN {marker}")
}

#[must_use]
pub fn end_line(marker: &str) -> String {
    format!("# END {marker}")
}

/// Locate the section, marker lines included.
///
/// # Errors
/// Returns `Error::MarkerCorrupt` when only one marker line is present or the
/// END line precedes the BEGIN line.
pub fn locate(document: &[String], marker: &str) -> Result<Option<RangeInclusive<usize>>, Error> {
    let begin = begin_line(marker);
    let end = end_line(marker);

    let start = document.iter().position(|line| *line == begin);
    let stop = document.iter().position(|line| *line == end);

    match (start, stop) {
        (None, None) => Ok(None),
        (Some(start), Some(stop)) if start < stop => Ok(Some(start..=stop)),
        _ => Err(Error::MarkerCorrupt {
            marker: marker.to_string(),
        }),
    }
}

// Corrupt sections are reported once here and otherwise look absent.
fn find(document: &[String], marker: &str) -> Option<RangeInclusive<usize>> {
    locate(document, marker).unwrap_or_else(|err| {
        warn!("{err}, treating section as absent");
        None
    })
}

#[must_use]
pub fn contains(document: &[String], marker: &str) -> bool {
    find(document, marker).is_some()
}

/// Lines strictly between the marker lines, empty when the section is absent.
#[must_use]
pub fn read(document: &[String], marker: &str) -> Vec<String> {
    find(document, marker).map_or_else(Vec::new, |range| {
        document[range.start() + 1..*range.end()].to_vec()
    })
}

/// The padded block written when a section is created: one blank line, the
/// marker lines around `lines`, one blank line.
#[must_use]
pub fn block(marker: &str, lines: &[String]) -> Vec<String> {
    let mut block = Vec::with_capacity(lines.len() + 4);
    block.push(String::new());
    block.push(begin_line(marker));
    block.extend_from_slice(lines);
    block.push(end_line(marker));
    block.push(String::new());
    block
}

/// Replace the section body in place, or insert a new padded block at the top.
#[must_use]
pub fn write(mut document: Vec<String>, marker: &str, lines: &[String]) -> Vec<String> {
    if let Some(range) = find(&document, marker) {
        document.splice(range.start() + 1..*range.end(), lines.iter().cloned());
        return document;
    }

    if document.first().is_some_and(String::is_empty) {
        document.remove(0);
    }

    let mut result = block(marker, lines);
    result.append(&mut document);
    result
}

/// Delete the section, marker lines included, then normalise the leading
/// padding to a single blank line.
#[must_use]
pub fn remove(mut document: Vec<String>, marker: &str) -> Vec<String> {
    let Some(range) = find(&document, marker) else {
        return document;
    };

    document.drain(range);

    match document.first() {
        None => {}
        Some(first) if first.is_empty() => {
            let blanks = document.iter().take_while(|line| line.is_empty()).count();
            document.drain(..blanks - 1);
        }
        Some(_) => document.insert(0, String::new()),
    }

    document
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn read_returns_body() {
        let doc = lines(&["a", "# BEGIN FF", "one", "two", "# END FF", "b"]);
        assert_eq!(read(&doc, "FF"), lines(&["one", "two"]));
    }

    #[test]
    fn read_absent_is_empty() {
        let doc = lines(&["a", "b"]);
        assert!(read(&doc, "FF").is_empty());
    }

    #[test]
    fn read_half_section_is_empty() {
        let doc = lines(&["# BEGIN FF", "one"]);
        assert!(read(&doc, "FF").is_empty());
        let doc = lines(&["one", "# END FF"]);
        assert!(read(&doc, "FF").is_empty());
    }

    #[test]
    fn reversed_markers_are_corrupt() {
        let doc = lines(&["# END FF", "one", "# BEGIN FF"]);
        assert!(matches!(
            locate(&doc, "FF"),
            Err(Error::MarkerCorrupt { .. })
        ));
        assert!(!contains(&doc, "FF"));
    }

    #[test]
    fn other_markers_are_ignored() {
        let doc = lines(&["# BEGIN WordPress", "x", "# END WordPress"]);
        assert!(!contains(&doc, "FF"));
        assert_eq!(read(&doc, "WordPress"), lines(&["x"]));
    }

    #[test]
    fn write_inserts_padded_block_at_top() {
        let doc = lines(&["Options -Indexes", "# BEGIN WordPress", "# END WordPress"]);
        let body = lines(&["rule"]);
        let result = write(doc, "FF", &body);
        assert_eq!(
            result,
            lines(&[
                "",
                "# BEGIN FF",
                "rule",
                "# END FF",
                "",
                "Options -Indexes",
                "# BEGIN WordPress",
                "# END WordPress",
            ])
        );
        assert_eq!(read(&result, "FF"), body);
    }

    #[test]
    fn write_does_not_double_leading_blank() {
        let doc = lines(&["", "Options -Indexes"]);
        let result = write(doc, "FF", &lines(&["rule"]));
        assert_eq!(
            result,
            lines(&["", "# BEGIN FF", "rule", "# END FF", "", "Options -Indexes"])
        );
    }

    #[test]
    fn write_into_empty_document() {
        let result = write(Vec::new(), "FF", &lines(&["rule"]));
        assert_eq!(result, lines(&["", "# BEGIN FF", "rule", "# END FF", ""]));
    }

    #[test]
    fn write_replaces_body_in_place() {
        let doc = lines(&["top", "# BEGIN FF", "old", "older", "# END FF", "bottom"]);
        let result = write(doc, "FF", &lines(&["new"]));
        assert_eq!(
            result,
            lines(&["top", "# BEGIN FF", "new", "# END FF", "bottom"])
        );
    }

    #[test]
    fn remove_restores_document() {
        let original = lines(&["Options -Indexes", "RewriteBase /"]);
        let written = write(original.clone(), "FF", &lines(&["rule"]));
        let removed = remove(written, "FF");

        // the block padding leaves exactly one blank line in front
        assert_eq!(removed, lines(&["", "Options -Indexes", "RewriteBase /"]));
        assert_eq!(&removed[1..], original.as_slice());

        let again = remove(removed.clone(), "FF");
        assert_eq!(again, removed);
    }

    #[test]
    fn remove_keeps_document_starting_blank() {
        let original = lines(&["", "Options -Indexes"]);
        let written = write(original.clone(), "FF", &lines(&["rule"]));
        assert_eq!(remove(written, "FF"), original);
    }

    #[test]
    fn remove_collapses_leading_blanks() {
        let doc = lines(&["# BEGIN FF", "x", "# END FF", "", "", "", "rest"]);
        assert_eq!(remove(doc, "FF"), lines(&["", "rest"]));
    }

    #[test]
    fn remove_only_section_leaves_empty_document() {
        let doc = lines(&["# BEGIN FF", "x", "# END FF"]);
        assert!(remove(doc, "FF").is_empty());
    }

    #[test]
    fn remove_absent_is_noop() {
        let doc = lines(&["a", "# BEGIN FF"]);
        assert_eq!(remove(doc.clone(), "FF"), doc);
    }
}
