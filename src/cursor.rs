//! Cursor-based deep paging over merged results.
//!
//! A cursor remembers the last document a page returned, so the next page
//! resumes right after it even when elevation moved documents around.

use crate::types::{DocId, MergedDoc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Position in a merged result list.
///
/// Serialized as `*` for the first page, otherwise as the hex encoding of the
/// last returned position (8 digits) followed by the hex bytes of its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum CursorMark {
    #[default]
    Start,
    After { position: usize, id: DocId },
}

impl CursorMark {
    pub const START: &'static str = "*";

    /// Index of the first document after this cursor in `docs`.
    fn resume_index(&self, docs: &[MergedDoc]) -> usize {
        match self {
            Self::Start => 0,
            Self::After { position, id } => docs
                .iter()
                .position(|doc| doc.id == *id)
                .map_or(position + 1, |index| index + 1)
                .min(docs.len()),
        }
    }
}

impl fmt::Display for CursorMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str(Self::START),
            Self::After { position, id } => {
                write!(f, "{:08x}", position)?;
                for byte in id.as_str().bytes() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for CursorMark {
    type Err = ParseCursorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == Self::START {
            return Ok(Self::Start);
        }
        if s.len() < 8 || s.len() % 2 != 0 || !s.is_ascii() {
            return Err(ParseCursorError::InvalidLength(s.len()));
        }

        let (position, id) = s.split_at(8);
        let position = usize::from_str_radix(position, 16).map_err(|_| ParseCursorError::InvalidHex)?;
        let bytes = id
            .as_bytes()
            .chunks(2)
            .map(|chunk| {
                let hex = std::str::from_utf8(chunk).map_err(|_| ParseCursorError::InvalidHex)?;
                u8::from_str_radix(hex, 16).map_err(|_| ParseCursorError::InvalidHex)
            })
            .collect::<std::result::Result<Vec<u8>, _>>()?;
        let id = String::from_utf8(bytes).map_err(|_| ParseCursorError::InvalidId)?;

        Ok(Self::After {
            position,
            id: DocId::new(id),
        })
    }
}

impl Serialize for CursorMark {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CursorMark {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for cursor parsing failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseCursorError {
    #[error("invalid hexadecimal characters in cursor mark")]
    InvalidHex,
    #[error("invalid cursor mark length {0}")]
    InvalidLength(usize),
    #[error("cursor mark does not encode a UTF-8 document id")]
    InvalidId,
}

/// One page of merged results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub docs: Vec<MergedDoc>,
    /// Pass back to fetch the following page. Equal to the requested cursor
    /// once the results are exhausted.
    pub next_cursor: CursorMark,
    pub num_found: usize,
}

/// Cuts the page of `rows` documents following `cursor` out of `docs`.
pub fn paginate(docs: &[MergedDoc], cursor: &CursorMark, rows: usize) -> Page {
    let start = cursor.resume_index(docs);
    let end = start.saturating_add(rows).min(docs.len());
    let page = &docs[start..end];

    let next_cursor = match page.last() {
        Some(last) => CursorMark::After {
            position: end - 1,
            id: last.id.clone(),
        },
        None => cursor.clone(),
    };

    Page {
        docs: page.to_vec(),
        next_cursor,
        num_found: docs.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candidate;
    use assert2::{check, let_assert};
    use rstest::rstest;

    fn docs(ids: &[&str]) -> Vec<MergedDoc> {
        ids.iter()
            .map(|id| MergedDoc::plain(&Candidate::new(*id, 1.0)))
            .collect()
    }

    fn page_ids(page: &Page) -> Vec<&str> {
        page.docs.iter().map(|doc| doc.id.as_str()).collect()
    }

    #[test]
    fn test_pages_walk_the_whole_list() {
        let docs = docs(&["6", "a", "b", "c", "d"]);
        let mut cursor = CursorMark::Start;
        let mut seen = vec![];
        loop {
            let page = paginate(&docs, &cursor, 2);
            check!(page.num_found == 5);
            if page.next_cursor == cursor {
                check!(page.docs.is_empty());
                break;
            }
            seen.extend(page_ids(&page).into_iter().map(str::to_string));
            cursor = page.next_cursor;
        }
        check!(seen == ["6", "a", "b", "c", "d"]);
    }

    #[test]
    fn test_resume_uses_position_when_doc_is_gone() {
        let cursor = CursorMark::After {
            position: 1,
            id: DocId::from("gone"),
        };
        let page = paginate(&docs(&["a", "b", "c", "d"]), &cursor, 10);
        check!(page_ids(&page) == ["c", "d"]);
    }

    #[test]
    fn test_resume_follows_moved_doc() {
        let cursor = CursorMark::After {
            position: 0,
            id: DocId::from("b"),
        };
        let page = paginate(&docs(&["a", "b", "c"]), &cursor, 1);
        check!(page_ids(&page) == ["c"]);
    }

    #[rstest]
    #[case(CursorMark::Start, "*")]
    #[case(CursorMark::After { position: 2, id: DocId::from("ab") }, "000000026162")]
    fn test_display_and_parse(#[case] cursor: CursorMark, #[case] text: &str) {
        check!(cursor.to_string() == text);
        let_assert!(Ok(parsed) = text.parse::<CursorMark>());
        check!(parsed == cursor);
    }

    #[rstest]
    #[case("", ParseCursorError::InvalidLength(0))]
    #[case("0000000", ParseCursorError::InvalidLength(7))]
    #[case("0000000zzz", ParseCursorError::InvalidHex)]
    #[case("00000000ff", ParseCursorError::InvalidId)]
    fn test_parse_errors(#[case] text: &str, #[case] expected: ParseCursorError) {
        let_assert!(Err(err) = text.parse::<CursorMark>());
        check!(err == expected);
    }

    #[test]
    fn test_serde_uses_string_form() {
        let cursor = CursorMark::After {
            position: 0,
            id: DocId::from("x"),
        };
        let json = serde_json::to_string(&cursor).unwrap();
        check!(json == "\"0000000078\"");
        let back: CursorMark = serde_json::from_str(&json).unwrap();
        check!(back == cursor);
    }
}
