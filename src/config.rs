// Engine configuration (SPEC_FULL.md §6.3, §6.4, §11): which data types to
// merge and the resource caps the orchestrator enforces.

use crate::cancel::CancelToken;
use crate::constants::DEFAULT_SIZE_LIMIT_BYTES;
use crate::progress::ProgressSink;

/// Per-data-type inclusion flags. Infrastructural tables (`Location`,
/// `LastModified`, `MigrationHistory`) are always merged regardless of these.
#[derive(Debug, Clone, Copy)]
pub struct IncludeFlags {
    pub notes: bool,
    pub bookmarks: bool,
    pub highlights: bool,
    pub tags: bool,
    pub inputfields: bool,
    pub playlists: bool,
}

impl Default for IncludeFlags {
    fn default() -> Self {
        Self {
            notes: true,
            bookmarks: true,
            highlights: true,
            tags: true,
            inputfields: true,
            playlists: true,
        }
    }
}

impl IncludeFlags {
    /// Whether the given table is gated in by these flags (§6.4's table mask).
    /// Unknown/infrastructural tables are not gated by this function; callers
    /// should merge them unconditionally.
    pub fn allows(&self, table: &str) -> bool {
        match table {
            "Note" => self.notes,
            "Bookmark" => self.bookmarks,
            "Mark" | "BlockRange" => self.highlights,
            "Tag" | "TagMap" => self.tags,
            "InputField" => self.inputfields,
            "Item" | "ItemMarker" | "ItemLocationMap" | "ItemMediaMap" | "MarkerBibleVerseMap"
            | "MarkerParagraphMap" | "Media" | "Accuracy" => self.playlists,
            _ => true,
        }
    }
}

pub struct Config {
    pub include: IncludeFlags,
    pub progress: Option<ProgressSink>,
    pub cancel: Option<CancelToken>,
    pub size_limit_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include: IncludeFlags::default(),
            progress: None,
            cancel: None,
            size_limit_bytes: DEFAULT_SIZE_LIMIT_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_include_everything() {
        let flags = IncludeFlags::default();
        for table in [
            "Note",
            "Bookmark",
            "Mark",
            "BlockRange",
            "Tag",
            "TagMap",
            "InputField",
            "Item",
        ] {
            assert!(flags.allows(table));
        }
    }

    #[test]
    fn disabling_highlights_gates_mark_and_blockrange_only() {
        let flags = IncludeFlags {
            highlights: false,
            ..IncludeFlags::default()
        };
        assert!(!flags.allows("Mark"));
        assert!(!flags.allows("BlockRange"));
        assert!(flags.allows("Note"));
        assert!(flags.allows("Location"));
    }

    #[test]
    fn disabling_playlists_gates_the_whole_playlist_cluster() {
        let flags = IncludeFlags {
            playlists: false,
            ..IncludeFlags::default()
        };
        for table in [
            "Item",
            "ItemMarker",
            "ItemLocationMap",
            "ItemMediaMap",
            "MarkerBibleVerseMap",
            "MarkerParagraphMap",
            "Media",
            "Accuracy",
        ] {
            assert!(!flags.allows(table));
        }
    }
}
