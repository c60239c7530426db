// Schema Model: static table metadata the generic merger consults (SPEC_FULL.md §4.3).

use std::collections::HashMap;

/// One foreign key: a column in this table referencing the primary key of another.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub column: &'static str,
    pub referenced_table: &'static str,
}

/// Primary-key conflict resolution strategy for a table (§4.6 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkStrategy {
    /// `LastModified`/`MigrationHistory`-style bookkeeping tables with no surrogate pk
    /// that anything else references.
    None,
    /// Monotonic surrogate, conflicts resolved by an increasing per-source offset.
    Offset,
    /// Conflicts resolved by searching upward from a running counter for a free id.
    NextAvailable,
}

/// Static declaration of one table's merge policy.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: &'static str,
    pub primary_key: Option<&'static str>,
    /// Alternative identity rules; each is an ordered list of column names.
    /// A row matches the table's identity if *any* rule matches (first match wins).
    pub identity_rules: &'static [&'static [&'static str]],
    pub foreign_keys: &'static [ForeignKey],
    pub pk_strategy: PkStrategy,
}

const ACCURACY: TableSpec = TableSpec {
    name: "Accuracy",
    primary_key: Some("AccuracyId"),
    identity_rules: &[&["Description"]],
    foreign_keys: &[],
    pk_strategy: PkStrategy::NextAvailable,
};

const LOCATION: TableSpec = TableSpec {
    name: "Location",
    primary_key: Some("LocationId"),
    // Location's identity is content-dependent (two alternative rules chosen per
    // row); handled entirely by the dedicated Location Merger, not the generic one.
    identity_rules: &[],
    foreign_keys: &[],
    pk_strategy: PkStrategy::NextAvailable,
};

const TAG: TableSpec = TableSpec {
    name: "Tag",
    primary_key: Some("TagId"),
    identity_rules: &[&["Type", "Name"]],
    foreign_keys: &[],
    pk_strategy: PkStrategy::NextAvailable,
};

const MEDIA: TableSpec = TableSpec {
    name: "Media",
    primary_key: Some("MediaId"),
    identity_rules: &[&["FilePath"]],
    foreign_keys: &[],
    pk_strategy: PkStrategy::NextAvailable,
};

const MARK: TableSpec = TableSpec {
    name: "Mark",
    primary_key: Some("MarkId"),
    identity_rules: &[&["MarkGuid"]],
    foreign_keys: &[ForeignKey {
        column: "LocationId",
        referenced_table: "Location",
    }],
    pk_strategy: PkStrategy::NextAvailable,
};

const ITEM: TableSpec = TableSpec {
    name: "Item",
    primary_key: Some("ItemId"),
    identity_rules: &[&["Label", "ThumbnailFilePath"]],
    foreign_keys: &[
        ForeignKey {
            column: "AccuracyId",
            referenced_table: "Accuracy",
        },
        ForeignKey {
            column: "MediaId",
            referenced_table: "Media",
        },
    ],
    pk_strategy: PkStrategy::NextAvailable,
};

const BOOKMARK: TableSpec = TableSpec {
    name: "Bookmark",
    primary_key: Some("BookmarkId"),
    identity_rules: &[&["LocationId", "PublicationLocationId"]],
    foreign_keys: &[
        ForeignKey {
            column: "LocationId",
            referenced_table: "Location",
        },
        ForeignKey {
            column: "PublicationLocationId",
            referenced_table: "Location",
        },
    ],
    pk_strategy: PkStrategy::NextAvailable,
};

const NOTE: TableSpec = TableSpec {
    name: "Note",
    primary_key: Some("NoteId"),
    identity_rules: &[&["Guid"]],
    foreign_keys: &[
        ForeignKey {
            column: "MarkId",
            referenced_table: "Mark",
        },
        ForeignKey {
            column: "LocationId",
            referenced_table: "Location",
        },
    ],
    pk_strategy: PkStrategy::NextAvailable,
};

const BLOCK_RANGE: TableSpec = TableSpec {
    name: "BlockRange",
    primary_key: Some("BlockRangeId"),
    identity_rules: &[&[
        "MarkId",
        "Identifier",
        "StartToken",
        "EndToken",
    ]],
    foreign_keys: &[ForeignKey {
        column: "MarkId",
        referenced_table: "Mark",
    }],
    pk_strategy: PkStrategy::Offset,
};

const ITEM_MARKER: TableSpec = TableSpec {
    name: "ItemMarker",
    primary_key: Some("ItemMarkerId"),
    identity_rules: &[&["ItemId", "StartTimeTicks"]],
    foreign_keys: &[ForeignKey {
        column: "ItemId",
        referenced_table: "Item",
    }],
    pk_strategy: PkStrategy::NextAvailable,
};

const ITEM_LOCATION_MAP: TableSpec = TableSpec {
    name: "ItemLocationMap",
    primary_key: Some("ItemLocationMapId"),
    identity_rules: &[&["ItemId", "LocationId"]],
    foreign_keys: &[
        ForeignKey {
            column: "ItemId",
            referenced_table: "Item",
        },
        ForeignKey {
            column: "LocationId",
            referenced_table: "Location",
        },
    ],
    pk_strategy: PkStrategy::NextAvailable,
};

const ITEM_MEDIA_MAP: TableSpec = TableSpec {
    name: "ItemMediaMap",
    primary_key: Some("ItemMediaMapId"),
    identity_rules: &[&["ItemId", "MediaId"]],
    foreign_keys: &[
        ForeignKey {
            column: "ItemId",
            referenced_table: "Item",
        },
        ForeignKey {
            column: "MediaId",
            referenced_table: "Media",
        },
    ],
    pk_strategy: PkStrategy::NextAvailable,
};

const TAG_MAP: TableSpec = TableSpec {
    name: "TagMap",
    primary_key: Some("TagMapId"),
    identity_rules: &[
        &["TagId", "Position"],
        &["TagId", "LocationId"],
        &["TagId", "NoteId"],
    ],
    foreign_keys: &[
        ForeignKey {
            column: "TagId",
            referenced_table: "Tag",
        },
        ForeignKey {
            column: "PlaylistItemId",
            referenced_table: "Item",
        },
        ForeignKey {
            column: "LocationId",
            referenced_table: "Location",
        },
        ForeignKey {
            column: "NoteId",
            referenced_table: "Note",
        },
    ],
    pk_strategy: PkStrategy::NextAvailable,
};

const MARKER_BIBLE_VERSE_MAP: TableSpec = TableSpec {
    name: "MarkerBibleVerseMap",
    primary_key: Some("MarkerBibleVerseMapId"),
    identity_rules: &[&["MarkerId", "VerseIndex"]],
    foreign_keys: &[ForeignKey {
        column: "MarkerId",
        referenced_table: "ItemMarker",
    }],
    pk_strategy: PkStrategy::NextAvailable,
};

const MARKER_PARAGRAPH_MAP: TableSpec = TableSpec {
    name: "MarkerParagraphMap",
    primary_key: Some("MarkerParagraphMapId"),
    identity_rules: &[&["MarkerId", "MepsDocumentId", "ParagraphIndex"]],
    foreign_keys: &[ForeignKey {
        column: "MarkerId",
        referenced_table: "ItemMarker",
    }],
    pk_strategy: PkStrategy::NextAvailable,
};

const INPUT_FIELD: TableSpec = TableSpec {
    name: "InputField",
    primary_key: Some("InputFieldId"),
    identity_rules: &[&["LocationId", "TextTag", "Value"]],
    foreign_keys: &[ForeignKey {
        column: "LocationId",
        referenced_table: "Location",
    }],
    pk_strategy: PkStrategy::Offset,
};

const LAST_MODIFIED: TableSpec = TableSpec {
    name: "LastModified",
    primary_key: None,
    identity_rules: &[&["LastModified"]],
    foreign_keys: &[],
    pk_strategy: PkStrategy::None,
};

const MIGRATION_HISTORY: TableSpec = TableSpec {
    name: "MigrationHistory",
    primary_key: None,
    identity_rules: &[&["MigrateFrom", "MigrateTo"]],
    foreign_keys: &[],
    pk_strategy: PkStrategy::None,
};

/// Canonical dependency order (SPEC_FULL.md §3.3). `Location` is listed for
/// completeness even though it is handled by the dedicated Location Merger
/// rather than the Generic Row Merger.
pub const DEPENDENCY_ORDER: &[TableSpec] = &[
    LAST_MODIFIED,
    MIGRATION_HISTORY,
    ACCURACY,
    LOCATION,
    TAG,
    MEDIA,
    MARK,
    ITEM,
    BOOKMARK,
    NOTE,
    BLOCK_RANGE,
    ITEM_MARKER,
    ITEM_LOCATION_MAP,
    ITEM_MEDIA_MAP,
    TAG_MAP,
    MARKER_BIBLE_VERSE_MAP,
    MARKER_PARAGRAPH_MAP,
    INPUT_FIELD,
];

/// A fallback spec for a table present in a source database but not named in
/// `DEPENDENCY_ORDER` (SPEC_FULL.md §3.3): identity is every non-pk column's
/// content (matching the pattern every explicitly modeled table follows: a
/// surrogate pk is never itself part of its own identity rule), no foreign
/// keys are rewritten, and primary-key handling depends on whether the table
/// actually declares one. `table` and `all_columns` are runtime discoveries
/// (via `Session::tables`/`columns`); this run's sole merge pass is the only
/// consumer, so leaking them to `'static` to fit `TableSpec`'s shape never
/// accumulates across runs.
pub fn fallback_spec(table: String, all_columns: Vec<String>, primary_key: Option<String>) -> TableSpec {
    let name: &'static str = Box::leak(table.into_boxed_str());
    let identity_columns: Vec<String> = all_columns
        .into_iter()
        .filter(|c| primary_key.as_deref() != Some(c.as_str()))
        .collect();
    let columns: &'static [&'static str] = Box::leak(
        identity_columns
            .into_iter()
            .map(|c| -> &'static str { Box::leak(c.into_boxed_str()) })
            .collect::<Vec<_>>()
            .into_boxed_slice(),
    );
    let pk_strategy = match primary_key {
        Some(_) => PkStrategy::Offset,
        None => PkStrategy::None,
    };
    TableSpec {
        name,
        primary_key: primary_key.map(|c| -> &'static str { Box::leak(c.into_boxed_str()) }),
        identity_rules: Box::leak(Box::new([columns])),
        foreign_keys: &[],
        pk_strategy,
    }
}

pub fn lookup(table: &str) -> Option<&'static TableSpec> {
    DEPENDENCY_ORDER.iter().find(|t| t.name == table)
}

pub fn by_name() -> HashMap<&'static str, &'static TableSpec> {
    DEPENDENCY_ORDER.iter().map(|t| (t.name, t)).collect()
}

/// Column value canonical stringification for identity-rule comparison (§4.3).
/// `MepsLanguage` normalizes null and zero to `"0"`; every other column emits
/// `"NULL"` for null, else its textual representation.
pub fn canonical_value(column: &str, value: Option<&str>) -> String {
    if column == "MepsLanguage" {
        match value {
            None => "0".to_string(),
            Some(v) if v == "0" => "0".to_string(),
            Some(v) => v.to_string(),
        }
    } else {
        match value {
            None => "NULL".to_string(),
            Some(v) => v.to_string(),
        }
    }
}

/// Join canonicalized column values into one signature string.
pub fn signature(columns: &[&str], values: &[Option<&str>]) -> String {
    columns
        .iter()
        .zip(values.iter())
        .map(|(c, v)| canonical_value(c, *v))
        .collect::<Vec<_>>()
        .join("|")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_order_lists_location_before_dependents() {
        let pos = |name: &str| DEPENDENCY_ORDER.iter().position(|t| t.name == name).unwrap();
        assert!(pos("Location") < pos("Mark"));
        assert!(pos("Mark") < pos("Note"));
        assert!(pos("Item") < pos("ItemMarker"));
        assert!(pos("ItemMarker") < pos("MarkerBibleVerseMap"));
    }

    #[test]
    fn meps_language_null_and_zero_canonicalize_the_same() {
        assert_eq!(canonical_value("MepsLanguage", None), "0");
        assert_eq!(canonical_value("MepsLanguage", Some("0")), "0");
        assert_eq!(canonical_value("MepsLanguage", Some("7")), "7");
    }

    #[test]
    fn other_columns_use_null_sentinel() {
        assert_eq!(canonical_value("KeySymbol", None), "NULL");
        assert_eq!(canonical_value("KeySymbol", Some("nwt")), "nwt");
    }

    #[test]
    fn fallback_spec_uses_offset_strategy_when_a_primary_key_is_detected() {
        let spec = fallback_spec(
            "CustomTable".to_string(),
            vec!["CustomId".to_string(), "Value".to_string()],
            Some("CustomId".to_string()),
        );
        assert_eq!(spec.name, "CustomTable");
        assert_eq!(spec.primary_key, Some("CustomId"));
        assert_eq!(spec.pk_strategy, PkStrategy::Offset);
        assert_eq!(spec.identity_rules.len(), 1);
        // The surrogate pk itself must not be part of its own identity rule,
        // matching every explicitly modeled table.
        assert_eq!(spec.identity_rules[0], ["Value"]);
    }

    #[test]
    fn fallback_spec_uses_none_strategy_without_a_primary_key() {
        let spec = fallback_spec(
            "NoKeyTable".to_string(),
            vec!["A".to_string(), "B".to_string()],
            None,
        );
        assert_eq!(spec.primary_key, None);
        assert_eq!(spec.pk_strategy, PkStrategy::None);
    }

    #[test]
    fn signature_joins_canonical_values_with_pipe() {
        let sig = signature(
            &["BookNumber", "ChapterNumber", "MepsLanguage"],
            &[Some("1"), Some("1"), None],
        );
        assert_eq!(sig, "1|1|0");
    }
}
