// Merge Trace: a structured event log of what the Generic/Location mergers did
// to each row, surfaced to callers via the progress sink and folded into logs.

#[derive(Debug, Clone)]
pub enum MergeEvent {
    /// A row was inserted under `final_id`, possibly different from `original_id`.
    Inserted {
        table: String,
        source_index: usize,
        original_id: i64,
        final_id: i64,
    },
    /// A row matched an existing target row via an identity rule and was skipped.
    Duplicate {
        table: String,
        source_index: usize,
        original_id: i64,
        existing_id: i64,
    },
    /// A foreign key value was rewritten through the registry.
    Remapped {
        table: String,
        column: String,
        from: i64,
        to: i64,
    },
    /// A foreign key value could not be resolved to any row in the target.
    /// `row_id` is the hosting row's own (already-finalized) primary key;
    /// `missing_value` is the foreign key value that failed to resolve.
    Orphan {
        table: String,
        column: String,
        row_id: i64,
        missing_value: i64,
    },
}

#[derive(Debug, Default)]
pub struct MergeTrace {
    events: Vec<MergeEvent>,
}

impl MergeTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: MergeEvent) {
        match &event {
            MergeEvent::Inserted { table, final_id, .. } => {
                log::debug!("inserted {table} as {final_id}")
            }
            MergeEvent::Duplicate { table, existing_id, .. } => {
                log::debug!("duplicate in {table}, mapped to existing {existing_id}")
            }
            MergeEvent::Remapped { table, column, from, to } => {
                log::debug!("remapped {table}.{column}: {from} -> {to}")
            }
            MergeEvent::Orphan { table, column, row_id, missing_value } => {
                log::warn!(
                    "orphan reference in {table}.{column} on row {row_id}: missing {missing_value}"
                )
            }
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &[MergeEvent] {
        &self.events
    }

    pub fn orphans(&self) -> impl Iterator<Item = &MergeEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, MergeEvent::Orphan { .. }))
    }
}
