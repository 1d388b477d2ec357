//! Day-bucketed message store.
//!
//! [`MessageSections`] is the single source of truth for what is rendered.
//! Sections are sorted ascending by date and rows inside a section ascending
//! by `(time, kind)`. Index paths shift on every insert/remove, so callers
//! must look them up again after each mutation instead of caching them.

use chrono::NaiveDate;
use serde::Serialize;

use chatsync_shared::types::{day_of, Message, MessageId, ThreadType};

use crate::row::MessageRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSection {
    pub date: NaiveDate,
    pub rows: Vec<MessageRow>,
}

/// Where a freshly inserted row landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    pub index_path: IndexPath,
    pub created_section: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Removed {
    pub index_path: IndexPath,
    pub removed_section: bool,
    pub row: MessageRow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageSections {
    sections: Vec<MessageSection>,
}

impl MessageSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> &[MessageSection] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Total number of rows across all sections.
    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    pub fn clear(&mut self) {
        self.sections.clear();
    }

    pub fn rows(&self) -> impl Iterator<Item = (IndexPath, &MessageRow)> {
        self.sections.iter().enumerate().flat_map(|(s, section)| {
            section
                .rows
                .iter()
                .enumerate()
                .map(move |(r, row)| (IndexPath::new(s, r), row))
        })
    }

    pub fn row(&self, at: IndexPath) -> Option<&MessageRow> {
        self.sections.get(at.section)?.rows.get(at.row)
    }

    pub fn row_mut(&mut self, at: IndexPath) -> Option<&mut MessageRow> {
        self.sections.get_mut(at.section)?.rows.get_mut(at.row)
    }

    pub fn index_path_by_unique_id(&self, unique_id: &str) -> Option<IndexPath> {
        self.rows()
            .find(|(_, row)| row.unique_id() == unique_id)
            .map(|(ip, _)| ip)
    }

    pub fn index_path_by_message_id(&self, id: MessageId) -> Option<IndexPath> {
        self.rows()
            .find(|(_, row)| !row.is_banner() && row.message.id == Some(id))
            .map(|(ip, _)| ip)
    }

    /// Look a row up by server id first, then by client unique id.
    pub fn find(&self, id: Option<MessageId>, unique_id: Option<&str>) -> Option<IndexPath> {
        id.and_then(|id| self.index_path_by_message_id(id))
            .or_else(|| unique_id.and_then(|u| self.index_path_by_unique_id(u)))
    }

    pub fn contains_unique_id(&self, unique_id: &str) -> bool {
        self.index_path_by_unique_id(unique_id).is_some()
    }

    /// Oldest real message (banners excluded).
    pub fn first_message(&self) -> Option<&Message> {
        self.rows()
            .map(|(_, row)| row)
            .find(|row| !row.is_banner())
            .map(|row| &row.message)
    }

    /// Newest real message (banners excluded).
    pub fn last_message(&self) -> Option<&Message> {
        self.sections
            .iter()
            .rev()
            .flat_map(|s| s.rows.iter().rev())
            .find(|row| !row.is_banner())
            .map(|row| &row.message)
    }

    /// Newest message the server has acknowledged; pagination cursors are
    /// taken from here so local placeholders never move them.
    pub fn last_acknowledged_message(&self) -> Option<&Message> {
        self.sections
            .iter()
            .rev()
            .flat_map(|s| s.rows.iter().rev())
            .find(|row| !row.is_banner() && row.message.server_id().is_some())
            .map(|row| &row.message)
    }

    pub fn first_acknowledged_message(&self) -> Option<&Message> {
        self.rows()
            .map(|(_, row)| row)
            .find(|row| !row.is_banner() && row.message.server_id().is_some())
            .map(|row| &row.message)
    }

    pub fn last_index_path(&self) -> Option<IndexPath> {
        let section = self.sections.len().checked_sub(1)?;
        let row = self.sections[section].rows.len().checked_sub(1)?;
        Some(IndexPath::new(section, row))
    }

    /// Insert a row into its day bucket at its sorted position.
    pub fn insert(&mut self, row: MessageRow) -> Inserted {
        let date = day_of(row.message.time);
        let (section, created_section) =
            match self.sections.binary_search_by(|s| s.date.cmp(&date)) {
                Ok(idx) => (idx, false),
                Err(idx) => {
                    self.sections.insert(
                        idx,
                        MessageSection {
                            date,
                            rows: Vec::new(),
                        },
                    );
                    (idx, true)
                }
            };

        let key = row.sort_key();
        let rows = &mut self.sections[section].rows;
        let position = rows.partition_point(|r| r.sort_key() <= key);
        rows.insert(position, row);

        Inserted {
            index_path: IndexPath::new(section, position),
            created_section,
        }
    }

    /// Remove a row, dropping its section when it becomes empty.
    pub fn remove(&mut self, at: IndexPath) -> Option<Removed> {
        let section = self.sections.get_mut(at.section)?;
        if at.row >= section.rows.len() {
            return None;
        }
        let row = section.rows.remove(at.row);
        let removed_section = section.rows.is_empty();
        if removed_section {
            self.sections.remove(at.section);
        }
        Some(Removed {
            index_path: at,
            removed_section,
            row,
        })
    }

    /// Move a row whose time changed back into sorted position.
    ///
    /// Returns `(from, to)` when the row actually moved.
    pub fn reposition(&mut self, at: IndexPath) -> Option<(IndexPath, IndexPath)> {
        let row = self.row(at)?;
        let date = day_of(row.message.time);
        let key = row.sort_key();
        let section = &self.sections[at.section];
        let before_ok = at.row == 0 || section.rows[at.row - 1].sort_key() <= key;
        let after_ok = at.row + 1 >= section.rows.len() || key <= section.rows[at.row + 1].sort_key();
        if section.date == date && before_ok && after_ok {
            return None;
        }
        let removed = self.remove(at)?;
        let inserted = self.insert(removed.row);
        Some((at, inserted.index_path))
    }

    /// Recompute "first/last message of a consecutive same-sender run" for
    /// every row and return the rows whose flags changed.
    ///
    /// Runs never cross a day boundary or an unread banner.
    pub fn recompute_run_flags(&mut self, thread_type: ThreadType) -> Vec<IndexPath> {
        let mut changed = Vec::new();
        for (s, section) in self.sections.iter_mut().enumerate() {
            let senders: Vec<Option<i64>> = section
                .rows
                .iter()
                .map(|row| {
                    if row.is_banner() {
                        None
                    } else {
                        Some(row.message.sender_id().unwrap_or(i64::MIN))
                    }
                })
                .collect();
            for (r, row) in section.rows.iter_mut().enumerate() {
                if row.is_banner() {
                    continue;
                }
                let prev = r.checked_sub(1).and_then(|p| senders[p]);
                let next = senders.get(r + 1).copied().flatten();
                let first = prev != senders[r];
                let last = next != senders[r];
                if row.set_run_flags(first, last, thread_type) {
                    changed.push(IndexPath::new(s, r));
                }
            }
        }
        changed
    }

    /// Message ids of rows that hold a real server id.
    pub fn server_ids_at(&self, paths: &[IndexPath]) -> Vec<MessageId> {
        paths
            .iter()
            .filter_map(|ip| self.row(*ip))
            .filter_map(|row| row.message.server_id())
            .collect()
    }

    /// True when sections and rows satisfy the ordering invariants.
    pub fn is_sorted(&self) -> bool {
        let sections_sorted = self.sections.windows(2).all(|w| w[0].date < w[1].date);
        let rows_sorted = self.sections.iter().all(|s| {
            let times: Vec<_> = s
                .rows
                .iter()
                .filter(|r| !r.is_banner())
                .map(|r| r.message.time)
                .collect();
            times.windows(2).all(|w| w[0] <= w[1]) && s.rows.iter().all(|r| day_of(r.message.time) == s.date)
        });
        sections_sorted && rows_sorted
    }
}

#[cfg(test)]
mod tests {
    use chatsync_shared::types::Participant;

    use super::*;
    use crate::row::RowContext;

    const DAY: u64 = 24 * 3_600_000;
    const BASE: u64 = 1_700_000_000_000;

    fn ctx() -> RowContext {
        RowContext {
            current_user_id: 1,
            thread_type: ThreadType::Group,
        }
    }

    fn row(id: i64, time: u64, sender: i64) -> MessageRow {
        MessageRow::new(
            Message::text(
                Some(id),
                format!("u{id}"),
                1,
                time,
                Some(Participant { id: sender, name: None }),
                "x",
            ),
            &ctx(),
        )
    }

    #[test]
    fn test_insert_creates_sorted_day_sections() {
        let mut store = MessageSections::new();
        store.insert(row(3, BASE + 2 * DAY, 2));
        store.insert(row(1, BASE, 2));
        let inserted = store.insert(row(2, BASE + DAY, 2));

        assert!(inserted.created_section);
        assert_eq!(inserted.index_path, IndexPath::new(1, 0));
        assert_eq!(store.sections().len(), 3);
        assert!(store.is_sorted());
    }

    #[test]
    fn test_insert_keeps_rows_sorted_within_day() {
        let mut store = MessageSections::new();
        store.insert(row(1, BASE + 30, 2));
        store.insert(row(2, BASE + 10, 2));
        let inserted = store.insert(row(3, BASE + 20, 2));

        assert!(!inserted.created_section);
        assert_eq!(inserted.index_path, IndexPath::new(0, 1));
        let ids: Vec<_> = store.rows().map(|(_, r)| r.message.id.unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_remove_drops_empty_section() {
        let mut store = MessageSections::new();
        store.insert(row(1, BASE, 2));
        store.insert(row(2, BASE + DAY, 2));

        let removed = store.remove(IndexPath::new(0, 0)).unwrap();
        assert!(removed.removed_section);
        assert_eq!(store.sections().len(), 1);
        assert_eq!(store.index_path_by_message_id(2), Some(IndexPath::new(0, 0)));
    }

    #[test]
    fn test_reposition_moves_only_when_out_of_order() {
        let mut store = MessageSections::new();
        store.insert(row(1, BASE + 10, 2));
        store.insert(row(2, BASE + 20, 2));
        store.insert(row(3, BASE + 30, 2));

        assert_eq!(store.reposition(IndexPath::new(0, 1)), None);

        store.row_mut(IndexPath::new(0, 0)).unwrap().message.time = BASE + 40;
        let moved = store.reposition(IndexPath::new(0, 0));
        assert_eq!(moved, Some((IndexPath::new(0, 0), IndexPath::new(0, 2))));
        assert!(store.is_sorted());
    }

    #[test]
    fn test_run_flags_follow_sender_changes() {
        let mut store = MessageSections::new();
        store.insert(row(1, BASE + 10, 2));
        store.insert(row(2, BASE + 20, 2));
        store.insert(row(3, BASE + 30, 3));
        store.recompute_run_flags(ThreadType::Group);

        let flags: Vec<_> = store
            .rows()
            .map(|(_, r)| (r.is_first_message_of_user, r.is_last_message_of_user))
            .collect();
        assert_eq!(flags, vec![(true, false), (false, true), (true, true)]);

        store.insert(row(4, BASE + 40, 3));
        let changed = store.recompute_run_flags(ThreadType::Group);
        assert_eq!(changed, vec![IndexPath::new(0, 2), IndexPath::new(0, 3)]);
    }

    #[test]
    fn test_banner_splits_runs_and_is_skipped_by_lookups() {
        let mut store = MessageSections::new();
        store.insert(row(1, BASE + 10, 2));
        store.insert(MessageRow::unread_banner(1, BASE + 10));
        store.insert(row(2, BASE + 20, 2));
        store.recompute_run_flags(ThreadType::Group);

        let first = store.row(IndexPath::new(0, 0)).unwrap();
        assert!(first.is_last_message_of_user);
        assert_eq!(store.last_message().unwrap().id, Some(2));
        assert!(store.row(IndexPath::new(0, 1)).unwrap().is_banner());
        assert!(store.is_sorted());
    }

    #[test]
    fn test_find_prefers_id_then_unique_id() {
        let mut store = MessageSections::new();
        let mut placeholder = row(9, BASE, 1);
        placeholder.message.id = None;
        placeholder.message.unique_id = "abc".into();
        store.insert(placeholder);
        store.insert(row(1, BASE + 5, 2));

        assert_eq!(store.find(Some(1), None), Some(IndexPath::new(0, 1)));
        assert_eq!(store.find(Some(42), Some("abc")), Some(IndexPath::new(0, 0)));
        assert_eq!(store.last_acknowledged_message().unwrap().id, Some(1));
    }
}
