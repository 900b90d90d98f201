//! SQLite-backed dictionary store.
//!
//! Headword and cross-reference stages compare with `GLOB`, which is
//! case-sensitive and already speaks `*`/`?`; definition search uses `LIKE`,
//! which is case-insensitive. Every user value is a bound parameter.

use crate::entry::{Entry, WordSource};
use crate::query::{MatchPattern, WILDCARD_ANY, WILDCARD_ONE};
use crate::store::{DictionaryStore, StoreError};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, Row, named_params, params};
use std::path::Path;
use tracing::debug;

const ENTRY_COLUMNS: &str = "index_num, entry, alternate_forms, related_forms, see_also, \
     definition, part_of_speech, origin, examples, notes, source";

/// Apostrophes and dashes removed inside SQL, mirroring `strip_glottal_and_dash`.
fn stripped(column: &str) -> String {
    format!("REPLACE(REPLACE({column}, '''', ''), '-', '')")
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens an existing dictionary database without write access.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|err| StoreError::Unavailable(format!("{}: {err}", path.display())))?;
        Ok(Self::from_connection(conn))
    }

    /// Opens (creating if needed) a dictionary database and ensures the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|err| StoreError::Unavailable(format!("{}: {err}", path.display())))?;
        let store = Self::from_connection(conn);
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self::from_connection(Connection::open_in_memory()?);
        store.init_schema()?;
        Ok(store)
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS diksionariu (
                index_num INTEGER NOT NULL,
                entry TEXT NOT NULL CHECK (entry <> ''),
                alternate_forms TEXT NOT NULL DEFAULT '',
                related_forms TEXT NOT NULL DEFAULT '',
                see_also TEXT NOT NULL DEFAULT '',
                definition TEXT NOT NULL DEFAULT '',
                part_of_speech TEXT NOT NULL DEFAULT '',
                origin TEXT NOT NULL DEFAULT '',
                examples TEXT NOT NULL DEFAULT '',
                notes TEXT NOT NULL DEFAULT '',
                source TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_diksionariu_entry
            ON diksionariu(entry);

            CREATE INDEX IF NOT EXISTS idx_diksionariu_index_num
            ON diksionariu(index_num);
            "#,
        )?;
        Ok(())
    }

    /// Inserts entries in one transaction; returns how many were written.
    pub fn insert_entries(&self, entries: &[Entry]) -> Result<usize, StoreError> {
        if let Some(bad) = entries.iter().find(|entry| entry.entry.is_empty()) {
            return Err(StoreError::Data(format!(
                "entry #{} has an empty headword",
                bad.index_num
            )));
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO diksionariu ({ENTRY_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ))?;
            for entry in entries {
                stmt.execute(params![
                    entry.index_num,
                    entry.entry,
                    entry.alternate_forms,
                    entry.related_forms,
                    entry.see_also,
                    entry.definition,
                    entry.part_of_speech,
                    entry.origin,
                    entry.examples,
                    entry.notes,
                    entry.source,
                ])?;
            }
        }
        tx.commit()?;
        debug!(count = entries.len(), "inserted dictionary entries");
        Ok(entries.len())
    }

    fn query_entries(
        &self,
        sql: &str,
        params: &[(&str, &dyn rusqlite::ToSql)],
    ) -> Result<Vec<Entry>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, entry_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        index_num: row.get(0)?,
        entry: row.get(1)?,
        alternate_forms: row.get(2)?,
        related_forms: row.get(3)?,
        see_also: row.get(4)?,
        definition: row.get(5)?,
        part_of_speech: row.get(6)?,
        origin: row.get(7)?,
        examples: row.get(8)?,
        notes: row.get(9)?,
        source: row.get(10)?,
    })
}

/// Escapes `GLOB` metacharacters other than the user's wildcards. `[` is the
/// only one left once `*` and `?` are meant literally as wildcards.
fn glob_escape(text: &str) -> String {
    text.replace('[', "[[]")
}

/// Translates user wildcards into `LIKE` syntax with `\` as the escape.
fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        match c {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            WILDCARD_ANY => out.push('%'),
            WILDCARD_ONE => out.push('_'),
            other => out.push(other),
        }
    }
    out.push('%');
    out
}

impl DictionaryStore for SqliteStore {
    fn find_exact(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
        let column = if pattern.literal {
            "entry".to_string()
        } else {
            stripped("entry")
        };
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM diksionariu \
             WHERE {column} GLOB :pattern \
             ORDER BY CAST(index_num AS INTEGER)"
        );
        let glob = glob_escape(&pattern.comparable());
        self.query_entries(&sql, named_params! { ":pattern": glob })
    }

    fn find_cross_reference(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
        let [alternate, related, also] = ["alternate_forms", "related_forms", "see_also"].map(|c| {
            if pattern.literal {
                c.to_string()
            } else {
                stripped(c)
            }
        });
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM diksionariu \
             WHERE {alternate} GLOB :pattern \
             OR {related} GLOB :pattern \
             OR {also} GLOB :pattern \
             ORDER BY CAST(index_num AS INTEGER)"
        );
        let glob = format!("*[[][[]{}]]*", glob_escape(&pattern.comparable()));
        self.query_entries(&sql, named_params! { ":pattern": glob })
    }

    fn find_partial(
        &self,
        pattern: &MatchPattern,
        min_chars: usize,
    ) -> Result<Vec<String>, StoreError> {
        let column = if pattern.literal {
            "entry".to_string()
        } else {
            stripped("entry")
        };
        let sql = format!(
            "SELECT entry FROM diksionariu \
             WHERE length(entry) > :min_chars \
             AND {column} <> '' \
             AND (instr(:query, {column}) > 0 OR {column} GLOB :pattern) \
             GROUP BY entry \
             ORDER BY MIN(CAST(index_num AS INTEGER))"
        );
        let query = pattern.comparable();
        let glob = format!("*{}*", glob_escape(&query));
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            named_params! {
                ":min_chars": min_chars as i64,
                ":query": query,
                ":pattern": glob,
            },
            |row| row.get::<_, String>(0),
        )?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn find_by_definition(&self, pattern: &MatchPattern) -> Result<Vec<Entry>, StoreError> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM diksionariu \
             WHERE definition LIKE :pattern ESCAPE '\\' \
             ORDER BY length(definition), CAST(index_num AS INTEGER)"
        );
        self.query_entries(&sql, named_params! { ":pattern": like_pattern(&pattern.text) })
    }

    fn export_all(&self) -> Result<Vec<WordSource>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT entry, alternate_forms, related_forms, see_also FROM diksionariu \
             ORDER BY CAST(index_num AS INTEGER)",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(WordSource {
                entry: row.get(0)?,
                alternate_forms: row.get(1)?,
                related_forms: row.get(2)?,
                see_also: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::sample_entries;

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_entries(&sample_entries()).unwrap();
        store
    }

    fn words(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.entry.as_str()).collect()
    }

    #[test]
    fn exact_orders_numerically() {
        let store = store();
        store.insert_entries(&[Entry::new(20, "gumå'ña")]).unwrap();
        let hits = store.find_exact(&MatchPattern::new("gum*")).unwrap();
        assert_eq!(words(&hits), vec!["gumagupu", "guma'", "gumå'ña"]);
    }

    #[test]
    fn exact_ignores_glottal_stop_in_basic_mode() {
        let store = store();
        let hits = store.find_exact(&MatchPattern::new("taotao")).unwrap();
        assert_eq!(words(&hits), vec!["ta'otao"]);
        assert!(store.find_exact(&MatchPattern::new("hafa")).unwrap().is_empty());
    }

    #[test]
    fn exact_is_case_sensitive() {
        let store = store();
        assert!(store.find_exact(&MatchPattern::new("Gumagupu")).unwrap().is_empty());
    }

    #[test]
    fn question_mark_matches_one_character() {
        let store = store();
        let hits = store.find_exact(&MatchPattern::new("h?fa")).unwrap();
        assert_eq!(words(&hits), vec!["håfa"]);
    }

    #[test]
    fn cross_reference_is_bracket_anchored() {
        let store = store();
        let hits = store.find_cross_reference(&MatchPattern::new("taotao")).unwrap();
        assert_eq!(words(&hits), vec!["ta'otao"]);
        let hits = store.find_cross_reference(&MatchPattern::new("gumå'ña")).unwrap();
        assert_eq!(words(&hits), vec!["guma'"]);
        assert!(store.find_cross_reference(&MatchPattern::new("tao")).unwrap().is_empty());
    }

    #[test]
    fn metacharacters_are_not_interpreted() {
        let store = store();
        store.insert_entries(&[Entry::new(30, "[x]")]).unwrap();
        let hits = store.find_exact(&MatchPattern::new("[x]")).unwrap();
        assert_eq!(words(&hits), vec!["[x]"]);
        let hits = store.find_by_definition(&MatchPattern::new("100%")).unwrap();
        assert!(hits.is_empty());
        let hits = store
            .find_exact(&MatchPattern::new("' OR 1=1 --"))
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn partial_matches_like_memory_store() {
        let store = store();
        assert_eq!(
            store.find_partial(&MatchPattern::new("gupu"), 3).unwrap(),
            vec!["gumagupu"]
        );
        assert_eq!(
            store.find_partial(&MatchPattern::new("ta'otaomo'na"), 0).unwrap(),
            vec!["ta'otao"]
        );
    }

    #[test]
    fn definition_search_translates_wildcards() {
        let store = store();
        let hits = store.find_by_definition(&MatchPattern::new("HOUSE")).unwrap();
        assert_eq!(words(&hits), vec!["guma'"]);
        let hits = store.find_by_definition(&MatchPattern::new("p*ple")).unwrap();
        assert_eq!(words(&hits), vec!["ta'otao"]);
    }

    #[test]
    fn definition_search_folds_ascii_case_only() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut entry = Entry::new(1, "ågaga");
        entry.definition = "Red, ågaga color".to_string();
        store.insert_entries(&[entry]).unwrap();
        assert_eq!(store.find_by_definition(&MatchPattern::new("RED")).unwrap().len(), 1);
        assert_eq!(store.find_by_definition(&MatchPattern::new("åGAGA")).unwrap().len(), 1);
        assert!(store.find_by_definition(&MatchPattern::new("ÅGAGA")).unwrap().is_empty());
    }

    #[test]
    fn export_returns_every_row() {
        let store = store();
        let rows = store.export_all().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].see_also, "[[adai|greeting]]");
    }

    #[test]
    fn empty_headword_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.insert_entries(&[Entry::new(1, "")]).unwrap_err();
        assert!(matches!(err, StoreError::Data(_)));
    }

    #[test]
    fn missing_database_is_unavailable() {
        let err = SqliteStore::open_read_only("/nonexistent/dir/diksionariu.db").err();
        assert!(matches!(err, Some(StoreError::Unavailable(_))));
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("a_b%c\\"), "%a\\_b\\%c\\\\%");
        assert_eq!(like_pattern("h*f?"), "%h%f_%");
    }
}
