use regex::Regex;
use rusqlite::{Connection, OptionalExtension};

use crate::accounts::normalize_iban;
use crate::categories::{resolve_category, resolve_purpose};
use crate::contacts::{contact_defaults, find_contact_by_iban, resolve_contact};
use crate::error::{BookError, Result};
use crate::models::{MatchRule, StatementDraft};

pub const MATCH_TYPES: &[&str] = &["contains", "starts_with", "regex", "iban"];

enum Matcher {
    Contains(String),
    StartsWith(String),
    Pattern(Regex),
    Iban(String),
}

impl Matcher {
    fn new(pattern: &str, match_type: &str) -> Result<Self> {
        match match_type {
            "contains" => Ok(Self::Contains(pattern.to_uppercase())),
            "starts_with" => Ok(Self::StartsWith(pattern.to_uppercase())),
            "regex" => Regex::new(pattern)
                .map(Self::Pattern)
                .map_err(|e| BookError::InvalidInput(format!("bad regex '{pattern}': {e}"))),
            "iban" => Ok(Self::Iban(normalize_iban(pattern))),
            other => Err(BookError::InvalidInput(format!(
                "match type '{other}' (expected contains, starts_with, regex or iban)"
            ))),
        }
    }

    fn text_matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(p) => text.to_uppercase().contains(p.as_str()),
            Self::StartsWith(p) => text.to_uppercase().starts_with(p.as_str()),
            Self::Pattern(re) => re.is_match(text),
            Self::Iban(_) => false,
        }
    }

    fn matches(&self, description: &str, counterparty: Option<&str>, iban: Option<&str>) -> bool {
        if let Self::Iban(p) = self {
            return iban.is_some_and(|i| normalize_iban(i) == *p);
        }
        std::iter::once(description)
            .chain(counterparty)
            .any(|text| self.text_matches(text))
    }
}

// ---------------------------------------------------------------------------
// Matching rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct NewMatchRule<'a> {
    pub pattern: &'a str,
    pub match_type: &'a str,
    pub contact: Option<&'a str>,
    pub category: Option<&'a str>,
    pub purpose: Option<&'a str>,
    pub priority: i64,
}

pub fn add_rule(conn: &Connection, rule: &NewMatchRule) -> Result<i64> {
    Matcher::new(rule.pattern, rule.match_type)?;
    if rule.contact.is_none() && rule.category.is_none() && rule.purpose.is_none() {
        return Err(BookError::InvalidInput(
            "a rule needs a contact, category or purpose to assign".into(),
        ));
    }
    let contact_id = resolve_contact(conn, rule.contact)?;
    let category_id = resolve_category(conn, rule.category)?;
    let purpose_id = resolve_purpose(conn, rule.purpose)?;
    conn.execute(
        "INSERT INTO rules (pattern, match_type, contact_id, category_id, purpose_id, priority) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            rule.pattern,
            rule.match_type,
            contact_id,
            category_id,
            purpose_id,
            rule.priority
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_rules(conn: &Connection) -> Result<Vec<MatchRule>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.pattern, r.match_type, ct.name, c.name, bp.name, r.priority, r.hit_count \
         FROM rules r \
         LEFT JOIN contacts ct ON r.contact_id = ct.id \
         LEFT JOIN categories c ON r.category_id = c.id \
         LEFT JOIN budget_purposes bp ON r.purpose_id = bp.id \
         WHERE r.is_active = 1 \
         ORDER BY r.priority DESC, r.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(MatchRule {
                id: row.get(0)?,
                pattern: row.get(1)?,
                match_type: row.get(2)?,
                contact: row.get(3)?,
                category: row.get(4)?,
                purpose: row.get(5)?,
                priority: row.get(6)?,
                hit_count: row.get(7)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn delete_rule(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM rules WHERE id = ?1", [id])?;
    if deleted == 0 {
        return Err(BookError::NotFound { entity: "rule", id });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// apply_rules
// ---------------------------------------------------------------------------

pub struct ApplyResult {
    pub matched: usize,
    pub unmatched: usize,
}

struct LoadedRule {
    id: i64,
    matcher: Matcher,
    contact_id: Option<i64>,
    category_id: Option<i64>,
    purpose_id: Option<i64>,
}

fn load_rules(conn: &Connection) -> Result<Vec<LoadedRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pattern, match_type, contact_id, category_id, purpose_id FROM rules \
         WHERE is_active = 1 ORDER BY priority DESC, id",
    )?;
    #[allow(clippy::type_complexity)]
    let raw: Vec<(i64, String, String, Option<i64>, Option<i64>, Option<i64>)> = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut rules = Vec::with_capacity(raw.len());
    for (id, pattern, match_type, contact_id, category_id, purpose_id) in raw {
        match Matcher::new(&pattern, &match_type) {
            Ok(matcher) => rules.push(LoadedRule {
                id,
                matcher,
                contact_id,
                category_id,
                purpose_id,
            }),
            Err(e) => tracing::warn!(rule = id, error = %e, "skipping unusable rule"),
        }
    }
    Ok(rules)
}

/// Suggest contact, category and purpose for open drafts that have no
/// contact, category or purpose yet.
pub fn apply_rules(conn: &Connection) -> Result<ApplyResult> {
    let rules = load_rules(conn)?;

    let mut stmt = conn.prepare(
        "SELECT id, description, counterparty, counterparty_iban FROM statement_drafts \
         WHERE status = 'open' AND contact_id IS NULL AND category_id IS NULL AND purpose_id IS NULL \
         ORDER BY id",
    )?;
    let drafts: Vec<(i64, String, Option<String>, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut matched = 0usize;
    let mut unmatched = 0usize;

    for (draft_id, description, counterparty, iban) in &drafts {
        let mut assigned = match iban.as_deref() {
            Some(iban) => find_contact_by_iban(conn, iban)?
                .map(|c| (Some(c.contact_id), c.category_id, c.purpose_id)),
            None => None,
        };

        if assigned.is_none() {
            if let Some(rule) = rules
                .iter()
                .find(|r| r.matcher.matches(description, counterparty.as_deref(), iban.as_deref()))
            {
                conn.execute("UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1", [rule.id])?;
                let (mut category_id, mut purpose_id) = (rule.category_id, rule.purpose_id);
                if let Some(contact_id) = rule.contact_id {
                    if category_id.is_none() {
                        let defaults = contact_defaults(conn, contact_id)?;
                        category_id = defaults.category_id;
                        purpose_id = purpose_id.or(defaults.purpose_id);
                    }
                }
                assigned = Some((rule.contact_id, category_id, purpose_id));
            }
        }

        match assigned {
            Some((contact_id, category_id, purpose_id)) => {
                conn.execute(
                    "UPDATE statement_drafts SET contact_id = COALESCE(?1, contact_id), \
                     category_id = ?2, purpose_id = ?3 WHERE id = ?4",
                    rusqlite::params![contact_id, category_id, purpose_id, draft_id],
                )?;
                matched += 1;
            }
            None => unmatched += 1,
        }
    }

    tracing::info!(matched, unmatched, "rules applied to drafts");
    Ok(ApplyResult { matched, unmatched })
}

// ---------------------------------------------------------------------------
// Draft review and booking
// ---------------------------------------------------------------------------

pub fn list_drafts(conn: &Connection, status: Option<&str>) -> Result<Vec<StatementDraft>> {
    let mut stmt = conn.prepare(
        "SELECT d.id, a.name, d.booking_date, d.valuta_date, d.amount, d.description, \
                d.counterparty, d.counterparty_iban, ct.name, c.name, bp.name, d.status, d.posting_id \
         FROM statement_drafts d \
         JOIN accounts a ON d.account_id = a.id \
         LEFT JOIN contacts ct ON d.contact_id = ct.id \
         LEFT JOIN categories c ON d.category_id = c.id \
         LEFT JOIN budget_purposes bp ON d.purpose_id = bp.id \
         WHERE ?1 IS NULL OR d.status = ?1 \
         ORDER BY d.booking_date, d.id",
    )?;
    let rows = stmt
        .query_map([status], |row| {
            Ok(StatementDraft {
                id: row.get(0)?,
                account: row.get(1)?,
                booking_date: row.get(2)?,
                valuta_date: row.get(3)?,
                amount: row.get(4)?,
                description: row.get(5)?,
                counterparty: row.get(6)?,
                counterparty_iban: row.get(7)?,
                contact: row.get(8)?,
                category: row.get(9)?,
                purpose: row.get(10)?,
                status: row.get(11)?,
                posting_id: row.get(12)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn open_draft(conn: &Connection, id: i64) -> Result<()> {
    let status: Option<String> = conn
        .query_row("SELECT status FROM statement_drafts WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    match status.as_deref() {
        None => Err(BookError::NotFound { entity: "draft", id }),
        Some("open") => Ok(()),
        Some(other) => Err(BookError::InvalidInput(format!("draft {id} is already {other}"))),
    }
}

/// Turn drafts into postings in one transaction. `None` books every open draft.
pub fn book_drafts(conn: &Connection, ids: Option<&[i64]>) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let ids: Vec<i64> = match ids {
        Some(ids) => ids.to_vec(),
        None => {
            let mut stmt = tx.prepare(
                "SELECT id FROM statement_drafts WHERE status = 'open' ORDER BY booking_date, id",
            )?;
            let open = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            open
        }
    };

    for &id in &ids {
        open_draft(&tx, id)?;
        tx.execute(
            "INSERT INTO postings (account_id, booking_date, valuta_date, amount, description, \
             contact_id, category_id, purpose_id, draft_id) \
             SELECT account_id, booking_date, valuta_date, amount, description, \
                    contact_id, category_id, purpose_id, id \
             FROM statement_drafts WHERE id = ?1",
            [id],
        )?;
        let posting_id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE statement_drafts SET status = 'booked', posting_id = ?1 WHERE id = ?2",
            [posting_id, id],
        )?;
    }
    tx.commit()?;

    tracing::info!(booked = ids.len(), "drafts booked");
    Ok(ids.len())
}

pub fn discard_draft(conn: &Connection, id: i64) -> Result<()> {
    open_draft(conn, id)?;
    conn.execute("UPDATE statement_drafts SET status = 'discarded' WHERE id = ?1", [id])?;
    Ok(())
}

/// Manual assignment during review; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct DraftEdit<'a> {
    pub contact: Option<&'a str>,
    pub category: Option<&'a str>,
    pub purpose: Option<&'a str>,
}

pub fn update_draft(conn: &Connection, id: i64, edit: &DraftEdit) -> Result<()> {
    open_draft(conn, id)?;
    let contact_id = resolve_contact(conn, edit.contact)?;
    let category_id = resolve_category(conn, edit.category)?;
    let purpose_id = resolve_purpose(conn, edit.purpose)?;
    conn.execute(
        "UPDATE statement_drafts SET contact_id = COALESCE(?1, contact_id), \
         category_id = COALESCE(?2, category_id), purpose_id = COALESCE(?3, purpose_id) \
         WHERE id = ?4",
        rusqlite::params![contact_id, category_id, purpose_id, id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::add_contact;
    use crate::db::test_db;

    fn setup_drafts(conn: &Connection, drafts: &[(&str, Option<&str>, Option<&str>)]) {
        conn.execute(
            "INSERT INTO accounts (name, account_type) VALUES ('Giro', 'checking')",
            [],
        )
        .unwrap();
        for (desc, counterparty, iban) in drafts {
            conn.execute(
                "INSERT INTO statement_drafts (account_id, booking_date, valuta_date, amount, description, \
                 counterparty, counterparty_iban) VALUES (1, '2025-01-15', '2025-01-15', -50.0, ?1, ?2, ?3)",
                rusqlite::params![desc, counterparty, iban],
            )
            .unwrap();
        }
    }

    fn rule<'a>(pattern: &'a str, match_type: &'a str, category: &'a str, priority: i64) -> NewMatchRule<'a> {
        NewMatchRule {
            pattern,
            match_type,
            category: Some(category),
            priority,
            ..NewMatchRule::default()
        }
    }

    fn draft_category(conn: &Connection, id: i64) -> Option<String> {
        conn.query_row(
            "SELECT c.name FROM statement_drafts d LEFT JOIN categories c ON d.category_id = c.id WHERE d.id = ?1",
            [id],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_contains_rule_is_case_insensitive() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("Netflix.com subscription", None, None)]);
        add_rule(&conn, &rule("NETFLIX", "contains", "Subscriptions", 0)).unwrap();
        let result = apply_rules(&conn).unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.unmatched, 0);
        assert_eq!(draft_category(&conn, 1).as_deref(), Some("Subscriptions"));
    }

    #[test]
    fn test_starts_with_checks_counterparty_too() {
        let (_dir, conn) = test_db();
        setup_drafts(
            &conn,
            &[("Card payment 4711", Some("REWE Markt GmbH"), None), ("Pay REWE later", None, None)],
        );
        add_rule(&conn, &rule("rewe", "starts_with", "Groceries", 0)).unwrap();
        let result = apply_rules(&conn).unwrap();
        assert_eq!(result.matched, 1);
        assert_eq!(result.unmatched, 1);
    }

    #[test]
    fn test_regex_rule() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("DB Vertrieb Ticket 123456", None, None)]);
        add_rule(&conn, &rule(r"^DB .*\d{6}$", "regex", "Transport", 0)).unwrap();
        assert_eq!(apply_rules(&conn).unwrap().matched, 1);
        assert!(add_rule(&conn, &rule("(", "regex", "Transport", 0)).is_err());
    }

    #[test]
    fn test_higher_priority_wins_and_counts_hits() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("AMAZON MARKETPLACE", None, None)]);
        add_rule(&conn, &rule("AMAZON", "contains", "Other Expenses", 1)).unwrap();
        add_rule(&conn, &rule("AMAZON", "contains", "Clothing", 10)).unwrap();
        apply_rules(&conn).unwrap();
        assert_eq!(draft_category(&conn, 1).as_deref(), Some("Clothing"));
        let rules = list_rules(&conn).unwrap();
        assert_eq!(rules[0].category.as_deref(), Some("Clothing"));
        assert_eq!(rules[0].hit_count, 1);
        assert_eq!(rules[1].hit_count, 0);
    }

    #[test]
    fn test_contact_iban_beats_rules() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("Miete", Some("Schulz"), Some("DE02120300000000202051"))]);
        add_contact(&conn, "Landlord", Some("DE02 1203 0000 0000 2020 51"), Some("Rent"), None, None)
            .unwrap();
        add_rule(&conn, &rule("Miete", "contains", "Other Expenses", 100)).unwrap();
        apply_rules(&conn).unwrap();
        assert_eq!(draft_category(&conn, 1).as_deref(), Some("Rent"));
        let drafts = list_drafts(&conn, Some("open")).unwrap();
        assert_eq!(drafts[0].contact.as_deref(), Some("Landlord"));
    }

    #[test]
    fn test_rule_contact_passes_on_defaults() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("STADTWERKE ABSCHLAG", None, None)]);
        add_contact(&conn, "Stadtwerke", None, Some("Utilities"), None, None).unwrap();
        add_rule(
            &conn,
            &NewMatchRule {
                pattern: "stadtwerke",
                match_type: "contains",
                contact: Some("Stadtwerke"),
                ..NewMatchRule::default()
            },
        )
        .unwrap();
        apply_rules(&conn).unwrap();
        assert_eq!(draft_category(&conn, 1).as_deref(), Some("Utilities"));
    }

    #[test]
    fn test_contact_only_match_is_not_repeated() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("KIOSK AM MARKT", None, None)]);
        add_contact(&conn, "Kiosk", None, None, None, None).unwrap();
        add_rule(
            &conn,
            &NewMatchRule {
                pattern: "kiosk",
                match_type: "contains",
                contact: Some("Kiosk"),
                ..NewMatchRule::default()
            },
        )
        .unwrap();
        assert_eq!(apply_rules(&conn).unwrap().matched, 1);
        let again = apply_rules(&conn).unwrap();
        assert_eq!(again.matched, 0);
        assert_eq!(again.unmatched, 0);
        assert_eq!(list_rules(&conn).unwrap()[0].hit_count, 1);
        let drafts = list_drafts(&conn, Some("open")).unwrap();
        assert_eq!(drafts[0].contact.as_deref(), Some("Kiosk"));
        assert!(drafts[0].category.is_none());
    }

    #[test]
    fn test_iban_rule() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("SEPA debit", None, Some("DE89370400440532013000"))]);
        add_rule(&conn, &rule("de89 3704 0044 0532 0130 00", "iban", "Insurance", 0)).unwrap();
        assert_eq!(apply_rules(&conn).unwrap().matched, 1);
        assert_eq!(draft_category(&conn, 1).as_deref(), Some("Insurance"));
    }

    #[test]
    fn test_rule_needs_a_target() {
        let (_dir, conn) = test_db();
        let bare = NewMatchRule {
            pattern: "x",
            match_type: "contains",
            ..NewMatchRule::default()
        };
        assert!(matches!(add_rule(&conn, &bare), Err(BookError::InvalidInput(_))));
        assert!(add_rule(&conn, &rule("x", "fuzzy", "Rent", 0)).is_err());
    }

    #[test]
    fn test_book_drafts_creates_postings() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("A", None, None), ("B", None, None), ("C", None, None)]);
        update_draft(&conn, 2, &DraftEdit { category: Some("Leisure"), ..DraftEdit::default() }).unwrap();
        discard_draft(&conn, 3).unwrap();

        let booked = book_drafts(&conn, None).unwrap();
        assert_eq!(booked, 2);
        let postings: Vec<(String, Option<i64>, i64)> = conn
            .prepare("SELECT description, category_id, draft_id FROM postings ORDER BY id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(postings.len(), 2);
        assert_eq!(postings[1].0, "B");
        assert!(postings[1].1.is_some());
        let booked_drafts = list_drafts(&conn, Some("booked")).unwrap();
        assert_eq!(booked_drafts.len(), 2);
        assert!(booked_drafts.iter().all(|d| d.posting_id.is_some()));
    }

    #[test]
    fn test_booking_is_all_or_nothing() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("A", None, None), ("B", None, None)]);
        book_drafts(&conn, Some(&[2][..])).unwrap();
        let err = book_drafts(&conn, Some(&[1, 2][..])).unwrap_err();
        assert!(matches!(err, BookError::InvalidInput(_)));
        let postings: i64 = conn.query_row("SELECT count(*) FROM postings", [], |r| r.get(0)).unwrap();
        assert_eq!(postings, 1);
        assert!(matches!(book_drafts(&conn, Some(&[99][..])), Err(BookError::NotFound { .. })));
    }

    #[test]
    fn test_deleting_posting_reopens_draft() {
        let (_dir, conn) = test_db();
        setup_drafts(&conn, &[("A", None, None)]);
        book_drafts(&conn, None).unwrap();
        let posting_id: i64 = conn.query_row("SELECT id FROM postings", [], |r| r.get(0)).unwrap();
        crate::postings::delete_posting(&conn, posting_id).unwrap();
        assert_eq!(list_drafts(&conn, Some("open")).unwrap().len(), 1);
    }
}
