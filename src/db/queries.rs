use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{Booking, BookingEvent, BookingStatus, ServiceConfig, TimeSlot, TransitionKind};

const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_dt(dt: &NaiveDateTime) -> String {
    dt.format(DT_FORMAT).to_string()
}

fn parse_dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DT_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Bookings ──

pub struct NewBooking {
    pub user_id: i64,
    pub collection_date: NaiveDateTime,
    pub time_slot: TimeSlot,
    pub services: ServiceConfig,
    pub total_cents: i64,
    pub collection_pin: String,
    pub delivery_pin: String,
    pub special_instructions: Option<String>,
    pub policy_agreed: bool,
    pub terms_agreed: bool,
}

pub fn create_booking(conn: &Connection, booking: &NewBooking) -> anyhow::Result<i64> {
    let services_json = booking.services.to_json()?;
    let now = fmt_dt(&Utc::now().naive_utc());

    conn.execute(
        "INSERT INTO bookings (user_id, collection_date, time_slot, services, total_cents, status,
                               collection_pin, delivery_pin, special_instructions,
                               policy_agreed, terms_agreed, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'awaiting_assignment', ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            booking.user_id,
            fmt_dt(&booking.collection_date),
            booking.time_slot.as_str(),
            services_json,
            booking.total_cents,
            booking.collection_pin,
            booking.delivery_pin,
            booking.special_instructions,
            booking.policy_agreed as i32,
            booking.terms_agreed as i32,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

const BOOKING_COLUMNS: &str = "id, user_id, washer_id, collection_date, time_slot, services, \
     total_cents, status, collection_pin, delivery_pin, collection_verified_at, \
     delivery_verified_at, special_instructions, policy_agreed, terms_agreed, \
     created_at, updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let services_json: String = row.get(5)?;
    let collection_date: String = row.get(3)?;
    let time_slot: String = row.get(4)?;
    let status: String = row.get(7)?;
    let collection_verified_at: Option<String> = row.get(10)?;
    let delivery_verified_at: Option<String> = row.get(11)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    Ok(Booking {
        id: row.get(0)?,
        user_id: row.get(1)?,
        washer_id: row.get(2)?,
        collection_date: parse_dt(&collection_date),
        time_slot: TimeSlot::parse(&time_slot).unwrap_or(TimeSlot::Morning),
        services: ServiceConfig::from_json(&services_json)?,
        total_cents: row.get(6)?,
        status: BookingStatus::parse(&status),
        collection_pin: row.get(8)?,
        delivery_pin: row.get(9)?,
        collection_verified_at: collection_verified_at.as_deref().map(parse_dt),
        delivery_verified_at: delivery_verified_at.as_deref().map(parse_dt),
        special_instructions: row.get(12)?,
        policy_agreed: row.get::<_, i32>(13)? != 0,
        terms_agreed: row.get::<_, i32>(14)? != 0,
        created_at: parse_dt(&created_at),
        updated_at: parse_dt(&updated_at),
    })
}

pub fn get_booking_by_id(conn: &Connection, id: i64) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_bookings_for_user(conn: &Connection, user_id: i64) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY collection_date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_bookings_for_washer(conn: &Connection, worker_id: i64) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE washer_id = ?1 AND status IN ('washer_assigned', 'in_progress')
         ORDER BY collection_date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![worker_id], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// The unassigned pool is always a live query on current status so a claimed
/// booking disappears on the next read.
pub fn get_unassigned_bookings(conn: &Connection) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings
         WHERE status IN ('awaiting_assignment', 'pending_washer_assignment')
           AND washer_id IS NULL
         ORDER BY collection_date ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1
                 ORDER BY collection_date DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY collection_date DESC LIMIT ?1"
            ),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

// ── Conditional transitions ──
//
// Each of these is the single atomic compare-and-update that carries the
// concurrency guarantee for its transition. Zero rows changed means the guard
// no longer held at write time; the caller re-reads to classify the outcome.

pub fn claim_booking(conn: &Connection, id: i64, worker_id: i64) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = 'washer_assigned', washer_id = ?2, updated_at = ?3
         WHERE id = ?1
           AND status IN ('awaiting_assignment', 'pending_washer_assignment')
           AND washer_id IS NULL",
        params![id, worker_id, now],
    )?;
    Ok(count > 0)
}

pub fn mark_collection_verified(
    conn: &Connection,
    id: i64,
    worker_id: i64,
    verified_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let ts = fmt_dt(verified_at);
    let count = conn.execute(
        "UPDATE bookings SET status = 'in_progress', collection_verified_at = ?3, updated_at = ?3
         WHERE id = ?1
           AND washer_id = ?2
           AND status = 'washer_assigned'
           AND collection_verified_at IS NULL",
        params![id, worker_id, ts],
    )?;
    Ok(count > 0)
}

pub fn mark_delivery_verified(
    conn: &Connection,
    id: i64,
    worker_id: i64,
    verified_at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let ts = fmt_dt(verified_at);
    let count = conn.execute(
        "UPDATE bookings SET status = 'completed', delivery_verified_at = ?3, updated_at = ?3
         WHERE id = ?1
           AND washer_id = ?2
           AND status = 'in_progress'
           AND collection_verified_at IS NOT NULL
           AND delivery_verified_at IS NULL",
        params![id, worker_id, ts],
    )?;
    Ok(count > 0)
}

pub fn cancel_booking(conn: &Connection, id: i64) -> anyhow::Result<bool> {
    let now = fmt_dt(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = 'cancelled', updated_at = ?2
         WHERE id = ?1
           AND status IN ('awaiting_assignment', 'pending_washer_assignment',
                          'washer_assigned', 'in_progress')",
        params![id, now],
    )?;
    Ok(count > 0)
}

// ── Washer standing ──
//
// Absence from the table means good standing; only suspensions are recorded.

pub fn is_washer_suspended(conn: &Connection, worker_id: i64) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM washers WHERE worker_id = ?1 AND suspended = 1",
        params![worker_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn suspend_washer(
    conn: &Connection,
    worker_id: i64,
    reason: Option<&str>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO washers (worker_id, suspended, suspended_reason) VALUES (?1, 1, ?2)
         ON CONFLICT(worker_id) DO UPDATE SET suspended = 1, suspended_reason = excluded.suspended_reason",
        params![worker_id, reason],
    )?;
    Ok(())
}

pub fn reinstate_washer(conn: &Connection, worker_id: i64) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE washers SET suspended = 0, suspended_reason = NULL
         WHERE worker_id = ?1 AND suspended = 1",
        params![worker_id],
    )?;
    Ok(count > 0)
}

pub fn list_suspended_washers(
    conn: &Connection,
) -> anyhow::Result<Vec<(i64, Option<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT worker_id, suspended_reason FROM washers WHERE suspended = 1 ORDER BY worker_id",
    )?;
    let rows = stmt.query_map([], |row| {
        let worker_id: i64 = row.get(0)?;
        let reason: Option<String> = row.get(1)?;
        Ok((worker_id, reason))
    })?;

    let mut suspended = vec![];
    for row in rows {
        suspended.push(row?);
    }
    Ok(suspended)
}

// ── Booking events ──

pub fn insert_booking_event(
    conn: &Connection,
    event_uid: &str,
    booking_id: i64,
    kind: TransitionKind,
    actor_id: i64,
    refund_eligible: Option<bool>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO booking_events (event_uid, booking_id, kind, actor_id, refund_eligible)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event_uid,
            booking_id,
            kind.as_str(),
            actor_id,
            refund_eligible.map(|b| b as i32),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn parse_event_row(row: &rusqlite::Row) -> rusqlite::Result<BookingEvent> {
    let kind: String = row.get(3)?;
    let refund_eligible: Option<i32> = row.get(5)?;
    Ok(BookingEvent {
        id: row.get(0)?,
        event_uid: row.get(1)?,
        booking_id: row.get(2)?,
        kind: TransitionKind::parse(&kind).unwrap_or(TransitionKind::Claimed),
        actor_id: row.get(4)?,
        refund_eligible: refund_eligible.map(|v| v != 0),
        created_at: row.get(6)?,
    })
}

pub fn get_events_since(conn: &Connection, since_id: i64) -> anyhow::Result<Vec<BookingEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, event_uid, booking_id, kind, actor_id, refund_eligible, created_at
         FROM booking_events WHERE id > ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![since_id], parse_event_row)?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

pub fn get_recent_events(conn: &Connection, limit: i64) -> anyhow::Result<Vec<BookingEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, event_uid, booking_id, kind, actor_id, refund_eligible, created_at
         FROM booking_events ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], parse_event_row)?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

// ── Dashboard ──

pub struct StatusCounts {
    pub awaiting_assignment: i64,
    pub washer_assigned: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
}

pub fn get_status_counts(conn: &Connection) -> anyhow::Result<StatusCounts> {
    let count_for = |statuses: &str| -> anyhow::Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM bookings WHERE status IN ({statuses})");
        Ok(conn.query_row(&sql, [], |row| row.get(0))?)
    };

    Ok(StatusCounts {
        awaiting_assignment: count_for("'awaiting_assignment', 'pending_washer_assignment'")?,
        washer_assigned: count_for("'washer_assigned'")?,
        in_progress: count_for("'in_progress'")?,
        completed: count_for("'completed'")?,
        cancelled: count_for("'cancelled'")?,
    })
}
