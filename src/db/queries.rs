use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;

use crate::models::{Booking, BookingStatus};

const TS: &str = "%Y-%m-%d %H:%M:%S";

const BOOKING_COLUMNS: &str = "id, transaction_id, payment_method, consultation_fee, platform_fee, total_paid, \
     paid_at, doctor, specialty, clinic, address, starts_at, duration_minutes, patient_name, \
     patient_age, patient_gender, patient_phone, patient_email, notes, symptoms, status, \
     created_at, updated_at";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let symptoms = serde_json::to_string(&booking.symptoms)?;

    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)"
        ),
        params![
            booking.id,
            booking.transaction_id,
            booking.payment_method,
            booking.consultation_fee,
            booking.platform_fee,
            booking.total_paid,
            booking.paid_at.format(TS).to_string(),
            booking.doctor,
            booking.specialty,
            booking.clinic,
            booking.address,
            booking.starts_at.format(TS).to_string(),
            booking.duration_minutes,
            booking.patient_name,
            booking.patient_age,
            booking.patient_gender,
            booking.patient_phone,
            booking.patient_email,
            booking.notes,
            symptoms,
            booking.status.as_str(),
            booking.created_at.format(TS).to_string(),
            booking.updated_at.format(TS).to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn get_all_bookings(
    conn: &Connection,
    status_filter: Option<&BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 ORDER BY starts_at ASC LIMIT ?2"),
            vec![
                Box::new(status.as_str()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY starts_at ASC LIMIT ?1"),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: &BookingStatus,
) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(TS).to_string();
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DashboardStats {
    pub total_bookings: i64,
    pub upcoming: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub revenue: i64,
}

pub fn get_dashboard_stats(conn: &Connection, now: &NaiveDateTime) -> anyhow::Result<DashboardStats> {
    let now = now.format(TS).to_string();

    let count = |sql: &str| -> anyhow::Result<i64> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };

    let upcoming: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings WHERE starts_at > ?1 AND status = 'confirmed'",
        params![now],
        |row| row.get(0),
    )?;

    Ok(DashboardStats {
        total_bookings: count("SELECT COUNT(*) FROM bookings")?,
        upcoming,
        completed: count("SELECT COUNT(*) FROM bookings WHERE status = 'completed'")?,
        cancelled: count("SELECT COUNT(*) FROM bookings WHERE status = 'cancelled'")?,
        revenue: count("SELECT COALESCE(SUM(total_paid), 0) FROM bookings WHERE status != 'cancelled'")?,
    })
}

fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let paid_at: String = row.get(6)?;
    let starts_at: String = row.get(11)?;
    let symptoms: String = row.get(19)?;
    let status: String = row.get(20)?;
    let created_at: String = row.get(21)?;
    let updated_at: String = row.get(22)?;

    Ok(Booking {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        payment_method: row.get(2)?,
        consultation_fee: row.get(3)?,
        platform_fee: row.get(4)?,
        total_paid: row.get(5)?,
        paid_at: parse_ts(&paid_at),
        doctor: row.get(7)?,
        specialty: row.get(8)?,
        clinic: row.get(9)?,
        address: row.get(10)?,
        starts_at: parse_ts(&starts_at),
        duration_minutes: row.get(12)?,
        patient_name: row.get(13)?,
        patient_age: row.get(14)?,
        patient_gender: row.get(15)?,
        patient_phone: row.get(16)?,
        patient_email: row.get(17)?,
        notes: row.get(18)?,
        symptoms: serde_json::from_str(&symptoms).unwrap_or_default(),
        status: BookingStatus::parse(&status),
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::services::receipt::tests::sample_booking;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_create_and_get_booking() {
        let conn = setup_db();
        let booking = sample_booking();
        create_booking(&conn, &booking).unwrap();

        let loaded = get_booking_by_id(&conn, &booking.id).unwrap().unwrap();
        assert_eq!(loaded, booking);
        assert!(get_booking_by_id(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_status_filter_and_update() {
        let conn = setup_db();
        let first = sample_booking();
        let second = Booking {
            id: "bk-txn0002".into(),
            transaction_id: "TXN0002".into(),
            starts_at: dt("2025-11-15 11:00"),
            ..sample_booking()
        };
        create_booking(&conn, &first).unwrap();
        create_booking(&conn, &second).unwrap();

        assert!(update_booking_status(&conn, &second.id, &BookingStatus::Cancelled).unwrap());
        assert!(!update_booking_status(&conn, "missing", &BookingStatus::Cancelled).unwrap());

        let all = get_all_bookings(&conn, None, 50).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, first.id);

        let cancelled = get_all_bookings(&conn, Some(&BookingStatus::Cancelled), 50).unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].status, BookingStatus::Cancelled);
    }

    #[test]
    fn test_dashboard_stats() {
        let conn = setup_db();
        create_booking(&conn, &sample_booking()).unwrap();
        let done = Booking {
            id: "bk-txn0003".into(),
            transaction_id: "TXN0003".into(),
            ..sample_booking()
        };
        create_booking(&conn, &done).unwrap();
        update_booking_status(&conn, &done.id, &BookingStatus::Completed).unwrap();

        let stats = get_dashboard_stats(&conn, &dt("2025-11-13 09:00")).unwrap();
        assert_eq!(
            stats,
            DashboardStats {
                total_bookings: 2,
                upcoming: 1,
                completed: 1,
                cancelled: 0,
                revenue: 1300,
            }
        );
    }
}
