use std::str::FromStr;

use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{Participant, ParticipantRole};

pub fn insert_participant(conn: &Connection, p: &Participant) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO participants (email, display_name, role, phone, age, gender)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            p.email,
            p.display_name,
            p.role.as_str(),
            p.phone,
            p.age,
            p.gender,
        ],
    )?;
    Ok(())
}

pub fn get_participant(
    conn: &Connection,
    email: &str,
) -> Result<Option<Participant>, DatabaseError> {
    let result = conn.query_row(
        "SELECT email, display_name, role, phone, age, gender
         FROM participants WHERE email = ?1",
        params![email],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<u32>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        },
    );

    match result {
        Ok((email, display_name, role, phone, age, gender)) => Ok(Some(Participant {
            email,
            display_name,
            role: ParticipantRole::from_str(&role)?,
            phone,
            age,
            gender,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
