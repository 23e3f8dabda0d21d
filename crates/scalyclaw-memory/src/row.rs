use scalyclaw_core::types::{Message, MessageRole};

pub fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role_str: String = row.get(2)?;
    let created_at: String = row.get(5)?;
    let metadata: Option<String> = row.get(4)?;
    Ok(Message {
        id: row.get(0)?,
        channel: row.get(1)?,
        role: role_str.parse().unwrap_or(MessageRole::User),
        content: row.get(3)?,
        metadata: metadata.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
    })
}
