use std::sync::{Arc, Mutex};

use chrono::Utc;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use scalyclaw_core::types::{Message, UsageLog};
use tracing::instrument;
use uuid::Uuid;

use crate::embedder::{blob_to_embedding, cosine_to_distance, embedding_to_blob, Embedder, HashEmbedder};
use crate::error::{MemoryError, Result};
use crate::types::*;
use crate::{db, row};

/// Probability of running `cleanup_expired` after a `store_memory` call
/// (spec.md §4.3 "with probability 0.05").
const CLEANUP_PROBABILITY: f64 = 0.05;

pub struct MemoryManager {
    db: Mutex<Connection>,
    embedder: Arc<dyn Embedder>,
    vector_enabled: bool,
    score_threshold: f64,
}

impl MemoryManager {
    pub fn new(conn: Connection, embedding_dim: usize, score_threshold: f64) -> Self {
        let vector_enabled = db::try_load_vector_index(&conn, embedding_dim);
        Self {
            db: Mutex::new(conn),
            embedder: Arc::new(HashEmbedder::new(embedding_dim)),
            vector_enabled,
            score_threshold,
        }
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = embedder;
        self
    }

    // ── Messages ──────────────────────────────────────────────────────────

    #[instrument(skip(self, msg))]
    pub fn store_message(&self, msg: &Message) -> Result<i64> {
        let db = self.db.lock().unwrap();
        let metadata = msg.metadata.as_ref().map(|v| v.to_string());
        db.execute(
            "INSERT INTO messages (channel, role, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                msg.channel,
                msg.role.to_string(),
                msg.content,
                metadata,
                msg.created_at.to_rfc3339(),
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    /// Honours blocked/scheduled-source filters, returned oldest-first.
    pub fn get_channel_messages(&self, channel_id: &str, limit: usize) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, channel, role, content, metadata, created_at
             FROM messages
             WHERE channel = ?1 AND blocked = 0
             ORDER BY created_at DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![channel_id, limit as i64], row::row_to_message)?;
        let mut msgs: Vec<_> = rows.filter_map(|r| r.ok()).collect();
        msgs.reverse();
        Ok(msgs)
    }

    /// All non-blocked messages across channels, newest first then reversed.
    pub fn get_all_recent_messages(&self, limit: usize) -> Result<Vec<Message>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, channel, role, content, metadata, created_at
             FROM messages
             WHERE blocked = 0
             ORDER BY created_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row::row_to_message)?;
        let mut msgs: Vec<_> = rows.filter_map(|r| r.ok()).collect();
        msgs.reverse();
        Ok(msgs)
    }

    /// Delete all stored messages for a channel (`DELETE /api/messages`).
    pub fn clear_channel_messages(&self, channel_id: &str) -> Result<usize> {
        let db = self.db.lock().unwrap();
        let n = db.execute("DELETE FROM messages WHERE channel = ?1", params![channel_id])?;
        Ok(n)
    }

    // ── Usage ─────────────────────────────────────────────────────────────

    #[instrument(skip(self, usage))]
    pub fn record_usage(&self, usage: &UsageLog) -> Result<i64> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO usage_logs
             (timestamp, model, provider, input_tokens, output_tokens,
              call_type, agent_id, channel_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                usage.timestamp.to_rfc3339(),
                usage.model,
                usage.provider,
                usage.input_tokens,
                usage.output_tokens,
                usage.call_type.to_string(),
                usage.agent_id,
                usage.channel_id,
            ],
        )?;
        Ok(db.last_insert_rowid())
    }

    pub fn get_usage_stats(
        &self,
        from: Option<chrono::DateTime<Utc>>,
        to: Option<chrono::DateTime<Utc>>,
    ) -> Result<UsageStats> {
        let db = self.db.lock().unwrap();
        let from_s = from.map(|d| d.to_rfc3339()).unwrap_or_default();
        let to_s = to.map(|d| d.to_rfc3339()).unwrap_or_else(|| Utc::now().to_rfc3339());
        let mut stmt = db.prepare(
            "SELECT model, SUM(input_tokens), SUM(output_tokens), COUNT(*)
             FROM usage_logs
             WHERE timestamp >= ?1 AND timestamp <= ?2
             GROUP BY model",
        )?;
        let rows = stmt.query_map(params![from_s, to_s], |row| {
            Ok(ModelUsage {
                model: row.get(0)?,
                input_tokens: row.get::<_, i64>(1)? as u64,
                output_tokens: row.get::<_, i64>(2)? as u64,
                call_count: row.get::<_, i64>(3)? as u64,
            })
        })?;
        let by_model: Vec<ModelUsage> = rows.filter_map(|r| r.ok()).collect();
        let total_input_tokens = by_model.iter().map(|m| m.input_tokens).sum();
        let total_output_tokens = by_model.iter().map(|m| m.output_tokens).sum();
        let call_count = by_model.iter().map(|m| m.call_count).sum();
        Ok(UsageStats {
            total_input_tokens,
            total_output_tokens,
            call_count,
            by_model,
        })
    }

    pub fn get_cost_stats(
        &self,
        pricing: impl Fn(&str) -> Pricing,
        from: Option<chrono::DateTime<Utc>>,
        to: Option<chrono::DateTime<Utc>>,
    ) -> Result<CostStats> {
        let stats = self.get_usage_stats(from, to)?;
        let by_model: Vec<ModelCost> = stats
            .by_model
            .iter()
            .map(|m| {
                let p = pricing(&m.model);
                let usd = (m.input_tokens as f64 / 1_000_000.0) * p.input_per_million
                    + (m.output_tokens as f64 / 1_000_000.0) * p.output_per_million;
                ModelCost {
                    model: m.model.clone(),
                    usd,
                }
            })
            .collect();
        let total_usd = by_model.iter().map(|m| m.usd).sum();
        Ok(CostStats { total_usd, by_model })
    }

    // ── Memory engine ─────────────────────────────────────────────────────

    #[instrument(skip(self, input))]
    pub fn store_memory(&self, input: MemoryInput) -> Result<Memory> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let embedding = self.embedder.embed(&format!("{} {}", input.subject, input.content));

        {
            let mut db = self.db.lock().unwrap();
            let tx = db.transaction()?;
            tx.execute(
                "INSERT INTO memories (id, subject, content, memory_type, embedding,
                 expires_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    id,
                    input.subject,
                    input.content,
                    input.memory_type,
                    embedding_to_blob(&embedding),
                    input.expires_at.map(|d| d.to_rfc3339()),
                    now.to_rfc3339(),
                ],
            )?;
            for tag in &input.tags {
                tx.execute(
                    "INSERT INTO memory_tags (memory_id, tag) VALUES (?1, ?2)",
                    params![id, tag],
                )?;
            }
            let fts_rowid = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO memories_fts(rowid, subject, content, tags) VALUES (?1, ?2, ?3, ?4)",
                params![fts_rowid, input.subject, input.content, input.tags.join(" ")],
            )?;
            if self.vector_enabled {
                tx.execute(
                    "INSERT INTO memories_vec(memory_id, embedding) VALUES (?1, ?2)",
                    params![id, embedding_to_blob(&embedding)],
                )?;
            }
            tx.commit()?;
        }

        if rand::thread_rng().gen_bool(CLEANUP_PROBABILITY) {
            if let Err(e) = self.cleanup_expired() {
                tracing::warn!(error = %e, "post-store cleanup_expired failed");
            }
        }

        Ok(Memory {
            id,
            subject: input.subject,
            content: input.content,
            memory_type: input.memory_type,
            tags: input.tags,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        })
    }

    #[instrument(skip(self, opts))]
    pub fn search_memory(&self, query: &str, opts: SearchOptions) -> Result<Vec<MemorySearchResult>> {
        let top_k = if opts.top_k == 0 { 5 } else { opts.top_k };
        if self.vector_enabled {
            match self.search_vector(query, top_k, &opts) {
                Ok(results) if !results.is_empty() => return Ok(results),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "vector search failed, falling back to FTS"),
            }
        }
        self.search_fts(query, top_k, &opts)
    }

    fn search_vector(
        &self,
        query: &str,
        top_k: usize,
        opts: &SearchOptions,
    ) -> Result<Vec<MemorySearchResult>> {
        let embedding = self.embedder.embed(query);
        let db = self.db.lock().unwrap();
        let k = (top_k * 3) as i64;
        let mut stmt = db.prepare(
            "SELECT memory_id, embedding FROM memories_vec
             ORDER BY embedding <-> ?1 LIMIT ?2",
        )?;
        let query_blob = embedding_to_blob(&embedding);
        let candidates: Vec<(String, Vec<u8>)> = stmt
            .query_map(params![query_blob, k], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();

        let now = Utc::now().to_rfc3339();
        let mut results = Vec::new();
        for (memory_id, cand_blob) in candidates {
            if !tags_match(&db, &memory_id, &opts.tags)? {
                continue;
            }
            let Some(memory) = self.fetch_memory_row(&db, &memory_id, &opts.memory_type, &now)? else {
                continue;
            };
            let cand_embedding = blob_to_embedding(&cand_blob);
            let distance = cosine_to_distance(&embedding, &cand_embedding);
            let score = 1.0 - distance as f64;
            if score < self.score_threshold {
                continue;
            }
            results.push(MemorySearchResult { memory, score });
            if results.len() >= top_k {
                break;
            }
        }
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        Ok(results)
    }

    fn search_fts(
        &self,
        query: &str,
        top_k: usize,
        opts: &SearchOptions,
    ) -> Result<Vec<MemorySearchResult>> {
        let fts_query: Vec<String> = query
            .split_whitespace()
            .map(|tok| if tok.len() > 1 { format!("\"{tok}\"") } else { tok.to_string() })
            .collect();
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }
        let match_expr = fts_query.join(" OR ");

        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT m.id, bm25(memories_fts) as rank
             FROM memories_fts f
             JOIN memories m ON m.rowid = f.rowid
             WHERE memories_fts MATCH ?1
             ORDER BY rank
             LIMIT ?2",
        )?;
        let rows: Vec<(String, f64)> = stmt
            .query_map(params![match_expr, (top_k * 2) as i64], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?
            .filter_map(|r| r.ok())
            .collect();

        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let min_rank = rows.iter().map(|(_, r)| *r).fold(f64::INFINITY, f64::min);
        let max_rank = rows.iter().map(|(_, r)| *r).fold(f64::NEG_INFINITY, f64::max);
        let spread = (max_rank - min_rank).max(1e-9);

        let now = Utc::now().to_rfc3339();
        let mut results = Vec::new();
        for (memory_id, rank) in rows {
            if !tags_match(&db, &memory_id, &opts.tags)? {
                continue;
            }
            let Some(memory) = self.fetch_memory_row(&db, &memory_id, &opts.memory_type, &now)? else {
                continue;
            };
            // Lower bm25 rank is better; remap into [0.5, 1.0].
            let normalised = 1.0 - (rank - min_rank) / spread;
            let score = 0.5 + 0.5 * normalised;
            results.push(MemorySearchResult { memory, score });
            if results.len() >= top_k {
                break;
            }
        }
        Ok(results)
    }

    fn fetch_memory_row(
        &self,
        db: &Connection,
        memory_id: &str,
        memory_type: &Option<String>,
        now: &str,
    ) -> Result<Option<Memory>> {
        let row: Option<(String, String, Option<String>, Option<String>, String, String)> = db
            .query_row(
                "SELECT subject, content, memory_type, expires_at, created_at, updated_at
                 FROM memories WHERE id = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
                params![memory_id, now],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((subject, content, mtype, expires_at, created_at, updated_at)) = row else {
            return Ok(None);
        };
        if let Some(filter) = memory_type {
            if mtype.as_deref() != Some(filter.as_str()) {
                return Ok(None);
            }
        }
        let tags = self.fetch_tags(db, memory_id)?;
        Ok(Some(Memory {
            id: memory_id.to_string(),
            subject,
            content,
            memory_type: mtype,
            tags,
            expires_at: expires_at.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&Utc)),
            created_at: chrono::DateTime::parse_from_rfc3339(&created_at).unwrap().with_timezone(&Utc),
            updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at).unwrap().with_timezone(&Utc),
        }))
    }

    fn fetch_tags(&self, db: &Connection, memory_id: &str) -> Result<Vec<String>> {
        let mut stmt = db.prepare("SELECT tag FROM memory_tags WHERE memory_id = ?1")?;
        let tags = stmt
            .query_map(params![memory_id], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(tags)
    }

    #[instrument(skip(self, input))]
    pub fn update_memory(&self, id: &str, input: MemoryInput) -> Result<Memory> {
        let reembed = {
            let db = self.db.lock().unwrap();
            let existing: Option<(String, String)> = db
                .query_row(
                    "SELECT subject, content FROM memories WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((old_subject, old_content)) = existing else {
                return Err(MemoryError::NotFound(id.to_string()));
            };
            old_subject != input.subject || old_content != input.content
        };

        let embedding = if reembed {
            Some(self.embedder.embed(&format!("{} {}", input.subject, input.content)))
        } else {
            None
        };
        let now = Utc::now();

        {
            let mut db = self.db.lock().unwrap();
            let tx = db.transaction()?;
            if let Some(emb) = &embedding {
                tx.execute(
                    "UPDATE memories SET subject=?1, content=?2, memory_type=?3,
                     embedding=?4, expires_at=?5, updated_at=?6 WHERE id=?7",
                    params![
                        input.subject,
                        input.content,
                        input.memory_type,
                        embedding_to_blob(emb),
                        input.expires_at.map(|d| d.to_rfc3339()),
                        now.to_rfc3339(),
                        id,
                    ],
                )?;
                if self.vector_enabled {
                    tx.execute(
                        "INSERT OR REPLACE INTO memories_vec(memory_id, embedding) VALUES (?1, ?2)",
                        params![id, embedding_to_blob(emb)],
                    )?;
                }
            } else {
                tx.execute(
                    "UPDATE memories SET memory_type=?1, expires_at=?2, updated_at=?3 WHERE id=?4",
                    params![
                        input.memory_type,
                        input.expires_at.map(|d| d.to_rfc3339()),
                        now.to_rfc3339(),
                        id,
                    ],
                )?;
            }

            let rowid: i64 = tx.query_row("SELECT rowid FROM memories WHERE id = ?1", params![id], |r| r.get(0))?;
            tx.execute(
                "INSERT INTO memories_fts(memories_fts, rowid, subject, content, tags) VALUES('delete', ?1, '', '', '')",
                params![rowid],
            )?;
            tx.execute(
                "INSERT INTO memories_fts(rowid, subject, content, tags) VALUES (?1, ?2, ?3, ?4)",
                params![rowid, input.subject, input.content, input.tags.join(" ")],
            )?;

            tx.execute("DELETE FROM memory_tags WHERE memory_id = ?1", params![id])?;
            for tag in &input.tags {
                tx.execute(
                    "INSERT INTO memory_tags (memory_id, tag) VALUES (?1, ?2)",
                    params![id, tag],
                )?;
            }
            tx.commit()?;
        }

        Ok(Memory {
            id: id.to_string(),
            subject: input.subject,
            content: input.content,
            memory_type: input.memory_type,
            tags: input.tags,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        })
    }

    #[instrument(skip(self))]
    pub fn delete_memory(&self, id: &str) -> Result<()> {
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;
        let rowid: Option<i64> = tx
            .query_row("SELECT rowid FROM memories WHERE id = ?1", params![id], |r| r.get(0))
            .optional()?;
        let Some(rowid) = rowid else {
            return Err(MemoryError::NotFound(id.to_string()));
        };
        tx.execute(
            "INSERT INTO memories_fts(memories_fts, rowid, subject, content, tags) VALUES('delete', ?1, '', '', '')",
            params![rowid],
        )?;
        tx.execute("DELETE FROM memories_vec WHERE memory_id = ?1", params![id]).ok();
        tx.execute("DELETE FROM memory_tags WHERE memory_id = ?1", params![id])?;
        tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn cleanup_expired(&self) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let expired: Vec<String> = {
            let mut stmt = db.prepare("SELECT id FROM memories WHERE expires_at IS NOT NULL AND expires_at <= ?1")?;
            stmt.query_map(params![now], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect()
        };
        drop(db);
        for id in &expired {
            self.delete_memory(id)?;
        }
        Ok(expired.len())
    }
}

fn tags_match(db: &Connection, memory_id: &str, required: &[String]) -> Result<bool> {
    if required.is_empty() {
        return Ok(true);
    }
    let count: i64 = db.query_row(
        "SELECT COUNT(DISTINCT tag) FROM memory_tags WHERE memory_id = ?1 AND tag IN
         (SELECT value FROM json_each(?2))",
        params![memory_id, serde_json::to_string(required)?],
        |row| row.get(0),
    )?;
    Ok(count as usize == required.len())
}
