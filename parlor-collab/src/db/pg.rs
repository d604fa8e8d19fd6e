use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parlor_core::{ConnectionId, MemberId, PrimaryKey};
use sqlx::{postgres::PgPoolOptions, query, query_as, Error as SqlxError, FromRow, PgPool};

use crate::{
    Database, DatabaseError, DatabaseResult, IntoDatabaseError, MemberData, MessageData,
    MessageId, NewMember, NewMessage, NewReaction, ReactionData, Result, RoomData, RoomId,
    UpdatedMember,
};

/// A postgres database implementation for parlor
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct RoomRow {
    id: PrimaryKey,
    slug: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct MemberRow {
    id: PrimaryKey,
    room_id: PrimaryKey,
    name: String,
    avatar_url: Option<String>,
    online: bool,
    connection_id: Option<i64>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct MessageRow {
    id: PrimaryKey,
    room_id: PrimaryKey,
    member_id: PrimaryKey,
    text: String,
    image_url: Option<String>,
    audio_url: Option<String>,
    is_deleted: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ReactionRow {
    id: PrimaryKey,
    message_id: PrimaryKey,
    member_id: PrimaryKey,
    emoji: String,
}

impl PgDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    async fn reactions_for(&self, message_ids: &[MessageId]) -> Result<Vec<ReactionData>> {
        let rows: Vec<ReactionRow> =
            query_as("SELECT * FROM reactions WHERE message_id = ANY($1) ORDER BY id")
                .bind(message_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Attaches authors and reactions to message rows
    async fn hydrate(&self, rows: Vec<MessageRow>) -> Result<Vec<MessageData>> {
        let ids: Vec<_> = rows.iter().map(|r| r.id).collect();
        let reactions = self.reactions_for(&ids).await?;

        let mut messages = Vec::with_capacity(rows.len());

        for row in rows {
            let member = self.member_by_id(MemberId(row.member_id)).await?;
            let reactions = reactions
                .iter()
                .filter(|r| r.message_id == row.id)
                .cloned()
                .collect();

            messages.push(MessageData {
                id: row.id,
                room_id: row.room_id,
                member_id: member.id,
                member,
                text: row.text,
                image_url: row.image_url,
                audio_url: row.audio_url,
                is_deleted: row.is_deleted,
                created_at: row.created_at,
                reactions,
            })
        }

        Ok(messages)
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn room_by_slug(&self, slug: &str) -> Result<RoomData> {
        query_as::<_, RoomRow>("SELECT * FROM rooms WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("room", "slug"))
    }

    async fn create_room(&self, slug: &str) -> Result<RoomData> {
        self.room_by_slug(slug)
            .await
            .conflict_or_ok("room", "slug", slug)?;

        query_as::<_, RoomRow>("INSERT INTO rooms (slug) VALUES ($1) RETURNING *")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.any())
    }

    async fn member_by_id(&self, member_id: MemberId) -> Result<MemberData> {
        query_as::<_, MemberRow>("SELECT * FROM members WHERE id = $1")
            .bind(member_id.value())
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("member", "id"))
    }

    async fn member_by_name(&self, room_id: RoomId, name: &str) -> Result<MemberData> {
        query_as::<_, MemberRow>("SELECT * FROM members WHERE room_id = $1 AND name = $2")
            .bind(room_id)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("member", "name"))
    }

    async fn list_members(&self, room_id: RoomId) -> Result<Vec<MemberData>> {
        let rows: Vec<MemberRow> =
            query_as("SELECT * FROM members WHERE room_id = $1 ORDER BY id")
                .bind(room_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_member(&self, new_member: NewMember) -> Result<MemberData> {
        self.member_by_name(new_member.room_id, &new_member.name)
            .await
            .conflict_or_ok("member", "name", &new_member.name)?;

        query_as::<_, MemberRow>(
            "INSERT INTO members (room_id, name, online, connection_id)
            VALUES ($1, $2, true, $3)
            RETURNING *",
        )
        .bind(new_member.room_id)
        .bind(&new_member.name)
        .bind(connection_to_sql(new_member.connection_id))
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn update_member(&self, updated_member: UpdatedMember) -> Result<MemberData> {
        let member = self.member_by_id(updated_member.id).await?;

        if let Some(name) = &updated_member.name {
            if let Some(existing) = self.member_by_name(member.room_id, name).await.optional()? {
                if existing.id != member.id {
                    return Err(DatabaseError::Conflict {
                        resource: "member",
                        field: "name",
                        value: name.clone(),
                    });
                }
            }
        }

        query_as::<_, MemberRow>(
            "UPDATE members SET name = $1, avatar_url = $2 WHERE id = $3 RETURNING *",
        )
        .bind(updated_member.name.unwrap_or(member.name))
        .bind(updated_member.avatar_url.or(member.avatar_url))
        .bind(member.id.value())
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn bind_member(
        &self,
        member_id: MemberId,
        connection_id: ConnectionId,
    ) -> Result<MemberData> {
        query_as::<_, MemberRow>(
            "UPDATE members SET online = true, connection_id = $1 WHERE id = $2 RETURNING *",
        )
        .bind(connection_to_sql(connection_id))
        .bind(member_id.value())
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("member", "id"))
    }

    async fn unbind_member(
        &self,
        member_id: MemberId,
        connection_id: ConnectionId,
    ) -> Result<bool> {
        let result = query(
            "UPDATE members SET online = false, connection_id = NULL
            WHERE id = $1 AND connection_id = $2",
        )
        .bind(member_id.value())
        .bind(connection_to_sql(connection_id))
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_presence(&self) -> Result<()> {
        query("UPDATE members SET online = false, connection_id = NULL")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn message_by_id(&self, message_id: MessageId) -> Result<MessageData> {
        let row: MessageRow = query_as("SELECT * FROM messages WHERE id = $1")
            .bind(message_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("message", "id"))?;

        let mut messages = self.hydrate(vec![row]).await?;

        messages.pop().ok_or(DatabaseError::NotFound {
            resource: "message",
            identifier: "id",
        })
    }

    async fn recent_messages(&self, room_id: RoomId, limit: usize) -> Result<Vec<MessageData>> {
        let rows: Vec<MessageRow> = query_as(
            "SELECT * FROM (
                SELECT * FROM messages WHERE room_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2
            ) latest ORDER BY created_at ASC, id ASC",
        )
        .bind(room_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.hydrate(rows).await
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        let row: MessageRow = query_as(
            "INSERT INTO messages (room_id, member_id, text, image_url, audio_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(new_message.room_id)
        .bind(new_message.member_id.value())
        .bind(new_message.text)
        .bind(new_message.image_url)
        .bind(new_message.audio_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.message_by_id(row.id).await
    }

    async fn mark_message_deleted(&self, message_id: MessageId) -> Result<()> {
        let result = query("UPDATE messages SET is_deleted = true WHERE id = $1")
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "message",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn upsert_reaction(&self, new_reaction: NewReaction) -> Result<ReactionData> {
        // The no-op update makes RETURNING yield the existing row on conflict
        query_as::<_, ReactionRow>(
            "INSERT INTO reactions (message_id, member_id, emoji)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id, member_id, emoji) DO UPDATE SET emoji = EXCLUDED.emoji
            RETURNING *",
        )
        .bind(new_reaction.message_id)
        .bind(new_reaction.member_id.value())
        .bind(new_reaction.emoji)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn delete_reaction(
        &self,
        message_id: MessageId,
        member_id: MemberId,
        emoji: &str,
    ) -> Result<()> {
        let result = query(
            "DELETE FROM reactions WHERE message_id = $1 AND member_id = $2 AND emoji = $3",
        )
        .bind(message_id)
        .bind(member_id.value())
        .bind(emoji)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "reaction",
                identifier: "message_id, member_id, emoji",
            });
        }

        Ok(())
    }
}

fn connection_to_sql(connection_id: ConnectionId) -> i64 {
    connection_id.value() as i64
}

impl From<RoomRow> for RoomData {
    fn from(row: RoomRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            created_at: row.created_at,
        }
    }
}

impl From<MemberRow> for MemberData {
    fn from(row: MemberRow) -> Self {
        Self {
            id: MemberId(row.id),
            room_id: row.room_id,
            name: row.name,
            avatar_url: row.avatar_url,
            online: row.online,
            connection_id: row.connection_id.map(|v| ConnectionId::from_value(v as u64)),
            created_at: row.created_at,
        }
    }
}

impl From<ReactionRow> for ReactionData {
    fn from(row: ReactionRow) -> Self {
        Self {
            id: row.id,
            message_id: row.message_id,
            member_id: MemberId(row.member_id),
            emoji: row.emoji,
        }
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
