use async_trait::async_trait;
use rusqlite::{params, ErrorCode, OptionalExtension, Row};

use crate::db::models::{Comment, CommentView, Group, GroupRef, Post, PostView, User};
use crate::state::DbPool;

use super::{
    ContentStore, NewComment, NewGroup, NewPost, PostChanges, PostFilter, StoreError,
};

const POST_VIEW_SELECT: &str = "SELECT p.id, p.text, p.created_at, p.author_id, u.username,
        g.id, g.slug, g.title, p.image_ref
     FROM posts p
     JOIN users u ON u.id = p.author_id
     LEFT JOIN post_groups g ON g.id = p.group_id";

const POST_ORDER: &str = "ORDER BY p.created_at DESC, p.id DESC";

const POST_COLUMNS: &str = "id, text, created_at, author_id, group_id, image_ref";

/// SQLite-backed content store
pub struct SqliteContentStore {
    pool: DbPool,
}

impl SqliteContentStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// WHERE clause and its single bound parameter for a post filter.
fn filter_clause(filter: PostFilter) -> (&'static str, Option<i64>) {
    match filter {
        PostFilter::All => ("", None),
        PostFilter::Group(id) => ("WHERE p.group_id = ?1", Some(id)),
        PostFilter::Author(id) => ("WHERE p.author_id = ?1", Some(id)),
        PostFilter::FollowedBy(user_id) => (
            "WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ?1)",
            Some(user_id),
        ),
    }
}

fn post_view_from_row(row: &Row<'_>) -> rusqlite::Result<PostView> {
    let group_id: Option<i64> = row.get(5)?;
    let group = match group_id {
        Some(id) => Some(GroupRef {
            id,
            slug: row.get(6)?,
            title: row.get(7)?,
        }),
        None => None,
    };

    Ok(PostView {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        author_id: row.get(3)?,
        author_username: row.get(4)?,
        group,
        image_ref: row.get(8)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        text: row.get(1)?,
        created_at: row.get(2)?,
        author_id: row.get(3)?,
        group_id: row.get(4)?,
        image_ref: row.get(5)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
    })
}

/// Turn unique/foreign-key violations into a domain conflict.
fn constraint_to_conflict(err: rusqlite::Error, what: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Conflict(format!("{what}: {err}"))
        }
        other => StoreError::Sql(other),
    }
}

fn not_found_if_missing(err: rusqlite::Error, what: String) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(what),
        other => StoreError::Sql(other),
    }
}

#[async_trait]
impl ContentStore for SqliteContentStore {
    async fn create_user(&self, username: &str) -> Result<User, StoreError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "INSERT INTO users (username) VALUES (?1) RETURNING id, username, created_at",
            params![username],
            user_from_row,
        )
        .map_err(|e| constraint_to_conflict(e, "username already taken"))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let conn = self.pool.get()?;
        let user = conn
            .query_row(
                "SELECT id, username, created_at FROM users WHERE username = ?1",
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "INSERT INTO post_groups (title, slug, description) VALUES (?1, ?2, ?3)
             RETURNING id, title, slug, description",
            params![group.title, group.slug, group.description],
            group_from_row,
        )
        .map_err(|e| constraint_to_conflict(e, "group slug already taken"))
    }

    async fn find_group_by_slug(&self, slug: &str) -> Result<Option<Group>, StoreError> {
        let conn = self.pool.get()?;
        let group = conn
            .query_row(
                "SELECT id, title, slug, description FROM post_groups WHERE slug = ?1",
                params![slug],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt =
            conn.prepare("SELECT id, title, slug, description FROM post_groups ORDER BY title")?;
        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    async fn delete_group(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM post_groups WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("group {id}")));
        }
        tracing::info!(group_id = id, "Deleted group");
        Ok(())
    }

    async fn find_posts(&self, filter: PostFilter) -> Result<Vec<PostView>, StoreError> {
        let conn = self.pool.get()?;
        let (clause, param) = filter_clause(filter);
        let sql = format!("{POST_VIEW_SELECT} {clause} {POST_ORDER}");
        let mut stmt = conn.prepare(&sql)?;

        let rows = match param {
            Some(value) => stmt.query_map(params![value], post_view_from_row)?,
            None => stmt.query_map([], post_view_from_row)?,
        };
        let posts = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    async fn count_posts(&self, filter: PostFilter) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let (clause, param) = filter_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM posts p {clause}");

        let count: i64 = match param {
            Some(value) => conn.query_row(&sql, params![value], |r| r.get(0))?,
            None => conn.query_row(&sql, [], |r| r.get(0))?,
        };
        Ok(count.max(0) as u64)
    }

    async fn get_post(&self, id: i64) -> Result<PostView, StoreError> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("{POST_VIEW_SELECT} WHERE p.id = ?1"),
            params![id],
            post_view_from_row,
        )
        .map_err(|e| not_found_if_missing(e, format!("post {id}")))
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let conn = self.pool.get()?;
        let created = conn
            .query_row(
                &format!(
                    "INSERT INTO posts (text, author_id, group_id, image_ref)
                     VALUES (?1, ?2, ?3, ?4) RETURNING {POST_COLUMNS}"
                ),
                params![post.text, post.author_id, post.group_id, post.image_ref],
                post_from_row,
            )
            .map_err(|e| constraint_to_conflict(e, "post references a missing author or group"))?;

        tracing::info!(post_id = created.id, author_id = created.author_id, "Created post");
        Ok(created)
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> Result<Post, StoreError> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!(
                "UPDATE posts SET text = ?2, group_id = ?3, image_ref = ?4
                 WHERE id = ?1 RETURNING {POST_COLUMNS}"
            ),
            params![id, changes.text, changes.group_id, changes.image_ref],
            post_from_row,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(format!("post {id}")),
            other => constraint_to_conflict(other, "post references a missing group"),
        })
    }

    async fn delete_post(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(StoreError::NotFound(format!("post {id}")));
        }
        tracing::info!(post_id = id, "Deleted post");
        Ok(())
    }

    async fn find_comments(&self, post_id: i64) -> Result<Vec<CommentView>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.post_id, u.username, c.text, c.created_at
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?1
             ORDER BY c.created_at ASC, c.id ASC",
        )?;

        let comments = stmt
            .query_map(params![post_id], |row| {
                Ok(CommentView {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    author_username: row.get(2)?,
                    text: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    async fn create_comment(&self, comment: NewComment) -> Result<Comment, StoreError> {
        let conn = self.pool.get()?;
        conn.query_row(
            "INSERT INTO comments (post_id, author_id, text) VALUES (?1, ?2, ?3)
             RETURNING id, post_id, author_id, text, created_at",
            params![comment.post_id, comment.author_id, comment.text],
            |row| {
                Ok(Comment {
                    id: row.get(0)?,
                    post_id: row.get(1)?,
                    author_id: row.get(2)?,
                    text: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .map_err(|e| constraint_to_conflict(e, "comment references a missing post"))
    }

    async fn follow(&self, user_id: i64, author_id: i64) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn
            .execute(
                "INSERT OR IGNORE INTO follows (user_id, author_id) VALUES (?1, ?2)",
                params![user_id, author_id],
            )
            .map_err(|e| constraint_to_conflict(e, "follow references a missing user"))?;
        Ok(rows > 0)
    }

    async fn unfollow(&self, user_id: i64, author_id: i64) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![user_id, author_id],
        )?;
        Ok(rows > 0)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> Result<bool, StoreError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM follows WHERE user_id = ?1 AND author_id = ?2",
            params![user_id, author_id],
            |r| r.get(0),
        )?;
        Ok(exists)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    async fn count_followers(&self, author_id: i64) -> Result<u64, StoreError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM follows WHERE author_id = ?1",
            params![author_id],
            |r| r.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::migrated_pool;

    fn store() -> (DbPool, SqliteContentStore) {
        let pool = migrated_pool();
        (pool.clone(), SqliteContentStore::new(pool))
    }

    fn set_created_at(pool: &DbPool, post_id: i64, ts: &str) {
        let conn = pool.get().unwrap();
        conn.execute(
            "UPDATE posts SET created_at = ?1 WHERE id = ?2",
            params![ts, post_id],
        )
        .unwrap();
    }

    async fn post(store: &SqliteContentStore, author_id: i64, group_id: Option<i64>) -> Post {
        store
            .create_post(NewPost {
                text: "hello".into(),
                author_id,
                group_id,
                image_ref: None,
            })
            .await
            .unwrap()
    }

    fn news() -> NewGroup {
        NewGroup {
            title: "News".into(),
            slug: "news".into(),
            description: "Daily news".into(),
        }
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let (_pool, store) = store();
        store.create_user("alice").await.unwrap();
        let err = store.create_user("alice").await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn duplicate_group_slug_is_a_conflict() {
        let (_pool, store) = store();
        store.create_group(news()).await.unwrap();
        let err = store.create_group(news()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn find_posts_orders_newest_first_then_by_id() {
        let (pool, store) = store();
        let alice = store.create_user("alice").await.unwrap();
        let old = post(&store, alice.id, None).await;
        let tie_a = post(&store, alice.id, None).await;
        let tie_b = post(&store, alice.id, None).await;
        set_created_at(&pool, old.id, "2024-01-01 00:00:00");
        set_created_at(&pool, tie_a.id, "2024-06-01 00:00:00");
        set_created_at(&pool, tie_b.id, "2024-06-01 00:00:00");

        let ids: Vec<i64> = store
            .find_posts(PostFilter::All)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![tie_b.id, tie_a.id, old.id]);
    }

    #[tokio::test]
    async fn find_posts_filters_by_group_and_author() {
        let (_pool, store) = store();
        let alice = store.create_user("alice").await.unwrap();
        let bob = store.create_user("bob").await.unwrap();
        let group = store.create_group(news()).await.unwrap();
        let grouped = post(&store, alice.id, Some(group.id)).await;
        let by_bob = post(&store, bob.id, None).await;

        let in_group = store.find_posts(PostFilter::Group(group.id)).await.unwrap();
        assert_eq!(in_group.len(), 1);
        assert_eq!(in_group[0].id, grouped.id);
        assert_eq!(in_group[0].group.as_ref().unwrap().slug, "news");

        let bobs = store.find_posts(PostFilter::Author(bob.id)).await.unwrap();
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].id, by_bob.id);
        assert_eq!(bobs[0].author_username, "bob");

        assert_eq!(store.count_posts(PostFilter::All).await.unwrap(), 2);
        assert_eq!(store.count_posts(PostFilter::Group(group.id)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn followed_by_only_returns_followed_authors() {
        let (_pool, store) = store();
        let reader = store.create_user("reader").await.unwrap();
        let alice = store.create_user("alice").await.unwrap();
        let bob = store.create_user("bob").await.unwrap();
        let from_alice = post(&store, alice.id, None).await;
        post(&store, bob.id, None).await;

        assert!(store.find_posts(PostFilter::FollowedBy(reader.id)).await.unwrap().is_empty());

        assert!(store.follow(reader.id, alice.id).await.unwrap());
        assert!(!store.follow(reader.id, alice.id).await.unwrap());

        let feed = store.find_posts(PostFilter::FollowedBy(reader.id)).await.unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].id, from_alice.id);
    }

    #[tokio::test]
    async fn follow_counts_and_unfollow() {
        let (_pool, store) = store();
        let reader = store.create_user("reader").await.unwrap();
        let alice = store.create_user("alice").await.unwrap();

        store.follow(reader.id, alice.id).await.unwrap();
        assert!(store.is_following(reader.id, alice.id).await.unwrap());
        assert!(!store.is_following(alice.id, reader.id).await.unwrap());
        assert_eq!(store.count_following(reader.id).await.unwrap(), 1);
        assert_eq!(store.count_followers(alice.id).await.unwrap(), 1);

        assert!(store.unfollow(reader.id, alice.id).await.unwrap());
        assert!(!store.unfollow(reader.id, alice.id).await.unwrap());
        assert_eq!(store.count_followers(alice.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deleting_group_clears_post_reference() {
        let (_pool, store) = store();
        let alice = store.create_user("alice").await.unwrap();
        let group = store.create_group(news()).await.unwrap();
        let created = post(&store, alice.id, Some(group.id)).await;

        store.delete_group(group.id).await.unwrap();

        let survivor = store.get_post(created.id).await.unwrap();
        assert_eq!(survivor.group, None);
        assert!(store.find_group_by_slug("news").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_post_cascades_to_comments() {
        let (pool, store) = store();
        let alice = store.create_user("alice").await.unwrap();
        let created = post(&store, alice.id, None).await;
        store
            .create_comment(NewComment {
                post_id: created.id,
                author_id: alice.id,
                text: "first".into(),
            })
            .await
            .unwrap();
        assert_eq!(store.find_comments(created.id).await.unwrap().len(), 1);

        store.delete_post(created.id).await.unwrap();

        let conn = pool.get().unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn update_keeps_created_at_and_author() {
        let (_pool, store) = store();
        let alice = store.create_user("alice").await.unwrap();
        let group = store.create_group(news()).await.unwrap();
        let created = post(&store, alice.id, None).await;

        let updated = store
            .update_post(
                created.id,
                PostChanges {
                    text: "edited".into(),
                    group_id: Some(group.id),
                    image_ref: Some("posts/cat.png".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.text, "edited");
        assert_eq!(updated.group_id, Some(group.id));
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.author_id, alice.id);
    }

    #[tokio::test]
    async fn missing_posts_report_not_found() {
        let (_pool, store) = store();
        assert!(matches!(store.get_post(42).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete_post(42).await, Err(StoreError::NotFound(_))));
        let changes = PostChanges {
            text: "x".into(),
            group_id: None,
            image_ref: None,
        };
        assert!(matches!(
            store.update_post(42, changes).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn post_with_unknown_group_is_rejected() {
        let (_pool, store) = store();
        let alice = store.create_user("alice").await.unwrap();
        let err = store
            .create_post(NewPost {
                text: "hi".into(),
                author_id: alice.id,
                group_id: Some(77),
                image_ref: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
