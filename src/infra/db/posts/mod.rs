mod read;
mod write;

use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
    application::repos::PostFilter,
    domain::entities::{GroupSummary, PostListing, PostRecord, UserSummary, display_name},
};

const POST_COLUMNS: &str = "id, text, author_id, group_id, image, created_at";

const LISTING_SELECT: &str = r#"
    SELECT
        p.id,
        p.text,
        p.author_id,
        p.group_id,
        p.image,
        p.created_at,
        u.username AS author_username,
        u.first_name AS author_first_name,
        u.last_name AS author_last_name,
        g.title AS group_title,
        g.slug AS group_slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN post_groups g ON g.id = p.group_id
"#;

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    text: String,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
    created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            text: row.text,
            author_id: row.author_id,
            group_id: row.group_id,
            image: row.image,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PostListingRow {
    id: i64,
    text: String,
    author_id: i64,
    group_id: Option<i64>,
    image: Option<String>,
    created_at: OffsetDateTime,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    group_title: Option<String>,
    group_slug: Option<String>,
}

impl From<PostListingRow> for PostListing {
    fn from(row: PostListingRow) -> Self {
        let author = UserSummary {
            id: row.author_id,
            full_name: display_name(
                &row.author_username,
                &row.author_first_name,
                &row.author_last_name,
            ),
            username: row.author_username,
        };
        let group = match (row.group_id, row.group_title, row.group_slug) {
            (Some(id), Some(title), Some(slug)) => Some(GroupSummary { id, title, slug }),
            _ => None,
        };

        Self {
            post: PostRecord {
                id: row.id,
                text: row.text,
                author_id: row.author_id,
                group_id: row.group_id,
                image: row.image,
                created_at: row.created_at,
            },
            author,
            group,
        }
    }
}

/// Appends the `WHERE` clause for a listing filter. Columns are qualified
/// with the `p` alias used by both the listing and count queries.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: PostFilter) {
    match filter {
        PostFilter::All => {}
        PostFilter::Group(group_id) => {
            qb.push(" WHERE p.group_id = ").push_bind(group_id);
        }
        PostFilter::Author(author_id) => {
            qb.push(" WHERE p.author_id = ").push_bind(author_id);
        }
        PostFilter::FollowedBy(user_id) => {
            qb.push(" WHERE p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = ")
                .push_bind(user_id)
                .push(")");
        }
    }
}
