//! View structs shared by every page that lists posts.

use chrono::{NaiveDateTime, Utc};

use crate::db::models::{CommentView, GroupRef, PostView};
use crate::feed::Page;

pub struct PostCard {
    pub id: i64,
    pub author: String,
    pub text: String,
    pub created_at: String,
    pub group: Option<GroupRef>,
    pub image_ref: Option<String>,
}

impl From<PostView> for PostCard {
    fn from(post: PostView) -> Self {
        Self {
            id: post.id,
            author: post.author_username,
            text: post.text,
            created_at: format_post_time(&post.created_at),
            group: post.group,
            image_ref: post.image_ref,
        }
    }
}

pub struct CommentCard {
    pub author: String,
    pub text: String,
    pub created_at: String,
}

impl From<CommentView> for CommentCard {
    fn from(comment: CommentView) -> Self {
        Self {
            author: comment.author_username,
            text: comment.text,
            created_at: format_post_time(&comment.created_at),
        }
    }
}

pub fn cards(page: Page<PostView>) -> Page<PostCard> {
    page.map(PostCard::from)
}

/// Relative for the last week, a calendar date after that.
pub fn format_post_time(dt: &NaiveDateTime) -> String {
    let diff = Utc::now().naive_utc().signed_duration_since(*dt);

    if diff.num_seconds() < 60 {
        return "just now".to_string();
    }
    if diff.num_minutes() < 60 {
        return format!("{}m ago", diff.num_minutes());
    }
    if diff.num_hours() < 24 {
        return format!("{}h ago", diff.num_hours());
    }
    if diff.num_days() < 7 {
        return format!("{}d ago", diff.num_days());
    }

    dt.format("%b %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn recent_times_are_relative() {
        let now = Utc::now().naive_utc();
        assert_eq!(format_post_time(&now), "just now");
        assert_eq!(
            format_post_time(&(now - chrono::Duration::minutes(5))),
            "5m ago"
        );
        assert_eq!(format_post_time(&(now - chrono::Duration::hours(3))), "3h ago");
        assert_eq!(format_post_time(&(now - chrono::Duration::days(2))), "2d ago");
    }

    #[test]
    fn old_times_are_dates() {
        let dt = NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(format_post_time(&dt), "Jan 15, 2025");
    }

    #[test]
    fn card_keeps_group_and_author() {
        let view = PostView {
            id: 7,
            text: "hello".into(),
            created_at: Utc::now().naive_utc(),
            author_id: 1,
            author_username: "alice".into(),
            group: Some(GroupRef {
                id: 2,
                slug: "cats".into(),
                title: "Cats".into(),
            }),
            image_ref: None,
        };
        let card = PostCard::from(view);
        assert_eq!(card.author, "alice");
        assert_eq!(card.group.unwrap().slug, "cats");
    }
}
