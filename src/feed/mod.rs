pub mod cache;
pub mod paginator;
pub mod query;

use std::sync::Arc;

use thiserror::Error;

use crate::db::models::{Group, PostView, User};
use crate::store::{ContentStore, PostFilter, StoreError};

pub use cache::PageCache;
pub use paginator::{paginate, total_pages, Page, PageNumber, PageSize, PaginationError};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("No group with slug {0:?}")]
    GroupNotFound(String),

    #[error("No author named {0:?}")]
    AuthorNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FeedError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FeedError::GroupNotFound(_)
                | FeedError::AuthorNotFound(_)
                | FeedError::Store(StoreError::NotFound(_))
        )
    }
}

/// The four feeds a reader can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedKind {
    All,
    Group(String),
    Author(String),
    /// Posts by authors the given user follows.
    Followed(i64),
}

/// What a feed was selected by, for page headings.
#[derive(Debug, Clone)]
pub enum FeedSubject {
    All,
    Group(Group),
    Author(User),
    Followed,
}

/// One rendered-ready page of a feed.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub subject: FeedSubject,
    pub page: Page<PostView>,
}

/// Composes feed selection and pagination, and owns the page cache handle.
#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn ContentStore>,
    cache: PageCache,
    page_size: PageSize,
}

impl FeedService {
    pub fn new(store: Arc<dyn ContentStore>, cache: PageCache, page_size: PageSize) -> Self {
        Self {
            store,
            cache,
            page_size,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Select, order and paginate a feed. Every call re-queries the store, so
    /// two pages fetched separately may disagree if posts changed in between.
    pub async fn render_feed(
        &self,
        kind: &FeedKind,
        page: PageNumber,
    ) -> Result<FeedPage, FeedError> {
        let store = self.store.as_ref();
        let (subject, posts) = match kind {
            FeedKind::All => (FeedSubject::All, query::all_posts(store).await?),
            FeedKind::Group(slug) => {
                let (group, posts) = query::posts_by_group(store, slug).await?;
                (FeedSubject::Group(group), posts)
            }
            FeedKind::Author(username) => {
                let (author, posts) = query::posts_by_author(store, username).await?;
                (FeedSubject::Author(author), posts)
            }
            FeedKind::Followed(user_id) => (
                FeedSubject::Followed,
                query::followed_feed(store, *user_id).await?,
            ),
        };

        let page = paginate(posts, self.page_size, page);
        tracing::debug!(
            ?kind,
            page = page.number,
            total = page.total_count,
            "Rendered feed page"
        );
        Ok(FeedPage { subject, page })
    }

    /// Clamp a requested page of the all-posts feed to the real page range
    /// with a count query, without loading any posts.
    pub async fn resolve_index_page(&self, page: PageNumber) -> Result<usize, FeedError> {
        let count = self.store.count_posts(PostFilter::All).await?;
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        Ok(page.resolve(total_pages(count, self.page_size)))
    }

    /// Drop every cached feed page. Writes never call this on their own.
    pub async fn invalidate_feed_cache(&self) {
        self.cache.clear().await;
    }
}

/// Cache key for a resolved page of the all-posts feed. Keys never outnumber
/// the feed's pages, whatever `?page=` values clients send.
pub fn index_cache_key(page: usize) -> String {
    format!("index:page={page}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::migrated_pool;
    use crate::store::{NewGroup, NewPost, SqliteContentStore};

    async fn service_with(page_size: usize) -> (Arc<dyn ContentStore>, FeedService) {
        let store: Arc<dyn ContentStore> = Arc::new(SqliteContentStore::new(migrated_pool()));
        let service = FeedService::new(
            store.clone(),
            PageCache::default(),
            PageSize::new(page_size).unwrap(),
        );
        (store, service)
    }

    async fn write_posts(store: &Arc<dyn ContentStore>, author_id: i64, group: Option<i64>, n: usize) {
        for i in 0..n {
            store
                .create_post(NewPost {
                    text: format!("post {i}"),
                    author_id,
                    group_id: group,
                    image_ref: None,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn all_feed_second_page_of_fourteen() {
        let (store, service) = service_with(10).await;
        let alice = store.create_user("alice").await.unwrap();
        write_posts(&store, alice.id, None, 14).await;

        let feed = service
            .render_feed(&FeedKind::All, PageNumber::Requested(2))
            .await
            .unwrap();
        assert_eq!(feed.page.items.len(), 4);
        assert!(!feed.page.has_next());
        assert!(feed.page.has_previous());
        assert_eq!(feed.page.total_pages, 2);
    }

    #[tokio::test]
    async fn group_feed_carries_group_and_only_its_posts() {
        let (store, service) = service_with(10).await;
        let alice = store.create_user("alice").await.unwrap();
        let group = store
            .create_group(NewGroup {
                title: "Cats".into(),
                slug: "cats".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        write_posts(&store, alice.id, Some(group.id), 11).await;
        write_posts(&store, alice.id, None, 3).await;

        let feed = service
            .render_feed(&FeedKind::Group("cats".into()), PageNumber::Requested(2))
            .await
            .unwrap();
        assert_eq!(feed.page.items.len(), 1);
        assert_eq!(feed.page.total_count, 11);
        assert!(matches!(feed.subject, FeedSubject::Group(ref g) if g.slug == "cats"));
    }

    #[tokio::test]
    async fn missing_group_and_author_are_not_found() {
        let (_store, service) = service_with(10).await;
        let err = service
            .render_feed(&FeedKind::Group("nonexistent-slug".into()), PageNumber::First)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = service
            .render_feed(&FeedKind::Author("ghost".into()), PageNumber::First)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn followed_feed_for_user_following_nobody_is_empty() {
        let (store, service) = service_with(10).await;
        let reader = store.create_user("reader").await.unwrap();
        let alice = store.create_user("alice").await.unwrap();
        write_posts(&store, alice.id, None, 2).await;

        let feed = service
            .render_feed(&FeedKind::Followed(reader.id), PageNumber::First)
            .await
            .unwrap();
        assert!(feed.page.is_empty());
        assert_eq!(feed.page.total_pages, 1);

        store.follow(reader.id, alice.id).await.unwrap();
        let feed = service
            .render_feed(&FeedKind::Followed(reader.id), PageNumber::First)
            .await
            .unwrap();
        assert_eq!(feed.page.total_count, 2);
    }

    #[tokio::test]
    async fn separate_page_requests_observe_new_posts() {
        let (store, service) = service_with(2).await;
        let alice = store.create_user("alice").await.unwrap();
        write_posts(&store, alice.id, None, 3).await;

        let first = service
            .render_feed(&FeedKind::All, PageNumber::Requested(1))
            .await
            .unwrap();
        assert_eq!(first.page.total_count, 3);

        // A post written between the two requests shifts everything down, so
        // page 2 repeats the last item page 1 already showed.
        write_posts(&store, alice.id, None, 1).await;
        let second = service
            .render_feed(&FeedKind::All, PageNumber::Requested(2))
            .await
            .unwrap();
        assert_eq!(second.page.total_count, 4);
        assert_eq!(second.page.items[0].id, first.page.items[1].id);
    }

    #[test]
    fn index_keys_differ_per_page() {
        assert_eq!(index_cache_key(1), "index:page=1");
        assert_ne!(index_cache_key(1), index_cache_key(2));
    }

    #[tokio::test]
    async fn index_page_resolves_against_post_count() {
        let (store, service) = service_with(10).await;
        assert_eq!(service.resolve_index_page(PageNumber::Requested(5)).await.unwrap(), 1);

        let alice = store.create_user("alice").await.unwrap();
        write_posts(&store, alice.id, None, 14).await;
        for (requested, resolved) in [
            (PageNumber::First, 1),
            (PageNumber::Requested(2), 2),
            (PageNumber::Requested(1000), 2),
            (PageNumber::Requested(-3), 2),
        ] {
            assert_eq!(service.resolve_index_page(requested).await.unwrap(), resolved);
        }
    }
}
