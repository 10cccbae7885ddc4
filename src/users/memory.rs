use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::repo::{StoreError, UserStore};
use crate::users::repo_types::{ChannelProfile, NewUser, User, UserPatch, WatchedVideo};

/// A row of the `videos` table; the in-memory store keeps these to serve the history join.
#[derive(Debug, Clone)]
pub struct Video {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub duration_secs: i32,
    pub views: i64,
    pub created_at: OffsetDateTime,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    videos: HashMap<Uuid, Video>,
    // (subscriber, channel)
    subscriptions: HashSet<(Uuid, Uuid)>,
}

/// Process-local store with the same semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<Inner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_video(&self, video: Video) {
        self.inner.write().await.videos.insert(video.id, video);
    }

    pub async fn subscribe(&self, subscriber: Uuid, channel: Uuid) {
        self.inner
            .write()
            .await
            .subscriptions
            .insert((subscriber, channel));
    }

    pub async fn push_watch_history(&self, user_id: Uuid, video_id: Uuid) -> bool {
        match self.inner.write().await.users.get_mut(&user_id) {
            Some(user) => {
                user.watch_history.push(video_id);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_handle_or_email(
        &self,
        handle: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let inner = self.inner.read().await;
        let found = inner
            .users
            .values()
            .filter(|u| {
                handle.is_some_and(|h| u.handle == h) || email.is_some_and(|e| u.email == e)
            })
            .min_by_key(|u| u.created_at)
            .cloned();
        Ok(found)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.handle == new_user.handle) {
            return Err(StoreError::Duplicate("handle"));
        }
        if inner.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            handle: new_user.handle,
            email: new_user.email,
            password_hash: new_user.password_hash,
            full_name: new_user.full_name,
            avatar: new_user.avatar,
            cover_image: new_user.cover_image,
            watch_history: Vec::new(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_fields(&self, id: Uuid, patch: UserPatch) -> Result<Option<User>, StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(email) = &patch.email {
            if inner.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Duplicate("email"));
            }
        }
        let Some(user) = inner.users.get_mut(&id) else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(user.clone()));
        }
        patch.apply(user);
        Ok(Some(user.clone()))
    }

    async fn channel_profile(
        &self,
        handle: &str,
        viewer: Uuid,
    ) -> Result<Option<ChannelProfile>, StoreError> {
        let inner = self.inner.read().await;
        let Some(user) = inner.users.values().find(|u| u.handle == handle) else {
            return Ok(None);
        };
        let subscribers_count = inner
            .subscriptions
            .iter()
            .filter(|(_, channel)| *channel == user.id)
            .count() as i64;
        let subscribed_to_count = inner
            .subscriptions
            .iter()
            .filter(|(subscriber, _)| *subscriber == user.id)
            .count() as i64;
        Ok(Some(ChannelProfile {
            id: user.id,
            handle: user.handle.clone(),
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            cover_image: user.cover_image.clone(),
            subscribers_count,
            subscribed_to_count,
            is_subscribed: inner.subscriptions.contains(&(viewer, user.id)),
        }))
    }

    async fn watch_history(&self, user_id: Uuid) -> Result<Vec<WatchedVideo>, StoreError> {
        let inner = self.inner.read().await;
        let Some(user) = inner.users.get(&user_id) else {
            return Ok(Vec::new());
        };
        let rows = user
            .watch_history
            .iter()
            .filter_map(|video_id| inner.videos.get(video_id))
            .filter_map(|video| {
                let owner = inner.users.get(&video.owner_id)?;
                Some(WatchedVideo {
                    id: video.id,
                    title: video.title.clone(),
                    description: video.description.clone(),
                    thumbnail: video.thumbnail.clone(),
                    duration_secs: video.duration_secs,
                    views: video.views,
                    created_at: video.created_at,
                    owner_id: owner.id,
                    owner_handle: owner.handle.clone(),
                    owner_full_name: owner.full_name.clone(),
                    owner_avatar: owner.avatar.clone(),
                })
            })
            .collect();
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(handle: &str, email: &str) -> NewUser {
        NewUser {
            handle: handle.into(),
            email: email.into(),
            password_hash: "hash".into(),
            full_name: "Test User".into(),
            avatar: "https://img.local/a.png".into(),
            cover_image: None,
        }
    }

    fn video(owner_id: Uuid, title: &str) -> Video {
        Video {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            description: String::new(),
            thumbnail: format!("https://img.local/{title}.jpg"),
            duration_secs: 60,
            views: 0,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_handle_and_email() {
        let store = MemoryUserStore::new();
        store.create(new_user("alice", "alice@x.com")).await.unwrap();

        let err = store.create(new_user("alice", "other@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("handle")));
        let err = store.create(new_user("bob", "alice@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));
    }

    #[tokio::test]
    async fn find_by_handle_or_email_matches_either() {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice", "alice@x.com")).await.unwrap();

        let by_handle = store.find_by_handle_or_email(Some("alice"), None).await.unwrap();
        let by_email = store
            .find_by_handle_or_email(None, Some("alice@x.com"))
            .await
            .unwrap();
        let none = store.find_by_handle_or_email(None, None).await.unwrap();
        assert_eq!(by_handle.map(|u| u.id), Some(alice.id));
        assert_eq!(by_email.map(|u| u.id), Some(alice.id));
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn token_patch_leaves_other_fields() {
        let store = MemoryUserStore::new();
        let alice = store.create(new_user("alice", "alice@x.com")).await.unwrap();

        let updated = store
            .update_fields(alice.id, UserPatch::refresh_token(Some("tok".into())))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.refresh_token.as_deref(), Some("tok"));
        assert_eq!(updated.email, alice.email);
        assert_eq!(updated.password_hash, alice.password_hash);

        let cleared = store
            .update_fields(alice.id, UserPatch::refresh_token(None))
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.refresh_token.is_none());
    }

    #[tokio::test]
    async fn update_unknown_user_is_none() {
        let store = MemoryUserStore::new();
        let res = store
            .update_fields(Uuid::new_v4(), UserPatch::refresh_token(None))
            .await
            .unwrap();
        assert!(res.is_none());
    }

    #[tokio::test]
    async fn channel_profile_counts_subscriptions() {
        let store = MemoryUserStore::new();
        let chan = store.create(new_user("chan", "chan@x.com")).await.unwrap();
        let a = store.create(new_user("a", "a@x.com")).await.unwrap();
        let b = store.create(new_user("b", "b@x.com")).await.unwrap();
        store.subscribe(a.id, chan.id).await;
        store.subscribe(b.id, chan.id).await;
        store.subscribe(chan.id, a.id).await;

        let seen_by_a = store.channel_profile("chan", a.id).await.unwrap().unwrap();
        assert_eq!(seen_by_a.subscribers_count, 2);
        assert_eq!(seen_by_a.subscribed_to_count, 1);
        assert!(seen_by_a.is_subscribed);

        let seen_by_self = store.channel_profile("chan", chan.id).await.unwrap().unwrap();
        assert!(!seen_by_self.is_subscribed);
        assert!(store.channel_profile("nobody", a.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn watch_history_keeps_order_and_skips_missing() {
        let store = MemoryUserStore::new();
        let owner = store.create(new_user("owner", "owner@x.com")).await.unwrap();
        let viewer = store.create(new_user("viewer", "viewer@x.com")).await.unwrap();
        let first = video(owner.id, "first");
        let second = video(owner.id, "second");
        store.insert_video(first.clone()).await;
        store.insert_video(second.clone()).await;

        assert!(store.push_watch_history(viewer.id, second.id).await);
        assert!(store.push_watch_history(viewer.id, Uuid::new_v4()).await);
        assert!(store.push_watch_history(viewer.id, first.id).await);

        let rows = store.watch_history(viewer.id).await.unwrap();
        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["second", "first"]);
        assert_eq!(rows[0].owner_handle, "owner");
    }
}
