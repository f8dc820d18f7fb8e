/// Access Control Evaluator
///
/// View access is the OR of a closed set of grants ([`ViewGrant`]), each
/// checked independently against live data. Management access is narrower:
/// the uploader, or an OWNER/ADMIN of the video's team. Nothing here caches;
/// every request re-reads shares and memberships so revocations apply to the
/// very next request.
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::db::{share_repo, team_repo, user_repo};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::middleware::AuthUser;
use crate::models::{normalize_email, TeamRole, Video, Visibility};

/// Data the evaluator needs, abstracted so decisions can be tested without
/// a database
#[async_trait]
pub trait AccessFacts: Send + Sync {
    async fn owner_email(&self, owner_id: Uuid) -> Result<Option<String>>;

    async fn has_direct_share(&self, video_id: Uuid, email: &str) -> Result<bool>;

    /// Whether any group shared with the video currently contains `email`
    async fn in_shared_group(&self, video_id: Uuid, email: &str) -> Result<bool>;

    async fn is_team_member_email(&self, team_id: Uuid, email: &str) -> Result<bool>;

    async fn team_role(&self, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamRole>>;
}

pub struct PgAccessFacts {
    pool: PgPool,
}

impl PgAccessFacts {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccessFacts for PgAccessFacts {
    async fn owner_email(&self, owner_id: Uuid) -> Result<Option<String>> {
        Ok(user_repo::get_email(&self.pool, owner_id).await?)
    }

    async fn has_direct_share(&self, video_id: Uuid, email: &str) -> Result<bool> {
        Ok(share_repo::has_share(&self.pool, video_id, email).await?)
    }

    async fn in_shared_group(&self, video_id: Uuid, email: &str) -> Result<bool> {
        Ok(share_repo::in_shared_group(&self.pool, video_id, email).await?)
    }

    async fn is_team_member_email(&self, team_id: Uuid, email: &str) -> Result<bool> {
        Ok(team_repo::is_member_email(&self.pool, team_id, email).await?)
    }

    async fn team_role(&self, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamRole>> {
        Ok(team_repo::member_role(&self.pool, team_id, user_id).await?)
    }
}

/// Who is asking to view. Anonymous viewers carry neither field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_email(email: &str) -> Self {
        Self {
            user_id: None,
            email: Some(normalize_email(email)),
        }
    }

    pub fn from_auth(user: Option<&AuthUser>) -> Self {
        match user {
            Some(user) => Self {
                user_id: Some(user.user_id),
                email: Some(normalize_email(&user.email)),
            },
            None => Self::anonymous(),
        }
    }
}

/// Independent sources of view access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewGrant {
    Public,
    Owner,
    DirectShare,
    GroupShare,
    TeamMembership,
}

impl ViewGrant {
    /// Cheapest checks first; order never changes the outcome
    pub const ALL: [ViewGrant; 5] = [
        ViewGrant::Public,
        ViewGrant::Owner,
        ViewGrant::DirectShare,
        ViewGrant::GroupShare,
        ViewGrant::TeamMembership,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Owner => "owner",
            Self::DirectShare => "direct_share",
            Self::GroupShare => "group_share",
            Self::TeamMembership => "team_membership",
        }
    }

    /// Whether this grant alone lets `viewer` see `video`
    pub async fn applies(
        &self,
        facts: &dyn AccessFacts,
        viewer: &Viewer,
        video: &Video,
    ) -> Result<bool> {
        match self {
            ViewGrant::Public => Ok(video.get_visibility() == Visibility::Public),
            ViewGrant::Owner => {
                if viewer.user_id == Some(video.owner_id) {
                    return Ok(true);
                }
                match &viewer.email {
                    Some(email) => Ok(facts
                        .owner_email(video.owner_id)
                        .await?
                        .map(|owner| normalize_email(&owner) == *email)
                        .unwrap_or(false)),
                    None => Ok(false),
                }
            }
            ViewGrant::DirectShare => match &viewer.email {
                Some(email) => facts.has_direct_share(video.id, email).await,
                None => Ok(false),
            },
            ViewGrant::GroupShare => match &viewer.email {
                Some(email) => facts.in_shared_group(video.id, email).await,
                None => Ok(false),
            },
            ViewGrant::TeamMembership => match (video.team_id, &viewer.email) {
                (Some(team_id), Some(email)) => facts.is_team_member_email(team_id, email).await,
                _ => Ok(false),
            },
        }
    }
}

/// First grant that lets `viewer` see `video`, if any
pub async fn view_grant(
    facts: &dyn AccessFacts,
    viewer: &Viewer,
    video: &Video,
) -> Result<Option<ViewGrant>> {
    for grant in ViewGrant::ALL {
        if grant.applies(facts, viewer, video).await? {
            return Ok(Some(grant));
        }
    }
    Ok(None)
}

pub async fn can_view(facts: &dyn AccessFacts, viewer: &Viewer, video: &Video) -> Result<bool> {
    Ok(view_grant(facts, viewer, video).await?.is_some())
}

/// Edit, delete, share and visibility changes. Never implied by view access.
pub async fn can_manage(facts: &dyn AccessFacts, actor_id: Uuid, video: &Video) -> Result<bool> {
    if video.owner_id == actor_id {
        return Ok(true);
    }
    match video.team_id {
        Some(team_id) => Ok(facts
            .team_role(team_id, actor_id)
            .await?
            .map(|role| role.can_manage_team())
            .unwrap_or(false)),
        None => Ok(false),
    }
}

/// Deny view access as NotFound so private ids cannot be probed
pub async fn require_view(facts: &dyn AccessFacts, viewer: &Viewer, video: &Video) -> Result<()> {
    match view_grant(facts, viewer, video).await? {
        Some(grant) => {
            debug!(video_id = %video.id, grant = grant.as_str(), "view allowed");
            Ok(())
        }
        None => {
            metrics::ACCESS_DENIALS.with_label_values(&["view"]).inc();
            Err(AppError::NotFound("video not found".to_string()))
        }
    }
}

/// Deny management as Forbidden when the actor can already see the video,
/// NotFound otherwise
pub async fn require_manage(facts: &dyn AccessFacts, actor: &AuthUser, video: &Video) -> Result<()> {
    if can_manage(facts, actor.user_id, video).await? {
        return Ok(());
    }

    metrics::ACCESS_DENIALS.with_label_values(&["manage"]).inc();
    if can_view(facts, &Viewer::from_auth(Some(actor)), video).await? {
        Err(AppError::Forbidden(
            "only the owner or a team admin can manage this video".to_string(),
        ))
    } else {
        Err(AppError::NotFound("video not found".to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::RwLock;

    /// In-memory access data for decision tests
    #[derive(Default)]
    pub struct MemoryFacts {
        pub emails: RwLock<HashMap<Uuid, String>>,
        pub shares: RwLock<HashSet<(Uuid, String)>>,
        /// group id -> member emails
        pub groups: RwLock<HashMap<Uuid, HashSet<String>>>,
        pub group_shares: RwLock<HashSet<(Uuid, Uuid)>>,
        pub team_members: RwLock<HashMap<(Uuid, Uuid), TeamRole>>,
    }

    impl MemoryFacts {
        pub fn add_user(&self, id: Uuid, email: &str) {
            self.emails.write().unwrap().insert(id, normalize_email(email));
        }

        pub fn share(&self, video_id: Uuid, email: &str) {
            self.shares
                .write()
                .unwrap()
                .insert((video_id, normalize_email(email)));
        }

        pub fn revoke(&self, video_id: Uuid, email: &str) {
            self.shares
                .write()
                .unwrap()
                .remove(&(video_id, normalize_email(email)));
        }

        pub fn add_group_member(&self, group_id: Uuid, email: &str) {
            self.groups
                .write()
                .unwrap()
                .entry(group_id)
                .or_default()
                .insert(normalize_email(email));
        }

        pub fn remove_group_member(&self, group_id: Uuid, email: &str) {
            if let Some(members) = self.groups.write().unwrap().get_mut(&group_id) {
                members.remove(&normalize_email(email));
            }
        }

        pub fn share_group(&self, video_id: Uuid, group_id: Uuid) {
            self.group_shares
                .write()
                .unwrap()
                .insert((video_id, group_id));
        }

        pub fn add_team_member(&self, team_id: Uuid, user_id: Uuid, role: TeamRole) {
            self.team_members
                .write()
                .unwrap()
                .insert((team_id, user_id), role);
        }
    }

    #[async_trait]
    impl AccessFacts for MemoryFacts {
        async fn owner_email(&self, owner_id: Uuid) -> Result<Option<String>> {
            Ok(self.emails.read().unwrap().get(&owner_id).cloned())
        }

        async fn has_direct_share(&self, video_id: Uuid, email: &str) -> Result<bool> {
            Ok(self
                .shares
                .read()
                .unwrap()
                .contains(&(video_id, email.to_string())))
        }

        async fn in_shared_group(&self, video_id: Uuid, email: &str) -> Result<bool> {
            let groups = self.groups.read().unwrap();
            Ok(self
                .group_shares
                .read()
                .unwrap()
                .iter()
                .filter(|(v, _)| *v == video_id)
                .any(|(_, g)| groups.get(g).map(|m| m.contains(email)).unwrap_or(false)))
        }

        async fn is_team_member_email(&self, team_id: Uuid, email: &str) -> Result<bool> {
            let emails = self.emails.read().unwrap();
            Ok(self
                .team_members
                .read()
                .unwrap()
                .keys()
                .filter(|(t, _)| *t == team_id)
                .any(|(_, user)| emails.get(user).map(|e| e == email).unwrap_or(false)))
        }

        async fn team_role(&self, team_id: Uuid, user_id: Uuid) -> Result<Option<TeamRole>> {
            Ok(self
                .team_members
                .read()
                .unwrap()
                .get(&(team_id, user_id))
                .copied())
        }
    }

    pub fn video(owner_id: Uuid, team_id: Option<Uuid>) -> Video {
        let id = Uuid::new_v4();
        Video {
            id,
            owner_id,
            team_id,
            title: "Demo".into(),
            description: None,
            file_name: "video.mp4".into(),
            content_type: "video/mp4".into(),
            file_size: 524_288_000,
            original_key: format!("users/{owner_id}/videos/{id}/original/video.mp4"),
            output_key_prefix: format!("users/{owner_id}/videos/{id}/hls/"),
            visibility: "PRIVATE".into(),
            transcoding_status: "COMPLETED".into(),
            manifest_key: Some(format!("users/{owner_id}/videos/{id}/hls/master.m3u8")),
            transcode_job_id: Some("job-1".into()),
            failure_reason: None,
            storage_team_id: team_id,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    pub fn auth(user_id: Uuid, email: &str) -> AuthUser {
        AuthUser {
            user_id,
            email: normalize_email(email),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const OWNER_EMAIL: &str = "owner@example.com";

    fn setup() -> (MemoryFacts, Uuid, Video) {
        let facts = MemoryFacts::default();
        let owner = Uuid::new_v4();
        facts.add_user(owner, OWNER_EMAIL);
        let v = video(owner, None);
        (facts, owner, v)
    }

    #[tokio::test]
    async fn private_video_denies_strangers_and_anonymous() {
        let (facts, _, v) = setup();
        assert!(!can_view(&facts, &Viewer::with_email("mallory@example.com"), &v)
            .await
            .unwrap());
        assert!(!can_view(&facts, &Viewer::anonymous(), &v).await.unwrap());
    }

    #[tokio::test]
    async fn owner_matches_by_id_or_email() {
        let (facts, owner, v) = setup();
        let by_id = Viewer {
            user_id: Some(owner),
            email: None,
        };
        assert_eq!(
            view_grant(&facts, &by_id, &v).await.unwrap(),
            Some(ViewGrant::Owner)
        );
        assert!(can_view(&facts, &Viewer::with_email(" Owner@Example.com "), &v)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn public_allows_anyone_to_view_but_not_manage() {
        let (facts, _, mut v) = setup();
        v.visibility = "PUBLIC".into();
        let stranger = auth(Uuid::new_v4(), "stranger@example.com");

        assert!(can_view(&facts, &Viewer::anonymous(), &v).await.unwrap());
        assert!(!can_manage(&facts, stranger.user_id, &v).await.unwrap());
        assert!(matches!(
            require_manage(&facts, &stranger, &v).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn share_then_revoke_takes_effect_immediately() {
        let (facts, _, v) = setup();
        let alice = Viewer::with_email("alice@example.com");

        facts.share(v.id, "alice@example.com");
        assert_eq!(
            view_grant(&facts, &alice, &v).await.unwrap(),
            Some(ViewGrant::DirectShare)
        );

        facts.revoke(v.id, "alice@example.com");
        assert!(!can_view(&facts, &alice, &v).await.unwrap());
        assert!(matches!(
            require_view(&facts, &alice, &v).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn group_membership_is_resolved_at_evaluation_time() {
        let (facts, _, v) = setup();
        let group = Uuid::new_v4();
        let bob = Viewer::with_email("bob@example.com");

        facts.share_group(v.id, group);
        assert!(!can_view(&facts, &bob, &v).await.unwrap());

        facts.add_group_member(group, "bob@example.com");
        assert_eq!(
            view_grant(&facts, &bob, &v).await.unwrap(),
            Some(ViewGrant::GroupShare)
        );

        facts.remove_group_member(group, "bob@example.com");
        assert!(!can_view(&facts, &bob, &v).await.unwrap());
    }

    #[tokio::test]
    async fn team_members_can_view_team_videos() {
        let facts = MemoryFacts::default();
        let team = Uuid::new_v4();
        let uploader = Uuid::new_v4();
        let teammate = Uuid::new_v4();
        facts.add_user(uploader, "uploader@example.com");
        facts.add_user(teammate, "teammate@example.com");
        facts.add_team_member(team, uploader, TeamRole::Member);
        facts.add_team_member(team, teammate, TeamRole::Member);
        let v = video(uploader, Some(team));

        assert_eq!(
            view_grant(&facts, &Viewer::with_email("teammate@example.com"), &v)
                .await
                .unwrap(),
            Some(ViewGrant::TeamMembership)
        );
    }

    #[tokio::test]
    async fn team_roles_gate_management() {
        let facts = MemoryFacts::default();
        let team = Uuid::new_v4();
        let uploader = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let other_member = Uuid::new_v4();
        facts.add_user(uploader, "uploader@example.com");
        facts.add_user(admin, "admin@example.com");
        facts.add_user(other_member, "member@example.com");
        facts.add_team_member(team, uploader, TeamRole::Member);
        facts.add_team_member(team, admin, TeamRole::Admin);
        facts.add_team_member(team, other_member, TeamRole::Member);
        let v = video(uploader, Some(team));

        assert!(can_manage(&facts, uploader, &v).await.unwrap());
        assert!(can_manage(&facts, admin, &v).await.unwrap());
        assert!(!can_manage(&facts, other_member, &v).await.unwrap());

        // A teammate can see the video, so the refusal is explicit
        assert!(matches!(
            require_manage(&facts, &auth(other_member, "member@example.com"), &v).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn management_denial_conceals_private_videos() {
        let (facts, _, v) = setup();
        let stranger = auth(Uuid::new_v4(), "stranger@example.com");
        assert!(matches!(
            require_manage(&facts, &stranger, &v).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn shares_never_grant_management() {
        let (facts, _, v) = setup();
        let alice = Uuid::new_v4();
        facts.add_user(alice, "alice@example.com");
        facts.share(v.id, "alice@example.com");

        assert!(can_view(&facts, &Viewer::with_email("alice@example.com"), &v)
            .await
            .unwrap());
        assert!(!can_manage(&facts, alice, &v).await.unwrap());
    }

    #[tokio::test]
    async fn adding_grants_never_revokes_existing_access() {
        let (facts, _, v) = setup();
        let group = Uuid::new_v4();
        let viewers = [
            Viewer::with_email(OWNER_EMAIL),
            Viewer::with_email("alice@example.com"),
            Viewer::with_email("bob@example.com"),
            Viewer::with_email("carol@example.com"),
        ];

        let mut before = Vec::new();
        facts.share(v.id, "alice@example.com");
        for viewer in &viewers {
            before.push(can_view(&facts, viewer, &v).await.unwrap());
        }

        facts.share_group(v.id, group);
        facts.add_group_member(group, "bob@example.com");
        facts.share(v.id, "dave@example.com");

        for (viewer, was_allowed) in viewers.iter().zip(before) {
            let now = can_view(&facts, viewer, &v).await.unwrap();
            assert!(!was_allowed || now, "grant removed access for {:?}", viewer);
        }
    }

    #[tokio::test]
    async fn visibility_round_trip_restores_private_semantics() {
        let (facts, _, mut v) = setup();
        facts.share(v.id, "alice@example.com");
        let alice = Viewer::with_email("alice@example.com");
        let stranger = Viewer::with_email("stranger@example.com");

        v.visibility = "PUBLIC".into();
        assert!(can_view(&facts, &stranger, &v).await.unwrap());

        v.visibility = "PRIVATE".into();
        assert!(can_view(&facts, &alice, &v).await.unwrap());
        assert!(can_view(&facts, &Viewer::with_email(OWNER_EMAIL), &v)
            .await
            .unwrap());
        assert!(!can_view(&facts, &stranger, &v).await.unwrap());
    }
}
