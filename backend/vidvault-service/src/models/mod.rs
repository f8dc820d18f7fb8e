/// Data models for vidvault-service
///
/// This module defines structures for:
/// - Video: upload metadata, visibility and transcoding state
/// - Share / GroupShare: revocable view grants
/// - Team membership roles
/// - Storage credential records and the decrypted credentials built from them
/// - Request and response DTOs for the HTTP surface
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

use crate::services::transcode::JobState;

/// Trim and lowercase an email so comparisons are exact
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// ========================================
// Video Models
// ========================================

/// Transcoding lifecycle: PENDING -> PROCESSING -> {COMPLETED, FAILED}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TranscodingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranscodingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "PRIVATE",
            Self::Public => "PUBLIC",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PRIVATE" => Some(Self::Private),
            "PUBLIC" => Some(Self::Public),
            _ => None,
        }
    }
}

/// Principal that owns a video's storage: the team when the video is
/// attributed to one, the uploader otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoOwner {
    User(Uuid),
    Team(Uuid),
}

/// Video database entity
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Video {
    pub id: Uuid,
    /// Uploader; always set, even for team videos
    pub owner_id: Uuid,
    pub team_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub original_key: String,
    pub output_key_prefix: String,
    pub visibility: String,
    pub transcoding_status: String,
    pub manifest_key: Option<String>,
    pub transcode_job_id: Option<String>,
    pub failure_reason: Option<String>,
    /// Team whose credentials the objects were written with; `None` means
    /// the uploader's personal credentials
    pub storage_team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn status(&self) -> TranscodingStatus {
        TranscodingStatus::from_str(&self.transcoding_status).unwrap_or(TranscodingStatus::Pending)
    }

    pub fn get_visibility(&self) -> Visibility {
        Visibility::from_str(&self.visibility).unwrap_or(Visibility::Private)
    }

    pub fn owner(&self) -> VideoOwner {
        match self.team_id {
            Some(team_id) => VideoOwner::Team(team_id),
            None => VideoOwner::User(self.owner_id),
        }
    }

    /// Credential set holding this video's objects, fixed at upload
    pub fn storage_owner(&self) -> CredentialOwner {
        match self.storage_team_id {
            Some(team_id) => CredentialOwner::Team(team_id),
            None => CredentialOwner::User(self.owner_id),
        }
    }

    /// Manifest key, present only once transcoding completed
    pub fn ready_manifest(&self) -> Option<&str> {
        match self.status() {
            TranscodingStatus::Completed => self.manifest_key.as_deref(),
            _ => None,
        }
    }
}

/// Fields needed to insert a fresh PENDING video
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub team_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub content_type: String,
    pub file_size: i64,
    pub original_key: String,
    pub output_key_prefix: String,
    pub storage_team_id: Option<Uuid>,
}

/// Video response DTO
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub team_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub file_name: String,
    pub visibility: Visibility,
    pub transcoding_status: TranscodingStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Video> for VideoResponse {
    fn from(video: Video) -> Self {
        Self {
            visibility: video.get_visibility(),
            transcoding_status: video.status(),
            id: video.id,
            owner_id: video.owner_id,
            team_id: video.team_id,
            title: video.title,
            description: video.description,
            file_name: video.file_name,
            failure_reason: video.failure_reason,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VideoListResponse {
    pub videos: Vec<VideoResponse>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    #[validate(length(min = 1, max = 255, message = "fileName must be 1-255 characters"))]
    pub file_name: String,
    #[validate(length(min = 1, max = 127, message = "fileType is required"))]
    pub file_type: String,
    pub file_size: i64,
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 5000, message = "description must be at most 5000 characters"))]
    pub description: Option<String>,
    pub team_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub video_id: Uuid,
    pub upload_url: String,
    pub original_key: String,
    pub output_key_prefix: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub video_id: Uuid,
    pub original_key: String,
    pub output_key_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AckResponse {
    pub ack: bool,
    pub transcoding_status: TranscodingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestKeyResponse {
    pub hls_manifest_key: String,
    /// Gateway URL the player should load
    pub stream_url: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVideoRequest {
    #[validate(length(min = 1, max = 200, message = "title must be 1-200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 5000, message = "description must be at most 5000 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VisibilityRequest {
    pub visibility: Visibility,
}

// ========================================
// Sharing Models
// ========================================

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Share {
    pub video_id: Uuid,
    pub email: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GroupShare {
    pub video_id: Uuid,
    pub group_id: Uuid,
    pub group_name: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Group {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Body of share create/revoke: exactly one of `email` or `groupId`
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareRequest {
    pub email: Option<String>,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareTarget {
    Email(String),
    Group(Uuid),
}

impl ShareRequest {
    pub fn target(&self) -> Result<ShareTarget, String> {
        match (&self.email, self.group_id) {
            (Some(email), None) => {
                let email = normalize_email(email);
                if email.as_str().validate_email() {
                    Ok(ShareTarget::Email(email))
                } else {
                    Err("email is not a valid address".to_string())
                }
            }
            (None, Some(group_id)) => Ok(ShareTarget::Group(group_id)),
            (Some(_), Some(_)) => Err("provide either email or groupId, not both".to_string()),
            (None, None) => Err("email or groupId is required".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShareEntry {
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupShareEntry {
    pub group_id: Uuid,
    pub group_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SharesResponse {
    pub emails: Vec<ShareEntry>,
    pub groups: Vec<GroupShareEntry>,
}

// ========================================
// Team Models
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OWNER" => Some(Self::Owner),
            "ADMIN" => Some(Self::Admin),
            "MEMBER" => Some(Self::Member),
            _ => None,
        }
    }

    /// OWNER and ADMIN may manage any team video and the team's credentials
    pub fn can_manage_team(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

// ========================================
// Storage Credential Models
// ========================================

/// Principal a credential record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOwner {
    User(Uuid),
    Team(Uuid),
}

impl CredentialOwner {
    /// Associated data binding a ciphertext to its owning record
    pub fn aad(&self) -> String {
        match self {
            Self::User(id) => format!("user:{}", id),
            Self::Team(id) => format!("team:{}", id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Team(_) => "team",
        }
    }

    pub fn team_id(&self) -> Option<Uuid> {
        match self {
            Self::User(_) => None,
            Self::Team(id) => Some(*id),
        }
    }
}

/// Stored credential row; the secret only exists here as ciphertext
#[derive(Clone, sqlx::FromRow)]
pub struct CredentialRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub team_id: Option<Uuid>,
    pub access_key_id: String,
    pub secret_ciphertext: Vec<u8>,
    pub secret_nonce: Vec<u8>,
    pub key_version: i16,
    pub bucket: String,
    pub region: String,
    pub role_arn: String,
    pub endpoint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn owner(&self) -> CredentialOwner {
        match self.team_id {
            Some(team_id) => CredentialOwner::Team(team_id),
            None => CredentialOwner::User(self.user_id.unwrap_or_default()),
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("id", &self.id)
            .field("owner", &self.owner())
            .field("access_key_id", &self.access_key_id)
            .field("key_version", &self.key_version)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish()
    }
}

/// Decrypted credentials, alive only for the duration of one request
#[derive(Clone)]
pub struct StorageCredentials {
    pub source: CredentialOwner,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub region: String,
    pub role_arn: String,
    pub endpoint: Option<String>,
}

impl fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("source", &self.source)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("role_arn", &self.role_arn)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PutCredentialsRequest {
    #[validate(length(min = 1, max = 128))]
    pub access_key_id: String,
    #[validate(length(min = 1, max = 1024))]
    pub secret_access_key: String,
    #[validate(length(min = 3, max = 63))]
    pub bucket: String,
    #[validate(length(min = 1, max = 64))]
    pub region: String,
    #[validate(length(min = 1, max = 2048))]
    pub role_arn: String,
    #[validate(url)]
    pub endpoint: Option<String>,
}

impl fmt::Debug for PutCredentialsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutCredentialsRequest")
            .field("access_key_id", &self.access_key_id)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Credential metadata returned to the owner; never carries the secret
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub owner: String,
    pub access_key_id: String,
    pub bucket: String,
    pub region: String,
    pub role_arn: String,
    pub endpoint: Option<String>,
    pub key_version: i16,
    pub updated_at: DateTime<Utc>,
}

impl From<&CredentialRecord> for CredentialSummary {
    fn from(record: &CredentialRecord) -> Self {
        Self {
            owner: record.owner().kind().to_string(),
            access_key_id: record.access_key_id.clone(),
            bucket: record.bucket.clone(),
            region: record.region.clone(),
            role_arn: record.role_arn.clone(),
            endpoint: record.endpoint.clone(),
            key_version: record.key_version,
            updated_at: record.updated_at,
        }
    }
}

// ========================================
// Transcode Webhook Models
// ========================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobEventRequest {
    pub state: JobState,
    pub output_manifest_key: Option<String>,
    pub failure_reason: Option<String>,
}
