/// Database access layer
///
/// This module provides the Video Record Store: free async functions over a
/// shared `PgPool`, one repository module per table family.
pub mod credential_repo;
pub mod group_repo;
pub mod share_repo;
pub mod team_repo;
pub mod user_repo;
pub mod video_repo;
