//! Post repository for database operations.
//!
//! Writes run inside an explicit transaction; a dropped transaction rolls back.

use chrono::Utc;
use pixfeed_core::post::{FileType, NewPost, Post, PostError, PostRepository as PostRepoTrait};
use pixfeed_shared::{PostId, UserId};
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set, TransactionTrait,
};

use crate::entities::posts;

/// Post repository implementation.
#[derive(Debug, Clone)]
pub struct PostRepository {
    db: DatabaseConnection,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn repo_err(e: impl std::fmt::Display) -> PostError {
    PostError::repository(e.to_string())
}

impl PostRepoTrait for PostRepository {
    async fn create(&self, input: NewPost) -> Result<Post, PostError> {
        let txn = self.db.begin().await.map_err(repo_err)?;

        let active_model = posts::ActiveModel {
            id: Set(input.id.into_inner()),
            user_id: Set(input.user_id.into_inner()),
            caption: Set(input.caption),
            url: Set(input.url),
            file_type: Set(input.file_type.as_str().to_string()),
            file_name: Set(input.file_name),
            created_at: Set(Utc::now().into()),
        };
        let inserted = active_model.insert(&txn).await.map_err(repo_err)?;

        // Reload inside the transaction: any error below leaves nothing committed.
        let model = posts::Entity::find_by_id(inserted.id)
            .one(&txn)
            .await
            .map_err(repo_err)?
            .ok_or_else(|| PostError::repository("post missing after insert"))?;
        let post = to_domain(model)?;

        txn.commit().await.map_err(repo_err)?;
        Ok(post)
    }

    async fn list_newest_first(&self) -> Result<Vec<Post>, PostError> {
        let models = posts::Entity::find()
            .order_by_desc(posts::Column::CreatedAt)
            .order_by_desc(posts::Column::Id)
            .all(&self.db)
            .await
            .map_err(repo_err)?;

        models.into_iter().map(to_domain).collect()
    }

    async fn find_by_id(&self, id: PostId) -> Result<Option<Post>, PostError> {
        let model = posts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(repo_err)?;

        model.map(to_domain).transpose()
    }

    async fn delete(&self, id: PostId) -> Result<bool, PostError> {
        let txn = self.db.begin().await.map_err(repo_err)?;

        let result = posts::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(repo_err)?;
        txn.commit().await.map_err(repo_err)?;

        Ok(result.rows_affected > 0)
    }
}

/// Convert database model to domain model.
fn to_domain(model: posts::Model) -> Result<Post, PostError> {
    let file_type = FileType::parse(&model.file_type).ok_or_else(|| {
        PostError::repository(format!("unknown file type in post {}: {}", model.id, model.file_type))
    })?;

    Ok(Post {
        id: PostId::from_uuid(model.id),
        user_id: UserId::from_uuid(model.user_id),
        caption: model.caption,
        url: model.url,
        file_type,
        file_name: model.file_name,
        created_at: model.created_at.with_timezone(&Utc),
    })
}
