//! MongoDB Index Initialization
//!
//! Creates indexes for all collections on application startup.

use mongodb::{bson::doc, options::IndexOptions, Database, IndexModel};
use tracing::info;

use crate::identity::repository::IDENTITIES_COLLECTION;
use crate::session::repository::SESSIONS_COLLECTION;
use crate::user::repository::USERS_COLLECTION;

/// Initialize all MongoDB indexes
pub async fn initialize_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    info!("Initializing MongoDB indexes...");

    create_user_indexes(db).await?;
    create_identity_indexes(db).await?;
    create_session_indexes(db).await?;

    info!("MongoDB indexes initialized successfully");
    Ok(())
}

async fn create_user_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let collection = db.collection::<mongodb::bson::Document>(USERS_COLLECTION);

    // Concurrent signups for one email resolve to a single winner here
    collection
        .create_index(
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(IndexOptions::builder().unique(true).background(true).build())
                .build(),
        )
        .await?;

    Ok(())
}

async fn create_identity_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let collection = db.collection::<mongodb::bson::Document>(IDENTITIES_COLLECTION);

    // One identity per provider per user
    collection
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1, "provider": 1 })
                .options(IndexOptions::builder().unique(true).background(true).build())
                .build(),
        )
        .await?;

    // Provider lookup; local credentials all share an empty provider_id
    collection
        .create_index(
            IndexModel::builder()
                .keys(doc! { "provider_id": 1, "provider": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    Ok(())
}

async fn create_session_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    let collection = db.collection::<mongodb::bson::Document>(SESSIONS_COLLECTION);

    collection
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1 })
                .options(IndexOptions::builder().background(true).build())
                .build(),
        )
        .await?;

    Ok(())
}
