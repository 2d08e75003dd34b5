// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users and encrypted OAuth tokens
//! - Activities and their best efforts
//! - Personal records (replaced as a set)
//! - Recommendations, training settings, monthly goals and sync state

use chrono::{DateTime, Utc};

use crate::db::collections;
use crate::error::AppError;
use crate::models::records::{record_doc_id, stale_buckets};
use crate::models::settings::goal_doc_id;
use crate::models::{
    superseded_efforts, Activity, BestEffort, DateRange, MonthlyGoal, PersonalRecord,
    Recommendation, SyncState, TrainingSettings, User, UserTokens,
};
use crate::time_utils::format_utc_rfc3339;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

fn db_err(e: impl std::fmt::Display) -> AppError {
    AppError::Database(e.to_string())
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator takes no credentials; skip the ADC lookup entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn get_doc<T>(&self, collection: &str, doc_id: &str) -> Result<Option<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(doc_id)
            .await
            .map_err(db_err)
    }

    async fn set_doc<T>(&self, collection: &str, doc_id: &str, doc: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + serde::de::DeserializeOwned + Send + Sync,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(doc_id)
            .object(doc)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, doc_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(doc_id)
            .execute()
            .await
            .map_err(db_err)
    }

    /// All documents of `collection` owned by `athlete_id`.
    async fn query_by_athlete<T>(&self, collection: &str, athlete_id: u64) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(|q| q.for_all([q.field("athlete_id").eq(athlete_id)]))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their Strava athlete ID.
    pub async fn get_user(&self, athlete_id: u64) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, &athlete_id.to_string())
            .await
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.set_doc(
            collections::USERS,
            &user.strava_athlete_id.to_string(),
            user,
        )
        .await
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get encrypted tokens for a user.
    pub async fn get_tokens(&self, athlete_id: u64) -> Result<Option<UserTokens>, AppError> {
        self.get_doc(collections::TOKENS, &athlete_id.to_string())
            .await
    }

    /// Store encrypted tokens for a user.
    pub async fn set_tokens(&self, athlete_id: u64, tokens: &UserTokens) -> Result<(), AppError> {
        self.set_doc(collections::TOKENS, &athlete_id.to_string(), tokens)
            .await
    }

    /// Delete tokens (for deauthorization).
    pub async fn delete_tokens(&self, athlete_id: u64) -> Result<(), AppError> {
        self.delete_doc(collections::TOKENS, &athlete_id.to_string())
            .await
    }

    // ─── Activity Operations ─────────────────────────────────────

    /// Get an activity by Strava ID.
    pub async fn get_activity(&self, activity_id: u64) -> Result<Option<Activity>, AppError> {
        self.get_doc(collections::ACTIVITIES, &activity_id.to_string())
            .await
    }

    /// Get activities for a user, newest first, with pagination.
    pub async fn get_activities_for_user(
        &self,
        athlete_id: u64,
        after: Option<DateTime<Utc>>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Activity>, AppError> {
        let query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES);

        let query = if let Some(after) = after {
            let after = format_utc_rfc3339(after);
            query.filter(move |q| {
                q.for_all([
                    q.field("athlete_id").eq(athlete_id),
                    q.field("start_date").greater_than(after.clone()),
                ])
            })
        } else {
            query.filter(move |q| q.field("athlete_id").eq(athlete_id))
        };

        query
            .order_by([("start_date", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .offset(offset)
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    /// Every stored activity of a user. Statistics are computed from this.
    pub async fn get_all_activities(&self, athlete_id: u64) -> Result<Vec<Activity>, AppError> {
        self.query_by_athlete(collections::ACTIVITIES, athlete_id)
            .await
    }

    /// Activities whose start falls in `range`, oldest first.
    pub async fn get_activities_in_range(
        &self,
        athlete_id: u64,
        range: &DateRange,
    ) -> Result<Vec<Activity>, AppError> {
        let start = format_utc_rfc3339(range.start);
        let end = format_utc_rfc3339(range.end);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .filter(move |q| {
                q.for_all([
                    q.field("athlete_id").eq(athlete_id),
                    q.field("start_date").greater_than_or_equal(start.clone()),
                    q.field("start_date").less_than(end.clone()),
                ])
            })
            .order_by([("start_date", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    /// Store an activity as-is (used for user annotations).
    pub async fn set_activity(&self, activity: &Activity) -> Result<(), AppError> {
        self.set_doc(
            collections::ACTIVITIES,
            &activity.strava_activity_id.to_string(),
            activity,
        )
        .await
    }

    /// Write a freshly synced activity together with its best efforts.
    ///
    /// User annotations (effort rating, notes) on an already stored copy
    /// survive the overwrite. With `Some(efforts)`, the best efforts stored
    /// for this activity are replaced, all in one transaction. With `None`
    /// (summary-only sync) they are left untouched.
    pub async fn upsert_synced_activity(
        &self,
        activity: &Activity,
        best_efforts: Option<&[BestEffort]>,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let activity_id = activity.strava_activity_id;

        let mut activity = activity.clone();
        if let Some(existing) = self.get_activity(activity_id).await? {
            activity.keep_annotations_from(&existing);
        }

        let stored_efforts = match best_efforts {
            Some(_) => self.get_best_efforts_for_activity(activity_id).await?,
            None => vec![],
        };

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .document_id(activity_id.to_string())
            .object(&activity)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add activity to transaction: {}", e))
            })?;

        for old in superseded_efforts(&stored_efforts, best_efforts) {
            client
                .fluent()
                .delete()
                .from(collections::BEST_EFFORTS)
                .document_id(old.best_effort_id.to_string())
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add deletion to transaction: {}", e))
                })?;
        }

        for effort in best_efforts.unwrap_or_default() {
            client
                .fluent()
                .update()
                .in_col(collections::BEST_EFFORTS)
                .document_id(effort.best_effort_id.to_string())
                .object(effort)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add best effort to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            athlete_id = activity.athlete_id,
            activity_id,
            best_efforts = best_efforts.map(<[BestEffort]>::len),
            "Activity stored"
        );

        Ok(())
    }

    /// Delete an activity, its best efforts, and release the recommendations
    /// that pointed at it, atomically.
    ///
    /// `released` holds the already-unlinked recommendations to write back.
    /// Personal records must be recomputed by the caller afterwards.
    pub async fn delete_activity_cascade(
        &self,
        activity_id: u64,
        released: &[Recommendation],
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let efforts = self.get_best_efforts_for_activity(activity_id).await?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .delete()
            .from(collections::ACTIVITIES)
            .document_id(activity_id.to_string())
            .add_to_transaction(&mut transaction)
            .map_err(db_err)?;

        for effort in &efforts {
            client
                .fluent()
                .delete()
                .from(collections::BEST_EFFORTS)
                .document_id(effort.best_effort_id.to_string())
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        for rec in released {
            client
                .fluent()
                .update()
                .in_col(collections::RECOMMENDATIONS)
                .document_id(&rec.id)
                .object(rec)
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            activity_id,
            best_efforts = efforts.len(),
            recommendations = released.len(),
            "Activity deleted"
        );

        Ok(())
    }

    // ─── Best Effort Operations ──────────────────────────────────

    pub async fn get_best_efforts_for_activity(
        &self,
        activity_id: u64,
    ) -> Result<Vec<BestEffort>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::BEST_EFFORTS)
            .filter(|q| q.for_all([q.field("activity_id").eq(activity_id)]))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    pub async fn get_best_efforts_for_user(
        &self,
        athlete_id: u64,
    ) -> Result<Vec<BestEffort>, AppError> {
        self.query_by_athlete(collections::BEST_EFFORTS, athlete_id)
            .await
    }

    // ─── Personal Record Operations ──────────────────────────────

    /// Current records, shortest distance first.
    pub async fn get_personal_records(
        &self,
        athlete_id: u64,
    ) -> Result<Vec<PersonalRecord>, AppError> {
        let mut records: Vec<PersonalRecord> = self
            .query_by_athlete(collections::PERSONAL_RECORDS, athlete_id)
            .await?;
        records.sort_by(|a, b| a.distance_meters.total_cmp(&b.distance_meters));
        Ok(records)
    }

    /// Swap in a freshly computed record set.
    ///
    /// Buckets absent from `records` are deleted and the rest overwritten in
    /// a single transaction, so readers never see an empty or partial set.
    pub async fn replace_personal_records(
        &self,
        athlete_id: u64,
        records: &[PersonalRecord],
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let current = self.get_personal_records(athlete_id).await?;
        let stale = stale_buckets(&current, records);

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for bucket in &stale {
            client
                .fluent()
                .delete()
                .from(collections::PERSONAL_RECORDS)
                .document_id(record_doc_id(athlete_id, bucket))
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        for record in records {
            client
                .fluent()
                .update()
                .in_col(collections::PERSONAL_RECORDS)
                .document_id(record.doc_id())
                .object(record)
                .add_to_transaction(&mut transaction)
                .map_err(db_err)?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            athlete_id,
            records = records.len(),
            removed = stale.len(),
            "Personal records replaced"
        );

        Ok(())
    }

    // ─── Recommendation Operations ───────────────────────────────

    pub async fn get_recommendation(&self, id: &str) -> Result<Option<Recommendation>, AppError> {
        self.get_doc(collections::RECOMMENDATIONS, id).await
    }

    /// All recommendations of a user, latest planned date first.
    pub async fn get_recommendations(
        &self,
        athlete_id: u64,
    ) -> Result<Vec<Recommendation>, AppError> {
        let mut recs: Vec<Recommendation> = self
            .query_by_athlete(collections::RECOMMENDATIONS, athlete_id)
            .await?;
        recs.sort_by(|a, b| {
            b.planned_date
                .cmp(&a.planned_date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(recs)
    }

    /// Recommendations linked to an activity.
    pub async fn get_recommendations_for_activity(
        &self,
        activity_id: u64,
    ) -> Result<Vec<Recommendation>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RECOMMENDATIONS)
            .filter(|q| q.for_all([q.field("matched_activity_id").eq(activity_id)]))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    pub async fn set_recommendation(&self, rec: &Recommendation) -> Result<(), AppError> {
        self.set_doc(collections::RECOMMENDATIONS, &rec.id, rec)
            .await
    }

    /// Write several recommendations atomically.
    pub async fn set_recommendations(&self, recs: &[Recommendation]) -> Result<(), AppError> {
        if recs.is_empty() {
            return Ok(());
        }
        let client = self.get_client()?;

        for chunk in recs.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for rec in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::RECOMMENDATIONS)
                    .document_id(&rec.id)
                    .object(rec)
                    .add_to_transaction(&mut transaction)
                    .map_err(db_err)?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        }

        Ok(())
    }

    // ─── Settings, Goals, Sync State ─────────────────────────────

    pub async fn get_settings(
        &self,
        athlete_id: u64,
    ) -> Result<Option<TrainingSettings>, AppError> {
        self.get_doc(collections::TRAINING_SETTINGS, &athlete_id.to_string())
            .await
    }

    pub async fn set_settings(&self, settings: &TrainingSettings) -> Result<(), AppError> {
        self.set_doc(
            collections::TRAINING_SETTINGS,
            &settings.athlete_id.to_string(),
            settings,
        )
        .await
    }

    pub async fn get_goal(
        &self,
        athlete_id: u64,
        month: &str,
    ) -> Result<Option<MonthlyGoal>, AppError> {
        self.get_doc(collections::MONTHLY_GOALS, &goal_doc_id(athlete_id, month))
            .await
    }

    pub async fn set_goal(&self, goal: &MonthlyGoal) -> Result<(), AppError> {
        self.set_doc(collections::MONTHLY_GOALS, &goal.doc_id(), goal)
            .await
    }

    pub async fn get_sync_state(&self, athlete_id: u64) -> Result<Option<SyncState>, AppError> {
        self.get_doc(collections::SYNC_STATE, &athlete_id.to_string())
            .await
    }

    pub async fn set_sync_state(&self, state: &SyncState) -> Result<(), AppError> {
        self.set_doc(
            collections::SYNC_STATE,
            &state.athlete_id.to_string(),
            state,
        )
        .await
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    // ─── User Data Deletion ────────────────────────────────────────

    /// Delete ALL data for a user.
    ///
    /// Tokens should be deleted separately by the caller after using them
    /// for Strava deauthorization.
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, athlete_id: u64) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        let efforts: Vec<BestEffort> = self.get_best_efforts_for_user(athlete_id).await?;
        self.batch_delete(&efforts, collections::BEST_EFFORTS, |e| {
            e.best_effort_id.to_string()
        })
        .await?;
        deleted_count += efforts.len();

        let records: Vec<PersonalRecord> = self
            .query_by_athlete(collections::PERSONAL_RECORDS, athlete_id)
            .await?;
        self.batch_delete(&records, collections::PERSONAL_RECORDS, |r| r.doc_id())
            .await?;
        deleted_count += records.len();

        let recs: Vec<Recommendation> = self
            .query_by_athlete(collections::RECOMMENDATIONS, athlete_id)
            .await?;
        self.batch_delete(&recs, collections::RECOMMENDATIONS, |r| r.id.clone())
            .await?;
        deleted_count += recs.len();

        let goals: Vec<MonthlyGoal> = self
            .query_by_athlete(collections::MONTHLY_GOALS, athlete_id)
            .await?;
        self.batch_delete(&goals, collections::MONTHLY_GOALS, |g| g.doc_id())
            .await?;
        deleted_count += goals.len();

        let activities: Vec<Activity> = self.get_all_activities(athlete_id).await?;
        self.batch_delete(&activities, collections::ACTIVITIES, |a| {
            a.strava_activity_id.to_string()
        })
        .await?;
        deleted_count += activities.len();
        tracing::debug!(athlete_id, count = activities.len(), "Deleted activities");

        for collection in [
            collections::TRAINING_SETTINGS,
            collections::SYNC_STATE,
            collections::USERS,
        ] {
            self.delete_doc(collection, &athlete_id.to_string()).await?;
            deleted_count += 1;
        }

        tracing::info!(athlete_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
