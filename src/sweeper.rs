//! Periodic expiration and archival sweep.
//!
//! The original system only evaluated retention timers when somebody
//! happened to load the dashboard. Here a background task owns them:
//! every tick it classifies candidate records through
//! [`crate::lifecycle::sweep_action`] and applies the verdicts in one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::lifecycle::{sweep_action, SweepAction, SweepRow};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub flagged: usize,
    pub deleted: usize,
}

/// Runs the sweep loop until the shutdown broadcast fires.
pub async fn run_sweeper(pool: PgPool, mut shutdown_rx: broadcast::Receiver<()>) {
    let interval = Duration::from_secs(Config::get().sweep_interval_secs);
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep_once(&pool, Utc::now()).await {
                    Ok(summary) if summary.flagged > 0 || summary.deleted > 0 => {
                        info!(
                            "🧹 Sweep pass: {} flagged expired, {} deleted",
                            summary.flagged, summary.deleted
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!("Sweep pass failed: {e:?}"),
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Sweeper shutting down.");
                break;
            }
        }
    }
}

/// One sweep pass: flag stale completed/rejected records as expired and
/// delete records past their retention windows.
pub async fn sweep_once(pool: &PgPool, now: DateTime<Utc>) -> anyhow::Result<SweepSummary> {
    let mut tx = pool.begin().await?;

    // Only resolved, flagged, or archived rows can be sweep candidates.
    let candidates = sqlx::query_as::<_, SweepRow>(
        r#"
        SELECT id, status, is_expired, archived, archived_at, last_status_update
        FROM requests
        WHERE status IN ('completed', 'rejected') OR is_expired = TRUE OR archived = TRUE
        FOR UPDATE
        "#,
    )
    .fetch_all(&mut *tx)
    .await?;

    let mut to_flag: Vec<Uuid> = Vec::new();
    let mut to_delete: Vec<Uuid> = Vec::new();
    for row in &candidates {
        match sweep_action(row, now) {
            SweepAction::Keep => {}
            SweepAction::MarkExpired => to_flag.push(row.id),
            SweepAction::Delete => to_delete.push(row.id),
        }
    }

    if !to_flag.is_empty() {
        sqlx::query("UPDATE requests SET is_expired = TRUE WHERE id = ANY($1)")
            .bind(&to_flag)
            .execute(&mut *tx)
            .await?;
    }
    if !to_delete.is_empty() {
        sqlx::query("DELETE FROM requests WHERE id = ANY($1)")
            .bind(&to_delete)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(SweepSummary {
        flagged: to_flag.len(),
        deleted: to_delete.len(),
    })
}
