//! Sample dataset loader, reachable through `POST /admin/seed`.

use anyhow::Context;
use bcrypt::{hash, DEFAULT_COST};
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::models::request::{RequestKind, RequestStatus};

/// Every seeded account logs in with this password.
const SEED_PASSWORD: &str = "password123";

struct SeedRequest {
    title: &'static str,
    description: &'static str,
    kind: RequestKind,
    status: RequestStatus,
    department: Option<&'static str>,
    departments: &'static [&'static str],
    creator: &'static str,
    creator_department: &'static str,
    creator_role: &'static str,
    accepted_by: &'static [&'static str],
    users_needed: i32,
    status_age_days: Option<i64>,
}

/// Wipes all data and loads the sample departments, users, and requests.
pub async fn run(pool: &PgPool) -> anyhow::Result<()> {
    let mut tx = pool.begin().await.context("failed to start seed transaction")?;

    sqlx::query("DELETE FROM requests").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM users").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM departments").execute(&mut *tx).await?;

    let departments = [
        ("Engineering", "code", "#3b82f6"),
        ("Marketing", "megaphone", "#10b981"),
        ("Product", "box", "#6366f1"),
        ("Design", "palette", "#ec4899"),
        ("HR", "users", "#f59e0b"),
    ];
    for (name, icon, color) in departments {
        sqlx::query("INSERT INTO departments (id, name, icon, color) VALUES ($1, $2, $3, $4)")
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(icon)
            .bind(color)
            .execute(&mut *tx)
            .await?;
    }

    let password_hash = hash(SEED_PASSWORD, DEFAULT_COST).context("failed to hash seed password")?;
    let users = [
        ("john.doe", "John Doe", "john.doe@example.com", "Engineering", "admin", "555-123-4567"),
        ("jane.smith", "Jane Smith", "jane.smith@example.com", "Marketing", "user", "555-987-6543"),
        ("alex.wong", "Alex Wong", "alex.wong@example.com", "Product", "user", "555-456-7890"),
        ("sarah.miller", "Sarah Miller", "sarah.miller@example.com", "Design", "user", "555-789-0123"),
        ("admin", "Admin User", "admin@example.com", "HR", "admin", "555-234-5678"),
    ];
    for (username, full_name, email, department, role, phone) in users {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, full_name, email, department, role, phone, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(full_name)
        .bind(email)
        .bind(department)
        .bind(role)
        .bind(phone)
        .bind(&password_hash)
        .execute(&mut *tx)
        .await?;
    }

    let requests = [
        SeedRequest {
            title: "Website Redesign",
            description: "Need help redesigning the company website for better user experience.",
            kind: RequestKind::Project,
            status: RequestStatus::Pending,
            department: Some("Marketing"),
            departments: &["Design", "Engineering"],
            creator: "jane.smith",
            creator_department: "Marketing",
            creator_role: "user",
            accepted_by: &["jane.smith"],
            users_needed: 3,
            status_age_days: None,
        },
        SeedRequest {
            title: "Bug Fix in Checkout Process",
            description: "There's a critical bug in the checkout process that needs immediate attention.",
            kind: RequestKind::Request,
            status: RequestStatus::InProcess,
            department: Some("Engineering"),
            departments: &[],
            creator: "john.doe",
            creator_department: "Engineering",
            creator_role: "admin",
            accepted_by: &["john.doe"],
            users_needed: 2,
            status_age_days: Some(0),
        },
        SeedRequest {
            title: "Marketing Campaign Design",
            description: "Need design assets for the upcoming winter marketing campaign.",
            kind: RequestKind::Request,
            status: RequestStatus::Completed,
            department: Some("Marketing"),
            departments: &["Design", "Marketing"],
            creator: "jane.smith",
            creator_department: "Marketing",
            creator_role: "user",
            accepted_by: &["sarah.miller", "jane.smith"],
            users_needed: 2,
            status_age_days: Some(2),
        },
        SeedRequest {
            title: "Product Roadmap Review",
            description: "Need to review the Q4 product roadmap with key stakeholders.",
            kind: RequestKind::Request,
            status: RequestStatus::Rejected,
            department: Some("Product"),
            departments: &[],
            creator: "alex.wong",
            creator_department: "Product",
            creator_role: "user",
            accepted_by: &[],
            users_needed: 2,
            status_age_days: Some(10),
        },
        SeedRequest {
            title: "Team Building Event",
            description: "Organizing a team building event for all departments.",
            kind: RequestKind::Project,
            status: RequestStatus::Pending,
            department: Some("HR"),
            departments: &["HR", "Engineering", "Marketing", "Product", "Design"],
            creator: "admin",
            creator_department: "HR",
            creator_role: "admin",
            accepted_by: &["admin"],
            users_needed: 5,
            status_age_days: None,
        },
    ];

    let now = Utc::now();
    for seed in requests {
        let request_id = Uuid::new_v4();
        let accepted: Vec<String> = seed.accepted_by.iter().map(|u| u.to_string()).collect();
        let target_departments: Vec<String> =
            seed.departments.iter().map(|d| d.to_string()).collect();
        let last_status_update = seed.status_age_days.map(|days| now - Duration::days(days));

        sqlx::query(
            r#"
            INSERT INTO requests (
                id, title, description, kind, status, department, departments, multi_department,
                creator, creator_department, creator_role, accepted_by, users_needed,
                created_at, last_status_update
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(request_id)
        .bind(seed.title)
        .bind(seed.description)
        .bind(seed.kind)
        .bind(seed.status)
        .bind(seed.department)
        .bind(&target_departments)
        .bind(target_departments.len() >= 2)
        .bind(seed.creator)
        .bind(seed.creator_department)
        .bind(seed.creator_role)
        .bind(&accepted)
        .bind(seed.users_needed)
        .bind(now)
        .bind(last_status_update)
        .execute(&mut *tx)
        .await?;

        if seed.status == RequestStatus::Rejected {
            sqlx::query(
                r#"
                INSERT INTO rejections (id, request_id, username, reason, rejected_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(request_id)
            .bind("john.doe")
            .bind("This request doesn't align with our current priorities.")
            .bind(now - Duration::days(10))
            .execute(&mut *tx)
            .await?;
        }

        if seed.status == RequestStatus::Completed {
            for participant in seed.accepted_by {
                sqlx::query(
                    r#"
                    INSERT INTO participants_completed (id, request_id, username, completed_at)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(request_id)
                .bind(participant)
                .bind(now - Duration::days(2))
                .execute(&mut *tx)
                .await?;
            }
        }
    }

    tx.commit().await.context("failed to commit seed transaction")?;
    info!("🌱 Seeded {} departments, {} users, and sample requests", departments.len(), users.len());
    Ok(())
}
