//! Role-based permission checks.
//!
//! The effective table is the built-in default table merged with the grants
//! stored in `role_permission`. `ADMIN` is always allowed.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{permission, role_permission, user::Role},
    repositories::PermissionRepository,
};
use sea_orm::Set;
use tokio::sync::RwLock;
use tracing::info;

pub const COURSE_CREATE: &str = "course:create";
pub const COURSE_UPDATE: &str = "course:update";
pub const COURSE_REVIEW: &str = "course:review";
pub const COURSE_PUBLISH: &str = "course:publish";
pub const ENROLLMENT_CHECKIN: &str = "enrollment:checkin";
pub const ENROLLMENT_VIEW_ALL: &str = "enrollment:view-all";
pub const CREDIT_ALLOCATE: &str = "credit:allocate";
pub const CREDIT_DEDUCT: &str = "credit:deduct";
pub const CREDIT_CORPORATE: &str = "credit:corporate";
pub const CREDIT_VIEW_ALL: &str = "credit:view-all";
pub const CREDIT_REQUEST_REVIEW: &str = "credit-request:review";
pub const REFUND_REQUEST_REVIEW: &str = "refund-request:review";
pub const ENROLLMENT_REQUEST_REVIEW: &str = "enrollment-request:review";
pub const COMPLETION_REQUEST_REVIEW: &str = "completion-request:review";
pub const ORGANIZATION_MANAGE: &str = "organization:manage";
pub const USER_MANAGE: &str = "user:manage";
pub const NOTIFICATION_SEND: &str = "notification:send";
pub const PERMISSION_MANAGE: &str = "permission:manage";

/// Every permission code with a human-readable name.
pub const CATALOG: &[(&str, &str)] = &[
    (COURSE_CREATE, "Create courses"),
    (COURSE_UPDATE, "Edit courses"),
    (COURSE_REVIEW, "Review course content"),
    (COURSE_PUBLISH, "Publish and archive courses"),
    (ENROLLMENT_CHECKIN, "Check students in"),
    (ENROLLMENT_VIEW_ALL, "View all enrollments"),
    (CREDIT_ALLOCATE, "Allocate credits"),
    (CREDIT_DEDUCT, "Deduct credits"),
    (CREDIT_CORPORATE, "Manage corporate credits"),
    (CREDIT_VIEW_ALL, "View any credit account"),
    (CREDIT_REQUEST_REVIEW, "Review credit requests"),
    (REFUND_REQUEST_REVIEW, "Review refund requests"),
    (ENROLLMENT_REQUEST_REVIEW, "Review enrollment requests"),
    (COMPLETION_REQUEST_REVIEW, "Review course completion requests"),
    (ORGANIZATION_MANAGE, "Manage organizations"),
    (USER_MANAGE, "Manage users"),
    (NOTIFICATION_SEND, "Send notifications"),
    (PERMISSION_MANAGE, "Manage role permissions"),
];

/// Built-in grants for a role.
#[must_use]
pub fn default_permissions(role: Role) -> &'static [&'static str] {
    match role {
        Role::Admin => &[],
        Role::Staff => &[
            COURSE_REVIEW,
            COURSE_PUBLISH,
            ENROLLMENT_CHECKIN,
            ENROLLMENT_VIEW_ALL,
            CREDIT_ALLOCATE,
            CREDIT_DEDUCT,
            CREDIT_CORPORATE,
            CREDIT_VIEW_ALL,
            CREDIT_REQUEST_REVIEW,
            REFUND_REQUEST_REVIEW,
            ENROLLMENT_REQUEST_REVIEW,
            COMPLETION_REQUEST_REVIEW,
            ORGANIZATION_MANAGE,
            USER_MANAGE,
            NOTIFICATION_SEND,
        ],
        Role::Teacher => &[
            COURSE_CREATE,
            COURSE_UPDATE,
            ENROLLMENT_CHECKIN,
            ENROLLMENT_VIEW_ALL,
            COMPLETION_REQUEST_REVIEW,
        ],
        Role::Advisor => &[
            ENROLLMENT_VIEW_ALL,
            CREDIT_VIEW_ALL,
            ENROLLMENT_REQUEST_REVIEW,
            COMPLETION_REQUEST_REVIEW,
        ],
        Role::Student => &[],
    }
}

type Table = HashMap<Role, HashSet<String>>;

fn default_table() -> Table {
    [Role::Staff, Role::Teacher, Role::Advisor, Role::Student]
        .into_iter()
        .map(|role| {
            let codes = default_permissions(role)
                .iter()
                .map(|c| (*c).to_string())
                .collect();
            (role, codes)
        })
        .collect()
}

/// Permission service with an in-memory table.
#[derive(Clone)]
pub struct PermissionService {
    permission_repo: PermissionRepository,
    table: Arc<RwLock<Table>>,
    id_gen: IdGenerator,
}

impl PermissionService {
    /// Create a permission service seeded with the default table.
    #[must_use]
    pub fn new(permission_repo: PermissionRepository) -> Self {
        Self {
            permission_repo,
            table: Arc::new(RwLock::new(default_table())),
            id_gen: IdGenerator::new(),
        }
    }

    /// Whether `role` holds `permission`.
    pub async fn has_permission(&self, permission: &str, role: Role) -> bool {
        if role == Role::Admin {
            return true;
        }
        self.table
            .read()
            .await
            .get(&role)
            .is_some_and(|codes| codes.contains(permission))
    }

    /// Fail with `Forbidden` unless `role` holds `permission`.
    pub async fn require(&self, permission: &str, role: Role) -> AppResult<()> {
        if self.has_permission(permission, role).await {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Missing permission {permission}")))
        }
    }

    /// Insert catalog entries that are missing from the database.
    pub async fn sync_catalog(&self) -> AppResult<usize> {
        let existing: HashSet<String> = self
            .permission_repo
            .find_all()
            .await?
            .into_iter()
            .map(|p| p.code)
            .collect();

        let mut inserted = 0;
        for (code, name) in CATALOG {
            if existing.contains(*code) {
                continue;
            }
            self.permission_repo
                .create(permission::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    code: Set((*code).to_string()),
                    name: Set((*name).to_string()),
                    description: Set(None),
                    created_at: Set(chrono::Utc::now().into()),
                })
                .await?;
            inserted += 1;
        }

        if inserted > 0 {
            info!(inserted, "Added missing permission codes");
        }
        Ok(inserted)
    }

    /// Rebuild the table from defaults plus stored grants.
    pub async fn reload(&self) -> AppResult<()> {
        let grants = self.permission_repo.find_all_grants().await?;
        let mut table = default_table();
        for grant in &grants {
            table
                .entry(grant.role)
                .or_default()
                .insert(grant.permission_code.clone());
        }

        *self.table.write().await = table;
        info!(grants = grants.len(), "Loaded role permissions");
        Ok(())
    }

    /// Grant a permission to a role.
    pub async fn grant(&self, role: Role, code: &str) -> AppResult<()> {
        if self.permission_repo.find_by_code(code).await?.is_none() {
            return Err(AppError::NotFound(format!("Permission {code}")));
        }

        if self.permission_repo.find_grant(role, code).await?.is_none() {
            self.permission_repo
                .create_grant(role_permission::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    role: Set(role),
                    permission_code: Set(code.to_string()),
                    created_at: Set(chrono::Utc::now().into()),
                })
                .await?;
        }

        self.table
            .write()
            .await
            .entry(role)
            .or_default()
            .insert(code.to_string());

        info!(role = role.as_str(), code, "Granted permission");
        Ok(())
    }

    /// Revoke a permission from a role, including a built-in grant.
    pub async fn revoke(&self, role: Role, code: &str) -> AppResult<()> {
        self.permission_repo.delete_grant(role, code).await?;

        if let Some(codes) = self.table.write().await.get_mut(&role) {
            codes.remove(code);
        }

        info!(role = role.as_str(), code, "Revoked permission");
        Ok(())
    }

    /// All stored permission codes.
    pub async fn list_permissions(&self) -> AppResult<Vec<permission::Model>> {
        self.permission_repo.find_all().await
    }

    /// Effective permission codes of a role, sorted.
    pub async fn list_role_permissions(&self, role: Role) -> Vec<String> {
        if role == Role::Admin {
            return CATALOG.iter().map(|(code, _)| (*code).to_string()).collect();
        }

        let mut codes: Vec<String> = self
            .table
            .read()
            .await
            .get(&role)
            .map(|codes| codes.iter().cloned().collect())
            .unwrap_or_default();
        codes.sort();
        codes
    }
}
