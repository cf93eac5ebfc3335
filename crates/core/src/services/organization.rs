//! Organization service.

use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{
        organization::{self, OrganizationStatus},
        user,
    },
    repositories::{OrganizationRepository, UserFilter, UserRepository},
};
use sea_orm::{IntoActiveModel, Set};
use serde::Deserialize;
use validator::Validate;

/// Input for creating an organization.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationInput {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[validate(length(max = 2048))]
    pub description: Option<String>,

    #[validate(length(max = 256))]
    pub contact: Option<String>,
}

/// Input for updating an organization.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrganizationInput {
    #[validate(length(min = 1, max = 128))]
    pub name: Option<String>,

    #[validate(length(max = 2048))]
    pub description: Option<String>,

    #[validate(length(max = 256))]
    pub contact: Option<String>,
}

#[derive(Clone)]
pub struct OrganizationService {
    organization_repo: OrganizationRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl OrganizationService {
    #[must_use]
    pub const fn new(organization_repo: OrganizationRepository, user_repo: UserRepository) -> Self {
        Self {
            organization_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    pub async fn create(&self, input: CreateOrganizationInput) -> AppResult<organization::Model> {
        input.validate()?;
        self.ensure_name_free(&input.name, None).await?;

        let model = organization::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(input.name),
            description: Set(input.description),
            contact: Set(input.contact),
            status: Set(OrganizationStatus::Active),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        self.organization_repo.create(model).await
    }

    pub async fn update(
        &self,
        id: &str,
        input: UpdateOrganizationInput,
    ) -> AppResult<organization::Model> {
        input.validate()?;
        let organization = self.organization_repo.get_by_id(id).await?;

        if let Some(name) = input.name.as_deref().filter(|n| *n != organization.name) {
            self.ensure_name_free(name, Some(id)).await?;
        }

        let mut active = organization.into_active_model();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(Some(description));
        }
        if let Some(contact) = input.contact {
            active.contact = Set(Some(contact));
        }
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.organization_repo.update(active).await
    }

    pub async fn get(&self, id: &str) -> AppResult<organization::Model> {
        self.organization_repo.get_by_id(id).await
    }

    pub async fn list(&self, limit: u64, offset: u64) -> AppResult<Vec<organization::Model>> {
        self.organization_repo.list(limit.min(100), offset).await
    }

    /// Enable or disable an organization.
    pub async fn set_status(
        &self,
        id: &str,
        status: OrganizationStatus,
    ) -> AppResult<organization::Model> {
        let organization = self.organization_repo.get_by_id(id).await?;
        if organization.status == status {
            return Ok(organization);
        }

        let mut active = organization.into_active_model();
        active.status = Set(status);
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.organization_repo.update(active).await
    }

    /// Users belonging to an organization.
    pub async fn list_members(
        &self,
        id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<user::Model>> {
        self.organization_repo.get_by_id(id).await?;

        let filter = UserFilter {
            organization_id: Some(id.to_string()),
            ..Default::default()
        };
        self.user_repo.list(&filter, limit.min(100), offset).await
    }

    async fn ensure_name_free(&self, name: &str, except: Option<&str>) -> AppResult<()> {
        match self.organization_repo.find_by_name(name).await? {
            Some(existing) if Some(existing.id.as_str()) != except => Err(AppError::Conflict(
                format!("Organization name already used: {name}"),
            )),
            _ => Ok(()),
        }
    }
}
