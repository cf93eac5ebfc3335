//! User service: accounts, passwords and access tokens.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use coursehub_common::{AppError, AppResult, IdGenerator, config::AuthConfig};
use coursehub_db::{
    entities::user::{self, Role, UserStatus},
    repositories::{UserFilter, UserRepository},
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::credit::CreditService;

/// Self-service sign up input.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(length(min = 3, max = 64))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(max = 128))]
    pub name: Option<String>,

    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1))]
    pub username: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Input for an administrator creating a user with any role.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserInput {
    #[validate(length(min = 3, max = 64))]
    pub username: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(max = 128))]
    pub name: Option<String>,

    #[validate(length(max = 32))]
    pub phone: Option<String>,

    pub role: Role,

    pub organization_id: Option<String>,
}

/// Profile update. `role` and `organizationId` need the manage permission.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    #[validate(length(max = 128))]
    pub name: Option<String>,

    #[validate(length(max = 32))]
    pub phone: Option<String>,

    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,

    pub role: Option<Role>,

    pub organization_id: Option<String>,
}

/// JWT claims carried by access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Result of a successful login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    pub expires_at: i64,
    pub user: user::Model,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    credit_service: CreditService,
    jwt_secret: String,
    token_ttl_secs: i64,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub fn new(
        user_repo: UserRepository,
        credit_service: CreditService,
        auth: &AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            credit_service,
            jwt_secret: auth.jwt_secret.clone(),
            token_ttl_secs: auth.token_ttl_secs,
            id_gen: IdGenerator::new(),
        }
    }

    /// Sign up as a student.
    pub async fn register(&self, input: RegisterInput) -> AppResult<user::Model> {
        input.validate()?;

        self.insert_user(
            input.username,
            &input.password,
            input.name,
            input.phone,
            Role::Student,
            None,
        )
        .await
    }

    /// Create a user with an explicit role.
    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<user::Model> {
        input.validate()?;

        self.insert_user(
            input.username,
            &input.password,
            input.name,
            input.phone,
            input.role,
            input.organization_id,
        )
        .await
    }

    /// Verify credentials and issue an access token.
    pub async fn login(&self, input: LoginInput) -> AppResult<AuthToken> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::InvalidCredentials);
        }
        if user.status == UserStatus::Disabled {
            return Err(AppError::UserDisabled);
        }

        let (token, expires_at) = self.issue_token(&user)?;
        info!(user_id = %user.id, "User logged in");

        Ok(AuthToken {
            token,
            expires_at,
            user,
        })
    }

    /// Sign an access token for a user. Returns the token and its expiry.
    pub fn issue_token(&self, user: &user::Model) -> AppResult<(String, i64)> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user.id.clone(),
            role: user.role,
            exp: now + self.token_ttl_secs,
            iat: now,
            jti: self.id_gen.generate_token(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok((token, claims.exp))
    }

    /// Resolve a bearer token to its user. Disabled users are rejected.
    pub async fn authenticate_token(&self, token: &str) -> AppResult<user::Model> {
        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;

        let user = self
            .user_repo
            .find_by_id(&data.claims.sub)
            .await?
            .ok_or_else(|| AppError::InvalidToken("unknown subject".to_string()))?;

        if user.status == UserStatus::Disabled {
            return Err(AppError::UserDisabled);
        }

        Ok(user)
    }

    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    pub async fn list(
        &self,
        filter: &UserFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<user::Model>> {
        self.user_repo.list(filter, limit.min(100), offset).await
    }

    /// Update a user. `privileged` callers may also change role and organization.
    pub async fn update_profile(
        &self,
        id: &str,
        input: UpdateUserInput,
        privileged: bool,
    ) -> AppResult<user::Model> {
        input.validate()?;

        if !privileged && (input.role.is_some() || input.organization_id.is_some()) {
            return Err(AppError::Forbidden(
                "Role and organization are managed by staff".to_string(),
            ));
        }

        let mut active = self.user_repo.get_by_id(id).await?.into_active_model();
        if let Some(name) = input.name {
            active.name = Set(Some(name));
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(password) = input.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(role) = input.role {
            active.role = Set(role);
        }
        if let Some(organization_id) = input.organization_id {
            active.organization_id = Set(Some(organization_id));
        }
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Assign an advisor to a user. The advisor must have the ADVISOR role.
    pub async fn assign_advisor(&self, user_id: &str, advisor_id: &str) -> AppResult<user::Model> {
        let advisor = self.user_repo.get_by_id(advisor_id).await?;
        if advisor.role != Role::Advisor {
            return Err(AppError::BadRequest(format!(
                "User {advisor_id} is not an advisor"
            )));
        }

        let mut active = self.user_repo.get_by_id(user_id).await?.into_active_model();
        active.advisor_id = Set(Some(advisor.id));
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        self.user_repo.update(active).await
    }

    /// Enable or disable a user.
    pub async fn set_status(&self, id: &str, status: UserStatus) -> AppResult<user::Model> {
        let mut active = self.user_repo.get_by_id(id).await?.into_active_model();
        active.status = Set(status);
        active.updated_at = Set(Some(chrono::Utc::now().into()));

        let user = self.user_repo.update(active).await?;
        info!(user_id = %id, status = ?status, "Changed user status");
        Ok(user)
    }

    async fn insert_user(
        &self,
        username: String,
        password: &str,
        name: Option<String>,
        phone: Option<String>,
        role: Role,
        organization_id: Option<String>,
    ) -> AppResult<user::Model> {
        if self.user_repo.find_by_username(&username).await?.is_some() {
            return Err(AppError::UserExists(username));
        }

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(username),
            password_hash: Set(hash_password(password)?),
            name: Set(name),
            phone: Set(phone),
            role: Set(role),
            status: Set(UserStatus::Active),
            organization_id: Set(organization_id),
            advisor_id: Set(None),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        self.credit_service.open_account(&user.id).await?;

        info!(user_id = %user.id, role = user.role.as_str(), "Created user");
        Ok(user)
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::course::tests::test_user;
    use coursehub_db::repositories::CreditRepository;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> UserService {
        let db = Arc::new(db.into_connection());
        let auth = AuthConfig {
            jwt_secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
        };
        UserService::new(
            UserRepository::new(db.clone()),
            CreditService::new(db.clone(), CreditRepository::new(db), 0),
            &auth,
        )
    }

    fn with_password(id: &str, password: &str) -> user::Model {
        user::Model {
            password_hash: hash_password(password).unwrap(),
            ..test_user(id, Role::Student)
        }
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("password123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("password123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_user("u1", Role::Student)]]);
        let input = RegisterInput {
            username: "alice".to_string(),
            password: "password123".to_string(),
            name: None,
            phone: None,
        };

        let result = service(db).register(input).await;

        assert!(matches!(result, Err(AppError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[with_password("u1", "password123")]]);
        let input = LoginInput {
            username: "alice".to_string(),
            password: "nope-nope".to_string(),
        };

        let result = service(db).login(input).await;

        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_and_authenticate() {
        let user = with_password("u1", "password123");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user.clone()]])
            .append_query_results([[user]]);
        let service = service(db);

        let auth = service
            .login(LoginInput {
                username: "alice".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();
        let resolved = service.authenticate_token(&auth.token).await.unwrap();

        assert_eq!(resolved.id, "u1");
        assert!(auth.expires_at > chrono::Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_disabled_user_token_rejected() {
        let disabled = user::Model {
            status: UserStatus::Disabled,
            ..test_user("u1", Role::Student)
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[disabled]]);
        let service = service(db);
        let (token, _) = service.issue_token(&test_user("u1", Role::Student)).unwrap();

        let result = service.authenticate_token(&token).await;

        assert!(matches!(result, Err(AppError::UserDisabled)));
    }

    #[tokio::test]
    async fn test_garbage_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);

        let result = service(db).authenticate_token("not-a-jwt").await;

        assert!(matches!(result, Err(AppError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_assign_non_advisor() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[test_user("t1", Role::Teacher)]]);

        let result = service(db).assign_advisor("u1", "t1").await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_student_cannot_change_own_role() {
        let db = MockDatabase::new(DatabaseBackend::Postgres);
        let input = UpdateUserInput {
            role: Some(Role::Admin),
            ..Default::default()
        };

        let result = service(db).update_profile("u1", input, false).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
