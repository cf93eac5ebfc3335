//! Credit account entity (one row per user).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub user_id: String,

    /// Current balance (personal + corporate portions)
    pub balance: i64,

    /// Everything ever credited net of deductions; always `used + balance`
    pub total: i64,

    /// Credits consumed by enrollments (net of refunds)
    pub used: i64,

    /// Part of `balance` owned personally; only this part can be gifted
    pub personal_balance: i64,

    /// Part of `balance` reserved by pending enrollment requests
    pub locked_balance: i64,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Balance that is not reserved and can be spent right now.
    #[must_use]
    pub const fn spendable(&self) -> i64 {
        self.balance - self.locked_balance
    }

    /// Corporate (organization-sourced) portion of the balance.
    #[must_use]
    pub const fn corporate_balance(&self) -> i64 {
        self.balance - self.personal_balance
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,

    #[sea_orm(has_many = "super::credit_record::Entity")]
    Records,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::credit_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
