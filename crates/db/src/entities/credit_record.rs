//! Credit record entity (append-only ledger).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditRecordType {
    #[sea_orm(string_value = "ALLOCATE")]
    Allocate,
    #[sea_orm(string_value = "DEDUCT")]
    Deduct,
    #[sea_orm(string_value = "CORPORATE_ADD")]
    CorporateAdd,
    #[sea_orm(string_value = "CORPORATE_DEDUCT")]
    CorporateDeduct,
    #[sea_orm(string_value = "GIFT_IN")]
    GiftIn,
    #[sea_orm(string_value = "GIFT_OUT")]
    GiftOut,
    #[sea_orm(string_value = "CONSUME")]
    Consume,
    #[sea_orm(string_value = "REFUND")]
    Refund,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_record")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub credit_id: String,

    /// Owner of the credit account (denormalized)
    pub user_id: String,

    pub record_type: CreditRecordType,

    /// Signed change applied to the balance
    pub amount: i64,

    /// Balance right after this change
    pub balance_after: i64,

    #[sea_orm(column_type = "Text", nullable)]
    pub remark: Option<String>,

    /// User who performed the operation
    #[sea_orm(nullable)]
    pub operator_id: Option<String>,

    /// Enrollment / request / counterparty the change belongs to
    #[sea_orm(nullable)]
    pub related_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::credit::Entity",
        from = "Column::CreditId",
        to = "super::credit::Column::Id",
        on_delete = "Cascade"
    )]
    Credit,
}

impl Related<super::credit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Credit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
