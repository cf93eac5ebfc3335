//! Credit ledger service.
//!
//! Each account keeps `balance`, `total`, `used`, `personal_balance` and
//! `locked_balance`. `personal_balance` and `locked_balance` are both parts of
//! `balance`; the rest of `balance` is the corporate portion. For every account
//! `total == used + balance` holds after each operation.

use std::sync::Arc;

use coursehub_common::{AppError, AppResult, IdGenerator};
use coursehub_db::{
    entities::{credit, credit_record, credit_record::CreditRecordType},
    repositories::CreditRepository,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde::Serialize;
use tracing::info;

/// Balance-changing operations that leave a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOp {
    /// Grant personal credits.
    Allocate,
    /// Take credits back, personal portion first.
    Deduct,
    /// Grant company-funded credits.
    CorporateAdd,
    /// Take back company-funded credits only.
    CorporateDeduct,
    /// Receive a gift into the personal portion.
    GiftIn,
    /// Send personal credits to another user.
    GiftOut,
    /// Pay for an enrollment, corporate portion first.
    Consume,
    /// Return a consumed amount.
    Refund,
}

impl LedgerOp {
    /// Record type written for this operation.
    #[must_use]
    pub const fn record_type(self) -> CreditRecordType {
        match self {
            Self::Allocate => CreditRecordType::Allocate,
            Self::Deduct => CreditRecordType::Deduct,
            Self::CorporateAdd => CreditRecordType::CorporateAdd,
            Self::CorporateDeduct => CreditRecordType::CorporateDeduct,
            Self::GiftIn => CreditRecordType::GiftIn,
            Self::GiftOut => CreditRecordType::GiftOut,
            Self::Consume => CreditRecordType::Consume,
            Self::Refund => CreditRecordType::Refund,
        }
    }

    /// Whether the operation adds to the balance.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(
            self,
            Self::Allocate | Self::CorporateAdd | Self::GiftIn | Self::Refund
        )
    }

    /// Signed amount stored on the ledger record.
    #[must_use]
    pub const fn signed(self, amount: i64) -> i64 {
        if self.is_credit() { amount } else { -amount }
    }
}

/// Counters of one credit account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Balances {
    pub balance: i64,
    pub total: i64,
    pub used: i64,
    pub personal: i64,
    pub locked: i64,
}

/// A computed balance change, not yet written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub op: LedgerOp,
    /// Signed change of `balance`.
    pub delta: i64,
    pub after: Balances,
}

impl From<&credit::Model> for Balances {
    fn from(m: &credit::Model) -> Self {
        Self {
            balance: m.balance,
            total: m.total,
            used: m.used,
            personal: m.personal_balance,
            locked: m.locked_balance,
        }
    }
}

fn ensure_positive(amount: i64) -> AppResult<()> {
    if amount > 0 {
        Ok(())
    } else {
        Err(AppError::InvalidCreditAmount(amount))
    }
}

/// Add `amount` to a counter, rejecting amounts that would overflow it.
fn plus(counter: i64, amount: i64) -> AppResult<i64> {
    counter
        .checked_add(amount)
        .ok_or(AppError::InvalidCreditAmount(amount))
}

fn ensure_available(available: i64, required: i64) -> AppResult<()> {
    if available >= required {
        Ok(())
    } else {
        Err(AppError::CreditNotEnough {
            available,
            required,
        })
    }
}

impl Balances {
    /// Credits that can be spent right now.
    #[must_use]
    pub const fn spendable(&self) -> i64 {
        self.balance - self.locked
    }

    /// Part of the balance that did not come from personal grants.
    #[must_use]
    pub const fn corporate(&self) -> i64 {
        self.balance - self.personal
    }

    /// Whether every account invariant holds.
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.total == self.used + self.balance
            && self.used >= 0
            && self.locked >= 0
            && self.locked <= self.balance
            && self.personal >= 0
            && self.personal <= self.balance
    }

    /// Compute the effect of `op` for a positive `amount`.
    pub fn apply(self, op: LedgerOp, amount: i64) -> AppResult<LedgerEntry> {
        ensure_positive(amount)?;
        let mut next = self;

        match op {
            LedgerOp::Allocate | LedgerOp::GiftIn => {
                next.balance = plus(self.balance, amount)?;
                next.total = plus(self.total, amount)?;
                next.personal = plus(self.personal, amount)?;
            }
            LedgerOp::CorporateAdd => {
                next.balance = plus(self.balance, amount)?;
                next.total = plus(self.total, amount)?;
            }
            LedgerOp::Deduct => {
                ensure_available(self.spendable(), amount)?;
                next.personal -= amount.min(self.personal);
                next.balance -= amount;
                next.total -= amount;
            }
            LedgerOp::CorporateDeduct => {
                ensure_available(self.spendable().min(self.corporate()), amount)?;
                next.balance -= amount;
                next.total -= amount;
            }
            LedgerOp::GiftOut => {
                ensure_available(self.spendable().min(self.personal), amount)?;
                next.personal -= amount;
                next.balance -= amount;
                next.total -= amount;
            }
            LedgerOp::Consume => {
                ensure_available(self.spendable(), amount)?;
                let from_corporate = amount.min(self.corporate());
                next.personal -= amount - from_corporate;
                next.balance -= amount;
                next.used = plus(self.used, amount)?;
            }
            LedgerOp::Refund => {
                if amount > self.used {
                    return Err(AppError::InvalidCreditAmount(amount));
                }
                next.balance = plus(self.balance, amount)?;
                next.used -= amount;
            }
        }

        Ok(LedgerEntry {
            op,
            delta: op.signed(amount),
            after: next,
        })
    }

    /// Reserve credits for a pending enrollment request.
    pub fn lock(self, amount: i64) -> AppResult<Self> {
        ensure_positive(amount)?;
        ensure_available(self.spendable(), amount)?;
        Ok(Self {
            locked: plus(self.locked, amount)?,
            ..self
        })
    }

    /// Release a reservation.
    pub fn unlock(self, amount: i64) -> AppResult<Self> {
        ensure_positive(amount)?;
        if amount > self.locked {
            return Err(AppError::InvalidCreditAmount(amount));
        }
        Ok(Self {
            locked: self.locked - amount,
            ..self
        })
    }
}

/// Who performed a ledger change and what it belongs to.
#[derive(Debug, Clone, Default)]
pub struct LedgerContext {
    pub operator_id: Option<String>,
    pub remark: Option<String>,
    pub related_id: Option<String>,
}

impl LedgerContext {
    /// Context for a change made by `operator_id`.
    #[must_use]
    pub fn new(operator_id: &str, remark: Option<String>) -> Self {
        Self {
            operator_id: Some(operator_id.to_string()),
            remark,
            related_id: None,
        }
    }

    /// Attach the enrollment, request or counterparty the change belongs to.
    #[must_use]
    pub fn related_to(mut self, related_id: &str) -> Self {
        self.related_id = Some(related_id.to_string());
        self
    }
}

/// Account state after a change, with the record that describes it.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerResult {
    pub account: credit::Model,
    pub record: credit_record::Model,
}

/// Both sides of a gift.
#[derive(Debug, Clone, Serialize)]
pub struct GiftResult {
    pub sender: LedgerResult,
    pub receiver: LedgerResult,
}

/// Credit service for business logic.
#[derive(Clone)]
pub struct CreditService {
    db: Arc<DatabaseConnection>,
    credit_repo: CreditRepository,
    id_gen: IdGenerator,
    initial_balance: i64,
}

impl CreditService {
    /// Create a new credit service.
    #[must_use]
    pub const fn new(
        db: Arc<DatabaseConnection>,
        credit_repo: CreditRepository,
        initial_balance: i64,
    ) -> Self {
        Self {
            db,
            credit_repo,
            id_gen: IdGenerator::new(),
            initial_balance,
        }
    }

    /// Open the account of a user. Returns the existing one if present.
    pub async fn open_account(&self, user_id: &str) -> AppResult<credit::Model> {
        if let Some(account) = self.credit_repo.find_by_user(user_id).await? {
            return Ok(account);
        }

        let txn = self.db.begin().await?;
        let mut account = self.create_empty(&txn, user_id).await?;
        if self.initial_balance > 0 {
            let ctx = LedgerContext {
                remark: Some("initial balance".to_string()),
                ..Default::default()
            };
            account = self
                .write(&txn, account, LedgerOp::Allocate, self.initial_balance, ctx)
                .await?
                .account;
        }
        txn.commit().await?;

        info!(user_id = %user_id, balance = account.balance, "Opened credit account");
        Ok(account)
    }

    /// Get the account of a user.
    pub async fn get_balance(&self, user_id: &str) -> AppResult<credit::Model> {
        self.credit_repo.get_by_user(user_id).await
    }

    /// Ledger records of a user, newest first.
    pub async fn list_records(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<credit_record::Model>> {
        self.credit_repo
            .find_records_by_user(user_id, limit.min(100), until_id)
            .await
    }

    /// Grant personal credits to a user.
    pub async fn allocate(
        &self,
        operator_id: &str,
        user_id: &str,
        amount: i64,
        remark: Option<String>,
    ) -> AppResult<LedgerResult> {
        let ctx = LedgerContext::new(operator_id, remark);
        self.run(user_id, LedgerOp::Allocate, amount, ctx).await
    }

    /// Take credits back, drawing on the personal portion first.
    pub async fn deduct(
        &self,
        operator_id: &str,
        user_id: &str,
        amount: i64,
        remark: Option<String>,
    ) -> AppResult<LedgerResult> {
        let ctx = LedgerContext::new(operator_id, remark);
        self.run(user_id, LedgerOp::Deduct, amount, ctx).await
    }

    /// Add to the corporate portion of a user's balance.
    pub async fn corporate_add(
        &self,
        operator_id: &str,
        user_id: &str,
        amount: i64,
        remark: Option<String>,
    ) -> AppResult<LedgerResult> {
        let ctx = LedgerContext::new(operator_id, remark);
        self.run(user_id, LedgerOp::CorporateAdd, amount, ctx).await
    }

    /// Take credits from the corporate portion only.
    pub async fn corporate_deduct(
        &self,
        operator_id: &str,
        user_id: &str,
        amount: i64,
        remark: Option<String>,
    ) -> AppResult<LedgerResult> {
        let ctx = LedgerContext::new(operator_id, remark);
        self.run(user_id, LedgerOp::CorporateDeduct, amount, ctx)
            .await
    }

    /// Move personal credits from one user to another.
    pub async fn gift(
        &self,
        from_user_id: &str,
        to_user_id: &str,
        amount: i64,
        remark: Option<String>,
    ) -> AppResult<GiftResult> {
        if from_user_id == to_user_id {
            return Err(AppError::BadRequest(
                "Cannot gift credits to yourself".to_string(),
            ));
        }
        ensure_positive(amount)?;

        let txn = self.db.begin().await?;

        // Lock both rows in a fixed order so opposite gifts cannot deadlock.
        let sender_first = from_user_id < to_user_id;
        let (first, second) = if sender_first {
            (from_user_id, to_user_id)
        } else {
            (to_user_id, from_user_id)
        };
        let a = self.credit_repo.find_by_user_for_update(&txn, first).await?;
        let b = self.credit_repo.find_by_user_for_update(&txn, second).await?;
        let (sender, receiver) = if sender_first { (a, b) } else { (b, a) };

        let sender =
            sender.ok_or_else(|| AppError::CreditAccountNotFound(from_user_id.to_string()))?;
        let out_ctx = LedgerContext::new(from_user_id, remark.clone()).related_to(to_user_id);
        let sender = self
            .write(&txn, sender, LedgerOp::GiftOut, amount, out_ctx)
            .await?;

        let receiver = match receiver {
            Some(account) => account,
            None => self.create_empty(&txn, to_user_id).await?,
        };
        let in_ctx = LedgerContext::new(from_user_id, remark).related_to(from_user_id);
        let receiver = self
            .write(&txn, receiver, LedgerOp::GiftIn, amount, in_ctx)
            .await?;

        txn.commit().await?;

        info!(
            from = %from_user_id,
            to = %to_user_id,
            amount,
            "Gifted credits"
        );

        Ok(GiftResult { sender, receiver })
    }

    /// Apply `op` inside the caller's transaction.
    ///
    /// Credit-side operations open a missing account on the fly.
    pub async fn apply_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        op: LedgerOp,
        amount: i64,
        ctx: LedgerContext,
    ) -> AppResult<LedgerResult> {
        ensure_positive(amount)?;

        let account = match self.credit_repo.find_by_user_for_update(conn, user_id).await? {
            Some(account) => account,
            None if op.is_credit() => self.create_empty(conn, user_id).await?,
            None => return Err(AppError::CreditAccountNotFound(user_id.to_string())),
        };

        self.write(conn, account, op, amount, ctx).await
    }

    /// Reserve credits inside the caller's transaction.
    pub async fn lock_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        amount: i64,
    ) -> AppResult<credit::Model> {
        let account = self.locked_account(conn, user_id).await?;
        let next = Balances::from(&account).lock(amount)?;
        self.store(conn, account, next).await
    }

    /// Release a reservation inside the caller's transaction.
    pub async fn unlock_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        amount: i64,
    ) -> AppResult<credit::Model> {
        let account = self.locked_account(conn, user_id).await?;
        let next = Balances::from(&account).unlock(amount)?;
        self.store(conn, account, next).await
    }

    async fn run(
        &self,
        user_id: &str,
        op: LedgerOp,
        amount: i64,
        ctx: LedgerContext,
    ) -> AppResult<LedgerResult> {
        ensure_positive(amount)?;

        let txn = self.db.begin().await?;
        let result = self.apply_in(&txn, user_id, op, amount, ctx).await?;
        txn.commit().await?;

        info!(
            user_id = %user_id,
            op = ?op,
            amount,
            balance = result.account.balance,
            "Applied credit change"
        );

        Ok(result)
    }

    async fn locked_account<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> AppResult<credit::Model> {
        self.credit_repo
            .find_by_user_for_update(conn, user_id)
            .await?
            .ok_or_else(|| AppError::CreditAccountNotFound(user_id.to_string()))
    }

    async fn create_empty<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
    ) -> AppResult<credit::Model> {
        let model = credit::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            balance: Set(0),
            total: Set(0),
            used: Set(0),
            personal_balance: Set(0),
            locked_balance: Set(0),
            created_at: Set(chrono::Utc::now().into()),
            updated_at: Set(None),
        };
        self.credit_repo.create(conn, model).await
    }

    async fn write<C: ConnectionTrait>(
        &self,
        conn: &C,
        account: credit::Model,
        op: LedgerOp,
        amount: i64,
        ctx: LedgerContext,
    ) -> AppResult<LedgerResult> {
        let entry = Balances::from(&account).apply(op, amount)?;
        let account = self.store(conn, account, entry.after).await?;

        let record = credit_record::ActiveModel {
            id: Set(self.id_gen.generate()),
            credit_id: Set(account.id.clone()),
            user_id: Set(account.user_id.clone()),
            record_type: Set(op.record_type()),
            amount: Set(entry.delta),
            balance_after: Set(account.balance),
            remark: Set(ctx.remark),
            operator_id: Set(ctx.operator_id),
            related_id: Set(ctx.related_id),
            created_at: Set(chrono::Utc::now().into()),
        };
        let record = self.credit_repo.insert_record(conn, record).await?;

        Ok(LedgerResult { account, record })
    }

    async fn store<C: ConnectionTrait>(
        &self,
        conn: &C,
        account: credit::Model,
        next: Balances,
    ) -> AppResult<credit::Model> {
        let mut active: credit::ActiveModel = account.into();
        active.balance = Set(next.balance);
        active.total = Set(next.total);
        active.used = Set(next.used);
        active.personal_balance = Set(next.personal);
        active.locked_balance = Set(next.locked);
        active.updated_at = Set(Some(chrono::Utc::now().into()));
        self.credit_repo.update(conn, active).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, Statement, Transaction, Value};

    fn balances(balance: i64, personal: i64) -> Balances {
        Balances {
            balance,
            total: balance,
            used: 0,
            personal,
            locked: 0,
        }
    }

    fn account(user_id: &str, b: Balances) -> credit::Model {
        credit::Model {
            id: format!("credit-{user_id}"),
            user_id: user_id.to_string(),
            balance: b.balance,
            total: b.total,
            used: b.used,
            personal_balance: b.personal,
            locked_balance: b.locked,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn record(user_id: &str, op: LedgerOp, amount: i64, after: i64) -> credit_record::Model {
        credit_record::Model {
            id: "rec1".to_string(),
            credit_id: format!("credit-{user_id}"),
            user_id: user_id.to_string(),
            record_type: op.record_type(),
            amount: op.signed(amount),
            balance_after: after,
            remark: None,
            operator_id: Some("admin".to_string()),
            related_id: None,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_allocate_then_deduct_restores_account() {
        let start = balances(40, 10);
        let up = start.apply(LedgerOp::Allocate, 25).unwrap();
        let down = up.after.apply(LedgerOp::Deduct, 25).unwrap();

        assert_eq!(down.after, start);
        assert_eq!(up.delta + down.delta, 0);
    }

    #[test]
    fn test_deduct_more_than_balance_fails() {
        let result = balances(5, 5).apply(LedgerOp::Deduct, 10);

        assert!(matches!(
            result,
            Err(AppError::CreditNotEnough {
                available: 5,
                required: 10
            })
        ));
    }

    #[test]
    fn test_non_positive_amount_is_rejected() {
        for amount in [0, -3] {
            assert!(matches!(
                balances(10, 10).apply(LedgerOp::Allocate, amount),
                Err(AppError::InvalidCreditAmount(_))
            ));
        }
    }

    #[test]
    fn test_consume_draws_corporate_first() {
        // 30 corporate + 20 personal
        let entry = balances(50, 20).apply(LedgerOp::Consume, 35).unwrap();

        assert_eq!(entry.after.balance, 15);
        assert_eq!(entry.after.personal, 15);
        assert_eq!(entry.after.used, 35);
        assert_eq!(entry.after.corporate(), 0);
    }

    #[test]
    fn test_deduct_draws_personal_first() {
        let entry = balances(50, 20).apply(LedgerOp::Deduct, 25).unwrap();

        assert_eq!(entry.after.personal, 0);
        assert_eq!(entry.after.corporate(), 25);
    }

    #[test]
    fn test_gift_limited_to_personal_portion() {
        let result = balances(50, 20).apply(LedgerOp::GiftOut, 30);

        assert!(matches!(
            result,
            Err(AppError::CreditNotEnough {
                available: 20,
                required: 30
            })
        ));
    }

    #[test]
    fn test_corporate_deduct_leaves_personal_untouched() {
        let entry = balances(50, 20)
            .apply(LedgerOp::CorporateDeduct, 30)
            .unwrap();
        assert_eq!(entry.after.personal, 20);
        assert_eq!(entry.after.balance, 20);

        assert!(matches!(
            balances(50, 20).apply(LedgerOp::CorporateDeduct, 31),
            Err(AppError::CreditNotEnough { .. })
        ));
    }

    #[test]
    fn test_locked_credits_are_not_spendable() {
        let locked = balances(20, 20).lock(15).unwrap();
        assert_eq!(locked.spendable(), 5);

        assert!(matches!(
            locked.apply(LedgerOp::Consume, 10),
            Err(AppError::CreditNotEnough {
                available: 5,
                required: 10
            })
        ));

        let released = locked.unlock(15).unwrap();
        assert_eq!(released.spendable(), 20);
        assert!(released.unlock(1).is_err());
    }

    #[test]
    fn test_refund_cannot_exceed_used() {
        let spent = balances(20, 0).apply(LedgerOp::Consume, 10).unwrap().after;

        let refunded = spent.apply(LedgerOp::Refund, 10).unwrap().after;
        assert_eq!(refunded.balance, 20);
        assert_eq!(refunded.used, 0);

        assert!(matches!(
            spent.apply(LedgerOp::Refund, 11),
            Err(AppError::InvalidCreditAmount(11))
        ));
    }

    #[test]
    fn test_overflowing_amount_is_rejected() {
        let start = Balances {
            balance: 1,
            total: 1,
            personal: 1,
            ..Balances::default()
        };

        assert!(matches!(
            start.apply(LedgerOp::Allocate, i64::MAX),
            Err(AppError::InvalidCreditAmount(i64::MAX))
        ));
        assert!(matches!(
            start.apply(LedgerOp::CorporateAdd, i64::MAX),
            Err(AppError::InvalidCreditAmount(_))
        ));
        assert!(start.apply(LedgerOp::Allocate, i64::MAX - 1).is_ok());
    }

    #[test]
    fn test_every_operation_keeps_invariants() {
        let mut b = Balances::default();
        let steps = [
            (LedgerOp::Allocate, 100),
            (LedgerOp::CorporateAdd, 50),
            (LedgerOp::Consume, 70),
            (LedgerOp::GiftOut, 30),
            (LedgerOp::Refund, 20),
            (LedgerOp::Deduct, 40),
            (LedgerOp::GiftIn, 5),
            (LedgerOp::CorporateDeduct, 10),
        ];

        for (op, amount) in steps {
            b = b.apply(op, amount).unwrap().after;
            assert!(b.is_consistent(), "{op:?} broke {b:?}");
        }
        assert_eq!(b.total, b.used + b.balance);
    }

    #[tokio::test]
    async fn test_service_deduct_not_enough() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[account("u1", balances(5, 5))]])
            .into_connection();
        let db = Arc::new(db);

        let service = CreditService::new(db.clone(), CreditRepository::new(db), 0);
        let result = service.deduct("admin", "u1", 10, None).await;

        assert!(matches!(
            result,
            Err(AppError::CreditNotEnough {
                available: 5,
                required: 10
            })
        ));
    }

    #[tokio::test]
    async fn test_service_deduct_missing_account() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<credit::Model>::new()])
            .into_connection();
        let db = Arc::new(db);

        let service = CreditService::new(db.clone(), CreditRepository::new(db), 0);
        let result = service.deduct("admin", "u1", 10, None).await;

        assert!(matches!(result, Err(AppError::CreditAccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_service_allocate_writes_record() {
        let before = balances(10, 10);
        let after = before.apply(LedgerOp::Allocate, 15).unwrap().after;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[account("u1", before)]])
            .append_query_results([[account("u1", after)]])
            .append_query_results([[record("u1", LedgerOp::Allocate, 15, 25)]])
            .into_connection();
        let db = Arc::new(db);

        let service = CreditService::new(db.clone(), CreditRepository::new(db), 0);
        let result = service
            .allocate("admin", "u1", 15, Some("bonus".to_string()))
            .await
            .unwrap();

        assert_eq!(result.account.balance, 25);
        assert_eq!(result.record.amount, 15);
        assert_eq!(result.record.balance_after, 25);
    }

    #[tokio::test]
    async fn test_service_zero_amount_touches_nothing() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service = CreditService::new(db.clone(), CreditRepository::new(db), 0);
        let result = service.allocate("admin", "u1", 0, None).await;

        assert!(matches!(result, Err(AppError::InvalidCreditAmount(0))));
    }

    fn service(db: &Arc<DatabaseConnection>) -> CreditService {
        CreditService::new(db.clone(), CreditRepository::new(db.clone()), 0)
    }

    /// Statements the mock connection saw, once every service holding it is gone.
    pub(crate) fn statements(db: Arc<DatabaseConnection>) -> Vec<Statement> {
        Arc::try_unwrap(db)
            .ok()
            .unwrap()
            .into_transaction_log()
            .iter()
            .flat_map(Transaction::statements)
            .cloned()
            .collect()
    }

    fn inserted_record_amounts(stmts: &[Statement]) -> Vec<Value> {
        stmts
            .iter()
            .filter(|s| s.sql.starts_with(r#"INSERT INTO "credit_record""#))
            .map(|s| s.values.as_ref().unwrap().0[4].clone())
            .collect()
    }

    #[tokio::test]
    async fn test_allocate_then_deduct_records_cancel_out() {
        let start = balances(40, 10);
        let up = start.apply(LedgerOp::Allocate, 25).unwrap().after;
        let down = up.apply(LedgerOp::Deduct, 25).unwrap().after;

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[account("u1", start)]])
                .append_query_results([[account("u1", up)]])
                .append_query_results([[record("u1", LedgerOp::Allocate, 25, up.balance)]])
                .append_query_results([[account("u1", up)]])
                .append_query_results([[account("u1", down)]])
                .append_query_results([[record("u1", LedgerOp::Deduct, 25, down.balance)]])
                .into_connection(),
        );

        let credits = service(&db);
        credits.allocate("admin", "u1", 25, None).await.unwrap();
        let result = credits.deduct("admin", "u1", 25, None).await.unwrap();
        drop(credits);

        assert_eq!(Balances::from(&result.account), start);
        let amounts = inserted_record_amounts(&statements(db));
        assert_eq!(amounts, vec![Value::from(25i64), Value::from(-25i64)]);
    }

    #[tokio::test]
    async fn test_gift_moves_personal_credits_to_new_account() {
        let sender_before = balances(30, 20);
        let sender_after = sender_before.apply(LedgerOp::GiftOut, 5).unwrap().after;
        let receiver_after = Balances::default().apply(LedgerOp::GiftIn, 5).unwrap().after;

        // "u1" sorts first, so the receiver row is locked before the sender row.
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<credit::Model>::new()])
                .append_query_results([[account("u2", sender_before)]])
                .append_query_results([[account("u2", sender_after)]])
                .append_query_results([[record("u2", LedgerOp::GiftOut, 5, 25)]])
                .append_query_results([[account("u1", Balances::default())]])
                .append_query_results([[account("u1", receiver_after)]])
                .append_query_results([[record("u1", LedgerOp::GiftIn, 5, 5)]])
                .into_connection(),
        );

        let credits = service(&db);
        let result = credits.gift("u2", "u1", 5, None).await.unwrap();
        drop(credits);

        assert_eq!(result.sender.account.balance, 25);
        assert_eq!(result.sender.account.personal_balance, 15);
        assert_eq!(result.receiver.account.personal_balance, 5);
        assert_eq!(result.sender.record.record_type, CreditRecordType::GiftOut);
        assert_eq!(result.receiver.record.record_type, CreditRecordType::GiftIn);

        let stmts = statements(db);
        let lock_order: Vec<Value> = stmts
            .iter()
            .filter(|s| s.sql.ends_with("FOR UPDATE"))
            .map(|s| s.values.as_ref().unwrap().0[0].clone())
            .collect();
        assert_eq!(lock_order, vec![Value::from("u1"), Value::from("u2")]);
        assert!(
            stmts
                .iter()
                .any(|s| s.sql.starts_with(r#"INSERT INTO "credit" "#))
        );
        let amounts = inserted_record_amounts(&stmts);
        assert_eq!(amounts, vec![Value::from(-5i64), Value::from(5i64)]);
    }

    #[tokio::test]
    async fn test_gift_more_than_personal_portion_writes_nothing() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[account("u1", balances(50, 10))]])
                .append_query_results([[account("u2", Balances::default())]])
                .into_connection(),
        );

        let result = service(&db).gift("u1", "u2", 20, None).await;

        assert!(matches!(
            result,
            Err(AppError::CreditNotEnough {
                available: 10,
                required: 20
            })
        ));
    }

    #[tokio::test]
    async fn test_gift_to_self_rejected() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let service = CreditService::new(db.clone(), CreditRepository::new(db), 0);
        let result = service.gift("u1", "u1", 5, None).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
