//! PostgreSQL ledger store
//!
//! Writes run in one transaction each. Anything that can lower stock locks
//! the affected `materials` rows `FOR UPDATE` in ascending id order and
//! recomputes stock inside the transaction before it writes, which
//! serializes concurrent sales and cancellations per material.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use shared::ledger::{self, CashPosting};
use shared::{
    CancelledMovement, CashBalance, CashKind, CashTransaction, Category, EntryKind, LedgerEntry,
    Material, MaterialChanges, MaterialFilter, MaterialStock, MovementFilter, MovementKind,
    NewCashTransaction, NewCategory, NewMaterial, NewPartner, NewPurchase, NewReceipt, NewSale, Page,
    Pagination, Partner, PartnerChanges, PartnerFilter, PartnerType, Purchase, Receipt,
    ReportRange, Sale, SaleItem, StockLevel,
};

use super::LedgerStore;
use crate::error::{AppError, AppResult};

/// Attempts at allocating a unique code before giving up
const CODE_ATTEMPTS: usize = 3;

const CATEGORY_COLUMNS: &str = "id, name, created_at";

const MATERIAL_COLUMNS: &str =
    "id, code, name, category, unit_of_measure, active, created_at, updated_at";

const PARTNER_COLUMNS: &str = "id, name, partner_type, cnpj, leader_name, phone, email, active, \
     created_at, updated_at";

const RECEIPT_COLUMNS: &str =
    "id, lot_code, date, partner_id, material_id, quantity, cancelled, created_at, cancelled_at";

const PURCHASE_COLUMNS: &str = "id, code, date, partner_id, material_id, quantity, \
     unit_price_paid, total_paid, cancelled, created_at, cancelled_at";

const SALE_COLUMNS: &str = "id, code, date, buyer_id, cancelled, created_at, cancelled_at";

const CASH_COLUMNS: &str = "id, kind, amount, description, purchase_id, sale_id, created_at";

/// Signed sum of live movements for the material aliased `m`
const STOCK_EXPR: &str = r#"
    COALESCE((SELECT SUM(r.quantity) FROM receipts r
              WHERE r.material_id = m.id AND NOT r.cancelled), 0)
  + COALESCE((SELECT SUM(p.quantity) FROM purchases p
              WHERE p.material_id = m.id AND NOT p.cancelled), 0)
  - COALESCE((SELECT SUM(si.quantity_sold) FROM sale_items si
              JOIN sales s ON s.id = si.sale_id
              WHERE si.material_id = m.id AND NOT s.cancelled), 0)
"#;

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct MaterialRow {
    id: Uuid,
    code: String,
    name: String,
    category: Option<String>,
    unit_of_measure: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MaterialRow> for Material {
    fn from(row: MaterialRow) -> Self {
        Material {
            id: row.id,
            code: row.code,
            name: row.name,
            category: row.category,
            unit_of_measure: row.unit_of_measure,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PartnerRow {
    id: Uuid,
    name: String,
    partner_type: String,
    cnpj: Option<String>,
    leader_name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PartnerRow> for Partner {
    type Error = AppError;

    fn try_from(row: PartnerRow) -> Result<Self, Self::Error> {
        Ok(Partner {
            id: row.id,
            name: row.name,
            partner_type: row.partner_type.parse::<PartnerType>()?,
            cnpj: row.cnpj,
            leader_name: row.leader_name,
            phone: row.phone,
            email: row.email,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReceiptRow {
    id: Uuid,
    lot_code: String,
    date: NaiveDate,
    partner_id: Uuid,
    material_id: Uuid,
    quantity: Decimal,
    cancelled: bool,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<ReceiptRow> for Receipt {
    fn from(row: ReceiptRow) -> Self {
        Receipt {
            id: row.id,
            lot_code: row.lot_code,
            date: row.date,
            partner_id: row.partner_id,
            material_id: row.material_id,
            quantity: row.quantity,
            cancelled: row.cancelled,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    id: Uuid,
    code: String,
    date: NaiveDate,
    partner_id: Uuid,
    material_id: Uuid,
    quantity: Decimal,
    unit_price_paid: Decimal,
    total_paid: Decimal,
    cancelled: bool,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl From<PurchaseRow> for Purchase {
    fn from(row: PurchaseRow) -> Self {
        Purchase {
            id: row.id,
            code: row.code,
            date: row.date,
            partner_id: row.partner_id,
            material_id: row.material_id,
            quantity: row.quantity,
            unit_price_paid: row.unit_price_paid,
            total_paid: row.total_paid,
            cancelled: row.cancelled,
            created_at: row.created_at,
            cancelled_at: row.cancelled_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: Uuid,
    code: String,
    date: NaiveDate,
    buyer_id: Uuid,
    cancelled: bool,
    created_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> Sale {
        Sale {
            id: self.id,
            code: self.code,
            date: self.date,
            buyer_id: self.buyer_id,
            cancelled: self.cancelled,
            items,
            created_at: self.created_at,
            cancelled_at: self.cancelled_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleItemRow {
    id: Uuid,
    sale_id: Uuid,
    material_id: Uuid,
    quantity_sold: Decimal,
    unit_price: Decimal,
}

impl From<SaleItemRow> for SaleItem {
    fn from(row: SaleItemRow) -> Self {
        SaleItem {
            id: row.id,
            sale_id: row.sale_id,
            material_id: row.material_id,
            quantity_sold: row.quantity_sold,
            unit_price: row.unit_price,
        }
    }
}

#[derive(Debug, FromRow)]
struct CashRow {
    id: Uuid,
    kind: String,
    amount: Decimal,
    description: Option<String>,
    purchase_id: Option<Uuid>,
    sale_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CashRow> for CashTransaction {
    type Error = AppError;

    fn try_from(row: CashRow) -> Result<Self, Self::Error> {
        Ok(CashTransaction {
            id: row.id,
            kind: row.kind.parse::<CashKind>()?,
            amount: row.amount,
            description: row.description,
            purchase_id: row.purchase_id,
            sale_id: row.sale_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MaterialStockRow {
    id: Uuid,
    code: String,
    name: String,
    category: Option<String>,
    unit_of_measure: String,
    current_stock: Decimal,
}

impl From<MaterialStockRow> for MaterialStock {
    fn from(row: MaterialStockRow) -> Self {
        MaterialStock {
            id: row.id,
            code: row.code,
            name: row.name,
            category: row.category,
            unit_of_measure: row.unit_of_measure,
            current_stock: row.current_stock,
        }
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    kind: String,
    movement_id: Uuid,
    date: NaiveDate,
    material_id: Uuid,
    material_name: String,
    unit_of_measure: String,
    partner_id: Uuid,
    partner_name: String,
    partner_type: String,
    quantity: Decimal,
    amount: Decimal,
    cancelled: bool,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = AppError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(LedgerEntry {
            kind: row.kind.parse::<EntryKind>().map_err(AppError::Internal)?,
            movement_id: row.movement_id,
            date: row.date,
            material_id: row.material_id,
            material_name: row.material_name,
            unit_of_measure: row.unit_of_measure,
            partner_id: row.partner_id,
            partner_name: row.partner_name,
            partner_type: row.partner_type.parse::<PartnerType>()?,
            quantity: row.quantity,
            amount: row.amount,
            cancelled: row.cancelled,
        })
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

/// True when `err` is a violation of the named constraint or unique index
fn violates(err: &sqlx::Error, constraint: &str) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.constraint() == Some(constraint))
}

fn code_exhausted(resource: &str) -> AppError {
    AppError::conflict(resource, "Could not allocate a unique code, please retry")
}

fn not_found_for(kind: Option<MovementKind>) -> AppError {
    AppError::not_found(match kind {
        None => "Movement",
        Some(MovementKind::Receipt) => "Receipt",
        Some(MovementKind::Purchase) => "Purchase",
        Some(MovementKind::Sale) => "Sale",
    })
}

/// Catalog spelling of a material's category; blank clears it
async fn category_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    name: Option<&str>,
) -> AppResult<Option<String>> {
    let Some(name) = name.and_then(shared::non_empty) else {
        return Ok(None);
    };
    sqlx::query_scalar::<_, String>(
        "SELECT name FROM categories WHERE LOWER(name) = LOWER($1) FOR SHARE",
    )
    .bind(name)
    .fetch_optional(&mut **tx)
    .await?
    .map(Some)
    .ok_or_else(|| AppError::validation("category", "Unknown category"))
}

async fn partner_in_tx(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<Partner> {
    let sql = format!("SELECT {PARTNER_COLUMNS} FROM partners WHERE id = $1");
    sqlx::query_as::<_, PartnerRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::not_found("Partner"))?
        .try_into()
}

/// Lock material rows in ascending id order; `ids` must be distinct
async fn lock_materials(tx: &mut Transaction<'_, Postgres>, ids: &[Uuid]) -> AppResult<()> {
    let locked = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM materials WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(ids)
    .fetch_all(&mut **tx)
    .await?;

    if locked.len() != ids.len() {
        return Err(AppError::not_found("Material"));
    }
    Ok(())
}

/// Current stock of each material, read inside the caller's transaction
async fn on_hand(
    tx: &mut Transaction<'_, Postgres>,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Decimal>> {
    let sql = format!("SELECT m.id, {STOCK_EXPR} AS on_hand FROM materials m WHERE m.id = ANY($1)");
    let rows = sqlx::query_as::<_, (Uuid, Decimal)>(&sql)
        .bind(ids)
        .fetch_all(&mut **tx)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn next_code(
    tx: &mut Transaction<'_, Postgres>,
    kind: MovementKind,
    day: NaiveDate,
) -> AppResult<String> {
    let sql = match kind {
        MovementKind::Receipt => "SELECT COUNT(*) FROM receipts WHERE lot_code LIKE $1 || '%'",
        MovementKind::Purchase => "SELECT COUNT(*) FROM purchases WHERE code LIKE $1 || '%'",
        MovementKind::Sale => "SELECT COUNT(*) FROM sales WHERE code LIKE $1 || '%'",
    };
    let issued = sqlx::query_scalar::<_, i64>(sql)
        .bind(ledger::code_prefix(kind, day))
        .fetch_one(&mut **tx)
        .await?;
    Ok(ledger::movement_code(kind, day, issued as u32 + 1))
}

async fn book(
    tx: &mut Transaction<'_, Postgres>,
    posting: CashPosting,
    purchase_id: Option<Uuid>,
    sale_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO cash_transactions (id, kind, amount, description, purchase_id, sale_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(posting.kind.as_str())
    .bind(posting.amount)
    .bind(&posting.description)
    .bind(purchase_id)
    .bind(sale_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn sale_items<'e, E>(executor: E, sale_ids: &[Uuid]) -> AppResult<HashMap<Uuid, Vec<SaleItem>>>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, SaleItemRow>(
        r#"
        SELECT id, sale_id, material_id, quantity_sold, unit_price
        FROM sale_items
        WHERE sale_id = ANY($1)
        ORDER BY sale_id, id
        "#,
    )
    .bind(sale_ids)
    .fetch_all(executor)
    .await?;

    let mut items: HashMap<Uuid, Vec<SaleItem>> = HashMap::new();
    for row in rows {
        items.entry(row.sale_id).or_default().push(row.into());
    }
    Ok(items)
}

// ============================================================================
// Cancellation
// ============================================================================

/// Returns false when the id is not a live receipt
async fn cancel_receipt(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let row = sqlx::query_as::<_, (Uuid, Decimal, bool)>(
        "SELECT material_id, quantity, cancelled FROM receipts WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut **tx)
    .await?;
    let Some((material_id, quantity, false)) = row else {
        return Ok(false);
    };

    lock_materials(tx, &[material_id]).await?;
    let stock = on_hand(tx, &[material_id]).await?;
    ledger::check_inflow_cancellation(
        material_id,
        stock.get(&material_id).copied().unwrap_or_default(),
        quantity,
    )?;

    sqlx::query("UPDATE receipts SET cancelled = TRUE, cancelled_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(&mut **tx)
        .await?;
    Ok(true)
}

async fn cancel_purchase(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, PurchaseRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    let Some(purchase) = row.map(Purchase::from).filter(|p| !p.cancelled) else {
        return Ok(false);
    };

    lock_materials(tx, &[purchase.material_id]).await?;
    let stock = on_hand(tx, &[purchase.material_id]).await?;
    ledger::check_inflow_cancellation(
        purchase.material_id,
        stock.get(&purchase.material_id).copied().unwrap_or_default(),
        purchase.quantity,
    )?;

    sqlx::query("UPDATE purchases SET cancelled = TRUE, cancelled_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(&mut **tx)
        .await?;

    if let Some(posting) = ledger::purchase_posting(&purchase) {
        book(tx, posting.reversal(), Some(id), None, now).await?;
    }
    Ok(true)
}

async fn cancel_sale(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, SaleRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
    let Some(row) = row.filter(|s| !s.cancelled) else {
        return Ok(false);
    };

    let mut items = sale_items(&mut **tx, &[id]).await?;
    let sale = row.into_sale(items.remove(&id).unwrap_or_default());
    lock_materials(tx, &sale.material_ids()).await?;

    sqlx::query("UPDATE sales SET cancelled = TRUE, cancelled_at = $2 WHERE id = $1")
        .bind(id)
        .bind(now)
        .execute(&mut **tx)
        .await?;

    book(tx, ledger::sale_posting(&sale)?.reversal(), None, Some(id), now).await?;
    Ok(true)
}

// ============================================================================
// Writes that allocate codes
// ============================================================================

impl PgStore {
    /// `Ok(None)` means the generated code collided and the caller may retry
    async fn try_insert_material(&self, input: &NewMaterial) -> AppResult<Option<Material>> {
        let mut tx = self.db.begin().await?;
        let category = category_in_tx(&mut tx, input.category.as_deref()).await?;
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM materials")
            .fetch_one(&mut *tx)
            .await?;

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO materials (id, code, name, category, unit_of_measure, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $6, $6) RETURNING {MATERIAL_COLUMNS}"
        );
        let result = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(ledger::material_code(count + 1))
            .bind(input.name.trim())
            .bind(category)
            .bind(input.unit_or_default())
            .bind(now)
            .fetch_one(&mut *tx)
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) if violates(&e, "materials_code_key") => return Ok(None),
            Err(e) if violates(&e, "materials_name_key") => {
                return Err(AppError::conflict(
                    "name",
                    "A material with this name already exists",
                ))
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn try_insert_receipt(
        &self,
        input: &NewReceipt,
        date: NaiveDate,
    ) -> AppResult<Option<Receipt>> {
        let mut tx = self.db.begin().await?;
        partner_in_tx(&mut tx, input.partner_id).await?;
        lock_materials(&mut tx, &[input.material_id]).await?;

        let now = Utc::now();
        let lot_code = next_code(&mut tx, MovementKind::Receipt, now.date_naive()).await?;
        let sql = format!(
            "INSERT INTO receipts (id, lot_code, date, partner_id, material_id, quantity, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {RECEIPT_COLUMNS}"
        );
        let result = sqlx::query_as::<_, ReceiptRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&lot_code)
            .bind(date)
            .bind(input.partner_id)
            .bind(input.material_id)
            .bind(input.quantity)
            .bind(now)
            .fetch_one(&mut *tx)
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) if violates(&e, "receipts_lot_code_key") => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        Ok(Some(row.into()))
    }

    async fn try_insert_purchase(
        &self,
        input: &NewPurchase,
        date: NaiveDate,
    ) -> AppResult<Option<Purchase>> {
        let mut tx = self.db.begin().await?;
        partner_in_tx(&mut tx, input.partner_id).await?;
        lock_materials(&mut tx, &[input.material_id]).await?;

        let now = Utc::now();
        let code = next_code(&mut tx, MovementKind::Purchase, now.date_naive()).await?;
        let sql = format!(
            "INSERT INTO purchases (id, code, date, partner_id, material_id, quantity, unit_price_paid, total_paid, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {PURCHASE_COLUMNS}"
        );
        let result = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(&code)
            .bind(date)
            .bind(input.partner_id)
            .bind(input.material_id)
            .bind(input.quantity)
            .bind(input.unit_price_paid)
            .bind(ledger::purchase_total(input.quantity, input.unit_price_paid)?)
            .bind(now)
            .fetch_one(&mut *tx)
            .await;

        let purchase: Purchase = match result {
            Ok(row) => row.into(),
            Err(e) if violates(&e, "purchases_code_key") => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if let Some(posting) = ledger::purchase_posting(&purchase) {
            book(&mut tx, posting, Some(purchase.id), None, now).await?;
        }
        tx.commit().await?;
        Ok(Some(purchase))
    }

    async fn try_insert_sale(&self, input: &NewSale, date: NaiveDate) -> AppResult<Option<Sale>> {
        let mut tx = self.db.begin().await?;
        let buyer = partner_in_tx(&mut tx, input.buyer_id).await?;
        ledger::ensure_buyer(&buyer)?;

        let requested = ledger::requested_by_material(&input.items)?;
        let material_ids: Vec<Uuid> = requested.keys().copied().collect();
        lock_materials(&mut tx, &material_ids).await?;
        let stock = on_hand(&mut tx, &material_ids).await?;
        ledger::check_sale_availability(&requested, |id| {
            stock.get(&id).copied().unwrap_or_default()
        })?;

        let now = Utc::now();
        let sale_id = Uuid::new_v4();
        let code = next_code(&mut tx, MovementKind::Sale, now.date_naive()).await?;
        let sql = format!(
            "INSERT INTO sales (id, code, date, buyer_id, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {SALE_COLUMNS}"
        );
        let result = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(sale_id)
            .bind(&code)
            .bind(date)
            .bind(input.buyer_id)
            .bind(now)
            .fetch_one(&mut *tx)
            .await;

        let header = match result {
            Ok(row) => row,
            Err(e) if violates(&e, "sales_code_key") => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::with_capacity(input.items.len());
        for item in &input.items {
            let row = sqlx::query_as::<_, SaleItemRow>(
                r#"
                INSERT INTO sale_items (id, sale_id, material_id, quantity_sold, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, sale_id, material_id, quantity_sold, unit_price
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(sale_id)
            .bind(item.material_id)
            .bind(item.quantity_sold)
            .bind(item.unit_price)
            .fetch_one(&mut *tx)
            .await?;
            items.push(SaleItem::from(row));
        }

        let sale = header.into_sale(items);
        let posting = ledger::sale_posting(&sale)?;
        book(&mut tx, posting, None, Some(sale.id), now).await?;
        tx.commit().await?;
        Ok(Some(sale))
    }

    async fn fetch_material(&self, id: Uuid) -> AppResult<Material> {
        let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = $1");
        let row = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Material"))?;
        Ok(row.into())
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn create_category(&self, input: NewCategory) -> AppResult<Category> {
        let sql = format!(
            "INSERT INTO categories (id, name, created_at) VALUES ($1, $2, $3) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        let result = sqlx::query_as::<_, CategoryRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.name.trim())
            .bind(Utc::now())
            .fetch_one(&self.db)
            .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(e)
                if violates(&e, "categories_name_key") || violates(&e, "categories_name_ref") =>
            {
                Err(AppError::conflict(
                    "name",
                    "A category with this name already exists",
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name");
        let rows = sqlx::query_as::<_, CategoryRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn create_material(&self, input: NewMaterial) -> AppResult<Material> {
        for _ in 0..CODE_ATTEMPTS {
            if let Some(material) = self.try_insert_material(&input).await? {
                return Ok(material);
            }
            tracing::debug!("Material code collision, retrying");
        }
        Err(code_exhausted("code"))
    }

    async fn update_material(&self, id: Uuid, changes: MaterialChanges) -> AppResult<Material> {
        let mut tx = self.db.begin().await?;
        let sql = format!("SELECT {MATERIAL_COLUMNS} FROM materials WHERE id = $1 FOR UPDATE");
        let mut material: Material = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Material"))?
            .into();
        let category = match changes.category.as_deref() {
            Some(name) => Some(category_in_tx(&mut tx, Some(name)).await?),
            None => None,
        };
        changes.apply(&mut material, Utc::now());
        if let Some(category) = category {
            material.category = category;
        }

        let sql = format!(
            "UPDATE materials SET name = $2, category = $3, unit_of_measure = $4, active = $5, updated_at = $6 \
             WHERE id = $1 RETURNING {MATERIAL_COLUMNS}"
        );
        let result = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(id)
            .bind(&material.name)
            .bind(&material.category)
            .bind(&material.unit_of_measure)
            .bind(material.active)
            .bind(material.updated_at)
            .fetch_one(&mut *tx)
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) if violates(&e, "materials_name_key") => {
                return Err(AppError::conflict(
                    "name",
                    "A material with this name already exists",
                ))
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        Ok(row.into())
    }

    async fn deactivate_material(&self, id: Uuid) -> AppResult<Material> {
        let sql = format!(
            "UPDATE materials SET active = FALSE, updated_at = $2 WHERE id = $1 AND active \
             RETURNING {MATERIAL_COLUMNS}"
        );
        let row = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Material"))?;
        Ok(row.into())
    }

    async fn get_material(&self, id: Uuid) -> AppResult<Material> {
        self.fetch_material(id).await
    }

    async fn list_materials(
        &self,
        filter: &MaterialFilter,
        page: Pagination,
    ) -> AppResult<Page<Material>> {
        let page = page.normalized();
        let name = filter.name.as_deref().map(str::trim);
        let sql = format!(
            "SELECT {MATERIAL_COLUMNS} FROM materials \
             WHERE ($1::BOOLEAN OR active) AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%') \
             ORDER BY name LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, MaterialRow>(&sql)
            .bind(filter.include_inactive)
            .bind(name)
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(&self.db)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM materials \
             WHERE ($1::BOOLEAN OR active) AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%')",
        )
        .bind(filter.include_inactive)
        .bind(name)
        .fetch_one(&self.db)
        .await?;

        Ok(Page::new(rows.into_iter().map(Material::from).collect(), total))
    }

    async fn create_partner(&self, input: NewPartner) -> AppResult<Partner> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO partners (id, name, partner_type, cnpj, leader_name, phone, email, active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $8) RETURNING {PARTNER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, PartnerRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.name.trim())
            .bind(input.partner_type.as_str())
            .bind(input.cnpj.as_deref().and_then(shared::normalize_cnpj))
            .bind(input.leader_name.as_deref().and_then(shared::non_empty))
            .bind(input.phone.as_deref().and_then(shared::non_empty))
            .bind(input.email.as_deref().and_then(shared::non_empty))
            .bind(now)
            .fetch_one(&self.db)
            .await;

        match result {
            Ok(row) => row.try_into(),
            Err(e) if violates(&e, "partners_name_key") => Err(AppError::conflict(
                "name",
                "A partner with this name already exists",
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_partner(&self, id: Uuid, changes: PartnerChanges) -> AppResult<Partner> {
        let mut tx = self.db.begin().await?;
        let sql = format!("SELECT {PARTNER_COLUMNS} FROM partners WHERE id = $1 FOR UPDATE");
        let mut partner: Partner = sqlx::query_as::<_, PartnerRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Partner"))?
            .try_into()?;
        changes.apply(&mut partner, Utc::now());

        let sql = format!(
            "UPDATE partners SET name = $2, partner_type = $3, cnpj = $4, leader_name = $5, phone = $6, \
             email = $7, active = $8, updated_at = $9 WHERE id = $1 RETURNING {PARTNER_COLUMNS}"
        );
        let result = sqlx::query_as::<_, PartnerRow>(&sql)
            .bind(id)
            .bind(&partner.name)
            .bind(partner.partner_type.as_str())
            .bind(&partner.cnpj)
            .bind(&partner.leader_name)
            .bind(&partner.phone)
            .bind(&partner.email)
            .bind(partner.active)
            .bind(partner.updated_at)
            .fetch_one(&mut *tx)
            .await;

        let row = match result {
            Ok(row) => row,
            Err(e) if violates(&e, "partners_name_key") => {
                return Err(AppError::conflict(
                    "name",
                    "A partner with this name already exists",
                ))
            }
            Err(e) => return Err(e.into()),
        };
        tx.commit().await?;
        row.try_into()
    }

    async fn deactivate_partner(&self, id: Uuid) -> AppResult<Partner> {
        let sql = format!(
            "UPDATE partners SET active = FALSE, updated_at = $2 WHERE id = $1 AND active \
             RETURNING {PARTNER_COLUMNS}"
        );
        sqlx::query_as::<_, PartnerRow>(&sql)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Partner"))?
            .try_into()
    }

    async fn get_partner(&self, id: Uuid) -> AppResult<Partner> {
        let sql = format!("SELECT {PARTNER_COLUMNS} FROM partners WHERE id = $1");
        sqlx::query_as::<_, PartnerRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Partner"))?
            .try_into()
    }

    async fn list_partners(
        &self,
        filter: &PartnerFilter,
        page: Pagination,
    ) -> AppResult<Page<Partner>> {
        let page = page.normalized();
        let name = filter.name.as_deref().map(str::trim);
        let partner_type = filter.partner_type.map(|t| t.as_str());
        let sql = format!(
            "SELECT {PARTNER_COLUMNS} FROM partners \
             WHERE ($1::BOOLEAN OR active) \
               AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%') \
               AND ($3::TEXT IS NULL OR partner_type = $3) \
             ORDER BY name LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query_as::<_, PartnerRow>(&sql)
            .bind(filter.include_inactive)
            .bind(name)
            .bind(partner_type)
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(&self.db)
            .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM partners \
             WHERE ($1::BOOLEAN OR active) \
               AND ($2::TEXT IS NULL OR name ILIKE '%' || $2 || '%') \
               AND ($3::TEXT IS NULL OR partner_type = $3)",
        )
        .bind(filter.include_inactive)
        .bind(name)
        .bind(partner_type)
        .fetch_one(&self.db)
        .await?;

        let partners = rows
            .into_iter()
            .map(Partner::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(partners, total))
    }

    async fn insert_receipt(&self, input: NewReceipt, date: NaiveDate) -> AppResult<Receipt> {
        for _ in 0..CODE_ATTEMPTS {
            if let Some(receipt) = self.try_insert_receipt(&input, date).await? {
                return Ok(receipt);
            }
            tracing::debug!("Receipt lot code collision, retrying");
        }
        Err(code_exhausted("lot_code"))
    }

    async fn insert_purchase(&self, input: NewPurchase, date: NaiveDate) -> AppResult<Purchase> {
        for _ in 0..CODE_ATTEMPTS {
            if let Some(purchase) = self.try_insert_purchase(&input, date).await? {
                return Ok(purchase);
            }
            tracing::debug!("Purchase code collision, retrying");
        }
        Err(code_exhausted("code"))
    }

    async fn insert_sale(&self, input: NewSale, date: NaiveDate) -> AppResult<Sale> {
        for _ in 0..CODE_ATTEMPTS {
            if let Some(sale) = self.try_insert_sale(&input, date).await? {
                return Ok(sale);
            }
            tracing::debug!("Sale code collision, retrying");
        }
        Err(code_exhausted("code"))
    }

    async fn cancel_movement(
        &self,
        id: Uuid,
        kind: Option<MovementKind>,
    ) -> AppResult<CancelledMovement> {
        let mut tx = self.db.begin().await?;
        let now = Utc::now();

        for candidate in [MovementKind::Receipt, MovementKind::Purchase, MovementKind::Sale] {
            if kind.map_or(false, |k| k != candidate) {
                continue;
            }
            let cancelled = match candidate {
                MovementKind::Receipt => cancel_receipt(&mut tx, id, now).await?,
                MovementKind::Purchase => cancel_purchase(&mut tx, id, now).await?,
                MovementKind::Sale => cancel_sale(&mut tx, id, now).await?,
            };
            if cancelled {
                tx.commit().await?;
                return Ok(CancelledMovement {
                    id,
                    kind: candidate,
                    cancelled_at: now,
                });
            }
        }

        Err(not_found_for(kind))
    }

    async fn get_receipt(&self, id: Uuid) -> AppResult<Receipt> {
        let sql = format!("SELECT {RECEIPT_COLUMNS} FROM receipts WHERE id = $1");
        let row = sqlx::query_as::<_, ReceiptRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Receipt"))?;
        Ok(row.into())
    }

    async fn get_purchase(&self, id: Uuid) -> AppResult<Purchase> {
        let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1");
        let row = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase"))?;
        Ok(row.into())
    }

    async fn get_sale(&self, id: Uuid) -> AppResult<Sale> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = $1");
        let row = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Sale"))?;
        let mut items = sale_items(&self.db, &[id]).await?;
        Ok(row.into_sale(items.remove(&id).unwrap_or_default()))
    }

    async fn list_receipts(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<Page<Receipt>> {
        let page = page.normalized();
        let conditions = "($1::BOOLEAN OR NOT cancelled) \
             AND ($2::DATE IS NULL OR date >= $2) AND ($3::DATE IS NULL OR date <= $3) \
             AND ($4::UUID IS NULL OR partner_id = $4) AND ($5::UUID IS NULL OR material_id = $5)";

        let sql = format!(
            "SELECT {RECEIPT_COLUMNS} FROM receipts WHERE {conditions} \
             ORDER BY date DESC, created_at DESC LIMIT $6 OFFSET $7"
        );
        let rows = sqlx::query_as::<_, ReceiptRow>(&sql)
            .bind(filter.include_cancelled)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.partner_id)
            .bind(filter.material_id)
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(&self.db)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM receipts WHERE {conditions}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.include_cancelled)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.partner_id)
            .bind(filter.material_id)
            .fetch_one(&self.db)
            .await?;

        Ok(Page::new(rows.into_iter().map(Receipt::from).collect(), total))
    }

    async fn list_purchases(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<Page<Purchase>> {
        let page = page.normalized();
        let conditions = "($1::BOOLEAN OR NOT cancelled) \
             AND ($2::DATE IS NULL OR date >= $2) AND ($3::DATE IS NULL OR date <= $3) \
             AND ($4::UUID IS NULL OR partner_id = $4) AND ($5::UUID IS NULL OR material_id = $5)";

        let sql = format!(
            "SELECT {PURCHASE_COLUMNS} FROM purchases WHERE {conditions} \
             ORDER BY date DESC, created_at DESC LIMIT $6 OFFSET $7"
        );
        let rows = sqlx::query_as::<_, PurchaseRow>(&sql)
            .bind(filter.include_cancelled)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.partner_id)
            .bind(filter.material_id)
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(&self.db)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM purchases WHERE {conditions}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.include_cancelled)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.partner_id)
            .bind(filter.material_id)
            .fetch_one(&self.db)
            .await?;

        Ok(Page::new(rows.into_iter().map(Purchase::from).collect(), total))
    }

    async fn list_sales(&self, filter: &MovementFilter, page: Pagination) -> AppResult<Page<Sale>> {
        let page = page.normalized();
        let conditions = "($1::BOOLEAN OR NOT s.cancelled) \
             AND ($2::DATE IS NULL OR s.date >= $2) AND ($3::DATE IS NULL OR s.date <= $3) \
             AND ($4::UUID IS NULL OR s.buyer_id = $4) \
             AND ($5::UUID IS NULL OR EXISTS ( \
                 SELECT 1 FROM sale_items si WHERE si.sale_id = s.id AND si.material_id = $5))";

        let sql = format!(
            "SELECT s.id, s.code, s.date, s.buyer_id, s.cancelled, s.created_at, s.cancelled_at \
             FROM sales s WHERE {conditions} \
             ORDER BY s.date DESC, s.created_at DESC LIMIT $6 OFFSET $7"
        );
        let rows = sqlx::query_as::<_, SaleRow>(&sql)
            .bind(filter.include_cancelled)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.partner_id)
            .bind(filter.material_id)
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(&self.db)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM sales s WHERE {conditions}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.include_cancelled)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(filter.partner_id)
            .bind(filter.material_id)
            .fetch_one(&self.db)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut items = sale_items(&self.db, &ids).await?;
        let sales = rows
            .into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_sale(lines)
            })
            .collect();
        Ok(Page::new(sales, total))
    }

    async fn stock_of(&self, material_id: Uuid) -> AppResult<StockLevel> {
        let sql = format!(
            "SELECT m.unit_of_measure, {STOCK_EXPR} AS on_hand FROM materials m WHERE m.id = $1"
        );
        let (unit_of_measure, quantity) = sqlx::query_as::<_, (String, Decimal)>(&sql)
            .bind(material_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Material"))?;

        Ok(StockLevel {
            material_id,
            quantity,
            unit_of_measure,
        })
    }

    async fn list_stock(
        &self,
        filter: &MaterialFilter,
        page: Pagination,
    ) -> AppResult<Page<MaterialStock>> {
        let page = page.normalized();
        let name = filter.name.as_deref().map(str::trim);
        let conditions =
            "($1::BOOLEAN OR m.active) AND ($2::TEXT IS NULL OR m.name ILIKE '%' || $2 || '%')";

        let sql = format!(
            "SELECT m.id, m.code, m.name, m.category, m.unit_of_measure, {STOCK_EXPR} AS current_stock \
             FROM materials m WHERE {conditions} ORDER BY m.name LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, MaterialStockRow>(&sql)
            .bind(filter.include_inactive)
            .bind(name)
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(&self.db)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM materials m WHERE {conditions}");
        let total = sqlx::query_scalar::<_, i64>(&count_sql)
            .bind(filter.include_inactive)
            .bind(name)
            .fetch_one(&self.db)
            .await?;

        Ok(Page::new(
            rows.into_iter().map(MaterialStock::from).collect(),
            total,
        ))
    }

    async fn ledger_entries(&self, range: &ReportRange) -> AppResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT 'receipt'::TEXT AS kind, r.id AS movement_id, r.date, r.material_id,
                   m.name AS material_name, m.unit_of_measure, r.partner_id,
                   p.name AS partner_name, p.partner_type, r.quantity,
                   0::NUMERIC AS amount, r.cancelled
            FROM receipts r
            JOIN materials m ON m.id = r.material_id
            JOIN partners p ON p.id = r.partner_id
            WHERE ($1::DATE IS NULL OR r.date >= $1) AND ($2::DATE IS NULL OR r.date <= $2)

            UNION ALL

            SELECT 'purchase'::TEXT, pu.id, pu.date, pu.material_id,
                   m.name, m.unit_of_measure, pu.partner_id,
                   p.name, p.partner_type, pu.quantity,
                   pu.total_paid, pu.cancelled
            FROM purchases pu
            JOIN materials m ON m.id = pu.material_id
            JOIN partners p ON p.id = pu.partner_id
            WHERE ($1::DATE IS NULL OR pu.date >= $1) AND ($2::DATE IS NULL OR pu.date <= $2)

            UNION ALL

            SELECT 'sale_item'::TEXT, s.id, s.date, si.material_id,
                   m.name, m.unit_of_measure, s.buyer_id,
                   p.name, p.partner_type, si.quantity_sold,
                   si.quantity_sold * si.unit_price, s.cancelled
            FROM sale_items si
            JOIN sales s ON s.id = si.sale_id
            JOIN materials m ON m.id = si.material_id
            JOIN partners p ON p.id = s.buyer_id
            WHERE ($1::DATE IS NULL OR s.date >= $1) AND ($2::DATE IS NULL OR s.date <= $2)
            "#,
        )
        .bind(range.start_date)
        .bind(range.end_date)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    async fn cash_balance(&self) -> AppResult<CashBalance> {
        let (total_inflow, total_outflow) = sqlx::query_as::<_, (Decimal, Decimal)>(
            r#"
            SELECT COALESCE(SUM(CASE WHEN kind = 'INFLOW' THEN amount END), 0),
                   COALESCE(SUM(CASE WHEN kind = 'OUTFLOW' THEN amount END), 0)
            FROM cash_transactions
            "#,
        )
        .fetch_one(&self.db)
        .await?;

        Ok(CashBalance::from_totals(total_inflow, total_outflow)?)
    }

    async fn list_cash_transactions(&self, page: Pagination) -> AppResult<Page<CashTransaction>> {
        let page = page.normalized();
        let sql = format!(
            "SELECT {CASH_COLUMNS} FROM cash_transactions \
             ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, CashRow>(&sql)
            .bind(page.limit)
            .bind(page.skip)
            .fetch_all(&self.db)
            .await?;

        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cash_transactions")
            .fetch_one(&self.db)
            .await?;

        let transactions = rows
            .into_iter()
            .map(CashTransaction::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Page::new(transactions, total))
    }

    async fn insert_cash_transaction(
        &self,
        input: NewCashTransaction,
    ) -> AppResult<CashTransaction> {
        let sql = format!(
            "INSERT INTO cash_transactions (id, kind, amount, description, created_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {CASH_COLUMNS}"
        );
        sqlx::query_as::<_, CashRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(input.kind.as_str())
            .bind(input.amount)
            .bind(input.description.as_deref().and_then(shared::non_empty))
            .bind(Utc::now())
            .fetch_one(&self.db)
            .await?
            .try_into()
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}
