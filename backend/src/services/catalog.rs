//! Catalog service for waste categories, materials and partners

use std::sync::Arc;

use uuid::Uuid;
use validator::Validate;

use shared::{
    Category, Material, MaterialChanges, MaterialFilter, NewCategory, NewMaterial, NewPartner,
    Page, Pagination, Partner, PartnerChanges, PartnerFilter,
};

use crate::error::AppResult;
use crate::store::LedgerStore;

/// Catalog service for registering and maintaining materials and partners
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn LedgerStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// Register a category; names are unique ignoring case
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: NewCategory) -> AppResult<Category> {
        input.validate()?;
        let category = self.store.create_category(input).await?;
        tracing::info!(category_id = %category.id, "Category registered");
        Ok(category)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.store.list_categories().await
    }

    // ========================================================================
    // Materials
    // ========================================================================

    /// Register a material; its code is generated
    #[tracing::instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_material(&self, input: NewMaterial) -> AppResult<Material> {
        input.validate()?;
        let material = self.store.create_material(input).await?;
        tracing::info!(material_id = %material.id, code = %material.code, "Material registered");
        Ok(material)
    }

    #[tracing::instrument(skip(self, changes))]
    pub async fn update_material(&self, id: Uuid, changes: MaterialChanges) -> AppResult<Material> {
        changes.validate()?;
        let material = self.store.update_material(id, changes).await?;
        tracing::info!(material_id = %id, "Material updated");
        Ok(material)
    }

    /// Soft delete; history and stock stay intact
    #[tracing::instrument(skip(self))]
    pub async fn deactivate_material(&self, id: Uuid) -> AppResult<Material> {
        let material = self.store.deactivate_material(id).await?;
        tracing::info!(material_id = %id, "Material deactivated");
        Ok(material)
    }

    pub async fn get_material(&self, id: Uuid) -> AppResult<Material> {
        self.store.get_material(id).await
    }

    pub async fn list_materials(
        &self,
        filter: &MaterialFilter,
        page: Pagination,
    ) -> AppResult<Page<Material>> {
        self.store.list_materials(filter, page.normalized()).await
    }

    // ========================================================================
    // Partners
    // ========================================================================

    #[tracing::instrument(skip(self, input), fields(name = %input.name, partner_type = %input.partner_type))]
    pub async fn create_partner(&self, input: NewPartner) -> AppResult<Partner> {
        input.validate()?;
        let partner = self.store.create_partner(input).await?;
        tracing::info!(partner_id = %partner.id, "Partner registered");
        Ok(partner)
    }

    #[tracing::instrument(skip(self, changes))]
    pub async fn update_partner(&self, id: Uuid, changes: PartnerChanges) -> AppResult<Partner> {
        changes.validate()?;
        let partner = self.store.update_partner(id, changes).await?;
        tracing::info!(partner_id = %id, "Partner updated");
        Ok(partner)
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate_partner(&self, id: Uuid) -> AppResult<Partner> {
        let partner = self.store.deactivate_partner(id).await?;
        tracing::info!(partner_id = %id, "Partner deactivated");
        Ok(partner)
    }

    pub async fn get_partner(&self, id: Uuid) -> AppResult<Partner> {
        self.store.get_partner(id).await
    }

    pub async fn list_partners(
        &self,
        filter: &PartnerFilter,
        page: Pagination,
    ) -> AppResult<Page<Partner>> {
        self.store.list_partners(filter, page.normalized()).await
    }

    /// Active partners of type BUYER
    pub async fn list_buyers(&self, page: Pagination) -> AppResult<Page<Partner>> {
        self.list_partners(&PartnerFilter::buyers(), page).await
    }
}
