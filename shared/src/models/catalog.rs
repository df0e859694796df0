//! Catalog models: waste categories, materials and partners

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::LedgerError;

/// Default unit of measure for recyclable materials
pub const DEFAULT_UNIT: &str = "kg";

/// A waste category materials are filed under (paper, plastic, metal...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a category
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCategory {
    #[validate(
        length(min = 1, max = 80, message = "Name must have 1 to 80 characters"),
        custom = "crate::validation::not_blank"
    )]
    pub name: String,
}

/// Catalog entry matching `name`, ignoring case and surrounding blanks
pub fn find_category<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    let name = name.trim().to_lowercase();
    categories.iter().find(|c| c.name.to_lowercase() == name)
}

/// A recyclable material tracked in stock
///
/// Stock is never stored on the material; it is derived from the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Material {
    pub id: Uuid,
    /// Catalog code (e.g., "MAT-0007")
    pub code: String,
    pub name: String,
    /// Name of a registered [`Category`]
    pub category: Option<String>,
    pub unit_of_measure: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a material
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMaterial {
    #[validate(
        length(min = 1, max = 120, message = "Name must have 1 to 120 characters"),
        custom = "crate::validation::not_blank"
    )]
    pub name: String,
    #[validate(length(max = 80, message = "Category must have at most 80 characters"))]
    pub category: Option<String>,
    #[validate(
        length(min = 1, max = 20, message = "Unit must have 1 to 20 characters"),
        custom = "crate::validation::not_blank"
    )]
    pub unit_of_measure: Option<String>,
}

impl NewMaterial {
    pub fn unit_or_default(&self) -> String {
        self.unit_of_measure
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_UNIT)
            .to_string()
    }
}

/// Partial update of a material (last write wins)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MaterialChanges {
    #[validate(
        length(min = 1, max = 120, message = "Name must have 1 to 120 characters"),
        custom = "crate::validation::not_blank"
    )]
    pub name: Option<String>,
    #[validate(length(max = 80, message = "Category must have at most 80 characters"))]
    pub category: Option<String>,
    #[validate(
        length(min = 1, max = 20, message = "Unit must have 1 to 20 characters"),
        custom = "crate::validation::not_blank"
    )]
    pub unit_of_measure: Option<String>,
    pub active: Option<bool>,
}

impl MaterialChanges {
    pub fn apply(&self, material: &mut Material, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            material.name = name.trim().to_string();
        }
        if let Some(category) = &self.category {
            material.category = Some(category.trim().to_string()).filter(|c| !c.is_empty());
        }
        if let Some(unit) = &self.unit_of_measure {
            material.unit_of_measure = unit.trim().to_string();
        }
        if let Some(active) = self.active {
            material.active = active;
        }
        material.updated_at = now;
    }
}

/// Catalog list filter for materials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaterialFilter {
    /// Case-insensitive name substring
    pub name: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl MaterialFilter {
    pub fn matches(&self, material: &Material) -> bool {
        (self.include_inactive || material.active)
            && self
                .name
                .as_deref()
                .map_or(true, |needle| contains_ignore_case(&material.name, needle))
    }
}

/// Kind of counterparty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartnerType {
    /// Donor association of waste pickers
    Association,
    /// Counterparty of sales
    Buyer,
    Other,
}

impl PartnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnerType::Association => "ASSOCIATION",
            PartnerType::Buyer => "BUYER",
            PartnerType::Other => "OTHER",
        }
    }
}

impl std::fmt::Display for PartnerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartnerType::Association => write!(f, "Association"),
            PartnerType::Buyer => write!(f, "Buyer"),
            PartnerType::Other => write!(f, "Other"),
        }
    }
}

impl FromStr for PartnerType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASSOCIATION" => Ok(PartnerType::Association),
            "BUYER" => Ok(PartnerType::Buyer),
            "OTHER" => Ok(PartnerType::Other),
            other => Err(LedgerError::UnknownPartnerType(other.to_string())),
        }
    }
}

/// An external counterparty: donor association, supplier or buyer
///
/// Association-specific details (`leader_name`, `cnpj`) are optional fields
/// of the same record rather than a separate entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Partner {
    pub id: Uuid,
    pub name: String,
    pub partner_type: PartnerType,
    /// Brazilian company registry number, digits only
    pub cnpj: Option<String>,
    pub leader_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Partner {
    pub fn is_buyer(&self) -> bool {
        self.partner_type == PartnerType::Buyer
    }
}

/// Input for registering a partner
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPartner {
    #[validate(
        length(min = 1, max = 160, message = "Name must have 1 to 160 characters"),
        custom = "crate::validation::not_blank"
    )]
    pub name: String,
    pub partner_type: PartnerType,
    #[validate(custom = "crate::validation::cnpj")]
    pub cnpj: Option<String>,
    #[validate(length(max = 160, message = "Leader name must have at most 160 characters"))]
    pub leader_name: Option<String>,
    #[validate(length(max = 40, message = "Phone must have at most 40 characters"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

/// Partial update of a partner (last write wins)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PartnerChanges {
    #[validate(
        length(min = 1, max = 160, message = "Name must have 1 to 160 characters"),
        custom = "crate::validation::not_blank"
    )]
    pub name: Option<String>,
    pub partner_type: Option<PartnerType>,
    #[validate(custom = "crate::validation::cnpj")]
    pub cnpj: Option<String>,
    #[validate(length(max = 160, message = "Leader name must have at most 160 characters"))]
    pub leader_name: Option<String>,
    #[validate(length(max = 40, message = "Phone must have at most 40 characters"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub active: Option<bool>,
}

impl PartnerChanges {
    pub fn apply(&self, partner: &mut Partner, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            partner.name = name.trim().to_string();
        }
        if let Some(partner_type) = self.partner_type {
            partner.partner_type = partner_type;
        }
        if let Some(cnpj) = &self.cnpj {
            partner.cnpj = crate::validation::normalize_cnpj(cnpj);
        }
        if let Some(leader) = &self.leader_name {
            partner.leader_name = non_empty(leader);
        }
        if let Some(phone) = &self.phone {
            partner.phone = non_empty(phone);
        }
        if let Some(email) = &self.email {
            partner.email = non_empty(email);
        }
        if let Some(active) = self.active {
            partner.active = active;
        }
        partner.updated_at = now;
    }
}

/// Catalog list filter for partners
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerFilter {
    /// Case-insensitive name substring
    pub name: Option<String>,
    pub partner_type: Option<PartnerType>,
    #[serde(default)]
    pub include_inactive: bool,
}

impl PartnerFilter {
    pub fn buyers() -> Self {
        Self {
            partner_type: Some(PartnerType::Buyer),
            ..Self::default()
        }
    }

    pub fn matches(&self, partner: &Partner) -> bool {
        (self.include_inactive || partner.active)
            && self.partner_type.map_or(true, |t| t == partner.partner_type)
            && self
                .name
                .as_deref()
                .map_or(true, |needle| contains_ignore_case(&partner.name, needle))
    }
}

/// Trim an optional text field, mapping blank to `None`
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}
