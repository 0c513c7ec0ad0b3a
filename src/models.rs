//! Business records consumed by the generation pipeline.
//!
//! Records are stored as JSON documents, so field names follow the camelCase
//! layout with an `_id` key that the rest of the platform uses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone1: Option<String>,
    pub phone2: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyInfo {
    pub name: Option<String>,
    pub legal_representative: Option<String>,
    pub legal_structure: Option<String>,
    pub capital: Option<f64>,
    pub ein: Option<String>,
    pub dos: Option<String>,
    pub vat_number: Option<String>,
}

/// Credentials of an S3-compatible bucket owned by an organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectStoreConfig {
    pub key_id: Option<String>,
    pub application_key: Option<String>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThirdParties {
    pub b2: Option<ObjectStoreConfig>,
}

fn default_locale() -> String {
    "en-US".to_string()
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// The landlord organization ("realm").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default = "default_locale")]
    pub locale: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub is_company: bool,
    pub company_info: Option<CompanyInfo>,
    pub bank_info: Option<Value>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    /// Storage key of the uploaded landlord signature image.
    pub signature: Option<String>,
    #[serde(default)]
    pub third_parties: ThirdParties,
}

impl Organization {
    pub fn object_store(&self) -> Option<&ObjectStoreConfig> {
        self.third_parties.b2.as_ref()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<Address>,
    pub surface: Option<f64>,
    pub phone: Option<String>,
    pub digicode: Option<String>,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Expense {
    pub title: Option<String>,
    #[serde(default)]
    pub amount: f64,
}

/// A property occupied by a tenant, with the rent terms agreed for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantProperty {
    pub property_id: String,
    /// Populated by the repository from the properties collection.
    pub property: Option<Property>,
    pub entry_date: Option<String>,
    pub exit_date: Option<String>,
    pub rent: Option<f64>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
}

impl TenantProperty {
    pub fn rent_amount(&self) -> f64 {
        self.rent
            .or_else(|| self.property.as_ref().and_then(|p| p.price))
            .unwrap_or(0.0)
    }

    pub fn expenses_amount(&self) -> f64 {
        self.expenses.iter().map(|e| e.amount).sum()
    }

    pub fn surface(&self) -> f64 {
        self.property.as_ref().and_then(|p| p.surface).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TenantContact {
    pub contact: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RentTotal {
    pub pre_tax_amount: f64,
    pub charges: f64,
    pub vat: f64,
    pub discount: f64,
    pub debts: f64,
    pub grand_total: f64,
    pub payment: Option<f64>,
}

/// One billed term of a tenant. `term` is encoded as `YYYYMMDDHH`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rent {
    pub term: u64,
    #[serde(default)]
    pub total: RentTotal,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    #[serde(rename = "_id")]
    pub id: String,
    pub realm_id: String,
    pub name: String,
    #[serde(default)]
    pub is_company: bool,
    pub company: Option<String>,
    pub manager: Option<String>,
    pub legal_form: Option<String>,
    pub siret: Option<String>,
    pub rcs: Option<String>,
    pub capital: Option<f64>,
    pub vat_number: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub zip_code: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub contacts: Vec<TenantContact>,
    pub reference: Option<String>,
    pub contract: Option<String>,
    pub lease_id: Option<String>,
    /// `DD/MM/YYYY`
    pub begin_date: Option<String>,
    /// `DD/MM/YYYY`
    pub end_date: Option<String>,
    pub termination_date: Option<String>,
    #[serde(default)]
    pub properties: Vec<TenantProperty>,
    #[serde(default)]
    pub rents: Vec<Rent>,
    #[serde(default)]
    pub is_vat: bool,
    pub vat_ratio: Option<f64>,
    pub discount: Option<f64>,
    pub guaranty: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Days,
    Weeks,
    #[default]
    Months,
    Years,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Days => "days",
            Self::Weeks => "weeks",
            Self::Months => "months",
            Self::Years => "years",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lease {
    #[serde(rename = "_id")]
    pub id: String,
    pub realm_id: String,
    pub name: String,
    pub description: Option<String>,
    pub number_of_terms: Option<u32>,
    #[serde(default)]
    pub time_range: TimeRange,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TemplateType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "fileDescriptor")]
    FileDescriptor,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(rename = "_id")]
    pub id: String,
    pub realm_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TemplateType,
    #[serde(default)]
    pub description: String,
    pub contents: Option<ContentNode>,
    pub html: Option<String>,
    #[serde(default)]
    pub has_expiry_date: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub required_once_contract_terminated: bool,
    #[serde(default)]
    pub linked_resource_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Text,
    File,
    Contract,
}

/// A generated or uploaded artifact tied to a tenant and a lease.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub realm_id: String,
    pub tenant_id: String,
    pub lease_id: String,
    pub template_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DocumentType,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = Option<Object>)]
    pub contents: Option<ContentNode>,
    pub html: Option<String>,
    /// Storage key of a `file` document.
    pub url: Option<String>,
    pub version_id: Option<String>,
    pub mime_type: Option<String>,
    pub expiry_date: Option<String>,
}

/// A node of the rich-text editor document model.
///
/// `template` nodes carry a placeholder expression in `attrs.id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentNode {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attrs: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<Vec<Value>>,
}

impl ContentNode {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_children(kind: impl Into<String>, children: Vec<ContentNode>) -> Self {
        Self {
            kind: kind.into(),
            content: Some(children),
            ..Default::default()
        }
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.as_ref()?.get(name)?.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tenant_property_amounts() {
        let property = TenantProperty {
            property_id: "p1".into(),
            property: Some(Property {
                id: "p1".into(),
                surface: Some(42.5),
                price: Some(500.0),
                ..Default::default()
            }),
            rent: None,
            expenses: vec![
                Expense { title: None, amount: 10.0 },
                Expense { title: None, amount: 15.5 },
            ],
            ..Default::default()
        };

        assert_eq!(property.rent_amount(), 500.0);
        assert_eq!(property.expenses_amount(), 25.5);
        assert_eq!(property.surface(), 42.5);
    }

    #[test]
    fn test_document_deserialization() {
        let doc: Document = serde_json::from_value(json!({
            "_id": "d1",
            "realmId": "r1",
            "tenantId": "t1",
            "leaseId": "l1",
            "type": "file",
            "url": "acme-r1/contracts/lease-1.pdf",
            "versionId": "v42"
        }))
        .unwrap();

        assert_eq!(doc.kind, DocumentType::File);
        assert_eq!(doc.url.as_deref(), Some("acme-r1/contracts/lease-1.pdf"));
        assert_eq!(doc.version_id.as_deref(), Some("v42"));
        assert!(doc.contents.is_none());
    }

    #[test]
    fn test_content_node_roundtrip_keeps_unset_fields_out() {
        let node = ContentNode::text("hello");
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value, json!({"type": "text", "text": "hello"}));
    }

    #[test]
    fn test_template_type_names() {
        let template: Template = serde_json::from_value(json!({
            "_id": "tpl",
            "realmId": "r1",
            "name": "Insurance",
            "type": "fileDescriptor",
            "hasExpiryDate": true
        }))
        .unwrap();
        assert_eq!(template.kind, TemplateType::FileDescriptor);
        assert!(template.has_expiry_date);
    }
}
