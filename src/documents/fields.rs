//! Placeholder markers offered by the document editor.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TemplateField {
    #[serde(rename = "_id")]
    pub id: &'static str,
    pub marker: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

const FIELDS: [(&str, &str, &str); 54] = [
    ("current_location", "{{current.location}}", "string"),
    ("current_date", "{{current.date}}", "date"),
    ("landlord_name", "{{landlord.name}}", "string"),
    ("landlord_contact_phone1", "{{landlord.contact.phone1}}", "string"),
    ("landlord_contact_phone2", "{{landlord.contact.phone2}}", "string"),
    ("landlord_contact_email", "{{landlord.contact.email}}", "string"),
    ("landlord_address_street1", "{{landlord.address.street1}}", "string"),
    ("landlord_address_street2", "{{landlord.address.street2}}", "string"),
    ("landlord_address_city", "{{landlord.address.city}}", "string"),
    ("landlord_address_state", "{{landlord.address.state}}", "string"),
    ("landlord_address_country", "{{landlord.address.country}}", "string"),
    ("landlord_address_zipCode", "{{landlord.address.zipCode}}", "string"),
    ("landlord_companyInfo_legalRepresentative", "{{landlord.companyInfo.legalRepresentative}}", "string"),
    ("landlord_companyInfo_legalStructure", "{{landlord.companyInfo.legalStructure}}", "string"),
    ("landlord_companyInfo_capital", "{{landlord.companyInfo.capital}}", "amount"),
    ("landlord_companyInfo_ein", "{{landlord.companyInfo.ein}}", "string"),
    ("landlord_companyInfo_dos", "{{landlord.companyInfo.dos}}", "string"),
    ("landlord_companyInfo_vatNumber", "{{landlord.companyInfo.vatNumber}}", "string"),
    ("tenant_name", "{{tenant.name}}", "string"),
    ("tenant_contacts_name", "{{tenant.contacts.[0].name}}", "string"),
    ("tenant_contacts_phone1", "{{tenant.contacts.[0].phone1}}", "string"),
    ("tenant_contacts_phone2", "{{tenant.contacts.[0].phone2}}", "string"),
    ("tenant_contacts_email", "{{tenant.contacts.[0].email}}", "string"),
    ("tenant_address_street1", "{{tenant.address.street1}}", "string"),
    ("tenant_address_street2", "{{tenant.address.street2}}", "string"),
    ("tenant_address_city", "{{tenant.address.city}}", "string"),
    ("tenant_address_state", "{{tenant.address.state}}", "string"),
    ("tenant_address_country", "{{tenant.address.country}}", "string"),
    ("tenant_address_zipCode", "{{tenant.address.zipCode}}", "string"),
    ("tenant_companyInfo_legalRepresentative", "{{tenant.companyInfo.legalRepresentative}}", "string"),
    ("tenant_companyInfo_legalStructure", "{{tenant.companyInfo.legalStructure}}", "string"),
    ("tenant_companyInfo_capital", "{{tenant.companyInfo.capital}}", "amount"),
    ("tenant_companyInfo_ein", "{{tenant.companyInfo.ein}}", "string"),
    ("tenant_companyInfo_dos", "{{tenant.companyInfo.dos}}", "string"),
    ("properties_name", "{{properties.list.[0].name}}", "string"),
    ("properties_description", "{{properties.list.[0].description}}", "string"),
    ("properties_type", "{{properties.list.[0].type}}", "string"),
    ("properties_surface", "{{properties.list.[0].surface}}", "surface"),
    ("properties_total_surface", "{{properties.total.surface}}", "surface"),
    ("properties_rent", "{{properties.list.[0].rent}}", "amount"),
    ("properties_phone", "{{properties.list.[0].phone}}", "string"),
    ("properties_digicode", "{{properties.list.[0].digicode}}", "string"),
    ("properties_address_street1", "{{properties.list.[0].address.street1}}", "string"),
    ("properties_address_street2", "{{properties.list.[0].address.street2}}", "string"),
    ("properties_address_city", "{{properties.list.[0].address.city}}", "string"),
    ("properties_address_state", "{{properties.list.[0].address.state}}", "string"),
    ("properties_address_country", "{{properties.list.[0].address.country}}", "string"),
    ("properties_address_zipCode", "{{properties.list.[0].address.zipCode}}", "string"),
    ("lease_reference", "{{lease.reference}}", "string"),
    ("lease_beginDate", "{{lease.beginDate}}", "date"),
    ("lease_endDate", "{{lease.endDate}}", "date"),
    ("lease_deposit", "{{lease.deposit}}", "amount"),
    ("lease_rentAmount", "{{properties.total.rentAmount}}", "amount"),
    ("lease_expensesAmount", "{{properties.total.expensesAmount}}", "amount"),
];

pub fn template_fields() -> Vec<TemplateField> {
    FIELDS
        .iter()
        .map(|&(id, marker, kind)| TemplateField { id, marker, kind })
        .collect()
}
