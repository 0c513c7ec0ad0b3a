//! Template value context: the locale-frozen data bag used to fill
//! document placeholders for one tenant and lease.

use chrono::{Local, NaiveDate};
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use super::format::{round2, Formatter, NumberStyle};
use crate::db::Repository;
use crate::error::{DocumentError, Result};
use crate::models::{Address, Contact, Lease, Organization, Tenant};

/// Raw aggregated amounts over all the properties of a tenant.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PropertyTotals {
    pub surface: f64,
    pub rent_amount: f64,
    pub expenses_amount: f64,
    pub vat_amount: f64,
}

impl PropertyTotals {
    pub fn total_amount(&self) -> f64 {
        round2(self.rent_amount + self.expenses_amount + self.vat_amount)
    }
}

/// Sums rent, expenses and surface of every property of the tenant.
///
/// The tenant's flat `discount` is taken off the rent, and VAT is computed
/// once on `rent + expenses` with two-decimal rounding.
pub fn compute_totals(tenant: &Tenant) -> PropertyTotals {
    let mut totals = tenant
        .properties
        .iter()
        .fold(PropertyTotals::default(), |mut acc, property| {
            acc.surface += property.surface();
            acc.rent_amount += property.rent_amount();
            acc.expenses_amount += property.expenses_amount();
            acc
        });

    if let Some(discount) = tenant.discount {
        totals.rent_amount -= discount;
    }

    if tenant.is_vat {
        if let Some(ratio) = tenant.vat_ratio {
            totals.vat_amount = round2((totals.rent_amount + totals.expenses_amount) * ratio);
        }
    }
    totals
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentValues {
    pub date: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyValues {
    pub name: Option<String>,
    pub legal_representative: Option<String>,
    pub legal_structure: Option<String>,
    pub capital: Option<String>,
    pub ein: Option<String>,
    pub dos: Option<String>,
    pub vat_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LandlordValues {
    pub name: String,
    pub contact: Contact,
    pub address: Address,
    pub company_info: CompanyValues,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantContactValues {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Same as `phone`, under the name the editor markers use.
    pub phone1: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantValues {
    pub name: String,
    pub company_info: CompanyValues,
    pub address: Address,
    pub contacts: Vec<TenantContactValues>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertyValues {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<Address>,
    pub surface: String,
    pub phone: Option<String>,
    pub digicode: Option<String>,
    pub rent: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalValues {
    pub surface: String,
    pub rent_amount: String,
    pub expenses_amount: String,
    pub vat_amount: String,
    pub total_amount: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertiesValues {
    pub list: Vec<PropertyValues>,
    pub total: TotalValues,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaseValues {
    pub name: String,
    pub description: Option<String>,
    pub number_of_terms: Option<u32>,
    pub time_range: String,
    pub reference: Option<String>,
    pub begin_date: String,
    pub end_date: String,
    pub deposit: String,
}

/// Context used to resolve `{{...}}` placeholders of document templates.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateValues {
    pub current: CurrentValues,
    pub landlord: LandlordValues,
    pub tenant: TenantValues,
    pub properties: PropertiesValues,
    pub lease: LeaseValues,
}

impl TemplateValues {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Fetches tenant and lease and builds the context for `organization`.
pub async fn resolve_template_values(
    repository: &dyn Repository,
    organization: &Organization,
    tenant_id: &str,
    lease_id: &str,
) -> Result<TemplateValues> {
    let tenant = repository
        .find_tenant(&organization.id, tenant_id)
        .await?
        .ok_or_else(|| {
            warn!("tenant {} not found in organization {}", tenant_id, organization.id);
            DocumentError::not_found(format!("tenant {}", tenant_id))
        })?;
    let lease = repository
        .find_lease(&organization.id, lease_id)
        .await?
        .ok_or_else(|| {
            warn!("lease {} not found in organization {}", lease_id, organization.id);
            DocumentError::not_found(format!("lease {}", lease_id))
        })?;

    debug!(
        "building template values for tenant {} lease {} (locale {})",
        tenant.id, lease.id, organization.locale
    );
    Ok(build_template_values(
        organization,
        &tenant,
        &lease,
        Local::now().date_naive(),
    ))
}

pub fn build_template_values(
    organization: &Organization,
    tenant: &Tenant,
    lease: &Lease,
    today: NaiveDate,
) -> TemplateValues {
    let fmt = Formatter::new(&organization.locale, &organization.currency);
    let totals = compute_totals(tenant);
    let money = |value: f64| fmt.format_currency(value);
    let surface = |value: f64| fmt.format_number(value, NumberStyle::Decimal, 0);

    let landlord_company = organization.company_info.clone().unwrap_or_default();
    let landlord_name = if organization.is_company {
        landlord_company.name.clone()
    } else {
        organization.contacts.first().and_then(|c| c.name.clone())
    }
    .filter(|name| !name.is_empty())
    .unwrap_or_else(|| organization.name.clone());

    let address = organization.addresses.first().cloned().unwrap_or_default();

    TemplateValues {
        current: CurrentValues {
            date: fmt.format_date(today, "LL"),
            location: address.city.clone().unwrap_or_default(),
        },
        landlord: LandlordValues {
            name: landlord_name,
            contact: organization.contacts.first().cloned().unwrap_or_default(),
            address,
            company_info: CompanyValues {
                name: landlord_company.name,
                legal_representative: landlord_company.legal_representative,
                legal_structure: landlord_company.legal_structure,
                capital: landlord_company.capital.map(money),
                ein: landlord_company.ein,
                dos: landlord_company.dos,
                vat_number: landlord_company.vat_number,
            },
            signature: organization.signature.clone(),
        },
        tenant: TenantValues {
            name: tenant.name.clone(),
            company_info: CompanyValues {
                name: tenant.company.clone(),
                legal_representative: tenant.manager.clone(),
                legal_structure: tenant.legal_form.clone(),
                capital: tenant.capital.map(money),
                ein: tenant.siret.clone(),
                dos: tenant.rcs.clone(),
                vat_number: tenant.vat_number.clone(),
            },
            address: Address {
                street1: tenant.street1.clone(),
                street2: tenant.street2.clone(),
                zip_code: tenant.zip_code.clone(),
                city: tenant.city.clone(),
                state: tenant.state.clone(),
                country: tenant.country.clone(),
            },
            contacts: tenant
                .contacts
                .iter()
                .map(|c| TenantContactValues {
                    name: c.contact.clone(),
                    email: c.email.clone(),
                    phone: c.phone.clone(),
                    phone1: c.phone.clone(),
                })
                .collect(),
        },
        properties: PropertiesValues {
            list: tenant
                .properties
                .iter()
                .map(|occupied| {
                    let property = occupied.property.clone().unwrap_or_default();
                    PropertyValues {
                        kind: property.kind,
                        name: property.name,
                        description: property.description,
                        address: property.address,
                        surface: surface(occupied.surface()),
                        phone: property.phone,
                        digicode: property.digicode,
                        rent: money(occupied.rent_amount()),
                    }
                })
                .collect(),
            total: TotalValues {
                surface: surface(totals.surface),
                rent_amount: money(totals.rent_amount),
                expenses_amount: money(totals.expenses_amount),
                vat_amount: money(totals.vat_amount),
                total_amount: money(totals.total_amount()),
            },
        },
        lease: LeaseValues {
            name: lease.name.clone(),
            description: lease.description.clone(),
            number_of_terms: lease.number_of_terms,
            time_range: lease.time_range.as_str().to_string(),
            reference: tenant.reference.clone(),
            begin_date: tenant
                .begin_date
                .as_deref()
                .map(|d| fmt.format_record_date(d, "LL"))
                .unwrap_or_default(),
            end_date: tenant
                .end_date
                .as_deref()
                .map(|d| fmt.format_record_date(d, "LL"))
                .unwrap_or_default(),
            deposit: money(tenant.guaranty.unwrap_or(0.0)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryRepository;
    use crate::models::{Expense, TenantProperty};

    fn organization() -> Organization {
        serde_json::from_value(serde_json::json!({
            "_id": "r1",
            "name": "Acme Rentals",
            "locale": "en-US",
            "currency": "USD",
            "contacts": [{"name": "John Landlord", "email": "john@acme.test"}],
            "addresses": [{"city": "Springfield"}]
        }))
        .unwrap()
    }

    fn property(rent: f64, expenses: &[f64]) -> TenantProperty {
        TenantProperty {
            property_id: format!("p{}", rent),
            rent: Some(rent),
            expenses: expenses
                .iter()
                .map(|amount| Expense { title: None, amount: *amount })
                .collect(),
            ..Default::default()
        }
    }

    fn tenant(properties: Vec<TenantProperty>) -> Tenant {
        Tenant {
            id: "t1".into(),
            realm_id: "r1".into(),
            name: "Jane Tenant".into(),
            properties,
            begin_date: Some("01/01/2024".into()),
            end_date: Some("31/12/2026".into()),
            guaranty: Some(600.0),
            ..Default::default()
        }
    }

    fn lease() -> Lease {
        Lease {
            id: "l1".into(),
            realm_id: "r1".into(),
            name: "Residential".into(),
            number_of_terms: Some(36),
            ..Default::default()
        }
    }

    #[test]
    fn test_aggregation_over_properties() {
        let tenant = tenant(vec![property(100.0, &[10.0]), property(200.0, &[])]);
        let totals = compute_totals(&tenant);
        assert_eq!(totals.rent_amount, 300.0);
        assert_eq!(totals.expenses_amount, 10.0);
        assert_eq!(totals.vat_amount, 0.0);
    }

    #[test]
    fn test_vat_is_rounded_once() {
        let mut tenant = tenant(vec![property(100.0, &[])]);
        tenant.is_vat = true;
        tenant.vat_ratio = Some(0.2);
        let totals = compute_totals(&tenant);
        assert_eq!(totals.vat_amount, 20.00);
        assert_eq!(totals.total_amount(), 120.0);
    }

    #[test]
    fn test_vat_requires_liability_flag() {
        let mut tenant = tenant(vec![property(100.0, &[])]);
        tenant.vat_ratio = Some(0.2);
        assert_eq!(compute_totals(&tenant).vat_amount, 0.0);
    }

    #[test]
    fn test_flat_discount_is_taken_off_rent() {
        let mut tenant = tenant(vec![property(500.0, &[50.0])]);
        tenant.discount = Some(25.0);
        let totals = compute_totals(&tenant);
        assert_eq!(totals.rent_amount, 475.0);
        assert_eq!(totals.expenses_amount, 50.0);
    }

    #[test]
    fn test_context_is_formatted_at_construction() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let values = build_template_values(
            &organization(),
            &tenant(vec![property(100.0, &[10.0]), property(200.0, &[])]),
            &lease(),
            today,
        );

        assert_eq!(values.current.date, "March 5, 2024");
        assert_eq!(values.current.location, "Springfield");
        assert_eq!(values.landlord.name, "John Landlord");
        assert_eq!(values.properties.total.rent_amount, "$300.00");
        assert_eq!(values.properties.total.expenses_amount, "$10.00");
        assert_eq!(values.properties.total.vat_amount, "$0.00");
        assert_eq!(values.lease.begin_date, "January 1, 2024");
        assert_eq!(values.lease.deposit, "$600.00");
        assert_eq!(values.lease.time_range, "months");

        let json = values.to_value();
        assert_eq!(json["properties"]["total"]["rentAmount"], "$300.00");
        assert_eq!(json["lease"]["numberOfTerms"], 36);
    }

    #[tokio::test]
    async fn test_missing_records_are_not_found() {
        let repo = InMemoryRepository::new();
        repo.add_tenant(tenant(vec![]));

        let err = resolve_template_values(&repo, &organization(), "missing", "l1")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));

        let err = resolve_template_values(&repo, &organization(), "t1", "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::NotFound(_)));

        repo.add_lease(lease());
        assert!(resolve_template_values(&repo, &organization(), "t1", "l1")
            .await
            .is_ok());
    }
}
