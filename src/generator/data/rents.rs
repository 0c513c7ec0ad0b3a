//! Rent documents: rent call, rent call reminder and invoice.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, Months, NaiveDate, Weekday};
use log::{debug, warn};
use serde_json::{json, Map, Value};

use super::{DataProvider, DocumentData, DocumentParams};
use crate::db::Repository;
use crate::error::{DocumentError, Result};
use crate::generator::engine;
use crate::generator::format::{parse_record_date, parse_term, week_bounds, Locale};
use crate::models::{Lease, Organization, Rent, Tenant, TimeRange};

const DATE_FORMAT: &str = "%d/%m/%Y";

/// `file://` URLs of the stylesheet and logo shared by the rent templates.
#[derive(Debug, Clone)]
pub struct AssetUrls {
    pub css_url: String,
    pub logo_url: String,
}

impl AssetUrls {
    pub fn new(templates_dir: &Path) -> Self {
        let root = std::path::absolute(templates_dir).unwrap_or_else(|_| templates_dir.to_path_buf());
        Self {
            css_url: file_url(root.join("css").join("print.css")),
            logo_url: file_url(root.join("img").join("logo.png")),
        }
    }
}

fn file_url(path: PathBuf) -> String {
    engine::file_url(&path).unwrap_or_else(|e| {
        warn!("asset {} has no file url: {}", path.display(), e);
        String::new()
    })
}

/// Tenant, lease and rents selected for one billing term.
#[derive(Debug, Clone)]
pub struct RentsData {
    pub organization: Organization,
    pub tenant: Tenant,
    pub lease: Lease,
    pub term: String,
    pub term_date: NaiveDate,
    pub rents: Vec<Rent>,
}

impl RentsData {
    pub async fn load(repository: &dyn Repository, params: &DocumentParams) -> Result<Self> {
        let realm_id = &params.organization.id;
        let tenant = repository
            .find_tenant(realm_id, &params.tenant_id)
            .await?
            .ok_or_else(|| DocumentError::not_found(format!("tenant {}", params.tenant_id)))?;

        let lease_id = tenant
            .lease_id
            .clone()
            .ok_or_else(|| DocumentError::not_found(format!("lease of tenant {}", tenant.id)))?;
        let lease = repository
            .find_lease(realm_id, &lease_id)
            .await?
            .ok_or_else(|| DocumentError::not_found(format!("lease {}", lease_id)))?;

        let term_date = params
            .term
            .parse::<u64>()
            .ok()
            .and_then(parse_term)
            .ok_or_else(|| DocumentError::validation(format!("invalid term {}", params.term)))?;

        let rents: Vec<Rent> = tenant
            .rents
            .iter()
            .filter(|rent| rent.term.to_string().starts_with(&params.term))
            .cloned()
            .collect();
        if rents.is_empty() {
            warn!("no rent for tenant {} and term {}", tenant.id, params.term);
            return Err(DocumentError::not_found(format!(
                "rents of tenant {} for term {}",
                tenant.id, params.term
            )));
        }

        debug!(
            "loaded {} rent(s) for tenant {} term {}",
            rents.len(),
            tenant.id,
            params.term
        );
        Ok(Self {
            organization: params.organization.clone(),
            tenant,
            lease,
            term: params.term.clone(),
            term_date,
            rents,
        })
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}", self.tenant.name, self.term)
    }

    fn week_start(&self) -> Weekday {
        Locale::parse(&self.organization.locale).week_start()
    }

    fn landlord(&self) -> Value {
        let org = &self.organization;
        let mut landlord = match serde_json::to_value(org) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let name = if org.is_company {
            org.company_info.as_ref().and_then(|c| c.name.clone())
        } else {
            org.contacts.first().and_then(|c| c.name.clone())
        };
        landlord.insert("name".into(), json!(name.unwrap_or_default()));
        landlord.insert("hasCompanyInfo".into(), json!(org.company_info.is_some()));
        landlord.insert("hasBankInfo".into(), json!(org.bank_info.is_some()));
        landlord.insert("hasAddress".into(), json!(!org.addresses.is_empty()));
        landlord.insert("hasContact".into(), json!(!org.contacts.is_empty()));
        Value::Object(landlord)
    }

    fn rent(&self, rent: &Rent) -> Map<String, Value> {
        let mut value = match serde_json::to_value(rent) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let billing_prefix = parse_term(rent.term)
            .map(|date| date.format("%m_%y_").to_string())
            .unwrap_or_default();
        let total = &rent.total;
        let payment = total.payment.unwrap_or(0.0);

        let mut total_value = match value.remove("total") {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        total_value.insert("payment".into(), json!(payment));
        total_value.insert(
            "subTotal".into(),
            json!(total.pre_tax_amount + total.charges - total.discount + total.debts),
        );
        total_value.insert("newBalance".into(), json!(total.grand_total - payment));

        value.insert("period".into(), json!(rent.term));
        value.insert(
            "billingReference".into(),
            json!(format!(
                "{}{}",
                billing_prefix,
                self.tenant.reference.as_deref().unwrap_or_default()
            )),
        );
        value.insert("total".into(), Value::Object(total_value));
        value
    }

    fn tenant(&self, rents: Vec<Map<String, Value>>) -> Value {
        let tenant = &self.tenant;
        let properties: Vec<Value> = tenant
            .properties
            .iter()
            .filter_map(|p| p.property.as_ref())
            .map(|p| serde_json::to_value(p).unwrap_or(Value::Null))
            .collect();

        let mut contract = json!({
            "name": tenant.contract,
            "lease": self.lease,
            "beginDate": tenant.begin_date,
            "endDate": tenant.end_date,
            "properties": properties,
        });
        if let (Some(date), Value::Object(map)) = (&tenant.termination_date, &mut contract) {
            map.insert("terminationDate".into(), json!(date));
        }

        let name = match (&tenant.company, tenant.is_company) {
            (Some(company), true) => company.clone(),
            _ => tenant.name.clone(),
        };

        json!({
            "name": name,
            "isCompany": tenant.is_company,
            "companyInfo": {
                "name": tenant.company,
                "capital": tenant.capital,
                "ein": tenant.siret,
                "dos": tenant.rcs,
                "vatNumber": tenant.vat_number,
                "legalRepresentative": tenant.manager,
            },
            "addresses": [{
                "street1": tenant.street1,
                "street2": tenant.street2,
                "zipCode": tenant.zip_code,
                "city": tenant.city,
                "state": tenant.state,
                "country": tenant.country,
            }],
            "contract": contract,
            "rents": rents,
        })
    }

    fn document(&self, assets: &AssetUrls, rents: Vec<Map<String, Value>>, today: Option<String>) -> DocumentData {
        let mut values = json!({
            "fileName": self.file_name(),
            "landlord": self.landlord(),
            "tenant": self.tenant(rents),
            "cssUrl": assets.css_url,
            "logoUrl": assets.logo_url,
        });
        if let (Some(today), Value::Object(map)) = (today, &mut values) {
            map.insert("today".into(), json!(today));
        }
        DocumentData {
            file_name: self.file_name(),
            locale: self.organization.locale.clone(),
            currency: self.organization.currency.clone(),
            values,
        }
    }

    fn rentcall(&self, assets: &AssetUrls, today: NaiveDate) -> DocumentData {
        let begin_date = self.tenant.begin_date.as_deref().and_then(parse_record_date);
        let due_date = rentcall_due_date(self.term_date, self.lease.time_range, begin_date);
        let issued = rentcall_issue_date(self.term_date, due_date, today);

        let rents = self
            .rents
            .iter()
            .map(|rent| {
                let mut value = self.rent(rent);
                value.insert("dueDate".into(), json!(due_date.format(DATE_FORMAT).to_string()));
                value
            })
            .collect();
        self.document(assets, rents, Some(issued.format(DATE_FORMAT).to_string()))
    }
}

/// Moves a Saturday back to Friday and a Sunday forward to Monday.
fn shift_to_business_day(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// Moves a weekend day back to the previous Friday.
fn shift_to_friday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date - Duration::days(2),
        _ => date,
    }
}

/// Due date of a rent call: a grace period after the term start that
/// depends on the lease period, never on a weekend and never before the
/// lease begins.
pub fn rentcall_due_date(term: NaiveDate, time_range: TimeRange, lease_begin: Option<NaiveDate>) -> NaiveDate {
    let due = match time_range {
        TimeRange::Years => term.checked_add_months(Months::new(1)).unwrap_or(term),
        TimeRange::Months => term + Duration::days(10),
        TimeRange::Weeks => term + Duration::days(2),
        TimeRange::Days => term,
    };
    let due = shift_to_business_day(due);
    match lease_begin {
        Some(begin) if due < begin => begin,
        _ => due,
    }
}

/// Issue date printed on a rent call. Once the due date is reached the
/// document is dated from the term instead of today.
pub fn rentcall_issue_date(term: NaiveDate, due_date: NaiveDate, today: NaiveDate) -> NaiveDate {
    if due_date <= today {
        shift_to_business_day(term)
    } else {
        today
    }
}

pub fn end_of_term(term: NaiveDate, time_range: TimeRange, week_start: Weekday) -> NaiveDate {
    match time_range {
        TimeRange::Days => term,
        TimeRange::Weeks => week_bounds(term, week_start).1,
        TimeRange::Months => term
            .with_day(1)
            .and_then(|first| first.checked_add_months(Months::new(1)))
            .map(|next| next - Duration::days(1))
            .unwrap_or(term),
        TimeRange::Years => NaiveDate::from_ymd_opt(term.year(), 12, 31).unwrap_or(term),
    }
}

pub fn reminder_document_date(term: NaiveDate, time_range: TimeRange, week_start: Weekday, today: NaiveDate) -> NaiveDate {
    let end = end_of_term(term, time_range, week_start);
    shift_to_friday(if today > end { end } else { today })
}

pub fn invoice_document_date(term: NaiveDate, time_range: TimeRange, week_start: Weekday, today: NaiveDate) -> NaiveDate {
    let end = end_of_term(term, time_range, week_start);
    if today > end {
        end
    } else {
        today
    }
}

fn with_document_date(
    data: &RentsData,
    document: &mut DocumentData,
    today: NaiveDate,
    date_of: fn(NaiveDate, TimeRange, Weekday, NaiveDate) -> NaiveDate,
) {
    let week_start = data.week_start();
    let Some(rents) = document
        .values
        .pointer_mut("/tenant/rents")
        .and_then(Value::as_array_mut)
    else {
        return;
    };
    for (rent, source) in rents.iter_mut().zip(&data.rents) {
        let term = parse_term(source.term).unwrap_or(data.term_date);
        let date = date_of(term, data.lease.time_range, week_start, today);
        if let Value::Object(map) = rent {
            map.insert("documentDate".into(), json!(date.format(DATE_FORMAT).to_string()));
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub struct RentCallProvider {
    assets: AssetUrls,
}

impl RentCallProvider {
    pub fn new(assets: AssetUrls) -> Self {
        Self { assets }
    }
}

#[async_trait]
impl DataProvider for RentCallProvider {
    async fn fetch(&self, repository: &dyn Repository, params: &DocumentParams) -> Result<DocumentData> {
        let data = RentsData::load(repository, params).await?;
        Ok(data.rentcall(&self.assets, today()))
    }
}

pub struct RentCallReminderProvider {
    assets: AssetUrls,
}

impl RentCallReminderProvider {
    pub fn new(assets: AssetUrls) -> Self {
        Self { assets }
    }

    pub fn build(&self, data: &RentsData, today: NaiveDate) -> DocumentData {
        let mut document = data.rentcall(&self.assets, today);
        with_document_date(data, &mut document, today, reminder_document_date);
        document
    }
}

#[async_trait]
impl DataProvider for RentCallReminderProvider {
    async fn fetch(&self, repository: &dyn Repository, params: &DocumentParams) -> Result<DocumentData> {
        let data = RentsData::load(repository, params).await?;
        Ok(self.build(&data, today()))
    }
}

pub struct InvoiceProvider {
    assets: AssetUrls,
}

impl InvoiceProvider {
    pub fn new(assets: AssetUrls) -> Self {
        Self { assets }
    }

    pub fn build(&self, data: &RentsData, today: NaiveDate) -> DocumentData {
        let rents = data.rents.iter().map(|rent| data.rent(rent)).collect();
        let mut document = data.document(&self.assets, rents, None);
        with_document_date(data, &mut document, today, invoice_document_date);
        document
    }
}

#[async_trait]
impl DataProvider for InvoiceProvider {
    async fn fetch(&self, repository: &dyn Repository, params: &DocumentParams) -> Result<DocumentData> {
        let data = RentsData::load(repository, params).await?;
        Ok(self.build(&data, today()))
    }
}
