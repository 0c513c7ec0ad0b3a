//! Page template rendering.
//!
//! Page templates are Tera files named `{kind}.html` in the templates
//! directory. They are reloaded on every render so that edits are picked up
//! without a restart. Helper functions are bound to the locale and currency
//! of the organization the document is generated for:
//!
//! - `t(key="...", ...)` looks up a catalog message, other arguments fill its
//!   `{{param}}` tokens
//! - `formatNumber(value=..., style="decimal"|"currency"|"percent", minimumFractionDigits=2)`
//! - `formatDate(date="DD/MM/YYYY", format="LL")`
//! - `formatTerm(term=YYYYMMDDHH, timeRange="days"|"weeks"|"months"|"years")`

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error};
use serde_json::{json, Map, Value};
use tera::{Context, Tera};

use super::data::DocumentData;
use super::format::{Formatter, NumberStyle};
use super::i18n::Catalog;
use crate::error::{DocumentError, Result};
use crate::models::TimeRange;

pub trait Renderer: Send + Sync {
    fn template_exists(&self, kind: &str) -> bool;

    /// Renders the page template of `kind` into an HTML string.
    fn render(&self, kind: &str, data: &DocumentData) -> Result<String>;
}

pub struct TeraRenderer {
    templates_dir: PathBuf,
    catalog: Arc<Catalog>,
}

impl TeraRenderer {
    pub fn new(templates_dir: impl Into<PathBuf>, catalog: Arc<Catalog>) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            catalog,
        }
    }

    pub fn template_path(&self, kind: &str) -> PathBuf {
        self.templates_dir.join(format!("{}.html", kind))
    }

    fn load(&self, data: &DocumentData) -> Result<Tera> {
        let pattern = self.templates_dir.join("**").join("*.html");
        let mut tera = Tera::new(&pattern.to_string_lossy()).map_err(|e| {
            error!("failed to load templates from {}: {}", self.templates_dir.display(), e);
            DocumentError::render(format!("template error: {}", e))
        })?;
        register_helpers(
            &mut tera,
            Arc::new(Formatter::new(&data.locale, &data.currency)),
            self.catalog.clone(),
            data.locale.clone(),
        );
        Ok(tera)
    }
}

impl Renderer for TeraRenderer {
    fn template_exists(&self, kind: &str) -> bool {
        self.template_path(kind).is_file()
    }

    fn render(&self, kind: &str, data: &DocumentData) -> Result<String> {
        let tera = self.load(data)?;
        let context = Context::from_value(data.values.clone())
            .map_err(|e| DocumentError::render(format!("invalid template data: {}", e)))?;

        let name = format!("{}.html", kind);
        debug!("rendering page template {} (locale {})", name, data.locale);
        tera.render(&name, &context).map_err(|e| {
            error!("failed to render {} for {}: {:?}", name, data.file_name, e);
            DocumentError::render(format!("template error: {}", e))
        })
    }
}

/// Registers `t`, `formatNumber`, `formatDate` and `formatTerm`.
pub fn register_helpers(tera: &mut Tera, formatter: Arc<Formatter>, catalog: Arc<Catalog>, locale: String) {
    let t_catalog = catalog.clone();
    let t_locale = locale.clone();
    tera.register_function("t", move |args: &HashMap<String, Value>| {
        let key = required_str(args, "key", "t")?;
        let params: Map<String, Value> = args
            .iter()
            .filter(|(name, _)| name.as_str() != "key")
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Ok(json!(t_catalog.translate(&t_locale, &key, &Value::Object(params))))
    });

    let number_fmt = formatter.clone();
    tera.register_function("formatNumber", move |args: &HashMap<String, Value>| {
        let value = number_arg(args.get("value")).unwrap_or(0.0);
        let style = match args.get("style").and_then(Value::as_str) {
            None => NumberStyle::Decimal,
            Some(style) => NumberStyle::parse(style)
                .ok_or_else(|| tera::Error::msg(format!("formatNumber: unknown style {}", style)))?,
        };
        let min_digits = args
            .get("minimumFractionDigits")
            .and_then(Value::as_u64)
            .unwrap_or(2) as usize;
        Ok(json!(number_fmt.format_number(value, style, min_digits)))
    });

    let date_fmt = formatter.clone();
    tera.register_function("formatDate", move |args: &HashMap<String, Value>| {
        let date = required_str(args, "date", "formatDate")?;
        let pattern = args.get("format").and_then(Value::as_str).unwrap_or("LL");
        Ok(json!(date_fmt.format_record_date(&date, pattern)))
    });

    let term_fmt = formatter;
    tera.register_function("formatTerm", move |args: &HashMap<String, Value>| {
        let term = number_arg(args.get("term"))
            .map(|t| t as u64)
            .ok_or_else(|| tera::Error::msg("formatTerm: missing term"))?;
        let time_range = match args.get("timeRange").and_then(Value::as_str) {
            Some("days") => TimeRange::Days,
            Some("weeks") => TimeRange::Weeks,
            Some("months") => TimeRange::Months,
            Some("years") => TimeRange::Years,
            _ => return Ok(json!(term.to_string())),
        };
        let week_label = |month: &str, start: &str, end: &str| {
            catalog.translate(
                &locale,
                "{{month}} {{startDay}} to {{endDay}}",
                &json!({"month": month, "startDay": start, "endDay": end}),
            )
        };
        Ok(json!(term_fmt.format_term(term, time_range, week_label)))
    });
}

fn required_str(args: &HashMap<String, Value>, name: &str, function: &str) -> tera::Result<String> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Ok(other.to_string()),
        None => Err(tera::Error::msg(format!("{}: missing `{}` argument", function, name))),
    }
}

fn number_arg(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
