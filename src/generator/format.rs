//! Locale and currency aware formatting used by the template value resolver
//! and by the page template helpers.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use num_format::ToFormattedString;

use crate::models::TimeRange;

/// Locales the generated documents are available in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    EnUs,
    FrFr,
    PtBr,
    DeDe,
}

impl Locale {
    /// Parses a BCP-47 tag, falling back to `en-US` for unknown tags.
    pub fn parse(tag: &str) -> Self {
        let tag = tag.replace('_', "-").to_lowercase();
        match tag.as_str() {
            "fr" | "fr-fr" => Self::FrFr,
            "pt" | "pt-br" => Self::PtBr,
            "de" | "de-de" => Self::DeDe,
            _ => Self::EnUs,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::EnUs => "en-US",
            Self::FrFr => "fr-FR",
            Self::PtBr => "pt-BR",
            Self::DeDe => "de-DE",
        }
    }

    fn numbers(&self) -> num_format::Locale {
        match self {
            Self::EnUs => num_format::Locale::en,
            Self::FrFr => num_format::Locale::fr,
            Self::PtBr => num_format::Locale::pt,
            Self::DeDe => num_format::Locale::de,
        }
    }

    fn dates(&self) -> chrono::Locale {
        match self {
            Self::EnUs => chrono::Locale::en_US,
            Self::FrFr => chrono::Locale::fr_FR,
            Self::PtBr => chrono::Locale::pt_BR,
            Self::DeDe => chrono::Locale::de_DE,
        }
    }

    /// strftime pattern of the long date (`LL`).
    fn long_date(&self) -> &'static str {
        match self {
            Self::EnUs => "%B %-d, %Y",
            Self::FrFr => "%-d %B %Y",
            Self::PtBr => "%-d de %B de %Y",
            Self::DeDe => "%-d. %B %Y",
        }
    }

    /// strftime pattern of the short date (`L`).
    fn short_date(&self) -> &'static str {
        match self {
            Self::EnUs => "%m/%d/%Y",
            Self::FrFr | Self::PtBr => "%d/%m/%Y",
            Self::DeDe => "%d.%m.%Y",
        }
    }

    pub fn week_start(&self) -> Weekday {
        match self {
            Self::EnUs | Self::PtBr => Weekday::Sun,
            Self::FrFr | Self::DeDe => Weekday::Mon,
        }
    }

    fn ordinal(&self, day: u32) -> String {
        match self {
            Self::EnUs => {
                let suffix = match (day % 10, day % 100) {
                    (_, 11..=13) => "th",
                    (1, _) => "st",
                    (2, _) => "nd",
                    (3, _) => "rd",
                    _ => "th",
                };
                format!("{}{}", day, suffix)
            }
            Self::FrFr if day == 1 => "1er".to_string(),
            Self::FrFr => day.to_string(),
            Self::PtBr => format!("{}º", day),
            Self::DeDe => format!("{}.", day),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStyle {
    Decimal,
    Currency,
    Percent,
}

impl NumberStyle {
    pub fn parse(style: &str) -> Option<Self> {
        match style {
            "decimal" => Some(Self::Decimal),
            "currency" => Some(Self::Currency),
            "percent" => Some(Self::Percent),
            _ => None,
        }
    }
}

/// Formatter bound to one locale and one currency.
#[derive(Debug, Clone)]
pub struct Formatter {
    locale: Locale,
    currency: String,
}

impl Formatter {
    pub fn new(locale: &str, currency: &str) -> Self {
        Self {
            locale: Locale::parse(locale),
            currency: currency.to_uppercase(),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn format_number(&self, value: f64, style: NumberStyle, min_fraction_digits: usize) -> String {
        match style {
            NumberStyle::Decimal => {
                // Up to three decimals, never fewer than requested.
                self.decimal(value, min_fraction_digits, min_fraction_digits.max(3))
            }
            NumberStyle::Currency => self.currency_amount(value, min_fraction_digits),
            NumberStyle::Percent => {
                let number = self.decimal(value * 100.0, min_fraction_digits, min_fraction_digits);
                match self.locale {
                    Locale::EnUs | Locale::PtBr => format!("{}%", number),
                    Locale::FrFr | Locale::DeDe => format!("{}\u{a0}%", number),
                }
            }
        }
    }

    pub fn format_currency(&self, value: f64) -> String {
        self.currency_amount(value, 2)
    }

    fn currency_amount(&self, value: f64, min_fraction_digits: usize) -> String {
        let number = self.decimal(value.abs(), min_fraction_digits, min_fraction_digits.max(2));
        let symbol = currency_symbol(&self.currency);
        let sign = if value < 0.0 && number.chars().any(|c| c.is_ascii_digit() && c != '0') {
            "-"
        } else {
            ""
        };
        match self.locale {
            Locale::EnUs => format!("{}{}{}", sign, symbol, number),
            Locale::PtBr => format!("{}{}\u{a0}{}", sign, symbol, number),
            Locale::FrFr | Locale::DeDe => format!("{}{}\u{a0}{}", sign, number, symbol),
        }
    }

    fn decimal(&self, value: f64, min_digits: usize, max_digits: usize) -> String {
        if value.is_nan() {
            return "NaN".to_string();
        }
        if value.is_infinite() {
            return if value < 0.0 { "-∞" } else { "∞" }.to_string();
        }

        let numbers = self.locale.numbers();
        let rendered = format!("{:.*}", max_digits, value.abs());
        let (int_part, frac_part) = match rendered.split_once('.') {
            Some((i, f)) => (i.to_string(), f.to_string()),
            None => (rendered.clone(), String::new()),
        };

        let mut fraction = frac_part;
        while fraction.len() > min_digits && fraction.ends_with('0') {
            fraction.pop();
        }

        let mut out = String::new();
        if value < 0.0 && (int_part.chars().any(|c| c != '0') || fraction.chars().any(|c| c != '0')) {
            out.push('-');
        }
        match int_part.parse::<u128>() {
            Ok(integer) => out.push_str(&integer.to_formatted_string(&numbers)),
            Err(_) => out.push_str(&group_digits(&int_part, numbers.separator())),
        }
        if !fraction.is_empty() {
            out.push_str(numbers.decimal());
            out.push_str(&fraction);
        }
        out
    }

    /// Formats a date using a moment-like pattern (`L`, `LL`, `MMMM YYYY`,
    /// `YYYY`) or a strftime pattern.
    pub fn format_date(&self, date: NaiveDate, pattern: &str) -> String {
        let strftime = match pattern {
            "L" | "DD/MM/YYYY" => self.locale.short_date(),
            "LL" => self.locale.long_date(),
            "MMMM YYYY" => "%B %Y",
            "MMM" => "%b",
            "YYYY" => "%Y",
            other => other,
        };
        date.format_localized(strftime, self.locale.dates()).to_string()
    }

    /// Formats a record date (`DD/MM/YYYY`) as a long localized date.
    /// Unparsable input is returned unchanged.
    pub fn format_record_date(&self, date: &str, pattern: &str) -> String {
        match parse_record_date(date) {
            Some(parsed) => self.format_date(parsed, pattern),
            None => date.to_string(),
        }
    }

    /// Formats a billing term (`YYYYMMDDHH`) for the lease time range.
    ///
    /// `week_label` renders the week range from the localized
    /// `{{month}} {{startDay}} to {{endDay}}` message.
    pub fn format_term(
        &self,
        term: u64,
        time_range: TimeRange,
        week_label: impl Fn(&str, &str, &str) -> String,
    ) -> String {
        let Some(date) = parse_term(term) else {
            return term.to_string();
        };
        match time_range {
            TimeRange::Days => self.format_date(date, "LL"),
            TimeRange::Weeks => {
                let (start, end) = week_bounds(date, self.locale.week_start());
                week_label(
                    &self.format_date(date, "MMM"),
                    &self.locale.ordinal(start.day()),
                    &self.locale.ordinal(end.day()),
                )
            }
            TimeRange::Months => self.format_date(date, "MMMM YYYY"),
            TimeRange::Years => self.format_date(date, "YYYY"),
        }
    }
}

/// Groups by thousands the integer digits too large for `u128`.
fn group_digits(digits: &str, separator: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(digit);
    }
    out
}

fn currency_symbol(currency: &str) -> &str {
    match currency {
        "EUR" => "€",
        "USD" => "$",
        "GBP" => "£",
        "BRL" => "R$",
        "CHF" => "CHF",
        "JPY" => "¥",
        other => other,
    }
}

/// Parses a `YYYYMMDDHH` term.
pub fn parse_term(term: u64) -> Option<NaiveDate> {
    let text = term.to_string();
    if text.len() < 8 {
        return None;
    }
    NaiveDate::parse_from_str(&text[..8], "%Y%m%d").ok()
}

/// Parses a `DD/MM/YYYY` record date.
pub fn parse_record_date(date: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%d/%m/%Y").ok()
}

pub fn week_bounds(date: NaiveDate, week_start: Weekday) -> (NaiveDate, NaiveDate) {
    let offset = (7 + date.weekday().num_days_from_monday() as i64
        - week_start.num_days_from_monday() as i64)
        % 7;
    let start = date - Duration::days(offset);
    (start, start + Duration::days(6))
}

/// Two-decimal rounding applied to computed amounts.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_per_locale() {
        assert_eq!(Formatter::new("en-US", "USD").format_currency(1234.5), "$1,234.50");
        assert_eq!(
            Formatter::new("de-DE", "EUR").format_currency(1234.5),
            "1.234,50\u{a0}€"
        );
        assert_eq!(
            Formatter::new("pt-BR", "BRL").format_currency(1234.5),
            "R$\u{a0}1.234,50"
        );
        assert_eq!(Formatter::new("en-US", "USD").format_currency(-20.0), "-$20.00");
    }

    #[test]
    fn test_currency_keeps_up_to_two_decimals() {
        let en = Formatter::new("en-US", "USD");
        assert_eq!(en.format_number(12.5, NumberStyle::Currency, 0), "$12.5");
        assert_eq!(en.format_number(12.0, NumberStyle::Currency, 0), "$12");
        assert_eq!(en.format_number(12.3456, NumberStyle::Currency, 0), "$12.35");
        assert_eq!(en.format_number(12.5, NumberStyle::Currency, 3), "$12.500");
    }

    #[test]
    fn test_huge_and_non_finite_numbers() {
        let en = Formatter::new("en-US", "USD");
        assert_eq!(en.format_number(f64::NAN, NumberStyle::Decimal, 0), "NaN");
        assert_eq!(en.format_number(f64::INFINITY, NumberStyle::Decimal, 0), "∞");
        assert_eq!(en.format_currency(f64::NAN), "$NaN");
        assert_eq!(
            en.format_number(2e19, NumberStyle::Decimal, 0),
            "20,000,000,000,000,000,000"
        );
        assert_eq!(
            en.format_number(2f64.powi(130), NumberStyle::Decimal, 0),
            "1,361,129,467,683,753,853,853,498,429,727,072,845,824"
        );
        assert_eq!(group_digits("1234567", "."), "1.234.567");
        assert_eq!(group_digits("123", ","), "123");
    }

    #[test]
    fn test_decimal_and_percent() {
        let en = Formatter::new("en", "USD");
        assert_eq!(en.format_number(1500.0, NumberStyle::Decimal, 2), "1,500.00");
        assert_eq!(en.format_number(12.3456, NumberStyle::Decimal, 0), "12.346");
        assert_eq!(en.format_number(0.2, NumberStyle::Percent, 0), "20%");
        assert_eq!(
            Formatter::new("fr-FR", "EUR").format_number(0.055, NumberStyle::Percent, 1),
            "5,5\u{a0}%"
        );
    }

    #[test]
    fn test_format_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(Formatter::new("en-US", "USD").format_date(date, "LL"), "March 5, 2024");
        assert_eq!(Formatter::new("fr-FR", "EUR").format_date(date, "LL"), "5 mars 2024");
        assert_eq!(Formatter::new("de-DE", "EUR").format_date(date, "L"), "05.03.2024");
        assert_eq!(
            Formatter::new("en-US", "USD").format_record_date("05/03/2024", "LL"),
            "March 5, 2024"
        );
        assert_eq!(
            Formatter::new("en-US", "USD").format_record_date("not a date", "LL"),
            "not a date"
        );
    }

    #[test]
    fn test_format_term() {
        let en = Formatter::new("en-US", "USD");
        let label = |month: &str, start: &str, end: &str| format!("{} {} to {}", month, start, end);
        assert_eq!(en.format_term(2024030100, TimeRange::Months, label), "March 2024");
        assert_eq!(en.format_term(2024030100, TimeRange::Years, label), "2024");
        assert_eq!(en.format_term(2024030100, TimeRange::Days, label), "March 1, 2024");
        // 2024-03-06 is a Wednesday; the en-US week runs Sunday to Saturday.
        assert_eq!(en.format_term(2024030600, TimeRange::Weeks, label), "Mar 3rd to 9th");
        assert_eq!(en.format_term(42, TimeRange::Months, label), "42");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(100.0 * 0.2), 20.0);
        assert_eq!(round2(33.333333), 33.33);
    }
}
