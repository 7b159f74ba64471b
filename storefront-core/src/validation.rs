//! Input validation for the order form, the product editor and the settings
//! page.
//!
//! Every validator collects all failing fields instead of stopping at the
//! first one, and returns them as [`ValidationError::Issues`].

use crate::entities::{NewProduct, SettingsPatch};
use crate::error::{FieldIssue, ValidationError};
use crate::governorate::is_valid_governorate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// LIMITS
// ============================================================================

pub const MAX_IMAGES_PER_PRODUCT: usize = 10;
pub const MAX_BENEFITS_PER_PRODUCT: usize = 10;
pub const MAX_USAGE_STEPS: usize = 8;
pub const MAX_PRICE: f64 = 100_000.0;

static NAME_PATTERN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(
        r"^[\x{0600}-\x{06FF}\x{0750}-\x{077F}\x{08A0}-\x{08FF}\x{FB50}-\x{FDFF}\x{FE70}-\x{FEFF}a-zA-Z\s]+$",
    )
});

static PHONE_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^01[0-9]{9}$"));

static URL_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$"));

static EMAIL_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"));

/// A pattern that failed to compile matches nothing.
fn matches(pattern: &Lazy<Result<Regex, regex::Error>>, value: &str) -> bool {
    pattern.as_ref().map(|re| re.is_match(value)).unwrap_or(false)
}

/// Remove all whitespace from a phone number.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn is_valid_phone(raw: &str) -> bool {
    matches(&PHONE_PATTERN, &normalize_phone(raw))
}

pub fn is_valid_url(raw: &str) -> bool {
    matches(&URL_PATTERN, raw)
}

pub fn is_valid_email(raw: &str) -> bool {
    matches(&EMAIL_PATTERN, raw)
}

/// Collects issues while a validator walks its input.
#[derive(Debug, Default)]
struct Issues(Vec<FieldIssue>);

impl Issues {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldIssue::new(field, message));
    }

    fn length(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.push(field, format!("must be at least {min} characters"));
        } else if len > max {
            self.push(field, format!("must be at most {max} characters"));
        }
    }

    fn list(&mut self, field: &str, items: &[String], max_items: usize, max_len: usize) {
        if items.len() > max_items {
            self.push(field, format!("at most {max_items} entries allowed"));
        }
        for (i, item) in items.iter().enumerate() {
            let len = item.chars().count();
            if len == 0 || len > max_len {
                self.push(
                    &format!("{field}[{i}]"),
                    format!("must be between 1 and {max_len} characters"),
                );
            }
        }
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::Issues { issues: self.0 })
        }
    }
}

// ============================================================================
// ORDER FORM
// ============================================================================

/// Raw order form as typed by the customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderForm {
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub governorate: String,
    pub notes: Option<String>,
}

/// Order form after validation and normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedOrder {
    pub customer_name: String,
    /// Digits only.
    pub phone: String,
    pub address: String,
    pub governorate: String,
    /// Trimmed; empty notes become `None`.
    pub notes: Option<String>,
}

pub fn validate_order_form(form: &OrderForm) -> Result<ValidatedOrder, ValidationError> {
    let mut issues = Issues::default();

    let name = form.customer_name.trim();
    issues.length("customer_name", name, 2, 100);
    if !name.is_empty() && !matches(&NAME_PATTERN, name) {
        issues.push("customer_name", "only Arabic or Latin letters are allowed");
    }

    let phone = normalize_phone(&form.phone);
    if !matches(&PHONE_PATTERN, &phone) {
        issues.push("phone", "must start with 01 and contain 11 digits");
    }

    let address = form.address.trim();
    issues.length("address", address, 10, 500);

    let governorate = form.governorate.trim();
    if governorate.is_empty() {
        issues.push("governorate", "please choose a governorate");
    } else if !is_valid_governorate(governorate) {
        issues.push("governorate", "unknown governorate");
    }

    let notes = form
        .notes
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if let Some(n) = notes {
        if n.chars().count() > 1000 {
            issues.push("notes", "must be at most 1000 characters");
        }
    }

    issues.finish()?;

    Ok(ValidatedOrder {
        customer_name: name.to_string(),
        phone,
        address: address.to_string(),
        governorate: governorate.to_string(),
        notes: notes.map(str::to_string),
    })
}

// ============================================================================
// PRODUCT
// ============================================================================

pub fn validate_product(product: &NewProduct) -> Result<(), ValidationError> {
    let mut issues = Issues::default();

    issues.length("name", product.name.trim(), 2, 200);
    issues.length("brand", product.brand.trim(), 2, 100);

    if !product.price.is_finite() || product.price < 0.0 {
        issues.push("price", "must be zero or greater");
    } else if product.price > MAX_PRICE {
        issues.push("price", "price is too high");
    }

    if let Some(description) = &product.description {
        if description.chars().count() > 2000 {
            issues.push("description", "must be at most 2000 characters");
        }
    }

    if let Some(number) = &product.whatsapp_number {
        if !is_valid_phone(number) {
            issues.push("whatsapp_number", "invalid WhatsApp number");
        }
    }

    issues.list("benefits", &product.benefits, MAX_BENEFITS_PER_PRODUCT, 200);
    issues.list(
        "usage_instructions",
        &product.usage_instructions,
        MAX_USAGE_STEPS,
        300,
    );

    if product.images.len() > MAX_IMAGES_PER_PRODUCT {
        issues.push(
            "images",
            format!("at most {MAX_IMAGES_PER_PRODUCT} images allowed"),
        );
    }
    for (i, url) in product.images.iter().enumerate() {
        if !is_valid_url(url) {
            issues.push(&format!("images[{i}]"), "invalid image URL");
        }
    }

    issues.finish()
}

// ============================================================================
// SITE SETTINGS
// ============================================================================

/// Validate the fields a settings patch sets. Unset fields are not checked.
pub fn validate_settings(patch: &SettingsPatch) -> Result<(), ValidationError> {
    let mut issues = Issues::default();

    if let Some(name) = &patch.site_name {
        issues.length("site_name", name.trim(), 1, 100);
    }
    if let Some(phone) = &patch.support_phone {
        if !is_valid_phone(phone) {
            issues.push("support_phone", "invalid support phone");
        }
    }
    if let Some(email) = &patch.support_email {
        if !is_valid_email(email) {
            issues.push("support_email", "invalid email address");
        }
    }
    for (field, value) in [
        ("facebook_url", &patch.facebook_url),
        ("instagram_url", &patch.instagram_url),
        ("whatsapp_url", &patch.whatsapp_url),
    ] {
        if let Some(url) = value {
            if !is_valid_url(url) {
                issues.push(field, "invalid URL");
            }
        }
    }

    issues.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> OrderForm {
        OrderForm {
            customer_name: "منى أحمد".to_string(),
            phone: "010 1234 5678".to_string(),
            address: "15 شارع النيل، المعادي".to_string(),
            governorate: "القاهرة".to_string(),
            notes: Some("   ".to_string()),
        }
    }

    fn product() -> NewProduct {
        NewProduct {
            name: "Keke Serum".to_string(),
            brand: "Sandreen".to_string(),
            price: 350.0,
            description: Some("Vitamin C serum".to_string()),
            whatsapp_number: Some("01123456789".to_string()),
            benefits: vec!["Brightens".to_string()],
            usage_instructions: vec!["Apply twice daily".to_string()],
            images: vec!["https://cdn.example.com/a.jpg".to_string()],
            is_active: true,
        }
    }

    fn fields(err: ValidationError) -> Vec<String> {
        err.issues().into_iter().map(|i| i.field).collect()
    }

    #[test]
    fn test_order_form_normalises() {
        let validated = validate_order_form(&form()).unwrap();
        assert_eq!(validated.phone, "01012345678");
        assert_eq!(validated.notes, None);
        assert_eq!(validated.governorate, "القاهرة");
    }

    #[test]
    fn test_order_form_latin_name_accepted() {
        let mut f = form();
        f.customer_name = "Mona Ahmed".to_string();
        assert!(validate_order_form(&f).is_ok());
    }

    #[test]
    fn test_order_form_collects_every_issue() {
        let f = OrderForm {
            customer_name: "M1".to_string(),
            phone: "0201234".to_string(),
            address: "short".to_string(),
            governorate: String::new(),
            notes: Some("x".repeat(1001)),
        };
        let err = validate_order_form(&f).unwrap_err();
        let fields = fields(err);
        assert!(fields.contains(&"customer_name".to_string()));
        assert!(fields.contains(&"phone".to_string()));
        assert!(fields.contains(&"address".to_string()));
        assert!(fields.contains(&"governorate".to_string()));
        assert!(fields.contains(&"notes".to_string()));
    }

    #[test]
    fn test_order_form_unknown_governorate() {
        let mut f = form();
        f.governorate = "Atlantis".to_string();
        let err = validate_order_form(&f).unwrap_err();
        assert_eq!(fields(err), vec!["governorate".to_string()]);
    }

    #[test]
    fn test_product_valid() {
        assert!(validate_product(&product()).is_ok());
    }

    #[test]
    fn test_product_limits() {
        let mut p = product();
        p.price = 100_001.0;
        p.images = (0..11).map(|i| format!("https://cdn/{i}.jpg")).collect();
        p.usage_instructions = vec![String::new()];
        let fields = fields(validate_product(&p).unwrap_err());
        assert!(fields.contains(&"price".to_string()));
        assert!(fields.contains(&"images".to_string()));
        assert!(fields.contains(&"usage_instructions[0]".to_string()));
    }

    #[test]
    fn test_product_bad_image_url() {
        let mut p = product();
        p.images = vec!["not a url".to_string()];
        let fields = fields(validate_product(&p).unwrap_err());
        assert_eq!(fields, vec!["images[0]".to_string()]);
    }

    #[test]
    fn test_settings_validation() {
        let ok = SettingsPatch {
            site_name: Some("Sandreen Beauty".to_string()),
            support_email: Some("help@sandreen.shop".to_string()),
            facebook_url: Some("https://facebook.com/sandreen".to_string()),
            ..SettingsPatch::default()
        };
        assert!(validate_settings(&ok).is_ok());

        let bad = SettingsPatch {
            site_name: Some(String::new()),
            support_email: Some("nope".to_string()),
            instagram_url: Some("instagram".to_string()),
            ..SettingsPatch::default()
        };
        let fields = fields(validate_settings(&bad).unwrap_err());
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn test_patterns_compile() {
        assert!(NAME_PATTERN.is_ok());
        assert!(PHONE_PATTERN.is_ok());
        assert!(URL_PATTERN.is_ok());
        assert!(EMAIL_PATTERN.is_ok());
        assert!(is_valid_phone("01099999999"));
        assert!(!is_valid_phone("+201099999999"));
        assert!(is_valid_url("https://example.com/x.png"));
        assert!(is_valid_email("a@b.co"));
    }
}
