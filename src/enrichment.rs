//! Catalog enrichment
//!
//! Pure lookup-table classifiers that annotate report rows with a brand and
//! a shelf category. Deliberately outside the matching/decision engine:
//! nothing here feeds the classifier.

use lazy_static::lazy_static;

lazy_static! {
    /// Brand -> alias terms matched against the lower-cased product name.
    /// First hit wins, so more specific brands go first.
    static ref BRAND_TABLE: Vec<(&'static str, Vec<&'static str>)> = vec![
        ("Tom Ford", vec!["tom ford", "توم فورد"]),
        ("Yves Saint Laurent", vec!["yves saint laurent", "ysl", "سان لوران"]),
        ("Chanel", vec!["chanel", "شانيل"]),
        ("Dior", vec!["dior", "ديور"]),
        ("Versace", vec!["versace", "فرزاتشي", "فيرساتشي"]),
        ("Armani", vec!["armani", "ارماني", "أرماني"]),
        ("Creed", vec!["creed", "كريد"]),
        ("Lattafa", vec!["lattafa", "لطافة"]),
        ("Ajmal", vec!["ajmal", "اجمل", "أجمل"]),
        ("Rasasi", vec!["rasasi", "رصاصي"]),
    ];
}

pub const DEFAULT_BRAND: &str = "Other";
pub const DEFAULT_CATEGORY: &str = "Fragrance";

/// First brand whose alias occurs in the name, or the default.
pub fn classify_brand(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    for (brand, terms) in BRAND_TABLE.iter() {
        if terms.iter().any(|t| lower.contains(t)) {
            return brand;
        }
    }
    DEFAULT_BRAND
}

/// Ordered keyword rules over name + product type; first rule wins.
pub fn classify_category(name: &str, product_type: &str) -> &'static str {
    let combined = format!("{} {}", name, product_type).to_lowercase();
    if combined.contains("تستر") || combined.contains("tester") {
        return "Testers";
    }
    if combined.contains("طقم") || combined.contains("مجموع") || combined.contains("set") {
        return "Sets & Gifts";
    }
    if combined.contains("شعر") || combined.contains("hair") {
        return "Hair Mist";
    }
    if combined.contains("جسم") || combined.contains("body") {
        return "Body Care";
    }
    if combined.contains("عينة") || combined.contains("sample") || combined.contains("ميني") {
        return "Samples & Minis";
    }
    if combined.contains("بخور") {
        return "Incense";
    }
    if combined.contains("عود") {
        return "Oud";
    }
    if combined.contains("معطر") {
        return "Home Fragrance";
    }
    DEFAULT_CATEGORY
}
