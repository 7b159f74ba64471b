//! Egyptian governorates accepted by the order form.

pub const GOVERNORATES: [&str; 27] = [
    "القاهرة",
    "الجيزة",
    "الإسكندرية",
    "الدقهلية",
    "الشرقية",
    "القليوبية",
    "كفر الشيخ",
    "الغربية",
    "المنوفية",
    "البحيرة",
    "بني سويف",
    "الفيوم",
    "المنيا",
    "أسيوط",
    "سوهاج",
    "قنا",
    "الأقصر",
    "أسوان",
    "البحر الأحمر",
    "الوادي الجديد",
    "مطروح",
    "شمال سيناء",
    "جنوب سيناء",
    "بورسعيد",
    "دمياط",
    "الإسماعيلية",
    "السويس",
];

/// Governorates served at the Cairo/Giza shipping rate.
pub const CAIRO_GIZA: [&str; 2] = ["القاهرة", "الجيزة"];

pub fn is_valid_governorate(name: &str) -> bool {
    GOVERNORATES.contains(&name.trim())
}

pub fn is_cairo_giza(name: &str) -> bool {
    CAIRO_GIZA.contains(&name.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_governorates() {
        assert!(is_valid_governorate("أسوان"));
        assert!(is_valid_governorate(" الجيزة "));
        assert!(!is_valid_governorate("Cairo"));
    }

    #[test]
    fn test_cairo_giza() {
        assert!(is_cairo_giza("القاهرة"));
        assert!(is_cairo_giza("الجيزة"));
        assert!(!is_cairo_giza("الإسكندرية"));
    }

    #[test]
    fn test_list_has_no_duplicates() {
        let mut names = GOVERNORATES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), GOVERNORATES.len());
    }
}
