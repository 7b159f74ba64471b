//! Proptest generators for storefront domain values.

use proptest::prelude::*;
use storefront_core::validation::OrderForm;
use storefront_core::{OrderStatus, GOVERNORATES};

pub fn arb_order_status() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

pub fn arb_governorate() -> impl Strategy<Value = &'static str> {
    prop::sample::select(GOVERNORATES.to_vec())
}

/// Egyptian mobile number, optionally with spaces the form should strip.
pub fn arb_phone() -> impl Strategy<Value = String> {
    ("[0125]", "[0-9]{8}", any::<bool>()).prop_map(|(operator, rest, spaced)| {
        let digits = format!("01{operator}{rest}");
        if spaced {
            format!("{} {} {}", &digits[..3], &digits[3..7], &digits[7..])
        } else {
            digits
        }
    })
}

/// An order form that passes validation.
pub fn arb_valid_order_form() -> impl Strategy<Value = OrderForm> {
    (
        "[A-Za-z]{2,20}( [A-Za-z]{2,20})?",
        arb_phone(),
        "[A-Za-z0-9 ]{10,80}",
        arb_governorate(),
        proptest::option::of("[A-Za-z ]{0,100}"),
    )
        .prop_filter("address must have 10 non-blank chars", |(_, _, address, _, _)| {
            address.trim().chars().count() >= 10
        })
        .prop_map(|(customer_name, phone, address, governorate, notes)| OrderForm {
            customer_name,
            phone,
            address,
            governorate: governorate.to_string(),
            notes,
        })
}

/// Requests per window and a number of attempts around the limit.
pub fn arb_quota() -> impl Strategy<Value = (u32, u32)> {
    (1u32..30).prop_flat_map(|max| (Just(max), 1u32..(max * 2 + 2)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::validate_order_form;

    proptest! {
        #[test]
        fn prop_generated_forms_validate(form in arb_valid_order_form()) {
            prop_assert!(validate_order_form(&form).is_ok());
        }

        #[test]
        fn prop_generated_phones_validate(phone in arb_phone()) {
            prop_assert!(storefront_core::validation::is_valid_phone(&phone));
        }
    }
}
