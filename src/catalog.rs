//! Static product catalog for the counter.
//!
//! The list is fixed at build time and drives both the product cards on the
//! order screen and the zero-quantity lines every new order starts from.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub image: &'static str,
}

static PRODUCTS: [Product; 3] = [
    Product {
        id: "baguette",
        name: "Traditional Baguette",
        description: "Crispy crust with a soft, airy interior. Perfect for sandwiches or with butter.",
        price: dec!(4.50),
        image: "/images/baguette.png",
    },
    Product {
        id: "croissant",
        name: "Butter Croissant",
        description: "Flaky, buttery layers with a golden crust. A French breakfast classic.",
        price: dec!(3.75),
        image: "/images/croissant.png",
    },
    Product {
        id: "banh-mi",
        name: "Bánh Mì Roll",
        description: "Light, airy Vietnamese-style roll with a thin crust. Perfect for our signature sandwiches.",
        price: dec!(3.25),
        image: "/images/banh-mi.png",
    },
];

/// All purchasable products, in display order.
pub fn products() -> &'static [Product] {
    &PRODUCTS
}
