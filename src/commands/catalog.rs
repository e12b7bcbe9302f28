use crate::catalog;

pub fn catalog_list() -> Result<serde_json::Value, String> {
    Ok(serde_json::json!({
        "success": true,
        "products": catalog::products(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_list_returns_products_with_float_prices() {
        let resp = catalog_list().unwrap();
        let products = resp["products"].as_array().unwrap();
        assert_eq!(products.len(), 3);
        assert_eq!(products[0]["id"], "baguette");
        assert_eq!(products[0]["price"], 4.5);
        assert!(products[2]["image"].as_str().is_some());
    }
}
