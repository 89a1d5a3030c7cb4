use serde_json::Value;

/// Flatten a JSON object into an x-www-form-urlencoded string using Stripe's
/// bracket notation: nested maps become `parent[child]`, arrays become
/// `parent[index]` (recursing into element maps), scalars stringify and are
/// percent-encoded. Total for any JSON input; a non-object top level yields
/// an empty string.
pub fn to_query_string(obj: &Value) -> String {
    let mut pairs = Vec::new();
    collect_pairs(obj, "", &mut pairs);
    pairs.join("&")
}

fn collect_pairs(value: &Value, key: &str, pairs: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let full_key = if key.is_empty() {
                    k.clone()
                } else {
                    format!("{key}[{k}]")
                };
                collect_pairs(v, &full_key, pairs);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_pairs(item, &format!("{key}[{index}]"), pairs);
            }
        }
        scalar => {
            // A bare scalar with no key has no place in a form body.
            if key.is_empty() {
                return;
            }
            pairs.push(format!(
                "{}={}",
                urlencoding::encode(key),
                urlencoding::encode(&scalar_to_string(scalar))
            ));
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// The bracket-notation keys an input should flatten to.
    fn flattened_keys(value: &Value, key: &str, keys: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    let full_key = if key.is_empty() {
                        k.clone()
                    } else {
                        format!("{key}[{k}]")
                    };
                    flattened_keys(v, &full_key, keys);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    flattened_keys(item, &format!("{key}[{index}]"), keys);
                }
            }
            _ => keys.push(key.to_string()),
        }
    }

    fn decoded_keys(encoded: &str) -> Vec<String> {
        if encoded.is_empty() {
            return Vec::new();
        }
        encoded
            .split('&')
            .map(|pair| {
                let key = pair.split('=').next().unwrap();
                urlencoding::decode(key).unwrap().into_owned()
            })
            .collect()
    }

    #[test]
    fn encodes_flat_scalars() {
        let body = json!({ "customer": "cus_123", "quantity": 2, "active": true });
        let encoded = to_query_string(&body);
        assert!(encoded.contains("customer=cus_123"));
        assert!(encoded.contains("quantity=2"));
        assert!(encoded.contains("active=true"));
    }

    #[test]
    fn encodes_nested_objects_with_bracket_keys() {
        let body = json!({ "business_profile": { "headline": "Launchbase - Customer Portal" } });
        let encoded = to_query_string(&body);
        assert_eq!(
            encoded,
            "business_profile%5Bheadline%5D=Launchbase%20-%20Customer%20Portal"
        );
    }

    #[test]
    fn encodes_arrays_with_index_keys() {
        let body = json!({ "line_items": [{ "price": "price_1", "quantity": 1 }] });
        let encoded = to_query_string(&body);
        assert!(encoded.contains("line_items%5B0%5D%5Bprice%5D=price_1"));
        assert!(encoded.contains("line_items%5B0%5D%5Bquantity%5D=1"));
    }

    #[test]
    fn encodes_scalar_array_elements() {
        let body = json!({ "payment_method_types": ["card", "sepa_debit"] });
        let encoded = to_query_string(&body);
        assert!(encoded.contains("payment_method_types%5B0%5D=card"));
        assert!(encoded.contains("payment_method_types%5B1%5D=sepa_debit"));
    }

    #[test]
    fn null_leaves_do_not_panic() {
        let body = json!({ "description": null });
        assert_eq!(to_query_string(&body), "description=null");
    }

    #[test]
    fn non_object_top_level_yields_empty_string() {
        assert_eq!(to_query_string(&json!(42)), "");
        assert_eq!(to_query_string(&json!(null)), "");
        assert_eq!(to_query_string(&json!("hello")), "");
    }

    #[test]
    fn key_set_round_trips_through_encoding() {
        let body = json!({
            "customer": "cus_1",
            "line_items": [
                { "price": "price_a", "quantity": 1 },
                { "price": "price_b", "quantity": 3 }
            ],
            "features": {
                "invoice_history": { "enabled": true },
                "subscription_update": {
                    "default_allowed_updates": ["price"],
                    "products": [{ "product": "pro", "prices": ["p1", "p2"] }]
                }
            },
            "mode": "subscription"
        });

        let mut expected = Vec::new();
        flattened_keys(&body, "", &mut expected);
        let mut actual = decoded_keys(&to_query_string(&body));

        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
    }
}
