use serde_json::json;

use xstat::{normalize, RawResultTree};

fn vector(values: serde_json::Value) -> serde_json::Value {
    json!({"type": "double", "names": null, "values": values})
}

fn wrap(value: serde_json::Value, depth: usize) -> serde_json::Value {
    (0..depth).fold(value, |inner, _| {
        json!({"type": "list", "names": null, "values": [inner]})
    })
}

#[test]
fn test_wrapping_depths_from_engine_json() {
    for depth in 0..=2 {
        let tree = RawResultTree::from_json(&json!({
            "type": "list",
            "names": ["alpha_if_deleted", "n_items"],
            "values": [
                wrap(vector(json!([0.71, 0.86, 0.75])), depth),
                wrap(vector(json!([3])), depth),
            ]
        }))
        .unwrap();
        let result = normalize(&tree, &["alpha_if_deleted", "n_items"]);
        assert_eq!(
            result.values("alpha_if_deleted"),
            &[0.71, 0.86, 0.75],
            "depth {}",
            depth
        );
        assert_eq!(result.scalar("n_items"), Some(3.0), "depth {}", depth);
    }
}

#[test]
fn test_missing_names_are_tolerated() {
    let tree = RawResultTree::from_json(&json!({
        "type": "list",
        "names": ["mean"],
        "values": [vector(json!([2.0, 3.0]))]
    }))
    .unwrap();
    let result = normalize(&tree, &["mean", "sd", "median"]);
    assert_eq!(result.values("mean"), &[2.0, 3.0]);
    assert!(result.values("sd").is_empty());
    assert!(result.values("median").is_empty());
}

#[test]
fn test_named_vector_keeps_order() {
    let tree = RawResultTree::from_json(&json!({
        "type": "list",
        "names": ["communalities"],
        "values": [{
            "type": "double",
            "names": ["v1", "v2", "v3"],
            "values": [0.6, 0.3, 0.8]
        }]
    }))
    .unwrap();
    let result = normalize(&tree, &["communalities"]);
    assert_eq!(result.values("communalities"), &[0.6, 0.3, 0.8]);
}

#[test]
fn test_na_entries_become_nan() {
    let tree = RawResultTree::from_json(&json!({
        "type": "list",
        "names": ["bartlett_p"],
        "values": [{"type": "logical", "values": [null]}]
    }))
    .unwrap();
    let result = normalize(&tree, &["bartlett_p"]);
    assert!(result.scalar("bartlett_p").unwrap().is_nan());
}
