use std::path::Path;

use super::*;

#[test]
fn validate_rejects_empty_name() {
    let file = SupermarketsFile {
        supermarkets: vec![SupermarketConfig {
            name: "  ".to_string(),
        }],
    };
    let err = validate_supermarkets(&file).unwrap_err();
    assert!(err.to_string().contains("non-empty"));
}

#[test]
fn validate_rejects_duplicate_name() {
    let file = SupermarketsFile {
        supermarkets: vec![
            SupermarketConfig {
                name: "Albert Heijn".to_string(),
            },
            SupermarketConfig {
                name: "albert heijn".to_string(),
            },
        ],
    };
    let err = validate_supermarkets(&file).unwrap_err();
    assert!(err.to_string().contains("duplicate supermarket name"));
}

#[test]
fn validate_accepts_distinct_names() {
    let file = SupermarketsFile {
        supermarkets: vec![
            SupermarketConfig {
                name: "Albert Heijn".to_string(),
            },
            SupermarketConfig {
                name: "Jumbo".to_string(),
            },
        ],
    };
    assert!(validate_supermarkets(&file).is_ok());
}

#[test]
fn load_supermarkets_from_real_file() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("config")
        .join("supermarkets.yaml");
    assert!(
        path.exists(),
        "supermarkets.yaml missing at {path:?} — required for this test"
    );
    let result = load_supermarkets(&path);
    assert!(
        result.is_ok(),
        "failed to load supermarkets.yaml: {result:?}"
    );
    let file = result.unwrap();
    assert!(!file.supermarkets.is_empty());
}
