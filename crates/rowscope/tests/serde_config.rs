//! Serialization of configuration and ranges crossing the query bridge.
#![cfg(feature = "serde")]

use rowscope::{Alignment, ColumnFilter, SortDirection, SortKey, VisibleRange, WindowConfig};

#[test]
fn window_config_defaults_missing_fields() {
    let config: WindowConfig = serde_json::from_str(r#"{"row_height": 24.0}"#).unwrap();
    assert_eq!(config.row_height(), 24.0);
    assert_eq!(config.buffer_rows(), 5);
}

#[test]
fn invalid_config_is_caught_by_validate() {
    let config: WindowConfig = serde_json::from_str(r#"{"row_height": -1.0}"#).unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn alignment_and_sort_use_lowercase_names() {
    assert_eq!(serde_json::to_string(&Alignment::Center).unwrap(), r#""center""#);
    let key: SortKey =
        serde_json::from_str(r#"{"column": "price", "direction": "descending"}"#).unwrap();
    assert_eq!(key, SortKey::descending("price"));
    assert_eq!(key.direction, SortDirection::Descending);
}

#[test]
fn visible_range_json_shape() {
    let range = VisibleRange {
        start: 5,
        end: 20,
        offset_y: 160.0,
    };
    let json = serde_json::to_value(range).unwrap();
    assert_eq!(json["start"], 5);
    assert_eq!(json["end"], 20);
    assert_eq!(json["offset_y"], 160.0);

    let filter: ColumnFilter =
        serde_json::from_value(serde_json::json!({"column": "region", "value": "EU"})).unwrap();
    assert_eq!(filter, ColumnFilter::new("region", "EU"));
}
