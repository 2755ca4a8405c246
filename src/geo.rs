//! Document normalization applied during export.
//!
//! The source service emits geographic points as a verbose coordinate
//! object (`Latitude`/`Longitude` plus coordinate-system bookkeeping).
//! Export files must carry GeoJSON instead, so every such sub-object is
//! rewritten to `{"type": "Point", "coordinates": [longitude, latitude]}`
//! — a structured rewrite keyed on the object's shape, applied anywhere
//! in the document, not a text substitution. Restore uploads files as-is
//! and never re-normalizes.

use serde_json::Value;

/// Normalize one document in place before it is written to an export
/// file: strip protocol metadata from the root and rewrite geography
/// points to GeoJSON.
pub fn normalize_document(doc: &mut Value) {
    if let Value::Object(fields) = doc {
        // Search protocol annotations (e.g. @search.score) are response
        // metadata, not document fields.
        fields.retain(|key, _| !key.starts_with("@search."));
    }
    rewrite_geo_points(doc);
}

fn rewrite_geo_points(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for field in map.values_mut() {
                if let Some(point) = as_geo_point(field) {
                    *field = point;
                } else {
                    rewrite_geo_points(field);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                if let Some(point) = as_geo_point(item) {
                    *item = point;
                } else {
                    rewrite_geo_points(item);
                }
            }
        }
        _ => {}
    }
}

/// A geography point is an object with numeric `Latitude` and `Longitude`
/// and at least one of the source's point markers. Requiring a marker
/// keeps plain lat/long record types out of the rewrite.
fn as_geo_point(value: &Value) -> Option<Value> {
    let fields = value.as_object()?;
    let latitude = fields.get("Latitude")?.as_f64()?;
    let longitude = fields.get("Longitude")?.as_f64()?;
    if !fields.contains_key("CoordinateSystem") && !fields.contains_key("IsEmpty") {
        return None;
    }
    Some(serde_json::json!({
        "type": "Point",
        "coordinates": [longitude, latitude],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn source_point(lat: f64, lon: f64) -> Value {
        json!({
            "Latitude": lat,
            "Longitude": lon,
            "IsEmpty": false,
            "Z": null,
            "M": null,
            "CoordinateSystem": {"EpsgId": 4326, "Id": "4326", "Name": "WGS84"}
        })
    }

    #[test]
    fn rewrites_point_to_geojson() {
        let mut doc = json!({
            "id": "a",
            "Location": source_point(47.6, -122.3),
        });
        normalize_document(&mut doc);
        assert_eq!(
            doc["Location"],
            json!({"type": "Point", "coordinates": [-122.3, 47.6]})
        );
    }

    #[test]
    fn rewrites_nested_and_array_points() {
        let mut doc = json!({
            "id": "a",
            "address": {"geo": source_point(1.5, 2.5)},
            "stops": [source_point(3.0, 4.0), {"name": "plain"}],
        });
        normalize_document(&mut doc);
        assert_eq!(doc["address"]["geo"]["type"], "Point");
        assert_eq!(doc["stops"][0]["coordinates"], json!([4.0, 3.0]));
        assert_eq!(doc["stops"][1], json!({"name": "plain"}));
    }

    #[test]
    fn plain_lat_long_records_untouched() {
        // No point marker: this is an ordinary record that happens to
        // carry Latitude/Longitude fields.
        let mut doc = json!({
            "reading": {"Latitude": 1.0, "Longitude": 2.0, "unit": "deg"},
        });
        normalize_document(&mut doc);
        assert_eq!(doc["reading"]["unit"], "deg");
        assert!(doc["reading"].get("type").is_none());
    }

    #[test]
    fn non_numeric_coordinates_untouched() {
        let mut doc = json!({
            "Location": {"Latitude": "47.6", "Longitude": "-122.3", "IsEmpty": false},
        });
        normalize_document(&mut doc);
        assert!(doc["Location"].get("coordinates").is_none());
    }

    #[test]
    fn strips_search_metadata_from_root_only() {
        let mut doc = json!({
            "@search.score": 1.0,
            "@search.highlights": {"description": []},
            "id": "a",
            "nested": {"@search.score": "field named like metadata stays"},
        });
        normalize_document(&mut doc);
        assert!(doc.get("@search.score").is_none());
        assert!(doc.get("@search.highlights").is_none());
        assert_eq!(doc["id"], "a");
        assert!(doc["nested"].get("@search.score").is_some());
    }
}
