//! # Submission Encoder
//!
//! Deterministic mapping from a [`SubmissionBody`] to the multipart payload
//! the remote endpoint accepts.
//!
//! The mapping is a versioned contract ([`WireContract::v1`]) and is the only
//! encoding path in the workspace: the background worker and the foreground
//! "send now" path both call [`encode`], so the field names on the wire can
//! never drift between the online and replay paths.
//!
//! The multipart boundary is part of the contract rather than randomized, so
//! encoding the same body twice produces byte-identical payloads.

use bytes::Bytes;

use crate::error::{Result, SyncError};
use crate::record::SubmissionBody;

/// Fixed boundary; deterministic output is part of the contract.
const BOUNDARY_V1: &str = "----survey-core-7f3a9c41d2";

/// Scalar part names the server accepts, in wire order. Absent values are
/// sent as empty strings, not omitted.
const SCALAR_FIELDS_V1: [&str; 13] = [
    "farmerName",
    "fatherName",
    "contact",
    "age",
    "gender",
    "state",
    "district",
    "village",
    "landArea",
    "surveyNumber",
    "cropType",
    "irrigationSource",
    "notes",
];

/// How the ordered geo-points are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoEncoding {
    /// `latitude[]` / `longitude[]` parallel array parts, one pair per point
    ParallelArrays,
    /// `points[i][lat]` / `points[i][lng]` indexed pair parts
    IndexedPairs,
}

/// The fixed server contract: scalar part names, attachment slots, geo-point
/// layout, and the multipart boundary.
#[derive(Debug, Clone)]
pub struct WireContract {
    pub geo_encoding: GeoEncoding,
    pub scalar_fields: Vec<String>,
    pub boundary: String,
}

impl WireContract {
    /// Contract version 1: parallel `latitude[]`/`longitude[]` arrays and the
    /// `farmerName` field family.
    pub fn v1() -> Self {
        Self {
            geo_encoding: GeoEncoding::ParallelArrays,
            scalar_fields: SCALAR_FIELDS_V1.iter().map(|s| s.to_string()).collect(),
            boundary: BOUNDARY_V1.to_string(),
        }
    }
}

impl Default for WireContract {
    fn default() -> Self {
        Self::v1()
    }
}

/// Encoded multipart payload ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct WirePayload {
    pub content_type: String,
    pub body: Bytes,
}

/// Encode a submission body into the server's multipart shape.
///
/// Pure and deterministic: the same body and contract always produce the
/// same bytes. Never fails for missing optional data; fails with
/// [`SyncError::Encoding`] only when a required value is structurally
/// malformed (non-finite number or geo coordinate).
pub fn encode(body: &SubmissionBody, contract: &WireContract) -> Result<WirePayload> {
    for (name, value) in &body.fields {
        if !value.is_well_formed() {
            return Err(SyncError::Encoding(format!(
                "Field {name} has a non-finite numeric value"
            )));
        }
    }
    for (index, point) in body.geo_points.iter().enumerate() {
        if !point.is_well_formed() {
            return Err(SyncError::Encoding(format!(
                "Geo point {index} has a non-finite coordinate"
            )));
        }
    }

    let mut out = Vec::new();

    // Contract fields first, in wire order; absent values as empty strings.
    for name in &contract.scalar_fields {
        let value = body.fields.get(name).map(|v| v.to_wire()).unwrap_or_default();
        push_text_part(&mut out, &contract.boundary, name, &value);
    }

    // Any extra fields the form layer recorded, in sorted order.
    for (name, value) in &body.fields {
        if !contract.scalar_fields.iter().any(|f| f == name) {
            push_text_part(&mut out, &contract.boundary, name, &value.to_wire());
        }
    }

    // Attachment slots are emitted only when present.
    let slots = [
        ("photo", &body.attachments.photo),
        ("aadharCard", &body.attachments.id_document),
        ("agreement", &body.attachments.agreement),
    ];
    for (name, slot) in slots {
        if let Some(data) = slot {
            push_file_part(&mut out, &contract.boundary, name, data);
        }
    }

    match contract.geo_encoding {
        GeoEncoding::ParallelArrays => {
            for point in &body.geo_points {
                push_text_part(&mut out, &contract.boundary, "latitude[]", &format!("{}", point.lat));
                push_text_part(&mut out, &contract.boundary, "longitude[]", &format!("{}", point.lng));
            }
        }
        GeoEncoding::IndexedPairs => {
            for (i, point) in body.geo_points.iter().enumerate() {
                push_text_part(
                    &mut out,
                    &contract.boundary,
                    &format!("points[{i}][lat]"),
                    &format!("{}", point.lat),
                );
                push_text_part(
                    &mut out,
                    &contract.boundary,
                    &format!("points[{i}][lng]"),
                    &format!("{}", point.lng),
                );
            }
        }
    }

    out.extend_from_slice(format!("--{}--\r\n", contract.boundary).as_bytes());

    Ok(WirePayload {
        content_type: format!("multipart/form-data; boundary={}", contract.boundary),
        body: Bytes::from(out),
    })
}

fn push_text_part(out: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    out.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .as_bytes(),
    );
}

fn push_file_part(out: &mut Vec<u8>, boundary: &str, name: &str, data: &Bytes) {
    out.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SubmissionBody;

    fn body_with_points() -> SubmissionBody {
        SubmissionBody::new()
            .field("farmerName", "Ravi")
            .field("landArea", 1.5)
            .geo_point(20.1, 78.9)
            .geo_point(20.2, 78.95)
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let mut body = body_with_points();
        body.attachments.photo = Some(Bytes::from_static(b"\x89PNG\r\n"));

        let first = encode(&body, &WireContract::v1()).unwrap();
        let second = encode(&body, &WireContract::v1()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_absent_optionals_encode_as_empty_string() {
        let payload = encode(&SubmissionBody::new(), &WireContract::v1()).unwrap();
        let text = String::from_utf8(payload.body.to_vec()).unwrap();

        // Every contract field is present even on an empty body.
        for name in SCALAR_FIELDS_V1 {
            assert!(
                text.contains(&format!("name=\"{name}\"\r\n\r\n\r\n")),
                "missing empty part for {name}"
            );
        }
        // No attachment parts, no geo parts.
        assert!(!text.contains("filename="));
        assert!(!text.contains("latitude[]"));
    }

    #[test]
    fn test_parallel_array_geo_layout() {
        let payload = encode(&body_with_points(), &WireContract::v1()).unwrap();
        let text = String::from_utf8(payload.body.to_vec()).unwrap();

        let lat = text.find("name=\"latitude[]\"\r\n\r\n20.1\r\n").unwrap();
        let lng = text.find("name=\"longitude[]\"\r\n\r\n78.9\r\n").unwrap();
        assert!(lat < lng, "latitude precedes its paired longitude");
        assert_eq!(text.matches("name=\"latitude[]\"").count(), 2);
        assert_eq!(text.matches("name=\"longitude[]\"").count(), 2);
    }

    #[test]
    fn test_indexed_pair_geo_layout() {
        let contract = WireContract {
            geo_encoding: GeoEncoding::IndexedPairs,
            ..WireContract::v1()
        };
        let payload = encode(&body_with_points(), &contract).unwrap();
        let text = String::from_utf8(payload.body.to_vec()).unwrap();

        assert!(text.contains("name=\"points[0][lat]\"\r\n\r\n20.1\r\n"));
        assert!(text.contains("name=\"points[1][lng]\"\r\n\r\n78.95\r\n"));
        assert!(!text.contains("latitude[]"));
    }

    #[test]
    fn test_attachments_use_contract_slot_names() {
        let mut body = SubmissionBody::new();
        body.attachments.id_document = Some(Bytes::from_static(b"scan"));
        let payload = encode(&body, &WireContract::v1()).unwrap();
        let text = String::from_utf8(payload.body.to_vec()).unwrap();

        assert!(text.contains("name=\"aadharCard\"; filename=\"aadharCard\""));
        assert!(!text.contains("name=\"photo\";"));
    }

    #[test]
    fn test_non_finite_geo_point_rejected() {
        let body = SubmissionBody::new().geo_point(f64::NAN, 78.9);
        let err = encode(&body, &WireContract::v1()).unwrap_err();
        assert!(matches!(err, SyncError::Encoding(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_extra_fields_follow_contract_fields() {
        let body = SubmissionBody::new()
            .field("farmerName", "Ravi")
            .field("zebraTag", "z1");
        let payload = encode(&body, &WireContract::v1()).unwrap();
        let text = String::from_utf8(payload.body.to_vec()).unwrap();

        let contract_pos = text.find("name=\"notes\"").unwrap();
        let extra_pos = text.find("name=\"zebraTag\"").unwrap();
        assert!(contract_pos < extra_pos);
        assert_eq!(text.matches("name=\"farmerName\"").count(), 1);
    }

    #[test]
    fn test_content_type_carries_boundary() {
        let payload = encode(&SubmissionBody::new(), &WireContract::v1()).unwrap();
        assert_eq!(
            payload.content_type,
            format!("multipart/form-data; boundary={BOUNDARY_V1}")
        );
        let text = String::from_utf8(payload.body.to_vec()).unwrap();
        assert!(text.ends_with(&format!("--{BOUNDARY_V1}--\r\n")));
    }
}
