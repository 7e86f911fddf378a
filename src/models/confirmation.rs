//! Proof-of-completion payloads recorded when a stop is checked in.
//!
//! Each stop type has its own payload contract, so the payload is a tagged
//! variant rather than one loose record with fields that only make sense for
//! some stop types.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::stop::StopType;
use crate::state_machine::errors::ValidationError;

/// An already-encoded image (photo or signature) produced by a capture device.
///
/// The content is opaque to the core; it is stored inline so a queued
/// checkpoint never depends on transient in-memory state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn new(data: impl Into<String>) -> Self {
        Self(data.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Answer for loading, delivery and collection questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationAnswer {
    Yes,
    No,
    NotApplicable,
}

/// Answer for the unloading question at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnloadingAnswer {
    Yes,
    No,
    NotApplicable,
    Postponed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginConfirmation {
    pub loading_confirmed: ConfirmationAnswer,
    #[serde(default)]
    pub loading_photos: Vec<EncodedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediateConfirmation {
    pub delivery_confirmed: ConfirmationAnswer,
    #[serde(default)]
    pub delivery_photos: Vec<EncodedImage>,
    pub collection_confirmed: ConfirmationAnswer,
    #[serde(default)]
    pub collection_photos: Vec<EncodedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationConfirmation {
    pub unloading_confirmed: UnloadingAnswer,
    #[serde(default)]
    pub unloading_photos: Vec<EncodedImage>,
    /// Only meaningful when unloading was confirmed
    #[serde(default)]
    pub signature: Option<EncodedImage>,
}

/// Type-specific confirmation payload, tagged by stop type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stop_type", rename_all = "snake_case")]
pub enum Confirmation {
    Origin(OriginConfirmation),
    Intermediate(IntermediateConfirmation),
    Destination(DestinationConfirmation),
}

impl Confirmation {
    /// The stop type this payload belongs to
    pub fn stop_type(&self) -> StopType {
        match self {
            Self::Origin(_) => StopType::Origin,
            Self::Intermediate(_) => StopType::Intermediate,
            Self::Destination(_) => StopType::Destination,
        }
    }

    /// Check the cross-field rules that the type system cannot express
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Destination(destination) => {
                if destination.signature.is_some()
                    && destination.unloading_confirmed != UnloadingAnswer::Yes
                {
                    return Err(ValidationError::SignatureWithoutUnloading {
                        answer: destination.unloading_confirmed,
                    });
                }
                if destination
                    .signature
                    .as_ref()
                    .is_some_and(EncodedImage::is_empty)
                {
                    return Err(ValidationError::EmptyImage { field: "signature" });
                }
                if destination.unloading_photos.iter().any(EncodedImage::is_empty) {
                    return Err(ValidationError::EmptyImage {
                        field: "unloading_photos",
                    });
                }
                Ok(())
            }
            Self::Origin(origin) => {
                if origin.loading_photos.iter().any(EncodedImage::is_empty) {
                    return Err(ValidationError::EmptyImage {
                        field: "loading_photos",
                    });
                }
                Ok(())
            }
            Self::Intermediate(intermediate) => {
                if intermediate.delivery_photos.iter().any(EncodedImage::is_empty) {
                    return Err(ValidationError::EmptyImage {
                        field: "delivery_photos",
                    });
                }
                if intermediate
                    .collection_photos
                    .iter()
                    .any(EncodedImage::is_empty)
                {
                    return Err(ValidationError::EmptyImage {
                        field: "collection_photos",
                    });
                }
                Ok(())
            }
        }
    }

    /// Total number of embedded photos, signature excluded
    pub fn photo_count(&self) -> usize {
        match self {
            Self::Origin(origin) => origin.loading_photos.len(),
            Self::Intermediate(intermediate) => {
                intermediate.delivery_photos.len() + intermediate.collection_photos.len()
            }
            Self::Destination(destination) => destination.unloading_photos.len(),
        }
    }
}

/// Closed set of reasons an operator may give for skipping a stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    LocationClosed,
    PreNotifiedNoOp,
    ClientAbsent,
    AddressProblem,
    Other,
}

impl SkipReason {
    pub const ALL: [SkipReason; 5] = [
        Self::LocationClosed,
        Self::PreNotifiedNoOp,
        Self::ClientAbsent,
        Self::AddressProblem,
        Self::Other,
    ];

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::LocationClosed => "location_closed",
            Self::PreNotifiedNoOp => "pre_notified_no_op",
            Self::ClientAbsent => "client_absent",
            Self::AddressProblem => "address_problem",
            Self::Other => "other",
        }
    }

    /// Human-readable label, recorded verbatim in the stop's notes
    pub fn label(&self) -> &'static str {
        match self {
            Self::LocationClosed => "Location closed",
            Self::PreNotifiedNoOp => "Pre-notified (no deliveries or collections)",
            Self::ClientAbsent => "Client absent",
            Self::AddressProblem => "Address problem",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for SkipReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|reason| reason.code() == s)
            .ok_or_else(|| format!("Invalid skip reason: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_is_tagged_by_stop_type() {
        let confirmation = Confirmation::Origin(OriginConfirmation {
            loading_confirmed: ConfirmationAnswer::NotApplicable,
            loading_photos: vec![EncodedImage::new("data:image/jpeg;base64,AAAA")],
        });

        let json = serde_json::to_value(&confirmation).unwrap();
        assert_eq!(json["stop_type"], "origin");
        assert_eq!(json["loading_confirmed"], "not_applicable");

        let parsed: Confirmation = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.stop_type(), StopType::Origin);
        assert_eq!(parsed.photo_count(), 1);
    }

    #[test]
    fn test_signature_requires_confirmed_unloading() {
        let postponed = Confirmation::Destination(DestinationConfirmation {
            unloading_confirmed: UnloadingAnswer::Postponed,
            unloading_photos: vec![],
            signature: Some(EncodedImage::new("sig")),
        });
        assert!(matches!(
            postponed.validate(),
            Err(ValidationError::SignatureWithoutUnloading { .. })
        ));

        let signed = Confirmation::Destination(DestinationConfirmation {
            unloading_confirmed: UnloadingAnswer::Yes,
            unloading_photos: vec![],
            signature: Some(EncodedImage::new("sig")),
        });
        assert!(signed.validate().is_ok());
    }

    #[test]
    fn test_skip_reason_codes_round_trip() {
        for reason in SkipReason::ALL {
            assert_eq!(reason.code().parse::<SkipReason>().unwrap(), reason);
        }
        assert!("weather".parse::<SkipReason>().is_err());
        assert_eq!(SkipReason::ClientAbsent.label(), "Client absent");
    }
}
