//! In-progress confirmation input.
//!
//! A form holds whatever the operator has answered so far; every answer is
//! optional until [`ConfirmationForm::build`] turns a complete form into a
//! validated [`Confirmation`]. Closing a form simply drops it.

use super::errors::ValidationError;
use crate::models::{
    Confirmation, ConfirmationAnswer, DestinationConfirmation, EncodedImage,
    IntermediateConfirmation, OriginConfirmation, Stop, StopType, UnloadingAnswer,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OriginForm {
    pub loading_confirmed: Option<ConfirmationAnswer>,
    pub loading_photos: Vec<EncodedImage>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntermediateForm {
    pub delivery_confirmed: Option<ConfirmationAnswer>,
    pub delivery_photos: Vec<EncodedImage>,
    pub collection_confirmed: Option<ConfirmationAnswer>,
    pub collection_photos: Vec<EncodedImage>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestinationForm {
    pub unloading_confirmed: Option<UnloadingAnswer>,
    pub unloading_photos: Vec<EncodedImage>,
    pub signature: Option<EncodedImage>,
}

/// Form state keyed by the stop type it was opened for
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationForm {
    Origin(OriginForm),
    Intermediate(IntermediateForm),
    Destination(DestinationForm),
}

impl ConfirmationForm {
    /// Empty form matching the stop's type
    pub fn for_stop(stop: &Stop) -> Self {
        Self::empty(stop.stop_type)
    }

    pub fn empty(stop_type: StopType) -> Self {
        match stop_type {
            StopType::Origin => Self::Origin(OriginForm::default()),
            StopType::Intermediate => Self::Intermediate(IntermediateForm::default()),
            StopType::Destination => Self::Destination(DestinationForm::default()),
        }
    }

    pub fn stop_type(&self) -> StopType {
        match self {
            Self::Origin(_) => StopType::Origin,
            Self::Intermediate(_) => StopType::Intermediate,
            Self::Destination(_) => StopType::Destination,
        }
    }

    /// Required answers that are still unset
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            Self::Origin(form) => {
                if form.loading_confirmed.is_none() {
                    missing.push("loading_confirmed");
                }
            }
            Self::Intermediate(form) => {
                if form.delivery_confirmed.is_none() {
                    missing.push("delivery_confirmed");
                }
                if form.collection_confirmed.is_none() {
                    missing.push("collection_confirmed");
                }
            }
            Self::Destination(form) => {
                if form.unloading_confirmed.is_none() {
                    missing.push("unloading_confirmed");
                }
            }
        }
        missing
    }

    /// Build the validated payload for a stop of type `stop_type`.
    ///
    /// This is the only way to obtain a [`Confirmation`] from operator input.
    pub fn build(&self, stop_type: StopType) -> Result<Confirmation, ValidationError> {
        if self.stop_type() != stop_type {
            return Err(ValidationError::FormMismatch {
                stop_type,
                form_type: self.stop_type(),
            });
        }

        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields {
                stop_type,
                fields: missing,
            });
        }

        let confirmation = match self {
            Self::Origin(form) => Confirmation::Origin(OriginConfirmation {
                loading_confirmed: form.loading_confirmed.unwrap_or(ConfirmationAnswer::NotApplicable),
                loading_photos: form.loading_photos.clone(),
            }),
            Self::Intermediate(form) => Confirmation::Intermediate(IntermediateConfirmation {
                delivery_confirmed: form
                    .delivery_confirmed
                    .unwrap_or(ConfirmationAnswer::NotApplicable),
                delivery_photos: form.delivery_photos.clone(),
                collection_confirmed: form
                    .collection_confirmed
                    .unwrap_or(ConfirmationAnswer::NotApplicable),
                collection_photos: form.collection_photos.clone(),
            }),
            Self::Destination(form) => Confirmation::Destination(DestinationConfirmation {
                unloading_confirmed: form.unloading_confirmed.unwrap_or(UnloadingAnswer::NotApplicable),
                unloading_photos: form.unloading_photos.clone(),
                signature: form.signature.clone(),
            }),
        };

        confirmation.validate()?;
        Ok(confirmation)
    }
}

/// Whether the confirm affordance should be enabled for `stop`
pub fn can_confirm(stop: &Stop, form: &ConfirmationForm) -> bool {
    stop.is_pending() && form.build(stop.stop_type).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Address;
    use crate::state_machine::StopStatus;

    #[test]
    fn test_intermediate_requires_both_answers() {
        let stop = Stop::intermediate("i1", Address::new("Shop"));
        let mut form = IntermediateForm {
            delivery_confirmed: Some(ConfirmationAnswer::Yes),
            ..IntermediateForm::default()
        };
        assert!(!can_confirm(&stop, &ConfirmationForm::Intermediate(form.clone())));
        assert_eq!(
            ConfirmationForm::Intermediate(form.clone()).missing_fields(),
            vec!["collection_confirmed"]
        );

        form.collection_confirmed = Some(ConfirmationAnswer::No);
        assert!(can_confirm(&stop, &ConfirmationForm::Intermediate(form)));
    }

    #[test]
    fn test_mismatched_form_never_confirms() {
        let stop = Stop::destination("d", Address::new("Warehouse"));
        let form = ConfirmationForm::Origin(OriginForm {
            loading_confirmed: Some(ConfirmationAnswer::Yes),
            loading_photos: vec![],
        });
        assert!(!can_confirm(&stop, &form));
        assert!(matches!(
            form.build(StopType::Destination),
            Err(ValidationError::FormMismatch { .. })
        ));
    }

    #[test]
    fn test_terminal_stop_cannot_be_confirmed() {
        let mut stop = Stop::origin("o", Address::new("Depot"));
        stop.status = StopStatus::Completed;
        let form = ConfirmationForm::Origin(OriginForm {
            loading_confirmed: Some(ConfirmationAnswer::Yes),
            loading_photos: vec![],
        });
        assert!(!can_confirm(&stop, &form));
    }

    #[test]
    fn test_destination_signature_rules() {
        let stop = Stop::destination("d", Address::new("Warehouse"));
        let mut form = DestinationForm {
            unloading_confirmed: Some(UnloadingAnswer::No),
            unloading_photos: vec![],
            signature: Some(EncodedImage::new("sig")),
        };
        assert!(!can_confirm(&stop, &ConfirmationForm::Destination(form.clone())));

        form.unloading_confirmed = Some(UnloadingAnswer::Yes);
        let confirmation = ConfirmationForm::Destination(form).build(StopType::Destination).unwrap();
        assert_eq!(confirmation.stop_type(), StopType::Destination);

        let postponed = DestinationForm {
            unloading_confirmed: Some(UnloadingAnswer::Postponed),
            ..DestinationForm::default()
        };
        assert!(can_confirm(&stop, &ConfirmationForm::Destination(postponed)));
    }
}
