//! Response message types

use serde::{Deserialize, Serialize};

use crate::core::{
    composition::Composition,
    error::CompositionError,
    types::{SelfAdmission, Status},
};

/// Result of `admit_self`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmitSelfResponse {
    #[serde(default)]
    pub already_admitted: bool,
}

impl From<AdmitSelfResponse> for SelfAdmission {
    fn from(response: AdmitSelfResponse) -> Self {
        if response.already_admitted {
            SelfAdmission::AlreadyAdmitted
        } else {
            SelfAdmission::Admitted
        }
    }
}

/// Result of `add_app_key` and `bind_model`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigStatusResponse {
    pub status: Status,
}

/// Result of `get_composition`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositionResponse {
    pub page: u8,
    /// Hex-encoded page data
    pub data: String,
}

impl CompositionResponse {
    pub fn decode(&self) -> Result<Composition, CompositionError> {
        if self.page != 0 {
            return Err(CompositionError::UnsupportedPage(self.page));
        }
        let bytes =
            hex::decode(&self.data).map_err(|e| CompositionError::InvalidHex(e.to_string()))?;
        Composition::parse_page0(&bytes)
    }
}
