//! Composition data page 0 codec
//!
//! Layout (little-endian):
//!
//! ```text
//! CID(2) PID(2) VID(2) CRPL(2) Features(2)
//! { Loc(2) NumS(1) NumV(1) SIG[NumS](2) VND[NumV](4) }*
//! ```

use crate::core::{
    error::CompositionError,
    types::{Address, ModelId},
};

/// Company identifier of the Linux Foundation
pub const COMPANY_ID_LINUX_FOUNDATION: u16 = 0x05f1;

/// One element of a node and the models it exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub location: u16,
    /// SIG models first, then vendor models, in advertised order
    pub models: Vec<ModelId>,
}

/// Composition data page 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub company_id: u16,
    pub product_id: u16,
    pub version_id: u16,
    pub replay_protection: u16,
    pub features: u16,
    pub elements: Vec<Element>,
}

impl Composition {
    /// Composition announced by the provisioner itself
    pub fn provisioner() -> Self {
        Self {
            company_id: COMPANY_ID_LINUX_FOUNDATION,
            product_id: 0,
            version_id: 0,
            replay_protection: 0,
            features: 0,
            elements: vec![Element {
                location: 0,
                models: vec![ModelId::CFG_SRV, ModelId::CFG_CLI, ModelId::HEALTH_CLI],
            }],
        }
    }

    /// Decode composition data page 0
    pub fn parse_page0(data: &[u8]) -> Result<Self, CompositionError> {
        let mut reader = Reader::new(data);

        let company_id = reader.u16()?;
        let product_id = reader.u16()?;
        let version_id = reader.u16()?;
        let replay_protection = reader.u16()?;
        let features = reader.u16()?;

        let mut elements = Vec::new();
        while !reader.is_empty() {
            let location = reader.u16()?;
            let num_sig = reader.u8()?;
            let num_vnd = reader.u8()?;

            let mut models = Vec::with_capacity(usize::from(num_sig) + usize::from(num_vnd));
            for _ in 0..num_sig {
                models.push(ModelId::Sig(reader.u16()?));
            }
            for _ in 0..num_vnd {
                let company = reader.u16()?;
                let id = reader.u16()?;
                models.push(ModelId::Vendor { company, id });
            }

            elements.push(Element { location, models });
        }

        Ok(Self {
            company_id,
            product_id,
            version_id,
            replay_protection,
            features,
            elements,
        })
    }

    /// Encode as composition data page 0
    pub fn encode_page0(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.elements.len() * 8);
        for value in [
            self.company_id,
            self.product_id,
            self.version_id,
            self.replay_protection,
            self.features,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }

        for element in &self.elements {
            let sig: Vec<u16> = element
                .models
                .iter()
                .filter_map(|m| match m {
                    ModelId::Sig(id) => Some(*id),
                    ModelId::Vendor { .. } => None,
                })
                .collect();
            let vnd: Vec<(u16, u16)> = element
                .models
                .iter()
                .filter_map(|m| match m {
                    ModelId::Vendor { company, id } => Some((*company, *id)),
                    ModelId::Sig(_) => None,
                })
                .collect();

            out.extend_from_slice(&element.location.to_le_bytes());
            out.push(sig.len() as u8);
            out.push(vnd.len() as u8);
            for id in sig {
                out.extend_from_slice(&id.to_le_bytes());
            }
            for (company, id) in vnd {
                out.extend_from_slice(&company.to_le_bytes());
                out.extend_from_slice(&id.to_le_bytes());
            }
        }

        out
    }

    /// Models eligible for an application key binding, with their element address
    ///
    /// Elements are addressed contiguously from `base`. Configuration models
    /// are skipped.
    pub fn bindable_models(&self, base: Address) -> impl Iterator<Item = (Address, ModelId)> + '_ {
        self.elements
            .iter()
            .enumerate()
            .flat_map(move |(index, element)| {
                let element_address = base.wrapping_add(index as u16);
                element
                    .models
                    .iter()
                    .filter(|model| !model.is_configuration())
                    .map(move |model| (element_address, *model))
            })
    }
}

struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CompositionError> {
        let remaining = self.data.len() - self.offset;
        if remaining < len {
            return Err(CompositionError::Truncated {
                offset: self.offset,
                needed: len - remaining,
            });
        }
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, CompositionError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CompositionError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}
