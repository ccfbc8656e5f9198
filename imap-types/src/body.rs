//! The `BODYSTRUCTURE`/`BODY` FETCH data item: a parsed view of a
//! message's MIME structure. The core does not parse MIME itself (that is
//! the backend's job, per §1's scope note) — it only needs a structured
//! value it can encode onto the wire.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::core::NString;
use crate::envelope::Envelope;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasicFields {
    pub parameters: Vec<(String, String)>,
    pub id: NString,
    pub description: NString,
    pub content_transfer_encoding: String,
    pub size: u32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disposition {
    pub disposition_type: String,
    pub parameters: Vec<(String, String)>,
}

/// The part of `BODYSTRUCTURE` common to all single-part bodies, beyond
/// the basic fields: language, location, and MIME extension fields.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extension {
    pub md5: NString,
    pub disposition: Option<Disposition>,
    pub language: Vec<String>,
    pub location: NString,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecificFields {
    /// `message/rfc822`: carries the embedded message's envelope, body
    /// structure, and line count.
    Message {
        envelope: Box<Envelope>,
        body_structure: Box<BodyStructure>,
        number_of_lines: u32,
    },
    /// `text/*`: carries the line count.
    Text { number_of_lines: u32 },
    /// Any other single-part media type.
    Basic,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinglePart {
    pub media_type: String,
    pub media_subtype: String,
    pub basic_fields: BasicFields,
    pub specific_fields: SpecificFields,
    pub extension: Option<Extension>,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MultipartExtension {
    pub parameters: Vec<(String, String)>,
    pub disposition: Option<Disposition>,
    pub language: Vec<String>,
    pub location: NString,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    Single(SinglePart),
    Multi {
        parts: Vec<BodyStructure>,
        media_subtype: String,
        extension: Option<MultipartExtension>,
    },
}
