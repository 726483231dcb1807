//! The typed data model for content-managed forms.
//!
//! One JSON file per form, written by the content management side;
//! parsing goes through raw mirror structs of the wire format which
//! are then checked and converted into the model used by rendering
//! and submission.

use kstring::KString;
use serde::Deserialize;
use strum_macros::EnumString;

/// The sender address the delivery backend expects when a form does
/// not configure its own.
pub const DEFAULT_SEND_FROM: &str = "forms@hungryramwebdesign.com";

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("reading schema JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown field type {0:?}")]
    UnknownFieldType(String),
    #[error("invalid color {0:?}, expecting \"#rgb\" or \"#rrggbb\"")]
    InvalidColor(String),
}


// ------------------------------------------------------------------
// Identifier sanitization

/// The DOM id for a field's control: the label with space characters
/// removed (spaces only, matching the frontend this format comes
/// from), disambiguated with the field's position.
pub fn field_dom_id(label: &str, index: usize) -> String {
    let clean: String = label.chars().filter(|c| *c != ' ').collect();
    format!("{clean}{index}")
}

/// The DOM id for one entry of a radio/checkbox group: leading
/// non-alphanumeric characters stripped, every character outside
/// `A-Za-z0-9_-:.` dropped, then the entry's position appended, which
/// keeps duplicate and fully-stripped entries apart.
pub fn option_dom_id(text: &str, index: usize) -> String {
    let rest = text.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
    let clean: String = rest.chars().filter(
        |c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ':' | '.'))
        .collect();
    format!("{clean}{index}")
}


// ------------------------------------------------------------------
// The validated model

/// What kind of control a field renders as, including the option
/// lists where the kind has them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldControl {
    Text,
    File,
    Email,
    Phone,
    Radio(Vec<KString>),
    Checkbox(Vec<KString>),
    Select(Vec<KString>),
    Textarea,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: KString,
    pub label: KString,
    pub control: FieldControl,
    pub required: bool,
    /// Vertical layout for radio/checkbox groups when set, inline
    /// otherwise.
    pub stacked: bool,
}

impl FormField {
    /// The key under which this field's value travels in the POST
    /// body. The delivery backend expects the human-readable `label`
    /// here, not `name`; everything referring to the wire key must go
    /// through this accessor.
    pub fn wire_key(&self) -> &str {
        &self.label
    }

    /// DOM id of the field's control; `index` is the field's position
    /// in the schema.
    pub fn dom_id(&self, index: usize) -> String {
        field_dom_id(&self.label, index)
    }
}

/// A CSS hex color, `#rgb` or `#rrggbb`. In schema JSON either a bare
/// string or an object carrying a `hex` member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexColor(KString);

impl HexColor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for HexColor {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, SchemaError> {
        let digits = s.strip_prefix('#').ok_or_else(
            || SchemaError::InvalidColor(s.into()))?;
        if matches!(digits.len(), 3 | 6)
            && digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            Ok(HexColor(KString::from_ref(s)))
        } else {
            Err(SchemaError::InvalidColor(s.into()))
        }
    }
}

/// One form definition. Immutable once parsed; field order is render
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    pub fields: Vec<FormField>,
    pub subject: KString,
    pub send_to: KString,
    pub send_from: Option<KString>,
    pub email_cc: KString,
    pub email_bcc: KString,
    pub redirect_to: Option<KString>,
    pub button_label: Option<KString>,
    pub button_background_color: Option<HexColor>,
    pub button_text_color: Option<HexColor>,
    /// Markdown source shown below the fields.
    pub form_disclaimer: Option<String>,
    pub spreadsheet_id: Option<KString>,
    pub sheet_name: Option<KString>,
}

impl FormSchema {
    pub fn from_json_str(s: &str) -> Result<FormSchema, SchemaError> {
        let raw: RawSchema = serde_json::from_str(s)?;
        raw.try_into()
    }

    pub fn send_from_or_default(&self) -> &str {
        self.send_from.as_deref().unwrap_or(DEFAULT_SEND_FROM)
    }
}


// ------------------------------------------------------------------
// The wire format

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
enum FieldTypeTag {
    Text,
    File,
    Email,
    Phone,
    Radio,
    Checkbox,
    Select,
    Textarea,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    #[serde(default)]
    name: String,
    label: String,
    #[serde(rename = "type")]
    type_tag: String,
    #[serde(default)]
    radio_value: Vec<String>,
    #[serde(default)]
    select_value: Vec<String>,
    #[serde(default)]
    check_box_value: Vec<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    stacked: bool,
}

impl TryFrom<RawField> for FormField {
    type Error = SchemaError;

    fn try_from(raw: RawField) -> Result<Self, SchemaError> {
        let tag: FieldTypeTag = raw.type_tag.parse().map_err(
            |_| SchemaError::UnknownFieldType(raw.type_tag.clone()))?;
        let options = |v: Vec<String>| -> Vec<KString> {
            v.into_iter().map(KString::from_string).collect()
        };
        // Only the option list matching the tag is consulted; the
        // content management side leaves stale ones behind when a
        // field's type is changed.
        let control = match tag {
            FieldTypeTag::Text => FieldControl::Text,
            FieldTypeTag::File => FieldControl::File,
            FieldTypeTag::Email => FieldControl::Email,
            FieldTypeTag::Phone => FieldControl::Phone,
            FieldTypeTag::Radio => FieldControl::Radio(options(raw.radio_value)),
            FieldTypeTag::Checkbox => FieldControl::Checkbox(options(raw.check_box_value)),
            FieldTypeTag::Select => FieldControl::Select(options(raw.select_value)),
            FieldTypeTag::Textarea => FieldControl::Textarea,
        };
        Ok(FormField {
            name: KString::from_string(raw.name),
            label: KString::from_string(raw.label),
            control,
            required: raw.required,
            stacked: raw.stacked,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawColor {
    Bare(String),
    Object { hex: String },
}

impl RawColor {
    fn hex_str(&self) -> &str {
        match self {
            RawColor::Bare(s) => s,
            RawColor::Object { hex } => hex,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    email_cc: String,
    #[serde(default)]
    email_bcc: String,
    #[serde(default)]
    send_to: String,
    #[serde(default)]
    send_from: Option<String>,
    #[serde(default)]
    redirect_to: Option<String>,
    #[serde(default)]
    button_label: Option<String>,
    #[serde(default)]
    button_background_color: Option<RawColor>,
    #[serde(default)]
    button_text_color: Option<RawColor>,
    #[serde(default)]
    form_disclaimer: Option<String>,
    #[serde(default)]
    spreadsheet_id: Option<String>,
    #[serde(default)]
    sheet_name: Option<String>,
}

/// The content management side represents unset optional members as
/// empty strings at times; treat those as absent.
fn nonempty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

impl TryFrom<RawSchema> for FormSchema {
    type Error = SchemaError;

    fn try_from(raw: RawSchema) -> Result<Self, SchemaError> {
        let mut fields = Vec::with_capacity(raw.fields.len());
        for rawfield in raw.fields {
            fields.push(rawfield.try_into()?);
        }
        let color = |c: Option<RawColor>| -> Result<Option<HexColor>, SchemaError> {
            c.map(|c| c.hex_str().parse()).transpose()
        };
        Ok(FormSchema {
            fields,
            subject: KString::from_string(raw.subject),
            send_to: KString::from_string(raw.send_to),
            send_from: nonempty(raw.send_from).map(KString::from_string),
            email_cc: KString::from_string(raw.email_cc),
            email_bcc: KString::from_string(raw.email_bcc),
            redirect_to: nonempty(raw.redirect_to).map(KString::from_string),
            button_label: nonempty(raw.button_label).map(KString::from_string),
            button_background_color: color(raw.button_background_color)?,
            button_text_color: color(raw.button_text_color)?,
            form_disclaimer: nonempty(raw.form_disclaimer),
            spreadsheet_id: nonempty(raw.spreadsheet_id).map(KString::from_string),
            sheet_name: nonempty(raw.sheet_name).map(KString::from_string),
        })
    }
}
