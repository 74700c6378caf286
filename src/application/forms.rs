//! Field-level validation shared by the HTML forms.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::Serialize;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
pub const CONTRADICTORY_IMAGE: &str =
    "Please either submit a file or check the clear checkbox, not both.";

/// Errors keyed by field name plus errors that belong to the form as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
    non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, name: &str) -> bool {
        !self.field(name).is_empty()
    }

    pub fn non_field(&self) -> &[String] {
        &self.non_field
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Trim the value and record a required-field error when nothing is left.
pub fn required_text(errors: &mut FormErrors, field: &'static str, raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    }
    value.to_string()
}

/// Optional select: blank means "no choice", anything else must be an id.
pub fn optional_choice(
    errors: &mut FormErrors,
    field: &'static str,
    raw: Option<&str>,
) -> Option<i64> {
    let value = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match value.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, INVALID_CHOICE);
            None
        }
    }
}

/// A file part received with a form submission.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Raw post form as submitted, before any lookup or storage.
#[derive(Debug, Clone, Default)]
pub struct PostFormInput {
    pub text: String,
    pub group: Option<String>,
    pub image: Option<UploadedFile>,
    pub clear_image: bool,
}

/// Values echoed back into a re-rendered post form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostFormValues {
    pub text: String,
    pub group_id: Option<i64>,
    pub current_image: Option<String>,
}
