//! JSON body decoding and validation.
//!
//! [`Decoder::decode`] turns a request body into a typed value in two steps:
//!
//! 1. **Parse.** The body must be JSON matching the target type exactly. A
//!    field the type does not declare is an error, so a client sending a
//!    schema the server no longer knows finds out at once.
//! 2. **Validate.** The constraints declared with `#[validate(...)]` run and
//!    every violation is reported as a [`FieldError`].
//!
//! Both steps fail with a `400` [`RequestError`]. Only a fully valid value is
//! ever returned.
//!
//! Field errors use the JSON name of each field (see [`FieldNames`]) and are
//! ordered by that name at each nesting level; nested structs report as
//! `parent.child` and list items as `items[0].name`.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::error::Category;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::{Error, FieldError, RequestError};
use crate::request::Request;

/// Key validator uses for struct-level (schema) errors. It names no field.
const STRUCT_LEVEL_KEY: &str = "__all__";

// ── Translator ────────────────────────────────────────────────────────────────

/// Message templates for validation failures in one locale.
///
/// Templates name parameters in braces: `{field}` is the failing field, the
/// rest are the validator's own parameters (`{min}`, `{max}`, `{other}`, …).
/// A translator is built once and never changes; pass a different one to
/// [`Decoder::new`] for another locale or wording.
#[derive(Clone, Debug)]
pub struct Translator {
    locale: &'static str,
    templates: HashMap<&'static str, &'static str>,
}

impl Translator {
    /// The built-in English messages.
    pub fn english() -> Self {
        let templates = HashMap::from([
            ("required", "{field} is a required field"),
            ("length.between", "{field} must be between {min} and {max} characters in length"),
            ("length.min", "{field} must be at least {min} characters in length"),
            ("length.max", "{field} must be a maximum of {max} characters in length"),
            ("length.equal", "{field} must be {equal} characters in length"),
            ("range.between", "{field} must be between {min} and {max}"),
            ("range.min", "{field} must be {min} or greater"),
            ("range.max", "{field} must be {max} or less"),
            ("range.exclusive_min", "{field} must be greater than {exclusive_min}"),
            ("range.exclusive_max", "{field} must be less than {exclusive_max}"),
            ("email", "{field} must be a valid email address"),
            ("url", "{field} must be a valid URL"),
            ("must_match", "{field} must be equal to {other}"),
            ("contains", "{field} must contain the text '{needle}'"),
            ("does_not_contain", "{field} cannot contain the text '{needle}'"),
            ("regex", "{field} is not in the correct format"),
            ("credit_card", "{field} must be a valid credit card number"),
            ("non_control_character", "{field} must not contain control characters"),
            ("fallback", "{field} failed on the '{code}' validation"),
        ]);
        Self { locale: "en", templates }
    }

    /// Replaces (or adds) the template for `key`.
    pub fn with_template(mut self, key: &'static str, template: &'static str) -> Self {
        self.templates.insert(key, template);
        self
    }

    pub fn locale(&self) -> &'static str { self.locale }

    /// Renders the message for one violation of `field`.
    ///
    /// A custom message attached to the rule wins over every template.
    pub fn translate(&self, field: &str, err: &ValidationError) -> String {
        if let Some(message) = &err.message {
            return message.to_string();
        }

        let code = err.code.as_ref();
        let key = template_key(code, err);
        let template = self
            .templates
            .get(key.as_str())
            .or_else(|| self.templates.get("fallback"))
            .copied()
            .unwrap_or("{field} is invalid");

        let mut message = template.replace("{field}", field).replace("{code}", code);
        for (name, value) in &err.params {
            let placeholder = format!("{{{name}}}");
            if message.contains(&placeholder) {
                message = message.replace(&placeholder, &param_text(value));
            }
        }
        message
    }
}

impl Default for Translator {
    fn default() -> Self { Self::english() }
}

/// Picks the template variant for rules whose wording depends on which
/// bounds were given.
fn template_key(code: &str, err: &ValidationError) -> String {
    let has = |p: &str| err.params.contains_key(p);
    match code {
        "length" if has("equal") => "length.equal".to_owned(),
        "length" | "range" if has("min") && has("max") => format!("{code}.between"),
        "length" | "range" if has("min") => format!("{code}.min"),
        "length" | "range" if has("max") => format!("{code}.max"),
        "range" if has("exclusive_min") => "range.exclusive_min".to_owned(),
        "range" if has("exclusive_max") => "range.exclusive_max".to_owned(),
        _ => code.to_owned(),
    }
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Field names ───────────────────────────────────────────────────────────────

/// How a decoded type's fields are named on the wire.
///
/// `validator` reports Rust field names. Field errors must name what the
/// client sent, so every type passed to [`Decoder::decode`] declares the
/// fields whose JSON name differs, and the fields that must never appear in
/// an error report. The table covers nested types too: each segment of a
/// nested path is looked up on its own.
///
/// ```rust
/// use garrison::FieldNames;
/// use serde::Deserialize;
/// use validator::Validate;
///
/// #[derive(Deserialize, Validate)]
/// struct NewUser {
///     #[serde(rename = "userName")]
///     #[validate(length(min = 3))]
///     user_name: String,
/// }
///
/// impl FieldNames for NewUser {
///     const RENAMED: &'static [(&'static str, &'static str)] = &[("user_name", "userName")];
/// }
/// ```
pub trait FieldNames {
    /// `(rust_name, json_name)` pairs.
    const RENAMED: &'static [(&'static str, &'static str)] = &[];

    /// Rust names of fields left out of error reports.
    const HIDDEN: &'static [&'static str] = &[];

    /// JSON name for `field`, or `None` if it is hidden.
    fn json_name(field: &str) -> Option<&str> {
        if Self::HIDDEN.iter().any(|hidden| *hidden == field) {
            return None;
        }
        let renamed = Self::RENAMED.iter().find(|(rust, _)| *rust == field);
        Some(renamed.map_or(field, |(_, json)| *json))
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// Parses and validates JSON request bodies.
///
/// Immutable once built and cheap to share; handlers usually hold one in an
/// `Arc` next to their other dependencies.
#[derive(Clone, Debug, Default)]
pub struct Decoder {
    translator: Translator,
}

impl Decoder {
    pub fn new(translator: Translator) -> Self {
        Self { translator }
    }

    pub fn translator(&self) -> &Translator { &self.translator }

    /// Decodes and validates the body of `req`.
    pub fn decode<T>(&self, req: &Request) -> Result<T, Error>
    where
        T: DeserializeOwned + Validate + FieldNames,
    {
        self.decode_slice(req.body())
    }

    /// Decodes and validates raw JSON bytes.
    ///
    /// A missing field that is not an `Option` is reported like a failed
    /// `required` rule. Serde stops at the first one, so only that field is
    /// listed; make such fields `Option` with `#[validate(required)]` to get
    /// every missing field at once.
    pub fn decode_slice<T>(&self, body: &[u8]) -> Result<T, Error>
    where
        T: DeserializeOwned + Validate + FieldNames,
    {
        let value: T = self.parse_strict(body)?;

        if let Err(errors) = value.validate() {
            let mut fields = Vec::new();
            self.collect::<T>(None, &errors, &mut fields);
            return Err(validation_failed(fields).into());
        }

        Ok(value)
    }

    fn collect<T: FieldNames>(&self, prefix: Option<&str>, errors: &ValidationErrors, out: &mut Vec<FieldError>) {
        let mut entries: Vec<(String, &ValidationErrorsKind)> = errors
            .errors()
            .iter()
            .filter(|(name, _)| &***name != STRUCT_LEVEL_KEY)
            .filter_map(|(name, kind)| T::json_name(name).map(|json| (json.to_owned(), kind)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (name, kind) in entries {
            let path = match prefix {
                Some(prefix) => format!("{prefix}.{name}"),
                None => name.clone(),
            };
            match kind {
                ValidationErrorsKind::Field(errs) => {
                    for err in errs {
                        out.push(FieldError::new(path.clone(), self.translator.translate(&name, err)));
                    }
                }
                ValidationErrorsKind::Struct(inner) => self.collect::<T>(Some(&path), inner, out),
                ValidationErrorsKind::List(items) => {
                    for (index, inner) in items {
                        self.collect::<T>(Some(&format!("{path}[{index}]")), inner, out);
                    }
                }
            }
        }
    }

    /// Deserializes `body` into `T`, rejecting trailing data and any field `T`
    /// does not declare.
    fn parse_strict<T: DeserializeOwned>(&self, body: &[u8]) -> Result<T, RequestError> {
        let mut de = serde_json::Deserializer::from_slice(body);
        let mut unknown: Option<String> = None;

        let parsed: Result<T, serde_json::Error> = serde_ignored::deserialize(&mut de, |path| {
            if unknown.is_none() {
                unknown = Some(path.to_string());
            }
        })
        .and_then(|value| de.end().map(|()| value));

        let value = match parsed {
            Ok(value) => value,
            Err(e) => {
                if let Some(field) = missing_field(&e) {
                    let message = self.translator.translate(&field, &ValidationError::new("required"));
                    return Err(validation_failed(vec![FieldError::new(field, message)]).with_source(e));
                }
                return Err(RequestError::bad_request(MALFORMED_BODY).with_source(e));
            }
        };

        if let Some(field) = unknown {
            return Err(RequestError::bad_request(format!("unknown field {field:?}")));
        }

        Ok(value)
    }
}

const MALFORMED_BODY: &str = "malformed request body";

fn validation_failed(fields: Vec<FieldError>) -> RequestError {
    RequestError::bad_request("field validation error").with_fields(fields)
}

/// The JSON name serde reported as missing, if that is why parsing failed.
fn missing_field(e: &serde_json::Error) -> Option<String> {
    if e.classify() != Category::Data {
        return None;
    }
    let message = e.to_string();
    let rest = message.strip_prefix("missing field `")?;
    let end = rest.find('`')?;
    Some(rest[..end].to_owned())
}
