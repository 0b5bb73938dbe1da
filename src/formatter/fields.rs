//! Receipt field registry.
//!
//! Every field that can be selected with `--fields` is declared once here, together
//! with its table header, column alignment, and how to extract it from a [`Receipt`]
//! for table and JSON output.

use std::collections::BTreeMap;

use serde_json::Value;

use super::error::FormatError;
use super::receipt::{format_amount, format_date_time, format_string};
use super::table::Alignment;
use super::NONE_PLACEHOLDER;
use crate::model::Receipt;

/// Extracts the display string for a table cell.
pub type CellExtractor = fn(&Receipt) -> Result<String, FormatError>;

/// Extracts the native JSON value.
pub type JsonExtractor = fn(&Receipt) -> Value;

/// All selectable receipt fields, in the order shown by `--list-fields`.
pub const ALL_FIELD_NAMES: &[&str] = &[
    "id",
    "created_at",
    "description",
    "document_type",
    "invoice_registration_number",
    "mime_type",
    "origin",
    "qualified_invoice",
    "receipt_metadatum.amount",
    "receipt_metadatum.issue_date",
    "receipt_metadatum.partner_name",
    "status",
    "user.display_name",
    "user.email",
    "user.id",
];

/// Fields shown when no explicit selection is given.
pub const DEFAULT_FIELD_NAMES: &[&str] = &[
    "id",
    "status",
    "created_at",
    "description",
    "receipt_metadatum.partner_name",
    "receipt_metadatum.amount",
    "receipt_metadatum.issue_date",
];

/// Short names accepted in addition to the canonical field names.
pub const FIELD_ALIASES: &[(&str, &str)] = &[
    ("amount", "receipt_metadatum.amount"),
    ("issue_date", "receipt_metadatum.issue_date"),
    ("partner_name", "receipt_metadatum.partner_name"),
    ("partner", "receipt_metadatum.partner_name"),
    ("user_id", "user.id"),
    ("user_email", "user.email"),
    ("user_name", "user.display_name"),
    ("user_display_name", "user.display_name"),
];

/// How a single field is rendered.
#[derive(Debug, Clone, Copy)]
pub struct FieldDefinition {
    pub name: &'static str,
    pub header: &'static str,
    pub alignment: Alignment,
    pub cell: CellExtractor,
    pub json: JsonExtractor,
}

/// A requested field resolved against the registry.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedField<'a> {
    /// Name as given by the caller, used as the JSON key.
    pub key: &'a str,
    pub definition: &'a FieldDefinition,
}

/// Immutable lookup table from field name to [`FieldDefinition`].
///
/// Build it once at startup and pass it by reference.
#[derive(Debug)]
pub struct FieldRegistry {
    fields: BTreeMap<&'static str, FieldDefinition>,
    aliases: BTreeMap<&'static str, &'static str>,
}

impl Default for FieldRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: FIELD_DEFINITIONS
                .iter()
                .map(|definition| (definition.name, *definition))
                .collect(),
            aliases: FIELD_ALIASES.iter().copied().collect(),
        }
    }

    /// All canonical field names in display order.
    #[must_use]
    pub const fn all_names(&self) -> &'static [&'static str] {
        ALL_FIELD_NAMES
    }

    /// Field names used when no selection is given.
    #[must_use]
    pub const fn default_names(&self) -> &'static [&'static str] {
        DEFAULT_FIELD_NAMES
    }

    /// Look up a field by canonical name or alias.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        let canonical = self.aliases.get(name).copied().unwrap_or(name);
        self.fields.get(canonical)
    }

    /// Canonical names present in the registry.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }

    /// Resolve requested field names in order.
    ///
    /// An empty request resolves to [`DEFAULT_FIELD_NAMES`].
    ///
    /// # Errors
    /// Returns [`FormatError::UnsupportedField`] for the first unknown name.
    pub fn resolve<'a, S: AsRef<str>>(&'a self, requested: &'a [S]) -> Result<Vec<ResolvedField<'a>>, FormatError> {
        if requested.is_empty() {
            return self.resolve_names(DEFAULT_FIELD_NAMES.iter().copied());
        }
        self.resolve_names(requested.iter().map(|name| name.as_ref()))
    }

    fn resolve_names<'a, 'n: 'a>(
        &'a self,
        names: impl Iterator<Item = &'n str>,
    ) -> Result<Vec<ResolvedField<'a>>, FormatError> {
        names
            .enumerate()
            .map(|(index, name)| {
                self.get(name)
                    .map(|definition| ResolvedField { key: name, definition })
                    .ok_or_else(|| FormatError::UnsupportedField {
                        index,
                        name: name.to_string(),
                    })
            })
            .collect()
    }
}

/// Split a comma separated field list, trimming whitespace around each name.
///
/// A blank string means no selection.
#[must_use]
pub fn parse_field_list(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    raw.split(',').map(|name| name.trim().to_string()).collect()
}

fn optional_str(value: Option<&str>) -> String {
    value.map_or_else(|| NONE_PLACEHOLDER.to_string(), ToString::to_string)
}

static FIELD_DEFINITIONS: &[FieldDefinition] = &[
    FieldDefinition {
        name: "id",
        header: "ID",
        alignment: Alignment::Left,
        cell: |r| Ok(r.id.to_string()),
        json: |r| Value::from(r.id),
    },
    FieldDefinition {
        name: "status",
        header: "Status",
        alignment: Alignment::Left,
        cell: |r| Ok(r.status.clone()),
        json: |r| Value::from(r.status.as_str()),
    },
    FieldDefinition {
        name: "created_at",
        header: "Created At",
        alignment: Alignment::Left,
        cell: |r| format_date_time(&r.created_at),
        json: |r| Value::from(r.created_at.as_str()),
    },
    FieldDefinition {
        name: "description",
        header: "Description",
        alignment: Alignment::Left,
        cell: |r| Ok(format_string(r.description.as_deref()).to_string()),
        json: |r| Value::from(r.description.as_deref()),
    },
    FieldDefinition {
        name: "document_type",
        header: "Document Type",
        alignment: Alignment::Left,
        cell: |r| Ok(optional_str(r.document_type.as_deref())),
        json: |r| Value::from(r.document_type.as_deref()),
    },
    FieldDefinition {
        name: "invoice_registration_number",
        header: "Invoice Reg No",
        alignment: Alignment::Left,
        cell: |r| Ok(format_string(r.invoice_registration_number.as_deref()).to_string()),
        json: |r| Value::from(r.invoice_registration_number.as_deref()),
    },
    FieldDefinition {
        name: "mime_type",
        header: "MIME Type",
        alignment: Alignment::Left,
        cell: |r| Ok(r.mime_type.clone()),
        json: |r| Value::from(r.mime_type.as_str()),
    },
    FieldDefinition {
        name: "origin",
        header: "Origin",
        alignment: Alignment::Left,
        cell: |r| Ok(r.origin.clone()),
        json: |r| Value::from(r.origin.as_str()),
    },
    FieldDefinition {
        name: "qualified_invoice",
        header: "Qualified Invoice",
        alignment: Alignment::Left,
        cell: |r| Ok(optional_str(r.qualified_invoice.as_deref())),
        json: |r| Value::from(r.qualified_invoice.as_deref()),
    },
    FieldDefinition {
        name: "receipt_metadatum.amount",
        header: "Amount",
        alignment: Alignment::Right,
        cell: |r| {
            Ok(r.receipt_metadatum
                .as_ref()
                .and_then(|metadatum| metadatum.amount)
                .map_or_else(|| NONE_PLACEHOLDER.to_string(), format_amount))
        },
        json: |r| Value::from(r.receipt_metadatum.as_ref().and_then(|metadatum| metadatum.amount)),
    },
    FieldDefinition {
        name: "receipt_metadatum.issue_date",
        header: "Issue Date",
        alignment: Alignment::Left,
        cell: |r| {
            Ok(format_string(
                r.receipt_metadatum
                    .as_ref()
                    .and_then(|metadatum| metadatum.issue_date.as_deref()),
            )
            .to_string())
        },
        json: |r| {
            Value::from(
                r.receipt_metadatum
                    .as_ref()
                    .and_then(|metadatum| metadatum.issue_date.as_deref()),
            )
        },
    },
    FieldDefinition {
        name: "receipt_metadatum.partner_name",
        header: "Partner",
        alignment: Alignment::Left,
        cell: |r| {
            Ok(format_string(
                r.receipt_metadatum
                    .as_ref()
                    .and_then(|metadatum| metadatum.partner_name.as_deref()),
            )
            .to_string())
        },
        json: |r| {
            Value::from(
                r.receipt_metadatum
                    .as_ref()
                    .and_then(|metadatum| metadatum.partner_name.as_deref()),
            )
        },
    },
    FieldDefinition {
        name: "user.display_name",
        header: "User Name",
        alignment: Alignment::Left,
        cell: |r| Ok(format_string(r.user.display_name.as_deref()).to_string()),
        json: |r| Value::from(r.user.display_name.as_deref()),
    },
    FieldDefinition {
        name: "user.email",
        header: "User Email",
        alignment: Alignment::Left,
        cell: |r| Ok(r.user.email.clone()),
        json: |r| Value::from(r.user.email.as_str()),
    },
    FieldDefinition {
        name: "user.id",
        header: "User ID",
        alignment: Alignment::Left,
        cell: |r| Ok(r.user.id.to_string()),
        json: |r| Value::from(r.user.id),
    },
];

#[cfg(test)]
mod test_field_definitions {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn all_field_names_are_registered() {
        let registry = FieldRegistry::new();
        for name in ALL_FIELD_NAMES {
            let definition = registry.get(name);
            assert!(definition.is_some(), "field {name:?} is listed but not registered");
        }
    }

    #[test]
    fn all_registered_fields_are_listed() {
        let registry = FieldRegistry::new();
        for name in registry.keys() {
            assert!(ALL_FIELD_NAMES.contains(&name), "field {name:?} is registered but not listed");
        }
        assert_eq!(registry.keys().count(), ALL_FIELD_NAMES.len());
    }

    #[test]
    fn definitions_have_unique_names() {
        let names: HashSet<&str> = FIELD_DEFINITIONS.iter().map(|definition| definition.name).collect();
        assert_eq!(names.len(), FIELD_DEFINITIONS.len());
    }

    #[test]
    fn definitions_have_headers() {
        for definition in FIELD_DEFINITIONS {
            assert!(!definition.header.is_empty(), "field {:?} has empty header", definition.name);
        }
    }

    #[test]
    fn name_lists_have_no_duplicates() {
        let all: HashSet<&str> = ALL_FIELD_NAMES.iter().copied().collect();
        assert_eq!(all.len(), ALL_FIELD_NAMES.len());

        let defaults: HashSet<&str> = DEFAULT_FIELD_NAMES.iter().copied().collect();
        assert_eq!(defaults.len(), DEFAULT_FIELD_NAMES.len());
    }

    #[test]
    fn default_fields_are_subset_of_all_fields() {
        for name in DEFAULT_FIELD_NAMES {
            assert!(ALL_FIELD_NAMES.contains(name), "default field {name:?} is not listed");
        }
    }

    #[test]
    fn aliases_target_registered_fields() {
        let registry = FieldRegistry::new();
        for (alias, target) in FIELD_ALIASES {
            assert!(!ALL_FIELD_NAMES.contains(alias), "alias {alias:?} shadows a field");
            assert!(registry.keys().any(|name| name == *target), "alias {alias:?} targets unknown {target:?}");
        }
    }
}
