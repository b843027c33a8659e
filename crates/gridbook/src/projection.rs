//! Grid + evaluation → persisted document

use crate::calculation::{CellEvaluation, Evaluation};
use gridbook_core::{is_reserved_meta_key, to_snake_case, Grid, MetaValue};
use gridbook_doc::{
    CellErrorRecord, Document, DocumentCell, ErrorRecordKind, PersistedValue, Sheet, SheetMeta,
    DEFAULT_SHEET_NAME,
};
use gridbook_formula::{CellFailure, ErrorKind};
use std::collections::BTreeMap;

/// Options for serializing a grid
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Written as the document's `page_id`
    pub page_id: Option<String>,
    /// Name of the single sheet (default `Sheet1`)
    pub sheet_name: Option<String>,
}

/// Project an evaluated grid onto the persisted document model
pub fn to_document(grid: &Grid, evaluation: &Evaluation, options: &SerializeOptions) -> Document {
    let annotations = &grid.annotations;

    let mut sheet = Sheet::new(
        options
            .sheet_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
        grid.row_count,
        grid.column_count,
    );
    sheet.meta = SheetMeta {
        row_count: grid.row_count,
        column_count: grid.column_count,
        frozen_rows: annotations.frozen_rows,
        frozen_columns: annotations.frozen_columns,
        extra: scalar_entries(&annotations.meta)
            .into_iter()
            .filter(|(key, _)| !is_reserved_meta_key(key))
            .collect(),
    };
    sheet.columns = annotations
        .columns
        .iter()
        .map(|(column, settings)| (column.trim().to_uppercase(), scalar_entries(settings)))
        .filter(|(_, settings)| !settings.is_empty())
        .collect();
    sheet.ranges = annotations.ranges.clone();

    for (address, cell) in &evaluation.cells {
        if cell.raw.trim().is_empty() {
            continue;
        }
        let mut persisted = persisted_cell(cell);
        if let Some(notes) = annotations.notes_for(address) {
            persisted.notes = notes.to_vec();
        }
        sheet.cells.insert(address.clone(), persisted);
    }
    for (address, notes) in &annotations.notes {
        if !notes.is_empty() && !sheet.cells.contains_key(address) {
            sheet.cells.insert(
                address.clone(),
                DocumentCell {
                    notes: notes.clone(),
                    ..Default::default()
                },
            );
        }
    }

    sheet.dependencies = evaluation.dependencies.clone();

    Document {
        page_id: options.page_id.clone(),
        sheets: vec![sheet],
        ..Default::default()
    }
}

fn persisted_cell(cell: &CellEvaluation) -> DocumentCell {
    let formula = cell.is_formula().then(|| cell.raw.trim().to_string());
    match &cell.error {
        Some(failure) => DocumentCell {
            formula,
            error: Some(error_record(failure)),
            ..Default::default()
        },
        None => DocumentCell {
            formula,
            value: Some(PersistedValue::from(&cell.value)),
            value_type: Some(cell.value_type),
            ..Default::default()
        },
    }
}

fn error_record(failure: &CellFailure) -> CellErrorRecord {
    CellErrorRecord {
        kind: match failure.kind {
            ErrorKind::CircularReference => ErrorRecordKind::CircularReference,
            ErrorKind::Evaluation => ErrorRecordKind::Evaluation,
        },
        message: Some(failure.message.clone()).filter(|m| !m.is_empty()),
        details: failure.details.clone(),
    }
}

/// Scalar entries only, keyed in snake_case
fn scalar_entries(entries: &BTreeMap<String, MetaValue>) -> BTreeMap<String, MetaValue> {
    entries
        .iter()
        .filter(|(_, value)| value.is_scalar())
        .map(|(key, value)| (to_snake_case(key), value.clone()))
        .collect()
}
