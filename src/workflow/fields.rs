use crate::backend::entities::{ApplicationField, FieldPatch};
use crate::session::FieldRecord;

pub fn add_blank(fields: &mut Vec<FieldRecord>) {
    fields.push(FieldRecord::blank());
}

/// Remove the row at `index`. An existing field comes back marked for
/// deletion; it is dropped from the submission either way.
pub fn remove(fields: &mut Vec<FieldRecord>, index: usize) -> Option<FieldRecord> {
    if index >= fields.len() {
        return None;
    }
    let mut removed = fields.remove(index);
    if removed.is_existing {
        removed.mark_for_deletion = true;
    }
    Some(removed)
}

pub fn edit(
    fields: &mut [FieldRecord],
    index: usize,
    name: &str,
    field_type: &str,
    description: &str,
) -> bool {
    match fields.get_mut(index) {
        Some(field) => {
            field.name = name.to_string();
            field.field_type = field_type.to_string();
            field.description = description.to_string();
            true
        }
        None => false,
    }
}

/// Fields to create and to update, in editor order.
#[derive(Debug, Default, PartialEq)]
pub struct FieldPlan {
    pub create: Vec<ApplicationField>,
    pub update: Vec<ApplicationField>,
    pub skipped: usize,
}

/// Records with a qualified name are updates, the rest are creates.
/// Blank-named records are skipped on both paths.
pub fn plan_fields(fields: &[FieldRecord], application_qualified_name: &str) -> FieldPlan {
    let mut plan = FieldPlan::default();
    for record in fields {
        let name = record.name.trim();
        if name.is_empty() {
            plan.skipped += 1;
            continue;
        }
        let patch = FieldPatch::from_inputs(&record.field_type, &record.description);
        let mut field = match record.known_qualified_name() {
            Some(qualified_name) => ApplicationField::updater(qualified_name, name),
            None => ApplicationField::creator(name, application_qualified_name),
        };
        field.merge(&patch);
        if record.known_qualified_name().is_some() {
            plan.update.push(field);
        } else {
            plan.create.push(field);
        }
    }
    plan
}
