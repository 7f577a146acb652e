/// Column definitions for steward incident annotations.
pub mod incidents {
    use arrow::datatypes::{DataType, Field, Schema};

    /// A single output column: name and nullability.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldSpec {
        pub name: &'static str,
        pub nullable: bool,
    }

    const fn nullable(name: &'static str) -> FieldSpec {
        FieldSpec {
            name,
            nullable: true,
        }
    }

    /// Column tagged onto every persisted row by the pipeline, never by the model.
    pub const SOURCE_DOCUMENT: &str = "source_document";

    /// Fields the model is asked to fill, in store column order.
    pub const FIELDS: &[FieldSpec] = &[
        nullable("type_of_document"),
        nullable("year"),
        nullable("grand_prix"),
        nullable("description"),
        nullable("session_type"),
        nullable("track"),
        nullable("lap_number"),
        nullable("turn_number"),
        nullable("safety_car_or_vsc_involved"),
        nullable("penalty_given"),
        nullable("type_of_incident"),
        nullable("was_contact_made"),
        nullable("immediate_advantage_gained"),
        nullable("drivers_involved"),
        nullable("teams_involved"),
        nullable("rule_violated"),
        nullable("decision_notes"),
    ];

    /// Synonyms the model emits for schema fields: `(alias, canonical)`.
    ///
    /// The instruction template names "rule_violated or relevant_rule", and
    /// models answer with either key.
    pub const FIELD_ALIASES: &[(&str, &str)] = &[("relevant_rule", "rule_violated")];

    /// Every store column in order, `source_document` last.
    pub fn fields() -> Vec<FieldSpec> {
        let mut fields = FIELDS.to_vec();
        fields.push(FieldSpec {
            name: SOURCE_DOCUMENT,
            nullable: false,
        });
        fields
    }

    pub fn column_names() -> Vec<&'static str> {
        fields().into_iter().map(|f| f.name).collect()
    }

    pub fn model_field_names() -> impl Iterator<Item = &'static str> {
        FIELDS.iter().map(|f| f.name)
    }

    pub fn is_model_field(name: &str) -> bool {
        FIELDS.iter().any(|f| f.name == name)
    }

    /// Arrow schema for the annotation store.
    ///
    /// Every column is `Utf8`: model output is persisted as opaque text and
    /// typed interpretation happens later, in [`crate::Incident`].
    pub fn incident_schema() -> Schema {
        Schema::new(
            fields()
                .into_iter()
                .map(|f| Field::new(f.name, DataType::Utf8, f.nullable))
                .collect::<Vec<_>>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::incidents;

    #[test]
    fn source_document_is_last_and_required() {
        let fields = incidents::fields();
        assert_eq!(fields.len(), 18);
        let last = fields.last().unwrap();
        assert_eq!(last.name, incidents::SOURCE_DOCUMENT);
        assert!(!last.nullable);
        assert!(fields[..17].iter().all(|f| f.nullable));
    }

    #[test]
    fn column_order_is_fixed() {
        let names = incidents::column_names();
        assert_eq!(names[0], "type_of_document");
        assert_eq!(names[1], "year");
        assert_eq!(names[2], "grand_prix");
        assert_eq!(names[16], "decision_notes");
        assert_eq!(names[17], "source_document");
    }

    #[test]
    fn incident_schema_matches_fields() {
        let schema = incidents::incident_schema();
        assert_eq!(schema.fields().len(), 18);
        assert!(schema.field_with_name("lap_number").unwrap().is_nullable());
        assert!(!schema.field_with_name("source_document").unwrap().is_nullable());
        for (field, name) in schema.fields().iter().zip(incidents::column_names()) {
            assert_eq!(field.name(), name);
        }
    }

    #[test]
    fn aliases_point_at_model_fields() {
        for (alias, canonical) in incidents::FIELD_ALIASES {
            assert!(!incidents::is_model_field(alias));
            assert!(incidents::is_model_field(canonical));
        }
        assert!(!incidents::is_model_field(incidents::SOURCE_DOCUMENT));
    }
}
